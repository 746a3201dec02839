//! End-to-end engine tests against local mock providers
use std::time::Duration;

use folio_core::*;
use url::Url;
use wiremock::matchers::{body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fixture(name: &str) -> String {
    std::fs::read_to_string(format!("../../tests/fixtures/{}", name)).unwrap()
}

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.into_bytes(), "text/html; charset=utf-8")
}

/// Provider whose search page uses `.bookinfo` blocks.
fn listing_profile(name: &str, server: &MockServer) -> SourceProfile {
    SourceProfile::builder(name, Url::parse(&server.uri()).unwrap())
        .search_url(format!("{}/search?q={{keyword}}", server.uri()))
        .search_item_selector(".bookinfo")
        .title_selector("h4 a")
        .author_selector(".author")
        .chapter_list_selector(".listmain dd a")
        .chapter_list_selector("#list dd a")
        .chapter_list_selector(".chapters li a")
        .content_selector("#content")
        .build()
        .unwrap()
}

/// Provider whose search page is a table with a header row.
fn grid_profile(name: &str, server: &MockServer) -> SourceProfile {
    SourceProfile::builder(name, Url::parse(&server.uri()).unwrap())
        .search_url(format!("{}/modules/article/search.php?searchkey={{keyword}}", server.uri()))
        .search_item_selector(".grid tr")
        .title_selector("td:nth-child(1) a")
        .author_selector("td:nth-child(3)")
        .chapter_list_selector(".zjlist dd a")
        .content_selector("#TextContent")
        .build()
        .unwrap()
}

fn engine(profiles: Vec<SourceProfile>, config: EngineConfig) -> Engine {
    Engine::new(SourceRegistry::new(profiles).unwrap(), config).unwrap()
}

fn quick_config() -> EngineConfigBuilder {
    EngineConfig::builder().timeout(5).retry_delay_ms(10)
}

async fn mount_listing(server: &MockServer, delay: Duration) {
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "TestNovel"))
        .respond_with(html(fixture("search_listing.html")).set_delay(delay))
        .mount(server)
        .await;
}

async fn mount_grid(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/modules/article/search.php"))
        .respond_with(html(fixture("search_grid.html")))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_search_merges_and_dedups_across_providers() {
    let alpha = MockServer::start().await;
    let beta = MockServer::start().await;
    mount_listing(&alpha, Duration::ZERO).await;
    mount_grid(&beta).await;

    let engine = engine(
        vec![listing_profile("alpha", &alpha), grid_profile("beta", &beta)],
        quick_config().build(),
    );
    let results = engine.search("TestNovel", &SourceTarget::All).await.unwrap();

    let titles: Vec<_> = results.iter().map(|r| (r.title.as_str(), r.source.as_str())).collect();
    assert_eq!(
        titles,
        vec![
            ("TestNovel", "alpha"),
            ("TestNovel Side Stories", "alpha"),
            ("Grid Only Title", "beta"),
        ]
    );

    assert_eq!(results[0].author, "Jane Writer");
    assert_eq!(results[0].url, format!("{}/book/101/", alpha.uri()));
    assert_eq!(results[2].author, UNKNOWN_AUTHOR);
    assert_eq!(results[2].url, format!("{}/files/article/html/8/8812/", beta.uri()));
}

#[tokio::test]
async fn test_search_order_follows_declaration_not_completion() {
    let slow = MockServer::start().await;
    let fast = MockServer::start().await;
    mount_listing(&slow, Duration::from_millis(600)).await;
    mount_grid(&fast).await;

    let engine = engine(
        vec![listing_profile("slow", &slow), grid_profile("fast", &fast)],
        quick_config().build(),
    );
    let results = engine.search("TestNovel", &SourceTarget::All).await.unwrap();

    assert_eq!(results[0].source, "slow");
    assert_eq!(results[0].title, "TestNovel");
    assert_eq!(results.last().unwrap().source, "fast");
}

#[tokio::test]
async fn test_failing_provider_contributes_nothing() {
    let broken = MockServer::start().await;
    let healthy = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&broken)
        .await;
    mount_grid(&healthy).await;

    let engine = engine(
        vec![listing_profile("broken", &broken), grid_profile("healthy", &healthy)],
        quick_config().build(),
    );
    let results = engine.search("TestNovel", &SourceTarget::All).await.unwrap();

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.source == "healthy"));
}

#[tokio::test]
async fn test_search_respects_result_cap() {
    let alpha = MockServer::start().await;
    let beta = MockServer::start().await;
    mount_listing(&alpha, Duration::ZERO).await;
    mount_grid(&beta).await;

    let engine = engine(
        vec![listing_profile("alpha", &alpha), grid_profile("beta", &beta)],
        quick_config().max_results(2).build(),
    );
    let results = engine.search("TestNovel", &SourceTarget::All).await.unwrap();

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.source == "alpha"));
}

#[tokio::test]
async fn test_named_source_queries_only_that_provider() {
    let alpha = MockServer::start().await;
    let beta = MockServer::start().await;
    mount_listing(&alpha, Duration::ZERO).await;
    Mock::given(method("GET"))
        .respond_with(html(fixture("search_grid.html")))
        .expect(0)
        .mount(&beta)
        .await;

    let engine = engine(
        vec![listing_profile("alpha", &alpha), grid_profile("beta", &beta)],
        quick_config().build(),
    );
    let results = engine
        .search("TestNovel", &SourceTarget::Named("alpha".to_string()))
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
}

#[tokio::test]
async fn test_post_search_sends_form_in_provider_charset() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/modules/article/search.php"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string("searchkey=%B2%E2%CA%D4"))
        .respond_with(html(fixture("search_grid.html")))
        .expect(1)
        .mount(&server)
        .await;

    let profile = SourceProfile::builder("gbk", Url::parse(&server.uri()).unwrap())
        .search_url(format!("{}/modules/article/search.php", server.uri()))
        .search_method(SearchMethod::Post)
        .search_param("searchkey", "{keyword}")
        .search_charset("gbk")
        .search_item_selector(".grid tr")
        .title_selector("td:nth-child(1) a")
        .chapter_list_selector(".zjlist dd a")
        .content_selector("#TextContent")
        .build()
        .unwrap();

    let engine = engine(vec![profile], quick_config().build());
    let results = engine.search("测试", &SourceTarget::All).await.unwrap();

    assert!(!results.is_empty());
    assert!(results.iter().all(|r| r.source == "gbk"));
}

#[tokio::test]
async fn test_search_budget_returns_partial_results() {
    let stuck = MockServer::start().await;
    let quick = MockServer::start().await;
    mount_listing(&stuck, Duration::from_secs(4)).await;
    mount_grid(&quick).await;

    let engine = engine(
        vec![listing_profile("stuck", &stuck), grid_profile("quick", &quick)],
        quick_config().timeout(10).search_budget(1).build(),
    );
    let results = engine.search("TestNovel", &SourceTarget::All).await.unwrap();

    assert!(!results.is_empty());
    assert!(results.iter().all(|r| r.source == "quick"));
}

#[tokio::test]
async fn test_resolve_chapters_uses_third_candidate() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/book/101/"))
        .respond_with(html(fixture("chapters_third_selector.html")))
        .mount(&server)
        .await;

    let engine = engine(vec![listing_profile("alpha", &server)], quick_config().build());
    let chapters = engine
        .resolve_chapters(&format!("{}/book/101/", server.uri()), "alpha")
        .await
        .unwrap();

    let got: Vec<_> = chapters.iter().map(|c| (c.ordinal, c.title.as_str())).collect();
    assert_eq!(got, vec![(0, "第一章 开端"), (1, "第二章 相遇"), (2, "第三章 远行")]);
    assert_eq!(chapters[1].url, format!("{}/book/101/2.html", server.uri()));
}

#[tokio::test]
async fn test_resolve_chapters_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let engine = engine(vec![listing_profile("alpha", &server)], quick_config().build());
    let err = engine
        .resolve_chapters(&format!("{}/book/404/", server.uri()), "alpha")
        .await
        .unwrap_err();

    assert_eq!(err.failure_kind(), Some(FailureKind::HttpStatus(404)));
}

#[tokio::test]
async fn test_fetch_chapter_cleans_content() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/book/101/1.html"))
        .respond_with(html(fixture("chapter_content.html")))
        .mount(&server)
        .await;

    let engine = engine(vec![listing_profile("alpha", &server)], quick_config().build());
    let text = engine
        .fetch_chapter(&format!("{}/book/101/1.html", server.uri()), "alpha")
        .await
        .unwrap();

    assert_eq!(
        text,
        ChapterText::Text("晨雾笼罩着港口。\n\n她把船数了两遍，才敢相信。\n\n北方没有人回来。".to_string())
    );
}

#[tokio::test]
async fn test_boilerplate_only_chapter_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(html(fixture("chapter_boilerplate_only.html")))
        .mount(&server)
        .await;

    let engine = engine(vec![listing_profile("alpha", &server)], quick_config().build());
    let text = engine
        .fetch_chapter_text(&format!("{}/book/101/2.html", server.uri()), "alpha")
        .await
        .unwrap();

    assert_eq!(text, CONTENT_UNAVAILABLE);
}

#[tokio::test]
async fn test_fetch_chapter_failure_is_placeholder() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let engine = engine(vec![listing_profile("alpha", &server)], quick_config().build());
    let text = engine
        .fetch_chapter(&format!("{}/gone.html", server.uri()), "alpha")
        .await
        .unwrap();

    assert!(matches!(text, ChapterText::Failed(_)));
    assert!(text.into_string().starts_with("Failed to load chapter: HTTP 404"));
}

#[tokio::test]
async fn test_gbk_chapter_with_meta_charset() {
    let server = MockServer::start().await;
    let page = r#"<html><head><meta http-equiv="Content-Type" content="text/html; charset=gbk"></head>
        <body><div id="content">第一章　风起<br>天色渐暗。</div></body></html>"#;
    let (body, _, _) = encoding_rs::GBK.encode(page);
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body.into_owned(), "text/html"))
        .mount(&server)
        .await;

    let engine = engine(vec![listing_profile("alpha", &server)], quick_config().build());
    let text = engine
        .fetch_chapter_text(&format!("{}/1.html", server.uri()), "alpha")
        .await
        .unwrap();

    assert_eq!(text, "第一章\n\n风起\n\n天色渐暗。");
}
