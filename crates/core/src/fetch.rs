//! HTTP fetching with retries and charset resolution.
//!
//! [`Fetcher`] issues one logical request per call. Transport failures
//! (timeouts, resets) are retried with a fixed delay; status failures are
//! returned immediately. Bodies are decoded with [`crate::encoding::decode_body`].
//!
//! Certificate validation is disabled by default ([`FetchConfig::accept_invalid_certs`]).
//! Many novel mirrors run expired or self-signed certificates, and the
//! engine only ever reads public pages. When validation is enabled and a
//! request fails with a certificate error, one extra attempt is made with
//! validation off.

use std::error::Error as _;
use std::time::Duration;

use rand::seq::SliceRandom;
use reqwest::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, USER_AGENT};
use tracing::{debug, warn};
use url::Url;

use crate::encoding::decode_body;
use crate::error::FailureKind;
use crate::{FolioError, Result};

/// Browser User-Agent strings rotated per request.
pub const DEFAULT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Mobile Safari/537.36",
];

/// HTTP client configuration.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Per-attempt timeout in seconds.
    pub timeout: u64,
    /// Delay between attempts in milliseconds.
    pub retry_delay_ms: u64,
    /// Attempts used by [`Fetcher::get`].
    pub max_attempts: usize,
    /// Skip certificate validation.
    pub accept_invalid_certs: bool,
    /// Pool to draw the User-Agent header from.
    pub user_agents: Vec<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: 10,
            retry_delay_ms: 1000,
            max_attempts: 3,
            accept_invalid_certs: true,
            user_agents: DEFAULT_USER_AGENTS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// HTTP method for [`Fetcher::fetch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Parameters go in the query string.
    Get,
    /// Parameters go in a urlencoded form body.
    Post,
}

/// Outcome of a fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchResult {
    Success { text: String, encoding: &'static str },
    Failure { kind: FailureKind, detail: String },
}

impl FetchResult {
    fn failure(kind: FailureKind, detail: impl Into<String>) -> Self {
        FetchResult::Failure { kind, detail: detail.into() }
    }

    /// The failure kind, or `None` on success.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            FetchResult::Success { .. } => None,
            FetchResult::Failure { kind, .. } => Some(*kind),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, FetchResult::Success { .. })
    }

    /// Converts into the decoded body or a [`FolioError::Fetch`].
    pub fn into_result(self) -> Result<String> {
        match self {
            FetchResult::Success { text, .. } => Ok(text),
            FetchResult::Failure { kind, detail } => Err(FolioError::Fetch { kind, detail }),
        }
    }
}

/// Reusable HTTP fetcher. Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    /// Validation-off client for the one TLS retry. `None` when validation is already off.
    insecure: Option<Client>,
    config: FetchConfig,
}

impl Fetcher {
    /// Builds the underlying clients.
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = build_client(&config, config.accept_invalid_certs)?;
        let insecure = if config.accept_invalid_certs { None } else { Some(build_client(&config, true)?) };

        Ok(Self { client, insecure, config })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// GET `url` with the configured attempt count.
    pub async fn get(&self, url: &str) -> FetchResult {
        self.fetch(url, Method::Get, "", self.config.max_attempts).await
    }

    /// Issues a request, retrying transport failures up to `max_attempts` times in total.
    ///
    /// `form` is an already urlencoded `k=v&...` string. It is sent byte for
    /// byte so providers expecting a legacy charset get their own encoding.
    pub async fn fetch(&self, url: &str, method: Method, form: &str, max_attempts: usize) -> FetchResult {
        let url = match Url::parse(url) {
            Ok(url) => url,
            Err(e) => return FetchResult::failure(FailureKind::InvalidUrl, e.to_string()),
        };

        let url = &url;
        self.with_retries(url, max_attempts, move |insecure| {
            let client = match (&self.insecure, insecure) {
                (Some(client), true) => client,
                _ => &self.client,
            };
            self.attempt(client, url, method, form)
        })
        .await
    }

    /// Runs `attempt` until it succeeds, fails for good, or runs out of tries.
    ///
    /// `attempt(false)` goes through the validating client. A TLS failure
    /// gets exactly one `attempt(true)` when a validation-off client exists.
    async fn with_retries<F, Fut>(&self, url: &Url, max_attempts: usize, attempt: F) -> FetchResult
    where
        F: Fn(bool) -> Fut,
        Fut: Future<Output = FetchResult>,
    {
        let attempts = max_attempts.max(1);
        let mut tried = 1;

        loop {
            let result = attempt(false).await;

            match result.failure_kind() {
                Some(FailureKind::Tls) if self.insecure.is_some() => {
                    debug!(%url, "certificate error, retrying without validation");
                    return attempt(true).await;
                }
                Some(kind) if kind.is_retryable() && tried < attempts => {
                    warn!(%url, attempt = tried, attempts, error = %kind, "fetch failed, retrying");
                    tokio::time::sleep(Duration::from_millis(self.config.retry_delay_ms)).await;
                    tried += 1;
                }
                _ => return result,
            }
        }
    }

    async fn attempt(&self, client: &Client, url: &Url, method: Method, form: &str) -> FetchResult {
        let request = match method {
            Method::Get if form.is_empty() => client.get(url.clone()),
            Method::Get => client.get(with_query(url, form)),
            Method::Post => client
                .post(url.clone())
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(form.to_string()),
        };

        let response = match request
            .header(USER_AGENT, self.pick_user_agent())
            .header(ACCEPT, "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .header(ACCEPT_LANGUAGE, "zh-CN,zh;q=0.9,en;q=0.8")
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return self.classify(&e),
        };

        let status = response.status();
        if !status.is_success() {
            let reason = status.canonical_reason().unwrap_or("request failed");
            return FetchResult::failure(FailureKind::HttpStatus(status.as_u16()), reason);
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => return self.classify(&e),
        };

        let decoded = decode_body(&bytes, content_type.as_deref());
        debug!(%url, bytes = bytes.len(), encoding = decoded.encoding.name(), "fetched");

        FetchResult::Success { text: decoded.text, encoding: decoded.encoding.name() }
    }

    fn pick_user_agent(&self) -> &str {
        self.config
            .user_agents
            .choose(&mut rand::thread_rng())
            .map(String::as_str)
            .unwrap_or(DEFAULT_USER_AGENTS[0])
    }

    fn classify(&self, err: &reqwest::Error) -> FetchResult {
        if err.is_timeout() {
            FetchResult::failure(FailureKind::Timeout, format!("no response within {}s", self.config.timeout))
        } else if is_tls_error(err) {
            FetchResult::failure(FailureKind::Tls, "certificate or handshake failure")
        } else if err.is_connect() {
            FetchResult::failure(FailureKind::Network, "connection failed")
        } else {
            FetchResult::failure(FailureKind::Network, root_cause(err))
        }
    }
}

/// Appends an encoded form to the URL's existing query.
fn with_query(url: &Url, form: &str) -> Url {
    let mut url = url.clone();
    let query = match url.query() {
        Some(existing) if !existing.is_empty() => format!("{}&{}", existing, form),
        _ => form.to_string(),
    };
    url.set_query(Some(&query));
    url
}

fn build_client(config: &FetchConfig, accept_invalid_certs: bool) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(config.timeout))
        .danger_accept_invalid_certs(accept_invalid_certs)
        .build()
        .map_err(FolioError::Http)
}

/// reqwest has no TLS predicate, so look for certificate wording in the source chain.
/// The top-level message is skipped since it embeds the request URL.
fn is_tls_error(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut source = err.source();
    while let Some(inner) = source {
        let message = inner.to_string().to_lowercase();
        if message.contains("certificate") || message.contains("tls") || message.contains("ssl") {
            return true;
        }
        source = inner.source();
    }
    false
}

/// Innermost error message, which is usually the most descriptive and shortest.
fn root_cause(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        message = inner.to_string();
        source = inner.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::fmt;
    use std::sync::Mutex;
    use wiremock::matchers::{body_string, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn quick_config() -> FetchConfig {
        FetchConfig { timeout: 2, retry_delay_ms: 10, ..Default::default() }
    }

    #[test]
    fn test_fetch_config_default() {
        let config = FetchConfig::default();
        assert_eq!(config.timeout, 10);
        assert_eq!(config.max_attempts, 3);
        assert!(config.accept_invalid_certs);
        assert!(!config.user_agents.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_url_is_not_sent() {
        let fetcher = Fetcher::new(quick_config()).unwrap();
        let result = fetcher.get("not-a-url").await;
        assert_eq!(result.failure_kind(), Some(FailureKind::InvalidUrl));
    }

    #[tokio::test]
    async fn test_success_decodes_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("<p>你好</p>".as_bytes(), "text/html; charset=utf-8"))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(quick_config()).unwrap();
        let result = fetcher.get(&format!("{}/page", server.uri())).await;
        assert_eq!(result, FetchResult::Success { text: "<p>你好</p>".to_string(), encoding: "UTF-8" });
    }

    #[tokio::test]
    async fn test_gbk_body_is_decoded() {
        let server = MockServer::start().await;
        let (body, _, _) = encoding_rs::GBK.encode("<div id=\"content\">第一章</div>");
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body.into_owned(), "text/html; charset=gbk"))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(quick_config()).unwrap();
        let text = fetcher.get(&server.uri()).await.into_result().unwrap();
        assert!(text.contains("第一章"));
    }

    #[tokio::test]
    async fn test_http_status_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(quick_config()).unwrap();
        let result = fetcher.get(&server.uri()).await;
        assert_eq!(result.failure_kind(), Some(FailureKind::HttpStatus(404)));
    }

    #[tokio::test]
    async fn test_timeout_is_retried_then_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .expect(2)
            .mount(&server)
            .await;

        let config = FetchConfig { timeout: 1, retry_delay_ms: 10, ..Default::default() };
        let fetcher = Fetcher::new(config).unwrap();
        let result = fetcher.fetch(&server.uri(), Method::Get, "", 2).await;
        assert_eq!(result.failure_kind(), Some(FailureKind::Timeout));

        let err = result.into_result().unwrap_err();
        assert!(err.to_string().starts_with("timed out"));
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let fetcher = Fetcher::new(quick_config()).unwrap();
        let result = fetcher.fetch(&format!("http://{}/", addr), Method::Get, "", 2).await;
        assert_eq!(result.failure_kind(), Some(FailureKind::Network));
    }

    #[tokio::test]
    async fn test_get_params_go_in_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("q", "剑来"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(quick_config()).unwrap();
        let url = format!("{}/search?page=1", server.uri());
        let result = fetcher.fetch(&url, Method::Get, "q=%E5%89%91%E6%9D%A5", 1).await;
        assert!(result.is_success());
    }

    #[tokio::test]
    async fn test_post_params_go_in_form() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search.php"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string("searchkey=%B2%E2%CA%D4&type=1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(quick_config()).unwrap();
        let form = "searchkey=%B2%E2%CA%D4&type=1";
        let result = fetcher.fetch(&format!("{}/search.php", server.uri()), Method::Post, form, 1).await;
        assert!(result.is_success());
    }

    /// Error with an optional cause, for building source chains.
    #[derive(Debug)]
    struct Chain {
        message: &'static str,
        source: Option<Box<Chain>>,
    }

    impl fmt::Display for Chain {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.message)
        }
    }

    impl std::error::Error for Chain {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            self.source.as_deref().map(|e| e as &(dyn std::error::Error + 'static))
        }
    }

    fn chain(messages: &[&'static str]) -> Chain {
        let (first, rest) = messages.split_first().unwrap();
        Chain { message: *first, source: (!rest.is_empty()).then(|| Box::new(chain(rest))) }
    }

    #[rstest]
    #[case(&["error sending request", "invalid peer certificate: UnknownIssuer"], true)]
    #[case(&["error sending request", "client error (Connect)", "TLS handshake eof"], true)]
    #[case(&["error sending request", "error:0A000086:SSL routines::certificate verify failed"], true)]
    #[case(&["error sending request", "client error (Connect)", "Connection refused (os error 111)"], false)]
    #[case(&["error sending request for url (https://ssl.example/tls/)"], false)]
    fn test_is_tls_error(#[case] messages: &[&'static str], #[case] expected: bool) {
        assert_eq!(is_tls_error(&chain(messages)), expected);
    }

    fn tls_failure() -> FetchResult {
        FetchResult::failure(FailureKind::Tls, "certificate or handshake failure")
    }

    fn ok() -> FetchResult {
        FetchResult::Success { text: "ok".to_string(), encoding: "UTF-8" }
    }

    #[tokio::test]
    async fn test_tls_failure_retries_once_without_validation() {
        let fetcher = Fetcher::new(FetchConfig { accept_invalid_certs: false, ..quick_config() }).unwrap();
        let url = Url::parse("https://expired.example/book/1/").unwrap();
        let calls = Mutex::new(Vec::new());

        let result = fetcher
            .with_retries(&url, 3, |insecure| {
                calls.lock().unwrap().push(insecure);
                async move { if insecure { ok() } else { tls_failure() } }
            })
            .await;

        assert!(result.is_success());
        assert_eq!(*calls.lock().unwrap(), vec![false, true]);
    }

    #[tokio::test]
    async fn test_tls_fallback_is_not_repeated() {
        let fetcher = Fetcher::new(FetchConfig { accept_invalid_certs: false, ..quick_config() }).unwrap();
        let url = Url::parse("https://broken.example/").unwrap();
        let calls = Mutex::new(Vec::new());

        let result = fetcher
            .with_retries(&url, 3, |insecure| {
                calls.lock().unwrap().push(insecure);
                async { tls_failure() }
            })
            .await;

        assert_eq!(result.failure_kind(), Some(FailureKind::Tls));
        assert_eq!(*calls.lock().unwrap(), vec![false, true]);
    }

    #[tokio::test]
    async fn test_tls_failure_without_validation_is_final() {
        let fetcher = Fetcher::new(quick_config()).unwrap();
        let url = Url::parse("https://broken.example/").unwrap();
        let calls = Mutex::new(Vec::new());

        let result = fetcher
            .with_retries(&url, 3, |insecure| {
                calls.lock().unwrap().push(insecure);
                async { tls_failure() }
            })
            .await;

        assert_eq!(result.failure_kind(), Some(FailureKind::Tls));
        assert_eq!(*calls.lock().unwrap(), vec![false]);
    }

    #[tokio::test]
    async fn test_transport_failures_use_every_attempt() {
        let fetcher = Fetcher::new(quick_config()).unwrap();
        let url = Url::parse("https://flaky.example/").unwrap();
        let calls = Mutex::new(0);

        let result = fetcher
            .with_retries(&url, 3, |_| {
                let mut n = calls.lock().unwrap();
                *n += 1;
                let n = *n;
                async move { if n < 3 { FetchResult::failure(FailureKind::Timeout, "slow") } else { ok() } }
            })
            .await;

        assert!(result.is_success());
        assert_eq!(*calls.lock().unwrap(), 3);
    }
}
