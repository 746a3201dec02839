//! Multi-provider search.
//!
//! [`SearchAggregator::search`] runs one task per provider on a bounded
//! pool. Each task writes only to its own slot; once every task has
//! settled (or the overall budget runs out) the slots are concatenated in
//! provider declaration order, deduplicated by normalized title and capped.
//! Completion order never affects the output.

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::chapters::is_dead_link;
use crate::config::EngineConfig;
use crate::fetch::{Fetcher, Method};
use crate::model::{UNKNOWN_AUTHOR, WorkResult};
use crate::normalize::resolve_url;
use crate::parse::{Document, Element};
use crate::profile::{SearchMethod, SourceProfile};
use crate::Result;

static AUTHOR_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*(?:作\s*者\s*[：:]?|author\s*[：:]|by\s+)\s*").unwrap());

/// Fans a query out across providers and merges the listings.
pub struct SearchAggregator<'a> {
    fetcher: &'a Fetcher,
    config: &'a EngineConfig,
}

impl<'a> SearchAggregator<'a> {
    pub fn new(fetcher: &'a Fetcher, config: &'a EngineConfig) -> Self {
        Self { fetcher, config }
    }

    /// Searches every profile in `profiles` and merges the results.
    ///
    /// A provider that fails contributes nothing. If the overall budget
    /// expires, unfinished providers are abandoned and whatever has arrived
    /// is merged.
    pub async fn search(&self, keyword: &str, profiles: &[Arc<SourceProfile>]) -> Vec<WorkResult> {
        let permits = Arc::new(Semaphore::new(self.config.workers.max(1)));
        let mut tasks = JoinSet::new();

        for (slot, profile) in profiles.iter().enumerate() {
            let fetcher = self.fetcher.clone();
            let profile = Arc::clone(profile);
            let permits = Arc::clone(&permits);
            let keyword = keyword.to_string();
            let max_items = self.config.max_items_per_source;

            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await.ok();
                let results = match search_source(&fetcher, &profile, &keyword, max_items).await {
                    Ok(results) => results,
                    Err(e) => {
                        warn!(source = %profile.name, error = %e, "provider search failed");
                        Vec::new()
                    }
                };
                (slot, results)
            });
        }

        let mut slots: Vec<Vec<WorkResult>> = vec![Vec::new(); profiles.len()];
        let deadline = tokio::time::Instant::now() + Duration::from_secs(self.config.search_budget);

        loop {
            match tokio::time::timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(Ok((slot, results)))) => slots[slot] = results,
                Ok(Some(Err(e))) => warn!(error = %e, "provider search task aborted"),
                Ok(None) => break,
                Err(_) => {
                    warn!(pending = tasks.len(), "search budget exhausted, using partial results");
                    tasks.abort_all();
                    break;
                }
            }
        }

        merge(slots, self.config.max_results)
    }
}

/// Searches a single provider.
pub async fn search_source(
    fetcher: &Fetcher, profile: &SourceProfile, keyword: &str, max_items: usize,
) -> Result<Vec<WorkResult>> {
    let url = profile.search_url_for(keyword);
    let form = profile.search_form_for(keyword);
    let method = match profile.search_method {
        SearchMethod::Get => Method::Get,
        SearchMethod::Post => Method::Post,
    };

    let html = fetcher
        .fetch(&url, method, &form, fetcher.config().max_attempts)
        .await
        .into_result()?;

    let results = parse_listing(&html, profile, max_items);
    debug!(source = %profile.name, hits = results.len(), "provider search parsed");
    Ok(results)
}

/// Extracts up to `max_items` hits from a provider's search page.
pub fn parse_listing(html: &str, profile: &SourceProfile, max_items: usize) -> Vec<WorkResult> {
    let doc = Document::parse(html);
    let items = match doc.select(&profile.search_item_selector) {
        Ok(items) => items,
        Err(e) => {
            warn!(source = %profile.name, error = %e, "invalid search item selector");
            return Vec::new();
        }
    };

    items
        .iter()
        .filter_map(|item| parse_item(item, profile))
        .take(max_items)
        .collect()
}

fn parse_item(item: &Element<'_>, profile: &SourceProfile) -> Option<WorkResult> {
    let title_el = item.select_one(&profile.title_selector).ok()??;
    let title = title_el.text();
    if title.is_empty() {
        return None;
    }

    let href = match &profile.link_selector {
        Some(selector) => item.select_one(selector).ok()?.and_then(|el| el.attr("href")),
        None => title_el
            .attr("href")
            .or_else(|| item.select_one("a[href]").ok().flatten().and_then(|el| el.attr("href"))),
    }?;
    let href = href.trim();
    if is_dead_link(href) {
        return None;
    }

    let author = profile
        .author_selector
        .as_deref()
        .and_then(|selector| item.select_one(selector).ok().flatten())
        .map(|el| clean_author(&el.text()))
        .filter(|author| !author.is_empty())
        .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());

    Some(WorkResult {
        title,
        author,
        url: resolve_url(href, &profile.base_url),
        source: profile.name.clone(),
    })
}

/// Removes a leading "作者：" / "Author:" / "by" label.
pub fn clean_author(raw: &str) -> String {
    AUTHOR_LABEL.replace(raw, "").trim().to_string()
}

/// Concatenates batches in order, keeps the first hit per normalized title, caps at `cap`.
pub fn merge<I>(batches: I, cap: usize) -> Vec<WorkResult>
where
    I: IntoIterator<Item = Vec<WorkResult>>,
{
    let mut seen = HashSet::new();
    let mut merged = Vec::new();

    for result in batches.into_iter().flatten() {
        if merged.len() >= cap {
            break;
        }
        if seen.insert(result.dedup_key()) {
            merged.push(result);
        }
    }

    merged
}
