//! Table of contents resolution.
//!
//! A work's index page is scraped with the profile's chapter selector chain.
//! The first candidate that matches anything wins, even if a later
//! candidate would match more: sites often keep an old layout's markup
//! around, and the chain is ordered from most to least specific.

use tracing::debug;
use url::Url;

use crate::fetch::Fetcher;
use crate::model::ChapterDescriptor;
use crate::normalize::resolve_url;
use crate::parse::Document;
use crate::profile::SourceProfile;
use crate::{FolioError, Result};

/// Resolves chapter lists for one provider.
pub struct ChapterListResolver<'a> {
    profile: &'a SourceProfile,
    max_chapters: usize,
}

impl<'a> ChapterListResolver<'a> {
    pub fn new(profile: &'a SourceProfile, max_chapters: usize) -> Self {
        Self { profile, max_chapters }
    }

    /// Fetches `work_url` and parses its chapter list.
    ///
    /// Network and status failures are errors; a page with no recognizable
    /// chapter list is an empty `Vec`.
    pub async fn resolve(&self, fetcher: &Fetcher, work_url: &str) -> Result<Vec<ChapterDescriptor>> {
        let page = Url::parse(work_url).map_err(|e| FolioError::InvalidUrl(format!("{}: {}", work_url, e)))?;
        let html = fetcher.get(work_url).await.into_result()?;

        Ok(self.parse(&html, &page))
    }

    /// Parses a chapter list from an index page located at `page_url`.
    pub fn parse(&self, html: &str, page_url: &Url) -> Vec<ChapterDescriptor> {
        let doc = Document::parse(html);

        let Some((idx, elements)) = doc.select_first_matching(&self.profile.chapter_list_selectors) else {
            debug!(source = %self.profile.name, url = %page_url, "no chapter selector matched");
            return Vec::new();
        };

        debug!(
            source = %self.profile.name,
            selector = %self.profile.chapter_list_selectors[idx],
            matched = elements.len(),
            "chapter selector matched"
        );

        elements
            .iter()
            .filter_map(|el| {
                let href = el.attr("href")?.trim();
                if is_dead_link(href) {
                    return None;
                }
                Some((el.text(), resolve_url(href, page_url)))
            })
            .take(self.max_chapters)
            .enumerate()
            .map(|(ordinal, (title, url))| ChapterDescriptor { title, url, ordinal })
            .collect()
    }
}

/// Links that do not lead to a chapter page.
pub(crate) fn is_dead_link(href: &str) -> bool {
    href.is_empty() || href == "#" || href.to_ascii_lowercase().starts_with("javascript:")
}
