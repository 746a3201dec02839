//! The public retrieval API.
//!
//! [`Engine`] bundles the source table, an HTTP client and configuration.
//! It holds no per-session state: callers pass the work URL and source name
//! they got back from [`Engine::search`] into the later calls unchanged.
//!
//! # Example
//!
//! ```rust,no_run
//! use folio_core::{Engine, EngineConfig, SourceRegistry, SourceTarget};
//!
//! # #[tokio::main]
//! # async fn main() -> folio_core::Result<()> {
//! let engine = Engine::new(SourceRegistry::builtin(), EngineConfig::default())?;
//!
//! let works = engine.search("剑来", &SourceTarget::All).await?;
//! if let Some(work) = works.first() {
//!     let chapters = engine.resolve_chapters(&work.url, &work.source).await?;
//!     if let Some(chapter) = chapters.first() {
//!         println!("{}", engine.fetch_chapter_text(&chapter.url, &work.source).await?);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use crate::chapters::ChapterListResolver;
use crate::config::EngineConfig;
use crate::fetch::Fetcher;
use crate::model::{ChapterDescriptor, WorkResult};
use crate::profile::{SourceProfile, SourceRegistry};
use crate::sanitize::{ChapterText, CleaningPipeline, ContentSanitizer};
use crate::search::SearchAggregator;
use crate::{FolioError, Result};

/// Which providers a search should query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceTarget {
    All,
    Named(String),
}

impl SourceTarget {
    /// `None` or `"all"` means every provider.
    pub fn from_option(name: Option<&str>) -> Self {
        match name {
            None => SourceTarget::All,
            Some(name) if name.eq_ignore_ascii_case("all") => SourceTarget::All,
            Some(name) => SourceTarget::Named(name.to_string()),
        }
    }
}

/// Stateless retrieval engine over a fixed source table.
#[derive(Debug, Clone)]
pub struct Engine {
    registry: SourceRegistry,
    pipelines: HashMap<String, CleaningPipeline>,
    fetcher: Fetcher,
    config: EngineConfig,
}

impl Engine {
    /// Builds the HTTP client and per-source cleaning pipelines.
    pub fn new(registry: SourceRegistry, config: EngineConfig) -> Result<Self> {
        let fetcher = Fetcher::new(config.fetch.clone())?;

        let pipelines = registry
            .profiles()
            .iter()
            .map(|profile| Ok((profile.name.clone(), CleaningPipeline::for_profile(profile)?)))
            .collect::<Result<HashMap<_, _>>>()?;

        Ok(Self { registry, pipelines, fetcher, config })
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Searches one provider or all of them.
    ///
    /// Provider failures are swallowed; an unknown provider name is an error.
    pub async fn search(&self, keyword: &str, target: &SourceTarget) -> Result<Vec<WorkResult>> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Ok(Vec::new());
        }

        let aggregator = SearchAggregator::new(&self.fetcher, &self.config);
        match target {
            SourceTarget::All => Ok(aggregator.search(keyword, self.registry.profiles()).await),
            SourceTarget::Named(name) => {
                let profile = Arc::clone(self.profile(name)?);
                Ok(aggregator.search(keyword, &[profile]).await)
            }
        }
    }

    /// Fetches a work's index page and returns its chapter list.
    pub async fn resolve_chapters(&self, work_url: &str, source: &str) -> Result<Vec<ChapterDescriptor>> {
        let profile = self.profile(source)?;
        ChapterListResolver::new(profile, self.config.max_chapters)
            .resolve(&self.fetcher, work_url)
            .await
    }

    /// Fetches and cleans one chapter.
    ///
    /// Fetch problems come back as [`ChapterText::Failed`] and empty pages as
    /// [`ChapterText::Unavailable`]; only an unknown source is an error.
    pub async fn fetch_chapter(&self, chapter_url: &str, source: &str) -> Result<ChapterText> {
        let profile = self.profile(source)?;
        let pipeline = self.pipeline(source)?;

        let sanitizer = ContentSanitizer::new(profile, &self.config.fallback_content_selectors, pipeline);
        Ok(sanitizer.fetch_and_clean(&self.fetcher, chapter_url).await)
    }

    /// Like [`Engine::fetch_chapter`] but flattened to display text.
    pub async fn fetch_chapter_text(&self, chapter_url: &str, source: &str) -> Result<String> {
        Ok(self.fetch_chapter(chapter_url, source).await?.into_string())
    }

    fn profile(&self, name: &str) -> Result<&Arc<SourceProfile>> {
        self.registry
            .get(name)
            .ok_or_else(|| FolioError::UnknownSource(name.to_string()))
    }

    fn pipeline(&self, name: &str) -> Result<&CleaningPipeline> {
        self.pipelines
            .get(name)
            .ok_or_else(|| FolioError::UnknownSource(name.to_string()))
    }
}
