//! Engine configuration.
//!
//! # Example
//!
//! ```rust
//! use folio_core::EngineConfig;
//!
//! let config = EngineConfig::builder()
//!     .max_results(10)
//!     .workers(2)
//!     .timeout(8)
//!     .build();
//! assert_eq!(config.max_results, 10);
//! ```

use crate::fetch::FetchConfig;

/// Container selectors tried after a profile's own content selectors.
///
/// These are the ids and classes most novel sites reuse for the chapter body.
pub const FALLBACK_CONTENT_SELECTORS: &[&str] = &[
    "#content",
    "#chaptercontent",
    "#chapter-content",
    "#booktxt",
    "#htmlContent",
    "#TextContent",
    "#nr1",
    ".content",
    ".read-content",
    ".chapter-content",
    ".txtnav",
    "article",
];

/// Tunables for search fan-out, list sizes and HTTP behavior.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Cap on merged search results (default: 20).
    pub max_results: usize,

    /// Cap on hits taken from each provider's listing (default: 8).
    pub max_items_per_source: usize,

    /// Cap on chapter list length (default: 100).
    pub max_chapters: usize,

    /// Concurrent provider searches (default: 4).
    pub workers: usize,

    /// Overall wait for a fan-out search in seconds (default: 30).
    ///
    /// Providers that have not answered by then are dropped and the
    /// results gathered so far are returned.
    pub search_budget: u64,

    /// Generic content selectors tried after the profile's own.
    pub fallback_content_selectors: Vec<String>,

    /// HTTP settings.
    pub fetch: FetchConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_results: 20,
            max_items_per_source: 8,
            max_chapters: 100,
            workers: 4,
            search_budget: 30,
            fallback_content_selectors: FALLBACK_CONTENT_SELECTORS.iter().map(|s| s.to_string()).collect(),
            fetch: FetchConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Creates a new builder for EngineConfig.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::new()
    }
}

/// Builder for EngineConfig.
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self { config: EngineConfig::default() }
    }

    /// Sets the merged result cap.
    pub fn max_results(mut self, value: usize) -> Self {
        self.config.max_results = value;
        self
    }

    /// Sets the per-provider hit cap.
    pub fn max_items_per_source(mut self, value: usize) -> Self {
        self.config.max_items_per_source = value;
        self
    }

    /// Sets the chapter list cap.
    pub fn max_chapters(mut self, value: usize) -> Self {
        self.config.max_chapters = value;
        self
    }

    /// Sets the number of concurrent provider searches. Zero is treated as one.
    pub fn workers(mut self, value: usize) -> Self {
        self.config.workers = value.max(1);
        self
    }

    /// Sets the overall search wait in seconds.
    pub fn search_budget(mut self, value: u64) -> Self {
        self.config.search_budget = value;
        self
    }

    /// Replaces the generic content selectors.
    pub fn fallback_content_selectors(mut self, value: Vec<String>) -> Self {
        self.config.fallback_content_selectors = value;
        self
    }

    /// Sets the per-request timeout in seconds.
    pub fn timeout(mut self, value: u64) -> Self {
        self.config.fetch.timeout = value;
        self
    }

    /// Sets the attempt count per request.
    pub fn max_attempts(mut self, value: usize) -> Self {
        self.config.fetch.max_attempts = value;
        self
    }

    /// Sets the delay between attempts in milliseconds.
    pub fn retry_delay_ms(mut self, value: u64) -> Self {
        self.config.fetch.retry_delay_ms = value;
        self
    }

    /// Replaces the whole HTTP configuration.
    pub fn fetch(mut self, value: FetchConfig) -> Self {
        self.config.fetch = value;
        self
    }

    /// Builds the config.
    pub fn build(self) -> EngineConfig {
        self.config
    }
}

impl Default for EngineConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
