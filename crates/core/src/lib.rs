//! Multi-source novel retrieval.
//!
//! Finds a work across a fixed set of providers, resolves its chapter list
//! and returns cleaned chapter text. Each provider is described as data by a
//! [`SourceProfile`]; the algorithms are shared.
//!
//! The usual entry point is [`Engine`].

pub mod chapters;
pub mod config;
pub mod encoding;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod model;
pub mod normalize;
pub mod parse;
pub mod profile;
pub mod sanitize;
pub mod search;

pub use chapters::ChapterListResolver;
pub use config::{EngineConfig, EngineConfigBuilder, FALLBACK_CONTENT_SELECTORS};
pub use engine::{Engine, SourceTarget};
pub use error::{FailureKind, FolioError, Result};
pub use fetch::{FetchConfig, FetchResult, Fetcher, Method};
pub use model::{ChapterDescriptor, UNKNOWN_AUTHOR, WorkResult};
pub use normalize::resolve_url;
pub use parse::Document;
pub use profile::{SearchMethod, SourceProfile, SourceProfileBuilder, SourceRegistry};
pub use sanitize::{BoilerplateRule, CONTENT_UNAVAILABLE, ChapterText, CleaningPipeline, ContentSanitizer, RuleScope};
pub use search::SearchAggregator;
