//! Values returned by the engine.
//!
//! All of these are plain data: built once per call and never mutated by
//! the engine afterwards.

use serde::Serialize;

/// Author shown when a listing has no author field.
pub const UNKNOWN_AUTHOR: &str = "unknown";

/// One search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkResult {
    pub title: String,
    /// Author name, or [`UNKNOWN_AUTHOR`].
    pub author: String,
    /// Absolute URL of the work's index page.
    pub url: String,
    /// Name of the source profile that produced this hit.
    pub source: String,
}

impl WorkResult {
    /// Key used to collapse duplicate hits across sources.
    ///
    /// Titles that differ only in case or whitespace share a key.
    pub fn dedup_key(&self) -> String {
        normalize_title(&self.title)
    }
}

/// Lowercases a title and collapses its whitespace runs.
pub fn normalize_title(title: &str) -> String {
    title.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// One entry of a work's table of contents.
///
/// `ordinal` is the 0-based position in the scraped list. It is gap-free
/// within one list but only meaningful for the list it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChapterDescriptor {
    pub title: String,
    pub url: String,
    pub ordinal: usize,
}
