//! Chapter body extraction and cleanup.
//!
//! [`ContentSanitizer`] locates the chapter container with the profile's
//! selector chain followed by generic fallbacks, then hands the raw text to
//! a [`CleaningPipeline`]:
//!
//! 1. Strip boilerplate. Each [`BoilerplateRule`] cuts from its match to the
//!    next whitespace ([`RuleScope::Line`]) or to the next whitespace or
//!    sentence break ([`RuleScope::Segment`]). Step 2 turns every whitespace
//!    run into a line break, so a cut never reaches past its own line.
//! 2. Collapse every whitespace run, full-width spaces included, into one newline.
//! 3. Collapse three or more newlines into one blank line.
//! 4. Trim.
//! 5. Split into paragraphs, trim each, rejoin with a blank line.
//!
//! Running the pipeline over its own output changes nothing.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::fetch::Fetcher;
use crate::parse::Document;
use crate::profile::SourceProfile;
use crate::{FolioError, Result};

/// Returned when a page was fetched but no readable text survived.
pub const CONTENT_UNAVAILABLE: &str = "Content unavailable: page layout may have changed";

/// Separator between paragraphs of cleaned text.
pub const PARAGRAPH_SEPARATOR: &str = "\n\n";

static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\s\u{3000}\u{00A0}]+").unwrap());
static BLANK_LINES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

/// How much text a boilerplate match removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleScope {
    /// From the match to the end of its line once whitespace is collapsed.
    Line,
    /// From the match to the next whitespace or sentence break.
    Segment,
}

/// One boilerplate pattern.
#[derive(Debug, Clone)]
pub struct BoilerplateRule {
    pattern: Regex,
    scope: RuleScope,
}

impl BoilerplateRule {
    pub fn new(pattern: &str, scope: RuleScope) -> Result<Self> {
        let pattern = Regex::new(pattern).map_err(|e| FolioError::ConfigError(format!("bad boilerplate rule: {}", e)))?;
        Ok(Self { pattern, scope })
    }

    /// Rule matching a literal string (e.g. a site name) to end of line.
    pub fn literal(text: &str) -> Result<Self> {
        Self::new(&regex::escape(text), RuleScope::Line)
    }

    pub fn scope(&self) -> RuleScope {
        self.scope
    }

    pub fn as_str(&self) -> &str {
        self.pattern.as_str()
    }

    fn apply(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut kept = 0;

        while let Some(m) = self.pattern.find_at(text, kept) {
            if m.is_empty() {
                break;
            }
            let end = match self.scope {
                RuleScope::Line => line_end(text, m.end()),
                RuleScope::Segment => segment_end(text, m.end()),
            };
            out.push_str(&text[kept..m.start()]);
            kept = end;
        }

        out.push_str(&text[kept..]);
        out
    }
}

/// Byte offset of the first whitespace at or after `from`.
///
/// Uses the same notion of whitespace as the collapse step, so full-width
/// spaces, non-breaking spaces and a lone `\r` all end the cut.
fn line_end(text: &str, from: usize) -> usize {
    text[from..].find(char::is_whitespace).map_or(text.len(), |idx| from + idx)
}

/// Byte offset of the first whitespace or sentence break at or after `from`.
fn segment_end(text: &str, from: usize) -> usize {
    text[from..]
        .char_indices()
        .find(|(_, c)| c.is_whitespace() || matches!(c, '。' | '！' | '？' | '，' | '、' | '）' | ')'))
        .map(|(idx, _)| from + idx)
        .unwrap_or(text.len())
}

/// (pattern, scope) pairs shared by every provider.
const DEFAULT_RULES: &[(&str, RuleScope)] = &[
    // bookmark prompts
    ("请收藏本站", RuleScope::Line),
    ("请记住本书首发域名", RuleScope::Line),
    ("一秒记住", RuleScope::Line),
    ("加入书签", RuleScope::Line),
    (r"(?i)bookmark (?:this|us)", RuleScope::Line),
    // raw URLs
    (r"(?i)https?://", RuleScope::Segment),
    (r"(?i)www\.[a-z0-9-]+\.[a-z]{2,}", RuleScope::Segment),
    // recommended reading
    ("推荐阅读", RuleScope::Line),
    (r"(?i)recommended reading", RuleScope::Line),
    // return to index
    ("返回目录", RuleScope::Line),
    ("返回书页", RuleScope::Line),
    (r"(?i)(?:back|return) to (?:index|contents|table of contents)", RuleScope::Line),
    // author notes
    ("作者有话[要想]?说", RuleScope::Line),
    (r"(?i)author'?s note", RuleScope::Line),
    // pagination prompts
    ("本章未完", RuleScope::Line),
    // mobile mirror notices
    ("手机(?:版|用户)", RuleScope::Line),
];

static DEFAULT_RULE_SET: LazyLock<Vec<BoilerplateRule>> = LazyLock::new(|| {
    DEFAULT_RULES
        .iter()
        .map(|(pattern, scope)| BoilerplateRule { pattern: Regex::new(pattern).unwrap(), scope: *scope })
        .collect()
});

/// The shared boilerplate rule table.
pub fn default_rules() -> Vec<BoilerplateRule> {
    DEFAULT_RULE_SET.clone()
}

/// Ordered text cleanup.
#[derive(Debug, Clone)]
pub struct CleaningPipeline {
    rules: Vec<BoilerplateRule>,
}

impl Default for CleaningPipeline {
    fn default() -> Self {
        Self { rules: default_rules() }
    }
}

impl CleaningPipeline {
    pub fn new(rules: Vec<BoilerplateRule>) -> Self {
        Self { rules }
    }

    /// Shared rules plus the profile's own name and boilerplate patterns.
    pub fn for_profile(profile: &SourceProfile) -> Result<Self> {
        let mut rules = default_rules();
        rules.push(BoilerplateRule::literal(&profile.name)?);
        for pattern in &profile.boilerplate {
            rules.push(BoilerplateRule::new(pattern, RuleScope::Line)?);
        }
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[BoilerplateRule] {
        &self.rules
    }

    /// Runs all five steps.
    pub fn clean(&self, raw: &str) -> String {
        let stripped = self.strip_boilerplate(raw);
        let collapsed = WHITESPACE_RUN.replace_all(&stripped, "\n");
        let collapsed = BLANK_LINES.replace_all(&collapsed, "\n\n");
        paragraphs(collapsed.trim())
    }

    fn strip_boilerplate(&self, text: &str) -> String {
        self.rules.iter().fold(text.to_string(), |acc, rule| rule.apply(&acc))
    }
}

fn paragraphs(text: &str) -> String {
    text.split('\n')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(PARAGRAPH_SEPARATOR)
}

/// What a chapter view shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChapterText {
    /// Cleaned chapter body.
    Text(String),
    /// The page loaded but no text survived extraction and cleanup.
    Unavailable,
    /// The page could not be fetched; carries a short reason.
    Failed(String),
}

impl ChapterText {
    pub fn is_text(&self) -> bool {
        matches!(self, ChapterText::Text(_))
    }

    pub fn into_string(self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ChapterText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChapterText::Text(text) => f.write_str(text),
            ChapterText::Unavailable => f.write_str(CONTENT_UNAVAILABLE),
            ChapterText::Failed(reason) => write!(f, "Failed to load chapter: {}", reason),
        }
    }
}

/// Extracts and cleans chapter bodies for one provider.
pub struct ContentSanitizer<'a> {
    profile: &'a SourceProfile,
    fallbacks: &'a [String],
    pipeline: &'a CleaningPipeline,
}

impl<'a> ContentSanitizer<'a> {
    pub fn new(profile: &'a SourceProfile, fallbacks: &'a [String], pipeline: &'a CleaningPipeline) -> Self {
        Self { profile, fallbacks, pipeline }
    }

    /// Raw text of the first candidate container with any text in it.
    pub fn extract(&self, doc: &Document) -> Option<String> {
        let candidates = self
            .profile
            .content_selectors
            .iter()
            .chain(self.fallbacks.iter().filter(|s| !self.profile.content_selectors.contains(*s)));

        for selector in candidates {
            let elements = match doc.select(selector) {
                Ok(elements) => elements,
                Err(e) => {
                    tracing::warn!(source = %self.profile.name, selector = %selector, error = %e, "skipping invalid selector");
                    continue;
                }
            };

            if let Some(text) = elements
                .iter()
                .map(|el| el.text_with_breaks())
                .find(|text| !text.trim().is_empty())
            {
                debug!(source = %self.profile.name, selector = %selector, "content container found");
                return Some(text);
            }
        }

        None
    }

    /// Extracts and cleans a chapter page that is already in hand.
    pub fn sanitize_html(&self, html: &str) -> ChapterText {
        let doc = Document::parse(html);
        let Some(raw) = self.extract(&doc) else {
            debug!(source = %self.profile.name, "no content container matched");
            return ChapterText::Unavailable;
        };

        let cleaned = self.pipeline.clean(&raw);
        if cleaned.is_empty() { ChapterText::Unavailable } else { ChapterText::Text(cleaned) }
    }

    /// Fetches `url` and returns its cleaned body or a placeholder.
    pub async fn fetch_and_clean(&self, fetcher: &Fetcher, url: &str) -> ChapterText {
        match fetcher.get(url).await.into_result() {
            Ok(html) => self.sanitize_html(&html),
            Err(e) => {
                tracing::warn!(source = %self.profile.name, url, error = %e, "chapter fetch failed");
                ChapterText::Failed(e.to_string())
            }
        }
    }
}
