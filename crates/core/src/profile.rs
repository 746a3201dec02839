//! Source profiles: the per-provider extraction rules.
//!
//! A [`SourceProfile`] describes one provider entirely as data: how to build
//! a search request, which selectors pick out listing fields, and the
//! ordered selector chains for chapter lists and chapter bodies. The engine
//! runs one algorithm over every profile, so adding a provider means adding
//! one entry to the [`SourceRegistry`].
//!
//! Profiles can be loaded from a JSON table:
//!
//! ```json
//! {
//!   "sources": [
//!     {
//!       "name": "example",
//!       "search_url": "https://books.example/search?q={keyword}",
//!       "base_url": "https://books.example",
//!       "search_item_selector": ".result",
//!       "title_selector": "h3 a",
//!       "author_selector": ".author",
//!       "chapter_list_selectors": ["#list dd a", ".chapters a"],
//!       "content_selectors": ["#content"]
//!     }
//!   ]
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use scraper::Selector;
use serde::Deserialize;
use url::Url;

use crate::{FolioError, Result};

/// Placeholder substituted with the (encoded) search keyword.
pub const KEYWORD_PLACEHOLDER: &str = "{keyword}";

/// HTTP method used for a provider's search request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMethod {
    #[default]
    Get,
    Post,
}

/// Static extraction rules for one provider.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SourceProfile {
    /// Unique name; also used as a self-referential boilerplate pattern.
    pub name: String,
    /// Search URL; `{keyword}` is replaced by the percent-encoded keyword.
    pub search_url: String,
    /// Base for resolving links found on search pages.
    pub base_url: Url,
    /// Selects one element per search hit.
    pub search_item_selector: String,
    /// Selects the title inside a search hit.
    pub title_selector: String,
    /// Selects the author inside a search hit.
    #[serde(default)]
    pub author_selector: Option<String>,
    /// Selects the link inside a search hit. Defaults to the title element.
    #[serde(default)]
    pub link_selector: Option<String>,
    /// Candidate selectors for the chapter list, tried in order.
    pub chapter_list_selectors: Vec<String>,
    /// Candidate selectors for the chapter body, tried in order.
    pub content_selectors: Vec<String>,
    #[serde(default)]
    pub search_method: SearchMethod,
    /// Extra query (GET) or form (POST) parameters; values may contain `{keyword}`.
    #[serde(default)]
    pub search_params: Vec<(String, String)>,
    /// Charset label the provider expects the keyword in (e.g. `gbk`).
    #[serde(default)]
    pub search_charset: Option<String>,
    /// Provider-specific boilerplate patterns (regexes), stripped to end of line.
    #[serde(default)]
    pub boilerplate: Vec<String>,
}

impl SourceProfile {
    /// Creates a builder for a profile with the given name and base URL.
    pub fn builder(name: impl Into<String>, base_url: Url) -> SourceProfileBuilder {
        SourceProfileBuilder::new(name, base_url)
    }

    /// Checks that every selector parses and that the chains are non-empty.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(FolioError::ConfigError("source name must not be empty".to_string()));
        }
        if self.search_url.trim().is_empty() {
            return Err(FolioError::ConfigError(format!("{}: search_url must not be empty", self.name)));
        }
        if self.chapter_list_selectors.is_empty() {
            return Err(FolioError::ConfigError(format!(
                "{}: chapter_list_selectors must not be empty",
                self.name
            )));
        }
        if self.content_selectors.is_empty() {
            return Err(FolioError::ConfigError(format!("{}: content_selectors must not be empty", self.name)));
        }

        let single = [
            Some(&self.search_item_selector),
            Some(&self.title_selector),
            self.author_selector.as_ref(),
            self.link_selector.as_ref(),
        ];
        let chains = self.chapter_list_selectors.iter().chain(&self.content_selectors);

        for selector in single.into_iter().flatten().chain(chains) {
            Selector::parse(selector)
                .map_err(|e| FolioError::InvalidSelector(format!("{}: {:?}: {}", self.name, selector, e)))?;
        }

        for pattern in &self.boilerplate {
            regex::Regex::new(pattern)
                .map_err(|e| FolioError::ConfigError(format!("{}: bad boilerplate pattern: {}", self.name, e)))?;
        }

        if let Some(label) = &self.search_charset
            && encoding_rs::Encoding::for_label(label.as_bytes()).is_none()
        {
            return Err(FolioError::ConfigError(format!("{}: unknown search_charset {}", self.name, label)));
        }

        Ok(())
    }

    /// Percent-encodes `keyword` in the provider's expected charset.
    pub fn encode_keyword(&self, keyword: &str) -> String {
        let encoding = self
            .search_charset
            .as_deref()
            .and_then(|label| encoding_rs::Encoding::for_label(label.as_bytes()))
            .unwrap_or(encoding_rs::UTF_8);
        let (bytes, _, _) = encoding.encode(keyword);

        url::form_urlencoded::byte_serialize(&bytes).collect()
    }

    /// The search URL for `keyword`.
    pub fn search_url_for(&self, keyword: &str) -> String {
        self.search_url.replace(KEYWORD_PLACEHOLDER, &self.encode_keyword(keyword))
    }

    /// `search_params` as an urlencoded form (`k=v&...`) with `{keyword}`
    /// substituted. Keys and values are encoded in `search_charset`, so the
    /// result goes on the wire as is: appended to the query for GET, as the
    /// body for POST. Empty when there are no parameters.
    pub fn search_form_for(&self, keyword: &str) -> String {
        self.search_params
            .iter()
            .map(|(k, v)| {
                let value = v.replace(KEYWORD_PLACEHOLDER, keyword);
                format!("{}={}", self.encode_keyword(k), self.encode_keyword(&value))
            })
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// Builder for [`SourceProfile`].
///
/// ```rust
/// use folio_core::SourceProfile;
/// use url::Url;
///
/// let profile = SourceProfile::builder("example", Url::parse("https://books.example").unwrap())
///     .search_url("https://books.example/search?q={keyword}")
///     .search_item_selector(".result")
///     .title_selector("h3 a")
///     .chapter_list_selector("#list dd a")
///     .content_selector("#content")
///     .build()
///     .unwrap();
/// assert_eq!(profile.name, "example");
/// ```
pub struct SourceProfileBuilder {
    profile: SourceProfile,
}

impl SourceProfileBuilder {
    /// Creates a builder with empty selectors.
    pub fn new(name: impl Into<String>, base_url: Url) -> Self {
        Self {
            profile: SourceProfile {
                name: name.into(),
                search_url: String::new(),
                base_url,
                search_item_selector: String::new(),
                title_selector: String::new(),
                author_selector: None,
                link_selector: None,
                chapter_list_selectors: Vec::new(),
                content_selectors: Vec::new(),
                search_method: SearchMethod::Get,
                search_params: Vec::new(),
                search_charset: None,
                boilerplate: Vec::new(),
            },
        }
    }

    pub fn search_url(mut self, value: impl Into<String>) -> Self {
        self.profile.search_url = value.into();
        self
    }

    pub fn search_item_selector(mut self, value: impl Into<String>) -> Self {
        self.profile.search_item_selector = value.into();
        self
    }

    pub fn title_selector(mut self, value: impl Into<String>) -> Self {
        self.profile.title_selector = value.into();
        self
    }

    pub fn author_selector(mut self, value: impl Into<String>) -> Self {
        self.profile.author_selector = Some(value.into());
        self
    }

    pub fn link_selector(mut self, value: impl Into<String>) -> Self {
        self.profile.link_selector = Some(value.into());
        self
    }

    /// Appends a chapter list candidate.
    pub fn chapter_list_selector(mut self, value: impl Into<String>) -> Self {
        self.profile.chapter_list_selectors.push(value.into());
        self
    }

    /// Appends a content candidate.
    pub fn content_selector(mut self, value: impl Into<String>) -> Self {
        self.profile.content_selectors.push(value.into());
        self
    }

    pub fn search_method(mut self, value: SearchMethod) -> Self {
        self.profile.search_method = value;
        self
    }

    pub fn search_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.profile.search_params.push((key.into(), value.into()));
        self
    }

    pub fn search_charset(mut self, value: impl Into<String>) -> Self {
        self.profile.search_charset = Some(value.into());
        self
    }

    pub fn boilerplate(mut self, pattern: impl Into<String>) -> Self {
        self.profile.boilerplate.push(pattern.into());
        self
    }

    /// Validates and returns the profile.
    pub fn build(self) -> Result<SourceProfile> {
        self.profile.validate()?;
        Ok(self.profile)
    }
}

#[derive(Deserialize)]
struct SourceTable {
    sources: Vec<SourceProfile>,
}

/// The fixed, ordered set of providers for a process.
///
/// Declaration order matters: search results are merged in this order.
#[derive(Debug, Clone)]
pub struct SourceRegistry {
    profiles: Vec<Arc<SourceProfile>>,
}

impl SourceRegistry {
    /// Builds a registry, validating each profile and rejecting duplicate names.
    pub fn new(profiles: Vec<SourceProfile>) -> Result<Self> {
        if profiles.is_empty() {
            return Err(FolioError::ConfigError("no sources configured".to_string()));
        }

        let mut seen: Vec<&str> = Vec::with_capacity(profiles.len());
        for profile in &profiles {
            profile.validate()?;
            if seen.contains(&profile.name.as_str()) {
                return Err(FolioError::ConfigError(format!("duplicate source name: {}", profile.name)));
            }
            seen.push(&profile.name);
        }

        Ok(Self { profiles: profiles.into_iter().map(Arc::new).collect() })
    }

    /// Parses a JSON source table.
    pub fn from_json(json: &str) -> Result<Self> {
        let table: SourceTable = serde_json::from_str(json)?;
        Self::new(table.sources)
    }

    /// Reads a JSON source table from disk.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(FolioError::ConfigError(format!("source table not found: {}", path.display())));
        }
        Self::from_json(&fs::read_to_string(path)?)
    }

    /// Loads `path` if given, else the user table if it exists, else the built-in table.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::from_file(path);
        }

        match Self::default_path() {
            Some(path) if path.exists() => {
                tracing::debug!(path = %path.display(), "loading user source table");
                Self::from_file(path)
            }
            _ => Ok(Self::builtin()),
        }
    }

    /// Default user table location (`<config dir>/folio/sources.json`).
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("folio").join("sources.json"))
    }

    /// The providers bundled with folio.
    pub fn builtin() -> Self {
        let profiles = vec![
            SourceProfile {
                name: "笔趣阁".to_string(),
                search_url: "https://www.biquge7.com/search?q={keyword}".to_string(),
                base_url: builtin_url("https://www.biquge7.com"),
                search_item_selector: ".bookinfo".to_string(),
                title_selector: "h4 a".to_string(),
                author_selector: Some(".author".to_string()),
                link_selector: Some("a".to_string()),
                chapter_list_selectors: vec![".listmain dd a".to_string(), "#list dd a".to_string()],
                content_selectors: vec!["#chaptercontent".to_string()],
                search_method: SearchMethod::Get,
                search_params: Vec::new(),
                search_charset: None,
                boilerplate: vec![r"请收藏本站".to_string()],
            },
            SourceProfile {
                name: "小说楼".to_string(),
                search_url: "https://www.xslou.com/modules/article/search.php?searchkey={keyword}".to_string(),
                base_url: builtin_url("https://www.xslou.com"),
                search_item_selector: ".grid tr".to_string(),
                title_selector: "td:nth-child(1) a".to_string(),
                author_selector: Some("td:nth-child(3)".to_string()),
                link_selector: None,
                chapter_list_selectors: vec![".zjlist dd a".to_string(), ".listmain dd a".to_string()],
                content_selectors: vec!["#content".to_string()],
                search_method: SearchMethod::Get,
                search_params: Vec::new(),
                search_charset: None,
                boilerplate: Vec::new(),
            },
        ];

        Self { profiles: profiles.into_iter().map(Arc::new).collect() }
    }

    /// Looks up a profile by name.
    pub fn get(&self, name: &str) -> Option<&Arc<SourceProfile>> {
        self.profiles.iter().find(|p| p.name == name)
    }

    /// Profiles in declaration order.
    pub fn profiles(&self) -> &[Arc<SourceProfile>] {
        &self.profiles
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.profiles.iter().map(|p| p.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

fn builtin_url(s: &str) -> Url {
    Url::parse(s).unwrap_or_else(|e| panic!("built-in base URL {s} is invalid: {e}"))
}
