//! HTML parsing and selector queries.
//!
//! This module provides the [`Document`] and [`Element`] types used by the
//! search, chapter and content stages. They wrap `scraper` so the rest of the
//! crate speaks in selector strings and plain text.
//!
//! # Example
//!
//! ```rust
//! use folio_core::parse::Document;
//!
//! let html = r#"
//!     <html>
//!         <body>
//!             <dl class="listmain"><dd><a href="/1.html">第一章</a></dd></dl>
//!         </body>
//!     </html>
//! "#;
//!
//! let doc = Document::parse(html);
//! let links = doc.select(".listmain dd a").unwrap();
//! assert_eq!(links[0].attr("href"), Some("/1.html"));
//! ```

use scraper::{Html, Node, Selector};

use crate::{FolioError, Result};

/// Elements whose text never reaches the reader.
const SKIPPED_ELEMENTS: [&str; 4] = ["script", "style", "noscript", "template"];

/// Elements that start a new line when flattening to text.
const BLOCK_ELEMENTS: [&str; 14] = [
    "p", "div", "br", "li", "dd", "dt", "tr", "h1", "h2", "h3", "h4", "h5", "h6", "blockquote",
];

/// Parses a selector, mapping the error into [`FolioError::InvalidSelector`].
pub fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| FolioError::InvalidSelector(format!("{}: {}", selector, e)))
}

/// A parsed HTML document.
pub struct Document {
    html: Html,
}

impl Document {
    /// Parses HTML from a string. Parsing is lenient and never fails.
    pub fn parse(html: &str) -> Self {
        Self { html: Html::parse_document(html) }
    }

    /// Selects elements using a CSS selector.
    ///
    /// # Errors
    ///
    /// Returns [`FolioError::InvalidSelector`] if the selector is invalid.
    ///
    /// # Example
    ///
    /// ```rust
    /// use folio_core::parse::Document;
    ///
    /// let doc = Document::parse(r#"<p class="c">First</p><p class="c">Second</p>"#);
    /// assert_eq!(doc.select("p.c").unwrap().len(), 2);
    /// ```
    pub fn select(&'_ self, selector: &str) -> Result<Vec<Element<'_>>> {
        let sel = parse_selector(selector)?;
        Ok(self.html.select(&sel).map(|el| Element { element: el }).collect())
    }

    /// Tries each selector in order and returns the first one that matches
    /// at least one element, with its index in `candidates`.
    ///
    /// Invalid selectors count as "no match" so one bad candidate does not
    /// block the rest of the chain.
    pub fn select_first_matching<S: AsRef<str>>(&self, candidates: &[S]) -> Option<(usize, Vec<Element<'_>>)> {
        candidates.iter().enumerate().find_map(|(idx, candidate)| {
            let candidate = candidate.as_ref();
            match self.select(candidate) {
                Ok(elements) if !elements.is_empty() => Some((idx, elements)),
                Ok(_) => None,
                Err(e) => {
                    tracing::warn!(selector = candidate, error = %e, "skipping invalid selector");
                    None
                }
            }
        })
    }

    /// Gets the title of the document.
    pub fn title(&self) -> Option<String> {
        let selector = Selector::parse("title").ok()?;
        self.html
            .select(&selector)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
    }
}

/// A wrapper around scraper's ElementRef.
///
/// # Example
///
/// ```rust
/// use folio_core::parse::Document;
///
/// let doc = Document::parse(r#"<a href="/book/1/">Link text</a>"#);
/// let link = &doc.select("a").unwrap()[0];
///
/// assert_eq!(link.text(), "Link text");
/// assert_eq!(link.attr("href"), Some("/book/1/"));
/// ```
#[derive(Clone, Debug)]
pub struct Element<'a> {
    element: scraper::ElementRef<'a>,
}

impl<'a> Element<'a> {
    /// Concatenated text nodes, trimmed.
    pub fn text(&self) -> String {
        self.element.text().collect::<String>().trim().to_string()
    }

    /// Text with a line break before every block element and `<br>`.
    ///
    /// `scraper` concatenates text nodes without regard to markup, which
    /// glues paragraphs together. Chapter bodies are usually a run of text
    /// separated only by `<br>`, so those boundaries have to survive.
    /// Script and style contents are dropped.
    pub fn text_with_breaks(&self) -> String {
        let mut out = String::new();

        for node in self.element.descendants() {
            match node.value() {
                Node::Element(el) if BLOCK_ELEMENTS.contains(&el.name()) => out.push('\n'),
                Node::Text(text) => {
                    let hidden = node
                        .parent()
                        .and_then(|parent| parent.value().as_element().map(|el| SKIPPED_ELEMENTS.contains(&el.name())))
                        .unwrap_or(false);
                    if !hidden {
                        out.push_str(text);
                    }
                }
                _ => {}
            }
        }

        out
    }

    /// Gets the value of an attribute.
    pub fn attr(&self, name: &str) -> Option<&'a str> {
        self.element.value().attr(name)
    }

    /// Gets the lowercase tag name.
    pub fn tag_name(&self) -> String {
        self.element.value().name().to_lowercase()
    }

    /// Selects descendants using a CSS selector.
    ///
    /// # Errors
    ///
    /// Returns [`FolioError::InvalidSelector`] if the selector is invalid.
    pub fn select(&self, selector: &str) -> Result<Vec<Element<'a>>> {
        let sel = parse_selector(selector)?;
        Ok(self.element.select(&sel).map(|el| Element { element: el }).collect())
    }

    /// First descendant matching `selector`, if any.
    pub fn select_one(&self, selector: &str) -> Result<Option<Element<'a>>> {
        let sel = parse_selector(selector)?;
        Ok(self.element.select(&sel).next().map(|el| Element { element: el }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_HTML: &str = r#"
        <!DOCTYPE html>
        <html lang="zh">
        <head>
            <meta charset="UTF-8">
            <title> 目录 </title>
        </head>
        <body>
            <div class="listmain">
                <dl>
                    <dd><a href="/book/1/1.html">第一章</a></dd>
                    <dd><a href="/book/1/2.html">第二章</a></dd>
                </dl>
            </div>
            <div id="content">line one<br>line two<p>para</p><script>var ad = 1;</script></div>
        </body>
        </html>
    "#;

    #[test]
    fn test_parse_document() {
        let doc = Document::parse(SAMPLE_HTML);
        assert_eq!(doc.title(), Some("目录".to_string()));
    }

    #[test]
    fn test_select_elements() {
        let doc = Document::parse(SAMPLE_HTML);
        let elements = doc.select(".listmain dd a").unwrap();

        assert_eq!(elements.len(), 2);
        assert_eq!(elements[0].text(), "第一章");
        assert_eq!(elements[1].attr("href"), Some("/book/1/2.html"));
        assert_eq!(elements[1].tag_name(), "a");
    }

    #[test]
    fn test_invalid_selector() {
        let doc = Document::parse(SAMPLE_HTML);
        let result = doc.select("[[invalid");

        assert!(matches!(result, Err(FolioError::InvalidSelector(_))));
    }

    #[test]
    fn test_select_first_matching_skips_misses_and_invalid() {
        let doc = Document::parse(SAMPLE_HTML);
        let (idx, elements) = doc
            .select_first_matching(&["#missing a", "[[bad", ".listmain dd a", "a"])
            .unwrap();

        assert_eq!(idx, 2);
        assert_eq!(elements.len(), 2);
        assert!(doc.select_first_matching(&["#nope", ".nothing"]).is_none());
    }

    #[test]
    fn test_text_with_breaks() {
        let doc = Document::parse(SAMPLE_HTML);
        let content = &doc.select("#content").unwrap()[0];
        let text = content.text_with_breaks();

        assert!(text.contains("line one\nline two\npara"));
        assert!(!text.contains("var ad"));
    }

    #[test]
    fn test_select_one() {
        let doc = Document::parse(SAMPLE_HTML);
        let list = &doc.select(".listmain").unwrap()[0];

        assert_eq!(list.select_one("a").unwrap().unwrap().text(), "第一章");
        assert!(list.select_one("table").unwrap().is_none());
    }
}
