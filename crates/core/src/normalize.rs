//! Link normalization.
//!
//! Provider pages mix absolute, protocol-relative, root-relative and
//! plain-relative links. [`resolve_url`] turns any of them into an absolute
//! URL so nothing downstream has to care which form a site uses.

use url::Url;

/// Resolves a possibly-relative link against `base`.
///
/// - A link that already carries a scheme is returned unchanged.
/// - A root-relative link (`/book/1/3.html`) is joined to base's scheme and host.
/// - Anything else replaces base's last path segment.
///
/// The result always starts with a scheme.
///
/// # Example
///
/// ```rust
/// use folio_core::resolve_url;
/// use url::Url;
///
/// let base = Url::parse("https://x.example/book/1/2.html").unwrap();
/// assert_eq!(resolve_url("/book/1/3.html", &base), "https://x.example/book/1/3.html");
/// assert_eq!(resolve_url("4.html", &base), "https://x.example/book/1/4.html");
/// ```
pub fn resolve_url(raw: &str, base: &Url) -> String {
    let raw = raw.trim();

    if has_scheme(raw) {
        return raw.to_string();
    }

    match base.join(raw) {
        Ok(joined) => joined.to_string(),
        Err(_) => fallback_join(raw, base),
    }
}

/// True if `raw` starts with `scheme:` per RFC 3986 (`ALPHA *( ALPHA / DIGIT / "+" / "-" / "." )`).
fn has_scheme(raw: &str) -> bool {
    let Some((scheme, _)) = raw.split_once(':') else {
        return false;
    };

    let mut chars = scheme.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {}
        _ => return false,
    }

    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// String-level join for links the URL parser rejects outright.
fn fallback_join(raw: &str, base: &Url) -> String {
    let origin = base.origin().ascii_serialization();

    if raw.starts_with('/') {
        return format!("{}{}", origin, raw);
    }

    let path = base.path();
    let dir = match path.rfind('/') {
        Some(idx) => &path[..=idx],
        None => "/",
    };

    format!("{}{}{}", origin, dir, raw)
}
