//! Response body decoding.
//!
//! Many providers serve GBK or Big5 pages and a fair number of them
//! mislabel the charset or omit it entirely. Decoding order:
//!
//! 1. A byte order mark, if present.
//! 2. The declared charset (HTTP `Content-Type`, then a `<meta>` sniff). A
//!    declared windows-1252 / ISO-8859-1 is treated as a server default and
//!    replaced by UTF-8.
//! 3. The candidate list: declared, GB18030, Big5, UTF-8. The first strict
//!    decode that yields non-empty text is accepted.
//! 4. Lossy UTF-8.

use encoding_rs::{BIG5, Encoding, GB18030, UTF_8, WINDOWS_1252};
use regex::bytes::Regex;
use std::sync::LazyLock;

/// Bytes examined when sniffing `<meta charset>`.
const SNIFF_LIMIT: usize = 1024;

/// Region-specific charsets tried before the general-purpose default.
fn candidates() -> [&'static Encoding; 3] {
    [GB18030, BIG5, UTF_8]
}

static META_CHARSET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)<meta[^>]+charset\s*=\s*["']?\s*([a-zA-Z0-9_.:-]+)"#).unwrap());

/// A decoded body and the encoding that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub text: String,
    pub encoding: &'static Encoding,
}

/// Extracts the `charset` parameter of a `Content-Type` header value.
pub fn charset_from_content_type(content_type: &str) -> Option<&'static Encoding> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        if key.trim().eq_ignore_ascii_case("charset") {
            Encoding::for_label(value.trim().trim_matches('"').as_bytes())
        } else {
            None
        }
    })
}

/// Looks for a `<meta charset>` or `http-equiv` declaration near the top of the document.
pub fn sniff_meta_charset(body: &[u8]) -> Option<&'static Encoding> {
    let head = &body[..body.len().min(SNIFF_LIMIT)];
    let caps = META_CHARSET.captures(head)?;
    Encoding::for_label(caps.get(1)?.as_bytes())
}

/// Decodes `bytes` given the charset declared by the server, if any.
pub fn decode_body(bytes: &[u8], content_type: Option<&str>) -> Decoded {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        let (text, _) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
        return Decoded { text: text.into_owned(), encoding };
    }

    let declared = content_type
        .and_then(charset_from_content_type)
        .or_else(|| sniff_meta_charset(bytes));

    if declared == Some(WINDOWS_1252) {
        let (text, _) = UTF_8.decode_without_bom_handling(bytes);
        return Decoded { text: text.into_owned(), encoding: UTF_8 };
    }

    let mut tried: Vec<&'static Encoding> = Vec::with_capacity(4);
    for encoding in declared.into_iter().chain(candidates()) {
        if tried.contains(&encoding) {
            continue;
        }
        tried.push(encoding);

        if let Some(text) = encoding.decode_without_bom_handling_and_without_replacement(bytes)
            && !text.trim().is_empty()
        {
            return Decoded { text: text.into_owned(), encoding };
        }
    }

    let (text, _) = UTF_8.decode_without_bom_handling(bytes);
    Decoded { text: text.into_owned(), encoding: UTF_8 }
}
