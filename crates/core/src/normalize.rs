//! Text canonicalization for now-playing strings
//!
//! Media tools hand us titles in all sorts of shapes: literal `\u010C` escapes,
//! decomposed accents, raw bytes. Everything that reaches the cache or the
//! display goes through [`normalize`] first. [`strip_diacritics`] is a search
//! aid only and must never be used for display.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::borrow::Cow;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Literal escape sequences: `\uXXXX` (optionally a surrogate pair) or `\UXXXXXXXX`.
static ESCAPED_CODEPOINT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\\u([dD][89abAB][0-9a-fA-F]{2})\\u([dD][c-fC-F][0-9a-fA-F]{2})|\\u([0-9a-fA-F]{4})|\\U([0-9a-fA-F]{8})")
        .expect("escape pattern is valid")
});

/// Normalize optional text; `None` stays `None`.
pub fn normalize(text: Option<&str>) -> Option<String> {
    text.map(normalize_text)
}

/// Decode embedded escape sequences and apply NFC composition.
///
/// Total and idempotent: `normalize_text(&normalize_text(x)) == normalize_text(x)`.
pub fn normalize_text(text: &str) -> String {
    let mut decoded = text.to_string();

    // An escape can decode into another escape (`\u0041`), so run to a fixpoint.
    // Every successful pass shortens the string, which bounds the loop.
    loop {
        let next = match decode_escapes(&decoded) {
            Cow::Borrowed(_) => None,
            Cow::Owned(next) => Some(next),
        };
        match next {
            Some(next) => decoded = next,
            None => break,
        }
    }

    decoded.nfc().collect()
}

/// Decompose and drop combining marks: `"Č"` becomes `"C"`.
pub fn strip_diacritics(text: &str) -> String {
    text.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

/// True if any character carries a combining mark once decomposed.
pub fn has_diacritics(text: &str) -> bool {
    text.nfd().any(is_combining_mark)
}

fn decode_escapes(text: &str) -> Cow<'_, str> {
    if !text.contains('\\') {
        return Cow::Borrowed(text);
    }

    let mut changed = false;
    let replaced = ESCAPED_CODEPOINT.replace_all(text, |caps: &Captures| {
        let decoded = if let (Some(high), Some(low)) = (caps.get(1), caps.get(2)) {
            decode_surrogate_pair(high.as_str(), low.as_str())
        } else {
            caps.get(3)
                .or_else(|| caps.get(4))
                .and_then(|hex| u32::from_str_radix(hex.as_str(), 16).ok())
                .and_then(char::from_u32)
        };

        match decoded {
            Some(c) => {
                changed = true;
                c.to_string()
            }
            // Lone surrogates and out-of-range values are kept verbatim
            None => caps[0].to_string(),
        }
    });

    if changed {
        Cow::Owned(replaced.into_owned())
    } else {
        Cow::Borrowed(text)
    }
}

fn decode_surrogate_pair(high: &str, low: &str) -> Option<char> {
    let high = u32::from_str_radix(high, 16).ok()?;
    let low = u32::from_str_radix(low, 16).ok()?;
    char::from_u32(0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00))
}
