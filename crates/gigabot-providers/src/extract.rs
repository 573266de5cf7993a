//! Minimal JSON field extraction.
//!
//! Both GigaChat endpoints answer with JSON, but the bridge only ever needs a
//! single string out of each body (`access_token`, `content`). This module
//! finds a field by name anywhere in the document, without a full parse and
//! without caring about nesting.
//!
//! Only three escape sequences are decoded: `\n`, `\"` and `\\`. Anything
//! else (`\t`, `\u0041`, `\/`) is passed through verbatim.
//!
//! # Best-effort truncation
//!
//! If the value has no unescaped closing quote, the value runs to the end of
//! the input and [`Extracted::truncated`] is set. Callers treat that as a
//! success but should not trust the length.

/// A string value pulled out of a JSON body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Extracted {
    /// Decoded value.
    pub value: String,
    /// `true` when no closing quote was found and the value was cut at
    /// end of input.
    pub truncated: bool,
}

/// Find the first string value stored under `field`.
///
/// Occurrences of the key whose value is not a string (`null`, numbers,
/// objects) are skipped. Returns `None` when no string value exists.
pub fn extract_string_field(body: &str, field: &str) -> Option<Extracted> {
    let open = value_positions(body, field).find(|&pos| body[pos..].starts_with('"'))?;
    let start = open + 1;

    let (end, truncated) = match closing_quote(body.as_bytes(), start) {
        Some(end) => (end, false),
        None => (body.len(), true),
    };

    Some(Extracted {
        value: unescape(&body[start..end]),
        truncated,
    })
}

/// Find the first integer value stored under `field`.
pub fn extract_integer_field(body: &str, field: &str) -> Option<i64> {
    value_positions(body, field).find_map(|pos| {
        let rest = &body[pos..];
        let len = rest
            .char_indices()
            .take_while(|&(i, c)| c.is_ascii_digit() || (i == 0 && c == '-'))
            .count();
        rest[..len].parse().ok()
    })
}

/// Byte offsets of the values that follow `"field"` + `:`, in document order.
fn value_positions<'a>(body: &'a str, field: &str) -> impl Iterator<Item = usize> + 'a {
    let key = format!("\"{field}\"");
    let mut from = 0;

    std::iter::from_fn(move || {
        while let Some(found) = body[from..].find(&key) {
            let after_key = from + found + key.len();
            from = after_key;

            if let Some(value) = body[after_key..].trim_start().strip_prefix(':') {
                return Some(body.len() - value.trim_start().len());
            }
        }
        None
    })
}

/// Index of the first quote at or after `start` that is not escaped, i.e. not
/// preceded by an odd number of backslashes.
fn closing_quote(bytes: &[u8], start: usize) -> Option<usize> {
    let mut backslashes = 0usize;
    for (i, &b) in bytes.iter().enumerate().skip(start) {
        match b {
            b'\\' => backslashes += 1,
            b'"' if backslashes % 2 == 0 => return Some(i),
            _ => backslashes = 0,
        }
    }
    None
}

/// Single left-to-right pass, so `\\n` decodes to a backslash followed by `n`.
fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }

    out
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
