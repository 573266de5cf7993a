//! Outbound text shaping for chat platforms.

/// Split a message into chunks of at most `max_units` UTF-16 code units,
/// the unit Telegram measures message length in.
///
/// Prefers the last newline inside the limit so lines stay whole; a line
/// longer than the limit is cut at a character boundary. The newline a
/// split lands on is dropped.
pub fn split_message(text: &str, max_units: usize) -> Vec<String> {
    let max_units = max_units.max(1);
    let mut chunks = Vec::new();
    let mut remaining = text;

    loop {
        let Some(limit) = utf16_limit(remaining, max_units) else {
            if !remaining.is_empty() || chunks.is_empty() {
                chunks.push(remaining.to_string());
            }
            break;
        };

        let split_at = match remaining[..limit].rfind('\n') {
            Some(0) | None => limit,
            Some(nl) => nl,
        };

        let (chunk, rest) = remaining.split_at(split_at);
        chunks.push(chunk.to_string());
        remaining = rest.strip_prefix('\n').unwrap_or(rest);
    }

    chunks
}

/// Byte offset of the first character that would push `text` past
/// `max_units`, or `None` if it all fits. Always at least one character.
fn utf16_limit(text: &str, max_units: usize) -> Option<usize> {
    let mut units = 0;
    for (idx, c) in text.char_indices() {
        units += c.len_utf16();
        if units > max_units {
            return Some(if idx == 0 { c.len_utf8() } else { idx });
        }
    }
    None
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
