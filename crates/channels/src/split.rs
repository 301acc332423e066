//! Splitting long replies into transport-sized chunks.

/// Split `text` into chunks of at most `limit` characters.
///
/// Each cut prefers the last newline inside the window, then the last
/// space, and otherwise falls back to a hard cut at exactly `limit`.
/// Whitespace at the start of the following chunk is dropped. Every
/// iteration consumes at least one character, so this always terminates,
/// even on a long span with no whitespace at all.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let mut parts = Vec::new();
    let mut rest = text;

    loop {
        if rest.chars().count() <= limit {
            if !rest.is_empty() || parts.is_empty() {
                parts.push(rest.to_string());
            }
            break;
        }

        // Byte offset of the first character past the window.
        let window_end = rest
            .char_indices()
            .nth(limit)
            .map_or(rest.len(), |(i, _)| i);
        let window = &rest[..window_end];

        let split_at = window
            .rfind('\n')
            .filter(|&i| i > 0)
            .or_else(|| window.rfind(' ').filter(|&i| i > 0))
            .unwrap_or(window_end);

        parts.push(rest[..split_at].to_string());
        rest = rest[split_at..].trim_start();
    }

    parts
}
