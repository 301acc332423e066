//! Character-budget truncation.
//!
//! Budgets are counted in characters, not tokens. At roughly 3.5 characters
//! per token this is an approximation; the config validator keeps a safety
//! margin against the backend's context window for that reason.

/// Pairs that end a sentence. The cut keeps the punctuation.
const SENTENCE_ENDS: [&str; 6] = [". ", ".\n", "! ", "!\n", "? ", "?\n"];

/// Fragments shorter than this are not worth placing in a prompt.
pub const MIN_FRAGMENT_CHARS: usize = 40;

/// Truncate `text` to at most `max_chars` characters.
///
/// Inside the window, a cut past the halfway mark is preferred at the last
/// sentence end, then at the last whitespace. With neither available the
/// text is cut at exactly `max_chars`.
pub fn truncate_at_boundary(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let window_end = text
        .char_indices()
        .nth(max_chars)
        .map_or(text.len(), |(i, _)| i);
    let window = &text[..window_end];
    let half = max_chars / 2;
    let past_half = |byte_pos: usize| window[..byte_pos].chars().count() > half;

    let sentence_cut = SENTENCE_ENDS
        .iter()
        .filter_map(|end| window.rfind(end))
        .filter(|&pos| past_half(pos))
        .max();
    if let Some(pos) = sentence_cut {
        // the punctuation mark is one byte
        return window[..pos + 1].to_string();
    }

    let space_cut = window
        .char_indices()
        .filter(|(_, c)| c.is_whitespace())
        .map(|(i, _)| i)
        .next_back()
        .filter(|&pos| past_half(pos));
    if let Some(pos) = space_cut {
        return window[..pos].to_string();
    }

    window.to_string()
}

/// Fit a source's items into its budget.
///
/// Each item is first capped at `item_chars`. Items are taken in order
/// until the budget runs out; the item that overflows is truncated to the
/// remaining room (when that room is worth using) and accumulation stops.
pub fn fit_items<'a, I>(items: I, item_chars: usize, budget_chars: usize) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut kept = Vec::new();
    let mut used = 0;

    for item in items {
        let capped = truncate_at_boundary(item, item_chars);
        let len = capped.chars().count();

        if used + len <= budget_chars {
            used += len;
            kept.push(capped);
            continue;
        }

        let room = budget_chars - used;
        if room >= MIN_FRAGMENT_CHARS {
            kept.push(truncate_at_boundary(&capped, room));
        }
        break;
    }

    kept
}
