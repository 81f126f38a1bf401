//! Small text helpers shared by the pipelines.

/// Truncate to at most `max_chars` characters, never splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Normalized form used to deduplicate queries: trimmed, lowercased,
/// internal whitespace collapsed to single spaces.
pub fn normalize_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_cjk(c: char) -> bool {
    matches!(c as u32,
        0x4E00..=0x9FFF      // CJK Unified Ideographs
        | 0x3400..=0x4DBF    // Extension A
        | 0x20000..=0x2A6DF  // Extension B
        | 0xF900..=0xFAFF    // Compatibility Ideographs
        | 0x3040..=0x30FF    // Hiragana, Katakana
        | 0xAC00..=0xD7AF)   // Hangul syllables
}

/// Word count for mixed-script text: each CJK character counts as one word,
/// runs of other non-whitespace characters count as one word each. Runs made
/// only of `#` are Markdown heading markers and are not counted.
pub fn count_words(text: &str) -> usize {
    let mut count = 0;
    // Some(true) while inside a run that has only seen '#'
    let mut run: Option<bool> = None;
    for c in text.chars() {
        if is_cjk(c) || c.is_whitespace() {
            if run.take() == Some(false) {
                count += 1;
            }
            if is_cjk(c) {
                count += 1;
            }
        } else {
            let markup = run.unwrap_or(true) && c == '#';
            run = Some(markup);
        }
    }
    if run == Some(false) {
        count += 1;
    }
    count
}
