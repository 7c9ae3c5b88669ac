use crate::natter::models::thread::DEFAULT_THREAD_NAME;

/// Display names are capped at this many characters.
pub const MAX_TITLE_CHARS: usize = 50;

/// Derive a thread display name from the first exchange.
///
/// Whitespace runs collapse to single spaces and the result is cut on a
/// character boundary, so multi-byte input never panics.
pub fn derive_title(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return DEFAULT_THREAD_NAME.to_string();
    }
    collapsed.chars().take(MAX_TITLE_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_unchanged() {
        assert_eq!(derive_title("Quarterly budget"), "Quarterly budget");
    }

    #[test]
    fn test_long_text_is_capped_at_fifty_chars() {
        let text = "a".repeat(80);
        let title = derive_title(&text);
        assert_eq!(title.chars().count(), MAX_TITLE_CHARS);
    }

    #[test]
    fn test_cap_respects_character_boundaries() {
        let text = "é".repeat(60);
        let title = derive_title(&text);
        assert_eq!(title.chars().count(), MAX_TITLE_CHARS);
    }

    #[test]
    fn test_whitespace_collapses() {
        assert_eq!(derive_title("  hello\n\n  world  "), "hello world");
    }

    #[test]
    fn test_empty_text_falls_back_to_default() {
        assert_eq!(derive_title("   "), DEFAULT_THREAD_NAME);
    }
}
