//! Character windows over long article bodies.

/// Split `text` into windows of `size` characters, each starting
/// `size - overlap` characters after the previous one. Text no longer than
/// `size` comes back as a single window. Counts are in `char`s, so
/// multi-byte text is never split inside a code point.
///
/// `overlap` is clamped below `size` so the window always advances.
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if size == 0 || chars.len() <= size {
        return vec![text.to_string()];
    }

    let step = size - overlap.min(size - 1);
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let end = (start + size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_single_chunk() {
        assert_eq!(chunk_text("short", 500, 50), vec!["short"]);
        assert_eq!(chunk_text("", 500, 50), vec![""]);
    }

    #[test]
    fn test_overlapping_windows() {
        let text: String = ('a'..='j').collect();
        let chunks = chunk_text(&text, 4, 1);
        assert_eq!(chunks, vec!["abcd", "defg", "ghij"]);
    }

    #[test]
    fn test_last_window_is_shorter() {
        let text: String = ('a'..='k').collect();
        let chunks = chunk_text(&text, 5, 2);
        assert_eq!(chunks, vec!["abcde", "defgh", "ghijk"]);

        let chunks = chunk_text("abcdefg", 3, 0);
        assert_eq!(chunks, vec!["abc", "def", "g"]);
    }

    #[test]
    fn test_multibyte_text() {
        let text = "अनुच्छेद इक्कीस जीवन का अधिकार";
        let chunks = chunk_text(text, 10, 2);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
        assert!(chunks[0].starts_with("अनु"));
    }

    #[test]
    fn test_overlap_is_clamped() {
        let chunks = chunk_text("abcdef", 3, 10);
        assert_eq!(chunks, vec!["abc", "bcd", "cde", "def"]);
    }
}
