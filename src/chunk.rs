//! Overlapping character-window segmenter.
//!
//! Splits each page's text into [`Segment`]s of at most `size` characters.
//! Consecutive windows of the same page share exactly `overlap` characters,
//! and no window ever crosses a page boundary, so every segment carries a
//! single page number.
//!
//! # Algorithm
//!
//! 1. Start the first window at character 0 of the page.
//! 2. If the rest of the page fits in `size` characters, emit it and stop.
//! 3. Otherwise pick the window end by delimiter preference, searching
//!    backwards from `start + size`: paragraph break (`\n\n`), line break,
//!    sentence end (`.`/`?`/`!` followed by whitespace), then any whitespace.
//!    Only breaks in the back half of the window (and past the overlap) count.
//! 4. With no usable delimiter, cut hard at `start + size`.
//! 5. Start the next window `overlap` characters before the end just chosen.
//!
//! Offsets and lengths are counted in `char`s, not bytes.

use crate::models::{PageText, Segment};

/// Break predicates in order of preference. Each tests whether a window may
/// end at character position `p` (exclusive).
const BREAK_LEVELS: [fn(&[char], usize) -> bool; 4] =
    [paragraph_break, line_break, sentence_break, word_break];

fn paragraph_break(chars: &[char], p: usize) -> bool {
    p >= 2 && chars[p - 2] == '\n' && chars[p - 1] == '\n'
}

fn line_break(chars: &[char], p: usize) -> bool {
    p >= 1 && chars[p - 1] == '\n'
}

fn sentence_break(chars: &[char], p: usize) -> bool {
    p >= 2 && chars[p - 1].is_whitespace() && matches!(chars[p - 2], '.' | '?' | '!')
}

fn word_break(chars: &[char], p: usize) -> bool {
    p >= 1 && chars[p - 1].is_whitespace()
}

/// Split every page into windows, tagging each with its page number.
pub fn chunk_pages(
    pages: &[PageText],
    source_id: &str,
    size: usize,
    overlap: usize,
) -> Vec<Segment> {
    let mut segments = Vec::new();
    for page in pages {
        for (start_offset, text) in split_windows(&page.text, size, overlap) {
            segments.push(Segment {
                text,
                page_number: Some(page.number),
                source_id: source_id.to_string(),
                start_offset,
            });
        }
    }
    tracing::info!(
        "Split {} pages into {} segments",
        pages.len(),
        segments.len()
    );
    segments
}

/// Split one text into `(start_offset, window)` pairs.
///
/// Returns nothing for empty text or a zero `size`. An `overlap` that is not
/// smaller than `size` is clamped to `size - 1` so the windows always advance.
pub fn split_windows(text: &str, size: usize, overlap: usize) -> Vec<(usize, String)> {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    if len == 0 || size == 0 {
        return Vec::new();
    }
    let overlap = overlap.min(size - 1);

    let mut windows = Vec::new();
    let mut start = 0usize;
    loop {
        let hard_end = (start + size).min(len);
        let end = if hard_end == len {
            len
        } else {
            let min_end = (start + overlap + 1).max(start + size / 2);
            find_break(&chars, min_end, hard_end).unwrap_or(hard_end)
        };

        windows.push((start, chars[start..end].iter().collect()));
        if end == len {
            break;
        }
        start = end - overlap;
    }
    windows
}

/// Latest position in `min_end..=max_end` satisfying the most preferred
/// break level that has any match.
fn find_break(chars: &[char], min_end: usize, max_end: usize) -> Option<usize> {
    if min_end > max_end {
        return None;
    }
    BREAK_LEVELS
        .iter()
        .find_map(|is_break| (min_end..=max_end).rev().find(|&p| is_break(chars, p)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(number: u32, text: &str) -> PageText {
        PageText {
            number,
            text: text.to_string(),
        }
    }

    fn prose(chars: usize) -> String {
        let sentence = "The quick brown fox jumps over the lazy dog near the river bank. ";
        sentence.repeat(chars / sentence.len() + 1)[..chars].to_string()
    }

    #[test]
    fn smallest_session_window_keeps_configured_overlap() {
        use crate::config::{ChunkingConfig, MIN_SEGMENT_SIZE};

        let overlap = ChunkingConfig::default().overlap;
        let text = prose(3000);
        let windows = split_windows(&text, MIN_SEGMENT_SIZE, overlap);
        assert!(windows.len() >= 6);
        for pair in windows.windows(2) {
            let (prev_start, prev_text) = &pair[0];
            let prev_end = prev_start + prev_text.chars().count();
            assert_eq!(pair[1].0, prev_end - overlap);
        }
    }

    #[test]
    fn empty_input_produces_no_windows() {
        assert!(split_windows("", 1000, 150).is_empty());
        assert!(chunk_pages(&[], "book.pdf", 1000, 150).is_empty());
    }

    #[test]
    fn short_text_is_one_window() {
        let w = split_windows("Hello, world!", 1000, 150);
        assert_eq!(w, vec![(0, "Hello, world!".to_string())]);
    }

    #[test]
    fn windows_cover_text_with_exact_overlap() {
        let text = prose(4321);
        let windows = split_windows(&text, 1000, 150);
        assert!(windows.len() >= 5);

        assert_eq!(windows[0].0, 0);
        for pair in windows.windows(2) {
            let (prev_start, prev_text) = &pair[0];
            let (next_start, _) = &pair[1];
            let prev_end = prev_start + prev_text.chars().count();
            assert_eq!(*next_start, prev_end - 150, "overlap must be exact");
        }
        let (last_start, last_text) = windows.last().unwrap();
        assert_eq!(last_start + last_text.chars().count(), text.chars().count());

        // Re-assembling the non-overlapping parts reproduces the page.
        let mut rebuilt = String::new();
        for (i, (_, w)) in windows.iter().enumerate() {
            let skip = if i == 0 { 0 } else { 150 };
            rebuilt.extend(w.chars().skip(skip));
        }
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn windows_respect_size_and_end_on_whitespace() {
        let text = prose(3000);
        let windows = split_windows(&text, 1000, 150);
        for (_, w) in &windows[..windows.len() - 1] {
            assert!(w.chars().count() <= 1000);
            assert!(
                w.ends_with(char::is_whitespace),
                "window should not end mid-word: {:?}",
                &w[w.len() - 10..]
            );
        }
    }

    #[test]
    fn paragraph_break_preferred_over_word_break() {
        let first = "a".repeat(70);
        let text = format!("{}\n\n{} tail words here", first, "b ".repeat(40));
        let windows = split_windows(&text, 100, 10);
        assert!(windows[0].1.ends_with("\n\n"));
        assert_eq!(windows[0].1.chars().count(), 72);
    }

    #[test]
    fn unbroken_text_is_hard_cut() {
        let text = "x".repeat(250);
        let windows = split_windows(&text, 100, 20);
        assert_eq!(windows[0].1.len(), 100);
        assert_eq!(windows[1].0, 80);
    }

    #[test]
    fn multibyte_text_is_counted_in_chars() {
        let text = "héllo wörld ".repeat(30);
        let windows = split_windows(&text, 50, 5);
        for (_, w) in &windows {
            assert!(w.chars().count() <= 50);
        }
    }

    #[test]
    fn long_first_page_yields_multiple_windows_tagged_page_one() {
        let pages = vec![page(1, &prose(2500)), page(3, "Closing remarks.")];
        let segments = chunk_pages(&pages, "book.pdf", 1000, 150);

        let page_one: Vec<_> = segments
            .iter()
            .filter(|s| s.page_number == Some(1))
            .collect();
        assert!(page_one.len() >= 2);
        assert_eq!(segments.last().unwrap().page_number, Some(3));
        assert_eq!(segments.last().unwrap().text, "Closing remarks.");
        assert!(segments.iter().all(|s| s.source_id == "book.pdf"));
    }

    #[test]
    fn windows_never_span_pages() {
        let pages = vec![page(1, &prose(1200)), page(2, &prose(1200))];
        let segments = chunk_pages(&pages, "book.pdf", 1000, 150);
        for s in &segments {
            let source = &pages[(s.page_number.unwrap() - 1) as usize].text;
            let expected: String = source
                .chars()
                .skip(s.start_offset)
                .take(s.text.chars().count())
                .collect();
            assert_eq!(s.text, expected);
        }
    }
}
