//! Byte-bounded splitting of serialized transcripts.

use crate::error::{Result, SessionsError};
use std::iter::FusedIterator;

/// Lazily split `text` into slices of at most `max_bytes` bytes.
///
/// Each cut lands after the last newline in the window, else after the last space,
/// else at the last char boundary that fits. A single character wider than the budget
/// is emitted on its own, over budget. Concatenating the chunks yields `text`.
pub fn chunk(text: &str, max_bytes: usize) -> Result<Chunks<'_>> {
    if max_bytes == 0 {
        return Err(SessionsError::ZeroChunkBudget);
    }
    Ok(Chunks {
        rest: text,
        max_bytes,
    })
}

#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    rest: &'a str,
    max_bytes: usize,
}

impl<'a> Chunks<'a> {
    fn cut_point(&self) -> usize {
        let rest = self.rest;
        if rest.len() <= self.max_bytes {
            return rest.len();
        }

        let mut end = self.max_bytes;
        while !rest.is_char_boundary(end) {
            end -= 1;
        }
        if end == 0 {
            return rest.chars().next().map_or(rest.len(), char::len_utf8);
        }

        let window = &rest[..end];
        window
            .rfind('\n')
            .or_else(|| window.rfind(' '))
            .map_or(end, |i| i + 1)
    }
}

impl<'a> Iterator for Chunks<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        if self.rest.is_empty() {
            return None;
        }
        let (head, tail) = self.rest.split_at(self.cut_point());
        self.rest = tail;
        Some(head)
    }
}

impl FusedIterator for Chunks<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(text: &str, max: usize) -> Vec<&str> {
        chunk(text, max).unwrap().collect()
    }

    #[test]
    fn zero_budget_rejected() {
        assert!(matches!(chunk("abc", 0), Err(SessionsError::ZeroChunkBudget)));
    }

    #[test]
    fn empty_text_has_no_chunks() {
        assert!(collect("", 10).is_empty());
    }

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(collect("hello", 10), ["hello"]);
        assert_eq!(collect("hello", 5), ["hello"]);
    }

    #[test]
    fn prefers_newline_then_space() {
        assert_eq!(collect("ab cd\nef gh", 8), ["ab cd\n", "ef gh"]);
        assert_eq!(collect("ab cd ef", 6), ["ab cd ", "ef"]);
        assert_eq!(collect("abcdefgh", 3), ["abc", "def", "gh"]);
    }

    #[test]
    fn never_splits_a_character() {
        let text = "héllo wörld ✓✓✓ naïve";
        for max in 1..12 {
            let chunks = collect(text, max);
            assert_eq!(chunks.concat(), text);
            for c in &chunks {
                assert!(c.len() <= max || c.chars().count() == 1, "{c:?} over {max}");
            }
        }
    }

    #[test]
    fn oversized_character_stands_alone() {
        assert_eq!(collect("a✓b", 2), ["a", "✓", "b"]);
    }

    #[test]
    fn round_trip_and_bounds_on_jsonl() {
        let mut text = String::new();
        for i in 0..200 {
            text.push_str(&format!(
                "{{\"role\":\"user\",\"content\":\"message number {i} with some words\"}}\n"
            ));
        }
        let chunks = collect(&text, 500);
        assert!(chunks.len() > 1);
        assert_eq!(chunks.concat(), text);
        assert!(chunks.iter().all(|c| c.len() <= 500));
        // Whole lines fit, so every chunk ends on a line break.
        assert!(chunks.iter().all(|c| c.ends_with('\n')));
    }

    #[test]
    fn fused_after_exhaustion() {
        let mut it = chunk("ab", 1).unwrap();
        assert_eq!(it.next(), Some("a"));
        assert_eq!(it.next(), Some("b"));
        assert_eq!(it.next(), None);
        assert_eq!(it.next(), None);
    }
}
