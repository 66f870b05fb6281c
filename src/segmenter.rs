use itertools::Itertools;

/// Longest segment, in characters, shown on the display screen at once
pub const MAX_SEGMENT_LEN: usize = 100;

/// Turn raw multi-line text into practice segments.
///
/// Blank lines are dropped. A line that fits in [`MAX_SEGMENT_LEN`] stays
/// whole; longer lines are greedily packed word by word, and a single word
/// that is itself too long is cut into fixed-size chunks.
pub fn build_segments(text: &str) -> Vec<String> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .flat_map(split_line)
        .collect()
}

fn split_line(line: &str) -> Vec<String> {
    if line.chars().count() <= MAX_SEGMENT_LEN {
        return vec![line.to_string()];
    }

    let mut segments = Vec::new();
    let mut pending = String::new();
    let mut pending_len = 0;

    for word in line.split(' ') {
        let word_len = word.chars().count();
        let candidate_len = if pending.is_empty() {
            word_len
        } else {
            pending_len + 1 + word_len
        };

        if candidate_len <= MAX_SEGMENT_LEN {
            if !pending.is_empty() {
                pending.push(' ');
            }
            pending.push_str(word);
            pending_len = candidate_len;
            continue;
        }

        if !pending.is_empty() {
            segments.push(std::mem::take(&mut pending));
        }

        if word_len > MAX_SEGMENT_LEN {
            segments.extend(hard_split(word));
            pending_len = 0;
        } else {
            pending.push_str(word);
            pending_len = word_len;
        }
    }

    if !pending.is_empty() {
        segments.push(pending);
    }

    segments
}

fn hard_split(word: &str) -> Vec<String> {
    word.chars()
        .chunks(MAX_SEGMENT_LEN)
        .into_iter()
        .map(|chunk| chunk.collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn non_space_chars(parts: &[String]) -> String {
        parts
            .iter()
            .flat_map(|s| s.chars())
            .filter(|c| !c.is_whitespace())
            .collect()
    }

    fn long_paragraph() -> String {
        let words = ["hello", "world", "this", "is", "a", "very", "long", "paragraph"];
        let mut text = String::new();
        let mut i = 0;
        while text.chars().count() < 600 {
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(words[i % words.len()]);
            i += 1;
        }
        text
    }

    #[test]
    fn short_lines_stay_whole() {
        let segments = build_segments("cat\ndog house");
        assert_eq!(segments, vec!["cat".to_string(), "dog house".to_string()]);
    }

    #[test]
    fn blank_lines_are_dropped() {
        let segments = build_segments("one\n\n   \n\ttwo\r\n\r\n");
        assert_eq!(segments, vec!["one".to_string(), "\ttwo".to_string()]);
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(build_segments("").is_empty());
        assert!(build_segments("\n\n").is_empty());
    }

    #[test]
    fn line_of_exactly_max_len_is_one_segment() {
        let line = "a".repeat(MAX_SEGMENT_LEN);
        assert_eq!(build_segments(&line), vec![line]);
    }

    #[test]
    fn long_paragraph_breaks_at_spaces() {
        let text = long_paragraph();
        let segments = build_segments(&text);

        assert!(segments.len() > 1);
        for segment in &segments {
            assert!(segment.chars().count() <= MAX_SEGMENT_LEN);
            assert!(!segment.starts_with(' '));
            assert!(!segment.ends_with(' '));
        }
        // joining with single spaces restores the paragraph exactly
        assert_eq!(segments.join(" "), text);
    }

    #[test]
    fn oversized_word_is_hard_chunked() {
        let giant = "x".repeat(250);
        let text = format!("before {} after", giant);
        let segments = build_segments(&text);

        assert_eq!(
            segments,
            vec![
                "before".to_string(),
                "x".repeat(100),
                "x".repeat(100),
                "x".repeat(50),
                "after".to_string(),
            ]
        );
    }

    #[test]
    fn chunking_counts_characters_not_bytes() {
        let word = "é".repeat(150);
        let segments = build_segments(&word);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].chars().count(), 100);
        assert_eq!(segments[1].chars().count(), 50);
    }

    #[test]
    fn never_exceeds_bound_and_preserves_characters() {
        let inputs = [
            long_paragraph(),
            format!("{}\n\n{}", "word ".repeat(70), "z".repeat(333)),
            format!("  lead {}  trail  ", "ab cd ".repeat(40)),
            "short\nlines\nonly".to_string(),
            format!("{} {}", "q".repeat(99), "r".repeat(101)),
        ];

        for input in &inputs {
            let segments = build_segments(input);
            for segment in &segments {
                assert!(segment.chars().count() <= MAX_SEGMENT_LEN, "{:?}", segment);
            }
            let expected: String = input
                .lines()
                .filter(|l| !l.trim().is_empty())
                .flat_map(|l| l.chars())
                .filter(|c| !c.is_whitespace())
                .collect();
            assert_eq!(non_space_chars(&segments), expected);
        }
    }

    #[test]
    fn is_deterministic() {
        let text = long_paragraph();
        assert_eq!(build_segments(&text), build_segments(&text));
    }
}
