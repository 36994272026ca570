//! Small text helpers for previews and log output.

/// Collapse all whitespace runs (including newlines) into single spaces.
#[must_use]
pub fn single_line(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate to at most `max_chars` characters, appending `…` when cut.
///
/// Operates on characters, not bytes, so multi-byte input never splits.
#[must_use]
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_owned();
    }
    let mut out: String = s.chars().take(max_chars).collect();
    out.push('…');
    out
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn short_strings_pass_through() {
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("hello", 5), "hello");
    }

    #[test]
    fn long_strings_get_ellipsis() {
        assert_eq!(truncate_chars("hello world", 5), "hello…");
    }

    #[test]
    fn multibyte_input_splits_on_char_boundaries() {
        assert_eq!(truncate_chars("日本語のテスト", 3), "日本語…");
    }

    #[test]
    fn empty_string() {
        assert_eq!(truncate_chars("", 5), "");
    }

    #[test]
    fn single_line_flattens_whitespace() {
        assert_eq!(single_line("a\nb\t c \n\n d"), "a b c d");
        assert_eq!(single_line("  leading and trailing  "), "leading and trailing");
    }

    proptest! {
        #[test]
        fn truncate_never_exceeds_limit(s in ".*", max in 0usize..200) {
            let out = truncate_chars(&s, max);
            // The ellipsis itself may push the count one past the limit.
            prop_assert!(out.chars().count() <= max + 1);
        }

        #[test]
        fn truncate_is_identity_when_within_limit(s in ".{0,50}") {
            prop_assert_eq!(truncate_chars(&s, 50), s);
        }
    }
}
