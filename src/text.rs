//! Answer normalization for exact-match grading.

use unicode_normalization::UnicodeNormalization;

/// Canonicalize a typed answer before comparison: NFC composition, trimmed,
/// with internal whitespace runs collapsed to a single space.
///
/// Korean text in particular can arrive decomposed (NFD) from some input
/// methods while the stored expected text is composed; both sides go through
/// this before equality is checked.
pub fn normalize_answer(value: &str) -> String {
    let composed: String = value.nfc().collect();
    composed.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Exact-match correctness: normalized equality of answer and expected text.
pub fn answers_match(typed: &str, expected: &str) -> bool {
    normalize_answer(typed) == normalize_answer(expected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_surrounding_whitespace() {
        assert_eq!(normalize_answer("  bonjour  "), "bonjour");
    }

    #[test]
    fn collapses_internal_whitespace_runs() {
        assert_eq!(normalize_answer("안녕   하세요"), "안녕 하세요");
        assert_eq!(normalize_answer("a\t b\n c"), "a b c");
    }

    #[test]
    fn composes_decomposed_hangul() {
        // "한" typed as decomposed jamo (U+1112 U+1161 U+11AB) must equal the
        // precomposed syllable (U+D55C).
        let decomposed = "\u{1112}\u{1161}\u{11AB}";
        assert_eq!(normalize_answer(decomposed), "한");
        assert!(answers_match(decomposed, "한"));
    }

    #[test]
    fn composes_combining_accents() {
        // "é" as e + combining acute vs precomposed
        assert!(answers_match("caf\u{0065}\u{0301}", "café"));
    }

    #[test]
    fn empty_and_blank_normalize_to_empty() {
        assert_eq!(normalize_answer(""), "");
        assert_eq!(normalize_answer("   \t  "), "");
    }

    #[test]
    fn mismatch_is_detected() {
        assert!(!answers_match("annyeong", "안녕"));
        assert!(!answers_match("bonjour", "bon jour"));
    }

    #[test]
    fn case_is_significant() {
        assert!(!answers_match("Bonjour", "bonjour"));
    }
}
