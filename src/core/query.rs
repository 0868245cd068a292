//! The keyword mini-language used for both file names and file content.
//!
//! An expression is made of:
//! - `"exact phrase"`: must appear verbatim (case-insensitive),
//! - `+term`: required,
//! - `-term`: excluded,
//! - `a|b` or a bare `term`: at least one of these must appear.
//!
//! All matching is case-insensitive substring containment, so a short keyword
//! matches inside longer words.

use regex::Regex;
use std::sync::OnceLock;

fn phrase_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#""([^"]*)""#).expect("phrase pattern is valid"))
}

/// A parsed keyword expression. Terms are stored lower-cased.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pub phrases: Vec<String>,
    pub required: Vec<String>,
    pub excluded: Vec<String>,
    pub any_of: Vec<String>,
}

impl Query {
    pub fn parse(expression: &str) -> Self {
        let mut query = Query::default();

        let mut remainder = expression.to_string();
        for capture in phrase_pattern().captures_iter(expression) {
            let phrase = &capture[1];
            query.phrases.push(phrase.to_lowercase());
            remainder = remainder.replace(&capture[0], " ");
        }

        for token in remainder.split_whitespace() {
            if let Some(term) = token.strip_prefix('+') {
                push_term(&mut query.required, term);
            } else if let Some(term) = token.strip_prefix('-') {
                push_term(&mut query.excluded, term);
            } else if token.contains('|') {
                for piece in token.split('|') {
                    push_term(&mut query.any_of, piece);
                }
            } else {
                push_term(&mut query.any_of, token);
            }
        }

        query
    }

    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty()
            && self.required.is_empty()
            && self.excluded.is_empty()
            && self.any_of.is_empty()
    }

    pub fn matches(&self, text: &str) -> bool {
        if self.is_empty() {
            return true;
        }
        let haystack = text.to_lowercase();

        if !self.phrases.iter().all(|phrase| haystack.contains(phrase.as_str())) {
            return false;
        }
        if !self.required.iter().all(|term| haystack.contains(term.as_str())) {
            return false;
        }
        if self.excluded.iter().any(|term| haystack.contains(term.as_str())) {
            return false;
        }
        self.any_of.is_empty() || self.any_of.iter().any(|term| haystack.contains(term.as_str()))
    }
}

// A bare "+", "-" or an empty "|" piece carries no term and is ignored.
fn push_term(terms: &mut Vec<String>, term: &str) {
    if !term.is_empty() {
        terms.push(term.to_lowercase());
    }
}

/// One-shot form: parses `expression` and evaluates it against `text`.
pub fn matches(text: &str, expression: &str) -> bool {
    Query::parse(expression).matches(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_classifies_tokens() {
        let query = Query::parse(r#""annual report" +final -draft q1|q2 budget"#);
        assert_eq!(query.phrases, vec!["annual report"]);
        assert_eq!(query.required, vec!["final"]);
        assert_eq!(query.excluded, vec!["draft"]);
        assert_eq!(query.any_of, vec!["q1", "q2", "budget"]);
    }

    #[test]
    fn test_empty_expression_matches_everything() {
        assert!(matches("anything", ""));
        assert!(matches("", "   \t "));
    }

    #[test]
    fn test_required_and_excluded() {
        assert!(matches("Report_final.txt", "+report -draft"));
        assert!(!matches("report_draft.txt", "+report -draft"));
        assert!(!matches("summary.txt", "+report -draft"));
    }

    #[test]
    fn test_any_of_group() {
        assert!(matches("invoice_2024.pdf", "receipt|invoice"));
        assert!(!matches("contract.pdf", "receipt|invoice"));
        // Bare terms join the same group.
        assert!(matches("contract.pdf", "receipt contract"));
    }

    #[test]
    fn test_phrase_is_case_insensitive_and_removed_from_tokens() {
        assert!(matches("This is the FINAL Version.", r#""final version""#));
        assert!(!matches("final draft version", r#""final version""#));
        // The words inside the phrase must not leak into the any-of group.
        let query = Query::parse(r#""final version" +doc"#);
        assert!(query.any_of.is_empty());
    }

    #[test]
    fn test_substring_matches_inside_words() {
        assert!(matches("cartography.md", "art"));
    }

    #[test]
    fn test_lone_operators_are_ignored() {
        assert!(matches("abc", "- +"));
        assert!(matches("anything", "-"));
        assert!(Query::parse("- +").is_empty());
    }

    #[test]
    fn test_empty_pipe_pieces_are_dropped() {
        let query = Query::parse("abc||def|");
        assert_eq!(query.any_of, vec!["abc", "def"]);
        // An empty piece would be a substring of every text.
        assert!(matches("abc", "abc|"));
        assert!(!matches("xyz", "abc|"));
        assert!(!matches("xyz", "|abc"));
    }

    proptest! {
        #[test]
        fn prop_empty_expression_always_matches(text in ".*") {
            prop_assert!(matches(&text, ""));
        }

        #[test]
        fn prop_required_excluded(text in "[a-c ]{0,12}") {
            let lower = text.to_lowercase();
            let expected = lower.contains('a') && !lower.contains('b');
            prop_assert_eq!(matches(&text, "+a -b"), expected);
        }

        #[test]
        fn prop_or_group(text in "[a-dA-D ]{0,12}") {
            let lower = text.to_lowercase();
            let expected = lower.contains('a') || lower.contains('b');
            prop_assert_eq!(matches(&text, "a|b"), expected);
        }

        #[test]
        fn prop_phrase(prefix in "[a-z ]{0,8}", suffix in "[a-z ]{0,8}") {
            let text = format!("{prefix}exact phrase{suffix}");
            prop_assert!(matches(&text, "\"exact phrase\""));
            let other = format!("{prefix}{suffix}x");
            prop_assert!(!matches(&other, "\"exact phrase\"")
                || other.contains("exact phrase"));
        }
    }
}
