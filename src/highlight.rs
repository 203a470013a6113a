use std::borrow::Cow;

use regex::{Regex, RegexBuilder};

/// Matches the whole query as a literal, the same way listing search matches it.
pub fn query_regex(query: &str) -> Option<Regex> {
    if query.is_empty() {
        return None;
    }
    RegexBuilder::new(&regex::escape(query))
        .case_insensitive(true)
        .build()
        .ok()
}

/// Wraps every hit of `regex` in `[` `]` for plain-text listings.
pub fn mark_matches<'a>(text: &'a str, regex: Option<&Regex>) -> Cow<'a, str> {
    match regex {
        Some(regex) => regex.replace_all(text, "[$0]"),
        None => Cow::Borrowed(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marks_hits_regardless_of_case() {
        let regex = query_regex("iphone").expect("regex");
        assert_eq!(
            mark_matches("iPhone 15 Pro Max 256GB", Some(&regex)),
            "[iPhone] 15 Pro Max 256GB"
        );
    }

    #[test]
    fn treats_query_as_literal() {
        let regex = query_regex("15 (pro)").expect("regex");
        assert_eq!(mark_matches("15 (Pro) max", Some(&regex)), "[15 (Pro)] max");
        assert_eq!(mark_matches("15 pro", Some(&regex)), "15 pro");
    }

    #[test]
    fn empty_query_leaves_text_alone() {
        assert!(query_regex("").is_none());
        assert_eq!(mark_matches("Camry", None), "Camry");
    }
}
