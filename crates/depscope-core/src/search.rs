//! Fuzzy filtering of unit paths

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use std::cmp::Reverse;

/// Keep entries whose path fuzzy-matches `term`, best match first.
///
/// An empty (or whitespace) term keeps everything in the original order.
pub fn search_units<T: AsRef<str> + Clone>(entries: &[T], term: &str) -> Vec<T> {
    let term = term.trim();
    if term.is_empty() {
        return entries.to_vec();
    }

    let matcher = SkimMatcherV2::default();
    let mut scored: Vec<(&T, i64)> = entries
        .iter()
        .filter_map(|entry| match matcher.fuzzy_match(entry.as_ref(), term) {
            Some(score) if score > 0 => Some((entry, score)),
            _ => None,
        })
        .collect();

    scored.sort_by_key(|(_, score)| Reverse(*score));
    scored.into_iter().map(|(entry, _)| entry.clone()).collect()
}
