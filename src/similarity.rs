//! Fuzzy name similarity.
//!
//! Scores a free-text query against contact names in three tiers, first
//! applicable tier wins:
//! 1. exact match of the cleaned, lowercased strings (or of one whole word of
//!    the candidate) scores 1.0
//! 2. the query is a substring of the candidate: `len(q) / len(c) * 0.9`,
//!    applied when it clears the threshold
//! 3. a general similarity ratio from the configured [`Similarity`] strategy
//!
//! Lengths are counted in chars, not bytes.

use crate::names::comparison_key;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Minimum score for a candidate to be returned.
pub const DEFAULT_THRESHOLD: f64 = 0.6;

/// Ceiling for substring matches, keeps them below an exact match.
pub const SUBSTRING_WEIGHT: f64 = 0.9;

/// General-purpose string similarity in `[0, 1]`.
pub trait Similarity: Send + Sync {
    fn ratio(&self, a: &str, b: &str) -> f64;
}

/// Ratcliff/Obershelp "gestalt" ratio: `2 * M / T` where `M` is the number of
/// chars in the recursively found longest matching blocks and `T` the total
/// length of both strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequenceRatio;

impl Similarity for SequenceRatio {
    fn ratio(&self, a: &str, b: &str) -> f64 {
        let a: Vec<char> = a.chars().collect();
        let b: Vec<char> = b.chars().collect();
        let total = a.len() + b.len();
        if total == 0 {
            return 1.0;
        }
        2.0 * matching_chars(&a, &b) as f64 / total as f64
    }
}

/// Jaro-Winkler similarity, favours shared prefixes.
#[derive(Debug, Clone, Copy, Default)]
pub struct JaroWinkler;

impl Similarity for JaroWinkler {
    fn ratio(&self, a: &str, b: &str) -> f64 {
        strsim::jaro_winkler(a, b)
    }
}

/// Which [`Similarity`] backs the last scoring tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    #[default]
    SequenceRatio,
    JaroWinkler,
}

impl Strategy {
    pub fn scorer(self, threshold: f64) -> Scorer {
        match self {
            Strategy::SequenceRatio => Scorer::with_strategy(Box::new(SequenceRatio), threshold),
            Strategy::JaroWinkler => Scorer::with_strategy(Box::new(JaroWinkler), threshold),
        }
    }
}

/// Longest common block of `a[alo..ahi]` and `b[blo..bhi]`.
///
/// Ties go to the block starting earliest in `a`, then earliest in `b`.
fn longest_match(
    a: &[char],
    b: &[char],
    (alo, ahi): (usize, usize),
    (blo, bhi): (usize, usize),
) -> (usize, usize, usize) {
    let (mut best_i, mut best_j, mut best_size) = (alo, blo, 0);
    // run lengths of matches ending at (i - 1, j) for the previous row
    let mut prev = vec![0usize; bhi - blo + 1];
    for i in alo..ahi {
        let mut row = vec![0usize; bhi - blo + 1];
        for j in blo..bhi {
            if a[i] != b[j] {
                continue;
            }
            let k = prev[j - blo] + 1;
            row[j - blo + 1] = k;
            if k > best_size {
                best_i = i + 1 - k;
                best_j = j + 1 - k;
                best_size = k;
            }
        }
        prev = row;
    }
    (best_i, best_j, best_size)
}

fn matching_chars(a: &[char], b: &[char]) -> usize {
    let mut matched = 0;
    let mut pending = vec![((0, a.len()), (0, b.len()))];
    while let Some(((alo, ahi), (blo, bhi))) = pending.pop() {
        let (i, j, k) = longest_match(a, b, (alo, ahi), (blo, bhi));
        if k == 0 {
            continue;
        }
        matched += k;
        if alo < i && blo < j {
            pending.push(((alo, i), (blo, j)));
        }
        if i + k < ahi && j + k < bhi {
            pending.push(((i + k, ahi), (j + k, bhi)));
        }
    }
    matched
}

/// Three-tier scorer with a pluggable general strategy.
pub struct Scorer {
    strategy: Box<dyn Similarity>,
    threshold: f64,
}

impl Default for Scorer {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

impl Scorer {
    pub fn new(threshold: f64) -> Self {
        Self::with_strategy(Box::new(SequenceRatio), threshold)
    }

    pub fn with_strategy(strategy: Box<dyn Similarity>, threshold: f64) -> Self {
        Self {
            strategy,
            threshold: threshold.clamp(0.0, 1.0),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Score `candidate` against `query`, in `[0, 1]`.
    pub fn score(&self, query: &str, candidate: &str) -> f64 {
        self.score_keys(&comparison_key(query), &comparison_key(candidate))
    }

    fn score_keys(&self, query: &str, candidate: &str) -> f64 {
        if query == candidate {
            return 1.0;
        }
        if query.is_empty() {
            return 0.0;
        }
        if candidate.split(' ').any(|word| word == query) {
            return 1.0;
        }
        if candidate.contains(query) {
            let score = query.chars().count() as f64 / candidate.chars().count() as f64
                * SUBSTRING_WEIGHT;
            if score >= self.threshold {
                return score;
            }
        }
        self.strategy.ratio(query, candidate).clamp(0.0, 1.0)
    }

    pub fn accepts(&self, score: f64) -> bool {
        score >= self.threshold
    }

    /// Score every `(name, value)` candidate, drop those under the threshold
    /// and sort by descending score. Equal scores keep their input order.
    pub fn rank<T: Clone>(&self, query: &str, candidates: &[(String, T)]) -> Vec<(String, T, f64)> {
        let query_key = comparison_key(query);
        let mut results: Vec<(String, T, f64)> = candidates
            .iter()
            .map(|(name, value)| {
                let score = self.score_keys(&query_key, &comparison_key(name));
                (name.clone(), value.clone(), score)
            })
            .filter(|(_, _, score)| self.accepts(*score))
            .collect();
        results.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(Ordering::Equal));
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_sequence_ratio_known_values() {
        let r = SequenceRatio;
        // difflib.SequenceMatcher(None, "abcd", "bcde").ratio() == 0.75
        assert!(close(r.ratio("abcd", "bcde"), 0.75));
        assert!(close(r.ratio("", ""), 1.0));
        assert!(close(r.ratio("abc", ""), 0.0));
        assert!(close(r.ratio("abc", "xyz"), 0.0));
        // "john smiht" vs "john smith": blocks "john smi" + "h" (or "t")
        assert!(close(r.ratio("john smiht", "john smith"), 0.9));
    }

    #[test]
    fn test_sequence_ratio_recurses_on_both_sides() {
        // blocks: "bcde" then "a" on the left -> 5 matched of 5 + 6 chars
        let r = SequenceRatio;
        assert!(close(r.ratio("abcde", "axbcde"), 10.0 / 11.0));
    }

    #[test]
    fn test_exact_match_scores_one() {
        let scorer = Scorer::default();
        assert!(close(scorer.score("John Smith", "john smith"), 1.0));
        assert!(close(scorer.score("Dylan 🏄", "DYLAN"), 1.0));
        for q in ["a", "Zoë", "Mary-Jane", "x y z"] {
            assert!(close(scorer.score(q, q), 1.0), "self score for {q}");
        }
    }

    #[test]
    fn test_whole_word_scores_one() {
        let scorer = Scorer::default();
        assert!(close(scorer.score("dylan", "Dylan Westhimer"), 1.0));
        assert!(close(scorer.score("westhimer", "Dylan Westhimer"), 1.0));
    }

    #[test]
    fn test_substring_tier() {
        let scorer = Scorer::default();
        assert!(close(scorer.score("John Smit", "John Smith"), 9.0 / 10.0 * 0.9));
        assert!(close(scorer.score("John Smit", "John Smithe"), 9.0 / 11.0 * 0.9));
    }

    #[test]
    fn test_weak_substring_falls_back_to_ratio() {
        let scorer = Scorer::default();
        // substring 7/15 * 0.9 = 0.42 is under threshold, ratio is 14/22
        assert!(close(scorer.score("dylan w", "Dylan Westhimer"), 14.0 / 22.0));
    }

    #[test]
    fn test_scores_stay_in_unit_interval() {
        let scorer = Scorer::default();
        let words = ["", "a", "ann", "anna", "Anna Bell", "🎉", "bob", "Annabelle Smith"];
        for q in words {
            for c in words {
                let s = scorer.score(q, c);
                assert!((0.0..=1.0).contains(&s), "score({q:?}, {c:?}) = {s}");
            }
        }
    }

    #[test]
    fn test_rank_sorted_and_thresholded() {
        let scorer = Scorer::default();
        let candidates = vec![
            ("John Smithe".to_string(), 1),
            ("Alice Jones".to_string(), 2),
            ("John Smith".to_string(), 3),
        ];
        let ranked = scorer.rank("John Smit", &candidates);
        let names: Vec<&str> = ranked.iter().map(|(n, _, _)| n.as_str()).collect();
        assert_eq!(names, vec!["John Smith", "John Smithe"]);
        assert!(ranked.windows(2).all(|w| w[0].2 >= w[1].2));
        assert!(ranked.iter().all(|(_, _, s)| *s >= DEFAULT_THRESHOLD));
    }

    #[test]
    fn test_rank_ties_keep_input_order() {
        let scorer = Scorer::default();
        let candidates = vec![
            ("Sam Lee".to_string(), "first"),
            ("Sam Lee".to_string(), "second"),
        ];
        let ranked = scorer.rank("sam lee", &candidates);
        assert_eq!(ranked[0].1, "first");
        assert_eq!(ranked[1].1, "second");
    }

    #[test]
    fn test_jaro_winkler_strategy() {
        let scorer = Strategy::JaroWinkler.scorer(0.8);
        assert!(close(scorer.score("jon", "jon"), 1.0));
        assert!(scorer.score("jonathan", "jonathon") > 0.9);
        assert!(scorer.score("zed", "alice") < 0.8);
    }
}
