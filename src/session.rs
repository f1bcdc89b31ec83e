//! Last ambiguous match list, for follow-up `contact:N` references.

use crate::error::SelectionError;
use crate::resolver::MatchCandidate;
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct SelectionSession {
    matches: Mutex<Vec<MatchCandidate>>,
}

impl SelectionSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored match list.
    pub fn record_matches(&self, candidates: Vec<MatchCandidate>) {
        *self.matches.lock().unwrap_or_else(|p| p.into_inner()) = candidates;
    }

    pub fn len(&self) -> usize {
        self.matches.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 1-based pick from the stored list.
    pub fn select_by_index(&self, index: i64) -> Result<MatchCandidate, SelectionError> {
        let matches = self.matches.lock().unwrap_or_else(|p| p.into_inner());
        if matches.is_empty() {
            return Err(SelectionError::NoRecentMatches);
        }
        if index < 1 || index as usize > matches.len() {
            return Err(SelectionError::OutOfRange {
                index,
                len: matches.len(),
            });
        }
        Ok(matches[(index - 1) as usize].clone())
    }

    /// Parse the text after `contact:` and select it.
    pub fn select(&self, reference: &str) -> Result<MatchCandidate, SelectionError> {
        if self.is_empty() {
            return Err(SelectionError::NoRecentMatches);
        }
        let index = reference
            .trim()
            .parse::<i64>()
            .map_err(|e| SelectionError::Invalid(format!("'{}' is not a number ({})", reference.trim(), e)))?;
        self.select_by_index(index)
    }
}
