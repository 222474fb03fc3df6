use serde::Serialize;
use std::fmt;

/// Classification of a row against the record store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOutcome {
    Added,
    Replaced,
    Skipped,
}

/// Tally of one import run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationStats {
    pub added: usize,
    pub replaced: usize,
    pub skipped: usize,
}

impl ReconciliationStats {
    pub fn record(&mut self, outcome: RowOutcome) {
        match outcome {
            RowOutcome::Added => self.added += 1,
            RowOutcome::Replaced => self.replaced += 1,
            RowOutcome::Skipped => self.skipped += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.added + self.replaced + self.skipped
    }
}

impl fmt::Display for ReconciliationStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} added, {} replaced, {} skipped",
            self.added, self.replaced, self.skipped
        )
    }
}
