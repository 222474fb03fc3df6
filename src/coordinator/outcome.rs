//! Results of coordinated mutations.

use crate::assets::{AssetError, AssetKind};
use crate::record_store::{RecordKey, StoreError};
use std::fmt;
use thiserror::Error;
use tracing::warn;

/// Failures that abort a mutation.
#[derive(Debug, Error)]
pub enum MutationError {
    #[error("Invalid record: {0}")]
    Validation(String),

    #[error("Record store error: {0}")]
    Store(#[from] StoreError),

    #[error("Asset error: {0}")]
    Asset(#[from] AssetError),
}

/// A derived store that did not follow a successful write.
///
/// The record store stays authoritative; a reindex or a retried mutation
/// repairs every variant.
#[derive(Debug, Clone, PartialEq)]
pub enum Degradation {
    /// The search document for `key` does not reflect the record store.
    IndexStale { key: RecordKey, reason: String },
    /// The search index could not be cleared after a bulk delete.
    IndexNotCleared { reason: String },
    /// Asset files of `kind` owned by `key` were left on disk.
    AssetNotRemoved {
        kind: AssetKind,
        key: RecordKey,
        reason: String,
    },
    /// The previous entry of a renamed record could not be removed.
    StaleEntryRemains { key: RecordKey, reason: String },
}

impl fmt::Display for Degradation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Degradation::IndexStale { key, reason } => {
                write!(f, "search document for '{}' is stale: {}", key, reason)
            }
            Degradation::IndexNotCleared { reason } => {
                write!(f, "search index was not cleared: {}", reason)
            }
            Degradation::AssetNotRemoved { kind, key, reason } => {
                write!(f, "{} asset of '{}' was not removed: {}", kind, key, reason)
            }
            Degradation::StaleEntryRemains { key, reason } => {
                write!(f, "previous record '{}' was not removed: {}", key, reason)
            }
        }
    }
}

/// Collects degradations as a mutation runs, logging each one.
#[derive(Debug, Default)]
pub(crate) struct DegradationLog(Vec<Degradation>);

impl DegradationLog {
    pub(crate) fn push(&mut self, degradation: Degradation) {
        warn!("Degraded mutation: {}", degradation);
        self.0.push(degradation);
    }

    pub(crate) fn finish<T>(self, value: T) -> MutationReport<T> {
        MutationReport {
            value,
            degradations: self.0,
        }
    }
}

/// Outcome of a mutation that reached the record store.
#[derive(Debug)]
pub struct MutationReport<T> {
    pub value: T,
    pub degradations: Vec<Degradation>,
}

impl<T> MutationReport<T> {
    pub fn clean(value: T) -> Self {
        Self {
            value,
            degradations: Vec::new(),
        }
    }

    /// True when every derived store followed the write.
    pub fn is_consistent(&self) -> bool {
        self.degradations.is_empty()
    }

    pub fn into_value(self) -> T {
        self.value
    }
}
