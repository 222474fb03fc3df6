//! Coordinated single-record mutations across the record store, the asset
//! directories and the search index.
//!
//! Each call runs its steps sequentially:
//! - Save: assets (audio, then document) → stamp → store `put` → index.
//! - Rename: the old store entry and search document are removed first, so a
//!   record is never resolvable under both keys.
//! - Delete: assets → store → index, so a crash leaves at worst a stale
//!   record, never files that nothing references.
//!
//! Record store failures abort the mutation. Asset removal and indexing
//! failures are logged and reported as [`Degradation`]s.

use super::outcome::{Degradation, DegradationLog, MutationError, MutationReport};
use crate::assets::{AssetChange, AssetKind, AssetManager};
use crate::clock::ModificationClock;
use crate::record_store::{Record, RecordKey, RecordStore};
use crate::search::{IndexError, SearchIndex};
use futures::TryStreamExt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A create, update or rename of one record.
#[derive(Debug, Default)]
pub struct SaveRequest {
    /// Key the record was stored under before this save, if any.
    pub previous: Option<RecordKey>,
    /// New content. Derived fields (`audioPath`, `documentPath`,
    /// `lastModified`) are recomputed.
    pub record: Record,
    pub audio: AssetChange,
    pub document: AssetChange,
}

impl SaveRequest {
    pub fn new(record: Record) -> Self {
        Self {
            record,
            ..Default::default()
        }
    }

    pub fn renaming(mut self, previous: RecordKey) -> Self {
        self.previous = Some(previous);
        self
    }

    pub fn with_asset(mut self, kind: AssetKind, change: AssetChange) -> Self {
        match kind {
            AssetKind::Audio => self.audio = change,
            AssetKind::Document => self.document = change,
        }
        self
    }
}

pub struct Coordinator {
    store: Arc<dyn RecordStore>,
    index: Arc<dyn SearchIndex>,
    assets: Arc<AssetManager>,
    clock: Arc<ModificationClock>,
}

impl Coordinator {
    pub fn new(
        store: Arc<dyn RecordStore>,
        index: Arc<dyn SearchIndex>,
        assets: Arc<AssetManager>,
        clock: Arc<ModificationClock>,
    ) -> Self {
        Self {
            store,
            index,
            assets,
            clock,
        }
    }

    /// Create or update a record, following a key change when
    /// `request.previous` differs from the new key.
    ///
    /// Returns the record as persisted.
    pub async fn save(
        &self,
        request: SaveRequest,
    ) -> Result<MutationReport<Record>, MutationError> {
        let SaveRequest {
            previous,
            record,
            audio,
            document,
        } = request;

        let mut record = validate(record)?;
        let key = record.key();
        let previous = previous.map(|p| p.normalized());
        let renamed_from = previous.clone().filter(|p| *p != key);
        let mut log = DegradationLog::default();

        if renamed_from.is_some() && self.store.get(&key).await?.is_some() {
            return Err(MutationError::Validation(format!(
                "a record named '{}' already exists",
                key
            )));
        }

        let existing = self
            .store
            .get(previous.as_ref().unwrap_or(&key))
            .await?;

        let mut old_entry_removed = false;
        if let Some(old) = &renamed_from {
            old_entry_removed = self.remove_renamed_entry(old, &mut log).await;
        }

        let mut followed: Vec<AssetKind> = Vec::new();
        for (kind, change) in [(AssetKind::Audio, audio), (AssetKind::Document, document)] {
            let follows_rename = matches!(change, AssetChange::Keep);
            let previous_path = existing
                .as_ref()
                .and_then(|e| asset_path(e, kind))
                .map(str::to_string);
            match self
                .assets
                .store(kind, previous.as_ref(), &key, change, previous_path.as_deref())
                .await
            {
                Ok(path) => {
                    set_asset_path(&mut record, kind, path);
                    if follows_rename {
                        followed.push(kind);
                    }
                }
                Err(e) => {
                    if let (Some(old), true) = (&renamed_from, old_entry_removed) {
                        self.restore_renamed(old, &key, existing.as_ref(), &followed)
                            .await;
                    }
                    return Err(e.into());
                }
            }
        }

        record.last_modified = Some(self.clock.now_millis());
        if let Err(e) = self.store.put(&record).await {
            if let (Some(old), true) = (&renamed_from, old_entry_removed) {
                self.restore_renamed(old, &key, existing.as_ref(), &followed)
                    .await;
            }
            return Err(e.into());
        }
        debug!("Stored record {}", key);

        if let Err(e) = self.index.index_document(&record).await {
            log.push(index_stale(&key, e));
        }

        match &renamed_from {
            Some(old) => info!("Renamed record '{}' to '{}'", old, key),
            None => info!("Saved record '{}'", key),
        }
        Ok(log.finish(record))
    }

    /// Delete a record with its assets and search document.
    ///
    /// Returns whether the record existed. Deleting a missing record is a
    /// successful no-op.
    pub async fn delete(&self, key: &RecordKey) -> Result<MutationReport<bool>, MutationError> {
        let key = key.normalized();
        if self.store.get(&key).await?.is_none() {
            debug!("Record '{}' not found, nothing to delete", key);
            return Ok(MutationReport::clean(false));
        }

        let mut log = DegradationLog::default();
        self.remove_assets(&key, &mut log).await;
        self.store.delete(&key).await?;
        if let Err(e) = self.index.delete_document(&key).await {
            log.push(index_stale(&key, e));
        }
        info!("Deleted record '{}'", key);
        Ok(log.finish(true))
    }

    /// Delete every record and its assets, then clear the search index.
    ///
    /// Returns the number of deleted records.
    pub async fn delete_all(&self) -> Result<MutationReport<usize>, MutationError> {
        let mut log = DegradationLog::default();
        let mut deleted = 0;
        {
            let mut records = self.store.scan_all();
            while let Some(record) = records.try_next().await? {
                let key = record.key();
                self.remove_assets(&key, &mut log).await;
                self.store.delete(&key).await?;
                deleted += 1;
            }
        }
        if let Err(e) = self.index.delete_all().await {
            log.push(Degradation::IndexNotCleared {
                reason: e.to_string(),
            });
        }
        info!("Deleted all {} records", deleted);
        Ok(log.finish(deleted))
    }

    /// Re-derive the whole search index from the record store.
    pub async fn rebuild_index(&self) -> Result<usize, IndexError> {
        self.index.rebuild_all().await
    }

    async fn remove_assets(&self, key: &RecordKey, log: &mut DegradationLog) {
        for kind in AssetKind::ALL {
            if let Err(e) = self.assets.remove(kind, key).await {
                log.push(Degradation::AssetNotRemoved {
                    kind,
                    key: key.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    /// Removes the entry and search document of a renamed record.
    /// Returns whether the store entry is gone.
    async fn remove_renamed_entry(&self, old: &RecordKey, log: &mut DegradationLog) -> bool {
        let removed = match self.store.delete(old).await {
            Ok(()) => true,
            Err(e) => {
                log.push(Degradation::StaleEntryRemains {
                    key: old.clone(),
                    reason: e.to_string(),
                });
                false
            }
        };
        if let Err(e) = self.index.delete_document(old).await {
            log.push(index_stale(old, e));
        }
        removed
    }

    /// Best-effort undo of a rename whose asset step failed.
    async fn restore_renamed(
        &self,
        old: &RecordKey,
        new: &RecordKey,
        original: Option<&Record>,
        followed: &[AssetKind],
    ) {
        for kind in followed {
            if let Err(e) = self
                .assets
                .store(*kind, Some(new), old, AssetChange::Keep, None)
                .await
            {
                warn!("Could not move {} asset back to '{}': {}", kind, old, e);
            }
        }
        let Some(original) = original else {
            return;
        };
        match self.store.put(original).await {
            Ok(()) => {
                if let Err(e) = self.index.index_document(original).await {
                    warn!("Could not re-index restored record '{}': {}", old, e);
                }
                info!("Restored record '{}' after a failed rename", old);
            }
            Err(e) => warn!("Could not restore record '{}': {}", old, e),
        }
    }
}

fn validate(record: Record) -> Result<Record, MutationError> {
    if record.title.trim().is_empty() {
        return Err(MutationError::Validation(
            "title must not be blank".to_string(),
        ));
    }
    Ok(record.normalized())
}

fn index_stale(key: &RecordKey, error: IndexError) -> Degradation {
    Degradation::IndexStale {
        key: key.clone(),
        reason: error.to_string(),
    }
}

fn asset_path(record: &Record, kind: AssetKind) -> Option<&str> {
    match kind {
        AssetKind::Audio => record.audio_path.as_deref(),
        AssetKind::Document => record.document_path.as_deref(),
    }
}

fn set_asset_path(record: &mut Record, kind: AssetKind, path: Option<String>) {
    match kind {
        AssetKind::Audio => record.audio_path = path,
        AssetKind::Document => record.document_path = path,
    }
}
