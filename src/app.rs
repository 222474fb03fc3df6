//! Wiring of the stores into the coordinator and the reconciler.

use crate::assets::AssetManager;
use crate::clock::ModificationClock;
use crate::config::AppConfig;
use crate::coordinator::Coordinator;
use crate::reconcile::Reconciler;
use crate::record_store::{RecordStore, SqliteRecordStore};
use crate::search::{Fts5SearchIndex, SearchIndex};
use anyhow::{Context, Result};
use futures::TryStreamExt;
use std::sync::Arc;
use tracing::info;

/// Every long-lived client, constructed once and shared by handle.
pub struct Services {
    pub store: Arc<dyn RecordStore>,
    pub index: Arc<dyn SearchIndex>,
    pub assets: Arc<AssetManager>,
    pub clock: Arc<ModificationClock>,
    pub coordinator: Coordinator,
    pub reconciler: Reconciler,
}

impl Services {
    /// Open the databases described by `config` and make sure the search index
    /// exists.
    pub async fn open(config: &AppConfig) -> Result<Self> {
        let store: Arc<dyn RecordStore> = Arc::new(
            SqliteRecordStore::new(config.records_db_path())?
                .with_scan_page_size(config.scan_page_size),
        );
        let index: Arc<dyn SearchIndex> =
            Arc::new(Fts5SearchIndex::new(store.clone(), &config.search_db_path())?);
        index
            .initialize()
            .await
            .context("Failed to initialize the search index")?;

        // Stamps must keep sorting after everything written by earlier runs,
        // even if the wall clock went backwards in between.
        let newest = store
            .scan_all()
            .try_fold(0, |newest, record| async move {
                Ok(newest.max(record.last_modified.unwrap_or(0)))
            })
            .await
            .context("Failed to scan the record store")?;

        let services = Self::from_parts(
            store,
            index,
            Arc::new(AssetManager::new(
                config.audio.clone(),
                config.document.clone(),
            )),
            Arc::new(ModificationClock::starting_after(newest)),
            config,
        );
        info!(
            "Services ready (db: {:?}, media: {:?})",
            config.db_dir, config.media_path
        );
        Ok(services)
    }

    /// Assemble services around already-constructed clients.
    pub fn from_parts(
        store: Arc<dyn RecordStore>,
        index: Arc<dyn SearchIndex>,
        assets: Arc<AssetManager>,
        clock: Arc<ModificationClock>,
        config: &AppConfig,
    ) -> Self {
        let coordinator = Coordinator::new(
            store.clone(),
            index.clone(),
            assets.clone(),
            clock.clone(),
        );
        let reconciler = Reconciler::new(
            store.clone(),
            index.clone(),
            clock.clone(),
            config.export.clone(),
        );
        Self {
            store,
            index,
            assets,
            clock,
            coordinator,
            reconciler,
        }
    }
}
