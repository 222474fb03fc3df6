//! Test catalog creation
//!
//! Every test gets its own temporary db dir and media tree, opened through
//! the same wiring the binary uses.

#![allow(dead_code)]

use super::constants::*;
use songbook_catalog::assets::{AssetChange, AssetKind, Upload};
use songbook_catalog::config::{AppConfig, CliConfig};
use songbook_catalog::reconcile::TabularFormat;
use songbook_catalog::record_store::RecordField;
use songbook_catalog::{Record, RecordKey, RecordStore, SaveRequest, SearchIndex, Services};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub struct TestCatalog {
    // Dropped last, removes every file the test created.
    pub dir: TempDir,
    pub config: AppConfig,
    pub services: Services,
}

impl TestCatalog {
    /// Empty catalog.
    pub async fn empty() -> Self {
        Self::empty_with_format(TabularFormat::Xlsx).await
    }

    pub async fn empty_with_format(format: TabularFormat) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let db_dir = dir.path().join("db");
        std::fs::create_dir_all(&db_dir).expect("Failed to create db dir");

        let cli = CliConfig {
            db_dir: Some(db_dir),
            media_path: Some(dir.path().join("media")),
            export_dir: None,
            export_format: Some(format),
        };
        let config = AppConfig::resolve(&cli, None).expect("Failed to resolve config");
        let services = Services::open(&config)
            .await
            .expect("Failed to open services");
        Self {
            dir,
            config,
            services,
        }
    }

    /// Catalog seeded with three songs, one of them with an audio asset.
    pub async fn spawn() -> Self {
        let catalog = Self::empty().await;
        catalog
            .save(
                SaveRequest::new(
                    Record::new(MIRABAI, PAYOJI_TITLE)
                        .with(RecordField::Text, PAYOJI_TEXT)
                        .with(RecordField::Chords, PAYOJI_CHORDS),
                )
                .with_asset(AssetKind::Audio, audio_upload("payoji.mp3")),
            )
            .await;
        catalog
            .save(SaveRequest::new(
                Record::new(MIRABAI, MERE_TITLE).with(RecordField::Text, MERE_TEXT),
            ))
            .await;
        catalog
            .save(SaveRequest::new(
                Record::new(KABIR, MOKO_TITLE)
                    .with(RecordField::Text, MOKO_TEXT)
                    .with(RecordField::Translation, MOKO_TRANSLATION),
            ))
            .await;
        catalog
    }

    /// Saves and expects a fully consistent outcome.
    pub async fn save(&self, request: SaveRequest) -> Record {
        let report = self
            .services
            .coordinator
            .save(request)
            .await
            .expect("save failed");
        assert!(report.is_consistent(), "{:?}", report.degradations);
        report.value
    }

    pub async fn get(&self, author: &str, title: &str) -> Option<Record> {
        self.services
            .store
            .get(&RecordKey::new(author, title))
            .await
            .expect("get failed")
    }

    pub fn audio_dir(&self) -> &Path {
        &self.config.audio.dir
    }

    pub fn document_dir(&self) -> &Path {
        &self.config.document.dir
    }

    pub fn export_dir(&self) -> PathBuf {
        self.config.export.dir.clone()
    }

    /// Sorted file names in `dir`; a missing directory is empty.
    pub fn files_in(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .map(|e| e.file_name().to_string_lossy().to_string())
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Listing keys in recency order.
    pub async fn listing(&self) -> Vec<String> {
        self.services
            .index
            .query("")
            .await
            .expect("listing failed")
            .into_iter()
            .map(|hit| hit.record.key().to_string())
            .collect()
    }
}

pub fn audio_upload(filename: &str) -> AssetChange {
    AssetChange::Replace(Upload::from_bytes(filename, TEST_AUDIO_BYTES.to_vec()))
}

pub fn document_upload(filename: &str) -> AssetChange {
    AssetChange::Replace(Upload::from_bytes(filename, TEST_DOCUMENT_BYTES.to_vec()))
}
