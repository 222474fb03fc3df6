mod file_config;

pub use file_config::{AssetDirConfig, ExportConfig, FileConfig, StoreConfig};

use crate::assets::AssetLocation;
use crate::reconcile::{ExportSettings, TabularFormat};
use crate::record_store::DEFAULT_SCAN_PAGE_SIZE;
use anyhow::{anyhow, bail, Result};
use std::path::{Path, PathBuf};

pub const DEFAULT_AUDIO_DIR: &str = "audio";
pub const DEFAULT_AUDIO_PREFIX: &str = "/media/audio";
pub const DEFAULT_DOCUMENT_DIR: &str = "documents";
pub const DEFAULT_DOCUMENT_PREFIX: &str = "/media/documents";
pub const DEFAULT_EXPORT_DIR: &str = "exports";
pub const DEFAULT_EXPORT_PREFIX: &str = "/exports";

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub media_path: Option<PathBuf>,
    pub export_dir: Option<PathBuf>,
    pub export_format: Option<TabularFormat>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_dir: PathBuf,
    pub media_path: PathBuf,
    pub audio: AssetLocation,
    pub document: AssetLocation,
    pub export: ExportSettings,
    pub scan_page_size: usize,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| anyhow!("db_dir must be specified via --db-dir or in config file"))?;

        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let media_path = file
            .media_path
            .map(PathBuf::from)
            .or_else(|| cli.media_path.clone())
            .unwrap_or_else(|| db_dir.clone());

        let audio = asset_location(
            &media_path,
            file.audio.unwrap_or_default(),
            DEFAULT_AUDIO_DIR,
            DEFAULT_AUDIO_PREFIX,
        );
        let document = asset_location(
            &media_path,
            file.document.unwrap_or_default(),
            DEFAULT_DOCUMENT_DIR,
            DEFAULT_DOCUMENT_PREFIX,
        );

        let export_file = file.export.unwrap_or_default();
        let export_format = match export_file.format {
            Some(format) => format.parse::<TabularFormat>().map_err(|e| anyhow!(e))?,
            None => cli.export_format.unwrap_or_default(),
        };
        let export_dir = export_file
            .dir
            .map(|dir| media_path.join(dir))
            .or_else(|| cli.export_dir.clone())
            .unwrap_or_else(|| media_path.join(DEFAULT_EXPORT_DIR));
        let export = ExportSettings {
            dir: export_dir,
            public_prefix: export_file
                .public_prefix
                .unwrap_or_else(|| DEFAULT_EXPORT_PREFIX.to_string()),
            format: export_format,
        };

        let scan_page_size = file
            .store
            .and_then(|s| s.scan_page_size)
            .unwrap_or(DEFAULT_SCAN_PAGE_SIZE);
        if scan_page_size == 0 {
            bail!("store.scan_page_size must be greater than zero");
        }

        Ok(Self {
            db_dir,
            media_path,
            audio,
            document,
            export,
            scan_page_size,
        })
    }

    pub fn records_db_path(&self) -> PathBuf {
        self.db_dir.join("records.db")
    }

    pub fn search_db_path(&self) -> PathBuf {
        self.db_dir.join("search.db")
    }
}

fn asset_location(
    media_path: &Path,
    config: AssetDirConfig,
    default_dir: &str,
    default_prefix: &str,
) -> AssetLocation {
    // Joining an absolute path replaces the base.
    let dir = media_path.join(config.dir.as_deref().unwrap_or(default_dir));
    let public_prefix = config
        .public_prefix
        .unwrap_or_else(|| default_prefix.to_string());
    AssetLocation::new(dir, public_prefix)
}
