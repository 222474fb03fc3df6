use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub db_dir: Option<String>,
    pub media_path: Option<String>,

    pub audio: Option<AssetDirConfig>,
    pub document: Option<AssetDirConfig>,
    pub export: Option<ExportConfig>,
    pub store: Option<StoreConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct AssetDirConfig {
    /// Storage directory, relative paths resolve against `media_path`.
    pub dir: Option<String>,
    /// Public path prefix written into records.
    pub public_prefix: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ExportConfig {
    pub dir: Option<String>,
    pub public_prefix: Option<String>,
    /// "xlsx" or "csv"
    pub format: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct StoreConfig {
    pub scan_page_size: Option<usize>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
