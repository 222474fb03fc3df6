//! Binary assets attached to records.

mod manager;
mod sanitize;

pub use manager::{AssetChange, AssetError, AssetKind, AssetLocation, AssetManager, Upload};
pub use sanitize::{asset_stem, is_owned_by, sanitize, upload_extension};
