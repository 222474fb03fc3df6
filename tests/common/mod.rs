//! Common test infrastructure
//!
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::TestCatalog;
//!
//! #[tokio::test]
//! async fn test_listing() {
//!     let catalog = TestCatalog::spawn().await;
//!     let hits = catalog.services.index.query("").await.unwrap();
//!     assert_eq!(hits.len(), common::SEEDED_RECORDS);
//! }
//! ```

mod constants;
mod fixtures;

pub use constants::*;
pub use fixtures::{audio_upload, document_upload, TestCatalog};
