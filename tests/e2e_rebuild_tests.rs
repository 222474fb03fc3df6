//! End-to-end tests for re-deriving the search index from the record store

mod common;

use common::*;
use songbook_catalog::record_store::RecordField;
use songbook_catalog::{Record, RecordStore, SearchIndex};

#[tokio::test]
async fn test_rebuild_restores_cleared_index() {
    let catalog = TestCatalog::spawn().await;
    let before = catalog.listing().await;

    catalog.services.index.delete_all().await.unwrap();
    assert!(catalog.listing().await.is_empty());

    let indexed = catalog.services.coordinator.rebuild_index().await.unwrap();

    assert_eq!(indexed, SEEDED_RECORDS);
    assert_eq!(catalog.listing().await, before);
    let hits = catalog.services.index.query("giridhar").await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].record.title, MERE_TITLE);
}

#[tokio::test]
async fn test_rebuild_recovers_from_dropped_table() {
    let catalog = TestCatalog::spawn().await;

    let conn = rusqlite::Connection::open(catalog.config.search_db_path()).unwrap();
    conn.execute_batch("DROP TABLE songs_fts;").unwrap();
    drop(conn);
    assert!(catalog.services.index.query("").await.is_err());

    let indexed = catalog.services.coordinator.rebuild_index().await.unwrap();

    assert_eq!(indexed, SEEDED_RECORDS);
    assert_eq!(
        catalog.services.index.document_count().await.unwrap(),
        SEEDED_RECORDS
    );
    assert_eq!(catalog.listing().await.len(), SEEDED_RECORDS);
}

#[tokio::test]
async fn test_rebuild_picks_up_records_written_behind_its_back() {
    let catalog = TestCatalog::spawn().await;
    let mut stray =
        Record::new(KABIR, "Jhini Jhini").with(RecordField::Text, "jhini jhini bini chadariya");
    stray.last_modified = Some(1);
    catalog.services.store.put(&stray).await.unwrap();
    assert!(catalog.services.index.query("chadariya").await.unwrap().is_empty());

    catalog.services.coordinator.rebuild_index().await.unwrap();

    let hits = catalog.services.index.query("chadariya").await.unwrap();
    assert_eq!(hits.len(), 1);
    // Oldest stamp lists last.
    let listing = catalog.listing().await;
    assert_eq!(listing.len(), SEEDED_RECORDS + 1);
    assert_eq!(listing.last().unwrap(), "Kabir - Jhini Jhini");
}

#[tokio::test]
async fn test_equal_stamps_list_by_title_then_author() {
    let catalog = TestCatalog::empty().await;
    for (author, title) in [("Zed", "Beta"), ("Amy", "Beta"), ("Mia", "Alpha")] {
        let mut record = Record::new(author, title);
        record.last_modified = Some(42);
        catalog.services.store.put(&record).await.unwrap();
    }

    catalog.services.coordinator.rebuild_index().await.unwrap();

    assert_eq!(
        catalog.listing().await,
        vec!["Mia - Alpha", "Amy - Beta", "Zed - Beta"]
    );
}
