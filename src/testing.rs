//! Test doubles with switchable failures.

use crate::record_store::{Record, RecordKey, RecordStore, SqliteRecordStore, StoreError};
use crate::search::{Fts5SearchIndex, IndexError, SearchHit, SearchIndex};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

fn unavailable(op: &str) -> StoreError {
    StoreError::Unavailable(format!("injected {} failure", op))
}

/// In-memory SQLite store whose operations can be made to fail on demand.
pub struct FlakyRecordStore {
    inner: SqliteRecordStore,
    fail_get: AtomicBool,
    fail_put: AtomicBool,
    fail_next_put: AtomicBool,
    fail_delete: AtomicBool,
    fail_scan: AtomicBool,
    pub puts: AtomicUsize,
}

impl FlakyRecordStore {
    pub fn new() -> Self {
        Self {
            inner: SqliteRecordStore::in_memory().unwrap(),
            fail_get: AtomicBool::new(false),
            fail_put: AtomicBool::new(false),
            fail_next_put: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
            fail_scan: AtomicBool::new(false),
            puts: AtomicUsize::new(0),
        }
    }

    pub fn fail_get(&self, fail: bool) {
        self.fail_get.store(fail, Ordering::SeqCst);
    }

    pub fn fail_put(&self, fail: bool) {
        self.fail_put.store(fail, Ordering::SeqCst);
    }

    /// Fails only the next `put`; later ones go through.
    pub fn fail_next_put(&self) {
        self.fail_next_put.store(true, Ordering::SeqCst);
    }

    pub fn fail_delete(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }

    pub fn fail_scan(&self, fail: bool) {
        self.fail_scan.store(fail, Ordering::SeqCst);
    }

    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordStore for FlakyRecordStore {
    async fn get(&self, key: &RecordKey) -> Result<Option<Record>, StoreError> {
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(unavailable("get"));
        }
        self.inner.get(key).await
    }

    async fn put(&self, record: &Record) -> Result<(), StoreError> {
        let fail_once = self.fail_next_put.swap(false, Ordering::SeqCst);
        if fail_once || self.fail_put.load(Ordering::SeqCst) {
            return Err(unavailable("put"));
        }
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.inner.put(record).await
    }

    async fn delete(&self, key: &RecordKey) -> Result<(), StoreError> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(unavailable("delete"));
        }
        self.inner.delete(key).await
    }

    async fn scan_page(
        &self,
        after: Option<RecordKey>,
        limit: usize,
    ) -> Result<Vec<Record>, StoreError> {
        if self.fail_scan.load(Ordering::SeqCst) {
            return Err(unavailable("scan"));
        }
        self.inner.scan_page(after, limit).await
    }

    async fn count(&self) -> Result<usize, StoreError> {
        self.inner.count().await
    }
}

/// Real FTS5 index whose writes can be made to fail on demand.
pub struct FlakySearchIndex {
    inner: Fts5SearchIndex,
    fail_writes: AtomicBool,
    pub writes: AtomicUsize,
}

impl FlakySearchIndex {
    pub async fn new(store: Arc<dyn RecordStore>) -> Self {
        let inner = Fts5SearchIndex::in_memory(store).unwrap();
        inner.initialize().await.unwrap();
        Self {
            inner,
            fail_writes: AtomicBool::new(false),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn check_write(&self) -> Result<(), IndexError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(IndexError::Unavailable("injected write failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl SearchIndex for FlakySearchIndex {
    async fn initialize(&self) -> Result<(), IndexError> {
        self.inner.initialize().await
    }

    async fn index_document(&self, record: &Record) -> Result<(), IndexError> {
        self.check_write()?;
        self.inner.index_document(record).await
    }

    async fn delete_document(&self, key: &RecordKey) -> Result<(), IndexError> {
        self.check_write()?;
        self.inner.delete_document(key).await
    }

    async fn delete_all(&self) -> Result<(), IndexError> {
        self.check_write()?;
        self.inner.delete_all().await
    }

    async fn query(&self, term: &str) -> Result<Vec<SearchHit>, IndexError> {
        self.inner.query(term).await
    }

    async fn rebuild_all(&self) -> Result<usize, IndexError> {
        self.check_write()?;
        self.inner.rebuild_all().await
    }

    async fn document_count(&self) -> Result<usize, IndexError> {
        self.inner.document_count().await
    }
}
