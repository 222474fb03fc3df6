//! FTS5-based search index using SQLite full-text search

use super::{IndexError, SearchHit, SearchIndex, HIGHLIGHT_CLOSE, HIGHLIGHT_OPEN};
use crate::record_store::{Record, RecordField, RecordKey, RecordStore};
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use rusqlite::{params, Connection};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};
use unicode_segmentation::UnicodeSegmentation;

const TABLE_NAME: &str = "songs_fts";

/// Unindexed bookkeeping columns that precede the searchable ones.
const LEADING_COLUMNS: usize = 3;

/// Tokens of context around a match in a long-field snippet.
const SNIPPET_TOKENS: usize = 24;

/// BM25 weight of each searchable column, in `RecordField::SEARCHABLE` order.
const FIELD_WEIGHTS: [f64; 8] = [2.0, 3.0, 2.0, 1.0, 1.0, 1.0, 1.0, 1.0];

/// FTS5 search index. Documents carry the whole record so results never need a
/// round trip to the record store.
pub struct Fts5SearchIndex {
    conn: Mutex<Connection>,
    record_store: Arc<dyn RecordStore>,
}

impl Fts5SearchIndex {
    /// Open the search database at `db_path`. Call [`SearchIndex::initialize`]
    /// before indexing.
    pub fn new(record_store: Arc<dyn RecordStore>, db_path: &Path) -> Result<Self> {
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open search database {:?}", db_path))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Ok(Self {
            conn: Mutex::new(conn),
            record_store,
        })
    }

    pub fn in_memory(record_store: Arc<dyn RecordStore>) -> Result<Self> {
        Ok(Self {
            conn: Mutex::new(Connection::open_in_memory()?),
            record_store,
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, IndexError> {
        self.conn.lock().map_err(|_| IndexError::Poisoned)
    }

    fn table_exists(conn: &Connection) -> rusqlite::Result<bool> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [TABLE_NAME],
            |r| r.get(0),
        )?;
        Ok(count > 0)
    }

    fn create_table(conn: &Connection) -> rusqlite::Result<()> {
        let columns: Vec<&str> = RecordField::SEARCHABLE.iter().map(|f| f.name()).collect();
        conn.execute_batch(&format!(
            "CREATE VIRTUAL TABLE {} USING fts5(
                doc_id UNINDEXED,
                last_modified UNINDEXED,
                record UNINDEXED,
                {},
                tokenize = 'unicode61 remove_diacritics 2'
            );",
            TABLE_NAME,
            columns.join(", ")
        ))
    }

    fn insert_document(conn: &Connection, record: &Record) -> Result<(), IndexError> {
        let record = record.clone().normalized();
        let json = serde_json::to_string(&record)?;
        let [author, title, text, chords, translation, options, review, lessons] =
            RecordField::SEARCHABLE.map(|field| field.get(&record));
        conn.execute(
            &format!(
                "INSERT INTO {} (doc_id, last_modified, record, author, title, text, chords,
                                 translation, options, review, lessons)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                TABLE_NAME
            ),
            params![
                record.key().document_id(),
                record.last_modified,
                json,
                author,
                title,
                text,
                chords,
                translation,
                options,
                review,
                lessons
            ],
        )?;
        Ok(())
    }

    fn match_sql() -> String {
        let weights = FIELD_WEIGHTS
            .iter()
            .map(|w| format!("{:.1}", w))
            .collect::<Vec<_>>()
            .join(", ");
        let fragments = RecordField::SEARCHABLE
            .iter()
            .enumerate()
            .map(|(i, field)| {
                let column = LEADING_COLUMNS + i;
                match field {
                    RecordField::Author | RecordField::Title => format!(
                        "highlight({t}, {c}, '{o}', '{e}')",
                        t = TABLE_NAME,
                        c = column,
                        o = HIGHLIGHT_OPEN,
                        e = HIGHLIGHT_CLOSE
                    ),
                    _ => format!(
                        "snippet({t}, {c}, '{o}', '{e}', '…', {n})",
                        t = TABLE_NAME,
                        c = column,
                        o = HIGHLIGHT_OPEN,
                        e = HIGHLIGHT_CLOSE,
                        n = SNIPPET_TOKENS
                    ),
                }
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "SELECT record, -bm25({t}, 0.0, 0.0, 0.0, {w}) AS score, {f}
             FROM {t}
             WHERE {t} MATCH ?1
             ORDER BY score DESC, title ASC, author ASC",
            t = TABLE_NAME,
            w = weights,
            f = fragments
        )
    }

    /// Prefix-token OR query over every searchable column, or `None` when the
    /// term has no word characters.
    fn match_expression(term: &str) -> Option<String> {
        let tokens: Vec<String> = term
            .unicode_words()
            .map(|word| format!("\"{}\"*", word.replace('"', "\"\"")))
            .collect();
        if tokens.is_empty() {
            None
        } else {
            Some(tokens.join(" OR "))
        }
    }

    fn parse_record(json: &str) -> Result<Record, IndexError> {
        Ok(serde_json::from_str(json)?)
    }

    fn raw_highlight(record: &Record) -> BTreeMap<String, String> {
        RecordField::SEARCHABLE
            .iter()
            .filter_map(|field| {
                field
                    .get(record)
                    .map(|value| (field.name().to_string(), value.to_string()))
            })
            .collect()
    }

    fn list_by_recency(conn: &Connection) -> Result<Vec<SearchHit>, IndexError> {
        let mut stmt = conn.prepare(&format!(
            "SELECT record FROM {}
             ORDER BY last_modified DESC, title ASC, author ASC",
            TABLE_NAME
        ))?;
        let documents = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        documents
            .iter()
            .map(|json| {
                let record = Self::parse_record(json)?;
                Ok(SearchHit {
                    highlight: Self::raw_highlight(&record),
                    record,
                    score: 0.0,
                })
            })
            .collect()
    }

    fn ranked_matches(conn: &Connection, expression: &str) -> Result<Vec<SearchHit>, IndexError> {
        let mut stmt = conn.prepare(&Self::match_sql())?;
        let rows = stmt
            .query_map([expression], |row| {
                let json: String = row.get(0)?;
                let score: f64 = row.get(1)?;
                let fragments = (0..RecordField::SEARCHABLE.len())
                    .map(|i| row.get::<_, Option<String>>(2 + i))
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok((json, score, fragments))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(json, score, fragments)| {
                let record = Self::parse_record(&json)?;
                let highlight = RecordField::SEARCHABLE
                    .iter()
                    .zip(fragments)
                    .filter_map(|(field, fragment)| {
                        let value = field.get(&record)?;
                        // A field without a match keeps its stored value.
                        let shown = fragment
                            .filter(|f| f.contains(HIGHLIGHT_OPEN))
                            .unwrap_or_else(|| value.to_string());
                        Some((field.name().to_string(), shown))
                    })
                    .collect();
                Ok(SearchHit {
                    record,
                    score,
                    highlight,
                })
            })
            .collect()
    }
}

#[async_trait]
impl SearchIndex for Fts5SearchIndex {
    async fn initialize(&self) -> Result<(), IndexError> {
        let conn = self.conn()?;
        if Self::table_exists(&conn)? {
            debug!("Search index already exists");
            return Ok(());
        }
        Self::create_table(&conn)?;
        info!("Created search index table {}", TABLE_NAME);
        Ok(())
    }

    async fn index_document(&self, record: &Record) -> Result<(), IndexError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            &format!("DELETE FROM {} WHERE doc_id = ?1", TABLE_NAME),
            [record.key().normalized().document_id()],
        )?;
        Self::insert_document(&tx, record)?;
        tx.commit()?;
        Ok(())
    }

    async fn delete_document(&self, key: &RecordKey) -> Result<(), IndexError> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            &format!("DELETE FROM {} WHERE doc_id = ?1", TABLE_NAME),
            [key.normalized().document_id()],
        )?;
        if deleted == 0 {
            debug!("No search document to delete for {}", key);
        }
        Ok(())
    }

    async fn delete_all(&self) -> Result<(), IndexError> {
        let conn = self.conn()?;
        conn.execute(&format!("DELETE FROM {}", TABLE_NAME), [])?;
        Ok(())
    }

    async fn query(&self, term: &str) -> Result<Vec<SearchHit>, IndexError> {
        let conn = self.conn()?;
        if term.trim().is_empty() {
            return Self::list_by_recency(&conn);
        }
        match Self::match_expression(term) {
            Some(expression) => Self::ranked_matches(&conn, &expression),
            None => Ok(Vec::new()),
        }
    }

    async fn rebuild_all(&self) -> Result<usize, IndexError> {
        // Scan first: a failing store leaves the current index untouched.
        let records: Vec<Record> = self.record_store.scan_all().try_collect().await?;

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute_batch(&format!("DROP TABLE IF EXISTS {};", TABLE_NAME))?;
        Self::create_table(&tx)?;
        for record in &records {
            Self::insert_document(&tx, record)?;
        }
        tx.commit()?;

        info!("Search index rebuilt with {} documents", records.len());
        Ok(records.len())
    }

    async fn document_count(&self) -> Result<usize, IndexError> {
        let conn = self.conn()?;
        let count: i64 =
            conn.query_row(&format!("SELECT COUNT(*) FROM {}", TABLE_NAME), [], |r| {
                r.get(0)
            })?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record_store::SqliteRecordStore;
    use crate::testing::FlakyRecordStore;
    use tempfile::TempDir;

    fn song(author: &str, title: &str, last_modified: i64) -> Record {
        let mut record = Record::new(author, title);
        record.last_modified = Some(last_modified);
        record
    }

    async fn index_with(records: &[Record]) -> Fts5SearchIndex {
        let store = Arc::new(SqliteRecordStore::in_memory().unwrap());
        let index = Fts5SearchIndex::in_memory(store).unwrap();
        index.initialize().await.unwrap();
        for record in records {
            index.index_document(record).await.unwrap();
        }
        index
    }

    fn titles(hits: &[SearchHit]) -> Vec<&str> {
        hits.iter().map(|h| h.record.title.as_str()).collect()
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let index = index_with(&[song("A", "T", 1)]).await;
        index.initialize().await.unwrap();
        assert_eq!(index.document_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_index_document_replaces_previous_version() {
        let index = index_with(&[
            song("A", "T", 1).with(RecordField::Text, "first"),
            song("A", "T", 2).with(RecordField::Text, "second"),
        ])
        .await;

        assert_eq!(index.document_count().await.unwrap(), 1);
        assert!(index.query("first").await.unwrap().is_empty());
        assert_eq!(titles(&index.query("second").await.unwrap()), vec!["T"]);
    }

    #[tokio::test]
    async fn test_empty_term_lists_by_recency_then_title_then_author() {
        let index = index_with(&[
            song("B", "Same", 5),
            song("A", "Same", 5),
            song("Z", "Alpha", 5),
            song("A", "Newest", 9),
            song("A", "Oldest", 1),
        ])
        .await;

        let hits = index.query("  ").await.unwrap();
        let keys: Vec<String> = hits.iter().map(|h| h.record.key().to_string()).collect();
        assert_eq!(
            keys,
            vec!["A - Newest", "Z - Alpha", "A - Same", "B - Same", "A - Oldest"]
        );
        assert!(hits.iter().all(|h| h.score == 0.0));
        assert_eq!(hits[0].highlight.get("title").map(String::as_str), Some("Newest"));
    }

    #[tokio::test]
    async fn test_title_match_outranks_text_match() {
        let index = index_with(&[
            song("A", "Lyrics only", 1).with(RecordField::Text, "river flows"),
            song("B", "River", 1),
            song("C", "Unrelated", 1).with(RecordField::Chords, "Am G"),
        ])
        .await;

        let hits = index.query("river").await.unwrap();
        assert_eq!(titles(&hits), vec!["River", "Lyrics only"]);
        assert!(hits[0].score > hits[1].score);
    }

    #[tokio::test]
    async fn test_prefix_and_diacritic_insensitive_match() {
        let index = index_with(&[song("Traditional", "Om Namaḥ Śivāya", 1)]).await;

        let hits = index.query("shiv siva").await.unwrap();
        assert_eq!(hits.len(), 1);
        let hits = index.query("SIVA").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].highlight["title"].contains(HIGHLIGHT_OPEN));
    }

    #[tokio::test]
    async fn test_highlight_falls_back_to_stored_value() {
        let index = index_with(&[song("Kabir", "Moko", 1)
            .with(RecordField::Text, "where do you search for me")
            .with(RecordField::Review, "")])
        .await;

        let hits = index.query("search").await.unwrap();
        assert_eq!(hits.len(), 1);
        let highlight = &hits[0].highlight;
        assert_eq!(highlight["author"], "Kabir");
        assert!(highlight["text"].contains("<em>search</em>"));
        assert!(!highlight.contains_key("review"));
        assert!(!highlight.contains_key("chords"));
    }

    #[tokio::test]
    async fn test_punctuation_only_term_matches_nothing() {
        let index = index_with(&[song("A", "T", 1)]).await;
        assert!(index.query("\"*()").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_document_tolerates_missing() {
        let index = index_with(&[song("A", "T", 1)]).await;
        index.delete_document(&RecordKey::new("A", "T")).await.unwrap();
        index.delete_document(&RecordKey::new("A", "T")).await.unwrap();
        assert_eq!(index.document_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_rebuild_all_mirrors_store() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(SqliteRecordStore::in_memory().unwrap().with_scan_page_size(2));
        for (i, title) in ["One", "Two", "Three"].iter().enumerate() {
            store.put(&song("A", title, i as i64)).await.unwrap();
        }
        let index = Fts5SearchIndex::new(store.clone(), &dir.path().join("search.db")).unwrap();
        index.initialize().await.unwrap();
        index.index_document(&song("Ghost", "Stale", 99)).await.unwrap();

        assert_eq!(index.rebuild_all().await.unwrap(), 3);
        let hits = index.query("").await.unwrap();
        assert_eq!(titles(&hits), vec!["Three", "Two", "One"]);
    }

    #[tokio::test]
    async fn test_failed_rebuild_keeps_previous_content() {
        let store = Arc::new(FlakyRecordStore::new());
        store.put(&song("A", "Kept", 1)).await.unwrap();
        let index = Fts5SearchIndex::in_memory(store.clone()).unwrap();
        index.initialize().await.unwrap();
        index.rebuild_all().await.unwrap();

        store.fail_scan(true);
        assert!(matches!(
            index.rebuild_all().await,
            Err(IndexError::Scan(_))
        ));
        assert_eq!(titles(&index.query("").await.unwrap()), vec!["Kept"]);
    }
}
