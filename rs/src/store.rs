//! Core Store implementation

use eyre::{Context, Result, eyre};
use fs2::FileExt;
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use serde_json::Value;
use std::collections::HashMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::document::decode;
use crate::{DB_FILE, Document, Filter, FilterOp, IndexValue, LOCK_FILE, Record};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS records (
    collection TEXT NOT NULL,
    id TEXT NOT NULL,
    data TEXT NOT NULL,
    updated_at INTEGER NOT NULL,
    PRIMARY KEY (collection, id)
);
CREATE TABLE IF NOT EXISTS record_indexes (
    collection TEXT NOT NULL,
    id TEXT NOT NULL,
    field TEXT NOT NULL,
    value_text TEXT,
    value_int INTEGER,
    PRIMARY KEY (collection, id, field)
);
CREATE INDEX IF NOT EXISTS idx_record_indexes_field ON record_indexes (collection, field);
";

/// Row counts for a collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionStats {
    pub name: String,
    pub rows: usize,
}

/// The main row store
pub struct Store {
    conn: Connection,
    /// Base directory, None for in-memory stores
    base_path: Option<PathBuf>,
    /// Held for the lifetime of the store
    _lock: Option<File>,
}

impl Store {
    /// Open or create a store in the given directory
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let base_path = path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path).context("Failed to create store directory")?;

        let lock = File::create(base_path.join(LOCK_FILE)).context("Failed to create lock file")?;
        FileExt::try_lock_exclusive(&lock)
            .map_err(|e| eyre!("Store at {} is in use by another process: {}", base_path.display(), e))?;

        let conn = Connection::open(base_path.join(DB_FILE)).context("Failed to open store database")?;
        conn.execute_batch(SCHEMA).context("Failed to initialize schema")?;
        debug!(?base_path, "Opened row store");

        Ok(Self {
            conn,
            base_path: Some(base_path),
            _lock: Some(lock),
        })
    }

    /// Open a throwaway store that lives only in memory
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        conn.execute_batch(SCHEMA).context("Failed to initialize schema")?;
        debug!("Opened in-memory row store");
        Ok(Self {
            conn,
            base_path: None,
            _lock: None,
        })
    }

    /// Directory backing this store, if any
    pub fn path(&self) -> Option<&Path> {
        self.base_path.as_deref()
    }

    // === Typed API ===

    /// Insert a new record, failing if the id already exists
    pub fn create<T: Record>(&mut self, record: T) -> Result<String> {
        let doc = Document::from_record(&record)?;
        self.insert_document(&doc)?;
        Ok(doc.id)
    }

    /// Fetch a record by id
    pub fn get<T: Record>(&self, id: &str) -> Result<Option<T>> {
        self.get_document(T::collection_name(), id)?.map(decode).transpose()
    }

    /// Replace an existing record, failing if it does not exist
    pub fn update<T: Record>(&mut self, record: T) -> Result<()> {
        let doc = Document::from_record(&record)?;
        self.update_document(&doc)
    }

    /// Delete a record, returning whether it existed
    pub fn delete<T: Record>(&mut self, id: &str) -> Result<bool> {
        self.delete_document(T::collection_name(), id)
    }

    /// List records matching every filter, in insertion order
    pub fn list<T: Record>(&self, filters: &[Filter]) -> Result<Vec<T>> {
        self.list_documents(T::collection_name(), filters)?
            .into_iter()
            .map(decode)
            .collect()
    }

    /// Delete every record whose indexed field equals the value
    pub fn delete_by_index<T: Record>(&mut self, field: &str, value: IndexValue) -> Result<usize> {
        let collection = T::collection_name();
        let ids: Vec<String> = {
            let (clause, params) = filter_clause(&[Filter {
                field: field.to_string(),
                op: FilterOp::Eq,
                value,
            }]);
            let sql = format!("SELECT r.id FROM records r WHERE r.collection = ?1{}", clause);
            let mut stmt = self.conn.prepare(&sql)?;
            let mut all = vec![SqlValue::Text(collection.to_string())];
            all.extend(params);
            let rows = stmt.query_map(rusqlite::params_from_iter(all), |row| row.get::<_, String>(0))?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        };

        let tx = self.conn.transaction()?;
        for id in &ids {
            remove_row(&tx, collection, id)?;
        }
        tx.commit()?;
        debug!(collection, field, count = ids.len(), "delete_by_index: removed rows");
        Ok(ids.len())
    }

    /// Recompute index entries for every record of a type
    pub fn rebuild_indexes<T: Record>(&mut self) -> Result<usize> {
        let records: Vec<T> = self.list(&[])?;
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM record_indexes WHERE collection = ?1",
            params![T::collection_name()],
        )?;
        for record in &records {
            write_indexes(&tx, T::collection_name(), record.id(), &record.indexed_fields())?;
        }
        tx.commit()?;
        info!(collection = T::collection_name(), count = records.len(), "Rebuilt indexes");
        Ok(records.len())
    }

    // === Document API ===

    /// Insert a document, failing if the id already exists
    pub fn insert_document(&mut self, doc: &Document) -> Result<()> {
        let tx = self.conn.transaction()?;
        let exists: Option<i64> = tx
            .query_row(
                "SELECT 1 FROM records WHERE collection = ?1 AND id = ?2",
                params![doc.collection, doc.id],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_some() {
            return Err(eyre!("Record already exists: {}/{}", doc.collection, doc.id));
        }

        tx.execute(
            "INSERT INTO records (collection, id, data, updated_at) VALUES (?1, ?2, ?3, ?4)",
            params![doc.collection, doc.id, doc.data.to_string(), doc.updated_at],
        )?;
        write_indexes(&tx, &doc.collection, &doc.id, &doc.indexes)?;
        tx.commit()?;
        debug!(collection = %doc.collection, id = %doc.id, "insert_document: inserted");
        Ok(())
    }

    /// Replace an existing document, failing if it does not exist
    pub fn update_document(&mut self, doc: &Document) -> Result<()> {
        self.update_documents(std::slice::from_ref(doc))
    }

    /// Replace several documents atomically
    ///
    /// Either every document is written or none is.
    pub fn update_documents(&mut self, docs: &[Document]) -> Result<()> {
        let tx = self.conn.transaction()?;
        for doc in docs {
            let changed = tx.execute(
                "UPDATE records SET data = ?3, updated_at = ?4 WHERE collection = ?1 AND id = ?2",
                params![doc.collection, doc.id, doc.data.to_string(), doc.updated_at],
            )?;
            if changed == 0 {
                return Err(eyre!("Record not found: {}/{}", doc.collection, doc.id));
            }
            tx.execute(
                "DELETE FROM record_indexes WHERE collection = ?1 AND id = ?2",
                params![doc.collection, doc.id],
            )?;
            write_indexes(&tx, &doc.collection, &doc.id, &doc.indexes)?;
        }
        tx.commit()?;
        debug!(count = docs.len(), "update_documents: committed");
        Ok(())
    }

    /// Fetch a document body
    pub fn get_document(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        let data: Option<String> = self
            .conn
            .query_row(
                "SELECT data FROM records WHERE collection = ?1 AND id = ?2",
                params![collection, id],
                |row| row.get(0),
            )
            .optional()?;
        data.map(|d| serde_json::from_str(&d).context("Corrupt row data"))
            .transpose()
    }

    /// Delete a document, returning whether it existed
    pub fn delete_document(&mut self, collection: &str, id: &str) -> Result<bool> {
        let tx = self.conn.transaction()?;
        let removed = remove_row(&tx, collection, id)?;
        tx.commit()?;
        debug!(collection, id, removed, "delete_document: called");
        Ok(removed)
    }

    /// List document bodies matching every filter, in insertion order
    pub fn list_documents(&self, collection: &str, filters: &[Filter]) -> Result<Vec<Value>> {
        let (clause, params) = filter_clause(filters);
        let sql = format!(
            "SELECT r.data FROM records r WHERE r.collection = ?1{} ORDER BY r.rowid",
            clause
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut all = vec![SqlValue::Text(collection.to_string())];
        all.extend(params);

        let rows = stmt.query_map(rusqlite::params_from_iter(all), |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(serde_json::from_str(&row?).context("Corrupt row data")?);
        }
        Ok(out)
    }

    /// Per-collection row counts
    pub fn collections(&self) -> Result<Vec<CollectionStats>> {
        let mut stmt = self
            .conn
            .prepare("SELECT collection, COUNT(*) FROM records GROUP BY collection ORDER BY collection")?;
        let rows = stmt.query_map([], |row| {
            Ok(CollectionStats {
                name: row.get(0)?,
                rows: row.get::<_, i64>(1)? as usize,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

fn remove_row(tx: &Transaction<'_>, collection: &str, id: &str) -> Result<bool> {
    tx.execute(
        "DELETE FROM record_indexes WHERE collection = ?1 AND id = ?2",
        params![collection, id],
    )?;
    let removed = tx.execute(
        "DELETE FROM records WHERE collection = ?1 AND id = ?2",
        params![collection, id],
    )?;
    Ok(removed > 0)
}

fn write_indexes(tx: &Transaction<'_>, collection: &str, id: &str, indexes: &HashMap<String, IndexValue>) -> Result<()> {
    for (field, value) in indexes {
        let (text, int) = split_value(value);
        tx.execute(
            "INSERT INTO record_indexes (collection, id, field, value_text, value_int) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![collection, id, field, text, int],
        )?;
    }
    Ok(())
}

fn split_value(value: &IndexValue) -> (Option<String>, Option<i64>) {
    match value {
        IndexValue::String(s) => (Some(s.clone()), None),
        IndexValue::Int(i) => (None, Some(*i)),
        IndexValue::Bool(b) => (None, Some(i64::from(*b))),
    }
}

/// Build the `AND EXISTS (...)` clauses for a filter list
///
/// Parameter numbering starts at ?2; ?1 is always the collection.
fn filter_clause(filters: &[Filter]) -> (String, Vec<SqlValue>) {
    let mut clause = String::new();
    let mut params = Vec::new();

    for filter in filters {
        let field_idx = params.len() + 2;
        let value_idx = field_idx + 1;
        let (column, value) = match (&filter.value, filter.op) {
            (IndexValue::String(s), FilterOp::Contains) => ("value_text", SqlValue::Text(format!("%{}%", s))),
            (IndexValue::String(s), _) => ("value_text", SqlValue::Text(s.clone())),
            (IndexValue::Int(i), _) => ("value_int", SqlValue::Integer(*i)),
            (IndexValue::Bool(b), _) => ("value_int", SqlValue::Integer(i64::from(*b))),
        };
        clause.push_str(&format!(
            " AND EXISTS (SELECT 1 FROM record_indexes i WHERE i.collection = r.collection AND i.id = r.id \
             AND i.field = ?{} AND i.{} {} ?{})",
            field_idx,
            column,
            filter.op.sql(),
            value_idx
        ));
        params.push(SqlValue::Text(filter.field.clone()));
        params.push(value);
    }

    (clause, params)
}
