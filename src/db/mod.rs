//! Generic local record database over SQLite.
//!
//! Tables are declared up front ([`Schema`]) and hold one JSON document per
//! row. The database offers primary-key lookup, index-ordered range reads,
//! chunked bulk writes, and cursor-based streaming over large tables.
//!
//! Write chunking is the backpressure mechanism: each chunk commits in its
//! own transaction, so a failure aborts only that chunk and previously
//! committed chunks stay committed. Upserts replace by primary key, which
//! makes retries after a partial failure safe.

mod cursor;
mod schema;

pub use cursor::{CancelToken, CursorAction, CursorOptions, CursorStats, Direction};
pub use schema::{IndexDef, Schema, TableDef, create_schema};

use rusqlite::{Connection, OptionalExtension, Params, params};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Default chunk size for bulk writes and cursor batches.
pub const DEFAULT_CHUNK_SIZE: usize = 200;

const OPEN_ATTEMPTS: u32 = 3;
const OPEN_BACKOFF: Duration = Duration::from_millis(50);

/// Errors from record database operations.
#[derive(Debug, Error)]
pub enum DbError {
    /// A SQLite error occurred.
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A record failed to serialize or deserialize.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// The table is not part of the declared schema.
    #[error("unknown table: {0}")]
    UnknownTable(String),

    /// The index is not declared on the table.
    #[error("unknown index {index} on table {table}")]
    UnknownIndex { table: String, index: String },

    /// The record carries no string key at the table's key path.
    #[error("record in {table} has no string key at '{key_path}'")]
    MissingKey { table: String, key_path: String },

    /// A declared name is not a safe SQL identifier.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// The database could not be opened within the retry limit.
    #[error("failed to open database at {path} after {attempts} attempts: {source}")]
    OpenFailed {
        path: PathBuf,
        attempts: u32,
        #[source]
        source: rusqlite::Error,
    },

    /// An I/O error occurred.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

/// Read options for [`RecordDatabase::get_all`].
#[derive(Debug, Clone, Default)]
pub struct QueryOptions<'a> {
    /// Order by this index instead of the primary key.
    pub index: Option<&'a str>,
    pub direction: Direction,
    pub limit: Option<usize>,
    pub offset: usize,
}

/// A local database of JSON-record tables.
///
/// Holds a single connection, opened lazily by the owner and reused for the
/// lifetime of the process.
pub struct RecordDatabase {
    conn: Connection,
    schema: Schema,
}

impl RecordDatabase {
    /// Opens (or creates) the database file, retrying transient open
    /// failures with bounded backoff, and ensures the declared schema.
    pub fn open(path: &Path, schema: Schema) -> DbResult<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| DbError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut attempt = 0;
        let conn = loop {
            match Connection::open(path) {
                Ok(conn) => break conn,
                Err(e) => {
                    attempt += 1;
                    if attempt >= OPEN_ATTEMPTS {
                        return Err(DbError::OpenFailed {
                            path: path.to_path_buf(),
                            attempts: attempt,
                            source: e,
                        });
                    }
                    warn!(path = %path.display(), attempt, error = %e, "database open failed, retrying");
                    std::thread::sleep(OPEN_BACKOFF * attempt);
                }
            }
        };
        Self::init(conn, schema)
    }

    /// Opens an in-memory database with the declared schema. Used for tests
    /// and throwaway indexes.
    pub fn open_in_memory(schema: Schema) -> DbResult<Self> {
        Self::init(Connection::open_in_memory()?, schema)
    }

    fn init(conn: Connection, schema: Schema) -> DbResult<Self> {
        conn.execute_batch("PRAGMA busy_timeout = 5000;")?;
        create_schema(&conn, &schema)?;
        Ok(Self { conn, schema })
    }

    /// Returns a reference to the underlying connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Fetches a record by primary key.
    pub fn get<T: DeserializeOwned>(&self, table: &str, key: &str) -> DbResult<Option<T>> {
        let table = self.schema.table(table)?;
        let data: Option<String> = self
            .conn
            .query_row(
                &format!("SELECT data FROM {} WHERE key = ?1", table.name),
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        match data {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }

    /// Reads records in key or index order, with optional pagination.
    ///
    /// Rows that fail to deserialize are logged and skipped.
    pub fn get_all<T: DeserializeOwned>(
        &self,
        table: &str,
        opts: &QueryOptions,
    ) -> DbResult<Vec<T>> {
        let table = self.schema.table(table)?;
        let order = match opts.index {
            Some(name) => {
                let index = table.index(name).ok_or_else(|| DbError::UnknownIndex {
                    table: table.name.to_string(),
                    index: name.to_string(),
                })?;
                format!(
                    "{expr} {dir}, key {dir}",
                    expr = schema::index_expr(table, index),
                    dir = opts.direction.sql()
                )
            }
            None => format!("key {}", opts.direction.sql()),
        };

        let sql = format!(
            "SELECT data FROM {t} ORDER BY {order} LIMIT ?1 OFFSET ?2",
            t = table.name
        );
        let limit = opts.limit.map(|l| l as i64).unwrap_or(-1);
        self.collect_rows(&sql, params![limit, opts.offset as i64], table.name)
    }

    /// Fetches all records whose indexed field equals `key`. For a
    /// multi-entry index, matches records whose array contains `key`.
    pub fn get_by_index<T: DeserializeOwned>(
        &self,
        table: &str,
        index: &str,
        key: &Value,
    ) -> DbResult<Vec<T>> {
        let table = self.schema.table(table)?;
        let index = table.index(index).ok_or_else(|| DbError::UnknownIndex {
            table: table.name.to_string(),
            index: index.to_string(),
        })?;

        let sql = if index.multi_entry {
            format!(
                "SELECT data FROM {t} WHERE EXISTS (
                    SELECT 1 FROM json_each(json_extract({t}.data, '$.{p}'))
                    WHERE json_each.value = ?1
                 ) ORDER BY key",
                t = table.name,
                p = index.key_path
            )
        } else {
            format!(
                "SELECT data FROM {t} WHERE {expr} = ?1 ORDER BY key",
                t = table.name,
                expr = schema::index_expr(table, index)
            )
        };
        self.collect_rows(&sql, params![to_sql_value(key)], table.name)
    }

    /// Upserts a record by primary key. Returns the key.
    pub fn put<T: Serialize>(&self, table: &str, item: &T) -> DbResult<String> {
        let table = self.schema.table(table)?;
        let (key, data) = encode_record(table, item)?;
        self.conn.execute(
            &format!(
                "INSERT INTO {t} (key, data) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET data = excluded.data",
                t = table.name
            ),
            params![key, data],
        )?;
        Ok(key)
    }

    /// Upserts records in fixed-size chunks, one transaction per chunk.
    ///
    /// Records that fail to encode are logged and skipped; a chunk
    /// transaction failure surfaces after previously committed chunks have
    /// already taken effect (callers retry safely because puts are
    /// idempotent by key).
    pub fn bulk_put<T: Serialize>(
        &self,
        table: &str,
        items: &[T],
        chunk_size: usize,
    ) -> DbResult<()> {
        let table = self.schema.table(table)?;
        let chunk_size = effective_chunk(chunk_size);
        let sql = format!(
            "INSERT INTO {t} (key, data) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET data = excluded.data",
            t = table.name
        );

        for chunk in items.chunks(chunk_size) {
            let tx = Transaction::begin(&self.conn)?;
            for item in chunk {
                match encode_record(table, item) {
                    Ok((key, data)) => {
                        tx.execute(&sql, params![key, data])?;
                    }
                    Err(e) => {
                        warn!(table = table.name, error = %e, "skipping record in bulk write");
                    }
                }
            }
            tx.commit()?;
        }
        Ok(())
    }

    /// Deletes a record by primary key. Deleting a missing key is a no-op.
    pub fn delete(&self, table: &str, key: &str) -> DbResult<()> {
        let table = self.schema.table(table)?;
        self.conn.execute(
            &format!("DELETE FROM {} WHERE key = ?1", table.name),
            params![key],
        )?;
        Ok(())
    }

    /// Deletes records in fixed-size chunks, one transaction per chunk.
    pub fn bulk_delete(&self, table: &str, keys: &[String]) -> DbResult<()> {
        let table = self.schema.table(table)?;
        let sql = format!("DELETE FROM {} WHERE key = ?1", table.name);
        for chunk in keys.chunks(DEFAULT_CHUNK_SIZE) {
            let tx = Transaction::begin(&self.conn)?;
            for key in chunk {
                tx.execute(&sql, params![key])?;
            }
            tx.commit()?;
        }
        Ok(())
    }

    /// Removes every record in a table.
    pub fn clear(&self, table: &str) -> DbResult<()> {
        let table = self.schema.table(table)?;
        self.conn
            .execute(&format!("DELETE FROM {}", table.name), [])?;
        Ok(())
    }

    /// Counts records, optionally restricted to an index key.
    pub fn count(&self, table: &str, filter: Option<(&str, &Value)>) -> DbResult<usize> {
        let table = self.schema.table(table)?;
        let count: i64 = match filter {
            None => self.conn.query_row(
                &format!("SELECT COUNT(*) FROM {}", table.name),
                [],
                |row| row.get(0),
            )?,
            Some((index, key)) => {
                let index = table.index(index).ok_or_else(|| DbError::UnknownIndex {
                    table: table.name.to_string(),
                    index: index.to_string(),
                })?;
                let sql = if index.multi_entry {
                    format!(
                        "SELECT COUNT(*) FROM {t} WHERE EXISTS (
                            SELECT 1 FROM json_each(json_extract({t}.data, '$.{p}'))
                            WHERE json_each.value = ?1
                         )",
                        t = table.name,
                        p = index.key_path
                    )
                } else {
                    format!(
                        "SELECT COUNT(*) FROM {t} WHERE {expr} = ?1",
                        t = table.name,
                        expr = schema::index_expr(table, index)
                    )
                };
                self.conn
                    .query_row(&sql, params![to_sql_value(key)], |row| row.get(0))?
            }
        };
        Ok(count as usize)
    }

    /// Streams a table in batches, applying `visit` to each record and
    /// committing accumulated [`CursorAction::Replace`]/[`CursorAction::Delete`]
    /// updates once per batch.
    ///
    /// Progress is reported as `(processed, total)` after every batch.
    /// Cancellation is checked between records; batches committed before
    /// cancellation stay committed. Records that fail to deserialize are
    /// logged and skipped. When iterating in index order, a replacement that
    /// changes the indexed field may be visited again.
    pub fn process_by_cursor<T, F>(
        &self,
        table: &str,
        opts: &CursorOptions,
        mut progress: Option<&mut dyn FnMut(usize, usize)>,
        mut visit: F,
    ) -> DbResult<CursorStats>
    where
        T: DeserializeOwned + Serialize,
        F: FnMut(&T) -> CursorAction<T>,
    {
        let table = self.schema.table(table)?;
        let total = {
            let count: i64 = self.conn.query_row(
                &format!("SELECT COUNT(*) FROM {}", table.name),
                [],
                |row| row.get(0),
            )?;
            count as usize
        };
        let batch_size = effective_chunk(opts.batch_size);

        let order = match opts.index {
            Some(name) => {
                let index = table.index(name).ok_or_else(|| DbError::UnknownIndex {
                    table: table.name.to_string(),
                    index: name.to_string(),
                })?;
                format!(
                    "{expr} {dir}, key {dir}",
                    expr = schema::index_expr(table, index),
                    dir = opts.direction.sql()
                )
            }
            None => format!("key {}", opts.direction.sql()),
        };

        let page_sql = format!(
            "SELECT key, data FROM {t} ORDER BY {order} LIMIT ?1 OFFSET ?2",
            t = table.name
        );
        let update_sql = format!("UPDATE {} SET data = ?1 WHERE key = ?2", table.name);
        let delete_sql = format!("DELETE FROM {} WHERE key = ?1", table.name);

        let mut stats = CursorStats::default();
        let mut offset: i64 = 0;

        'pages: loop {
            let page: Vec<(String, String)> = {
                let mut stmt = self.conn.prepare(&page_sql)?;
                stmt.query_map(params![batch_size as i64, offset], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })?
                .filter_map(|r| r.ok())
                .collect()
            };
            if page.is_empty() {
                break;
            }
            let page_len = page.len();

            let mut replacements: Vec<(String, String)> = Vec::new();
            let mut deletions: Vec<String> = Vec::new();

            for (key, data) in page {
                if opts.cancel.is_some_and(CancelToken::is_cancelled) {
                    stats.cancelled = true;
                    // Flush what this batch accumulated, then stop.
                    self.flush_cursor_batch(
                        &update_sql,
                        &delete_sql,
                        &replacements,
                        &deletions,
                    )?;
                    stats.replaced += replacements.len();
                    stats.deleted += deletions.len();
                    if let Some(progress) = progress.as_deref_mut() {
                        progress(stats.processed, total);
                    }
                    break 'pages;
                }

                let item: T = match serde_json::from_str(&data) {
                    Ok(item) => item,
                    Err(e) => {
                        warn!(table = table.name, key, error = %e, "skipping undecodable record");
                        stats.processed += 1;
                        continue;
                    }
                };
                match visit(&item) {
                    CursorAction::Keep => {}
                    CursorAction::Replace(updated) => {
                        replacements.push((key, serde_json::to_string(&updated)?));
                    }
                    CursorAction::Delete => deletions.push(key),
                }
                stats.processed += 1;
            }

            self.flush_cursor_batch(&update_sql, &delete_sql, &replacements, &deletions)?;
            stats.replaced += replacements.len();
            stats.deleted += deletions.len();

            if let Some(progress) = progress.as_deref_mut() {
                progress(stats.processed, total);
            }

            if page_len < batch_size {
                break;
            }
            // Deleted rows no longer occupy positions in the next page.
            offset += (page_len - deletions.len()) as i64;
        }

        Ok(stats)
    }

    fn flush_cursor_batch(
        &self,
        update_sql: &str,
        delete_sql: &str,
        replacements: &[(String, String)],
        deletions: &[String],
    ) -> DbResult<()> {
        if replacements.is_empty() && deletions.is_empty() {
            return Ok(());
        }
        let tx = Transaction::begin(&self.conn)?;
        for (key, data) in replacements {
            tx.execute(update_sql, params![data, key])?;
        }
        for key in deletions {
            tx.execute(delete_sql, params![key])?;
        }
        tx.commit()
    }

    fn collect_rows<T: DeserializeOwned>(
        &self,
        sql: &str,
        params: impl Params,
        table: &str,
    ) -> DbResult<Vec<T>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, |row| row.get::<_, String>(0))?;

        let mut out = Vec::new();
        for row in rows {
            let data = match row {
                Ok(data) => data,
                Err(e) => {
                    warn!(table, error = %e, "skipping unreadable row");
                    continue;
                }
            };
            match serde_json::from_str(&data) {
                Ok(item) => out.push(item),
                Err(e) => warn!(table, error = %e, "skipping undecodable record"),
            }
        }
        Ok(out)
    }
}

/// A transaction with RAII rollback: rolls back on drop unless committed.
struct Transaction<'a> {
    conn: &'a Connection,
    finished: bool,
}

impl<'a> Transaction<'a> {
    fn begin(conn: &'a Connection) -> DbResult<Self> {
        conn.execute_batch("BEGIN")?;
        Ok(Self {
            conn,
            finished: false,
        })
    }

    fn execute(&self, sql: &str, params: impl Params) -> DbResult<usize> {
        Ok(self.conn.execute(sql, params)?)
    }

    fn commit(mut self) -> DbResult<()> {
        self.conn.execute_batch("COMMIT")?;
        self.finished = true;
        Ok(())
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.conn.execute_batch("ROLLBACK");
        }
    }
}

fn effective_chunk(requested: usize) -> usize {
    if requested == 0 {
        DEFAULT_CHUNK_SIZE
    } else {
        requested
    }
}

/// Serializes a record and extracts its string primary key.
fn encode_record<T: Serialize>(table: &TableDef, item: &T) -> DbResult<(String, String)> {
    let value = serde_json::to_value(item)?;
    let key = value
        .get(table.key_path)
        .and_then(Value::as_str)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| DbError::MissingKey {
            table: table.name.to_string(),
            key_path: table.key_path.to_string(),
        })?
        .to_string();
    Ok((key, serde_json::to_string(&value)?))
}

/// Converts a JSON scalar into a SQLite value for parameter binding.
fn to_sql_value(v: &Value) -> rusqlite::types::Value {
    use rusqlite::types::Value as Sql;
    match v {
        Value::Null => Sql::Null,
        Value::Bool(b) => Sql::Integer(*b as i64),
        Value::Number(n) => n
            .as_i64()
            .map(Sql::Integer)
            .unwrap_or_else(|| Sql::Real(n.as_f64().unwrap_or(0.0))),
        Value::String(s) => Sql::Text(s.clone()),
        other => Sql::Text(other.to_string()),
    }
}
