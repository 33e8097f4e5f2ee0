//! Declared table schema for the record database.
//!
//! Tables hold one JSON document per row (`key TEXT PRIMARY KEY,
//! data TEXT NOT NULL`). Secondary indices are SQLite expression indexes
//! over `json_extract`; a multi-entry index covers array-valued fields and
//! is queried through `json_each` instead of a SQL index.

use rusqlite::Connection;

use super::{DbError, DbResult};

/// A secondary index over a field of the stored document.
#[derive(Debug, Clone, Copy)]
pub struct IndexDef {
    /// Index name used in queries.
    pub name: &'static str,
    /// Dot-free field name within the document.
    pub key_path: &'static str,
    /// Array-valued field: lookups match any element.
    pub multi_entry: bool,
}

impl IndexDef {
    pub const fn new(name: &'static str, key_path: &'static str) -> Self {
        Self {
            name,
            key_path,
            multi_entry: false,
        }
    }

    pub const fn multi(name: &'static str, key_path: &'static str) -> Self {
        Self {
            name,
            key_path,
            multi_entry: true,
        }
    }
}

/// A table definition: primary key path plus secondary indices.
#[derive(Debug, Clone, Copy)]
pub struct TableDef {
    pub name: &'static str,
    /// Field of the document used as the primary key. Must be a string.
    pub key_path: &'static str,
    pub indices: &'static [IndexDef],
}

impl TableDef {
    pub fn index(&self, name: &str) -> Option<&IndexDef> {
        self.indices.iter().find(|i| i.name == name)
    }
}

/// The full set of tables a [`super::RecordDatabase`] manages.
#[derive(Debug, Clone, Copy)]
pub struct Schema {
    pub tables: &'static [TableDef],
}

impl Schema {
    pub fn table(&self, name: &str) -> DbResult<&TableDef> {
        self.tables
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| DbError::UnknownTable(name.to_string()))
    }
}

/// Identifiers are interpolated into SQL, so they are restricted to
/// `[A-Za-z_][A-Za-z0-9_]*`.
fn valid_ident(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Creates all declared tables and indices. Idempotent.
pub fn create_schema(conn: &Connection, schema: &Schema) -> DbResult<()> {
    for table in schema.tables {
        if !valid_ident(table.name) || !valid_ident(table.key_path) {
            return Err(DbError::InvalidIdentifier(table.name.to_string()));
        }
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {t} (
                key TEXT PRIMARY KEY,
                data TEXT NOT NULL
            );",
            t = table.name
        ))?;

        for index in table.indices {
            if !valid_ident(index.name) || !valid_ident(index.key_path) {
                return Err(DbError::InvalidIdentifier(index.name.to_string()));
            }
            if index.multi_entry {
                // Queried via json_each; no SQL index is created.
                continue;
            }
            conn.execute_batch(&format!(
                "CREATE INDEX IF NOT EXISTS idx_{t}_{i}
                 ON {t} (json_extract(data, '$.{p}'));",
                t = table.name,
                i = index.name,
                p = index.key_path
            ))?;
        }
    }
    Ok(())
}

/// Returns the `json_extract` expression selecting an indexed field.
pub(super) fn index_expr(table: &TableDef, index: &IndexDef) -> String {
    format!(
        "json_extract({t}.data, '$.{p}')",
        t = table.name,
        p = index.key_path
    )
}
