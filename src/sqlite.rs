//! Read-only SQLite access for artifact parsers.
//!
//! Connections are plain values owned by the calling plugin, so they are
//! closed when the plugin returns, errors or unwinds.

use crate::plugin::ArtifactTable;
use anyhow::{Context, Result};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags, OptionalExtension};
use std::path::Path;

/// Opens a database without write access.
pub fn open_readonly(path: &Path) -> Result<Connection> {
    let flags = OpenFlags::SQLITE_OPEN_READ_ONLY
        | OpenFlags::SQLITE_OPEN_URI
        | OpenFlags::SQLITE_OPEN_NO_MUTEX;

    Connection::open_with_flags(path, flags)
        .with_context(|| format!("Failed to open database read-only: {:?}", path))
}

pub fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1 COLLATE NOCASE",
            [table],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

pub fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1)")?;
    let names = stmt.query_map([table], |row| row.get::<_, String>(0))?;

    for name in names {
        if name?.eq_ignore_ascii_case(column) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Runs `sql` and collects every row as display strings.
///
/// The statement must yield exactly one column per header.
pub fn query_table<S: AsRef<str>>(conn: &Connection, sql: &str, headers: &[S]) -> Result<ArtifactTable> {
    let mut stmt = conn.prepare(sql).context("Failed to prepare query")?;
    let columns = stmt.column_count();

    if columns != headers.len() {
        anyhow::bail!(
            "Query returns {} columns but {} headers were supplied",
            columns,
            headers.len()
        );
    }

    let mut table = ArtifactTable::new(headers);
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(columns);
        for i in 0..columns {
            values.push(render_value(row.get_ref(i)?));
        }
        table.push_row(values);
    }

    Ok(table)
}

fn render_value(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => String::new(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) => String::from_utf8_lossy(t).into_owned(),
        ValueRef::Blob(b) => format!("<blob {} bytes>", b.len()),
    }
}
