//! SQLite persistence layer.
//!
//! RULE: Only store.rs talks to the database.
//! The pipeline hands finished tables to the store; stages never
//! execute SQL directly.

use crate::{
    dates::parse_date,
    error::PipelineResult,
    table::{Column, FieldKind, RawTable, Table, Value},
};
use chrono::NaiveDateTime;
use rusqlite::{params, params_from_iter, types::ValueRef, Connection, OptionalExtension};

pub struct TableStore {
    conn: Connection,
}

/// Double-quote an identifier for SQLite.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn sql_type(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::Numeric => "REAL",
        _ => "TEXT",
    }
}

fn to_sql(value: &Value) -> rusqlite::types::Value {
    use rusqlite::types::Value as Sql;
    match value {
        Value::Missing => Sql::Null,
        Value::Number(n) => Sql::Real(*n),
        Value::Text(s) => Sql::Text(s.clone()),
        Value::Date(_) => Sql::Text(value.render()),
    }
}

/// Cell as stored, with no declared kind. Used for raw input tables.
fn from_sql_raw(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null | ValueRef::Blob(_) => Value::Missing,
        ValueRef::Integer(i) => Value::Number(i as f64),
        ValueRef::Real(f) => Value::Number(f),
        ValueRef::Text(t) => Value::text(String::from_utf8_lossy(t)),
    }
}

/// Cell as stored, read back under its declared kind.
fn from_sql_typed(value: ValueRef<'_>, kind: FieldKind) -> Value {
    match (from_sql_raw(value), kind) {
        (Value::Text(s), FieldKind::Date) => parse_date(&s).map(Value::Date).unwrap_or(Value::Missing),
        (Value::Text(s), FieldKind::Numeric) => s.parse().map(Value::Number).unwrap_or(Value::Missing),
        (Value::Number(n), FieldKind::Key | FieldKind::Categorical) => {
            Value::Text(crate::normalize::format_code(n))
        }
        (v, _) => v,
    }
}

impl TableStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: &str) -> PipelineResult<Self> {
        let conn = Connection::open(path)?;
        // WAL mode only matters for real files; ignore failures elsewhere.
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> PipelineResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> PipelineResult<()> {
        self.conn
            .execute_batch(include_str!("../migrations/001_pipeline.sql"))?;
        Ok(())
    }

    // ── Runs ───────────────────────────────────────────────────

    pub fn insert_run(&self, run_id: &str, reference_instant: NaiveDateTime, version: &str) -> PipelineResult<()> {
        self.conn.execute(
            "INSERT INTO pipeline_run (run_id, reference_instant, version) VALUES (?1, ?2, ?3)",
            params![run_id, reference_instant.format("%Y-%m-%d %H:%M:%S").to_string(), version],
        )?;
        Ok(())
    }

    pub fn complete_run(&self, run_id: &str, balances_rows: usize, merged_rows: usize) -> PipelineResult<()> {
        self.conn.execute(
            "UPDATE pipeline_run SET balances_rows = ?1, merged_rows = ?2, completed = 1 WHERE run_id = ?3",
            params![balances_rows as i64, merged_rows as i64, run_id],
        )?;
        Ok(())
    }

    pub fn run_completed(&self, run_id: &str) -> PipelineResult<bool> {
        let completed: Option<i64> = self
            .conn
            .query_row(
                "SELECT completed FROM pipeline_run WHERE run_id = ?1",
                params![run_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(completed == Some(1))
    }

    // ── Artifacts ──────────────────────────────────────────────

    /// Persist `table` as SQL table `name`, replacing any previous copy.
    /// All-or-nothing: runs in a single transaction.
    pub fn save_table(&self, run_id: &str, name: &str, table: &Table) -> PipelineResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        let ident = quote_ident(name);
        tx.execute_batch(&format!("DROP TABLE IF EXISTS {ident};"))?;

        let col_defs: Vec<String> = table
            .columns()
            .iter()
            .map(|c| format!("{} {}", quote_ident(&c.name), sql_type(c.kind)))
            .collect();
        tx.execute_batch(&format!("CREATE TABLE {ident} ({});", col_defs.join(", ")))?;

        {
            let placeholders: Vec<String> = (1..=table.width()).map(|i| format!("?{i}")).collect();
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {ident} VALUES ({})",
                placeholders.join(", ")
            ))?;
            for row in table.rows() {
                stmt.execute(params_from_iter(row.iter().map(to_sql)))?;
            }
        }

        tx.execute(
            "INSERT INTO artifact (run_id, name, row_count, col_count) VALUES (?1, ?2, ?3, ?4)",
            params![run_id, name, table.len() as i64, table.width() as i64],
        )?;
        tx.commit()?;
        log::debug!("store: saved {name} ({} rows)", table.len());
        Ok(())
    }

    pub fn artifact_row_count(&self, run_id: &str, name: &str) -> PipelineResult<Option<usize>> {
        let count: Option<i64> = self
            .conn
            .query_row(
                "SELECT row_count FROM artifact WHERE run_id = ?1 AND name = ?2
                 ORDER BY id DESC LIMIT 1",
                params![run_id, name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(count.map(|c| c as usize))
    }

    /// Reload a saved artifact under its known column kinds.
    pub fn load_table(&self, name: &str, columns: &[Column]) -> PipelineResult<Table> {
        let select: Vec<String> = columns.iter().map(|c| quote_ident(&c.name)).collect();
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM {} ORDER BY rowid ASC",
            select.join(", "),
            quote_ident(name)
        ))?;
        let rows = stmt
            .query_map([], |row| {
                columns
                    .iter()
                    .enumerate()
                    .map(|(i, c)| row.get_ref(i).map(|v| from_sql_typed(v, c.kind)))
                    .collect::<Result<Vec<_>, _>>()
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Table::from_rows(name, columns.to_vec(), rows))
    }

    /// Read any SQL table as an untyped raw dataset, for loading inputs
    /// from a database instead of files.
    pub fn load_raw(&self, name: &str) -> PipelineResult<RawTable> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT * FROM {} ORDER BY rowid ASC", quote_ident(name)))?;
        let headers: Vec<String> = stmt.column_names().into_iter().map(str::to_string).collect();
        let width = headers.len();
        let mut raw = RawTable::new(name, headers);
        let rows = stmt
            .query_map([], |row| {
                (0..width)
                    .map(|i| row.get_ref(i).map(from_sql_raw))
                    .collect::<Result<Vec<_>, _>>()
            })?
            .collect::<Result<Vec<_>, _>>()?;
        for row in rows {
            raw.push_row(row);
        }
        Ok(raw)
    }

    /// Store a raw dataset verbatim (text and numbers as given).
    pub fn save_raw(&self, raw: &RawTable) -> PipelineResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        let ident = quote_ident(&raw.name);
        tx.execute_batch(&format!("DROP TABLE IF EXISTS {ident};"))?;
        let col_defs: Vec<String> = raw.headers.iter().map(|h| quote_ident(h)).collect();
        tx.execute_batch(&format!("CREATE TABLE {ident} ({});", col_defs.join(", ")))?;
        {
            let placeholders: Vec<String> = (1..=raw.headers.len()).map(|i| format!("?{i}")).collect();
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {ident} VALUES ({})",
                placeholders.join(", ")
            ))?;
            for row in &raw.rows {
                stmt.execute(params_from_iter(row.iter().map(to_sql)))?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}
