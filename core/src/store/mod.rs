//! Record store adapter.
//!
//! RULE: Only the store talks to the database.
//! The engine goes through the `RecordStore` trait and never runs SQL.
//! Rows are addressed by handle, never reordered and never deleted.

use crate::{
    account::{AccountRecord, CellValue, Column, StatusCell},
    engine::AuditEntry,
    error::SentinelResult,
    types::RowNumber,
};
use rusqlite::{
    types::{ToSqlOutput, Value, ValueRef},
    Connection, OptionalExtension, ToSql,
};

mod account;
mod audit;

/// Where a record was read from, and which version was seen.
///
/// The handle is re-resolved on every write: if the row number no longer
/// holds the same company the write follows the company, and if the row
/// was edited since the read the write is refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowHandle {
    pub row_number:   RowNumber,
    pub company_name: String,
    pub version:      i64,
}

/// The capabilities the engine needs from the account store.
pub trait RecordStore {
    /// Every account row in store order.
    fn read_all(&self) -> SentinelResult<Vec<(RowHandle, AccountRecord)>>;

    /// Apply all cells to one row, or none of them. Returns the handle
    /// for the row's new version.
    fn write_cells(
        &self,
        handle: &RowHandle,
        cells: &[(Column, CellValue)],
    ) -> SentinelResult<RowHandle>;

    fn write_cell(
        &self,
        handle: &RowHandle,
        column: Column,
        value: CellValue,
    ) -> SentinelResult<RowHandle> {
        self.write_cells(handle, &[(column, value)])
    }

    /// Append one entry to the secondary audit surface.
    fn append_log_row(&self, entry: &AuditEntry) -> SentinelResult<()>;
}

impl<S: RecordStore + ?Sized> RecordStore for &S {
    fn read_all(&self) -> SentinelResult<Vec<(RowHandle, AccountRecord)>> {
        (**self).read_all()
    }

    fn write_cells(
        &self,
        handle: &RowHandle,
        cells: &[(Column, CellValue)],
    ) -> SentinelResult<RowHandle> {
        (**self).write_cells(handle, cells)
    }

    fn append_log_row(&self, entry: &AuditEntry) -> SentinelResult<()> {
        (**self).append_log_row(entry)
    }
}

// ── SQLite implementation ──────────────────────────────────────────

pub struct SqliteRecordStore {
    conn: Connection,
    path: Option<String>, // None for :memory:
}

impl SqliteRecordStore {
    pub fn open(path: &str) -> SentinelResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files; :memory: ignores it.
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Ok(Self { conn, path: Some(path.to_string()) })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> SentinelResult<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn, path: None })
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> SentinelResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_account_rows.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_sent_log.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/003_version_trigger.sql"))?;
        Ok(())
    }
}

impl RecordStore for SqliteRecordStore {
    fn read_all(&self) -> SentinelResult<Vec<(RowHandle, AccountRecord)>> {
        self.all_rows()
    }

    fn write_cells(
        &self,
        handle: &RowHandle,
        cells: &[(Column, CellValue)],
    ) -> SentinelResult<RowHandle> {
        self.apply_cells(handle, cells)
    }

    fn append_log_row(&self, entry: &AuditEntry) -> SentinelResult<()> {
        self.insert_sent_log(entry)
    }
}

// ── Cell conversion ────────────────────────────────────────────────

impl ToSql for CellValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            CellValue::Empty      => ToSqlOutput::Borrowed(ValueRef::Text(b"")),
            CellValue::Text(s)    => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            CellValue::Integer(n) => ToSqlOutput::Owned(Value::Integer(*n)),
            CellValue::Real(x)    => ToSqlOutput::Owned(Value::Real(*x)),
        })
    }
}

/// Cells are read leniently: a numeric column holding stray text reads
/// as zero instead of failing the whole bulk read.
pub(crate) fn cell_text(v: &Value) -> String {
    match v {
        Value::Null       => String::new(),
        Value::Integer(n) => n.to_string(),
        Value::Real(x)    => x.to_string(),
        Value::Text(s)    => s.clone(),
        Value::Blob(b)    => String::from_utf8_lossy(b).into_owned(),
    }
}

pub(crate) fn cell_f64(v: &Value) -> f64 {
    match v {
        Value::Integer(n) => *n as f64,
        Value::Real(x)    => *x,
        Value::Text(s)    => s.trim().replace(',', "").parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

pub(crate) fn cell_i64(v: &Value) -> i64 {
    match v {
        Value::Integer(n) => *n,
        Value::Real(x)    => *x as i64,
        Value::Text(s)    => s.trim().parse::<f64>().map(|x| x as i64).unwrap_or(0),
        _ => 0,
    }
}

pub(crate) fn record_from_cells(row_number: RowNumber, cells: &[Value]) -> AccountRecord {
    let at = |c: Column| &cells[c.index() as usize - 1];

    let status_cell = StatusCell::parse(&cell_text(at(Column::Status)));
    if let StatusCell::Unrecognised(raw) = &status_cell {
        log::warn!("store: row {row_number} has unrecognised status '{raw}', treating as unclassified");
    }

    let email = cell_text(at(Column::ContactEmail));

    AccountRecord {
        company_name:              cell_text(at(Column::CompanyName)),
        csm_name:                  cell_text(at(Column::CsmName)),
        account_live_date:         cell_text(at(Column::AccountLiveDate)),
        last_login_date:           cell_text(at(Column::LastLoginDate)),
        current_mau:               cell_f64(at(Column::CurrentMau)),
        avg_mau_12mo:              cell_f64(at(Column::AvgMau12Mo)),
        notes:                     cell_text(at(Column::Notes)),
        last_outreach_date:        cell_text(at(Column::LastOutreachDate)),
        unanswered_outreach_count: cell_i64(at(Column::UnansweredOutreachCount)),
        status:                    status_cell.status(),
        rescue_draft:              cell_text(at(Column::RescueDraft)),
        contact_email:             (!email.trim().is_empty()).then_some(email),
    }
}

/// The SELECT list matching `record_from_cells`, in column order.
pub(crate) fn select_columns() -> String {
    Column::ALL
        .iter()
        .map(|c| c.sql_name())
        .collect::<Vec<_>>()
        .join(", ")
}

pub(crate) fn row_lookup(
    conn: &Connection,
    row_number: RowNumber,
) -> SentinelResult<Option<(String, i64)>> {
    conn.query_row(
        "SELECT company_name, version FROM account_row WHERE row_number = ?1",
        [row_number],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )
    .optional()
    .map_err(Into::into)
}
