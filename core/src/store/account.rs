use super::{record_from_cells, row_lookup, select_columns, RowHandle, SqliteRecordStore};
use crate::{
    account::{AccountRecord, CellValue, Column},
    classifier::RuleContext,
    error::{SentinelError, SentinelResult},
    types::{RowNumber, FIRST_DATA_ROW},
};
use rusqlite::{params, types::Value, Connection, OptionalExtension, Row, ToSql};

impl SqliteRecordStore {
    // ── Reads ─────────────────────────────────────────────────────

    pub(super) fn all_rows(&self) -> SentinelResult<Vec<(RowHandle, AccountRecord)>> {
        let sql = format!(
            "SELECT row_number, version, {} FROM account_row ORDER BY row_number ASC",
            select_columns()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], raw_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows.into_iter().map(decode_row).collect())
    }

    pub fn account_at(&self, row_number: RowNumber) -> SentinelResult<Option<AccountRecord>> {
        let sql = format!(
            "SELECT row_number, version, {} FROM account_row WHERE row_number = ?1",
            select_columns()
        );
        let raw = self.conn.query_row(&sql, [row_number], raw_row).optional()?;
        Ok(raw.map(|raw| decode_row(raw).1))
    }

    /// The rule context stored alongside a RISK draft, if any.
    pub fn risk_context_at(&self, row_number: RowNumber) -> SentinelResult<Option<RuleContext>> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT risk_context FROM account_row WHERE row_number = ?1",
                [row_number],
                |row| row.get(0),
            )
            .optional()?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(json) => Ok(Some(serde_json::from_str(json)?)),
        }
    }

    pub fn handle_at(&self, row_number: RowNumber) -> SentinelResult<Option<RowHandle>> {
        Ok(row_lookup(&self.conn, row_number)?.map(|(company_name, version)| RowHandle {
            row_number,
            company_name,
            version,
        }))
    }

    pub fn account_count(&self) -> SentinelResult<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM account_row", [], |row| row.get(0))
            .map_err(Into::into)
    }

    // ── Inserts ───────────────────────────────────────────────────

    /// Append an account after the last row. Used by imports and tests;
    /// the engine itself never creates rows.
    pub fn insert_account(&self, record: &AccountRecord) -> SentinelResult<RowHandle> {
        let next: i64 = self.conn.query_row(
            "SELECT COALESCE(MAX(row_number) + 1, ?1) FROM account_row",
            [FIRST_DATA_ROW],
            |row| row.get(0),
        )?;
        let status = record.status.map(|s| s.as_str()).unwrap_or("");
        self.conn.execute(
            "INSERT INTO account_row (
                row_number, company_name, csm_name, account_live_date, last_login_date,
                current_mau, avg_mau_12mo, notes, last_outreach_date,
                unanswered_outreach_count, status, rescue_draft, contact_email
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                next,
                &record.company_name,
                &record.csm_name,
                &record.account_live_date,
                &record.last_login_date,
                record.current_mau,
                record.avg_mau_12mo,
                &record.notes,
                &record.last_outreach_date,
                record.unanswered_outreach_count,
                status,
                &record.rescue_draft,
                &record.contact_email,
            ],
        )?;
        Ok(RowHandle {
            row_number:   next as RowNumber,
            company_name: record.company_name.clone(),
            version:      0,
        })
    }

    // ── Writes ────────────────────────────────────────────────────

    pub(super) fn apply_cells(
        &self,
        handle: &RowHandle,
        cells: &[(Column, CellValue)],
    ) -> SentinelResult<RowHandle> {
        let tx = self.conn.unchecked_transaction()?;

        let (row_number, found) = resolve_row(&tx, handle)?;
        if found != handle.version {
            return Err(SentinelError::VersionConflict {
                row:      row_number,
                expected: handle.version,
                found,
            });
        }

        let mut company_name = handle.company_name.clone();
        if cells.is_empty() {
            return Ok(RowHandle { row_number, company_name, version: found });
        }

        // One statement, so the version trigger fires exactly once.
        let assignments = cells
            .iter()
            .enumerate()
            .map(|(i, (column, _))| format!("{} = ?{}", column.sql_name(), i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE account_row SET {assignments} WHERE row_number = ?{}",
            cells.len() + 1
        );
        let mut values: Vec<&dyn ToSql> = cells.iter().map(|(_, v)| v as &dyn ToSql).collect();
        values.push(&row_number);
        tx.execute(&sql, values.as_slice())?;

        for (column, value) in cells {
            if let (Column::CompanyName, CellValue::Text(name)) = (column, value) {
                company_name = name.clone();
            }
        }
        let version = row_lookup(&tx, row_number)?
            .map(|(_, v)| v)
            .ok_or_else(|| SentinelError::RowNotFound {
                row:     row_number,
                company: company_name.clone(),
            })?;
        tx.commit()?;

        Ok(RowHandle { row_number, company_name, version })
    }
}

type RawRow = (RowNumber, i64, Vec<Value>);

fn raw_row(row: &Row<'_>) -> rusqlite::Result<RawRow> {
    let row_number = row.get::<_, i64>(0)? as RowNumber;
    let version: i64 = row.get(1)?;
    let cells = (0..Column::ALL.len())
        .map(|i| row.get::<_, Value>(i + 2))
        .collect::<Result<Vec<_>, _>>()?;
    Ok((row_number, version, cells))
}

fn decode_row((row_number, version, cells): RawRow) -> (RowHandle, AccountRecord) {
    let record = record_from_cells(row_number, &cells);
    let handle = RowHandle {
        row_number,
        company_name: record.company_name.clone(),
        version,
    };
    (handle, record)
}

/// Find the row a handle refers to now. Returns the row number and its
/// current version.
fn resolve_row(conn: &Connection, handle: &RowHandle) -> SentinelResult<(RowNumber, i64)> {
    let at_row = row_lookup(conn, handle.row_number)?;
    if let Some((company, version)) = &at_row {
        if *company == handle.company_name {
            return Ok((handle.row_number, *version));
        }
    }

    let mut stmt =
        conn.prepare("SELECT row_number, version FROM account_row WHERE company_name = ?1")?;
    let matches = stmt
        .query_map([&handle.company_name], |row| {
            Ok((row.get::<_, i64>(0)? as RowNumber, row.get::<_, i64>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    match matches.as_slice() {
        [(row_number, version)] => {
            log::warn!(
                "store: '{}' moved from row {} to row {row_number}",
                handle.company_name,
                handle.row_number,
            );
            Ok((*row_number, *version))
        }
        [] if at_row.is_none() => Err(SentinelError::RowNotFound {
            row:     handle.row_number,
            company: handle.company_name.clone(),
        }),
        _ => Err(SentinelError::StaleRow {
            row:     handle.row_number,
            company: handle.company_name.clone(),
        }),
    }
}
