use super::SqliteRecordStore;
use crate::{engine::AuditEntry, error::SentinelResult};
use rusqlite::params;

impl SqliteRecordStore {
    // ── Sent log ──────────────────────────────────────────────────

    pub(super) fn insert_sent_log(&self, entry: &AuditEntry) -> SentinelResult<()> {
        self.conn.execute(
            "INSERT INTO sent_log (entry_id, sent_on, company_name, contact_email, draft_body)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                &entry.entry_id,
                &entry.sent_on,
                &entry.company_name,
                &entry.contact_email,
                &entry.draft_body,
            ],
        )?;
        Ok(())
    }

    pub fn sent_log(&self) -> SentinelResult<Vec<AuditEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT entry_id, sent_on, company_name, contact_email, draft_body
             FROM sent_log ORDER BY id ASC",
        )?;
        let entries = stmt
            .query_map([], |row| {
                Ok(AuditEntry {
                    entry_id:      row.get(0)?,
                    sent_on:       row.get(1)?,
                    company_name:  row.get(2)?,
                    contact_email: row.get(3)?,
                    draft_body:    row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn sent_log_count(&self) -> SentinelResult<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM sent_log", [], |row| row.get(0))
            .map_err(Into::into)
    }
}
