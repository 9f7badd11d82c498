//! Read-only status summary: what a dashboard shows.

use crate::{
    account::{AccountRecord, AccountStatus},
    draft::is_error_marker,
    store::RowHandle,
    types::RowNumber,
};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PendingReview {
    pub row:                       RowNumber,
    pub company_name:              String,
    pub unanswered_outreach_count: i64,
    /// First line of the draft, as a one-line headline.
    pub headline:                  String,
    pub draft:                     String,
    pub draft_failed:              bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StatusSummary {
    pub total:        usize,
    pub by_status:    BTreeMap<String, usize>,
    pub unclassified: usize,
    pub pending:      Vec<PendingReview>,
}

impl StatusSummary {
    pub fn from_records(rows: &[(RowHandle, AccountRecord)]) -> Self {
        let mut by_status: BTreeMap<String, usize> = AccountStatus::ALL
            .iter()
            .map(|s| (s.as_str().to_string(), 0))
            .collect();
        let mut unclassified = 0;
        let mut pending = Vec::new();

        for (handle, record) in rows {
            match record.status {
                Some(status) => *by_status.entry(status.as_str().to_string()).or_default() += 1,
                None => unclassified += 1,
            }
            if record.status == Some(AccountStatus::Risk) {
                pending.push(PendingReview {
                    row:                       handle.row_number,
                    company_name:              record.company_name.clone(),
                    unanswered_outreach_count: record.unanswered_outreach_count,
                    headline:                  record
                        .rescue_draft
                        .lines()
                        .next()
                        .unwrap_or("No Draft")
                        .to_string(),
                    draft:                     record.rescue_draft.clone(),
                    draft_failed:              is_error_marker(&record.rescue_draft),
                });
            }
        }

        Self { total: rows.len(), by_status, unclassified, pending }
    }

    pub fn count(&self, status: AccountStatus) -> usize {
        self.by_status.get(status.as_str()).copied().unwrap_or(0)
    }
}
