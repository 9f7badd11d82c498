//! The action engine: drives one account through its lifecycle.
//!
//! TRANSITIONS (checked in this order, once per record per cycle):
//!   1. APPROVED                    → execute send        → SENT
//!   2. SENT                        → skip (terminal)
//!   3. anything else, draft empty  → classify
//!        RISK    → generate draft, persist  → RISK
//!        HEALTHY → no write
//!   4. anything else, draft present → skip (awaiting review)
//!
//! RULES:
//!   - Approval is checked before analysis, so an approved account is
//!     never reclassified in the pass that should send it.
//!   - Every transition is one batched row write. Either all of its
//!     cells land or none do, and a failed write leaves the row exactly
//!     as it was read, ready for the next cycle.
//!   - Draft generation never fails a record; the audit log never
//!     blocks a send.

use crate::{
    account::{AccountRecord, AccountStatus, CellValue, Column},
    classifier::{classify, DataQualityWarning, RuleTag},
    clock::format_store_date,
    config::MonitorConfig,
    draft::{generate_draft, is_error_marker, DraftGenerator, DraftRequest},
    error::SentinelResult,
    store::{RecordStore, RowHandle},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const MISSING_EMAIL: &str = "NO EMAIL FOUND";

/// One row of the sent log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub entry_id:      String,
    pub sent_on:       String,
    pub company_name:  String,
    pub contact_email: String,
    pub draft_body:    String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// SENT is terminal until someone outside the engine intervenes.
    AlreadySent,
    /// A draft is waiting for human review; it is not regenerated.
    DraftPending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Send,
    Analyze,
    Skip(SkipReason),
}

/// Pick the transition for a record from its status and draft cell.
pub fn decide(status: Option<AccountStatus>, rescue_draft: &str) -> Step {
    match status {
        Some(AccountStatus::Approved) => Step::Send,
        Some(AccountStatus::Sent) => Step::Skip(SkipReason::AlreadySent),
        _ if rescue_draft.is_empty() => Step::Analyze,
        _ => Step::Skip(SkipReason::DraftPending),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    Drafted {
        tag:           RuleTag,
        /// The draft is an error marker rather than generated text.
        draft_failed:  bool,
    },
    Healthy,
    Sent(AuditEntry),
    Skipped(SkipReason),
}

impl RecordOutcome {
    pub fn wrote(&self) -> bool {
        matches!(self, RecordOutcome::Drafted { .. } | RecordOutcome::Sent(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Processed {
    pub outcome:  RecordOutcome,
    pub warnings: Vec<DataQualityWarning>,
}

impl From<RecordOutcome> for Processed {
    fn from(outcome: RecordOutcome) -> Self {
        Self { outcome, warnings: Vec::new() }
    }
}

pub struct ActionEngine<S: RecordStore, G: DraftGenerator> {
    store:     S,
    generator: G,
    config:    MonitorConfig,
}

impl<S: RecordStore, G: DraftGenerator> ActionEngine<S, G> {
    pub fn new(store: S, generator: G, config: MonitorConfig) -> Self {
        Self { store, generator, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Run the transition this record is due for.
    pub fn process(
        &self,
        handle: &RowHandle,
        record: &AccountRecord,
        today: NaiveDate,
    ) -> SentinelResult<Processed> {
        match decide(record.status, &record.rescue_draft) {
            Step::Send => {
                let entry = self.execute_send(handle, record, today)?;
                Ok(RecordOutcome::Sent(entry).into())
            }
            Step::Analyze => self.analyze(handle, record, today),
            Step::Skip(reason) => {
                log::debug!(
                    "engine: row {} ({}) skipped: {reason:?}",
                    handle.row_number,
                    record.company_name,
                );
                Ok(RecordOutcome::Skipped(reason).into())
            }
        }
    }

    /// Classify and, when at risk, persist a fresh draft.
    pub fn analyze(
        &self,
        handle: &RowHandle,
        record: &AccountRecord,
        today: NaiveDate,
    ) -> SentinelResult<Processed> {
        let classification = classify(record, today, &self.config.thresholds);
        for warning in &classification.warnings {
            log::warn!(
                "engine: row {} ({}) data quality: {warning:?}",
                handle.row_number,
                record.company_name,
            );
        }

        let Some(hit) = classification.hit else {
            return Ok(Processed {
                outcome:  RecordOutcome::Healthy,
                warnings: classification.warnings,
            });
        };

        let request = DraftRequest {
            company: record.company_name.clone(),
            agent:   record.csm_name.clone(),
            tag:     hit.tag,
            context: hit.context.to_map(),
        };
        let draft = generate_draft(&self.generator, &request, &self.config.generator);
        let draft_failed = is_error_marker(&draft);
        let context_json = serde_json::to_string(&hit.context)?;

        self.store.write_cells(
            handle,
            &[
                (Column::Status, AccountStatus::Risk.into()),
                (Column::RescueDraft, draft.into()),
                (Column::RiskContext, context_json.into()),
            ],
        )?;

        log::info!(
            "engine: row {} ({}) flagged RISK/{}{}",
            handle.row_number,
            record.company_name,
            hit.tag,
            if draft_failed { " with failed draft" } else { "" },
        );

        Ok(Processed {
            outcome:  RecordOutcome::Drafted { tag: hit.tag, draft_failed },
            warnings: classification.warnings,
        })
    }

    /// Carry out an approved outreach and record it.
    ///
    /// The audit append is best-effort. The row update is not: if it
    /// fails the error is returned and the row stays APPROVED with its
    /// draft, so the next cycle retries the send.
    pub fn execute_send(
        &self,
        handle: &RowHandle,
        record: &AccountRecord,
        today: NaiveDate,
    ) -> SentinelResult<AuditEntry> {
        let sent_on = format_store_date(today);
        let unanswered = record.unanswered_outreach_count.saturating_add(1);
        let contact_email = record
            .contact_email
            .clone()
            .unwrap_or_else(|| MISSING_EMAIL.to_string());

        if record.rescue_draft.is_empty() {
            log::warn!(
                "engine: row {} ({}) approved with an empty draft",
                handle.row_number,
                record.company_name,
            );
        }

        let entry = AuditEntry {
            entry_id:      uuid::Uuid::new_v4().to_string(),
            sent_on:       sent_on.clone(),
            company_name:  record.company_name.clone(),
            contact_email: contact_email.clone(),
            draft_body:    record.rescue_draft.clone(),
        };

        log::info!("outreach: sending to {contact_email} ({})", record.company_name);

        if self.config.cycle.audit_log_enabled {
            if let Err(e) = self.store.append_log_row(&entry) {
                log::warn!(
                    "engine: could not append sent log for {}: {e}",
                    record.company_name,
                );
            }
        }

        self.store.write_cells(
            handle,
            &[
                (Column::LastOutreachDate, sent_on.into()),
                (Column::UnansweredOutreachCount, unanswered.into()),
                (Column::Status, AccountStatus::Sent.into()),
                (Column::RescueDraft, CellValue::Empty),
                (Column::RiskContext, CellValue::Empty),
            ],
        )?;

        log::info!(
            "engine: row {} ({}) SENT, unanswered now {unanswered}",
            handle.row_number,
            record.company_name,
        );

        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approval_wins_over_pending_draft() {
        assert_eq!(decide(Some(AccountStatus::Approved), "Hi"), Step::Send);
        assert_eq!(decide(Some(AccountStatus::Approved), ""), Step::Send);
    }

    #[test]
    fn sent_is_terminal() {
        assert_eq!(decide(Some(AccountStatus::Sent), ""), Step::Skip(SkipReason::AlreadySent));
    }

    #[test]
    fn empty_draft_is_analysed_whatever_the_status() {
        assert_eq!(decide(None, ""), Step::Analyze);
        assert_eq!(decide(Some(AccountStatus::Healthy), ""), Step::Analyze);
        assert_eq!(decide(Some(AccountStatus::Risk), ""), Step::Analyze);
    }

    #[test]
    fn pending_draft_is_left_alone() {
        assert_eq!(decide(Some(AccountStatus::Risk), "Hi"), Step::Skip(SkipReason::DraftPending));
        assert_eq!(decide(None, "Hi"), Step::Skip(SkipReason::DraftPending));
    }
}
