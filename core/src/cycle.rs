//! Cycle controller: one pass over every account in store order.
//!
//! RULES:
//!   - A failed bulk read aborts the cycle before any record is touched.
//!   - Per-record failures are logged, reported and absorbed.
//!   - The cancel flag is honoured between records, never mid-record.
//!   - Two cycles must never run against the same store at once. That is
//!     the runner's job (see `lock::RunLock`), not this module's.

use crate::{
    clock::format_store_date,
    draft::DraftGenerator,
    engine::{ActionEngine, RecordOutcome},
    error::SentinelResult,
    event::CycleEvent,
    store::RecordStore,
    types::CycleId,
};
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub cycle_id:    CycleId,
    pub started_on:  String,
    pub scanned:     usize,
    pub interrupted: bool,
    pub events:      Vec<CycleEvent>,
}

impl CycleReport {
    fn count(&self, event_type: &str) -> usize {
        self.events.iter().filter(|e| e.event_type() == event_type).count()
    }

    pub fn drafted(&self) -> usize { self.count("draft_created") }
    pub fn sent(&self) -> usize { self.count("outreach_sent") }
    pub fn healthy(&self) -> usize { self.count("record_healthy") }
    pub fn skipped(&self) -> usize { self.count("record_skipped") }
    pub fn failed(&self) -> usize { self.count("record_failed") }

    /// Records that received a store write this cycle.
    pub fn writes(&self) -> usize {
        self.drafted() + self.sent()
    }
}

pub struct CycleController<S: RecordStore, G: DraftGenerator> {
    engine: ActionEngine<S, G>,
    cancel: Option<Arc<AtomicBool>>,
}

impl<S: RecordStore, G: DraftGenerator> CycleController<S, G> {
    pub fn new(engine: ActionEngine<S, G>) -> Self {
        Self { engine, cancel: None }
    }

    /// Stop between records once `flag` is set.
    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn engine(&self) -> &ActionEngine<S, G> {
        &self.engine
    }

    fn cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|f| f.load(Ordering::SeqCst))
    }

    pub fn run_cycle(&self, today: NaiveDate) -> SentinelResult<CycleReport> {
        let cycle_id = uuid::Uuid::new_v4().to_string();
        log::info!("cycle {cycle_id}: starting for {today}");

        let rows = self.engine.store().read_all()?;
        let delay = self.engine.config().cycle.write_delay();

        let mut report = CycleReport {
            cycle_id:    cycle_id.clone(),
            started_on:  format_store_date(today),
            scanned:     0,
            interrupted: false,
            events:      Vec::new(),
        };

        for (handle, record) in &rows {
            if self.cancelled() {
                log::warn!(
                    "cycle {cycle_id}: interrupted before row {}; {} of {} rows scanned",
                    handle.row_number,
                    report.scanned,
                    rows.len(),
                );
                report.interrupted = true;
                break;
            }
            report.scanned += 1;

            let row = handle.row_number;
            let company = record.company_name.clone();

            let processed = match self.engine.process(handle, record, today) {
                Ok(p) => p,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    log::error!("cycle {cycle_id}: row {row} ({company}) failed: {e}");
                    report.events.push(CycleEvent::RecordFailed {
                        row,
                        company,
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            for warning in processed.warnings {
                report.events.push(CycleEvent::DataQuality {
                    row,
                    company: company.clone(),
                    warning,
                });
            }

            let wrote = processed.outcome.wrote();
            report.events.push(match processed.outcome {
                RecordOutcome::Drafted { tag, draft_failed } => {
                    CycleEvent::DraftCreated { row, company, tag, draft_failed }
                }
                RecordOutcome::Sent(entry) => CycleEvent::OutreachSent {
                    row,
                    company,
                    contact_email: entry.contact_email,
                    entry_id:      entry.entry_id,
                },
                RecordOutcome::Healthy => CycleEvent::RecordHealthy { row, company },
                RecordOutcome::Skipped(reason) => {
                    CycleEvent::RecordSkipped { row, company, reason }
                }
            });

            if wrote && !delay.is_zero() {
                std::thread::sleep(delay);
            }
        }

        log::info!(
            "cycle {cycle_id}: complete, scanned={} drafted={} sent={} failed={}",
            report.scanned,
            report.drafted(),
            report.sent(),
            report.failed(),
        );

        Ok(report)
    }
}
