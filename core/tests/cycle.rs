//! Full cycles over a populated store.

use chrono::{Duration, NaiveDate};
use sentinel_core::{
    account::{AccountRecord, AccountStatus, CellValue, Column},
    clock::format_store_date,
    config::MonitorConfig,
    cycle::CycleController,
    draft::{DraftGenerator, Prompt},
    engine::{ActionEngine, AuditEntry, SkipReason},
    error::{SentinelError, SentinelResult},
    event::CycleEvent,
    store::{RecordStore, RowHandle, SqliteRecordStore},
    summary::StatusSummary,
};
use std::{
    cell::Cell,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 6, 1).unwrap()
}

fn days_ago(n: i64) -> String {
    format_store_date(today() - Duration::days(n))
}

fn store() -> SqliteRecordStore {
    let _ = env_logger::builder().is_test(true).try_init();
    let store = SqliteRecordStore::in_memory().expect("in-memory store");
    store.migrate().expect("migration");
    store
}

/// Counts calls; optionally raises a flag on the first one.
#[derive(Default)]
struct CountingGenerator {
    calls:       Cell<u32>,
    cancel_with: Option<Arc<AtomicBool>>,
}

impl DraftGenerator for CountingGenerator {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn complete(&self, _prompt: &Prompt) -> SentinelResult<String> {
        self.calls.set(self.calls.get() + 1);
        if let Some(flag) = &self.cancel_with {
            flag.store(true, Ordering::SeqCst);
        }
        Ok(format!("Subject: checking in ({})", self.calls.get()))
    }
}

/// Fails every write to one company; everything else passes through.
struct BrokenRowStore<'a> {
    inner:   &'a SqliteRecordStore,
    company: &'static str,
}

impl RecordStore for BrokenRowStore<'_> {
    fn read_all(&self) -> SentinelResult<Vec<(RowHandle, AccountRecord)>> {
        self.inner.read_all()
    }

    fn write_cells(
        &self,
        handle: &RowHandle,
        cells: &[(Column, CellValue)],
    ) -> SentinelResult<RowHandle> {
        if handle.company_name == self.company {
            return Err(SentinelError::Other(anyhow::anyhow!("quota exceeded")));
        }
        self.inner.write_cells(handle, cells)
    }

    fn append_log_row(&self, entry: &AuditEntry) -> SentinelResult<()> {
        self.inner.append_log_row(entry)
    }
}

/// Cannot be read at all.
struct UnreadableStore;

impl RecordStore for UnreadableStore {
    fn read_all(&self) -> SentinelResult<Vec<(RowHandle, AccountRecord)>> {
        Err(SentinelError::Other(anyhow::anyhow!("permission denied")))
    }

    fn write_cells(&self, _: &RowHandle, _: &[(Column, CellValue)]) -> SentinelResult<RowHandle> {
        panic!("nothing may be written after a failed read")
    }

    fn append_log_row(&self, _: &AuditEntry) -> SentinelResult<()> {
        panic!("nothing may be logged after a failed read")
    }
}

fn stalled(company: &str) -> AccountRecord {
    let mut r = AccountRecord::new(company, "Dana");
    r.account_live_date = days_ago(10);
    r.last_login_date = days_ago(25);
    r
}

fn healthy(company: &str) -> AccountRecord {
    let mut r = AccountRecord::new(company, "Lee");
    r.account_live_date = days_ago(30);
    r.last_login_date = days_ago(1);
    r
}

fn approved(company: &str, unanswered: i64) -> AccountRecord {
    let mut r = healthy(company);
    r.status = Some(AccountStatus::Approved);
    r.rescue_draft = "Hi, can we help?".into();
    r.unanswered_outreach_count = unanswered;
    r.contact_email = Some(format!("cs@{}.test", company.to_lowercase()));
    r
}

fn sent(company: &str) -> AccountRecord {
    let mut r = stalled(company);
    r.status = Some(AccountStatus::Sent);
    r.unanswered_outreach_count = 4;
    r
}

fn versions(store: &SqliteRecordStore) -> Vec<i64> {
    store.read_all().unwrap().into_iter().map(|(h, _)| h.version).collect()
}

// ── Cycles ───────────────────────────────────────────────────────────────────

/// One pass handles every kind of row in store order.
#[test]
fn mixed_portfolio_cycle() {
    let store = store();
    store.insert_account(&stalled("Brightside")).unwrap();
    store.insert_account(&healthy("Calm")).unwrap();
    store.insert_account(&approved("Acme", 5)).unwrap();
    store.insert_account(&sent("Dormant")).unwrap();
    let gen = CountingGenerator::default();
    let controller =
        CycleController::new(ActionEngine::new(&store, &gen, MonitorConfig::default_test()));

    let report = controller.run_cycle(today()).unwrap();

    assert_eq!(report.scanned, 4);
    assert!(!report.interrupted);
    assert_eq!(report.drafted(), 1);
    assert_eq!(report.healthy(), 1);
    assert_eq!(report.sent(), 1);
    assert_eq!(report.skipped(), 1);
    assert_eq!(report.failed(), 0);
    assert_eq!(report.writes(), 2);
    let rows: Vec<_> = report.events.iter().map(CycleEvent::row).collect();
    assert_eq!(rows, vec![2, 3, 4, 5]);
    assert_eq!(gen.calls.get(), 1);

    let summary = StatusSummary::from_records(&store.read_all().unwrap());
    assert_eq!(summary.count(AccountStatus::Risk), 1);
    assert_eq!(summary.count(AccountStatus::Sent), 2);
    assert_eq!(summary.unclassified, 1);
    assert_eq!(summary.pending.len(), 1);
    assert_eq!(summary.pending[0].company_name, "Brightside");
    assert_eq!(summary.pending[0].headline, "Subject: checking in (1)");
}

/// Scenario: APPROVED, 5 unanswered → SENT, 6 unanswered, one log entry.
#[test]
fn approved_account_is_sent_once() {
    let store = store();
    store.insert_account(&approved("Acme", 5)).unwrap();
    let gen = CountingGenerator::default();
    let controller =
        CycleController::new(ActionEngine::new(&store, &gen, MonitorConfig::default_test()));

    controller.run_cycle(today()).unwrap();
    let second = controller.run_cycle(today()).unwrap();

    let (_, record) = &store.read_all().unwrap()[0];
    assert_eq!(record.status, Some(AccountStatus::Sent));
    assert_eq!(record.unanswered_outreach_count, 6);
    assert_eq!(record.rescue_draft, "");
    assert_eq!(record.last_outreach_date, "2026-06-01");
    assert_eq!(store.sent_log_count().unwrap(), 1);
    assert_eq!(second.sent(), 0);
    assert_eq!(second.skipped(), 1);
}

/// Scenario: a SENT row is never written, whatever its other fields say.
#[test]
fn sent_rows_are_never_written() {
    let store = store();
    store.insert_account(&sent("Dormant")).unwrap();
    let gen = CountingGenerator::default();
    let controller =
        CycleController::new(ActionEngine::new(&store, &gen, MonitorConfig::default_test()));

    let report = controller.run_cycle(today()).unwrap();

    assert_eq!(
        report.events,
        vec![CycleEvent::RecordSkipped {
            row:     2,
            company: "Dormant".into(),
            reason:  SkipReason::AlreadySent,
        }]
    );
    assert_eq!(versions(&store), vec![0]);
    assert_eq!(gen.calls.get(), 0);
}

/// A second cycle on unchanged data performs no writes at all.
#[test]
fn rerun_without_human_action_is_idempotent() {
    let store = store();
    store.insert_account(&stalled("Brightside")).unwrap();
    store.insert_account(&healthy("Calm")).unwrap();
    store.insert_account(&sent("Dormant")).unwrap();
    let gen = CountingGenerator::default();
    let controller =
        CycleController::new(ActionEngine::new(&store, &gen, MonitorConfig::default_test()));

    controller.run_cycle(today()).unwrap();
    let after_first = store.read_all().unwrap();
    let second = controller.run_cycle(today()).unwrap();

    assert_eq!(second.writes(), 0);
    assert_eq!(store.read_all().unwrap(), after_first);
    assert_eq!(gen.calls.get(), 1);
}

/// The human approval between two cycles is what triggers the send.
#[test]
fn approval_between_cycles_triggers_send() {
    let store = store();
    store.insert_account(&stalled("Brightside")).unwrap();
    let gen = CountingGenerator::default();
    let controller =
        CycleController::new(ActionEngine::new(&store, &gen, MonitorConfig::default_test()));

    controller.run_cycle(today()).unwrap();
    let (handle, record) = store.read_all().unwrap().remove(0);
    assert_eq!(record.status, Some(AccountStatus::Risk));
    store
        .write_cell(&handle, Column::Status, AccountStatus::Approved.into())
        .unwrap();

    let report = controller.run_cycle(today()).unwrap();

    assert_eq!(report.sent(), 1);
    let log = store.sent_log().unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].draft_body, record.rescue_draft);
    assert_eq!(log[0].company_name, "Brightside");
}

/// One broken row is reported; the rest of the cycle carries on.
#[test]
fn per_record_failure_is_absorbed() {
    let store = store();
    store.insert_account(&stalled("Broken")).unwrap();
    store.insert_account(&stalled("Fine")).unwrap();
    let broken = BrokenRowStore { inner: &store, company: "Broken" };
    let gen = CountingGenerator::default();
    let controller =
        CycleController::new(ActionEngine::new(&broken, &gen, MonitorConfig::default_test()));

    let report = controller.run_cycle(today()).unwrap();

    assert_eq!(report.scanned, 2);
    assert_eq!(report.failed(), 1);
    assert_eq!(report.drafted(), 1);
    match &report.events[0] {
        CycleEvent::RecordFailed { row, error, .. } => {
            assert_eq!(*row, 2);
            assert!(error.contains("quota exceeded"));
        }
        other => panic!("unexpected event {other:?}"),
    }
    let rows = store.read_all().unwrap();
    assert_eq!(rows[0].1.status, None);
    assert_eq!(rows[1].1.status, Some(AccountStatus::Risk));
}

/// A failed bulk read aborts before any record is processed.
#[test]
fn unreadable_store_aborts_the_cycle() {
    let gen = CountingGenerator::default();
    let controller =
        CycleController::new(ActionEngine::new(UnreadableStore, &gen, MonitorConfig::default_test()));

    let err = controller.run_cycle(today()).unwrap_err();
    assert!(err.to_string().contains("permission denied"));
    assert_eq!(gen.calls.get(), 0);
}

/// Cancellation lands between records, never inside one.
#[test]
fn cancel_stops_between_records() {
    let store = store();
    store.insert_account(&stalled("First")).unwrap();
    store.insert_account(&stalled("Second")).unwrap();
    let flag = Arc::new(AtomicBool::new(false));
    let gen = CountingGenerator { cancel_with: Some(flag.clone()), ..Default::default() };
    let controller =
        CycleController::new(ActionEngine::new(&store, &gen, MonitorConfig::default_test()))
            .with_cancel(flag);

    let report = controller.run_cycle(today()).unwrap();

    assert!(report.interrupted);
    assert_eq!(report.scanned, 1);
    assert_eq!(report.drafted(), 1);
    let rows = store.read_all().unwrap();
    assert_eq!(rows[0].1.status, Some(AccountStatus::Risk));
    assert!(!rows[0].1.rescue_draft.is_empty());
    assert_eq!(rows[1].1.status, None);
}

/// Unreadable dates surface as data-quality events next to the outcome.
#[test]
fn data_quality_warnings_are_reported() {
    let store = store();
    let mut r = healthy("Messy");
    r.last_login_date = "yesterday".into();
    store.insert_account(&r).unwrap();
    let gen = CountingGenerator::default();
    let controller =
        CycleController::new(ActionEngine::new(&store, &gen, MonitorConfig::default_test()));

    let report = controller.run_cycle(today()).unwrap();

    assert_eq!(report.healthy(), 1);
    assert!(report
        .events
        .iter()
        .any(|e| matches!(e, CycleEvent::DataQuality { row: 2, .. })));
}
