//! Cycle events: what happened to each record during one pass.
//!
//! Events are the cycle's only output besides the store itself. Per-record
//! failures surface here and in the logs; they never escape the cycle.

use crate::{
    classifier::{DataQualityWarning, RuleTag},
    engine::SkipReason,
    types::RowNumber,
};
use serde::Serialize;

/// Every event emitted during a cycle.
/// Variants are added over time, never removed or reordered.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CycleEvent {
    DraftCreated {
        row:          RowNumber,
        company:      String,
        tag:          RuleTag,
        draft_failed: bool,
    },
    OutreachSent {
        row:           RowNumber,
        company:       String,
        contact_email: String,
        entry_id:      String,
    },
    RecordHealthy {
        row:     RowNumber,
        company: String,
    },
    RecordSkipped {
        row:     RowNumber,
        company: String,
        reason:  SkipReason,
    },
    RecordFailed {
        row:     RowNumber,
        company: String,
        error:   String,
    },
    DataQuality {
        row:     RowNumber,
        company: String,
        warning: DataQualityWarning,
    },
}

impl CycleEvent {
    pub fn row(&self) -> RowNumber {
        match self {
            CycleEvent::DraftCreated { row, .. }
            | CycleEvent::OutreachSent { row, .. }
            | CycleEvent::RecordHealthy { row, .. }
            | CycleEvent::RecordSkipped { row, .. }
            | CycleEvent::RecordFailed { row, .. }
            | CycleEvent::DataQuality { row, .. } => *row,
        }
    }

    /// Stable name for logs and the report.
    pub fn event_type(&self) -> &'static str {
        match self {
            CycleEvent::DraftCreated { .. }  => "draft_created",
            CycleEvent::OutreachSent { .. }  => "outreach_sent",
            CycleEvent::RecordHealthy { .. } => "record_healthy",
            CycleEvent::RecordSkipped { .. } => "record_skipped",
            CycleEvent::RecordFailed { .. }  => "record_failed",
            CycleEvent::DataQuality { .. }   => "data_quality",
        }
    }
}
