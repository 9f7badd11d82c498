//! Account records and the positional column contract of the store.
//!
//! The store predates this crate: columns are addressed by their 1-based
//! position, and those positions must not move.

use serde::{Deserialize, Serialize};
use std::fmt;

// ── Status ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountStatus {
    Healthy,
    Risk,
    Approved,
    Sent,
}

impl AccountStatus {
    pub const ALL: [AccountStatus; 4] = [
        AccountStatus::Healthy,
        AccountStatus::Risk,
        AccountStatus::Approved,
        AccountStatus::Sent,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AccountStatus::Healthy  => "HEALTHY",
            AccountStatus::Risk     => "RISK",
            AccountStatus::Approved => "APPROVED",
            AccountStatus::Sent     => "SENT",
        }
    }

    /// Parse a status cell. Blank and unrecognised text both yield `None`;
    /// use [`StatusCell::parse`] to tell them apart.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "HEALTHY"  => Some(AccountStatus::Healthy),
            "RISK"     => Some(AccountStatus::Risk),
            "APPROVED" => Some(AccountStatus::Approved),
            "SENT"     => Some(AccountStatus::Sent),
            _ => None,
        }
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a raw status cell held.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusCell {
    Known(AccountStatus),
    Blank,
    Unrecognised(String),
}

impl StatusCell {
    pub fn parse(raw: &str) -> Self {
        if raw.trim().is_empty() {
            return StatusCell::Blank;
        }
        match AccountStatus::parse(raw) {
            Some(status) => StatusCell::Known(status),
            None => StatusCell::Unrecognised(raw.to_string()),
        }
    }

    pub fn status(&self) -> Option<AccountStatus> {
        match self {
            StatusCell::Known(s) => Some(*s),
            _ => None,
        }
    }
}

// ── Record ─────────────────────────────────────────────────────────

/// One row of the account store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub company_name:              String,
    #[serde(default)]
    pub csm_name:                  String,
    #[serde(default)]
    pub account_live_date:         String,
    #[serde(default)]
    pub last_login_date:           String,
    #[serde(default)]
    pub current_mau:               f64,
    #[serde(default)]
    pub avg_mau_12mo:              f64,
    #[serde(default)]
    pub notes:                     String,
    #[serde(default)]
    pub last_outreach_date:        String,
    #[serde(default)]
    pub unanswered_outreach_count: i64,
    /// `None` when the cell is blank or holds text outside the lifecycle.
    #[serde(default)]
    pub status:                    Option<AccountStatus>,
    #[serde(default)]
    pub rescue_draft:              String,
    #[serde(default)]
    pub contact_email:             Option<String>,
}

impl AccountRecord {
    /// A bare record with every optional field blank.
    pub fn new(company_name: impl Into<String>, csm_name: impl Into<String>) -> Self {
        Self {
            company_name:              company_name.into(),
            csm_name:                  csm_name.into(),
            account_live_date:         String::new(),
            last_login_date:           String::new(),
            current_mau:               0.0,
            avg_mau_12mo:              0.0,
            notes:                     String::new(),
            last_outreach_date:        String::new(),
            unanswered_outreach_count: 0,
            status:                    None,
            rescue_draft:              String::new(),
            contact_email:             None,
        }
    }

    pub fn has_pending_draft(&self) -> bool {
        !self.rescue_draft.is_empty()
    }
}

// ── Column contract ────────────────────────────────────────────────

/// Fixed 1-based column positions of the account store.
///
/// Positions 1–12 are the legacy sheet layout; 13 is an extension that
/// older readers ignore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    CompanyName,
    CsmName,
    AccountLiveDate,
    LastLoginDate,
    CurrentMau,
    AvgMau12Mo,
    Notes,
    LastOutreachDate,
    UnansweredOutreachCount,
    Status,
    RescueDraft,
    ContactEmail,
    RiskContext,
}

impl Column {
    pub const ALL: [Column; 13] = [
        Column::CompanyName,
        Column::CsmName,
        Column::AccountLiveDate,
        Column::LastLoginDate,
        Column::CurrentMau,
        Column::AvgMau12Mo,
        Column::Notes,
        Column::LastOutreachDate,
        Column::UnansweredOutreachCount,
        Column::Status,
        Column::RescueDraft,
        Column::ContactEmail,
        Column::RiskContext,
    ];

    pub fn index(self) -> u16 {
        match self {
            Column::CompanyName             => 1,
            Column::CsmName                 => 2,
            Column::AccountLiveDate         => 3,
            Column::LastLoginDate           => 4,
            Column::CurrentMau              => 5,
            Column::AvgMau12Mo              => 6,
            Column::Notes                   => 7,
            Column::LastOutreachDate        => 8,
            Column::UnansweredOutreachCount => 9,
            Column::Status                  => 10,
            Column::RescueDraft             => 11,
            Column::ContactEmail            => 12,
            Column::RiskContext             => 13,
        }
    }

    pub fn from_index(index: u16) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.index() == index)
    }

    /// SQL column name in the `account_row` table.
    pub fn sql_name(self) -> &'static str {
        match self {
            Column::CompanyName             => "company_name",
            Column::CsmName                 => "csm_name",
            Column::AccountLiveDate         => "account_live_date",
            Column::LastLoginDate           => "last_login_date",
            Column::CurrentMau              => "current_mau",
            Column::AvgMau12Mo              => "avg_mau_12mo",
            Column::Notes                   => "notes",
            Column::LastOutreachDate        => "last_outreach_date",
            Column::UnansweredOutreachCount => "unanswered_outreach_count",
            Column::Status                  => "status",
            Column::RescueDraft             => "rescue_draft",
            Column::ContactEmail            => "contact_email",
            Column::RiskContext             => "risk_context",
        }
    }

    /// Header label as it appears on row 1 of the legacy sheet.
    pub fn header(self) -> &'static str {
        match self {
            Column::CompanyName             => "Company Name",
            Column::CsmName                 => "CSM Name",
            Column::AccountLiveDate         => "Account Live Date",
            Column::LastLoginDate           => "Last Login Date",
            Column::CurrentMau              => "Current MAU",
            Column::AvgMau12Mo              => "Avg MAU (12mo)",
            Column::Notes                   => "Notes",
            Column::LastOutreachDate        => "Last Outreach Date",
            Column::UnansweredOutreachCount => "Unanswered Outreach Count",
            Column::Status                  => "Status",
            Column::RescueDraft             => "Rescue Draft",
            Column::ContactEmail            => "Contact Email",
            Column::RiskContext             => "Risk Context",
        }
    }
}

/// A value written into a single cell.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Integer(i64),
    Real(f64),
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<i64> for CellValue {
    fn from(n: i64) -> Self {
        CellValue::Integer(n)
    }
}

impl From<AccountStatus> for CellValue {
    fn from(s: AccountStatus) -> Self {
        CellValue::Text(s.as_str().to_string())
    }
}
