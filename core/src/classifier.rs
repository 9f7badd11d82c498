//! Risk classifier: maps one account to HEALTHY or RISK.
//!
//! Rules live in an ordered table. Each rule owns its applicability
//! window, its trigger and the context it hands the draft generator.
//! The first rule whose window covers the account decides; the windows
//! are disjoint, so at most one rule can ever fire.
//!
//! Pure: no store access, no logging. Data-quality problems come back
//! as warnings for the caller to report.

use crate::{
    account::{AccountRecord, AccountStatus},
    clock::{elapsed_days, DateQuality},
    config::RiskThresholds,
    error::{SentinelError, SentinelResult},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, str::FromStr};

// ── Tags and context ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleTag {
    NewbieStalled,
    VeteranGhost,
}

impl RuleTag {
    pub fn as_str(self) -> &'static str {
        match self {
            RuleTag::NewbieStalled => "NEWBIE_STALLED",
            RuleTag::VeteranGhost  => "VETERAN_GHOST",
        }
    }
}

impl fmt::Display for RuleTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleTag {
    type Err = SentinelError;

    fn from_str(s: &str) -> SentinelResult<Self> {
        match s {
            "NEWBIE_STALLED" => Ok(RuleTag::NewbieStalled),
            "VETERAN_GHOST"  => Ok(RuleTag::VeteranGhost),
            other => Err(SentinelError::UnknownRuleTag { tag: other.to_string() }),
        }
    }
}

/// Why a rule fired, in the rule's own terms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum RuleContext {
    OnboardingStall {
        tenure_days:           i64,
        days_since_last_login: i64,
    },
    VeteranGhost {
        /// Fractional drop, e.g. 0.6 for a 60% fall.
        drop_pct:   f64,
        unanswered: i64,
    },
}

/// The flat string-keyed view the generator and the store receive.
pub type ContextMap = BTreeMap<String, serde_json::Value>;

impl RuleContext {
    pub fn tag(&self) -> RuleTag {
        match self {
            RuleContext::OnboardingStall { .. } => RuleTag::NewbieStalled,
            RuleContext::VeteranGhost { .. }    => RuleTag::VeteranGhost,
        }
    }

    /// Flatten for prompts. The drop is given as a whole percentage,
    /// truncated: a 57.9% drop reads as 57.
    pub fn to_map(&self) -> ContextMap {
        let mut map = ContextMap::new();
        match self {
            RuleContext::OnboardingStall { tenure_days, days_since_last_login } => {
                map.insert("tenure".into(), (*tenure_days).into());
                map.insert("dsll".into(), (*days_since_last_login).into());
            }
            RuleContext::VeteranGhost { drop_pct, unanswered } => {
                map.insert("drop_pct".into(), ((drop_pct * 100.0) as i64).into());
                map.insert("unanswered".into(), (*unanswered).into());
            }
        }
        map
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuleHit {
    pub tag:     RuleTag,
    pub context: RuleContext,
}

// ── Facts ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataQualityWarning {
    /// A date cell was blank or unparsable and counted as zero days.
    UnreadableDate {
        field:   &'static str,
        quality: DateQuality,
    },
}

/// Everything the rules look at, derived once per account.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountFacts {
    pub tenure_days:           i64,
    pub days_since_last_login: i64,
    pub drop_pct:              f64,
    pub unanswered:            i64,
    pub warnings:              Vec<DataQualityWarning>,
}

impl AccountFacts {
    pub fn derive(record: &AccountRecord, today: NaiveDate) -> Self {
        let mut warnings = Vec::new();

        let tenure = elapsed_days(&record.account_live_date, today);
        if tenure.quality != DateQuality::Valid {
            warnings.push(DataQualityWarning::UnreadableDate {
                field:   "account_live_date",
                quality: tenure.quality,
            });
        }

        let login = elapsed_days(&record.last_login_date, today);
        if login.quality != DateQuality::Valid {
            warnings.push(DataQualityWarning::UnreadableDate {
                field:   "last_login_date",
                quality: login.quality,
            });
        }

        Self {
            tenure_days:           tenure.days,
            days_since_last_login: login.days,
            drop_pct:              drop_fraction(record.avg_mau_12mo, record.current_mau),
            unanswered:            record.unanswered_outreach_count,
            warnings,
        }
    }
}

/// `(avg - current) / avg`, or 0 when there is no baseline.
pub fn drop_fraction(avg_mau: f64, current_mau: f64) -> f64 {
    if avg_mau > 0.0 {
        (avg_mau - current_mau) / avg_mau
    } else {
        0.0
    }
}

// ── Rule table ─────────────────────────────────────────────────────

pub struct Rule {
    pub tag:      RuleTag,
    pub applies:  fn(&AccountFacts, &RiskThresholds) -> bool,
    pub evaluate: fn(&AccountFacts, &RiskThresholds) -> Option<RuleContext>,
}

/// Evaluation order is fixed. New rules are appended.
pub static RULES: [Rule; 2] = [
    Rule {
        tag:      RuleTag::NewbieStalled,
        applies:  |f, t| f.tenure_days < t.onboarding_window_days,
        evaluate: |f, t| {
            (f.days_since_last_login > t.risk_threshold_days).then(|| {
                RuleContext::OnboardingStall {
                    tenure_days:           f.tenure_days,
                    days_since_last_login: f.days_since_last_login,
                }
            })
        },
    },
    Rule {
        tag:      RuleTag::VeteranGhost,
        applies:  |f, t| f.tenure_days >= t.onboarding_window_days,
        evaluate: |f, t| {
            (f.drop_pct > t.mau_drop_threshold && f.unanswered >= t.ghost_threshold).then(|| {
                RuleContext::VeteranGhost {
                    drop_pct:   f.drop_pct,
                    unanswered: f.unanswered,
                }
            })
        },
    },
];

// ── Classification ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub status:   AccountStatus,
    pub hit:      Option<RuleHit>,
    pub warnings: Vec<DataQualityWarning>,
}

impl Classification {
    pub fn is_risk(&self) -> bool {
        self.status == AccountStatus::Risk
    }
}

pub fn classify(
    record: &AccountRecord,
    today: NaiveDate,
    thresholds: &RiskThresholds,
) -> Classification {
    let facts = AccountFacts::derive(record, today);
    let hit = classify_facts(&facts, thresholds);
    Classification {
        status: if hit.is_some() { AccountStatus::Risk } else { AccountStatus::Healthy },
        hit,
        warnings: facts.warnings,
    }
}

pub fn classify_facts(facts: &AccountFacts, thresholds: &RiskThresholds) -> Option<RuleHit> {
    let rule = RULES.iter().find(|r| (r.applies)(facts, thresholds))?;
    (rule.evaluate)(facts, thresholds).map(|context| RuleHit { tag: rule.tag, context })
}
