//! Monitor configuration: thresholds, generator settings, cycle pacing.
//!
//! RULE: Nothing reads thresholds from globals. A `MonitorConfig` is built
//! once by the runner and handed to the classifier and the action engine.

use crate::error::{SentinelError, SentinelResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const API_KEY_VAR: &str = "OPENAI_API_KEY";
pub const STORE_PATH_VAR: &str = "SENTINEL_STORE";

// ── Risk thresholds ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskThresholds {
    /// Days without a login before a new account counts as stalled.
    #[serde(default = "default_risk_threshold_days")]
    pub risk_threshold_days: i64,
    /// Fractional MAU drop a veteran account must exceed.
    #[serde(default = "default_mau_drop_threshold")]
    pub mau_drop_threshold: f64,
    /// Unanswered outreach count at which a veteran counts as ghosting.
    #[serde(default = "default_ghost_threshold")]
    pub ghost_threshold: i64,
    /// Tenure below which the onboarding rule applies instead of the veteran rule.
    #[serde(default = "default_onboarding_window_days")]
    pub onboarding_window_days: i64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            risk_threshold_days:    default_risk_threshold_days(),
            mau_drop_threshold:     default_mau_drop_threshold(),
            ghost_threshold:        default_ghost_threshold(),
            onboarding_window_days: default_onboarding_window_days(),
        }
    }
}

impl RiskThresholds {
    pub fn validate(&self) -> SentinelResult<()> {
        if self.risk_threshold_days < 0 {
            return Err(invalid(format!(
                "risk_threshold_days must be >= 0, got {}",
                self.risk_threshold_days
            )));
        }
        if !(0.0..=1.0).contains(&self.mau_drop_threshold) {
            return Err(invalid(format!(
                "mau_drop_threshold must be within [0, 1], got {}",
                self.mau_drop_threshold
            )));
        }
        if self.ghost_threshold < 0 {
            return Err(invalid(format!(
                "ghost_threshold must be >= 0, got {}",
                self.ghost_threshold
            )));
        }
        if self.onboarding_window_days <= 0 {
            return Err(invalid(format!(
                "onboarding_window_days must be > 0, got {}",
                self.onboarding_window_days
            )));
        }
        Ok(())
    }
}

fn default_risk_threshold_days() -> i64 { 21 }
fn default_mau_drop_threshold() -> f64 { 0.50 }
fn default_ghost_threshold() -> i64 { 2 }
fn default_onboarding_window_days() -> i64 { 365 }

// ── Draft generator ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneratorConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Calls per draft before falling back to the error marker.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Pause between attempts, so a rate limit has time to clear.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            endpoint:       default_endpoint(),
            model:          default_model(),
            temperature:    default_temperature(),
            max_tokens:     default_max_tokens(),
            timeout_secs:   default_timeout_secs(),
            max_attempts:   default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl GeneratorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

fn default_endpoint() -> String { "https://api.openai.com/v1/chat/completions".into() }
fn default_model() -> String { "gpt-4o".into() }
fn default_temperature() -> f64 { 0.7 }
fn default_max_tokens() -> usize { 512 }
fn default_timeout_secs() -> u64 { 30 }
fn default_max_attempts() -> u32 { 2 }
fn default_retry_delay_ms() -> u64 { 2000 }

// ── Cycle pacing ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CycleConfig {
    /// Pause after every store write, to stay under external rate limits.
    #[serde(default = "default_write_delay_ms")]
    pub write_delay_ms: u64,
    /// When false the send path skips the secondary audit surface entirely.
    #[serde(default = "default_audit_log_enabled")]
    pub audit_log_enabled: bool,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            write_delay_ms:    default_write_delay_ms(),
            audit_log_enabled: default_audit_log_enabled(),
        }
    }
}

impl CycleConfig {
    pub fn write_delay(&self) -> Duration {
        Duration::from_millis(self.write_delay_ms)
    }
}

fn default_write_delay_ms() -> u64 { 1000 }
fn default_audit_log_enabled() -> bool { true }

// ── Top level ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MonitorConfig {
    #[serde(default)]
    pub thresholds: RiskThresholds,
    #[serde(default)]
    pub generator:  GeneratorConfig,
    #[serde(default)]
    pub cycle:      CycleConfig,
}

impl MonitorConfig {
    /// Load from a JSON file. Missing keys fall back to defaults.
    /// In tests, use MonitorConfig::default_test().
    pub fn load(path: &str) -> SentinelResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| invalid(format!("Cannot read {path}: {e}")))?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> SentinelResult<Self> {
        let config: MonitorConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> SentinelResult<()> {
        self.thresholds.validate()?;
        if self.generator.max_attempts == 0 {
            return Err(invalid("generator.max_attempts must be >= 1".into()));
        }
        Ok(())
    }

    /// Config with production thresholds, no write or retry delay and a
    /// single generator attempt. For unit and integration tests.
    pub fn default_test() -> Self {
        Self {
            thresholds: RiskThresholds::default(),
            generator: GeneratorConfig {
                endpoint:       "http://127.0.0.1:9/v1/chat/completions".into(),
                max_attempts:   1,
                timeout_secs:   1,
                retry_delay_ms: 0,
                ..GeneratorConfig::default()
            },
            cycle: CycleConfig {
                write_delay_ms:    0,
                audit_log_enabled: true,
            },
        }
    }
}

fn invalid(reason: String) -> SentinelError {
    SentinelError::InvalidConfig { reason }
}

// ── Credentials ────────────────────────────────────────────────────

/// Secrets needed before a cycle may touch any record.
#[derive(Clone)]
pub struct Credentials {
    pub api_key:    String,
    pub store_path: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("store_path", &self.store_path)
            .finish()
    }
}

impl Credentials {
    /// Read credentials from the process environment, after loading a
    /// `.env` file if one is present.
    pub fn from_env() -> SentinelResult<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Resolve credentials through an arbitrary lookup. Blank values count
    /// as missing.
    pub fn from_lookup<F>(lookup: F) -> SentinelResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let fetch = |name: &'static str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or(SentinelError::MissingCredential { name })
        };
        Ok(Self {
            api_key:    fetch(API_KEY_VAR)?,
            store_path: fetch(STORE_PATH_VAR)?,
        })
    }
}
