//! sentinel-core: account-health monitor.
//!
//! Scans the account store, flags churn risk, drafts remediation emails
//! and executes outreach once a human approves it.

pub mod account;
pub mod classifier;
pub mod clock;
pub mod config;
pub mod cycle;
pub mod draft;
pub mod engine;
pub mod error;
pub mod event;
pub mod lock;
pub mod store;
pub mod summary;
pub mod types;
