//! Tollgate - AI provider call gateway.
//!
//! Selects among primary-provider credentials, fails over once to a
//! secondary provider, meters usage per (provider, owner, period), and
//! turns the accumulated telemetry into weekly HTML reports.

pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod metrics;
pub mod providers;
pub mod registry;
pub mod report;

pub use crate::config::Config;
pub use crate::db::Database;
pub use crate::error::GatewayError;
pub use crate::gateway::{CallGateway, CallOutcome};
pub use crate::metrics::MetricsStore;
pub use crate::registry::CredentialRegistry;
pub use crate::report::ReportGenerator;
