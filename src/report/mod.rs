//! Weekly Report Generation
//!
//! Batch consumer of the metrics store and the credential registry. Computes
//! a summary document over a date window (call totals, per-owner usage, quota
//! standing with a linear exhaustion projection, fallback and error tables,
//! per-day response times) and renders it to a self-contained HTML page.

pub mod templates;

use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Duration, Utc};
use minijinja::{Environment, context};
use serde::Serialize;
use tracing::debug;

use crate::error::GatewayError;
use crate::metrics::{
    CallLogEntry, DailyResponseTime, FallbackEvent, MetricsStore, UsageStat, current_period,
    format_timestamp,
};
use crate::registry::CredentialRegistry;

/// Rows kept in the fallback and error tables.
const TOP_EVENTS: u32 = 10;

// ---------------------------------------------------------------------------
// Report document
// ---------------------------------------------------------------------------

/// The computed report. Everything here is derived from store queries; the
/// HTML rendering is presentation only.
#[derive(Debug, Clone, Serialize)]
pub struct WeeklyReport {
    pub generated_at: String,
    pub window_start: String,
    pub window_end: String,
    pub days: i64,
    pub total_calls: u64,
    pub successful_calls: u64,
    pub failed_calls: u64,
    /// Percent. 100 when the window has no calls.
    pub success_rate: f64,
    pub total_tokens: u64,
    /// Mean duration weighted by per-row call counts.
    pub avg_duration_ms: f64,
    pub fallback_count: u64,
    pub usage: Vec<UsageStat>,
    pub quota: QuotaStatus,
    pub fallbacks: Vec<FallbackEvent>,
    pub errors: Vec<CallLogEntry>,
    pub response_times: Vec<DailyResponseTime>,
}

/// Primary-provider quota standing for the current billing period.
#[derive(Debug, Clone, Serialize)]
pub struct QuotaStatus {
    pub provider: String,
    pub period: String,
    /// 0 means unlimited.
    pub limit: u64,
    pub used: u64,
    pub remaining: u64,
    pub percent_used: f64,
    /// 100 when unlimited.
    pub percent_remaining: f64,
    /// Set when a limit exists and less than 15% of it remains.
    pub warning: bool,
    pub projection: ExhaustionProjection,
}

/// Linear quota-exhaustion projection from the report window's call rate.
/// The three states are distinct so the renderer never divides by zero and
/// never prints an infinite date.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ExhaustionProjection {
    Unlimited,
    NoUsage,
    Projected {
        daily_rate: f64,
        days_until_exhaustion: f64,
        /// `"YYYY-MM-DD"`.
        exhaustion_date: String,
    },
}

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

pub struct ReportGenerator {
    registry: Arc<CredentialRegistry>,
    metrics: Arc<MetricsStore>,
}

impl ReportGenerator {
    pub fn new(registry: Arc<CredentialRegistry>, metrics: Arc<MetricsStore>) -> Self {
        Self { registry, metrics }
    }

    /// Compute the report over the half-open window `[start, end)`.
    ///
    /// Quota standing always reflects the current billing period, independent
    /// of the window; the projection rate comes from the window's calls.
    pub async fn weekly_report(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<WeeklyReport, GatewayError> {
        let now = Utc::now();
        let days = (end - start).num_days().max(1);

        let usage = self.metrics.usage_stats(start, end, None, None).await?;
        let total_calls: u64 = usage.iter().map(|s| s.total_calls).sum();
        let successful_calls: u64 = usage.iter().map(|s| s.successful_calls).sum();
        let failed_calls = total_calls - successful_calls;
        let total_tokens: u64 = usage.iter().map(|s| s.total_tokens).sum();
        let success_rate = if total_calls == 0 {
            100.0
        } else {
            successful_calls as f64 * 100.0 / total_calls as f64
        };
        let avg_duration_ms = if total_calls == 0 {
            0.0
        } else {
            usage
                .iter()
                .map(|s| s.avg_duration_ms * s.total_calls as f64)
                .sum::<f64>()
                / total_calls as f64
        };

        let provider = self.registry.primary_provider().to_string();
        let period = current_period();
        let limit = self.registry.quota_limit(&provider);
        let used = self.metrics.monthly_usage(&provider, &period).await?;
        let quota = quota_status(provider, period, limit, used, total_calls, days, now);

        let mut fallbacks = self.metrics.fallback_events(start, end).await?;
        let fallback_count = fallbacks.len() as u64;
        fallbacks.truncate(TOP_EVENTS as usize);

        let errors = self.metrics.recent_errors(TOP_EVENTS).await?;
        let response_times = self.metrics.response_times(start, end, None).await?;

        debug!(days, total_calls, fallback_count, "report computed");

        Ok(WeeklyReport {
            generated_at: format_timestamp(now),
            window_start: format_timestamp(start),
            window_end: format_timestamp(end),
            days,
            total_calls,
            successful_calls,
            failed_calls,
            success_rate,
            total_tokens,
            avg_duration_ms,
            fallback_count,
            usage,
            quota,
            fallbacks,
            errors,
            response_times,
        })
    }

    /// Render a computed report through the embedded template.
    pub fn render_html(&self, report: &WeeklyReport) -> Result<String, GatewayError> {
        let tmpl = template_env().get_template("report")?;
        let html = tmpl.render(context! {
            report => minijinja::Value::from_serialize(report),
            version => env!("CARGO_PKG_VERSION"),
        })?;
        Ok(html)
    }
}

/// Build the minijinja environment once; the template is a compile-time
/// constant, so registration cannot fail at runtime.
fn template_env() -> &'static Environment<'static> {
    static ENV: OnceLock<Environment<'static>> = OnceLock::new();
    ENV.get_or_init(|| {
        let mut env = Environment::new();
        env.add_template("report", templates::REPORT_TEMPLATE)
            .expect("report template");
        env
    })
}

fn quota_status(
    provider: String,
    period: String,
    limit: u64,
    used: u64,
    total_calls: u64,
    days: i64,
    now: DateTime<Utc>,
) -> QuotaStatus {
    let remaining = limit.saturating_sub(used);
    let (percent_used, percent_remaining) = if limit == 0 {
        (0.0, 100.0)
    } else {
        (
            used as f64 * 100.0 / limit as f64,
            remaining as f64 * 100.0 / limit as f64,
        )
    };
    let warning = limit > 0 && percent_remaining < 15.0;
    let projection = build_projection(limit, remaining, total_calls, days, now);

    QuotaStatus {
        provider,
        period,
        limit,
        used,
        remaining,
        percent_used,
        percent_remaining,
        warning,
        projection,
    }
}

/// `daily_rate = window calls / days`; exhaustion is `remaining / daily_rate`
/// days from `now`. Zero-rate windows and unlimited quotas get their own
/// states instead of a division. Estimates landing beyond the representable
/// calendar range saturate at the maximum date.
fn build_projection(
    limit: u64,
    remaining: u64,
    total_calls: u64,
    days: i64,
    now: DateTime<Utc>,
) -> ExhaustionProjection {
    if limit == 0 {
        return ExhaustionProjection::Unlimited;
    }
    let daily_rate = total_calls as f64 / days.max(1) as f64;
    if daily_rate == 0.0 {
        return ExhaustionProjection::NoUsage;
    }

    let days_until_exhaustion = remaining as f64 / daily_rate;
    // A slow rate against a huge quota can push the estimate past the
    // representable calendar range; saturate instead of overflowing.
    let exhaustion = Duration::try_seconds((days_until_exhaustion * 86_400.0) as i64)
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC);
    ExhaustionProjection::Projected {
        daily_rate,
        days_until_exhaustion,
        exhaustion_date: exhaustion.format("%Y-%m-%d").to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
