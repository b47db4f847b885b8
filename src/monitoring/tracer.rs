/*!
 * Structured Tracing
 *
 * Subscriber setup for embedders and the per-completion timing report the
 * dispatcher emits.
 */

use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a global subscriber
///
/// Environment variables:
/// - RUST_LOG: log filter (default: info)
/// - SLOTFS_TRACE_JSON: JSON output when `1` or `true` (default: false)
///
/// Does nothing if a global subscriber is already set.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = std::env::var("SLOTFS_TRACE_JSON")
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_names(true)
                    .with_current_span(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
            .is_ok()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_names(true)
                    .compact(),
            )
            .try_init()
            .is_ok()
    };

    if installed {
        info!(json = use_json, "Tracing initialized");
    }
}

/// Timing of one dispatched completion
#[derive(Debug, Clone, Copy)]
pub struct CompletionReport<'a> {
    pub id: u32,
    pub op: &'a str,
    pub result: i64,
    pub elapsed: Duration,
}

impl CompletionReport<'_> {
    #[inline]
    pub fn is_slow(&self, threshold: Duration) -> bool {
        self.elapsed > threshold
    }
}

/// Log a completion: `warn!` above `threshold`, `debug!` otherwise
pub fn report_completion(report: CompletionReport<'_>, threshold: Duration) {
    if report.is_slow(threshold) {
        warn!(
            id = report.id,
            op = report.op,
            result = report.result,
            duration_ms = report.elapsed.as_millis() as u64,
            slow = true,
            "slow filesystem operation"
        );
    } else {
        debug!(
            id = report.id,
            op = report.op,
            result = report.result,
            elapsed_us = report.elapsed.as_micros() as u64,
            "operation completed"
        );
    }
}
