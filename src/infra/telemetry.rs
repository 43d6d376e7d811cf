use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install the global tracing subscriber and register metric descriptions.
///
/// `RUST_LOG` directives override the configured level. sqlx statement
/// logging is capped at `warn`.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let quiet_sqlx = "sqlx=warn"
        .parse()
        .map_err(|err| InfraError::telemetry(format!("invalid default directive: {err}")))?;
    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy()
        .add_directive(quiet_sqlx);

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "fernlog_page_cache_hit_total",
            Unit::Count,
            "Listing pages served from the page cache."
        );
        describe_counter!(
            "fernlog_page_cache_miss_total",
            Unit::Count,
            "Listing pages computed because no fresh cached copy existed."
        );
        describe_counter!(
            "fernlog_page_cache_expired_total",
            Unit::Count,
            "Cached listing pages dropped because their TTL had elapsed."
        );
        describe_counter!(
            "fernlog_page_cache_evict_total",
            Unit::Count,
            "Cached listing pages evicted due to capacity."
        );
        describe_counter!(
            "fernlog_page_cache_compute_error_total",
            Unit::Count,
            "Listing page computations that failed and were not cached."
        );
        describe_gauge!(
            "fernlog_page_cache_entries",
            Unit::Count,
            "Current number of cached listing pages."
        );
        describe_histogram!(
            "fernlog_http_request_duration_ms",
            Unit::Milliseconds,
            "HTTP request latency in milliseconds."
        );
    });
}
