use std::sync::Once;

use metrics::{Unit, describe_counter};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

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
            "foglio_cache_hit_total",
            Unit::Count,
            "Total content-cache hits, labelled by namespace."
        );
        describe_counter!(
            "foglio_cache_miss_total",
            Unit::Count,
            "Total content-cache misses, labelled by namespace."
        );
        describe_counter!(
            "foglio_upstream_query_error_total",
            Unit::Count,
            "Total failed upstream database queries."
        );
        describe_counter!(
            "foglio_page_skipped_total",
            Unit::Count,
            "Total upstream pages dropped after failing validation."
        );
        describe_counter!(
            "foglio_page_degraded_total",
            Unit::Count,
            "Total posts served with empty content after a validation retry."
        );
        describe_counter!(
            "foglio_hook_handler_error_total",
            Unit::Count,
            "Total hook handlers skipped because they returned an error."
        );
    });
}
