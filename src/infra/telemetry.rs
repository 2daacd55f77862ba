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
///
/// Events go to stderr; stdout carries command output such as rendered emails.
/// `RUST_LOG` directives refine the configured level.
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
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed(),
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
            "skprod_cache_hit_total",
            Unit::Count,
            "Total number of tag cache reads served from a live entry."
        );
        describe_counter!(
            "skprod_cache_miss_total",
            Unit::Count,
            "Total number of tag cache reads that found no live entry."
        );
        describe_counter!(
            "skprod_cache_expired_total",
            Unit::Count,
            "Total number of tag cache entries evicted after their TTL elapsed."
        );
        describe_counter!(
            "skprod_cache_invalidated_total",
            Unit::Count,
            "Total number of tag cache entries dropped by tag invalidation."
        );
        describe_counter!(
            "skprod_email_rendered_total",
            Unit::Count,
            "Total number of emails rendered, labelled by template and variant."
        );
        describe_counter!(
            "skprod_email_unavailable_total",
            Unit::Count,
            "Total number of render requests that produced no email, labelled by reason."
        );
    });
}
