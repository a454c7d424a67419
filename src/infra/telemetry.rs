use std::sync::Once;

use metrics::{Unit, describe_counter};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::{
    cache::{METRIC_REGION_REDIRECT_TOTAL, METRIC_REGION_REFRESH_TOTAL},
    config::{LogFormat, LoggingSettings},
    infra::backend::METRIC_TRANSPORT_CACHE_HIT_TOTAL,
};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    // stdout carries command output (`regions`); logs go to stderr.
    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .with_writer(std::io::stderr)
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .with_writer(std::io::stderr)
            .compact()
            .with_target(true)
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
            METRIC_REGION_REFRESH_TOTAL,
            Unit::Count,
            "Region index refresh attempts, labelled by outcome."
        );
        describe_counter!(
            METRIC_REGION_REDIRECT_TOTAL,
            Unit::Count,
            "Locale redirects issued by the region routing layer, labelled by reason."
        );
        describe_counter!(
            METRIC_TRANSPORT_CACHE_HIT_TOTAL,
            Unit::Count,
            "Region list requests answered from the transport cache."
        );
    });
}
