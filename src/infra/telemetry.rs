use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::application::metrics::{
    METRIC_AUTOSAVE_FAILURES, METRIC_PAGE_REORDERS, METRIC_PAGE_SAVES, METRIC_SAVE_MS,
    METRIC_VERSION_RESTORES, METRIC_VERSIONS_CREATED,
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
            METRIC_PAGE_SAVES,
            Unit::Count,
            "Page writes, labelled by save mode."
        );
        describe_counter!(
            METRIC_AUTOSAVE_FAILURES,
            Unit::Count,
            "Autosaves that failed and left the session dirty."
        );
        describe_counter!(
            METRIC_VERSIONS_CREATED,
            Unit::Count,
            "Version snapshots appended to page history."
        );
        describe_counter!(
            METRIC_VERSION_RESTORES,
            Unit::Count,
            "Completed version restores."
        );
        describe_counter!(
            METRIC_PAGE_REORDERS,
            Unit::Count,
            "Accepted page reorder requests."
        );
        describe_histogram!(
            METRIC_SAVE_MS,
            Unit::Milliseconds,
            "Latency of page saves, labelled by save mode."
        );
    });
}
