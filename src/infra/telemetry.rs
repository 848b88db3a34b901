use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, Registry, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

const COUNTERS: [(&str, &str); 5] = [
    (
        "printcss_preview_render_total",
        "Preview passes written to the render surface.",
    ),
    (
        "printcss_conversion_started_total",
        "Conversion jobs submitted to the remote service.",
    ),
    (
        "printcss_conversion_succeeded_total",
        "Conversion jobs whose PDF became the displayed resource.",
    ),
    (
        "printcss_conversion_failed_total",
        "Conversion jobs that ended with an error detail.",
    ),
    (
        "printcss_conversion_discarded_total",
        "Completions dropped because a newer job had started.",
    ),
];

/// Install the global subscriber. Output goes to stderr; stdout belongs to CLI commands.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(output_layer(logging.format))
        .with(filter)
        .with(ErrorLayer::default())
        .try_init()
        .map_err(|err| InfraError::telemetry(format!("subscriber already installed: {err}")))
}

fn output_layer(format: LogFormat) -> Box<dyn Layer<Registry> + Send + Sync> {
    let layer = fmt::layer().with_target(true).with_writer(std::io::stderr);
    match format {
        LogFormat::Json => layer
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .boxed(),
        LogFormat::Compact => layer.compact().boxed(),
    }
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        for (name, help) in COUNTERS {
            describe_counter!(name, Unit::Count, help);
        }
        describe_histogram!(
            "printcss_conversion_ms",
            Unit::Milliseconds,
            "Round trip of one generate_pdf request."
        );
    });
}
