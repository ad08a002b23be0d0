//! Logging and optional OpenTelemetry export

use crate::config::LoggingSettings;
use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

const LOG_FORMAT_ENV: &str = "MEDTRACK_LOG_FORMAT";
const DEFAULT_FILTER: &str = "medtrack=info,tower_http=info";
const LOG_FILE_PREFIX: &str = "medtrack.log";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn env_filter() -> Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_FILTER))
        .context("Failed to create env filter")
}

/// Install the global subscriber
///
/// Console output is `pretty` unless `MEDTRACK_LOG_FORMAT=json`. With
/// `logging.directory` set, JSON lines also go to a daily-rolling file; keep
/// the returned guard alive so buffered lines are flushed on exit.
pub fn init_logging(settings: &LoggingSettings) -> Result<Option<WorkerGuard>> {
    let format = std::env::var(LOG_FORMAT_ENV).unwrap_or_else(|_| settings.format.clone());

    let mut layers: Vec<BoxedLayer> = Vec::new();

    let console = match format.as_str() {
        "json" => fmt::layer().json().with_filter(env_filter()?).boxed(),
        _ => fmt::layer().pretty().with_filter(env_filter()?).boxed(),
    };
    layers.push(console);

    let guard = match &settings.directory {
        Some(dir) => {
            let dir = shellexpand::tilde(dir).into_owned();
            let appender = tracing_appender::rolling::daily(&dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            layers.push(
                fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(writer)
                    .with_filter(env_filter()?)
                    .boxed(),
            );
            Some(guard)
        }
        None => None,
    };

    if let Some(layer) = otel_layer()? {
        layers.push(layer);
    }

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}

/// OTLP span export when `OTEL_EXPORTER_OTLP_ENDPOINT` is set
///
/// `OTEL_SERVICE_NAME` overrides the service name (default `medtrack`).
fn otel_layer() -> Result<Option<BoxedLayer>> {
    let Ok(endpoint) = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT") else {
        return Ok(None);
    };

    #[cfg(feature = "telemetry")]
    {
        Ok(Some(otel_layer_impl(&endpoint)?))
    }

    #[cfg(not(feature = "telemetry"))]
    {
        eprintln!(
            "OTEL_EXPORTER_OTLP_ENDPOINT={} ignored: built without the 'telemetry' feature",
            endpoint
        );
        Ok(None)
    }
}

#[cfg(feature = "telemetry")]
fn otel_layer_impl(endpoint: &str) -> Result<BoxedLayer> {
    use opentelemetry::trace::TracerProvider as _;
    use opentelemetry::KeyValue;
    use opentelemetry_otlp::{SpanExporter, WithExportConfig};
    use opentelemetry_sdk::{runtime, trace::TracerProvider, Resource};

    let service_name =
        std::env::var("OTEL_SERVICE_NAME").unwrap_or_else(|_| "medtrack".to_string());

    let exporter = SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
        .context("Failed to build OTLP exporter")?;

    let provider = TracerProvider::builder()
        .with_batch_exporter(exporter, runtime::Tokio)
        .with_resource(Resource::new(vec![KeyValue::new(
            "service.name",
            service_name.clone(),
        )]))
        .build();
    let tracer = provider.tracer(service_name);
    opentelemetry::global::set_tracer_provider(provider);

    Ok(tracing_opentelemetry::layer()
        .with_tracer(tracer)
        .with_filter(env_filter()?)
        .boxed())
}

/// Flush pending spans
pub fn shutdown_telemetry() {
    #[cfg(feature = "telemetry")]
    opentelemetry::global::shutdown_tracer_provider();
}
