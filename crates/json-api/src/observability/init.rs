//! Subscriber installation and the OTLP trace pipeline.

use std::time::Duration;

use opentelemetry::{KeyValue, global, trace::TracerProvider as _};
use opentelemetry_otlp::WithExportConfig as _;
use opentelemetry_sdk::{
    Resource,
    propagation::TraceContextPropagator,
    trace::{Sampler, SdkTracerProvider},
};
use tracing::{Subscriber, error};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt,
    layer::SubscriberExt as _,
    registry::LookupSpan,
    util::SubscriberInitExt as _,
};

use crate::config::{LogFormat, ServerConfig, observability::ObservabilityConfig};

use super::{ObservabilityError, settings};

/// Namespace shared by every stockroom service in exported traces.
const SERVICE_NAMESPACE: &str = "stockroom";

/// Chatty dependencies held at `warn` unless `RUST_LOG` says otherwise.
const QUIET_TARGETS: [&str; 8] = [
    "h2", "hyper", "tower", "tonic", "opentelemetry", "sqlx", "lapin", "redis",
];

/// Keeps the tracer provider alive until [`Observability::shutdown`] flushes it.
#[derive(Debug)]
pub(crate) struct Observability {
    tracer_provider: Option<SdkTracerProvider>,
}

impl Observability {
    /// Install the global subscriber, exporting spans over OTLP when enabled.
    pub(crate) fn init(config: &ServerConfig) -> Result<Self, ObservabilityError> {
        settings::apply_runtime_config(config);

        let tracer_provider = config
            .observability
            .otel_enabled
            .then(|| tracer_provider(&config.observability))
            .transpose()?;

        if tracer_provider.is_some() {
            global::set_text_map_propagator(TraceContextPropagator::new());
        }

        let otel_layer = tracer_provider.as_ref().map(|provider| {
            tracing_opentelemetry::layer()
                .with_tracer(provider.tracer(config.observability.otel_service_name.clone()))
        });

        tracing_subscriber::registry()
            .with(env_filter(&config.logging.log_level))
            .with(fmt_layer(config.logging.log_format))
            .with(otel_layer)
            .try_init()?;

        Ok(Self { tracer_provider })
    }

    /// Flush buffered spans.
    pub(crate) fn shutdown(self) {
        if let Some(provider) = self.tracer_provider
            && let Err(source) = provider.shutdown()
        {
            error!("failed to flush traces on shutdown: {source}");
        }
    }
}

fn tracer_provider(config: &ObservabilityConfig) -> Result<SdkTracerProvider, ObservabilityError> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(config.otel_exporter_otlp_endpoint.clone())
        .with_timeout(Duration::from_secs(config.otel_exporter_otlp_timeout_seconds))
        .build()?;

    let resource = Resource::builder_empty()
        .with_service_name(config.otel_service_name.clone())
        .with_attributes([
            KeyValue::new("service.namespace", SERVICE_NAMESPACE),
            KeyValue::new("service.version", config.otel_service_version.clone()),
            KeyValue::new(
                "deployment.environment.name",
                config.otel_deployment_environment.clone(),
            ),
        ])
        .build();

    let ratio = config.otel_trace_sample_ratio.clamp(0.0, 1.0);

    Ok(SdkTracerProvider::builder()
        .with_sampler(Sampler::ParentBased(Box::new(Sampler::TraceIdRatioBased(ratio))))
        .with_resource(resource)
        .with_batch_exporter(exporter)
        .build())
}

fn fmt_layer<S>(format: LogFormat) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    match format {
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
    }
}

/// `RUST_LOG` wins when set. Otherwise the configured level applies to
/// stockroom crates and everything else, with noisy dependencies capped.
fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_unset| EnvFilter::new(directives(level)))
}

fn directives(level: &str) -> String {
    QUIET_TARGETS
        .iter()
        .fold(level.to_owned(), |mut directives, target| {
            directives.push(',');
            directives.push_str(target);
            directives.push_str("=warn");
            directives
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives_cap_dependencies_only() {
        let directives = directives("debug");

        assert!(directives.starts_with("debug,"), "{directives}");
        assert!(directives.contains("sqlx=warn"), "{directives}");
        assert!(directives.contains("redis=warn"), "{directives}");
        assert!(!directives.contains("stockroom"), "{directives}");
        assert!(EnvFilter::try_new(&directives).is_ok(), "{directives}");
    }
}
