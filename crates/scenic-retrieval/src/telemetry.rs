//! Tracing subscriber setup shared by the CLI and benchmark runner.
//!
//! Call [`init_tracing`] once at startup and keep the returned guard alive
//! for the whole process.
//!
//! # Environment variables
//!
//! | Variable | Effect |
//! |---|---|
//! | `RUST_LOG` | Log filter (default `"info"`). |
//! | `SCENIC_LOG_FORMAT=json` | Emit newline-delimited JSON logs. |
//! | `OTEL_EXPORTER_OTLP_ENDPOINT` | OTLP collector base URL; enables the OTLP/HTTP span exporter when set. |

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{Resource, trace::SdkTracerProvider};
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialise the global `tracing` subscriber.
///
/// Console output is always on, formatted compact or JSON per
/// `SCENIC_LOG_FORMAT`.  Span export to an OTLP collector is added only when
/// `OTEL_EXPORTER_OTLP_ENDPOINT` is set.  Dropping the returned guard
/// flushes pending spans, so hold it in `main` until exit.
pub fn init_tracing(service_name: &str) -> TracerProviderGuard {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("SCENIC_LOG_FORMAT").as_deref() == Ok("json");

    let fmt_layer = if json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().compact().boxed()
    };

    let provider = otlp_provider(service_name);
    let otel_layer = provider.as_ref().map(|p| {
        tracing_opentelemetry::layer().with_tracer(p.tracer("scenic"))
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(otel_layer)
        .with(fmt_layer)
        .init();

    TracerProviderGuard(provider)
}

/// Shuts down the OTLP provider on drop, flushing any buffered spans.
pub struct TracerProviderGuard(Option<SdkTracerProvider>);

impl Drop for TracerProviderGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.0.take()
            && let Err(e) = provider.shutdown()
        {
            eprintln!("[scenic] OpenTelemetry provider shutdown error: {e}");
        }
    }
}

/// `Some` only when `OTEL_EXPORTER_OTLP_ENDPOINT` is set and the exporter
/// builds; any exporter error is reported and export is skipped.
fn otlp_provider(service_name: &str) -> Option<SdkTracerProvider> {
    let endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok()?;
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| eprintln!("[scenic] OTLP exporter init failed: {e}"))
        .ok()?;
    let resource = Resource::builder()
        .with_service_name(service_name.to_string())
        .build();
    // Simple exporter: init runs before the Tokio runtime exists, so the
    // batch exporter's background task cannot be used here.
    Some(
        SdkTracerProvider::builder()
            .with_resource(resource)
            .with_simple_exporter(exporter)
            .build(),
    )
}
