//! Tracing pipeline for tickflow drivers.
//!
//! The engine opens a DEBUG `step` span around every
//! [`StateMachine::step`][crate::StateMachine::step] (nested machines open
//! child spans) and a DEBUG `tree_tick` span around every
//! [`BehaviorTree::tick`][crate::BehaviorTree::tick].  Inside them it emits
//! events: transitions at DEBUG, state entries and node ticks at TRACE,
//! unsettled cascades and tree `Kill`s at WARN.
//!
//! A driver calls [`init_tracing`] once at startup to decide where those go:
//!
//! | Variable | Effect |
//! |---|---|
//! | `RUST_LOG` | Filter directives, default `info`.  `tickflow_runtime=debug` shows step spans. |
//! | `TICKFLOW_LOG_FORMAT` | `json` for newline-delimited JSON, anything else for compact text. |
//! | `OTEL_EXPORTER_OTLP_ENDPOINT` | When set, spans are also exported over OTLP/HTTP. |
//!
//! ```rust,no_run
//! // Keep the guard alive until the driver exits.
//! let _guard = tickflow_runtime::telemetry::init_tracing("tickflow");
//! ```

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{Resource, trace::SdkTracerProvider};
use tracing_subscriber::{
    EnvFilter, Layer, Registry, layer::SubscriberExt, util::SubscriberInitExt,
};

/// Environment variable selecting the log output format.
pub const LOG_FORMAT_ENV: &str = "TICKFLOW_LOG_FORMAT";
/// Environment variable holding the OTLP collector base URL.
pub const OTLP_ENDPOINT_ENV: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";

const DEFAULT_FILTER: &str = "info";

// ─────────────────────────────────────────────────────────────────────────────
// Settings
// ─────────────────────────────────────────────────────────────────────────────

/// Console output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl LogFormat {
    fn from_value(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.trim().eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Compact,
        }
    }
}

/// Everything [`init_with`] needs, resolved up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetrySettings {
    /// `EnvFilter` directives.
    pub filter: String,
    pub format: LogFormat,
    /// OTLP/HTTP collector; `None` disables span export.
    pub otlp_endpoint: Option<String>,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            filter: DEFAULT_FILTER.to_string(),
            format: LogFormat::default(),
            otlp_endpoint: None,
        }
    }
}

impl TelemetrySettings {
    /// Read `RUST_LOG`, [`LOG_FORMAT_ENV`] and [`OTLP_ENDPOINT_ENV`].
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve settings through `lookup`.  Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_blank = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            filter: non_blank("RUST_LOG").unwrap_or_else(|| DEFAULT_FILTER.to_string()),
            format: LogFormat::from_value(non_blank(LOG_FORMAT_ENV).as_deref()),
            otlp_endpoint: non_blank(OTLP_ENDPOINT_ENV),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Initialisation
// ─────────────────────────────────────────────────────────────────────────────

/// Install the global subscriber from the environment.  See [`init_with`].
pub fn init_tracing(service_name: &str) -> TracerProviderGuard {
    init_with(service_name, &TelemetrySettings::from_env())
}

/// Install the global subscriber described by `settings`.
///
/// Hold the returned guard until exit; dropping it flushes exported spans.
/// If a global subscriber is already installed the call reports it on
/// stderr and leaves the existing one in place.
pub fn init_with(service_name: &str, settings: &TelemetrySettings) -> TracerProviderGuard {
    let provider = settings
        .otlp_endpoint
        .as_deref()
        .and_then(|endpoint| build_provider(service_name, endpoint));

    let filter = EnvFilter::try_new(&settings.filter).unwrap_or_else(|e| {
        eprintln!("[tickflow] invalid log filter {:?}: {e}", settings.filter);
        EnvFilter::new(DEFAULT_FILTER)
    });
    let fmt_layer: Box<dyn Layer<Registry> + Send + Sync> = match settings.format {
        LogFormat::Json => tracing_subscriber::fmt::layer().json().boxed(),
        LogFormat::Compact => tracing_subscriber::fmt::layer().compact().boxed(),
    };
    let otel_layer = provider
        .as_ref()
        .map(|p| tracing_opentelemetry::layer().with_tracer(p.tracer("tickflow")));

    if let Err(e) = tracing_subscriber::registry()
        .with(fmt_layer)
        .with(otel_layer)
        .with(filter)
        .try_init()
    {
        eprintln!("[tickflow] tracing already initialised: {e}");
    }

    TracerProviderGuard(provider)
}

/// Shuts down the span exporter on drop.
pub struct TracerProviderGuard(Option<SdkTracerProvider>);

impl TracerProviderGuard {
    /// `true` when spans are being exported to an OTLP collector.
    pub fn is_exporting(&self) -> bool {
        self.0.is_some()
    }
}

impl Drop for TracerProviderGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.0.take()
            && let Err(e) = provider.shutdown()
        {
            eprintln!("[tickflow] span exporter shutdown failed: {e}");
        }
    }
}

/// Span export pipeline for `endpoint`.  Failures go to stderr because no
/// subscriber exists yet.
fn build_provider(service_name: &str, endpoint: &str) -> Option<SdkTracerProvider> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| eprintln!("[tickflow] OTLP exporter for {endpoint} failed: {e}"))
        .ok()?;

    // Drivers are plain fixed-rate loops with no async runtime, so spans are
    // exported synchronously as they close.
    Some(
        SdkTracerProvider::builder()
            .with_resource(
                Resource::builder()
                    .with_service_name(service_name.to_string())
                    .build(),
            )
            .with_simple_exporter(exporter)
            .build(),
    )
}
