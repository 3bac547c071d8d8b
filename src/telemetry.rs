//! Logging, tracing export and authentication metrics
//!
//! The tracing subscriber always writes structured logs to stdout. When OTLP
//! export is enabled, spans are also shipped through `tracing-opentelemetry`
//! and the authentication counters through a periodic metrics reader.

use std::sync::atomic::{AtomicBool, Ordering};

use opentelemetry::{
    global,
    metrics::{Counter, Meter, MeterProvider as _},
    trace::TracerProvider as _,
    KeyValue,
};
use opentelemetry_sdk::{metrics::SdkMeterProvider, trace::TracerProvider, Resource};
use thiserror::Error;
use tracing_subscriber::{filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt, Layer};

use crate::config::{LogFormat, LoggingConfig, OtelConfig};

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Failed to initialize tracer: {0}")]
    TracerInit(String),

    #[error("Failed to initialize meter: {0}")]
    MeterInit(String),

    #[error("Failed to install subscriber: {0}")]
    Subscriber(String),

    #[error("Failed to shutdown: {0}")]
    Shutdown(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Owns the OpenTelemetry providers for the lifetime of the process
pub struct Telemetry {
    tracer_provider: Option<TracerProvider>,
    meter_provider: SdkMeterProvider,
    service_name: String,
    shut_down: AtomicBool,
}

impl Telemetry {
    pub fn new(config: &OtelConfig) -> Result<Self, TelemetryError> {
        let resource = Resource::new(vec![KeyValue::new(
            "service.name",
            config.service_name.clone(),
        )]);

        let (tracer_provider, meter_provider) = match (config.enabled, &config.endpoint) {
            (true, Some(endpoint)) => (
                Some(otlp_tracer_provider(endpoint, &resource)?),
                otlp_meter_provider(endpoint, &resource)?,
            ),
            (true, None) => {
                return Err(TelemetryError::Config(
                    "OTLP endpoint is required when enabled".into(),
                ))
            }
            // Metrics without a reader are recorded and dropped
            (false, _) => (
                None,
                SdkMeterProvider::builder().with_resource(resource).build(),
            ),
        };

        if let Some(tp) = &tracer_provider {
            global::set_tracer_provider(tp.clone());
        }

        Ok(Self {
            tracer_provider,
            meter_provider,
            service_name: config.service_name.clone(),
            shut_down: AtomicBool::new(false),
        })
    }

    pub fn is_exporting(&self) -> bool {
        self.tracer_provider.is_some()
    }

    pub fn meter(&self) -> Meter {
        self.meter_provider.meter(self.service_name.clone())
    }

    /// Authentication counters bound to this provider
    pub fn auth_metrics(&self) -> AuthMetrics {
        AuthMetrics::new(&self.meter())
    }

    /// Install the global subscriber (JSON or pretty, plus OTLP spans)
    pub fn install_subscriber(&self, logging: &LoggingConfig) -> Result<(), TelemetryError> {
        let filter = parse_level(&logging.level);

        let fmt_layer = match logging.format {
            LogFormat::Json => tracing_subscriber::fmt::layer().json().boxed(),
            LogFormat::Pretty => tracing_subscriber::fmt::layer().pretty().boxed(),
        };

        let otel_layer = self.tracer_provider.as_ref().map(|tp| {
            tracing_opentelemetry::layer().with_tracer(tp.tracer(self.service_name.clone()))
        });

        tracing_subscriber::registry()
            .with(filter)
            .with(otel_layer)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| TelemetryError::Subscriber(e.to_string()))
    }

    /// Flush spans and stop the metrics reader
    ///
    /// Only the first call does any work.
    pub fn shutdown(&self) -> Result<(), TelemetryError> {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        self.meter_provider
            .shutdown()
            .map_err(|e| TelemetryError::Shutdown(format!("Meter shutdown failed: {:?}", e)))?;

        if let Some(tp) = &self.tracer_provider {
            for result in tp.force_flush() {
                result.map_err(|e| {
                    TelemetryError::Shutdown(format!("Tracer flush failed: {:?}", e))
                })?;
            }
        }
        Ok(())
    }
}

impl Drop for Telemetry {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            tracing::warn!(error = %e, "Telemetry shutdown on drop failed");
        }
    }
}

fn otlp_tracer_provider(endpoint: &str, resource: &Resource) -> Result<TracerProvider, TelemetryError> {
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::runtime;
    use opentelemetry_sdk::trace::{Config, Sampler};

    let exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(endpoint)
        .build_span_exporter()
        .map_err(|e| TelemetryError::TracerInit(e.to_string()))?;

    Ok(TracerProvider::builder()
        .with_batch_exporter(exporter, runtime::Tokio)
        .with_config(
            Config::default()
                .with_sampler(Sampler::AlwaysOn)
                .with_resource(resource.clone()),
        )
        .build())
}

fn otlp_meter_provider(endpoint: &str, resource: &Resource) -> Result<SdkMeterProvider, TelemetryError> {
    use opentelemetry_otlp::{MetricsExporterBuilder, WithExportConfig};
    use opentelemetry_sdk::metrics::reader::{DefaultAggregationSelector, DefaultTemporalitySelector};
    use opentelemetry_sdk::{metrics::PeriodicReader, runtime};

    let exporter = MetricsExporterBuilder::from(
        opentelemetry_otlp::new_exporter()
            .tonic()
            .with_endpoint(endpoint),
    )
    .build_metrics_exporter(
        Box::new(DefaultTemporalitySelector::new()),
        Box::new(DefaultAggregationSelector::new()),
    )
    .map_err(|e| TelemetryError::MeterInit(e.to_string()))?;

    Ok(SdkMeterProvider::builder()
        .with_resource(resource.clone())
        .with_reader(PeriodicReader::builder(exporter, runtime::Tokio).build())
        .build())
}

/// Unknown levels fall back to INFO
pub fn parse_level(level: &str) -> LevelFilter {
    level.parse().unwrap_or(LevelFilter::INFO)
}

/// Counters for login outcomes and gate rejections
#[derive(Clone)]
pub struct AuthMetrics {
    logins_total: Counter<u64>,
    gate_rejections_total: Counter<u64>,
}

impl AuthMetrics {
    pub fn new(meter: &Meter) -> Self {
        let logins_total = meter
            .u64_counter("storefront_auth_logins_total")
            .with_description("Login attempts by scope and outcome")
            .init();

        let gate_rejections_total = meter
            .u64_counter("storefront_auth_gate_rejections_total")
            .with_description("Requests rejected by the authentication or role gate")
            .init();

        Self {
            logins_total,
            gate_rejections_total,
        }
    }

    /// Metrics backed by the global (no-op unless installed) meter provider
    pub fn noop() -> Self {
        Self::new(&global::meter("storefront-auth"))
    }

    pub fn record_login(&self, scope: &str, outcome: &str) {
        self.logins_total.add(
            1,
            &[
                KeyValue::new("scope", scope.to_string()),
                KeyValue::new("outcome", outcome.to_string()),
            ],
        );
    }

    pub fn record_rejection(&self, gate: &str, reason: &str) {
        self.gate_rejections_total.add(
            1,
            &[
                KeyValue::new("gate", gate.to_string()),
                KeyValue::new("reason", reason.to_string()),
            ],
        );
    }
}

impl std::fmt::Debug for AuthMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthMetrics").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disabled() -> OtelConfig {
        OtelConfig {
            enabled: false,
            endpoint: None,
            service_name: "test-service".to_string(),
        }
    }

    // Test 1: Disabled config builds without exporters
    #[test]
    fn test_telemetry_disabled() {
        let telemetry = Telemetry::new(&disabled()).unwrap();
        assert!(!telemetry.is_exporting());
        assert!(telemetry.shutdown().is_ok());
    }

    // Test 2: Enabled without endpoint is a configuration error
    #[test]
    fn test_enabled_requires_endpoint() {
        let config = OtelConfig {
            enabled: true,
            ..disabled()
        };
        match Telemetry::new(&config) {
            Err(TelemetryError::Config(msg)) => assert!(msg.contains("endpoint is required")),
            _ => panic!("Expected TelemetryError::Config"),
        }
    }

    // Test 3: Auth counters record without panicking
    #[test]
    fn test_auth_metrics_record() {
        let telemetry = Telemetry::new(&disabled()).unwrap();
        let metrics = telemetry.auth_metrics();

        metrics.record_login("general", "success");
        metrics.record_login("admin", "invalid_credentials");
        metrics.record_rejection("authentication", "unauthenticated");
        metrics.record_rejection("role", "forbidden");
    }

    // Test 4: No-op metrics are usable without a provider
    #[test]
    fn test_noop_metrics() {
        let metrics = AuthMetrics::noop();
        metrics.record_login("staff", "rate_limited");
    }

    // Test 5: Level parsing
    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug"), LevelFilter::DEBUG);
        assert_eq!(parse_level("WARN"), LevelFilter::WARN);
        assert_eq!(parse_level("nonsense"), LevelFilter::INFO);
    }

    // Test 6: Error display
    #[test]
    fn test_telemetry_error_display() {
        let err = TelemetryError::Config("test error".to_string());
        assert_eq!(err.to_string(), "Configuration error: test error");

        let err = TelemetryError::Subscriber("already set".to_string());
        assert_eq!(err.to_string(), "Failed to install subscriber: already set");
    }

    // Test 7: Repeated shutdown is a no-op
    #[test]
    fn test_shutdown_twice() {
        let telemetry = Telemetry::new(&disabled()).unwrap();
        assert!(telemetry.shutdown().is_ok());
        assert!(telemetry.shutdown().is_ok());
        drop(telemetry);
    }
}
