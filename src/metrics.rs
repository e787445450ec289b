use anyhow::{Context, Result};
use axum::{routing::get, Router};
use metrics::{describe_counter, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder and describe the service counters.
    /// Call once per process.
    pub fn init() -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;

        describe_counter!(
            "staff_lookups_total",
            Unit::Count,
            "Staff directory lookups by outcome."
        );
        describe_counter!(
            "staff_records_extracted_total",
            Unit::Count,
            "Staff records returned by successful lookups."
        );
        describe_counter!(
            "url_rejections_total",
            Unit::Count,
            "URLs refused by the SSRF guard, by reason."
        );
        describe_counter!(
            "publish_attempts_total",
            Unit::Count,
            "Config publish attempts by outcome."
        );

        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
