//! Lead Radar bridge: binary entrypoint
//! Boots the Axum HTTP server: config, store, outbound clients and metrics.

use lead_radar::config::AppConfig;
use lead_radar::metrics::Metrics;
use lead_radar::{api, telemetry, AppState};
use shuttle_axum::ShuttleAxum;
use tracing::info;

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    telemetry::init_tracing();

    let cfg = AppConfig::load_default()?;
    info!(
        site = %cfg.site,
        store = %cfg.store_path.display(),
        card_selector = %cfg.selectors.card,
        "lead radar config loaded"
    );

    let metrics = Metrics::init()?;
    let state = AppState::from_config(&cfg)?;
    let router = api::router(state).merge(metrics.router());

    Ok(router.into())
}
