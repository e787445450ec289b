// src/api.rs
//! HTTP surface: health, due-diligence and lead-radar routes, plus the JSON
//! error shape every failure renders to.

use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::context::{RequestContext, ELEVATED_ROLES};
use crate::due_diligence::extract::CardSelectors;
use crate::due_diligence::fetch::{HttpPageFetcher, PageFetcher};
use crate::due_diligence::{self, DueDiligencePage};
use crate::error::{ErrorKind, RadarError, RadarResult};
use crate::model::{PublishResult, StaffLookup};
use crate::publish::client::{HttpPublishTransport, PublishTransport};
use crate::publish::payload::ConfigPayload;
use crate::publish::{self, LeadRadarStatus};
use crate::store::{MemoryRepository, RadarRepository};
use crate::url_guard::{Resolver, SystemResolver};

/// Header carrying the authenticated user, set by the proxy in front of us.
pub const USER_HEADER: &str = "x-radar-user";

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn RadarRepository>,
    pub resolver: Arc<dyn Resolver>,
    pub fetcher: Arc<dyn PageFetcher>,
    pub transport: Arc<dyn PublishTransport>,
    pub selectors: Arc<CardSelectors>,
    pub site: String,
    pub default_staff_url: String,
}

impl AppState {
    /// Production wiring: system DNS, reqwest fetcher/transport, JSON-backed store.
    pub fn from_config(cfg: &AppConfig) -> Result<Self> {
        let repo = MemoryRepository::load_or_empty(&cfg.store_path)?;
        let fetcher = HttpPageFetcher::new(cfg.user_agent.clone())
            .with_timeout(cfg.fetch_timeout_secs)
            .with_max_chars(cfg.max_page_chars);
        let transport = HttpPublishTransport::new(cfg.publish_timeout_secs)?;

        Ok(Self {
            repo: Arc::new(repo),
            resolver: Arc::new(SystemResolver),
            fetcher: Arc::new(fetcher),
            transport: Arc::new(transport),
            selectors: Arc::new(cfg.card_selectors()?),
            site: cfg.site.clone(),
            default_staff_url: cfg.default_staff_url.clone(),
        })
    }

    /// Build the caller's context from the user header and the store's roles.
    async fn context_for(&self, headers: &HeaderMap) -> RadarResult<RequestContext> {
        let user = headers
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .unwrap_or_default();

        let guest = RequestContext::guest(self.site.as_str());
        if user.is_empty() || user == guest.user {
            return Ok(guest);
        }
        let roles = self.repo.roles_for(user).await?;
        Ok(RequestContext::new(user, roles, self.site.as_str()))
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/api/due-diligence", get(due_diligence_page))
        .route("/api/due-diligence/staff", post(staff_lookup))
        .route("/api/lead-radar", get(lead_radar_status))
        .route("/api/lead-radar/payload", get(lead_radar_payload))
        .route("/api/lead-radar/publish", post(lead_radar_publish))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(serde::Deserialize)]
struct StaffReq {
    #[serde(default)]
    url: String,
}

async fn due_diligence_page(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<DueDiligencePage>, RadarError> {
    let ctx = state.context_for(&headers).await?;
    let page = due_diligence::page_context(&ctx, &state.default_staff_url)?;
    Ok(Json(page))
}

async fn staff_lookup(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<StaffReq>, JsonRejection>,
) -> Result<Json<StaffLookup>, RadarError> {
    let ctx = state.context_for(&headers).await?;
    // Callers without access get 401/403 before any body complaint.
    ctx.require_any_role(ELEVATED_ROLES)?;
    let Json(body) = body.map_err(|e| RadarError::BadRequest(e.body_text()))?;
    let out = due_diligence::lookup_staff(
        &ctx,
        &body.url,
        state.resolver.as_ref(),
        state.fetcher.as_ref(),
        state.selectors.as_ref(),
    )
    .await?;
    Ok(Json(out))
}

async fn lead_radar_status(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<LeadRadarStatus>, RadarError> {
    let ctx = state.context_for(&headers).await?;
    Ok(Json(publish::status(&ctx, state.repo.as_ref()).await?))
}

async fn lead_radar_payload(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ConfigPayload>, RadarError> {
    let ctx = state.context_for(&headers).await?;
    Ok(Json(publish::preview_payload(&ctx, state.repo.as_ref()).await?))
}

async fn lead_radar_publish(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<PublishResult>, RadarError> {
    let ctx = state.context_for(&headers).await?;
    let out =
        publish::publish_config(&ctx, state.repo.as_ref(), state.transport.as_ref()).await?;
    Ok(Json(out))
}

#[derive(serde::Serialize)]
struct ErrorBody {
    ok: bool,
    error: &'static str,
    message: String,
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::LoginRequired => StatusCode::UNAUTHORIZED,
        ErrorKind::Permission => StatusCode::FORBIDDEN,
        ErrorKind::UpstreamUnavailable
        | ErrorKind::UpstreamRejected
        | ErrorKind::UpstreamBadResponse => StatusCode::BAD_GATEWAY,
        ErrorKind::Store | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for RadarError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        if matches!(kind, ErrorKind::Store | ErrorKind::Internal) {
            tracing::error!(error = ?self, "internal failure");
        }
        let body = ErrorBody {
            ok: false,
            error: kind.as_str(),
            message: self.to_string(),
        };
        (status_for(kind), Json(body)).into_response()
    }
}
