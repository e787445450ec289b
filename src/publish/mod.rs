// src/publish/mod.rs
//! Lead Radar publishing: build the config payload from the store and push
//! it to the publisher service. Settings are touched only on success.

pub mod client;
pub mod payload;

use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Serialize;

use crate::context::{RequestContext, ELEVATED_ROLES, PUBLISH_ROLES};
use crate::error::RadarResult;
use crate::model::PublishResult;
use crate::store::RadarRepository;

use self::client::{publish, publisher_endpoint, stamp_message, PublishTransport};
use self::payload::{build_config_payload, ConfigPayload};

/// Summary for the lead-radar page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeadRadarStatus {
    pub title: String,
    pub sources_count: usize,
    pub packs_count: usize,
    pub publisher_url: Option<String>,
    pub last_published_on: Option<DateTime<Utc>>,
    pub last_publish_commit_sha: Option<String>,
    pub last_publish_commit_url: Option<String>,
}

pub async fn status(ctx: &RequestContext, repo: &dyn RadarRepository) -> RadarResult<LeadRadarStatus> {
    ctx.require_any_role(ELEVATED_ROLES)?;
    let settings = repo.get_settings().await?;
    Ok(LeadRadarStatus {
        title: "Lead Radar".to_string(),
        sources_count: repo.list_sources().await?.len(),
        packs_count: repo.list_keyword_packs().await?.len(),
        publisher_url: settings.publisher_url,
        last_published_on: settings.last_published_on,
        last_publish_commit_sha: settings.last_publish_commit_sha,
        last_publish_commit_url: settings.last_publish_commit_url,
    })
}

/// The payload as it would be published, without the message stamp.
pub async fn preview_payload(
    ctx: &RequestContext,
    repo: &dyn RadarRepository,
) -> RadarResult<ConfigPayload> {
    ctx.require_any_role(PUBLISH_ROLES)?;
    build_config_payload(repo).await
}

pub async fn publish_config(
    ctx: &RequestContext,
    repo: &dyn RadarRepository,
    transport: &dyn PublishTransport,
) -> RadarResult<PublishResult> {
    ctx.require_any_role(PUBLISH_ROLES)?;

    let res = run(ctx, repo, transport).await;
    match &res {
        Ok(out) => {
            counter!("publish_attempts_total", "outcome" => "ok").increment(1);
            tracing::info!(
                target: "publish",
                user = %ctx.user,
                commit_sha = %out.commit_sha,
                "config published"
            );
        }
        Err(e) => {
            counter!("publish_attempts_total", "outcome" => e.kind().as_str()).increment(1);
            tracing::warn!(target: "publish", user = %ctx.user, error = %e, "publish failed");
        }
    }
    res
}

async fn run(
    ctx: &RequestContext,
    repo: &dyn RadarRepository,
    transport: &dyn PublishTransport,
) -> RadarResult<PublishResult> {
    let settings = repo.get_settings().await?;
    let endpoint = publisher_endpoint(settings.publisher_url.as_deref().unwrap_or_default())?;

    let mut payload = build_config_payload(repo).await?;
    payload.message = Some(stamp_message(&ctx.site, Utc::now()));
    tracing::debug!(
        target: "publish",
        %endpoint,
        sources = payload.sources.len(),
        keyword_packs = payload.keyword_packs.len(),
        "posting config"
    );

    let out = publish(transport, &endpoint, &payload).await?;
    repo.update_publish_result(&out.commit_sha, &out.commit_url, Utc::now())
        .await?;
    Ok(out)
}
