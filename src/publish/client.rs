// src/publish/client.rs
//! Publisher client: endpoint derivation, preconditions and response
//! interpretation around a single JSON POST.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use url::Url;

use super::payload::ConfigPayload;
use crate::error::{RadarError, RadarResult, UrlRejection};
use crate::model::PublishResult;

pub const DEFAULT_PUBLISH_TIMEOUT_SECS: u64 = 30;
const PUBLISH_SUFFIX: &str = "/publish";

/// Raw outcome of the POST, before any interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

/// Network seam for the publisher. An `Err` means the service could not be
/// reached at all; any HTTP response is an `Ok`.
#[async_trait::async_trait]
pub trait PublishTransport: Send + Sync {
    async fn post_json(&self, endpoint: &Url, payload: &ConfigPayload) -> Result<TransportResponse>;
}

pub struct HttpPublishTransport {
    client: Client,
}

impl HttpPublishTransport {
    pub fn new(timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("building publisher http client")?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl PublishTransport for HttpPublishTransport {
    async fn post_json(&self, endpoint: &Url, payload: &ConfigPayload) -> Result<TransportResponse> {
        let resp = self
            .client
            .post(endpoint.clone())
            .json(payload)
            .send()
            .await
            .context("publisher post")?;
        let status = resp.status().as_u16();
        let body = resp.text().await.context("publisher body")?;
        Ok(TransportResponse { status, body })
    }
}

/// `https://pub.example/api` -> `https://pub.example/api/publish`;
/// a base already ending in `/publish` is kept as-is.
pub fn publisher_endpoint(base_url: &str) -> RadarResult<Url> {
    let base = base_url.trim();
    if base.is_empty() {
        return Err(RadarError::MissingPublisherUrl);
    }
    let endpoint = if base.ends_with(PUBLISH_SUFFIX) {
        base.to_string()
    } else {
        let stripped = base.strip_suffix('/').unwrap_or(base);
        format!("{stripped}{PUBLISH_SUFFIX}")
    };
    Url::parse(&endpoint).map_err(|e| UrlRejection::Malformed(e.to_string()).into())
}

/// "Lead Radar publish from CRM (<site>) 2026-10-19T08:30:00Z"
pub fn stamp_message(site: &str, now: DateTime<Utc>) -> String {
    format!(
        "Lead Radar publish from CRM ({site}) {}",
        now.format("%Y-%m-%dT%H:%M:%SZ")
    )
}

/// The payload must carry at least one source and one keyword pack.
pub fn check_preconditions(payload: &ConfigPayload) -> RadarResult<()> {
    if payload.sources.is_empty() {
        return Err(RadarError::EmptySources);
    }
    if payload.keyword_packs.is_empty() {
        return Err(RadarError::EmptyKeywordPacks);
    }
    Ok(())
}

/// Python-style truthiness of a JSON value.
pub fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|x| x != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

pub fn interpret_response(resp: TransportResponse) -> RadarResult<PublishResult> {
    if !(200..300).contains(&resp.status) {
        return Err(RadarError::PublisherRejected {
            status: resp.status,
            body: resp.body,
        });
    }

    let data: Value = match serde_json::from_str(&resp.body) {
        Ok(v) => v,
        Err(_) => return Err(RadarError::PublisherBadResponse { body: resp.body }),
    };

    if !data.get("ok").is_some_and(is_truthy) {
        return Err(RadarError::PublisherError {
            body: data.to_string(),
        });
    }

    let field = |k: &str| {
        data.get(k)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    Ok(PublishResult {
        commit_sha: field("commit_sha"),
        commit_url: field("commit_url"),
    })
}

/// Check preconditions, POST once, interpret. No retries.
pub async fn publish(
    transport: &dyn PublishTransport,
    endpoint: &Url,
    payload: &ConfigPayload,
) -> RadarResult<PublishResult> {
    check_preconditions(payload)?;

    let resp = transport
        .post_json(endpoint, payload)
        .await
        .map_err(RadarError::PublisherUnreachable)?;

    interpret_response(resp)
}
