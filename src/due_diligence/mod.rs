// src/due_diligence/mod.rs
//! Due diligence: fetch a public staff directory and extract contact cards.
//!
//! Flow: role check -> SSRF guard -> one GET -> card extraction.

pub mod extract;
pub mod fetch;

use metrics::counter;
use serde::Serialize;

use crate::context::{RequestContext, ELEVATED_ROLES};
use crate::error::{RadarError, RadarResult};
use crate::model::StaffLookup;
use crate::url_guard::{validate_url, Resolver};

use self::extract::{extract_staff, CardSelectors};
use self::fetch::PageFetcher;

pub const DEFAULT_STAFF_URL: &str = "https://holytrinity-hs.org/about/staff/";

/// Context for the due-diligence page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DueDiligencePage {
    pub title: String,
    pub default_staff_url: String,
}

pub fn page_context(ctx: &RequestContext, default_staff_url: &str) -> RadarResult<DueDiligencePage> {
    ctx.require_any_role(ELEVATED_ROLES)?;
    Ok(DueDiligencePage {
        title: "Due Diligence".to_string(),
        default_staff_url: default_staff_url.to_string(),
    })
}

/// Validate `raw_url`, fetch it once and extract staff cards.
pub async fn lookup_staff(
    ctx: &RequestContext,
    raw_url: &str,
    resolver: &dyn Resolver,
    fetcher: &dyn PageFetcher,
    selectors: &CardSelectors,
) -> RadarResult<StaffLookup> {
    ctx.require_any_role(ELEVATED_ROLES)?;

    let res = run(raw_url, resolver, fetcher, selectors).await;
    match &res {
        Ok(found) => {
            counter!("staff_lookups_total", "outcome" => "ok").increment(1);
            counter!("staff_records_extracted_total").increment(found.count as u64);
            tracing::info!(
                target: "due_diligence",
                user = %ctx.user,
                source_url = %found.source_url,
                count = found.count,
                "staff directory extracted"
            );
        }
        Err(e) => {
            counter!("staff_lookups_total", "outcome" => e.kind().as_str()).increment(1);
            tracing::warn!(target: "due_diligence", user = %ctx.user, error = %e, "staff lookup failed");
        }
    }
    res
}

async fn run(
    raw_url: &str,
    resolver: &dyn Resolver,
    fetcher: &dyn PageFetcher,
    selectors: &CardSelectors,
) -> RadarResult<StaffLookup> {
    let url = validate_url(raw_url, resolver).await?;
    let html = fetcher.fetch_html(&url).await?;

    // Parsing is CPU-bound; keep it off the async workers.
    let source_url = url.as_str().to_string();
    let selectors = selectors.clone();
    let staff = tokio::task::spawn_blocking(move || extract_staff(&html, &source_url, &selectors))
        .await
        .map_err(|e| RadarError::Internal(format!("staff extraction task: {e}")))?;
    Ok(StaffLookup {
        ok: true,
        source_url: url.as_str().to_string(),
        count: staff.len(),
        staff,
    })
}
