// src/publish/payload.rs
//! Builds the configuration payload pushed to the publisher.
//!
//! Stored numbers use falsy substitution: `0` and "unset" both fall back to
//! the documented default. An operator cannot configure a literal zero.

use serde::{Deserialize, Serialize};

use crate::error::RadarResult;
use crate::model::{KeywordPack, Settings, Source};
use crate::store::RadarRepository;

pub const DEFAULT_WINDOW_DAYS: i64 = 90;
pub const DEFAULT_HALF_LIFE_DAYS: i64 = 14;
pub const DEFAULT_MIN_SIGNAL_CONFIDENCE: f64 = 0.7;
pub const DEFAULT_PROMOTE_THRESHOLD: f64 = 70.0;
pub const DEFAULT_SOURCE_WEIGHT: f64 = 1.0;
pub const DEFAULT_MAX_ITEMS: i64 = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub window_days: i64,
    pub half_life_days: i64,
    pub min_signal_confidence: f64,
    pub promote_threshold: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Rss,
    Other,
}

impl SourceType {
    /// Empty/unset means rss; anything that isn't rss is "other".
    pub fn from_stored(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") => SourceType::Rss,
            Some(s) if s.eq_ignore_ascii_case("rss") => SourceType::Rss,
            Some(_) => SourceType::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcePayload {
    pub id: String,
    pub enabled: bool,
    #[serde(rename = "type")]
    pub source_type: SourceType,
    pub name: String,
    pub weight: f64,
    pub url: String,
    pub max_items: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_regex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_regex: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordPayload {
    pub keyword: String,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordPackPayload {
    pub id: String,
    pub enabled: bool,
    pub name: String,
    pub tags: Vec<String>,
    pub keywords: Vec<KeywordPayload>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigPayload {
    pub scoring: ScoringConfig,
    pub sources: Vec<SourcePayload>,
    pub keyword_packs: Vec<KeywordPackPayload>,
    /// Stamped just before publishing; absent in previews.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// "a, b,,c " -> ["a", "b", "c"]
pub fn parse_tags(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn int_or(v: Option<i64>, default: i64) -> i64 {
    match v {
        Some(x) if x != 0 => x,
        _ => default,
    }
}

fn float_or(v: Option<f64>, default: f64) -> f64 {
    match v {
        Some(x) if x != 0.0 => x,
        _ => default,
    }
}

fn non_empty(v: Option<&String>) -> Option<String> {
    v.map(|s| s.trim()).filter(|s| !s.is_empty()).map(str::to_string)
}

pub fn scoring_from(settings: &Settings) -> ScoringConfig {
    ScoringConfig {
        window_days: int_or(settings.window_days, DEFAULT_WINDOW_DAYS),
        half_life_days: int_or(settings.half_life_days, DEFAULT_HALF_LIFE_DAYS),
        min_signal_confidence: float_or(
            settings.min_signal_confidence,
            DEFAULT_MIN_SIGNAL_CONFIDENCE,
        ),
        promote_threshold: float_or(settings.promote_threshold, DEFAULT_PROMOTE_THRESHOLD),
    }
}

pub fn source_payload(src: &Source) -> SourcePayload {
    SourcePayload {
        id: src.source_id.clone(),
        enabled: src.enabled,
        source_type: SourceType::from_stored(src.source_type.as_deref()),
        name: src.source_name.clone(),
        weight: float_or(src.weight, DEFAULT_SOURCE_WEIGHT),
        url: src.url.clone(),
        max_items: int_or(src.max_items, DEFAULT_MAX_ITEMS),
        include_regex: non_empty(src.include_regex.as_ref()),
        exclude_regex: non_empty(src.exclude_regex.as_ref()),
        tags: parse_tags(src.tags.as_deref()),
    }
}

pub fn keyword_pack_payload(pack: &KeywordPack) -> KeywordPackPayload {
    let keywords = pack
        .keywords
        .iter()
        .filter(|row| !row.keyword.is_empty())
        .map(|row| KeywordPayload {
            keyword: row.keyword.clone(),
            weight: row.weight.unwrap_or(0.0),
        })
        .collect();

    KeywordPackPayload {
        id: pack.pack_id.clone(),
        enabled: pack.enabled,
        name: pack.pack_name.clone(),
        tags: parse_tags(pack.tags.as_deref()),
        keywords,
    }
}

/// Read settings, sources and packs and assemble the payload. Ordering is
/// whatever the repository returns; no re-sorting happens here.
pub async fn build_config_payload(repo: &dyn RadarRepository) -> RadarResult<ConfigPayload> {
    let settings = repo.get_settings().await?;
    let sources = repo.list_sources().await?;
    let packs = repo.list_keyword_packs().await?;

    Ok(ConfigPayload {
        scoring: scoring_from(&settings),
        sources: sources.iter().map(source_payload).collect(),
        keyword_packs: packs.iter().map(keyword_pack_payload).collect(),
        message: None,
    })
}
