// src/model.rs
//! Records owned by the external store, as this service sees them.
//! Stored numeric fields are kept raw (`0` and absent both mean "unset");
//! defaults are applied by the payload builder.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lead Radar Settings (single record).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub window_days: Option<i64>,
    #[serde(default)]
    pub half_life_days: Option<i64>,
    #[serde(default)]
    pub min_signal_confidence: Option<f64>,
    #[serde(default)]
    pub promote_threshold: Option<f64>,
    #[serde(default)]
    pub publisher_url: Option<String>,
    #[serde(default)]
    pub last_publish_commit_sha: Option<String>,
    #[serde(default)]
    pub last_publish_commit_url: Option<String>,
    #[serde(default)]
    pub last_published_on: Option<DateTime<Utc>>,
}

/// Lead Radar Source record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub source_id: String,
    #[serde(default)]
    pub enabled: bool,
    /// Raw stored type string ("rss", "other", or empty).
    #[serde(default)]
    pub source_type: Option<String>,
    #[serde(default)]
    pub source_name: String,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub max_items: Option<i64>,
    #[serde(default)]
    pub include_regex: Option<String>,
    #[serde(default)]
    pub exclude_regex: Option<String>,
    /// Comma-separated tag string.
    #[serde(default)]
    pub tags: Option<String>,
    pub modified: DateTime<Utc>,
}

/// Child row of a keyword pack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordRow {
    #[serde(default)]
    pub keyword: String,
    #[serde(default)]
    pub weight: Option<f64>,
}

/// Lead Radar Keyword Pack record with its keyword rows in declared order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordPack {
    pub pack_id: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub pack_name: String,
    #[serde(default)]
    pub tags: Option<String>,
    #[serde(default)]
    pub keywords: Vec<KeywordRow>,
    pub modified: DateTime<Utc>,
}

/// One staff contact card extracted from a directory page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffRecord {
    pub full_name: String,
    pub title: String,
    pub email: String,
    pub source_url: String,
}

impl StaffRecord {
    /// Dedup identity: lowercased email, else lowercased "title|full_name".
    pub fn identity_key(&self) -> String {
        if !self.email.is_empty() {
            self.email.to_lowercase()
        } else {
            format!("{}|{}", self.title, self.full_name).to_lowercase()
        }
    }
}

/// Result of a staff directory lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaffLookup {
    pub ok: bool,
    pub source_url: String,
    pub count: usize,
    pub staff: Vec<StaffRecord>,
}

/// What the caller gets back after a successful publish.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishResult {
    pub commit_sha: String,
    pub commit_url: String,
}
