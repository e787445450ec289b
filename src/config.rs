// src/config.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::due_diligence::extract::{
    CardSelectors, DEFAULT_CARD_SELECTOR, DEFAULT_EMAIL_LINK_SELECTOR, DEFAULT_NAME_SELECTOR,
    DEFAULT_TITLE_SELECTOR,
};
use crate::due_diligence::fetch::{
    DEFAULT_FETCH_TIMEOUT_SECS, DEFAULT_MAX_PAGE_CHARS, DEFAULT_USER_AGENT,
};
use crate::due_diligence::DEFAULT_STAFF_URL;
use crate::publish::client::DEFAULT_PUBLISH_TIMEOUT_SECS;

pub const ENV_CONFIG_PATH: &str = "LEAD_RADAR_CONFIG_PATH";
pub const ENV_SITE: &str = "LEAD_RADAR_SITE";
pub const ENV_STORE_PATH: &str = "LEAD_RADAR_STORE_PATH";
pub const ENV_USER_AGENT: &str = "LEAD_RADAR_USER_AGENT";

pub const DEFAULT_CONFIG_PATH: &str = "config/lead_radar.toml";
pub const DEFAULT_STORE_PATH: &str = "config/lead_radar_store.json";
pub const DEFAULT_SITE: &str = "localhost";

fn default_site() -> String {
    DEFAULT_SITE.to_string()
}
fn default_store_path() -> PathBuf {
    PathBuf::from(DEFAULT_STORE_PATH)
}
fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}
fn default_fetch_timeout_secs() -> u64 {
    DEFAULT_FETCH_TIMEOUT_SECS
}
fn default_publish_timeout_secs() -> u64 {
    DEFAULT_PUBLISH_TIMEOUT_SECS
}
fn default_max_page_chars() -> usize {
    DEFAULT_MAX_PAGE_CHARS
}
fn default_staff_url() -> String {
    DEFAULT_STAFF_URL.to_string()
}

/// CSS selectors describing a staff card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectorConfig {
    #[serde(default = "SelectorConfig::default_card")]
    pub card: String,
    #[serde(default = "SelectorConfig::default_name")]
    pub name: String,
    #[serde(default = "SelectorConfig::default_title")]
    pub title: String,
    #[serde(default = "SelectorConfig::default_email_link")]
    pub email_link: String,
}

impl SelectorConfig {
    fn default_card() -> String {
        DEFAULT_CARD_SELECTOR.to_string()
    }
    fn default_name() -> String {
        DEFAULT_NAME_SELECTOR.to_string()
    }
    fn default_title() -> String {
        DEFAULT_TITLE_SELECTOR.to_string()
    }
    fn default_email_link() -> String {
        DEFAULT_EMAIL_LINK_SELECTOR.to_string()
    }
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            card: Self::default_card(),
            name: Self::default_name(),
            title: Self::default_title(),
            email_link: Self::default_email_link(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Site identifier stamped into publish messages.
    #[serde(default = "default_site")]
    pub site: String,
    /// JSON snapshot backing the in-memory repository.
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_publish_timeout_secs")]
    pub publish_timeout_secs: u64,
    #[serde(default = "default_max_page_chars")]
    pub max_page_chars: usize,
    #[serde(default = "default_staff_url")]
    pub default_staff_url: String,
    #[serde(default)]
    pub selectors: SelectorConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            site: default_site(),
            store_path: default_store_path(),
            user_agent: default_user_agent(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            publish_timeout_secs: default_publish_timeout_secs(),
            max_page_chars: default_max_page_chars(),
            default_staff_url: default_staff_url(),
            selectors: SelectorConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from an explicit path. Supports TOML or JSON.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let mut cfg = parse_config(&content, ext.as_str())
            .with_context(|| format!("parsing config {}", path.display()))?;
        cfg.sanitize();
        cfg.card_selectors()?;
        Ok(cfg)
    }

    /// Resolution order:
    /// 1) $LEAD_RADAR_CONFIG_PATH (must exist)
    /// 2) config/lead_radar.toml
    /// 3) built-in defaults
    ///
    /// then LEAD_RADAR_SITE / LEAD_RADAR_STORE_PATH / LEAD_RADAR_USER_AGENT override.
    pub fn load_default() -> Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            Self::load_from(&pb)?
        } else {
            let fallback = PathBuf::from(DEFAULT_CONFIG_PATH);
            if fallback.exists() {
                Self::load_from(&fallback)?
            } else {
                Self::default()
            }
        };
        cfg.apply_env_overrides();
        cfg.sanitize();
        Ok(cfg)
    }

    pub fn card_selectors(&self) -> Result<CardSelectors> {
        let s = &self.selectors;
        CardSelectors::parse(&s.card, &s.name, &s.title, &s.email_link)
    }

    fn apply_env_overrides(&mut self) {
        if let Some(v) = env_non_empty(ENV_SITE) {
            self.site = v;
        }
        if let Some(v) = env_non_empty(ENV_STORE_PATH) {
            self.store_path = PathBuf::from(v);
        }
        if let Some(v) = env_non_empty(ENV_USER_AGENT) {
            self.user_agent = v;
        }
    }

    /// Zero or blank values fall back to defaults.
    fn sanitize(&mut self) {
        if self.site.trim().is_empty() {
            self.site = default_site();
        }
        if self.store_path.as_os_str().is_empty() {
            self.store_path = default_store_path();
        }
        if self.user_agent.trim().is_empty() {
            self.user_agent = default_user_agent();
        }
        if self.fetch_timeout_secs == 0 {
            self.fetch_timeout_secs = default_fetch_timeout_secs();
        }
        if self.publish_timeout_secs == 0 {
            self.publish_timeout_secs = default_publish_timeout_secs();
        }
        if self.max_page_chars == 0 {
            self.max_page_chars = default_max_page_chars();
        }
        if self.default_staff_url.trim().is_empty() {
            self.default_staff_url = default_staff_url();
        }
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_config(s: &str, hint_ext: &str) -> Result<AppConfig> {
    match hint_ext {
        "toml" => Ok(toml::from_str(s)?),
        "json" => Ok(serde_json::from_str(s)?),
        _ => toml::from_str(s)
            .map_err(anyhow::Error::from)
            .or_else(|_| serde_json::from_str(s).map_err(anyhow::Error::from))
            .map_err(|_| anyhow!("unsupported config format")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg = parse_config(
            r#"
site = "crm.example.org"
fetch_timeout_secs = 0

[selectors]
card = "li.person"
"#,
            "toml",
        )
        .unwrap();
        assert_eq!(cfg.site, "crm.example.org");
        assert_eq!(cfg.selectors.card, "li.person");
        assert_eq!(cfg.selectors.name, DEFAULT_NAME_SELECTOR);
        assert_eq!(cfg.max_page_chars, 1_000_000);
        // zero survives parsing; sanitize() substitutes it
        assert_eq!(cfg.fetch_timeout_secs, 0);
    }

    #[test]
    fn sanitize_restores_zero_and_blank_values() {
        let mut cfg = AppConfig {
            site: " ".into(),
            fetch_timeout_secs: 0,
            max_page_chars: 0,
            ..AppConfig::default()
        };
        cfg.sanitize();
        assert_eq!(cfg.site, DEFAULT_SITE);
        assert_eq!(cfg.fetch_timeout_secs, 30);
        assert_eq!(cfg.max_page_chars, 1_000_000);
    }

    #[test]
    fn json_is_accepted_without_extension_hint() {
        let cfg = parse_config(r#"{"site":"crm.json.example"}"#, "").unwrap();
        assert_eq!(cfg.site, "crm.json.example");
    }

    #[test]
    fn invalid_selector_fails_load() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("lead_radar.toml");
        fs::write(&p, "[selectors]\ncard = \"div[\"\n").unwrap();
        assert!(AppConfig::load_from(&p).is_err());
    }
}
