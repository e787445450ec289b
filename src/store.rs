// src/store.rs
//! Repository seam for the external record store, plus an in-memory
//! adapter seeded from a JSON snapshot.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tokio::sync::Mutex;

use crate::model::{KeywordPack, Settings, Source};

#[async_trait::async_trait]
pub trait RadarRepository: Send + Sync {
    async fn get_settings(&self) -> Result<Settings>;
    /// Sources, most recently modified first.
    async fn list_sources(&self) -> Result<Vec<Source>>;
    /// Keyword packs (with rows), most recently modified first.
    async fn list_keyword_packs(&self) -> Result<Vec<KeywordPack>>;
    async fn update_publish_result(
        &self,
        commit_sha: &str,
        commit_url: &str,
        published_on: DateTime<Utc>,
    ) -> Result<()>;
    async fn roles_for(&self, user: &str) -> Result<Vec<String>>;
}

/// Serialized shape of the in-memory store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub sources: Vec<Source>,
    #[serde(default)]
    pub keyword_packs: Vec<KeywordPack>,
    /// user -> roles
    #[serde(default)]
    pub users: HashMap<String, Vec<String>>,
}

#[derive(Debug)]
pub struct MemoryRepository {
    inner: RwLock<StoreSnapshot>,
    persist_to: Option<PathBuf>,
    /// Held across snapshot, file write and in-memory apply.
    write_lock: Mutex<()>,
}

impl MemoryRepository {
    pub fn new(snapshot: StoreSnapshot) -> Self {
        Self {
            inner: RwLock::new(snapshot),
            persist_to: None,
            write_lock: Mutex::new(()),
        }
    }

    /// Load a JSON snapshot; publish results are written back to the same file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading store snapshot from {}", path.display()))?;
        let snapshot: StoreSnapshot = serde_json::from_str(&content)
            .with_context(|| format!("parsing store snapshot {}", path.display()))?;
        Ok(Self {
            inner: RwLock::new(snapshot),
            persist_to: Some(path.to_path_buf()),
            write_lock: Mutex::new(()),
        })
    }

    /// Load from `path` if it exists, otherwise start empty (nothing persisted).
    pub fn load_or_empty<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load_from_file(path)
        } else {
            tracing::warn!(path = %path.as_ref().display(), "store snapshot missing; starting empty");
            Ok(Self::new(StoreSnapshot::default()))
        }
    }

    pub fn snapshot(&self) -> Result<StoreSnapshot> {
        let g = self
            .inner
            .read()
            .map_err(|_| anyhow::anyhow!("store lock poisoned"))?;
        Ok(g.clone())
    }

    /// Write `snap` to the backing file (tmp write + rename). Callers hold
    /// `write_lock`.
    async fn persist(&self, snap: &StoreSnapshot) -> Result<()> {
        let Some(path) = &self.persist_to else {
            return Ok(());
        };
        let body = serde_json::to_string_pretty(snap).context("serializing store snapshot")?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body)
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;
        tokio::fs::rename(&tmp, path)
            .await
            .with_context(|| format!("replacing {}", path.display()))?;
        Ok(())
    }

    fn write_guard(&self) -> Result<std::sync::RwLockWriteGuard<'_, StoreSnapshot>> {
        self.inner
            .write()
            .map_err(|_| anyhow::anyhow!("store lock poisoned"))
    }
}

#[async_trait::async_trait]
impl RadarRepository for MemoryRepository {
    async fn get_settings(&self) -> Result<Settings> {
        Ok(self.snapshot()?.settings)
    }

    async fn list_sources(&self) -> Result<Vec<Source>> {
        let mut v = self.snapshot()?.sources;
        v.sort_by(|a, b| b.modified.cmp(&a.modified));
        Ok(v)
    }

    async fn list_keyword_packs(&self) -> Result<Vec<KeywordPack>> {
        let mut v = self.snapshot()?.keyword_packs;
        v.sort_by(|a, b| b.modified.cmp(&a.modified));
        Ok(v)
    }

    async fn update_publish_result(
        &self,
        commit_sha: &str,
        commit_url: &str,
        published_on: DateTime<Utc>,
    ) -> Result<()> {
        let _writer = self.write_lock.lock().await;

        let apply = |settings: &mut Settings| {
            settings.last_publish_commit_sha = Some(commit_sha.to_string());
            settings.last_publish_commit_url = Some(commit_url.to_string());
            settings.last_published_on = Some(published_on);
        };

        // Memory changes only once the file write has succeeded.
        let mut next = self.snapshot()?;
        apply(&mut next.settings);
        self.persist(&next).await?;
        apply(&mut self.write_guard()?.settings);
        Ok(())
    }

    async fn roles_for(&self, user: &str) -> Result<Vec<String>> {
        Ok(self
            .snapshot()?
            .users
            .get(user)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn source(id: &str, day: u32) -> Source {
        Source {
            source_id: id.into(),
            enabled: true,
            source_type: None,
            source_name: id.to_uppercase(),
            weight: None,
            url: format!("https://{id}.example/feed"),
            max_items: None,
            include_regex: None,
            exclude_regex: None,
            tags: None,
            modified: Utc.with_ymd_and_hms(2026, 1, day, 0, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn sources_come_back_most_recent_first() {
        let repo = MemoryRepository::new(StoreSnapshot {
            sources: vec![source("old", 1), source("new", 9), source("mid", 5)],
            ..Default::default()
        });
        let ids: Vec<_> = repo
            .list_sources()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.source_id)
            .collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);
    }

    #[tokio::test]
    async fn publish_result_is_written_back_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, r#"{"users":{"ann":["COS"]}}"#).unwrap();

        let repo = MemoryRepository::load_from_file(&path).unwrap();
        let at = Utc.with_ymd_and_hms(2026, 10, 19, 8, 30, 0).unwrap();
        repo.update_publish_result("abc123", "https://git.example/c/abc123", at)
            .await
            .unwrap();

        let reloaded = MemoryRepository::load_from_file(&path).unwrap();
        let s = reloaded.get_settings().await.unwrap();
        assert_eq!(s.last_publish_commit_sha.as_deref(), Some("abc123"));
        assert_eq!(s.last_published_on, Some(at));
        assert_eq!(reloaded.roles_for("ann").await.unwrap(), vec!["COS"]);
        assert!(reloaded.roles_for("nobody").await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_publishes_leave_file_and_memory_in_agreement() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, "{}").unwrap();
        let repo = std::sync::Arc::new(MemoryRepository::load_from_file(&path).unwrap());

        let mut tasks = Vec::new();
        for i in 0..16 {
            let repo = repo.clone();
            tasks.push(tokio::spawn(async move {
                let sha = format!("sha{i}");
                let url = format!("https://git.example/c/{sha}");
                repo.update_publish_result(&sha, &url, Utc::now()).await
            }));
        }
        for t in tasks {
            t.await.unwrap().unwrap();
        }

        let in_memory = repo.get_settings().await.unwrap();
        let on_disk = MemoryRepository::load_from_file(&path)
            .unwrap()
            .get_settings()
            .await
            .unwrap();
        assert!(in_memory.last_publish_commit_sha.is_some());
        assert_eq!(in_memory, on_disk);
        assert_eq!(
            on_disk.last_publish_commit_url,
            on_disk
                .last_publish_commit_sha
                .map(|sha| format!("https://git.example/c/{sha}"))
        );
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn failed_write_leaves_memory_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, "{}").unwrap();
        let repo = MemoryRepository::load_from_file(&path).unwrap();
        drop(dir);

        let err = repo
            .update_publish_result("abc123", "https://git.example/c/abc123", Utc::now())
            .await;
        assert!(err.is_err());

        let s = repo.get_settings().await.unwrap();
        assert_eq!(s.last_publish_commit_sha, None);
        assert_eq!(s.last_published_on, None);
    }
}
