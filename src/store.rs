//! The mentor directory the importer reads from and submits to.
//!
//! Either a local JSON snapshot or a hosted table behind a PostgREST-style
//! HTTP API. Batches are all-or-nothing and never retried.

use chrono::Utc;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::models::{Config, MentorInput, MentorRecord, StoreMode};

const DEFAULT_SNAPSHOT: &str = "data/mentors.json";
const DEFAULT_TABLE: &str = "mentors";
const DEFAULT_KEY_ENV: &str = "MENTOR_STORE_KEY";

#[allow(async_fn_in_trait)]
pub trait MentorStore {
    /// Every mentor, ordered by name.
    async fn fetch_all(&self) -> Result<Vec<MentorRecord>>;

    /// Persist the whole batch or nothing.
    async fn insert_batch(&self, mentors: &[MentorInput]) -> Result<Vec<MentorRecord>>;

    /// Remove the given ids in one request. Returns how many were removed.
    async fn delete_ids(&self, ids: &[i64]) -> Result<usize>;
}

pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Vec<MentorRecord>> {
        if !tokio::fs::try_exists(&self.path).await? {
            debug!(path = %self.path.display(), "Snapshot missing, starting empty");
            return Ok(Vec::new());
        }
        let content = tokio::fs::read_to_string(&self.path).await?;
        Ok(serde_json::from_str(&content)?)
    }

    async fn save(&self, records: &[MentorRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        let written = match tokio::fs::write(&tmp, serde_json::to_string_pretty(records)?).await {
            Ok(()) => tokio::fs::rename(&tmp, &self.path).await,
            Err(err) => Err(err),
        };
        if let Err(err) = written {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(err.into());
        }
        Ok(())
    }
}

impl MentorStore for SnapshotStore {
    async fn fetch_all(&self) -> Result<Vec<MentorRecord>> {
        let mut records = self.load().await?;
        records.sort_by(|a, b| a.name.cmp(&b.name));
        info!(count = records.len(), path = %self.path.display(), "Loaded mentor snapshot");
        Ok(records)
    }

    async fn insert_batch(&self, mentors: &[MentorInput]) -> Result<Vec<MentorRecord>> {
        if let Some(bad) = mentors.iter().find(|m| m.name.is_empty() || m.university.is_empty()) {
            return Err(Error::Store(format!(
                "batch rejected: mentor '{}' is missing name or university",
                bad.name
            )));
        }

        let mut records = self.load().await?;
        let mut next_id = records.iter().map(|r| r.id).max().unwrap_or(0) + 1;
        let now = Utc::now();

        let mut inserted = Vec::with_capacity(mentors.len());
        for mentor in mentors {
            inserted.push(MentorRecord {
                id: next_id,
                name: mentor.name.clone(),
                university: mentor.university.clone(),
                major: mentor.major.clone(),
                path: mentor.path.as_str().to_string(),
                category: mentor.category,
                angkatan: mentor.angkatan,
                whatsapp: mentor.whatsapp.clone(),
                instagram: mentor.instagram.clone(),
                email: mentor.email.clone(),
                achievements: mentor.achievements.clone(),
                created_at: Some(now),
                updated_at: Some(now),
            });
            next_id += 1;
        }

        records.extend(inserted.iter().cloned());
        self.save(&records).await?;
        info!(count = inserted.len(), "Inserted mentors into snapshot");
        Ok(inserted)
    }

    async fn delete_ids(&self, ids: &[i64]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut records = self.load().await?;
        let before = records.len();
        records.retain(|r| !ids.contains(&r.id));
        let removed = before - records.len();

        if removed > 0 {
            self.save(&records).await?;
        }
        info!(removed, requested = ids.len(), "Deleted mentors from snapshot");
        Ok(removed)
    }
}

pub struct RestStore {
    client: reqwest::Client,
    base_url: String,
    table: String,
    api_key: String,
}

impl RestStore {
    pub fn new(base_url: &str, table: &str, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            table: table.to_string(),
            api_key,
        }
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, self.table)
    }

    fn request(&self, method: reqwest::Method) -> reqwest::RequestBuilder {
        self.client
            .request(method, self.table_url())
            .timeout(Duration::from_secs(30))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn check(response: reqwest::Response, action: &str) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(Error::Store(format!("{} failed with status {}: {}", action, status, body)))
    }
}

impl MentorStore for RestStore {
    async fn fetch_all(&self) -> Result<Vec<MentorRecord>> {
        debug!(url = %self.table_url(), "Fetching mentors");
        let response = self
            .request(reqwest::Method::GET)
            .query(&[("select", "*"), ("order", "name.asc")])
            .send()
            .await?;

        let records: Vec<MentorRecord> = Self::check(response, "fetch").await?.json().await?;
        info!(count = records.len(), "Fetched mentors from hosted table");
        Ok(records)
    }

    async fn insert_batch(&self, mentors: &[MentorInput]) -> Result<Vec<MentorRecord>> {
        let response = self
            .request(reqwest::Method::POST)
            .header("Prefer", "return=representation")
            .json(mentors)
            .send()
            .await?;

        let inserted: Vec<MentorRecord> = Self::check(response, "batch insert").await?.json().await?;
        info!(count = inserted.len(), "Inserted mentors into hosted table");
        Ok(inserted)
    }

    async fn delete_ids(&self, ids: &[i64]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let response = self
            .request(reqwest::Method::DELETE)
            .query(&[("id", id_filter(ids))])
            .header("Prefer", "return=representation")
            .send()
            .await?;

        let removed: Vec<MentorRecord> = Self::check(response, "delete").await?.json().await?;
        info!(removed = removed.len(), requested = ids.len(), "Deleted mentors from hosted table");
        Ok(removed.len())
    }
}

/// PostgREST `in` filter, e.g. `in.(3,7,9)`.
fn id_filter(ids: &[i64]) -> String {
    let list: Vec<String> = ids.iter().map(i64::to_string).collect();
    format!("in.({})", list.join(","))
}

/// Store selected by `Config::store_mode`.
pub enum AnyStore {
    Snapshot(SnapshotStore),
    Rest(RestStore),
}

impl MentorStore for AnyStore {
    async fn fetch_all(&self) -> Result<Vec<MentorRecord>> {
        match self {
            AnyStore::Snapshot(store) => store.fetch_all().await,
            AnyStore::Rest(store) => store.fetch_all().await,
        }
    }

    async fn insert_batch(&self, mentors: &[MentorInput]) -> Result<Vec<MentorRecord>> {
        match self {
            AnyStore::Snapshot(store) => store.insert_batch(mentors).await,
            AnyStore::Rest(store) => store.insert_batch(mentors).await,
        }
    }

    async fn delete_ids(&self, ids: &[i64]) -> Result<usize> {
        match self {
            AnyStore::Snapshot(store) => store.delete_ids(ids).await,
            AnyStore::Rest(store) => store.delete_ids(ids).await,
        }
    }
}

pub fn open_store(config: &Config) -> Result<AnyStore> {
    match config.store_mode {
        StoreMode::Local => {
            let path = config.snapshot_path.as_deref().unwrap_or(DEFAULT_SNAPSHOT);
            Ok(AnyStore::Snapshot(SnapshotStore::new(path)))
        }
        StoreMode::Remote => {
            let url = config
                .remote_url
                .as_deref()
                .ok_or_else(|| Error::Config("remote_url is not set".to_string()))?;
            let table = config.remote_table.as_deref().unwrap_or(DEFAULT_TABLE);
            let key_env = config.remote_key_env.as_deref().unwrap_or(DEFAULT_KEY_ENV);
            let api_key = std::env::var(key_env)
                .map_err(|_| Error::Config(format!("environment variable {} is not set", key_env)))?;
            Ok(AnyStore::Rest(RestStore::new(url, table, api_key)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AdmissionPath, Category};

    fn input(name: &str, university: &str) -> MentorInput {
        MentorInput {
            name: name.to_string(),
            university: university.to_string(),
            major: "Teknik Sipil".to_string(),
            path: AdmissionPath::Snbp,
            category: Category::Ptn,
            angkatan: 2024,
            whatsapp: Some("wa.me/6281".to_string()),
            instagram: None,
            email: None,
            achievements: vec![],
        }
    }

    #[tokio::test]
    async fn test_missing_snapshot_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("none.json"));
        assert!(store.fetch_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_insert_assigns_ids_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("nested").join("mentors.json"));

        let first = store.insert_batch(&[input("Zaki", "ITB"), input("Ani", "UI")]).await.unwrap();
        assert_eq!(first.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(first[0].path, "SNBP");

        let second = store.insert_batch(&[input("Budi", "UGM")]).await.unwrap();
        assert_eq!(second[0].id, 3);

        let all = store.fetch_all().await.unwrap();
        let names: Vec<&str> = all.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Ani", "Budi", "Zaki"]);
    }

    #[tokio::test]
    async fn test_invalid_batch_leaves_snapshot_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("mentors.json"));
        store.insert_batch(&[input("Ani", "UI")]).await.unwrap();

        let err = store.insert_batch(&[input("Budi", "UGM"), input("Cici", "")]).await.unwrap_err();
        assert!(matches!(err, Error::Store(_)));
        assert_eq!(store.fetch_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_ids_keeps_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("mentors.json"));
        store
            .insert_batch(&[input("Ani", "UI"), input("Ani", "UI"), input("Budi", "UGM")])
            .await
            .unwrap();

        assert_eq!(store.delete_ids(&[2, 99]).await.unwrap(), 1);
        assert_eq!(store.delete_ids(&[]).await.unwrap(), 0);

        let ids: Vec<i64> = store.fetch_all().await.unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert!(!dir.path().join("mentors.json.tmp").exists());

        let next = store.insert_batch(&[input("Cici", "ITS")]).await.unwrap();
        assert_eq!(next[0].id, 4);
    }

    #[tokio::test]
    async fn test_failed_rename_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mentors.json");
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("keep"), "x").unwrap();

        let store = SnapshotStore::new(path.clone());
        assert!(matches!(store.save(&[]).await, Err(Error::Io(_))));
        assert!(!dir.path().join("mentors.json.tmp").exists());
    }

    #[test]
    fn test_id_filter() {
        assert_eq!(id_filter(&[3, 7, 9]), "in.(3,7,9)");
    }

    #[test]
    fn test_rest_table_url() {
        let store = RestStore::new("https://abc.supabase.co/", "mentors", "key".to_string());
        assert_eq!(store.table_url(), "https://abc.supabase.co/rest/v1/mentors");
    }

    #[test]
    fn test_open_store_local() {
        let config = Config {
            snapshot_path: Some("x/y.json".to_string()),
            ..Config::default()
        };
        match open_store(&config).unwrap() {
            AnyStore::Snapshot(store) => assert_eq!(store.path(), Path::new("x/y.json")),
            AnyStore::Rest(_) => panic!("expected snapshot store"),
        }
    }

    #[test]
    fn test_open_store_remote_needs_key() {
        let config = Config {
            store_mode: StoreMode::Remote,
            remote_key_env: Some("MENTOR_IMPORTER_TEST_KEY_UNSET".to_string()),
            ..Config::default()
        };
        assert!(matches!(open_store(&config), Err(Error::Config(_))));
    }
}
