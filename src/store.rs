//! Launch record persistence
//!
//! The station hands finished records to a [`LaunchStore`] and never waits
//! on it. Two implementations ship with the crate: [`JsonFileStore`], one
//! pretty-printed JSON file per launch, and [`MemoryStore`] for tests and
//! ephemeral runs.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::types::{LaunchRecord, LaunchStatus, LaunchSummary};
use crate::{Result, TelemetryError};

/// Storage collaborator for launch records.
#[async_trait::async_trait]
pub trait LaunchStore: Send + Sync + 'static {
    /// Persist a record, replacing any record with the same id.
    async fn save(&self, record: &LaunchRecord) -> Result<()>;

    /// Summaries of every stored record, newest first.
    async fn list(&self) -> Result<Vec<LaunchSummary>>;

    /// Load one record with its samples.
    async fn load(&self, id: &str) -> Result<LaunchRecord>;

    /// Remove a record.
    async fn delete(&self, id: &str) -> Result<()>;

    /// Change the operator status of a record and return the updated record.
    async fn update_status(&self, id: &str, status: LaunchStatus) -> Result<LaunchRecord> {
        let mut record = self.load(id).await?;
        record.status = status;
        self.save(&record).await?;
        Ok(record)
    }
}

/// Record ids end up in file names, so only `[A-Za-z0-9_-]` is accepted.
pub fn validate_record_id(id: &str) -> Result<()> {
    let valid = !id.is_empty()
        && id.len() <= 64
        && id.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
    if valid { Ok(()) } else { Err(TelemetryError::InvalidRecordId { id: id.to_string() }) }
}

fn newest_first(summaries: &mut [LaunchSummary]) {
    summaries.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| b.id.cmp(&a.id)));
}

/// Distinguishes temp files of concurrent saves within this process.
static SAVE_SEQ: AtomicU64 = AtomicU64::new(0);

fn io_failure(action: &str, path: &Path, source: std::io::Error) -> TelemetryError {
    TelemetryError::store_error_with_source(
        format!("failed to {} {}", action, path.display()),
        Box::new(source),
    )
}

/// Stores each record as `launch_<id>.json` in a directory.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    const PREFIX: &'static str = "launch_";
    const SUFFIX: &'static str = ".json";

    /// Use `dir`, creating it on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> Result<PathBuf> {
        validate_record_id(id)?;
        Ok(self.dir.join(format!("{}{}{}", Self::PREFIX, id, Self::SUFFIX)))
    }

    /// Sibling temp path, unique per save, that `list` never matches.
    fn temp_path_for(path: &Path) -> PathBuf {
        let seq = SAVE_SEQ.fetch_add(1, Ordering::Relaxed);
        let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(format!(".{}.{}.tmp", std::process::id(), seq));
        path.with_file_name(name)
    }

    async fn read_record(path: &Path) -> Result<LaunchRecord> {
        let bytes = tokio::fs::read(path).await.map_err(|e| io_failure("read", path, e))?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait::async_trait]
impl LaunchStore for JsonFileStore {
    async fn save(&self, record: &LaunchRecord) -> Result<()> {
        let path = self.path_for(&record.id)?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| io_failure("create", &self.dir, e))?;

        let json = serde_json::to_vec_pretty(record)?;

        // Readers never see a partially written file
        let tmp = Self::temp_path_for(&path);
        tokio::fs::write(&tmp, &json).await.map_err(|e| io_failure("write", &tmp, e))?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(io_failure("replace", &path, e));
        }

        info!(
            id = %record.id,
            path = %path.display(),
            bytes = json.len(),
            "Launch record saved"
        );
        Ok(())
    }

    async fn list(&self) -> Result<Vec<LaunchSummary>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_failure("list", &self.dir, e)),
        };

        let mut summaries = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| io_failure("list", &self.dir, e))?
        {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !(name.starts_with(Self::PREFIX) && name.ends_with(Self::SUFFIX)) {
                continue;
            }

            let path = entry.path();
            match Self::read_record(&path).await {
                Ok(record) => summaries.push(record.summary()),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable record"),
            }
        }

        newest_first(&mut summaries);
        debug!(count = summaries.len(), dir = %self.dir.display(), "Listed launch records");
        Ok(summaries)
    }

    async fn load(&self, id: &str) -> Result<LaunchRecord> {
        let path = self.path_for(id)?;
        match tokio::fs::metadata(&path).await {
            Ok(_) => Self::read_record(&path).await,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(TelemetryError::RecordNotFound { id: id.to_string() })
            }
            Err(e) => Err(io_failure("read", &path, e)),
        }
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let path = self.path_for(id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                info!(id, "Launch record deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(TelemetryError::RecordNotFound { id: id.to_string() })
            }
            Err(e) => Err(io_failure("delete", &path, e)),
        }
    }
}

/// Keeps records in memory for the life of the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, LaunchRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl LaunchStore for MemoryStore {
    async fn save(&self, record: &LaunchRecord) -> Result<()> {
        validate_record_id(&record.id)?;
        self.records.write().await.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<LaunchSummary>> {
        let mut summaries: Vec<_> =
            self.records.read().await.values().map(LaunchRecord::summary).collect();
        newest_first(&mut summaries);
        Ok(summaries)
    }

    async fn load(&self, id: &str) -> Result<LaunchRecord> {
        self.records
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| TelemetryError::RecordNotFound { id: id.to_string() })
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.records
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| TelemetryError::RecordNotFound { id: id.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::sample_at;
    use chrono::{Duration, Utc};
    use proptest::prelude::*;
    use std::sync::Arc;

    fn record(id: &str, minutes_ago: i64) -> LaunchRecord {
        LaunchRecord::from_samples(
            id.to_string(),
            format!("Launch {}", id),
            Utc::now() - Duration::minutes(minutes_ago),
            "Naro Space Center".into(),
            12.5,
            vec![sample_at(10.0, 5.0), sample_at(50.0, 20.0)],
        )
    }

    #[tokio::test]
    async fn file_store_round_trips_and_lists_newest_first() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = JsonFileStore::new(dir.path().join("launch_data"));

        assert!(store.list().await?.is_empty());

        store.save(&record("100", 10)).await?;
        store.save(&record("200", 1)).await?;

        let listed = store.list().await?;
        let ids: Vec<_> = listed.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["200", "100"]);
        assert_eq!(listed[0].sample_count, 2);

        let loaded = store.load("100").await?;
        assert_eq!(loaded, record_with_date(&loaded, record("100", 10)));
        assert!(dir.path().join("launch_data/launch_100.json").exists());
        Ok(())
    }

    // Dates are generated relative to now, so compare everything else.
    fn record_with_date(reference: &LaunchRecord, mut other: LaunchRecord) -> LaunchRecord {
        other.date = reference.date;
        other
    }

    #[tokio::test]
    async fn file_store_updates_and_deletes() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = JsonFileStore::new(dir.path());
        store.save(&record("42", 0)).await?;

        let updated = store.update_status("42", LaunchStatus::Partial).await?;
        assert_eq!(updated.status, LaunchStatus::Partial);
        assert_eq!(store.load("42").await?.status, LaunchStatus::Partial);

        store.delete("42").await?;
        assert!(matches!(store.load("42").await, Err(TelemetryError::RecordNotFound { .. })));
        assert!(matches!(store.delete("42").await, Err(TelemetryError::RecordNotFound { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn unreadable_files_are_skipped() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = JsonFileStore::new(dir.path());
        store.save(&record("1", 0)).await?;
        tokio::fs::write(dir.path().join("launch_broken.json"), b"{ not json").await?;
        tokio::fs::write(dir.path().join("notes.txt"), b"ignored").await?;

        let listed = store.list().await?;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, "1");
        Ok(())
    }

    #[tokio::test]
    async fn io_failures_are_store_errors() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let blocker = dir.path().join("not_a_dir");
        tokio::fs::write(&blocker, b"file in the way").await?;

        let err = JsonFileStore::new(&blocker).save(&record("1", 0)).await.unwrap_err();
        assert!(matches!(err, TelemetryError::Store { source: Some(_), .. }));
        assert!(err.is_retryable());
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_saves_of_one_record_all_land() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = Arc::new(JsonFileStore::new(dir.path()));

        let saves: Vec<_> = (0..16)
            .map(|i| {
                let store = Arc::clone(&store);
                let mut rec = record("42", 0);
                rec.name = format!("save {}", i);
                tokio::spawn(async move { store.save(&rec).await })
            })
            .collect();
        for save in saves {
            save.await??;
        }

        assert!(store.load("42").await?.name.starts_with("save "));
        let mut entries = tokio::fs::read_dir(dir.path()).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        assert_eq!(names, vec!["launch_42.json"]);
        Ok(())
    }

    #[tokio::test]
    async fn path_traversal_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        let err = store.load("../etc/passwd").await.unwrap_err();
        assert!(matches!(err, TelemetryError::InvalidRecordId { .. }));
    }

    #[tokio::test]
    async fn memory_store_behaves_like_file_store() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        store.save(&record("1", 5)).await?;
        store.save(&record("2", 0)).await?;

        let ids: Vec<_> = store.list().await?.into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["2", "1"]);

        let updated = store.update_status("1", LaunchStatus::Failed).await?;
        assert_eq!(updated.status, LaunchStatus::Failed);
        store.delete("1").await?;
        assert!(store.load("1").await.is_err());
        Ok(())
    }

    proptest! {
        #[test]
        fn ids_outside_the_safe_alphabet_are_rejected(id in ".*[^A-Za-z0-9_-].*") {
            prop_assert!(validate_record_id(&id).is_err());
        }

        #[test]
        fn safe_ids_are_accepted(id in "[A-Za-z0-9_-]{1,64}") {
            prop_assert!(validate_record_id(&id).is_ok());
        }
    }
}
