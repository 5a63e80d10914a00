use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use anyhow::Context;
use axum::async_trait;
use time::OffsetDateTime;
use tokio::{fs, sync::Mutex};
use tracing::{debug, info};
use uuid::Uuid;

use super::repo::RecordStore;
use super::repo_types::{DateKey, RecordPatch, TimesheetRecord};

/// Timesheet records kept as one JSON object on disk.
///
/// The whole map lives in memory; every mutation rewrites the file while the
/// lock is held, so writers never interleave.
pub struct JsonFileRecordStore {
    records: Mutex<BTreeMap<String, TimesheetRecord>>,
    file_path: PathBuf,
}

impl JsonFileRecordStore {
    /// Loads the file, creating it with an empty map if it doesn't exist yet.
    pub async fn open<P: Into<PathBuf>>(path: P) -> anyhow::Result<Self> {
        let file_path = path.into();
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("create {}", parent.display()))?;
        }

        let records = match fs::read(&file_path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => BTreeMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)
                .with_context(|| format!("parse {}", file_path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let empty = BTreeMap::new();
                write_atomic(&file_path, &empty).await?;
                empty
            }
            Err(e) => {
                return Err(e).with_context(|| format!("read {}", file_path.display()));
            }
        };
        info!(path = %file_path.display(), records = records.len(), "record file loaded");

        Ok(Self {
            records: Mutex::new(records),
            file_path,
        })
    }
}

async fn write_atomic(path: &Path, records: &BTreeMap<String, TimesheetRecord>) -> anyhow::Result<()> {
    let data = serde_json::to_vec_pretty(records).context("serialize records")?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(format!(".{}.tmp", Uuid::new_v4()));
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, data)
        .await
        .with_context(|| format!("write {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .await
        .with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}

#[async_trait]
impl RecordStore for JsonFileRecordStore {
    async fn list_all(&self) -> anyhow::Result<BTreeMap<String, TimesheetRecord>> {
        Ok(self.records.lock().await.clone())
    }

    async fn upsert(&self, date_key: &DateKey, patch: &RecordPatch) -> anyhow::Result<TimesheetRecord> {
        let mut records = self.records.lock().await;
        let mut record = records.get(date_key.as_str()).cloned().unwrap_or_default();
        record.apply(patch, OffsetDateTime::now_utc());
        // video names come from the blob store on read
        record.videos.clear();

        let previous = records.insert(date_key.to_string(), record.clone());
        if let Err(e) = write_atomic(&self.file_path, &records).await {
            match previous {
                Some(prev) => records.insert(date_key.to_string(), prev),
                None => records.remove(date_key.as_str()),
            };
            return Err(e);
        }
        debug!(%date_key, "record saved");
        Ok(record)
    }

    async fn delete_all(&self) -> anyhow::Result<()> {
        let mut records = self.records.lock().await;
        write_atomic(&self.file_path, &BTreeMap::new()).await?;
        let removed = records.len();
        records.clear();
        debug!(removed, "records cleared");
        Ok(())
    }
}
