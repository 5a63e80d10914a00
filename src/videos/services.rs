use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use bytes::Bytes;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, info};

use crate::storage::{BlobStore, ObjectBody};
use crate::timesheet::repo_types::{DateKey, MealSlot};

const DEFAULT_EXT: &str = ".mp4";

pub struct UploadItem {
    pub body: Bytes,
    pub content_type: String,
    pub file_name: Option<String>,
}

pub fn is_video(content_type: &str) -> bool {
    content_type
        .get(..6)
        .is_some_and(|head| head.eq_ignore_ascii_case("video/"))
}

/// `.webm` from `clip.WebM`; `.mp4` when the name has no usable extension.
pub fn extension_for(file_name: Option<&str>) -> String {
    file_name
        .and_then(|n| Path::new(n).extension())
        .and_then(|e| e.to_str())
        .filter(|e| (1..=8).contains(&e.len()) && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_else(|| DEFAULT_EXT.to_string())
}

pub fn blob_prefix(date_key: &DateKey, slot: MealSlot) -> String {
    format!("{date_key}_meal{slot}")
}

fn belongs_to(name: &str, prefix: &str) -> bool {
    name.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('.'))
}

/// Splits `2024-05-01_meal2.mp4` into its date and meal.
pub fn parse_blob_name(name: &str) -> Option<(&str, MealSlot)> {
    lazy_static! {
        static ref BLOB_RE: Regex =
            Regex::new(r"^(\d{4}-\d{2}-\d{2})_meal([1-4])(?:\.|$)").expect("valid blob name regex");
    }
    let caps = BLOB_RE.captures(name)?;
    let date = caps.get(1)?.as_str();
    let slot = MealSlot::parse(caps.get(2)?.as_str())?;
    Some((date, slot))
}

/// One video per date and meal, layered over a raw blob store.
#[derive(Clone)]
pub struct VideoLibrary {
    store: Arc<dyn BlobStore>,
}

impl VideoLibrary {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }

    pub async fn list(&self) -> anyhow::Result<Vec<String>> {
        self.store.list_objects().await
    }

    async fn names_for(&self, date_key: &DateKey, slot: MealSlot) -> anyhow::Result<Vec<String>> {
        let prefix = blob_prefix(date_key, slot);
        Ok(self
            .store
            .list_objects()
            .await?
            .into_iter()
            .filter(|n| belongs_to(n, &prefix))
            .collect())
    }

    /// Replaces whatever was stored for the pair; returns the new file name.
    pub async fn put(&self, date_key: &DateKey, slot: MealSlot, item: UploadItem) -> anyhow::Result<String> {
        anyhow::ensure!(is_video(&item.content_type), "not a video: {}", item.content_type);

        let replaced = self.delete(date_key, slot).await?;
        let name = format!(
            "{}{}",
            blob_prefix(date_key, slot),
            extension_for(item.file_name.as_deref())
        );
        let size = item.body.len();
        self.store
            .put_object(&name, item.body, &item.content_type)
            .await
            .with_context(|| format!("store video {name}"))?;
        info!(%name, size, replaced, "video stored");
        Ok(name)
    }

    pub async fn get(&self, date_key: &DateKey, slot: MealSlot) -> anyhow::Result<Option<ObjectBody>> {
        let Some(name) = self.names_for(date_key, slot).await?.into_iter().next() else {
            return Ok(None);
        };
        self.store.get_object(&name).await
    }

    /// Returns how many blobs were removed; zero is fine.
    pub async fn delete(&self, date_key: &DateKey, slot: MealSlot) -> anyhow::Result<usize> {
        let names = self.names_for(date_key, slot).await?;
        for name in &names {
            self.store
                .delete_object(name)
                .await
                .with_context(|| format!("delete video {name}"))?;
        }
        if !names.is_empty() {
            debug!(%date_key, %slot, removed = names.len(), "videos removed");
        }
        Ok(names.len())
    }

    pub async fn delete_all(&self) -> anyhow::Result<usize> {
        let names = self.store.list_objects().await?;
        for name in &names {
            self.store
                .delete_object(name)
                .await
                .with_context(|| format!("delete video {name}"))?;
        }
        info!(removed = names.len(), "all videos removed");
        Ok(names.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryBlobStore;

    fn key(raw: &str) -> DateKey {
        DateKey::parse(raw).unwrap()
    }

    fn slot(n: u8) -> MealSlot {
        MealSlot::new(n).unwrap()
    }

    fn upload(body: &'static [u8], ct: &str, name: Option<&str>) -> UploadItem {
        UploadItem {
            body: Bytes::from_static(body),
            content_type: ct.into(),
            file_name: name.map(str::to_string),
        }
    }

    #[test]
    fn video_content_types() {
        assert!(is_video("video/mp4"));
        assert!(is_video("Video/QuickTime"));
        assert!(!is_video("image/png"));
        assert!(!is_video("video"));
        assert!(!is_video(""));
    }

    #[test]
    fn extension_rules() {
        assert_eq!(extension_for(Some("lunch.WebM")), ".webm");
        assert_eq!(extension_for(Some("clip.mov")), ".mov");
        assert_eq!(extension_for(Some("noext")), ".mp4");
        assert_eq!(extension_for(Some("weird.m p4")), ".mp4");
        assert_eq!(extension_for(None), ".mp4");
    }

    #[test]
    fn prefix_does_not_cross_slots() {
        assert!(belongs_to("2024-05-01_meal1.mp4", "2024-05-01_meal1"));
        assert!(belongs_to("2024-05-01_meal1", "2024-05-01_meal1"));
        assert!(!belongs_to("2024-05-01_meal12.mp4", "2024-05-01_meal1"));
        assert!(!belongs_to("2024-05-01_meal2.mp4", "2024-05-01_meal1"));
    }

    #[test]
    fn blob_names_parse() {
        assert_eq!(parse_blob_name("2024-05-01_meal2.mp4"), Some(("2024-05-01", slot(2))));
        assert_eq!(parse_blob_name("2024-05-01_meal4"), Some(("2024-05-01", slot(4))));
        assert_eq!(parse_blob_name("2024-05-01_meal5.mp4"), None);
        assert_eq!(parse_blob_name(".DS_Store"), None);
    }

    #[tokio::test]
    async fn reupload_leaves_one_blob() -> anyhow::Result<()> {
        let store = Arc::new(MemoryBlobStore::default());
        let lib = VideoLibrary::new(store.clone());
        let (d, s) = (key("2024-05-01"), slot(1));

        let first = lib.put(&d, s, upload(b"one", "video/mp4", Some("a.mp4"))).await?;
        let second = lib.put(&d, s, upload(b"two", "video/webm", Some("b.webm"))).await?;
        assert_eq!(first, "2024-05-01_meal1.mp4");
        assert_eq!(second, "2024-05-01_meal1.webm");
        assert_eq!(lib.list().await?, vec![second.clone()]);

        match lib.get(&d, s).await? {
            Some(ObjectBody::Bytes { body, content_type }) => {
                assert_eq!(&body[..], b"two");
                assert_eq!(content_type, "video/webm");
            }
            other => panic!("unexpected {other:?}"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn non_video_never_reaches_the_store() {
        let store = Arc::new(MemoryBlobStore::default());
        let lib = VideoLibrary::new(store.clone());
        let res = lib
            .put(&key("2024-05-01"), slot(1), upload(b"x", "image/png", Some("a.png")))
            .await;
        assert!(res.is_err());
        assert_eq!(store.writes(), 0);
    }

    #[tokio::test]
    async fn delete_is_scoped_and_tolerates_missing() -> anyhow::Result<()> {
        let store = Arc::new(MemoryBlobStore::default());
        let lib = VideoLibrary::new(store);
        let d = key("2024-05-01");

        assert_eq!(lib.delete(&d, slot(3)).await?, 0);

        lib.put(&d, slot(1), upload(b"1", "video/mp4", None)).await?;
        lib.put(&d, slot(2), upload(b"2", "video/mp4", None)).await?;
        assert_eq!(lib.delete(&d, slot(1)).await?, 1);
        assert_eq!(lib.list().await?, vec!["2024-05-01_meal2.mp4".to_string()]);
        assert!(lib.get(&d, slot(1)).await?.is_none());

        assert_eq!(lib.delete_all().await?, 1);
        assert!(lib.list().await?.is_empty());
        Ok(())
    }
}
