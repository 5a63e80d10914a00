use std::path::{Path, PathBuf};

use anyhow::Context;
use axum::async_trait;
use bytes::Bytes;
use tokio::fs;
use tracing::debug;

use super::{BlobStore, ObjectBody};

/// Declared content types live beside the videos, one small file per object.
const TYPES_DIR: &str = ".types";

/// Video files stored flat in one directory.
#[derive(Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub async fn open<P: Into<PathBuf>>(root: P) -> anyhow::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .await
            .with_context(|| format!("create {}", root.display()))?;
        Ok(Self { root })
    }

    fn path(&self, name: &str) -> anyhow::Result<PathBuf> {
        anyhow::ensure!(
            !name.is_empty() && !name.contains(['/', '\\']) && name != "." && name != "..",
            "invalid object name {name:?}"
        );
        Ok(self.root.join(name))
    }

    fn type_path(&self, name: &str) -> PathBuf {
        self.root.join(TYPES_DIR).join(name)
    }

    async fn stored_content_type(&self, name: &str) -> anyhow::Result<String> {
        let path = self.type_path(name);
        match fs::read_to_string(&path).await {
            Ok(ct) if !ct.trim().is_empty() => Ok(ct.trim().to_string()),
            Ok(_) => Ok(content_type_for(name).to_string()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(content_type_for(name).to_string()),
            Err(e) => Err(e).with_context(|| format!("read {}", path.display())),
        }
    }
}

pub fn content_type_for(name: &str) -> &'static str {
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("mp4" | "m4v") => "video/mp4",
        Some("webm") => "video/webm",
        Some("mov" | "qt") => "video/quicktime",
        Some("mkv") => "video/x-matroska",
        Some("avi") => "video/x-msvideo",
        Some("ogv" | "ogg") => "video/ogg",
        Some("3gp") => "video/3gpp",
        Some("3g2") => "video/3gpp2",
        Some("ts" | "m2ts" | "mts") => "video/mp2t",
        Some("mpeg" | "mpg" | "mpe") => "video/mpeg",
        Some("flv") => "video/x-flv",
        Some("wmv") => "video/x-ms-wmv",
        Some("asf") => "video/x-ms-asf",
        _ => "application/octet-stream",
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn list_objects(&self) -> anyhow::Result<Vec<String>> {
        let mut dir = fs::read_dir(&self.root)
            .await
            .with_context(|| format!("read dir {}", self.root.display()))?;
        let mut names = Vec::new();
        while let Some(entry) = dir.next_entry().await.context("read dir entry")? {
            if !entry.file_type().await.map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    async fn put_object(&self, name: &str, body: Bytes, content_type: &str) -> anyhow::Result<()> {
        let path = self.path(name)?;
        fs::write(&path, &body)
            .await
            .with_context(|| format!("write {}", path.display()))?;

        let type_path = self.type_path(name);
        fs::create_dir_all(self.root.join(TYPES_DIR))
            .await
            .context("create content type dir")?;
        fs::write(&type_path, content_type)
            .await
            .with_context(|| format!("write {}", type_path.display()))?;
        debug!(path = %path.display(), size = body.len(), "video file written");
        Ok(())
    }

    async fn get_object(&self, name: &str) -> anyhow::Result<Option<ObjectBody>> {
        let path = self.path(name)?;
        match fs::read(&path).await {
            Ok(data) => Ok(Some(ObjectBody::Bytes {
                body: Bytes::from(data),
                content_type: self.stored_content_type(name).await?,
            })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("read {}", path.display())),
        }
    }

    async fn delete_object(&self, name: &str) -> anyhow::Result<()> {
        let path = self.path(name)?;
        let type_path = self.type_path(name);
        match fs::remove_file(&type_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e).with_context(|| format!("remove {}", type_path.display())),
        }
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(path = %path.display(), "video file removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("remove {}", path.display())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    async fn tmp_store() -> anyhow::Result<LocalBlobStore> {
        LocalBlobStore::open(std::env::temp_dir().join(format!("timesheet_videos_{}", Uuid::new_v4()))).await
    }

    #[tokio::test]
    async fn put_get_list_delete() -> anyhow::Result<()> {
        let store = tmp_store().await?;
        store
            .put_object("2024-05-01_meal2.webm", Bytes::from_static(b"clip"), "video/webm")
            .await?;

        assert_eq!(store.list_objects().await?, vec!["2024-05-01_meal2.webm".to_string()]);
        assert_eq!(
            store.get_object("2024-05-01_meal2.webm").await?,
            Some(ObjectBody::Bytes {
                body: Bytes::from_static(b"clip"),
                content_type: "video/webm".into(),
            })
        );

        store.delete_object("2024-05-01_meal2.webm").await?;
        assert!(store.list_objects().await?.is_empty());
        assert_eq!(store.get_object("2024-05-01_meal2.webm").await?, None);

        let _ = fs::remove_dir_all(&store.root).await;
        Ok(())
    }

    #[tokio::test]
    async fn deleting_missing_object_is_ok() -> anyhow::Result<()> {
        let store = tmp_store().await?;
        store.delete_object("2024-05-01_meal1.mp4").await?;
        let _ = fs::remove_dir_all(&store.root).await;
        Ok(())
    }

    #[tokio::test]
    async fn names_cannot_escape_the_directory() -> anyhow::Result<()> {
        let store = tmp_store().await?;
        assert!(store.put_object("../x.mp4", Bytes::new(), "video/mp4").await.is_err());
        assert!(store.get_object("a/b.mp4").await.is_err());
        let _ = fs::remove_dir_all(&store.root).await;
        Ok(())
    }

    #[tokio::test]
    async fn declared_content_type_is_served_back() -> anyhow::Result<()> {
        let store = tmp_store().await?;
        store
            .put_object("2024-05-01_meal1.ts", Bytes::from_static(b"ts"), "video/mp2t")
            .await?;
        store
            .put_object("2024-05-01_meal2.bin", Bytes::from_static(b"raw"), "video/x-custom")
            .await?;

        assert_eq!(
            store.list_objects().await?,
            vec!["2024-05-01_meal1.ts".to_string(), "2024-05-01_meal2.bin".to_string()]
        );
        let Some(ObjectBody::Bytes { content_type, .. }) = store.get_object("2024-05-01_meal2.bin").await? else {
            panic!("object missing");
        };
        assert_eq!(content_type, "video/x-custom");

        store.delete_object("2024-05-01_meal2.bin").await?;
        assert!(!store.type_path("2024-05-01_meal2.bin").exists());

        // files dropped in by hand fall back to the extension
        fs::remove_file(store.type_path("2024-05-01_meal1.ts")).await?;
        let Some(ObjectBody::Bytes { content_type, .. }) = store.get_object("2024-05-01_meal1.ts").await? else {
            panic!("object missing");
        };
        assert_eq!(content_type, "video/mp2t");

        let _ = fs::remove_dir_all(&store.root).await;
        Ok(())
    }

    #[test]
    fn content_types_by_extension() {
        assert_eq!(content_type_for("a.MP4"), "video/mp4");
        assert_eq!(content_type_for("a.mov"), "video/quicktime");
        assert_eq!(content_type_for("a.webm"), "video/webm");
        assert_eq!(content_type_for("a.ts"), "video/mp2t");
        assert_eq!(content_type_for("a.mpg"), "video/mpeg");
        assert_eq!(content_type_for("a.wmv"), "video/x-ms-wmv");
        assert_eq!(content_type_for("a"), "application/octet-stream");
    }
}
