use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use super::{BlobStore, ObjectBody};

/// In-process blob store for tests; counts writes so tests can assert none happened.
#[derive(Default)]
pub struct MemoryBlobStore {
    objects: RwLock<BTreeMap<String, (Bytes, String)>>,
    writes: AtomicUsize,
}

impl MemoryBlobStore {
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn list_objects(&self) -> anyhow::Result<Vec<String>> {
        Ok(self.objects.read().await.keys().cloned().collect())
    }

    async fn put_object(&self, name: &str, body: Bytes, content_type: &str) -> anyhow::Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.objects
            .write()
            .await
            .insert(name.to_string(), (body, content_type.to_string()));
        Ok(())
    }

    async fn get_object(&self, name: &str) -> anyhow::Result<Option<ObjectBody>> {
        Ok(self.objects.read().await.get(name).map(|(body, ct)| ObjectBody::Bytes {
            body: body.clone(),
            content_type: ct.clone(),
        }))
    }

    async fn delete_object(&self, name: &str) -> anyhow::Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.objects.write().await.remove(name);
        Ok(())
    }
}
