use anyhow::Context;
use aws_config::{defaults, BehaviorVersion};
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Region},
    presigning::PresigningConfig,
    Client,
};
use aws_smithy_types::byte_stream::ByteStream;
use axum::async_trait;
use bytes::Bytes;
use tracing::debug;

pub mod local;
#[cfg(test)]
pub mod memory;

/// What a backend hands back for a stored object.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectBody {
    Bytes { body: Bytes, content_type: String },
    /// Time-limited URL the client should be redirected to.
    Redirect(String),
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn list_objects(&self) -> anyhow::Result<Vec<String>>;
    async fn put_object(&self, name: &str, body: Bytes, content_type: &str) -> anyhow::Result<()>;
    async fn get_object(&self, name: &str) -> anyhow::Result<Option<ObjectBody>>;
    /// Removing a missing object is not an error.
    async fn delete_object(&self, name: &str) -> anyhow::Result<()>;
}

pub struct S3Settings<'a> {
    pub endpoint: &'a str,
    pub bucket: &'a str,
    pub access_key: &'a str,
    pub secret_key: &'a str,
    pub region: &'a str,
    pub key_prefix: &'a str,
    pub presign_ttl_secs: u64,
}

#[derive(Clone)]
pub struct S3BlobStore {
    client: Client,
    bucket: String,
    key_prefix: String,
    presign_ttl_secs: u64,
}

impl S3BlobStore {
    pub async fn new(settings: S3Settings<'_>) -> anyhow::Result<Self> {
        let shared = defaults(BehaviorVersion::latest())
            .region(Region::new(settings.region.to_string()))
            .credentials_provider(Credentials::new(
                settings.access_key,
                settings.secret_key,
                None,
                None,
                "static",
            ))
            .endpoint_url(settings.endpoint)
            .load()
            .await;

        let conf = S3ConfigBuilder::from(&shared)
            .endpoint_url(settings.endpoint)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(conf),
            bucket: settings.bucket.to_string(),
            key_prefix: settings.key_prefix.to_string(),
            presign_ttl_secs: settings.presign_ttl_secs,
        })
    }

    fn key(&self, name: &str) -> String {
        object_key(&self.key_prefix, name)
    }
}

fn object_key(prefix: &str, name: &str) -> String {
    format!("{prefix}{name}")
}

/// Strips the bucket prefix; keys outside it or in nested "folders" are skipped.
fn object_name<'a>(prefix: &str, key: &'a str) -> Option<&'a str> {
    key.strip_prefix(prefix)
        .filter(|name| !name.is_empty() && !name.contains('/'))
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn list_objects(&self) -> anyhow::Result<Vec<String>> {
        let mut names = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let mut req = self.client.list_objects_v2().bucket(&self.bucket);
            if !self.key_prefix.is_empty() {
                req = req.prefix(&self.key_prefix);
            }
            let out = req
                .set_continuation_token(token.take())
                .send()
                .await
                .context("s3 list_objects_v2")?;

            names.extend(
                out.contents()
                    .iter()
                    .filter_map(|o| o.key())
                    .filter_map(|k| object_name(&self.key_prefix, k))
                    .map(str::to_string),
            );

            match out.next_continuation_token() {
                Some(next) if out.is_truncated().unwrap_or(false) => token = Some(next.to_string()),
                _ => break,
            }
        }
        Ok(names)
    }

    async fn put_object(&self, name: &str, body: Bytes, content_type: &str) -> anyhow::Result<()> {
        let key = self.key(name);
        let size = body.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .context("s3 put_object")?;
        debug!(%key, size, "s3 object stored");
        Ok(())
    }

    async fn get_object(&self, name: &str) -> anyhow::Result<Option<ObjectBody>> {
        let key = self.key(name);
        let head = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await;
        if let Err(err) = head {
            if err.as_service_error().is_some_and(|e| e.is_not_found()) {
                return Ok(None);
            }
            return Err(err).context("s3 head_object");
        }

        let req = self.client.get_object().bucket(&self.bucket).key(&key);
        let presigned = req
            .presigned(PresigningConfig::expires_in(
                std::time::Duration::from_secs(self.presign_ttl_secs),
            )?)
            .await
            .context("s3 presign_get")?;
        Ok(Some(ObjectBody::Redirect(presigned.uri().to_string())))
    }

    async fn delete_object(&self, name: &str) -> anyhow::Result<()> {
        let key = self.key(name);
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .context("s3 delete_object")?;
        debug!(%key, "s3 object deleted");
        Ok(())
    }
}
