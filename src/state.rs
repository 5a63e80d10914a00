use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use crate::config::{AppConfig, BackendConfig};
use crate::storage::{local::LocalBlobStore, BlobStore, S3BlobStore, S3Settings};
use crate::timesheet::{
    file_repo::JsonFileRecordStore,
    repo::{PgRecordStore, RecordStore},
};
use crate::videos::services::VideoLibrary;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub records: Arc<dyn RecordStore>,
    pub videos: VideoLibrary,
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let (records, blobs): (Arc<dyn RecordStore>, Arc<dyn BlobStore>) = match &config.backend {
            BackendConfig::Local(local) => {
                let records = JsonFileRecordStore::open(&local.data_file).await?;
                let blobs = LocalBlobStore::open(&local.video_dir).await?;
                (
                    Arc::new(records) as Arc<dyn RecordStore>,
                    Arc::new(blobs) as Arc<dyn BlobStore>,
                )
            }
            BackendConfig::Cloud(cloud) => {
                let db = sqlx::postgres::PgPoolOptions::new()
                    .max_connections(10)
                    .connect(&cloud.database_url)
                    .await
                    .context("connect to database")?;

                PgRecordStore::migrate(&db).await?;

                // Real S3/MinIO
                let blobs = S3BlobStore::new(S3Settings {
                    endpoint: &cloud.s3_endpoint,
                    bucket: &cloud.s3_bucket,
                    access_key: &cloud.s3_access_key,
                    secret_key: &cloud.s3_secret_key,
                    region: &cloud.s3_region,
                    key_prefix: &cloud.s3_key_prefix,
                    presign_ttl_secs: cloud.presign_ttl_secs,
                })
                .await?;
                (
                    Arc::new(PgRecordStore::new(db)) as Arc<dyn RecordStore>,
                    Arc::new(blobs) as Arc<dyn BlobStore>,
                )
            }
        };
        info!(backend = config.backend_name(), "stores ready");

        Ok(Self::from_parts(Arc::new(config), records, blobs))
    }

    pub fn from_parts(config: Arc<AppConfig>, records: Arc<dyn RecordStore>, blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            config,
            records,
            videos: VideoLibrary::new(blobs),
        }
    }
}
