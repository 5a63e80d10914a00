use std::path::PathBuf;

use anyhow::Context;

const MB: usize = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct LocalConfig {
    pub data_file: PathBuf,
    pub video_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct CloudConfig {
    pub database_url: String,
    pub s3_endpoint: String,
    pub s3_bucket: String,
    pub s3_access_key: String,
    pub s3_secret_key: String,
    pub s3_region: String,
    pub s3_key_prefix: String,
    pub presign_ttl_secs: u64,
}

#[derive(Debug, Clone)]
pub enum BackendConfig {
    Local(LocalConfig),
    Cloud(CloudConfig),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub public_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub backend: BackendConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let backend = match env_or("STORAGE_BACKEND", "local").as_str() {
            "local" => BackendConfig::Local(LocalConfig {
                data_file: env_or("DATA_FILE", "data/timesheet.json").into(),
                video_dir: env_or("VIDEO_DIR", "data/videos").into(),
            }),
            "cloud" => BackendConfig::Cloud(CloudConfig {
                database_url: required("DATABASE_URL")?,
                s3_endpoint: required("S3_ENDPOINT")?,
                s3_bucket: required("S3_BUCKET")?,
                s3_access_key: required("S3_ACCESS_KEY")?,
                s3_secret_key: required("S3_SECRET_KEY")?,
                s3_region: env_or("S3_REGION", "us-east-1"),
                s3_key_prefix: env_or("S3_KEY_PREFIX", ""),
                presign_ttl_secs: std::env::var("PRESIGN_TTL_SECS")
                    .ok()
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(600),
            }),
            other => anyhow::bail!("unknown STORAGE_BACKEND {other:?}, expected local or cloud"),
        };

        let default_mb = match backend {
            BackendConfig::Local(_) => 200,
            BackendConfig::Cloud(_) => 50,
        };
        let max_upload_mb = std::env::var("MAX_UPLOAD_MB")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(default_mb);

        Ok(Self {
            host: env_or("APP_HOST", "0.0.0.0"),
            port: env_or("APP_PORT", "8080")
                .parse()
                .context("APP_PORT must be a port number")?,
            public_dir: env_or("PUBLIC_DIR", "public").into(),
            max_upload_bytes: max_upload_mb * MB,
            backend,
        })
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn backend_name(&self) -> &'static str {
        match self.backend {
            BackendConfig::Local(_) => "local",
            BackendConfig::Cloud(_) => "cloud",
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.into())
}

fn required(key: &str) -> anyhow::Result<String> {
    std::env::var(key).with_context(|| format!("{key} must be set"))
}
