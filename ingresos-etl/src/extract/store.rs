//! Object storage backends the report can be fetched from

use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_config::meta::region::RegionProviderChain;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::DisplayErrorContext;

/// Region used when neither the config nor the AWS chain names one
pub const DEFAULT_REGION: &str = "us-east-1";

/// Read access to an object store
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch the whole object body
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>>;

    /// Human-readable location of an object, for logs
    fn describe(&self, bucket: &str, key: &str) -> String {
        format!("s3://{}/{}", bucket, key)
    }
}

/// Amazon S3 or an S3-compatible service.
///
/// Requests are SigV4-signed. Credentials come from the standard AWS chain
/// (`AWS_ACCESS_KEY_ID`/`AWS_SECRET_ACCESS_KEY`, `AWS_PROFILE` and the shared
/// config files, web identity, instance metadata).
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
}

impl S3ObjectStore {
    pub fn from_conf(config: aws_sdk_s3::Config) -> Self {
        Self {
            client: aws_sdk_s3::Client::from_conf(config),
        }
    }

    /// Build a client from the AWS environment.
    ///
    /// `region` wins over `AWS_REGION` and the profile. A custom `endpoint`
    /// (MinIO, LocalStack) switches to path-style addressing.
    pub async fn from_env(region: Option<String>, endpoint: Option<String>) -> Self {
        let region = RegionProviderChain::first_try(region.map(Region::new))
            .or_default_provider()
            .or_else(DEFAULT_REGION);
        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(region)
            .load()
            .await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint) = endpoint {
            log::debug!("Using S3 endpoint {}", endpoint);
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }
        Self::from_conf(builder.build())
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        log::debug!("GetObject s3://{}/{}", bucket, key);

        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                anyhow::anyhow!("GetObject s3://{}/{} failed: {}", bucket, key, DisplayErrorContext(&e))
            })?;

        let body = output
            .body
            .collect()
            .await
            .with_context(|| format!("Failed to read body of s3://{}/{}", bucket, key))?;

        Ok(body.into_bytes().to_vec())
    }
}

/// Objects laid out on disk as `{root}/{bucket}/{key}`
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn object_path(&self, bucket: &str, key: &str) -> PathBuf {
        self.root.join(bucket).join(key)
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let path = self.object_path(bucket, key);
        tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))
    }

    fn describe(&self, bucket: &str, key: &str) -> String {
        self.object_path(bucket, key).display().to_string()
    }
}
