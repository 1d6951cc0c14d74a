//! S3-compatible object storage (DigitalOcean Spaces by default).
//!
//! The SDK is async; every call here is driven to completion on a private
//! current-thread runtime so callers see plain blocking operations.

use anyhow::{Context, Result};
use aws_sdk_s3::config::{BehaviorVersion, Credentials as SdkCredentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use std::path::Path;
use tokio::runtime::Runtime;

use super::ObjectStore;
use crate::config::StorageConfig;
use crate::credentials::Credentials;

pub struct S3Store {
    client: aws_sdk_s3::Client,
    bucket: String,
    runtime: Runtime,
}

impl S3Store {
    /// Build a client from the spaces credential file named in `config`.
    pub fn connect(config: &StorageConfig) -> Result<Self> {
        let creds = Credentials::load_spaces(&config.credentials_file)?;
        let access_key = creds.require("spacekey")?;
        let secret = creds.require("secret")?;
        let bucket = creds.require("bucket")?.to_string();

        let sdk_config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .endpoint_url(&config.endpoint)
            .force_path_style(config.force_path_style)
            .credentials_provider(SdkCredentials::new(
                access_key,
                secret,
                None,
                None,
                "photosync-credentials-file",
            ))
            .build();

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to start object storage runtime")?;

        tracing::debug!("Object storage client for bucket {} at {}", bucket, config.endpoint);
        Ok(Self {
            client: aws_sdk_s3::Client::from_conf(sdk_config),
            bucket,
            runtime,
        })
    }
}

impl ObjectStore for S3Store {
    fn exists(&self, key: &str) -> Result<bool> {
        self.runtime.block_on(async {
            match self
                .client
                .head_object()
                .bucket(&self.bucket)
                .key(key)
                .send()
                .await
            {
                Ok(_) => Ok(true),
                Err(err) => {
                    let service_err = err.into_service_error();
                    if service_err.is_not_found() {
                        Ok(false)
                    } else {
                        Err(anyhow::Error::new(service_err)
                            .context(format!("Failed to check for {}", key)))
                    }
                }
            }
        })
    }

    fn put_file(&self, key: &str, path: &Path, content_type: Option<&str>) -> Result<()> {
        self.runtime.block_on(async {
            let body = ByteStream::from_path(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let mut request = self
                .client
                .put_object()
                .bucket(&self.bucket)
                .key(key)
                .body(body);
            if let Some(content_type) = content_type {
                request = request.content_type(content_type);
            }
            request
                .send()
                .await
                .with_context(|| format!("Failed to upload {}", key))?;
            Ok::<_, anyhow::Error>(())
        })
    }

    fn set_public_read(&self, key: &str) -> Result<()> {
        self.runtime.block_on(async {
            self.client
                .put_object_acl()
                .bucket(&self.bucket)
                .key(key)
                .acl(ObjectCannedAcl::PublicRead)
                .send()
                .await
                .with_context(|| format!("Failed to set public-read on {}", key))?;
            Ok::<_, anyhow::Error>(())
        })
    }
}
