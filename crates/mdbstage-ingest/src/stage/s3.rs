//! S3-compatible stage backend
//!
//! Stages are key prefixes inside one bucket. A stage exists once any object
//! lives under `<stage>/`; creating a stage writes an empty `<stage>/` marker.

use super::{CopyReceipt, StageBackend, UploadReceipt};
use crate::config::S3StorageConfig;
use crate::error::{StageError, StageResult};
use async_trait::async_trait;
use aws_sdk_s3::{
    config::{Credentials, Region},
    primitives::ByteStream,
    Client,
};
use chrono::{DateTime, Utc};
use mdbstage_common::checksum::sha256_hex;
use mdbstage_common::types::{validate_relative_name, StagedFile};
use std::path::Path;
use tracing::{debug, info, instrument};

#[derive(Clone)]
pub struct S3StageBackend {
    client: Client,
    bucket: String,
}

impl std::fmt::Debug for S3StageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3StageBackend")
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}

impl S3StageBackend {
    pub fn new(config: &S3StorageConfig) -> Self {
        let credentials = Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,
            None,
            "mdbstage-storage",
        );

        let mut builder = aws_sdk_s3::Config::builder()
            .credentials_provider(credentials)
            .region(Region::new(config.region.clone()))
            .force_path_style(config.path_style);

        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        info!("S3 stage backend initialized for bucket: {}", config.bucket);

        Self {
            client: Client::from_conf(builder.build()),
            bucket: config.bucket.clone(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn marker_key(location: &str) -> StageResult<String> {
        validate_relative_name(location)?;
        Ok(format!("{}/", location))
    }

    fn object_key(location: &str, name: &str) -> StageResult<String> {
        validate_relative_name(location)?;
        validate_relative_name(name)?;
        Ok(format!("{}/{}", location, name))
    }

    async fn require_stage(&self, location: &str) -> StageResult<()> {
        if self.location_exists(location).await? {
            Ok(())
        } else {
            Err(StageError::LocationNotFound(location.to_string()))
        }
    }

    async fn head_size(&self, key: &str) -> StageResult<Option<(u64, Option<DateTime<Utc>>)>> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(head) => Ok(Some((
                head.content_length().unwrap_or(0).max(0) as u64,
                head.last_modified().and_then(to_chrono),
            ))),
            Err(e) => {
                let not_found = e
                    .as_service_error()
                    .map(|se| se.is_not_found())
                    .unwrap_or(false);
                if not_found {
                    Ok(None)
                } else {
                    Err(StageError::s3(format!("head {}: {}", key, e)))
                }
            },
        }
    }
}

fn to_chrono(dt: &aws_sdk_s3::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(dt.secs(), dt.subsec_nanos())
}

#[async_trait]
impl StageBackend for S3StageBackend {
    fn kind(&self) -> &'static str {
        "s3"
    }

    async fn location_exists(&self, location: &str) -> StageResult<bool> {
        let prefix = Self::marker_key(location)?;
        let response = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(&prefix)
            .max_keys(1)
            .send()
            .await
            .map_err(|e| StageError::s3(format!("list {}: {}", prefix, e)))?;
        Ok(!response.contents().is_empty())
    }

    #[instrument(skip(self))]
    async fn create_location(&self, location: &str) -> StageResult<()> {
        let marker = Self::marker_key(location)?;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&marker)
            .body(ByteStream::from(Vec::new()))
            .send()
            .await
            .map_err(|e| StageError::s3(format!("create stage {}: {}", location, e)))?;
        info!("Created stage marker s3://{}/{}", self.bucket, marker);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list(&self, location: &str, sub_path: &str) -> StageResult<Vec<StagedFile>> {
        self.require_stage(location).await?;

        let sub_path = sub_path.trim_matches('/');
        if !sub_path.is_empty() {
            validate_relative_name(sub_path)?;
        }
        let stage_prefix = Self::marker_key(location)?;
        let prefix = if sub_path.is_empty() {
            stage_prefix.clone()
        } else {
            format!("{}{}/", stage_prefix, sub_path)
        };

        let mut files = Vec::new();
        let mut continuation: Option<String> = None;
        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&prefix)
                .delimiter("/");
            if let Some(token) = continuation.take() {
                request = request.continuation_token(token);
            }

            let response = request
                .send()
                .await
                .map_err(|e| StageError::s3(format!("list {}: {}", prefix, e)))?;

            for object in response.contents() {
                let Some(key) = object.key() else { continue };
                if key.ends_with('/') {
                    continue;
                }
                let Some(name) = key.strip_prefix(&stage_prefix) else {
                    continue;
                };
                files.push(StagedFile {
                    location: location.to_string(),
                    name: name.to_string(),
                    size: object.size().unwrap_or(0).max(0) as u64,
                    last_modified: object.last_modified().and_then(to_chrono),
                });
            }

            match response.next_continuation_token() {
                Some(token) if response.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string());
                },
                _ => break,
            }
        }

        files.sort_by(|a, b| a.name.cmp(&b.name));
        debug!("Listed {} objects under s3://{}/{}", files.len(), self.bucket, prefix);
        Ok(files)
    }

    async fn stat(&self, location: &str, name: &str) -> StageResult<Option<StagedFile>> {
        self.require_stage(location).await?;
        let key = Self::object_key(location, name)?;
        Ok(self.head_size(&key).await?.map(|(size, last_modified)| StagedFile {
            location: location.to_string(),
            name: name.to_string(),
            size,
            last_modified,
        }))
    }

    #[instrument(skip(self))]
    async fn copy(&self, name: &str, source: &str, target: &str) -> StageResult<CopyReceipt> {
        let source_key = Self::object_key(source, name)?;
        let target_key = Self::object_key(target, name)?;
        let copy_source = format!("{}/{}", self.bucket, source_key);

        self.client
            .copy_object()
            .bucket(&self.bucket)
            .copy_source(&copy_source)
            .key(&target_key)
            .send()
            .await
            .map_err(|e| StageError::s3(format!("copy {} -> {}: {}", source_key, target_key, e)))?;

        let (size, _) = self
            .head_size(&target_key)
            .await?
            .ok_or_else(|| StageError::FileNotFound {
                location: target.to_string(),
                name: name.to_string(),
            })?;

        info!(
            "Copied s3://{}/{} to s3://{}/{}",
            self.bucket, source_key, self.bucket, target_key
        );
        Ok(CopyReceipt {
            name: name.to_string(),
            size,
        })
    }

    #[instrument(skip(self))]
    async fn delete(&self, name: &str, location: &str) -> StageResult<()> {
        let key = Self::object_key(location, name)?;
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| StageError::s3(format!("delete {}: {}", key, e)))?;
        debug!("Deleted s3://{}/{}", self.bucket, key);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn download(&self, location: &str, name: &str, dest: &Path) -> StageResult<u64> {
        let key = Self::object_key(location, name)?;
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| StageError::s3(format!("get {}: {}", key, e)))?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| StageError::s3(format!("read body of {}: {}", key, e)))?
            .into_bytes();

        tokio::fs::write(dest, &data)
            .await
            .map_err(|e| StageError::io(dest, e))?;

        debug!("Downloaded {} bytes from s3://{}/{}", data.len(), self.bucket, key);
        Ok(data.len() as u64)
    }

    #[instrument(skip(self, data))]
    async fn upload(
        &self,
        location: &str,
        name: &str,
        data: Vec<u8>,
    ) -> StageResult<UploadReceipt> {
        self.require_stage(location).await?;
        let key = Self::object_key(location, name)?;
        let checksum = sha256_hex(&data);
        let size = data.len() as u64;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| StageError::s3(format!("put {}: {}", key, e)))?;

        info!("Uploaded {} bytes to s3://{}/{}", size, self.bucket, key);
        Ok(UploadReceipt {
            location: location.to_string(),
            name: name.to_string(),
            size,
            checksum,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_object_keys() {
        assert_eq!(S3StageBackend::marker_key("RAW").unwrap(), "RAW/");
        assert_eq!(
            S3StageBackend::object_key("RAW", "2024/orders.mdb").unwrap(),
            "RAW/2024/orders.mdb"
        );
        assert!(S3StageBackend::object_key("RAW", "../x").is_err());
    }

    #[test]
    fn test_debug_hides_client() {
        let backend = S3StageBackend {
            client: Client::from_conf(aws_sdk_s3::Config::builder().build()),
            bucket: "stages".to_string(),
        };
        let rendered = format!("{:?}", backend);
        assert!(rendered.contains("stages"));
        assert_eq!(backend.kind(), "s3");
    }
}
