//! Remote storage backend speaking S3 against the Storj gateway.

use crate::error::{StorageError, StorageResult};
use crate::traits::{ObjectReader, ObjectStore};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use std::path::PathBuf;
use templar_core::config::StorjConfig;
use tracing::instrument;
use uuid::Uuid;

/// Remote object store for the primary tier.
///
/// The Storj gateway is S3-compatible; `access_grant` carries the gateway
/// credentials as `access_key_id:secret_access_key` and `base_url` the
/// endpoint.
pub struct StorjBackend {
    client: Client,
    bucket: String,
    spool_dir: PathBuf,
}

impl std::fmt::Debug for StorjBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorjBackend")
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}

impl StorjBackend {
    /// Create a new remote backend from configuration.
    pub async fn new(config: &StorjConfig) -> StorageResult<Self> {
        if config.bucket.is_empty() {
            return Err(StorageError::Config("bucket name is required".to_string()));
        }
        let (access_key_id, secret_access_key) =
            config.access_grant.split_once(':').ok_or_else(|| {
                StorageError::Config(
                    "access_grant must be access_key_id:secret_access_key".to_string(),
                )
            })?;

        let credentials = aws_sdk_s3::config::Credentials::new(
            access_key_id,
            secret_access_key,
            None,
            None,
            "templar-config",
        );

        let mut builder = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(aws_config::Region::new("global"))
            .credentials_provider(credentials)
            .force_path_style(true);

        if !config.base_url.is_empty() {
            // Handle bare host:port endpoints by prepending http://
            let endpoint = if config.base_url.starts_with("http://")
                || config.base_url.starts_with("https://")
            {
                config.base_url.clone()
            } else {
                format!("http://{}", config.base_url)
            };
            builder = builder.endpoint_url(endpoint);
        }

        Ok(Self {
            client: Client::from_conf(builder.build()),
            bucket: config.bucket.clone(),
            spool_dir: std::env::temp_dir(),
        })
    }

    fn remote_err<E>(err: E) -> StorageError
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        StorageError::Remote(Box::new(err))
    }
}

#[async_trait]
impl ObjectStore for StorjBackend {
    /// Upload by spooling the stream to a local temp file, then handing the
    /// file to the SDK as a sized streaming body. S3 PUTs need a known
    /// content length; the spool keeps memory use flat regardless of object
    /// size. A failed PUT leaves no partial object visible remotely.
    #[instrument(skip(self, reader), fields(backend = "storj"))]
    async fn upload(&self, key: &str, mut reader: ObjectReader) -> StorageResult<u64> {
        let spool_path = self.spool_dir.join(format!(".templar-spool.{}", Uuid::new_v4()));

        let result = async {
            let mut spool = tokio::fs::File::create(&spool_path).await?;
            let written = tokio::io::copy(&mut reader, &mut spool).await?;
            spool.sync_all().await?;
            drop(spool);

            let body = ByteStream::read_from()
                .path(&spool_path)
                .build()
                .await
                .map_err(Self::remote_err)?;

            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(key)
                .body(body)
                .send()
                .await
                .map_err(Self::remote_err)?;

            Ok(written)
        }
        .await;

        let _ = tokio::fs::remove_file(&spool_path).await;
        result
    }

    #[instrument(skip(self), fields(backend = "storj"))]
    async fn download(&self, key: &str) -> StorageResult<ObjectReader> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let not_found = e
                    .as_service_error()
                    .map(|se| se.is_no_such_key())
                    .unwrap_or(false);
                if not_found {
                    StorageError::NotFound(key.to_string())
                } else {
                    Self::remote_err(e)
                }
            })?;

        Ok(Box::pin(resp.body.into_async_read()))
    }

    #[instrument(skip(self), fields(backend = "storj"))]
    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(Self::remote_err)?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "storj"
    }

    #[instrument(skip(self), fields(backend = "storj"))]
    async fn health_check(&self) -> StorageResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(Self::remote_err)?;
        Ok(())
    }
}
