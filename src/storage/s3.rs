//! S3 checkpoint store backend

use super::{CheckpointStore, StorageError, StorageResult};
use crate::config::S3Config;
use async_trait::async_trait;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::Client;
use tracing::{debug, info};

/// Checkpoint store backed by an S3-compatible object store.
pub struct S3CheckpointStore {
    client: Client,
    bucket: String,
}

impl S3CheckpointStore {
    /// Create a new S3 store from explicit connection settings.
    ///
    /// Credentials from the configuration take precedence; without them the
    /// ambient AWS credential chain is used.
    pub async fn new(config: &S3Config) -> StorageResult<Self> {
        info!("Initializing S3 checkpoint store");

        let mut loader = aws_config::from_env().region(Region::new(config.region.clone()));
        if let Some(endpoint) = config.endpoint_url() {
            loader = loader.endpoint_url(endpoint);
        }
        let shared_config = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared_config)
            .force_path_style(config.force_path_style);
        if let (Some(key_id), Some(secret)) = (&config.access_key_id, &config.secret_access_key) {
            builder = builder.credentials_provider(Credentials::new(
                key_id.clone(),
                secret.clone(),
                None,
                None,
                "environment",
            ));
        }
        let client = Client::from_conf(builder.build());

        Ok(Self {
            client,
            bucket: config.bucket.clone(),
        })
    }
}

#[async_trait]
impl CheckpointStore for S3CheckpointStore {
    async fn read(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        debug!("Reading checkpoint object: {}", key);

        match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(result) => {
                let bytes = result
                    .body
                    .collect()
                    .await
                    .map_err(|e| StorageError::Io(format!("Failed to read object {key}: {e}")))?
                    .into_bytes();
                Ok(Some(bytes.to_vec()))
            }
            // Missing object and unreachable store are recovered identically
            // by the caller, so both fold into absence here.
            Err(_) => Ok(None),
        }
    }

    async fn write(&self, key: &str, body: Vec<u8>, content_type: &str) -> StorageResult<()> {
        debug!("Writing checkpoint object: {}", key);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body.into())
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::Io(format!("Failed to write object {key}: {e}")))?;

        Ok(())
    }
}
