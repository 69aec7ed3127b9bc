//! Checkpoint state carried between runs
//!
//! Two small objects: the last-run timestamp (plain text, trimmed ISO-8601)
//! and the date-only watch map (a JSON object of dataset IRI to first-seen
//! timestamp). Read failures fall back to defaults so a lost or unreachable
//! checkpoint degrades to a wider purge window instead of aborting the run.

use super::{CheckpointStore, StorageResult};
use crate::config::CheckpointConfig;
use crate::resolver::parse_timestamp;
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// State persisted between runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    /// Start time of the previous successful run
    pub previous_run: DateTime<Utc>,
    /// Date-only changes awaiting their confirmatory purge
    pub date_only_watch: BTreeMap<String, DateTime<Utc>>,
}

impl Checkpoint {
    /// Load the checkpoint, falling back per object on absence or error.
    ///
    /// With no store configured the checkpoint is synthesized from the
    /// fallback previous date and an empty watch map.
    pub async fn load(
        store: Option<&dyn CheckpointStore>,
        config: &CheckpointConfig,
        fallback_previous: DateTime<Utc>,
    ) -> Self {
        let Some(store) = store else {
            return Self {
                previous_run: fallback_previous,
                date_only_watch: BTreeMap::new(),
            };
        };

        let previous_run = match store.read(&config.last_timestamp_key).await {
            Ok(Some(bytes)) => {
                let text = String::from_utf8_lossy(&bytes);
                let trimmed = text.trim();
                match parse_timestamp(trimmed) {
                    Some(instant) => {
                        info!("Last run timestamp found in checkpoint: {}", trimmed);
                        instant
                    }
                    None => {
                        warn!(
                            "Checkpoint timestamp {:?} is not a valid date, using fallback",
                            trimmed
                        );
                        fallback_previous
                    }
                }
            }
            Ok(None) => {
                info!("No checkpoint timestamp found, using fallback");
                fallback_previous
            }
            Err(e) => {
                warn!("Failed to read checkpoint timestamp: {}", e);
                fallback_previous
            }
        };

        let date_only_watch = match store.read(&config.date_only_watch_key).await {
            Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(map) => map,
                Err(e) => {
                    warn!("Failed to parse date-only watch map: {}", e);
                    BTreeMap::new()
                }
            },
            Ok(None) => BTreeMap::new(),
            Err(e) => {
                warn!("Failed to read date-only watch map: {}", e);
                BTreeMap::new()
            }
        };

        Self {
            previous_run,
            date_only_watch,
        }
    }

    /// Write both checkpoint objects back to the store.
    pub async fn persist(
        &self,
        store: &dyn CheckpointStore,
        config: &CheckpointConfig,
    ) -> StorageResult<()> {
        let timestamp = self
            .previous_run
            .to_rfc3339_opts(SecondsFormat::Millis, true);
        store
            .write(
                &config.last_timestamp_key,
                timestamp.into_bytes(),
                "text/plain",
            )
            .await?;

        let watch = serde_json::to_vec_pretty(&self.date_only_watch)?;
        store
            .write(&config.date_only_watch_key, watch, "application/json")
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::S3Config;
    use crate::storage::MemoryCheckpointStore;
    use chrono::TimeZone;

    fn config() -> CheckpointConfig {
        CheckpointConfig {
            enabled: true,
            s3: S3Config {
                bucket: "bucket".to_string(),
                region: "region".to_string(),
                endpoint: None,
                access_key_id: None,
                secret_access_key: None,
                ssl_enabled: false,
                force_path_style: false,
            },
            last_timestamp_key: "last_timestamp.txt".to_string(),
            date_only_watch_key: "simple_date_workaround.txt".to_string(),
        }
    }

    fn fallback() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_load_without_store_uses_fallback() {
        let checkpoint = Checkpoint::load(None, &config(), fallback()).await;
        assert_eq!(checkpoint.previous_run, fallback());
        assert!(checkpoint.date_only_watch.is_empty());
    }

    #[tokio::test]
    async fn test_load_with_empty_store_uses_fallback() {
        let store = MemoryCheckpointStore::new();
        let checkpoint = Checkpoint::load(Some(&store), &config(), fallback()).await;
        assert_eq!(checkpoint.previous_run, fallback());
        assert!(checkpoint.date_only_watch.is_empty());
    }

    #[tokio::test]
    async fn test_persist_and_load_round_trip() {
        let store = MemoryCheckpointStore::new();
        let cfg = config();

        let mut watch = BTreeMap::new();
        watch.insert(
            "https://example.org/cube/1".to_string(),
            Utc.with_ymd_and_hms(2024, 6, 9, 12, 0, 0).unwrap(),
        );
        let checkpoint = Checkpoint {
            previous_run: Utc.with_ymd_and_hms(2024, 6, 10, 3, 30, 0).unwrap(),
            date_only_watch: watch,
        };
        checkpoint.persist(&store, &cfg).await.unwrap();

        let loaded = Checkpoint::load(Some(&store), &cfg, fallback()).await;
        assert_eq!(loaded, checkpoint);
    }

    #[tokio::test]
    async fn test_stored_timestamp_is_trimmed() {
        let store = MemoryCheckpointStore::new();
        let cfg = config();
        store
            .write(
                &cfg.last_timestamp_key,
                b"  2024-06-10T03:30:00Z\n".to_vec(),
                "text/plain",
            )
            .await
            .unwrap();

        let loaded = Checkpoint::load(Some(&store), &cfg, fallback()).await;
        assert_eq!(
            loaded.previous_run,
            Utc.with_ymd_and_hms(2024, 6, 10, 3, 30, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn test_malformed_objects_fall_back() {
        let store = MemoryCheckpointStore::new();
        let cfg = config();
        store
            .write(&cfg.last_timestamp_key, b"garbage".to_vec(), "text/plain")
            .await
            .unwrap();
        store
            .write(
                &cfg.date_only_watch_key,
                b"not json".to_vec(),
                "application/json",
            )
            .await
            .unwrap();

        let loaded = Checkpoint::load(Some(&store), &cfg, fallback()).await;
        assert_eq!(loaded.previous_run, fallback());
        assert!(loaded.date_only_watch.is_empty());
    }

    #[test]
    fn test_timestamp_serialization_format() {
        let instant = Utc.with_ymd_and_hms(2024, 6, 10, 3, 30, 0).unwrap();
        assert_eq!(
            instant.to_rfc3339_opts(SecondsFormat::Millis, true),
            "2024-06-10T03:30:00.000Z"
        );
    }
}
