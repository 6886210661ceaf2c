//! Resumable pipeline state: tagged, atomically written JSON checkpoints
//!
//! Each stage persists its output under a string key. Envelopes carry a
//! schema version and the fingerprint of the statistical configuration that
//! produced them, so checkpoints from an incompatible run are detected and
//! recomputed instead of silently reused. Saves go through a temp file and
//! rename, so an interrupted run can never leave a truncated checkpoint
//! behind.

use crate::io::error::{PipelineError, Result, fs_error};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Envelope schema version; bump when checkpoint payload shapes change
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct Envelope<T> {
    schema_version: u32,
    config_fingerprint: String,
    stage: String,
    payload: T,
}

/// Stage-keyed persistent store for intermediate pipeline artifacts
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
    config_fingerprint: String,
}

impl CheckpointStore {
    /// Open (creating if needed) a checkpoint directory bound to a
    /// configuration fingerprint
    ///
    /// # Errors
    ///
    /// Returns a file system error if the directory cannot be created.
    pub fn open(dir: &Path, config_fingerprint: &str) -> Result<Self> {
        fs::create_dir_all(dir).map_err(|e| fs_error(dir, "create checkpoint directory", e))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            config_fingerprint: config_fingerprint.to_string(),
        })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Persist a stage artifact, replacing any previous content for the key
    ///
    /// # Errors
    ///
    /// Returns a checkpoint error if serialization fails, or a file system
    /// error if the write or rename fails.
    pub fn save<T: Serialize>(&self, key: &str, payload: &T) -> Result<()> {
        let envelope = Envelope {
            schema_version: SCHEMA_VERSION,
            config_fingerprint: self.config_fingerprint.clone(),
            stage: key.to_string(),
            payload,
        };
        let encoded = serde_json::to_vec(&envelope).map_err(|e| PipelineError::Checkpoint {
            key: key.to_string(),
            source: e,
        })?;

        let final_path = self.path_for(key);
        let tmp_path = self.dir.join(format!("{key}.json.tmp"));
        fs::write(&tmp_path, &encoded).map_err(|e| fs_error(&tmp_path, "write checkpoint", e))?;
        fs::rename(&tmp_path, &final_path)
            .map_err(|e| fs_error(&final_path, "commit checkpoint", e))?;

        debug!(key, bytes = encoded.len(), "checkpoint saved");
        Ok(())
    }

    /// Load a stage artifact if a compatible checkpoint exists
    ///
    /// Absence is not an error: a missing file, an unreadable envelope, or a
    /// schema/fingerprint mismatch all yield `None` (the latter two with a
    /// warning) so the stage simply recomputes.
    ///
    /// # Errors
    ///
    /// Returns a file system error only if an existing file cannot be read.
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path).map_err(|e| fs_error(&path, "read checkpoint", e))?;

        let envelope: Envelope<T> = match serde_json::from_slice(&bytes) {
            Ok(envelope) => envelope,
            Err(error) => {
                warn!(key, %error, "discarding unreadable checkpoint");
                return Ok(None);
            }
        };

        if envelope.schema_version != SCHEMA_VERSION {
            warn!(
                key,
                found = envelope.schema_version,
                expected = SCHEMA_VERSION,
                "discarding checkpoint with incompatible schema version"
            );
            return Ok(None);
        }
        if envelope.config_fingerprint != self.config_fingerprint {
            warn!(
                key,
                "discarding checkpoint from a different analysis configuration"
            );
            return Ok(None);
        }

        Ok(Some(envelope.payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn store_in(dir: &Path) -> CheckpointStore {
        CheckpointStore::open(dir, "fingerprint-a").unwrap()
    }

    #[test]
    fn test_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(tmp.path());

        let mut artifact = BTreeMap::new();
        artifact.insert("positive_vs_neutral".to_string(), vec![1.0_f32, 2.0, 3.0]);
        store.save("subject_01_results", &artifact).unwrap();

        let loaded: Option<BTreeMap<String, Vec<f32>>> =
            store.load("subject_01_results").unwrap();
        assert_eq!(loaded, Some(artifact));
    }

    #[test]
    fn test_absent_key_is_none_not_error() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(tmp.path());
        let loaded: Option<Vec<u8>> = store.load("never_written").unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_save_overwrites() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(tmp.path());
        store.save("events", &vec![1, 2, 3]).unwrap();
        store.save("events", &vec![4, 5]).unwrap();
        let loaded: Option<Vec<i32>> = store.load("events").unwrap();
        assert_eq!(loaded, Some(vec![4, 5]));
    }

    #[test]
    fn test_foreign_fingerprint_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(tmp.path());
        store.save("events", &vec![1, 2, 3]).unwrap();

        let other = CheckpointStore::open(tmp.path(), "fingerprint-b").unwrap();
        let loaded: Option<Vec<i32>> = other.load("events").unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_corrupt_file_treated_as_absent() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(tmp.path());
        fs::write(tmp.path().join("events.json"), b"not json at all").unwrap();
        let loaded: Option<Vec<i32>> = store.load("events").unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(tmp.path());
        store.save("group_results", &"payload").unwrap();
        let leftovers: Vec<_> = fs::read_dir(tmp.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
