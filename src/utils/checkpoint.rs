//! Checkpoint save/load utilities
//!
//! A checkpoint is a pair of files in the store directory: `{tag}.pt` with
//! the weights of one var store, and `{tag}.json` with metadata.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tch::nn;

/// Checkpoint metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMeta {
    /// Epoch the checkpoint was taken after
    pub epoch: usize,
    /// Generator loss at checkpoint
    pub gen_loss: f64,
    /// Discriminator loss at checkpoint
    pub disc_loss: f64,
    /// Timestamp of checkpoint
    pub timestamp: String,
    /// Model configuration
    pub config: serde_json::Value,
}

impl CheckpointMeta {
    /// Metadata stamped with the current time
    pub fn new(epoch: usize, gen_loss: f64, disc_loss: f64, config: serde_json::Value) -> Self {
        Self {
            epoch,
            gen_loss,
            disc_loss,
            timestamp: chrono::Utc::now().to_rfc3339(),
            config,
        }
    }
}

/// Directory of tagged checkpoints
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Weights file for a tag
    pub fn path_for(&self, tag: &str) -> PathBuf {
        self.dir.join(format!("{}.pt", tag))
    }

    /// Metadata file for a tag
    pub fn meta_path_for(&self, tag: &str) -> PathBuf {
        self.dir.join(format!("{}.json", tag))
    }

    /// Check whether weights exist for a tag
    pub fn exists(&self, tag: &str) -> bool {
        self.path_for(tag).is_file()
    }

    /// Save the variables of `vs` under `tag`, replacing any previous save
    pub fn save(&self, vs: &nn::VarStore, tag: &str, meta: &CheckpointMeta) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create checkpoint directory {}", self.dir.display()))?;

        let path = self.path_for(tag);
        vs.save(&path)
            .with_context(|| format!("failed to save weights to {}", path.display()))?;

        let meta_json = serde_json::to_string_pretty(meta)?;
        std::fs::write(self.meta_path_for(tag), meta_json)?;

        tracing::info!("Saved checkpoint '{}' (epoch {}) to {}", tag, meta.epoch, path.display());
        Ok(path)
    }

    /// Load the weights saved under `tag` into `vs`
    pub fn load(&self, vs: &mut nn::VarStore, tag: &str) -> Result<CheckpointMeta> {
        let path = self.path_for(tag);
        vs.load(&path)
            .with_context(|| format!("failed to load weights from {}", path.display()))?;

        let meta = self.load_meta(tag)?;
        tracing::info!("Loaded checkpoint '{}' (epoch {})", tag, meta.epoch);
        Ok(meta)
    }

    /// Load checkpoint metadata
    pub fn load_meta(&self, tag: &str) -> Result<CheckpointMeta> {
        let path = self.meta_path_for(tag);
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Tags with saved weights, sorted
    pub fn tags(&self) -> Result<Vec<String>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut tags: Vec<String> = std::fs::read_dir(&self.dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().and_then(|ext| ext.to_str()) == Some("pt"))
            .filter_map(|p| p.file_stem().and_then(|s| s.to_str()).map(String::from))
            .collect();

        tags.sort();
        Ok(tags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::{Device, Kind, Tensor};

    fn store_with_var(fill: f64) -> nn::VarStore {
        let vs = nn::VarStore::new(Device::Cpu);
        let w = vs.root().sub("generator").zeros("w", &[2, 3]);
        tch::no_grad(|| {
            let _ = w.shallow_clone().fill_(fill);
        });
        vs
    }

    fn meta(epoch: usize) -> CheckpointMeta {
        CheckpointMeta::new(epoch, 0.7, 0.6, serde_json::json!({ "latent_dim": 100 }))
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());

        let saved = store_with_var(1.5);
        store.save(&saved, "DCGAN", &meta(10)).unwrap();
        assert!(store.exists("DCGAN"));
        assert!(!store.exists("other"));

        let mut loaded = store_with_var(0.0);
        let loaded_meta = store.load(&mut loaded, "DCGAN").unwrap();
        assert_eq!(loaded_meta.epoch, 10);
        assert_eq!(loaded_meta.config["latent_dim"], 100);

        let w = loaded.variables()["generator.w"].shallow_clone();
        let expected = Tensor::full([2, 3], 1.5, (Kind::Float, Device::Cpu));
        assert!(w.allclose(&expected, 1e-6, 1e-6, false));
    }

    #[test]
    fn test_save_overwrites_tag() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("ckpt"));

        let vs = store_with_var(1.0);
        store.save(&vs, "DCGAN", &meta(5)).unwrap();
        store.save(&vs, "DCGAN", &meta(10)).unwrap();

        assert_eq!(store.tags().unwrap(), vec!["DCGAN".to_string()]);
        assert_eq!(store.load_meta("DCGAN").unwrap().epoch, 10);
    }

    #[test]
    fn test_missing_tag_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());

        let mut vs = store_with_var(0.0);
        assert!(store.load(&mut vs, "DCGAN").is_err());
        assert!(store.tags().unwrap().is_empty());
    }

    #[test]
    fn test_timestamp_is_rfc3339() {
        let m = meta(1);
        assert!(chrono::DateTime::parse_from_rfc3339(&m.timestamp).is_ok());
    }
}
