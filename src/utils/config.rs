//! Configuration management
//!
//! Provides unified configuration for the entire spectrogram DCGAN pipeline,
//! with presets for the two experiment variants.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::audio::CodecConfig;
use crate::model::{DiscriminatorConfig, GeneratorConfig};
use crate::training::TrainingConfig;

/// Experiment preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Experiment {
    /// Plain DCGAN
    #[default]
    Dcgan,
    /// DCGAN with self-attention in the discriminator
    SelfAttention,
}

impl FromStr for Experiment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "dcgan" => Ok(Experiment::Dcgan),
            "self_attention" | "attention" => Ok(Experiment::SelfAttention),
            other => Err(format!(
                "unknown experiment '{}', expected 'dcgan' or 'self-attention'",
                other
            )),
        }
    }
}

impl fmt::Display for Experiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Experiment::Dcgan => write!(f, "dcgan"),
            Experiment::SelfAttention => write!(f, "self-attention"),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Data configuration
    pub data: DataConfig,
    /// Model configuration
    pub model: ModelConfig,
    /// Training configuration
    pub training: TrainingConfig,
    /// Spectrogram codec configuration
    pub codec: CodecConfig,
}

/// Data-related configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    /// Directory of training `.wav` files
    pub audio_dir: String,
    /// Time frames per spectrogram
    pub frames: usize,
    /// Batch size
    pub batch_size: usize,
    /// Trailing fraction of the dataset held out for validation
    pub validation_fraction: f64,
    /// Shuffle training batches every epoch
    pub shuffle: bool,
    /// Drop the last incomplete training batch
    pub drop_last: bool,
}

/// Model-related configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Latent dimension size
    pub latent_dim: i64,
    /// Spectrogram channels
    pub channels: i64,
    /// Filters of the first generator block
    pub gen_base_filters: i64,
    /// Upsampling blocks in the generator
    pub gen_num_blocks: i64,
    /// Side of the square the discriminator resizes its input to
    pub disc_canonical_size: i64,
    /// Filters of the first discriminator block
    pub disc_base_filters: i64,
    /// Discriminator block widths followed by self-attention
    pub attention_channels: Vec<i64>,
    /// Negative slope of the discriminator's leaky ReLU
    pub leaky_slope: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self::for_experiment(Experiment::Dcgan)
    }
}

impl Config {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration preset for an experiment
    pub fn for_experiment(experiment: Experiment) -> Self {
        let mut config = Self {
            data: DataConfig {
                audio_dir: "data/audio".to_string(),
                frames: 256,
                batch_size: 16,
                validation_fraction: 0.2,
                shuffle: true,
                drop_last: false,
            },
            model: ModelConfig {
                latent_dim: 100,
                channels: 1,
                gen_base_filters: 256,
                gen_num_blocks: 8,
                disc_canonical_size: 256,
                disc_base_filters: 4,
                attention_channels: Vec::new(),
                leaky_slope: 0.2,
            },
            training: TrainingConfig::default(),
            codec: CodecConfig::default(),
        };

        if experiment == Experiment::SelfAttention {
            config.model.latent_dim = 128;
            config.model.attention_channels = vec![32, 64];
            config.training.epochs = 2;
            config.training.validation_interval = 1;
            config.training.save_interval = 2;
        }

        config
    }

    /// Load configuration from TOML file
    pub fn from_toml(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_toml(&self, path: &str) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration from JSON file
    pub fn from_json(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to JSON file
    pub fn save_json(&self, path: &str) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load from TOML or JSON depending on the file extension
    pub fn load(path: &str) -> anyhow::Result<Self> {
        if path.ends_with(".toml") {
            Self::from_toml(path)
        } else {
            Self::from_json(path)
        }
    }

    /// Save as TOML or JSON depending on the file extension
    pub fn save(&self, path: &str) -> anyhow::Result<()> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        if path.ends_with(".toml") {
            self.save_toml(path)
        } else {
            self.save_json(path)
        }
    }

    /// Get device from configuration
    pub fn get_device(&self) -> tch::Device {
        match self.training.device.to_lowercase().as_str() {
            "cuda" | "gpu" => {
                if tch::Cuda::is_available() {
                    tch::Device::Cuda(0)
                } else {
                    tracing::warn!("CUDA requested but not available, falling back to CPU");
                    tch::Device::Cpu
                }
            }
            _ => tch::Device::Cpu,
        }
    }

    /// Generator layout for this configuration
    pub fn generator_config(&self) -> GeneratorConfig {
        GeneratorConfig {
            latent_dim: self.model.latent_dim,
            channels: self.model.channels,
            frames: self.data.frames as i64,
            freq_bins: self.codec.freq_bins() as i64,
            base_filters: self.model.gen_base_filters,
            num_blocks: self.model.gen_num_blocks,
        }
    }

    /// Discriminator layout for this configuration
    pub fn discriminator_config(&self) -> DiscriminatorConfig {
        DiscriminatorConfig {
            channels: self.model.channels,
            canonical_size: self.model.disc_canonical_size,
            base_filters: self.model.disc_base_filters,
            attention_channels: self.model.attention_channels.clone(),
            leaky_slope: self.model.leaky_slope,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.data.frames == 0 {
            anyhow::bail!("Frames per spectrogram must be > 0");
        }
        if self.data.batch_size == 0 {
            anyhow::bail!("Batch size must be > 0");
        }
        if !(0.0..1.0).contains(&self.data.validation_fraction) {
            anyhow::bail!("Validation fraction must be in [0, 1)");
        }
        if self.model.latent_dim <= 0 {
            anyhow::bail!("Latent dimension must be > 0");
        }
        if self.model.channels <= 0 {
            anyhow::bail!("Channels must be > 0");
        }
        if self.model.gen_num_blocks < 1 || self.model.gen_base_filters <= 0 {
            anyhow::bail!("Generator needs at least one block and positive base filters");
        }

        let size = self.model.disc_canonical_size;
        if size < 4 || size.count_ones() != 1 {
            anyhow::bail!("Discriminator canonical size must be a power of two >= 4, got {}", size);
        }
        if self.model.disc_base_filters <= 0 {
            anyhow::bail!("Discriminator base filters must be > 0");
        }

        let disc = self.discriminator_config();
        let widths: Vec<i64> = (0..disc.num_blocks())
            .map(|i| disc.base_filters << i)
            .collect();
        for c in &self.model.attention_channels {
            if !widths.contains(c) {
                anyhow::bail!(
                    "Attention width {} does not match any discriminator block {:?}",
                    c,
                    widths
                );
            }
        }

        if self.training.epochs == 0 {
            anyhow::bail!("Number of epochs must be > 0");
        }
        if self.training.validation_interval == 0 || self.training.save_interval == 0 {
            anyhow::bail!("Validation and save intervals must be > 0");
        }
        if self.training.gen_lr <= 0.0 || self.training.disc_lr <= 0.0 {
            anyhow::bail!("Learning rates must be > 0");
        }

        if self.codec.n_fft < 2 || self.codec.hop_length == 0 {
            anyhow::bail!("Invalid STFT parameters");
        }
        if self.codec.min_db >= self.codec.max_db {
            anyhow::bail!("Codec min_db must be below max_db");
        }
        Ok(())
    }
}

/// Create default configuration file if it doesn't exist
pub fn ensure_config_exists(path: &str, experiment: Experiment) -> anyhow::Result<Config> {
    if Path::new(path).exists() {
        Config::load(path)
    } else {
        let config = Config::for_experiment(experiment);
        config.save(path)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.data.batch_size, 16);
        assert_eq!(config.model.latent_dim, 100);
        assert_eq!(config.training.epochs, 10);
        assert_eq!(config.training.validation_interval, 5);
        assert_eq!(config.training.save_interval, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_self_attention_preset() {
        let config = Config::for_experiment(Experiment::SelfAttention);
        assert_eq!(config.data.batch_size, 16);
        assert_eq!(config.model.latent_dim, 128);
        assert_eq!(config.model.attention_channels, vec![32, 64]);
        assert_eq!(config.training.epochs, 2);
        assert_eq!(config.training.validation_interval, 1);
        assert_eq!(config.training.save_interval, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_experiment_parsing() {
        assert_eq!("dcgan".parse::<Experiment>(), Ok(Experiment::Dcgan));
        assert_eq!("self-attention".parse::<Experiment>(), Ok(Experiment::SelfAttention));
        assert!("vae".parse::<Experiment>().is_err());
        assert_eq!(Experiment::SelfAttention.to_string(), "self-attention");
    }

    #[test]
    fn test_config_json_roundtrip() {
        let config = Config::for_experiment(Experiment::SelfAttention);
        let json = serde_json::to_string(&config).unwrap();
        let loaded: Config = serde_json::from_str(&json).unwrap();

        assert_eq!(config, loaded);
    }

    #[test]
    fn test_config_toml_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let path = path.to_str().unwrap();

        let created = ensure_config_exists(path, Experiment::Dcgan).unwrap();
        assert!(Path::new(path).exists());

        let loaded = ensure_config_exists(path, Experiment::SelfAttention).unwrap();
        assert_eq!(created, loaded);
    }

    #[test]
    fn test_derived_model_configs() {
        let config = Config::default();

        let gen = config.generator_config();
        assert_eq!(gen.frames, 256);
        assert_eq!(gen.freq_bins, 513);

        let disc = config.discriminator_config();
        assert_eq!(disc.canonical_size, 256);
        assert_eq!(disc.num_blocks(), 7);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.data.frames = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.model.disc_canonical_size = 100;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.model.attention_channels = vec![48];
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.training.save_interval = 0;
        assert!(config.validate().is_err());
    }
}
