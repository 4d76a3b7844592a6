//! DCGAN wrapper combining Generator and Discriminator
//!
//! Provides convenient methods for training and generation.

use anyhow::Result;
use tch::{nn, nn::OptimizerConfig, nn::VarStore, Device, Tensor};

use super::discriminator::{Discriminator, DiscriminatorConfig};
use super::generator::{Generator, GeneratorConfig};

/// Complete DCGAN model
pub struct DCGAN {
    /// Generator network
    pub generator: Generator,
    /// Discriminator network
    pub discriminator: Discriminator,
    /// Variable store for generator
    pub gen_vs: VarStore,
    /// Variable store for discriminator
    pub disc_vs: VarStore,
    /// Device (CPU/GPU)
    pub device: Device,
}

impl DCGAN {
    /// Create a new DCGAN model
    ///
    /// # Arguments
    ///
    /// * `gen_config` - Generator configuration
    /// * `disc_config` - Discriminator configuration
    /// * `device` - Device to create model on
    pub fn new(gen_config: GeneratorConfig, disc_config: DiscriminatorConfig, device: Device) -> Self {
        let gen_vs = VarStore::new(device);
        let disc_vs = VarStore::new(device);

        let generator = Generator::new(&(gen_vs.root() / "generator"), gen_config);
        let discriminator = Discriminator::new(&(disc_vs.root() / "discriminator"), disc_config);

        Self {
            generator,
            discriminator,
            gen_vs,
            disc_vs,
            device,
        }
    }

    /// Create DCGAN with default layer widths for the given spectrogram shape
    ///
    /// # Arguments
    ///
    /// * `channels` - Spectrogram channels
    /// * `frames` - Time frames per spectrogram
    /// * `freq_bins` - Frequency bins per frame
    /// * `latent_dim` - Size of latent noise vector
    /// * `device` - Device to create model on
    pub fn with_defaults(
        channels: i64,
        frames: i64,
        freq_bins: i64,
        latent_dim: i64,
        device: Device,
    ) -> Self {
        let gen_config = GeneratorConfig {
            latent_dim,
            channels,
            frames,
            freq_bins,
            ..Default::default()
        };

        let disc_config = DiscriminatorConfig {
            channels,
            ..Default::default()
        };

        Self::new(gen_config, disc_config, device)
    }

    /// Draw a batch of latent vectors on the model device
    pub fn sample_latent(&self, num_samples: i64) -> Tensor {
        self.generator.sample_latent(num_samples, self.device)
    }

    /// Generate synthetic spectrograms
    ///
    /// # Returns
    ///
    /// Tensor of shape (num_samples, channels, frames, freq_bins)
    pub fn generate(&self, num_samples: i64) -> Tensor {
        let noise = self.sample_latent(num_samples);
        tch::no_grad(|| self.generator.generate(&noise))
    }

    /// Discriminate samples (get probability of being real)
    pub fn discriminate(&self, samples: &Tensor) -> Tensor {
        tch::no_grad(|| self.discriminator.classify(samples))
    }

    /// Get generator optimizer (Adam)
    pub fn gen_optimizer(&self, lr: f64, beta1: f64, beta2: f64) -> Result<nn::Optimizer> {
        Ok(adam(beta1, beta2).build(&self.gen_vs, lr)?)
    }

    /// Get discriminator optimizer (Adam)
    pub fn disc_optimizer(&self, lr: f64, beta1: f64, beta2: f64) -> Result<nn::Optimizer> {
        Ok(adam(beta1, beta2).build(&self.disc_vs, lr)?)
    }

    /// Get latent dimension
    pub fn latent_dim(&self) -> i64 {
        self.generator.config().latent_dim
    }

    /// Get the (channels, frames, freq_bins) output shape
    pub fn spectrogram_shape(&self) -> (i64, i64, i64) {
        let config = self.generator.config();
        (config.channels, config.frames, config.freq_bins)
    }
}

fn adam(beta1: f64, beta2: f64) -> nn::Adam {
    nn::Adam {
        beta1,
        beta2,
        wd: 0.0,
        ..Default::default()
    }
}
