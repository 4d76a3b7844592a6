//! Generator network for DCGAN
//!
//! The Generator transforms latent noise vectors into synthetic spectrograms.
//! Architecture uses transposed 2D convolutions to upsample from a 1x1 map.

use tch::{nn, nn::ModuleT, Device, Tensor};

use super::layers::{Activation, LayerStack, Resize};

/// Generator network configuration
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Size of the latent noise vector
    pub latent_dim: i64,
    /// Number of output channels
    pub channels: i64,
    /// Number of output time frames
    pub frames: i64,
    /// Number of output frequency bins
    pub freq_bins: i64,
    /// Filters of the first transposed convolution, halved at every block
    pub base_filters: i64,
    /// Number of transposed convolutions (each doubles the spatial size)
    pub num_blocks: i64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            latent_dim: 100,
            channels: 1,
            frames: 256,
            freq_bins: 513,
            base_filters: 256,
            num_blocks: 8,
        }
    }
}

/// Generator network
///
/// Architecture:
/// 1. `num_blocks - 1` ConvTranspose2d layers with BatchNorm and ReLU
/// 2. Final ConvTranspose2d down to the output channels
/// 3. Bilinear resize to (frames, freq_bins) and Tanh
#[derive(Debug)]
pub struct Generator {
    config: GeneratorConfig,
    layers: LayerStack,
}

impl Generator {
    /// Create a new Generator network
    pub fn new(vs: &nn::Path, config: GeneratorConfig) -> Self {
        let conv_config = nn::ConvTransposeConfig {
            stride: 2,
            padding: 1,
            ws_init: nn::Init::Randn { mean: 0.0, stdev: 0.02 },
            ..Default::default()
        };

        let mut layers = LayerStack::new();
        let mut in_filters = config.latent_dim;
        let mut out_filters = config.base_filters;

        for i in 0..config.num_blocks.max(1) - 1 {
            layers = layers
                .push(nn::conv_transpose2d(
                    vs / format!("deconv{}", i),
                    in_filters,
                    out_filters,
                    4,
                    conv_config,
                ))
                .push(nn::batch_norm2d(vs / format!("bn{}", i), out_filters, Default::default()))
                .push(Activation::Relu);

            in_filters = out_filters;
            out_filters = (out_filters / 2).max(1);
        }

        let layers = layers
            .push(nn::conv_transpose2d(
                vs / "deconv_out",
                in_filters,
                config.channels,
                4,
                conv_config,
            ))
            .push(Resize::new(config.frames, config.freq_bins))
            .push(Activation::Tanh);

        Self { config, layers }
    }

    /// Forward pass
    ///
    /// # Arguments
    ///
    /// * `noise` - Tensor of shape (batch_size, latent_dim)
    /// * `train` - Whether in training mode (affects batch norm)
    ///
    /// # Returns
    ///
    /// Tensor of shape (batch_size, channels, frames, freq_bins) in [-1, 1]
    pub fn forward_t(&self, noise: &Tensor, train: bool) -> Tensor {
        let batch_size = noise.size()[0];
        let z = noise.view([batch_size, self.config.latent_dim, 1, 1]);
        self.layers.forward_t(&z, train)
    }

    /// Generate spectrograms (inference mode)
    pub fn generate(&self, noise: &Tensor) -> Tensor {
        self.forward_t(noise, false)
    }

    /// Draw a batch of latent vectors
    pub fn sample_latent(&self, num_samples: i64, device: Device) -> Tensor {
        Tensor::randn([num_samples, self.config.latent_dim], (tch::Kind::Float, device))
    }

    /// Get configuration
    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }
}

impl ModuleT for Generator {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
        Generator::forward_t(self, xs, train)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::nn::VarStore;

    fn small_config() -> GeneratorConfig {
        GeneratorConfig {
            latent_dim: 100,
            channels: 1,
            frames: 24,
            freq_bins: 33,
            base_filters: 32,
            num_blocks: 5,
        }
    }

    #[test]
    fn test_generator_output_shape() {
        let vs = VarStore::new(Device::Cpu);
        let gen = Generator::new(&vs.root(), small_config());

        for batch_size in [1, 3] {
            let noise = gen.sample_latent(batch_size, Device::Cpu);
            let output = gen.generate(&noise);
            assert_eq!(output.size(), vec![batch_size, 1, 24, 33]);
        }
    }

    #[test]
    fn test_generator_output_bounded() {
        let vs = VarStore::new(Device::Cpu);
        let gen = Generator::new(&vs.root(), small_config());

        let noise = gen.sample_latent(4, Device::Cpu) * 50.0;
        let output = gen.forward_t(&noise, true);

        let min_val = output.min().double_value(&[]);
        let max_val = output.max().double_value(&[]);
        assert!(min_val >= -1.0 && max_val <= 1.0);
    }

    #[test]
    fn test_generator_default_depth() {
        let vs = VarStore::new(Device::Cpu);
        let config = GeneratorConfig {
            frames: 16,
            freq_bins: 20,
            ..Default::default()
        };
        let gen = Generator::new(&vs.root(), config);

        let noise = gen.sample_latent(2, Device::Cpu);
        assert_eq!(gen.generate(&noise).size(), vec![2, 1, 16, 20]);
    }
}
