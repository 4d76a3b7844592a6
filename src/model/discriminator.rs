//! Discriminator network for DCGAN
//!
//! The Discriminator classifies spectrograms as real or fake.
//! Architecture resizes to a canonical square and uses spectrally normalized
//! strided 2D convolutions to downsample to a single logit.

use tch::{nn, nn::ModuleT, Tensor};

use super::layers::{self_attention, spectral_norm_conv2d, Activation, Flatten, LayerStack, Resize};

/// Discriminator network configuration
#[derive(Debug, Clone)]
pub struct DiscriminatorConfig {
    /// Number of input channels
    pub channels: i64,
    /// Side of the square every input is resized to (power of two)
    pub canonical_size: i64,
    /// Filters of the first convolution, doubled at every block
    pub base_filters: i64,
    /// Insert self-attention after blocks producing these filter counts
    pub attention_channels: Vec<i64>,
    /// Negative slope of the LeakyReLU activations
    pub leaky_slope: f64,
}

impl Default for DiscriminatorConfig {
    fn default() -> Self {
        Self {
            channels: 1,
            canonical_size: 256,
            base_filters: 4,
            attention_channels: Vec::new(),
            leaky_slope: 0.2,
        }
    }
}

impl DiscriminatorConfig {
    /// Number of strided blocks before the final 2x2 -> 1x1 convolution
    pub fn num_blocks(&self) -> i64 {
        self.canonical_size.trailing_zeros() as i64 - 1
    }
}

/// Discriminator network
///
/// Architecture:
/// 1. Bilinear resize to (canonical_size, canonical_size)
/// 2. Spectral-norm Conv2d + LeakyReLU (+ BatchNorm after the first block),
///    optionally followed by self-attention
/// 3. Final Conv2d to one logit, Flatten and Sigmoid
#[derive(Debug)]
pub struct Discriminator {
    config: DiscriminatorConfig,
    layers: LayerStack,
    num_attention: usize,
}

impl Discriminator {
    /// Create a new Discriminator network
    pub fn new(vs: &nn::Path, config: DiscriminatorConfig) -> Self {
        let mut layers = LayerStack::new().push(Resize::new(config.canonical_size, config.canonical_size));
        let mut num_attention = 0;

        let mut in_filters = config.channels;
        let mut out_filters = config.base_filters;

        for i in 0..config.num_blocks() {
            layers = layers
                .push(spectral_norm_conv2d(vs / format!("conv{}", i), in_filters, out_filters, 4, 2, 1))
                .push(Activation::LeakyRelu(config.leaky_slope));

            if i > 0 {
                layers = layers.push(nn::batch_norm2d(
                    vs / format!("bn{}", i),
                    out_filters,
                    Default::default(),
                ));
            }

            if config.attention_channels.contains(&out_filters) {
                layers = layers.push(self_attention(vs / format!("attn{}", i), out_filters));
                num_attention += 1;
            }

            in_filters = out_filters;
            out_filters *= 2;
        }

        let out_config = nn::ConvConfig {
            stride: 2,
            padding: 1,
            ws_init: nn::Init::Randn { mean: 0.0, stdev: 0.02 },
            ..Default::default()
        };

        let layers = layers
            .push(nn::conv2d(vs / "conv_out", in_filters, 1, 4, out_config))
            .push(Flatten)
            .push(Activation::Sigmoid);

        Self {
            config,
            layers,
            num_attention,
        }
    }

    /// Forward pass
    ///
    /// # Arguments
    ///
    /// * `input` - Tensor of shape (batch_size, channels, frames, freq_bins)
    /// * `train` - Whether in training mode (affects batch norm and spectral norm)
    ///
    /// # Returns
    ///
    /// Tensor of shape (batch_size, 1) with probabilities of being real
    pub fn forward_t(&self, input: &Tensor, train: bool) -> Tensor {
        self.layers.forward_t(input, train)
    }

    /// Classify samples (inference mode)
    pub fn classify(&self, input: &Tensor) -> Tensor {
        self.forward_t(input, false)
    }

    /// Feature extraction mode: every intermediate activation, last one is the output
    pub fn features_t(&self, input: &Tensor, train: bool) -> Vec<Tensor> {
        self.layers.forward_all_t(input, train)
    }

    /// Number of self-attention blocks in the network
    pub fn num_attention_blocks(&self) -> usize {
        self.num_attention
    }

    /// Get configuration
    pub fn config(&self) -> &DiscriminatorConfig {
        &self.config
    }
}

impl ModuleT for Discriminator {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
        Discriminator::forward_t(self, xs, train)
    }
}
