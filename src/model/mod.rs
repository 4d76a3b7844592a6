//! Model module containing GAN architecture components
//!
//! This module provides:
//! - Layer units composed into sequential stacks
//! - Generator network for synthesizing spectrograms
//! - Discriminator network for distinguishing real from fake
//! - DCGAN wrapper combining both networks

pub mod layers;
mod generator;
mod discriminator;
mod dcgan;

pub use generator::{Generator, GeneratorConfig};
pub use discriminator::{Discriminator, DiscriminatorConfig};
pub use dcgan::DCGAN;
pub use layers::{Activation, LayerStack, SelfAttention, SpectralNormConv2d};
