//! Data module for loading and batching spectrograms
//!
//! This module provides:
//! - Spectrogram datasets encoded from audio directories
//! - Train/validation splitting
//! - DataLoader and the `BatchSource` trait the trainer consumes

mod dataset;
mod loader;

pub use dataset::{array_to_tensor, tensor_to_array2, SpectrogramDataset};
pub use loader::{BatchSource, DataLoader, DataLoaderIter};
