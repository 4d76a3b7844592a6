//! # DCGAN for Audio Spectrograms
//!
//! This crate trains a Deep Convolutional Generative Adversarial Network on
//! log-magnitude spectrograms of audio files and turns generated
//! spectrograms back into sound.
//!
//! ## Modules
//!
//! - `audio`: Spectrogram codec, WAV I/O and sample graphing
//! - `data`: Spectrogram datasets and batch loading
//! - `model`: DCGAN architecture (Generator and Discriminator)
//! - `training`: Training loop, loss composition and label smoothing
//! - `utils`: Configuration and checkpoints

pub mod audio;
pub mod data;
pub mod model;
pub mod training;
pub mod utils;

pub use audio::{CodecConfig, CsvGrapher, Grapher, LogGrapher, SignalCodec, StftCodec};
pub use data::{BatchSource, DataLoader, SpectrogramDataset};
pub use model::{Discriminator, Generator, DCGAN};
pub use training::{Trainer, TrainingConfig, TrainingMetrics};
pub use utils::{CheckpointStore, Config, Experiment};
