//! Utility module with helper functions
//!
//! This module provides:
//! - Configuration handling and experiment presets
//! - Checkpoint save/load utilities

mod checkpoint;
mod config;

pub use checkpoint::{CheckpointMeta, CheckpointStore};
pub use config::{ensure_config_exists, Config, DataConfig, Experiment, ModelConfig};
