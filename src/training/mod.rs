//! Training module for DCGAN
//!
//! This module provides:
//! - Training loop implementation
//! - Loss composition (binary cross entropy plus spectral terms)
//! - Label smoothing, learning rate schedules and metrics

mod labels;
mod losses;
mod metrics;
mod scheduler;
mod trainer;

pub use labels::{LabelBatch, LABEL_SMOOTHING};
pub use losses::{
    adversarial_loss, discriminator_loss, generator_loss, spectral_convergence, spectral_diff,
    SPECTRAL_CONVERGENCE_EPS, SPECTRAL_CONVERGENCE_WEIGHT, SPECTRAL_DIFF_WEIGHT,
};
pub use metrics::{EpochAccumulator, EpochLosses, TrainingMetrics, ValidationRecord};
pub use scheduler::{LrScheduler, SchedulerKind};
pub use trainer::{
    train_step, train_step_with_labels, GanOptimizers, StepLabels, Trainer, TrainingConfig,
};
