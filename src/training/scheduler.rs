//! Learning rate schedulers
//!
//! Each optimizer gets its own scheduler, stepped right after the optimizer.
//! The scheduler writes the new rate straight into the `nn::Optimizer`.

use serde::{Deserialize, Serialize};
use tch::nn;

/// Scheduling strategy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SchedulerKind {
    /// Keep the initial learning rate
    Constant,
    /// Multiply by `gamma` every `step_size` steps
    Step { step_size: usize, gamma: f64 },
    /// Multiply by `gamma` every step
    Exponential { gamma: f64 },
}

impl Default for SchedulerKind {
    fn default() -> Self {
        SchedulerKind::Exponential { gamma: 0.9995 }
    }
}

/// Learning rate scheduler bound to one optimizer
#[derive(Debug, Clone)]
pub struct LrScheduler {
    kind: SchedulerKind,
    base_lr: f64,
    current_step: usize,
}

impl LrScheduler {
    /// Create a new scheduler starting at `base_lr`
    pub fn new(kind: SchedulerKind, base_lr: f64) -> Self {
        Self {
            kind,
            base_lr,
            current_step: 0,
        }
    }

    /// Learning rate after `step` scheduler steps
    pub fn lr_at(&self, step: usize) -> f64 {
        match self.kind {
            SchedulerKind::Constant => self.base_lr,
            SchedulerKind::Step { step_size, gamma } => {
                let decays = step / step_size.max(1);
                self.base_lr * gamma.powf(decays as f64)
            }
            SchedulerKind::Exponential { gamma } => self.base_lr * gamma.powf(step as f64),
        }
    }

    /// Get the current learning rate
    pub fn get_lr(&self) -> f64 {
        self.lr_at(self.current_step)
    }

    /// Number of steps taken so far
    pub fn steps(&self) -> usize {
        self.current_step
    }

    /// Advance one step and apply the new rate to the optimizer
    pub fn step(&mut self, optimizer: &mut nn::Optimizer) {
        self.current_step += 1;
        optimizer.set_lr(self.get_lr());
    }
}
