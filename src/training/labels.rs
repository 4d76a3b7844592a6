//! Target labels for the adversarial loss
//!
//! A label batch is always homogeneous: every sample is real or every sample
//! is fake. The variant decides the smoothing direction.

use tch::{Device, Kind, Tensor};

/// Magnitude of the uniform jitter applied by label smoothing
pub const LABEL_SMOOTHING: f64 = 0.02;

/// Homogeneous batch of labels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelBatch {
    /// Every target is 1
    AllReal,
    /// Every target is 0
    AllFake,
}

impl LabelBatch {
    /// Unsmoothed target value
    pub fn target(self) -> f64 {
        match self {
            LabelBatch::AllReal => 1.0,
            LabelBatch::AllFake => 0.0,
        }
    }

    /// Hard labels of shape (batch_size, 1)
    pub fn hard(self, batch_size: i64, device: Device) -> Tensor {
        Tensor::full([batch_size, 1], self.target(), (Kind::Float, device))
    }

    /// Smoothed labels of shape (batch_size, 1)
    ///
    /// Real targets are pushed up into [1, 1 + 0.02), fake targets down into
    /// (-0.02, 0].
    pub fn smoothed(self, batch_size: i64, device: Device) -> Tensor {
        self.smooth(&self.hard(batch_size, device))
    }

    /// Apply smoothing in this batch's direction to an existing label tensor
    pub fn smooth(self, labels: &Tensor) -> Tensor {
        let noise = labels.rand_like() * LABEL_SMOOTHING;
        match self {
            LabelBatch::AllReal => labels + noise,
            LabelBatch::AllFake => labels - noise,
        }
    }
}
