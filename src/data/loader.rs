//! DataLoader for batching and iterating over training data
//!
//! Provides batching for GAN training with support for:
//! - Random shuffling
//! - Drop last incomplete batch
//! - Iteration over batches

use ndarray::{Array4, ArrayView4, Axis};
use rand::seq::SliceRandom;
use tch::Tensor;

use super::dataset::array_to_tensor;

/// Source of real-data batches consumed by the training loop
///
/// A source is restarted with `reset` at the start of every pass and then
/// yields exactly `num_batches` batches.
pub trait BatchSource {
    /// Number of batches per pass
    fn num_batches(&self) -> usize;

    /// Restart for a new pass
    fn reset(&mut self);

    /// Next batch of shape (batch, channels, frames, freq_bins), or None when exhausted
    fn next_batch(&mut self) -> Option<Tensor>;
}

/// DataLoader for iterating over batched spectrograms
pub struct DataLoader {
    /// Full dataset of shape (num_spectrograms, channels, frames, freq_bins)
    data: Array4<f32>,
    /// Batch size
    batch_size: usize,
    /// Whether to shuffle data each epoch
    shuffle: bool,
    /// Whether to drop the last incomplete batch
    drop_last: bool,
    /// Current indices for iteration
    indices: Vec<usize>,
    /// Current position in iteration
    current_idx: usize,
}

impl DataLoader {
    /// Create a new DataLoader
    ///
    /// # Arguments
    ///
    /// * `data` - 4D array of shape (num_spectrograms, channels, frames, freq_bins)
    /// * `batch_size` - Number of spectrograms per batch
    /// * `shuffle` - Whether to shuffle data each epoch
    /// * `drop_last` - Whether to drop incomplete final batch
    pub fn new(data: Array4<f32>, batch_size: usize, shuffle: bool, drop_last: bool) -> Self {
        let num_samples = data.shape()[0];
        let indices: Vec<usize> = (0..num_samples).collect();

        let mut loader = Self {
            data,
            batch_size: batch_size.max(1),
            shuffle,
            drop_last,
            indices,
            current_idx: 0,
        };

        if shuffle {
            loader.shuffle_indices();
        }

        loader
    }

    /// Get the number of batches per epoch
    pub fn num_batches(&self) -> usize {
        let num_samples = self.num_samples();
        if self.drop_last {
            num_samples / self.batch_size
        } else {
            num_samples.div_ceil(self.batch_size)
        }
    }

    /// Get total number of samples
    pub fn num_samples(&self) -> usize {
        self.data.shape()[0]
    }

    /// Get batch size
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Shuffle indices for a new epoch
    fn shuffle_indices(&mut self) {
        let mut rng = rand::thread_rng();
        self.indices.shuffle(&mut rng);
    }

    /// Reset for new epoch
    pub fn reset(&mut self) {
        self.current_idx = 0;
        if self.shuffle {
            self.shuffle_indices();
        }
    }

    /// Get next batch
    ///
    /// Returns None when epoch is complete
    pub fn next_array(&mut self) -> Option<Array4<f32>> {
        let num_samples = self.indices.len();
        let start = self.current_idx;

        if start >= num_samples {
            return None;
        }

        let end = (start + self.batch_size).min(num_samples);

        // Skip incomplete batch if drop_last
        if self.drop_last && end - start < self.batch_size {
            return None;
        }

        let batch = self.data.select(Axis(0), &self.indices[start..end]);

        self.current_idx = end;
        Some(batch)
    }

    /// Iterate over all batches of one epoch
    pub fn iter(&mut self) -> DataLoaderIter<'_> {
        self.reset();
        DataLoaderIter { loader: self }
    }

    /// Get a view of the underlying data
    pub fn data(&self) -> ArrayView4<'_, f32> {
        self.data.view()
    }
}

impl BatchSource for DataLoader {
    fn num_batches(&self) -> usize {
        DataLoader::num_batches(self)
    }

    fn reset(&mut self) {
        DataLoader::reset(self)
    }

    fn next_batch(&mut self) -> Option<Tensor> {
        self.next_array().map(|batch| array_to_tensor(&batch))
    }
}

/// Iterator adapter for DataLoader
pub struct DataLoaderIter<'a> {
    loader: &'a mut DataLoader,
}

impl Iterator for DataLoaderIter<'_> {
    type Item = Array4<f32>;

    fn next(&mut self) -> Option<Self::Item> {
        self.loader.next_array()
    }
}
