//! Spectrogram datasets and host/device conversions
//!
//! A dataset is a stack of normalized spectrograms of identical shape,
//! held on the host as an ndarray until batches are handed to the model.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use ndarray::{s, Array2, Array3, Array4, ArrayView3, Axis};
use tch::{Device, Tensor};
use tracing::{debug, info};

use crate::audio::SignalCodec;

/// Stack of spectrograms of shape (num_spectrograms, channels, frames, freq_bins)
#[derive(Debug, Clone)]
pub struct SpectrogramDataset {
    data: Array4<f32>,
}

impl SpectrogramDataset {
    /// Wrap an existing array
    pub fn from_array(data: Array4<f32>) -> Self {
        Self { data }
    }

    /// Encode every `.wav` file in a directory with the given codec
    ///
    /// Files are visited in name order so the dataset is reproducible.
    pub fn from_audio_dir<P: AsRef<Path>>(dir: P, codec: &dyn SignalCodec) -> Result<Self> {
        let files = list_wav_files(dir.as_ref())?;
        if files.is_empty() {
            bail!("No .wav files found in {}", dir.as_ref().display());
        }

        let mut encoded: Vec<Array3<f32>> = Vec::with_capacity(files.len());
        for path in &files {
            debug!("Encoding {}", path.display());
            encoded.push(codec.encode(path)?);
        }

        let views: Vec<ArrayView3<f32>> = encoded.iter().map(|a| a.view()).collect();
        let data = ndarray::stack(Axis(0), &views)
            .context("encoded spectrograms differ in shape")?;

        info!(
            "Encoded {} files from {} into spectrograms of shape {:?}",
            files.len(),
            dir.as_ref().display(),
            &data.shape()[1..]
        );

        Ok(Self { data })
    }

    /// Number of spectrograms
    pub fn len(&self) -> usize {
        self.data.shape()[0]
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// (channels, frames, freq_bins) of every spectrogram
    pub fn spectrogram_shape(&self) -> (usize, usize, usize) {
        let shape = self.data.shape();
        (shape[1], shape[2], shape[3])
    }

    /// Split off the trailing `validation_fraction` as a validation set
    ///
    /// With two or more spectrograms both halves get at least one.
    pub fn split(&self, validation_fraction: f64) -> (Self, Self) {
        let len = self.len();
        let mut num_val = (len as f64 * validation_fraction.clamp(0.0, 1.0)).round() as usize;
        if len >= 2 {
            num_val = num_val.clamp(1, len - 1);
        }
        let num_train = len - num_val;

        let train = self.data.slice(s![..num_train, .., .., ..]).to_owned();
        let val = self.data.slice(s![num_train.., .., .., ..]).to_owned();
        (Self::from_array(train), Self::from_array(val))
    }

    /// View of the underlying array
    pub fn data(&self) -> &Array4<f32> {
        &self.data
    }

    /// Take the underlying array
    pub fn into_array(self) -> Array4<f32> {
        self.data
    }
}

fn list_wav_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read audio directory {}", dir.display()))?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter(|p| {
            p.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.eq_ignore_ascii_case("wav"))
                .unwrap_or(false)
        })
        .collect();

    files.sort();
    Ok(files)
}

/// Copy a host batch into a CPU tensor of the same shape
pub fn array_to_tensor(batch: &Array4<f32>) -> Tensor {
    let shape: Vec<i64> = batch.shape().iter().map(|&d| d as i64).collect();
    let values: Vec<f32> = batch.iter().copied().collect();
    Tensor::from_slice(&values).view(shape.as_slice())
}

/// Copy a 2D tensor (frames, freq_bins) back to the host
pub fn tensor_to_array2(tensor: &Tensor) -> Result<Array2<f32>> {
    let size = tensor.size();
    if size.len() != 2 {
        bail!("expected a 2D tensor, got shape {:?}", size);
    }

    let values: Vec<f32> = Vec::try_from(tensor.to_device(Device::Cpu).flatten(0, -1))?;
    Ok(Array2::from_shape_vec((size[0] as usize, size[1] as usize), values)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_keeps_both_sides() {
        let data = Array4::<f32>::zeros((10, 1, 4, 3));
        let dataset = SpectrogramDataset::from_array(data);

        let (train, val) = dataset.split(0.2);
        assert_eq!(train.len(), 8);
        assert_eq!(val.len(), 2);

        let (train, val) = dataset.split(0.0);
        assert_eq!(train.len(), 9);
        assert_eq!(val.len(), 1);
    }

    #[test]
    fn test_array_tensor_conversion() {
        let data = Array4::from_shape_fn((2, 1, 3, 4), |(n, _, f, b)| (n * 100 + f * 10 + b) as f32);
        let tensor = array_to_tensor(&data);

        assert_eq!(tensor.size(), vec![2, 1, 3, 4]);
        assert_eq!(tensor.double_value(&[1, 0, 2, 3]), 123.0);

        let plane = tensor_to_array2(&tensor.get(1).get(0)).unwrap();
        assert_eq!(plane.shape(), &[3, 4]);
        assert_eq!(plane[[2, 3]], 123.0);
    }

    #[test]
    fn test_empty_directory_is_error() {
        struct NeverCalled;
        impl SignalCodec for NeverCalled {
            fn encode(&self, _path: &Path) -> Result<Array3<f32>> {
                unreachable!()
            }
            fn decode(&self, _representation: &Array2<f32>) -> Result<Vec<f32>> {
                unreachable!()
            }
        }

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not audio").unwrap();

        assert!(SpectrogramDataset::from_audio_dir(dir.path(), &NeverCalled).is_err());
    }
}
