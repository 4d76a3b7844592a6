//! Spectrogram codec
//!
//! Converts audio files into fixed-size log-magnitude spectrograms normalized
//! to [-1, 1], and spectrograms back into waveforms by Griffin-Lim phase
//! reconstruction.

use std::f32::consts::PI;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Result};
use ndarray::{Array, Array2, Array3, Dimension};
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use serde::{Deserialize, Serialize};

use super::wav::load_wav;

/// Lower end of the decibel range used for display scaling
pub const DEFAULT_MIN_DB: f32 = -120.0;

/// Upper end of the decibel range used for display scaling
pub const DEFAULT_MAX_DB: f32 = 40.0;

const MIN_MAGNITUDE: f32 = 1e-12;
const PHASE_EPS: f32 = 1e-8;

/// Converts between audio files and their normalized 2D representation
pub trait SignalCodec {
    /// Encode an audio file into an array of shape (channels, frames, freq_bins)
    fn encode(&self, path: &Path) -> Result<Array3<f32>>;

    /// Decode one (frames, freq_bins) representation into audio samples
    fn decode(&self, representation: &Array2<f32>) -> Result<Vec<f32>>;

    /// Min-max rescale into [low, high]
    fn scale_to_range(&self, data: &Array2<f32>, low: f32, high: f32) -> Array2<f32> {
        scale_to_range(data, low, high)
    }
}

/// Min-max rescale any array into [low, high]
///
/// A constant input maps to `low` everywhere.
pub fn scale_to_range<D: Dimension>(data: &Array<f32, D>, low: f32, high: f32) -> Array<f32, D> {
    let min = data.iter().copied().fold(f32::INFINITY, f32::min);
    let max = data.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let span = max - min;

    if !span.is_finite() || span <= 0.0 {
        return data.mapv(|_| low);
    }

    data.mapv(|x| low + (x - min) / span * (high - low))
}

/// STFT parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodecConfig {
    /// Expected sample rate of input files
    pub sample_rate: u32,
    /// FFT size; the spectrogram has n_fft / 2 + 1 bins
    pub n_fft: usize,
    /// Hop between frames in samples
    pub hop_length: usize,
    /// Decibel floor
    pub min_db: f32,
    /// Decibel ceiling
    pub max_db: f32,
    /// Phase reconstruction iterations
    pub griffin_lim_iters: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            n_fft: 1024,
            hop_length: 256,
            min_db: DEFAULT_MIN_DB,
            max_db: DEFAULT_MAX_DB,
            griffin_lim_iters: 32,
        }
    }
}

impl CodecConfig {
    /// Number of frequency bins per frame
    pub fn freq_bins(&self) -> usize {
        self.n_fft / 2 + 1
    }
}

/// Log-magnitude STFT codec with a fixed number of frames
pub struct StftCodec {
    config: CodecConfig,
    n_frames: usize,
    window: Vec<f32>,
    fft: Arc<dyn Fft<f32>>,
    ifft: Arc<dyn Fft<f32>>,
}

impl StftCodec {
    /// Create a codec producing `n_frames` frames per file
    pub fn new(config: CodecConfig, n_frames: usize) -> Result<Self> {
        if config.n_fft < 2 || config.hop_length == 0 || n_frames == 0 {
            bail!(
                "invalid STFT parameters: n_fft={}, hop_length={}, frames={}",
                config.n_fft,
                config.hop_length,
                n_frames
            );
        }
        if config.min_db >= config.max_db {
            bail!("min_db ({}) must be below max_db ({})", config.min_db, config.max_db);
        }

        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(config.n_fft);
        let ifft = planner.plan_fft_inverse(config.n_fft);
        let window = hann_window(config.n_fft);

        Ok(Self {
            config,
            n_frames,
            window,
            fft,
            ifft,
        })
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    pub fn n_frames(&self) -> usize {
        self.n_frames
    }

    pub fn freq_bins(&self) -> usize {
        self.config.freq_bins()
    }

    /// Samples covered by `frames` frames
    pub fn num_samples(&self, frames: usize) -> usize {
        (frames.max(1) - 1) * self.config.hop_length + self.config.n_fft
    }

    /// Normalized spectrogram of raw samples, shape (n_frames, freq_bins)
    ///
    /// The signal is zero-padded or truncated to exactly `n_frames` frames.
    pub fn spectrogram(&self, samples: &[f32]) -> Array2<f32> {
        let spectrum = self.stft(samples, self.n_frames);
        let bins = self.freq_bins();
        Array2::from_shape_fn((self.n_frames, bins), |(f, k)| {
            self.normalize(spectrum[f][k].norm())
        })
    }

    fn normalize(&self, magnitude: f32) -> f32 {
        let db = 20.0 * magnitude.max(MIN_MAGNITUDE).log10();
        let db = db.clamp(self.config.min_db, self.config.max_db);
        2.0 * (db - self.config.min_db) / (self.config.max_db - self.config.min_db) - 1.0
    }

    fn denormalize(&self, value: f32) -> f32 {
        let unit = (value.clamp(-1.0, 1.0) + 1.0) / 2.0;
        let db = self.config.min_db + unit * (self.config.max_db - self.config.min_db);
        10f32.powf(db / 20.0)
    }

    fn stft(&self, samples: &[f32], frames: usize) -> Vec<Vec<Complex<f32>>> {
        let n_fft = self.config.n_fft;
        let hop = self.config.hop_length;
        let bins = self.freq_bins();

        (0..frames)
            .map(|f| {
                let start = f * hop;
                let mut buffer: Vec<Complex<f32>> = (0..n_fft)
                    .map(|i| {
                        let x = samples.get(start + i).copied().unwrap_or(0.0);
                        Complex::new(x * self.window[i], 0.0)
                    })
                    .collect();
                self.fft.process(&mut buffer);
                buffer.truncate(bins);
                buffer
            })
            .collect()
    }

    fn istft(&self, spectrum: &[Vec<Complex<f32>>]) -> Vec<f32> {
        let n_fft = self.config.n_fft;
        let hop = self.config.hop_length;
        let bins = self.freq_bins();
        let len = self.num_samples(spectrum.len());

        let mut output = vec![0.0f32; len];
        let mut window_sum = vec![0.0f32; len];

        for (f, frame) in spectrum.iter().enumerate() {
            let mut buffer = vec![Complex::new(0.0f32, 0.0); n_fft];
            for k in 0..bins {
                buffer[k] = frame[k];
                if k > 0 && k < n_fft - k {
                    buffer[n_fft - k] = frame[k].conj();
                }
            }
            self.ifft.process(&mut buffer);

            let start = f * hop;
            for i in 0..n_fft {
                let w = self.window[i];
                output[start + i] += buffer[i].re / n_fft as f32 * w;
                window_sum[start + i] += w * w;
            }
        }

        for (sample, &norm) in output.iter_mut().zip(&window_sum) {
            if norm > PHASE_EPS {
                *sample /= norm;
            }
        }
        output
    }

    /// Reconstruct a waveform from linear magnitudes of shape (frames, freq_bins)
    pub fn griffin_lim(&self, magnitudes: &Array2<f32>) -> Vec<f32> {
        let frames = magnitudes.nrows();
        let bins = magnitudes.ncols();
        let mut phases = vec![vec![Complex::new(1.0f32, 0.0); bins]; frames];

        let combine = |phases: &[Vec<Complex<f32>>]| -> Vec<Vec<Complex<f32>>> {
            phases
                .iter()
                .enumerate()
                .map(|(f, row)| {
                    row.iter()
                        .enumerate()
                        .map(|(k, p)| *p * magnitudes[[f, k]])
                        .collect()
                })
                .collect()
        };

        for _ in 0..self.config.griffin_lim_iters {
            let signal = self.istft(&combine(&phases));
            let rebuilt = self.stft(&signal, frames);
            for (row, rebuilt_row) in phases.iter_mut().zip(&rebuilt) {
                for (p, c) in row.iter_mut().zip(rebuilt_row) {
                    let norm = c.norm();
                    *p = if norm > PHASE_EPS {
                        *c / norm
                    } else {
                        Complex::new(1.0, 0.0)
                    };
                }
            }
        }

        self.istft(&combine(&phases))
    }
}

impl SignalCodec for StftCodec {
    fn encode(&self, path: &Path) -> Result<Array3<f32>> {
        let (samples, sample_rate) = load_wav(path)?;
        if sample_rate != self.config.sample_rate {
            bail!(
                "{} has sample rate {} Hz, expected {} Hz",
                path.display(),
                sample_rate,
                self.config.sample_rate
            );
        }

        let spec = self.spectrogram(&samples);
        let (frames, bins) = spec.dim();
        Ok(spec.into_shape_with_order((1, frames, bins))?)
    }

    fn decode(&self, representation: &Array2<f32>) -> Result<Vec<f32>> {
        let bins = self.freq_bins();
        if representation.ncols() != bins || representation.nrows() == 0 {
            bail!(
                "cannot decode representation of shape {:?}, expected (frames, {})",
                representation.shape(),
                bins
            );
        }

        let magnitudes = representation.mapv(|v| self.denormalize(v));
        Ok(self.griffin_lim(&magnitudes))
    }
}

fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f32 / size as f32).cos())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::save_wav;

    fn small_config() -> CodecConfig {
        CodecConfig {
            sample_rate: 8000,
            n_fft: 256,
            hop_length: 64,
            griffin_lim_iters: 16,
            ..CodecConfig::default()
        }
    }

    fn tone(freq: f32, rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| 0.1 * (2.0 * PI * freq * i as f32 / rate as f32).sin())
            .collect()
    }

    fn peak_bin(spec: &Array2<f32>, frame: usize) -> usize {
        spec.row(frame)
            .iter()
            .enumerate()
            .fold((0, f32::NEG_INFINITY), |best, (k, &v)| if v > best.1 { (k, v) } else { best })
            .0
    }

    #[test]
    fn test_scale_to_range() {
        let data = Array2::from_shape_vec((2, 2), vec![-1.0, 0.0, 0.5, 1.0]).unwrap();
        let scaled = scale_to_range(&data, DEFAULT_MIN_DB, DEFAULT_MAX_DB);

        assert_eq!(scaled[[0, 0]], -120.0);
        assert_eq!(scaled[[1, 1]], 40.0);
        assert!((scaled[[0, 1]] + 40.0).abs() < 1e-4);
    }

    #[test]
    fn test_scale_constant_maps_to_low() {
        let data = Array2::from_elem((3, 3), 0.7f32);
        let scaled = scale_to_range(&data, -1.0, 1.0);
        assert!(scaled.iter().all(|&v| v == -1.0));
    }

    #[test]
    fn test_encode_shape_and_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        save_wav(&path, &tone(1000.0, 8000, 2000), 8000).unwrap();

        let codec = StftCodec::new(small_config(), 16).unwrap();
        let encoded = codec.encode(&path).unwrap();

        assert_eq!(encoded.shape(), &[1, 16, 129]);
        assert!(encoded.iter().all(|&v| (-1.0..=1.0).contains(&v)));

        // 1000 Hz at 8 kHz with 256-point FFT lands on bin 32
        let plane = encoded.index_axis(ndarray::Axis(0), 0).to_owned();
        assert_eq!(peak_bin(&plane, 8), 32);
    }

    #[test]
    fn test_sample_rate_mismatch_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        save_wav(&path, &tone(440.0, 16000, 2000), 16000).unwrap();

        let codec = StftCodec::new(small_config(), 16).unwrap();
        assert!(codec.encode(&path).is_err());
    }

    #[test]
    fn test_decode_preserves_dominant_frequency() {
        let codec = StftCodec::new(small_config(), 16).unwrap();
        let spec = codec.spectrogram(&tone(1000.0, 8000, 2000));

        let audio = codec.decode(&spec).unwrap();
        assert_eq!(audio.len(), codec.num_samples(16));

        let rebuilt = codec.spectrogram(&audio);
        assert_eq!(peak_bin(&rebuilt, 8), 32);
    }

    #[test]
    fn test_decode_rejects_wrong_bins() {
        let codec = StftCodec::new(small_config(), 16).unwrap();
        let spec = Array2::<f32>::zeros((16, 100));
        assert!(codec.decode(&spec).is_err());
    }

    #[test]
    fn test_invalid_parameters() {
        let config = CodecConfig {
            hop_length: 0,
            ..small_config()
        };
        assert!(StftCodec::new(config, 16).is_err());
    }
}
