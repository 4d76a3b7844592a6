//! WAV file helpers

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{bail, Context, Result};

/// Load audio from a WAV file.
///
/// Returns mono samples normalized to [-1, 1] and the sample rate.
/// Multi-channel files are mixed down by averaging.
pub fn load_wav<P: AsRef<Path>>(path: P) -> Result<(Vec<f32>, u32)> {
    let path = path.as_ref();

    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut reader = hound::WavReader::new(BufReader::new(file))
        .with_context(|| format!("failed to read WAV file {}", path.display()))?;

    let spec = reader.spec();
    if spec.sample_rate == 0 {
        bail!("Invalid sample rate 0 in {}", path.display());
    }

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => {
            let max_val = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<Result<_, _>>()?
        }
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
    };

    let channels = spec.channels.max(1) as usize;
    let samples = if channels > 1 {
        samples
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    } else {
        samples
    };

    if samples.is_empty() {
        bail!("Audio file {} contains no samples", path.display());
    }

    Ok((samples, spec.sample_rate))
}

/// Write mono samples as a 16-bit PCM WAV file
///
/// Samples outside [-1, 1] are clipped.
pub fn save_wav<P: AsRef<Path>>(path: P, samples: &[f32], sample_rate: u32) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("failed to create {}", path.display()))?;
    for &sample in samples {
        writer.write_sample((sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)?;
    }
    writer.finalize()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wav_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");

        let samples: Vec<f32> = (0..800).map(|i| 0.5 * (i as f32 * 0.05).sin()).collect();
        save_wav(&path, &samples, 8000).unwrap();

        let (loaded, rate) = load_wav(&path).unwrap();
        assert_eq!(rate, 8000);
        assert_eq!(loaded.len(), samples.len());

        let max_err = samples
            .iter()
            .zip(&loaded)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0f32, f32::max);
        assert!(max_err < 1e-3);
    }

    #[test]
    fn test_stereo_mixdown() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");

        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 8000,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..10 {
            writer.write_sample(0.5f32).unwrap();
            writer.write_sample(-0.1f32).unwrap();
        }
        writer.finalize().unwrap();

        let (loaded, _) = load_wav(&path).unwrap();
        assert_eq!(loaded.len(), 10);
        assert!((loaded[0] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(load_wav("/nonexistent/missing.wav").is_err());
    }
}
