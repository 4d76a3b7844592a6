//! Standalone binary for checking spectrogram codec degradation
//!
//! Encodes an audio file, decodes it back to a WAV, re-encodes the result and
//! reports how far the two spectrograms are apart.
//!
//! Usage:
//!   cargo run --bin validate_codec -- --audio-dir data/audio

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::Parser;
use ndarray::{Array2, Axis};
use rand::seq::SliceRandom;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use rust_dcgan_spectrogram::{
    audio::{grapher_for, save_wav, Grapher, PlotFormat, SignalCodec, StftCodec},
    utils::Config,
};

/// Measure STFT / Griffin-Lim round-trip degradation
#[derive(Parser)]
#[command(name = "validate_codec")]
#[command(about = "Encode, decode and re-encode an audio file to inspect codec loss")]
struct Args {
    /// Path to configuration file (.json or .toml)
    #[arg(short, long, default_value = "config.json")]
    config: String,

    /// File to check; a random file from the audio directory when omitted
    #[arg(short, long)]
    file: Option<String>,

    /// Audio directory to pick from (overrides the configuration)
    #[arg(long)]
    audio_dir: Option<String>,

    /// Where the reconstructed WAV is written
    #[arg(short, long, default_value = "codec_check.wav")]
    output: String,

    /// Directory for graphs; graphs are only logged when omitted
    #[arg(long)]
    plot_dir: Option<String>,

    /// Write CSV grids instead of PNG images
    #[arg(long)]
    csv: bool,
}

fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let config = if Path::new(&args.config).exists() {
        Config::load(&args.config)?
    } else {
        Config::default()
    };

    let sample_path = match args.file {
        Some(file) => PathBuf::from(file),
        None => {
            let dir = args.audio_dir.unwrap_or_else(|| config.data.audio_dir.clone());
            choose_random_sample(Path::new(&dir))?
        }
    };
    let sample_name = sample_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| sample_path.display().to_string());

    let format = if args.csv {
        PlotFormat::Csv
    } else {
        PlotFormat::Png
    };
    let grapher = grapher_for(args.plot_dir.as_deref(), format);

    let codec = StftCodec::new(config.codec.clone(), config.data.frames)?;

    let original = first_plane(&codec.encode(&sample_path)?);
    graph_or_warn(grapher.as_ref(), &original, &format!("{} Original", sample_name));

    let audio = codec.decode(&original)?;
    save_wav(&args.output, &audio, config.codec.sample_rate)?;
    info!("Saved reconstruction to {}", args.output);

    let rebuilt = first_plane(&codec.encode(Path::new(&args.output))?);
    graph_or_warn(grapher.as_ref(), &rebuilt, &format!("{} After iSTFT", sample_name));

    let diff = (&original - &rebuilt).mapv(f32::abs).mean().unwrap_or(0.0);
    info!("Mean absolute difference after round trip: {:.6}", diff);

    Ok(())
}

fn choose_random_sample(dir: &Path) -> Result<PathBuf> {
    let files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();

    match files.choose(&mut rand::thread_rng()) {
        Some(path) => Ok(path.clone()),
        None => bail!("No audio files found in {}", dir.display()),
    }
}

fn first_plane(encoded: &ndarray::Array3<f32>) -> Array2<f32> {
    encoded.index_axis(Axis(0), 0).to_owned()
}

fn graph_or_warn(grapher: &dyn Grapher, data: &Array2<f32>, title: &str) {
    if let Err(e) = grapher.graph(data, title) {
        warn!("Failed to graph '{}': {}", title, e);
    }
}
