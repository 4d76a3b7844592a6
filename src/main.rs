//! DCGAN for Audio Spectrogram Generation
//!
//! Main entry point providing CLI interface for:
//! - Writing experiment configurations
//! - Training DCGAN model on a directory of WAV files
//! - Generating synthetic audio

use std::path::Path;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use rust_dcgan_spectrogram::{
    audio::{
        grapher_for, save_wav, scale_to_range, Grapher, SignalCodec, StftCodec, DEFAULT_MAX_DB,
        DEFAULT_MIN_DB,
    },
    data::{tensor_to_array2, DataLoader, SpectrogramDataset},
    model::DCGAN,
    training::Trainer,
    utils::{CheckpointStore, Config, Experiment},
};

/// DCGAN for Synthetic Audio
#[derive(Parser)]
#[command(name = "dcgan_spectrogram")]
#[command(version = "0.1.0")]
#[command(about = "Generate synthetic audio spectrograms using DCGAN")]
struct Cli {
    /// Path to configuration file (.json or .toml)
    #[arg(short, long, default_value = "config.json")]
    config: String,

    /// Verbosity level
    #[arg(short, long, default_value = "info")]
    verbosity: String,

    /// Experiment preset used when the configuration file does not exist
    #[arg(short, long, default_value = "dcgan")]
    experiment: Experiment,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a configuration file for an experiment
    Init {
        /// Output configuration file path
        #[arg(short, long, default_value = "config.json")]
        output: String,
    },

    /// Train the DCGAN model
    Train {
        /// Directory of training WAV files (overrides the configuration)
        #[arg(short, long)]
        data: Option<String>,

        /// Number of epochs (overrides the configuration)
        #[arg(long)]
        epochs: Option<usize>,
    },

    /// Generate synthetic audio from a saved generator
    Generate {
        /// Checkpoint tag (defaults to the configured tag)
        #[arg(short, long)]
        tag: Option<String>,

        /// Number of samples to generate
        #[arg(short, long, default_value = "3")]
        num_samples: usize,

        /// Output directory for WAV files
        #[arg(short, long, default_value = "generated")]
        output: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = match cli.verbosity.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Init { output } => {
            init_config(&output, cli.experiment)?;
        }
        Commands::Train { data, epochs } => {
            train_model(&cli.config, cli.experiment, data, epochs)?;
        }
        Commands::Generate {
            tag,
            num_samples,
            output,
        } => {
            generate_samples(&cli.config, cli.experiment, tag, num_samples, &output)?;
        }
    }

    Ok(())
}

fn load_config(path: &str, experiment: Experiment) -> Result<Config> {
    let config = if Path::new(path).exists() {
        Config::load(path)?
    } else {
        info!("Config file not found, using {} preset", experiment);
        Config::for_experiment(experiment)
    };
    config.validate()?;
    Ok(config)
}

fn make_grapher(config: &Config) -> Box<dyn Grapher> {
    grapher_for(config.training.plot_dir.as_deref(), config.training.plot_format)
}

/// Train the DCGAN model
fn train_model(
    config_path: &str,
    experiment: Experiment,
    data: Option<String>,
    epochs: Option<usize>,
) -> Result<()> {
    let mut config = load_config(config_path, experiment)?;
    if let Some(dir) = data {
        config.data.audio_dir = dir;
    }
    if let Some(epochs) = epochs {
        config.training.epochs = epochs;
    }
    config.validate()?;

    let device = config.get_device();
    info!("Using device: {:?}", device);

    let codec = StftCodec::new(config.codec.clone(), config.data.frames)?;
    let dataset = SpectrogramDataset::from_audio_dir(&config.data.audio_dir, &codec)?;
    if dataset.len() < 2 {
        bail!("Need at least two audio files to split into training and validation sets");
    }

    let (channels, _, _) = dataset.spectrogram_shape();
    if channels as i64 != config.model.channels {
        bail!(
            "Dataset has {} channels but the model expects {}",
            channels,
            config.model.channels
        );
    }

    let (train_set, val_set) = dataset.split(config.data.validation_fraction);
    info!(
        "Split {} spectrograms into {} training and {} validation",
        dataset.len(),
        train_set.len(),
        val_set.len()
    );

    let mut train_loader = DataLoader::new(
        train_set.into_array(),
        config.data.batch_size,
        config.data.shuffle,
        config.data.drop_last,
    );
    let mut val_loader = DataLoader::new(val_set.into_array(), config.data.batch_size, false, false);

    if let Some(seed) = config.training.seed {
        tch::manual_seed(seed);
    }
    let model = DCGAN::new(config.generator_config(), config.discriminator_config(), device);

    let mut trainer = Trainer::with_grapher(config.training.clone(), make_grapher(&config));
    let metrics = trainer.train(&model, &mut train_loader, &mut val_loader)?;

    info!(
        "Training complete. Final G_loss: {:.4}, D_loss: {:.4}",
        metrics.latest_gen_loss().unwrap_or(0.0),
        metrics.latest_disc_loss().unwrap_or(0.0)
    );

    Ok(())
}

/// Generate synthetic audio
fn generate_samples(
    config_path: &str,
    experiment: Experiment,
    tag: Option<String>,
    num_samples: usize,
    output_dir: &str,
) -> Result<()> {
    let config = load_config(config_path, experiment)?;
    let device = config.get_device();

    let mut model = DCGAN::new(config.generator_config(), config.discriminator_config(), device);
    let store = CheckpointStore::new(&config.training.checkpoint_dir);
    let tag = tag.unwrap_or_else(|| config.training.checkpoint_tag.clone());
    store.load(&mut model.gen_vs, &tag)?;

    let codec = StftCodec::new(config.codec.clone(), config.data.frames)?;
    let grapher = make_grapher(&config);

    info!("Generating {} samples", num_samples);
    let samples = model.generate(num_samples as i64);

    for i in 0..num_samples as i64 {
        let plane = tensor_to_array2(&samples.get(i).get(0))?;

        let title = format!("Generated Audio {}", i + 1);
        let scaled = scale_to_range(&plane, DEFAULT_MIN_DB, DEFAULT_MAX_DB);
        if let Err(e) = grapher.graph(&scaled, &title) {
            warn!("Failed to graph '{}': {}", title, e);
        }

        let audio = codec.decode(&plane)?;
        let path = Path::new(output_dir).join(format!("generated_{}.wav", i + 1));
        save_wav(&path, &audio, config.codec.sample_rate)?;
        info!("Saved {}", path.display());
    }

    Ok(())
}

/// Initialize configuration file
fn init_config(output_path: &str, experiment: Experiment) -> Result<()> {
    let config = Config::for_experiment(experiment);
    config.save(output_path)?;

    info!("Created {} configuration at {}", experiment, output_path);
    Ok(())
}
