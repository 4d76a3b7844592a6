//! Training loop implementation for DCGAN
//!
//! Each batch updates the generator first and then the discriminator on the
//! same (detached) fake batch. Validation and generator checkpoints run on
//! fixed epoch intervals.

use anyhow::{ensure, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use tch::{nn, Device, Tensor};
use tracing::{debug, info, warn};

use super::labels::LabelBatch;
use super::losses::{discriminator_loss, generator_loss};
use super::metrics::{EpochAccumulator, EpochLosses, TrainingMetrics};
use super::scheduler::{LrScheduler, SchedulerKind};
use crate::audio::{
    scale_to_range, Grapher, LogGrapher, PlotFormat, DEFAULT_MAX_DB, DEFAULT_MIN_DB,
};
use crate::data::{tensor_to_array2, BatchSource};
use crate::model::DCGAN;
use crate::utils::{CheckpointMeta, CheckpointStore};

/// Training configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Number of training epochs
    pub epochs: usize,
    /// Validate every N epochs
    pub validation_interval: usize,
    /// Save the generator every N epochs
    pub save_interval: usize,
    /// Learning rate for generator
    pub gen_lr: f64,
    /// Learning rate for discriminator
    pub disc_lr: f64,
    /// Adam first moment decay
    pub beta1: f64,
    /// Adam second moment decay
    pub beta2: f64,
    /// Sample spectrograms graphed after each validation
    pub samples_per_validation: usize,
    /// Directory to save checkpoints
    pub checkpoint_dir: String,
    /// Tag the generator is saved under
    pub checkpoint_tag: String,
    /// Directory for sample graphs; samples are only logged when unset
    pub plot_dir: Option<String>,
    /// Format sample graphs are written in under `plot_dir`
    #[serde(default)]
    pub plot_format: PlotFormat,
    /// Seed for libtorch's generator
    pub seed: Option<i64>,
    /// Device: "cpu" or "cuda"
    pub device: String,
    /// Learning rate schedule applied to both optimizers
    pub scheduler: SchedulerKind,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 10,
            validation_interval: 5,
            save_interval: 10,
            gen_lr: 2e-4,
            disc_lr: 2e-4,
            beta1: 0.5,
            beta2: 0.999,
            samples_per_validation: 3,
            checkpoint_dir: "checkpoints".to_string(),
            checkpoint_tag: "DCGAN".to_string(),
            plot_dir: Some("plots".to_string()),
            plot_format: PlotFormat::Png,
            seed: None,
            device: "cpu".to_string(),
            scheduler: SchedulerKind::default(),
        }
    }
}

/// Optimizers and their schedulers for both networks
pub struct GanOptimizers {
    pub gen_opt: nn::Optimizer,
    pub disc_opt: nn::Optimizer,
    pub gen_sched: LrScheduler,
    pub disc_sched: LrScheduler,
}

impl GanOptimizers {
    pub fn new(model: &DCGAN, config: &TrainingConfig) -> Result<Self> {
        Ok(Self {
            gen_opt: model.gen_optimizer(config.gen_lr, config.beta1, config.beta2)?,
            disc_opt: model.disc_optimizer(config.disc_lr, config.beta1, config.beta2)?,
            gen_sched: LrScheduler::new(config.scheduler, config.gen_lr),
            disc_sched: LrScheduler::new(config.scheduler, config.disc_lr),
        })
    }
}

/// Smoothed targets shared by both updates of one batch
pub struct StepLabels {
    pub real: Tensor,
    pub fake: Tensor,
}

impl StepLabels {
    /// Draw smoothed real labels, then smoothed fake labels
    pub fn smoothed(batch_size: i64, device: Device) -> Self {
        let real = LabelBatch::AllReal.smoothed(batch_size, device);
        let fake = LabelBatch::AllFake.smoothed(batch_size, device);
        Self { real, fake }
    }
}

/// One training step on a real batch
///
/// Labels are smoothed once, before the latent batch is drawn, and the same
/// real labels serve both updates. The fake batch is generated once; the
/// discriminator sees it detached so no gradient reaches the generator.
///
/// # Returns
///
/// (generator loss, discriminator loss)
pub fn train_step(model: &DCGAN, real: &Tensor, optim: &mut GanOptimizers) -> Result<(f64, f64)> {
    let labels = StepLabels::smoothed(real.size()[0], model.device);
    train_step_with_labels(model, real, &labels, optim)
}

/// One training step with caller-provided labels
pub fn train_step_with_labels(
    model: &DCGAN,
    real: &Tensor,
    labels: &StepLabels,
    optim: &mut GanOptimizers,
) -> Result<(f64, f64)> {
    let batch_size = real.size()[0];
    ensure!(
        labels.real.size()[0] == batch_size && labels.fake.size()[0] == batch_size,
        "labels do not match batch size {}",
        batch_size
    );

    let noise = model.sample_latent(batch_size);
    let fake = model.generator.forward_t(&noise, true);

    // Generator
    let g_loss = generator_loss(&model.discriminator, &fake, &labels.real, true)?;

    optim.gen_opt.zero_grad();
    g_loss.backward();
    optim.gen_opt.step();
    optim.gen_sched.step(&mut optim.gen_opt);

    // Discriminator
    let d_loss = discriminator_loss(
        &model.discriminator,
        real,
        &fake.detach(),
        &labels.real,
        &labels.fake,
        true,
    )?;

    optim.disc_opt.zero_grad();
    d_loss.backward();
    optim.disc_opt.step();
    optim.disc_sched.step(&mut optim.disc_opt);

    Ok((g_loss.double_value(&[]), d_loss.double_value(&[])))
}

/// DCGAN Trainer
pub struct Trainer {
    config: TrainingConfig,
    metrics: TrainingMetrics,
    store: CheckpointStore,
    grapher: Box<dyn Grapher>,
}

impl Trainer {
    /// Create a trainer that logs sample statistics instead of plotting
    pub fn new(config: TrainingConfig) -> Self {
        Self::with_grapher(config, Box::new(LogGrapher))
    }

    /// Create a trainer that hands sample spectrograms to `grapher`
    pub fn with_grapher(config: TrainingConfig, grapher: Box<dyn Grapher>) -> Self {
        let store = CheckpointStore::new(&config.checkpoint_dir);
        Self {
            config,
            metrics: TrainingMetrics::new(),
            store,
            grapher,
        }
    }

    /// Train over one pass of `loader`
    pub fn train_epoch(
        &self,
        model: &DCGAN,
        loader: &mut dyn BatchSource,
        optim: &mut GanOptimizers,
    ) -> Result<EpochLosses> {
        loader.reset();

        let pb = ProgressBar::new(loader.num_batches() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")?
                .progress_chars("##-"),
        );

        let mut acc = EpochAccumulator::new();
        while let Some(batch) = loader.next_batch() {
            let real = batch.to_device(model.device);
            let (g_loss, d_loss) = train_step(model, &real, optim)?;
            acc.push(g_loss, d_loss);

            pb.set_message(format!("G: {:.4}, D: {:.4}", g_loss, d_loss));
            pb.inc(1);
        }
        pb.finish_with_message("done");

        debug!(
            "lr after epoch: G={:.6}, D={:.6}",
            optim.gen_sched.get_lr(),
            optim.disc_sched.get_lr()
        );
        acc.finish()
    }

    /// Evaluate both losses over `loader` without gradients or smoothing
    pub fn validate(&self, model: &DCGAN, loader: &mut dyn BatchSource) -> Result<EpochLosses> {
        loader.reset();

        tch::no_grad(|| {
            let mut acc = EpochAccumulator::new();
            while let Some(batch) = loader.next_batch() {
                let real = batch.to_device(model.device);
                let batch_size = real.size()[0];

                let fake = model.generator.forward_t(&model.sample_latent(batch_size), false);
                let real_labels = LabelBatch::AllReal.hard(batch_size, model.device);
                let fake_labels = LabelBatch::AllFake.hard(batch_size, model.device);

                let g_loss = generator_loss(&model.discriminator, &fake, &real_labels, false)?;
                let d_loss = discriminator_loss(
                    &model.discriminator,
                    &real,
                    &fake,
                    &real_labels,
                    &fake_labels,
                    false,
                )?;
                acc.push(g_loss.double_value(&[]), d_loss.double_value(&[]));
            }
            acc.finish()
        })
    }

    /// Generate sample spectrograms and hand them to the grapher
    ///
    /// Graphing failures are logged and never abort training.
    pub fn graph_samples(&self, model: &DCGAN, epoch: usize) -> Result<()> {
        let count = self.config.samples_per_validation as i64;
        if count == 0 {
            return Ok(());
        }
        let samples = model.generate(count);

        for i in 0..count {
            // first channel of sample i: (frames, freq_bins)
            let plane = tensor_to_array2(&samples.get(i).get(0))?;
            let scaled = scale_to_range(&plane, DEFAULT_MIN_DB, DEFAULT_MAX_DB);
            let title = format!("Generated Audio {} epoch {}", i + 1, epoch);

            if let Err(e) = self.grapher.graph(&scaled, &title) {
                warn!("Failed to graph '{}': {}", title, e);
            }
        }
        Ok(())
    }

    /// Save the generator under the configured tag
    pub fn save_generator(&self, model: &DCGAN, epoch: usize) -> Result<()> {
        let (channels, frames, freq_bins) = model.spectrogram_shape();
        let meta = CheckpointMeta::new(
            epoch,
            self.metrics.latest_gen_loss().unwrap_or(0.0),
            self.metrics.latest_disc_loss().unwrap_or(0.0),
            serde_json::json!({
                "latent_dim": model.latent_dim(),
                "channels": channels,
                "frames": frames,
                "freq_bins": freq_bins,
            }),
        );

        self.store.save(&model.gen_vs, &self.config.checkpoint_tag, &meta)?;
        Ok(())
    }

    /// Train the DCGAN model
    ///
    /// # Arguments
    ///
    /// * `model` - DCGAN model to train
    /// * `train_loader` - Source of training batches
    /// * `val_loader` - Source of validation batches
    ///
    /// # Returns
    ///
    /// Training metrics
    pub fn train(
        &mut self,
        model: &DCGAN,
        train_loader: &mut dyn BatchSource,
        val_loader: &mut dyn BatchSource,
    ) -> Result<&TrainingMetrics> {
        ensure!(
            self.config.validation_interval > 0 && self.config.save_interval > 0,
            "validation and save intervals must be > 0"
        );

        if let Some(seed) = self.config.seed {
            tch::manual_seed(seed);
        }

        let mut optim = GanOptimizers::new(model, &self.config)?;
        let epochs = self.config.epochs;

        info!(
            "Starting training for {} epochs, {} batches per epoch",
            epochs,
            train_loader.num_batches()
        );

        for epoch in 1..=epochs {
            let losses = self.train_epoch(model, train_loader, &mut optim)?;
            self.metrics.record_epoch(losses);

            info!(
                "[{}/{}] Train - G Loss: {:.6}, D Loss: {:.6}",
                epoch, epochs, losses.gen_loss, losses.disc_loss
            );

            if self.metrics.check_mode_collapse(10) {
                warn!("Possible mode collapse detected! Consider adjusting learning rates.");
            }

            if epoch % self.config.validation_interval == 0 {
                let val = self.validate(model, val_loader)?;
                self.metrics.record_validation(epoch, val);
                info!(
                    "------ Val ------ G Loss: {:.6}, D Loss: {:.6}",
                    val.gen_loss, val.disc_loss
                );

                if let Err(e) = self.graph_samples(model, epoch) {
                    warn!("Failed to generate samples: {}", e);
                }
            }

            if epoch % self.config.save_interval == 0 {
                self.save_generator(model, epoch)?;
            }
        }

        let metrics_path = self.store.dir().join("training_metrics.csv");
        if let Err(e) = std::fs::create_dir_all(self.store.dir())
            .map_err(anyhow::Error::from)
            .and_then(|_| self.metrics.save_csv(&metrics_path.to_string_lossy()))
        {
            warn!("Failed to save metrics: {}", e);
        }

        Ok(&self.metrics)
    }

    /// Get training metrics
    pub fn metrics(&self) -> &TrainingMetrics {
        &self.metrics
    }

    /// Get configuration
    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Get the checkpoint store
    pub fn store(&self) -> &CheckpointStore {
        &self.store
    }
}
