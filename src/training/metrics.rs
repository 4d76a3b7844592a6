//! Training metrics for monitoring GAN progress
//!
//! Provides structures for tracking and logging training progress.

/// Mean losses over one pass of a data loader
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EpochLosses {
    /// Mean generator loss
    pub gen_loss: f64,
    /// Mean discriminator loss
    pub disc_loss: f64,
    /// Number of batches the means were taken over
    pub num_batches: usize,
}

impl EpochLosses {
    /// Means from accumulated totals over `num_batches` batches
    pub fn from_totals(total_gen: f64, total_disc: f64, num_batches: usize) -> anyhow::Result<Self> {
        anyhow::ensure!(num_batches > 0, "data loader yielded no batches");
        Ok(Self {
            gen_loss: total_gen / num_batches as f64,
            disc_loss: total_disc / num_batches as f64,
            num_batches,
        })
    }
}

/// Running loss totals over one pass of a data loader
#[derive(Debug, Clone, Default)]
pub struct EpochAccumulator {
    total_gen: f64,
    total_disc: f64,
    num_batches: usize,
}

impl EpochAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the losses of one batch
    pub fn push(&mut self, gen_loss: f64, disc_loss: f64) {
        self.total_gen += gen_loss;
        self.total_disc += disc_loss;
        self.num_batches += 1;
    }

    /// Number of batches seen so far
    pub fn num_batches(&self) -> usize {
        self.num_batches
    }

    /// Mean losses; an empty pass is an error
    pub fn finish(&self) -> anyhow::Result<EpochLosses> {
        EpochLosses::from_totals(self.total_gen, self.total_disc, self.num_batches)
    }
}

/// Validation result for one epoch
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidationRecord {
    /// 1-based epoch the validation ran after
    pub epoch: usize,
    /// Mean losses over the validation loader
    pub losses: EpochLosses,
}

/// Metrics collected during training
#[derive(Debug, Clone, Default)]
pub struct TrainingMetrics {
    /// Generator losses per epoch
    pub gen_losses: Vec<f64>,
    /// Discriminator losses per epoch
    pub disc_losses: Vec<f64>,
    /// Periodic validation results
    pub validations: Vec<ValidationRecord>,
}

impl TrainingMetrics {
    /// Create new empty metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record epoch training means
    pub fn record_epoch(&mut self, losses: EpochLosses) {
        self.gen_losses.push(losses.gen_loss);
        self.disc_losses.push(losses.disc_loss);
    }

    /// Record a validation pass
    pub fn record_validation(&mut self, epoch: usize, losses: EpochLosses) {
        self.validations.push(ValidationRecord { epoch, losses });
    }

    /// Get number of recorded epochs
    pub fn num_epochs(&self) -> usize {
        self.gen_losses.len()
    }

    /// Get latest generator loss
    pub fn latest_gen_loss(&self) -> Option<f64> {
        self.gen_losses.last().copied()
    }

    /// Get latest discriminator loss
    pub fn latest_disc_loss(&self) -> Option<f64> {
        self.disc_losses.last().copied()
    }

    /// Get latest validation result
    pub fn latest_validation(&self) -> Option<&ValidationRecord> {
        self.validations.last()
    }

    /// Calculate moving average of generator loss
    pub fn gen_loss_ma(&self, window: usize) -> f64 {
        moving_average(&self.gen_losses, window)
    }

    /// Calculate moving average of discriminator loss
    pub fn disc_loss_ma(&self, window: usize) -> f64 {
        moving_average(&self.disc_losses, window)
    }

    /// Check if training appears to have collapsed
    ///
    /// Mode collapse indicators:
    /// - Discriminator loss very low (can easily distinguish)
    /// - Generator loss very high (can't fool discriminator)
    pub fn check_mode_collapse(&self, window: usize) -> bool {
        if self.num_epochs() < window {
            return false;
        }

        let disc_ma = self.disc_loss_ma(window);
        let gen_ma = self.gen_loss_ma(window);

        // Heuristic thresholds for mode collapse detection
        disc_ma < 0.1 && gen_ma > 5.0
    }

    /// Save metrics to CSV file
    ///
    /// Validation columns are empty for epochs without a validation pass.
    pub fn save_csv(&self, path: &str) -> anyhow::Result<()> {
        let mut writer = csv::Writer::from_path(path)?;

        writer.write_record(["epoch", "gen_loss", "disc_loss", "val_gen_loss", "val_disc_loss"])?;

        for i in 0..self.num_epochs() {
            let epoch = i + 1;
            let (val_gen, val_disc) = match self.validations.iter().find(|v| v.epoch == epoch) {
                Some(v) => (v.losses.gen_loss.to_string(), v.losses.disc_loss.to_string()),
                None => (String::new(), String::new()),
            };

            writer.write_record([
                epoch.to_string(),
                self.gen_losses[i].to_string(),
                self.disc_losses[i].to_string(),
                val_gen,
                val_disc,
            ])?;
        }

        writer.flush()?;
        Ok(())
    }
}

/// Calculate moving average of last `window` values
fn moving_average(values: &[f64], window: usize) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    let n = window.min(values.len()).max(1);
    let sum: f64 = values.iter().rev().take(n).sum();
    sum / n as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn losses(gen_loss: f64, disc_loss: f64) -> EpochLosses {
        EpochLosses {
            gen_loss,
            disc_loss,
            num_batches: 1,
        }
    }

    #[test]
    fn test_training_metrics() {
        let mut metrics = TrainingMetrics::new();

        metrics.record_epoch(losses(1.5, 0.8));
        metrics.record_epoch(losses(1.3, 0.75));
        metrics.record_validation(2, losses(1.4, 0.7));

        assert_eq!(metrics.num_epochs(), 2);
        assert_eq!(metrics.latest_gen_loss(), Some(1.3));
        assert_eq!(metrics.latest_validation().map(|v| v.epoch), Some(2));
    }

    #[test]
    fn test_accumulator_means() {
        let mut acc = EpochAccumulator::new();
        let batches = [(0.7, 1.3), (0.9, 1.1), (1.4, 0.2)];
        for (g, d) in batches {
            acc.push(g, d);
        }

        let means = acc.finish().unwrap();
        assert_eq!(means.num_batches, 3);
        assert_eq!(means.gen_loss, (0.7 + 0.9 + 1.4) / 3.0);
        assert_eq!(means.disc_loss, (1.3 + 1.1 + 0.2) / 3.0);
    }

    #[test]
    fn test_empty_accumulator_is_error() {
        assert!(EpochAccumulator::new().finish().is_err());
    }

    #[test]
    fn test_moving_average() {
        let mut metrics = TrainingMetrics::new();
        for (g, d) in [(1.0, 3.0), (2.0, 2.0), (3.0, 1.0)] {
            metrics.record_epoch(losses(g, d));
        }

        assert_eq!(metrics.gen_loss_ma(2), 2.5);
        assert_eq!(metrics.disc_loss_ma(10), 2.0);
    }

    #[test]
    fn test_mode_collapse_detection() {
        let mut metrics = TrainingMetrics::new();
        for _ in 0..3 {
            metrics.record_epoch(losses(8.0, 0.01));
        }

        assert!(!metrics.check_mode_collapse(5));
        assert!(metrics.check_mode_collapse(3));
    }

    #[test]
    fn test_save_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.csv");

        let mut metrics = TrainingMetrics::new();
        metrics.record_epoch(losses(1.0, 0.5));
        metrics.record_epoch(losses(0.9, 0.6));
        metrics.record_validation(2, losses(1.1, 0.4));
        metrics.save_csv(path.to_str().unwrap()).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "1,1,0.5,,");
        assert_eq!(lines[2], "2,0.9,0.6,1.1,0.4");
    }
}
