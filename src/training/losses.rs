//! Loss functions for GAN training
//!
//! The discriminator objective blends binary cross entropy with two spectral
//! distances between the real and generated batches. The generator objective
//! is the adversarial term alone.

use anyhow::{ensure, Result};
use tch::Tensor;

use crate::model::Discriminator;

/// Weight of the mean absolute spectral difference in the discriminator loss
pub const SPECTRAL_DIFF_WEIGHT: f64 = 0.2;

/// Weight of the spectral convergence in the discriminator loss
pub const SPECTRAL_CONVERGENCE_WEIGHT: f64 = 0.1;

/// Guard against a zero-norm real batch in spectral convergence
pub const SPECTRAL_CONVERGENCE_EPS: f64 = 1e-8;

/// Binary cross entropy between discriminator probabilities and targets
///
/// # Arguments
///
/// * `probs` - Discriminator output, any shape with batch_size elements
/// * `labels` - Targets of shape (batch_size, 1)
pub fn adversarial_loss(probs: &Tensor, labels: &Tensor) -> Result<Tensor> {
    let probs = probs.view([-1, 1]);
    ensure!(
        probs.size()[0] == labels.size()[0],
        "label count {} does not match batch size {}",
        labels.size()[0],
        probs.size()[0]
    );

    Ok(probs.binary_cross_entropy::<Tensor>(labels, None, tch::Reduction::Mean))
}

/// Mean absolute elementwise difference between two batches
pub fn spectral_diff(real: &Tensor, fake: &Tensor) -> Tensor {
    (real - fake).abs().mean(tch::Kind::Float)
}

/// Spectral convergence: ||fake - real||_2 / (||real||_2 + eps)
pub fn spectral_convergence(real: &Tensor, fake: &Tensor) -> Tensor {
    (fake - real).norm() / (real.norm() + SPECTRAL_CONVERGENCE_EPS)
}

/// Generator loss: BCE of D(G(z)) against real labels
///
/// No spectral terms are applied to the generator.
pub fn generator_loss(
    discriminator: &Discriminator,
    fake: &Tensor,
    real_labels: &Tensor,
    train: bool,
) -> Result<Tensor> {
    adversarial_loss(&discriminator.forward_t(fake, train), real_labels)
}

/// Discriminator loss
///
/// `(bce(D(real), real_labels) + bce(D(fake), fake_labels)) / 2
///  + 0.2 * spectral_diff + 0.1 * spectral_convergence`
pub fn discriminator_loss(
    discriminator: &Discriminator,
    real: &Tensor,
    fake: &Tensor,
    real_labels: &Tensor,
    fake_labels: &Tensor,
    train: bool,
) -> Result<Tensor> {
    ensure!(
        real.size()[0] == fake.size()[0],
        "real batch of {} and fake batch of {} differ in size",
        real.size()[0],
        fake.size()[0]
    );

    let real_loss = adversarial_loss(&discriminator.forward_t(real, train), real_labels)?;
    let fake_loss = adversarial_loss(&discriminator.forward_t(fake, train), fake_labels)?;
    let adv_loss = (real_loss + fake_loss) / 2.0;

    let diff = spectral_diff(real, fake) * SPECTRAL_DIFF_WEIGHT;
    let convergence = spectral_convergence(real, fake) * SPECTRAL_CONVERGENCE_WEIGHT;

    Ok(adv_loss + diff + convergence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DiscriminatorConfig;
    use crate::training::LabelBatch;
    use tch::{nn::VarStore, Device, Kind};

    fn small_discriminator(vs: &VarStore) -> Discriminator {
        let config = DiscriminatorConfig {
            canonical_size: 32,
            ..Default::default()
        };
        Discriminator::new(&vs.root(), config)
    }

    #[test]
    fn test_spectral_convergence_of_identical_batches_is_zero() {
        let x = Tensor::randn([3, 1, 8, 9], (Kind::Float, Device::Cpu));
        let sc = spectral_convergence(&x, &x);

        assert_eq!(sc.size(), Vec::<i64>::new());
        assert_eq!(sc.double_value(&[]), 0.0);
    }

    #[test]
    fn test_spectral_convergence_guards_zero_real() {
        let real = Tensor::zeros([2, 1, 4, 4], (Kind::Float, Device::Cpu));
        let fake = Tensor::ones([2, 1, 4, 4], (Kind::Float, Device::Cpu));

        let sc = spectral_convergence(&real, &fake).double_value(&[]);
        assert!(sc.is_finite());
        assert!(sc > 1.0);
    }

    #[test]
    fn test_spectral_diff() {
        let real = Tensor::zeros([2, 1, 4, 4], (Kind::Float, Device::Cpu));
        let fake = Tensor::full([2, 1, 4, 4], -0.5, (Kind::Float, Device::Cpu));

        let diff = spectral_diff(&real, &fake).double_value(&[]);
        assert!((diff - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_discriminator_loss_finite_non_negative() {
        let vs = VarStore::new(Device::Cpu);
        let disc = small_discriminator(&vs);

        let real = Tensor::rand([4, 1, 12, 17], (Kind::Float, Device::Cpu)) * 2.0 - 1.0;
        let fake = Tensor::rand([4, 1, 12, 17], (Kind::Float, Device::Cpu)) * 2.0 - 1.0;
        let real_labels = LabelBatch::AllReal.hard(4, Device::Cpu);
        let fake_labels = LabelBatch::AllFake.hard(4, Device::Cpu);

        let loss = discriminator_loss(&disc, &real, &fake, &real_labels, &fake_labels, true).unwrap();
        let value = loss.double_value(&[]);

        assert_eq!(loss.size(), Vec::<i64>::new());
        assert!(value.is_finite());
        assert!(value >= 0.0);
    }

    #[test]
    fn test_discriminator_loss_adds_spectral_terms() {
        let vs = VarStore::new(Device::Cpu);
        let disc = small_discriminator(&vs);

        let real = Tensor::full([2, 1, 8, 8], 0.5, (Kind::Float, Device::Cpu));
        let fake = Tensor::ones([2, 1, 8, 8], (Kind::Float, Device::Cpu));
        let real_labels = LabelBatch::AllReal.hard(2, Device::Cpu);
        let fake_labels = LabelBatch::AllFake.hard(2, Device::Cpu);

        let total = discriminator_loss(&disc, &real, &fake, &real_labels, &fake_labels, false)
            .unwrap()
            .double_value(&[]);

        let adv = (adversarial_loss(&disc.forward_t(&real, false), &real_labels).unwrap()
            + adversarial_loss(&disc.forward_t(&fake, false), &fake_labels).unwrap())
            / 2.0;
        // |1 - 0.5| = 0.5 everywhere, ||0.5|| / ||0.5|| = 1
        let expected = adv.double_value(&[]) + SPECTRAL_DIFF_WEIGHT * 0.5 + SPECTRAL_CONVERGENCE_WEIGHT * 1.0;

        assert!((total - expected).abs() < 1e-4);
    }

    #[test]
    fn test_mismatched_batches_rejected() {
        let vs = VarStore::new(Device::Cpu);
        let disc = small_discriminator(&vs);

        let real = Tensor::zeros([4, 1, 8, 8], (Kind::Float, Device::Cpu));
        let fake = Tensor::zeros([2, 1, 8, 8], (Kind::Float, Device::Cpu));
        let real_labels = LabelBatch::AllReal.hard(4, Device::Cpu);
        let fake_labels = LabelBatch::AllFake.hard(2, Device::Cpu);

        let result = discriminator_loss(&disc, &real, &fake, &real_labels, &fake_labels, false);
        assert!(result.is_err());
    }

    #[test]
    fn test_generator_loss_positive() {
        let vs = VarStore::new(Device::Cpu);
        let disc = small_discriminator(&vs);

        let fake = Tensor::randn([3, 1, 8, 8], (Kind::Float, Device::Cpu)).tanh();
        let loss = generator_loss(&disc, &fake, &LabelBatch::AllReal.hard(3, Device::Cpu), false).unwrap();

        assert!(loss.double_value(&[]) > 0.0);
    }
}
