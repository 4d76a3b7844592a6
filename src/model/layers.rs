//! Layer building blocks shared by the Generator and Discriminator
//!
//! Every network is an ordered list of transform units, each a `ModuleT`,
//! applied one after another by `LayerStack`.

use tch::{nn, nn::Module, nn::ModuleT, Kind, Tensor};

/// Ordered stack of transform units
#[derive(Debug, Default)]
pub struct LayerStack {
    layers: Vec<Box<dyn ModuleT>>,
}

impl LayerStack {
    /// Create an empty stack
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a unit to the end of the stack
    pub fn push<M: ModuleT + 'static>(mut self, layer: M) -> Self {
        self.layers.push(Box::new(layer));
        self
    }

    /// Number of units in the stack
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Run the stack and keep every intermediate activation
    ///
    /// The last element is the final output of the stack.
    pub fn forward_all_t(&self, xs: &Tensor, train: bool) -> Vec<Tensor> {
        let mut activations: Vec<Tensor> = Vec::with_capacity(self.layers.len());
        for layer in &self.layers {
            let next = match activations.last() {
                Some(prev) => layer.forward_t(prev, train),
                None => layer.forward_t(xs, train),
            };
            activations.push(next);
        }
        activations
    }
}

impl ModuleT for LayerStack {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
        match self.layers.split_first() {
            Some((first, rest)) => rest
                .iter()
                .fold(first.forward_t(xs, train), |acc, layer| layer.forward_t(&acc, train)),
            None => xs.shallow_clone(),
        }
    }
}

/// Pointwise nonlinearities
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Activation {
    Relu,
    /// Leaky ReLU with the given negative slope
    LeakyRelu(f64),
    Tanh,
    Sigmoid,
}

impl Module for Activation {
    fn forward(&self, xs: &Tensor) -> Tensor {
        match *self {
            Activation::Relu => xs.relu(),
            // Valid for slopes below 1
            Activation::LeakyRelu(slope) => xs.maximum(&(xs * slope)),
            Activation::Tanh => xs.tanh(),
            Activation::Sigmoid => xs.sigmoid(),
        }
    }
}

/// Bilinear resize of the two trailing spatial dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resize {
    pub height: i64,
    pub width: i64,
}

impl Resize {
    pub fn new(height: i64, width: i64) -> Self {
        Self { height, width }
    }
}

impl Module for Resize {
    fn forward(&self, xs: &Tensor) -> Tensor {
        xs.upsample_bilinear2d([self.height, self.width], false, None::<f64>, None::<f64>)
    }
}

/// Flatten everything but the batch dimension
#[derive(Debug, Clone, Copy, Default)]
pub struct Flatten;

impl Module for Flatten {
    fn forward(&self, xs: &Tensor) -> Tensor {
        xs.flatten(1, -1)
    }
}

const SPECTRAL_NORM_EPS: f64 = 1e-12;

fn l2_normalize(t: &Tensor) -> Tensor {
    t / (t.norm() + SPECTRAL_NORM_EPS)
}

/// 2D convolution whose weight is divided by its largest singular value
///
/// The singular vectors `u` and `v` are non-trainable buffers refined by one
/// power iteration on every training-mode forward pass. In eval mode the
/// stored estimate is used unchanged.
#[derive(Debug)]
pub struct SpectralNormConv2d {
    weight: Tensor,
    bias: Tensor,
    u: Tensor,
    v: Tensor,
    stride: i64,
    padding: i64,
}

/// Create a spectrally normalized convolution
pub fn spectral_norm_conv2d<'a, T: std::borrow::Borrow<nn::Path<'a>>>(
    vs: T,
    in_dim: i64,
    out_dim: i64,
    ksize: i64,
    stride: i64,
    padding: i64,
) -> SpectralNormConv2d {
    let vs = vs.borrow();
    let device = vs.device();

    let weight = vs.var(
        "weight",
        &[out_dim, in_dim, ksize, ksize],
        nn::Init::Randn { mean: 0.0, stdev: 0.02 },
    );
    let bias = vs.zeros("bias", &[out_dim]);

    let u = vs.zeros_no_train("u", &[out_dim]);
    let v = vs.zeros_no_train("v", &[in_dim * ksize * ksize]);
    tch::no_grad(|| {
        let mut u_init = u.shallow_clone();
        u_init.copy_(&l2_normalize(&Tensor::randn([out_dim], (Kind::Float, device))));
        let mut v_init = v.shallow_clone();
        v_init.copy_(&l2_normalize(&Tensor::randn(
            [in_dim * ksize * ksize],
            (Kind::Float, device),
        )));
    });

    SpectralNormConv2d {
        weight,
        bias,
        u,
        v,
        stride,
        padding,
    }
}

impl SpectralNormConv2d {
    /// Current estimate of the largest singular value of the weight
    pub fn sigma(&self) -> Tensor {
        let w_mat = self.weight.view([self.weight.size()[0], -1]);
        self.u.dot(&w_mat.mv(&self.v))
    }

    fn power_iteration(&self, w_mat: &Tensor) {
        tch::no_grad(|| {
            let w = w_mat.detach();
            let v = l2_normalize(&w.transpose(0, 1).mv(&self.u));
            let u = l2_normalize(&w.mv(&v));
            let mut v_buf = self.v.shallow_clone();
            v_buf.copy_(&v);
            let mut u_buf = self.u.shallow_clone();
            u_buf.copy_(&u);
        });
    }
}

impl ModuleT for SpectralNormConv2d {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
        let w_mat = self.weight.view([self.weight.size()[0], -1]);
        if train {
            self.power_iteration(&w_mat);
        }

        // Copies keep the autograd graph valid when the buffers are updated
        // again before backward runs.
        let u = self.u.copy();
        let v = self.v.copy();
        let sigma = u.dot(&w_mat.mv(&v));
        let weight = &self.weight / sigma;

        xs.conv2d(
            &weight,
            Some(&self.bias),
            [self.stride, self.stride],
            [self.padding, self.padding],
            [1, 1],
            1,
        )
    }
}

/// Self-attention over all spatial positions with a learned scalar gate
///
/// Output is `gamma * attention(x) + x`; `gamma` starts at zero so the block
/// is an identity until training moves it.
#[derive(Debug)]
pub struct SelfAttention {
    query: nn::Conv2D,
    key: nn::Conv2D,
    value: nn::Conv2D,
    gamma: Tensor,
}

/// Create a self-attention block for feature maps with `channels` channels
pub fn self_attention<'a, T: std::borrow::Borrow<nn::Path<'a>>>(
    vs: T,
    channels: i64,
) -> SelfAttention {
    let vs = vs.borrow();
    let inner = (channels / 8).max(1);

    SelfAttention {
        query: nn::conv2d(vs / "query", channels, inner, 1, Default::default()),
        key: nn::conv2d(vs / "key", channels, inner, 1, Default::default()),
        value: nn::conv2d(vs / "value", channels, channels, 1, Default::default()),
        gamma: vs.zeros("gamma", &[1]),
    }
}

impl SelfAttention {
    /// Current value of the blending gate
    pub fn gamma(&self) -> f64 {
        self.gamma.double_value(&[0])
    }
}

impl Module for SelfAttention {
    fn forward(&self, xs: &Tensor) -> Tensor {
        let size = xs.size();
        let (batch, channels, height, width) = (size[0], size[1], size[2], size[3]);
        let positions = height * width;

        // (batch, positions, inner) x (batch, inner, positions)
        let query = self.query.forward(xs).view([batch, -1, positions]).permute([0, 2, 1]);
        let key = self.key.forward(xs).view([batch, -1, positions]);
        let attention = query.bmm(&key).softmax(-1, Kind::Float);

        let value = self.value.forward(xs).view([batch, -1, positions]);
        let attended = value
            .bmm(&attention.permute([0, 2, 1]))
            .view([batch, channels, height, width]);

        &self.gamma * attended + xs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::{nn::VarStore, Device};

    #[test]
    fn test_layer_stack_collects_activations() {
        let stack = LayerStack::new()
            .push(Activation::Relu)
            .push(Flatten)
            .push(Activation::Tanh);

        let input = Tensor::randn([2, 3, 4, 4], (Kind::Float, Device::Cpu));
        let all = stack.forward_all_t(&input, false);

        assert_eq!(all.len(), 3);
        assert_eq!(all[0].size(), vec![2, 3, 4, 4]);
        assert_eq!(all[1].size(), vec![2, 48]);

        let output = stack.forward_t(&input, false);
        let diff = (&output - &all[2]).abs().max().double_value(&[]);
        assert!(diff < 1e-6);
    }

    #[test]
    fn test_leaky_relu_slope() {
        let input = Tensor::from_slice(&[-1.0f32, 2.0]);
        let output = Activation::LeakyRelu(0.2).forward(&input);

        assert!((output.double_value(&[0]) + 0.2).abs() < 1e-6);
        assert!((output.double_value(&[1]) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_resize_shape() {
        let input = Tensor::randn([2, 1, 3, 5], (Kind::Float, Device::Cpu));
        let output = Resize::new(16, 9).forward(&input);
        assert_eq!(output.size(), vec![2, 1, 16, 9]);
    }

    #[test]
    fn test_spectral_norm_bounds_sigma() {
        let vs = VarStore::new(Device::Cpu);
        let conv = spectral_norm_conv2d(vs.root() / "sn", 3, 8, 4, 2, 1);

        let input = Tensor::randn([2, 3, 16, 16], (Kind::Float, Device::Cpu));
        for _ in 0..20 {
            let _ = conv.forward_t(&input, true);
        }

        let output = conv.forward_t(&input, false);
        assert_eq!(output.size(), vec![2, 8, 8, 8]);

        // Converged estimate matches a long power iteration on the raw weight
        let w_mat = conv.weight.view([8, -1]).detach();
        let mut v = Tensor::ones([w_mat.size()[1]], (Kind::Float, Device::Cpu));
        for _ in 0..200 {
            v = l2_normalize(&w_mat.transpose(0, 1).mv(&w_mat.mv(&v)));
        }
        let true_sigma = w_mat.mv(&v).norm().double_value(&[]);
        let sigma = conv.sigma().double_value(&[]);
        assert!((sigma - true_sigma).abs() / true_sigma < 0.05);
    }

    #[test]
    fn test_self_attention_starts_as_identity() {
        let vs = VarStore::new(Device::Cpu);
        let attn = self_attention(vs.root() / "attn", 16);

        let input = Tensor::randn([2, 16, 4, 4], (Kind::Float, Device::Cpu));
        let output = attn.forward(&input);

        assert_eq!(output.size(), input.size());
        assert_eq!(attn.gamma(), 0.0);
        let diff = (&output - &input).abs().max().double_value(&[]);
        assert!(diff < 1e-6);
    }
}
