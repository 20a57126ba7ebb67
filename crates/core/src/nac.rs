//! Neural Accumulator: a bias-free linear layer whose weights are pushed
//! toward {-1, 0, +1}.
//!
//! The effective weight is `W = tanh(W_hat) ⊙ sigmoid(M_hat)`. `tanh` bounds
//! each entry to (-1, 1) and `sigmoid` gates it by a factor in (0, 1); their
//! product saturates at exactly -1, 0 or +1, so the layer learns to add and
//! subtract selected inputs.
//!
//! # Thread safety
//!
//! The inference cache uses [`parking_lot::Mutex`], making the layer
//! `Send + Sync`.

use parking_lot::Mutex;

use candle_core::{Device, Result, Tensor, Var};
use candle_nn::{ops, Module};

use nalu_common::InitScheme;

use crate::init::Initializer;
use crate::model::ArithmeticModel;

/// Bias-free accumulator with a constrained weight matrix.
pub struct Nac {
    w_hat: Var,
    m_hat: Var,
    /// Inference cache: the effective weight, set via [`Nac::cache_weight`].
    cache: Mutex<Option<Tensor>>,
}

impl Nac {
    /// Both latent matrices are `(output_size, input_size)` and drawn
    /// independently from `scheme`.
    pub fn new(
        input_size: usize,
        output_size: usize,
        scheme: InitScheme,
        init: &mut Initializer,
        device: &Device,
    ) -> Result<Self> {
        if input_size == 0 || output_size == 0 {
            candle_core::bail!("NAC needs positive sizes, got {input_size} -> {output_size}");
        }
        let w_hat = init.matrix(scheme, output_size, input_size, device)?;
        let m_hat = init.matrix(scheme, output_size, input_size, device)?;
        Ok(Self::from_vars(w_hat, m_hat))
    }

    /// Build from explicit latent parameters.
    pub fn from_vars(w_hat: Var, m_hat: Var) -> Self {
        Self {
            w_hat,
            m_hat,
            cache: Mutex::new(None),
        }
    }

    pub fn input_size(&self) -> usize {
        self.w_hat.as_tensor().dims()[1]
    }

    pub fn output_size(&self) -> usize {
        self.w_hat.as_tensor().dims()[0]
    }

    pub fn device(&self) -> &Device {
        self.w_hat.as_tensor().device()
    }

    /// `tanh(W_hat) ⊙ sigmoid(M_hat)`, shape `(output_size, input_size)`.
    ///
    /// Returns the cached weight when one is set.
    pub fn effective_weight(&self) -> Result<Tensor> {
        if let Some(w) = self.cache.lock().as_ref() {
            return Ok(w.clone());
        }
        effective_weight(self.w_hat.as_tensor(), self.m_hat.as_tensor())
    }

    /// Effective weight rounded to the nearest integer, one `Vec` per output.
    pub fn rounded_weight(&self) -> Result<Vec<Vec<f32>>> {
        self.effective_weight()?.round()?.to_vec2::<f32>()
    }

    /// Pre-compute the effective weight for inference. Gradients no longer
    /// reach the latent parameters until [`Nac::clear_cache`] is called.
    pub fn cache_weight(&self) -> Result<()> {
        let w = effective_weight(self.w_hat.as_tensor(), self.m_hat.as_tensor())?.detach();
        self.cache.lock().replace(w);
        Ok(())
    }

    /// Clear inference cache (call before training resumes).
    pub fn clear_cache(&self) {
        self.cache.lock().take();
    }

    /// `x · Wᵗ` for any `(…, input_size)` input.
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let w = self.effective_weight()?;
        forward_with_weight(x, &w)
    }

    pub fn vars(&self) -> Vec<Var> {
        vec![self.w_hat.clone(), self.m_hat.clone()]
    }
}

impl Module for Nac {
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        self.forward(x)
    }
}

impl ArithmeticModel for Nac {
    fn vars(&self) -> Vec<Var> {
        self.vars()
    }

    fn cache_weight(&self) -> Result<()> {
        self.cache_weight()
    }

    fn clear_cache(&self) {
        self.clear_cache()
    }

    fn describe(&self) -> String {
        format!("NAC {} -> {}", self.input_size(), self.output_size())
    }
}

// ── Tensor helpers ──────────────────────────────────────────────────────────

/// `tanh(w_hat) ⊙ sigmoid(m_hat)`.
pub fn effective_weight(w_hat: &Tensor, m_hat: &Tensor) -> Result<Tensor> {
    w_hat.tanh()? * ops::sigmoid(m_hat)?
}

/// Bias-free linear transform `x · wᵗ`.
///
/// `w` is `(out, in)`. Leading dims of `x` are flattened to 2-D for the
/// matmul and restored afterwards. A scalar `x` is an error.
pub fn forward_with_weight(x: &Tensor, w: &Tensor) -> Result<Tensor> {
    let w_t = w.t()?;
    let dims = x.dims();
    if dims.len() == 2 {
        return x.matmul(&w_t);
    }
    let (&last, lead) = dims
        .split_last()
        .ok_or_else(|| candle_core::Error::Msg("NAC input must have rank >= 1".into()))?;
    let prod: usize = lead.iter().product();
    let y = x.reshape((prod, last))?.matmul(&w_t)?;
    let mut out_shape = lead.to_vec();
    out_shape.push(w.dim(0)?);
    y.reshape(out_shape.as_slice())
}

// ── Tests ───────────────────────────────────────────────────────────────────
