//! Neural Arithmetic Logic Unit.
//!
//! One [`Nac`] shared by two paths:
//!
//! ```text
//! a = x · Wᵗ                          additive / subtractive
//! m = exp(log(|x| + ε) · Wᵗ)          multiplicative / divisive
//! g = sigmoid(x · gᵗ + b)             one gate per input row
//! y = g ⊙ a + (1 - g) ⊙ m
//! ```
//!
//! `W` is computed once per forward pass and reused by both paths. Very large
//! or very small magnitudes can overflow `exp`/`log`; non-finite values are
//! passed through unchanged.

use candle_core::{Device, Result, Tensor, Var};
use candle_nn::{ops, Linear, Module};

use nalu_common::NaluConfig;

use crate::init::Initializer;
use crate::model::ArithmeticModel;
use crate::nac::{forward_with_weight, Nac};

/// Intermediate values of one forward pass.
#[derive(Debug, Clone)]
pub struct NaluParts {
    /// `(…, 1)`, in (0, 1).
    pub gate: Tensor,
    /// `(…, output_size)`.
    pub additive: Tensor,
    /// `(…, output_size)`.
    pub multiplicative: Tensor,
    /// `(…, output_size)`.
    pub output: Tensor,
}

pub struct Nalu {
    nac: Nac,
    gate_weight: Var,
    gate_bias: Var,
    gate: Linear,
    epsilon: f64,
}

impl Nalu {
    /// Fails on zero sizes (see [`Nac::new`]).
    pub fn new(config: &NaluConfig, init: &mut Initializer, device: &Device) -> Result<Self> {
        let nac = Nac::new(
            config.input_size,
            config.output_size,
            config.weight_init,
            init,
            device,
        )?;
        let gate_weight = init.matrix(config.gate_init, 1, config.input_size, device)?;
        let gate_bias = init.vector(config.gate_init, 1, config.input_size, device)?;
        Ok(Self::from_parts(nac, gate_weight, gate_bias, config.epsilon))
    }

    /// Assemble from an existing NAC and gate parameters (`(1, in)` and `(1,)`).
    pub fn from_parts(nac: Nac, gate_weight: Var, gate_bias: Var, epsilon: f64) -> Self {
        let gate = Linear::new(
            gate_weight.as_tensor().clone(),
            Some(gate_bias.as_tensor().clone()),
        );
        Self {
            nac,
            gate_weight,
            gate_bias,
            gate,
            epsilon,
        }
    }

    pub fn nac(&self) -> &Nac {
        &self.nac
    }

    /// `sigmoid(Linear(x))`, shape `(…, 1)`.
    pub fn gate(&self, x: &Tensor) -> Result<Tensor> {
        ops::sigmoid(&self.gate.forward(x)?)
    }

    /// A rank-1 `x` is treated as a single row; every part then drops the
    /// batch dim again, so the gate comes back as `(1,)`.
    pub fn forward_parts(&self, x: &Tensor) -> Result<NaluParts> {
        if x.rank() == 1 {
            let parts = self.forward_parts(&x.unsqueeze(0)?)?;
            return Ok(NaluParts {
                gate: parts.gate.squeeze(0)?,
                additive: parts.additive.squeeze(0)?,
                multiplicative: parts.multiplicative.squeeze(0)?,
                output: parts.output.squeeze(0)?,
            });
        }
        let w = self.nac.effective_weight()?;

        let additive = forward_with_weight(x, &w)?;
        let log_x = x.abs()?.affine(1.0, self.epsilon)?.log()?;
        let multiplicative = forward_with_weight(&log_x, &w)?.exp()?;

        let gate = self.gate(x)?;
        let output = (gate.broadcast_mul(&additive)?
            + gate.affine(-1.0, 1.0)?.broadcast_mul(&multiplicative)?)?;

        Ok(NaluParts {
            gate,
            additive,
            multiplicative,
            output,
        })
    }

    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        Ok(self.forward_parts(x)?.output)
    }

    /// See [`Nac::cache_weight`].
    pub fn cache_weight(&self) -> Result<()> {
        self.nac.cache_weight()
    }

    pub fn clear_cache(&self) {
        self.nac.clear_cache()
    }

    pub fn vars(&self) -> Vec<Var> {
        let mut vars = self.nac.vars();
        vars.push(self.gate_weight.clone());
        vars.push(self.gate_bias.clone());
        vars
    }
}

impl Module for Nalu {
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        self.forward(x)
    }
}

impl ArithmeticModel for Nalu {
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
        format!(
            "NALU {} -> {} (eps {:e})",
            self.nac.input_size(),
            self.nac.output_size(),
            self.epsilon
        )
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use nalu_common::InitScheme;

    fn var(data: &[f32], shape: &[usize]) -> Var {
        Var::from_tensor(&Tensor::from_slice(data, shape, &Device::Cpu).unwrap()).unwrap()
    }

    /// NAC weight ≈ [1, 1], gate weight 0, gate bias `bias`.
    fn adder(bias: f32) -> Nalu {
        let nac = Nac::from_vars(var(&[20.0, 20.0], &[1, 2]), var(&[20.0, 20.0], &[1, 2]));
        Nalu::from_parts(nac, var(&[0.0, 0.0], &[1, 2]), var(&[bias], &[1]), 1e-10)
    }

    fn random_nalu(seed: u64, input: usize, output: usize) -> Nalu {
        let mut init = Initializer::seeded(seed);
        Nalu::new(&NaluConfig::new(input, output), &mut init, &Device::Cpu).unwrap()
    }

    #[test]
    fn output_shape_follows_config() {
        let nalu = random_nalu(0, 3, 4);
        let x = Tensor::ones((5, 3), candle_core::DType::F32, &Device::Cpu).unwrap();
        let parts = nalu.forward_parts(&x).unwrap();
        assert_eq!(parts.output.dims(), &[5, 4]);
        assert_eq!(parts.gate.dims(), &[5, 1]);
    }

    #[test]
    fn gate_is_strictly_between_zero_and_one() {
        let nalu = random_nalu(1, 2, 1);
        let x = Tensor::new(
            &[[0f32, 0.0], [1.0, 2.0], [-3.0, 4.5], [0.001, -0.001], [2.5, 2.5]],
            &Device::Cpu,
        )
        .unwrap();
        for g in nalu.gate(&x).unwrap().flatten_all().unwrap().to_vec1::<f32>().unwrap() {
            assert!(g > 0.0 && g < 1.0, "{g}");
        }
    }

    #[test]
    fn output_is_convex_combination_of_paths() {
        for seed in 0..8 {
            let nalu = random_nalu(seed, 2, 3);
            let x = Tensor::new(&[[1f32, 5.0], [3.0, 2.0], [0.5, 4.0]], &Device::Cpu).unwrap();
            let parts = nalu.forward_parts(&x).unwrap();
            let a = parts.additive.to_vec2::<f32>().unwrap();
            let m = parts.multiplicative.to_vec2::<f32>().unwrap();
            let y = parts.output.to_vec2::<f32>().unwrap();
            for i in 0..3 {
                for j in 0..3 {
                    let lo = a[i][j].min(m[i][j]);
                    let hi = a[i][j].max(m[i][j]);
                    let tol = 1e-4 * (1.0 + hi.abs());
                    assert!(y[i][j] >= lo - tol && y[i][j] <= hi + tol);
                }
            }
        }
    }

    #[test]
    fn multiplicative_path_reuses_nac_weight() {
        let nalu = adder(0.0);
        let x = Tensor::new(&[[4f32, 3.0]], &Device::Cpu).unwrap();
        let parts = nalu.forward_parts(&x).unwrap();
        let a = parts.additive.to_vec2::<f32>().unwrap()[0][0];
        let m = parts.multiplicative.to_vec2::<f32>().unwrap()[0][0];
        assert!((a - 7.0).abs() < 1e-4);
        assert!((m - 12.0).abs() < 1e-3);
        // Gate logit 0 → g = 0.5.
        let y = parts.output.to_vec2::<f32>().unwrap()[0][0];
        assert!((y - 9.5).abs() < 1e-3);
    }

    #[test]
    fn add_mode_extrapolates_to_large_operands() {
        let nalu = adder(20.0);
        let x = Tensor::new(&[[100f32, 10.0]], &Device::Cpu).unwrap();
        let y = nalu.forward(&x).unwrap().to_vec2::<f32>().unwrap()[0][0];
        assert!((y - 110.0).abs() < 1e-2, "{y}");
    }

    #[test]
    fn zero_input_is_floored_by_epsilon() {
        let nalu = adder(-20.0);
        let x = Tensor::new(&[[0f32, 7.0]], &Device::Cpu).unwrap();
        let parts = nalu.forward_parts(&x).unwrap();
        let m = parts.multiplicative.to_vec2::<f32>().unwrap()[0][0];
        assert!(m.is_finite());
        assert!(m.abs() < 1e-6, "{m}");
    }

    #[test]
    fn overflow_propagates_as_non_finite() {
        let nalu = adder(-20.0);
        let x = Tensor::new(&[[1e30f32, 1e30]], &Device::Cpu).unwrap();
        let y = nalu.forward(&x).unwrap().to_vec2::<f32>().unwrap()[0][0];
        assert!(!y.is_finite());
    }

    #[test]
    fn zero_sized_config_is_rejected() {
        let mut init = Initializer::seeded(0);
        assert!(Nalu::new(&NaluConfig::new(0, 1), &mut init, &Device::Cpu).is_err());
        assert!(Nalu::new(&NaluConfig::new(2, 0), &mut init, &Device::Cpu).is_err());
    }

    #[test]
    fn vector_input_matches_single_row_batch() {
        let nalu = random_nalu(4, 2, 3);
        let row = Tensor::new(&[2f32, 5.0], &Device::Cpu).unwrap();
        let parts = nalu.forward_parts(&row).unwrap();
        assert_eq!(parts.gate.dims(), &[1]);
        assert_eq!(parts.output.dims(), &[3]);

        let batch = nalu.forward(&row.unsqueeze(0).unwrap()).unwrap();
        assert_eq!(
            parts.output.to_vec1::<f32>().unwrap(),
            batch.to_vec2::<f32>().unwrap()[0]
        );
    }

    #[test]
    fn scalar_input_is_an_error() {
        let nalu = random_nalu(0, 2, 1);
        assert!(nalu.forward(&Tensor::new(3f32, &Device::Cpu).unwrap()).is_err());
    }

    #[test]
    fn describe_reports_epsilon() {
        assert_eq!(random_nalu(0, 2, 1).describe(), "NALU 2 -> 1 (eps 1e-10)");
    }

    #[test]
    fn same_seed_builds_identical_models() {
        let x = Tensor::new(&[[2f32, 3.0]], &Device::Cpu).unwrap();
        let a = random_nalu(21, 2, 1).forward(&x).unwrap().to_vec2::<f32>().unwrap();
        let b = random_nalu(21, 2, 1).forward(&x).unwrap().to_vec2::<f32>().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn parameter_count_covers_nac_and_gate() {
        let mut init = Initializer::seeded(0);
        let config = NaluConfig {
            weight_init: InitScheme::Zeros,
            ..NaluConfig::new(3, 2)
        };
        let nalu = Nalu::new(&config, &mut init, &Device::Cpu).unwrap();
        // W_hat + M_hat + gate weight + gate bias
        assert_eq!(nalu.parameter_count(), 6 + 6 + 3 + 1);
    }
}
