//! Seeded parameter initialisation.
//!
//! Candle's built-in `Init` draws from its own device RNG, which cannot be
//! replayed from a user seed on every backend. Parameters here are sampled on
//! the host from a [`StdRng`] and then uploaded, so two [`Initializer`]s built
//! from the same seed produce identical models.

use candle_core::{Device, Result, Tensor, Var};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, StandardNormal};

use nalu_common::InitScheme;

/// Host-side RNG that materialises [`InitScheme`]s into trainable [`Var`]s.
pub struct Initializer {
    rng: StdRng,
}

impl Initializer {
    /// Reproducible initialiser.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Non-reproducible initialiser seeded from the OS.
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// `seeded` when a seed is given, `from_entropy` otherwise.
    pub fn new(seed: Option<u64>) -> Self {
        match seed {
            Some(s) => Self::seeded(s),
            None => Self::from_entropy(),
        }
    }

    /// Draw `len` values for a parameter whose fan-in is `fan_in`.
    pub fn sample(&mut self, scheme: InitScheme, len: usize, fan_in: usize) -> Vec<f32> {
        let fan_in = fan_in.max(1) as f64;
        match scheme {
            InitScheme::FanInNormal { gain } => {
                let std = (gain / fan_in).sqrt();
                (0..len)
                    .map(|_| {
                        let z: f64 = StandardNormal.sample(&mut self.rng);
                        (z * std) as f32
                    })
                    .collect()
            }
            InitScheme::FanInUniform => {
                let bound = 1.0 / fan_in.sqrt();
                (0..len)
                    .map(|_| self.rng.gen_range(-bound..bound) as f32)
                    .collect()
            }
            InitScheme::Zeros => vec![0.0; len],
        }
    }

    /// A `(rows, cols)` matrix variable; fan-in is `cols`.
    pub fn matrix(
        &mut self,
        scheme: InitScheme,
        rows: usize,
        cols: usize,
        device: &Device,
    ) -> Result<Var> {
        let data = self.sample(scheme, rows * cols, cols);
        Var::from_tensor(&Tensor::from_vec(data, (rows, cols), device)?)
    }

    /// A `(len,)` vector variable with the given fan-in (used for biases).
    pub fn vector(
        &mut self,
        scheme: InitScheme,
        len: usize,
        fan_in: usize,
        device: &Device,
    ) -> Result<Var> {
        let data = self.sample(scheme, len, fan_in);
        Var::from_tensor(&Tensor::from_vec(data, len, device)?)
    }

    /// Access to the underlying RNG, e.g. to generate data from the same seed.
    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }
}
