//! Synthetic arithmetic data: `(a, b) → a op b`.
//!
//! Operands are integers drawn uniformly from a half-open range. Examples are
//! kept in generation order; the training loop walks them front to back.

use anyhow::Result as AnyhowResult;
use candle_core::{Device, Result, Tensor};
use rand::rngs::StdRng;
use rand::Rng;

use crate::config::{ArithmeticOp, TrainConfig};

/// One training pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Example {
    pub input: [f32; 2],
    pub target: f32,
}

impl Example {
    pub fn new(op: ArithmeticOp, a: f32, b: f32) -> Self {
        Self {
            input: [a, b],
            target: op.apply(a, b),
        }
    }
}

/// A fixed list of examples for one arithmetic operation.
#[derive(Debug, Clone)]
pub struct ArithmeticDataset {
    op: ArithmeticOp,
    examples: Vec<Example>,
}

impl ArithmeticDataset {
    /// Draw `count` examples with operands in `[lo, hi)`.
    pub fn generate(
        op: ArithmeticOp,
        count: usize,
        lo: i64,
        hi: i64,
        rng: &mut StdRng,
    ) -> AnyhowResult<Self> {
        anyhow::ensure!(lo < hi, "empty operand range [{lo}, {hi})");
        let examples = (0..count)
            .map(|_| {
                let a = rng.gen_range(lo..hi) as f32;
                let b = rng.gen_range(lo..hi) as f32;
                Example::new(op, a, b)
            })
            .collect();
        Ok(Self { op, examples })
    }

    /// Training set described by a [`TrainConfig`].
    pub fn from_config(config: &TrainConfig, rng: &mut StdRng) -> AnyhowResult<Self> {
        Self::generate(
            config.op,
            config.num_examples,
            config.operand_min,
            config.operand_max,
            rng,
        )
    }

    /// Build from explicit examples (targets are taken as given).
    pub fn from_examples(op: ArithmeticOp, examples: Vec<Example>) -> Self {
        Self { op, examples }
    }

    pub fn op(&self) -> ArithmeticOp {
        self.op
    }

    pub fn examples(&self) -> &[Example] {
        &self.examples
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Example> + '_ {
        self.examples.iter()
    }
}

// ── Helpers ─────────────────────────────────────────────────────────────────

/// One example as `(input (1, 2), target (1, 1))`.
pub fn example_to_tensors(example: &Example, device: &Device) -> Result<(Tensor, Tensor)> {
    let input = Tensor::from_slice(&example.input[..], (1, 2), device)?;
    let target = Tensor::from_slice(&[example.target][..], (1, 1), device)?;
    Ok((input, target))
}

/// Whole dataset as `(inputs (n, 2), targets (n, 1))`.
pub fn dataset_to_tensors(dataset: &ArithmeticDataset, device: &Device) -> Result<(Tensor, Tensor)> {
    let n = dataset.len();
    let inputs: Vec<f32> = dataset.iter().flat_map(|e| e.input).collect();
    let targets: Vec<f32> = dataset.iter().map(|e| e.target).collect();
    let inputs = Tensor::from_vec(inputs, (n, 2), device)?;
    let targets = Tensor::from_vec(targets, (n, 1), device)?;
    Ok((inputs, targets))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn generated_operands_stay_in_range() {
        let mut rng = StdRng::seed_from_u64(0);
        let ds = ArithmeticDataset::generate(ArithmeticOp::Add, 500, 1, 6, &mut rng).unwrap();
        assert_eq!(ds.len(), 500);
        for e in ds.iter() {
            for v in e.input {
                assert!((1.0..6.0).contains(&v));
                assert_eq!(v.fract(), 0.0);
            }
            assert_eq!(e.target, e.input[0] + e.input[1]);
        }
    }

    #[test]
    fn same_seed_same_examples() {
        let a = ArithmeticDataset::generate(ArithmeticOp::Mul, 50, 1, 6, &mut StdRng::seed_from_u64(9))
            .unwrap();
        let b = ArithmeticDataset::generate(ArithmeticOp::Mul, 50, 1, 6, &mut StdRng::seed_from_u64(9))
            .unwrap();
        assert_eq!(a.examples(), b.examples());
    }

    #[test]
    fn empty_range_is_an_error() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(ArithmeticDataset::generate(ArithmeticOp::Add, 10, 6, 6, &mut rng).is_err());
    }

    #[test]
    fn tensors_have_expected_shapes() {
        let ds = ArithmeticDataset::from_examples(
            ArithmeticOp::Sub,
            vec![
                Example::new(ArithmeticOp::Sub, 5.0, 2.0),
                Example::new(ArithmeticOp::Sub, 1.0, 4.0),
            ],
        );
        let dev = Device::Cpu;
        let (x, y) = dataset_to_tensors(&ds, &dev).unwrap();
        assert_eq!(x.dims(), &[2, 2]);
        assert_eq!(y.to_vec2::<f32>().unwrap(), vec![vec![3.0], vec![-3.0]]);

        let (x1, y1) = example_to_tensors(&ds.examples()[0], &dev).unwrap();
        assert_eq!(x1.to_vec2::<f32>().unwrap(), vec![vec![5.0, 2.0]]);
        assert_eq!(y1.dims(), &[1, 1]);
    }
}
