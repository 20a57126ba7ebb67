//! Query a trained layer on two operands and report what it has learned.

use std::fmt;

use candle_core::{Result, Tensor};

use crate::nac::Nac;
use crate::nalu::Nalu;

/// Which regime the gate selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticMode {
    AddSub,
    MulDiv,
}

impl ArithmeticMode {
    /// `AddSub` when the gate rounds to 1.
    pub fn from_gate(gate: f32) -> Self {
        if gate.round() == 1.0 {
            Self::AddSub
        } else {
            Self::MulDiv
        }
    }
}

impl fmt::Display for ArithmeticMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AddSub => f.write_str("add/sub"),
            Self::MulDiv => f.write_str("div/mul"),
        }
    }
}

/// Result of querying a layer on `(a, b)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Inspection {
    pub operands: [f32; 2],
    /// Effective NAC weight rounded to integers, one row per output.
    pub weight: Vec<Vec<f32>>,
    /// Gate value for this input (`None` for a bare NAC).
    pub gate: Option<f32>,
    pub mode: ArithmeticMode,
    /// First output of the layer.
    pub prediction: f32,
}

impl fmt::Display for Inspection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "weight:")?;
        for row in &self.weight {
            let cells: Vec<String> = row.iter().map(|v| format!("{v:>3}")).collect();
            writeln!(f, "  [{}]", cells.join(", "))?;
        }
        if let Some(g) = self.gate {
            writeln!(f, "gate: {g:.4}")?;
        }
        write!(f, "mode: {}", self.mode)
    }
}

/// Layers that can be queried on a pair of operands.
pub trait Inspect {
    fn inspect(&self, a: f32, b: f32) -> Result<Inspection>;
}

impl Inspect for Nac {
    fn inspect(&self, a: f32, b: f32) -> Result<Inspection> {
        let x = Tensor::new(&[[a, b]], self.device())?;
        let prediction = first(&self.forward(&x)?)?;
        Ok(Inspection {
            operands: [a, b],
            weight: self.rounded_weight()?,
            gate: None,
            mode: ArithmeticMode::AddSub,
            prediction,
        })
    }
}

impl Inspect for Nalu {
    fn inspect(&self, a: f32, b: f32) -> Result<Inspection> {
        let x = Tensor::new(&[[a, b]], self.nac().device())?;
        let parts = self.forward_parts(&x)?;
        let gate = first(&parts.gate)?;
        let prediction = first(&parts.output)?;
        tracing::debug!(
            a,
            b,
            gate,
            additive = first(&parts.additive)?,
            multiplicative = first(&parts.multiplicative)?,
            "inspect"
        );
        Ok(Inspection {
            operands: [a, b],
            weight: self.nac().rounded_weight()?,
            gate: Some(gate),
            mode: ArithmeticMode::from_gate(gate),
            prediction,
        })
    }
}

fn first(t: &Tensor) -> Result<f32> {
    t.flatten_all()?.get(0)?.to_scalar::<f32>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{Device, Var};

    fn var(data: &[f32], shape: &[usize]) -> Var {
        Var::from_tensor(&Tensor::from_slice(data, shape, &Device::Cpu).unwrap()).unwrap()
    }

    fn nalu_with_gate_bias(bias: f32) -> Nalu {
        let nac = Nac::from_vars(var(&[20.0, 20.0], &[1, 2]), var(&[20.0, 20.0], &[1, 2]));
        Nalu::from_parts(nac, var(&[0.0, 0.0], &[1, 2]), var(&[bias], &[1]), 1e-10)
    }

    #[test]
    fn mode_follows_rounded_gate() {
        assert_eq!(ArithmeticMode::from_gate(0.97), ArithmeticMode::AddSub);
        assert_eq!(ArithmeticMode::from_gate(0.51), ArithmeticMode::AddSub);
        assert_eq!(ArithmeticMode::from_gate(0.49), ArithmeticMode::MulDiv);
        assert_eq!(ArithmeticMode::from_gate(0.02), ArithmeticMode::MulDiv);
        assert_eq!(ArithmeticMode::AddSub.to_string(), "add/sub");
        assert_eq!(ArithmeticMode::MulDiv.to_string(), "div/mul");
    }

    #[test]
    fn inspect_reports_add_mode() {
        let report = nalu_with_gate_bias(20.0).inspect(100.0, 10.0).unwrap();
        assert_eq!(report.weight, vec![vec![1.0, 1.0]]);
        assert_eq!(report.mode, ArithmeticMode::AddSub);
        assert!((report.prediction - 110.0).abs() < 1e-2);
        let text = report.to_string();
        assert!(text.contains("mode: add/sub"));
        assert!(text.contains("[  1,   1]"));
    }

    #[test]
    fn inspect_reports_mul_mode() {
        let report = nalu_with_gate_bias(-20.0).inspect(4.0, 5.0).unwrap();
        assert_eq!(report.mode, ArithmeticMode::MulDiv);
        assert!((report.prediction - 20.0).abs() < 1e-2);
    }

    #[test]
    fn bare_nac_is_always_add_mode() {
        let nac = Nac::from_vars(var(&[20.0, -20.0], &[1, 2]), var(&[20.0, 20.0], &[1, 2]));
        let report = nac.inspect(9.0, 4.0).unwrap();
        assert_eq!(report.gate, None);
        assert_eq!(report.weight, vec![vec![1.0, -1.0]]);
        assert_eq!(report.mode, ArithmeticMode::AddSub);
        assert!((report.prediction - 5.0).abs() < 1e-4);
    }
}
