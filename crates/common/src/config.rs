//! Model and training configuration for NAC / NALU.
//!
//! Serialised as JSON. Every field has a default so a minimal `{}` JSON
//! produces the two-input, one-output addition experiment.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use anyhow::Context;
use serde::{Deserialize, Serialize};

// ── Initialisation scheme ───────────────────────────────────────────────────

/// How a `(fan_out, fan_in)` parameter matrix is sampled at construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InitScheme {
    /// `N(0, gain / fan_in)`. With `gain = 2` this is the fan-in-aware scheme
    /// the NAC needs to converge quickly.
    FanInNormal { gain: f64 },
    /// `U(-1/√fan_in, 1/√fan_in)`, the usual dense-layer default.
    FanInUniform,
    /// All zeros.
    Zeros,
}

impl Default for InitScheme {
    fn default() -> Self {
        Self::FanInNormal { gain: 2.0 }
    }
}

// ── Arithmetic operation ────────────────────────────────────────────────────

/// Target function of the synthetic task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArithmeticOp {
    #[default]
    Add,
    Sub,
    Mul,
    Div,
}

impl ArithmeticOp {
    pub fn apply(self, a: f32, b: f32) -> f32 {
        match self {
            Self::Add => a + b,
            Self::Sub => a - b,
            Self::Mul => a * b,
            Self::Div => a / b,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
        }
    }
}

impl FromStr for ArithmeticOp {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add" => Ok(Self::Add),
            "sub" => Ok(Self::Sub),
            "mul" => Ok(Self::Mul),
            "div" => Ok(Self::Div),
            other => anyhow::bail!("unknown arithmetic op {other:?} (expected add|sub|mul|div)"),
        }
    }
}

impl fmt::Display for ArithmeticOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mul => "mul",
            Self::Div => "div",
        };
        f.write_str(name)
    }
}

// ── Model config ────────────────────────────────────────────────────────────

/// Shape and initialisation of a NAC / NALU.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NaluConfig {
    #[serde(default = "default_input_size")]
    pub input_size: usize,
    #[serde(default = "default_output_size")]
    pub output_size: usize,
    /// Floor added to `|x|` before the log in the multiplicative path.
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
    /// Scheme for the NAC's `W_hat` and `M_hat`.
    #[serde(default)]
    pub weight_init: InitScheme,
    /// Scheme for the gate projection (weight and bias).
    #[serde(default = "default_gate_init")]
    pub gate_init: InitScheme,
}

fn default_input_size() -> usize {
    2
}
fn default_output_size() -> usize {
    1
}
fn default_epsilon() -> f64 {
    1e-10
}
fn default_gate_init() -> InitScheme {
    InitScheme::FanInUniform
}

impl Default for NaluConfig {
    fn default() -> Self {
        Self {
            input_size: default_input_size(),
            output_size: default_output_size(),
            epsilon: default_epsilon(),
            weight_init: InitScheme::default(),
            gate_init: default_gate_init(),
        }
    }
}

impl NaluConfig {
    pub fn new(input_size: usize, output_size: usize) -> Self {
        Self {
            input_size,
            output_size,
            ..Default::default()
        }
    }

    /// Reject shapes a layer cannot be built from.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.input_size > 0, "input_size must be positive");
        anyhow::ensure!(self.output_size > 0, "output_size must be positive");
        Ok(())
    }
}

// ── Training config ─────────────────────────────────────────────────────────

/// Training-loop knobs. Plain SGD at a fixed learning rate, no schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    #[serde(default = "default_epochs")]
    pub epochs: usize,
    #[serde(default = "default_lr")]
    pub lr: f64,
    #[serde(default = "default_num_examples")]
    pub num_examples: usize,
    /// Operands are drawn from `[operand_min, operand_max)`.
    #[serde(default = "default_operand_min")]
    pub operand_min: i64,
    #[serde(default = "default_operand_max")]
    pub operand_max: i64,
    #[serde(default)]
    pub op: ArithmeticOp,
    /// Seed for initialisation and data generation (`None` = from entropy).
    #[serde(default)]
    pub seed: Option<u64>,
    /// Log a step line every N steps (0 = off).
    #[serde(default)]
    pub log_every: usize,
    /// Compute the gradient norm every N steps (0 = off).
    #[serde(default)]
    pub debug_every: usize,
}

fn default_epochs() -> usize {
    30
}
fn default_lr() -> f64 {
    0.03
}
fn default_num_examples() -> usize {
    500
}
fn default_operand_min() -> i64 {
    1
}
fn default_operand_max() -> i64 {
    6
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            epochs: default_epochs(),
            lr: default_lr(),
            num_examples: default_num_examples(),
            operand_min: default_operand_min(),
            operand_max: default_operand_max(),
            op: ArithmeticOp::default(),
            seed: None,
            log_every: 0,
            debug_every: 0,
        }
    }
}

// ── Experiment file ─────────────────────────────────────────────────────────

/// Everything one experiment needs, stored as a single JSON file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    #[serde(default)]
    pub model: NaluConfig,
    #[serde(default)]
    pub train: TrainConfig,
}

impl ExperimentConfig {
    /// Save config to a JSON file.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }

    /// Load config from a JSON file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let json =
            std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let config: Self = serde_json::from_str(&json)
            .with_context(|| format!("parse {}", path.display()))?;
        config.model.validate()?;
        Ok(config)
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
