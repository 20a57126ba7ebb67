//! # nalu-common — Shared Primitives
//!
//! Types shared across every crate in the workspace:
//!
//! * **[`NaluConfig`]** / **[`TrainConfig`]** / **[`ExperimentConfig`]** — model
//!   shape, initialisation and training knobs (serialised as JSON).
//! * **[`ArithmeticOp`]** — the target function of the synthetic task.
//! * **[`ArithmeticDataset`]** — seeded `(a, b) → a op b` examples.
//! * **[`example_to_tensors`]** / **[`dataset_to_tensors`]** — examples → Candle tensors.

pub mod config;
pub mod data;

pub use config::{ArithmeticOp, ExperimentConfig, InitScheme, NaluConfig, TrainConfig};
pub use data::{dataset_to_tensors, example_to_tensors, ArithmeticDataset, Example};
