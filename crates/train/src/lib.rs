//! # nalu-train — Training Loop
//!
//! * **[`Trainer`]** — owns a model and a plain SGD optimiser. One call to
//!   [`Trainer::step`] runs forward, MSE, backward and the parameter update
//!   for a single example; [`Trainer::fit`] runs whole epochs.

pub mod trainer;

pub use trainer::{EpochMetrics, StepMetrics, Trainer};
