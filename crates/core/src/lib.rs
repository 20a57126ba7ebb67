//! # nalu-core — Arithmetic Layers
//!
//! Everything needed to build and query a Neural Accumulator or a Neural
//! Arithmetic Logic Unit:
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`init`] | `Initializer`: seeded, host-side parameter sampling |
//! | [`nac`] | `Nac`, `effective_weight`, `forward_with_weight` |
//! | [`nalu`] | `Nalu`, `NaluParts` |
//! | [`inspect`] | `Inspect`, `Inspection`, `ArithmeticMode` |
//! | [`model`] | `ArithmeticModel`, the trainer-facing trait |
//!
//! ## Design principles
//!
//! 1. **Pure Rust hot path.** Everything goes through `candle-core`/`candle-nn`;
//!    gradients come from candle's autograd.
//! 2. **`Send + Sync`-safe.** The inference cache uses `parking_lot::Mutex`.
//! 3. **Reproducible.** Same seed + same config = same parameters.

pub mod init;
pub mod inspect;
pub mod model;
pub mod nac;
pub mod nalu;

// ── Public re-exports ───────────────────────────────────────────────────────

pub use init::Initializer;
pub use inspect::{ArithmeticMode, Inspect, Inspection};
pub use model::ArithmeticModel;
pub use nac::{effective_weight, forward_with_weight, Nac};
pub use nalu::{Nalu, NaluParts};
