//! The seam between layers and the training loop.

use candle_core::{Result, Var};
use candle_nn::Module;

/// A trainable arithmetic layer: anything the trainer can run forward and
/// hand to an optimiser.
pub trait ArithmeticModel: Module {
    /// Every trainable parameter, in a stable order.
    fn vars(&self) -> Vec<Var>;

    /// Freeze derived weights for inference (see [`crate::Nac::cache_weight`]).
    fn cache_weight(&self) -> Result<()>;

    /// Drop inference caches so gradients reach the latent parameters again.
    fn clear_cache(&self);

    /// Short human-readable summary for logs.
    fn describe(&self) -> String;

    fn parameter_count(&self) -> usize {
        self.vars().iter().map(|v| v.as_tensor().elem_count()).sum()
    }
}
