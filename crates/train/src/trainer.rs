//! Trainer: encapsulates the training loop.
//!
//! Per example: forward, mean-squared error, backward, one SGD step. Epochs
//! walk the dataset in list order. Non-finite losses are not detected; they
//! propagate into the parameters like any other value.

use candle_core::{backprop::GradStore, Device, Tensor, Var};
use candle_nn::{loss, Optimizer, SGD};

use nalu_common::{dataset_to_tensors, example_to_tensors, ArithmeticDataset, Example, TrainConfig};
use nalu_core::ArithmeticModel;

/// Metrics returned after each optimiser step.
#[derive(Debug, Clone)]
pub struct StepMetrics {
    pub step: usize,
    pub loss: f32,
    pub grad_norm: Option<f64>,
}

/// Metrics returned after each pass over the dataset.
#[derive(Debug, Clone)]
pub struct EpochMetrics {
    pub epoch: usize,
    /// Sum of per-example losses.
    pub total_loss: f64,
    /// `total_loss / examples`.
    pub mean_loss: f64,
}

// ── Trainer ─────────────────────────────────────────────────────────────────

/// The training engine. Owns the model and its optimiser.
pub struct Trainer<M: ArithmeticModel> {
    pub model: M,
    vars: Vec<Var>,
    optimizer: SGD,
    pub config: TrainConfig,
    pub global_step: usize,
    pub epoch: usize,
    device: Device,
}

impl<M: ArithmeticModel> Trainer<M> {
    pub fn new(model: M, config: TrainConfig, device: Device) -> anyhow::Result<Self> {
        model.clear_cache();
        let vars = model.vars();
        tracing::info!(
            model = %model.describe(),
            params = model.parameter_count(),
            lr = config.lr,
            op = %config.op,
            "Trainer ready"
        );
        let optimizer = SGD::new(vars.clone(), config.lr)?;
        Ok(Self {
            model,
            vars,
            optimizer,
            config,
            global_step: 0,
            epoch: 0,
            device,
        })
    }

    /// Forward + MSE for one example, without touching the parameters.
    fn loss(&self, example: &Example) -> candle_core::Result<Tensor> {
        let (input, target) = example_to_tensors(example, &self.device)?;
        let prediction = self.model.forward(&input)?;
        loss::mse(&prediction, &target)
    }

    /// One SGD step on a single example.
    pub fn step(&mut self, example: &Example) -> anyhow::Result<StepMetrics> {
        let loss = self.loss(example)?;
        let loss_val = loss.to_scalar::<f32>()?;

        let grads = loss.backward()?;

        let grad_norm =
            if self.config.debug_every > 0 && self.global_step % self.config.debug_every == 0 {
                let norm = grad_norm(&grads, &self.vars)?;
                tracing::debug!(step = self.global_step, grad_norm = norm, "gradient");
                Some(norm)
            } else {
                None
            };

        self.optimizer.step(&grads)?;

        if self.config.log_every > 0 && self.global_step % self.config.log_every == 0 {
            tracing::info!(step = self.global_step, loss = loss_val, "step");
        }

        self.global_step += 1;
        Ok(StepMetrics {
            step: self.global_step - 1,
            loss: loss_val,
            grad_norm,
        })
    }

    /// One pass over `dataset` in list order.
    pub fn train_epoch(&mut self, dataset: &ArithmeticDataset) -> anyhow::Result<EpochMetrics> {
        let mut total_loss = 0.0f64;
        for example in dataset.iter() {
            total_loss += self.step(example)?.loss as f64;
        }
        let metrics = EpochMetrics {
            epoch: self.epoch,
            total_loss,
            mean_loss: total_loss / dataset.len().max(1) as f64,
        };
        tracing::info!(
            epoch = metrics.epoch,
            loss = metrics.total_loss,
            mean_loss = metrics.mean_loss,
            "epoch"
        );
        self.epoch += 1;
        Ok(metrics)
    }

    /// Run `config.epochs` epochs, calling `on_epoch` after each.
    pub fn fit(
        &mut self,
        dataset: &ArithmeticDataset,
        mut on_epoch: impl FnMut(&EpochMetrics),
    ) -> anyhow::Result<Vec<EpochMetrics>> {
        anyhow::ensure!(!dataset.is_empty(), "training set is empty");
        let mut history = Vec::with_capacity(self.config.epochs);
        for _ in 0..self.config.epochs {
            let metrics = self.train_epoch(dataset)?;
            on_epoch(&metrics);
            history.push(metrics);
        }
        Ok(history)
    }

    /// Mean MSE over `dataset` in one batched forward pass. No parameter
    /// update, no graph kept.
    pub fn evaluate(&self, dataset: &ArithmeticDataset) -> anyhow::Result<f64> {
        if dataset.is_empty() {
            return Ok(f64::MAX);
        }
        let (inputs, targets) = dataset_to_tensors(dataset, &self.device)?;
        let prediction = self.model.forward(&inputs)?.detach();
        let mse = loss::mse(&prediction, &targets)?.to_scalar::<f32>()?;
        Ok(mse as f64)
    }


}

// ── Gradient utilities ──────────────────────────────────────────────────────

/// Total L2 norm of gradients.
fn grad_norm(grads: &GradStore, vars: &[Var]) -> anyhow::Result<f64> {
    let mut total = 0.0f64;
    for var in vars {
        if let Some(g) = grads.get(var.as_tensor()) {
            total += g.sqr()?.sum_all()?.to_scalar::<f32>()? as f64;
        }
    }
    Ok(total.sqrt())
}

// ── Tests ───────────────────────────────────────────────────────────────────
