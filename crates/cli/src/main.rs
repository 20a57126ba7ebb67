use std::path::PathBuf;

use anyhow::{Context, Result};
use candle_core::Device;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use nalu_common::{ArithmeticDataset, ArithmeticOp, ExperimentConfig};
use nalu_core::{ArithmeticModel, Initializer, Inspect, Nac, Nalu};
use nalu_train::Trainer;

#[derive(Parser, Debug)]
#[command(name = "nalu", about = "Train a NAC / NALU on synthetic arithmetic")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train in-process, then query the learned function.
    Train(TrainArgs),
    /// Write the default experiment config as JSON.
    InitConfig(InitConfigArgs),
}

// ── Train ──────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
struct TrainArgs {
    /// Experiment JSON; flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, default_value = "nalu", value_parser = ["nalu", "nac"])]
    model: String,
    #[arg(long, value_parser = ["add", "sub", "mul", "div"])]
    op: Option<String>,
    #[arg(long)]
    epochs: Option<usize>,
    #[arg(long)]
    lr: Option<f64>,
    #[arg(long)]
    num_examples: Option<usize>,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    log_every: Option<usize>,
    #[arg(long)]
    debug_every: Option<usize>,
    /// Operand pairs to query after training, e.g. `--query 100,10`.
    #[arg(long, default_values = ["100,10"], value_parser = parse_query)]
    query: Vec<(f32, f32)>,
    /// Size of a held-out extrapolation set (0 = skip).
    #[arg(long, default_value = "0")]
    eval_examples: usize,
    /// Extrapolation operands are drawn from `[1, eval_max)`.
    #[arg(long, default_value = "101")]
    eval_max: i64,
}

// ── InitConfig ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
struct InitConfigArgs {
    #[arg(long, default_value = "nalu.json")]
    output: PathBuf,
}

// ── Main ───────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Train(args) => cmd_train(args),
        Command::InitConfig(args) => cmd_init_config(args),
    }
}

fn cmd_init_config(args: InitConfigArgs) -> Result<()> {
    ExperimentConfig::default().save(&args.output)?;
    eprintln!("Wrote default config to {}", args.output.display());
    Ok(())
}

fn cmd_train(args: TrainArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => ExperimentConfig::load(path)?,
        None => ExperimentConfig::default(),
    };
    apply_overrides(&mut config, &args)?;
    config.model.validate()?;

    let device = Device::cuda_if_available(0)?;
    let mut init = Initializer::new(config.train.seed);

    match args.model.as_str() {
        "nac" => {
            let model = Nac::new(
                config.model.input_size,
                config.model.output_size,
                config.model.weight_init,
                &mut init,
                &device,
            )?;
            run(model, &config, &mut init, device, &args)
        }
        _ => {
            let model = Nalu::new(&config.model, &mut init, &device)?;
            run(model, &config, &mut init, device, &args)
        }
    }
}

fn apply_overrides(config: &mut ExperimentConfig, args: &TrainArgs) -> Result<()> {
    let train = &mut config.train;
    if let Some(op) = &args.op {
        train.op = op.parse::<ArithmeticOp>()?;
    }
    if let Some(epochs) = args.epochs {
        train.epochs = epochs;
    }
    if let Some(lr) = args.lr {
        train.lr = lr;
    }
    if let Some(n) = args.num_examples {
        train.num_examples = n;
    }
    if args.seed.is_some() {
        train.seed = args.seed;
    }
    if let Some(n) = args.log_every {
        train.log_every = n;
    }
    if let Some(n) = args.debug_every {
        train.debug_every = n;
    }
    Ok(())
}

/// `"A,B"` → `(A, B)`; whitespace around either operand is ignored.
fn parse_query(s: &str) -> Result<(f32, f32)> {
    let (a, b) = s
        .split_once(',')
        .with_context(|| format!("query {s:?} is not of the form A,B"))?;
    let a = a.trim().parse::<f32>().with_context(|| format!("bad operand in {s:?}"))?;
    let b = b.trim().parse::<f32>().with_context(|| format!("bad operand in {s:?}"))?;
    Ok((a, b))
}

fn run<M: ArithmeticModel + Inspect>(
    model: M,
    config: &ExperimentConfig,
    init: &mut Initializer,
    device: Device,
    args: &TrainArgs,
) -> Result<()> {
    let dataset = ArithmeticDataset::from_config(&config.train, init.rng())?;
    let op = dataset.op();
    eprintln!(
        "Training {} on {} examples of a {} b, operands in [{}, {})",
        model.describe(),
        dataset.len(),
        op.symbol(),
        config.train.operand_min,
        config.train.operand_max
    );

    let mut trainer = Trainer::new(model, config.train.clone(), device)?;

    let pb = ProgressBar::new(config.train.epochs as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} epochs {msg}")?
            .progress_chars("=>-"),
    );
    trainer.fit(&dataset, |m| {
        pb.set_message(format!("loss {:.4}", m.total_loss));
        pb.inc(1);
    })?;
    pb.finish();

    if args.eval_examples > 0 {
        let held_out =
            ArithmeticDataset::generate(op, args.eval_examples, 1, args.eval_max, init.rng())?;
        let mse = trainer.evaluate(&held_out)?;
        eprintln!("Extrapolation MSE on [1, {}): {mse:.4}", args.eval_max);
    }

    trainer.model.cache_weight()?;
    for &(a, b) in &args.query {
        let report = trainer.model.inspect(a, b)?;
        println!("{report}");
        println!(
            "{a} {} {b} = {:.4} (expected {:.4})\n",
            op.symbol(),
            report.prediction,
            op.apply(a, b)
        );
    }
    Ok(())
}
