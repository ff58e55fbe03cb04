//! REN - Contractive Recurrent Equilibrium Networks
//! Command-line interface for building, inspecting, simulating and training models

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use colored::*;
use ren_core::{ContractiveRen, RenConfig, SequenceBatch};
use ren_sysid::{SysIdDataset, Trainer, TrainerConfig};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "ren")]
#[command(version = "2026.1.16")]
#[command(about = "Contractive recurrent equilibrium networks", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a model from a TOML configuration and save its checkpoint
    Init {
        /// Model configuration (ren.toml)
        #[arg(short, long, value_name = "CONFIG")]
        config: PathBuf,

        /// Checkpoint to write (.json)
        #[arg(short, long, value_name = "OUTPUT")]
        output: PathBuf,

        /// Overrides the seed in the configuration
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Print dimensions, parameter shapes and certificate diagnostics
    Inspect {
        /// Checkpoint (.json)
        #[arg(short, long, value_name = "MODEL")]
        model: PathBuf,
    },

    /// Run a model over a JSON batch of input sequences [[[f64; m]; T]; B]
    Simulate {
        /// Checkpoint (.json)
        #[arg(short, long, value_name = "MODEL")]
        model: PathBuf,

        /// Input sequences (.json)
        #[arg(short, long, value_name = "INPUT")]
        input: PathBuf,

        /// Output sequences (.json), stdout when absent
        #[arg(short, long, value_name = "OUTPUT")]
        output: Option<PathBuf>,
    },

    /// Fit a model to an identification dataset
    Train {
        /// Checkpoint to start from (.json)
        #[arg(short, long, value_name = "MODEL")]
        model: PathBuf,

        /// Dataset with "inputs" and "outputs" (.json)
        #[arg(short, long, value_name = "DATA")]
        data: PathBuf,

        /// Trained checkpoint to write (.json)
        #[arg(short, long, value_name = "OUTPUT")]
        output: PathBuf,

        #[arg(long, default_value_t = 50)]
        epochs: usize,

        #[arg(long, default_value_t = 8)]
        batch_size: usize,

        #[arg(long, default_value_t = 1e-2)]
        lr: f64,

        /// Seed for the train/validation/test split and batch shuffling
        #[arg(long, default_value_t = 0)]
        seed: u64,

        /// Finite-difference step
        #[arg(long, default_value_t = 1e-6)]
        fd_step: f64,

        /// Clip gradients to this global norm
        #[arg(long)]
        max_grad_norm: Option<f64>,
    },
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ren_core=warn,ren_sysid=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init {
            config,
            output,
            seed,
        } => init_command(&config, &output, seed),

        Commands::Inspect { model } => inspect_command(&model),

        Commands::Simulate {
            model,
            input,
            output,
        } => simulate_command(&model, &input, output.as_deref()),

        Commands::Train {
            model,
            data,
            output,
            epochs,
            batch_size,
            lr,
            seed,
            fd_step,
            max_grad_norm,
        } => {
            let config = TrainerConfig {
                epochs,
                batch_size,
                learning_rate: lr,
                seed,
                fd_step,
                max_grad_norm,
            };
            train_command(&model, &data, &output, config)
        }
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}

// ============================================================================
// Commands
// ============================================================================

fn init_command(config_path: &Path, output: &Path, seed: Option<u64>) -> Result<()> {
    let mut config = RenConfig::from_file(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    if let Some(seed) = seed {
        config = config.with_seed(seed);
    }

    let model = ContractiveRen::new(config)?;
    model.derive().context("initial parameters do not yield a usable model")?;
    model.save(output)?;

    println!(
        "{} {} ({} parameters)",
        "Created".green().bold(),
        output.display().to_string().cyan(),
        model.parameters().num_parameters()
    );
    Ok(())
}

fn inspect_command(model_path: &Path) -> Result<()> {
    let model = ContractiveRen::load(model_path)
        .with_context(|| format!("loading {}", model_path.display()))?;
    let config = model.config();
    let dims = model.dimensions();

    println!("{}", "Model".bold());
    println!(
        "  dimensions      m={} p={} n={} l={}",
        dims.input, dims.output, dims.internal, dims.nonlinear
    );
    println!("  ε               {}", config.pos_def_tol);
    println!("  ρ               {}", config.contraction_rate_lb);
    println!("  alignment       {:?}", config.output_alignment);
    println!("  x_init          {:?}", model.x_init().as_slice());
    println!("  y_init          {:?}", model.y_init().as_slice());

    println!("{}", "Parameters".bold());
    for (name, (rows, cols)) in model.parameter_shapes() {
        println!("  {:<6} {:>4} × {:<4}", name.cyan(), rows, cols);
    }
    println!("  total  {}", model.parameters().num_parameters());

    println!("{}", "Certificate".bold());
    match model.derive() {
        Ok(derived) => {
            let report = derived.report();
            println!("  min eig(H)      {:.6e}", report.min_eigenvalue_h);
            println!("  min Λ           {:.6e}", report.min_lambda);
            println!("  κ(E)            {:.6e}", report.condition_e);
            println!("  ‖E⁻¹E − I‖      {:.3e}", report.inverse_residual);
        }
        Err(e) => println!("  {} {}", "unusable:".red().bold(), e),
    }
    Ok(())
}

fn simulate_command(model_path: &Path, input: &Path, output: Option<&Path>) -> Result<()> {
    let mut model = ContractiveRen::load(model_path)
        .with_context(|| format!("loading {}", model_path.display()))?;
    let content =
        fs::read_to_string(input).with_context(|| format!("reading {}", input.display()))?;
    let inputs: SequenceBatch = serde_json::from_str(&content)
        .with_context(|| format!("parsing {}", input.display()))?;

    let outputs = model.run(&inputs)?;
    let json = serde_json::to_string_pretty(&outputs)?;

    match output {
        Some(path) => {
            fs::write(path, json)?;
            let (batch, horizon, dim) = outputs.shape();
            println!(
                "{} {} ({} × {} × {})",
                "Wrote".green().bold(),
                path.display().to_string().cyan(),
                batch,
                horizon,
                dim
            );
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn train_command(
    model_path: &Path,
    data_path: &Path,
    output: &Path,
    config: TrainerConfig,
) -> Result<()> {
    let mut model = ContractiveRen::load(model_path)
        .with_context(|| format!("loading {}", model_path.display()))?;
    let data = SysIdDataset::load(data_path)
        .with_context(|| format!("loading {}", data_path.display()))?;

    let split = data.split(config.seed)?;
    if split.train.is_empty() {
        bail!("dataset has {} signals, too few to train on", data.len());
    }
    println!(
        "{} {} train / {} validation / {} test signals",
        "Training".green().bold(),
        split.train.len(),
        split.validation.len(),
        split.test.len()
    );

    let mut trainer = Trainer::new(config)?;
    let history = trainer.fit(&mut model, &split.train, Some(&split.validation))?;

    println!("{:>6}  {:>14}  {:>14}", "epoch".bold(), "train".bold(), "validation".bold());
    for (epoch, train_loss) in history.train_losses.iter().enumerate() {
        let val = history
            .val_losses
            .get(epoch)
            .map_or_else(|| "-".to_string(), |v| format!("{:.6e}", v));
        println!("{:>6}  {:>14.6e}  {:>14}", epoch + 1, train_loss, val);
    }

    if !split.test.is_empty() {
        let test_loss = trainer.evaluate(&mut model, &split.test)?;
        println!("{} {:.6e}", "Test loss".bold(), test_loss);
    }

    model.save(output)?;
    println!("{} {}", "Saved".green().bold(), output.display().to_string().cyan());
    Ok(())
}
