//! Command-line entry point: train a forecaster or evaluate a saved one.

use clap::Parser;
use sstgnn::config::{Dataset, ExperimentConfig, ModelConfig, TrainerConfig};
use sstgnn::core::ComputeDevice;
use sstgnn::data::DataLoader;
use sstgnn::monitoring::{init_logging, LogLevel, LoggerConfig};
use sstgnn::train::Trainer;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

/// Traffic forecasting GNN with historical and current branches.
#[derive(Parser, Debug)]
#[command(name = "sstgnn")]
#[command(about = "Train or evaluate the SST-GNN traffic speed forecaster")]
struct Args {
    /// Dataset name: PeMSD7, PeMSD8 or PeMSD4.
    #[arg(long, default_value = "PeMSD7")]
    dataset: String,

    /// Number of hop bands aggregated per spatial layer.
    #[arg(long, default_value = "3")]
    gnn_layers: usize,

    /// Number of fused timestamps.
    #[arg(long, default_value = "12")]
    num_timestamps: usize,

    /// Forecast horizon in 5-minute steps.
    #[arg(long, default_value = "9")]
    pred_len: usize,

    #[arg(long, default_value = "200")]
    epochs: usize,

    #[arg(long, default_value = "42")]
    seed: u64,

    /// Request a CUDA device (needs the `cuda` feature, else runs on CPU).
    #[arg(long)]
    cuda: bool,

    /// Evaluate the saved checkpoint instead of training.
    #[arg(long)]
    trained_model: bool,

    /// Write a checkpoint whenever the test loss improves.
    #[arg(long)]
    save_model: bool,

    /// Historical days per window; also the embedding width.
    #[arg(long, default_value = "8")]
    input_size: usize,

    /// Embedding width; must equal --input-size.
    #[arg(long, default_value = "8")]
    out_size: usize,

    /// Experiment file with `file_path.<dataset>_content` / `_cites`.
    #[arg(long, default_value = "experiments.json")]
    config: PathBuf,

    /// Checkpoint root.
    #[arg(long, default_value = "results")]
    results_dir: PathBuf,

    /// Cap windows per pass (quick debugging runs).
    #[arg(long)]
    window_limit: Option<usize>,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn run(args: Args) -> sstgnn::Result<()> {
    let dataset: Dataset = args.dataset.parse()?;
    let model = ModelConfig {
        hop_layers: args.gnn_layers,
        num_timestamps: args.num_timestamps,
        history_len: args.input_size,
        pred_len: args.pred_len,
    };
    model.validate()?;
    model.check_widths(args.input_size, args.out_size)?;

    let device = if args.cuda {
        ComputeDevice::Gpu
    } else {
        ComputeDevice::Cpu
    };
    let trainer_config = TrainerConfig {
        epochs: args.epochs,
        seed: args.seed,
        save_checkpoints: args.save_model,
        results_dir: args.results_dir,
        window_limit: args.window_limit,
        device,
        ..Default::default()
    };

    let experiment = ExperimentConfig::from_file(&args.config)?;
    let data = DataLoader::new(dataset, &model).load(&experiment)?;
    let mut trainer = Trainer::new(model, trainer_config, dataset, data)?;

    if args.trained_model {
        info!("Running trained model");
        let eval = trainer.evaluate_checkpoint()?;
        println!("Average test loss: {}", eval.test_loss);
        println!("RMSE: {}", eval.metrics.rmse);
        println!("MAE: {}", eval.metrics.mae);
        println!("MAPE: {}", eval.metrics.mape);
    } else {
        let summary = trainer.run()?;
        if let Some(last) = summary.history.last() {
            println!("{}", last.to_text());
        }
        match summary.best_epoch {
            Some(epoch) => println!(
                "Best epoch {}: test loss {} | min RMSE {} MAE {} MAPE {}",
                epoch, summary.best_test_loss, summary.best.rmse, summary.best.mae, summary.best.mape
            ),
            None => println!("No epoch produced a finite test loss"),
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&LoggerConfig {
        level: LogLevel::from_verbosity(args.verbose),
        ..Default::default()
    });

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(category = %e.category(), "{}", e);
            eprintln!("error [{}]: {}", e.category(), e);
            ExitCode::from(1)
        }
    }
}
