//! Epoch loop, evaluation and best-checkpoint tracking.

use crate::config::{Dataset, ModelConfig, TrainerConfig};
use crate::core::{ComputeDevice, Error, Result};
use crate::data::{LoadedData, Window, WindowedDataset};
use crate::gnn::{CombinedForecaster, Regressor};
use crate::monitoring::{EpochReport, RunHistory};
use crate::tensor::{Matrix, Parameterized};
use crate::train::checkpoint::CheckpointPaths;
use crate::train::metrics::ForecastMetrics;
use crate::train::optimizer::{Adam, AdamConfig};
use candle_core::{Device, Tensor};
use candle_nn::loss;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Result of one evaluation pass.
#[derive(Clone, Debug)]
pub struct Evaluation {
    /// Mean over windows of `MSE / N`
    pub test_loss: f32,
    pub metrics: ForecastMetrics,
    /// Flattened predictions, window by window, node-major
    pub predictions: Vec<f32>,
    /// Labels aligned with `predictions`
    pub labels: Vec<f32>,
}

/// Outcome of `Trainer::run`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrainingSummary {
    /// Epoch with the strictly smallest test loss
    pub best_epoch: Option<usize>,
    pub best_test_loss: f32,
    /// Metrics recorded at the best epoch
    pub best: ForecastMetrics,
    pub history: RunHistory,
}

/// Owns the model pair and drives training on one dataset.
pub struct Trainer {
    model_config: ModelConfig,
    config: TrainerConfig,
    dataset: Dataset,
    device: Device,
    train: WindowedDataset,
    test: WindowedDataset,
    forecaster: CombinedForecaster,
    regressor: Regressor,
    optimizer: Adam,
    rng: StdRng,
}

impl Trainer {
    pub fn new(
        model_config: ModelConfig,
        config: TrainerConfig,
        dataset: Dataset,
        data: LoadedData,
    ) -> Result<Self> {
        model_config.validate()?;
        config.validate()?;
        let device = config.device.open()?;
        if device.is_cpu() && config.device != ComputeDevice::Cpu {
            warn!(requested = %config.device, "No CUDA backend available, running on CPU");
        }

        let LoadedData {
            mut train,
            mut test,
            adjacency,
        } = data;
        for (name, ds) in [("train", &train), ("test", &test)] {
            if ds.history_days() != model_config.history_len || ds.pred_len() != model_config.pred_len {
                return Err(Error::Config(format!(
                    "{} windows hold {}+{} samples, model expects {}+{}",
                    name,
                    ds.history_days(),
                    ds.pred_len(),
                    model_config.history_len,
                    model_config.pred_len
                )));
            }
            if !ds.is_empty() && ds.num_nodes() != adjacency.num_nodes() {
                return Err(Error::DataFormat(format!(
                    "{} windows cover {} nodes, graph has {}",
                    name,
                    ds.num_nodes(),
                    adjacency.num_nodes()
                )));
            }
        }
        if let Some(limit) = config.window_limit {
            train.truncate(limit);
            test.truncate(limit);
        }

        let mut rng = StdRng::seed_from_u64(config.seed);
        let masks = adjacency.hop_masks(model_config.hop_layers)?;
        let forecaster = CombinedForecaster::new(&model_config, &masks, &mut rng, &device)?;
        let regressor = Regressor::new(model_config.fused_width(), model_config.pred_len, &mut rng, &device)?;
        let mut vars = forecaster.vars();
        vars.extend(regressor.vars());
        let optimizer = Adam::new(vars, &AdamConfig::default())?;

        info!(
            nodes = adjacency.num_nodes(),
            hop_layers = model_config.hop_layers,
            timestamps = model_config.num_timestamps,
            forecaster_params = forecaster.num_parameters(),
            regressor_params = regressor.num_parameters(),
            "Model initialised"
        );

        Ok(Self {
            model_config,
            config,
            dataset,
            device,
            train,
            test,
            forecaster,
            regressor,
            optimizer,
            rng,
        })
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn forecaster(&self) -> &CombinedForecaster {
        &self.forecaster
    }

    pub fn regressor(&self) -> &Regressor {
        &self.regressor
    }

    pub fn optimizer_steps(&self) -> u64 {
        self.optimizer.steps()
    }

    pub fn checkpoint_paths(&self) -> CheckpointPaths {
        CheckpointPaths::new(
            &self.config.results_dir,
            self.dataset,
            self.model_config.horizon_minutes(),
        )
    }

    /// Number of start offsets with `T` consecutive windows.
    fn start_count(&self, ds: &WindowedDataset, phase: &str) -> Result<usize> {
        let t = self.model_config.num_timestamps;
        if ds.len() < t {
            return Err(Error::DataFormat(format!(
                "{} range yields {} windows, fewer than {} timestamps",
                phase,
                ds.len(),
                t
            )));
        }
        Ok(ds.len() + 1 - t)
    }

    fn window_slice(ds: &WindowedDataset, st: usize, t: usize) -> &[Window] {
        &ds.windows()[st..st + t]
    }

    /// Forward, backward and one optimizer step on the windows starting at `st`.
    fn train_step(&mut self, st: usize, epoch: usize, lr: f32) -> Result<f32> {
        let t = self.model_config.num_timestamps;
        let windows = Self::window_slice(&self.train, st, t);
        let labels = windows[t - 1].targets()?.to_tensor(&self.device)?;
        let nodes = labels.dim(0)?;

        let out = self.forecaster.forward(windows)?;

        let all_nodes: Vec<u32> = (0..nodes as u32).collect();
        let mut terms = Vec::new();
        for batch in all_nodes.chunks(self.config.node_batch_size) {
            let ids = Tensor::new(batch, &self.device)?;
            let predicted = self.regressor.forward(&out.embedding.index_select(&ids, 0)?)?;
            let target = labels.index_select(&ids, 0)?;
            let mse = loss::mse(&predicted, &target)?;
            terms.push(mse.affine(1.0 / batch.len() as f64, 0.0)?);
        }
        let total = Tensor::stack(&terms, 0)?.sum_all()?;
        let value = total.to_scalar::<f32>()?;
        if !value.is_finite() {
            return Err(Error::NonFiniteLoss { epoch, window: st });
        }

        let mut grads = total.backward()?;
        self.forecaster.clip_grad_norm(&mut grads, self.config.clip_norm)?;
        self.regressor.clip_grad_norm(&mut grads, self.config.clip_norm)?;
        self.optimizer.step(&grads, lr)?;
        Ok(value)
    }

    /// One pass over every start offset of the test windows.
    pub fn evaluate(&self) -> Result<Evaluation> {
        let t = self.model_config.num_timestamps;
        let starts = self.start_count(&self.test, "test")?;

        let mut test_loss = 0.0f32;
        let mut predictions = Vec::new();
        let mut labels = Vec::new();
        for st in 0..starts {
            let windows = Self::window_slice(&self.test, st, t);
            let target = windows[t - 1].targets()?;

            let out = self.forecaster.forward(windows)?;
            let predicted = Matrix::from_tensor(&self.regressor.forward(&out.embedding)?)?;

            let diff = predicted.sub(&target)?;
            let mse = diff.sum_squares() / diff.len().max(1) as f32;
            test_loss += mse / target.rows().max(1) as f32;

            predictions.extend_from_slice(predicted.data());
            labels.extend_from_slice(target.data());
        }
        test_loss /= starts as f32;

        Ok(Evaluation {
            test_loss,
            metrics: ForecastMetrics::compute(&predictions, &labels),
            predictions,
            labels,
        })
    }

    /// Run every epoch, checkpointing whenever the test loss strictly improves.
    pub fn run(&mut self) -> Result<TrainingSummary> {
        let paths = self.checkpoint_paths();
        let starts = self.start_count(&self.train, "train")?;
        let mut history = RunHistory::new();
        let mut best_test_loss = f32::INFINITY;
        let mut best = ForecastMetrics::default();
        let mut best_epoch = None;

        info!(
            dataset = %self.dataset,
            epochs = self.config.epochs,
            windows_per_epoch = starts,
            "Training started"
        );

        for epoch in 1..=self.config.epochs {
            let lr = self.config.schedule.rate(epoch);
            let mut order: Vec<usize> = (0..starts).collect();
            order.shuffle(&mut self.rng);

            let mut train_loss = 0.0f32;
            for st in order {
                train_loss += self.train_step(st, epoch, lr)?;
            }
            train_loss /= starts as f32;

            let eval = self.evaluate()?;
            let mut report = EpochReport::new(epoch, lr, train_loss, eval.test_loss, eval.metrics);
            if eval.test_loss < best_test_loss {
                best_test_loss = eval.test_loss;
                best = eval.metrics;
                best_epoch = Some(epoch);
                report.improved = true;
                if self.config.save_checkpoints {
                    paths.save(
                        &self.forecaster,
                        &self.regressor,
                        self.dataset,
                        self.model_config.horizon_minutes(),
                    )?;
                }
            }
            report.best = best;

            info!(
                epoch,
                lr,
                train_loss,
                test_loss = eval.test_loss,
                rmse = eval.metrics.rmse,
                mae = eval.metrics.mae,
                mape = eval.metrics.mape,
                min_rmse = best.rmse,
                min_mae = best.mae,
                min_mape = best.mape,
                "Epoch finished"
            );
            debug!("{}", report.to_text());
            history.push(report);
        }

        Ok(TrainingSummary {
            best_epoch,
            best_test_loss,
            best,
            history,
        })
    }

    /// Load the saved pair for this dataset and horizon, then evaluate it.
    pub fn evaluate_checkpoint(&mut self) -> Result<Evaluation> {
        let paths = self.checkpoint_paths();
        paths.load(
            &self.forecaster,
            &self.regressor,
            self.dataset,
            self.model_config.horizon_minutes(),
        )?;
        let eval = self.evaluate()?;
        info!(
            test_loss = eval.test_loss,
            rmse = eval.metrics.rmse,
            mae = eval.metrics.mae,
            mape = eval.metrics.mape,
            "Evaluated saved model"
        );
        Ok(eval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{SensorSeries, WindowConfig};
    use crate::graph::AdjacencyMatrix;
    use crate::train::optimizer::LearningRateSchedule;
    use tempfile::TempDir;

    const DAY: usize = 3;

    fn model_config() -> ModelConfig {
        ModelConfig {
            hop_layers: 2,
            num_timestamps: 2,
            history_len: DAY,
            pred_len: 1,
        }
    }

    /// 3-node path graph, hourly samples, constant readings.
    fn constant_data(value: f32) -> LoadedData {
        let series = SensorSeries::from_sensor_rows(&vec![vec![value; 24 * 8]; 3]).unwrap();
        let window = |start_day, end_day| WindowConfig {
            start_day,
            end_day,
            hourly_samples: 1,
            history_days: DAY,
            pred_len: 1,
        };
        let adjacency = AdjacencyMatrix::from_dense(
            Matrix::from_rows(&[
                vec![0.0, 1.0, 0.0],
                vec![1.0, 0.0, 1.0],
                vec![0.0, 1.0, 0.0],
            ])
            .unwrap(),
        )
        .unwrap();
        LoadedData {
            train: WindowedDataset::build(&series, &window(1, 4)).unwrap(),
            test: WindowedDataset::build(&series, &window(5, 7)).unwrap(),
            adjacency,
        }
    }

    fn trainer_config(seed: u64) -> TrainerConfig {
        TrainerConfig {
            epochs: 4,
            seed,
            schedule: LearningRateSchedule::constant(0.01),
            window_limit: Some(16),
            ..Default::default()
        }
    }

    /// First seed whose untrained output unit is active for some node.
    fn live_trainer(config: impl Fn(u64) -> TrainerConfig) -> Trainer {
        (0..64)
            .map(|seed| {
                Trainer::new(model_config(), config(seed), Dataset::PeMSD7, constant_data(5.0)).unwrap()
            })
            .find(|t| t.evaluate().unwrap().predictions.iter().any(|p| *p > 0.0))
            .expect("no seed with a live output unit")
    }

    #[test]
    fn test_constant_series_is_learned() {
        let mut trainer = live_trainer(|seed| TrainerConfig {
            epochs: 20,
            schedule: LearningRateSchedule::constant(0.005),
            ..trainer_config(seed)
        });
        let before = trainer.evaluate().unwrap().metrics.rmse;
        let summary = trainer.run().unwrap();
        let after = trainer.evaluate().unwrap().metrics.rmse;

        assert!(before > 0.0);
        assert!(after < 0.5 * before, "rmse {} -> {}", before, after);
        assert_eq!(summary.history.len(), 20);
    }

    #[test]
    fn test_saved_checkpoint_matches_best_epoch() {
        let dir = TempDir::new().unwrap();
        let results = dir.path().to_path_buf();
        let make = |seed| TrainerConfig {
            save_checkpoints: true,
            results_dir: results.clone(),
            ..trainer_config(seed)
        };
        let mut trainer = live_trainer(make);
        let summary = trainer.run().unwrap();

        let best = summary.history.best().unwrap();
        assert_eq!(summary.best_epoch, Some(best.epoch));
        assert_eq!(summary.best_test_loss, best.test_loss);
        assert!(trainer.checkpoint_paths().forecaster.exists());
        assert!(trainer.checkpoint_paths().regressor.exists());

        // differently initialised model, same data
        let mut fresh =
            Trainer::new(model_config(), make(999), Dataset::PeMSD7, constant_data(5.0)).unwrap();
        let eval = fresh.evaluate_checkpoint().unwrap();
        assert!(
            (eval.test_loss - summary.best_test_loss).abs() <= 1e-6 * summary.best_test_loss.max(1.0),
            "{} vs {}",
            eval.test_loss,
            summary.best_test_loss
        );
    }

    #[test]
    fn test_one_optimizer_step_per_window() {
        let mut trainer =
            Trainer::new(model_config(), trainer_config(1), Dataset::PeMSD7, constant_data(5.0)).unwrap();
        let summary = trainer.run().unwrap();
        // 16 windows, T = 2 -> 15 start offsets per epoch
        assert_eq!(trainer.optimizer_steps(), 4 * 15);
        assert!(summary.history.reports().iter().all(|r| r.learning_rate == 0.01));
    }

    #[test]
    fn test_default_schedule_recorded_per_epoch() {
        let config = TrainerConfig {
            epochs: 10,
            window_limit: Some(3),
            ..Default::default()
        };
        let mut trainer = Trainer::new(model_config(), config, Dataset::PeMSD7, constant_data(5.0)).unwrap();
        let summary = trainer.run().unwrap();
        let rates: Vec<f32> = summary.history.reports().iter().map(|r| r.learning_rate).collect();
        assert_eq!(rates[0], 0.001);
        assert_eq!(rates[7], 0.001);
        assert_eq!(rates[8], 0.0005);
    }

    #[test]
    fn test_non_finite_loss_is_fatal() {
        let mut trainer =
            Trainer::new(model_config(), trainer_config(0), Dataset::PeMSD7, constant_data(f32::NAN)).unwrap();
        assert!(matches!(
            trainer.run(),
            Err(Error::NonFiniteLoss { epoch: 1, .. })
        ));
    }

    #[cfg(not(feature = "cuda"))]
    #[test]
    fn test_gpu_request_runs_on_cpu() {
        let config = TrainerConfig {
            device: ComputeDevice::Gpu,
            ..trainer_config(0)
        };
        let trainer = Trainer::new(model_config(), config, Dataset::PeMSD7, constant_data(5.0)).unwrap();
        assert!(trainer.device().is_cpu());
        assert!(trainer.evaluate().is_ok());
    }

    #[test]
    fn test_too_few_windows() {
        let config = TrainerConfig {
            window_limit: Some(1),
            ..trainer_config(0)
        };
        let mut trainer = Trainer::new(model_config(), config, Dataset::PeMSD7, constant_data(5.0)).unwrap();
        assert!(matches!(trainer.run(), Err(Error::DataFormat(_))));
    }

    #[test]
    fn test_mismatched_history_rejected() {
        let config = ModelConfig {
            history_len: 4,
            ..model_config()
        };
        let res = Trainer::new(config, trainer_config(0), Dataset::PeMSD7, constant_data(5.0));
        assert!(matches!(res, Err(Error::Config(_))));
    }

    #[test]
    fn test_missing_checkpoint() {
        let dir = TempDir::new().unwrap();
        let config = TrainerConfig {
            results_dir: dir.path().to_path_buf(),
            ..trainer_config(0)
        };
        let mut trainer = Trainer::new(model_config(), config, Dataset::PeMSD7, constant_data(5.0)).unwrap();
        assert!(matches!(
            trainer.evaluate_checkpoint(),
            Err(Error::CheckpointIo(_))
        ));
    }
}
