//! Two-branch spatio-temporal forecaster.
//!
//! Each of the `T` timestamps of a window sequence gets its own pair of
//! multi-hop models: the historical branch reads the first `day - 1` readings
//! of a window, the current branch reads the last one. Per-timestamp
//! embeddings are folded into a running latent through a weight whose used
//! width grows with the number of timestamps seen, and the full history of
//! both branches is projected once more into the fused embedding.

use crate::config::ModelConfig;
use crate::core::{Error, Result};
use crate::data::Window;
use crate::gnn::multihop::{GnnInput, MultiHopGnn, NormalizedMasks};
use crate::graph::HopMasks;
use crate::tensor::{Parameter, Parameterized};
use candle_core::{DType, Device, Tensor};
use rand::Rng;

/// Tensors produced by one forecaster pass.
#[derive(Clone, Debug)]
pub struct ForecasterOutput {
    /// `N x T·day` concatenation of every branch embedding
    pub concatenated: Tensor,
    /// `N x T·day` fused embedding after the final projection
    pub embedding: Tensor,
}

/// The combined historical/current forecaster.
#[derive(Debug)]
pub struct CombinedForecaster {
    config: ModelConfig,
    device: Device,
    masks: NormalizedMasks,
    his_models: Vec<MultiHopGnn>,
    cur_models: Vec<MultiHopGnn>,
    his_fusion: Parameter,
    cur_fusion: Parameter,
    final_weight: Parameter,
}

impl CombinedForecaster {
    pub fn new<R: Rng + ?Sized>(
        config: &ModelConfig,
        hop_masks: &HopMasks,
        rng: &mut R,
        device: &Device,
    ) -> Result<Self> {
        config.validate()?;
        if hop_masks.len() != config.hop_layers {
            return Err(Error::Config(format!(
                "{} hop masks given for {} hop layers",
                hop_masks.len(),
                config.hop_layers
            )));
        }

        let masks = NormalizedMasks::new(hop_masks, device)?;
        let t = config.num_timestamps;
        let his_width = config.history_len - 1;

        let mut his_models = Vec::with_capacity(t);
        let mut cur_models = Vec::with_capacity(t);
        for ts in 0..t {
            his_models.push(MultiHopGnn::new(
                &format!("his.{}", ts),
                masks.clone(),
                his_width,
                rng,
                device,
            )?);
            cur_models.push(MultiHopGnn::new(&format!("cur.{}", ts), masks.clone(), 1, rng, device)?);
        }

        let fused = config.fused_width();
        Ok(Self {
            config: config.clone(),
            device: device.clone(),
            masks,
            his_models,
            cur_models,
            his_fusion: Parameter::xavier("fusion.his", his_width, t * his_width, rng, device)?,
            cur_fusion: Parameter::xavier("fusion.cur", 1, t, rng, device)?,
            final_weight: Parameter::xavier("final.weight", fused, fused, rng, device)?,
        })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn num_nodes(&self) -> usize {
        self.masks.num_nodes()
    }

    /// Width of the embedding handed to the regressor.
    pub fn output_width(&self) -> usize {
        self.config.fused_width()
    }

    /// Run the `T` timestamps starting at `windows[0]` for every node.
    pub fn forward(&self, windows: &[Window]) -> Result<ForecasterOutput> {
        let t_count = self.config.num_timestamps;
        let day = self.config.history_len;
        let his_width = day - 1;
        let nodes = self.num_nodes();

        if windows.len() != t_count {
            return Err(Error::ShapeMismatch {
                op: "forecaster_forward",
                expected: format!("{} windows", t_count),
                actual: format!("{}", windows.len()),
            });
        }

        let mut his_latent = Tensor::zeros((nodes, his_width), DType::F32, &self.device)?;
        let mut cur_latent = Tensor::zeros((nodes, 1), DType::F32, &self.device)?;
        let mut his_embds = Vec::with_capacity(t_count);
        let mut cur_embds = Vec::with_capacity(t_count);

        for (ts, window) in windows.iter().enumerate() {
            if window.num_nodes() != nodes || window.history_len() != day {
                return Err(Error::shape(
                    "forecaster_window",
                    (nodes, day),
                    (window.num_nodes(), window.history_len()),
                ));
            }
            let values = window.values();

            let raw = values.slice_cols(0, his_width)?.to_tensor(&self.device)?;
            let pos = window.positional_block(0, his_width)?.to_tensor(&self.device)?;
            let embd = self.his_models[ts].forward(&GnnInput {
                raw_features: &raw,
                pre_latent: &his_latent,
            })?;
            his_embds.push(embd.add(&pos)?);

            let raw = values.slice_cols(his_width, day)?.to_tensor(&self.device)?;
            let pos = window.positional_block(his_width, day)?.to_tensor(&self.device)?;
            let embd = self.cur_models[ts].forward(&GnnInput {
                raw_features: &raw,
                pre_latent: &cur_latent,
            })?;
            cur_embds.push(embd.add(&pos)?);

            // the last timestamp's latent feeds nothing
            if ts + 1 < t_count {
                his_latent = fold(&his_embds, self.his_fusion.as_tensor(), (ts + 1) * his_width)?;
                cur_latent = fold(&cur_embds, self.cur_fusion.as_tensor(), ts + 1)?;
            }
        }

        let mut all = his_embds;
        all.extend(cur_embds);
        let concatenated = Tensor::cat(&all, 1)?;
        let embedding = concatenated
            .matmul(&self.final_weight.as_tensor().t()?)?
            .relu()?;

        Ok(ForecasterOutput {
            concatenated,
            embedding,
        })
    }
}

/// `relu(concat(embds) · W[:, ..width]ᵀ)`
fn fold(embds: &[Tensor], weight: &Tensor, width: usize) -> Result<Tensor> {
    let upto = Tensor::cat(embds, 1)?;
    let w = weight.narrow(1, 0, width)?.contiguous()?;
    Ok(upto.matmul(&w.t()?)?.relu()?)
}

impl Parameterized for CombinedForecaster {
    fn parameters(&self) -> Vec<&Parameter> {
        let mut params: Vec<&Parameter> = Vec::new();
        for m in self.his_models.iter().chain(self.cur_models.iter()) {
            params.extend(m.parameters());
        }
        params.push(&self.his_fusion);
        params.push(&self.cur_fusion);
        params.push(&self.final_weight);
        params
    }
}
