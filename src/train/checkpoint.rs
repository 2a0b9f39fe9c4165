//! Best-model checkpoints.
//!
//! A checkpoint file is a bincode `Envelope`: the SHA3-256 digest of the
//! payload plus the payload itself, an lz4-compressed bincode `ModelSnapshot`.

use crate::config::Dataset;
use crate::core::{now, Error, Hash256, Result, Timestamp};
use crate::tensor::{Matrix, Parameterized};
use lz4_flex::{compress_prepend_size, decompress_size_prepended};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::info;

/// A named parameter value.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NamedMatrix {
    pub name: String,
    pub value: Matrix,
}

/// Every parameter of one model, tagged with where it came from.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelSnapshot {
    pub dataset: String,
    pub horizon_minutes: usize,
    pub saved_at: Timestamp,
    pub parameters: Vec<NamedMatrix>,
}

impl ModelSnapshot {
    pub fn capture(module: &dyn Parameterized, dataset: Dataset, horizon_minutes: usize) -> Result<Self> {
        let parameters = module
            .parameters()
            .into_iter()
            .map(|p| {
                Ok(NamedMatrix {
                    name: p.name().to_string(),
                    value: p.value()?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            dataset: dataset.name().to_string(),
            horizon_minutes,
            saved_at: now(),
            parameters,
        })
    }

    /// Fail unless the snapshot was saved for `dataset` at `horizon_minutes`.
    pub fn check_tags(&self, dataset: Dataset, horizon_minutes: usize) -> Result<()> {
        if self.dataset != dataset.name() || self.horizon_minutes != horizon_minutes {
            return Err(Error::CheckpointIo(format!(
                "checkpoint was saved for {} at {} minutes, expected {} at {} minutes",
                self.dataset,
                self.horizon_minutes,
                dataset.name(),
                horizon_minutes
            )));
        }
        Ok(())
    }

    /// Fail unless every parameter of `module` is stored with its shape and
    /// nothing else is.
    pub fn check(&self, module: &dyn Parameterized) -> Result<()> {
        let mut stored: HashMap<&str, &Matrix> = self
            .parameters
            .iter()
            .map(|p| (p.name.as_str(), &p.value))
            .collect();

        for p in module.parameters() {
            let value = stored.remove(p.name()).ok_or_else(|| {
                Error::CheckpointIo(format!("checkpoint has no parameter '{}'", p.name()))
            })?;
            if value.shape() != p.shape() {
                return Err(Error::shape("restore_parameter", p.shape(), value.shape()));
            }
        }
        if let Some(extra) = stored.keys().next() {
            return Err(Error::CheckpointIo(format!(
                "checkpoint parameter '{}' does not belong to the model",
                extra
            )));
        }
        Ok(())
    }

    /// Copy the stored values into `module` after `check` passes.
    pub fn restore(&self, module: &dyn Parameterized) -> Result<()> {
        self.check(module)?;
        let stored: HashMap<&str, &Matrix> = self
            .parameters
            .iter()
            .map(|p| (p.name.as_str(), &p.value))
            .collect();
        for p in module.parameters() {
            if let Some(value) = stored.get(p.name()) {
                p.load(value)?;
            }
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    digest: Hash256,
    payload: Vec<u8>,
}

/// Write `snapshot` to `path` and return the payload digest.
pub fn save_snapshot(path: &Path, snapshot: &ModelSnapshot) -> Result<Hash256> {
    let encoded = bincode::serialize(snapshot)?;
    let payload = compress_prepend_size(&encoded);
    let digest = Hash256::digest(&payload);
    let envelope = Envelope {
        digest: digest.clone(),
        payload,
    };
    let bytes = bincode::serialize(&envelope)?;

    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| {
            Error::CheckpointIo(format!("cannot create {}: {}", dir.display(), e))
        })?;
    }
    std::fs::write(path, bytes)
        .map_err(|e| Error::CheckpointIo(format!("cannot write {}: {}", path.display(), e)))?;
    Ok(digest)
}

pub fn load_snapshot(path: &Path) -> Result<ModelSnapshot> {
    let bytes = std::fs::read(path)
        .map_err(|e| Error::CheckpointIo(format!("cannot read {}: {}", path.display(), e)))?;
    let envelope: Envelope = bincode::deserialize(&bytes)?;
    if Hash256::digest(&envelope.payload) != envelope.digest {
        return Err(Error::CheckpointIo(format!(
            "{}: digest mismatch",
            path.display()
        )));
    }
    let encoded = decompress_size_prepended(&envelope.payload)
        .map_err(|e| Error::CheckpointIo(format!("{}: {}", path.display(), e)))?;
    Ok(bincode::deserialize(&encoded)?)
}

/// Locations of the forecaster/regressor pair for one dataset and horizon.
#[derive(Clone, Debug, PartialEq)]
pub struct CheckpointPaths {
    pub forecaster: PathBuf,
    pub regressor: PathBuf,
}

impl CheckpointPaths {
    pub fn new(results_dir: &Path, dataset: Dataset, horizon_minutes: usize) -> Self {
        let dir = results_dir.join(dataset.name());
        Self {
            forecaster: dir.join(format!("bestTmodel_{}minutes.ckpt", horizon_minutes)),
            regressor: dir.join(format!("bestRegression_{}minutes.ckpt", horizon_minutes)),
        }
    }

    pub fn save(
        &self,
        forecaster: &dyn Parameterized,
        regressor: &dyn Parameterized,
        dataset: Dataset,
        horizon_minutes: usize,
    ) -> Result<()> {
        let forecaster_digest = save_snapshot(
            &self.forecaster,
            &ModelSnapshot::capture(forecaster, dataset, horizon_minutes)?,
        )?;
        let regressor_digest = save_snapshot(
            &self.regressor,
            &ModelSnapshot::capture(regressor, dataset, horizon_minutes)?,
        )?;
        info!(
            path = %self.forecaster.display(),
            forecaster_digest = %forecaster_digest,
            regressor_digest = %regressor_digest,
            "Checkpoint saved"
        );
        Ok(())
    }

    /// Restore the pair saved for `dataset` at `horizon_minutes`.
    ///
    /// Both files are read and validated before either model is touched.
    pub fn load(
        &self,
        forecaster: &dyn Parameterized,
        regressor: &dyn Parameterized,
        dataset: Dataset,
        horizon_minutes: usize,
    ) -> Result<()> {
        let forecaster_snapshot = load_snapshot(&self.forecaster)?;
        let regressor_snapshot = load_snapshot(&self.regressor)?;
        forecaster_snapshot.check_tags(dataset, horizon_minutes)?;
        regressor_snapshot.check_tags(dataset, horizon_minutes)?;
        forecaster_snapshot.check(forecaster)?;
        regressor_snapshot.check(regressor)?;

        forecaster_snapshot.restore(forecaster)?;
        regressor_snapshot.restore(regressor)?;
        info!(path = %self.forecaster.display(), "Checkpoint loaded");
        Ok(())
    }
}
