//! Key-value experiment configuration.
//!
//! The document is JSON; nested objects flatten into dotted keys, so
//! `{"file_path": {"PeMSD7_content": "V.csv"}}` answers `file_path.PeMSD7_content`.

use crate::config::dataset::Dataset;
use crate::core::{Error, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Flattened experiment configuration.
#[derive(Clone, Debug, Default)]
pub struct ExperimentConfig {
    entries: BTreeMap<String, String>,
}

impl ExperimentConfig {
    /// Load from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read config {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let root: Value = serde_json::from_str(text)?;
        if !root.is_object() {
            return Err(Error::Config("config root must be an object".to_string()));
        }
        let mut entries = BTreeMap::new();
        flatten("", &root, &mut entries);
        Ok(Self { entries })
    }

    /// Set a dotted key.
    pub fn with_entry(mut self, key: &str, value: &str) -> Self {
        self.entries.insert(key.to_string(), value.to_string());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(|s| s.as_str())
    }

    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key)
            .ok_or_else(|| Error::Config(format!("missing config key '{}'", key)))
    }

    /// Path of a dataset's sensor readings (`file_path.<ds>_content`).
    pub fn content_path(&self, dataset: Dataset) -> Result<PathBuf> {
        self.require(&format!("file_path.{}_content", dataset.name()))
            .map(PathBuf::from)
    }

    /// Path of a dataset's distance matrix (`file_path.<ds>_cites`).
    pub fn cites_path(&self, dataset: Dataset) -> Result<PathBuf> {
        self.require(&format!("file_path.{}_cites", dataset.name()))
            .map(PathBuf::from)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn flatten(prefix: &str, value: &Value, out: &mut BTreeMap<String, String>) {
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                let key = if prefix.is_empty() {
                    k.clone()
                } else {
                    format!("{}.{}", prefix, k)
                };
                flatten(&key, v, out);
            }
        }
        Value::String(s) => {
            out.insert(prefix.to_string(), s.clone());
        }
        Value::Null => {}
        other => {
            out.insert(prefix.to_string(), other.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "file_path": {
            "PeMSD7_content": "data/PeMSD7/V_228.csv",
            "PeMSD7_cites": "data/PeMSD7/W_228.csv",
            "PeMSD8_content": "data/PeMSD8/pems08.npy"
        },
        "seed": 7
    }"#;

    #[test]
    fn test_dotted_lookup() {
        let cfg = ExperimentConfig::from_json_str(SAMPLE).unwrap();
        assert_eq!(
            cfg.content_path(Dataset::PeMSD7).unwrap(),
            PathBuf::from("data/PeMSD7/V_228.csv")
        );
        assert_eq!(cfg.get("seed"), Some("7"));
        assert_eq!(cfg.len(), 4);
    }

    #[test]
    fn test_missing_key_is_config_error() {
        let cfg = ExperimentConfig::from_json_str(SAMPLE).unwrap();
        let err = cfg.cites_path(Dataset::PeMSD8).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("file_path.PeMSD8_cites"));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            ExperimentConfig::from_json_str("[1, 2]"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            ExperimentConfig::from_json_str("{"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = ExperimentConfig::from_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_with_entry() {
        let cfg = ExperimentConfig::default().with_entry("file_path.PeMSD4_cites", "W.csv");
        assert_eq!(
            cfg.cites_path(Dataset::PeMSD4).unwrap(),
            PathBuf::from("W.csv")
        );
    }
}
