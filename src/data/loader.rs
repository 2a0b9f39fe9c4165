//! Reading sensor series and distance matrices from disk.

use crate::config::{Dataset, ExperimentConfig, ModelConfig, SeriesFormat};
use crate::core::{Error, Result};
use crate::data::window::{SensorSeries, WindowConfig, WindowedDataset};
use crate::graph::{AdjacencyBuilder, AdjacencyMatrix, KernelConfig};
use crate::tensor::Matrix;
use std::path::{Path, PathBuf};
use tracing::info;

/// Samples per hour at 5-minute resolution.
pub const HOURLY_SAMPLES: usize = 12;

fn parse_csv_rows(text: &str, path: &Path) -> Result<Vec<Vec<f32>>> {
    let mut rows: Vec<Vec<f32>> = Vec::new();
    for (i, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let row = line
            .split(',')
            .map(|cell| {
                cell.trim().parse::<f32>().map_err(|_| {
                    Error::DataFormat(format!(
                        "{}:{}: '{}' is not a number",
                        path.display(),
                        i + 1,
                        cell.trim()
                    ))
                })
            })
            .collect::<Result<Vec<f32>>>()?;
        if let Some(first) = rows.first() {
            let expected = first.len();
            if row.len() != expected {
                return Err(Error::DataFormat(format!(
                    "{}:{}: expected {} values, found {}",
                    path.display(),
                    i + 1,
                    expected,
                    row.len()
                )));
            }
        }
        rows.push(row);
    }
    Ok(rows)
}

/// Series CSV: one line per timestamp, one column per sensor.
pub fn read_series_csv(path: impl AsRef<Path>) -> Result<SensorSeries> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(Error::SeriesFileMissing(path.to_path_buf()));
    }
    let text = std::fs::read_to_string(path)?;
    let rows = parse_csv_rows(&text, path)?;
    if rows.is_empty() {
        return Err(Error::DataFormat(format!("{} has no readings", path.display())));
    }
    // timestamps x sensors -> sensors x timestamps
    Ok(SensorSeries::new(Matrix::from_rows(&rows)?.transpose()))
}

/// Square CSV of pairwise sensor distances.
pub fn read_distance_csv(path: impl AsRef<Path>) -> Result<Matrix> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(Error::AdjacencyFileMissing(path.to_path_buf()));
    }
    let text = std::fs::read_to_string(path)?;
    let rows = parse_csv_rows(&text, path)?;
    let matrix = Matrix::from_rows(&rows)?;
    if matrix.rows() != matrix.cols() {
        return Err(Error::DataFormat(format!(
            "{}: distance matrix must be square, got {}x{}",
            path.display(),
            matrix.rows(),
            matrix.cols()
        )));
    }
    Ok(matrix)
}

#[derive(Debug, PartialEq)]
struct NpyHeader {
    little_endian: bool,
    width: usize,
    fortran_order: bool,
    shape: Vec<usize>,
}

fn parse_npy_header(header: &str) -> Result<NpyHeader> {
    let bad = |what: &str| Error::DataFormat(format!("npy header: {}", what));

    let descr_at = header.find("'descr'").ok_or_else(|| bad("missing descr"))?;
    let descr = header[descr_at + 7..]
        .split('\'')
        .nth(1)
        .ok_or_else(|| bad("malformed descr"))?;
    let (little_endian, width) = match descr {
        "<f4" => (true, 4),
        "<f8" => (true, 8),
        ">f4" => (false, 4),
        ">f8" => (false, 8),
        other => return Err(bad(&format!("unsupported dtype {}", other))),
    };

    let fortran_order = header
        .find("'fortran_order'")
        .map(|at| {
            header[at..]
                .trim_start_matches("'fortran_order'")
                .trim_start_matches(|c: char| c == ':' || c == ' ')
                .starts_with("True")
        })
        .ok_or_else(|| bad("missing fortran_order"))?;

    let shape_at = header.find("'shape'").ok_or_else(|| bad("missing shape"))?;
    let open = header[shape_at..]
        .find('(')
        .map(|i| shape_at + i)
        .ok_or_else(|| bad("malformed shape"))?;
    let close = header[open..]
        .find(')')
        .map(|i| open + i)
        .ok_or_else(|| bad("malformed shape"))?;
    let shape = header[open + 1..close]
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<usize>().map_err(|_| bad("non-integer dimension")))
        .collect::<Result<Vec<usize>>>()?;

    Ok(NpyHeader {
        little_endian,
        width,
        fortran_order,
        shape,
    })
}

/// `.npy` array of shape `(timestamps, sensors, channels)`; keeps one channel.
pub fn read_series_npy(path: impl AsRef<Path>, channel: usize) -> Result<SensorSeries> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(Error::SeriesFileMissing(path.to_path_buf()));
    }
    let bytes = std::fs::read(path)?;
    decode_npy_series(&bytes, channel).map_err(|e| match e {
        Error::DataFormat(msg) => Error::DataFormat(format!("{}: {}", path.display(), msg)),
        other => other,
    })
}

fn decode_npy_series(bytes: &[u8], channel: usize) -> Result<SensorSeries> {
    if bytes.len() < 10 || &bytes[..6] != b"\x93NUMPY" {
        return Err(Error::DataFormat("not an npy file".to_string()));
    }
    let major = bytes[6];
    let (header_len, header_start) = match major {
        1 => (u16::from_le_bytes([bytes[8], bytes[9]]) as usize, 10),
        2 | 3 => {
            if bytes.len() < 12 {
                return Err(Error::DataFormat("truncated npy header".to_string()));
            }
            (
                u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize,
                12,
            )
        }
        v => return Err(Error::DataFormat(format!("unsupported npy version {}", v))),
    };
    let data_start = header_start + header_len;
    if bytes.len() < data_start {
        return Err(Error::DataFormat("truncated npy header".to_string()));
    }
    let header = std::str::from_utf8(&bytes[header_start..data_start])
        .map_err(|_| Error::DataFormat("npy header is not text".to_string()))?;
    let header = parse_npy_header(header)?;

    if header.fortran_order {
        return Err(Error::DataFormat("fortran-ordered npy is not supported".to_string()));
    }
    let (steps, sensors, channels) = match header.shape.as_slice() {
        [p, n, c] => (*p, *n, *c),
        other => {
            return Err(Error::DataFormat(format!(
                "expected a 3-D array, got shape {:?}",
                other
            )))
        }
    };
    if channel >= channels {
        return Err(Error::DataFormat(format!(
            "channel {} out of range for {} channels",
            channel, channels
        )));
    }
    let payload = &bytes[data_start..];
    if payload.len() < steps * sensors * channels * header.width {
        return Err(Error::DataFormat("npy payload shorter than its shape".to_string()));
    }

    let read = |i: usize| -> f32 {
        let at = i * header.width;
        let chunk = &payload[at..at + header.width];
        match (header.width, header.little_endian) {
            (4, true) => f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]),
            (4, false) => f32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]),
            (_, little) => {
                let mut b = [0u8; 8];
                b.copy_from_slice(chunk);
                if little {
                    f64::from_le_bytes(b) as f32
                } else {
                    f64::from_be_bytes(b) as f32
                }
            }
        }
    };

    let mut data = Matrix::zeros(sensors, steps);
    for t in 0..steps {
        for n in 0..sensors {
            data.set(n, t, read((t * sensors + n) * channels + channel));
        }
    }
    Ok(SensorSeries::new(data))
}

/// Train/test windows plus the graph, ready for the trainer.
#[derive(Clone, Debug)]
pub struct LoadedData {
    pub train: WindowedDataset,
    pub test: WindowedDataset,
    pub adjacency: AdjacencyMatrix,
}

/// Loads one dataset according to its day split.
#[derive(Clone, Debug)]
pub struct DataLoader {
    pub dataset: Dataset,
    pub history_days: usize,
    pub pred_len: usize,
    pub hourly_samples: usize,
    pub kernel: KernelConfig,
}

impl DataLoader {
    pub fn new(dataset: Dataset, model: &ModelConfig) -> Self {
        Self {
            dataset,
            history_days: model.history_len,
            pred_len: model.pred_len,
            hourly_samples: HOURLY_SAMPLES,
            kernel: KernelConfig::default(),
        }
    }

    /// Read the files named in `config` and build windows and adjacency.
    ///
    /// The distance file is read first so a missing graph fails before any
    /// window construction.
    pub fn load(&self, config: &ExperimentConfig) -> Result<LoadedData> {
        info!(dataset = %self.dataset, "Loading data");
        let cites: PathBuf = config.cites_path(self.dataset)?;
        let distances = read_distance_csv(&cites)?;

        let content = config.content_path(self.dataset)?;
        let series = match self.dataset.series_format() {
            SeriesFormat::Csv => read_series_csv(&content)?,
            SeriesFormat::Npy { channel } => read_series_npy(&content, channel)?,
        };

        self.from_parts(&series, &distances)
    }

    /// Build windows and adjacency from in-memory data.
    pub fn from_parts(&self, series: &SensorSeries, distances: &Matrix) -> Result<LoadedData> {
        if distances.rows() != series.num_sensors() {
            return Err(Error::DataFormat(format!(
                "distance matrix covers {} sensors but the series has {}",
                distances.rows(),
                series.num_sensors()
            )));
        }
        let adjacency = AdjacencyBuilder::new(self.kernel.clone()).build(distances)?;

        let split = self.dataset.split();
        let window = |start_day, end_day| WindowConfig {
            start_day,
            end_day,
            hourly_samples: self.hourly_samples,
            history_days: self.history_days,
            pred_len: self.pred_len,
        };
        let train = WindowedDataset::build(series, &window(split.train.start, split.train.end))?;
        let test = WindowedDataset::build(series, &window(split.test.start, split.test.end))?;

        info!(
            dataset = %self.dataset,
            nodes = adjacency.num_nodes(),
            edges = adjacency.edge_count(),
            train_windows = train.len(),
            test_windows = test.len(),
            horizon_minutes = self.pred_len * 5,
            "Data loaded"
        );

        Ok(LoadedData {
            train,
            test,
            adjacency,
        })
    }
}
