//! Precomputed explanation artifact: one attribution row per customer of the
//! feature table, produced offline over the whole sample.
//!
//! JSON document (optionally gzip-compressed):
//!
//! ```json
//! { "feature_names": [...], "base_values": 0.0 | [...],
//!   "values": [[...], ...], "data": [[...], ...], "customer_ids": [...] }
//! ```
//!
//! `data` and `customer_ids` are optional. With `customer_ids` rows are
//! resolved by id; without, by row position in the feature table, which is
//! only accepted when the row counts agree. When `data` is present the row's
//! feature values must match the customer's feature row.

use crate::{
    config::is_remote,
    dataset::FeatureTable,
    error::{DeskError, DeskResult},
    remote::RemoteClient,
    treeshap::Attribution,
    types::CustomerId,
};
use flate2::read::GzDecoder;
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Read;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const DATA_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone)]
pub struct ExplanationArtifact {
    source: String,
    feature_names: Vec<String>,
    base_values: Vec<f64>,
    values: Vec<Vec<f64>>,
    data: Option<Vec<Vec<f64>>>,
    id_index: Option<HashMap<CustomerId, usize>>,
}

#[derive(Deserialize)]
struct ArtifactFile {
    feature_names: Vec<String>,
    base_values: BaseValues,
    values: Vec<Vec<f64>>,
    #[serde(default)]
    data: Option<Vec<Vec<Option<f64>>>>,
    #[serde(default)]
    customer_ids: Option<Vec<CustomerId>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BaseValues {
    Shared(f64),
    PerRow(Vec<f64>),
}

impl ExplanationArtifact {
    /// Fetch from an http(s) URL or read from a local path.
    pub fn load(source: &str, remote: &RemoteClient) -> DeskResult<Self> {
        let bytes = if is_remote(source) {
            remote.get_bytes(source)?
        } else {
            std::fs::read(source)?
        };
        let artifact = Self::from_bytes(source, &bytes)?;
        log::info!(
            "loaded explanation artifact from {source}: {} rows x {} features ({})",
            artifact.len(),
            artifact.feature_names.len(),
            if artifact.is_keyed() { "keyed by id" } else { "positional" }
        );
        Ok(artifact)
    }

    pub fn from_bytes(source: &str, bytes: &[u8]) -> DeskResult<Self> {
        let file: ArtifactFile = if bytes.starts_with(&GZIP_MAGIC) {
            let mut text = String::new();
            GzDecoder::new(bytes).read_to_string(&mut text)?;
            serde_json::from_str(&text)
        } else {
            serde_json::from_slice(bytes)
        }
        .map_err(|e| DeskError::MalformedResponse {
            url: source.to_string(),
            message: e.to_string(),
        })?;
        Self::from_file(source, file)
    }

    fn from_file(source: &str, file: ArtifactFile) -> DeskResult<Self> {
        let n_rows = file.values.len();
        let n_features = file.feature_names.len();
        let shape_error = |what: String| DeskError::MalformedResponse {
            url: source.to_string(),
            message: what,
        };

        if let Some(pos) = file.values.iter().position(|r| r.len() != n_features) {
            return Err(shape_error(format!(
                "values row {pos} has {} entries for {n_features} features",
                file.values[pos].len()
            )));
        }
        let base_values = match file.base_values {
            BaseValues::Shared(v) => vec![v; n_rows],
            BaseValues::PerRow(v) if v.len() == n_rows => v,
            BaseValues::PerRow(v) => {
                return Err(shape_error(format!(
                    "{} base values for {n_rows} rows",
                    v.len()
                )))
            }
        };
        let data = match file.data {
            None => None,
            Some(rows) => {
                if rows.len() != n_rows || rows.iter().any(|r| r.len() != n_features) {
                    return Err(shape_error("data does not match the shape of values".into()));
                }
                Some(
                    rows.into_iter()
                        .map(|r| r.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
                        .collect(),
                )
            }
        };
        let id_index = match file.customer_ids {
            None => None,
            Some(ids) => {
                if ids.len() != n_rows {
                    return Err(shape_error(format!(
                        "{} customer ids for {n_rows} rows",
                        ids.len()
                    )));
                }
                let mut index = HashMap::with_capacity(ids.len());
                for (pos, id) in ids.into_iter().enumerate() {
                    if index.insert(id, pos).is_some() {
                        return Err(DeskError::DuplicateCustomer {
                            file: source.to_string(),
                            id,
                        });
                    }
                }
                Some(index)
            }
        };

        Ok(Self {
            source: source.to_string(),
            feature_names: file.feature_names,
            base_values,
            values: file.values,
            data,
            id_index,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_keyed(&self) -> bool {
        self.id_index.is_some()
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn values(&self) -> &[Vec<f64>] {
        &self.values
    }

    pub fn data(&self) -> Option<&[Vec<f64>]> {
        self.data.as_deref()
    }

    pub fn check_features(&self, columns: &[String]) -> DeskResult<()> {
        if self.feature_names.as_slice() == columns {
            Ok(())
        } else {
            Err(DeskError::FeatureMismatch(format!(
                "{} has {} features, the feature table has {} (or a different order)",
                self.source,
                self.feature_names.len(),
                columns.len()
            )))
        }
    }

    /// Row of the artifact holding `customer_id`'s attribution.
    pub fn resolve_row(&self, customer_id: CustomerId, table: &FeatureTable) -> DeskResult<usize> {
        let table_row = table.row(customer_id)?;
        let row = match &self.id_index {
            Some(index) => *index.get(&customer_id).ok_or_else(|| DeskError::ArtifactMisaligned {
                reason: format!("customer {customer_id} is not in {}", self.source),
            })?,
            None => {
                if self.len() != table.len() {
                    return Err(DeskError::ArtifactMisaligned {
                        reason: format!(
                            "{} has {} rows but {} has {}; positional lookup is unsafe",
                            self.source,
                            self.len(),
                            table.source(),
                            table.len()
                        ),
                    });
                }
                table.row_position(customer_id)?
            }
        };

        if let Some(data) = &self.data {
            if !rows_match(&data[row], table_row) {
                return Err(DeskError::ArtifactMisaligned {
                    reason: format!(
                        "row {row} of {} does not hold customer {customer_id}'s features",
                        self.source
                    ),
                });
            }
        }
        Ok(row)
    }

    pub fn attribution_for(&self, customer_id: CustomerId, table: &FeatureTable) -> DeskResult<Attribution> {
        let row = self.resolve_row(customer_id, table)?;
        let data = match &self.data {
            Some(data) => data[row].clone(),
            None => table.row(customer_id)?.to_vec(),
        };
        Ok(Attribution {
            feature_names: self.feature_names.clone(),
            values: self.values[row].clone(),
            data,
            base_value: self.base_values[row],
        })
    }

    /// Mean |attribution| per feature across all rows.
    pub fn mean_abs(&self) -> Vec<f64> {
        let mut sums = vec![0.0; self.feature_names.len()];
        for row in &self.values {
            for (s, v) in sums.iter_mut().zip(row) {
                *s += v.abs();
            }
        }
        let n = self.values.len().max(1) as f64;
        sums.into_iter().map(|s| s / n).collect()
    }
}

fn rows_match(a: &[f64], b: &[f64]) -> bool {
    a.len() == b.len()
        && a.iter().zip(b).all(|(&x, &y)| {
            (x.is_nan() && y.is_nan()) || (x - y).abs() <= DATA_TOLERANCE * (1.0 + y.abs())
        })
}
