//! Data access layer: the raw customer table and the preprocessed feature
//! table, both keyed by customer id and loaded once per process.

use crate::{
    error::{DeskError, DeskResult},
    tabular::open_tabular,
    types::{CustomerId, Days},
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::io::Read;
use std::path::Path;

pub const COL_GENDER: &str = "CODE_GENDER";
pub const COL_FAMILY_STATUS: &str = "NAME_FAMILY_STATUS";
pub const COL_INCOME_TYPE: &str = "NAME_INCOME_TYPE";
pub const COL_INCOME_TOTAL: &str = "AMT_INCOME_TOTAL";
pub const COL_DAYS_BIRTH: &str = "DAYS_BIRTH";
pub const COL_DAYS_EMPLOYED: &str = "DAYS_EMPLOYED";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRecord {
    pub customer_id: CustomerId,
    pub gender: String,
    pub family_status: String,
    pub income_type: String,
    pub income_total: f64,
    pub days_birth: Days,
    pub days_employed: Days,
}

/// The raw customer table, in file row order.
#[derive(Debug, Clone)]
pub struct Population {
    source: String,
    records: Vec<CustomerRecord>,
    index: HashMap<CustomerId, usize>,
}

impl Population {
    pub fn from_records(source: &str, records: Vec<CustomerRecord>) -> DeskResult<Self> {
        let mut index = HashMap::with_capacity(records.len());
        for (pos, r) in records.iter().enumerate() {
            if index.insert(r.customer_id, pos).is_some() {
                return Err(DeskError::DuplicateCustomer {
                    file: source.to_string(),
                    id: r.customer_id,
                });
            }
        }
        Ok(Self {
            source: source.to_string(),
            records,
            index,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, id: CustomerId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn get(&self, id: CustomerId) -> DeskResult<&CustomerRecord> {
        self.index
            .get(&id)
            .map(|&pos| &self.records[pos])
            .ok_or(DeskError::CustomerNotFound { id })
    }

    pub fn records(&self) -> &[CustomerRecord] {
        &self.records
    }
}

/// Model-ready feature rows, in file row order.
#[derive(Debug, Clone)]
pub struct FeatureTable {
    source: String,
    columns: Vec<String>,
    ids: Vec<CustomerId>,
    rows: Vec<Vec<f64>>,
    index: HashMap<CustomerId, usize>,
}

impl FeatureTable {
    pub fn new(
        source: &str,
        columns: Vec<String>,
        ids: Vec<CustomerId>,
        rows: Vec<Vec<f64>>,
    ) -> DeskResult<Self> {
        if ids.len() != rows.len() {
            return Err(DeskError::FeatureMismatch(format!(
                "{source}: {} ids for {} rows",
                ids.len(),
                rows.len()
            )));
        }
        let mut index = HashMap::with_capacity(ids.len());
        for (pos, (&id, row)) in ids.iter().zip(rows.iter()).enumerate() {
            if row.len() != columns.len() {
                return Err(DeskError::FeatureMismatch(format!(
                    "{source}: row {pos} has {} values for {} columns",
                    row.len(),
                    columns.len()
                )));
            }
            if index.insert(id, pos).is_some() {
                return Err(DeskError::DuplicateCustomer {
                    file: source.to_string(),
                    id,
                });
            }
        }
        Ok(Self {
            source: source.to_string(),
            columns,
            ids,
            rows,
            index,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn ids(&self) -> &[CustomerId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of the customer in the table's row order.
    pub fn row_position(&self, id: CustomerId) -> DeskResult<usize> {
        self.index
            .get(&id)
            .copied()
            .ok_or(DeskError::CustomerNotFound { id })
    }

    pub fn row(&self, id: CustomerId) -> DeskResult<&[f64]> {
        let pos = self.row_position(id)?;
        Ok(&self.rows[pos])
    }
}

pub fn load_customers(path: &Path, id_column: &str) -> DeskResult<Population> {
    let reader = open_tabular(path)?;
    let population = read_customers(reader, &path.display().to_string(), id_column)?;
    log::info!(
        "loaded {} customers from {}",
        population.len(),
        path.display()
    );
    Ok(population)
}

pub fn load_feature_rows(path: &Path, id_column: &str, index_column: &str) -> DeskResult<FeatureTable> {
    let reader = open_tabular(path)?;
    let table = read_feature_rows(reader, &path.display().to_string(), id_column, index_column)?;
    log::info!(
        "loaded {} feature rows x {} columns from {}",
        table.len(),
        table.columns().len(),
        path.display()
    );
    Ok(table)
}

pub fn read_customers<R: Read>(reader: R, source: &str, id_column: &str) -> DeskResult<Population> {
    let mut rdr = csv::ReaderBuilder::new().flexible(false).from_reader(reader);
    let headers = rdr.headers()?.clone();
    let col = |name: &str| column_index(&headers, source, name);
    let id_idx = col(id_column)?;
    let gender_idx = col(COL_GENDER)?;
    let family_idx = col(COL_FAMILY_STATUS)?;
    let income_type_idx = col(COL_INCOME_TYPE)?;
    let income_idx = col(COL_INCOME_TOTAL)?;
    let birth_idx = col(COL_DAYS_BIRTH)?;
    let employed_idx = col(COL_DAYS_EMPLOYED)?;

    let mut records = Vec::new();
    for result in rdr.records() {
        let row = result?;
        let line = row.position().map(|p| p.line()).unwrap_or(0);
        let field = |idx: usize, column: &'static str| Field::at(&row, idx, source, line, column);

        let income_total = field(income_idx, COL_INCOME_TOTAL).float()?;
        if income_total < 0.0 {
            return Err(field(income_idx, COL_INCOME_TOTAL).invalid());
        }
        let days_birth = field(birth_idx, COL_DAYS_BIRTH).integer()?;
        if days_birth >= 0 {
            return Err(field(birth_idx, COL_DAYS_BIRTH).invalid());
        }

        records.push(CustomerRecord {
            customer_id: Field::at(&row, id_idx, source, line, id_column).integer()?,
            gender: field(gender_idx, COL_GENDER).value.to_string(),
            family_status: field(family_idx, COL_FAMILY_STATUS).value.to_string(),
            income_type: field(income_type_idx, COL_INCOME_TYPE).value.to_string(),
            income_total,
            days_birth,
            days_employed: field(employed_idx, COL_DAYS_EMPLOYED).integer()?,
        });
    }
    Population::from_records(source, records)
}

pub fn read_feature_rows<R: Read>(
    reader: R,
    source: &str,
    id_column: &str,
    index_column: &str,
) -> DeskResult<FeatureTable> {
    let mut rdr = csv::ReaderBuilder::new().flexible(false).from_reader(reader);
    let headers = rdr.headers()?.clone();
    let id_idx = column_index(&headers, source, id_column)?;

    // pandas writes the unnamed index column with an empty header; both that
    // and the configured index-maintenance column are dropped.
    let kept: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|&(i, name)| i != id_idx && name != index_column && !name.is_empty())
        .map(|(i, name)| (i, name.to_string()))
        .collect();
    if kept.len() + 1 < headers.len() {
        log::debug!(
            "{source}: dropped {} non-feature column(s)",
            headers.len() - kept.len() - 1
        );
    }

    let mut ids = Vec::new();
    let mut rows = Vec::new();
    for result in rdr.records() {
        let row = result?;
        let line = row.position().map(|p| p.line()).unwrap_or(0);
        let id = Field::at(&row, id_idx, source, line, id_column).integer()?;
        let mut values = Vec::with_capacity(kept.len());
        for (idx, name) in &kept {
            values.push(Field::at(&row, *idx, source, line, name).feature()?);
        }
        ids.push(id);
        rows.push(values);
    }
    let columns = kept.into_iter().map(|(_, name)| name).collect();
    FeatureTable::new(source, columns, ids, rows)
}

/// Ids the selector may offer: present in both tables, feature-table order.
pub fn selectable_ids(population: &Population, features: &FeatureTable) -> Vec<CustomerId> {
    let mut out = Vec::with_capacity(features.len());
    let mut missing_raw = 0usize;
    for &id in features.ids() {
        if population.contains(id) {
            out.push(id);
        } else {
            missing_raw += 1;
        }
    }
    let feature_ids: HashSet<CustomerId> = features.ids().iter().copied().collect();
    let missing_features = population
        .records()
        .iter()
        .filter(|r| !feature_ids.contains(&r.customer_id))
        .count();
    if missing_raw > 0 {
        log::warn!(
            "{missing_raw} id(s) in {} have no customer record; not selectable",
            features.source()
        );
    }
    if missing_features > 0 {
        log::warn!(
            "{missing_features} customer(s) in {} have no feature row; not selectable",
            population.source()
        );
    }
    out
}

fn column_index(headers: &csv::StringRecord, source: &str, name: &str) -> DeskResult<usize> {
    headers
        .iter()
        .position(|h| h.trim() == name)
        .ok_or_else(|| DeskError::MissingColumn {
            file: source.to_string(),
            column: name.to_string(),
        })
}

struct Field<'a> {
    source: &'a str,
    line: u64,
    column: &'a str,
    value: &'a str,
}

impl<'a> Field<'a> {
    fn at(
        row: &'a csv::StringRecord,
        idx: usize,
        source: &'a str,
        line: u64,
        column: &'a str,
    ) -> Self {
        Self {
            source,
            line,
            column,
            value: row.get(idx).unwrap_or("").trim(),
        }
    }

    fn invalid(&self) -> DeskError {
        DeskError::InvalidField {
            file: self.source.to_string(),
            line: self.line,
            column: self.column.to_string(),
            value: self.value.to_string(),
        }
    }

    fn float(&self) -> DeskResult<f64> {
        self.value
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| self.invalid())
    }

    /// Integers may be written as `-9461` or `-9461.0`.
    fn integer(&self) -> DeskResult<i64> {
        if let Ok(v) = self.value.parse::<i64>() {
            return Ok(v);
        }
        let v = self.float()?;
        if v.fract() != 0.0 || v.abs() > i64::MAX as f64 {
            return Err(self.invalid());
        }
        Ok(v as i64)
    }

    /// Feature cells: empty and `nan` are missing values, booleans are 0/1.
    fn feature(&self) -> DeskResult<f64> {
        match self.value {
            "" => Ok(f64::NAN),
            v if v.eq_ignore_ascii_case("nan") => Ok(f64::NAN),
            "True" | "true" => Ok(1.0),
            "False" | "false" => Ok(0.0),
            v => v.parse::<f64>().map_err(|_| self.invalid()),
        }
    }
}
