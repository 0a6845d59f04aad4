use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    io::{Read, Write},
    path::Path,
};

#[derive(Debug, Serialize, Deserialize)]
struct ParameterRow {
    #[serde(rename = "Parameter")]
    name: String,
    #[serde(rename = "Value")]
    value: f64,
}

/// Named kinetic parameters and initial conditions of a signaling network.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters {
    values: BTreeMap<String, f64>,
}

impl Parameters {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the table with `name` set to `value`.
    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    /// Sets `name` to `value` and returns the previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: f64) -> Option<f64> {
        self.values.insert(name.into(), value)
    }

    /// Value of `name`.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    /// Whether `name` is set.
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates the parameters in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Returns these parameters updated with `overrides`; overrides win on name collisions.
    pub fn merge_overrides(&self, overrides: &Parameters) -> Parameters {
        let mut merged = self.clone();
        merged
            .values
            .extend(overrides.values.iter().map(|(k, v)| (k.clone(), *v)));
        merged
    }

    /// Reads a `Parameter,Value` table.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::Reader::from_reader(reader);
        let mut params = Self::new();
        for row in reader.deserialize() {
            let row: ParameterRow = row?;
            if !row.value.is_finite() {
                return Err(Error::InvalidInput {
                    field: "parameters",
                    reason: format!("parameter {} has non-finite value {}", row.name, row.value),
                });
            }
            params.insert(row.name, row.value);
        }
        tracing::debug!(parameters = params.len(), "parameter table read");
        Ok(params)
    }

    /// Reads a `Parameter,Value` table from a csv file.
    pub fn read_csv(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_csv_reader(std::fs::File::open(path)?)
    }

    /// Writes the table with `Parameter,Value` headers.
    pub fn to_csv_writer<W: Write>(&self, writer: W) -> Result<()> {
        let mut writer = csv::Writer::from_writer(writer);
        for (name, value) in self.iter() {
            writer.serialize(ParameterRow {
                name: name.to_string(),
                value,
            })?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Writes the table to a csv file.
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        self.to_csv_writer(std::fs::File::create(path)?)
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for Parameters {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}
