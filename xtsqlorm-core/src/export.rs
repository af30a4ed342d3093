//! Columnar result tables for export

use serde::Serialize;

use crate::value::{Record, Value};

/// Query results stored column by column
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    columns: Vec<String>,
    data: Vec<Vec<Value>>,
    rows: usize,
}

impl Table {
    /// Build from row records. `columns` fixes the column order; keys missing
    /// from a record become `Null`.
    pub fn from_records(columns: Vec<String>, records: &[Record]) -> Self {
        let data = columns
            .iter()
            .map(|column| {
                records
                    .iter()
                    .map(|r| r.get(column).cloned().unwrap_or_default())
                    .collect()
            })
            .collect();

        Self {
            columns,
            data,
            rows: records.len(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn num_rows(&self) -> usize {
        self.rows
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// All values of one column
    pub fn column(&self, name: &str) -> Option<&[Value]> {
        let index = self.columns.iter().position(|c| c == name)?;
        Some(&self.data[index])
    }

    /// Row `index` as a record
    pub fn row(&self, index: usize) -> Option<Record> {
        if index >= self.rows {
            return None;
        }
        Some(
            self.columns
                .iter()
                .zip(&self.data)
                .map(|(name, values)| (name.clone(), values[index].clone()))
                .collect(),
        )
    }

    pub fn to_records(&self) -> Vec<Record> {
        (0..self.rows).filter_map(|i| self.row(i)).collect()
    }

    /// Row-oriented JSON: an array of objects
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self.to_records()).unwrap_or(serde_json::Value::Null)
    }
}
