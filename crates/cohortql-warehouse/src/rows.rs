//! Row sets returned by a warehouse.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, WarehouseError};

/// Column names plus row values in column order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl QueryRows {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Vec<Value>) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().map(|values| Row {
            columns: &self.columns,
            values,
        })
    }

    /// Read a non-null INT64 from a single-row result.
    pub fn single_i64(&self, column: &str) -> Result<i64> {
        let row = self
            .iter()
            .next()
            .ok_or_else(|| WarehouseError::execution("query returned no rows"))?;
        row.get_i64(column)?
            .ok_or_else(|| WarehouseError::type_mismatch(column, "a non-null INT64"))
    }
}

/// Borrowed view over one row with typed accessors.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    columns: &'a [String],
    values: &'a [Value],
}

impl<'a> Row<'a> {
    fn value(&self, column: &str) -> Result<&'a Value> {
        let index = self
            .columns
            .iter()
            .position(|c| c == column)
            .ok_or_else(|| WarehouseError::missing_column(column))?;
        self.values
            .get(index)
            .ok_or_else(|| WarehouseError::missing_column(column))
    }

    pub fn get_i64(&self, column: &str) -> Result<Option<i64>> {
        match self.value(column)? {
            Value::Null => Ok(None),
            // Some drivers return INT64 as a JSON string.
            Value::String(s) => s
                .parse()
                .map(Some)
                .map_err(|_| WarehouseError::type_mismatch(column, "an INT64")),
            v => v
                .as_i64()
                .map(Some)
                .ok_or_else(|| WarehouseError::type_mismatch(column, "an INT64")),
        }
    }

    pub fn get_f64(&self, column: &str) -> Result<Option<f64>> {
        match self.value(column)? {
            Value::Null => Ok(None),
            v => v
                .as_f64()
                .map(Some)
                .ok_or_else(|| WarehouseError::type_mismatch(column, "a FLOAT64")),
        }
    }

    pub fn get_str(&self, column: &str) -> Result<Option<&'a str>> {
        match self.value(column)? {
            Value::Null => Ok(None),
            v => v
                .as_str()
                .map(Some)
                .ok_or_else(|| WarehouseError::type_mismatch(column, "a STRING")),
        }
    }
}
