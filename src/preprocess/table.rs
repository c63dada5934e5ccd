//! In-memory CSV table with column selection and min-max scaling

use anyhow::{bail, Context, Result};
use csv::{ReaderBuilder, StringRecord, Writer};
use serde_json::Value;
use std::collections::HashSet;

/// A CSV file held as text cells
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Parse CSV with a header row; every row must have the header's width
    pub fn from_csv(bytes: &[u8]) -> Result<Self> {
        let mut reader = ReaderBuilder::new().has_headers(true).from_reader(bytes);

        let headers: Vec<String> = reader
            .headers()
            .context("Failed to read CSV header")?
            .iter()
            .map(str::to_string)
            .collect();

        let mut seen = HashSet::new();
        let duplicates: Vec<&str> = headers
            .iter()
            .filter(|h| !seen.insert(*h))
            .map(String::as_str)
            .collect();
        if !duplicates.is_empty() {
            bail!("Duplicate CSV columns: {}", duplicates.join(", "));
        }

        let mut rows = Vec::new();
        for (i, record) in reader.records().enumerate() {
            let record: StringRecord =
                record.with_context(|| format!("Failed to read CSV row {}", i + 1))?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(Self { headers, rows })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Keep exactly `columns`, in that order
    pub fn select(&self, columns: &[&str]) -> Result<Self> {
        let missing: Vec<&str> = columns
            .iter()
            .copied()
            .filter(|c| self.column_index(c).is_none())
            .collect();
        if !missing.is_empty() {
            bail!("Input is missing required columns: {}", missing.join(", "));
        }

        let indices: Vec<usize> = columns
            .iter()
            .filter_map(|c| self.column_index(c))
            .collect();

        Ok(Self {
            headers: columns.iter().map(|c| c.to_string()).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
                .collect(),
        })
    }

    /// Rescale a numeric column to `(v - min) / (max - min)`; empty cells stay empty
    pub fn normalize(&mut self, column: &str, range: MinMax) -> Result<()> {
        let index = self
            .column_index(column)
            .ok_or_else(|| anyhow::anyhow!("Cannot normalize missing column '{}'", column))?;
        let span = range.max - range.min;
        if span == 0.0 {
            bail!("Cannot normalize '{}': min and max are both {}", column, range.min);
        }

        for (i, row) in self.rows.iter_mut().enumerate() {
            let cell = row[index].trim();
            if cell.is_empty() {
                continue;
            }
            let value: f64 = cell.parse().with_context(|| {
                format!("Row {} column '{}' is not a number: {}", i + 1, column, cell)
            })?;
            row[index] = ((value - range.min) / span).to_string();
        }

        Ok(())
    }

    pub fn to_csv(&self) -> Result<Vec<u8>> {
        let mut writer = Writer::from_writer(Vec::new());
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("Failed to flush CSV: {}", e.error()))
    }
}

/// Scaling bounds for one column
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinMax {
    pub min: f64,
    pub max: f64,
}

impl MinMax {
    /// Read `min-<column>` and `max-<column>` from a bounds object
    pub fn from_json(bounds: &Value, column: &str) -> Result<Self> {
        let read = |key: String| {
            bounds
                .get(&key)
                .and_then(Value::as_f64)
                .ok_or_else(|| anyhow::anyhow!("Bounds object has no numeric '{}'", key))
        };
        Ok(Self {
            min: read(format!("min-{}", column))?,
            max: read(format!("max-{}", column))?,
        })
    }
}
