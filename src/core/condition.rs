//! Numeric conditions evaluated against step property files

use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Error evaluating a condition
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConditionError {
    #[error("Path '{path}' not found in property file '{property_file}'")]
    MissingField { property_file: String, path: String },

    #[error("Path '{path}' in property file '{property_file}' is not a number: {value}")]
    NotANumber {
        property_file: String,
        path: String,
        value: String,
    },

    #[error("Invalid JSON path '{0}'")]
    InvalidPath(String),
}

/// A JSON file produced by a step and exposed to later conditions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PropertyFile {
    /// Name conditions refer to
    #[serde(rename = "PropertyFileName")]
    pub name: String,

    /// Processing output the file is written under
    pub output_name: String,

    /// Path of the file relative to that output
    #[serde(rename = "FilePath")]
    pub path: String,
}

impl PropertyFile {
    pub fn new(name: &str, output_name: &str, path: &str) -> Self {
        Self {
            name: name.to_string(),
            output_name: output_name.to_string(),
            path: path.to_string(),
        }
    }
}

/// Reads a value out of a step's property file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonGet {
    pub step_name: String,
    pub property_file: String,
    pub json_path: String,
}

impl JsonGet {
    /// Resolve the path in a parsed property file
    pub fn resolve<'a>(&self, report: &'a Value) -> Result<&'a Value, ConditionError> {
        let mut current = report;
        for segment in parse_path(&self.json_path)? {
            let next = match segment {
                PathSegment::Field(name) => current.get(name),
                PathSegment::Index(i) => current.get(i),
            };
            current = next.ok_or_else(|| ConditionError::MissingField {
                property_file: self.property_file.clone(),
                path: self.json_path.clone(),
            })?;
        }
        Ok(current)
    }

    /// Resolve the path and require a number
    pub fn resolve_number(&self, report: &Value) -> Result<f64, ConditionError> {
        let value = self.resolve(report)?;
        value.as_f64().ok_or_else(|| ConditionError::NotANumber {
            property_file: self.property_file.clone(),
            path: self.json_path.clone(),
            value: value.to_string(),
        })
    }
}

impl Serialize for JsonGet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut outer = serializer.serialize_map(Some(1))?;
        outer.serialize_entry(
            "Std:JsonGet",
            &serde_json::json!({
                "PropertyFile": {
                    "Get": format!("Steps.{}.PropertyFiles.{}", self.step_name, self.property_file)
                },
                "Path": self.json_path,
            }),
        )?;
        outer.end()
    }
}

enum PathSegment<'a> {
    Field(&'a str),
    Index(usize),
}

/// Split `a.b[0].c` into field and index segments
fn parse_path(path: &str) -> Result<Vec<PathSegment<'_>>, ConditionError> {
    let invalid = || ConditionError::InvalidPath(path.to_string());
    let mut segments = Vec::new();

    for part in path.split('.') {
        let (field, mut rest) = match part.find('[') {
            Some(i) => (&part[..i], &part[i..]),
            None => (part, ""),
        };
        if field.is_empty() && rest.is_empty() {
            return Err(invalid());
        }
        if !field.is_empty() {
            segments.push(PathSegment::Field(field));
        }
        while !rest.is_empty() {
            let close = rest.find(']').ok_or_else(invalid)?;
            let index = rest[1..close].parse::<usize>().map_err(|_| invalid())?;
            segments.push(PathSegment::Index(index));
            rest = &rest[close + 1..];
            if !rest.is_empty() && !rest.starts_with('[') {
                return Err(invalid());
            }
        }
    }

    Ok(segments)
}

/// Comparison between a property-file value and a constant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    GreaterThanOrEqualTo,
    LessThanOrEqualTo,
}

impl Comparator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Comparator::GreaterThanOrEqualTo => "GreaterThanOrEqualTo",
            Comparator::LessThanOrEqualTo => "LessThanOrEqualTo",
        }
    }

    pub fn compare(&self, left: f64, right: f64) -> bool {
        match self {
            Comparator::GreaterThanOrEqualTo => left >= right,
            Comparator::LessThanOrEqualTo => left <= right,
        }
    }
}

/// A numeric gate on a property-file value
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub comparator: Comparator,
    pub left: JsonGet,
    pub right: f64,
}

impl Condition {
    pub fn greater_or_equal(left: JsonGet, right: f64) -> Self {
        Self {
            comparator: Comparator::GreaterThanOrEqualTo,
            left,
            right,
        }
    }

    pub fn less_or_equal(left: JsonGet, right: f64) -> Self {
        Self {
            comparator: Comparator::LessThanOrEqualTo,
            left,
            right,
        }
    }

    /// Evaluate against the property file named by `left`
    pub fn evaluate(&self, report: &Value) -> Result<bool, ConditionError> {
        let left = self.left.resolve_number(report)?;
        Ok(self.comparator.compare(left, self.right))
    }
}

impl Serialize for Condition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("Type", self.comparator.as_str())?;
        map.serialize_entry("LeftValue", &self.left)?;
        map.serialize_entry("RightValue", &self.right)?;
        map.end()
    }
}
