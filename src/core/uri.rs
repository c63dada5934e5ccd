//! Storage URIs of the form `scheme://bucket/prefix/...`

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error parsing a storage URI
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UriError {
    #[error("Storage URI '{0}' has no scheme (expected scheme://bucket/...)")]
    MissingScheme(String),

    #[error("Storage URI '{0}' has no bucket")]
    MissingBucket(String),
}

/// A parsed storage location
///
/// The raw text is kept as given: the preprocessing job derives object keys
/// from its `/`-separated segments, trailing slash included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageUri {
    raw: String,
    bucket: String,
}

impl StorageUri {
    pub fn parse(raw: &str) -> Result<Self, UriError> {
        let (_, rest) = raw
            .split_once("://")
            .filter(|(scheme, _)| !scheme.is_empty())
            .ok_or_else(|| UriError::MissingScheme(raw.to_string()))?;

        let bucket = rest.split('/').next().unwrap_or_default();
        if bucket.is_empty() {
            return Err(UriError::MissingBucket(raw.to_string()));
        }

        Ok(Self {
            raw: raw.to_string(),
            bucket: bucket.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// First path segment after the bucket (empty when there is none)
    pub fn prefix(&self) -> &str {
        self.raw.split('/').nth(3).unwrap_or_default()
    }

    /// Second-to-last `/`-separated segment of the raw text
    ///
    /// `s3://bucket/data/` yields `data`; `s3://bucket/data` yields `bucket`.
    pub fn parent_segment(&self) -> &str {
        let segments: Vec<&str> = self.raw.split('/').collect();
        segments
            .len()
            .checked_sub(2)
            .and_then(|i| segments.get(i).copied())
            .unwrap_or_default()
    }
}

impl fmt::Display for StorageUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for StorageUri {
    type Err = UriError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for StorageUri {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for StorageUri {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bucket_and_prefix() {
        let uri = StorageUri::parse("s3://smartapps-studio-data-bucket/csv/part.csv").unwrap();
        assert_eq!(uri.bucket(), "smartapps-studio-data-bucket");
        assert_eq!(uri.prefix(), "csv");
    }

    #[test]
    fn test_bucket_only() {
        let uri = StorageUri::parse("s3://bucket").unwrap();
        assert_eq!(uri.bucket(), "bucket");
        assert_eq!(uri.prefix(), "");
    }

    #[test]
    fn test_parent_segment() {
        let with_slash = StorageUri::parse("s3://model-bucket/data/").unwrap();
        assert_eq!(with_slash.parent_segment(), "data");

        let without_slash = StorageUri::parse("s3://model-bucket/data").unwrap();
        assert_eq!(without_slash.parent_segment(), "model-bucket");

        let nested = StorageUri::parse("s3://model-bucket/a/b/").unwrap();
        assert_eq!(nested.parent_segment(), "b");
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(matches!(
            StorageUri::parse("bucket/data"),
            Err(UriError::MissingScheme(_))
        ));
        assert!(matches!(
            StorageUri::parse("s3:///data"),
            Err(UriError::MissingBucket(_))
        ));
        assert!(matches!(
            StorageUri::parse("://bucket"),
            Err(UriError::MissingScheme(_))
        ));
    }

    #[test]
    fn test_serde_as_string() {
        let uri: StorageUri = serde_json::from_str("\"s3://b/p/\"").unwrap();
        assert_eq!(uri.bucket(), "b");
        assert_eq!(serde_json::to_string(&uri).unwrap(), "\"s3://b/p/\"");
        assert!(serde_json::from_str::<StorageUri>("\"not-a-uri\"").is_err());
    }
}
