//! Embedded Metadata Extraction
//!
//! Contract for the collaborator that reads embedded tags (IPTC keywords,
//! EXIF capture time) from local image files.
//!
//! The keyword tag is reported by extraction tools as a bare string when a file
//! carries one keyword and as a list when it carries several. [`MetadataRecord`]
//! normalises both shapes into an ordered `Vec<String>` during deserialization,
//! so nothing downstream ever branches on the raw shape.

use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::path::PathBuf;

use crate::error::Result;

/// Tag names requested from the extraction tool, in request order.
pub const REQUESTED_TAGS: &[&str] = &[
    "SourceFile",
    "IPTC:Keywords",
    "EXIF:DateTimeOriginal",
    "Composite:SubSecDateTimeOriginal",
    "EXIF:OffsetTimeOriginal",
];

/// Tags read from one local photo
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct MetadataRecord {
    /// Path of the file the record was read from
    #[serde(rename = "SourceFile")]
    pub source_file: String,

    /// Keywords in the order stored in the file (empty when the tag is absent)
    #[serde(
        rename = "IPTC:Keywords",
        default,
        deserialize_with = "deserialize_keywords"
    )]
    pub keywords: Vec<String>,

    /// Capture time without offset, e.g. `2019:04:09 11:12:51`
    #[serde(
        rename = "EXIF:DateTimeOriginal",
        default,
        deserialize_with = "deserialize_text"
    )]
    pub date_time_original: Option<String>,

    /// Capture time with sub-seconds and offset, e.g. `2019:04:09 11:12:51.20+02:00`
    #[serde(
        rename = "Composite:SubSecDateTimeOriginal",
        alias = "EXIF:SubSecDateTimeOriginal",
        default,
        deserialize_with = "deserialize_text"
    )]
    pub sub_sec_date_time_original: Option<String>,

    /// UTC offset of the capture time, e.g. `+02:00`
    #[serde(
        rename = "EXIF:OffsetTimeOriginal",
        default,
        deserialize_with = "deserialize_text"
    )]
    pub offset_time_original: Option<String>,
}

impl MetadataRecord {
    pub fn new(source_file: impl Into<String>) -> Self {
        Self {
            source_file: source_file.into(),
            ..Self::default()
        }
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_date_time_original(mut self, value: impl Into<String>) -> Self {
        self.date_time_original = Some(value.into());
        self
    }

    pub fn with_sub_sec_date_time_original(mut self, value: impl Into<String>) -> Self {
        self.sub_sec_date_time_original = Some(value.into());
        self
    }

    pub fn with_offset_time_original(mut self, value: impl Into<String>) -> Self {
        self.offset_time_original = Some(value.into());
        self
    }
}

/// Normalise a keyword tag value into an ordered list of strings.
///
/// Accepts a string, a number (tools emit numeric-looking keywords as JSON
/// numbers), a list of either, or null.
pub fn normalize_keywords(value: Value) -> Vec<String> {
    match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items.into_iter().flat_map(normalize_keywords).collect(),
        Value::String(s) => vec![s],
        other => vec![other.to_string()],
    }
}

fn deserialize_keywords<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(normalize_keywords(Value::deserialize(deserializer)?))
}

fn deserialize_text<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    })
}

/// Batch reader of embedded photo tags
///
/// Implementations acquire whatever handle the extraction tool needs, issue a
/// single batch request for all paths and release the handle before returning,
/// on success and on error alike.
///
/// Files that yield no usable record are left out of the result; the count
/// mismatch is not an error.
#[async_trait]
pub trait TagReader: Send + Sync {
    async fn read_tags(&self, paths: &[PathBuf]) -> Result<Vec<MetadataRecord>>;
}
