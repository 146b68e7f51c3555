//! Photo entity
//!
//! A [`Photo`] is identified by its short path alone: equality and hashing look
//! at nothing else. This lets a locally matched photo and the remote item it
//! was uploaded as collapse to one element in set arithmetic even though their
//! timestamps, keywords and remote fields differ.
//!
//! Ordering is deliberately not `Ord`: photos are ordered by creation time with
//! the explicit [`Photo::cmp_by_creation_time`] comparator, which would
//! contradict short-path equality if it were the type's natural order.

use chrono::{DateTime, FixedOffset};
use regex::Regex;
use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

/// One photo, local or already uploaded
#[derive(Debug, Clone)]
pub struct Photo {
    short_path: String,

    /// Local file, absent for remote-only photos
    pub full_path: Option<PathBuf>,

    pub creation_time: Option<DateTime<FixedOffset>>,

    /// Keywords in file order, possibly empty
    pub keywords: Vec<String>,

    /// Remote media item id, once known
    pub remote_id: Option<String>,

    pub remote_description: Option<String>,

    /// Opaque remote metadata, passed through
    pub remote_metadata: Option<serde_json::Value>,

    /// Set between the upload and the media item creation
    pub upload_token: Option<String>,
}

impl Photo {
    /// Photo read from the local collection
    pub fn local(
        short_path: impl Into<String>,
        full_path: impl Into<PathBuf>,
        creation_time: DateTime<FixedOffset>,
        keywords: Vec<String>,
    ) -> Self {
        Self {
            short_path: short_path.into(),
            full_path: Some(full_path.into()),
            creation_time: Some(creation_time),
            keywords,
            remote_id: None,
            remote_description: None,
            remote_metadata: None,
            upload_token: None,
        }
    }

    /// Photo sourced from the remote catalog
    pub fn remote(
        short_path: impl Into<String>,
        remote_id: impl Into<String>,
        creation_time: Option<DateTime<FixedOffset>>,
    ) -> Self {
        Self {
            short_path: short_path.into(),
            full_path: None,
            creation_time,
            keywords: Vec::new(),
            remote_id: Some(remote_id.into()),
            remote_description: None,
            remote_metadata: None,
            upload_token: None,
        }
    }

    /// Identity key of the photo
    pub fn short_path(&self) -> &str {
        &self.short_path
    }

    pub fn with_remote_id(mut self, remote_id: impl Into<String>) -> Self {
        self.remote_id = Some(remote_id.into());
        self
    }

    pub fn with_remote_details(
        mut self,
        description: Option<String>,
        metadata: Option<serde_json::Value>,
    ) -> Self {
        self.remote_description = description;
        self.remote_metadata = metadata;
        self
    }

    /// Order by creation time.
    ///
    /// Every photo in a valid flow has a creation time; a photo without one
    /// sorts first.
    pub fn cmp_by_creation_time(&self, other: &Self) -> Ordering {
        self.creation_time.cmp(&other.creation_time)
    }
}

impl PartialEq for Photo {
    fn eq(&self, other: &Self) -> bool {
        self.short_path == other.short_path
    }
}

impl Eq for Photo {}

impl Hash for Photo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.short_path.hash(state);
    }
}

/// Lets photo sets be queried by short path.
impl Borrow<str> for Photo {
    fn borrow(&self) -> &str {
        &self.short_path
    }
}

impl fmt::Display for Photo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short_path)
    }
}

/// Short path of a local file: every match of `pattern` is removed.
pub fn shorten_path(full_path: &Path, pattern: &Regex) -> String {
    pattern
        .replace_all(&full_path.to_string_lossy(), "")
        .into_owned()
}

/// Oldest and newest creation time among `photos`.
///
/// Photos without a creation time are ignored; `None` when no photo has one.
pub fn creation_time_bounds<'a, I>(photos: I) -> Option<(DateTime<FixedOffset>, DateTime<FixedOffset>)>
where
    I: IntoIterator<Item = &'a Photo>,
{
    photos
        .into_iter()
        .filter_map(|photo| photo.creation_time)
        .fold(None, |bounds, time| match bounds {
            None => Some((time, time)),
            Some((oldest, newest)) => Some((oldest.min(time), newest.max(time))),
        })
}
