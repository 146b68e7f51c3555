//! # Core Configuration Module
//!
//! Provides the explicit configuration value shared by the matcher, the remote
//! catalog and the reconciler.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`.
//! Every field has a default; the builder only overrides what the caller sets and
//! then runs fail-fast validation, so a `CoreConfig` that exists is always usable.
//! There is no process-wide instance: the value is passed to each component that
//! needs it.
//!
//! ## Usage
//!
//! ```
//! use core_runtime::config::CoreConfig;
//!
//! let config = CoreConfig::builder()
//!     .album_config_path("albums.yaml")
//!     .path_shortening_pattern(".*/Photos/")
//!     .pretend(true)
//!     .build()
//!     .expect("valid configuration");
//!
//! assert_eq!(config.album_batch_size, 40);
//! ```
//!
//! ## Error Handling
//!
//! Invalid values produce an actionable [`Error::Config`]:
//!
//! ```should_panic
//! use core_runtime::config::CoreConfig;
//!
//! let config = CoreConfig::builder()
//!     .upload_batch_size(0)
//!     .build()
//!     .expect("Should fail - batch size must be positive");
//! ```

use crate::error::{Error, Result};
use chrono::{Duration as TimeWindow, FixedOffset, Offset, Utc};
use regex::Regex;
use std::path::PathBuf;
use std::time::Duration;

/// Largest batch accepted by the remote batch endpoints.
pub const MAX_REMOTE_BATCH_SIZE: usize = 50;

/// Largest page size accepted by media searches.
pub const MAX_SEARCH_PAGE_SIZE: u32 = 100;

/// Largest page size accepted by album and media listings.
pub const MAX_LIST_PAGE_SIZE: u32 = 50;

/// Configuration for one run of the photo sync core.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// YAML document mapping album names to rules
    pub album_config_path: PathBuf,

    /// Regular expression removed from full paths to form short paths
    pub path_shortening_pattern: String,

    /// Offset assumed for capture times when no photo of the run carried one
    pub fallback_utc_offset: FixedOffset,

    /// File extensions considered photos (case-sensitive)
    pub photo_extensions: Vec<String>,

    /// Upload tokens per media-item creation call
    pub upload_batch_size: usize,

    /// Media ids per add/remove album call
    pub album_batch_size: usize,

    /// Page size of filtered media searches
    pub search_page_size: u32,

    /// Page size of album and media listings
    pub list_page_size: u32,

    /// Attempts per remote call before it is reported as failed
    pub max_attempts: u32,

    /// Delay before the first retry; doubled for each further retry
    pub retry_base_delay: Duration,

    /// Widening of the remove window below the oldest desired photo
    pub remove_window_padding: TimeWindow,

    /// Log mutations instead of performing them
    pub pretend: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            album_config_path: PathBuf::from("albums.yaml"),
            path_shortening_pattern: ".*/Photos/".to_string(),
            fallback_utc_offset: FixedOffset::east_opt(2 * 3600).unwrap_or_else(|| Utc.fix()),
            photo_extensions: vec!["jpg".to_string(), "JPG".to_string()],
            upload_batch_size: 25,
            album_batch_size: 40,
            search_page_size: MAX_SEARCH_PAGE_SIZE,
            list_page_size: MAX_LIST_PAGE_SIZE,
            max_attempts: 3,
            retry_base_delay: Duration::from_millis(100),
            remove_window_padding: TimeWindow::zero(),
            pretend: false,
        }
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - The album config path is not empty
    /// - The path shortening pattern compiles
    /// - At least one photo extension is configured
    /// - Batch and page sizes are within the remote service limits
    /// - At least one attempt is allowed per remote call
    /// - The remove window padding is not negative
    pub fn validate(&self) -> Result<()> {
        if self.album_config_path.as_os_str().is_empty() {
            return Err(Error::Config(
                "Album config path cannot be empty".to_string(),
            ));
        }

        Regex::new(&self.path_shortening_pattern).map_err(|e| {
            Error::Config(format!(
                "Path shortening pattern '{}' is not a valid regular expression: {}",
                self.path_shortening_pattern, e
            ))
        })?;

        if self.photo_extensions.iter().all(|ext| ext.trim().is_empty()) {
            return Err(Error::Config(
                "At least one photo extension is required".to_string(),
            ));
        }

        check_range("upload_batch_size", self.upload_batch_size, 1, MAX_REMOTE_BATCH_SIZE)?;
        check_range("album_batch_size", self.album_batch_size, 1, MAX_REMOTE_BATCH_SIZE)?;
        check_range(
            "search_page_size",
            self.search_page_size as usize,
            1,
            MAX_SEARCH_PAGE_SIZE as usize,
        )?;
        check_range(
            "list_page_size",
            self.list_page_size as usize,
            1,
            MAX_LIST_PAGE_SIZE as usize,
        )?;

        if self.max_attempts == 0 {
            return Err(Error::Config(
                "max_attempts must be at least 1".to_string(),
            ));
        }

        if self.remove_window_padding < TimeWindow::zero() {
            return Err(Error::Config(
                "remove_window_padding cannot be negative".to_string(),
            ));
        }

        Ok(())
    }

    /// Compiled form of [`CoreConfig::path_shortening_pattern`].
    pub fn path_shortening_regex(&self) -> Result<Regex> {
        Regex::new(&self.path_shortening_pattern)
            .map_err(|e| Error::Config(format!("Invalid path shortening pattern: {}", e)))
    }
}

fn check_range(name: &str, value: usize, min: usize, max: usize) -> Result<()> {
    if value < min || value > max {
        return Err(Error::Config(format!(
            "{} must be between {} and {} (got {})",
            name, min, max, value
        )));
    }
    Ok(())
}

/// Parse a UTC offset such as `+02:00`, `-0530` or `Z`.
pub fn parse_utc_offset(value: &str) -> Result<FixedOffset> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("z") {
        return Ok(Utc.fix());
    }

    let invalid = || Error::Config(format!("Invalid UTC offset '{}'; expected e.g. +02:00", value));

    let (sign, digits) = match value.as_bytes().first() {
        Some(b'+') => (1, &value[1..]),
        Some(b'-') => (-1, &value[1..]),
        _ => return Err(invalid()),
    };
    let digits = digits.replace(':', "");
    if digits.len() != 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    let hours: i32 = digits[..2].parse().map_err(|_| invalid())?;
    let minutes: i32 = digits[2..].parse().map_err(|_| invalid())?;
    if minutes >= 60 {
        return Err(invalid());
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}

/// Builder for [`CoreConfig`]
///
/// Unset fields keep their defaults; `build()` validates the result.
#[derive(Debug, Default)]
pub struct CoreConfigBuilder {
    album_config_path: Option<PathBuf>,
    path_shortening_pattern: Option<String>,
    fallback_utc_offset: Option<FixedOffset>,
    photo_extensions: Option<Vec<String>>,
    upload_batch_size: Option<usize>,
    album_batch_size: Option<usize>,
    search_page_size: Option<u32>,
    list_page_size: Option<u32>,
    max_attempts: Option<u32>,
    retry_base_delay: Option<Duration>,
    remove_window_padding: Option<TimeWindow>,
    pretend: Option<bool>,
}

impl CoreConfigBuilder {
    /// Sets the album rules file.
    pub fn album_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.album_config_path = Some(path.into());
        self
    }

    /// Sets the regular expression stripped from full paths.
    ///
    /// # Examples
    ///
    /// ```
    /// use core_runtime::config::CoreConfig;
    ///
    /// let config = CoreConfig::builder()
    ///     .path_shortening_pattern("^/mnt/share/")
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.path_shortening_pattern, "^/mnt/share/");
    /// ```
    pub fn path_shortening_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.path_shortening_pattern = Some(pattern.into());
        self
    }

    pub fn fallback_utc_offset(mut self, offset: FixedOffset) -> Self {
        self.fallback_utc_offset = Some(offset);
        self
    }

    pub fn photo_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.photo_extensions = Some(extensions.into_iter().map(Into::into).collect());
        self
    }

    pub fn upload_batch_size(mut self, size: usize) -> Self {
        self.upload_batch_size = Some(size);
        self
    }

    pub fn album_batch_size(mut self, size: usize) -> Self {
        self.album_batch_size = Some(size);
        self
    }

    pub fn search_page_size(mut self, size: u32) -> Self {
        self.search_page_size = Some(size);
        self
    }

    pub fn list_page_size(mut self, size: u32) -> Self {
        self.list_page_size = Some(size);
        self
    }

    /// Sets the number of attempts per remote call (1 disables retries).
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    pub fn retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = Some(delay);
        self
    }

    /// Sets how far below the oldest desired photo the remove window starts.
    pub fn remove_window_padding(mut self, padding: TimeWindow) -> Self {
        self.remove_window_padding = Some(padding);
        self
    }

    /// Enables dry-run mode.
    pub fn pretend(mut self, pretend: bool) -> Self {
        self.pretend = Some(pretend);
        self
    }

    /// Builds the `CoreConfig` instance.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if any value fails [`CoreConfig::validate`].
    pub fn build(self) -> Result<CoreConfig> {
        let defaults = CoreConfig::default();

        let config = CoreConfig {
            album_config_path: self.album_config_path.unwrap_or(defaults.album_config_path),
            path_shortening_pattern: self
                .path_shortening_pattern
                .unwrap_or(defaults.path_shortening_pattern),
            fallback_utc_offset: self
                .fallback_utc_offset
                .unwrap_or(defaults.fallback_utc_offset),
            photo_extensions: self.photo_extensions.unwrap_or(defaults.photo_extensions),
            upload_batch_size: self.upload_batch_size.unwrap_or(defaults.upload_batch_size),
            album_batch_size: self.album_batch_size.unwrap_or(defaults.album_batch_size),
            search_page_size: self.search_page_size.unwrap_or(defaults.search_page_size),
            list_page_size: self.list_page_size.unwrap_or(defaults.list_page_size),
            max_attempts: self.max_attempts.unwrap_or(defaults.max_attempts),
            retry_base_delay: self.retry_base_delay.unwrap_or(defaults.retry_base_delay),
            remove_window_padding: self
                .remove_window_padding
                .unwrap_or(defaults.remove_window_padding),
            pretend: self.pretend.unwrap_or(defaults.pretend),
        };

        config.validate()?;

        Ok(config)
    }
}
