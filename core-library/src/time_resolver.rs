//! Capture time resolution
//!
//! Cameras record the capture time in several partially overlapping tags and
//! often omit the UTC offset. [`TimeResolver`] turns one metadata record into a
//! timezone-aware timestamp, trying in order:
//!
//! 1. the combined sub-second timestamp with offset
//! 2. the plain capture time plus the separate offset tag
//! 3. the plain capture time with the offset of an earlier photo of the run
//! 4. the plain capture time with the configured fallback offset
//!
//! A record without any usable capture time is an error: guessing the capture
//! time would silently misplace the photo in every time-window query.

use bridge_traits::metadata::MetadataRecord;
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone};
use core_runtime::config::parse_utc_offset;
use tracing::{debug, warn};

use crate::error::{LibraryError, Result};

const NAIVE_FORMAT: &str = "%Y:%m:%d %H:%M:%S%.f";
const ZONED_FORMAT: &str = "%Y:%m:%d %H:%M:%S%.f%z";

/// Resolves capture times, carrying the last seen offset across calls
///
/// One resolver is used per run; the carried offset follows input order, not
/// timestamp order.
#[derive(Debug, Clone)]
pub struct TimeResolver {
    fallback_offset: FixedOffset,
    last_offset: Option<FixedOffset>,
}

impl TimeResolver {
    pub fn new(fallback_offset: FixedOffset) -> Self {
        Self {
            fallback_offset,
            last_offset: None,
        }
    }

    /// Offset read from the most recent photo that carried one
    pub fn last_offset(&self) -> Option<FixedOffset> {
        self.last_offset
    }

    pub fn resolve(&mut self, record: &MetadataRecord) -> Result<DateTime<FixedOffset>> {
        if let Some(combined) = record.sub_sec_date_time_original.as_deref() {
            match parse_zoned(combined) {
                Some(time) => {
                    self.last_offset = Some(*time.offset());
                    return Ok(time);
                }
                None => debug!(
                    file = %record.source_file,
                    value = combined,
                    "Sub-second capture time has no usable offset"
                ),
            }
        }

        let Some(naive) = naive_capture_time(record) else {
            return Err(LibraryError::MissingCaptureTime {
                path: record.source_file.clone(),
            });
        };

        if let Some(raw_offset) = record.offset_time_original.as_deref() {
            match parse_utc_offset(raw_offset) {
                Ok(offset) => {
                    if let Some(time) = localize(naive, offset) {
                        self.last_offset = Some(offset);
                        return Ok(time);
                    }
                }
                Err(e) => warn!(file = %record.source_file, error = %e, "Ignoring unreadable offset tag"),
            }
        }

        if let Some(offset) = self.last_offset {
            warn!(
                file = %record.source_file,
                offset = %offset,
                "Capture time has no UTC offset, borrowing the offset of the previous photo"
            );
            if let Some(time) = localize(naive, offset) {
                return Ok(time);
            }
        }

        warn!(
            file = %record.source_file,
            offset = %self.fallback_offset,
            "Capture time has no UTC offset and none was seen before, assuming the fallback offset. \
             This may be wrong; set it in the file, e.g. `exiftool -OffsetTimeOriginal=+02:00 <file>`"
        );
        localize(naive, self.fallback_offset).ok_or_else(|| LibraryError::MissingCaptureTime {
            path: record.source_file.clone(),
        })
    }
}

/// Parse `2019:04:09 11:12:51.20+02:00`, accepting the offset with or without colon.
fn parse_zoned(value: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_str(&normalize_offset(value.trim()), ZONED_FORMAT).ok()
}

/// Rewrite a trailing `+hh:mm` offset as `+hhmm`.
pub fn normalize_offset(value: &str) -> String {
    let bytes = value.as_bytes();
    let len = bytes.len();
    if len >= 6
        && matches!(bytes[len - 6], b'+' | b'-')
        && bytes[len - 3] == b':'
        && bytes[len - 5..len - 3].iter().all(u8::is_ascii_digit)
        && bytes[len - 2..].iter().all(u8::is_ascii_digit)
    {
        format!("{}{}", &value[..len - 3], &value[len - 2..])
    } else {
        value.to_string()
    }
}

fn naive_capture_time(record: &MetadataRecord) -> Option<NaiveDateTime> {
    let parse = |value: &str| NaiveDateTime::parse_from_str(value.trim(), NAIVE_FORMAT).ok();

    record
        .date_time_original
        .as_deref()
        .and_then(parse)
        .or_else(|| {
            // A combined value without offset still carries the wall-clock time.
            record.sub_sec_date_time_original.as_deref().and_then(parse)
        })
}

fn localize(naive: NaiveDateTime, offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
    offset.from_local_datetime(&naive).single()
}
