//! Run reports
//!
//! Recoverable problems (failed uploads, failed batches, albums that could not
//! be resolved) end up here instead of aborting the run.

use tracing::{info, warn};

use crate::catalog::BatchReport;
use crate::job::RunId;

/// Outcome of the upload phase
#[derive(Debug, Clone, Default)]
pub struct UploadSummary {
    /// Desired photos not found remotely
    pub requested: usize,

    /// Desired photos already present remotely; their metadata is not refreshed
    pub already_remote: usize,

    /// Photos turned into media items
    pub uploaded: usize,

    /// Short paths of photos whose upload or creation failed
    pub failed: Vec<String>,

    /// Media item creation batches
    pub batches: BatchReport,

    pub simulated: bool,
}

/// What happened to one album
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlbumStatus {
    /// Batches were sent (or simulated)
    Applied,
    /// Nothing to do
    Unchanged,
    /// The album could not be processed; the run moved on
    Skipped { reason: String },
}

#[derive(Debug, Clone)]
pub struct AlbumOutcome {
    pub album: String,
    pub status: AlbumStatus,
    pub report: BatchReport,
}

impl AlbumOutcome {
    pub fn applied(album: impl Into<String>, report: BatchReport) -> Self {
        Self {
            album: album.into(),
            status: AlbumStatus::Applied,
            report,
        }
    }

    pub fn unchanged(album: impl Into<String>) -> Self {
        Self {
            album: album.into(),
            status: AlbumStatus::Unchanged,
            report: BatchReport::default(),
        }
    }

    pub fn skipped(album: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            album: album.into(),
            status: AlbumStatus::Skipped {
                reason: reason.into(),
            },
            report: BatchReport::default(),
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self.status, AlbumStatus::Skipped { .. }) && self.report.failed_batches.is_empty()
    }
}

/// Summary of one command
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: RunId,
    pub command: String,
    pub photos_matched: usize,
    pub upload: Option<UploadSummary>,
    pub albums_created: Vec<String>,
    pub albums: Vec<AlbumOutcome>,
}

impl RunReport {
    pub fn new(run_id: RunId, command: impl Into<String>) -> Self {
        Self {
            run_id,
            command: command.into(),
            photos_matched: 0,
            upload: None,
            albums_created: Vec::new(),
            albums: Vec::new(),
        }
    }

    /// Whether anything was left undone
    pub fn has_failures(&self) -> bool {
        self.upload
            .as_ref()
            .is_some_and(|upload| !upload.failed.is_empty())
            || self.albums.iter().any(|album| !album.is_success())
    }

    pub fn items_added_or_removed(&self) -> usize {
        self.albums.iter().map(|album| album.report.applied).sum()
    }

    pub fn failed_batches(&self) -> usize {
        self.albums
            .iter()
            .map(|album| album.report.failed_batches.len())
            .sum::<usize>()
            + self
                .upload
                .as_ref()
                .map_or(0, |upload| upload.batches.failed_batches.len())
    }

    pub fn log_summary(&self) {
        if let Some(upload) = &self.upload {
            info!(
                run_id = %self.run_id,
                requested = upload.requested,
                already_remote = upload.already_remote,
                uploaded = upload.uploaded,
                failed = upload.failed.len(),
                simulated = upload.simulated,
                "Upload summary"
            );
        }

        for album in &self.albums {
            match &album.status {
                AlbumStatus::Skipped { reason } => {
                    warn!(run_id = %self.run_id, album = %album.album, reason = %reason, "Album skipped")
                }
                status => info!(
                    run_id = %self.run_id,
                    album = %album.album,
                    status = ?status,
                    items = album.report.applied,
                    failed_batches = album.report.failed_batches.len(),
                    missing_remote_ids = album.report.missing_remote_ids.len(),
                    "Album summary"
                ),
            }
        }

        info!(
            run_id = %self.run_id,
            command = %self.command,
            photos = self.photos_matched,
            albums_created = self.albums_created.len(),
            items = self.items_added_or_removed(),
            failed_batches = self.failed_batches(),
            "Run finished"
        );
    }
}
