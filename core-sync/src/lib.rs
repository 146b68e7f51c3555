//! # Sync Module
//!
//! Reconciles remote albums with the membership computed from the local
//! collection.
//!
//! ## Components
//!
//! - **Run State Machine** (`job`): forward-only phases of one run
//! - **Retry** (`retry`): bounded retry of transient remote failures
//! - **Remote Catalog** (`catalog`): pagination, batching and pretend mode over a
//!   `PhotoLibraryProvider`
//! - **Reconciler** (`reconciler`): diffs and the add, remove and create-albums flows
//! - **Reports** (`report`): per-run outcome of every command

pub mod catalog;
pub mod error;
pub mod job;
pub mod reconciler;
pub mod report;
pub mod retry;

pub use catalog::{BatchReport, CreationReport, FailedBatch, MediaPager, RemoteCatalog};
pub use error::{Result, SyncError};
pub use job::{RunId, RunPhase, SyncRun};
pub use reconciler::{
    backfill_remote_ids, compute_removals, compute_upload_diff, parse_remote_creation_time,
    remote_photo, Reconciler, UploadDiff,
};
pub use report::{AlbumOutcome, AlbumStatus, RunReport, UploadSummary};
pub use retry::with_retry;
