//! # Run State Machine
//!
//! Tracks the phases of one reconciliation run.
//!
//! ## State Machine
//!
//! ```text
//! Init → LocalMatched → RemoteQueried → Diffed → Uploaded → AlbumsEnsured → Applied → Done
//! ```
//!
//! Phases only move forward. A command may skip phases it has no use for (the
//! remove path never uploads), but no phase is entered twice. Nothing about a
//! run outlives the process; the next run starts again at `Init`.

use crate::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use tracing::debug;
use uuid::Uuid;

/// Unique identifier for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(Uuid);

impl RunId {
    /// Create a new random run ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Phase of a run, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Init,
    LocalMatched,
    RemoteQueried,
    Diffed,
    Uploaded,
    AlbumsEnsured,
    Applied,
    Done,
}

impl RunPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunPhase::Init => "init",
            RunPhase::LocalMatched => "local_matched",
            RunPhase::RemoteQueried => "remote_queried",
            RunPhase::Diffed => "diffed",
            RunPhase::Uploaded => "uploaded",
            RunPhase::AlbumsEnsured => "albums_ensured",
            RunPhase::Applied => "applied",
            RunPhase::Done => "done",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunPhase::Done)
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One reconciliation run
#[derive(Debug, Clone)]
pub struct SyncRun {
    pub id: RunId,
    /// CLI command that started the run
    pub command: String,
    phase: RunPhase,
    history: Vec<RunPhase>,
    started_at: Instant,
}

impl SyncRun {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            id: RunId::new(),
            command: command.into(),
            phase: RunPhase::Init,
            history: vec![RunPhase::Init],
            started_at: Instant::now(),
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Phases entered so far, in order
    pub fn history(&self) -> &[RunPhase] {
        &self.history
    }

    /// Move to a later phase.
    ///
    /// # Errors
    ///
    /// Returns `InvalidStateTransition` when `to` is not after the current phase.
    pub fn advance(&mut self, to: RunPhase) -> Result<()> {
        if to <= self.phase {
            return Err(SyncError::InvalidStateTransition {
                from: self.phase.to_string(),
                to: to.to_string(),
                reason: if self.phase.is_terminal() {
                    "run already finished".to_string()
                } else {
                    "phases cannot be revisited".to_string()
                },
            });
        }

        debug!(run_id = %self.id, from = %self.phase, to = %to, "Run phase changed");
        self.phase = to;
        self.history.push(to);
        Ok(())
    }

    pub fn finish(&mut self) -> Result<()> {
        self.advance(RunPhase::Done)
    }

    pub fn elapsed_ms(&self) -> u128 {
        self.started_at.elapsed().as_millis()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_id_is_unique() {
        assert_ne!(RunId::new(), RunId::new());
    }

    #[test]
    fn test_new_run_starts_at_init() {
        let run = SyncRun::new("add-to-albums");
        assert_eq!(run.phase(), RunPhase::Init);
        assert_eq!(run.history(), &[RunPhase::Init]);
    }

    #[test]
    fn test_full_add_workflow() {
        let mut run = SyncRun::new("add-to-albums");
        for phase in [
            RunPhase::LocalMatched,
            RunPhase::RemoteQueried,
            RunPhase::Diffed,
            RunPhase::Uploaded,
            RunPhase::AlbumsEnsured,
            RunPhase::Applied,
        ] {
            run.advance(phase).unwrap();
        }
        run.finish().unwrap();

        assert_eq!(run.phase(), RunPhase::Done);
        assert_eq!(run.history().len(), 8);
    }

    #[test]
    fn test_phases_may_be_skipped() {
        let mut run = SyncRun::new("remove-from-albums");
        run.advance(RunPhase::LocalMatched).unwrap();
        run.advance(RunPhase::Applied).unwrap();
        assert!(run.finish().is_ok());
    }

    #[test]
    fn test_phase_cannot_be_revisited() {
        let mut run = SyncRun::new("add-to-albums");
        run.advance(RunPhase::Diffed).unwrap();

        let err = run.advance(RunPhase::RemoteQueried).unwrap_err();
        assert!(matches!(err, SyncError::InvalidStateTransition { .. }));
        assert!(run.advance(RunPhase::Diffed).is_err());
        assert_eq!(run.phase(), RunPhase::Diffed);
    }

    #[test]
    fn test_finished_run_is_terminal() {
        let mut run = SyncRun::new("create-missing-albums");
        run.finish().unwrap();

        let err = run.finish().unwrap_err();
        assert!(err.to_string().contains("run already finished"));
    }
}
