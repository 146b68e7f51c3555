//! Photo sync service façade and bootstrap helpers.
//!
//! This crate wires collaborator implementations (metadata extraction and the
//! remote photo library) into the sync core and exposes one method per CLI
//! command. Desktop builds use [`CoreDependencies::desktop`], which wires
//! `exiftool`, `reqwest` and the Google Photos connector.

pub mod error;

pub use error::{Result, ServiceError};
pub use core_sync::{AlbumOutcome, AlbumStatus, RunReport, UploadSummary};

use std::path::Path;
use std::sync::Arc;

use bridge_desktop::{scan_local_photos, ExifToolReader, ReqwestHttpClient};
use bridge_traits::{metadata::TagReader, photos::PhotoLibraryProvider};
use core_library::{AlbumMembership, AlbumRuleSet, Matcher};
use core_runtime::config::CoreConfig;
use core_sync::{Reconciler, RemoteCatalog, RunPhase, SyncRun};
use provider_google_photos::GooglePhotosConnector;
use tracing::{error, info, info_span, instrument, warn, Instrument};

pub const ADD_TO_ALBUMS: &str = "add-to-albums";
pub const REMOVE_FROM_ALBUMS: &str = "remove-from-albums";
pub const SYNC_TO_ALBUMS: &str = "sync-to-albums";
pub const CREATE_MISSING_ALBUMS: &str = "create-missing-albums";
pub const VALIDATE_ALBUMS_MAPPING: &str = "validate-albums-mapping";

/// Aggregated handle to the collaborators the service requires.
#[derive(Clone)]
pub struct CoreDependencies {
    pub tag_reader: Arc<dyn TagReader>,
    pub photo_library: Arc<dyn PhotoLibraryProvider>,
}

impl CoreDependencies {
    /// Construct a dependency bundle from explicit handles.
    pub fn new(tag_reader: Arc<dyn TagReader>, photo_library: Arc<dyn PhotoLibraryProvider>) -> Self {
        Self {
            tag_reader,
            photo_library,
        }
    }

    /// Desktop wiring: `exiftool` for metadata, Google Photos over `reqwest`.
    pub fn desktop(access_token: impl Into<String>) -> Result<Self> {
        let http_client = ReqwestHttpClient::new()
            .map_err(|e| ServiceError::InitializationFailed(e.to_string()))?;
        let connector = GooglePhotosConnector::new(Arc::new(http_client), access_token.into());
        Ok(Self::new(Arc::new(ExifToolReader::new()), Arc::new(connector)))
    }
}

/// Primary façade: one method per command.
pub struct PhotoSyncService {
    config: CoreConfig,
    rules: AlbumRuleSet,
    deps: CoreDependencies,
}

impl PhotoSyncService {
    pub fn new(config: CoreConfig, rules: AlbumRuleSet, deps: CoreDependencies) -> Self {
        Self {
            config,
            rules,
            deps,
        }
    }

    /// Load the album rules named by the configuration.
    pub fn load(config: CoreConfig, deps: CoreDependencies) -> Result<Self> {
        let rules = AlbumRuleSet::load(&config.album_config_path)?;
        Ok(Self::new(config, rules, deps))
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn rules(&self) -> &AlbumRuleSet {
        &self.rules
    }

    /// Keep only the named albums; an empty list keeps all of them.
    ///
    /// Fails, leaving the rules untouched, if any requested name is not configured.
    pub fn restrict_albums(&mut self, allow: &[String]) -> Result<()> {
        let names: Vec<String> = allow
            .iter()
            .filter(|name| self.rules.get(name).is_none())
            .cloned()
            .collect();
        if !names.is_empty() {
            return Err(ServiceError::UnknownAlbums {
                path: self.config.album_config_path.clone(),
                names,
            });
        }

        self.rules.retain_albums(allow);
        Ok(())
    }

    /// Report every problem of the album mapping.
    #[instrument(skip(self))]
    pub fn validate_albums_mapping(&self) -> Result<()> {
        let issues = self.rules.validate();
        if issues.is_empty() {
            info!(albums = self.rules.len(), "Album mapping is valid");
            return Ok(());
        }

        for issue in &issues {
            error!(album = %issue.album(), "{}", issue);
        }
        Err(ServiceError::InvalidAlbumMapping {
            path: self.config.album_config_path.clone(),
            issues,
        })
    }

    /// Upload missing photos and add every photo to its albums.
    pub async fn add_to_albums(&self, root: &Path) -> Result<RunReport> {
        let mut run = SyncRun::new(ADD_TO_ALBUMS);
        let span = info_span!("run", run_id = %run.id, command = ADD_TO_ALBUMS);
        self.run_add(&mut run, root).instrument(span).await
    }

    /// Remove photos that no longer match from their albums.
    pub async fn remove_from_albums(&self, root: &Path) -> Result<RunReport> {
        let mut run = SyncRun::new(REMOVE_FROM_ALBUMS);
        let span = info_span!("run", run_id = %run.id, command = REMOVE_FROM_ALBUMS);
        self.run_remove(&mut run, root).instrument(span).await
    }

    /// Create every configured album that is missing remotely.
    pub async fn create_missing_albums(&self) -> Result<RunReport> {
        let mut run = SyncRun::new(CREATE_MISSING_ALBUMS);
        let span = info_span!("run", run_id = %run.id, command = CREATE_MISSING_ALBUMS);
        self.run_create_albums(&mut run).instrument(span).await
    }

    /// Combined upload, add and remove pass. Not implemented.
    pub async fn sync_to_albums(&self, _root: &Path) -> Result<RunReport> {
        let mut run = SyncRun::new(SYNC_TO_ALBUMS);
        warn!(run_id = %run.id, "sync-to-albums is not implemented; use add-to-albums and remove-from-albums");
        run.finish()?;
        Ok(RunReport::new(run.id, SYNC_TO_ALBUMS))
    }

    async fn run_add(&self, run: &mut SyncRun, root: &Path) -> Result<RunReport> {
        let Some(membership) = self.match_local(run, root).await? else {
            let report = RunReport::new(run.id, ADD_TO_ALBUMS);
            return self.finish(run, report);
        };
        let report = self.reconciler().add_to_albums(run, membership).await?;
        self.finish(run, report)
    }

    async fn run_remove(&self, run: &mut SyncRun, root: &Path) -> Result<RunReport> {
        let Some(membership) = self.match_local(run, root).await? else {
            let report = RunReport::new(run.id, REMOVE_FROM_ALBUMS);
            return self.finish(run, report);
        };
        let report = self.reconciler().remove_from_albums(run, membership).await?;
        self.finish(run, report)
    }

    async fn run_create_albums(&self, run: &mut SyncRun) -> Result<RunReport> {
        let names: Vec<String> = self.rules.album_names().map(str::to_string).collect();
        let report = self.reconciler().create_missing_albums(run, &names).await?;
        self.finish(run, report)
    }

    fn reconciler(&self) -> Reconciler {
        let catalog = RemoteCatalog::new(self.deps.photo_library.clone(), &self.config);
        Reconciler::new(catalog, &self.config)
    }

    /// Scan, read metadata and match. `None` when there are no local photos.
    async fn match_local(&self, run: &mut SyncRun, root: &Path) -> Result<Option<AlbumMembership>> {
        // Rule problems surface before any file or remote access.
        let matcher = Matcher::new(&self.rules, &self.config)?;

        let paths = scan_local_photos(root, &self.config.photo_extensions)?;
        if paths.is_empty() {
            info!(root = %root.display(), "No photos found");
            return Ok(None);
        }
        info!(photos = paths.len(), root = %root.display(), "Found local photos");

        let records = self.deps.tag_reader.read_tags(&paths).await?;
        let membership = matcher.match_photos(&records)?;
        run.advance(RunPhase::LocalMatched)?;
        Ok(Some(membership))
    }

    fn finish(&self, run: &mut SyncRun, report: RunReport) -> Result<RunReport> {
        run.finish()?;
        report.log_summary();
        info!(elapsed_ms = run.elapsed_ms() as u64, phases = run.history().len(), "Run complete");
        Ok(report)
    }
}
