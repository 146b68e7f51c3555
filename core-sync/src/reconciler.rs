//! # Reconciler
//!
//! Brings the remote albums in line with the desired membership computed from
//! the local collection.
//!
//! ## Add path
//!
//! 1. Query the remote items created within the days spanned by the desired
//!    photos and fill in the remote ids of photos already uploaded
//! 2. Diff by short path: photos not found remotely are uploaded
//! 3. Create every configured album missing remotely
//! 4. Add each album's desired photos to it
//!
//! ## Remove path
//!
//! For every album with desired photos, remote items of the album that were
//! created within the desired time window but are not desired are removed.
//! An album without desired photos is never touched.
//!
//! Recoverable problems are logged and collected in the [`RunReport`]; only
//! errors that make the whole run meaningless are returned as `Err`.

use bridge_traits::photos::{NewMediaItem, RemoteMediaItem};
use chrono::{DateTime, Duration as TimeWindow, FixedOffset, NaiveDateTime, Offset, TimeZone, Utc};
use core_library::{all_photos, creation_time_bounds, AlbumMembership, Photo};
use core_runtime::config::CoreConfig;
use std::collections::{HashMap, HashSet};
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use crate::catalog::RemoteCatalog;
use crate::error::Result;
use crate::job::{RunPhase, SyncRun};
use crate::report::{AlbumOutcome, RunReport, UploadSummary};

/// Remote creation time with fractional seconds, e.g. `2019-04-09T09:12:51.200Z`
const REMOTE_TIME_FRACTIONAL: &str = "%Y-%m-%dT%H:%M:%S%.fZ";

/// Remote creation time in whole seconds, e.g. `2019-04-09T09:12:51Z`
const REMOTE_TIME_WHOLE: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Split of the desired photos against what is already remote
#[derive(Debug, Clone, Default)]
pub struct UploadDiff {
    /// Desired photos without a remote counterpart, oldest first
    pub to_upload: Vec<Photo>,
    /// Desired photos already remote, oldest first
    pub to_update: Vec<Photo>,
}

/// Diff desired photos against remote ones by short path.
pub fn compute_upload_diff(desired: &HashSet<Photo>, remote: &HashSet<Photo>) -> UploadDiff {
    let mut to_upload: Vec<Photo> = desired.difference(remote).cloned().collect();
    let mut to_update: Vec<Photo> = desired.intersection(remote).cloned().collect();
    to_upload.sort_by(Photo::cmp_by_creation_time);
    to_update.sort_by(Photo::cmp_by_creation_time);

    UploadDiff {
        to_upload,
        to_update,
    }
}

/// Remote photos to detach from an album: those inside the closed window that
/// are not desired. Photos without a creation time are never removed.
pub fn compute_removals(
    desired: &HashSet<Photo>,
    remote: &[Photo],
    oldest: DateTime<FixedOffset>,
    newest: DateTime<FixedOffset>,
) -> Vec<Photo> {
    remote
        .iter()
        .filter(|photo| {
            photo
                .creation_time
                .is_some_and(|time| oldest <= time && time <= newest)
        })
        .filter(|photo| !desired.contains(*photo))
        .cloned()
        .collect()
}

/// Parse a remote creation time; both fractional and whole seconds are UTC.
pub fn parse_remote_creation_time(value: &str) -> Option<DateTime<FixedOffset>> {
    let naive = NaiveDateTime::parse_from_str(value, REMOTE_TIME_FRACTIONAL)
        .or_else(|_| NaiveDateTime::parse_from_str(value, REMOTE_TIME_WHOLE))
        .ok()?;
    Some(Utc.fix().from_utc_datetime(&naive))
}

/// Photo view of a remote media item; its filename is the short path.
pub fn remote_photo(item: &RemoteMediaItem) -> Photo {
    let creation_time = item
        .creation_time
        .as_deref()
        .and_then(parse_remote_creation_time);
    Photo::remote(&item.filename, &item.id, creation_time)
        .with_remote_details(item.description.clone(), Some(item.metadata.clone()))
}

/// Copy remote ids from `known` onto the photos of every album.
///
/// Returns the updated membership and the short paths still without a remote id.
pub fn backfill_remote_ids(
    membership: AlbumMembership,
    known: &HashSet<Photo>,
) -> (AlbumMembership, Vec<String>) {
    let mut missing = HashSet::new();

    let membership = membership
        .into_iter()
        .map(|(album, photos)| {
            let photos = photos
                .into_iter()
                .map(|photo| {
                    if photo.remote_id.is_some() {
                        return photo;
                    }
                    match known.get(photo.short_path()).and_then(|k| k.remote_id.clone()) {
                        Some(remote_id) => photo.with_remote_id(remote_id),
                        None => {
                            missing.insert(photo.short_path().to_string());
                            photo
                        }
                    }
                })
                .collect();
            (album, photos)
        })
        .collect();

    let mut missing: Vec<String> = missing.into_iter().collect();
    missing.sort();
    (membership, missing)
}

/// Drives one command against the remote catalog
pub struct Reconciler {
    catalog: RemoteCatalog,
    upload_batch_size: usize,
    album_batch_size: usize,
    remove_window_padding: TimeWindow,
}

impl Reconciler {
    pub fn new(catalog: RemoteCatalog, config: &CoreConfig) -> Self {
        Self {
            catalog,
            upload_batch_size: config.upload_batch_size,
            album_batch_size: config.album_batch_size,
            remove_window_padding: config.remove_window_padding,
        }
    }

    pub fn catalog(&self) -> &RemoteCatalog {
        &self.catalog
    }

    /// Upload what is missing, create missing albums, add photos to albums.
    #[instrument(skip_all, fields(run_id = %run.id))]
    pub async fn add_to_albums(
        &self,
        run: &mut SyncRun,
        membership: AlbumMembership,
    ) -> Result<RunReport> {
        let mut report = RunReport::new(run.id, run.command.clone());
        let desired = all_photos(&membership);
        report.photos_matched = desired.len();

        let remote = self.query_remote_photos(&desired).await?;
        let (membership, _) = backfill_remote_ids(membership, &remote);
        run.advance(RunPhase::RemoteQueried)?;

        let diff = compute_upload_diff(&desired, &remote);
        if !diff.to_update.is_empty() {
            info!(
                photos = diff.to_update.len(),
                "Photos already uploaded; their remote metadata is not refreshed"
            );
        }
        run.advance(RunPhase::Diffed)?;

        let already_remote = diff.to_update.len();
        let (mut upload, uploaded) = self.upload_photos(diff.to_upload).await;
        upload.already_remote = already_remote;
        let (membership, missing) = backfill_remote_ids(membership, &uploaded);
        if !missing.is_empty() {
            warn!(
                photos = missing.len(),
                pretend = self.catalog.is_pretend(),
                "Photos still without a remote id after upload"
            );
        }
        report.upload = Some(upload);
        run.advance(RunPhase::Uploaded)?;

        let names: Vec<String> = membership.keys().cloned().collect();
        let (album_ids, created) = self.ensure_albums(&names).await?;
        report.albums_created = created;
        run.advance(RunPhase::AlbumsEnsured)?;

        report.albums = self.add_photos_to_albums(&membership, &album_ids).await;
        run.advance(RunPhase::Applied)?;

        Ok(report)
    }

    /// Remove photos that no longer belong to their albums.
    #[instrument(skip_all, fields(run_id = %run.id))]
    pub async fn remove_from_albums(
        &self,
        run: &mut SyncRun,
        membership: AlbumMembership,
    ) -> Result<RunReport> {
        let mut report = RunReport::new(run.id, run.command.clone());
        report.photos_matched = all_photos(&membership).len();

        let album_ids = self.album_ids().await?;
        run.advance(RunPhase::RemoteQueried)?;

        report.albums = self
            .remove_photos_from_albums(&membership, &album_ids)
            .await;
        run.advance(RunPhase::Applied)?;

        Ok(report)
    }

    /// Create the configured albums that do not exist remotely.
    #[instrument(skip_all, fields(run_id = %run.id))]
    pub async fn create_missing_albums(
        &self,
        run: &mut SyncRun,
        names: &[String],
    ) -> Result<RunReport> {
        let mut report = RunReport::new(run.id, run.command.clone());
        let (_, created) = self.ensure_albums(names).await?;
        report.albums_created = created;
        run.advance(RunPhase::AlbumsEnsured)?;
        Ok(report)
    }

    /// Remote photos created on the days spanned by `desired`.
    ///
    /// An empty desired set never triggers a query.
    #[instrument(skip_all, fields(desired = desired.len()))]
    pub async fn query_remote_photos(&self, desired: &HashSet<Photo>) -> Result<HashSet<Photo>> {
        let Some((oldest, newest)) = creation_time_bounds(desired) else {
            debug!("No desired photos, skipping remote query");
            return Ok(HashSet::new());
        };

        let started = Instant::now();
        let items = self
            .catalog
            .search_media_by_date_range(oldest.date_naive(), newest.date_naive())
            .collect_all()
            .await?;

        let remote: HashSet<Photo> = items.iter().map(remote_photo).collect();
        info!(
            from = %oldest,
            to = %newest,
            remote = remote.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Queried remote photos"
        );
        Ok(remote)
    }

    /// Upload photos and create their media items.
    ///
    /// Returns the summary and the photos that now have a remote id.
    #[instrument(skip_all, fields(photos = photos.len()))]
    pub async fn upload_photos(&self, photos: Vec<Photo>) -> (UploadSummary, HashSet<Photo>) {
        let mut summary = UploadSummary {
            requested: photos.len(),
            simulated: self.catalog.is_pretend(),
            ..UploadSummary::default()
        };
        if photos.is_empty() {
            return (summary, HashSet::new());
        }

        let mut by_token: HashMap<String, Photo> = HashMap::new();
        for mut photo in photos {
            match self.catalog.upload_bytes(&photo).await {
                Ok(Some(token)) => {
                    photo.upload_token = Some(token.clone());
                    by_token.insert(token, photo);
                }
                Ok(None) => {}
                Err(e) => {
                    error!(photo = %photo, error = %e, "Upload failed");
                    summary.failed.push(photo.short_path().to_string());
                }
            }
        }

        let mut items: Vec<NewMediaItem> = by_token
            .iter()
            .map(|(token, photo)| NewMediaItem {
                upload_token: token.clone(),
                file_name: photo.short_path().to_string(),
                description: String::new(),
            })
            .collect();
        items.sort_by(|a, b| a.file_name.cmp(&b.file_name));

        let creation = self
            .catalog
            .create_media_items(&items, self.upload_batch_size)
            .await;

        let mut uploaded = HashSet::new();
        for result in creation.created {
            let (Some(photo), Some(item)) = (by_token.remove(&result.upload_token), result.media_item)
            else {
                continue;
            };
            let mut photo = photo
                .with_remote_id(&item.id)
                .with_remote_details(item.description, Some(item.metadata));
            photo.upload_token = None;
            uploaded.insert(photo);
        }

        // Tokens without a created item did not make it.
        let mut failed: Vec<String> = by_token.into_values().map(|p| p.short_path().to_string()).collect();
        failed.sort();
        for short_path in &failed {
            error!(photo = %short_path, "Media item was not created");
        }
        summary.failed.extend(failed);
        summary.uploaded = uploaded.len();
        summary.batches = creation.batches;

        info!(
            uploaded = summary.uploaded,
            failed = summary.failed.len(),
            "Upload finished"
        );
        (summary, uploaded)
    }

    /// Album title to remote id, created where missing.
    ///
    /// Returns the ids and the titles that were created. The album list is
    /// fetched again only if something was created.
    #[instrument(skip_all, fields(albums = names.len()))]
    pub async fn ensure_albums(
        &self,
        names: &[String],
    ) -> Result<(HashMap<String, String>, Vec<String>)> {
        let mut album_ids = self.album_ids().await?;

        let missing: Vec<&String> = names
            .iter()
            .filter(|name| !album_ids.contains_key(name.as_str()))
            .collect();

        let mut created = Vec::new();
        for name in missing {
            if self.catalog.create_album(name).await?.is_some() {
                created.push(name.clone());
            }
        }

        if !created.is_empty() {
            album_ids = self.album_ids().await?;
        }

        info!(created = created.len(), "Albums ensured");
        Ok((album_ids, created))
    }

    /// Add every album's desired photos to it.
    pub async fn add_photos_to_albums(
        &self,
        membership: &AlbumMembership,
        album_ids: &HashMap<String, String>,
    ) -> Vec<AlbumOutcome> {
        let mut outcomes = Vec::with_capacity(membership.len());

        for (album, photos) in membership {
            if photos.is_empty() {
                debug!(album = %album, "No photos for album");
                outcomes.push(AlbumOutcome::unchanged(album));
                continue;
            }

            let album_id = match self.resolve_album(album, album_ids) {
                Some(id) => id,
                // Nothing is sent in pretend mode; the title stands in for the id.
                None if self.catalog.is_pretend() => album.as_str(),
                None => {
                    outcomes.push(AlbumOutcome::skipped(album, "album not found"));
                    continue;
                }
            };

            let mut photos: Vec<Photo> = photos.iter().cloned().collect();
            photos.sort_by(Photo::cmp_by_creation_time);

            let started = Instant::now();
            let report = self
                .catalog
                .add_items_to_album(&photos, album_id, self.album_batch_size)
                .await;
            info!(
                album = %album,
                added = report.applied,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Added photos to album"
            );
            outcomes.push(AlbumOutcome::applied(album, report));
        }

        outcomes
    }

    /// Remove undesired photos from every album with desired photos.
    pub async fn remove_photos_from_albums(
        &self,
        membership: &AlbumMembership,
        album_ids: &HashMap<String, String>,
    ) -> Vec<AlbumOutcome> {
        let mut outcomes = Vec::with_capacity(membership.len());

        for (album, desired) in membership {
            // An empty desired set would otherwise wipe the album.
            let Some((oldest, newest)) = creation_time_bounds(desired) else {
                info!(album = %album, "No photos for album, leaving it untouched");
                outcomes.push(AlbumOutcome::unchanged(album));
                continue;
            };
            let oldest = oldest - self.remove_window_padding;

            let Some(album_id) = self.resolve_album(album, album_ids) else {
                outcomes.push(AlbumOutcome::skipped(album, "album not found"));
                continue;
            };

            let items = match self.catalog.search_media_by_album(album_id).collect_all().await {
                Ok(items) => items,
                Err(e) => {
                    error!(album = %album, error = %e, "Failed to list album items");
                    outcomes.push(AlbumOutcome::skipped(album, e.to_string()));
                    continue;
                }
            };

            let remote: Vec<Photo> = items
                .iter()
                .filter_map(|item| {
                    let photo = remote_photo(item);
                    if photo.creation_time.is_none() {
                        warn!(
                            album = %album,
                            item = %item.filename,
                            creation_time = item.creation_time.as_deref().unwrap_or(""),
                            "Skipping remote item with unreadable creation time"
                        );
                        return None;
                    }
                    Some(photo)
                })
                .collect();

            let to_remove = compute_removals(desired, &remote, oldest, newest);
            debug!(
                album = %album,
                remote = remote.len(),
                to_remove = to_remove.len(),
                "Computed removals"
            );
            if to_remove.is_empty() {
                outcomes.push(AlbumOutcome::unchanged(album));
                continue;
            }

            let report = self
                .catalog
                .remove_items_from_album(&to_remove, album_id, self.album_batch_size)
                .await;
            info!(album = %album, removed = report.applied, "Removed photos from album");
            outcomes.push(AlbumOutcome::applied(album, report));
        }

        outcomes
    }

    async fn album_ids(&self) -> Result<HashMap<String, String>> {
        let mut album_ids = HashMap::new();
        for album in self.catalog.list_albums().await? {
            if album_ids.contains_key(&album.title) {
                warn!(album = %album.title, id = %album.id, "Duplicate album title, keeping the first");
                continue;
            }
            album_ids.insert(album.title, album.id);
        }
        Ok(album_ids)
    }

    fn resolve_album<'a>(
        &self,
        album: &str,
        album_ids: &'a HashMap<String, String>,
    ) -> Option<&'a str> {
        let id = album_ids.get(album).map(String::as_str);
        if id.is_none() {
            if self.catalog.is_pretend() {
                warn!(album = %album, "Album does not exist yet (pretend mode)");
            } else {
                error!(album = %album, "Album not found; skipping it");
            }
        }
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn at(value: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(value).unwrap()
    }

    fn local(short_path: &str, time: &str) -> Photo {
        Photo::local(
            short_path,
            format!("/home/me/Photos/{}", short_path),
            at(time),
            Vec::new(),
        )
    }

    #[test]
    fn test_upload_diff_uses_short_path_identity() {
        let desired: HashSet<Photo> = [
            local("2019/a.jpg", "2019-04-09T11:00:00+02:00"),
            local("2019/b.jpg", "2019-04-09T12:00:00+02:00"),
        ]
        .into_iter()
        .collect();
        let remote: HashSet<Photo> = [Photo::remote("2019/a.jpg", "m1", None)]
            .into_iter()
            .collect();

        let diff = compute_upload_diff(&desired, &remote);
        assert_eq!(diff.to_upload.len(), 1);
        assert_eq!(diff.to_upload[0].short_path(), "2019/b.jpg");
        assert_eq!(diff.to_update.len(), 1);
        assert_eq!(diff.to_update[0].short_path(), "2019/a.jpg");
    }

    #[test]
    fn test_parse_remote_creation_time() {
        let fractional = parse_remote_creation_time("2019-04-09T09:12:51.200Z").unwrap();
        assert_eq!(fractional, at("2019-04-09T11:12:51.200+02:00"));
        assert_eq!(fractional.nanosecond(), 200_000_000);

        let whole = parse_remote_creation_time("2019-04-09T09:12:51Z").unwrap();
        assert_eq!(whole, at("2019-04-09T09:12:51+00:00"));

        assert!(parse_remote_creation_time("2019-04-09 09:12:51").is_none());
        assert!(parse_remote_creation_time("").is_none());
    }

    #[test]
    fn test_removals_stay_in_window() {
        let desired: HashSet<Photo> = [local("2019/keep.jpg", "2019-04-09T12:00:00+02:00")]
            .into_iter()
            .collect();
        let remote = vec![
            Photo::remote("2019/keep.jpg", "m1", Some(at("2019-04-09T10:00:00Z"))),
            Photo::remote("2019/stale.jpg", "m2", Some(at("2019-04-09T10:00:00Z"))),
            Photo::remote("2018/old.jpg", "m3", Some(at("2018-01-01T00:00:00Z"))),
            Photo::remote("2019/undated.jpg", "m4", None),
        ];

        let removals = compute_removals(
            &desired,
            &remote,
            at("2019-04-09T11:00:00+02:00"),
            at("2019-04-09T13:00:00+02:00"),
        );
        let names: Vec<_> = removals.iter().map(Photo::short_path).collect();
        assert_eq!(names, vec!["2019/stale.jpg"]);
    }

    #[test]
    fn test_window_bounds_are_inclusive() {
        let desired = HashSet::new();
        let remote = vec![
            Photo::remote("a.jpg", "m1", Some(at("2019-04-09T09:00:00Z"))),
            Photo::remote("b.jpg", "m2", Some(at("2019-04-09T10:00:00Z"))),
        ];
        let removals = compute_removals(
            &desired,
            &remote,
            at("2019-04-09T09:00:00Z"),
            at("2019-04-09T10:00:00Z"),
        );
        assert_eq!(removals.len(), 2);
    }

    #[test]
    fn test_backfill_reports_misses() {
        let mut membership = AlbumMembership::new();
        membership.insert(
            "Green".to_string(),
            [
                local("2019/a.jpg", "2019-04-09T11:00:00+02:00"),
                local("2019/b.jpg", "2019-04-09T12:00:00+02:00"),
            ]
            .into_iter()
            .collect(),
        );
        let known: HashSet<Photo> = [Photo::remote("2019/a.jpg", "m1", None)]
            .into_iter()
            .collect();

        let (membership, missing) = backfill_remote_ids(membership, &known);
        let a = membership["Green"].get("2019/a.jpg").unwrap();
        assert_eq!(a.remote_id.as_deref(), Some("m1"));
        // Local fields survive the backfill.
        assert!(a.full_path.is_some());
        assert_eq!(missing, vec!["2019/b.jpg"]);
    }

    #[test]
    fn test_remote_photo_from_item() {
        let item = RemoteMediaItem {
            id: "m1".to_string(),
            filename: "2019/a.jpg".to_string(),
            description: Some("beach".to_string()),
            creation_time: Some("2019-04-09T09:12:51Z".to_string()),
            metadata: serde_json::json!({"width": "4000"}),
        };

        let photo = remote_photo(&item);
        assert_eq!(photo.short_path(), "2019/a.jpg");
        assert_eq!(photo.remote_id.as_deref(), Some("m1"));
        assert_eq!(photo.remote_description.as_deref(), Some("beach"));
        assert!(photo.creation_time.is_some());
    }
}
