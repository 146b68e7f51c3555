//! # Remote Catalog
//!
//! Gateway between the reconciler and a [`PhotoLibraryProvider`].
//!
//! ## Overview
//!
//! The provider maps one method to one remote call. The catalog adds what a run
//! needs on top of that:
//! - Listings follow continuation tokens until the server stops sending one,
//!   or omits the result field
//! - Mutations are cut into batches; each batch is retried on transient
//!   errors and reported on its own, so one failed batch never hides the
//!   outcome of the others
//! - In pretend mode every mutation is logged and skipped
//!
//! Media listings are lazy: a [`MediaPager`] fetches the next page only when
//! asked to.

use bridge_traits::http::RetryPolicy;
use bridge_traits::photos::{
    CreatedMediaItem, MediaFilter, NewMediaItem, PhotoLibraryProvider, RemoteAlbum,
    RemoteMediaItem, RemotePage,
};
use bytes::Bytes;
use chrono::NaiveDate;
use core_library::Photo;
use core_runtime::config::CoreConfig;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};

use crate::error::{Result, SyncError};
use crate::retry::with_retry;

/// Outcome of one batched mutation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Items handed to the operation
    pub requested: usize,

    /// Items sent in batches that succeeded
    pub applied: usize,

    /// Batches sent to the service, retries not counted
    pub batches_sent: usize,

    /// Short paths of photos skipped for lack of a remote id
    pub missing_remote_ids: Vec<String>,

    pub failed_batches: Vec<FailedBatch>,

    /// Pretend mode: nothing was sent
    pub simulated: bool,
}

impl BatchReport {
    fn simulated(requested: usize) -> Self {
        Self {
            requested,
            simulated: true,
            ..Self::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed_batches.is_empty() && self.missing_remote_ids.is_empty()
    }

    /// Items that were meant to be sent but did not make it
    pub fn failed_items(&self) -> usize {
        self.failed_batches
            .iter()
            .map(|batch| batch.items.len())
            .sum::<usize>()
            + self.missing_remote_ids.len()
    }

    pub fn merge(&mut self, other: BatchReport) {
        self.requested += other.requested;
        self.applied += other.applied;
        self.batches_sent += other.batches_sent;
        self.missing_remote_ids.extend(other.missing_remote_ids);
        self.failed_batches.extend(other.failed_batches);
        self.simulated |= other.simulated;
    }
}

/// A batch given up after its retry budget
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedBatch {
    /// Zero-based position of the batch within its operation
    pub index: usize,
    pub items: Vec<String>,
    pub error: String,
}

/// Outcome of media item creation
#[derive(Debug, Clone, Default)]
pub struct CreationReport {
    /// Items the service created; tokens without a result here were not created
    pub created: Vec<CreatedMediaItem>,
    pub batches: BatchReport,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AlbumChange {
    Add,
    Remove,
}

impl AlbumChange {
    fn as_str(&self) -> &'static str {
        match self {
            AlbumChange::Add => "batch_add_media_items",
            AlbumChange::Remove => "batch_remove_media_items",
        }
    }
}

/// Remote photo library as seen by one run
pub struct RemoteCatalog {
    provider: Arc<dyn PhotoLibraryProvider>,
    retry: RetryPolicy,
    search_page_size: u32,
    list_page_size: u32,
    pretend: bool,
}

impl RemoteCatalog {
    pub fn new(provider: Arc<dyn PhotoLibraryProvider>, config: &CoreConfig) -> Self {
        Self {
            provider,
            retry: RetryPolicy {
                max_attempts: config.max_attempts,
                base_delay: config.retry_base_delay,
                max_delay: Duration::from_secs(30),
                use_exponential_backoff: true,
            },
            search_page_size: config.search_page_size,
            list_page_size: config.list_page_size,
            pretend: config.pretend,
        }
    }

    pub fn is_pretend(&self) -> bool {
        self.pretend
    }

    /// Every album of the library, all pages.
    #[instrument(skip(self))]
    pub async fn list_albums(&self) -> Result<Vec<RemoteAlbum>> {
        let provider = &self.provider;
        let page_size = self.list_page_size;
        let mut albums = Vec::new();
        let mut token: Option<String> = None;
        let mut pages = 0;

        loop {
            let request_token = token.take();
            let page: RemotePage<RemoteAlbum> = with_retry(&self.retry, "list_albums", || {
                let request_token = request_token.clone();
                async move { provider.list_albums_page(request_token, page_size).await }
            })
            .await?;
            pages += 1;

            let more = page.has_more();
            if let Some(items) = page.items {
                albums.extend(items);
            }
            if !more {
                break;
            }
            token = page.next_page_token;
        }

        debug!(albums = albums.len(), pages, "Listed albums");
        Ok(albums)
    }

    /// Lazy listing of the whole library
    pub fn list_all_media(&self) -> MediaPager<'_> {
        MediaPager::new(self, None, self.list_page_size)
    }

    /// Lazy listing of the items created within the closed range of days
    pub fn search_media_by_date_range(&self, from: NaiveDate, to: NaiveDate) -> MediaPager<'_> {
        MediaPager::new(
            self,
            Some(MediaFilter::DateRange {
                start: from,
                end: to,
            }),
            self.search_page_size,
        )
    }

    /// Lazy listing of an album's items
    ///
    /// Album and date filters cannot be combined; narrow the result client-side.
    pub fn search_media_by_album(&self, album_id: &str) -> MediaPager<'_> {
        MediaPager::new(
            self,
            Some(MediaFilter::Album(album_id.to_string())),
            self.search_page_size,
        )
    }

    /// Create an album; `None` in pretend mode.
    ///
    /// Every call creates a new album, even when one with the same title exists.
    #[instrument(skip(self))]
    pub async fn create_album(&self, title: &str) -> Result<Option<RemoteAlbum>> {
        if self.pretend {
            info!(album = %title, "Pretend: would create album");
            return Ok(None);
        }

        let provider = &self.provider;
        let album = with_retry(&self.retry, "create_album", || async move {
            provider.create_album(title).await
        })
        .await?;
        info!(album = %album.title, id = %album.id, "Created album");
        Ok(Some(album))
    }

    /// Send the content of a local photo and return its upload token; `None` in
    /// pretend mode.
    #[instrument(skip(self, photo), fields(photo = %photo))]
    pub async fn upload_bytes(&self, photo: &Photo) -> Result<Option<String>> {
        let path = photo
            .full_path
            .as_deref()
            .ok_or_else(|| SyncError::MissingLocalFile {
                short_path: photo.short_path().to_string(),
            })?;

        if self.pretend {
            info!(path = %path.display(), "Pretend: would upload photo");
            return Ok(None);
        }

        let started = Instant::now();
        let content = tokio::fs::read(path)
            .await
            .map(Bytes::from)
            .map_err(|source| SyncError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        let provider = &self.provider;
        let file_name = photo.short_path();
        let token = with_retry(&self.retry, "upload_bytes", || {
            let content = content.clone();
            async move { provider.upload_bytes(file_name, content).await }
        })
        .await?;

        debug!(
            bytes = content.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Uploaded photo"
        );
        Ok(Some(token))
    }

    /// Turn upload tokens into media items, `batch_size` tokens per call.
    ///
    /// Items of a failed batch, and items the service refused, are absent from
    /// `created`.
    #[instrument(skip(self, items), fields(items = items.len()))]
    pub async fn create_media_items(
        &self,
        items: &[NewMediaItem],
        batch_size: usize,
    ) -> CreationReport {
        if self.pretend {
            info!(items = items.len(), "Pretend: would create media items");
            return CreationReport {
                created: Vec::new(),
                batches: BatchReport::simulated(items.len()),
            };
        }

        let provider = &self.provider;
        let mut report = CreationReport {
            created: Vec::new(),
            batches: BatchReport {
                requested: items.len(),
                ..BatchReport::default()
            },
        };

        for (index, chunk) in items.chunks(batch_size.max(1)).enumerate() {
            let started = Instant::now();
            report.batches.batches_sent += 1;

            let result = with_retry(&self.retry, "batch_create_media_items", || async move {
                provider.batch_create_media_items(chunk).await
            })
            .await;

            match result {
                Ok(results) => {
                    report.batches.applied += chunk.len();
                    for result in results {
                        if result.is_created() {
                            report.created.push(result);
                        } else {
                            warn!(
                                upload_token = %result.upload_token,
                                status = result.status_message.as_deref().unwrap_or("unknown"),
                                "Media item was not created"
                            );
                        }
                    }
                    debug!(
                        batch = index,
                        items = chunk.len(),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Created media item batch"
                    );
                }
                Err(e) => {
                    error!(batch = index, items = chunk.len(), error = %e, "Media item batch failed");
                    report.batches.failed_batches.push(FailedBatch {
                        index,
                        items: chunk.iter().map(|item| item.file_name.clone()).collect(),
                        error: e.to_string(),
                    });
                }
            }
        }

        report
    }

    /// Attach photos to an album, `batch_size` ids per call.
    pub async fn add_items_to_album(
        &self,
        photos: &[Photo],
        album_id: &str,
        batch_size: usize,
    ) -> BatchReport {
        self.change_album_items(AlbumChange::Add, photos, album_id, batch_size)
            .await
    }

    /// Detach photos from an album, `batch_size` ids per call.
    pub async fn remove_items_from_album(
        &self,
        photos: &[Photo],
        album_id: &str,
        batch_size: usize,
    ) -> BatchReport {
        self.change_album_items(AlbumChange::Remove, photos, album_id, batch_size)
            .await
    }

    #[instrument(skip(self, photos), fields(photos = photos.len()))]
    async fn change_album_items(
        &self,
        change: AlbumChange,
        photos: &[Photo],
        album_id: &str,
        batch_size: usize,
    ) -> BatchReport {
        let mut report = BatchReport {
            requested: photos.len(),
            simulated: self.pretend,
            ..BatchReport::default()
        };

        let mut ids = Vec::with_capacity(photos.len());
        for photo in photos {
            match &photo.remote_id {
                Some(id) => ids.push(id.clone()),
                None => report.missing_remote_ids.push(photo.short_path().to_string()),
            }
        }
        if !report.missing_remote_ids.is_empty() {
            warn!(
                operation = change.as_str(),
                missing = report.missing_remote_ids.len(),
                photos = ?report.missing_remote_ids,
                "Photos without a remote id are left out"
            );
        }

        if self.pretend {
            info!(
                operation = change.as_str(),
                album_id,
                items = ids.len(),
                "Pretend: would change album items"
            );
            return report;
        }

        let provider = &self.provider;
        for (index, chunk) in ids.chunks(batch_size.max(1)).enumerate() {
            report.batches_sent += 1;

            let result = with_retry(&self.retry, change.as_str(), || async move {
                match change {
                    AlbumChange::Add => provider.batch_add_media_items(album_id, chunk).await,
                    AlbumChange::Remove => provider.batch_remove_media_items(album_id, chunk).await,
                }
            })
            .await;

            match result {
                Ok(()) => {
                    report.applied += chunk.len();
                    debug!(operation = change.as_str(), batch = index, items = chunk.len(), "Batch applied");
                }
                Err(e) => {
                    error!(
                        operation = change.as_str(),
                        batch = index,
                        items = chunk.len(),
                        error = %e,
                        "Batch failed"
                    );
                    report.failed_batches.push(FailedBatch {
                        index,
                        items: chunk.to_vec(),
                        error: e.to_string(),
                    });
                }
            }
        }

        report
    }
}

/// Page-by-page reader of a media listing
pub struct MediaPager<'a> {
    catalog: &'a RemoteCatalog,
    filter: Option<MediaFilter>,
    page_size: u32,
    next_token: Option<String>,
    finished: bool,
    pages: usize,
}

impl<'a> MediaPager<'a> {
    fn new(catalog: &'a RemoteCatalog, filter: Option<MediaFilter>, page_size: u32) -> Self {
        Self {
            catalog,
            filter,
            page_size,
            next_token: None,
            finished: false,
            pages: 0,
        }
    }

    /// Pages fetched so far
    pub fn pages(&self) -> usize {
        self.pages
    }

    /// Fetch the next page; `None` once the listing is exhausted.
    pub async fn next_page(&mut self) -> Result<Option<Vec<RemoteMediaItem>>> {
        if self.finished {
            return Ok(None);
        }

        let token = self.next_token.take();
        let provider = &self.catalog.provider;
        let filter = self.filter.as_ref();
        let page_size = self.page_size;

        let page = with_retry(&self.catalog.retry, "media_page", || {
            let token = token.clone();
            async move {
                match filter {
                    Some(filter) => provider.search_media_page(filter, token, page_size).await,
                    None => provider.list_media_page(token, page_size).await,
                }
            }
        })
        .await?;
        self.pages += 1;

        let more = page.has_more();
        self.finished = !more;
        self.next_token = if more { page.next_page_token } else { None };
        Ok(page.items)
    }

    /// Drain the listing.
    pub async fn collect_all(mut self) -> Result<Vec<RemoteMediaItem>> {
        let mut items = Vec::new();
        while let Some(page) = self.next_page().await? {
            items.extend(page);
        }
        debug!(items = items.len(), pages = self.pages, "Collected media listing");
        Ok(items)
    }
}
