//! Remote Photo Library Abstraction
//!
//! Page-level contract for a cloud photo-library service. Implementations map
//! one method to one remote call; pagination loops, batching and retry budgets
//! are owned by the caller.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Album as listed by the remote service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteAlbum {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub media_items_count: Option<u64>,
}

/// Media item as returned by listing, searching or creation calls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteMediaItem {
    /// Opaque remote identifier
    pub id: String,

    /// Filename recorded at upload time (the short path of the photo)
    pub filename: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Creation timestamp as sent by the server, e.g. `2019-04-09T09:12:51.200Z`
    #[serde(default)]
    pub creation_time: Option<String>,

    /// Remaining metadata, passed through untouched
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// One page of a paginated listing
///
/// `items` is `None` when the server omitted the result field, which marks the
/// end of the listing regardless of `next_page_token`.
#[derive(Debug, Clone, PartialEq)]
pub struct RemotePage<T> {
    pub items: Option<Vec<T>>,
    pub next_page_token: Option<String>,
}

impl<T> RemotePage<T> {
    pub fn new(items: Vec<T>, next_page_token: Option<String>) -> Self {
        Self {
            items: Some(items),
            next_page_token,
        }
    }

    /// Page without a result field
    pub fn empty() -> Self {
        Self {
            items: None,
            next_page_token: None,
        }
    }

    /// Whether another page should be requested after this one.
    pub fn has_more(&self) -> bool {
        self.items.is_some() && self.next_page_token.is_some()
    }
}

/// Server-side search filter
///
/// The service accepts one filter kind per query; album and date filters cannot
/// be combined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaFilter {
    /// Closed range of whole days
    DateRange { start: NaiveDate, end: NaiveDate },
    /// Items contained in the album with this remote id
    Album(String),
}

/// Request to turn an upload token into a media item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMediaItem {
    pub upload_token: String,
    pub file_name: String,
    pub description: String,
}

/// Per-item outcome of a batch creation call
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedMediaItem {
    pub upload_token: String,
    /// Present when the server created the item
    pub media_item: Option<RemoteMediaItem>,
    /// Server status message, mostly useful on failure
    pub status_message: Option<String>,
}

impl CreatedMediaItem {
    pub fn is_created(&self) -> bool {
        self.media_item.is_some()
    }
}

/// Remote photo-library operations
///
/// Errors that are worth another attempt (transport failures, throttling,
/// server errors) must be reported as [`BridgeError::Transient`](crate::BridgeError::Transient).
#[async_trait]
pub trait PhotoLibraryProvider: Send + Sync {
    /// Fetch one page of albums.
    async fn list_albums_page(
        &self,
        page_token: Option<String>,
        page_size: u32,
    ) -> Result<RemotePage<RemoteAlbum>>;

    /// Fetch one page of the unfiltered media listing.
    async fn list_media_page(
        &self,
        page_token: Option<String>,
        page_size: u32,
    ) -> Result<RemotePage<RemoteMediaItem>>;

    /// Fetch one page of a filtered media search.
    async fn search_media_page(
        &self,
        filter: &MediaFilter,
        page_token: Option<String>,
        page_size: u32,
    ) -> Result<RemotePage<RemoteMediaItem>>;

    /// Create an album. Not idempotent: two calls create two albums.
    async fn create_album(&self, title: &str) -> Result<RemoteAlbum>;

    /// Send raw content and receive an upload token.
    async fn upload_bytes(&self, file_name: &str, content: Bytes) -> Result<String>;

    /// Create media items from upload tokens in a single call.
    async fn batch_create_media_items(
        &self,
        items: &[NewMediaItem],
    ) -> Result<Vec<CreatedMediaItem>>;

    /// Attach existing media items to an album in a single call.
    async fn batch_add_media_items(&self, album_id: &str, media_item_ids: &[String]) -> Result<()>;

    /// Detach media items from an album in a single call.
    async fn batch_remove_media_items(
        &self,
        album_id: &str,
        media_item_ids: &[String],
    ) -> Result<()>;
}
