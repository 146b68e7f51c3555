//! # Host Bridge Traits
//!
//! Collaborator contracts the photo-sync core depends on but does not implement.
//!
//! ## Overview
//!
//! This crate defines the seam between the reconciliation core and the outside
//! world. Each trait represents a capability the core requires and that is
//! provided by a platform crate (`bridge-desktop`) or a provider crate
//! (`provider-google-photos`).
//!
//! ## Traits
//!
//! - [`HttpClient`](http::HttpClient) - Async HTTP operations with bearer auth and retry policy
//! - [`TagReader`](metadata::TagReader) - Batch extraction of embedded keywords and capture time
//! - [`PhotoLibraryProvider`](photos::PhotoLibraryProvider) - Page-level remote photo-library calls
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Implementations should:
//!
//! - Convert platform-specific errors to `BridgeError`
//! - Report retryable failures as `BridgeError::Transient`
//! - Include error context (file paths, HTTP status)
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so they can be shared behind `Arc`.
//!
//! ## Examples
//!
//! ### Implementing TagReader
//!
//! ```ignore
//! use bridge_traits::metadata::{MetadataRecord, TagReader};
//! use bridge_traits::error::Result;
//! use async_trait::async_trait;
//! use std::path::PathBuf;
//!
//! pub struct FixtureReader(Vec<MetadataRecord>);
//!
//! #[async_trait]
//! impl TagReader for FixtureReader {
//!     async fn read_tags(&self, _paths: &[PathBuf]) -> Result<Vec<MetadataRecord>> {
//!         Ok(self.0.clone())
//!     }
//! }
//! ```

pub mod error;
pub mod http;
pub mod metadata;
pub mod photos;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use metadata::{MetadataRecord, TagReader};
pub use photos::{
    CreatedMediaItem, MediaFilter, NewMediaItem, PhotoLibraryProvider, RemoteAlbum,
    RemoteMediaItem, RemotePage,
};
