//! # Google Photos Provider
//!
//! Implements the `PhotoLibraryProvider` trait for Google Photos Library API v1.
//!
//! ## Overview
//!
//! This crate provides:
//! - Paginated album and media listing
//! - Media search by album or by date range
//! - Raw uploads and batch media item creation
//! - Batch album membership changes

pub mod connector;
pub mod error;
pub mod types;

pub use connector::GooglePhotosConnector;
pub use error::{GooglePhotosError, Result};
