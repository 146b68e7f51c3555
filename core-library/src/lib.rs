//! # Photo Library Module
//!
//! Owns the local side of a sync run: which photos exist, what they are called
//! and which albums they belong to.
//!
//! ## Overview
//!
//! This module manages:
//! - The [`Photo`] entity and its short-path identity
//! - Album rules loaded from YAML, with validation ([`AlbumRuleSet`])
//! - Capture time resolution from incomplete metadata ([`TimeResolver`])
//! - Matching of local photos to albums ([`Matcher`])

pub mod error;
pub mod matcher;
pub mod photo;
pub mod rules;
pub mod time_resolver;

pub use error::{LibraryError, Result};
pub use matcher::{all_photos, AlbumMembership, Matcher};
pub use photo::{creation_time_bounds, shorten_path, Photo};
pub use rules::{AlbumRule, AlbumRuleSet, CompiledRule, RuleIssue};
pub use time_resolver::TimeResolver;
