//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the photo sync core:
//! - Logging and tracing infrastructure
//! - Configuration management
//!
//! ## Overview
//!
//! This crate contains the runtime utilities that the other crates depend on.
//! It owns the explicit [`CoreConfig`](config::CoreConfig) value handed to the
//! matcher and the reconciler, and the logging conventions used throughout.

pub mod config;
pub mod error;
pub mod logging;

pub use error::{Error, Result};
