//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest`
//! - `TagReader` using the `exiftool` command-line tool
//! - Local photo discovery using `walkdir`
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{scan_local_photos, ExifToolReader, ReqwestHttpClient};
//! use bridge_traits::TagReader;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let http_client = ReqwestHttpClient::new()?;
//!     let paths = scan_local_photos("/home/me/Photos".as_ref(), &["jpg".into()])?;
//!     let records = ExifToolReader::new().read_tags(&paths).await?;
//!     Ok(())
//! }
//! ```

mod exiftool;
mod filesystem;
mod http;

pub use exiftool::{parse_exiftool_output, ExifToolReader};
pub use filesystem::scan_local_photos;
pub use http::ReqwestHttpClient;
