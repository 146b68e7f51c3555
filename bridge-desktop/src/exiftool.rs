//! Tag Reader backed by the `exiftool` command-line tool

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    metadata::{MetadataRecord, TagReader, REQUESTED_TAGS},
};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Instant;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

/// Reads embedded tags by running one `exiftool -json` process per batch.
///
/// Paths are streamed to the process on stdin (`-@ -`) so the batch size is
/// not limited by the command-line length. The child is spawned with
/// `kill_on_drop`, so it never outlives the call even when the batch fails.
pub struct ExifToolReader {
    program: PathBuf,
}

impl ExifToolReader {
    pub fn new() -> Self {
        Self::with_program("exiftool")
    }

    /// Use a specific executable instead of `exiftool` from `PATH`.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.arg("-json").arg("-G").arg("-q").arg("-q");
        for tag in REQUESTED_TAGS.iter().filter(|t| **t != "SourceFile") {
            command.arg(format!("-{}", tag));
        }
        command
            .arg("-@")
            .arg("-")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }

    async fn run_batch(&self, paths: &[PathBuf]) -> Result<Vec<u8>> {
        let mut child = self.command().spawn().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => BridgeError::NotAvailable(format!(
                "{} not found; install exiftool to read photo metadata",
                self.program.display()
            )),
            _ => BridgeError::Io(e),
        })?;

        if let Some(mut stdin) = child.stdin.take() {
            let mut arguments = String::new();
            for path in paths {
                arguments.push_str(&path.to_string_lossy());
                arguments.push('\n');
            }
            stdin.write_all(arguments.as_bytes()).await?;
            // Closing stdin ends the argument list.
            drop(stdin);
        }

        let output = child.wait_with_output().await?;

        // exiftool exits with 1 when some files could not be read but still
        // prints records for the others.
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if output.stdout.is_empty() {
                warn!(status = ?output.status.code(), stderr = %stderr.trim(), "exiftool returned no records");
            } else {
                debug!(status = ?output.status.code(), stderr = %stderr.trim(), "exiftool reported unreadable files");
            }
        }

        Ok(output.stdout)
    }
}

impl Default for ExifToolReader {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode the JSON array printed by `exiftool -json -G`.
pub fn parse_exiftool_output(stdout: &[u8]) -> Result<Vec<MetadataRecord>> {
    if stdout.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }

    serde_json::from_slice(stdout)
        .map_err(|e| BridgeError::OperationFailed(format!("Invalid exiftool output: {}", e)))
}

fn display_first(paths: &[PathBuf]) -> String {
    paths
        .first()
        .map(|p| p.display().to_string())
        .unwrap_or_default()
}

#[async_trait]
impl TagReader for ExifToolReader {
    #[instrument(skip(self, paths), fields(count = paths.len(), first = %display_first(paths)))]
    async fn read_tags(&self, paths: &[PathBuf]) -> Result<Vec<MetadataRecord>> {
        if paths.is_empty() {
            return Ok(Vec::new());
        }

        let started = Instant::now();
        let stdout = self.run_batch(paths).await?;
        let records = parse_exiftool_output(&stdout)?;
        let elapsed = started.elapsed();

        info!(
            photos = paths.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            avg_ms_per_photo = (elapsed.as_secs_f64() * 1000.0 / paths.len() as f64),
            "Read photo metadata"
        );

        if records.len() != paths.len() {
            debug!(
                requested = paths.len(),
                returned = records.len(),
                "Some files yielded no metadata record"
            );
        }

        Ok(records)
    }
}
