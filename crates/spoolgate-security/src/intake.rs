// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Upload intake — validation and quarantine of caller-supplied content.
//
// All validation (extension blocklist, size estimate, decode) happens before
// anything touches the filesystem; a failed intake leaves no trace. On
// success the content is materialised as a single file inside a fresh,
// process-unique temporary directory that is exempt from path policy checks
// because this module created it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use tempfile::TempDir;
use tracing::{debug, info, warn};

use spoolgate_core::config::AppConfig;
use spoolgate_core::error::{Result, SpoolgateError};
use spoolgate_core::types::UploadEncoding;

/// Filename stem used inside the quarantine directory.
const QUARANTINE_STEM: &str = "upload";

/// Extension used when the declared filename has none.
const FALLBACK_EXTENSION: &str = "bin";

/// A materialised upload: one file inside an owned quarantine directory.
///
/// Cleanup contract: `discard` removes the file, then the directory, and is
/// idempotent; deletion errors are logged and swallowed. Dropping an
/// undiscarded artifact removes the directory tree as a backstop, so the
/// artifact cannot outlive the invocation that created it on any exit path.
#[derive(Debug)]
pub struct UploadedArtifact {
    dir: Option<TempDir>,
    file_path: PathBuf,
}

impl UploadedArtifact {
    /// Path of the quarantined file.
    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Delete the file, then its owning directory. Safe to call repeatedly.
    pub fn discard(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };

        if let Err(e) = std::fs::remove_file(&self.file_path) {
            warn!(path = %self.file_path.display(), error = %e, "failed to remove quarantined file");
        }
        if let Err(e) = dir.close() {
            warn!(error = %e, "failed to remove quarantine directory");
        }
    }
}

impl Drop for UploadedArtifact {
    fn drop(&mut self) {
        self.discard();
    }
}

/// Validates and materialises uploaded content.
#[derive(Debug, Clone)]
pub struct UploadIntake {
    config: Arc<AppConfig>,
}

impl UploadIntake {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self { config }
    }

    /// Accept encoded content with a declared filename.
    ///
    /// Fails with a validation error — before any bytes are written — when
    /// the extension is blocked, the estimated decoded size exceeds the
    /// configured maximum, or the content does not decode.
    pub fn intake(
        &self,
        filename: &str,
        content: &str,
        encoding: UploadEncoding,
    ) -> Result<UploadedArtifact> {
        // The blocklist applies to the extension the caller declared; the
        // generic fallback only ever affects the quarantine filename.
        let declared = declared_extension(filename);
        if let Some(extension) = &declared
            && self.config.is_blocked_extension(extension)
        {
            return Err(SpoolgateError::Validation(format!(
                "file extension '{extension}' is not allowed for upload"
            )));
        }
        let extension = declared.unwrap_or_else(|| FALLBACK_EXTENSION.to_string());

        // Estimate the decoded size without decoding twice: base64 expands
        // 3 bytes into 4 characters.
        let estimated = match encoding {
            UploadEncoding::Base64 => (content.len() as u64 * 3).div_ceil(4),
            UploadEncoding::Text => content.len() as u64,
        };
        if estimated > self.config.max_upload_bytes {
            return Err(SpoolgateError::Validation(format!(
                "upload of ~{estimated} bytes exceeds the {} byte limit",
                self.config.max_upload_bytes
            )));
        }

        let bytes = match encoding {
            UploadEncoding::Base64 => STANDARD.decode(content.trim()).map_err(|e| {
                SpoolgateError::Validation(format!("content is not valid base64: {e}"))
            })?,
            UploadEncoding::Text => content.as_bytes().to_vec(),
        };

        // Validation passed — only now does anything touch the filesystem.
        let dir = tempfile::Builder::new()
            .prefix("spoolgate-upload-")
            .tempdir()?;
        let file_path = dir.path().join(format!("{QUARANTINE_STEM}.{extension}"));
        std::fs::write(&file_path, &bytes)?;

        info!(
            filename = filename,
            quarantine = %file_path.display(),
            bytes = bytes.len(),
            "upload quarantined"
        );
        debug!(dir = %dir.path().display(), "quarantine directory created");

        Ok(UploadedArtifact {
            dir: Some(dir),
            file_path,
        })
    }
}

/// Lowercase extension of the declared filename, if any.
fn declared_extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
}
