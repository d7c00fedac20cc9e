// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Spoolgate print intake pipeline.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::options::PrintOptions;

/// Unique identifier for one live streaming connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// How uploaded content bytes are encoded on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadEncoding {
    /// Standard base64 (RFC 4648, with padding).
    Base64,
    /// The content string is the file body verbatim.
    Text,
}

/// Which renderer transformed a document before printing, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderKind {
    Markdown,
    Code,
}

impl std::fmt::Display for RenderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Markdown => write!(f, "markdown"),
            Self::Code => write!(f, "code"),
        }
    }
}

/// Outcome of access-policy evaluation over a caller-supplied path.
///
/// Never partially allowed — either the path is cleared for server-side
/// reads or it is rejected with the specific reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    Allowed,
    Denied(DenyReason),
}

/// Why the access policy rejected a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    /// A path component (in the original or symlink-resolved form) starts
    /// with the hidden-file marker. Cannot be overridden by the allow-list.
    HiddenComponent { component: String },
    /// The resolved path is equal to, or nested under, a denied root.
    DeniedAncestor { root: PathBuf },
    /// The resolved path is under none of the allowed roots.
    OutsideAllowlist,
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HiddenComponent { component } => {
                write!(f, "hidden path component '{component}'")
            }
            Self::DeniedAncestor { root } => {
                write!(f, "path is under denied directory {}", root.display())
            }
            Self::OutsideAllowlist => {
                write!(f, "path is not under any allowed directory")
            }
        }
    }
}

/// The fully resolved description of one print submission.
///
/// Immutable once constructed; assembled by the pipeline after the render
/// and confirmation gates have run.
#[derive(Debug, Clone)]
pub struct PrintJobSpec {
    /// Source document — the original file or a rendered artifact.
    pub path: PathBuf,
    /// Explicit target printer; `None` falls back to the configured default,
    /// then to the system default queue.
    pub printer: Option<String>,
    /// Number of copies (validated against `AppConfig::max_copies`).
    pub copies: u32,
    /// Parsed CUPS option string.
    pub options: PrintOptions,
}

/// Page-count metrics for a candidate printable artifact.
///
/// Derived on demand by the confirmation gate, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageMetrics {
    /// Printable page count of the document.
    pub pages: usize,
    /// Whether the option string requests two-sided printing.
    pub duplex: bool,
}

impl PageMetrics {
    /// Physical sheets consumed: two pages share a sheet when duplexing.
    pub fn physical_sheets(&self) -> usize {
        if self.duplex {
            self.pages.div_ceil(2)
        } else {
            self.pages
        }
    }
}

/// Result of the confirmation gate.
///
/// `AwaitingConfirmation` is a valid terminal state of one invocation, not
/// an error: the caller must re-invoke with `skip_confirmation` set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationOutcome {
    Proceed,
    AwaitingConfirmation { sheets: usize, threshold: usize },
}
