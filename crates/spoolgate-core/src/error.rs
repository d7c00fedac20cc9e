// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Spoolgate.

use thiserror::Error;

use crate::types::DenyReason;

/// Top-level error type for all Spoolgate operations.
///
/// Every pipeline stage fails fast with one of these variants; the operation
/// boundary (server or one-shot entry point) translates them into a
/// caller-facing reply. A confirmation halt is deliberately NOT an error —
/// see `ConfirmationOutcome` in `types`.
#[derive(Debug, Error)]
pub enum SpoolgateError {
    // -- Intake / request validation --
    #[error("validation failed: {0}")]
    Validation(String),

    // -- Access policy --
    #[error("access denied: {0}")]
    AccessDenied(DenyReason),

    // -- Rendering --
    #[error("rendering failed: {0}")]
    Render(String),

    // -- Print submission --
    #[error("print dispatch failed: {0}")]
    Dispatch(String),

    // -- Streaming transport --
    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("malformed request: {0}")]
    Protocol(String),

    // -- Ambient --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SpoolgateError {
    /// Stable machine-readable kind string used on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::AccessDenied(_) => "access_denied",
            Self::Render(_) => "render",
            Self::Dispatch(_) => "dispatch",
            Self::SessionNotFound(_) => "session",
            Self::Protocol(_) => "protocol",
            Self::Io(_) | Self::Serialization(_) => "internal",
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, SpoolgateError>;
