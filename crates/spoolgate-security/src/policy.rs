// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Path access policy engine.
//
// Pure decision function over a caller-supplied path. Checks run in strict
// order and short-circuit on the first match:
//
//   1. hidden component in the absolute form (never overridable)
//   2. hidden component in the symlink-resolved form, if it differs
//   3. denied ancestor (real form)
//   4. allowed ancestor (real form) — otherwise outside the allow-list
//
// Deny is checked before allow, so a path nested under both a denied and an
// allowed root is rejected.

use std::path::{Path, PathBuf};

use tracing::debug;

use spoolgate_core::config::AppConfig;
use spoolgate_core::types::{AccessDecision, DenyReason};

/// Outcome of best-effort symlink resolution.
///
/// Resolution fails for paths that do not (yet) exist; the policy then
/// operates on the absolute form alone. An explicit two-branch type keeps
/// the fallback auditable instead of hiding it in an `unwrap_or`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(PathBuf),
    Unresolved,
}

impl Resolution {
    fn of(absolute: &Path) -> Self {
        match std::fs::canonicalize(absolute) {
            Ok(real) => Self::Resolved(real),
            Err(_) => Self::Unresolved,
        }
    }
}

/// Configured allow/deny roots for server-resident file access.
///
/// Uploaded artifacts never pass through here — they live in quarantine
/// directories the pipeline itself created and are trusted by construction.
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    allowed_roots: Vec<PathBuf>,
    denied_roots: Vec<PathBuf>,
}

impl AccessPolicy {
    pub fn new(allowed_roots: Vec<PathBuf>, denied_roots: Vec<PathBuf>) -> Self {
        Self {
            allowed_roots,
            denied_roots,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.allowed_roots.clone(), config.denied_roots.clone())
    }

    /// Evaluate a caller-supplied path against the policy.
    ///
    /// Read-only: the only filesystem access is symlink resolution.
    pub fn evaluate(&self, raw: impl AsRef<Path>) -> AccessDecision {
        let raw = raw.as_ref();
        let absolute =
            std::path::absolute(raw).unwrap_or_else(|_| raw.to_path_buf());

        // Hidden components are rejected before any list is consulted, on
        // the path as given...
        if let Some(component) = hidden_component(&absolute) {
            debug!(path = %absolute.display(), component = %component, "hidden component in absolute form");
            return AccessDecision::Denied(DenyReason::HiddenComponent { component });
        }

        // ...and again on the resolved form, so a visible symlink cannot
        // smuggle a read into a hidden location.
        let real = match Resolution::of(&absolute) {
            Resolution::Resolved(real) => real,
            Resolution::Unresolved => absolute.clone(),
        };
        if real != absolute
            && let Some(component) = hidden_component(&real)
        {
            debug!(path = %real.display(), component = %component, "hidden component in resolved form");
            return AccessDecision::Denied(DenyReason::HiddenComponent { component });
        }

        for root in &self.denied_roots {
            if real.starts_with(root) {
                debug!(path = %real.display(), root = %root.display(), "denied ancestor");
                return AccessDecision::Denied(DenyReason::DeniedAncestor { root: root.clone() });
            }
        }

        for root in &self.allowed_roots {
            if real.starts_with(root) {
                return AccessDecision::Allowed;
            }
        }

        debug!(path = %real.display(), "path outside allow-list");
        AccessDecision::Denied(DenyReason::OutsideAllowlist)
    }
}

/// First normal path component starting with the hidden-file marker.
///
/// `Component::CurDir` and `Component::ParentDir` are distinct variants, so
/// "." and ".." never reach the check.
fn hidden_component(path: &Path) -> Option<String> {
    path.components().find_map(|component| {
        if let std::path::Component::Normal(name) = component {
            let name = name.to_string_lossy();
            if name.starts_with('.') {
                return Some(name.into_owned());
            }
        }
        None
    })
}
