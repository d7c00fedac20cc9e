// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Spoolgate Security — the untrusted-input boundary: path access policy for
// server-resident files and quarantine intake for uploaded content.

pub mod intake;
pub mod policy;

pub use intake::{UploadIntake, UploadedArtifact};
pub use policy::AccessPolicy;
