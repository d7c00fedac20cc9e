// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Spoolgate Document — decides whether and how a document is transformed
// before printing (markdown / source-code rendering), inspects PDF page
// counts, and gates large jobs behind caller confirmation.

pub mod confirm;
pub mod pdf;
pub mod render;

pub use confirm::ConfirmationGate;
pub use render::{CommandRenderer, DocumentRenderer, Prepared, RenderGate, RenderOverrides, RenderedArtifact};
