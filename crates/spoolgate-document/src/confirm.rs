// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Confirmation gate — the safety valve against accidental large print runs.
//
// Computes the physical sheet count of the candidate artifact and halts the
// pipeline when it exceeds the configured threshold. Confirmation only
// applies to documents whose page count is knowable; everything else
// proceeds.

use std::path::Path;

use tracing::{debug, info};

use spoolgate_core::options::PrintOptions;
use spoolgate_core::types::{ConfirmationOutcome, PageMetrics};

use crate::pdf;

/// Stateless gate over the configured sheet threshold (0 = disabled).
#[derive(Debug, Clone, Copy)]
pub struct ConfirmationGate {
    threshold: usize,
}

impl ConfirmationGate {
    pub fn new(threshold: usize) -> Self {
        Self { threshold }
    }

    /// Decide whether printing `candidate` may proceed.
    ///
    /// `skip_confirmation` is the caller's explicit override after a
    /// previous `AwaitingConfirmation` reply.
    pub fn check(
        &self,
        candidate: &Path,
        options: &PrintOptions,
        skip_confirmation: bool,
    ) -> ConfirmationOutcome {
        if skip_confirmation || self.threshold == 0 {
            return ConfirmationOutcome::Proceed;
        }

        let Some(pages) = pdf::try_page_count(candidate) else {
            debug!(path = %candidate.display(), "page count unknowable — proceeding");
            return ConfirmationOutcome::Proceed;
        };

        let metrics = PageMetrics {
            pages,
            duplex: options.duplex().is_duplex(),
        };
        let sheets = metrics.physical_sheets();

        if sheets > self.threshold {
            info!(
                path = %candidate.display(),
                sheets,
                threshold = self.threshold,
                "job exceeds sheet threshold — awaiting confirmation"
            );
            ConfirmationOutcome::AwaitingConfirmation {
                sheets,
                threshold: self.threshold,
            }
        } else {
            ConfirmationOutcome::Proceed
        }
    }
}
