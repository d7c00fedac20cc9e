// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Spoolgate — Core types, error definitions, and configuration shared across
// all crates.

pub mod config;
pub mod error;
pub mod options;
pub mod types;

pub use config::AppConfig;
pub use error::{Result, SpoolgateError};
pub use types::*;
