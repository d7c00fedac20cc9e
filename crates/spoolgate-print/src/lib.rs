// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Spoolgate Print — submits prepared documents to the CUPS command-line
// interface, coordinates the intake → render → confirm → dispatch pipeline
// with guaranteed artifact cleanup, and runs the streaming service that
// demultiplexes concurrent remote sessions.

pub mod cups;
pub mod pipeline;
pub mod server;
pub mod session;

pub use cups::CupsClient;
pub use pipeline::{FilePrintRequest, PrintOutcome, PrintPipeline, UploadPrintRequest};
pub use server::PrintServer;
pub use session::SessionRegistry;
