// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// CUPS command-line boundary.
//
// Thin client over the print system's CLI: `lp` for submission, `lpstat`
// for printer and queue listings. The listing output is free text and is
// passed through to the caller unmodified. Program names come from
// configuration so tests can point them at stubs.

use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info};

use spoolgate_core::config::AppConfig;
use spoolgate_core::error::{Result, SpoolgateError};
use spoolgate_core::types::PrintJobSpec;

/// Printer name reported when neither the request nor the configuration
/// names one and CUPS falls back to its default queue.
const SYSTEM_DEFAULT: &str = "system default";

#[derive(Debug, Clone)]
pub struct CupsClient {
    lp_program: String,
    lpstat_program: String,
    default_printer: Option<String>,
}

impl CupsClient {
    pub fn new(
        lp_program: impl Into<String>,
        lpstat_program: impl Into<String>,
        default_printer: Option<String>,
    ) -> Self {
        Self {
            lp_program: lp_program.into(),
            lpstat_program: lpstat_program.into(),
            default_printer,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.lp_program.clone(),
            config.lpstat_program.clone(),
            config.default_printer.clone(),
        )
    }

    /// Submit a job via `lp`, returning the name of the printer used.
    ///
    /// Target resolution: the job's explicit printer, else the configured
    /// default, else the system default queue. There is no cancellation and
    /// no retry once `lp` has accepted the job.
    pub async fn submit(&self, spec: &PrintJobSpec) -> Result<String> {
        let printer = spec
            .printer
            .clone()
            .or_else(|| self.default_printer.clone());

        let mut cmd = Command::new(&self.lp_program);
        if let Some(name) = &printer {
            cmd.arg("-d").arg(name);
        }
        if spec.copies > 1 {
            cmd.arg("-n").arg(spec.copies.to_string());
        }
        cmd.args(spec.options.to_lp_args());
        cmd.arg("--").arg(&spec.path);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(
            program = %self.lp_program,
            printer = printer.as_deref().unwrap_or(SYSTEM_DEFAULT),
            copies = spec.copies,
            path = %spec.path.display(),
            "submitting print job"
        );

        let output = cmd.output().await.map_err(|e| {
            SpoolgateError::Dispatch(format!("failed to run {}: {e}", self.lp_program))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SpoolgateError::Dispatch(format!(
                "{} exited with {}: {}",
                self.lp_program,
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        info!(
            printer = printer.as_deref().unwrap_or(SYSTEM_DEFAULT),
            response = stdout.trim(),
            "print job submitted"
        );

        Ok(printer.unwrap_or_else(|| SYSTEM_DEFAULT.to_string()))
    }

    /// Printer list and default queue (`lpstat -p -d`), passed through.
    pub async fn list_printers(&self) -> Result<String> {
        self.lpstat(&["-p", "-d"]).await
    }

    /// Queue status (`lpstat -o`), optionally restricted to one printer.
    pub async fn queue_status(&self, printer: Option<&str>) -> Result<String> {
        match printer {
            Some(name) => self.lpstat(&["-o", name]).await,
            None => self.lpstat(&["-o"]).await,
        }
    }

    async fn lpstat(&self, args: &[&str]) -> Result<String> {
        let output = Command::new(&self.lpstat_program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                SpoolgateError::Dispatch(format!("failed to run {}: {e}", self.lpstat_program))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SpoolgateError::Dispatch(format!(
                "{} exited with {}: {}",
                self.lpstat_program,
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
