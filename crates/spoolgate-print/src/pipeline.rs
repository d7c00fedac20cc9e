// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pipeline coordinator: the two print entry points and the cleanup
// guarantee.
//
// Server-resident files run policy → render → confirm → dispatch; uploads
// run intake → render → confirm → dispatch. Every artifact created along
// the way (quarantined upload, rendered document) is discarded before the
// operation returns, on success, on the confirmation halt, and on every
// failure: explicit `discard` calls cover the deliberate exits, and the
// artifacts' RAII drop covers error propagation. Deletion problems are
// logged and never mask the operation's result.

use std::path::Path;
use std::sync::Arc;

use tracing::{info, instrument};

use spoolgate_core::config::AppConfig;
use spoolgate_core::error::{Result, SpoolgateError};
use spoolgate_core::options::PrintOptions;
use spoolgate_core::types::{
    AccessDecision, ConfirmationOutcome, PrintJobSpec, RenderKind, UploadEncoding,
};
use spoolgate_document::confirm::ConfirmationGate;
use spoolgate_document::render::{RenderGate, RenderOverrides};
use spoolgate_security::intake::{UploadIntake, UploadedArtifact};
use spoolgate_security::policy::AccessPolicy;

use crate::cups::CupsClient;

/// Print a file that already resides on the server.
#[derive(Debug, Clone)]
pub struct FilePrintRequest {
    pub path: String,
    pub printer: Option<String>,
    pub copies: u32,
    pub options: PrintOptions,
    pub overrides: RenderOverrides,
    pub skip_confirmation: bool,
}

/// Upload content and print it.
#[derive(Debug, Clone)]
pub struct UploadPrintRequest {
    pub filename: String,
    pub content: String,
    pub encoding: UploadEncoding,
    pub printer: Option<String>,
    pub copies: u32,
    pub options: PrintOptions,
    pub overrides: RenderOverrides,
    pub skip_confirmation: bool,
}

/// Terminal state of one pipeline invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrintOutcome {
    Printed {
        printer: String,
        render_kind: Option<RenderKind>,
    },
    /// Halted at the confirmation gate; the caller re-invokes with
    /// `skip_confirmation` to proceed.
    AwaitingConfirmation { sheets: usize, threshold: usize },
}

/// The intake and access-control pipeline.
///
/// Stages hold no mutable state — only read-only configuration — so any
/// number of invocations may run concurrently without contention.
pub struct PrintPipeline {
    config: Arc<AppConfig>,
    policy: AccessPolicy,
    intake: UploadIntake,
    render_gate: RenderGate,
    confirm_gate: ConfirmationGate,
    cups: CupsClient,
}

impl PrintPipeline {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self {
            policy: AccessPolicy::from_config(&config),
            intake: UploadIntake::new(Arc::clone(&config)),
            render_gate: RenderGate::new(Arc::clone(&config)),
            confirm_gate: ConfirmationGate::new(config.confirm_sheet_threshold),
            cups: CupsClient::from_config(&config),
            config,
        }
    }

    /// Print a server-resident file. The access policy runs first; nothing
    /// touches the file before the path is cleared.
    #[instrument(skip_all, fields(path = %request.path))]
    pub async fn print_file(&self, request: FilePrintRequest) -> Result<PrintOutcome> {
        match self.policy.evaluate(&request.path) {
            AccessDecision::Allowed => {}
            AccessDecision::Denied(reason) => {
                return Err(SpoolgateError::AccessDenied(reason));
            }
        }

        self.run_stages(
            Path::new(&request.path),
            request.printer,
            request.copies,
            request.options,
            request.overrides,
            request.skip_confirmation,
        )
        .await
    }

    /// Upload content into quarantine and print it. The quarantined file is
    /// trusted by construction and bypasses the access policy.
    #[instrument(skip_all, fields(filename = %request.filename))]
    pub async fn print_upload(&self, request: UploadPrintRequest) -> Result<PrintOutcome> {
        let mut artifact: UploadedArtifact =
            self.intake
                .intake(&request.filename, &request.content, request.encoding)?;

        let result = self
            .run_stages(
                &artifact.path().to_path_buf(),
                request.printer,
                request.copies,
                request.options,
                request.overrides,
                request.skip_confirmation,
            )
            .await;

        // Quarantine is torn down whatever the stages produced.
        artifact.discard();
        result
    }

    /// Printer listing passthrough (`lpstat -p -d`).
    pub async fn list_printers(&self) -> Result<String> {
        self.cups.list_printers().await
    }

    /// Queue status passthrough (`lpstat -o`).
    pub async fn queue_status(&self, printer: Option<&str>) -> Result<String> {
        self.cups.queue_status(printer).await
    }

    /// Shared tail of both entry points: render, confirm, validate, dispatch.
    async fn run_stages(
        &self,
        source: &Path,
        printer: Option<String>,
        copies: u32,
        options: PrintOptions,
        overrides: RenderOverrides,
        skip_confirmation: bool,
    ) -> Result<PrintOutcome> {
        let mut prepared = self.render_gate.prepare(source, overrides).await?;

        match self
            .confirm_gate
            .check(&prepared.path, &options, skip_confirmation)
        {
            ConfirmationOutcome::Proceed => {}
            ConfirmationOutcome::AwaitingConfirmation { sheets, threshold } => {
                // The halt is not an error, so the rendered artifact must be
                // discarded here rather than by error unwinding.
                if let Some(rendered) = prepared.rendered.as_mut() {
                    rendered.discard();
                }
                return Ok(PrintOutcome::AwaitingConfirmation { sheets, threshold });
            }
        }

        if copies == 0 {
            return Err(SpoolgateError::Validation(
                "copies must be at least 1".into(),
            ));
        }
        if self.config.max_copies > 0 && copies > self.config.max_copies {
            return Err(SpoolgateError::Validation(format!(
                "{copies} copies exceeds the maximum of {}",
                self.config.max_copies
            )));
        }

        let spec = PrintJobSpec {
            path: prepared.path.clone(),
            printer,
            copies,
            options,
        };

        let submission = self.cups.submit(&spec).await;

        // Rendered artifact goes away on success and on dispatch failure
        // alike, before the result is surfaced.
        if let Some(rendered) = prepared.rendered.as_mut() {
            rendered.discard();
        }

        let printer = submission?;
        info!(printer = %printer, render_kind = ?prepared.kind, "print job dispatched");

        Ok(PrintOutcome::Printed {
            printer,
            render_kind: prepared.kind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spoolgate_core::config::RendererCommand;
    use std::path::PathBuf;

    /// Serialises tests that create or count artifact directories; the
    /// residue checks compare counts over a shared temp root.
    fn serial() -> std::sync::MutexGuard<'static, ()> {
        static LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
        LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Config wired to stub executables: `true` accepts every submission,
    /// `cp` is a renderer that "converts" by copying.
    fn test_config(allowed_root: Option<PathBuf>) -> AppConfig {
        let mut config = AppConfig {
            allowed_roots: allowed_root.into_iter().collect(),
            lp_program: "true".into(),
            lpstat_program: "true".into(),
            markdown_renderer: RendererCommand {
                program: "cp".into(),
                args: vec!["{input}".into(), "{output}".into()],
                output_extension: "pdf".into(),
            },
            ..Default::default()
        };
        config.normalize();
        config
    }

    fn pipeline(config: AppConfig) -> PrintPipeline {
        PrintPipeline::new(Arc::new(config))
    }

    fn upload_request(filename: &str, content: &str) -> UploadPrintRequest {
        UploadPrintRequest {
            filename: filename.into(),
            content: content.into(),
            encoding: UploadEncoding::Text,
            printer: None,
            copies: 1,
            options: PrintOptions::default(),
            overrides: RenderOverrides::default(),
            skip_confirmation: false,
        }
    }

    fn visible_tempdir() -> tempfile::TempDir {
        tempfile::Builder::new()
            .prefix("spoolgate-pipeline-test-")
            .tempdir()
            .expect("tempdir")
    }

    /// Minimal valid PDF fixture with the given page count.
    fn write_test_pdf(path: &Path, pages: usize) {
        use lopdf::{Document, Object, dictionary};

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let kids: Vec<Object> = (0..pages)
            .map(|_| {
                let page_id = doc.add_object(dictionary! {
                    "Type" => "Page",
                    "Parent" => pages_id,
                });
                Object::Reference(page_id)
            })
            .collect();

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => pages as i64,
            }),
        );

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.save(path).expect("save test PDF");
    }

    fn quarantine_dir_count() -> usize {
        std::fs::read_dir(std::env::temp_dir())
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .filter(|e| {
                        let name = e.file_name();
                        let name = name.to_string_lossy();
                        name.starts_with("spoolgate-upload-")
                            || name.starts_with("spoolgate-render-")
                    })
                    .count()
            })
            .unwrap_or(0)
    }

    #[tokio::test]
    async fn upload_prints_and_cleans_quarantine() {
        let _guard = serial();
        let before = quarantine_dir_count();
        let pipeline = pipeline(test_config(None));

        let outcome = pipeline
            .print_upload(upload_request("letter.txt", "dear printer"))
            .await
            .expect("print");

        assert_eq!(
            outcome,
            PrintOutcome::Printed {
                printer: "system default".into(),
                render_kind: None
            }
        );
        assert_eq!(quarantine_dir_count(), before);
    }

    #[tokio::test]
    async fn markdown_upload_renders_and_cleans_both_artifacts() {
        let _guard = serial();
        let before = quarantine_dir_count();
        let pipeline = pipeline(test_config(None));

        let outcome = pipeline
            .print_upload(upload_request("notes.md", "# hello"))
            .await
            .expect("print");

        assert_eq!(
            outcome,
            PrintOutcome::Printed {
                printer: "system default".into(),
                render_kind: Some(RenderKind::Markdown)
            }
        );
        assert_eq!(quarantine_dir_count(), before);
    }

    #[tokio::test]
    async fn render_failure_with_fallback_prints_original() {
        let _guard = serial();
        let mut config = test_config(None);
        config.markdown_renderer.program = "false".into();
        let pipeline = pipeline(config);

        let outcome = pipeline
            .print_upload(upload_request("notes.md", "# hello"))
            .await
            .expect("fallback print");

        assert_eq!(
            outcome,
            PrintOutcome::Printed {
                printer: "system default".into(),
                render_kind: None
            }
        );
    }

    #[tokio::test]
    async fn render_failure_without_fallback_aborts_before_dispatch() {
        let _guard = serial();
        let before = quarantine_dir_count();
        let mut config = test_config(None);
        config.markdown_renderer.program = "false".into();
        config.fallback_on_render_error = false;
        // `lp` would fail loudly if it were ever reached.
        config.lp_program = "/nonexistent/spoolgate-lp".into();
        let pipeline = pipeline(config);

        let err = pipeline
            .print_upload(upload_request("notes.md", "# hello"))
            .await
            .expect_err("render abort");

        assert!(matches!(err, SpoolgateError::Render(_)));
        assert_eq!(quarantine_dir_count(), before);
    }

    #[tokio::test]
    async fn copies_over_limit_never_reach_dispatch() {
        let _guard = serial();
        let mut config = test_config(None);
        config.max_copies = 2;
        // A dispatch attempt would produce a Dispatch error instead.
        config.lp_program = "/nonexistent/spoolgate-lp".into();
        let pipeline = pipeline(config);

        let mut request = upload_request("letter.txt", "dear printer");
        request.copies = 5;
        let err = pipeline.print_upload(request).await.expect_err("over limit");

        assert!(matches!(err, SpoolgateError::Validation(_)));
        assert!(err.to_string().contains('2'), "reported limit: {err}");
    }

    #[tokio::test]
    async fn zero_max_copies_means_unbounded() {
        let _guard = serial();
        let mut config = test_config(None);
        config.max_copies = 0;
        let pipeline = pipeline(config);

        let mut request = upload_request("letter.txt", "dear printer");
        request.copies = 500;
        pipeline.print_upload(request).await.expect("unbounded");
    }

    #[tokio::test]
    async fn dispatch_failure_surfaces_and_cleans_up() {
        let _guard = serial();
        let before = quarantine_dir_count();
        let mut config = test_config(None);
        config.lp_program = "false".into();
        let pipeline = pipeline(config);

        let err = pipeline
            .print_upload(upload_request("letter.txt", "dear printer"))
            .await
            .expect_err("dispatch failure");

        assert!(matches!(err, SpoolgateError::Dispatch(_)));
        assert_eq!(quarantine_dir_count(), before);
    }

    #[tokio::test]
    async fn denied_path_is_rejected_before_any_stage() {
        let _guard = serial();
        let dir = visible_tempdir();
        let pipeline = pipeline(test_config(None));

        let request = FilePrintRequest {
            path: dir.path().join("doc.txt").to_string_lossy().into_owned(),
            printer: None,
            copies: 1,
            options: PrintOptions::default(),
            overrides: RenderOverrides::default(),
            skip_confirmation: false,
        };
        let err = pipeline.print_file(request).await.expect_err("denied");
        assert!(matches!(err, SpoolgateError::AccessDenied(_)));
    }

    #[tokio::test]
    async fn large_pdf_halts_then_proceeds_with_override() {
        let _guard = serial();
        let dir = visible_tempdir();
        let root = dir.path().canonicalize().expect("canonicalize");
        let pdf_path = root.join("big.pdf");
        write_test_pdf(&pdf_path, 24);

        let mut config = test_config(Some(root.clone()));
        config.confirm_sheet_threshold = 10;
        let pipeline = pipeline(config);

        let request = FilePrintRequest {
            path: pdf_path.to_string_lossy().into_owned(),
            printer: Some("office-laser".into()),
            copies: 1,
            options: PrintOptions::parse("sides=two-sided-long-edge"),
            overrides: RenderOverrides::default(),
            skip_confirmation: false,
        };

        // 24 pages duplexed onto 12 sheets, threshold 10: halt.
        let outcome = pipeline.print_file(request.clone()).await.expect("check");
        assert_eq!(
            outcome,
            PrintOutcome::AwaitingConfirmation {
                sheets: 12,
                threshold: 10
            }
        );

        // Explicit override proceeds to dispatch.
        let mut confirmed = request;
        confirmed.skip_confirmation = true;
        let outcome = pipeline.print_file(confirmed).await.expect("print");
        assert_eq!(
            outcome,
            PrintOutcome::Printed {
                printer: "office-laser".into(),
                render_kind: None
            }
        );
    }
}
