// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Rendering gate.
//
// Decides, per file, whether a renderer transforms the document before
// printing. Markdown takes precedence over source-code highlighting and at
// most one renderer runs. The renderers themselves are external
// collaborators behind the `DocumentRenderer` trait; the shipped
// implementation shells out to a configured command.
//
// This module never validates the source path — callers either ran it
// through the access policy or produced it in quarantine themselves.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;
use tracing::{debug, info, warn};

use spoolgate_core::config::{AppConfig, RendererCommand};
use spoolgate_core::error::{Result, SpoolgateError};
use spoolgate_core::types::RenderKind;

/// Renderer collaborator boundary: turn a source file into a printable
/// document inside `out_dir`.
#[async_trait]
pub trait DocumentRenderer: Send + Sync {
    fn kind(&self) -> RenderKind;

    /// Render `source` into `out_dir`, returning the path of the artifact.
    async fn render(&self, source: &Path, out_dir: &Path) -> Result<PathBuf>;
}

/// Renderer that invokes an external program.
///
/// `{input}` / `{output}` placeholders in the configured argument list are
/// substituted at invocation time.
pub struct CommandRenderer {
    kind: RenderKind,
    command: RendererCommand,
}

impl CommandRenderer {
    pub fn new(kind: RenderKind, command: RendererCommand) -> Self {
        Self { kind, command }
    }
}

#[async_trait]
impl DocumentRenderer for CommandRenderer {
    fn kind(&self) -> RenderKind {
        self.kind
    }

    async fn render(&self, source: &Path, out_dir: &Path) -> Result<PathBuf> {
        let output = out_dir.join(format!("rendered.{}", self.command.output_extension));

        let args: Vec<String> = self
            .command
            .args
            .iter()
            .map(|arg| {
                arg.replace("{input}", &source.to_string_lossy())
                    .replace("{output}", &output.to_string_lossy())
            })
            .collect();

        debug!(
            program = %self.command.program,
            kind = %self.kind,
            source = %source.display(),
            "invoking renderer"
        );

        let mut cmd = tokio::process::Command::new(&self.command.program);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // No orphan renderer processes if the invocation is cancelled.
            .kill_on_drop(true);

        let result = cmd.output().await.map_err(|e| {
            SpoolgateError::Render(format!("failed to launch {}: {e}", self.command.program))
        })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(SpoolgateError::Render(format!(
                "{} exited with {}: {}",
                self.command.program,
                result.status,
                stderr.trim()
            )));
        }

        if !output.exists() {
            return Err(SpoolgateError::Render(format!(
                "{} reported success but produced no output",
                self.command.program
            )));
        }

        Ok(output)
    }
}

/// A rendered document owned by the pipeline invocation that created it.
///
/// Same cleanup contract as the uploaded artifact: explicit idempotent
/// `discard` (file first, then directory), `Drop` as the backstop, deletion
/// errors logged and swallowed.
#[derive(Debug)]
pub struct RenderedArtifact {
    dir: Option<TempDir>,
    path: PathBuf,
    kind: RenderKind,
}

impl RenderedArtifact {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> RenderKind {
        self.kind
    }

    pub fn discard(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };

        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to remove rendered artifact");
        }
        if let Err(e) = dir.close() {
            warn!(error = %e, "failed to remove render directory");
        }
    }
}

impl Drop for RenderedArtifact {
    fn drop(&mut self) {
        self.discard();
    }
}

/// Per-request renderer overrides. `None` means automatic detection.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOverrides {
    pub markdown: Option<bool>,
    pub code: Option<bool>,
}

/// Outcome of the rendering gate.
#[derive(Debug)]
pub struct Prepared {
    /// File to print — the rendered artifact when one was produced,
    /// otherwise the original source.
    pub path: PathBuf,
    /// The rendered artifact, if any, for the cleanup coordinator.
    pub rendered: Option<RenderedArtifact>,
    /// Which renderer ran, if any.
    pub kind: Option<RenderKind>,
}

/// Decides whether to render, runs the renderer, and applies the fallback
/// policy on failure.
pub struct RenderGate {
    config: Arc<AppConfig>,
    markdown: Arc<dyn DocumentRenderer>,
    code: Arc<dyn DocumentRenderer>,
}

impl RenderGate {
    /// Gate with the configured command renderers.
    pub fn new(config: Arc<AppConfig>) -> Self {
        let markdown = Arc::new(CommandRenderer::new(
            RenderKind::Markdown,
            config.markdown_renderer.clone(),
        ));
        let code = Arc::new(CommandRenderer::new(
            RenderKind::Code,
            config.code_renderer.clone(),
        ));
        Self::with_renderers(config, markdown, code)
    }

    /// Gate with caller-supplied renderers (test seam).
    pub fn with_renderers(
        config: Arc<AppConfig>,
        markdown: Arc<dyn DocumentRenderer>,
        code: Arc<dyn DocumentRenderer>,
    ) -> Self {
        Self {
            config,
            markdown,
            code,
        }
    }

    /// Decide and, if warranted, render `path` ahead of printing.
    ///
    /// Decision order: markdown override (force-on only honoured for a
    /// recognised markdown extension), then automatic markdown detection,
    /// then the code override, then automatic code detection.
    pub async fn prepare(&self, path: &Path, overrides: RenderOverrides) -> Result<Prepared> {
        let extension = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();

        let is_markdown = self.config.is_markdown_extension(&extension);
        let render_markdown = match overrides.markdown {
            Some(true) => is_markdown,
            Some(false) => false,
            None => self.config.auto_render_markdown && is_markdown,
        };

        let renderer: Option<&Arc<dyn DocumentRenderer>> = if render_markdown {
            Some(&self.markdown)
        } else {
            let render_code = match overrides.code {
                Some(explicit) => explicit,
                None => self.config.auto_render_code && self.config.is_code_extension(&extension),
            };
            render_code.then_some(&self.code)
        };

        let Some(renderer) = renderer else {
            return Ok(Prepared {
                path: path.to_path_buf(),
                rendered: None,
                kind: None,
            });
        };

        let dir = tempfile::Builder::new()
            .prefix("spoolgate-render-")
            .tempdir()?;

        match renderer.render(path, dir.path()).await {
            Ok(rendered_path) => {
                info!(
                    source = %path.display(),
                    rendered = %rendered_path.display(),
                    kind = %renderer.kind(),
                    "document rendered"
                );
                Ok(Prepared {
                    path: rendered_path.clone(),
                    rendered: Some(RenderedArtifact {
                        dir: Some(dir),
                        path: rendered_path,
                        kind: renderer.kind(),
                    }),
                    kind: Some(renderer.kind()),
                })
            }
            Err(err) if self.config.fallback_on_render_error => {
                warn!(
                    source = %path.display(),
                    kind = %renderer.kind(),
                    error = %err,
                    "renderer failed — printing the original file"
                );
                Ok(Prepared {
                    path: path.to_path_buf(),
                    rendered: None,
                    kind: None,
                })
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Renderer double: copies the source or fails on demand.
    struct FakeRenderer {
        kind: RenderKind,
        fail: bool,
    }

    #[async_trait]
    impl DocumentRenderer for FakeRenderer {
        fn kind(&self) -> RenderKind {
            self.kind
        }

        async fn render(&self, source: &Path, out_dir: &Path) -> Result<PathBuf> {
            if self.fail {
                return Err(SpoolgateError::Render("simulated renderer failure".into()));
            }
            let out = out_dir.join("rendered.pdf");
            std::fs::copy(source, &out)?;
            Ok(out)
        }
    }

    fn gate(config: AppConfig, markdown_fails: bool, code_fails: bool) -> RenderGate {
        let mut config = config;
        config.normalize();
        RenderGate::with_renderers(
            Arc::new(config),
            Arc::new(FakeRenderer {
                kind: RenderKind::Markdown,
                fail: markdown_fails,
            }),
            Arc::new(FakeRenderer {
                kind: RenderKind::Code,
                fail: code_fails,
            }),
        )
    }

    fn source_file(dir: &tempfile::TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, "# heading\n").expect("write");
        path
    }

    #[tokio::test]
    async fn markdown_is_rendered_automatically_when_enabled() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = source_file(&dir, "notes.md");
        let gate = gate(AppConfig::default(), false, false);

        let mut prepared = gate
            .prepare(&source, RenderOverrides::default())
            .await
            .expect("prepare");

        assert_eq!(prepared.kind, Some(RenderKind::Markdown));
        assert_ne!(prepared.path, source);
        assert!(prepared.path.exists());
        if let Some(artifact) = prepared.rendered.as_mut() {
            artifact.discard();
        }
    }

    #[tokio::test]
    async fn auto_markdown_disabled_leaves_file_untouched() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = source_file(&dir, "notes.md");
        let config = AppConfig {
            auto_render_markdown: false,
            ..Default::default()
        };
        let gate = gate(config, false, false);

        let prepared = gate
            .prepare(&source, RenderOverrides::default())
            .await
            .expect("prepare");

        assert_eq!(prepared.kind, None);
        assert_eq!(prepared.path, source);
        assert!(prepared.rendered.is_none());
    }

    #[tokio::test]
    async fn markdown_force_on_requires_recognised_extension() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = source_file(&dir, "data.csv");
        let gate = gate(AppConfig::default(), false, false);

        let overrides = RenderOverrides {
            markdown: Some(true),
            code: None,
        };
        let prepared = gate.prepare(&source, overrides).await.expect("prepare");

        // A non-markdown file cannot be conscripted into the markdown
        // renderer; nothing else matches either.
        assert_eq!(prepared.kind, None);
        assert_eq!(prepared.path, source);
    }

    #[tokio::test]
    async fn markdown_force_off_skips_rendering() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = source_file(&dir, "notes.md");
        let gate = gate(AppConfig::default(), false, false);

        let overrides = RenderOverrides {
            markdown: Some(false),
            code: None,
        };
        let prepared = gate.prepare(&source, overrides).await.expect("prepare");

        assert_eq!(prepared.kind, None);
        assert_eq!(prepared.path, source);
    }

    #[tokio::test]
    async fn code_override_is_honoured_verbatim() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = source_file(&dir, "main.weird");
        let gate = gate(AppConfig::default(), false, false);

        let overrides = RenderOverrides {
            markdown: None,
            code: Some(true),
        };
        let mut prepared = gate.prepare(&source, overrides).await.expect("prepare");

        assert_eq!(prepared.kind, Some(RenderKind::Code));
        if let Some(artifact) = prepared.rendered.as_mut() {
            artifact.discard();
        }
    }

    #[tokio::test]
    async fn markdown_takes_precedence_over_code() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = source_file(&dir, "readme.md");
        let config = AppConfig {
            auto_render_code: true,
            // `md` in both sets to make the precedence observable.
            code_extensions: vec!["md".into()],
            ..Default::default()
        };
        let mut prepared = gate(config, false, false)
            .prepare(&source, RenderOverrides::default())
            .await
            .expect("prepare");

        assert_eq!(prepared.kind, Some(RenderKind::Markdown));
        if let Some(artifact) = prepared.rendered.as_mut() {
            artifact.discard();
        }
    }

    #[tokio::test]
    async fn renderer_failure_with_fallback_prints_original() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = source_file(&dir, "notes.md");
        let gate = gate(AppConfig::default(), true, false);

        let prepared = gate
            .prepare(&source, RenderOverrides::default())
            .await
            .expect("fallback should succeed");

        assert_eq!(prepared.kind, None);
        assert_eq!(prepared.path, source);
        assert!(prepared.rendered.is_none());
    }

    #[tokio::test]
    async fn renderer_failure_without_fallback_aborts() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = source_file(&dir, "notes.md");
        let config = AppConfig {
            fallback_on_render_error: false,
            ..Default::default()
        };
        let gate = gate(config, true, false);

        let err = gate
            .prepare(&source, RenderOverrides::default())
            .await
            .expect_err("render error should propagate");
        assert!(matches!(err, SpoolgateError::Render(_)));
    }

    #[tokio::test]
    async fn rendered_artifact_discard_removes_everything() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = source_file(&dir, "notes.md");
        let gate = gate(AppConfig::default(), false, false);

        let mut prepared = gate
            .prepare(&source, RenderOverrides::default())
            .await
            .expect("prepare");

        let artifact = prepared.rendered.as_mut().expect("rendered");
        let rendered_path = artifact.path().to_path_buf();
        let rendered_dir = rendered_path.parent().expect("parent").to_path_buf();

        artifact.discard();
        artifact.discard(); // idempotent

        assert!(!rendered_path.exists());
        assert!(!rendered_dir.exists());
        assert!(source.exists(), "original must never be deleted");
    }
}
