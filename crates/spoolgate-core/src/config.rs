// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Service configuration.
//
// Loaded once at startup and treated as read-only for the process lifetime.
// Every field has a default so a partial (or absent) config file works.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// System directories that are always denied, whatever the config says.
const BUILTIN_DENIED_ROOTS: &[&str] = &["/etc", "/sys", "/proc", "/dev", "/boot", "/root", "/var"];

/// External renderer invocation template.
///
/// `{input}` and `{output}` placeholders in `args` are substituted with the
/// source path and the chosen output path at render time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RendererCommand {
    pub program: String,
    pub args: Vec<String>,
    /// Extension of the rendered artifact (determines the output filename).
    pub output_extension: String,
}

/// Process-lifetime service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory prefixes under which server-resident files may be printed.
    pub allowed_roots: Vec<PathBuf>,
    /// Directory prefixes that are always forbidden. Builtin system roots
    /// are unioned in by `normalize` regardless of this list's contents.
    pub denied_roots: Vec<PathBuf>,
    /// Lowercase file extensions rejected at upload intake.
    pub blocked_extensions: Vec<String>,
    /// Maximum decoded upload size in bytes.
    pub max_upload_bytes: u64,
    /// Maximum copies per job (0 = unbounded).
    pub max_copies: u32,
    /// Physical-sheet threshold above which a job halts for confirmation
    /// (0 = confirmation disabled).
    pub confirm_sheet_threshold: usize,
    /// Render markdown files automatically when no override is given.
    pub auto_render_markdown: bool,
    /// Render recognised source files automatically when no override is given.
    pub auto_render_code: bool,
    /// On renderer failure, print the original file instead of aborting.
    pub fallback_on_render_error: bool,
    /// Printer used when a request names none (falls back to the system
    /// default queue when unset).
    pub default_printer: Option<String>,
    /// Extensions treated as markdown.
    pub markdown_extensions: Vec<String>,
    /// Extensions treated as highlightable source code.
    pub code_extensions: Vec<String>,
    /// Renderer invoked for markdown documents.
    pub markdown_renderer: RendererCommand,
    /// Renderer invoked for source-code documents.
    pub code_renderer: RendererCommand,
    /// Print submission program (overridable so tests can stub it).
    pub lp_program: String,
    /// Queue/printer listing program.
    pub lpstat_program: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            allowed_roots: default_allowed_roots(),
            denied_roots: Vec::new(),
            blocked_extensions: vec![
                "exe", "dll", "so", "sh", "bash", "zsh", "bat", "cmd", "com", "msi", "app",
                "dmg", "bin",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            max_upload_bytes: 50 * 1024 * 1024,
            max_copies: 10,
            confirm_sheet_threshold: 20,
            auto_render_markdown: true,
            auto_render_code: false,
            fallback_on_render_error: true,
            default_printer: None,
            markdown_extensions: vec!["md", "markdown", "mdown", "mkd"]
                .into_iter()
                .map(String::from)
                .collect(),
            code_extensions: vec![
                "rs", "py", "js", "ts", "c", "h", "cpp", "hpp", "go", "java", "rb", "json",
                "yaml", "yml", "toml", "xml", "css", "sql",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            markdown_renderer: RendererCommand {
                program: "pandoc".into(),
                args: vec!["{input}".into(), "-o".into(), "{output}".into()],
                output_extension: "pdf".into(),
            },
            code_renderer: RendererCommand {
                program: "enscript".into(),
                args: vec![
                    "--color".into(),
                    "-E".into(),
                    "-q".into(),
                    "-p".into(),
                    "{output}".into(),
                    "{input}".into(),
                ],
                output_extension: "ps".into(),
            },
            lp_program: "lp".into(),
            lpstat_program: "lpstat".into(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file and normalise it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let mut config: Self = serde_json::from_str(&raw)?;
        config.normalize();
        Ok(config)
    }

    /// Enforce invariants the rest of the pipeline relies on: extension sets
    /// lowercase, builtin denied roots present exactly once.
    pub fn normalize(&mut self) {
        for ext in self
            .blocked_extensions
            .iter_mut()
            .chain(self.markdown_extensions.iter_mut())
            .chain(self.code_extensions.iter_mut())
        {
            *ext = ext.trim_start_matches('.').to_ascii_lowercase();
        }

        for root in BUILTIN_DENIED_ROOTS {
            let root = PathBuf::from(root);
            if !self.denied_roots.contains(&root) {
                self.denied_roots.push(root);
            }
        }
    }

    pub fn is_blocked_extension(&self, ext: &str) -> bool {
        let ext = ext.to_ascii_lowercase();
        self.blocked_extensions.iter().any(|b| *b == ext)
    }

    pub fn is_markdown_extension(&self, ext: &str) -> bool {
        let ext = ext.to_ascii_lowercase();
        self.markdown_extensions.iter().any(|m| *m == ext)
    }

    pub fn is_code_extension(&self, ext: &str) -> bool {
        let ext = ext.to_ascii_lowercase();
        self.code_extensions.iter().any(|c| *c == ext)
    }
}

/// Default allow-list: the user's document-like directories plus /tmp.
fn default_allowed_roots() -> Vec<PathBuf> {
    let mut roots = Vec::new();
    if let Ok(home) = std::env::var("HOME") {
        let home = PathBuf::from(home);
        roots.push(home.join("Documents"));
        roots.push(home.join("Desktop"));
        roots.push(home.join("Downloads"));
    }
    roots.push(PathBuf::from("/tmp"));
    roots
}
