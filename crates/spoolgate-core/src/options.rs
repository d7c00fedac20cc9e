// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// CUPS option-string model.
//
// The raw option string is whitespace-delimited `key=value` pairs and bare
// flags, passed through to `lp -o` largely unvalidated. Keys whose semantics
// matter to this pipeline (currently only duplex, for sheet-count math) are
// recognised and typed; everything else is carried as an opaque pair.

use serde::{Deserialize, Serialize};

/// Duplex printing mode, as requested by the option string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DuplexMode {
    Simplex,
    LongEdge,
    ShortEdge,
}

impl DuplexMode {
    /// Whether two pages share one physical sheet.
    pub fn is_duplex(&self) -> bool {
        !matches!(self, Self::Simplex)
    }
}

/// Option keys this pipeline recognises (CUPS standard option names).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKey {
    Sides,
    PageRanges,
    Media,
    OrientationRequested,
    NumberUp,
    FitToPage,
}

impl OptionKey {
    fn from_key(key: &str) -> Option<Self> {
        match key {
            "sides" => Some(Self::Sides),
            "page-ranges" => Some(Self::PageRanges),
            "media" => Some(Self::Media),
            "orientation-requested" => Some(Self::OrientationRequested),
            "number-up" => Some(Self::NumberUp),
            "fit-to-page" => Some(Self::FitToPage),
            _ => None,
        }
    }
}

/// One token of the option string.
#[derive(Debug, Clone, PartialEq, Eq)]
enum OptionEntry {
    /// `key=value` pair.
    KeyValue { key: String, value: String },
    /// Bare flag (e.g. `fit-to-page`).
    Flag(String),
}

/// Parsed CUPS options.
///
/// Preserves token order so the pass-through to `lp` is faithful.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrintOptions {
    entries: Vec<OptionEntry>,
}

impl PrintOptions {
    /// Parse a whitespace-delimited option string.
    ///
    /// Empty and all-whitespace input yield an empty option set.
    pub fn parse(raw: &str) -> Self {
        let entries = raw
            .split_whitespace()
            .map(|token| match token.split_once('=') {
                Some((key, value)) => OptionEntry::KeyValue {
                    key: key.to_string(),
                    value: value.to_string(),
                },
                None => OptionEntry::Flag(token.to_string()),
            })
            .collect();
        Self { entries }
    }

    /// True if no options were supplied.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Value of the first `key=value` entry matching a recognised key.
    pub fn recognized(&self, key: OptionKey) -> Option<&str> {
        self.entries.iter().find_map(|entry| match entry {
            OptionEntry::KeyValue { key: k, value } if OptionKey::from_key(k) == Some(key) => {
                Some(value.as_str())
            }
            _ => None,
        })
    }

    /// Duplex mode requested by the options.
    ///
    /// Understands the IPP `sides` keyword and the PPD `Duplex` spelling
    /// some drivers use. Absent or unrecognised values mean simplex.
    pub fn duplex(&self) -> DuplexMode {
        if let Some(sides) = self.recognized(OptionKey::Sides) {
            return match sides {
                "two-sided-long-edge" => DuplexMode::LongEdge,
                "two-sided-short-edge" => DuplexMode::ShortEdge,
                _ => DuplexMode::Simplex,
            };
        }

        for entry in &self.entries {
            if let OptionEntry::KeyValue { key, value } = entry
                && key == "Duplex"
            {
                return match value.as_str() {
                    "DuplexNoTumble" => DuplexMode::LongEdge,
                    "DuplexTumble" => DuplexMode::ShortEdge,
                    _ => DuplexMode::Simplex,
                };
            }
        }

        DuplexMode::Simplex
    }

    /// Render every entry as `lp` command-line arguments: `-o token` per
    /// entry, in original order.
    pub fn to_lp_args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(self.entries.len() * 2);
        for entry in &self.entries {
            args.push("-o".to_string());
            match entry {
                OptionEntry::KeyValue { key, value } => args.push(format!("{key}={value}")),
                OptionEntry::Flag(flag) => args.push(flag.clone()),
            }
        }
        args
    }
}

impl std::fmt::Display for PrintOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for entry in &self.entries {
            if !first {
                write!(f, " ")?;
            }
            first = false;
            match entry {
                OptionEntry::KeyValue { key, value } => write!(f, "{key}={value}")?,
                OptionEntry::Flag(flag) => write!(f, "{flag}")?,
            }
        }
        Ok(())
    }
}
