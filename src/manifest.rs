//! In-place rewriting of dependency versions inside a manifest file.
//!
//! Two strategies are available. [`PatchStrategy::Substring`] reproduces the
//! historical behavior: it finds the first literal occurrence of a library
//! name and replaces everything up to the next comma anywhere later in the
//! document. It is fragile: a name that first appears somewhere other than
//! its declaration is patched in the wrong place, and the last entry of an
//! object has no trailing comma of its own, so the rewrite runs on to the
//! next comma in the file and swallows the closing `}` (and whatever else
//! lies in between). Only when no comma follows at all is the library
//! skipped. Rewrites whose replaced text spans a line break or a `}` are
//! listed in [`PatchReport::drifted`] and logged as warnings.
//! [`PatchStrategy::Structural`] only rewrites a name in key position and
//! replaces just the string value, leaving every other byte untouched.

use indexmap::IndexMap;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{Result, UpdateError};

/// How library declarations are located in the manifest text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchStrategy {
    /// First literal occurrence of the name, up to the next comma.
    #[default]
    Substring,
    /// First `"name": "value"` pair, value only.
    Structural,
}

/// Outcome of patching one manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchReport {
    /// Libraries whose declaration was rewritten.
    pub updated: Vec<String>,
    /// Libraries not found in the manifest.
    pub skipped: Vec<String>,
    /// Updated libraries whose replaced text crossed a line break or a `}`.
    pub drifted: Vec<String>,
    /// Whether the file was written back.
    pub written: bool,
}

impl PatchReport {
    pub fn has_changes(&self) -> bool {
        !self.updated.is_empty()
    }
}

/// Rewrites library versions in a manifest file.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManifestPatcher {
    strategy: PatchStrategy,
}

impl ManifestPatcher {
    pub fn new(strategy: PatchStrategy) -> Self {
        Self { strategy }
    }

    /// Patch the manifest at `path`, writing it back only when something changed.
    pub fn patch_file(
        &self,
        path: impl AsRef<Path>,
        libraries: &IndexMap<String, String>,
    ) -> Result<PatchReport> {
        let path = path.as_ref();
        if libraries.is_empty() {
            return Err(UpdateError::configuration(
                "libraries configuration does not exist",
            ));
        }

        let content = std::fs::read_to_string(path).map_err(|e| UpdateError::io(path, e))?;
        let (patched, mut report) = self.patch_text(&content, libraries);

        for name in &report.skipped {
            tracing::debug!(library = %name, "library not declared in {}", display_name(path));
        }
        for name in &report.drifted {
            tracing::warn!(
                library = %name,
                "rewrite of {} ran past the declaration, check the file",
                display_name(path)
            );
        }

        if report.has_changes() {
            std::fs::write(path, patched).map_err(|e| UpdateError::io(path, e))?;
            report.written = true;
            tracing::info!(
                updated = report.updated.len(),
                "update {} file, done",
                display_name(path)
            );
        } else {
            tracing::info!("no dependencies found in {}", display_name(path));
        }

        Ok(report)
    }

    /// Apply every library in map order to `content`.
    ///
    /// The returned report never has `written` set.
    pub fn patch_text(
        &self,
        content: &str,
        libraries: &IndexMap<String, String>,
    ) -> (String, PatchReport) {
        let mut data = content.to_string();
        let mut report = PatchReport::default();

        for (name, version) in libraries {
            let range = match self.strategy {
                PatchStrategy::Substring => substring_fragment(&data, name),
                PatchStrategy::Structural => structural_value(&data, name),
            };

            match range {
                Some((start, end)) => {
                    if data[start..end].contains(['\n', '}']) {
                        report.drifted.push(name.clone());
                    }
                    let replacement = match self.strategy {
                        PatchStrategy::Substring => format!("{}\": \"{}\"", name, version),
                        PatchStrategy::Structural => version.clone(),
                    };
                    data.replace_range(start..end, &replacement);
                    report.updated.push(name.clone());
                }
                None => report.skipped.push(name.clone()),
            }
        }

        (data, report)
    }
}

/// Byte range from the first occurrence of `name` up to the next comma.
fn substring_fragment(data: &str, name: &str) -> Option<(usize, usize)> {
    if name.is_empty() {
        return None;
    }
    let start = data.find(name)?;
    let len = data[start..].find(',')?;
    Some((start, start + len))
}

/// Byte range of the string value of the first `"name": "..."` pair.
fn structural_value(data: &str, name: &str) -> Option<(usize, usize)> {
    if name.is_empty() {
        return None;
    }
    let key = format!("\"{}\"", name);
    let bytes = data.as_bytes();
    let mut from = 0;

    while let Some(offset) = data[from..].find(&key) {
        let key_end = from + offset + key.len();
        from = from + offset + 1;

        let mut i = skip_whitespace(bytes, key_end);
        if bytes.get(i) != Some(&b':') {
            continue;
        }
        i = skip_whitespace(bytes, i + 1);
        if bytes.get(i) != Some(&b'"') {
            continue;
        }

        let value_start = i + 1;
        if let Some(value_end) = string_end(bytes, value_start) {
            return Some((value_start, value_end));
        }
    }

    None
}

fn skip_whitespace(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

/// Index of the closing quote of a string literal whose body starts at `i`.
fn string_end(bytes: &[u8], mut i: usize) -> Option<usize> {
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' => return Some(i),
            b'\n' => return None,
            _ => i += 1,
        }
    }
    None
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| path.to_path_buf())
        .display()
        .to_string()
}

#[cfg(test)]
#[path = "manifest_tests.rs"]
mod tests;
