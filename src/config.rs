//! Run configuration loaded from a JSON document.

use indexmap::IndexMap;
use serde::Deserialize;
use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use crate::error::{Result, UpdateError};
use crate::manifest::PatchStrategy;
use crate::orchestrator::Operation;

/// Configuration file name used when none is given on the command line.
pub const DEFAULT_CONFIG_FILE: &str = "dependencies.json";

/// Manifest path, relative to a project directory, used when none is configured.
pub const DEFAULT_MANIFEST: &str = "package.json";

/// Top-level configuration for an update run.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding one cloned checkout per project.
    pub workspace_home: PathBuf,
    pub repository: RepositoryConfig,
    pub projects: Vec<Project>,
    /// Branch all updates are committed onto.
    pub working_branch: String,
    /// Branch the working branch is created from when it does not exist.
    pub create_from: String,
    /// Library name to target version, in document order.
    pub libraries: IndexMap<String, String>,
    /// Manifest path relative to each project directory.
    pub manifest: Option<PathBuf>,
    pub patch_strategy: PatchStrategy,
    /// Upper bound on projects processed at once. Unbounded when absent.
    pub max_concurrency: Option<usize>,
}

/// Remote repository settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    pub url: String,
    pub username: String,
    pub password: String,
}

/// Basic-auth credentials for push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// A single project checkout under the workspace root.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Project {
    pub enabled: bool,
    pub name: String,
    /// Commit and push after patching.
    pub push: bool,
    /// Parsed for compatibility; cloning is not performed.
    pub clone: bool,
}

impl Project {
    /// Directory of this project's checkout.
    pub fn workspace_path(&self, workspace_home: &Path) -> PathBuf {
        workspace_home.join(&self.name)
    }
}

impl RepositoryConfig {
    /// Credentials to push with, present only when both fields are set.
    pub fn credentials(&self) -> Option<Credentials> {
        let username = self.username.trim();
        let password = self.password.trim();
        if username.is_empty() || password.is_empty() {
            return None;
        }
        Some(Credentials {
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    /// Remote URL, if one is configured.
    pub fn remote_url(&self) -> Option<&str> {
        let url = self.url.trim();
        (!url.is_empty()).then_some(url)
    }
}

impl Config {
    /// Load a configuration file from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| UpdateError::io(path, e))?;
        Self::from_json(&content).map_err(|e| match e {
            UpdateError::Configuration(msg) => {
                UpdateError::configuration(format!("{} in {}", msg, path.display()))
            }
            other => other,
        })
    }

    /// Parse a configuration document.
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| UpdateError::configuration(format!("invalid configuration: {}", e)))
    }

    /// Validate everything an operation needs before any project is touched.
    pub fn validate(&self, operation: Operation) -> Result<()> {
        if self.workspace_home.as_os_str().is_empty() {
            return Err(UpdateError::configuration("workspace_home is not set"));
        }

        if self.projects.is_empty() {
            return Err(UpdateError::configuration(
                "project names to update, not configured",
            ));
        }

        if let Some(project) = self.projects.iter().find(|p| p.name.trim().is_empty()) {
            return Err(UpdateError::configuration(format!(
                "project with empty name (enabled: {})",
                project.enabled
            )));
        }

        if self.working_branch.trim().is_empty() {
            return Err(UpdateError::configuration("working_branch is not set"));
        }

        if operation == Operation::Update && self.libraries.is_empty() {
            return Err(UpdateError::configuration(
                "libraries configuration does not exist",
            ));
        }

        if self.max_concurrency == Some(0) {
            return Err(UpdateError::configuration(
                "max_concurrency must be greater than zero",
            ));
        }

        let mut seen = HashSet::new();
        for project in &self.projects {
            if !seen.insert(project.name.as_str()) {
                tracing::warn!(
                    project = %project.name,
                    "project configured more than once, runs will share one checkout"
                );
            }
        }

        Ok(())
    }

    /// Manifest path relative to a project directory.
    pub fn manifest_path(&self) -> &Path {
        self.manifest
            .as_deref()
            .unwrap_or_else(|| Path::new(DEFAULT_MANIFEST))
    }

    /// Concurrency limit, `None` meaning one task per enabled project.
    pub fn concurrency_limit(&self) -> Option<NonZeroUsize> {
        self.max_concurrency.and_then(NonZeroUsize::new)
    }

    pub fn enabled_projects(&self) -> impl Iterator<Item = &Project> {
        self.projects.iter().filter(|p| p.enabled)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
