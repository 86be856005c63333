//! Single-project pipelines.
//!
//! `update`: open → reconcile branch → patch manifest → commit/push (when the
//! project's `push` flag is set).
//!
//! `push`: open → require working branch → checkout → commit/push.
//!
//! The first failing step ends the pipeline; nothing is rolled back.

use std::sync::Arc;

use crate::branch::{self, Reconciled};
use crate::config::{Config, Project};
use crate::error::{Result, UpdateError};
use crate::manifest::{ManifestPatcher, PatchReport};
use crate::orchestrator::Operation;
use crate::repository::{RepositoryProvider, VersionControl};

/// Commit message used by the update pipeline.
pub const UPDATE_COMMIT_MESSAGE: &str = "update dependencies";

/// Commit message used by the push-only pipeline.
pub const PUSH_COMMIT_MESSAGE: &str = "commit from dep-updater";

/// What the update pipeline did for one project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateReport {
    pub branch: Reconciled,
    pub patch: PatchReport,
    pub pushed: bool,
}

/// Runs the pipelines for individual projects.
#[derive(Debug)]
pub struct ProjectWorker<P> {
    config: Arc<Config>,
    provider: Arc<P>,
    patcher: ManifestPatcher,
}

impl<P: RepositoryProvider> ProjectWorker<P> {
    pub fn new(config: Arc<Config>, provider: Arc<P>) -> Self {
        let patcher = ManifestPatcher::new(config.patch_strategy);
        Self {
            config,
            provider,
            patcher,
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Run `operation` for `project` inside a span carrying the project name.
    pub fn run(&self, operation: Operation, project: &Project) -> Result<()> {
        let span = tracing::info_span!("project", name = %project.name);
        let _entered = span.enter();

        match operation {
            Operation::Update => self.update(project).map(|_| ()),
            Operation::Push => self.push(project),
        }
    }

    /// Bring the project onto the working branch and rewrite its manifest.
    pub fn update(&self, project: &Project) -> Result<UpdateReport> {
        tracing::info!("init process");

        if self.config.libraries.is_empty() {
            return Err(UpdateError::configuration(
                "libraries configuration does not exist",
            ));
        }

        let project_path = project.workspace_path(&self.config.workspace_home);
        let repo = self.open(project)?;

        let branch = branch::reconcile(
            &repo,
            &self.config.working_branch,
            &self.config.create_from,
        )?;

        tracing::info!("updating {}...", self.config.manifest_path().display());
        let manifest = project_path.join(self.config.manifest_path());
        let patch = self.patcher.patch_file(&manifest, &self.config.libraries)?;

        let pushed = if project.push {
            tracing::info!("committing and pushing branch");
            repo.commit_and_push(UPDATE_COMMIT_MESSAGE)?;
            tracing::info!("commit and push branch, done");
            true
        } else {
            false
        };

        tracing::info!("process completed successfully");
        Ok(UpdateReport {
            branch,
            patch,
            pushed,
        })
    }

    /// Commit and push the existing working branch.
    pub fn push(&self, project: &Project) -> Result<()> {
        tracing::info!("initializing commit and push of the branch");

        let working_branch = &self.config.working_branch;
        let repo = self.open(project)?;

        if !repo.branch_exists(working_branch)? {
            return Err(UpdateError::not_found(format!(
                "working_branch {} doesn't exist",
                working_branch
            )));
        }

        repo.checkout(working_branch)?;
        repo.commit_and_push(PUSH_COMMIT_MESSAGE)?;

        tracing::info!("the commit and push, done");
        Ok(())
    }

    fn open(&self, project: &Project) -> Result<P::Repo> {
        if project.clone {
            tracing::debug!("clone flag set, using the existing checkout");
        }

        let path = project.workspace_path(&self.config.workspace_home);
        self.provider.open(&path, &project.name)
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
