//! Fan-out of a pipeline across every enabled project.
//!
//! One blocking task is launched per enabled project. A failing project is
//! logged and counted but never stops its siblings, and the run itself only
//! fails when the configuration is invalid.

use colored::Colorize;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::error::{ErrorKind, Result};
use crate::logging::CONSOLE;
use crate::repository::RepositoryProvider;
use crate::worker::ProjectWorker;

/// Which pipeline to run for each project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Reconcile the working branch, patch the manifest, optionally push.
    Update,
    /// Commit and push an existing working branch.
    Push,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Update => "update",
            Self::Push => "push",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a single project ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectOutcome {
    Succeeded,
    /// `kind` is `None` when the task itself died.
    Failed {
        kind: Option<ErrorKind>,
        message: String,
    },
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectResult {
    pub project: String,
    pub outcome: ProjectOutcome,
}

/// Aggregate counts for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub disabled: usize,
}

impl RunSummary {
    pub fn from_results<'a>(results: impl IntoIterator<Item = &'a ProjectResult>) -> Self {
        let mut summary = Self::default();
        for result in results {
            summary.record(&result.outcome);
        }
        summary
    }

    pub fn record(&mut self, outcome: &ProjectOutcome) {
        match outcome {
            ProjectOutcome::Succeeded => self.succeeded += 1,
            ProjectOutcome::Failed { .. } => self.failed += 1,
            ProjectOutcome::Disabled => self.disabled += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.failed + self.disabled
    }

    /// Print a colorized one-line summary.
    pub fn print(&self) {
        let failed = if self.failed > 0 {
            self.failed.to_string().red().bold()
        } else {
            self.failed.to_string().normal()
        };
        println!(
            "{} done, {} projects. OK: {}, Fail: {}, Disabled: {}",
            "🏁".bold(),
            self.total().to_string().bright_white(),
            self.succeeded.to_string().green().bold(),
            failed,
            self.disabled.to_string().dimmed()
        );
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "done, {} projects. OK: {}, Fail: {}, Disabled: {}",
            self.total(),
            self.succeeded,
            self.failed,
            self.disabled
        )
    }
}

/// Per-project results, in configuration order, plus their summary.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub operation: Operation,
    pub results: Vec<ProjectResult>,
    pub summary: RunSummary,
}

impl RunReport {
    pub fn outcome(&self, project: &str) -> Option<&ProjectOutcome> {
        self.results
            .iter()
            .find(|r| r.project == project)
            .map(|r| &r.outcome)
    }
}

/// Runs one pipeline over every enabled project concurrently.
pub struct Orchestrator<P> {
    config: Arc<Config>,
    worker: Arc<ProjectWorker<P>>,
    limit: Option<NonZeroUsize>,
}

impl<P: RepositoryProvider> Orchestrator<P> {
    pub fn new(config: Config, provider: P) -> Self {
        let limit = config.concurrency_limit();
        let config = Arc::new(config);
        let worker = Arc::new(ProjectWorker::new(Arc::clone(&config), Arc::new(provider)));
        Self {
            config,
            worker,
            limit,
        }
    }

    /// Bound the number of projects processed at once. `None` is unbounded.
    pub fn with_concurrency_limit(mut self, limit: Option<NonZeroUsize>) -> Self {
        self.limit = limit;
        self
    }

    pub fn worker(&self) -> &ProjectWorker<P> {
        &self.worker
    }

    /// Validate the configuration, run `operation` for every enabled project
    /// and wait for all of them.
    pub async fn run(&self, operation: Operation) -> Result<RunReport> {
        self.config.validate(operation)?;

        tracing::info!(
            target: CONSOLE,
            "🛠️  init working into: '{}'",
            self.config.workspace_home.display()
        );

        let semaphore = self.limit.map(|n| Arc::new(Semaphore::new(n.get())));
        let mut results: Vec<ProjectResult> = Vec::with_capacity(self.config.projects.len());
        let mut pending: Vec<(usize, JoinHandle<Result<()>>)> = Vec::new();

        for project in &self.config.projects {
            if !project.enabled {
                let span = tracing::info_span!("project", name = %project.name);
                span.in_scope(|| tracing::info!(target: CONSOLE, "ℹ️ Not considered"));
                results.push(ProjectResult {
                    project: project.name.clone(),
                    outcome: ProjectOutcome::Disabled,
                });
                continue;
            }

            let permit = match &semaphore {
                Some(semaphore) => Arc::clone(semaphore).acquire_owned().await.ok(),
                None => None,
            };
            let worker = Arc::clone(&self.worker);
            let task_project = project.clone();
            let handle = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                worker.run(operation, &task_project)
            });

            pending.push((results.len(), handle));
            results.push(ProjectResult {
                project: project.name.clone(),
                outcome: ProjectOutcome::Succeeded,
            });
        }

        for (slot, handle) in pending {
            let joined = handle.await;
            let result = &mut results[slot];
            let span = tracing::info_span!("project", name = %result.project);

            result.outcome = span.in_scope(|| match joined {
                Ok(Ok(())) => {
                    tracing::info!(target: CONSOLE, "✅ {} successfully", done_verb(operation));
                    ProjectOutcome::Succeeded
                }
                Ok(Err(err)) => {
                    tracing::error!(target: CONSOLE, "❌ {}", err);
                    ProjectOutcome::Failed {
                        kind: Some(err.kind()),
                        message: err.to_string(),
                    }
                }
                Err(err) => {
                    tracing::error!(target: CONSOLE, "❌ task failed: {}", err);
                    ProjectOutcome::Failed {
                        kind: None,
                        message: err.to_string(),
                    }
                }
            });
        }

        let summary = RunSummary::from_results(&results);
        tracing::info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            disabled = summary.disabled,
            "🏁 {}",
            summary
        );

        Ok(RunReport {
            operation,
            results,
            summary,
        })
    }
}

fn done_verb(operation: Operation) -> &'static str {
    match operation {
        Operation::Update => "updated",
        Operation::Push => "pushed",
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
