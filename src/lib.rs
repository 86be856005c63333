//! Dependency-version updates across a fleet of cloned projects.
//!
//! For every enabled project under a workspace root this crate puts the
//! checkout on a working branch (creating it from a base branch when
//! needed), rewrites pinned library versions in the project manifest, and
//! optionally commits and pushes the result. Projects are processed
//! concurrently and fail independently.

pub mod branch;
pub mod config;
pub mod error;
pub mod logging;
pub mod manifest;
pub mod orchestrator;
pub mod repository;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use branch::{reconcile, Reconciled};
pub use config::{Config, Credentials, Project, RepositoryConfig};
pub use error::{ErrorKind, UpdateError};
pub use manifest::{ManifestPatcher, PatchReport, PatchStrategy};
pub use orchestrator::{Operation, Orchestrator, ProjectOutcome, RunReport, RunSummary};
pub use repository::{GitProvider, GitRepository, RepositoryProvider, VersionControl};
pub use worker::{ProjectWorker, UpdateReport};
