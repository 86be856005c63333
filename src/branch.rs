//! Puts a project checkout on the working branch.

use crate::error::{Result, UpdateError};
use crate::repository::VersionControl;

/// What [`reconcile`] had to do to reach the working branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    /// HEAD was already on the branch; nothing was touched.
    AlreadyOnBranch,
    /// The branch existed and was checked out.
    CheckedOut,
    /// The branch was created from the base branch and checked out.
    Created,
}

/// Ensure the repository's current branch is `target`.
///
/// An existing branch is checked out unless HEAD is already on it. A missing
/// branch is created from `base`, which must be non-blank. Failures are
/// returned as-is; whatever the failed step left in the checkout stays.
pub fn reconcile<R>(repo: &R, target: &str, base: &str) -> Result<Reconciled>
where
    R: VersionControl + ?Sized,
{
    tracing::info!("checking branches...");

    if repo.branch_exists(target)? {
        tracing::info!("branch '{}' exists", target);

        if repo.current_branch()?.as_deref() == Some(target) {
            tracing::info!("project is in the correct branch");
            return Ok(Reconciled::AlreadyOnBranch);
        }

        repo.checkout(target)?;
        tracing::info!("checkout to '{}' branch, done", target);
        return Ok(Reconciled::CheckedOut);
    }

    tracing::info!("branch '{}' doesn't exist... will try to create", target);

    if base.trim().is_empty() {
        return Err(UpdateError::configuration(
            "cannot create branch, no base specified (create_from is not set)",
        ));
    }

    repo.create_branch(base, target)?;
    tracing::info!(
        "creation of the '{}' branch from '{}' branch, done",
        target,
        base
    );
    Ok(Reconciled::Created)
}

#[cfg(test)]
#[path = "branch_tests.rs"]
mod tests;
