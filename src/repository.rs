//! Version-control primitives for a single project checkout.
//!
//! The core only talks to repositories through [`VersionControl`] and
//! [`RepositoryProvider`]; [`GitProvider`] is the git2-backed implementation
//! used by the binary.

use git2::build::CheckoutBuilder;
use git2::{BranchType, Cred, ErrorCode, PushOptions, RemoteCallbacks, Signature};
use std::path::Path;

use crate::config::{Credentials, RepositoryConfig};
use crate::error::{Result, UpdateError};

const BRANCH_REF_PREFIX: &str = "refs/heads/";
const DEFAULT_REMOTE: &str = "origin";
const FALLBACK_AUTHOR: (&str, &str) = ("dep-updater", "dep-updater@localhost");

/// Operations the update pipelines need from a project repository.
pub trait VersionControl {
    /// Whether a local branch named `name` exists.
    fn branch_exists(&self, name: &str) -> Result<bool>;

    /// Branch HEAD points to, `None` when detached or unborn.
    fn current_branch(&self) -> Result<Option<String>>;

    /// Check out an existing local branch.
    fn checkout(&self, name: &str) -> Result<()>;

    /// Create `new` at the tip of `from` and check it out.
    fn create_branch(&self, from: &str, new: &str) -> Result<()>;

    /// Commit every change to tracked files and push the current branch.
    fn commit_and_push(&self, message: &str) -> Result<()>;
}

/// Opens a repository handle for a project checkout.
pub trait RepositoryProvider: Send + Sync + 'static {
    type Repo: VersionControl;

    fn open(&self, workspace_path: &Path, project: &str) -> Result<Self::Repo>;
}

/// Remote settings shared by every repository opened in a run.
#[derive(Debug, Clone, Default)]
pub struct RemoteSettings {
    pub url: Option<String>,
    pub credentials: Option<Credentials>,
}

impl From<&RepositoryConfig> for RemoteSettings {
    fn from(config: &RepositoryConfig) -> Self {
        Self {
            url: config.remote_url().map(str::to_string),
            credentials: config.credentials(),
        }
    }
}

/// Opens git2 repositories.
#[derive(Debug, Clone, Default)]
pub struct GitProvider {
    remote: RemoteSettings,
}

impl GitProvider {
    pub fn new(config: &RepositoryConfig) -> Self {
        Self {
            remote: RemoteSettings::from(config),
        }
    }
}

impl RepositoryProvider for GitProvider {
    type Repo = GitRepository;

    fn open(&self, workspace_path: &Path, project: &str) -> Result<GitRepository> {
        GitRepository::open(workspace_path, project, self.remote.clone())
    }
}

/// A project checkout backed by git2.
pub struct GitRepository {
    repo: git2::Repository,
    remote: RemoteSettings,
    project: String,
}

impl std::fmt::Debug for GitRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitRepository")
            .field("path", &self.repo.path())
            .field("project", &self.project)
            .finish()
    }
}

impl GitRepository {
    /// Open the repository containing `workspace_path`, searching parent directories.
    pub fn open(workspace_path: &Path, project: &str, remote: RemoteSettings) -> Result<Self> {
        let repo = git2::Repository::discover(workspace_path).map_err(|e| {
            UpdateError::from_git2(
                e,
                &format!("error opening repository {}", workspace_path.display()),
            )
        })?;

        if remote.credentials.is_some() {
            tracing::debug!(project, "using basic auth for repository");
        }

        Ok(Self {
            repo,
            remote,
            project: project.to_string(),
        })
    }

    fn signature(&self) -> Result<Signature<'static>> {
        match self.repo.signature() {
            Ok(sig) => Ok(sig),
            Err(_) => Signature::now(FALLBACK_AUTHOR.0, FALLBACK_AUTHOR.1)
                .map_err(|e| UpdateError::from_git2(e, "could not build commit signature")),
        }
    }

    fn push_branch(&self, branch: &str) -> Result<()> {
        let mut remote = match self.repo.find_remote(DEFAULT_REMOTE) {
            Ok(remote) => remote,
            Err(e) if e.code() == ErrorCode::NotFound => match &self.remote.url {
                Some(url) => self
                    .repo
                    .remote_anonymous(url)
                    .map_err(|e| UpdateError::from_git2(e, "invalid repository url"))?,
                None => {
                    return Err(UpdateError::repository(format!(
                        "no '{}' remote and no repository url configured",
                        DEFAULT_REMOTE
                    )))
                }
            },
            Err(e) => return Err(UpdateError::from_git2(e, "could not load remote")),
        };

        let refspec = format!("{0}{1}:{0}{1}", BRANCH_REF_PREFIX, branch);
        let mut rejection: Option<String> = None;
        {
            let mut callbacks = RemoteCallbacks::new();
            if let Some(credentials) = self.remote.credentials.clone() {
                let mut attempted = false;
                callbacks.credentials(move |_url, _username, _allowed| {
                    // libgit2 keeps asking while the remote rejects the credentials
                    if attempted {
                        return Err(git2::Error::from_str("authentication rejected"));
                    }
                    attempted = true;
                    Cred::userpass_plaintext(&credentials.username, &credentials.password)
                });
            }
            callbacks.push_update_reference(|refname, status| {
                if let Some(message) = status {
                    rejection = Some(format!("{}: {}", refname, message));
                }
                Ok(())
            });

            let mut options = PushOptions::new();
            options.remote_callbacks(callbacks);
            remote
                .push(&[refspec.as_str()], Some(&mut options))
                .map_err(|e| UpdateError::from_git2(e, "could not do push"))?;
        }

        if let Some(reason) = rejection {
            return Err(UpdateError::repository(format!(
                "push rejected... {}",
                reason
            )));
        }

        tracing::debug!(project = %self.project, "push successful");
        Ok(())
    }
}

impl VersionControl for GitRepository {
    fn branch_exists(&self, name: &str) -> Result<bool> {
        match self.repo.find_branch(name, BranchType::Local) {
            Ok(_) => Ok(true),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(false),
            Err(e) => Err(UpdateError::from_git2(
                e,
                &format!("could not get the branch reference {}", name),
            )),
        }
    }

    fn current_branch(&self) -> Result<Option<String>> {
        let head = match self.repo.head() {
            Ok(head) => head,
            Err(e) if e.code() == ErrorCode::UnbornBranch => return Ok(None),
            Err(e) => return Err(UpdateError::from_git2(e, "could not get a head")),
        };

        if !head.is_branch() {
            return Ok(None);
        }
        Ok(head.shorthand().map(str::to_string))
    }

    fn checkout(&self, name: &str) -> Result<()> {
        let refname = format!("{}{}", BRANCH_REF_PREFIX, name);
        let reference = match self.repo.find_reference(&refname) {
            Ok(reference) => reference,
            Err(e) if e.code() == ErrorCode::NotFound => {
                return Err(UpdateError::not_found(format!("branch '{}'", name)))
            }
            Err(e) => return Err(UpdateError::from_git2(e, "change to branch fail")),
        };

        let commit = reference
            .peel_to_commit()
            .map_err(|e| UpdateError::from_git2(e, "change to branch fail"))?;

        let mut checkout = CheckoutBuilder::new();
        checkout.safe();
        self.repo
            .checkout_tree(commit.as_object(), Some(&mut checkout))
            .map_err(|e| {
                UpdateError::from_git2(e, &format!("can't checkout to '{}' branch", name))
            })?;
        self.repo.set_head(&refname).map_err(|e| {
            UpdateError::from_git2(e, &format!("can't checkout to '{}' branch", name))
        })?;

        Ok(())
    }

    fn create_branch(&self, from: &str, new: &str) -> Result<()> {
        if from.trim().is_empty() || new.trim().is_empty() {
            return Err(UpdateError::configuration(
                "the name of the new or originating branch is not defined",
            ));
        }

        let base = match self.repo.find_branch(from, BranchType::Local) {
            Ok(branch) => branch,
            Err(e) if e.code() == ErrorCode::NotFound => {
                return Err(UpdateError::not_found(format!(
                    "error creating branch, {}{} not found",
                    BRANCH_REF_PREFIX, from
                )))
            }
            Err(e) => return Err(UpdateError::from_git2(e, "error creating branch")),
        };

        {
            let commit = base
                .get()
                .peel_to_commit()
                .map_err(|e| UpdateError::from_git2(e, "error creating branch"))?;
            self.repo
                .branch(new, &commit, false)
                .map_err(|e| UpdateError::from_git2(e, "error saving reference"))?;
        }

        self.checkout(new).map_err(|e| match e {
            UpdateError::Repository { message } => {
                UpdateError::repository(format!("checkout to new branch fail... {}", message))
            }
            other => other,
        })?;

        tracing::debug!(project = %self.project, "new local branch '{}' created successfully", new);
        Ok(())
    }

    fn commit_and_push(&self, message: &str) -> Result<()> {
        let head = self
            .repo
            .head()
            .map_err(|e| UpdateError::from_git2(e, "could not get a head"))?;
        let branch = match (head.is_branch(), head.shorthand()) {
            (true, Some(name)) => name.to_string(),
            _ => return Err(UpdateError::repository("HEAD is not on a branch, nothing to push")),
        };
        let parent = head
            .peel_to_commit()
            .map_err(|e| UpdateError::from_git2(e, "commit fail"))?;

        let mut index = self
            .repo
            .index()
            .map_err(|e| UpdateError::from_git2(e, "commit fail"))?;
        index
            .update_all(["*"], None)
            .and_then(|_| index.write())
            .map_err(|e| UpdateError::from_git2(e, "commit fail"))?;
        let tree_id = index
            .write_tree()
            .map_err(|e| UpdateError::from_git2(e, "commit fail"))?;

        if tree_id == parent.tree_id() {
            tracing::debug!(project = %self.project, "working tree unchanged, skipping commit");
        } else {
            let tree = self
                .repo
                .find_tree(tree_id)
                .map_err(|e| UpdateError::from_git2(e, "commit fail"))?;
            let signature = self.signature()?;
            self.repo
                .commit(Some("HEAD"), &signature, &signature, message, &tree, &[&parent])
                .map_err(|e| UpdateError::from_git2(e, "commit fail"))?;
        }

        self.push_branch(&branch)
    }
}

#[cfg(test)]
#[path = "repository_tests.rs"]
mod tests;
