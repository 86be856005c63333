//! In-memory repository doubles that record every call made by the pipelines.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::{Result, UpdateError};
use crate::repository::{RepositoryProvider, VersionControl};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    BranchExists(String),
    CurrentBranch,
    Checkout(String),
    CreateBranch(String, String),
    CommitAndPush(String),
}

impl Call {
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Call::Checkout(_) | Call::CreateBranch(..) | Call::CommitAndPush(_)
        )
    }
}

/// Branches, HEAD and the call log of one fake repository.
#[derive(Debug, Clone, Default)]
pub struct FakeState {
    pub branches: Vec<String>,
    pub current: Option<String>,
    pub calls: Vec<Call>,
    pub fail_open: bool,
    pub fail_checkout: bool,
    pub fail_push: bool,
}

impl FakeState {
    pub fn on_branch(current: &str, branches: &[&str]) -> Self {
        Self {
            branches: branches.iter().map(|b| b.to_string()).collect(),
            current: Some(current.to_string()),
            ..Self::default()
        }
    }

    pub fn mutations(&self) -> Vec<Call> {
        self.calls.iter().filter(|c| c.is_mutation()).cloned().collect()
    }
}

#[derive(Debug, Clone)]
pub struct FakeRepo {
    state: Arc<Mutex<FakeState>>,
}

impl FakeRepo {
    pub fn new(state: FakeState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn snapshot(&self) -> FakeState {
        self.state.lock().unwrap().clone()
    }
}

impl VersionControl for FakeRepo {
    fn branch_exists(&self, name: &str) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::BranchExists(name.to_string()));
        Ok(state.branches.iter().any(|b| b == name))
    }

    fn current_branch(&self) -> Result<Option<String>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::CurrentBranch);
        Ok(state.current.clone())
    }

    fn checkout(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Checkout(name.to_string()));
        if state.fail_checkout {
            return Err(UpdateError::repository("checkout conflict"));
        }
        if !state.branches.iter().any(|b| b == name) {
            return Err(UpdateError::not_found(format!("branch '{}'", name)));
        }
        state.current = Some(name.to_string());
        Ok(())
    }

    fn create_branch(&self, from: &str, new: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state
            .calls
            .push(Call::CreateBranch(from.to_string(), new.to_string()));
        if !state.branches.iter().any(|b| b == from) {
            return Err(UpdateError::not_found(format!("base branch '{}'", from)));
        }
        state.branches.push(new.to_string());
        state.current = Some(new.to_string());
        Ok(())
    }

    fn commit_and_push(&self, message: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::CommitAndPush(message.to_string()));
        if state.fail_push {
            return Err(UpdateError::repository("could not do push"));
        }
        Ok(())
    }
}

/// Hands out one [`FakeRepo`] per project name.
#[derive(Debug, Default)]
pub struct FakeProvider {
    template: FakeState,
    repos: Mutex<HashMap<String, FakeRepo>>,
    opened: Mutex<Vec<PathBuf>>,
}

impl FakeProvider {
    /// Every project not configured explicitly starts from `template`.
    pub fn new(template: FakeState) -> Self {
        Self {
            template,
            ..Self::default()
        }
    }

    pub fn with_project(self, name: &str, state: FakeState) -> Self {
        self.repos
            .lock()
            .unwrap()
            .insert(name.to_string(), FakeRepo::new(state));
        self
    }

    pub fn state(&self, name: &str) -> Option<FakeState> {
        self.repos.lock().unwrap().get(name).map(FakeRepo::snapshot)
    }

    pub fn opened(&self) -> Vec<PathBuf> {
        self.opened.lock().unwrap().clone()
    }
}

impl RepositoryProvider for FakeProvider {
    type Repo = FakeRepo;

    fn open(&self, workspace_path: &Path, project: &str) -> Result<FakeRepo> {
        self.opened.lock().unwrap().push(workspace_path.to_path_buf());
        let repo = self
            .repos
            .lock()
            .unwrap()
            .entry(project.to_string())
            .or_insert_with(|| FakeRepo::new(self.template.clone()))
            .clone();
        if repo.snapshot().fail_open {
            return Err(UpdateError::repository(format!(
                "error opening repository {}",
                workspace_path.display()
            )));
        }
        Ok(repo)
    }
}
