//! Tests for the git2-backed repository against real temporary repositories.

use super::*;
use crate::error::ErrorKind;
use git2::{Repository, RepositoryInitOptions};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const MANIFEST: &str = r#"{
  "dependencies": {
    "react": "17.0.0",
    "rxjs": "6.6.0"
  }
}
"#;

/// Create a repository on `main` with one commit holding `package.json`.
fn init_repo(path: &Path) -> Repository {
    let mut opts = RepositoryInitOptions::new();
    opts.initial_head("main");
    let repo = Repository::init_opts(path, &opts).unwrap();
    {
        let mut config = repo.config().unwrap();
        config.set_str("user.name", "Test User").unwrap();
        config.set_str("user.email", "test@test.com").unwrap();
    }

    fs::write(path.join("package.json"), MANIFEST).unwrap();
    {
        let mut index = repo.index().unwrap();
        index.add_path(Path::new("package.json")).unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let sig = repo.signature().unwrap();
        repo.commit(Some("HEAD"), &sig, &sig, "initial", &tree, &[])
            .unwrap();
    }
    repo
}

/// Working repository plus a bare `origin` it can push to.
fn repo_with_remote() -> (TempDir, PathBuf, PathBuf) {
    let temp = TempDir::new().unwrap();
    let work = temp.path().join("portal");
    let remote = temp.path().join("remote.git");
    fs::create_dir_all(&work).unwrap();

    let repo = init_repo(&work);
    Repository::init_bare(&remote).unwrap();
    repo.remote("origin", remote.to_str().unwrap()).unwrap();

    (temp, work, remote)
}

fn open(path: &Path) -> GitRepository {
    GitRepository::open(path, "portal", RemoteSettings::default()).unwrap()
}

#[test]
fn test_open_missing_repository() {
    let temp = TempDir::new().unwrap();
    let err = GitRepository::open(temp.path(), "none", RemoteSettings::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Repository);
}

#[test]
fn test_open_discovers_parent_repository() {
    let temp = TempDir::new().unwrap();
    init_repo(temp.path());
    let nested = temp.path().join("packages/web");
    fs::create_dir_all(&nested).unwrap();

    let repo = GitRepository::open(&nested, "web", RemoteSettings::default()).unwrap();
    assert_eq!(repo.current_branch().unwrap(), Some("main".to_string()));
}

#[test]
fn test_branch_exists() {
    let temp = TempDir::new().unwrap();
    init_repo(temp.path());
    let repo = open(temp.path());

    assert!(repo.branch_exists("main").unwrap());
    assert!(!repo.branch_exists("feature/deps").unwrap());
}

#[test]
fn test_create_branch_and_checkout() {
    let temp = TempDir::new().unwrap();
    init_repo(temp.path());
    let repo = open(temp.path());

    repo.create_branch("main", "feature/deps").unwrap();
    assert!(repo.branch_exists("feature/deps").unwrap());
    assert_eq!(
        repo.current_branch().unwrap(),
        Some("feature/deps".to_string())
    );

    repo.checkout("main").unwrap();
    assert_eq!(repo.current_branch().unwrap(), Some("main".to_string()));
}

#[test]
fn test_create_branch_missing_base() {
    let temp = TempDir::new().unwrap();
    init_repo(temp.path());
    let repo = open(temp.path());

    let err = repo.create_branch("develop", "feature/deps").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(!repo.branch_exists("feature/deps").unwrap());
}

#[test]
fn test_create_branch_requires_names() {
    let temp = TempDir::new().unwrap();
    init_repo(temp.path());
    let repo = open(temp.path());

    let err = repo.create_branch("", "feature/deps").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[test]
fn test_checkout_missing_branch() {
    let temp = TempDir::new().unwrap();
    init_repo(temp.path());
    let repo = open(temp.path());

    let err = repo.checkout("release").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_commit_and_push() {
    let (_temp, work, remote) = repo_with_remote();
    let repo = open(&work);
    repo.create_branch("main", "feature/deps").unwrap();

    fs::write(
        work.join("package.json"),
        MANIFEST.replace("17.0.0", "18.2.0"),
    )
    .unwrap();
    repo.commit_and_push("update dependencies").unwrap();

    let local = Repository::open(&work).unwrap();
    let head = local.head().unwrap().peel_to_commit().unwrap();
    assert_eq!(head.message(), Some("update dependencies"));
    assert_eq!(head.parent_count(), 1);

    // Working tree is clean after the commit
    assert!(local.statuses(None).unwrap().is_empty());

    let bare = Repository::open_bare(&remote).unwrap();
    let pushed = bare
        .find_reference("refs/heads/feature/deps")
        .unwrap()
        .target()
        .unwrap();
    assert_eq!(pushed, head.id());
}

#[test]
fn test_commit_and_push_without_changes_skips_commit() {
    let (_temp, work, remote) = repo_with_remote();
    let repo = open(&work);
    let before = Repository::open(&work)
        .unwrap()
        .head()
        .unwrap()
        .target()
        .unwrap();

    repo.commit_and_push("commit from dep-updater").unwrap();

    let local = Repository::open(&work).unwrap();
    assert_eq!(local.head().unwrap().target().unwrap(), before);

    let bare = Repository::open_bare(&remote).unwrap();
    assert_eq!(
        bare.find_reference("refs/heads/main")
            .unwrap()
            .target()
            .unwrap(),
        before
    );
}

#[test]
fn test_push_without_remote_fails() {
    let temp = TempDir::new().unwrap();
    init_repo(temp.path());
    let repo = open(temp.path());

    fs::write(temp.path().join("package.json"), "{}\n").unwrap();
    let err = repo.commit_and_push("update dependencies").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Repository);
}

#[test]
fn test_push_falls_back_to_configured_url() {
    let temp = TempDir::new().unwrap();
    let work = temp.path().join("portal");
    let remote = temp.path().join("remote.git");
    fs::create_dir_all(&work).unwrap();
    init_repo(&work);
    Repository::init_bare(&remote).unwrap();

    let settings = RemoteSettings {
        url: Some(remote.to_str().unwrap().to_string()),
        credentials: None,
    };
    let repo = GitRepository::open(&work, "portal", settings).unwrap();
    repo.commit_and_push("commit from dep-updater").unwrap();

    let bare = Repository::open_bare(&remote).unwrap();
    assert!(bare.find_reference("refs/heads/main").is_ok());
}

#[test]
fn test_remote_settings_from_config() {
    let config = RepositoryConfig {
        url: " https://git.example.com/frontend ".to_string(),
        username: "deploy".to_string(),
        password: "token".to_string(),
    };
    let settings = RemoteSettings::from(&config);
    assert_eq!(
        settings.url.as_deref(),
        Some("https://git.example.com/frontend")
    );
    assert_eq!(settings.credentials.unwrap().username, "deploy");
}
