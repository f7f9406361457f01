//! Opening a repository and loading the branch snapshot commands plan
//! against.

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::core::domain::{Branches, BranchTypes};
use crate::io::backend::Backend;
use crate::io::config::Config;
use crate::io::frontend::Frontend;

/// The opened repository: adapters rooted at the worktree top level plus the
/// resolved git directory for run-state persistence.
pub struct Repo {
    pub backend: Backend,
    pub frontend: Frontend,
    pub config: Config,
    pub root_dir: PathBuf,
    pub git_dir: PathBuf,
}

/// Open the repository containing the current working directory.
pub fn open(dry_run: bool) -> Result<Repo> {
    open_at(".", dry_run)
}

/// Open the repository containing the given directory.
pub fn open_at(dir: impl Into<PathBuf>, dry_run: bool) -> Result<Repo> {
    let probe = Backend::new(dir.into());
    let root_dir = probe.root_dir().context("not a git repository")?;
    let backend = Backend::new(&root_dir);
    let git_dir = backend.git_dir()?;
    let frontend = Frontend::new(&root_dir, dry_run);
    let config = Config::new(&root_dir)?;
    Ok(Repo {
        backend,
        frontend,
        config,
        root_dir,
        git_dir,
    })
}

/// Load the branch snapshot, optionally fetching from origin first.
pub fn load_branches(repo: &Repo, fetch: bool) -> Result<Branches> {
    let remotes = repo.backend.remotes()?;
    if fetch && remotes.has_origin() && !repo.config.is_offline()? {
        repo.frontend.fetch()?;
    }
    let all = repo.backend.branches()?;
    let initial = repo.backend.current_branch()?;
    let types = BranchTypes {
        main_branch: repo.config.validated_main_branch()?,
        perennial_branches: repo.config.perennial_branches(),
    };
    Ok(Branches { initial, all, types })
}
