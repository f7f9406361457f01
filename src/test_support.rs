//! Test-only helpers for constructing scratch git repositories.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{anyhow, Context, Result};
use tempfile::TempDir;

use crate::core::domain::LocalBranchName;
use crate::io::forge::{ForgeConnector, Proposal};

/// A throwaway git repository with a seeded initial commit on `main`,
/// optionally wired to a bare "origin" repository next to it.
pub struct TestRepo {
    dir: TempDir,
    root: PathBuf,
}

impl TestRepo {
    pub fn new() -> Result<Self> {
        let dir = TempDir::new().context("create tempdir")?;
        let root = dir.path().join("repo");
        fs::create_dir_all(&root).context("create repo dir")?;
        let repo = Self { dir, root };
        repo.git(&["init", "--initial-branch=main"])?;
        repo.git(&["config", "user.email", "test@example.com"])?;
        repo.git(&["config", "user.name", "test"])?;
        // Local-only config keeps tests hermetic.
        repo.git(&["config", "commit.gpgsign", "false"])?;
        repo.commit_file("README.md", "hi\n", "chore: init")?;
        Ok(repo)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create a bare origin repository next to the worktree and push `main`.
    pub fn add_origin(&self) -> Result<()> {
        let origin = self.dir.path().join("origin.git");
        let status = Command::new("git")
            .args(["init", "--bare", "--initial-branch=main"])
            .arg(&origin)
            .output()
            .context("git init --bare")?;
        if !status.status.success() {
            return Err(anyhow!("git init --bare failed"));
        }
        let origin_path = origin.to_string_lossy().to_string();
        self.git(&["remote", "add", "origin", &origin_path])?;
        self.git(&["push", "-u", "origin", "main"])?;
        Ok(())
    }

    pub fn git(&self, args: &[&str]) -> Result<()> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.root)
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("git {} failed: {}", args.join(" "), stderr.trim()));
        }
        Ok(())
    }

    pub fn git_capture(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.root)
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("git {} failed: {}", args.join(" "), stderr.trim()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
    }

    pub fn commit_file(&self, name: &str, contents: &str, message: &str) -> Result<()> {
        let path = self.root.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        }
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
        self.git(&["add", name])?;
        self.git(&["commit", "-m", message])
    }

    pub fn write_file(&self, name: &str, contents: &str) -> Result<()> {
        let path = self.root.join(name);
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))
    }

    pub fn read_file(&self, name: &str) -> Result<String> {
        let path = self.root.join(name);
        fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))
    }

    pub fn create_branch(&self, name: &str, start_point: &str) -> Result<()> {
        self.git(&["branch", name, start_point])
    }

    pub fn checkout(&self, name: &str) -> Result<()> {
        self.git(&["checkout", name])
    }

    pub fn current_branch(&self) -> Result<String> {
        self.git_capture(&["rev-parse", "--abbrev-ref", "HEAD"])
    }

    pub fn sha(&self, reference: &str) -> Result<String> {
        self.git_capture(&["rev-parse", reference])
    }

    pub fn set_config(&self, key: &str, value: &str) -> Result<()> {
        self.git(&["config", key, value])
    }

    /// Declare the main branch and an optional lineage in git-town config.
    pub fn configure_git_town(&self, main: &str, lineage: &[(&str, &str)]) -> Result<()> {
        self.set_config("git-town.main-branch", main)?;
        for (child, parent) in lineage {
            self.set_config(&format!("git-town.branch.{child}.parent"), parent)?;
        }
        Ok(())
    }
}

/// Forge connector double that records retargets and can be told to fail.
pub struct ScriptedConnector {
    pub proposals: Vec<Proposal>,
    pub fail_updates: bool,
    pub retargets: std::cell::RefCell<Vec<(u64, LocalBranchName)>>,
}

impl ScriptedConnector {
    pub fn new(proposals: Vec<Proposal>) -> Self {
        Self {
            proposals,
            fail_updates: false,
            retargets: std::cell::RefCell::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            proposals: Vec::new(),
            fail_updates: true,
            retargets: std::cell::RefCell::new(Vec::new()),
        }
    }
}

impl ForgeConnector for ScriptedConnector {
    fn find_proposal(
        &self,
        _branch: &LocalBranchName,
        target: &LocalBranchName,
    ) -> Result<Option<Proposal>> {
        Ok(self
            .proposals
            .iter()
            .find(|proposal| &proposal.target == target)
            .cloned())
    }

    fn update_proposal_target(&self, number: u64, target: &LocalBranchName) -> Result<()> {
        if self.fail_updates {
            return Err(anyhow!("forge API returned 502"));
        }
        self.retargets.borrow_mut().push((number, target.clone()));
        Ok(())
    }
}
