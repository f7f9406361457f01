//! Mutating git operations.
//!
//! All repository mutations go through this type. In dry-run mode each call
//! prints the intended git command to stdout and mutates nothing, so a dry
//! plan still shows the full trajectory.

use std::path::PathBuf;

use anyhow::Result;

use crate::core::domain::{BranchName, LocalBranchName, RemoteBranchName, Sha};
use crate::io::git::GitRunner;

/// Mutating git operations, dry-run aware.
#[derive(Debug, Clone)]
pub struct Frontend {
    runner: GitRunner,
    dry_run: bool,
}

impl Frontend {
    pub fn new(workdir: impl Into<PathBuf>, dry_run: bool) -> Self {
        Self {
            runner: GitRunner::new(workdir),
            dry_run,
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    fn run_git(&self, args: &[&str]) -> Result<()> {
        if self.dry_run {
            println!("(dry-run) git {}", args.join(" "));
            return Ok(());
        }
        self.runner.run_checked(args)?;
        Ok(())
    }

    pub fn checkout(&self, branch: &LocalBranchName) -> Result<()> {
        self.run_git(&["checkout", branch.as_str()])
    }

    pub fn create_branch(&self, branch: &LocalBranchName, start_point: &Sha) -> Result<()> {
        self.run_git(&["branch", branch.as_str(), start_point.as_str()])
    }

    /// Push the current branch, creating the tracking relationship.
    pub fn create_tracking_branch(&self, branch: &LocalBranchName, no_push_hook: bool) -> Result<()> {
        let mut args = vec!["push", "-u"];
        if no_push_hook {
            args.push("--no-verify");
        }
        args.extend(["origin", branch.as_str()]);
        self.run_git(&args)
    }

    pub fn push(&self, no_push_hook: bool) -> Result<()> {
        let mut args = vec!["push"];
        if no_push_hook {
            args.push("--no-verify");
        }
        self.run_git(&args)
    }

    pub fn force_push(&self, no_push_hook: bool) -> Result<()> {
        let mut args = vec!["push", "--force-with-lease"];
        if no_push_hook {
            args.push("--no-verify");
        }
        self.run_git(&args)
    }

    pub fn push_tags(&self) -> Result<()> {
        self.run_git(&["push", "--tags"])
    }

    /// Force the remote branch to the given commit, creating it if needed.
    pub fn reset_remote_branch_to_sha(&self, branch: &RemoteBranchName, sha: &Sha) -> Result<()> {
        let refspec = format!("{}:refs/heads/{}", sha, branch.local_name());
        self.run_git(&["push", "--force", branch.remote(), &refspec])
    }

    pub fn delete_remote_branch(&self, branch: &RemoteBranchName) -> Result<()> {
        let refspec = format!(":{}", branch.local_name());
        self.run_git(&["push", branch.remote(), &refspec])
    }

    pub fn delete_local_branch(&self, branch: &LocalBranchName, force: bool) -> Result<()> {
        let flag = if force { "-D" } else { "-d" };
        self.run_git(&["branch", flag, branch.as_str()])
    }

    pub fn rename_branch(&self, old: &LocalBranchName, new: &LocalBranchName) -> Result<()> {
        self.run_git(&["branch", "-m", old.as_str(), new.as_str()])
    }

    pub fn fetch(&self) -> Result<()> {
        self.run_git(&["fetch", "--prune", "--tags"])
    }

    pub fn fetch_upstream(&self, branch: &LocalBranchName) -> Result<()> {
        self.run_git(&["fetch", "upstream", branch.as_str()])
    }

    pub fn merge_no_edit(&self, branch: &BranchName) -> Result<()> {
        self.run_git(&["merge", "--no-edit", branch.as_str()])
    }

    pub fn squash_merge(&self, branch: &BranchName) -> Result<()> {
        self.run_git(&["merge", "--squash", branch.as_str()])
    }

    pub fn commit(&self, message: &str) -> Result<()> {
        self.run_git(&["commit", "-m", message])
    }

    pub fn commit_no_edit(&self) -> Result<()> {
        self.run_git(&["commit", "--no-edit"])
    }

    pub fn commit_amend(&self, message: &str) -> Result<()> {
        self.run_git(&["commit", "--amend", "-m", message])
    }

    pub fn rebase(&self, branch: &BranchName) -> Result<()> {
        self.run_git(&["rebase", branch.as_str()])
    }

    pub fn continue_rebase(&self) -> Result<()> {
        self.run_git(&["-c", "core.editor=true", "rebase", "--continue"])
    }

    pub fn abort_merge(&self) -> Result<()> {
        self.run_git(&["merge", "--abort"])
    }

    pub fn abort_rebase(&self) -> Result<()> {
        self.run_git(&["rebase", "--abort"])
    }

    pub fn stash_open_changes(&self) -> Result<()> {
        self.run_git(&["stash", "push", "--include-untracked"])
    }

    pub fn pop_stash(&self) -> Result<()> {
        self.run_git(&["stash", "pop"])
    }

    pub fn reset_to_sha(&self, sha: &Sha, hard: bool) -> Result<()> {
        if hard {
            self.run_git(&["reset", "--hard", sha.as_str()])
        } else {
            self.run_git(&["reset", "--soft", sha.as_str()])
        }
    }
}
