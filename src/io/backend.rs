//! Read-only queries against the git repository.
//!
//! The backend never mutates anything. It is the only component steps may
//! consult while synthesizing their inverse.

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use tracing::warn;

use crate::core::domain::{
    BranchInfo, BranchInfos, LocalBranchName, RemoteBranchName, Remotes, Sha, SyncStatus,
};
use crate::io::git::GitRunner;
use crate::messages;

/// Read-only git queries.
#[derive(Debug, Clone)]
pub struct Backend {
    runner: GitRunner,
}

impl Backend {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            runner: GitRunner::new(workdir),
        }
    }

    /// The currently checked out branch (errors on detached HEAD).
    pub fn current_branch(&self) -> Result<LocalBranchName> {
        let name = self.runner.run_capture(&["rev-parse", "--abbrev-ref", "HEAD"])?;
        if name == "HEAD" {
            warn!("detached HEAD detected");
            return Err(anyhow!(messages::CURRENTLY_DETACHED));
        }
        LocalBranchName::new(name)
    }

    /// The branch that was checked out before the current one, if any.
    pub fn previously_checked_out_branch(&self) -> Option<LocalBranchName> {
        let output = self.runner.run(&["rev-parse", "--abbrev-ref", "@{-1}"]).ok()?;
        if !output.status.success() {
            return None;
        }
        let name = String::from_utf8_lossy(&output.stdout).trim().to_string();
        LocalBranchName::new(name).ok()
    }

    /// All local and remote branches with tracking information.
    pub fn branches(&self) -> Result<BranchInfos> {
        let output = self.runner.run_capture(&[
            "for-each-ref",
            "--format=%(refname)%00%(objectname)%00%(upstream:short)%00%(upstream:track)",
            "refs/heads",
            "refs/remotes",
        ])?;
        parse_branch_refs(&output)
    }

    pub fn remotes(&self) -> Result<Remotes> {
        let output = self.runner.run_capture(&["remote"])?;
        Ok(Remotes::new(
            output.lines().map(|line| line.trim().to_string()).filter(|line| !line.is_empty()).collect(),
        ))
    }

    /// True if the working tree or index contain uncommitted changes.
    pub fn has_open_changes(&self) -> Result<bool> {
        let output = self
            .runner
            .run_capture(&["status", "--porcelain", "--ignore-submodules"])?;
        Ok(!output.trim().is_empty())
    }

    pub fn has_merge_in_progress(&self) -> Result<bool> {
        let output = self.runner.run(&["rev-parse", "-q", "--verify", "MERGE_HEAD"])?;
        Ok(output.status.success())
    }

    pub fn has_rebase_in_progress(&self) -> Result<bool> {
        for dir in ["rebase-merge", "rebase-apply"] {
            let path = self.runner.run_capture(&["rev-parse", "--git-path", dir])?;
            let path = PathBuf::from(path);
            let path = if path.is_absolute() {
                path
            } else {
                self.runner.workdir().join(path)
            };
            if path.exists() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// True while the index contains conflicted entries.
    pub fn has_unmerged_files(&self) -> Result<bool> {
        let output = self.runner.run_capture(&["ls-files", "--unmerged"])?;
        Ok(!output.trim().is_empty())
    }

    pub fn branch_exists(&self, branch: &LocalBranchName) -> Result<bool> {
        let output = self.runner.run(&[
            "show-ref",
            "--verify",
            "--quiet",
            &format!("refs/heads/{branch}"),
        ])?;
        Ok(output.status.success())
    }

    pub fn sha_for_ref(&self, reference: &str) -> Result<Sha> {
        let output = self.runner.run_capture(&["rev-parse", reference])?;
        Sha::new(output).with_context(|| format!("resolve ref {reference:?}"))
    }

    /// Commit subjects on `branch` since its merge-base with `parent`,
    /// oldest first.
    pub fn commits_in_branch(
        &self,
        branch: &LocalBranchName,
        parent: &LocalBranchName,
    ) -> Result<Vec<String>> {
        let range = format!("{parent}..{branch}");
        let output = self
            .runner
            .run_capture(&["log", "--format=%s", "--reverse", &range])?;
        Ok(output.lines().map(|line| line.to_string()).filter(|line| !line.is_empty()).collect())
    }

    pub fn root_dir(&self) -> Result<PathBuf> {
        let output = self.runner.run_capture(&["rev-parse", "--show-toplevel"])?;
        Ok(PathBuf::from(output))
    }

    pub fn git_dir(&self) -> Result<PathBuf> {
        let output = self.runner.run_capture(&["rev-parse", "--absolute-git-dir"])?;
        Ok(PathBuf::from(output))
    }
}

/// Parse `git for-each-ref` output (NUL-separated fields) into branch infos.
fn parse_branch_refs(output: &str) -> Result<BranchInfos> {
    let mut locals: Vec<(LocalBranchName, Sha, Option<RemoteBranchName>, SyncStatus)> = Vec::new();
    let mut remotes: Vec<(RemoteBranchName, Sha)> = Vec::new();

    for line in output.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\u{0}').collect();
        if fields.len() != 4 {
            return Err(anyhow!("unexpected for-each-ref line: {line:?}"));
        }
        let (refname, sha, upstream, track) = (fields[0], fields[1], fields[2], fields[3]);
        if let Some(name) = refname.strip_prefix("refs/heads/") {
            let local = LocalBranchName::new(name)?;
            let remote_name = if upstream.is_empty() {
                None
            } else {
                Some(RemoteBranchName::new(upstream)?)
            };
            let status = sync_status(remote_name.is_some(), track);
            locals.push((local, Sha::new(sha)?, remote_name, status));
        } else if let Some(name) = refname.strip_prefix("refs/remotes/") {
            if name.ends_with("/HEAD") {
                continue;
            }
            remotes.push((RemoteBranchName::new(name)?, Sha::new(sha)?));
        }
    }

    let mut infos = Vec::new();
    for (local, sha, remote_name, status) in locals {
        let remote_sha = remote_name
            .as_ref()
            .and_then(|name| remotes.iter().find(|(remote, _)| remote == name))
            .map(|(_, sha)| sha.clone());
        infos.push(BranchInfo {
            local_name: Some(local),
            local_sha: Some(sha),
            sync_status: status,
            remote_name,
            remote_sha,
        });
    }
    for (remote, sha) in remotes {
        let tracked = infos
            .iter()
            .any(|info: &BranchInfo| info.remote_name.as_ref() == Some(&remote));
        if !tracked {
            infos.push(BranchInfo {
                local_name: None,
                local_sha: None,
                sync_status: SyncStatus::RemoteOnly,
                remote_name: Some(remote),
                remote_sha: Some(sha),
            });
        }
    }
    BranchInfos::new(infos)
}

/// Derive the sync status from the `%(upstream:track)` decoration.
fn sync_status(has_upstream: bool, track: &str) -> SyncStatus {
    if !has_upstream {
        return SyncStatus::LocalOnly;
    }
    let track = track.trim();
    if track.is_empty() {
        return SyncStatus::UpToDate;
    }
    if track == "[gone]" {
        return SyncStatus::DeletedAtRemote;
    }
    let ahead = track.contains("ahead");
    let behind = track.contains("behind");
    match (ahead, behind) {
        (true, true) => SyncStatus::NotInSync,
        (true, false) => SyncStatus::Ahead,
        (false, true) => SyncStatus::Behind,
        // Unknown decoration, assume the safest interpretation.
        (false, false) => SyncStatus::NotInSync,
    }
}
