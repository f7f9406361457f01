//! The step algebra: the closed set of atomic units of work.
//!
//! Each variant carries its payload and knows how to run itself, how to
//! synthesize the steps that reverse its effect, and which steps must run
//! when a command gets aborted while this step is in flight.
//!
//! Replay safety: the VM persists after a step runs, so a crash between the
//! two may re-run a step on resume. Every variant therefore tolerates a
//! second execution against an already-partially-applied repository; the
//! variant documentation notes how.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::core::domain::{BranchName, LocalBranchName, RemoteBranchName, Sha};
use crate::core::lineage::Lineage;
use crate::io::backend::Backend;
use crate::io::config::Config;
use crate::io::forge::ForgeConnector;
use crate::io::frontend::Frontend;
use crate::messages;

/// Everything a step may touch while running: git state, config, and the
/// forge. Steps never read user input.
pub struct RunArgs<'a> {
    pub backend: &'a Backend,
    pub frontend: &'a Frontend,
    pub config: &'a mut Config,
    pub connector: Option<&'a dyn ForgeConnector>,
    pub lineage: &'a mut Lineage,
}

/// Read-only view for inverse synthesis. May read, must not mutate.
pub struct SynthArgs<'a> {
    pub backend: &'a Backend,
    pub config: &'a Config,
    pub lineage: &'a Lineage,
}

/// When a step's inverse gets its information.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InverseTiming {
    /// The inverse captures state that exists before the step runs
    /// (the current branch, a SHA about to be overwritten).
    PreState,
    /// The inverse refers to state the step itself creates.
    PostState,
    /// The inverse is a pure function of the step's own payload.
    Parametric,
}

/// One atomic, invertible unit of work.
///
/// The serialization tags (the `type` field) are the ground truth for wire
/// compatibility of persisted run states; renaming a variant is a breaking
/// change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Step {
    /// Cancels an in-progress merge. No-op when no merge is in progress,
    /// which makes it safe both as an abort step and inside undo programs.
    AbortMerge,
    /// Cancels an in-progress rebase. No-op when no rebase is in progress.
    AbortRebase,
    AddToPerennialBranches { branch: LocalBranchName },
    /// Rewords the commit at HEAD. Replay after a crash rewords again with
    /// the same message, which is idempotent.
    AmendCommitMessage { message: String },
    /// Checks out the branch. No-op when it is already checked out.
    Checkout { branch: LocalBranchName },
    /// Creates a local branch at the given commit.
    CreateBranch { branch: LocalBranchName, start_point: Sha },
    /// Pushes the branch to origin with `-u`. Pushing an already-pushed
    /// branch is a no-op, so replay is safe.
    CreateTrackingBranch { branch: LocalBranchName, no_push_hook: bool },
    DeleteLocalBranch { branch: LocalBranchName, force: bool },
    /// Removes the branch's parent entry from config. Removing a missing
    /// entry is tolerated.
    DeleteParentBranch { branch: LocalBranchName, parent: Option<LocalBranchName> },
    DeleteRemoteBranch { branch: RemoteBranchName },
    FetchUpstream { branch: LocalBranchName },
    ForcePushBranch { branch: LocalBranchName, no_push_hook: bool },
    /// Merges the branch into the current branch. When a conflict-free merge
    /// is already in progress (resume after the user resolved conflicts),
    /// completes it with `git commit --no-edit` instead.
    Merge { branch: BranchName },
    PushCurrentBranch { branch: LocalBranchName, no_push_hook: bool, undoable: bool },
    PushTags,
    /// Rebases the current branch onto the given branch. When a rebase is
    /// already in progress, continues it instead.
    RebaseBranch { branch: BranchName },
    RemoveFromPerennialBranches { branch: LocalBranchName },
    /// Renames a local branch, moving HEAD along when it is checked out.
    /// No-op when the old name is gone and the new name exists already.
    RenameBranch { old_branch: LocalBranchName, new_branch: LocalBranchName },
    /// No-op when HEAD already points at the target commit.
    ResetCurrentBranchToSha { sha: Sha, hard: bool },
    /// Force-pushes the remote branch to the given commit, creating the
    /// remote ref when it does not exist.
    ResetRemoteBranchToSha { branch: RemoteBranchName, sha: Sha },
    RestoreOpenChanges,
    SetParent { branch: LocalBranchName, parent: LocalBranchName },
    SquashMerge { branch: LocalBranchName, commit_message: String },
    /// Stashes the workspace. No-op on a clean workspace.
    StashOpenChanges,
    UpdateProposalTarget {
        proposal_number: u64,
        new_target: LocalBranchName,
        existing_target: LocalBranchName,
    },
}

impl Step {
    /// The wire name of this step, as used in persisted run states.
    pub fn name(&self) -> &'static str {
        match self {
            Step::AbortMerge => "AbortMerge",
            Step::AbortRebase => "AbortRebase",
            Step::AddToPerennialBranches { .. } => "AddToPerennialBranches",
            Step::AmendCommitMessage { .. } => "AmendCommitMessage",
            Step::Checkout { .. } => "Checkout",
            Step::CreateBranch { .. } => "CreateBranch",
            Step::CreateTrackingBranch { .. } => "CreateTrackingBranch",
            Step::DeleteLocalBranch { .. } => "DeleteLocalBranch",
            Step::DeleteParentBranch { .. } => "DeleteParentBranch",
            Step::DeleteRemoteBranch { .. } => "DeleteRemoteBranch",
            Step::FetchUpstream { .. } => "FetchUpstream",
            Step::ForcePushBranch { .. } => "ForcePushBranch",
            Step::Merge { .. } => "Merge",
            Step::PushCurrentBranch { .. } => "PushCurrentBranch",
            Step::PushTags => "PushTags",
            Step::RebaseBranch { .. } => "RebaseBranch",
            Step::RemoveFromPerennialBranches { .. } => "RemoveFromPerennialBranches",
            Step::RenameBranch { .. } => "RenameBranch",
            Step::ResetCurrentBranchToSha { .. } => "ResetCurrentBranchToSha",
            Step::ResetRemoteBranchToSha { .. } => "ResetRemoteBranchToSha",
            Step::RestoreOpenChanges => "RestoreOpenChanges",
            Step::SetParent { .. } => "SetParent",
            Step::SquashMerge { .. } => "SquashMerge",
            Step::StashOpenChanges => "StashOpenChanges",
            Step::UpdateProposalTarget { .. } => "UpdateProposalTarget",
        }
    }

    /// Perform this step's effect.
    pub fn run(&self, args: &mut RunArgs) -> Result<()> {
        match self {
            Step::AbortMerge => {
                if args.backend.has_merge_in_progress()? {
                    args.frontend.abort_merge()?;
                }
                Ok(())
            }
            Step::AbortRebase => {
                if args.backend.has_rebase_in_progress()? {
                    args.frontend.abort_rebase()?;
                }
                Ok(())
            }
            Step::AddToPerennialBranches { branch } => args.config.add_perennial_branch(branch),
            Step::AmendCommitMessage { message } => args.frontend.commit_amend(message),
            Step::Checkout { branch } => {
                if &args.backend.current_branch()? != branch {
                    args.frontend.checkout(branch)?;
                }
                Ok(())
            }
            Step::CreateBranch { branch, start_point } => {
                args.frontend.create_branch(branch, start_point)
            }
            Step::CreateTrackingBranch { branch, no_push_hook } => {
                args.frontend.create_tracking_branch(branch, *no_push_hook)
            }
            Step::DeleteLocalBranch { branch, force } => {
                args.frontend.delete_local_branch(branch, *force)
            }
            Step::DeleteParentBranch { branch, .. } => {
                args.config.remove_parent(branch)?;
                args.lineage.remove_parent(branch);
                Ok(())
            }
            Step::DeleteRemoteBranch { branch } => args.frontend.delete_remote_branch(branch),
            Step::FetchUpstream { branch } => args.frontend.fetch_upstream(branch),
            Step::ForcePushBranch { no_push_hook, .. } => args.frontend.force_push(*no_push_hook),
            Step::Merge { branch } => {
                if args.backend.has_merge_in_progress()? {
                    if args.backend.has_unmerged_files()? {
                        return Err(anyhow!(messages::CONTINUE_UNRESOLVED_CONFLICTS));
                    }
                    return args.frontend.commit_no_edit();
                }
                args.frontend.merge_no_edit(branch)
            }
            Step::PushCurrentBranch { no_push_hook, .. } => args.frontend.push(*no_push_hook),
            Step::PushTags => args.frontend.push_tags(),
            Step::RebaseBranch { branch } => {
                if args.backend.has_rebase_in_progress()? {
                    if args.backend.has_unmerged_files()? {
                        return Err(anyhow!(messages::CONTINUE_UNRESOLVED_CONFLICTS));
                    }
                    return args.frontend.continue_rebase();
                }
                args.frontend.rebase(branch)
            }
            Step::RemoveFromPerennialBranches { branch } => {
                args.config.remove_perennial_branch(branch)
            }
            Step::RenameBranch { old_branch, new_branch } => {
                if !args.backend.branch_exists(old_branch)?
                    && args.backend.branch_exists(new_branch)?
                {
                    return Ok(());
                }
                args.frontend.rename_branch(old_branch, new_branch)
            }
            Step::ResetCurrentBranchToSha { sha, hard } => {
                if &args.backend.sha_for_ref("HEAD")? == sha {
                    return Ok(());
                }
                args.frontend.reset_to_sha(sha, *hard)
            }
            Step::ResetRemoteBranchToSha { branch, sha } => {
                args.frontend.reset_remote_branch_to_sha(branch, sha)
            }
            Step::RestoreOpenChanges => args
                .frontend
                .pop_stash()
                .map_err(|_| anyhow!(messages::CONFLICTING_OPEN_CHANGES)),
            Step::SetParent { branch, parent } => {
                args.config.set_parent(branch, parent)?;
                args.lineage.set_parent(branch.clone(), parent.clone());
                Ok(())
            }
            Step::SquashMerge { branch, commit_message } => {
                args.frontend.squash_merge(&BranchName::from(branch.clone()))?;
                args.frontend.commit(commit_message)
            }
            Step::StashOpenChanges => {
                if args.backend.has_open_changes()? {
                    args.frontend.stash_open_changes()?;
                }
                Ok(())
            }
            Step::UpdateProposalTarget {
                proposal_number,
                new_target,
                ..
            } => {
                let connector = args
                    .connector
                    .ok_or_else(|| anyhow!(messages::NO_FORGE_CONNECTOR))?;
                connector.update_proposal_target(*proposal_number, new_target)
            }
        }
    }

    /// The ordered steps that reverse this step's effect.
    ///
    /// The VM calls this before `run` for every step; arms tagged
    /// [`InverseTiming::PreState`] capture the state they need here.
    pub fn create_undo_steps(&self, args: &SynthArgs) -> Result<Vec<Step>> {
        match self {
            Step::AbortMerge | Step::AbortRebase => Ok(vec![]),
            Step::AddToPerennialBranches { branch } => {
                Ok(vec![Step::RemoveFromPerennialBranches { branch: branch.clone() }])
            }
            Step::AmendCommitMessage { .. } => Ok(vec![Step::ResetCurrentBranchToSha {
                sha: args.backend.sha_for_ref("HEAD")?,
                hard: false,
            }]),
            Step::Checkout { .. } => Ok(vec![Step::Checkout {
                branch: args.backend.current_branch()?,
            }]),
            Step::CreateBranch { branch, .. } => Ok(vec![Step::DeleteLocalBranch {
                branch: branch.clone(),
                force: true,
            }]),
            Step::CreateTrackingBranch { branch, .. } => Ok(vec![Step::DeleteRemoteBranch {
                branch: branch.tracking_branch(),
            }]),
            Step::DeleteLocalBranch { branch, .. } => Ok(vec![Step::CreateBranch {
                branch: branch.clone(),
                start_point: args.backend.sha_for_ref(branch.as_str())?,
            }]),
            Step::DeleteParentBranch { branch, parent } => Ok(match parent {
                Some(parent) => vec![Step::SetParent {
                    branch: branch.clone(),
                    parent: parent.clone(),
                }],
                None => vec![],
            }),
            Step::DeleteRemoteBranch { branch } => Ok(vec![Step::ResetRemoteBranchToSha {
                branch: branch.clone(),
                sha: args.backend.sha_for_ref(branch.as_str())?,
            }]),
            Step::FetchUpstream { .. } | Step::PushTags => Ok(vec![]),
            Step::ForcePushBranch { branch, .. } => {
                Ok(undo_for_push(args.backend, branch))
            }
            Step::Merge { .. } => Ok(vec![
                Step::AbortMerge,
                Step::ResetCurrentBranchToSha {
                    sha: args.backend.sha_for_ref("HEAD")?,
                    hard: true,
                },
            ]),
            Step::PushCurrentBranch { branch, undoable, .. } => {
                if *undoable {
                    Ok(undo_for_push(args.backend, branch))
                } else {
                    // Pushes to shared branches are non-undoable by policy.
                    Ok(vec![])
                }
            }
            Step::RebaseBranch { .. } => Ok(vec![
                Step::AbortRebase,
                Step::ResetCurrentBranchToSha {
                    sha: args.backend.sha_for_ref("HEAD")?,
                    hard: true,
                },
            ]),
            Step::RemoveFromPerennialBranches { branch } => {
                Ok(vec![Step::AddToPerennialBranches { branch: branch.clone() }])
            }
            Step::RenameBranch { old_branch, new_branch } => Ok(vec![Step::RenameBranch {
                old_branch: new_branch.clone(),
                new_branch: old_branch.clone(),
            }]),
            Step::ResetCurrentBranchToSha { hard, .. } => Ok(vec![Step::ResetCurrentBranchToSha {
                sha: args.backend.sha_for_ref("HEAD")?,
                hard: *hard,
            }]),
            Step::ResetRemoteBranchToSha { branch, .. } => {
                Ok(match args.backend.sha_for_ref(branch.as_str()) {
                    Ok(sha) => vec![Step::ResetRemoteBranchToSha { branch: branch.clone(), sha }],
                    // The remote ref does not exist yet; this step creates it.
                    Err(_) => vec![Step::DeleteRemoteBranch { branch: branch.clone() }],
                })
            }
            Step::RestoreOpenChanges => Ok(vec![Step::StashOpenChanges]),
            Step::SetParent { branch, .. } => Ok(match args.lineage.parent(branch) {
                Some(previous) => vec![Step::SetParent {
                    branch: branch.clone(),
                    parent: previous.clone(),
                }],
                None => vec![Step::DeleteParentBranch {
                    branch: branch.clone(),
                    parent: None,
                }],
            }),
            Step::SquashMerge { .. } => Ok(vec![
                Step::AbortMerge,
                Step::ResetCurrentBranchToSha {
                    sha: args.backend.sha_for_ref("HEAD")?,
                    hard: true,
                },
            ]),
            Step::StashOpenChanges => Ok(vec![Step::RestoreOpenChanges]),
            Step::UpdateProposalTarget {
                proposal_number,
                new_target,
                existing_target,
            } => Ok(vec![Step::UpdateProposalTarget {
                proposal_number: *proposal_number,
                new_target: existing_target.clone(),
                existing_target: new_target.clone(),
            }]),
        }
    }

    /// The steps that must run when the command gets aborted while this step
    /// is in flight.
    pub fn create_abort_steps(&self) -> Vec<Step> {
        match self {
            Step::Merge { .. } | Step::SquashMerge { .. } => vec![Step::AbortMerge],
            Step::RebaseBranch { .. } => vec![Step::AbortRebase],
            _ => vec![],
        }
    }

    /// True if a failure of this step must trigger an automatic abort of the
    /// whole program instead of handing control back to the user.
    pub fn should_auto_abort_on_error(&self) -> bool {
        matches!(self, Step::UpdateProposalTarget { .. })
    }

    /// The user-facing message emitted after an automatic abort.
    pub fn automatic_abort_error(&self) -> Option<String> {
        match self {
            Step::UpdateProposalTarget { proposal_number, .. } => {
                Some(messages::proposal_target_update_problem(*proposal_number))
            }
            _ => None,
        }
    }

    /// When this step's inverse gets its information.
    pub fn inverse_timing(&self) -> InverseTiming {
        match self {
            Step::AmendCommitMessage { .. }
            | Step::Checkout { .. }
            | Step::DeleteLocalBranch { .. }
            | Step::DeleteRemoteBranch { .. }
            | Step::ForcePushBranch { .. }
            | Step::Merge { .. }
            | Step::PushCurrentBranch { .. }
            | Step::RebaseBranch { .. }
            | Step::ResetCurrentBranchToSha { .. }
            | Step::ResetRemoteBranchToSha { .. }
            | Step::SetParent { .. }
            | Step::SquashMerge { .. } => InverseTiming::PreState,
            Step::CreateBranch { .. } | Step::CreateTrackingBranch { .. } => InverseTiming::PostState,
            Step::AbortMerge
            | Step::AbortRebase
            | Step::AddToPerennialBranches { .. }
            | Step::DeleteParentBranch { .. }
            | Step::FetchUpstream { .. }
            | Step::PushTags
            | Step::RemoveFromPerennialBranches { .. }
            | Step::RenameBranch { .. }
            | Step::RestoreOpenChanges
            | Step::StashOpenChanges
            | Step::UpdateProposalTarget { .. } => InverseTiming::Parametric,
        }
    }
}

/// The inverse of a push: force the tracking branch back to its current
/// commit. Yields nothing when the branch has no tracking branch yet.
fn undo_for_push(backend: &Backend, branch: &LocalBranchName) -> Vec<Step> {
    let tracking = branch.tracking_branch();
    match backend.sha_for_ref(tracking.as_str()) {
        Ok(sha) => vec![Step::ResetRemoteBranchToSha { branch: tracking, sha }],
        Err(_) => vec![],
    }
}
