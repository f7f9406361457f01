//! Planner for the `sync` command.

use anyhow::{anyhow, Result};

use crate::core::domain::{BranchInfo, BranchName, Branches, LocalBranchName, Remotes};
use crate::core::lineage::Lineage;
use crate::io::config::{PullBranchStrategy, SyncStrategy};
use crate::io::repo::Repo;
use crate::messages;
use crate::runstate::{StepList, StepListBuilder, WrapOptions};
use crate::steps::Step;

/// Everything the sync planner needs, gathered up front.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub branches: Branches,
    pub branches_to_sync: Vec<BranchInfo>,
    pub has_open_changes: bool,
    pub remotes: Remotes,
    pub is_offline: bool,
    pub lineage: Lineage,
    pub main_branch: LocalBranchName,
    pub previous_branch: Option<LocalBranchName>,
    pub pull_branch_strategy: PullBranchStrategy,
    pub push_hook: bool,
    pub should_push_tags: bool,
    pub should_sync_upstream: bool,
    pub sync_strategy: SyncStrategy,
}

/// The names of the branches to sync, in sync order.
///
/// With `--all` this is every local branch's closure under ancestors. For a
/// single-branch sync it is the initial branch's closure with perennial
/// ancestors omitted: their changes reach the feature branch through the
/// parent merge, and rewriting shared branches is not this command's job.
///
/// Feature branches without a known parent are a precondition error; the
/// lineage must be completed before syncing can be planned.
pub fn branch_names_to_sync(
    branches: &Branches,
    lineage: &Lineage,
    all: bool,
) -> Result<Vec<LocalBranchName>> {
    let requested = if all {
        branches.all.local_names()
    } else {
        vec![branches.initial.clone()]
    };
    for branch in &requested {
        if branches.types.is_feature_branch(branch) && !lineage.has_parent(branch) {
            return Err(anyhow!(messages::branch_missing_parent(branch.as_str())));
        }
    }
    let closure = lineage.branches_and_ancestors(&requested);
    if all {
        return Ok(closure);
    }
    Ok(closure
        .into_iter()
        .filter(|branch| {
            branches.types.is_feature_branch(branch) || branch == &branches.initial
        })
        .collect())
}

/// Gather the sync configuration for the given snapshot.
pub fn determine_sync_config(
    repo: &Repo,
    branches: &Branches,
    lineage: &Lineage,
    all: bool,
) -> Result<SyncConfig> {
    let main_branch = repo.config.validated_main_branch()?;
    let names = branch_names_to_sync(branches, lineage, all)?;
    let branches_to_sync = branches.all.select(&names)?;
    let should_push_tags = all || !branches.types.is_feature_branch(&branches.initial);
    Ok(SyncConfig {
        branches: branches.clone(),
        branches_to_sync,
        has_open_changes: repo.backend.has_open_changes()?,
        remotes: repo.backend.remotes()?,
        is_offline: repo.config.is_offline()?,
        lineage: lineage.clone(),
        main_branch,
        previous_branch: repo.backend.previously_checked_out_branch(),
        pull_branch_strategy: repo.config.pull_branch_strategy()?,
        push_hook: repo.config.push_hook()?,
        should_push_tags,
        should_sync_upstream: repo.config.should_sync_upstream()?,
        sync_strategy: repo.config.sync_strategy()?,
    })
}

/// The step list for the `sync` command.
pub fn sync_branches_steps(config: &SyncConfig) -> Result<StepList> {
    let mut list = StepListBuilder::new();
    for branch in &config.branches_to_sync {
        sync_branch_steps(&mut list, branch, config);
    }
    list.add(Step::Checkout {
        branch: config.branches.initial.clone(),
    });
    if config.remotes.has_origin() && config.should_push_tags && !config.is_offline {
        list.add(Step::PushTags);
    }
    list.wrap(WrapOptions {
        stash_open_changes: config.has_open_changes,
        initial_branch: config.branches.initial.clone(),
        previous_branch: config.previous_branch.clone(),
    });
    list.result()
}

/// The steps to sync one particular branch.
fn sync_branch_steps(list: &mut StepListBuilder, branch: &BranchInfo, config: &SyncConfig) {
    let Some(local_name) = &branch.local_name else {
        return;
    };
    let is_feature_branch = config.branches.types.is_feature_branch(local_name);
    if !is_feature_branch && !config.remotes.has_origin() {
        // perennial branch but no remote, nothing to sync against
        return;
    }
    list.add(Step::Checkout {
        branch: local_name.clone(),
    });
    if is_feature_branch {
        sync_feature_branch_steps(list, branch, local_name, config);
    } else {
        sync_perennial_branch_steps(list, branch, local_name, config);
    }
    if config.remotes.has_origin() && !config.is_offline {
        if !branch.has_tracking_branch() {
            list.add(Step::CreateTrackingBranch {
                branch: local_name.clone(),
                no_push_hook: false,
            });
        } else if !is_feature_branch {
            list.add(Step::PushCurrentBranch {
                branch: local_name.clone(),
                no_push_hook: false,
                undoable: false,
            });
        } else {
            push_feature_branch_steps(list, local_name, config);
        }
    }
}

/// Pull the tracking branch and then the parent branch into the current
/// feature branch, using the configured sync strategy.
fn sync_feature_branch_steps(
    list: &mut StepListBuilder,
    branch: &BranchInfo,
    local_name: &LocalBranchName,
    config: &SyncConfig,
) {
    if branch.has_tracking_branch() {
        if let Some(remote_name) = &branch.remote_name {
            pull_branch_step(list, BranchName::from(remote_name.clone()), config.sync_strategy);
        }
    }
    match config.lineage.parent(local_name) {
        Some(parent) => {
            pull_branch_step(list, BranchName::from(parent.clone()), config.sync_strategy);
        }
        None => list.fail(messages::branch_missing_parent(local_name.as_str())),
    }
}

/// Pull the tracking branch into the current perennial branch; the main
/// branch additionally rebases onto its upstream counterpart.
fn sync_perennial_branch_steps(
    list: &mut StepListBuilder,
    branch: &BranchInfo,
    local_name: &LocalBranchName,
    config: &SyncConfig,
) {
    if branch.has_tracking_branch() {
        if let Some(remote_name) = &branch.remote_name {
            let branch_name = BranchName::from(remote_name.clone());
            match config.pull_branch_strategy {
                PullBranchStrategy::Merge => list.add(Step::Merge { branch: branch_name }),
                PullBranchStrategy::Rebase => list.add(Step::RebaseBranch { branch: branch_name }),
            }
        }
    }
    if local_name == &config.main_branch
        && config.remotes.has_upstream()
        && config.should_sync_upstream
    {
        list.add(Step::FetchUpstream {
            branch: config.main_branch.clone(),
        });
        let upstream_main = config.main_branch.at_remote("upstream");
        list.add(Step::RebaseBranch {
            branch: BranchName::from(upstream_main),
        });
    }
}

fn pull_branch_step(list: &mut StepListBuilder, branch: BranchName, strategy: SyncStrategy) {
    match strategy {
        SyncStrategy::Merge => list.add(Step::Merge { branch }),
        SyncStrategy::Rebase => list.add(Step::RebaseBranch { branch }),
    }
}

/// Merge-based syncs push normally; rebase-based syncs rewrite history and
/// must force-push.
fn push_feature_branch_steps(
    list: &mut StepListBuilder,
    branch: &LocalBranchName,
    config: &SyncConfig,
) {
    match config.sync_strategy {
        SyncStrategy::Merge => list.add(Step::PushCurrentBranch {
            branch: branch.clone(),
            no_push_hook: !config.push_hook,
            undoable: false,
        }),
        SyncStrategy::Rebase => list.add(Step::ForcePushBranch {
            branch: branch.clone(),
            no_push_hook: false,
        }),
    }
}
