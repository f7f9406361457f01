//! Planner for the branch-creating commands: `hack`, `append`, `prepend`.
//!
//! All three create a feature branch and differ only in where the new branch
//! attaches: off the main branch, off the initial branch, or between the
//! initial branch and its parent.

use anyhow::{anyhow, Result};

use crate::core::domain::{Branches, LocalBranchName, Sha};
use crate::core::lineage::Lineage;
use crate::io::repo::Repo;
use crate::messages;
use crate::runstate::{StepList, StepListBuilder, WrapOptions};
use crate::steps::Step;

/// Where the new branch attaches in the lineage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NewBranchMode {
    /// Parent is the main branch.
    Hack,
    /// Parent is the initial branch.
    Append,
    /// Parent is the initial branch's parent; the initial branch is
    /// re-parented under the new branch.
    Prepend,
}

#[derive(Debug, Clone)]
pub struct NewBranchConfig {
    pub new_branch: LocalBranchName,
    pub parent: LocalBranchName,
    pub start_point: Sha,
    pub reparent_initial: bool,
    pub should_create_tracking: bool,
    pub push_hook: bool,
    pub has_open_changes: bool,
    pub initial_branch: LocalBranchName,
    pub previous_branch: Option<LocalBranchName>,
}

pub fn determine_new_branch_config(
    repo: &Repo,
    branches: &Branches,
    lineage: &Lineage,
    new_branch: LocalBranchName,
    mode: NewBranchMode,
) -> Result<NewBranchConfig> {
    let main_branch = repo.config.validated_main_branch()?;
    if branch_is_known(branches, &new_branch) {
        return Err(anyhow!(messages::branch_already_exists(new_branch.as_str())));
    }
    let parent = match mode {
        NewBranchMode::Hack => main_branch,
        NewBranchMode::Append => branches.initial.clone(),
        NewBranchMode::Prepend => {
            if !branches.types.is_feature_branch(&branches.initial) {
                return Err(anyhow!(messages::not_a_feature_branch(
                    branches.initial.as_str()
                )));
            }
            lineage
                .parent(&branches.initial)
                .cloned()
                .ok_or_else(|| anyhow!(messages::branch_missing_parent(branches.initial.as_str())))?
        }
    };
    let parent_info = branches
        .all
        .find_by_local_name(&parent)
        .ok_or_else(|| anyhow!(messages::branch_does_not_exist(parent.as_str())))?;
    let start_point = parent_info
        .local_sha
        .clone()
        .ok_or_else(|| anyhow!(messages::branch_does_not_exist(parent.as_str())))?;
    let remotes = repo.backend.remotes()?;
    let should_create_tracking = repo.config.should_push_new_branches(false)?
        && remotes.has_origin()
        && !repo.config.is_offline()?;
    Ok(NewBranchConfig {
        new_branch,
        parent,
        start_point,
        reparent_initial: mode == NewBranchMode::Prepend,
        should_create_tracking,
        push_hook: repo.config.push_hook()?,
        has_open_changes: repo.backend.has_open_changes()?,
        initial_branch: branches.initial.clone(),
        previous_branch: repo.backend.previously_checked_out_branch(),
    })
}

/// The step list creating the new branch and wiring it into the lineage.
pub fn new_branch_steps(config: &NewBranchConfig) -> Result<StepList> {
    let mut list = StepListBuilder::new();
    list.add(Step::CreateBranch {
        branch: config.new_branch.clone(),
        start_point: config.start_point.clone(),
    });
    list.add(Step::SetParent {
        branch: config.new_branch.clone(),
        parent: config.parent.clone(),
    });
    if config.reparent_initial {
        list.add(Step::SetParent {
            branch: config.initial_branch.clone(),
            parent: config.new_branch.clone(),
        });
    }
    list.add(Step::Checkout {
        branch: config.new_branch.clone(),
    });
    if config.should_create_tracking {
        list.add(Step::CreateTrackingBranch {
            branch: config.new_branch.clone(),
            no_push_hook: !config.push_hook,
        });
    }
    list.wrap(WrapOptions {
        stash_open_changes: config.has_open_changes,
        // The command intentionally ends on the new branch.
        initial_branch: config.new_branch.clone(),
        previous_branch: config.previous_branch.clone(),
    });
    list.result()
}

fn branch_is_known(branches: &Branches, name: &LocalBranchName) -> bool {
    branches.all.has_local_branch(name)
        || branches.all.find_by_remote_name(&name.tracking_branch()).is_some()
}
