//! Planner for the `rename-branch` command.

use anyhow::{anyhow, Result};

use crate::core::domain::{BranchType, Branches, LocalBranchName};
use crate::core::lineage::Lineage;
use crate::io::repo::Repo;
use crate::messages;
use crate::runstate::{StepList, StepListBuilder, WrapOptions};
use crate::steps::Step;

#[derive(Debug, Clone)]
pub struct RenameConfig {
    pub old_branch: LocalBranchName,
    pub new_branch: LocalBranchName,
    pub branch_type: BranchType,
    pub parent: Option<LocalBranchName>,
    pub children: Vec<LocalBranchName>,
    pub old_has_tracking: bool,
    pub has_origin: bool,
    pub is_offline: bool,
    pub push_hook: bool,
    pub initial_branch: LocalBranchName,
}

pub fn determine_rename_config(
    repo: &Repo,
    branches: &Branches,
    lineage: &Lineage,
    old_branch: LocalBranchName,
    new_branch: LocalBranchName,
) -> Result<RenameConfig> {
    let main_branch = repo.config.validated_main_branch()?;
    if old_branch == main_branch {
        return Err(anyhow!(messages::not_a_feature_branch(old_branch.as_str())));
    }
    let info = branches
        .all
        .find_by_local_name(&old_branch)
        .ok_or_else(|| anyhow!(messages::branch_does_not_exist(old_branch.as_str())))?
        .clone();
    if branches.all.has_local_branch(&new_branch) {
        return Err(anyhow!(messages::branch_already_exists(new_branch.as_str())));
    }
    Ok(RenameConfig {
        branch_type: branches.types.branch_type(&old_branch),
        parent: lineage.parent(&old_branch).cloned(),
        children: lineage.children(&old_branch),
        old_has_tracking: info.has_tracking_branch(),
        old_branch,
        new_branch,
        has_origin: repo.backend.remotes()?.has_origin(),
        is_offline: repo.config.is_offline()?,
        push_hook: repo.config.push_hook()?,
        initial_branch: branches.initial.clone(),
    })
}

/// The step list for the `rename-branch` command. The local rename moves
/// HEAD along when the renamed branch is checked out; lineage, perennial
/// membership, and the tracking branch are transferred by separate steps.
pub fn rename_steps(config: &RenameConfig) -> Result<StepList> {
    let mut list = StepListBuilder::new();
    list.add(Step::RenameBranch {
        old_branch: config.old_branch.clone(),
        new_branch: config.new_branch.clone(),
    });
    if config.branch_type == BranchType::Feature {
        if let Some(parent) = &config.parent {
            list.add(Step::SetParent {
                branch: config.new_branch.clone(),
                parent: parent.clone(),
            });
        }
        list.add(Step::DeleteParentBranch {
            branch: config.old_branch.clone(),
            parent: config.parent.clone(),
        });
    } else {
        list.add(Step::RemoveFromPerennialBranches {
            branch: config.old_branch.clone(),
        });
        list.add(Step::AddToPerennialBranches {
            branch: config.new_branch.clone(),
        });
    }
    for child in &config.children {
        list.add(Step::SetParent {
            branch: child.clone(),
            parent: config.new_branch.clone(),
        });
    }
    if config.old_has_tracking && config.has_origin && !config.is_offline {
        list.add(Step::CreateTrackingBranch {
            branch: config.new_branch.clone(),
            no_push_hook: !config.push_hook,
        });
        list.add(Step::DeleteRemoteBranch {
            branch: config.old_branch.tracking_branch(),
        });
    }
    let initial_branch = if config.old_branch == config.initial_branch {
        config.new_branch.clone()
    } else {
        config.initial_branch.clone()
    };
    list.wrap(WrapOptions {
        stash_open_changes: false,
        initial_branch,
        previous_branch: None,
    });
    list.result()
}
