//! Planner for the `kill` command: delete a feature branch and mend the
//! lineage around it.

use anyhow::{anyhow, Result};

use crate::core::domain::{Branches, LocalBranchName};
use crate::core::lineage::Lineage;
use crate::io::repo::Repo;
use crate::messages;
use crate::runstate::{StepList, StepListBuilder, WrapOptions};
use crate::steps::Step;

#[derive(Debug, Clone)]
pub struct KillConfig {
    pub branch: LocalBranchName,
    /// The killed branch's parent; children re-parent here. Falls back to the
    /// main branch for feature branches without lineage.
    pub parent: Option<LocalBranchName>,
    pub main_branch: LocalBranchName,
    pub branch_has_tracking: bool,
    pub has_origin: bool,
    pub is_offline: bool,
    pub children: Vec<LocalBranchName>,
    pub has_open_changes: bool,
    pub initial_branch: LocalBranchName,
    pub previous_branch: Option<LocalBranchName>,
}

pub fn determine_kill_config(
    repo: &Repo,
    branches: &Branches,
    lineage: &Lineage,
    branch_arg: Option<LocalBranchName>,
) -> Result<KillConfig> {
    let main_branch = repo.config.validated_main_branch()?;
    let branch = branch_arg.unwrap_or_else(|| branches.initial.clone());
    let info = branches
        .all
        .find_by_local_name(&branch)
        .ok_or_else(|| anyhow!(messages::branch_does_not_exist(branch.as_str())))?
        .clone();
    if !branches.types.is_feature_branch(&branch) {
        return Err(anyhow!(messages::not_a_feature_branch(branch.as_str())));
    }
    Ok(KillConfig {
        parent: lineage.parent(&branch).cloned(),
        children: lineage.children(&branch),
        branch_has_tracking: info.has_tracking_branch(),
        branch,
        main_branch,
        has_origin: repo.backend.remotes()?.has_origin(),
        is_offline: repo.config.is_offline()?,
        has_open_changes: repo.backend.has_open_changes()?,
        initial_branch: branches.initial.clone(),
        previous_branch: repo.backend.previously_checked_out_branch(),
    })
}

/// The step list for the `kill` command.
pub fn kill_steps(config: &KillConfig) -> Result<StepList> {
    let fallback_parent = config.parent.clone().unwrap_or_else(|| config.main_branch.clone());
    let kills_initial = config.branch == config.initial_branch;
    let mut list = StepListBuilder::new();
    if config.branch_has_tracking && config.has_origin && !config.is_offline {
        list.add(Step::DeleteRemoteBranch {
            branch: config.branch.tracking_branch(),
        });
    }
    if kills_initial {
        list.add(Step::Checkout {
            branch: fallback_parent.clone(),
        });
    }
    list.add(Step::DeleteLocalBranch {
        branch: config.branch.clone(),
        force: true,
    });
    for child in &config.children {
        list.add(Step::SetParent {
            branch: child.clone(),
            parent: fallback_parent.clone(),
        });
    }
    list.add(Step::DeleteParentBranch {
        branch: config.branch.clone(),
        parent: config.parent.clone(),
    });
    let initial_branch = if kills_initial {
        fallback_parent
    } else {
        config.initial_branch.clone()
    };
    let previous_branch = config
        .previous_branch
        .clone()
        .filter(|previous| previous != &config.branch);
    list.wrap(WrapOptions {
        // Open changes on the killed branch travel with the checkout; only
        // stash when the command returns to where it started.
        stash_open_changes: config.has_open_changes && !kills_initial,
        initial_branch,
        previous_branch,
    });
    list.result()
}
