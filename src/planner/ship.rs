//! Planner for the `ship` command: squash-merge a finished feature branch
//! into its parent and clean up.

use anyhow::{anyhow, Result};

use crate::core::domain::{Branches, LocalBranchName};
use crate::core::lineage::Lineage;
use crate::io::forge::ForgeConnector;
use crate::io::repo::Repo;
use crate::messages;
use crate::runstate::{StepList, StepListBuilder, WrapOptions};
use crate::steps::Step;

#[derive(Debug, Clone)]
pub struct ShipConfig {
    pub branch: LocalBranchName,
    pub parent: LocalBranchName,
    pub commit_message: String,
    pub branch_has_tracking: bool,
    pub parent_has_tracking: bool,
    pub has_origin: bool,
    pub is_offline: bool,
    pub push_hook: bool,
    pub children: Vec<LocalBranchName>,
    /// Proposals of child branches that currently target the shipped branch
    /// and must be retargeted at the parent.
    pub proposals_to_retarget: Vec<u64>,
    pub has_open_changes: bool,
    pub initial_branch: LocalBranchName,
    pub previous_branch: Option<LocalBranchName>,
}

pub fn determine_ship_config(
    repo: &Repo,
    branches: &Branches,
    lineage: &Lineage,
    connector: Option<&dyn ForgeConnector>,
    branch_arg: Option<LocalBranchName>,
    message_flag: Option<String>,
) -> Result<ShipConfig> {
    let branch = branch_arg.unwrap_or_else(|| branches.initial.clone());
    let info = branches
        .all
        .find_by_local_name(&branch)
        .ok_or_else(|| anyhow!(messages::branch_does_not_exist(branch.as_str())))?
        .clone();
    if !branches.types.is_feature_branch(&branch) {
        return Err(anyhow!(messages::not_a_feature_branch(branch.as_str())));
    }
    let parent = lineage
        .parent(&branch)
        .cloned()
        .ok_or_else(|| anyhow!(messages::branch_missing_parent(branch.as_str())))?;
    let commits = repo.backend.commits_in_branch(&branch, &parent)?;
    if commits.is_empty() {
        return Err(anyhow!(messages::ship_no_changes(branch.as_str())));
    }
    let commit_message = message_flag.unwrap_or_else(|| commits.join("\n\n"));
    let children = lineage.children(&branch);
    let mut proposals_to_retarget = Vec::new();
    if let Some(connector) = connector {
        for child in &children {
            if let Some(proposal) = connector.find_proposal(child, &branch)? {
                proposals_to_retarget.push(proposal.number);
            }
        }
    }
    let parent_has_tracking = branches
        .all
        .find_by_local_name(&parent)
        .is_some_and(|info| info.has_tracking_branch());
    Ok(ShipConfig {
        branch_has_tracking: info.has_tracking_branch(),
        branch,
        parent,
        commit_message,
        parent_has_tracking,
        has_origin: repo.backend.remotes()?.has_origin(),
        is_offline: repo.config.is_offline()?,
        push_hook: repo.config.push_hook()?,
        children,
        proposals_to_retarget,
        has_open_changes: repo.backend.has_open_changes()?,
        initial_branch: branches.initial.clone(),
        previous_branch: repo.backend.previously_checked_out_branch(),
    })
}

/// The step list for the `ship` command.
pub fn ship_steps(config: &ShipConfig) -> Result<StepList> {
    let online = config.has_origin && !config.is_offline;
    let mut list = StepListBuilder::new();
    list.add(Step::Checkout {
        branch: config.parent.clone(),
    });
    list.add(Step::SquashMerge {
        branch: config.branch.clone(),
        commit_message: config.commit_message.clone(),
    });
    if online && config.parent_has_tracking {
        list.add(Step::PushCurrentBranch {
            branch: config.parent.clone(),
            no_push_hook: !config.push_hook,
            undoable: false,
        });
    }
    for number in &config.proposals_to_retarget {
        list.add(Step::UpdateProposalTarget {
            proposal_number: *number,
            new_target: config.parent.clone(),
            existing_target: config.branch.clone(),
        });
    }
    if online && config.branch_has_tracking {
        list.add(Step::DeleteRemoteBranch {
            branch: config.branch.tracking_branch(),
        });
    }
    // The squashed branch is unmerged in git's eyes, deletion must be forced.
    list.add(Step::DeleteLocalBranch {
        branch: config.branch.clone(),
        force: true,
    });
    for child in &config.children {
        list.add(Step::SetParent {
            branch: child.clone(),
            parent: config.parent.clone(),
        });
    }
    list.add(Step::DeleteParentBranch {
        branch: config.branch.clone(),
        parent: Some(config.parent.clone()),
    });
    let initial_branch = if config.initial_branch == config.branch {
        // The shipped branch is gone, the command ends on its parent.
        config.parent.clone()
    } else {
        config.initial_branch.clone()
    };
    let previous_branch = config
        .previous_branch
        .clone()
        .filter(|previous| previous != &config.branch);
    list.wrap(WrapOptions {
        stash_open_changes: config.has_open_changes,
        initial_branch,
        previous_branch,
    });
    list.result()
}
