//! Centralized catalog of user-facing messages.
//!
//! Planners, steps, and the VM never embed raw English beyond format
//! arguments; every message a user can see is named here.

pub const ABORT_NOTHING_TO_DO: &str = "nothing to abort";
pub const CONTINUE_NOTHING_TO_DO: &str = "nothing to continue";
pub const SKIP_NOTHING_TO_DO: &str = "nothing to skip";
pub const UNDO_NOTHING_TO_DO: &str = "nothing to undo";

pub const CONTINUE_UNRESOLVED_CONFLICTS: &str =
    "you must resolve the conflicts before continuing";
pub const SKIP_NOT_AVAILABLE: &str = "cannot skip this step, please abort or continue";

pub const CONFLICTING_OPEN_CHANGES: &str =
    "conflicts between your uncommitted changes and the branch you are syncing";

pub const NO_MAIN_BRANCH_CONFIGURED: &str =
    "no main branch configured, run \"git-town config main-branch <branch>\"";

pub const NO_FORGE_CONNECTOR: &str = "no code hosting connector configured";

pub const CURRENTLY_DETACHED: &str = "cannot run with a detached HEAD";

pub fn unfinished_command(command: &str) -> String {
    format!(
        "you have an unfinished \"{command}\" command, \
         run \"git-town continue\", \"git-town skip\", \"git-town abort\", or \"git-town undo\""
    )
}

pub fn conflict_guidance(command: &str, can_skip: bool) -> String {
    let mut text = format!(
        "to continue after having resolved conflicts, run \"git-town continue\"\n\
         to abort the \"{command}\" command, run \"git-town abort\""
    );
    if can_skip {
        text.push_str("\nto skip the sync of this branch, run \"git-town skip\"");
    }
    text
}

pub fn proposal_target_update_problem(number: u64) -> String {
    format!("could not update the target branch of proposal {number}")
}

pub fn unknown_sync_strategy(value: &str) -> String {
    format!("unknown sync-strategy value: {value:?}")
}

pub fn unknown_pull_branch_strategy(value: &str) -> String {
    format!("unknown pull-branch-strategy value: {value:?}")
}

pub fn input_yes_or_no(text: &str) -> String {
    format!("invalid value {text:?}, please provide either \"yes\" or \"no\"")
}

pub fn branch_does_not_exist(branch: &str) -> String {
    format!("there is no branch named {branch:?}")
}

pub fn branch_already_exists(branch: &str) -> String {
    format!("a branch named {branch:?} already exists")
}

pub fn branch_missing_parent(branch: &str) -> String {
    format!(
        "branch {branch:?} has no parent in the lineage, \
         run \"git config git-town.branch.{branch}.parent <parent>\""
    )
}

pub fn not_a_feature_branch(branch: &str) -> String {
    format!("branch {branch:?} is not a feature branch")
}

pub fn ship_no_changes(branch: &str) -> String {
    format!("branch {branch:?} has no shippable changes")
}

pub fn lineage_cycle(branch: &str) -> String {
    format!("branch lineage contains a cycle through {branch:?}")
}
