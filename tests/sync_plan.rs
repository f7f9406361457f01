//! Planner-level tests: the step lists produced for canonical repository
//! shapes, without touching git.

use std::collections::BTreeMap;

use git_town::core::domain::{
    BranchInfo, BranchInfos, BranchName, Branches, BranchTypes, LocalBranchName, Remotes, Sha,
    SyncStatus,
};
use git_town::core::lineage::Lineage;
use git_town::io::config::{PullBranchStrategy, SyncStrategy};
use git_town::planner::hack::{new_branch_steps, NewBranchConfig};
use git_town::planner::ship::{ship_steps, ShipConfig};
use git_town::planner::sync::{branch_names_to_sync, sync_branches_steps, SyncConfig};
use git_town::steps::Step;

fn branch(name: &str) -> LocalBranchName {
    LocalBranchName::new(name).expect("branch name")
}

fn name(text: &str) -> BranchName {
    BranchName::new(text).expect("branch name")
}

fn sha(hex: &str) -> Sha {
    Sha::new(hex).expect("sha")
}

/// A local branch tracking `origin/<name>`, in sync with it.
fn tracking_info(branch_name: &str) -> BranchInfo {
    BranchInfo {
        local_name: Some(branch(branch_name)),
        local_sha: Some(sha("1111111111111111111111111111111111111111")),
        sync_status: SyncStatus::UpToDate,
        remote_name: Some(branch(branch_name).tracking_branch()),
        remote_sha: Some(sha("1111111111111111111111111111111111111111")),
    }
}

/// A local branch without a tracking branch.
fn local_info(branch_name: &str) -> BranchInfo {
    BranchInfo {
        local_name: Some(branch(branch_name)),
        local_sha: Some(sha("2222222222222222222222222222222222222222")),
        sync_status: SyncStatus::LocalOnly,
        remote_name: None,
        remote_sha: None,
    }
}

fn lineage(entries: &[(&str, &str)]) -> Lineage {
    let mut map = BTreeMap::new();
    for (child, parent) in entries {
        map.insert(branch(child), branch(parent));
    }
    Lineage::new(map)
}

fn branches(initial: &str, main: &str, infos: Vec<BranchInfo>) -> Branches {
    Branches {
        initial: branch(initial),
        all: BranchInfos::new(infos).expect("branch infos"),
        types: BranchTypes {
            main_branch: branch(main),
            perennial_branches: Vec::new(),
        },
    }
}

fn sync_config(branches: Branches, lineage: Lineage, all: bool) -> SyncConfig {
    let names = branch_names_to_sync(&branches, &lineage, all).expect("branches to sync");
    let branches_to_sync = branches.all.select(&names).expect("select");
    let should_push_tags = all || !branches.types.is_feature_branch(&branches.initial);
    SyncConfig {
        branches_to_sync,
        has_open_changes: false,
        remotes: Remotes::new(vec!["origin".to_string()]),
        is_offline: false,
        main_branch: branches.types.main_branch.clone(),
        previous_branch: None,
        pull_branch_strategy: PullBranchStrategy::Rebase,
        push_hook: true,
        should_push_tags,
        should_sync_upstream: false,
        sync_strategy: SyncStrategy::Merge,
        branches,
        lineage,
    }
}

/// Syncing a feature branch with the merge strategy pulls the tracking
/// branch, then the parent, then pushes, then returns to the start branch.
#[test]
fn sync_feature_branch_with_merge_strategy() {
    let branches = branches("feature", "main", vec![tracking_info("main"), tracking_info("feature")]);
    let lineage = lineage(&[("feature", "main")]);
    let config = sync_config(branches, lineage, false);

    let list = sync_branches_steps(&config).expect("plan");
    assert_eq!(
        list.steps(),
        &[
            Step::Checkout { branch: branch("feature") },
            Step::Merge { branch: name("origin/feature") },
            Step::Merge { branch: name("main") },
            Step::PushCurrentBranch {
                branch: branch("feature"),
                no_push_hook: false,
                undoable: false,
            },
            Step::Checkout { branch: branch("feature") },
        ]
    );
}

/// The rebase strategy substitutes rebases for merges and a force-push for
/// the plain push; open changes wrap the program in stash/restore.
#[test]
fn sync_feature_branch_with_rebase_strategy_and_open_changes() {
    let branches = branches("feature", "main", vec![tracking_info("main"), tracking_info("feature")]);
    let lineage = lineage(&[("feature", "main")]);
    let mut config = sync_config(branches, lineage, false);
    config.sync_strategy = SyncStrategy::Rebase;
    config.has_open_changes = true;

    let list = sync_branches_steps(&config).expect("plan");
    assert_eq!(
        list.steps(),
        &[
            Step::StashOpenChanges,
            Step::Checkout { branch: branch("feature") },
            Step::RebaseBranch { branch: name("origin/feature") },
            Step::RebaseBranch { branch: name("main") },
            Step::ForcePushBranch { branch: branch("feature"), no_push_hook: false },
            Step::Checkout { branch: branch("feature") },
            Step::RestoreOpenChanges,
        ]
    );
}

/// `sync --all` visits ancestors before their descendants.
#[test]
fn sync_all_checks_out_ancestors_first() {
    let branches = branches(
        "main",
        "main",
        vec![tracking_info("a"), tracking_info("b"), tracking_info("main")],
    );
    let lineage = lineage(&[("a", "main"), ("b", "a")]);
    let config = sync_config(branches, lineage, true);

    let list = sync_branches_steps(&config).expect("plan");
    let checkouts: Vec<&LocalBranchName> = list
        .steps()
        .iter()
        .filter_map(|step| match step {
            Step::Checkout { branch } => Some(branch),
            _ => None,
        })
        .collect();
    assert_eq!(checkouts[..3], [&branch("main"), &branch("a"), &branch("b")]);
    // All branches were requested, so tags get pushed.
    assert!(list.steps().contains(&Step::PushTags));
}

/// A feature branch without a tracking branch gets one created after the
/// pulls.
#[test]
fn sync_creates_missing_tracking_branch() {
    let branches = branches("feature", "main", vec![tracking_info("main"), local_info("feature")]);
    let lineage = lineage(&[("feature", "main")]);
    let config = sync_config(branches, lineage, false);

    let list = sync_branches_steps(&config).expect("plan");
    assert_eq!(
        list.steps(),
        &[
            Step::Checkout { branch: branch("feature") },
            Step::Merge { branch: name("main") },
            Step::CreateTrackingBranch { branch: branch("feature"), no_push_hook: false },
            Step::Checkout { branch: branch("feature") },
        ]
    );
}

/// Syncing the main branch pulls it, pushes it, and pushes tags.
#[test]
fn sync_main_branch_pushes_tags() {
    let branches = branches("main", "main", vec![tracking_info("main")]);
    let config = sync_config(branches, Lineage::default(), false);

    let list = sync_branches_steps(&config).expect("plan");
    assert_eq!(
        list.steps(),
        &[
            Step::Checkout { branch: branch("main") },
            Step::RebaseBranch { branch: name("origin/main") },
            Step::PushCurrentBranch {
                branch: branch("main"),
                no_push_hook: false,
                undoable: false,
            },
            Step::Checkout { branch: branch("main") },
            Step::PushTags,
            // The epilogue returns to the initial branch after pushing tags.
            Step::Checkout { branch: branch("main") },
        ]
    );
}

/// With an upstream remote and sync-upstream enabled, the main branch
/// rebases onto its upstream counterpart.
#[test]
fn sync_main_branch_with_upstream() {
    let branches = branches("main", "main", vec![tracking_info("main")]);
    let mut config = sync_config(branches, Lineage::default(), false);
    config.remotes = Remotes::new(vec!["origin".to_string(), "upstream".to_string()]);
    config.should_sync_upstream = true;

    let list = sync_branches_steps(&config).expect("plan");
    assert!(list.steps().contains(&Step::FetchUpstream { branch: branch("main") }));
    assert!(list
        .steps()
        .contains(&Step::RebaseBranch { branch: name("upstream/main") }));
}

/// A feature branch without lineage cannot be synced.
#[test]
fn sync_requires_a_known_parent() {
    let branches = branches("feature", "main", vec![tracking_info("main"), tracking_info("feature")]);
    let result = branch_names_to_sync(&branches, &Lineage::default(), false);
    let error = result.expect_err("missing parent");
    assert!(error.to_string().contains("has no parent"));
}

/// The hack plan creates the branch, wires the lineage, and checks it out.
#[test]
fn hack_plan_creates_and_checks_out_the_branch() {
    let config = NewBranchConfig {
        new_branch: branch("feature"),
        parent: branch("main"),
        start_point: sha("1111111111111111111111111111111111111111"),
        reparent_initial: false,
        should_create_tracking: true,
        push_hook: true,
        has_open_changes: false,
        initial_branch: branch("main"),
        previous_branch: None,
    };
    let list = new_branch_steps(&config).expect("plan");
    assert_eq!(
        list.steps(),
        &[
            Step::CreateBranch {
                branch: branch("feature"),
                start_point: sha("1111111111111111111111111111111111111111"),
            },
            Step::SetParent { branch: branch("feature"), parent: branch("main") },
            Step::Checkout { branch: branch("feature") },
            Step::CreateTrackingBranch { branch: branch("feature"), no_push_hook: false },
            Step::Checkout { branch: branch("feature") },
        ]
    );
}

/// The prepend plan re-parents the initial branch under the new one.
#[test]
fn prepend_plan_reparents_the_initial_branch() {
    let config = NewBranchConfig {
        new_branch: branch("pre"),
        parent: branch("main"),
        start_point: sha("1111111111111111111111111111111111111111"),
        reparent_initial: true,
        should_create_tracking: false,
        push_hook: true,
        has_open_changes: false,
        initial_branch: branch("feature"),
        previous_branch: None,
    };
    let list = new_branch_steps(&config).expect("plan");
    assert_eq!(
        list.steps(),
        &[
            Step::CreateBranch {
                branch: branch("pre"),
                start_point: sha("1111111111111111111111111111111111111111"),
            },
            Step::SetParent { branch: branch("pre"), parent: branch("main") },
            Step::SetParent { branch: branch("feature"), parent: branch("pre") },
            Step::Checkout { branch: branch("pre") },
        ]
    );
}

/// The ship plan squash-merges into the parent, retargets child proposals,
/// and cleans up the shipped branch and its lineage.
#[test]
fn ship_plan_squashes_and_cleans_up() {
    let config = ShipConfig {
        branch: branch("feature"),
        parent: branch("main"),
        commit_message: "feature: add login".to_string(),
        branch_has_tracking: true,
        parent_has_tracking: true,
        has_origin: true,
        is_offline: false,
        push_hook: true,
        children: vec![branch("child")],
        proposals_to_retarget: vec![42],
        has_open_changes: false,
        initial_branch: branch("feature"),
        previous_branch: None,
    };
    let list = ship_steps(&config).expect("plan");
    assert_eq!(
        list.steps(),
        &[
            Step::Checkout { branch: branch("main") },
            Step::SquashMerge {
                branch: branch("feature"),
                commit_message: "feature: add login".to_string(),
            },
            Step::PushCurrentBranch {
                branch: branch("main"),
                no_push_hook: false,
                undoable: false,
            },
            Step::UpdateProposalTarget {
                proposal_number: 42,
                new_target: branch("main"),
                existing_target: branch("feature"),
            },
            Step::DeleteRemoteBranch { branch: branch("feature").tracking_branch() },
            Step::DeleteLocalBranch { branch: branch("feature"), force: true },
            Step::SetParent { branch: branch("child"), parent: branch("main") },
            Step::DeleteParentBranch {
                branch: branch("feature"),
                parent: Some(branch("main")),
            },
            Step::Checkout { branch: branch("main") },
        ]
    );
}

/// Offline mode plans no network steps.
#[test]
fn sync_offline_plans_no_pushes() {
    let branches = branches("feature", "main", vec![tracking_info("main"), tracking_info("feature")]);
    let lineage = lineage(&[("feature", "main")]);
    let mut config = sync_config(branches, lineage, false);
    config.is_offline = true;

    let list = sync_branches_steps(&config).expect("plan");
    assert!(list.steps().iter().all(|step| !matches!(
        step,
        Step::PushCurrentBranch { .. }
            | Step::ForcePushBranch { .. }
            | Step::CreateTrackingBranch { .. }
            | Step::PushTags
    )));
}
