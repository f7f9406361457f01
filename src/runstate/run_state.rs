//! The VM's durable program counter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::domain::LocalBranchName;
use crate::runstate::step_list::StepList;
use crate::steps::Step;

/// Present while a step has exited with a user-facing error; its existence
/// means the next invocation must be continue, skip, abort, or undo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UnfinishedDetails {
    pub can_skip: bool,
    pub endangered_branch: LocalBranchName,
    pub time: DateTime<Utc>,
}

/// The persisted cursor of an in-flight command plus its accumulated inverse
/// program.
///
/// The head of `run_step_list` is the next step to run. `undo_step_list`
/// accumulates inverses in reverse order of forward execution (via prepend),
/// so running it as-is undoes completed work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RunState {
    pub command: String,
    pub is_abort: bool,
    pub is_undo: bool,
    pub initial_active_branch: LocalBranchName,
    pub unfinished_details: Option<UnfinishedDetails>,
    pub run_step_list: StepList,
    pub undo_step_list: StepList,
    pub abort_step_list: StepList,
}

impl RunState {
    pub fn new(
        command: impl Into<String>,
        initial_active_branch: LocalBranchName,
        run_step_list: StepList,
    ) -> Self {
        Self {
            command: command.into(),
            is_abort: false,
            is_undo: false,
            initial_active_branch,
            unfinished_details: None,
            run_step_list,
            undo_step_list: StepList::default(),
            abort_step_list: StepList::default(),
        }
    }

    pub fn is_unfinished(&self) -> bool {
        self.unfinished_details.is_some()
    }

    pub fn mark_unfinished(
        &mut self,
        can_skip: bool,
        endangered_branch: LocalBranchName,
        time: DateTime<Utc>,
    ) {
        self.unfinished_details = Some(UnfinishedDetails {
            can_skip,
            endangered_branch,
            time,
        });
    }

    pub fn mark_finished(&mut self) {
        self.unfinished_details = None;
    }

    /// The program that cancels the in-flight operation and reverses all
    /// completed work.
    pub fn create_abort_run_state(&self) -> RunState {
        let mut run_step_list = self.abort_step_list.clone();
        run_step_list.append_list(self.undo_step_list.clone());
        RunState {
            command: self.command.clone(),
            is_abort: true,
            is_undo: false,
            initial_active_branch: self.initial_active_branch.clone(),
            unfinished_details: None,
            run_step_list,
            undo_step_list: StepList::default(),
            abort_step_list: StepList::default(),
        }
    }

    /// The program that reverses a successfully completed command.
    pub fn create_undo_run_state(&self) -> RunState {
        RunState {
            command: self.command.clone(),
            is_abort: false,
            is_undo: true,
            initial_active_branch: self.initial_active_branch.clone(),
            unfinished_details: None,
            run_step_list: self.undo_step_list.clone(),
            undo_step_list: StepList::default(),
            abort_step_list: StepList::default(),
        }
    }

    /// The program that cancels the failed head step and continues with the
    /// rest, keeping the accumulated undo program intact.
    pub fn create_skip_run_state(&self) -> RunState {
        let mut remaining = self.run_step_list.clone();
        let skipped = remaining.pop();
        debug_assert!(skipped.is_some(), "skip requires a failed head step");
        let mut run_step_list = self.abort_step_list.clone();
        run_step_list.append_list(remaining);
        RunState {
            command: self.command.clone(),
            is_abort: false,
            is_undo: false,
            initial_active_branch: self.initial_active_branch.clone(),
            unfinished_details: None,
            run_step_list,
            undo_step_list: self.undo_step_list.clone(),
            abort_step_list: StepList::default(),
        }
    }

    /// Record a successfully executed step's inverse.
    pub fn record_undo_steps(&mut self, steps: Vec<Step>) {
        self.undo_step_list.prepend_list(StepList::new(steps));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::BranchName;

    fn branch(name: &str) -> LocalBranchName {
        LocalBranchName::new(name).expect("branch name")
    }

    fn sample_state() -> RunState {
        let mut state = RunState::new(
            "sync",
            branch("feature"),
            StepList::new(vec![
                Step::Merge { branch: BranchName::new("main").expect("name") },
                Step::Checkout { branch: branch("feature") },
            ]),
        );
        state.record_undo_steps(vec![Step::Checkout { branch: branch("main") }]);
        state.abort_step_list.append(Step::AbortMerge);
        state
    }

    #[test]
    fn serializes_with_stable_pascal_case_keys() {
        let state = RunState::new("sync", branch("main"), StepList::default());
        let json = serde_json::to_value(&state).expect("serialize");
        for key in [
            "Command",
            "IsAbort",
            "IsUndo",
            "InitialActiveBranch",
            "UnfinishedDetails",
            "RunStepList",
            "UndoStepList",
            "AbortStepList",
        ] {
            assert!(json.get(key).is_some(), "missing key {key}");
        }
    }

    #[test]
    fn serialize_round_trip_is_byte_identical() {
        let mut state = sample_state();
        state.mark_unfinished(true, branch("feature"), Utc::now());
        let first = serde_json::to_string_pretty(&state).expect("serialize");
        let loaded: RunState = serde_json::from_str(&first).expect("deserialize");
        let second = serde_json::to_string_pretty(&loaded).expect("serialize again");
        assert_eq!(first, second);
    }

    #[test]
    fn abort_run_state_chains_abort_and_undo_steps() {
        let state = sample_state();
        let abort = state.create_abort_run_state();
        assert!(abort.is_abort);
        assert_eq!(
            abort.run_step_list.steps(),
            &[Step::AbortMerge, Step::Checkout { branch: branch("main") }]
        );
        assert!(abort.undo_step_list.is_empty());
        assert!(abort.abort_step_list.is_empty());
    }

    #[test]
    fn undo_run_state_runs_the_accumulated_inverse() {
        let state = sample_state();
        let undo = state.create_undo_run_state();
        assert!(undo.is_undo);
        assert_eq!(undo.run_step_list.steps(), &[Step::Checkout { branch: branch("main") }]);
    }

    #[test]
    fn skip_run_state_drops_only_the_failed_head() {
        let state = sample_state();
        let skip = state.create_skip_run_state();
        assert_eq!(
            skip.run_step_list.steps(),
            &[Step::AbortMerge, Step::Checkout { branch: branch("feature") }]
        );
        assert_eq!(skip.undo_step_list, state.undo_step_list);
        assert!(!skip.is_abort && !skip.is_undo);
    }

    #[test]
    fn record_undo_steps_prepends() {
        let mut state = RunState::new("sync", branch("main"), StepList::default());
        state.record_undo_steps(vec![Step::AbortMerge]);
        state.record_undo_steps(vec![Step::PushTags, Step::AbortRebase]);
        assert_eq!(
            state.undo_step_list.steps(),
            &[Step::PushTags, Step::AbortRebase, Step::AbortMerge]
        );
    }
}
