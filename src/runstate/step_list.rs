//! Ordered step programs and the builder planners use to assemble them.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::core::domain::LocalBranchName;
use crate::steps::Step;

/// An ordered program of steps. The head is the next step to run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepList(Vec<Step>);

impl StepList {
    pub fn new(steps: Vec<Step>) -> Self {
        Self(steps)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn steps(&self) -> &[Step] {
        &self.0
    }

    pub fn append(&mut self, step: Step) {
        self.0.push(step);
    }

    pub fn append_list(&mut self, other: StepList) {
        self.0.extend(other.0);
    }

    pub fn prepend(&mut self, step: Step) {
        self.0.insert(0, step);
    }

    pub fn prepend_list(&mut self, other: StepList) {
        let mut steps = other.0;
        steps.extend(std::mem::take(&mut self.0));
        self.0 = steps;
    }

    /// The first step, without removing it.
    pub fn peek(&self) -> Option<&Step> {
        self.0.first()
    }

    /// Removes and returns the first step.
    pub fn pop(&mut self) -> Option<Step> {
        if self.0.is_empty() {
            return None;
        }
        Some(self.0.remove(0))
    }
}

impl From<Vec<Step>> for StepList {
    fn from(steps: Vec<Step>) -> Self {
        Self(steps)
    }
}

/// Options for [`StepListBuilder::wrap`].
#[derive(Debug, Clone)]
pub struct WrapOptions {
    pub stash_open_changes: bool,
    pub initial_branch: LocalBranchName,
    pub previous_branch: Option<LocalBranchName>,
}

/// Accumulates steps for a planner, latching the first error.
///
/// Planners call `add` freely and check for problems once at the end via
/// `result`; after a `fail` all further `add`s are ignored. This keeps
/// planner code linear without per-append error handling.
#[derive(Debug, Default)]
pub struct StepListBuilder {
    list: StepList,
    error: Option<anyhow::Error>,
    wrapped: bool,
}

impl StepListBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, step: Step) {
        if self.error.is_none() {
            self.list.append(step);
        }
    }

    pub fn add_all(&mut self, steps: Vec<Step>) {
        for step in steps {
            self.add(step);
        }
    }

    /// Latch a deferred error; the first one wins.
    pub fn fail(&mut self, message: impl Into<String>) {
        if self.error.is_none() {
            self.error = Some(anyhow!(message.into()));
        }
    }

    /// Append the closing epilogue: optional stash/restore bracketing and the
    /// checkouts that return the user to the branch they started on.
    /// Wrapping an already-wrapped list is a no-op, and a trailing checkout
    /// of the initial branch is not duplicated.
    pub fn wrap(&mut self, options: WrapOptions) {
        if self.wrapped || self.error.is_some() {
            return;
        }
        self.wrapped = true;
        if let Some(previous) = options.previous_branch {
            if previous != options.initial_branch {
                self.list.append(Step::Checkout { branch: previous });
            }
        }
        let final_checkout = Step::Checkout { branch: options.initial_branch };
        if self.list.steps().last() != Some(&final_checkout) {
            self.list.append(final_checkout);
        }
        if options.stash_open_changes {
            self.list.prepend(Step::StashOpenChanges);
            self.list.append(Step::RestoreOpenChanges);
        }
    }

    /// The accumulated list, or the latched error.
    pub fn result(self) -> Result<StepList> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.list),
        }
    }
}
