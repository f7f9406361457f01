//! The Run VM: interprets a run state, persisting after every step so that
//! the on-disk state always describes what remains to do and how to undo
//! what has been done.

use std::path::Path;

use anyhow::{anyhow, Result};
use chrono::Utc;
use tracing::debug;

use crate::core::lineage::Lineage;
use crate::io::backend::Backend;
use crate::io::config::Config;
use crate::io::forge::ForgeConnector;
use crate::io::frontend::Frontend;
use crate::messages;
use crate::runstate::{persistence, RunState, StepList};
use crate::steps::{RunArgs, Step, SynthArgs};

/// The collaborators the VM threads into each step.
pub struct VmArgs<'a> {
    pub backend: &'a Backend,
    pub frontend: &'a Frontend,
    pub config: &'a mut Config,
    pub connector: Option<&'a dyn ForgeConnector>,
    pub lineage: &'a mut Lineage,
    pub git_dir: &'a Path,
}

/// Refuse to start a new command while an unfinished run state exists.
pub fn ensure_idle(git_dir: &Path) -> Result<()> {
    if let Some(state) = persistence::load(git_dir)? {
        if state.is_unfinished() {
            return Err(anyhow!(messages::unfinished_command(&state.command)));
        }
    }
    Ok(())
}

/// Execute the run state to completion, an automatic abort, or a user error.
///
/// The inverse of every step is synthesized before the step runs; on success
/// it is prepended to the undo list and the state is persisted. A forward run
/// that completes keeps its finished state on disk (that is what `undo`
/// loads); abort and undo runs delete it. Dry runs never persist.
pub fn execute(mut run_state: RunState, args: &mut VmArgs) -> Result<()> {
    loop {
        let Some(step) = run_state.run_step_list.pop() else {
            return finished(run_state, args);
        };
        debug!(step = step.name(), "running step");
        let undo_steps = step.create_undo_steps(&SynthArgs {
            backend: args.backend,
            config: &*args.config,
            lineage: &*args.lineage,
        })?;
        let result = step.run(&mut RunArgs {
            backend: args.backend,
            frontend: args.frontend,
            config: &mut *args.config,
            connector: args.connector,
            lineage: &mut *args.lineage,
        });
        match result {
            Ok(()) => {
                run_state.record_undo_steps(undo_steps);
                save(&run_state, args)?;
            }
            Err(error) if step.should_auto_abort_on_error() => {
                return auto_abort(run_state, args, &step, error);
            }
            Err(error) => {
                return user_error(run_state, args, step, error);
            }
        }
    }
}

/// Resume a conflict-interrupted command after the user resolved conflicts.
pub fn continue_command(args: &mut VmArgs) -> Result<()> {
    let Some(mut state) = persistence::load(args.git_dir)? else {
        return Err(anyhow!(messages::CONTINUE_NOTHING_TO_DO));
    };
    if !state.is_unfinished() {
        return Err(anyhow!(messages::CONTINUE_NOTHING_TO_DO));
    }
    if args.backend.has_unmerged_files()? {
        return Err(anyhow!(messages::CONTINUE_UNRESOLVED_CONFLICTS));
    }
    state.mark_finished();
    execute(state, args)
}

/// Drop the failed step and continue with the rest of the program.
pub fn skip_command(args: &mut VmArgs) -> Result<()> {
    let Some(state) = persistence::load(args.git_dir)? else {
        return Err(anyhow!(messages::SKIP_NOTHING_TO_DO));
    };
    let Some(details) = &state.unfinished_details else {
        return Err(anyhow!(messages::SKIP_NOTHING_TO_DO));
    };
    if !details.can_skip {
        return Err(anyhow!(messages::SKIP_NOT_AVAILABLE));
    }
    execute(state.create_skip_run_state(), args)
}

/// Cancel the interrupted command and reverse all completed work.
pub fn abort_command(args: &mut VmArgs) -> Result<()> {
    let Some(state) = persistence::load(args.git_dir)? else {
        return Err(anyhow!(messages::ABORT_NOTHING_TO_DO));
    };
    if !state.is_unfinished() {
        return Err(anyhow!(messages::ABORT_NOTHING_TO_DO));
    }
    execute(state.create_abort_run_state(), args)
}

/// Reverse the last successfully completed command.
pub fn undo_command(args: &mut VmArgs) -> Result<()> {
    let Some(state) = persistence::load(args.git_dir)? else {
        return Err(anyhow!(messages::UNDO_NOTHING_TO_DO));
    };
    if state.is_unfinished() {
        return Err(anyhow!(messages::unfinished_command(&state.command)));
    }
    execute(state.create_undo_run_state(), args)
}

fn finished(mut run_state: RunState, args: &mut VmArgs) -> Result<()> {
    run_state.mark_finished();
    if args.frontend.is_dry_run() {
        return Ok(());
    }
    if run_state.is_abort || run_state.is_undo {
        persistence::delete(args.git_dir)
    } else {
        persistence::save(&run_state, args.git_dir)
    }
}

/// A step with the auto-abort hook failed: run the abort program right away
/// and surface the step's stored message.
fn auto_abort(
    mut run_state: RunState,
    args: &mut VmArgs,
    step: &Step,
    error: anyhow::Error,
) -> Result<()> {
    debug!(step = step.name(), %error, "automatic abort");
    run_state.abort_step_list = StepList::new(step.create_abort_steps());
    execute(run_state.create_abort_run_state(), args)?;
    let message = step
        .automatic_abort_error()
        .unwrap_or_else(|| error.to_string());
    Err(anyhow!(message))
}

/// A step surfaced a user-facing error: persist the state for
/// continue/skip/abort/undo and hand control back to the user.
fn user_error(
    mut run_state: RunState,
    args: &mut VmArgs,
    step: Step,
    error: anyhow::Error,
) -> Result<()> {
    run_state.abort_step_list = StepList::new(step.create_abort_steps());
    run_state.run_step_list.prepend(step);
    let endangered = args
        .backend
        .current_branch()
        .unwrap_or_else(|_| run_state.initial_active_branch.clone());
    let can_skip = run_state.command == "sync" && !run_state.is_abort && !run_state.is_undo;
    run_state.mark_unfinished(can_skip, endangered, Utc::now());
    save(&run_state, args)?;
    eprintln!("{}", messages::conflict_guidance(&run_state.command, can_skip));
    Err(error)
}

fn save(run_state: &RunState, args: &VmArgs) -> Result<()> {
    if args.frontend.is_dry_run() {
        return Ok(());
    }
    persistence::save(run_state, args.git_dir)
}
