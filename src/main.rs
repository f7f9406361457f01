//! Git workflow automation on top of a declared branch lineage.
//!
//! Commands plan themselves as a step list, which the run VM executes with
//! transactional semantics: progress is persisted after every step, so a
//! conflict-interrupted command can be continued, skipped, aborted, or
//! undone.

use anyhow::Result;
use clap::{Parser, Subcommand};

use git_town::core::domain::LocalBranchName;
use git_town::core::lineage::Lineage;
use git_town::io::config::{parse_bool, PullBranchStrategy, SyncStrategy};
use git_town::io::repo::{self, Repo};
use git_town::planner::hack::{determine_new_branch_config, new_branch_steps, NewBranchMode};
use git_town::planner::kill::{determine_kill_config, kill_steps};
use git_town::planner::rename::{determine_rename_config, rename_steps};
use git_town::planner::ship::{determine_ship_config, ship_steps};
use git_town::planner::sync::{determine_sync_config, sync_branches_steps};
use git_town::runstate::{persistence, RunState};
use git_town::vm::{self, VmArgs};
use git_town::{exit_codes, logging};

#[derive(Parser)]
#[command(
    name = "git-town",
    version,
    about = "Git workflow automation on top of a declared branch lineage"
)]
struct Cli {
    /// Trace every git invocation to stderr.
    #[arg(long, global = true)]
    debug: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Update the current branch with all relevant changes.
    Sync {
        /// Sync all local branches.
        #[arg(long, short = 'a')]
        all: bool,
        /// Print the planned git commands without running them.
        #[arg(long)]
        dry_run: bool,
    },
    /// Create a new feature branch off the main branch.
    Hack {
        branch: String,
        #[arg(long)]
        dry_run: bool,
    },
    /// Create a new feature branch as a child of the current branch.
    Append {
        branch: String,
        #[arg(long)]
        dry_run: bool,
    },
    /// Create a new feature branch between the current branch and its parent.
    Prepend {
        branch: String,
        #[arg(long)]
        dry_run: bool,
    },
    /// Squash-merge a finished feature branch into its parent.
    Ship {
        branch: Option<String>,
        /// The commit message for the squashed commit.
        #[arg(long, short = 'm')]
        message: Option<String>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Delete a feature branch and mend the lineage around it.
    Kill {
        branch: Option<String>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Rename a branch, transferring lineage and tracking setup.
    RenameBranch {
        old: String,
        new: String,
        #[arg(long)]
        dry_run: bool,
    },
    /// Undo the last completed git-town command.
    Undo,
    /// Continue an interrupted command after resolving conflicts.
    Continue,
    /// Skip the failed step and continue with the rest of the command.
    Skip,
    /// Abort the interrupted command and revert all completed work.
    Abort,
    /// Show the state of any in-flight command.
    Status,
    /// Read or change git-town configuration.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Display or set the main branch.
    MainBranch { value: Option<String> },
    /// Display or set the perennial branches.
    PerennialBranches { values: Vec<String> },
    /// Display or set the sync strategy (merge | rebase).
    SyncStrategy { value: Option<String> },
    /// Display or set the pull branch strategy (merge | rebase).
    PullBranchStrategy { value: Option<String> },
    /// Display or set whether new branches get pushed to origin.
    PushNewBranches {
        /// Read or write the setting for all repositories on this machine.
        #[arg(long, short = 'g')]
        global: bool,
        value: Option<String>,
    },
    /// Display or set whether pushes run the pre-push hook.
    PushHook { value: Option<String> },
    /// Display or set whether the main branch syncs with its upstream.
    SyncUpstream { value: Option<String> },
    /// Display or set offline mode.
    Offline { value: Option<String> },
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.debug || logging::debug_env());
    if let Err(err) = run(cli.command) {
        eprintln!("{err:#}");
        std::process::exit(exit_codes::USER);
    }
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Sync { all, dry_run } => run_sync(all, dry_run),
        Command::Hack { branch, dry_run } => run_new_branch(branch, NewBranchMode::Hack, dry_run),
        Command::Append { branch, dry_run } => {
            run_new_branch(branch, NewBranchMode::Append, dry_run)
        }
        Command::Prepend { branch, dry_run } => {
            run_new_branch(branch, NewBranchMode::Prepend, dry_run)
        }
        Command::Ship {
            branch,
            message,
            dry_run,
        } => run_ship(branch, message, dry_run),
        Command::Kill { branch, dry_run } => run_kill(branch, dry_run),
        Command::RenameBranch { old, new, dry_run } => run_rename(old, new, dry_run),
        Command::Undo => with_vm(|args| vm::undo_command(args)),
        Command::Continue => with_vm(|args| vm::continue_command(args)),
        Command::Skip => with_vm(|args| vm::skip_command(args)),
        Command::Abort => with_vm(|args| vm::abort_command(args)),
        Command::Status => run_status(),
        Command::Config { command } => run_config(command),
    }
}

fn run_sync(all: bool, dry_run: bool) -> Result<()> {
    let mut repo = repo::open(dry_run)?;
    vm::ensure_idle(&repo.git_dir)?;
    let mut lineage = repo.config.lineage()?;
    let branches = repo::load_branches(&repo, true)?;
    let config = determine_sync_config(&repo, &branches, &lineage, all)?;
    let step_list = sync_branches_steps(&config)?;
    let run_state = RunState::new("sync", branches.initial, step_list);
    execute(run_state, &mut repo, &mut lineage)
}

fn run_new_branch(branch: String, mode: NewBranchMode, dry_run: bool) -> Result<()> {
    let command = match mode {
        NewBranchMode::Hack => "hack",
        NewBranchMode::Append => "append",
        NewBranchMode::Prepend => "prepend",
    };
    let mut repo = repo::open(dry_run)?;
    vm::ensure_idle(&repo.git_dir)?;
    let mut lineage = repo.config.lineage()?;
    let branches = repo::load_branches(&repo, false)?;
    let new_branch = LocalBranchName::new(branch)?;
    let config = determine_new_branch_config(&repo, &branches, &lineage, new_branch, mode)?;
    let step_list = new_branch_steps(&config)?;
    let run_state = RunState::new(command, branches.initial, step_list);
    execute(run_state, &mut repo, &mut lineage)
}

fn run_ship(branch: Option<String>, message: Option<String>, dry_run: bool) -> Result<()> {
    let mut repo = repo::open(dry_run)?;
    vm::ensure_idle(&repo.git_dir)?;
    let mut lineage = repo.config.lineage()?;
    let branches = repo::load_branches(&repo, false)?;
    let branch_arg = branch.map(LocalBranchName::new).transpose()?;
    let config = determine_ship_config(&repo, &branches, &lineage, None, branch_arg, message)?;
    let step_list = ship_steps(&config)?;
    let run_state = RunState::new("ship", branches.initial, step_list);
    execute(run_state, &mut repo, &mut lineage)
}

fn run_kill(branch: Option<String>, dry_run: bool) -> Result<()> {
    let mut repo = repo::open(dry_run)?;
    vm::ensure_idle(&repo.git_dir)?;
    let mut lineage = repo.config.lineage()?;
    let branches = repo::load_branches(&repo, false)?;
    let branch_arg = branch.map(LocalBranchName::new).transpose()?;
    let config = determine_kill_config(&repo, &branches, &lineage, branch_arg)?;
    let step_list = kill_steps(&config)?;
    let run_state = RunState::new("kill", branches.initial, step_list);
    execute(run_state, &mut repo, &mut lineage)
}

fn run_rename(old: String, new: String, dry_run: bool) -> Result<()> {
    let mut repo = repo::open(dry_run)?;
    vm::ensure_idle(&repo.git_dir)?;
    let mut lineage = repo.config.lineage()?;
    let branches = repo::load_branches(&repo, false)?;
    let config = determine_rename_config(
        &repo,
        &branches,
        &lineage,
        LocalBranchName::new(old)?,
        LocalBranchName::new(new)?,
    )?;
    let step_list = rename_steps(&config)?;
    let run_state = RunState::new("rename-branch", branches.initial, step_list);
    execute(run_state, &mut repo, &mut lineage)
}

fn execute(run_state: RunState, repo: &mut Repo, lineage: &mut Lineage) -> Result<()> {
    let git_dir = repo.git_dir.clone();
    let mut args = VmArgs {
        backend: &repo.backend,
        frontend: &repo.frontend,
        config: &mut repo.config,
        connector: None,
        lineage,
        git_dir: &git_dir,
    };
    vm::execute(run_state, &mut args)
}

fn with_vm(action: impl FnOnce(&mut VmArgs) -> Result<()>) -> Result<()> {
    let mut repo = repo::open(false)?;
    let mut lineage = repo.config.lineage()?;
    let git_dir = repo.git_dir.clone();
    let mut args = VmArgs {
        backend: &repo.backend,
        frontend: &repo.frontend,
        config: &mut repo.config,
        connector: None,
        lineage: &mut lineage,
        git_dir: &git_dir,
    };
    action(&mut args)
}

fn run_status() -> Result<()> {
    let repo = repo::open(false)?;
    match persistence::load(&repo.git_dir)? {
        None => println!("no command in progress"),
        Some(state) => match &state.unfinished_details {
            Some(details) => {
                println!(
                    "\"{}\" is unfinished since {} (conflict on branch \"{}\")",
                    state.command, details.time, details.endangered_branch
                );
                println!("{} steps remaining", state.run_step_list.len());
                println!("{}", git_town::messages::unfinished_command(&state.command));
            }
            None => {
                println!(
                    "\"{}\" finished, run \"git-town undo\" to revert it",
                    state.command
                );
            }
        },
    }
    Ok(())
}

fn run_config(command: ConfigCommand) -> Result<()> {
    let mut repo = repo::open(false)?;
    match command {
        ConfigCommand::MainBranch { value } => match value {
            Some(value) => repo.config.set_main_branch(&LocalBranchName::new(value)?),
            None => {
                if let Some(main) = repo.config.main_branch() {
                    println!("{main}");
                }
                Ok(())
            }
        },
        ConfigCommand::PerennialBranches { values } => {
            if values.is_empty() {
                for branch in repo.config.perennial_branches() {
                    println!("{branch}");
                }
                Ok(())
            } else {
                let branches = values
                    .into_iter()
                    .map(LocalBranchName::new)
                    .collect::<Result<Vec<_>>>()?;
                repo.config.set_perennial_branches(&branches)
            }
        }
        ConfigCommand::SyncStrategy { value } => match value {
            Some(value) => repo.config.set_sync_strategy(SyncStrategy::parse(&value)?),
            None => {
                println!("{}", repo.config.sync_strategy()?.as_str());
                Ok(())
            }
        },
        ConfigCommand::PullBranchStrategy { value } => match value {
            Some(value) => repo
                .config
                .set_pull_branch_strategy(PullBranchStrategy::parse(&value)?),
            None => {
                println!("{}", repo.config.pull_branch_strategy()?.as_str());
                Ok(())
            }
        },
        ConfigCommand::PushNewBranches { global, value } => match value {
            Some(value) => repo.config.set_push_new_branches(parse_bool(&value)?, global),
            None => {
                println!("{}", format_bool(repo.config.should_push_new_branches(global)?));
                Ok(())
            }
        },
        ConfigCommand::PushHook { value } => match value {
            Some(value) => repo.config.set_push_hook(parse_bool(&value)?),
            None => {
                println!("{}", format_bool(repo.config.push_hook()?));
                Ok(())
            }
        },
        ConfigCommand::SyncUpstream { value } => match value {
            Some(value) => repo.config.set_sync_upstream(parse_bool(&value)?),
            None => {
                println!("{}", format_bool(repo.config.should_sync_upstream()?));
                Ok(())
            }
        },
        ConfigCommand::Offline { value } => match value {
            Some(value) => repo.config.set_offline(parse_bool(&value)?),
            None => {
                println!("{}", format_bool(repo.config.is_offline()?));
                Ok(())
            }
        },
    }
}

fn format_bool(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_sync() {
        let cli = Cli::parse_from(["git-town", "sync"]);
        assert!(matches!(
            cli.command,
            Command::Sync {
                all: false,
                dry_run: false
            }
        ));
    }

    #[test]
    fn parse_sync_all_dry_run() {
        let cli = Cli::parse_from(["git-town", "sync", "--all", "--dry-run"]);
        assert!(matches!(
            cli.command,
            Command::Sync {
                all: true,
                dry_run: true
            }
        ));
    }

    #[test]
    fn parse_hack_with_branch() {
        let cli = Cli::parse_from(["git-town", "hack", "new-feature"]);
        match cli.command {
            Command::Hack { branch, dry_run } => {
                assert_eq!(branch, "new-feature");
                assert!(!dry_run);
            }
            _ => panic!("expected hack"),
        }
    }

    #[test]
    fn parse_config_push_new_branches_global() {
        let cli = Cli::parse_from(["git-town", "config", "push-new-branches", "--global", "yes"]);
        match cli.command {
            Command::Config {
                command: ConfigCommand::PushNewBranches { global, value },
            } => {
                assert!(global);
                assert_eq!(value.as_deref(), Some("yes"));
            }
            _ => panic!("expected config push-new-branches"),
        }
    }

    #[test]
    fn parse_debug_flag_is_global() {
        let cli = Cli::parse_from(["git-town", "sync", "--debug"]);
        assert!(cli.debug);
    }
}
