//! Atomic save/load of the run state under the git directory.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::runstate::run_state::RunState;

/// Location of the persisted run state for the given git directory.
pub fn runstate_path(git_dir: &Path) -> PathBuf {
    git_dir.join("git-town").join("runstate.json")
}

/// Load the persisted run state, or `None` when no command left one behind.
/// An unknown step type in the file is a hard error.
pub fn load(git_dir: &Path) -> Result<Option<RunState>> {
    let path = runstate_path(git_dir);
    if !path.exists() {
        return Ok(None);
    }
    debug!(path = %path.display(), "loading run state");
    let contents =
        fs::read_to_string(&path).with_context(|| format!("read run state {}", path.display()))?;
    let state: RunState = serde_json::from_str(&contents)
        .with_context(|| format!("parse run state {}", path.display()))?;
    Ok(Some(state))
}

/// Atomically write the run state to disk (temp file + rename).
pub fn save(state: &RunState, git_dir: &Path) -> Result<()> {
    let path = runstate_path(git_dir);
    debug!(path = %path.display(), command = %state.command, "writing run state");
    let mut buf = serde_json::to_string_pretty(state)?;
    buf.push('\n');
    write_atomic(&path, &buf)
}

/// Remove the persisted run state; removing a missing file is a no-op.
pub fn delete(git_dir: &Path) -> Result<()> {
    let path = runstate_path(git_dir);
    if path.exists() {
        debug!(path = %path.display(), "deleting run state");
        fs::remove_file(&path)
            .with_context(|| format!("delete run state {}", path.display()))?;
    }
    Ok(())
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("run state path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp run state {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace run state {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::LocalBranchName;
    use crate::runstate::step_list::StepList;
    use crate::steps::Step;

    fn branch(name: &str) -> LocalBranchName {
        LocalBranchName::new(name).expect("branch name")
    }

    #[test]
    fn save_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut state = RunState::new(
            "sync",
            branch("feature"),
            StepList::new(vec![Step::Checkout { branch: branch("main") }]),
        );
        state.record_undo_steps(vec![Step::AbortMerge]);
        save(&state, temp.path()).expect("save");
        let loaded = load(temp.path()).expect("load").expect("state");
        assert_eq!(loaded, state);
    }

    #[test]
    fn load_missing_returns_none() {
        let temp = tempfile::tempdir().expect("tempdir");
        assert!(load(temp.path()).expect("load").is_none());
    }

    #[test]
    fn unknown_step_type_is_a_hard_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = runstate_path(temp.path());
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(
            &path,
            r#"{
  "Command": "sync",
  "IsAbort": false,
  "IsUndo": false,
  "InitialActiveBranch": "main",
  "UnfinishedDetails": null,
  "RunStepList": [{"type": "TeleportBranch", "data": {}}],
  "UndoStepList": [],
  "AbortStepList": []
}"#,
        )
        .expect("write");
        assert!(load(temp.path()).is_err());
    }

    #[test]
    fn delete_removes_the_file_and_tolerates_absence() {
        let temp = tempfile::tempdir().expect("tempdir");
        let state = RunState::new("sync", branch("main"), StepList::default());
        save(&state, temp.path()).expect("save");
        assert!(runstate_path(temp.path()).exists());
        delete(temp.path()).expect("delete");
        assert!(!runstate_path(temp.path()).exists());
        delete(temp.path()).expect("delete again");
    }

    #[test]
    fn persisted_form_uses_tagged_steps() {
        let temp = tempfile::tempdir().expect("tempdir");
        let state = RunState::new(
            "sync",
            branch("main"),
            StepList::new(vec![Step::Checkout { branch: branch("feature") }]),
        );
        save(&state, temp.path()).expect("save");
        let contents = fs::read_to_string(runstate_path(temp.path())).expect("read");
        assert!(contents.contains("\"type\": \"Checkout\""));
        assert!(contents.contains("\"branch\": \"feature\""));
        assert!(contents.ends_with('\n'));
    }
}
