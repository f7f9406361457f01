//! Typed access to git-town settings stored in git config.
//!
//! All values live under the `git-town.` key namespace. Reads are served
//! from a snapshot loaded at construction; writes go through `git config`
//! synchronously and rebuild the snapshot, so there is no write-back cache.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};

use crate::core::domain::LocalBranchName;
use crate::core::lineage::Lineage;
use crate::io::git::GitRunner;
use crate::messages;

pub const KEY_MAIN_BRANCH: &str = "git-town.main-branch";
pub const KEY_PERENNIAL_BRANCHES: &str = "git-town.perennial-branches";
pub const KEY_SYNC_STRATEGY: &str = "git-town.sync-strategy";
pub const KEY_PULL_BRANCH_STRATEGY: &str = "git-town.pull-branch-strategy";
pub const KEY_PUSH_NEW_BRANCHES: &str = "git-town.push-new-branches";
pub const KEY_PUSH_HOOK: &str = "git-town.push-hook";
pub const KEY_SYNC_UPSTREAM: &str = "git-town.sync-upstream";
pub const KEY_OFFLINE: &str = "git-town.offline";
pub const KEY_CODE_HOSTING_DRIVER: &str = "git-town.code-hosting-driver";
pub const KEY_CODE_HOSTING_ORIGIN_HOSTNAME: &str = "git-town.code-hosting-origin-hostname";

const BRANCH_KEY_PREFIX: &str = "git-town.branch.";
const BRANCH_KEY_SUFFIX: &str = ".parent";

/// How feature branches get synced with their parent and tracking branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    Merge,
    Rebase,
}

impl SyncStrategy {
    pub fn parse(text: &str) -> Result<Self> {
        match text {
            "merge" => Ok(Self::Merge),
            "rebase" => Ok(Self::Rebase),
            other => Err(anyhow!(messages::unknown_sync_strategy(other))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Merge => "merge",
            Self::Rebase => "rebase",
        }
    }
}

/// How perennial branches pull updates from their tracking branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullBranchStrategy {
    Merge,
    Rebase,
}

impl PullBranchStrategy {
    pub fn parse(text: &str) -> Result<Self> {
        match text {
            "merge" => Ok(Self::Merge),
            "rebase" => Ok(Self::Rebase),
            other => Err(anyhow!(messages::unknown_pull_branch_strategy(other))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Merge => "merge",
            Self::Rebase => "rebase",
        }
    }
}

/// Typed getters and setters for git-town configuration.
#[derive(Debug, Clone)]
pub struct Config {
    runner: GitRunner,
    cache: HashMap<String, String>,
    global_cache: HashMap<String, String>,
}

impl Config {
    pub fn new(workdir: impl Into<PathBuf>) -> Result<Self> {
        let mut config = Self {
            runner: GitRunner::new(workdir),
            cache: HashMap::new(),
            global_cache: HashMap::new(),
        };
        config.reload()?;
        Ok(config)
    }

    /// Discard the cached snapshot and re-read all values from git.
    pub fn reload(&mut self) -> Result<()> {
        let output = self.runner.run_capture(&["config", "--list", "--null"])?;
        self.cache = parse_config_list(&output);
        // A missing global config file is not an error.
        self.global_cache = match self.runner.run(&["config", "--global", "--list", "--null"]) {
            Ok(output) if output.status.success() => {
                parse_config_list(String::from_utf8_lossy(&output.stdout).as_ref())
            }
            _ => HashMap::new(),
        };
        Ok(())
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.cache.get(key).map(String::as_str)
    }

    fn get_global(&self, key: &str) -> Option<&str> {
        self.global_cache.get(key).map(String::as_str)
    }

    fn set_value(&mut self, key: &str, value: &str, global: bool) -> Result<()> {
        let mut args = vec!["config"];
        if global {
            args.push("--global");
        }
        args.extend([key, value]);
        self.runner.run_checked(&args)?;
        self.reload()
    }

    fn unset_value(&mut self, key: &str, global: bool) -> Result<()> {
        let mut args = vec!["config"];
        if global {
            args.push("--global");
        }
        args.extend(["--unset", key]);
        let output = self.runner.run(&args)?;
        // Exit code 5 means the key was not set; removing a missing key is fine.
        if !output.status.success() && output.status.code() != Some(5) {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("git config --unset {key} failed: {}", stderr.trim()));
        }
        self.reload()
    }

    pub fn main_branch(&self) -> Option<LocalBranchName> {
        self.get(KEY_MAIN_BRANCH)
            .and_then(|value| LocalBranchName::new(value).ok())
    }

    /// The configured main branch, a precondition for every planning command.
    pub fn validated_main_branch(&self) -> Result<LocalBranchName> {
        self.main_branch()
            .ok_or_else(|| anyhow!(messages::NO_MAIN_BRANCH_CONFIGURED))
    }

    pub fn set_main_branch(&mut self, branch: &LocalBranchName) -> Result<()> {
        self.set_value(KEY_MAIN_BRANCH, branch.as_str(), false)
    }

    pub fn perennial_branches(&self) -> Vec<LocalBranchName> {
        self.get(KEY_PERENNIAL_BRANCHES)
            .map(|value| {
                value
                    .split_whitespace()
                    .filter_map(|name| LocalBranchName::new(name).ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn set_perennial_branches(&mut self, branches: &[LocalBranchName]) -> Result<()> {
        let value = branches
            .iter()
            .map(LocalBranchName::as_str)
            .collect::<Vec<_>>()
            .join(" ");
        self.set_value(KEY_PERENNIAL_BRANCHES, &value, false)
    }

    pub fn add_perennial_branch(&mut self, branch: &LocalBranchName) -> Result<()> {
        let mut branches = self.perennial_branches();
        if !branches.contains(branch) {
            branches.push(branch.clone());
        }
        self.set_perennial_branches(&branches)
    }

    pub fn remove_perennial_branch(&mut self, branch: &LocalBranchName) -> Result<()> {
        let branches: Vec<LocalBranchName> = self
            .perennial_branches()
            .into_iter()
            .filter(|existing| existing != branch)
            .collect();
        self.set_perennial_branches(&branches)
    }

    fn parent_key(branch: &LocalBranchName) -> String {
        format!("{BRANCH_KEY_PREFIX}{branch}{BRANCH_KEY_SUFFIX}")
    }

    pub fn parent(&self, branch: &LocalBranchName) -> Option<LocalBranchName> {
        self.get(&Self::parent_key(branch))
            .and_then(|value| LocalBranchName::new(value).ok())
    }

    pub fn set_parent(&mut self, branch: &LocalBranchName, parent: &LocalBranchName) -> Result<()> {
        self.set_value(&Self::parent_key(branch), parent.as_str(), false)
    }

    /// Removes the parent entry; removing a missing entry is a no-op.
    pub fn remove_parent(&mut self, branch: &LocalBranchName) -> Result<()> {
        self.unset_value(&Self::parent_key(branch), false)
    }

    /// The complete lineage from config. A cyclic lineage is a fatal error.
    pub fn lineage(&self) -> Result<Lineage> {
        let mut entries = BTreeMap::new();
        for (key, value) in &self.cache {
            let Some(rest) = key.strip_prefix(BRANCH_KEY_PREFIX) else {
                continue;
            };
            let Some(child) = rest.strip_suffix(BRANCH_KEY_SUFFIX) else {
                continue;
            };
            entries.insert(
                LocalBranchName::new(child).with_context(|| format!("config key {key:?}"))?,
                LocalBranchName::new(value.as_str()).with_context(|| format!("config key {key:?}"))?,
            );
        }
        let lineage = Lineage::new(entries);
        lineage.validate()?;
        Ok(lineage)
    }

    pub fn sync_strategy(&self) -> Result<SyncStrategy> {
        match self.get(KEY_SYNC_STRATEGY) {
            Some(value) => SyncStrategy::parse(value),
            None => Ok(SyncStrategy::Merge),
        }
    }

    pub fn set_sync_strategy(&mut self, strategy: SyncStrategy) -> Result<()> {
        self.set_value(KEY_SYNC_STRATEGY, strategy.as_str(), false)
    }

    pub fn pull_branch_strategy(&self) -> Result<PullBranchStrategy> {
        match self.get(KEY_PULL_BRANCH_STRATEGY) {
            Some(value) => PullBranchStrategy::parse(value),
            None => Ok(PullBranchStrategy::Rebase),
        }
    }

    pub fn set_pull_branch_strategy(&mut self, strategy: PullBranchStrategy) -> Result<()> {
        self.set_value(KEY_PULL_BRANCH_STRATEGY, strategy.as_str(), false)
    }

    pub fn should_push_new_branches(&self, global: bool) -> Result<bool> {
        let value = if global {
            self.get_global(KEY_PUSH_NEW_BRANCHES)
        } else {
            self.get(KEY_PUSH_NEW_BRANCHES)
        };
        match value {
            Some(text) => parse_bool(text),
            None => Ok(false),
        }
    }

    pub fn set_push_new_branches(&mut self, value: bool, global: bool) -> Result<()> {
        self.set_value(KEY_PUSH_NEW_BRANCHES, bool_text(value), global)
    }

    pub fn push_hook(&self) -> Result<bool> {
        match self.get(KEY_PUSH_HOOK) {
            Some(text) => parse_bool(text),
            None => Ok(true),
        }
    }

    pub fn set_push_hook(&mut self, value: bool) -> Result<()> {
        self.set_value(KEY_PUSH_HOOK, bool_text(value), false)
    }

    pub fn should_sync_upstream(&self) -> Result<bool> {
        match self.get(KEY_SYNC_UPSTREAM) {
            Some(text) => parse_bool(text),
            None => Ok(true),
        }
    }

    pub fn set_sync_upstream(&mut self, value: bool) -> Result<()> {
        self.set_value(KEY_SYNC_UPSTREAM, bool_text(value), false)
    }

    pub fn is_offline(&self) -> Result<bool> {
        match self.get(KEY_OFFLINE) {
            Some(text) => parse_bool(text),
            None => Ok(false),
        }
    }

    pub fn set_offline(&mut self, value: bool) -> Result<()> {
        self.set_value(KEY_OFFLINE, bool_text(value), false)
    }

    pub fn code_hosting_driver(&self) -> Option<String> {
        self.get(KEY_CODE_HOSTING_DRIVER).map(str::to_string)
    }

    pub fn code_hosting_origin_hostname(&self) -> Option<String> {
        self.get(KEY_CODE_HOSTING_ORIGIN_HOSTNAME).map(str::to_string)
    }
}

/// Parse `git config --list --null` output: `key\nvalue\0` records.
fn parse_config_list(output: &str) -> HashMap<String, String> {
    let mut entries = HashMap::new();
    for record in output.split('\u{0}') {
        if record.is_empty() {
            continue;
        }
        match record.split_once('\n') {
            Some((key, value)) => entries.insert(key.to_string(), value.to_string()),
            // A key without a value means the value is implicitly "true".
            None => entries.insert(record.to_string(), "true".to_string()),
        };
    }
    entries
}

/// Parse a boolean the way git does.
pub fn parse_bool(text: &str) -> Result<bool> {
    match text.to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(anyhow!(messages::input_yes_or_no(text))),
    }
}

fn bool_text(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestRepo;

    #[test]
    fn parses_config_list_records() {
        let output = "git-town.main-branch\nmain\u{0}git-town.offline\u{0}user.name\nTest User\u{0}";
        let entries = parse_config_list(output);
        assert_eq!(entries.get("git-town.main-branch").map(String::as_str), Some("main"));
        assert_eq!(entries.get("git-town.offline").map(String::as_str), Some("true"));
        assert_eq!(entries.get("user.name").map(String::as_str), Some("Test User"));
    }

    #[test]
    fn parse_bool_accepts_git_spellings() {
        for text in ["true", "yes", "on", "1", "TRUE"] {
            assert!(parse_bool(text).expect("parse"), "{text}");
        }
        for text in ["false", "no", "off", "0"] {
            assert!(!parse_bool(text).expect("parse"), "{text}");
        }
        assert!(parse_bool("maybe").is_err());
    }

    #[test]
    fn main_branch_round_trips() {
        let repo = TestRepo::new().expect("repo");
        let mut config = Config::new(repo.root()).expect("config");
        assert!(config.main_branch().is_none());
        assert!(config.validated_main_branch().is_err());
        let main = LocalBranchName::new("main").expect("name");
        config.set_main_branch(&main).expect("set");
        assert_eq!(config.main_branch(), Some(main));
    }

    #[test]
    fn perennial_branches_are_space_separated() {
        let repo = TestRepo::new().expect("repo");
        let mut config = Config::new(repo.root()).expect("config");
        let staging = LocalBranchName::new("staging").expect("name");
        let qa = LocalBranchName::new("qa").expect("name");
        config.add_perennial_branch(&staging).expect("add");
        config.add_perennial_branch(&qa).expect("add");
        assert_eq!(config.perennial_branches(), vec![staging.clone(), qa.clone()]);
        config.remove_perennial_branch(&staging).expect("remove");
        assert_eq!(config.perennial_branches(), vec![qa]);
    }

    #[test]
    fn parent_set_then_remove_restores_prior_state() {
        let repo = TestRepo::new().expect("repo");
        let mut config = Config::new(repo.root()).expect("config");
        let feature = LocalBranchName::new("feature").expect("name");
        let main = LocalBranchName::new("main").expect("name");
        assert!(config.parent(&feature).is_none());
        config.set_parent(&feature, &main).expect("set");
        assert_eq!(config.parent(&feature), Some(main));
        config.remove_parent(&feature).expect("remove");
        assert!(config.parent(&feature).is_none());
        // Removing again tolerates the missing entry.
        config.remove_parent(&feature).expect("remove again");
    }

    #[test]
    fn lineage_reads_branch_parent_keys() {
        let repo = TestRepo::new().expect("repo");
        let mut config = Config::new(repo.root()).expect("config");
        let a = LocalBranchName::new("a").expect("name");
        let b = LocalBranchName::new("b").expect("name");
        let main = LocalBranchName::new("main").expect("name");
        config.set_parent(&a, &main).expect("set");
        config.set_parent(&b, &a).expect("set");
        let lineage = config.lineage().expect("lineage");
        assert_eq!(lineage.parent(&b), Some(&a));
        assert_eq!(lineage.ancestors(&b), vec![main, a]);
    }

    #[test]
    fn lineage_rejects_cycles() {
        let repo = TestRepo::new().expect("repo");
        let mut config = Config::new(repo.root()).expect("config");
        let a = LocalBranchName::new("a").expect("name");
        let b = LocalBranchName::new("b").expect("name");
        config.set_parent(&a, &b).expect("set");
        config.set_parent(&b, &a).expect("set");
        assert!(config.lineage().is_err());
    }

    #[test]
    fn strategies_default_and_parse() {
        let repo = TestRepo::new().expect("repo");
        let mut config = Config::new(repo.root()).expect("config");
        assert_eq!(config.sync_strategy().expect("strategy"), SyncStrategy::Merge);
        assert_eq!(
            config.pull_branch_strategy().expect("strategy"),
            PullBranchStrategy::Rebase
        );
        config.set_sync_strategy(SyncStrategy::Rebase).expect("set");
        assert_eq!(config.sync_strategy().expect("strategy"), SyncStrategy::Rebase);
    }

    #[test]
    fn unknown_strategy_value_is_an_error_not_a_default() {
        let repo = TestRepo::new().expect("repo");
        repo.set_config(KEY_SYNC_STRATEGY, "cherry-pick").expect("set");
        let config = Config::new(repo.root()).expect("config");
        assert!(config.sync_strategy().is_err());
    }

    #[test]
    fn booleans_default_sensibly() {
        let repo = TestRepo::new().expect("repo");
        let config = Config::new(repo.root()).expect("config");
        assert!(!config.should_push_new_branches(false).expect("value"));
        assert!(config.push_hook().expect("value"));
        assert!(config.should_sync_upstream().expect("value"));
        assert!(!config.is_offline().expect("value"));
    }
}
