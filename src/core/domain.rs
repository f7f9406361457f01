//! Value types describing branches, SHAs, remotes, and branch kinds.
//!
//! These types define stable contracts between the planners, the step
//! algebra, and the git adapters. All of them validate at construction and
//! serialize transparently as strings.

use std::collections::HashMap;
use std::fmt;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Name of a branch in the local repository.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LocalBranchName(String);

impl LocalBranchName {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(anyhow!("branch name must not be empty"));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The tracking branch for this branch at the given remote.
    pub fn at_remote(&self, remote: &str) -> RemoteBranchName {
        RemoteBranchName(format!("{remote}/{}", self.0))
    }

    /// The tracking branch at the "origin" remote.
    pub fn tracking_branch(&self) -> RemoteBranchName {
        self.at_remote("origin")
    }
}

impl fmt::Display for LocalBranchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for LocalBranchName {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<LocalBranchName> for String {
    fn from(value: LocalBranchName) -> Self {
        value.0
    }
}

/// Name of a branch at a remote, always `<remote>/<branch>`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RemoteBranchName(String);

impl RemoteBranchName {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        match name.split_once('/') {
            Some((remote, branch)) if !remote.is_empty() && !branch.is_empty() => Ok(Self(name)),
            _ => Err(anyhow!("remote branch name must be \"<remote>/<branch>\", got {name:?}")),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The remote segment, e.g. "origin" for "origin/feature".
    pub fn remote(&self) -> &str {
        self.0.split_once('/').map(|(remote, _)| remote).unwrap_or_default()
    }

    /// The branch name without the remote segment.
    pub fn local_name(&self) -> LocalBranchName {
        let (_, branch) = self.0.split_once('/').unwrap_or(("", &self.0));
        LocalBranchName(branch.to_string())
    }
}

impl fmt::Display for RemoteBranchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RemoteBranchName {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<RemoteBranchName> for String {
    fn from(value: RemoteBranchName) -> Self {
        value.0
    }
}

/// A branch name that can refer to a local or a remote branch, as accepted by
/// `git merge` and `git rebase`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BranchName(String);

impl BranchName {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(anyhow!("branch name must not be empty"));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BranchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for BranchName {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<BranchName> for String {
    fn from(value: BranchName) -> Self {
        value.0
    }
}

impl From<LocalBranchName> for BranchName {
    fn from(value: LocalBranchName) -> Self {
        Self(value.0)
    }
}

impl From<RemoteBranchName> for BranchName {
    fn from(value: RemoteBranchName) -> Self {
        Self(value.0)
    }
}

/// A git object id, normalized to lowercase hex.
///
/// Short forms are accepted on input; git output provides the canonical
/// 40-character form.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Sha(String);

impl Sha {
    pub fn new(text: impl Into<String>) -> Result<Self> {
        let text = text.into().to_lowercase();
        if text.is_empty() || text.len() > 40 || !text.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(anyhow!("invalid SHA: {text:?}"));
        }
        Ok(Self(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Sha {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Sha {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Sha> for String {
    fn from(value: Sha) -> Self {
        value.0
    }
}

/// How a local branch relates to its tracking branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncStatus {
    /// No tracking branch configured.
    LocalOnly,
    /// Tracking branch exists and both point at the same commit.
    UpToDate,
    /// Local has commits the tracking branch lacks.
    Ahead,
    /// Tracking branch has commits the local branch lacks.
    Behind,
    /// Both sides have commits the other lacks.
    NotInSync,
    /// The tracking branch was deleted at the remote.
    DeletedAtRemote,
    /// Only the remote branch exists.
    RemoteOnly,
}

/// Everything known about one branch: the local part, the remote part, and
/// how they relate. At least one of the two sides is present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchInfo {
    pub local_name: Option<LocalBranchName>,
    pub local_sha: Option<Sha>,
    pub sync_status: SyncStatus,
    pub remote_name: Option<RemoteBranchName>,
    pub remote_sha: Option<Sha>,
}

impl BranchInfo {
    pub fn has_tracking_branch(&self) -> bool {
        self.local_name.is_some()
            && self.remote_name.is_some()
            && self.sync_status != SyncStatus::DeletedAtRemote
    }
}

/// All known branches, with O(1) lookup by local name.
#[derive(Debug, Clone, Default)]
pub struct BranchInfos {
    items: Vec<BranchInfo>,
    by_local: HashMap<LocalBranchName, usize>,
}

impl BranchInfos {
    pub fn new(items: Vec<BranchInfo>) -> Result<Self> {
        let mut by_local = HashMap::new();
        for (index, info) in items.iter().enumerate() {
            if info.local_name.is_none() && info.remote_name.is_none() {
                return Err(anyhow!("branch info with neither local nor remote name"));
            }
            if let Some(local) = &info.local_name {
                by_local.insert(local.clone(), index);
            }
        }
        Ok(Self { items, by_local })
    }

    pub fn iter(&self) -> impl Iterator<Item = &BranchInfo> {
        self.items.iter()
    }

    pub fn find_by_local_name(&self, name: &LocalBranchName) -> Option<&BranchInfo> {
        self.by_local.get(name).map(|&index| &self.items[index])
    }

    pub fn find_by_remote_name(&self, name: &RemoteBranchName) -> Option<&BranchInfo> {
        self.items
            .iter()
            .find(|info| info.remote_name.as_ref() == Some(name))
    }

    pub fn has_local_branch(&self, name: &LocalBranchName) -> bool {
        self.by_local.contains_key(name)
    }

    /// Names of all local branches, in listing order.
    pub fn local_names(&self) -> Vec<LocalBranchName> {
        self.items
            .iter()
            .filter_map(|info| info.local_name.clone())
            .collect()
    }

    /// The infos for the given local branch names, in the given order.
    pub fn select(&self, names: &[LocalBranchName]) -> Result<Vec<BranchInfo>> {
        names
            .iter()
            .map(|name| {
                self.find_by_local_name(name)
                    .cloned()
                    .ok_or_else(|| anyhow!("unknown branch {name:?}"))
            })
            .collect()
    }
}

/// The kind of a branch, as derived from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BranchType {
    Main,
    Perennial,
    Feature,
}

/// Classifies local branches into main, perennial, and feature branches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchTypes {
    pub main_branch: LocalBranchName,
    pub perennial_branches: Vec<LocalBranchName>,
}

impl BranchTypes {
    pub fn branch_type(&self, branch: &LocalBranchName) -> BranchType {
        if branch == &self.main_branch {
            BranchType::Main
        } else if self.perennial_branches.contains(branch) {
            BranchType::Perennial
        } else {
            BranchType::Feature
        }
    }

    pub fn is_feature_branch(&self, branch: &LocalBranchName) -> bool {
        self.branch_type(branch) == BranchType::Feature
    }
}

/// Snapshot of the branches at command start.
#[derive(Debug, Clone)]
pub struct Branches {
    /// The branch that was checked out when the command started.
    pub initial: LocalBranchName,
    pub all: BranchInfos,
    pub types: BranchTypes,
}

/// The remotes configured for the repository.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Remotes(Vec<String>);

impl Remotes {
    pub fn new(names: Vec<String>) -> Self {
        Self(names)
    }

    pub fn has_origin(&self) -> bool {
        self.0.iter().any(|name| name == "origin")
    }

    pub fn has_upstream(&self) -> bool {
        self.0.iter().any(|name| name == "upstream")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_branch_name_rejects_empty() {
        assert!(LocalBranchName::new("").is_err());
        assert!(LocalBranchName::new("  ").is_err());
        assert!(LocalBranchName::new("feature").is_ok());
    }

    #[test]
    fn remote_branch_name_splits_remote_segment() {
        let branch = RemoteBranchName::new("origin/feature/login").expect("valid");
        assert_eq!(branch.remote(), "origin");
        assert_eq!(branch.local_name().as_str(), "feature/login");
    }

    #[test]
    fn remote_branch_name_requires_remote_segment() {
        assert!(RemoteBranchName::new("feature").is_err());
        assert!(RemoteBranchName::new("/feature").is_err());
    }

    #[test]
    fn tracking_branch_round_trips() {
        let local = LocalBranchName::new("feature").expect("valid");
        assert_eq!(local.tracking_branch().local_name(), local);
    }

    #[test]
    fn sha_normalizes_to_lowercase() {
        let sha = Sha::new("ABCDEF0123").expect("valid");
        assert_eq!(sha.as_str(), "abcdef0123");
    }

    #[test]
    fn sha_rejects_non_hex() {
        assert!(Sha::new("not-a-sha").is_err());
        assert!(Sha::new("").is_err());
    }

    #[test]
    fn branch_infos_lookup_by_local_name() {
        let feature = LocalBranchName::new("feature").expect("valid");
        let infos = BranchInfos::new(vec![BranchInfo {
            local_name: Some(feature.clone()),
            local_sha: Some(Sha::new("ab12").expect("sha")),
            sync_status: SyncStatus::LocalOnly,
            remote_name: None,
            remote_sha: None,
        }])
        .expect("infos");
        assert!(infos.has_local_branch(&feature));
        assert!(infos.find_by_local_name(&feature).is_some());
    }

    #[test]
    fn branch_infos_lookup_by_remote_name() {
        let remote = RemoteBranchName::new("origin/feature").expect("valid");
        let infos = BranchInfos::new(vec![BranchInfo {
            local_name: None,
            local_sha: None,
            sync_status: SyncStatus::RemoteOnly,
            remote_name: Some(remote.clone()),
            remote_sha: Some(Sha::new("cd34").expect("sha")),
        }])
        .expect("infos");
        assert!(infos.find_by_remote_name(&remote).is_some());
        let other = RemoteBranchName::new("origin/other").expect("valid");
        assert!(infos.find_by_remote_name(&other).is_none());
    }

    #[test]
    fn branch_infos_reject_empty_info() {
        let result = BranchInfos::new(vec![BranchInfo {
            local_name: None,
            local_sha: None,
            sync_status: SyncStatus::RemoteOnly,
            remote_name: None,
            remote_sha: None,
        }]);
        assert!(result.is_err());
    }

    #[test]
    fn branch_types_classify() {
        let types = BranchTypes {
            main_branch: LocalBranchName::new("main").expect("valid"),
            perennial_branches: vec![LocalBranchName::new("staging").expect("valid")],
        };
        assert_eq!(types.branch_type(&LocalBranchName::new("main").expect("valid")), BranchType::Main);
        assert_eq!(
            types.branch_type(&LocalBranchName::new("staging").expect("valid")),
            BranchType::Perennial
        );
        assert!(types.is_feature_branch(&LocalBranchName::new("feature").expect("valid")));
    }

    #[test]
    fn remotes_queries() {
        let remotes = Remotes::new(vec!["origin".to_string(), "upstream".to_string()]);
        assert!(remotes.has_origin());
        assert!(remotes.has_upstream());
        assert!(!Remotes::default().has_origin());
    }
}
