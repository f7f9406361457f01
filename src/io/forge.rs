//! Narrow interface to code-hosting APIs.
//!
//! Concrete connectors (GitHub, GitLab, ...) live outside the run engine and
//! use the caller's credentials; the engine only needs proposal lookup and
//! retargeting. Steps receive the connector through [`crate::steps::RunArgs`].

use anyhow::{anyhow, Result};

use crate::core::domain::LocalBranchName;

/// A change proposal (pull/merge request) at the code-hosting service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proposal {
    pub number: u64,
    /// The branch this proposal wants to merge into.
    pub target: LocalBranchName,
}

/// Adapter to a code-hosting API, used by proposal-manipulating steps.
pub trait ForgeConnector {
    /// The open proposal from `branch` into `target`, if one exists.
    fn find_proposal(
        &self,
        branch: &LocalBranchName,
        target: &LocalBranchName,
    ) -> Result<Option<Proposal>>;

    /// Change the target branch of the given proposal.
    fn update_proposal_target(&self, number: u64, target: &LocalBranchName) -> Result<()>;
}

/// The code-hosting platform declared in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostingPlatform {
    GitHub,
    GitLab,
}

impl HostingPlatform {
    pub fn parse(text: &str) -> Result<Self> {
        match text.to_lowercase().as_str() {
            "github" => Ok(Self::GitHub),
            "gitlab" => Ok(Self::GitLab),
            other => Err(anyhow!("unknown code-hosting-driver value: {other:?}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_platforms() {
        assert_eq!(HostingPlatform::parse("github").expect("parse"), HostingPlatform::GitHub);
        assert_eq!(HostingPlatform::parse("GitLab").expect("parse"), HostingPlatform::GitLab);
        assert!(HostingPlatform::parse("sourcehut").is_err());
    }
}
