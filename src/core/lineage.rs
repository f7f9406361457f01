//! The persisted parent/child graph over local branches.
//!
//! The lineage is a pure child-to-parent map. Children and descendants are
//! computed on demand; no back-edges are ever stored.

use std::collections::BTreeMap;

use anyhow::{anyhow, Result};

use crate::core::domain::LocalBranchName;
use crate::messages;

/// Maps each child branch to its parent branch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lineage(BTreeMap<LocalBranchName, LocalBranchName>);

impl Lineage {
    pub fn new(entries: BTreeMap<LocalBranchName, LocalBranchName>) -> Self {
        Self(entries)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn parent(&self, branch: &LocalBranchName) -> Option<&LocalBranchName> {
        self.0.get(branch)
    }

    pub fn has_parent(&self, branch: &LocalBranchName) -> bool {
        self.0.contains_key(branch)
    }

    pub fn set_parent(&mut self, branch: LocalBranchName, parent: LocalBranchName) {
        self.0.insert(branch, parent);
    }

    pub fn remove_parent(&mut self, branch: &LocalBranchName) {
        self.0.remove(branch);
    }

    /// Direct children of the given branch, in lexicographic order.
    pub fn children(&self, branch: &LocalBranchName) -> Vec<LocalBranchName> {
        self.0
            .iter()
            .filter(|(_, parent)| *parent == branch)
            .map(|(child, _)| child.clone())
            .collect()
    }

    /// All branches that appear only as parents: the tops of the lineage,
    /// deduplicated, in lexicographic order.
    pub fn roots(&self) -> Vec<LocalBranchName> {
        let mut roots: Vec<LocalBranchName> = self
            .0
            .values()
            .filter(|parent| !self.0.contains_key(parent))
            .cloned()
            .collect();
        roots.sort();
        roots.dedup();
        roots
    }

    /// All branches below the given branch, depth-first, children in
    /// lexicographic order.
    pub fn descendants(&self, branch: &LocalBranchName) -> Vec<LocalBranchName> {
        let mut descendants = Vec::new();
        for child in self.children(branch) {
            let grandchildren = self.descendants(&child);
            descendants.push(child);
            descendants.extend(grandchildren);
        }
        descendants
    }

    /// The ancestry path of the given branch, root first, excluding the
    /// branch itself. Walks at most one full cycle; use [`Lineage::validate`]
    /// to reject cyclic lineages up front.
    pub fn ancestors(&self, branch: &LocalBranchName) -> Vec<LocalBranchName> {
        let mut ancestors = Vec::new();
        let mut current = branch;
        while let Some(parent) = self.parent(current) {
            if ancestors.contains(parent) || parent == branch {
                break;
            }
            ancestors.push(parent.clone());
            current = parent;
        }
        ancestors.reverse();
        ancestors
    }

    /// The given branches plus all their ancestors, deduplicated, ordered so
    /// that every branch appears after all of its ancestors.
    pub fn branches_and_ancestors(&self, branches: &[LocalBranchName]) -> Vec<LocalBranchName> {
        let mut result: Vec<LocalBranchName> = Vec::new();
        for branch in branches {
            for ancestor in self.ancestors(branch) {
                if !result.contains(&ancestor) {
                    result.push(ancestor);
                }
            }
            if !result.contains(branch) {
                result.push(branch.clone());
            }
        }
        result
    }

    /// Rejects cyclic lineages. A cyclic lineage is a fatal invariant
    /// violation: no command may plan against it.
    pub fn validate(&self) -> Result<()> {
        for branch in self.0.keys() {
            let mut seen = vec![branch.clone()];
            let mut current = branch;
            while let Some(parent) = self.parent(current) {
                if seen.contains(parent) {
                    return Err(anyhow!(messages::lineage_cycle(branch.as_str())));
                }
                seen.push(parent.clone());
                current = parent;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn branch(name: &str) -> LocalBranchName {
        LocalBranchName::new(name).expect("branch name")
    }

    fn lineage(entries: &[(&str, &str)]) -> Lineage {
        let mut map = BTreeMap::new();
        for (child, parent) in entries {
            map.insert(branch(child), branch(parent));
        }
        Lineage::new(map)
    }

    #[test]
    fn ancestors_yields_path_root_first() {
        let lineage = lineage(&[("b", "a"), ("a", "main")]);
        assert_eq!(lineage.ancestors(&branch("b")), vec![branch("main"), branch("a")]);
        assert_eq!(lineage.ancestors(&branch("main")), Vec::<LocalBranchName>::new());
    }

    #[test]
    fn branches_and_ancestors_is_topological() {
        let lineage = lineage(&[("b", "a"), ("a", "main"), ("c", "main")]);
        let ordered = lineage.branches_and_ancestors(&[branch("b"), branch("c")]);
        assert_eq!(ordered, vec![branch("main"), branch("a"), branch("b"), branch("c")]);
    }

    #[test]
    fn branches_and_ancestors_has_no_duplicates() {
        let lineage = lineage(&[("b", "a"), ("a", "main")]);
        let ordered = lineage.branches_and_ancestors(&[branch("a"), branch("b"), branch("a")]);
        assert_eq!(ordered, vec![branch("main"), branch("a"), branch("b")]);
    }

    #[test]
    fn branches_and_ancestors_places_ancestors_before_descendants() {
        let lineage = lineage(&[("b", "a"), ("a", "main"), ("d", "c"), ("c", "main")]);
        let ordered = lineage.branches_and_ancestors(&[branch("d"), branch("b"), branch("c")]);
        for (child, parent) in [("b", "a"), ("a", "main"), ("d", "c"), ("c", "main")] {
            let child_pos = ordered.iter().position(|b| b.as_str() == child).expect("child");
            let parent_pos = ordered.iter().position(|b| b.as_str() == parent).expect("parent");
            assert!(parent_pos < child_pos, "{parent} must precede {child}");
        }
    }

    #[test]
    fn children_are_computed_not_stored() {
        let lineage = lineage(&[("b", "a"), ("c", "a"), ("a", "main")]);
        assert_eq!(lineage.children(&branch("a")), vec![branch("b"), branch("c")]);
        assert_eq!(lineage.children(&branch("b")), Vec::<LocalBranchName>::new());
    }

    #[test]
    fn roots_are_branches_without_parents() {
        let lineage = lineage(&[("b", "a"), ("a", "main"), ("c", "main"), ("e", "dev")]);
        assert_eq!(lineage.roots(), vec![branch("dev"), branch("main")]);
        assert!(Lineage::default().roots().is_empty());
    }

    #[test]
    fn descendants_walk_depth_first() {
        let lineage = lineage(&[("b", "a"), ("c", "b"), ("d", "a"), ("a", "main")]);
        assert_eq!(
            lineage.descendants(&branch("main")),
            vec![branch("a"), branch("b"), branch("c"), branch("d")]
        );
        assert_eq!(lineage.descendants(&branch("b")), vec![branch("c")]);
        assert!(lineage.descendants(&branch("c")).is_empty());
    }

    #[test]
    fn validate_rejects_cycles() {
        let cyclic = lineage(&[("a", "b"), ("b", "a")]);
        assert!(cyclic.validate().is_err());
        let acyclic = lineage(&[("b", "a"), ("a", "main")]);
        assert!(acyclic.validate().is_ok());
    }

    #[test]
    fn set_and_remove_parent() {
        let mut lineage = Lineage::default();
        lineage.set_parent(branch("feature"), branch("main"));
        assert_eq!(lineage.parent(&branch("feature")), Some(&branch("main")));
        lineage.remove_parent(&branch("feature"));
        assert!(lineage.parent(&branch("feature")).is_none());
    }
}
