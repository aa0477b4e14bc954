//! The scope tree defines which dependencies are visible to a dependent.
//!
//! A scope only sees its own dependencies and those of its ancestors, nearest first.
//! Scopes are built bottom-up: children must exist before the scope that adopts them,
//! and a scope can only be adopted once, which keeps the forest free of cycles.

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::descriptor::{Dependency, DependencyId};
use crate::resolve::{Result, WiringError};

/// Opaque identity of a scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub(crate) usize);

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scope#{}", self.0)
    }
}

/// Declaration of a single scope node
#[derive(Debug, Clone, Default)]
pub struct ScopeSpec {
    pub scopes: Vec<ScopeId>,
    pub dependencies: Vec<DependencyId>,
    pub dependents: Vec<DependencyId>,
}

impl ScopeSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scopes(mut self, scopes: impl IntoIterator<Item = ScopeId>) -> Self {
        self.scopes.extend(scopes);
        self
    }

    pub fn dependencies(mut self, dependencies: impl IntoIterator<Item = DependencyId>) -> Self {
        self.dependencies.extend(dependencies);
        self
    }

    pub fn dependents(mut self, dependents: impl IntoIterator<Item = DependencyId>) -> Self {
        self.dependents.extend(dependents);
        self
    }
}

#[derive(Debug)]
pub(crate) struct ScopeNode {
    pub(crate) dependencies: Vec<DependencyId>,
    pub(crate) dependents: Vec<DependencyId>,
    pub(crate) children: Vec<ScopeId>,
    pub(crate) parent: Option<ScopeId>,
}

#[derive(Debug, Default)]
pub(crate) struct ScopeTree {
    nodes: Vec<ScopeNode>,
}

impl ScopeTree {
    /// Add a scope node and adopt its children.
    ///
    /// Nothing is modified if the declaration is rejected.
    pub(crate) fn insert(&mut self, spec: ScopeSpec, known_dependencies: usize) -> Result<ScopeId> {
        let id = ScopeId(self.nodes.len());

        let mut adopted = HashSet::new();
        for child in &spec.scopes {
            let node = self.nodes.get(child.0).ok_or_else(|| {
                WiringError::InvalidScopeGraph(format!("{id} adopts unknown {child}"))
            })?;
            if let Some(parent) = node.parent {
                return Err(WiringError::InvalidScopeGraph(format!(
                    "{child} is already a child of {parent}"
                )));
            }
            if !adopted.insert(*child) {
                return Err(WiringError::InvalidScopeGraph(format!(
                    "{child} is adopted twice by {id}"
                )));
            }
        }
        check_list(id, "dependencies", &spec.dependencies, known_dependencies)?;
        check_list(id, "dependents", &spec.dependents, known_dependencies)?;

        for child in &spec.scopes {
            self.nodes[child.0].parent = Some(id);
        }
        self.nodes.push(ScopeNode {
            dependencies: spec.dependencies,
            dependents: spec.dependents,
            children: spec.scopes,
            parent: None,
        });
        Ok(id)
    }

    pub(crate) fn node(&self, id: ScopeId) -> &ScopeNode {
        &self.nodes[id.0]
    }

    pub(crate) fn get(&self, id: ScopeId) -> Option<&ScopeNode> {
        self.nodes.get(id.0)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (ScopeId, &ScopeNode)> {
        self.nodes.iter().enumerate().map(|(i, node)| (ScopeId(i), node))
    }

    /// The scope itself followed by its ancestors, nearest first.
    pub(crate) fn visible_chain(&self, scope: ScopeId) -> Vec<ScopeId> {
        let mut chain = vec![scope];
        let mut current = self.node(scope).parent;
        while let Some(parent) = current {
            chain.push(parent);
            current = self.node(parent).parent;
        }
        chain
    }

    /// Matching dependencies of the nearest scope with at least one match, in registration order.
    pub(crate) fn candidate_pool(
        &self,
        scope: ScopeId,
        mut accepts: impl FnMut(DependencyId) -> bool,
    ) -> Vec<DependencyId> {
        for current in self.visible_chain(scope) {
            let pool: Vec<_> = self
                .node(current)
                .dependencies
                .iter()
                .copied()
                .filter(|id| accepts(*id))
                .collect();
            if !pool.is_empty() {
                return pool;
            }
        }
        Vec::new()
    }
}

fn check_list(
    scope: ScopeId,
    field: &str,
    ids: &[DependencyId],
    known_dependencies: usize,
) -> Result<()> {
    let mut seen = HashSet::new();
    for id in ids {
        if id.0 >= known_dependencies {
            return Err(WiringError::InvalidScopeGraph(format!(
                "{scope} lists unknown dependency {id} in its {field}"
            )));
        }
        if !seen.insert(*id) {
            return Err(WiringError::InvalidScopeGraph(format!(
                "{scope} lists dependency {id} twice in its {field}"
            )));
        }
    }
    Ok(())
}

/// Resolution scope of every dependency placed in the forest.
///
/// A dependency is resolved in the scope listing it as a dependent, or else in the first
/// scope registering it as a dependency.
#[derive(Debug, Default)]
pub(crate) struct ScopeLayout {
    resolution_scope: HashMap<DependencyId, ScopeId>,
}

impl ScopeLayout {
    pub(crate) fn build(tree: &ScopeTree, dependencies: &[Dependency]) -> Result<Self> {
        let mut registered: HashMap<DependencyId, ScopeId> = HashMap::new();
        for (scope, node) in tree.iter() {
            for id in &node.dependencies {
                registered.entry(*id).or_insert(scope);
            }
        }

        let mut resolution_scope = registered.clone();
        let mut overridden: HashMap<DependencyId, ScopeId> = HashMap::new();
        for (scope, node) in tree.iter() {
            for id in &node.dependents {
                let dependency = &dependencies[id.0];
                if !dependency.is_class() {
                    return Err(WiringError::InvalidScopeGraph(format!(
                        "value dependency {} cannot be a dependent of {scope}",
                        dependency.label()
                    )));
                }
                if !registered.contains_key(id) {
                    return Err(WiringError::InvalidScopeGraph(format!(
                        "dependent {} of {scope} is never registered as a dependency",
                        dependency.label()
                    )));
                }
                if let Some(previous) = overridden.insert(*id, scope) {
                    return Err(WiringError::InvalidScopeGraph(format!(
                        "{} is a dependent of both {previous} and {scope}",
                        dependency.label()
                    )));
                }
                resolution_scope.insert(*id, scope);
            }
        }
        Ok(Self { resolution_scope })
    }

    pub(crate) fn resolution_scope(&self, id: DependencyId) -> Option<ScopeId> {
        self.resolution_scope.get(&id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deps(ids: &[usize]) -> Vec<DependencyId> {
        ids.iter().copied().map(DependencyId).collect()
    }

    #[test]
    fn visible_chain_walks_up_to_the_root() {
        let mut tree = ScopeTree::default();
        let leaf = tree.insert(ScopeSpec::new(), 0).unwrap();
        let sibling = tree.insert(ScopeSpec::new(), 0).unwrap();
        let middle = tree.insert(ScopeSpec::new().scopes([leaf, sibling]), 0).unwrap();
        let root = tree.insert(ScopeSpec::new().scopes([middle]), 0).unwrap();

        assert_eq!(tree.visible_chain(leaf), [leaf, middle, root]);
        assert_eq!(tree.visible_chain(root), [root]);
        assert_eq!(tree.node(middle).children, [leaf, sibling]);
    }

    #[test]
    fn a_scope_is_adopted_once() {
        let mut tree = ScopeTree::default();
        let child = tree.insert(ScopeSpec::new(), 0).unwrap();
        tree.insert(ScopeSpec::new().scopes([child]), 0).unwrap();

        let err = tree.insert(ScopeSpec::new().scopes([child]), 0).unwrap_err();
        assert!(matches!(err, WiringError::InvalidScopeGraph(_)));

        let err = tree.insert(ScopeSpec::new().scopes([ScopeId(42)]), 0).unwrap_err();
        assert!(matches!(err, WiringError::InvalidScopeGraph(_)));
    }

    #[test]
    fn rejected_scope_leaves_the_tree_untouched() {
        let mut tree = ScopeTree::default();
        let child = tree.insert(ScopeSpec::new(), 1).unwrap();
        let spec = ScopeSpec::new().scopes([child]).dependencies(deps(&[0, 0]));
        assert!(tree.insert(spec, 1).is_err());
        assert_eq!(tree.node(child).parent, None);
        assert_eq!(tree.iter().count(), 1);
    }

    #[test]
    fn candidate_pool_stops_at_the_nearest_match() {
        let mut tree = ScopeTree::default();
        let child = tree.insert(ScopeSpec::new().dependencies(deps(&[3, 4])), 5).unwrap();
        let root = tree
            .insert(ScopeSpec::new().scopes([child]).dependencies(deps(&[0, 1, 2])), 5)
            .unwrap();

        let even = |id: DependencyId| id.0 % 2 == 0;
        assert_eq!(tree.candidate_pool(child, even), deps(&[4]));
        assert_eq!(tree.candidate_pool(root, even), deps(&[0, 2]));
        assert_eq!(tree.candidate_pool(child, |id| id.0 < 2), deps(&[0, 1]));
        assert!(tree.candidate_pool(child, |_| false).is_empty());
    }
}
