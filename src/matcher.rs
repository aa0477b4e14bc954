//! Binding of constructor parameters to visible dependencies.
//!
//! Single-valued parameters sharing the same requested type form a group: the group takes the
//! candidates of the nearest scope with at least one match and assigns them 1:1 in declaration
//! order. Multi-valued parameters aggregate candidates according to the dependent's
//! [EffectiveConfig] and never fail on an empty result.

use std::collections::{HashMap, HashSet};

use tracing::trace;

use crate::config::{AggregateStrategy, EffectiveConfig};
use crate::descriptor::{Dependency, DependencyId, ParamKind, Signature, TypeKey};
use crate::resolve::{Result, WiringError};
use crate::scope::{ScopeId, ScopeTree};

/// Decide whether a candidate dependency can be bound to a requested type
pub trait TypeOracle: Send + Sync {
    fn satisfies(&self, requested: &TypeKey, candidate: &Dependency) -> bool;
}

/// Match on the type tags declared at registration time.
///
/// The [AnyType](crate::AnyType) marker accepts every candidate.
#[derive(Debug, Clone, Copy, Default)]
pub struct NominalOracle;

impl TypeOracle for NominalOracle {
    fn satisfies(&self, requested: &TypeKey, candidate: &Dependency) -> bool {
        requested.is_any() || candidate.provides(requested)
    }
}

impl<F> TypeOracle for F
where
    F: Fn(&TypeKey, &Dependency) -> bool + Send + Sync,
{
    fn satisfies(&self, requested: &TypeKey, candidate: &Dependency) -> bool {
        self(requested, candidate)
    }
}

/// Dependencies selected for one parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Binding {
    Single {
        requested: TypeKey,
        candidate: DependencyId,
    },
    Many {
        element: TypeKey,
        candidates: Vec<DependencyId>,
    },
    Keywords {
        element: TypeKey,
        entries: Vec<(String, DependencyId)>,
    },
}

pub(crate) struct Matcher<'a> {
    pub(crate) tree: &'a ScopeTree,
    pub(crate) dependencies: &'a [Dependency],
    pub(crate) oracle: &'a dyn TypeOracle,
}

impl Matcher<'_> {
    fn accepts(&self, requested: &TypeKey, id: DependencyId) -> bool {
        self.oracle.satisfies(requested, &self.dependencies[id.0])
    }

    /// Bind every parameter of a dependent resolved in `scope`.
    pub(crate) fn bind(
        &self,
        dependent: &Dependency,
        signature: &Signature,
        scope: ScopeId,
        config: &EffectiveConfig,
    ) -> Result<Vec<(&'static str, Binding)>> {
        let mut pools: HashMap<TypeKey, Vec<DependencyId>> = HashMap::new();
        let mut positions: HashMap<TypeKey, usize> = HashMap::new();
        let mut bindings = Vec::with_capacity(signature.params().len());

        for param in signature.params() {
            let element = param.ty();
            let requested = match (param.kind(), param.list_ty()) {
                (ParamKind::Positional, _) => element,
                (ParamKind::List, Some(list_ty)) if !config.aggregates(&element) => list_ty,
                (ParamKind::VarKeyword, _) => {
                    let entries = self.keywords(dependent, param.name(), element, scope, config)?;
                    bindings.push((param.name(), Binding::Keywords { element, entries }));
                    continue;
                }
                _ => {
                    let candidates = self.aggregate(element, scope, config);
                    trace!(
                        dependent = %dependent.label(),
                        param = param.name(),
                        count = candidates.len(),
                        "aggregated candidates"
                    );
                    bindings.push((param.name(), Binding::Many { element, candidates }));
                    continue;
                }
            };

            let pool = pools.entry(requested).or_insert_with(|| {
                self.tree
                    .candidate_pool(scope, |id| self.accepts(&requested, id))
            });
            let position = positions.entry(requested).or_default();
            let Some(candidate) = pool.get(*position).copied() else {
                return Err(WiringError::UnresolvedDependency {
                    requested: requested.name(),
                    parameter: param.name(),
                    dependent: dependent.label(),
                    searched: self.tree.visible_chain(scope),
                });
            };
            *position += 1;
            trace!(
                dependent = %dependent.label(),
                param = param.name(),
                candidate = %candidate,
                "bound parameter"
            );
            bindings.push((param.name(), Binding::Single { requested, candidate }));
        }
        Ok(bindings)
    }

    /// Collect the candidates of a multi-valued parameter.
    ///
    /// A dependency registered in several visible scopes is only counted once.
    pub(crate) fn aggregate(
        &self,
        element: TypeKey,
        scope: ScopeId,
        config: &EffectiveConfig,
    ) -> Vec<DependencyId> {
        let scopes = match config.aggregate_strategy() {
            AggregateStrategy::SelfScope => vec![scope],
            AggregateStrategy::Full => self.tree.visible_chain(scope),
        };
        let mut seen = HashSet::new();
        scopes
            .into_iter()
            .flat_map(|current| self.tree.node(current).dependencies.iter().copied())
            .filter(|id| self.accepts(&element, *id))
            .filter(|id| seen.insert(*id))
            .collect()
    }

    fn keywords(
        &self,
        dependent: &Dependency,
        param: &'static str,
        element: TypeKey,
        scope: ScopeId,
        config: &EffectiveConfig,
    ) -> Result<Vec<(String, DependencyId)>> {
        let mut keys = HashSet::new();
        self.aggregate(element, scope, config)
            .into_iter()
            .enumerate()
            .map(|(index, id)| {
                let key = config.key_for(param, index);
                if !keys.insert(key.clone()) {
                    return Err(WiringError::AmbiguousConfig(format!(
                        "keyword `{key}` generated twice for parameter `{param}` of {}",
                        dependent.label()
                    )));
                }
                Ok((key, id))
            })
            .collect()
    }
}
