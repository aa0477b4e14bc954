//! The resolution engine and the errors raised while wiring.
//!
//! Resolution is a synchronous depth-first traversal starting at the unique root dependency.
//! Each class-backed dependency is resolved in its own resolution scope (see [ScopeLayout]),
//! regardless of the scope in which it was found as a candidate.
//!
//! All transient state lives in a [ResolutionContext] created for each run and dropped at the
//! end: a failed run leaves no singleton behind.

use std::any::type_name;
use std::collections::HashMap;
use std::error::Error as StdError;

use thiserror::Error;
use tracing::{debug, trace};

use crate::config::{Config, EffectiveConfig};
use crate::descriptor::{
    ClassDescriptor, Dependency, DependencyId, DependencyKind, Strategy, TypeKey,
};
use crate::helpers::{Argument, Arguments, Instance};
use crate::matcher::{Binding, Matcher, TypeOracle};
use crate::scope::{ScopeId, ScopeLayout, ScopeTree};

/// Errors triggered during the autowiring process
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum WiringError {
    #[error("Invalid scope graph: {0}")]
    InvalidScopeGraph(String),
    #[error("No root dependency defined")]
    NoRootDefined,
    #[error("Multiple root dependencies defined: {}", .0.join(", "))]
    MultipleRootsDefined(Vec<String>),
    #[error("Unresolved dependency: no `{requested}` for parameter `{parameter}` of {dependent} (searched {})", display_path(.searched))]
    UnresolvedDependency {
        requested: &'static str,
        parameter: &'static str,
        dependent: String,
        searched: Vec<ScopeId>,
    },
    #[error("Circular dependency: {}", .0.join(" -> "))]
    CircularDependency(Vec<String>),
    #[error("Ambiguous configuration: {0}")]
    AmbiguousConfig(String),
    #[error("Missing argument `{0}`")]
    MissingArgument(String),
    #[error("Argument `{parameter}` is not a `{expected}`")]
    TypeMismatch {
        parameter: String,
        expected: &'static str,
    },
    #[error("Failed to construct `{type_name}`: {source}")]
    Construction {
        type_name: &'static str,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl WiringError {
    pub fn type_mismatch<T: ?Sized>(parameter: &str) -> Self {
        Self::TypeMismatch {
            parameter: parameter.to_string(),
            expected: type_name::<T>(),
        }
    }

    /// Wrap an error raised by the constructor of `C`.
    pub fn construction<C: ?Sized>(err: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self::Construction {
            type_name: type_name::<C>(),
            source: err.into(),
        }
    }
}

fn display_path(path: &[ScopeId]) -> String {
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// [`Result`] alias with [`WiringError`] as the default error type.
pub type Result<T, E = WiringError> = core::result::Result<T, E>;

/// Transient state of one resolution run
#[derive(Default)]
pub(crate) struct ResolutionContext {
    singletons: HashMap<DependencyId, Instance>,
    in_progress: Vec<DependencyId>,
}

/// Read-only view on the declared graph used during one run
pub(crate) struct Engine<'a> {
    pub(crate) dependencies: &'a [Dependency],
    pub(crate) tree: &'a ScopeTree,
    pub(crate) layout: &'a ScopeLayout,
    pub(crate) oracle: &'a dyn TypeOracle,
    pub(crate) global: &'a Config,
}

impl Engine<'_> {
    /// Find the unique root dependency.
    pub(crate) fn root(&self) -> Result<DependencyId> {
        let roots: Vec<_> = self.dependencies.iter().filter(|d| d.is_root()).collect();
        match roots.as_slice() {
            [] => Err(WiringError::NoRootDefined),
            [root] => Ok(root.id()),
            _ => Err(WiringError::MultipleRootsDefined(
                roots.iter().map(|d| d.label()).collect(),
            )),
        }
    }

    /// Produce an instance of a dependency according to its strategy.
    pub(crate) fn instantiate(
        &self,
        id: DependencyId,
        ctx: &mut ResolutionContext,
    ) -> Result<Instance> {
        let dependency = &self.dependencies[id.0];
        let class = match &dependency.kind {
            DependencyKind::Value(value) => return Ok(value.clone()),
            DependencyKind::Class(class) => class,
        };

        match class.strategy {
            Strategy::Singleton => {
                if let Some(instance) = ctx.singletons.get(&id) {
                    trace!(dependency = %dependency.label(), "reusing singleton");
                    return Ok(instance.clone());
                }
                let args = self.arguments(dependency, class, ctx)?;
                let instance = (class.construct)(&args)?;
                debug!(dependency = %dependency.label(), "constructed singleton");
                ctx.singletons.insert(id, instance.clone());
                Ok(instance)
            }
            Strategy::Instances => {
                let args = self.arguments(dependency, class, ctx)?;
                trace!(dependency = %dependency.label(), "constructing instance");
                (class.construct)(&args)
            }
            Strategy::Factory => {
                let args = self.arguments(dependency, class, ctx)?;
                trace!(dependency = %dependency.label(), "wrapping factory");
                Ok((class.wrap_factory)(args))
            }
        }
    }

    fn effective_config<'c>(&self, class: &'c ClassDescriptor) -> &'c EffectiveConfig {
        class
            .effective
            .get_or_init(|| Config::overlay(self.global, &class.config))
    }

    /// Resolve the arguments of a class-backed dependency in its resolution scope.
    fn arguments(
        &self,
        dependency: &Dependency,
        class: &ClassDescriptor,
        ctx: &mut ResolutionContext,
    ) -> Result<Arguments> {
        let id = dependency.id();
        if let Some(start) = ctx.in_progress.iter().position(|p| *p == id) {
            let chain = ctx.in_progress[start..]
                .iter()
                .chain(Some(&id))
                .map(|p| self.dependencies[p.0].label())
                .collect();
            return Err(WiringError::CircularDependency(chain));
        }

        let scope = self.layout.resolution_scope(id).ok_or_else(|| {
            WiringError::InvalidScopeGraph(format!(
                "{} is not registered in any scope",
                dependency.label()
            ))
        })?;
        let matcher = Matcher {
            tree: self.tree,
            dependencies: self.dependencies,
            oracle: self.oracle,
        };
        let bindings = matcher.bind(
            dependency,
            &class.signature,
            scope,
            self.effective_config(class),
        )?;

        ctx.in_progress.push(id);
        let mut args = Arguments::new();
        for (name, binding) in bindings {
            let argument = match binding {
                Binding::Single {
                    requested,
                    candidate,
                } => Argument::Single(self.bound(candidate, &requested, ctx)?),
                Binding::Many {
                    element,
                    candidates,
                } => Argument::Many(
                    candidates
                        .into_iter()
                        .map(|candidate| self.bound(candidate, &element, ctx))
                        .collect::<Result<_>>()?,
                ),
                Binding::Keywords { element, entries } => Argument::Keywords(
                    entries
                        .into_iter()
                        .map(|(key, candidate)| -> Result<_> {
                            Ok((key, self.bound(candidate, &element, ctx)?))
                        })
                        .collect::<Result<_>>()?,
                ),
            };
            args.insert(name, argument);
        }
        ctx.in_progress.pop();
        Ok(args)
    }

    fn bound(
        &self,
        candidate: DependencyId,
        requested: &TypeKey,
        ctx: &mut ResolutionContext,
    ) -> Result<Instance> {
        let instance = self.instantiate(candidate, ctx)?;
        Ok(self.dependencies[candidate.0].view(requested, instance))
    }
}
