use std::any::type_name;
use std::marker::PhantomData;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::debug;

use crate::config::Config;
use crate::descriptor::{
    construct_erased, wrap_factory, CastFn, ClassDescriptor, Constructible, Dependency,
    DependencyId, Strategy, TypeKey,
};
use crate::helpers::{Factory, Instance};
use crate::matcher::{NominalOracle, TypeOracle};
use crate::resolve::{Engine, ResolutionContext, Result, WiringError};
use crate::scope::{ScopeId, ScopeLayout, ScopeSpec, ScopeTree};

/// Dependency injection registry.
///
/// The injector owns the global configuration, every registered [Dependency] and the scope
/// forest. Declarations are added with [class](Injector::class), [value](Injector::value) and
/// [scope](Injector::scope), then [resolve](Injector::resolve) wires the graph starting at the
/// root dependency.
///
/// Each resolution run uses its own singleton cache: resolving twice constructs the singletons
/// twice, and concurrent runs never share instances.
pub struct Injector {
    config: Config,
    oracle: Box<dyn TypeOracle>,
    dependencies: Vec<Dependency>,
    scopes: ScopeTree,
    layout: OnceCell<ScopeLayout>,
}

impl Default for Injector {
    fn default() -> Self {
        Self::new()
    }
}

impl Injector {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            config,
            oracle: Box::new(NominalOracle),
            dependencies: Vec::new(),
            scopes: ScopeTree::default(),
            layout: OnceCell::new(),
        }
    }

    /// Replace the type compatibility rules used to select candidates.
    pub fn with_oracle(mut self, oracle: impl TypeOracle + 'static) -> Self {
        self.oracle = Box::new(oracle);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Start the declaration of a class-backed dependency.
    pub fn class<C: Constructible>(&mut self) -> ClassBuilder<'_, C> {
        ClassBuilder {
            injector: self,
            strategy: Strategy::default(),
            root: false,
            config: Config::default(),
            casts: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Register a value-backed dependency, injected as-is.
    pub fn value<T: Send + Sync + 'static>(&mut self, value: T) -> DependencyId {
        self.shared(Arc::new(value))
    }

    /// Register a shared value, possibly behind a trait object.
    pub fn shared<T: ?Sized + Send + Sync + 'static>(&mut self, value: Arc<T>) -> DependencyId {
        let id = DependencyId(self.dependencies.len());
        let ty = TypeKey::of::<T>();
        self.dependencies
            .push(Dependency::value(id, ty, Instance::new(value)));
        id
    }

    /// Declare a scope node.
    ///
    /// The listed child scopes must have been declared before and not be adopted yet.
    pub fn scope(&mut self, spec: ScopeSpec) -> Result<ScopeId> {
        let id = self.scopes.insert(spec, self.dependencies.len())?;
        self.layout = OnceCell::new();
        Ok(id)
    }

    pub fn dependency(&self, id: DependencyId) -> Option<&Dependency> {
        self.dependencies.get(id.0)
    }

    pub fn scope_parent(&self, id: ScopeId) -> Option<ScopeId> {
        self.scopes.get(id).and_then(|node| node.parent)
    }

    pub fn scope_children(&self, id: ScopeId) -> &[ScopeId] {
        self.scopes
            .get(id)
            .map(|node| node.children.as_slice())
            .unwrap_or_default()
    }

    /// Check the scope forest without constructing anything.
    pub fn validate(&self) -> Result<()> {
        self.layout().map(|_| ())
    }

    fn layout(&self) -> Result<&ScopeLayout> {
        self.layout
            .get_or_try_init(|| ScopeLayout::build(&self.scopes, &self.dependencies))
    }

    fn engine(&self) -> Result<Engine<'_>> {
        Ok(Engine {
            dependencies: &self.dependencies,
            tree: &self.scopes,
            layout: self.layout()?,
            oracle: self.oracle.as_ref(),
            global: &self.config,
        })
    }

    /// Wire the object graph from the root dependency.
    pub fn resolve(&self) -> Result<()> {
        self.resolve_root().map(|_| ())
    }

    /// Wire the object graph and return the root instance as a `T`.
    ///
    /// `T` is either the type of the root or one of the interfaces it provides
    /// (`Factory<C>` for a root using the factory strategy).
    pub fn resolve_as<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        let (root, instance) = self.resolve_root()?;
        let requested = TypeKey::of::<T>();
        self.dependencies[root.0]
            .view(&requested, instance)
            .downcast()
            .ok_or_else(|| WiringError::type_mismatch::<T>(self.dependencies[root.0].type_name()))
    }

    fn resolve_root(&self) -> Result<(DependencyId, Instance)> {
        let engine = self.engine()?;
        let root = engine.root()?;
        debug!(root = %self.dependencies[root.0].label(), "resolving");
        let mut ctx = ResolutionContext::default();
        let instance = engine.instantiate(root, &mut ctx)?;
        Ok((root, instance))
    }
}

/// Declaration of a class-backed dependency, see [Injector::class]
pub struct ClassBuilder<'a, C> {
    injector: &'a mut Injector,
    strategy: Strategy,
    root: bool,
    config: Config,
    casts: Vec<(TypeKey, CastFn)>,
    _marker: PhantomData<fn() -> C>,
}

impl<C: Constructible> ClassBuilder<'_, C> {
    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Mark this dependency as the entry point of the resolution.
    pub fn root(mut self) -> Self {
        self.root = true;
        self
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Make the dependency eligible for parameters of type `I`.
    ///
    /// Ignored with the [factory strategy](Strategy::Factory), where only `Factory<C>` is provided.
    pub fn provides<I>(mut self, cast: impl Fn(Arc<C>) -> Arc<I> + Send + Sync + 'static) -> Self
    where
        I: ?Sized + Send + Sync + 'static,
    {
        let cast: CastFn = Arc::new(move |instance: &Instance| {
            instance
                .downcast::<C>()
                .map(|concrete| Instance::new(cast(concrete)))
        });
        self.casts.push((TypeKey::of::<I>(), cast));
        self
    }

    pub fn register(self) -> DependencyId {
        let injector = self.injector;
        let id = DependencyId(injector.dependencies.len());
        let provided = match self.strategy {
            Strategy::Factory => vec![TypeKey::of::<Factory<C>>()],
            _ => std::iter::once(TypeKey::of::<C>())
                .chain(self.casts.iter().map(|(ty, _)| *ty))
                .collect(),
        };
        let class = ClassDescriptor {
            strategy: self.strategy,
            signature: C::signature(),
            config: self.config,
            construct: construct_erased::<C>,
            wrap_factory: wrap_factory::<C>,
            casts: self.casts,
            effective: OnceCell::new(),
        };
        injector.dependencies.push(Dependency::class(
            id,
            type_name::<C>(),
            self.root,
            provided,
            class,
        ));
        id
    }
}
