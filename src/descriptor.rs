//! Descriptors for dependencies, their constructors and their type tags.
//!
//! A [Dependency] is created once by the [Injector](crate::Injector) and never changes afterwards.
//! It is either backed by a [Constructible] type, whose parameters are resolved recursively,
//! or by a ready-made value which is injected as-is.
//!
//! Types are never inspected at runtime beyond their [TypeId]: each dependency carries the list of
//! [TypeKey] tags it can be bound to, computed at registration time.

use std::any::{type_name, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::config::{Config, EffectiveConfig};
use crate::helpers::{Arguments, Factory, Instance};
use crate::resolve::Result;

/// Registration-time type tag.
///
/// Equality and hashing only use the [TypeId], the name is kept for diagnostics.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    /// The generic "any type" marker, see [AnyType].
    pub fn any() -> Self {
        Self::of::<AnyType>()
    }

    pub fn is_any(&self) -> bool {
        self.id == TypeId::of::<AnyType>()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Marker type matching any candidate.
///
/// Requesting a parameter of this type accepts every visible dependency, and listing it in
/// [Config::aggregate] enables aggregation for all element types.
pub enum AnyType {}

/// How a constructor parameter consumes its candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// A single value, matched 1:1 with same-typed siblings
    Positional,
    /// A `Vec<Arc<T>>`, aggregated when the element type is listed in the aggregate set
    List,
    /// Variadic tail, always aggregated
    VarPositional,
    /// Variadic mapping, always aggregated under generated keys
    VarKeyword,
}

/// Descriptor of a single constructor parameter
#[derive(Debug, Clone)]
pub struct Param {
    name: &'static str,
    ty: TypeKey,
    list_ty: Option<TypeKey>,
    kind: ParamKind,
}

impl Param {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The requested type, or the element type for multi-valued parameters.
    pub fn ty(&self) -> TypeKey {
        self.ty
    }

    pub fn kind(&self) -> ParamKind {
        self.kind
    }

    /// The literal `Vec<Arc<T>>` type of a list parameter.
    pub fn list_ty(&self) -> Option<TypeKey> {
        self.list_ty
    }
}

/// Ordered parameter list of a constructor.
#[derive(Debug, Clone, Default)]
pub struct Signature(Vec<Param>);

impl Signature {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn positional<T: ?Sized + 'static>(self, name: &'static str) -> Self {
        self.with(name, TypeKey::of::<T>(), None, ParamKind::Positional)
    }

    pub fn list<T: ?Sized + 'static>(self, name: &'static str) -> Self {
        let list_ty = Some(TypeKey::of::<Vec<Arc<T>>>());
        self.with(name, TypeKey::of::<T>(), list_ty, ParamKind::List)
    }

    pub fn var_positional<T: ?Sized + 'static>(self, name: &'static str) -> Self {
        self.with(name, TypeKey::of::<T>(), None, ParamKind::VarPositional)
    }

    pub fn var_keyword<T: ?Sized + 'static>(self, name: &'static str) -> Self {
        self.with(name, TypeKey::of::<T>(), None, ParamKind::VarKeyword)
    }

    fn with(
        mut self,
        name: &'static str,
        ty: TypeKey,
        list_ty: Option<TypeKey>,
        kind: ParamKind,
    ) -> Self {
        self.0.push(Param {
            name,
            ty,
            list_ty,
            kind,
        });
        self
    }

    pub fn params(&self) -> &[Param] {
        &self.0
    }
}

/// A type that can be built from resolved arguments.
///
/// The [signature](Constructible::signature) is read once when the type is registered,
/// then [construct](Constructible::construct) receives one bound argument per parameter.
pub trait Constructible: Send + Sync + Sized + 'static {
    fn signature() -> Signature;

    fn construct(args: &Arguments) -> Result<Self>;
}

/// Instantiation strategy of a class-backed dependency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Constructed once per resolution run and shared
    #[default]
    Singleton,
    /// Constructed again every time it is requested
    Instances,
    /// Injected as a [Factory] wrapper holding the resolved arguments
    Factory,
}

/// Opaque identity of a registered dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DependencyId(pub(crate) usize);

impl fmt::Display for DependencyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub(crate) type CastFn = Arc<dyn Fn(&Instance) -> Option<Instance> + Send + Sync>;

pub(crate) struct ClassDescriptor {
    pub(crate) strategy: Strategy,
    pub(crate) signature: Signature,
    pub(crate) config: Config,
    pub(crate) construct: fn(&Arguments) -> Result<Instance>,
    pub(crate) wrap_factory: fn(Arguments) -> Instance,
    pub(crate) casts: Vec<(TypeKey, CastFn)>,
    pub(crate) effective: OnceCell<EffectiveConfig>,
}

pub(crate) enum DependencyKind {
    Class(ClassDescriptor),
    Value(Instance),
}

/// An immutable dependency descriptor
pub struct Dependency {
    id: DependencyId,
    type_name: &'static str,
    root: bool,
    provided: Vec<TypeKey>,
    pub(crate) kind: DependencyKind,
}

impl Dependency {
    pub(crate) fn class(
        id: DependencyId,
        type_name: &'static str,
        root: bool,
        provided: Vec<TypeKey>,
        class: ClassDescriptor,
    ) -> Self {
        Self {
            id,
            type_name,
            root,
            provided,
            kind: DependencyKind::Class(class),
        }
    }

    pub(crate) fn value(id: DependencyId, ty: TypeKey, value: Instance) -> Self {
        Self {
            id,
            type_name: ty.name(),
            root: false,
            provided: vec![ty],
            kind: DependencyKind::Value(value),
        }
    }

    pub fn id(&self) -> DependencyId {
        self.id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn is_root(&self) -> bool {
        self.root
    }

    pub fn is_class(&self) -> bool {
        matches!(self.kind, DependencyKind::Class(_))
    }

    /// The instantiation strategy, `None` for value-backed dependencies.
    pub fn strategy(&self) -> Option<Strategy> {
        match &self.kind {
            DependencyKind::Class(class) => Some(class.strategy),
            DependencyKind::Value(_) => None,
        }
    }

    /// The type tags this dependency can be bound to, its own type first.
    pub fn provided_types(&self) -> &[TypeKey] {
        &self.provided
    }

    pub fn provides(&self, ty: &TypeKey) -> bool {
        self.provided.contains(ty)
    }

    /// Adapt a produced instance to the requested type.
    ///
    /// Instances are stored under the dependency's own type; interfaces registered with a cast
    /// are converted here. Requests that match without a cast (e.g. [AnyType]) get the raw instance.
    pub(crate) fn view(&self, requested: &TypeKey, instance: Instance) -> Instance {
        if let DependencyKind::Class(class) = &self.kind {
            if let Some((_, cast)) = class.casts.iter().find(|(ty, _)| ty == requested) {
                if let Some(cast) = cast(&instance) {
                    return cast;
                }
            }
        }
        instance
    }

    pub(crate) fn label(&self) -> String {
        format!("{}{}", self.type_name, self.id)
    }
}

impl fmt::Debug for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dependency")
            .field("id", &self.id)
            .field("type_name", &self.type_name)
            .field("root", &self.root)
            .field("strategy", &self.strategy())
            .finish_non_exhaustive()
    }
}

pub(crate) fn construct_erased<C: Constructible>(args: &Arguments) -> Result<Instance> {
    let instance = C::construct(args)?;
    Ok(Instance::new(Arc::new(instance)))
}

pub(crate) fn wrap_factory<C: Constructible>(args: Arguments) -> Instance {
    Instance::new(Arc::new(Factory::<C>::new(args)))
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Shape: Send + Sync {}

    #[test]
    fn type_keys_compare_by_id() {
        assert_eq!(TypeKey::of::<String>(), TypeKey::of::<String>());
        assert_ne!(TypeKey::of::<String>(), TypeKey::of::<&'static str>());
        assert_ne!(TypeKey::of::<dyn Shape>(), TypeKey::of::<Arc<dyn Shape>>());
        assert!(TypeKey::any().is_any());
        assert!(!TypeKey::of::<u32>().is_any());
    }

    #[test]
    fn signature_keeps_declaration_order() {
        let signature = Signature::new()
            .positional::<u32>("left")
            .list::<dyn Shape>("shapes")
            .var_keyword::<String>("rest");

        let names: Vec<_> = signature.params().iter().map(Param::name).collect();
        assert_eq!(names, ["left", "shapes", "rest"]);

        let shapes = &signature.params()[1];
        assert_eq!(shapes.kind(), ParamKind::List);
        assert_eq!(shapes.ty(), TypeKey::of::<dyn Shape>());
        assert_eq!(shapes.list_ty(), Some(TypeKey::of::<Vec<Arc<dyn Shape>>>()));
        assert_eq!(signature.params()[0].list_ty(), None);
    }
}
