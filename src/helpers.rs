use std::any::{type_name, Any};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::descriptor::Constructible;
use crate::resolve::{Result, WiringError};

/// Type-erased shared instance.
///
/// The wrapped value is always an `Arc<T>`, so that trait objects (`Arc<dyn Trait>`)
/// and concrete types can be stored and shared the same way.
#[derive(Clone)]
pub struct Instance {
    inner: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl Instance {
    pub fn new<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> Self {
        Self {
            inner: Arc::new(value),
            type_name: type_name::<T>(),
        }
    }

    /// Retrieve the shared value if it was stored as an `Arc<T>`.
    pub fn downcast<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.inner.downcast_ref::<Arc<T>>().cloned()
    }

    pub fn is<T: ?Sized + Send + Sync + 'static>(&self) -> bool {
        self.inner.is::<Arc<T>>()
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Instance").field(&self.type_name).finish()
    }
}

/// Value bound to a single parameter
#[derive(Debug, Clone)]
pub enum Argument {
    Single(Instance),
    Many(Vec<Instance>),
    Keywords(Vec<(String, Instance)>),
}

/// Arguments bound to the parameters of a constructor, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct Arguments {
    entries: Vec<(&'static str, Argument)>,
}

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a single value, replacing any previous binding with the same name.
    pub fn with<T: ?Sized + Send + Sync + 'static>(self, name: &'static str, value: Arc<T>) -> Self {
        self.with_argument(name, Argument::Single(Instance::new(value)))
    }

    pub fn with_list<T: ?Sized + Send + Sync + 'static>(
        self,
        name: &'static str,
        values: impl IntoIterator<Item = Arc<T>>,
    ) -> Self {
        let values = values.into_iter().map(Instance::new).collect();
        self.with_argument(name, Argument::Many(values))
    }

    pub fn with_keywords<T: ?Sized + Send + Sync + 'static>(
        self,
        name: &'static str,
        values: impl IntoIterator<Item = (String, Arc<T>)>,
    ) -> Self {
        let values = values
            .into_iter()
            .map(|(key, value)| (key, Instance::new(value)))
            .collect();
        self.with_argument(name, Argument::Keywords(values))
    }

    pub fn with_argument(mut self, name: &'static str, argument: Argument) -> Self {
        self.insert(name, argument);
        self
    }

    pub(crate) fn insert(&mut self, name: &'static str, argument: Argument) {
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = argument,
            None => self.entries.push((name, argument)),
        }
    }

    pub fn argument(&self, name: &str) -> Option<&Argument> {
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, argument)| argument)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(name, _)| *name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn require(&self, name: &str) -> Result<&Argument> {
        self.argument(name)
            .ok_or_else(|| WiringError::MissingArgument(name.to_string()))
    }

    /// Retrieve a single value.
    pub fn get<T: ?Sized + Send + Sync + 'static>(&self, name: &str) -> Result<Arc<T>> {
        match self.require(name)? {
            Argument::Single(instance) => instance
                .downcast()
                .ok_or_else(|| WiringError::type_mismatch::<T>(name)),
            _ => Err(WiringError::type_mismatch::<T>(name)),
        }
    }

    /// Retrieve the values of a list or variadic parameter.
    ///
    /// A list parameter bound to a single `Vec<Arc<T>>` dependency yields its content.
    pub fn list<T: ?Sized + Send + Sync + 'static>(&self, name: &str) -> Result<Vec<Arc<T>>> {
        match self.require(name)? {
            Argument::Many(values) => values
                .iter()
                .map(|value| value.downcast::<T>())
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| WiringError::type_mismatch::<T>(name)),
            Argument::Single(instance) => instance
                .downcast::<Vec<Arc<T>>>()
                .map(|values| values.as_ref().clone())
                .ok_or_else(|| WiringError::type_mismatch::<Vec<Arc<T>>>(name)),
            Argument::Keywords(_) => Err(WiringError::type_mismatch::<T>(name)),
        }
    }

    /// Retrieve the entries of a variadic keyword parameter, in aggregation order.
    pub fn keywords<T: ?Sized + Send + Sync + 'static>(
        &self,
        name: &str,
    ) -> Result<Vec<(String, Arc<T>)>> {
        match self.require(name)? {
            Argument::Keywords(entries) => entries
                .iter()
                .map(|(key, value)| value.downcast::<T>().map(|value| (key.clone(), value)))
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| WiringError::type_mismatch::<T>(name)),
            _ => Err(WiringError::type_mismatch::<T>(name)),
        }
    }
}

/// Partially applied constructor produced by the [Factory](crate::Strategy::Factory) strategy.
///
/// The arguments resolved during wiring are kept as defaults, explicit arguments override
/// them by parameter name.
pub struct Factory<C> {
    defaults: Arguments,
    _marker: PhantomData<fn() -> C>,
}

impl<C: Constructible> Factory<C> {
    pub(crate) fn new(defaults: Arguments) -> Self {
        Self {
            defaults,
            _marker: PhantomData,
        }
    }

    pub fn defaults(&self) -> &Arguments {
        &self.defaults
    }

    pub fn create(&self) -> Result<C> {
        C::construct(&self.defaults)
    }

    pub fn create_with(&self, overrides: Arguments) -> Result<C> {
        let mut args = self.defaults.clone();
        for (name, argument) in overrides.entries {
            args.insert(name, argument);
        }
        C::construct(&args)
    }
}

impl<C> fmt::Debug for Factory<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Factory")
            .field("target", &type_name::<C>())
            .field("defaults", &self.defaults)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Named: Send + Sync {
        fn name(&self) -> &str;
    }

    struct Label(&'static str);

    impl Named for Label {
        fn name(&self) -> &str {
            self.0
        }
    }

    #[test]
    fn instance_keeps_shared_identity() {
        let label = Arc::new(Label("a"));
        let instance = Instance::new(label.clone());
        let got: Arc<Label> = instance.downcast().unwrap();
        assert!(Arc::ptr_eq(&label, &got));
        assert!(instance.downcast::<String>().is_none());
    }

    #[test]
    fn instance_stores_trait_objects() {
        let named: Arc<dyn Named> = Arc::new(Label("b"));
        let instance = Instance::new(named);
        assert!(instance.is::<dyn Named>());
        assert!(!instance.is::<Label>());
        assert_eq!(instance.downcast::<dyn Named>().unwrap().name(), "b");
    }

    #[test]
    fn arguments_accessors() {
        let args = Arguments::new()
            .with("count", Arc::new(3u32))
            .with_list("labels", [Arc::new(Label("x")), Arc::new(Label("y"))])
            .with_keywords("extra", [("extra_0".to_string(), Arc::new(1u8))]);

        assert_eq!(*args.get::<u32>("count").unwrap(), 3);
        assert_eq!(args.list::<Label>("labels").unwrap().len(), 2);
        let extra = args.keywords::<u8>("extra").unwrap();
        assert_eq!(extra[0].0, "extra_0");
        assert_eq!(args.names().collect::<Vec<_>>(), ["count", "labels", "extra"]);

        assert!(matches!(
            args.get::<u8>("count"),
            Err(WiringError::TypeMismatch { .. })
        ));
        assert!(matches!(
            args.get::<u32>("missing"),
            Err(WiringError::MissingArgument(_))
        ));
    }

    #[test]
    fn list_accepts_a_literal_vector() {
        let values: Vec<Arc<u32>> = vec![Arc::new(1), Arc::new(2)];
        let args = Arguments::new().with("numbers", Arc::new(values));
        let got = args.list::<u32>("numbers").unwrap();
        assert_eq!(got.iter().map(|v| **v).collect::<Vec<_>>(), [1, 2]);
    }

    #[test]
    fn overrides_replace_by_name() {
        let args = Arguments::new()
            .with("a", Arc::new(1u32))
            .with("b", Arc::new(2u32))
            .with("a", Arc::new(10u32));
        assert_eq!(args.len(), 2);
        assert_eq!(*args.get::<u32>("a").unwrap(), 10);
    }
}
