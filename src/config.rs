//! Global configuration and per-dependency overrides.
//!
//! Both levels use the same [Config] shape where every field is optional. The configuration in
//! effect for a dependency is obtained with [Config::overlay]: each field is taken from the
//! override if present, then from the global configuration, then from the built-in default.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::descriptor::TypeKey;
use crate::resolve::WiringError;

/// Generate the key of an aggregated keyword argument from the parameter name and its index
pub type KeyNamingFn = Arc<dyn Fn(&str, usize) -> String + Send + Sync>;

/// Where aggregated candidates are collected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AggregateStrategy {
    /// Only the dependencies of the dependent's own scope
    #[default]
    SelfScope,
    /// All scopes of the visible chain, nearest first
    Full,
}

impl FromStr for AggregateStrategy {
    type Err = WiringError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "self_scope" => Ok(Self::SelfScope),
            "full" => Ok(Self::Full),
            other => Err(WiringError::AmbiguousConfig(format!(
                "unknown aggregate strategy `{other}`"
            ))),
        }
    }
}

impl fmt::Display for AggregateStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SelfScope => f.write_str("self_scope"),
            Self::Full => f.write_str("full"),
        }
    }
}

/// Partial configuration, used both globally and as a per-dependency override
#[derive(Clone, Default)]
pub struct Config {
    pub aggregate: Option<HashSet<TypeKey>>,
    pub aggregate_strategy: Option<AggregateStrategy>,
    pub kwarg_key_naming: Option<KeyNamingFn>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn aggregate(mut self, types: impl IntoIterator<Item = TypeKey>) -> Self {
        self.aggregate = Some(types.into_iter().collect());
        self
    }

    pub fn aggregate_strategy(mut self, strategy: AggregateStrategy) -> Self {
        self.aggregate_strategy = Some(strategy);
        self
    }

    /// Select the aggregate strategy from its literal name (`self_scope` or `full`).
    pub fn aggregate_strategy_named(self, name: &str) -> Result<Self, WiringError> {
        Ok(self.aggregate_strategy(name.parse()?))
    }

    pub fn kwarg_key_naming<F>(mut self, naming: F) -> Self
    where
        F: Fn(&str, usize) -> String + Send + Sync + 'static,
    {
        self.kwarg_key_naming = Some(Arc::new(naming));
        self
    }

    /// Compute the configuration in effect for a dependency.
    pub fn overlay(global: &Config, local: &Config) -> EffectiveConfig {
        let aggregate = local
            .aggregate
            .as_ref()
            .or(global.aggregate.as_ref())
            .cloned()
            .unwrap_or_else(|| HashSet::from([TypeKey::any()]));
        let aggregate_strategy = local
            .aggregate_strategy
            .or(global.aggregate_strategy)
            .unwrap_or_default();
        let naming: KeyNamingFn = match local
            .kwarg_key_naming
            .as_ref()
            .or(global.kwarg_key_naming.as_ref())
        {
            Some(naming) => naming.clone(),
            None => Arc::new(default_key_naming),
        };
        EffectiveConfig {
            aggregate,
            aggregate_strategy,
            naming,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("aggregate", &self.aggregate)
            .field("aggregate_strategy", &self.aggregate_strategy)
            .field("kwarg_key_naming", &self.kwarg_key_naming.is_some())
            .finish()
    }
}

fn default_key_naming(param: &str, index: usize) -> String {
    format!("{param}_{index}")
}

/// Fully resolved configuration of a dependency
#[derive(Clone)]
pub struct EffectiveConfig {
    aggregate: HashSet<TypeKey>,
    aggregate_strategy: AggregateStrategy,
    naming: KeyNamingFn,
}

impl EffectiveConfig {
    /// Check if list parameters of this element type are aggregated.
    pub fn aggregates(&self, element: &TypeKey) -> bool {
        self.aggregate.contains(element) || self.aggregate.contains(&TypeKey::any())
    }

    pub fn aggregate_strategy(&self) -> AggregateStrategy {
        self.aggregate_strategy
    }

    pub fn key_for(&self, param: &str, index: usize) -> String {
        (self.naming)(param, index)
    }
}

impl fmt::Debug for EffectiveConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectiveConfig")
            .field("aggregate", &self.aggregate)
            .field("aggregate_strategy", &self.aggregate_strategy)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Seat;

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let effective = Config::overlay(&Config::new(), &Config::new());
        assert_eq!(effective.aggregate_strategy(), AggregateStrategy::SelfScope);
        assert!(effective.aggregates(&TypeKey::of::<Seat>()));
        assert_eq!(effective.key_for("seats", 3), "seats_3");
    }

    #[test]
    fn override_wins_per_field() {
        let global = Config::new()
            .aggregate_strategy(AggregateStrategy::Full)
            .kwarg_key_naming(|param, index| format!("{param}-{index}"));
        let local = Config::new().aggregate([TypeKey::of::<Seat>()]);

        let effective = Config::overlay(&global, &local);
        assert_eq!(effective.aggregate_strategy(), AggregateStrategy::Full);
        assert_eq!(effective.key_for("seats", 0), "seats-0");
        assert!(effective.aggregates(&TypeKey::of::<Seat>()));
        assert!(!effective.aggregates(&TypeKey::of::<u32>()));

        let local = Config::new().aggregate_strategy(AggregateStrategy::SelfScope);
        let effective = Config::overlay(&global, &local);
        assert_eq!(effective.aggregate_strategy(), AggregateStrategy::SelfScope);
    }

    #[test]
    fn strategy_literals() {
        assert_eq!("full".parse::<AggregateStrategy>().unwrap(), AggregateStrategy::Full);
        assert_eq!(AggregateStrategy::SelfScope.to_string(), "self_scope");
        let err = Config::new().aggregate_strategy_named("everything").unwrap_err();
        assert!(matches!(err, WiringError::AmbiguousConfig(_)));
    }
}
