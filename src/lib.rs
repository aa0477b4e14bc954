//! Constructor injection over a tree of scopes.
//!
//! # Simple use case
//!
//! ```
//! # use std::sync::Arc;
//! # use scopewire::*;
//! // Define traits and implementors
//! trait Greeter: Send + Sync {
//!     fn greet(&self) -> String;
//! }
//!
//! struct English;
//!
//! impl Greeter for English {
//!     fn greet(&self) -> String {
//!         "Hello world".to_string()
//!     }
//! }
//!
//! // Describe how to build them
//! impl Constructible for English {
//!     fn signature() -> Signature {
//!         Signature::new()
//!     }
//!
//!     fn construct(_: &Arguments) -> Result<Self> {
//!         Ok(English)
//!     }
//! }
//!
//! struct App {
//!     greeter: Arc<dyn Greeter>,
//! }
//!
//! impl Constructible for App {
//!     fn signature() -> Signature {
//!         Signature::new().positional::<dyn Greeter>("greeter")
//!     }
//!
//!     fn construct(args: &Arguments) -> Result<Self> {
//!         Ok(App {
//!             greeter: args.get("greeter")?,
//!         })
//!     }
//! }
//!
//! # fn main() -> Result<(), WiringError> {
//! // Register the dependencies in a scope and wire the graph from the root
//! let mut injector = Injector::new();
//! let english = injector.class::<English>().provides::<dyn Greeter>(|e| e).register();
//! let app = injector.class::<App>().root().register();
//! injector.scope(ScopeSpec::new().dependencies([english, app]))?;
//!
//! let app: Arc<App> = injector.resolve_as()?;
//! assert_eq!(app.greeter.greet(), "Hello world");
//! # Ok(())
//! # }
//! ```
//!
//! # Mechanism
//!
//! Every registered [Dependency] has an opaque [DependencyId] and is placed in one or more scopes.
//! A scope sees its own dependencies and those of its ancestors, the nearest scope winning.
//!
//! * A class-backed dependency implements [Constructible]: its [Signature] lists the parameters
//!   to bind, and each parameter is matched against the dependencies visible from the scope in
//!   which the class is resolved (its *resolution scope*).
//! * Same-typed single parameters are matched 1:1 in registration order.
//! * List and variadic parameters aggregate all matches, following the effective [Config]
//!   of the dependent.
//! * The [Strategy] decides whether a class is shared during a run, built again for every
//!   request, or injected as a [Factory] holding its resolved arguments.
//!
//! Which candidate matches which requested type is decided by a [TypeOracle], by default the
//! [NominalOracle] using the type tags declared at registration.

mod config;
mod descriptor;
mod helpers;
mod inject;
mod matcher;
mod resolve;
mod scope;

pub use config::{AggregateStrategy, Config, EffectiveConfig, KeyNamingFn};
pub use descriptor::{
    AnyType, Constructible, Dependency, DependencyId, Param, ParamKind, Signature, Strategy,
    TypeKey,
};
pub use helpers::{Argument, Arguments, Factory, Instance};
pub use inject::{ClassBuilder, Injector};
pub use matcher::{NominalOracle, TypeOracle};
pub use resolve::{Result, WiringError};
pub use scope::{ScopeId, ScopeSpec};
