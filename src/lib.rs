//! Runtime dependency injection keyed by value type plus annotation type.
//!
//! Providers are plain functions or closures grouped into [modules](Module); an
//! [Injector](crate::Injector) built from a module tree resolves any value the providers can
//! produce, memoizing the results of providers marked cached. Annotations are zero-sized
//! marker types distinguishing several providers of one value type.
//!
//! ```
//! use annotated_inject::{
//!     injector_of, module, Annotated, Annotation, Dep, Module, Provider, RegistryError,
//! };
//!
//! struct Endpoint;
//! impl Annotation for Endpoint {}
//!
//! struct Greeting;
//! impl Annotation for Greeting {}
//!
//! struct GreeterModule;
//!
//! impl Module for GreeterModule {
//!     fn providers(&self) -> Result<Vec<Provider>, RegistryError> {
//!         Ok(vec![
//!             Provider::new(|| Annotated::<_, Endpoint>::new("localhost".to_string())),
//!             Provider::new(|endpoint: Dep<String, Endpoint>| {
//!                 Annotated::<_, Greeting>::new(format!("hello, {}", *endpoint))
//!             }),
//!         ])
//!     }
//! }
//!
//! # fn main() -> Result<(), RegistryError> {
//! let injector = injector_of([module(GreeterModule)])?;
//! let greeting = injector.must_get::<String, Greeting>();
//! assert_eq!(*greeting, "hello, localhost");
//! # Ok(())
//! # }
//! ```
//!
//! Beyond hand-written providers, the crate supports field-wise assembly of structs
//! ([AutoInjectModule]), annotation values chosen at runtime ([Provider::annotation]),
//! remapping the annotations of a whole module tree ([rewrite_annotations]), and deferred
//! dependencies ([Lazy]) resolved only if the consuming provider asks for them.

pub mod auto_inject;
pub mod error;
pub mod injector;
pub mod key;
pub mod module;
pub mod provider;
pub mod registry;
pub mod rewrite;

pub use auto_inject::{Auto, AutoInjectModule, AutoInjectable, Field, FieldAnnotations, FieldValues};
pub use error::{InjectError, ProviderError, RegistryError};
pub use injector::{injector_of, Injector};
pub use key::{
    Annotation, AnnotationPtr, DynAnnotation, InstanceAnyPtr, InstancePtr, Key, TypeInfo,
};
pub use module::{check_module, combine, module, Module, ModulePtr};
pub use provider::{Annotated, Argument, ArgumentKind, Dep, Lazy, Provider, ResolvedArg};
pub use registry::providers_of;
pub use rewrite::{rewrite_annotations, AnnotationRewrite};
