//! Provider descriptors and the typed surface for declaring them.
//!
//! A [Provider] is a type-erased callable producing the value of one [Key] from zero or more
//! argument keys. Providers are declared with ordinary functions or closures taking
//! [Dep]/[Lazy] parameters and returning an [Annotated] value (optionally inside a `Result`):
//!
//! ```
//! use annotated_inject::{Annotated, Annotation, Dep, Provider};
//!
//! struct Source;
//! impl Annotation for Source {}
//! struct Doubled;
//! impl Annotation for Doubled {}
//!
//! let provider = Provider::new(|value: Dep<i32, Source>| Annotated::<_, Doubled>::new(*value * 2));
//! assert!(!provider.is_cached());
//! ```
//!
//! The argument list and the output key are captured from the function signature at
//! construction time; the injector only ever sees the erased descriptor.

use crate::error::{InjectError, ProviderError};
use crate::injector::LazyHandle;
use crate::key::{Annotation, AnnotationPtr, InstanceAnyPtr, InstancePtr, Key, TypeInfo};
use derivative::Derivative;
use std::error::Error as StdError;
use std::marker::PhantomData;
use std::ops::Deref;
use std::sync::Arc;

/// Type-erased provider callable. Receives one resolved entry per declared argument, in
/// declaration order.
pub type ProviderFn =
    Arc<dyn Fn(Vec<ResolvedArg>) -> Result<InstanceAnyPtr, InjectError> + Send + Sync>;

/// How an argument is supplied to its provider.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ArgumentKind {
    /// Resolved before the provider runs.
    Eager,
    /// Supplied as a [Lazy] handle; resolved only when the provider invokes it.
    Lazy,
}

/// One required input of a provider.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Argument {
    pub key: Key,
    pub kind: ArgumentKind,
    /// The annotation type the provider was declared against, when the effective annotation was
    /// substituted by dynamic-annotation resolution or rewriting.
    pub original_annotation: Option<TypeInfo>,
}

impl Argument {
    pub(crate) fn eager(key: Key) -> Self {
        Self {
            key,
            kind: ArgumentKind::Eager,
            original_annotation: None,
        }
    }

    pub(crate) fn lazy(key: Key) -> Self {
        Self {
            key,
            kind: ArgumentKind::Lazy,
            original_annotation: None,
        }
    }
}

/// A resolved argument handed to a provider callable.
pub enum ResolvedArg {
    Value(InstanceAnyPtr),
    Deferred(LazyHandle),
}

#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub(crate) enum ProviderKind {
    Value {
        #[derivative(Debug = "ignore")]
        function: ProviderFn,
        output: Key,
        arguments: Vec<Argument>,
        has_error: bool,
    },
    Annotation {
        tag: TypeInfo,
        #[derivative(Debug = "ignore")]
        value: AnnotationPtr,
    },
}

/// Descriptor for a single provider, as produced by [Module::providers](crate::Module::providers).
#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct Provider {
    pub(crate) kind: ProviderKind,
    pub(crate) cached: bool,
}

impl Provider {
    /// Creates a provider from a function or closure whose parameters are [Dep]/[Lazy]
    /// dependencies and whose return type is [Annotated] or `Result<Annotated, E>`.
    pub fn new<Args, F>(function: F) -> Self
    where
        F: ProviderFunction<Args>,
    {
        Self {
            kind: ProviderKind::Value {
                output: F::output(),
                arguments: F::arguments(),
                has_error: F::fallible(),
                function: function.erase(),
            },
            cached: false,
        }
    }

    /// Declares a dynamic annotation provider: the given annotation value is substituted for
    /// the placeholder `Tag` wherever the module's other providers mention it.
    pub fn annotation<Tag: Annotation>(value: AnnotationPtr) -> Self {
        Self {
            kind: ProviderKind::Annotation {
                tag: TypeInfo::of::<Tag>(),
                value,
            },
            cached: false,
        }
    }

    /// Marks whether the provider's result is memoized for the lifetime of the injector.
    pub fn cached(mut self, cached: bool) -> Self {
        self.cached = cached;
        self
    }

    pub fn is_cached(&self) -> bool {
        self.cached
    }

    /// The key this provider produces; `None` for annotation providers.
    pub fn output(&self) -> Option<Key> {
        match &self.kind {
            ProviderKind::Value { output, .. } => Some(*output),
            ProviderKind::Annotation { .. } => None,
        }
    }

    pub fn arguments(&self) -> &[Argument] {
        match &self.kind {
            ProviderKind::Value { arguments, .. } => arguments,
            ProviderKind::Annotation { .. } => &[],
        }
    }

    pub(crate) fn from_parts(
        function: ProviderFn,
        output: Key,
        arguments: Vec<Argument>,
        has_error: bool,
    ) -> Self {
        Self {
            kind: ProviderKind::Value {
                function,
                output,
                arguments,
                has_error,
            },
            cached: false,
        }
    }
}

/// A provider's output value, paired with its annotation type. The annotation exists only at
/// the type level and is never materialized.
pub struct Annotated<T, A: Annotation> {
    value: T,
    _annotation: PhantomData<fn() -> A>,
}

impl<T, A: Annotation> Annotated<T, A> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            _annotation: PhantomData,
        }
    }

    pub fn into_inner(self) -> T {
        self.value
    }
}

/// An eagerly resolved dependency of a provider. Dereferences to the provided value.
pub struct Dep<T, A: Annotation> {
    value: InstancePtr<T>,
    _annotation: PhantomData<fn() -> A>,
}

impl<T, A: Annotation> Dep<T, A> {
    pub fn into_inner(self) -> InstancePtr<T> {
        self.value
    }
}

impl<T, A: Annotation> Clone for Dep<T, A> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
            _annotation: PhantomData,
        }
    }
}

impl<T, A: Annotation> Deref for Dep<T, A> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

/// A deferred dependency of a provider. The underlying key is resolved only when [Lazy::get]
/// is invoked, which must happen during the provider call that received the handle; invoking
/// it after that call has returned panics.
pub struct Lazy<T, A: Annotation> {
    handle: LazyHandle,
    _marker: PhantomData<fn() -> (T, A)>,
}

impl<T: Send + Sync + 'static, A: Annotation> Lazy<T, A> {
    /// Resolves the deferred key through the owning injector, applying the usual caching
    /// rules. Uncached targets are re-resolved on every invocation.
    pub fn get(&self) -> Result<InstancePtr<T>, InjectError> {
        self.handle
            .resolve()?
            .downcast()
            .map_err(|_| InjectError::IncompatibleValue {
                expected: TypeInfo::of::<T>(),
            })
    }
}

impl<T, A: Annotation> Clone for Lazy<T, A> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
            _marker: PhantomData,
        }
    }
}

/// A provider parameter: either an eager [Dep] or a deferred [Lazy] dependency.
pub trait DependencySpec: Sized + Send + 'static {
    fn argument() -> Argument;
    fn extract(resolved: ResolvedArg) -> Result<Self, InjectError>;
}

impl<T: Send + Sync + 'static, A: Annotation> DependencySpec for Dep<T, A> {
    fn argument() -> Argument {
        Argument::eager(Key::of::<T, A>())
    }

    fn extract(resolved: ResolvedArg) -> Result<Self, InjectError> {
        let mismatch = || InjectError::IncompatibleValue {
            expected: TypeInfo::of::<T>(),
        };
        match resolved {
            ResolvedArg::Value(value) => value
                .downcast()
                .map(|value| Dep {
                    value,
                    _annotation: PhantomData,
                })
                .map_err(|_| mismatch()),
            ResolvedArg::Deferred(_) => Err(mismatch()),
        }
    }
}

impl<T: Send + Sync + 'static, A: Annotation> DependencySpec for Lazy<T, A> {
    fn argument() -> Argument {
        Argument::lazy(Key::of::<T, A>())
    }

    fn extract(resolved: ResolvedArg) -> Result<Self, InjectError> {
        match resolved {
            ResolvedArg::Deferred(handle) => Ok(Lazy {
                handle,
                _marker: PhantomData,
            }),
            ResolvedArg::Value(_) => Err(InjectError::IncompatibleValue {
                expected: TypeInfo::of::<T>(),
            }),
        }
    }
}

/// A provider return type: an [Annotated] value, or a `Result` of one for fallible providers.
pub trait ProviderOutput: 'static {
    fn key() -> Key;
    fn fallible() -> bool;
    fn into_instance(self) -> Result<InstanceAnyPtr, InjectError>;
}

impl<T: Send + Sync + 'static, A: Annotation> ProviderOutput for Annotated<T, A> {
    fn key() -> Key {
        Key::of::<T, A>()
    }

    fn fallible() -> bool {
        false
    }

    fn into_instance(self) -> Result<InstanceAnyPtr, InjectError> {
        Ok(Arc::new(self.into_inner()))
    }
}

impl<T, A, E> ProviderOutput for Result<Annotated<T, A>, E>
where
    T: Send + Sync + 'static,
    A: Annotation,
    E: StdError + Send + Sync + 'static,
{
    fn key() -> Key {
        Key::of::<T, A>()
    }

    fn fallible() -> bool {
        true
    }

    fn into_instance(self) -> Result<InstanceAnyPtr, InjectError> {
        match self {
            Ok(annotated) => Ok(Arc::new(annotated.into_inner()) as InstanceAnyPtr),
            Err(error) => Err(InjectError::Provider(ProviderError::new(error))),
        }
    }
}

/// Implemented for functions usable as providers. The `Args` parameter is the tuple of
/// [DependencySpec] parameter types and exists purely to guide inference.
pub trait ProviderFunction<Args>: Send + Sync + 'static {
    fn output() -> Key;
    fn fallible() -> bool;
    fn arguments() -> Vec<Argument>;
    fn erase(self) -> ProviderFn;
}

macro_rules! impl_provider_function {
    ($($dep:ident),*) => {
        impl<Func, Out, $($dep),*> ProviderFunction<($($dep,)*)> for Func
        where
            Func: Fn($($dep),*) -> Out + Send + Sync + 'static,
            Out: ProviderOutput,
            $($dep: DependencySpec,)*
        {
            fn output() -> Key {
                Out::key()
            }

            fn fallible() -> bool {
                Out::fallible()
            }

            fn arguments() -> Vec<Argument> {
                vec![$($dep::argument()),*]
            }

            fn erase(self) -> ProviderFn {
                Arc::new(move |resolved: Vec<ResolvedArg>| {
                    #[allow(unused_mut, unused_variables)]
                    let mut resolved = resolved.into_iter();
                    let output = (self)($($dep::extract(
                        resolved
                            .next()
                            .expect("the registry supplies one resolved entry per argument"),
                    )?),*);
                    output.into_instance()
                })
            }
        }
    };
}

impl_provider_function!();
impl_provider_function!(D1);
impl_provider_function!(D1, D2);
impl_provider_function!(D1, D2, D3);
impl_provider_function!(D1, D2, D3, D4);
impl_provider_function!(D1, D2, D3, D4, D5);
impl_provider_function!(D1, D2, D3, D4, D5, D6);
impl_provider_function!(D1, D2, D3, D4, D5, D6, D7);
impl_provider_function!(D1, D2, D3, D4, D5, D6, D7, D8);
