//! The injector resolves values from an immutable provider registry. Resolution is recursive:
//! a provider's eager arguments are resolved left to right before it runs, lazy arguments are
//! handed over as deferred handles valid for the duration of the call. Results of providers
//! marked cached are memoized per key, errors included.

use crate::error::{InjectError, RegistryError};
use crate::key::{Annotation, DynAnnotation, InstanceAnyPtr, InstancePtr, Key, TypeInfo};
use crate::module::{combine, ModulePtr};
use crate::provider::{ArgumentKind, ResolvedArg};
use crate::registry::ProviderRegistry;
use fxhash::FxHashMap;
use parking_lot::ReentrantMutex;
use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

type ResolutionCache = ReentrantMutex<RefCell<FxHashMap<Key, Result<InstanceAnyPtr, InjectError>>>>;

/// Creates an injector from the given modules. All registry validation happens here; a
/// returned injector can no longer fail for structural reasons, only for resolution ones.
pub fn injector_of(modules: impl IntoIterator<Item = ModulePtr>) -> Result<Injector, RegistryError> {
    let registry = ProviderRegistry::build(&combine(modules))?;
    debug!("injector created");

    Ok(Injector {
        core: Arc::new(InjectorCore {
            registry,
            cache: ReentrantMutex::new(RefCell::new(FxHashMap::default())),
        }),
    })
}

/// Cheaply cloneable handle to a resolution engine. Clones share the registry and the cache.
#[derive(Clone)]
pub struct Injector {
    core: Arc<InjectorCore>,
}

impl Injector {
    /// Resolves the value of type `T` under annotation `A`.
    pub fn get<T: Send + Sync + 'static, A: Annotation>(
        &self,
    ) -> Result<InstancePtr<T>, InjectError> {
        self.get_with_key(Key::of::<T, A>())
    }

    /// Resolves `T` under a runtime-chosen annotation.
    pub fn get_annotated<T: Send + Sync + 'static>(
        &self,
        annotation: &dyn DynAnnotation,
    ) -> Result<InstancePtr<T>, InjectError> {
        self.get_with_key(Key::new(TypeInfo::of::<T>(), annotation.annotation_type()))
    }

    /// Like [get](Injector::get), but panics on failure.
    pub fn must_get<T: Send + Sync + 'static, A: Annotation>(&self) -> InstancePtr<T> {
        self.get::<T, A>()
            .unwrap_or_else(|error| panic!("failed to provide value: {error}"))
    }

    fn get_with_key<T: Send + Sync + 'static>(
        &self,
        key: Key,
    ) -> Result<InstancePtr<T>, InjectError> {
        // the reentrant guard serializes the whole resolution, nested acquisitions included
        let _guard = self.core.cache.lock();
        InjectorCore::resolve_cached(&self.core, key)?
            .downcast()
            .map_err(|_| InjectError::IncompatibleValue {
                expected: TypeInfo::of::<T>(),
            })
    }
}

struct InjectorCore {
    registry: ProviderRegistry,
    cache: ResolutionCache,
}

impl InjectorCore {
    fn resolve_cached(core: &Arc<Self>, key: Key) -> Result<InstanceAnyPtr, InjectError> {
        let cached = core
            .registry
            .get(&key)
            .map(|provider| provider.cached)
            .unwrap_or(false);
        if !cached {
            return Self::resolve(core, key);
        }

        {
            let guard = core.cache.lock();
            let cache = guard.borrow();
            if let Some(result) = cache.get(&key) {
                trace!(key = %key, "cache hit");
                return result.clone();
            }
        }

        // the RefCell borrow is never held across provider invocations
        let result = Self::resolve(core, key);
        let guard = core.cache.lock();
        guard.borrow_mut().insert(key, result.clone());
        result
    }

    fn resolve(core: &Arc<Self>, key: Key) -> Result<InstanceAnyPtr, InjectError> {
        let Some(provider) = core.registry.get(&key) else {
            return Err(InjectError::NoProviderFound.wrap(key));
        };

        trace!(key = %key, arguments = provider.arguments.len(), fallible = provider.has_error, "resolving");

        let live = Arc::new(AtomicBool::new(true));
        let mut resolved = Vec::with_capacity(provider.arguments.len());
        for argument in &provider.arguments {
            match argument.kind {
                ArgumentKind::Eager => resolved.push(ResolvedArg::Value(
                    Self::resolve_cached(core, argument.key).map_err(|error| error.wrap(key))?,
                )),
                ArgumentKind::Lazy => resolved.push(ResolvedArg::Deferred(LazyHandle {
                    core: Arc::clone(core),
                    live: Arc::clone(&live),
                    key: argument.key,
                })),
            }
        }

        let result = (provider.function)(resolved);
        live.store(false, Ordering::Release);
        result.map_err(|error| error.wrap(key))
    }
}

/// Deferred resolution handle backing [Lazy](crate::Lazy) arguments. Valid only while the
/// provider call that received it is running.
#[derive(Clone)]
pub struct LazyHandle {
    core: Arc<InjectorCore>,
    live: Arc<AtomicBool>,
    key: Key,
}

impl LazyHandle {
    pub(crate) fn resolve(&self) -> Result<InstanceAnyPtr, InjectError> {
        if !self.live.load(Ordering::Acquire) {
            panic!(
                "lazy dependency on {} invoked after its provider call returned",
                self.key
            );
        }

        let _guard = self.core.cache.lock();
        InjectorCore::resolve_cached(&self.core, self.key)
    }
}
