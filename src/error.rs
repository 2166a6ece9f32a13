use crate::key::{Key, TypeInfo};
use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;
use thiserror::Error;

/// Errors related to building a provider registry from modules.
#[derive(Error, Clone, PartialEq, Eq, Debug)]
pub enum RegistryError {
    #[error("duplicate providers for key {0}")]
    DuplicateProviders(Key),
    #[error("duplicate providers for key {key} in module {module}")]
    DuplicateProvidersInModule { key: Key, module: &'static str },
    #[error("duplicate annotation providers for tag {tag} in module {module}")]
    DuplicateAnnotationTag { tag: TypeInfo, module: &'static str },
    #[error("unknown field `{field}` in auto-inject annotations for {target}")]
    UnknownField {
        target: TypeInfo,
        field: &'static str,
    },
}

/// Errors related to resolving values through an injector. Failures accumulate one
/// [Provide](InjectError::Provide) frame per resolution level, so the full key chain from the
/// requested key down to the root cause is preserved.
#[derive(Error, Clone, Debug)]
pub enum InjectError {
    #[error("no provider found")]
    NoProviderFound,
    #[error("providing {key} failed: {source}")]
    Provide {
        key: Key,
        #[source]
        source: Box<InjectError>,
    },
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("resolved value is not of type {expected}")]
    IncompatibleValue { expected: TypeInfo },
}

impl InjectError {
    /// Wraps this error with the key being provided, adding one provenance frame.
    pub fn wrap(self, key: Key) -> Self {
        InjectError::Provide {
            key,
            source: Box::new(self),
        }
    }

    /// Walks the provenance chain down to the innermost error.
    pub fn root_cause(&self) -> &InjectError {
        let mut current = self;
        while let InjectError::Provide { source, .. } = current {
            current = source;
        }
        current
    }

    /// Returns the original error returned by a provider, if that is what caused the failure.
    pub fn provider_error(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        match self.root_cause() {
            InjectError::Provider(error) => Some(error.inner()),
            _ => None,
        }
    }
}

/// A cloneable wrapper around an arbitrary error returned by a provider. Cached resolution
/// results store their errors, hence the shared ownership.
#[derive(Clone, Debug)]
pub struct ProviderError(Arc<dyn StdError + Send + Sync + 'static>);

impl ProviderError {
    pub fn new<E: StdError + Send + Sync + 'static>(error: E) -> Self {
        Self(Arc::new(error))
    }

    pub fn inner(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self.0.as_ref()
    }

    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        self.0.downcast_ref()
    }
}

impl Display for ProviderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl StdError for ProviderError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.0.source()
    }
}
