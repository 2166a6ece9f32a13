//! Automatic provider synthesis for structs assembled field-by-field from the injector.
//!
//! Implementing [AutoInjectable] declares the injectable fields of a type; an
//! [AutoInjectModule] then contributes a single provider whose arguments are those fields,
//! each resolved under the [Auto] annotation unless overridden per field or by the type's own
//! [default_annotations](AutoInjectable::default_annotations).

use crate::error::{InjectError, RegistryError};
use crate::key::{Annotation, DynAnnotation, InstanceAnyPtr, InstancePtr, Key, TypeInfo};
use crate::module::Module;
use crate::provider::{Argument, Provider, ResolvedArg};
use std::marker::PhantomData;
use std::sync::Arc;
use std::vec;

/// Default annotation for auto-injected fields.
pub struct Auto;
impl Annotation for Auto {}

/// Description of one injectable field.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Field {
    name: &'static str,
    value_type: TypeInfo,
}

impl Field {
    pub fn new<T: Send + Sync + 'static>(name: &'static str) -> Self {
        Self {
            name,
            value_type: TypeInfo::of::<T>(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn value_type(&self) -> TypeInfo {
        self.value_type
    }
}

/// Resolved field values in declaration order, consumed by
/// [assemble](AutoInjectable::assemble) one [take](FieldValues::take) per field.
pub struct FieldValues {
    values: vec::IntoIter<InstanceAnyPtr>,
}

impl FieldValues {
    pub(crate) fn new(values: Vec<InstanceAnyPtr>) -> Self {
        Self {
            values: values.into_iter(),
        }
    }

    /// Takes the next field value, downcast to its declared type.
    pub fn take<T: Send + Sync + 'static>(&mut self) -> Result<InstancePtr<T>, InjectError> {
        self.values
            .next()
            .ok_or(InjectError::IncompatibleValue {
                expected: TypeInfo::of::<T>(),
            })?
            .downcast()
            .map_err(|_| InjectError::IncompatibleValue {
                expected: TypeInfo::of::<T>(),
            })
    }
}

/// Field-to-annotation mapping. Later entries for the same field win.
#[derive(Clone, Default, Debug)]
pub struct FieldAnnotations {
    annotations: Vec<(&'static str, TypeInfo)>,
}

impl FieldAnnotations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<A: Annotation>(mut self, field: &'static str) -> Self {
        self.annotations.push((field, TypeInfo::of::<A>()));
        self
    }

    pub fn with_dyn(mut self, field: &'static str, annotation: &dyn DynAnnotation) -> Self {
        self.annotations.push((field, annotation.annotation_type()));
        self
    }

    fn get(&self, field: &str) -> Option<TypeInfo> {
        self.annotations
            .iter()
            .rev()
            .find(|(name, _)| *name == field)
            .map(|(_, annotation)| *annotation)
    }

    fn entries(&self) -> impl Iterator<Item = (&'static str, TypeInfo)> + '_ {
        self.annotations.iter().copied()
    }
}

/// A type whose instances can be assembled from injected field values.
pub trait AutoInjectable: Send + Sync + Sized + 'static {
    /// The injectable fields, in the order [assemble](AutoInjectable::assemble) consumes them.
    fn fields() -> Vec<Field>;

    /// Builds an instance from resolved field values.
    fn assemble(values: FieldValues) -> Result<Self, InjectError>;

    /// Per-type field annotations, overridable per module via
    /// [AutoInjectModule::with_annotations].
    fn default_annotations() -> FieldAnnotations {
        FieldAnnotations::new()
    }
}

/// Module contributing one synthesized provider for an [AutoInjectable] type.
pub struct AutoInjectModule<T: AutoInjectable> {
    annotation: TypeInfo,
    annotations: FieldAnnotations,
    cached: bool,
    _target: PhantomData<fn() -> T>,
}

impl<T: AutoInjectable> AutoInjectModule<T> {
    /// Synthesizes a provider for `T` under the [Auto] annotation.
    pub fn new() -> Self {
        Self {
            annotation: TypeInfo::of::<Auto>(),
            annotations: FieldAnnotations::new(),
            cached: false,
            _target: PhantomData,
        }
    }

    /// Provides `T` under the given annotation instead of [Auto].
    pub fn with_annotation<A: Annotation>(mut self) -> Self {
        self.annotation = TypeInfo::of::<A>();
        self
    }

    /// Runtime-typed variant of [with_annotation](AutoInjectModule::with_annotation).
    pub fn with_dyn_annotation(mut self, annotation: &dyn DynAnnotation) -> Self {
        self.annotation = annotation.annotation_type();
        self
    }

    /// Overrides field annotations on top of the type's defaults.
    pub fn with_annotations(mut self, annotations: FieldAnnotations) -> Self {
        self.annotations = annotations;
        self
    }

    /// Memoizes the synthesized provider's result.
    pub fn cached(mut self, cached: bool) -> Self {
        self.cached = cached;
        self
    }
}

impl<T: AutoInjectable> Default for AutoInjectModule<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: AutoInjectable> Module for AutoInjectModule<T> {
    fn providers(&self) -> Result<Vec<Provider>, RegistryError> {
        let fields = T::fields();
        for (name, _) in self.annotations.entries() {
            if !fields.iter().any(|field| field.name() == name) {
                return Err(RegistryError::UnknownField {
                    target: TypeInfo::of::<T>(),
                    field: name,
                });
            }
        }

        let defaults = T::default_annotations();
        let arguments = fields
            .iter()
            .map(|field| {
                let annotation = self
                    .annotations
                    .get(field.name())
                    .or_else(|| defaults.get(field.name()))
                    .unwrap_or_else(TypeInfo::of::<Auto>);
                Argument::eager(Key::new(field.value_type(), annotation))
            })
            .collect();

        let function = Arc::new(|resolved: Vec<ResolvedArg>| {
            let values = resolved
                .into_iter()
                .map(|entry| match entry {
                    ResolvedArg::Value(value) => Ok(value),
                    ResolvedArg::Deferred(_) => Err(InjectError::IncompatibleValue {
                        expected: TypeInfo::of::<T>(),
                    }),
                })
                .collect::<Result<Vec<_>, _>>()?;
            T::assemble(FieldValues::new(values)).map(|value| Arc::new(value) as InstanceAnyPtr)
        });

        Ok(vec![Provider::from_parts(
            function,
            Key::new(TypeInfo::of::<T>(), self.annotation),
            arguments,
            true,
        )
        .cached(self.cached)])
    }
}
