//! The identity scheme for provided values. Every producible artifact is addressed by a [Key]:
//! a pair of a value type and an annotation type. Annotations disambiguate multiple providers of
//! the same value type and are compared by type identity, never by contents.

use std::any::{type_name, Any, TypeId};
use std::fmt::{self, Display, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Pointer type for provided instances.
pub type InstancePtr<T> = Arc<T>;

/// Type-erased pointer for provided instances.
pub type InstanceAnyPtr = Arc<dyn Any + Send + Sync>;

/// Shared pointer to an annotation value with runtime-known type.
pub type AnnotationPtr = Arc<dyn DynAnnotation>;

/// Marker trait for annotation types. Annotations are usually empty unit structs; implementing
/// this trait is all that is needed:
///
/// ```
/// use annotated_inject::Annotation;
///
/// struct DatabaseUrl;
/// impl Annotation for DatabaseUrl {}
/// ```
pub trait Annotation: Send + Sync + 'static {}

/// Object-safe view of an annotation value. Automatically implemented for every [Annotation];
/// used where the annotation type is only known at runtime, such as dynamic annotation
/// providers.
pub trait DynAnnotation: Send + Sync {
    /// Type identity of this annotation value.
    fn annotation_type(&self) -> TypeInfo;
}

impl<A: Annotation> DynAnnotation for A {
    fn annotation_type(&self) -> TypeInfo {
        TypeInfo::of::<A>()
    }
}

/// A type identity paired with its name for diagnostics. Equality and hashing use only the
/// [TypeId]; the name never influences identity.
#[derive(Clone, Copy, Debug)]
pub struct TypeInfo {
    id: TypeId,
    name: &'static str,
}

impl TypeInfo {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeInfo {}

impl Hash for TypeInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Display for TypeInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Identity of one producible artifact: the value type plus the annotation type qualifying it.
/// At most one provider can be registered per key in a given injector.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Key {
    pub value: TypeInfo,
    pub annotation: TypeInfo,
}

impl Key {
    pub fn new(value: TypeInfo, annotation: TypeInfo) -> Self {
        Self { value, annotation }
    }

    pub fn of<T: 'static, A: Annotation>() -> Self {
        Self {
            value: TypeInfo::of::<T>(),
            annotation: TypeInfo::of::<A>(),
        }
    }
}

impl Display for Key {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "`{}` annotated `{}`", self.value, self.annotation)
    }
}
