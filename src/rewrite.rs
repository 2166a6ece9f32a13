//! Annotation rewriting. Wrapping a module tree in [rewrite_annotations] remaps annotation
//! types in its providers' output and argument keys, which lets one module tree be mounted
//! several times under disjoint annotations.

use crate::error::RegistryError;
use crate::key::{Annotation, DynAnnotation, Key, TypeInfo};
use crate::module::{Module, ModulePtr};
use crate::provider::{Provider, ProviderKind};
use crate::registry::providers_of;
use fxhash::FxHashMap;
use std::sync::Arc;

/// An annotation-to-annotation mapping applied by [rewrite_annotations].
#[derive(Clone, Default, Debug)]
pub struct AnnotationRewrite {
    mapping: FxHashMap<TypeInfo, TypeInfo>,
}

impl AnnotationRewrite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rewrite<Source: Annotation, Target: Annotation>(mut self) -> Self {
        self.mapping
            .insert(TypeInfo::of::<Source>(), TypeInfo::of::<Target>());
        self
    }

    /// Runtime-typed variant of [rewrite](AnnotationRewrite::rewrite).
    pub fn rewrite_dyn(mut self, source: &dyn DynAnnotation, target: &dyn DynAnnotation) -> Self {
        self.mapping
            .insert(source.annotation_type(), target.annotation_type());
        self
    }

    fn apply(&self, annotation: TypeInfo) -> Option<TypeInfo> {
        self.mapping.get(&annotation).copied()
    }
}

/// Wraps a module tree so that its providers' annotations are remapped per the given rewrite.
/// Dynamic annotation providers inside the tree are resolved before remapping, so the rewrite
/// sees effective annotations. Annotations absent from the mapping pass through unchanged.
pub fn rewrite_annotations(module: ModulePtr, rewrite: AnnotationRewrite) -> ModulePtr {
    Arc::new(RewriteAnnotationsModule { module, rewrite })
}

struct RewriteAnnotationsModule {
    module: ModulePtr,
    rewrite: AnnotationRewrite,
}

impl Module for RewriteAnnotationsModule {
    fn providers(&self) -> Result<Vec<Provider>, RegistryError> {
        Ok(providers_of(&self.module)?
            .into_iter()
            .map(|provider| self.rewrite_provider(provider))
            .collect())
    }

    fn name(&self) -> &'static str {
        "rewrite_annotations"
    }
}

impl RewriteAnnotationsModule {
    fn rewrite_provider(&self, provider: Provider) -> Provider {
        let Provider { kind, cached } = provider;
        let ProviderKind::Value {
            function,
            mut output,
            mut arguments,
            has_error,
        } = kind
        else {
            // providers_of already resolves annotation providers away
            unreachable!("annotation providers survive resolution");
        };

        if let Some(target) = self.rewrite.apply(output.annotation) {
            output = Key::new(output.value, target);
        }

        for argument in &mut arguments {
            if let Some(target) = self.rewrite.apply(argument.key.annotation) {
                argument.original_annotation =
                    argument.original_annotation.or(Some(argument.key.annotation));
                argument.key = Key::new(argument.key.value, target);
            }
        }

        Provider {
            kind: ProviderKind::Value {
                function,
                output,
                arguments,
                has_error,
            },
            cached,
        }
    }
}
