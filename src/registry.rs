//! Registry construction. A module tree is flattened into leaves, each leaf's providers are
//! checked for internal duplicates and have their dynamic annotation tags substituted, then
//! everything is merged into one immutable key-indexed map.

use crate::error::RegistryError;
use crate::key::{Key, TypeInfo};
use crate::module::{flatten, ModulePtr};
use crate::provider::{Argument, Provider, ProviderFn, ProviderKind};
use fxhash::FxHashMap;
use itertools::Itertools;
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub(crate) struct ProviderData {
    pub(crate) function: ProviderFn,
    pub(crate) arguments: Vec<Argument>,
    pub(crate) has_error: bool,
    pub(crate) cached: bool,
}

/// Immutable provider map backing an injector.
pub(crate) struct ProviderRegistry {
    providers: FxHashMap<Key, ProviderData>,
}

impl ProviderRegistry {
    /// Builds the registry for a module tree. Within a leaf, two providers for one key or two
    /// annotation providers for one tag are rejected outright; across leaves, a key collision
    /// is tolerated only when both sides carry the very same callable, which happens when one
    /// module instance is reachable through several combinations.
    pub(crate) fn build(module: &ModulePtr) -> Result<Self, RegistryError> {
        let mut providers = FxHashMap::<Key, ProviderData>::default();

        let leaves = flatten(module)
            .into_iter()
            .unique_by(|leaf| Arc::as_ptr(leaf) as *const ())
            .collect_vec();

        for leaf in &leaves {
            for provider in leaf_providers(leaf)? {
                let Provider { kind, cached } = provider;
                let ProviderKind::Value {
                    function,
                    output,
                    arguments,
                    has_error,
                } = kind
                else {
                    continue;
                };

                if let Some(existing) = providers.get(&output) {
                    if Arc::ptr_eq(&existing.function, &function) {
                        continue;
                    }

                    return Err(RegistryError::DuplicateProviders(output));
                }

                debug!(key = %output, arguments = arguments.len(), has_error, cached, "registering provider");

                providers.insert(
                    output,
                    ProviderData {
                        function,
                        arguments,
                        has_error,
                        cached,
                    },
                );
            }
        }

        debug!(providers = providers.len(), leaves = leaves.len(), "registry built");

        Ok(Self { providers })
    }

    pub(crate) fn get(&self, key: &Key) -> Option<&ProviderData> {
        self.providers.get(key)
    }
}

/// The fully resolved value providers of a module tree, with duplicate checks applied per leaf
/// and dynamic annotations substituted. Cross-leaf merging is not performed.
pub fn providers_of(module: &ModulePtr) -> Result<Vec<Provider>, RegistryError> {
    flatten(module)
        .into_iter()
        .unique_by(|leaf| Arc::as_ptr(leaf) as *const ())
        .map(|leaf| leaf_providers(&leaf))
        .flatten_ok()
        .collect()
}

fn leaf_providers(leaf: &ModulePtr) -> Result<Vec<Provider>, RegistryError> {
    let raw = leaf.providers()?;
    check_leaf_duplicates(&raw, leaf.name())?;
    Ok(resolve_annotation_providers(raw))
}

fn check_leaf_duplicates(
    providers: &[Provider],
    module: &'static str,
) -> Result<(), RegistryError> {
    let mut outputs = FxHashMap::<Key, ()>::default();
    let mut tags = FxHashMap::<TypeInfo, ()>::default();

    for provider in providers {
        match &provider.kind {
            ProviderKind::Value { output, .. } => {
                if outputs.insert(*output, ()).is_some() {
                    return Err(RegistryError::DuplicateProvidersInModule {
                        key: *output,
                        module,
                    });
                }
            }
            ProviderKind::Annotation { tag, .. } => {
                if tags.insert(*tag, ()).is_some() {
                    return Err(RegistryError::DuplicateAnnotationTag { tag: *tag, module });
                }
            }
        }
    }

    Ok(())
}

/// Applies dynamic annotation providers: every occurrence of a tag in the leaf's value
/// providers is replaced with the runtime annotation's type, and the annotation providers
/// themselves are dropped from the result.
fn resolve_annotation_providers(providers: Vec<Provider>) -> Vec<Provider> {
    let substitutions: FxHashMap<TypeInfo, TypeInfo> = providers
        .iter()
        .filter_map(|provider| match &provider.kind {
            ProviderKind::Annotation { tag, value } => Some((*tag, value.annotation_type())),
            ProviderKind::Value { .. } => None,
        })
        .collect();

    if substitutions.is_empty() {
        return providers
            .into_iter()
            .filter(|provider| matches!(provider.kind, ProviderKind::Value { .. }))
            .collect();
    }

    providers
        .into_iter()
        .filter_map(|provider| {
            let Provider { kind, cached } = provider;
            match kind {
                ProviderKind::Annotation { .. } => None,
                ProviderKind::Value {
                    function,
                    mut output,
                    mut arguments,
                    has_error,
                } => {
                    if let Some(substituted) = substitutions.get(&output.annotation) {
                        output = Key::new(output.value, *substituted);
                    }

                    for argument in &mut arguments {
                        if let Some(substituted) = substitutions.get(&argument.key.annotation) {
                            argument.original_annotation = argument
                                .original_annotation
                                .or(Some(argument.key.annotation));
                            argument.key = Key::new(argument.key.value, *substituted);
                        }
                    }

                    Some(Provider {
                        kind: ProviderKind::Value {
                            function,
                            output,
                            arguments,
                            has_error,
                        },
                        cached,
                    })
                }
            }
        })
        .collect()
}
