//! Modules group providers and other modules into composable units. An injector is built from
//! a set of module trees; [combine] nests them and [check_module] validates one without
//! building an injector.

use crate::error::RegistryError;
use crate::provider::Provider;
use crate::registry::ProviderRegistry;
#[cfg(test)]
use mockall::automock;
use std::any::type_name;
use std::sync::Arc;

/// Shared pointer to a module.
pub type ModulePtr = Arc<dyn Module>;

/// A named collection of providers and child modules. Implementations typically override one
/// of the two listing methods; both default to empty.
#[cfg_attr(test, automock)]
pub trait Module: Send + Sync + 'static {
    /// The providers declared directly by this module.
    fn providers(&self) -> Result<Vec<Provider>, RegistryError> {
        Ok(Vec::new())
    }

    /// Child modules. A module with children is treated as a pure grouping node and its own
    /// [providers](Module::providers) are ignored.
    fn modules(&self) -> Vec<ModulePtr> {
        Vec::new()
    }

    /// Diagnostic name used in registry errors.
    fn name(&self) -> &'static str {
        type_name::<Self>()
    }
}

/// Wraps a module value in a [ModulePtr].
pub fn module<M: Module>(module: M) -> ModulePtr {
    Arc::new(module)
}

struct CombinedModule {
    modules: Vec<ModulePtr>,
}

impl Module for CombinedModule {
    fn modules(&self) -> Vec<ModulePtr> {
        self.modules.clone()
    }

    fn name(&self) -> &'static str {
        "combined"
    }
}

/// Groups modules into a single one. Providers of the result are the concatenation of the
/// children's providers; sharing one module between several combinations is allowed.
pub fn combine(modules: impl IntoIterator<Item = ModulePtr>) -> ModulePtr {
    Arc::new(CombinedModule {
        modules: modules.into_iter().collect(),
    })
}

/// Depth-first list of the leaf modules of a tree. Nodes with children contribute only their
/// children; nodes without any are the leaves that contribute providers.
pub(crate) fn flatten(module: &ModulePtr) -> Vec<ModulePtr> {
    let children = module.modules();
    if children.is_empty() {
        vec![Arc::clone(module)]
    } else {
        children.iter().flat_map(flatten).collect()
    }
}

/// Validates a module tree by running full registry construction on it, including duplicate
/// detection and dynamic annotation resolution, without creating an injector.
pub fn check_module(module: &ModulePtr) -> Result<(), RegistryError> {
    ProviderRegistry::build(module).map(|_| ())
}
