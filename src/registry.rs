//! The type-instantiation facility.
//!
//! Deserialization meets type names, not types. The [`TypeRegistry`] maps
//! every wire name (and every alias, i.e. a name a type used to have) to a
//! factory producing a blank instance.
//!
//! Registering a type also registers every model type reachable through its
//! members, so registering the root of a schema is enough.

use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock};

use crate::error::{GraphError, Result};
use crate::model::{Model, ModelRef, ModelType};

#[derive(Debug, Clone, Copy)]
struct RegisteredType {
    type_id: TypeId,
    create: fn() -> ModelRef,
}

#[derive(Debug, Default)]
struct RegistryState {
    by_name: HashMap<String, RegisteredType>,
    aliases: HashMap<String, String>,
    known: HashSet<TypeId>,
}

/// Thread-safe name to factory map.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    state: RwLock<RegistryState>,
}

impl TypeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `T` and every model type reachable from it.
    pub fn register<T: Model>(&self) {
        if self.is_known(TypeId::of::<T>()) {
            return;
        }
        self.register_type(T::model_type());
    }

    /// Registers a described type and every model type reachable from it.
    pub fn register_type(&self, model_type: ModelType) {
        let mut pending = vec![model_type];
        while let Some(model_type) = pending.pop() {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            if !state.known.insert(model_type.type_id) {
                continue;
            }

            let entry = RegisteredType {
                type_id: model_type.type_id,
                create: model_type.create,
            };
            if let Some(previous) = state.by_name.insert(model_type.name.clone(), entry)
                && previous.type_id != entry.type_id
            {
                tracing::warn!(type_name = %model_type.name, "wire name registered by two types; keeping the latest");
            }
            for alias in &model_type.aliases {
                state.aliases.insert(alias.clone(), model_type.name.clone());
            }
            drop(state);

            tracing::debug!(type_name = %model_type.name, "registered model type");
            pending.extend(model_type.members.iter().filter_map(|m| (m.nested)()));
        }
    }

    /// Redirects a legacy wire name to a registered one.
    pub fn redirect(&self, legacy_name: impl Into<String>, current_name: impl Into<String>) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.aliases.insert(legacy_name.into(), current_name.into());
    }

    /// Returns true when `name` (or an alias of it) resolves to a type.
    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Returns true when the type with `type_id` has been registered.
    pub fn contains_type(&self, type_id: TypeId) -> bool {
        self.is_known(type_id)
    }

    /// Creates a blank instance of the type registered under `name`.
    ///
    /// # Errors
    /// [`GraphError::TypeNotRegistered`] when nothing is registered under the
    /// name or its redirect.
    pub fn create(&self, name: &str) -> Result<ModelRef> {
        self.lookup(name)
            .map(|registered| (registered.create)())
            .ok_or_else(|| GraphError::TypeNotRegistered(name.to_owned()))
    }

    /// Resolves an alias to its current name. Non-aliases map to themselves.
    pub fn resolve_name(&self, name: &str) -> String {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.aliases.get(name).cloned().unwrap_or_else(|| name.to_owned())
    }

    fn lookup(&self, name: &str) -> Option<RegisteredType> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(found) = state.by_name.get(name) {
            return Some(*found);
        }
        state
            .aliases
            .get(name)
            .and_then(|current| state.by_name.get(current))
            .copied()
    }

    fn is_known(&self, type_id: TypeId) -> bool {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.known.contains(&type_id)
    }
}
