//! Per-type member catalog.
//!
//! The catalog turns a [`ModelType`] into the lists the orchestrator walks:
//! which fields and properties participate, and which modifiers apply. Each
//! type is described once and the resulting [`CatalogEntry`] is immutable.
//!
//! The cache is a plain object, owned by whoever builds the serializer, so two
//! engines never share state and tests stay isolated.

use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{GraphError, Result};
use crate::model::{MemberDescriptor, MemberGroup, Model, ModelKind, ModelRef, ModelType};
use crate::modifier::SerializerModifier;

/// Everything the orchestrator needs to know about one model type.
#[derive(Debug)]
pub struct CatalogEntry {
    model_type: ModelType,
    fields: Vec<&'static str>,
    properties: Vec<&'static str>,
    serializable: HashSet<&'static str>,
    modifiers: Vec<Arc<dyn SerializerModifier>>,
}

impl CatalogEntry {
    fn build(model_type: ModelType, extra: &[Arc<dyn SerializerModifier>]) -> Self {
        let mut fields = Vec::new();
        let mut properties = Vec::new();

        for member in model_type.members.iter().filter(|m| m.is_serializable()) {
            match member.group {
                MemberGroup::Field => fields.push(member.name),
                MemberGroup::ModelProperty | MemberGroup::RegularProperty => properties.push(member.name),
                MemberGroup::Collection => {}
            }
        }

        let serializable = fields.iter().chain(properties.iter()).copied().collect();
        let modifiers = model_type
            .modifiers
            .iter()
            .chain(extra.iter())
            .cloned()
            .collect();

        Self {
            model_type,
            fields,
            properties,
            serializable,
            modifiers,
        }
    }

    /// The described type.
    pub fn model_type(&self) -> &ModelType {
        &self.model_type
    }

    /// Wire name of the type.
    pub fn type_name(&self) -> &str {
        &self.model_type.name
    }

    /// Returns true for collection models.
    pub fn is_collection(&self) -> bool {
        self.model_type.kind == ModelKind::Collection
    }

    /// Serializable members of the `Field` group, in declaration order.
    pub fn fields_to_serialize(&self) -> &[&'static str] {
        &self.fields
    }

    /// Serializable model and regular properties, in declaration order.
    pub fn properties_to_serialize(&self) -> &[&'static str] {
        &self.properties
    }

    /// Returns true when `name` participates in serialization.
    pub fn is_serializable(&self, name: &str) -> bool {
        self.serializable.contains(name)
    }

    /// Every serializable member descriptor, fields first.
    pub fn serializable_members(&self) -> impl Iterator<Item = &MemberDescriptor> {
        self.fields
            .iter()
            .chain(self.properties.iter())
            .filter_map(|name| self.model_type.find_member(name))
    }

    /// The modifier chain, in serialization order.
    pub fn serializer_modifiers(&self) -> &[Arc<dyn SerializerModifier>] {
        &self.modifiers
    }

    /// Looks a declared member up.
    ///
    /// # Errors
    /// [`GraphError::MemberNotRegistered`] when the type has no such member.
    pub fn member(&self, name: &str) -> Result<&MemberDescriptor> {
        self.model_type
            .find_member(name)
            .ok_or_else(|| GraphError::member_not_registered(self.type_name(), name))
    }
}

#[derive(Debug, Default)]
struct CatalogState {
    entries: HashMap<TypeId, Arc<CatalogEntry>>,
    runtime_modifiers: HashMap<TypeId, Vec<Arc<dyn SerializerModifier>>>,
}

/// Thread-safe, read-mostly cache of [`CatalogEntry`] values.
#[derive(Debug, Default)]
pub struct MemberCatalog {
    state: RwLock<CatalogState>,
}

impl MemberCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry for the type of `model`.
    pub fn entry(&self, model: &ModelRef) -> Result<Arc<CatalogEntry>> {
        self.entry_with(model.type_id(), || Ok(model.try_borrow()?.describe()))
    }

    /// Entry for `T`.
    pub fn entry_of<T: Model>(&self) -> Result<Arc<CatalogEntry>> {
        self.entry_with(TypeId::of::<T>(), || Ok(T::model_type()))
    }

    /// Appends a runtime modifier to `T`'s chain, after its declared modifiers.
    ///
    /// Invalidates the cached entry for `T`.
    pub fn register_modifier<T: Model>(&self, modifier: Arc<dyn SerializerModifier>) -> Result<()> {
        let type_id = TypeId::of::<T>();
        let mut state = self.write();
        state.runtime_modifiers.entry(type_id).or_default().push(modifier);
        state.entries.remove(&type_id);
        Ok(())
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    fn entry_with(
        &self,
        type_id: TypeId,
        describe: impl FnOnce() -> Result<ModelType>,
    ) -> Result<Arc<CatalogEntry>> {
        if let Some(entry) = self.read().entries.get(&type_id) {
            return Ok(Arc::clone(entry));
        }

        // Describe outside the lock; it may run arbitrary generated code.
        let model_type = describe()?;

        let mut state = self.write();
        if let Some(entry) = state.entries.get(&type_id) {
            return Ok(Arc::clone(entry));
        }

        let extra = state.runtime_modifiers.get(&type_id).cloned().unwrap_or_default();
        let entry = Arc::new(CatalogEntry::build(model_type, &extra));
        tracing::debug!(
            type_name = entry.type_name(),
            fields = entry.fields.len(),
            properties = entry.properties.len(),
            modifiers = entry.modifiers.len(),
            "catalogued model type"
        );
        state.entries.insert(type_id, Arc::clone(&entry));
        Ok(entry)
    }

    // Entries are inserted whole, so a poisoned lock still guards a
    // consistent map.
    fn read(&self) -> RwLockReadGuard<'_, CatalogState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, CatalogState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}
