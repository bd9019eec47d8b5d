//! The per-object serialization scope.

use std::fmt;
use std::sync::Arc;

use crate::catalog::CatalogEntry;
use crate::format::PropertyValue;
use crate::model::{ModelRef, ModelType};
use crate::references::ReferenceManager;

/// Direction of travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextMode {
    /// Model to bytes.
    Serializing,
    /// Bytes to model.
    Deserializing,
}

/// Scope for the (de)serialization of one object in the graph.
///
/// One context exists per object, nesting as the orchestrator recurses. The
/// reference manager is borrowed from the enclosing call so every context of
/// one pass sees the same identities. The accumulated records are the
/// format-specific state; they are released when the context drops, on every
/// exit path.
pub struct SerializationContext<'a> {
    model: ModelRef,
    entry: Arc<CatalogEntry>,
    mode: ContextMode,
    references: &'a mut ReferenceManager,
    records: Vec<PropertyValue>,
    depth: usize,
}

impl<'a> SerializationContext<'a> {
    pub(crate) fn new(
        model: ModelRef,
        entry: Arc<CatalogEntry>,
        mode: ContextMode,
        references: &'a mut ReferenceManager,
        depth: usize,
    ) -> Self {
        tracing::trace!(type_name = entry.type_name(), ?mode, depth, "context opened");
        Self {
            model,
            entry,
            mode,
            references,
            records: Vec::new(),
            depth,
        }
    }

    /// The model being processed.
    pub fn model(&self) -> &ModelRef {
        &self.model
    }

    /// Its type.
    pub fn model_type(&self) -> &ModelType {
        self.entry.model_type()
    }

    /// Direction of travel.
    pub fn mode(&self) -> ContextMode {
        self.mode
    }

    /// The identities of the current pass.
    pub fn reference_manager(&self) -> &ReferenceManager {
        &*self.references
    }

    /// Nesting depth. The root object is at depth 0.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub(crate) fn references_mut(&mut self) -> &mut ReferenceManager {
        &mut *self.references
    }

    pub(crate) fn push_record(&mut self, record: PropertyValue) {
        self.records.push(record);
    }

    pub(crate) fn into_records(mut self) -> Vec<PropertyValue> {
        std::mem::take(&mut self.records)
    }
}

impl Drop for SerializationContext<'_> {
    fn drop(&mut self) {
        tracing::trace!(
            type_name = self.entry.type_name(),
            mode = ?self.mode,
            depth = self.depth,
            pending = self.records.len(),
            "context disposed"
        );
    }
}

impl fmt::Debug for SerializationContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerializationContext")
            .field("model", &self.model)
            .field("type_name", &self.entry.type_name())
            .field("mode", &self.mode)
            .field("depth", &self.depth)
            .field("records", &self.records.len())
            .finish()
    }
}
