//! The graph orchestrator.
//!
//! [`ModelSerializer`] drives one (de)serialization call: it opens a
//! [`SerializationContext`] per object, asks the [`MemberCatalog`] which
//! members participate, threads every member through the modifier chain,
//! encodes values with graph ids from the call's [`ReferenceManager`] and hands
//! the resulting [`Payload`] to the [`FormatDriver`].
//!
//! ## Failure semantics
//!
//! - Payload-level failures (framing, bincode, I/O) are returned.
//! - A member that cannot be read, rewritten, encoded, decoded or assigned is
//!   logged and skipped; the model keeps its previous value for it. Graph ids
//!   handed out while encoding a skipped member are released.
//! - A reference to an unknown graph id decodes as [`Value::Null`] with an
//!   error logged.

use std::io::{Read, Write};
use std::sync::Arc;

use crate::binary::BinaryFormat;
use crate::catalog::{CatalogEntry, MemberCatalog};
use crate::compression::LZ4_ID;
use crate::context::{ContextMode, SerializationContext};
use crate::error::{GraphError, Result};
use crate::format::{FormatDriver, Payload, PropertyValue, WireModel, WireValue};
use crate::member::MemberValue;
use crate::model::{COLLECTION_MEMBER_NAME, MemberGroup, Model, ModelRef, Shared};
use crate::modifier::SerializerModifier;
use crate::references::ReferenceManager;
use crate::registry::TypeRegistry;
use crate::value::Value;

/// Engine configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SerializerOptions {
    /// Compress payloads with LZ4. Requires the `lz4_flex` feature.
    pub compression: bool,
    /// Reject payloads whose root type name (after alias resolution) differs
    /// from the target model's type.
    pub verify_root_type: bool,
}

/// How much of the object-level protocol a walk runs.
#[derive(Clone, Copy)]
struct Walk<'i> {
    ignore: &'i [&'i str],
    object_hooks: bool,
}

impl Walk<'static> {
    const FULL: Self = Self {
        ignore: &[],
        object_hooks: true,
    };
}

/// Recursive driver of model graph (de)serialization.
///
/// Cheap to share: the catalog and registry caches live behind `Arc`s and the
/// serializer is `Send + Sync`. Each call builds its own reference manager.
#[derive(Debug)]
pub struct ModelSerializer<F: FormatDriver = BinaryFormat> {
    catalog: Arc<MemberCatalog>,
    registry: Arc<TypeRegistry>,
    format: F,
    options: SerializerOptions,
}

impl ModelSerializer<BinaryFormat> {
    /// A binary serializer with fresh caches and default options.
    pub fn new() -> Self {
        Self::with_format(BinaryFormat::new())
    }

    /// A binary serializer configured by `options`.
    ///
    /// # Errors
    /// `GraphError::Compression` when compression is requested but LZ4 is not
    /// compiled in.
    pub fn with_options(options: SerializerOptions) -> Result<Self> {
        let mut format = BinaryFormat::new();
        if options.compression {
            format = format.with_compression(LZ4_ID)?;
        }
        let mut serializer = Self::with_format(format);
        serializer.options = options;
        Ok(serializer)
    }
}

impl Default for ModelSerializer<BinaryFormat> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: FormatDriver> ModelSerializer<F> {
    /// A serializer over a custom format driver.
    pub fn with_format(format: F) -> Self {
        Self::from_parts(
            Arc::new(MemberCatalog::new()),
            Arc::new(TypeRegistry::new()),
            format,
            SerializerOptions::default(),
        )
    }

    /// Assembles a serializer from shared caches.
    pub fn from_parts(
        catalog: Arc<MemberCatalog>,
        registry: Arc<TypeRegistry>,
        format: F,
        options: SerializerOptions,
    ) -> Self {
        Self {
            catalog,
            registry,
            format,
            options,
        }
    }

    /// The member catalog.
    pub fn catalog(&self) -> &Arc<MemberCatalog> {
        &self.catalog
    }

    /// The type registry.
    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    /// The format driver.
    pub fn format(&self) -> &F {
        &self.format
    }

    /// The options.
    pub fn options(&self) -> SerializerOptions {
        self.options
    }

    // --- SERIALIZATION ---

    /// Serializes the graph rooted at `model` onto `writer`.
    pub fn serialize<W: Write>(&self, model: &ModelRef, writer: &mut W) -> Result<()> {
        let payload = self.to_payload(model)?;
        self.format.write_payload(&payload, false, writer)
    }

    /// Builds the root record list without writing it.
    pub fn to_payload(&self, model: &ModelRef) -> Result<Payload> {
        self.build_payload(model, Walk::FULL)
    }

    /// Writes only the root's own members, skipping `ignore`, as a flat
    /// member payload. Object-level hooks of the root are not invoked.
    pub fn serialize_members<W: Write>(&self, model: &ModelRef, writer: &mut W, ignore: &[&str]) -> Result<()> {
        let walk = Walk {
            ignore,
            object_hooks: false,
        };
        let payload = self.build_payload(model, walk)?;
        self.format.write_payload(&payload, true, writer)
    }

    /// The records [`serialize_members`](Self::serialize_members) would write.
    pub fn serializable_members(&self, model: &ModelRef, ignore: &[&str]) -> Result<Vec<PropertyValue>> {
        let walk = Walk {
            ignore,
            object_hooks: false,
        };
        Ok(self.build_payload(model, walk)?.members)
    }

    fn build_payload(&self, model: &ModelRef, walk: Walk<'_>) -> Result<Payload> {
        let entry = self.catalog.entry(model)?;
        let span = tracing::debug_span!("serialize", type_name = entry.type_name());
        let _guard = span.enter();

        let mut references = ReferenceManager::new();
        // The root claims the first id before any member can.
        let root = references.get_info(model);
        let type_name = entry.type_name().to_owned();
        let members = self.serialize_model(model, entry, &mut references, 0, walk)?;

        tracing::debug!(records = members.len(), instances = references.len(), "graph serialized");
        Ok(Payload {
            type_name,
            members,
            graph_id: root.id,
        })
    }

    fn serialize_model(
        &self,
        model: &ModelRef,
        entry: Arc<CatalogEntry>,
        references: &mut ReferenceManager,
        depth: usize,
        walk: Walk<'_>,
    ) -> Result<Vec<PropertyValue>> {
        let modifiers: Vec<Arc<dyn SerializerModifier>> = entry.serializer_modifiers().to_vec();
        let mut context = SerializationContext::new(
            model.clone(),
            Arc::clone(&entry),
            ContextMode::Serializing,
            references,
            depth,
        );

        if walk.object_hooks {
            for modifier in &modifiers {
                modifier.on_serializing(&context, model)?;
            }
        }

        if entry.is_collection() {
            if !walk.ignore.contains(&COLLECTION_MEMBER_NAME) {
                let items = model
                    .try_borrow()?
                    .collection_items()
                    .ok_or_else(|| GraphError::Internal(format!("'{}' is a collection without items", entry.type_name())))?;
                let member = MemberValue {
                    group: MemberGroup::Collection,
                    declaring_type: entry.type_name().to_owned(),
                    member_type: "collection",
                    name: COLLECTION_MEMBER_NAME.to_owned(),
                    value: Value::List(items),
                };
                self.write_member(&mut context, &modifiers, member)?;
            }
        } else {
            for descriptor in entry.serializable_members() {
                if walk.ignore.contains(&descriptor.name) {
                    continue;
                }
                let value = match model.try_borrow().and_then(|m| m.get_member(descriptor.name)) {
                    Ok(value) => value,
                    Err(e) => {
                        tracing::warn!(member = descriptor.name, error = %e, "member could not be read; skipping");
                        continue;
                    }
                };
                let member = MemberValue::from_descriptor(entry.type_name(), descriptor, value);
                self.write_member(&mut context, &modifiers, member)?;
            }
        }

        if walk.object_hooks {
            for modifier in &modifiers {
                modifier.on_serialized(&context, model)?;
            }
        }

        Ok(context.into_records())
    }

    /// Runs one member through the chain and appends its record.
    /// Only fatal errors are returned.
    fn write_member(
        &self,
        context: &mut SerializationContext<'_>,
        modifiers: &[Arc<dyn SerializerModifier>],
        mut member: MemberValue,
    ) -> Result<()> {
        let model = context.model().clone();
        if modifiers
            .iter()
            .any(|m| m.should_ignore_member(context, &model, &member))
        {
            tracing::trace!(member = %member.name, "member ignored by modifier");
            return Ok(());
        }

        for modifier in modifiers {
            if let Err(e) = modifier.serialize_member(context, &mut member) {
                tracing::warn!(member = %member.name, error = %e, "modifier failed; skipping member");
                return Ok(());
            }
        }

        let checkpoint = context.reference_manager().checkpoint();
        match self.encode_record(context, member.name.clone(), member.value) {
            Ok(record) => {
                context.push_record(record);
                Ok(())
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                // Instances first met inside the dropped member were never written.
                context.references_mut().rollback(checkpoint);
                tracing::warn!(member = %member.name, error = %e, "member could not be encoded; skipping");
                Ok(())
            }
        }
    }

    fn encode_record(
        &self,
        context: &mut SerializationContext<'_>,
        name: String,
        value: Value,
    ) -> Result<PropertyValue> {
        let wire = match value {
            Value::Model(instance) => {
                let info = context.references_mut().get_info(&instance);
                if !info.is_first_usage {
                    return Ok(PropertyValue::reference(name, info.id));
                }

                let entry = self.catalog.entry(&instance)?;
                let type_name = entry.type_name().to_owned();
                let depth = context.depth() + 1;
                let members = self.serialize_model(&instance, entry, context.references_mut(), depth, Walk::FULL)?;
                return Ok(PropertyValue {
                    name,
                    value: WireValue::Model(WireModel { type_name, members }),
                    graph_id: info.id,
                    graph_ref_id: 0,
                });
            }
            Value::List(items) => {
                let records = items
                    .into_iter()
                    .map(|item| self.encode_record(context, String::new(), item))
                    .collect::<Result<Vec<_>>>()?;
                WireValue::List(records)
            }
            Value::Null => WireValue::Null,
            Value::Bool(v) => WireValue::Bool(v),
            Value::Int(v) => WireValue::Int(v),
            Value::UInt(v) => WireValue::UInt(v),
            Value::Float(v) => WireValue::Float(v),
            Value::Str(v) => WireValue::Str(v),
            Value::Bytes(v) => WireValue::Bytes(v),
        };
        Ok(PropertyValue::scalar(name, wire))
    }

    // --- DESERIALIZATION ---

    /// Reads one payload from `reader` and assigns it onto `model` in place.
    ///
    /// # Errors
    /// `GraphError::Format` when the frame holds a flat member payload.
    pub fn deserialize_into<R: Read>(&self, model: &ModelRef, reader: &mut R) -> Result<()> {
        let payload = self.read_payload(reader, false)?;
        self.apply_payload(model, &payload)
    }

    /// Reads one payload into a fresh `T`.
    pub fn deserialize<T: Model + Default, R: Read>(&self, reader: &mut R) -> Result<Shared<T>> {
        self.registry.register::<T>();
        let model = Shared::new(T::default());
        self.deserialize_into(&model.handle(), reader)?;
        Ok(model)
    }

    /// Reads one payload into a fresh instance of the type named in it.
    ///
    /// # Errors
    /// [`GraphError::TypeNotRegistered`] when the root type is unknown to the
    /// registry.
    pub fn deserialize_any<R: Read>(&self, reader: &mut R) -> Result<ModelRef> {
        let payload = self.read_payload(reader, false)?;
        let model = self.registry.create(&payload.type_name)?;
        self.apply_payload(&model, &payload)?;
        Ok(model)
    }

    /// Reads a flat member payload onto `model`. Object-level hooks of the
    /// root are not invoked.
    ///
    /// # Errors
    /// `GraphError::Format` when the frame holds a full graph payload.
    pub fn deserialize_members<R: Read>(&self, model: &ModelRef, reader: &mut R) -> Result<()> {
        let payload = self.read_payload(reader, true)?;
        let walk = Walk {
            ignore: &[],
            object_hooks: false,
        };
        self.apply_payload_with(model, &payload, walk)
    }

    /// Assigns an already decoded payload onto `model`.
    pub fn apply_payload(&self, model: &ModelRef, payload: &Payload) -> Result<()> {
        self.apply_payload_with(model, payload, Walk::FULL)
    }

    fn read_payload<R: Read>(&self, reader: &mut R, flat: bool) -> Result<Payload> {
        let (payload, is_flat) = self.format.read_payload(reader)?;
        if is_flat != flat {
            let found = if is_flat { "a flat member payload" } else { "a full graph payload" };
            return Err(GraphError::Format(format!("Frame holds {found} for '{}'", payload.type_name)));
        }
        Ok(payload)
    }

    fn apply_payload_with(&self, model: &ModelRef, payload: &Payload, walk: Walk<'_>) -> Result<()> {
        let entry = self.catalog.entry(model)?;
        if !self.registry.contains_type(model.type_id()) {
            self.registry.register_type(entry.model_type().clone());
        }

        if self.options.verify_root_type {
            let resolved = self.registry.resolve_name(&payload.type_name);
            if resolved != entry.type_name() {
                return Err(GraphError::Format(format!(
                    "Payload root is '{}', expected '{}'",
                    payload.type_name,
                    entry.type_name()
                )));
            }
        }

        let span = tracing::debug_span!("deserialize", type_name = entry.type_name());
        let _guard = span.enter();

        let mut references = ReferenceManager::new();
        // Anchor first, so back-references to the root resolve.
        if payload.graph_id != 0 {
            references.register_manually(payload.graph_id, model);
        }
        self.populate_model(model, entry, &payload.members, &mut references, 0, walk)?;

        tracing::debug!(instances = references.len(), "graph deserialized");
        Ok(())
    }

    fn populate_model(
        &self,
        model: &ModelRef,
        entry: Arc<CatalogEntry>,
        records: &[PropertyValue],
        references: &mut ReferenceManager,
        depth: usize,
        walk: Walk<'_>,
    ) -> Result<()> {
        let modifiers: Vec<Arc<dyn SerializerModifier>> =
            entry.serializer_modifiers().iter().rev().cloned().collect();
        let mut context = SerializationContext::new(
            model.clone(),
            Arc::clone(&entry),
            ContextMode::Deserializing,
            references,
            depth,
        );

        if walk.object_hooks {
            for modifier in &modifiers {
                modifier.on_deserializing(&context, model)?;
            }
        }

        if entry.is_collection() {
            self.populate_collection(&mut context, &entry, &modifiers, records)?;
        } else {
            for record in records {
                let descriptor = match entry.member(&record.name) {
                    Ok(descriptor) if entry.is_serializable(descriptor.name) => descriptor,
                    Ok(_) => {
                        tracing::debug!(member = %record.name, "member is not serializable; ignoring record");
                        self.register_orphans(&mut context, record)?;
                        continue;
                    }
                    Err(_) => {
                        tracing::debug!(member = %record.name, "unknown member; ignoring record");
                        self.register_orphans(&mut context, record)?;
                        continue;
                    }
                };

                let value = match self.decode_record(&mut context, record) {
                    Ok(value) => value,
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => {
                        tracing::warn!(member = %record.name, error = %e, "member could not be decoded; skipping");
                        continue;
                    }
                };

                let member = MemberValue::from_descriptor(entry.type_name(), descriptor, value);
                let Some(member) = self.restore_member(&context, &modifiers, member) else {
                    continue;
                };

                let MemberValue { name, value, .. } = member;
                if let Err(e) = model.try_borrow_mut().and_then(|mut m| m.set_member(&name, value)) {
                    tracing::warn!(member = %name, error = %e, "member could not be assigned; skipping");
                }
            }
        }

        if walk.object_hooks {
            for modifier in &modifiers {
                modifier.on_deserialized(&context, model)?;
            }
        }
        Ok(())
    }

    fn populate_collection(
        &self,
        context: &mut SerializationContext<'_>,
        entry: &CatalogEntry,
        modifiers: &[Arc<dyn SerializerModifier>],
        records: &[PropertyValue],
    ) -> Result<()> {
        let Some(record) = records.iter().find(|r| r.name == COLLECTION_MEMBER_NAME) else {
            tracing::debug!(type_name = entry.type_name(), "payload carries no collection items");
            return Ok(());
        };

        let value = match self.decode_record(context, record) {
            Ok(value) => value,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                tracing::warn!(error = %e, "collection items could not be decoded; skipping");
                return Ok(());
            }
        };

        let member = MemberValue {
            group: MemberGroup::Collection,
            declaring_type: entry.type_name().to_owned(),
            member_type: "collection",
            name: COLLECTION_MEMBER_NAME.to_owned(),
            value,
        };
        let Some(member) = self.restore_member(context, modifiers, member) else {
            return Ok(());
        };

        let items = match member.value {
            Value::List(items) => items,
            other => {
                tracing::warn!(found = other.kind(), "collection items are not a list; skipping");
                return Ok(());
            }
        };

        let model = context.model().clone();
        if let Err(e) = model.try_borrow_mut().and_then(|mut m| m.set_collection_items(items)) {
            tracing::warn!(error = %e, "collection items could not be assigned; skipping");
        }
        Ok(())
    }

    /// Decodes the instances an ignored record defines, so later references
    /// to them still resolve. The values themselves are discarded.
    fn register_orphans(&self, context: &mut SerializationContext<'_>, record: &PropertyValue) -> Result<()> {
        if record.graph_ref_id != 0 {
            return Ok(());
        }
        match &record.value {
            WireValue::Model(wire) => match self.decode_model(context, wire, record.graph_id) {
                Ok(_) => Ok(()),
                Err(e) if e.is_fatal() => Err(e),
                // The instance itself is lost; its members may still define others.
                Err(GraphError::TypeNotRegistered(type_name)) => {
                    tracing::debug!(%type_name, "ignored record holds an unknown type; scanning its members");
                    wire.members
                        .iter()
                        .try_for_each(|member| self.register_orphans(context, member))
                }
                Err(e) => {
                    tracing::debug!(member = %record.name, error = %e, "ignored record could not be decoded");
                    Ok(())
                }
            },
            WireValue::List(items) => items.iter().try_for_each(|item| self.register_orphans(context, item)),
            _ => Ok(()),
        }
    }

    /// Runs a decoded member back through the (reversed) chain.
    /// `None` means the member is dropped from this pass.
    fn restore_member(
        &self,
        context: &SerializationContext<'_>,
        modifiers: &[Arc<dyn SerializerModifier>],
        mut member: MemberValue,
    ) -> Option<MemberValue> {
        let model = context.model();
        if modifiers
            .iter()
            .any(|m| m.should_ignore_member(context, model, &member))
        {
            tracing::trace!(member = %member.name, "member ignored by modifier");
            return None;
        }

        for modifier in modifiers {
            if let Err(e) = modifier.deserialize_member(context, &mut member) {
                tracing::warn!(member = %member.name, error = %e, "modifier failed; skipping member");
                return None;
            }
        }
        Some(member)
    }

    fn decode_record(&self, context: &mut SerializationContext<'_>, record: &PropertyValue) -> Result<Value> {
        if record.graph_ref_id != 0 {
            return Ok(match context.reference_manager().get_info_by_id(record.graph_ref_id) {
                Some(info) => Value::Model(info.instance),
                None => {
                    tracing::error!(
                        member = %record.name,
                        graph_ref_id = record.graph_ref_id,
                        "unresolved graph reference; member set to null"
                    );
                    Value::Null
                }
            });
        }

        Ok(match &record.value {
            WireValue::Null => Value::Null,
            WireValue::Bool(v) => Value::Bool(*v),
            WireValue::Int(v) => Value::Int(*v),
            WireValue::UInt(v) => Value::UInt(*v),
            WireValue::Float(v) => Value::Float(*v),
            WireValue::Str(v) => Value::Str(v.clone()),
            WireValue::Bytes(v) => Value::Bytes(v.clone()),
            WireValue::List(items) => Value::List(
                items
                    .iter()
                    .map(|item| self.decode_record(context, item))
                    .collect::<Result<Vec<_>>>()?,
            ),
            WireValue::Model(wire) => Value::Model(self.decode_model(context, wire, record.graph_id)?),
        })
    }

    fn decode_model(&self, context: &mut SerializationContext<'_>, wire: &WireModel, graph_id: u32) -> Result<ModelRef> {
        let instance = self.registry.create(&wire.type_name)?;
        if graph_id != 0 && !context.references_mut().register_manually(graph_id, &instance) {
            tracing::warn!(graph_id, type_name = %wire.type_name, "graph id already bound; keeping the earlier instance");
        }

        let entry = self.catalog.entry(&instance)?;
        let depth = context.depth() + 1;
        self.populate_model(&instance, entry, &wire.members, context.references_mut(), depth, Walk::FULL)?;
        Ok(instance)
    }
}
