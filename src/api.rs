//! The high-level entry points: one-call save and load, and the builder for a
//! configured [`ModelSerializer`].

use std::fs::File;
use std::io::{BufWriter, Cursor, Write};
use std::path::Path;
use std::sync::Arc;

use memmap2::Mmap;

use crate::binary::BinaryFormat;
use crate::catalog::MemberCatalog;
use crate::compression::LZ4_ID;
use crate::error::{GraphError, Result};
use crate::format::{FRAME_HEADER_SIZE, FormatDriver};
use crate::inspector::{PayloadInspector, PayloadReport};
use crate::model::{Model, ModelRef, Shared};
use crate::modifier::SerializerModifier;
use crate::registry::TypeRegistry;
use crate::serializer::{ModelSerializer, SerializerOptions};

/// The main entry point for saving and loading graphs with default options.
#[derive(Debug)]
pub struct RefGraph;

impl RefGraph {
    /// Starts configuring a serializer.
    pub fn builder() -> RefGraphBuilder {
        RefGraphBuilder::new()
    }

    /// Saves the graph rooted at `model` to a file.
    pub fn save<P: AsRef<Path>>(path: P, model: &ModelRef) -> Result<()> {
        ModelSerializer::new().save_file(path, model)
    }

    /// Loads a graph with root type `T` from a file.
    pub fn load<T: Model + Default, P: AsRef<Path>>(path: P) -> Result<Shared<T>> {
        ModelSerializer::new().load_file(path)
    }

    /// Serializes the graph rooted at `model` into a new buffer.
    pub fn to_bytes(model: &ModelRef) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        ModelSerializer::new().serialize(model, &mut buffer)?;
        Ok(buffer)
    }

    /// Deserializes a graph with root type `T` from a buffer.
    pub fn from_bytes<T: Model + Default>(bytes: &[u8]) -> Result<Shared<T>> {
        let mut reader = bytes;
        ModelSerializer::new().deserialize(&mut reader)
    }

    /// Reports the record structure of a serialized graph.
    pub fn inspect_bytes(bytes: &[u8]) -> Result<PayloadReport> {
        PayloadInspector::inspect_bytes(bytes)
    }
}

impl<F: FormatDriver> ModelSerializer<F> {
    /// Serializes the graph rooted at `model` to a file, replacing it.
    pub fn save_file<P: AsRef<Path>>(&self, path: P, model: &ModelRef) -> Result<()> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path)?);
        self.serialize(model, &mut writer)?;
        writer.flush()?;
        tracing::debug!(path = %path.display(), "graph saved");
        Ok(())
    }

    /// Loads a graph with root type `T` from a file.
    pub fn load_file<T: Model + Default, P: AsRef<Path>>(&self, path: P) -> Result<Shared<T>> {
        let mmap = map_file(path.as_ref())?;
        self.deserialize(&mut Cursor::new(&mmap[..]))
    }

    /// Loads a graph from a file onto an existing root.
    pub fn load_file_into<P: AsRef<Path>>(&self, path: P, model: &ModelRef) -> Result<()> {
        let mmap = map_file(path.as_ref())?;
        self.deserialize_into(model, &mut Cursor::new(&mmap[..]))
    }

    /// Loads a graph of a registered root type from a file.
    pub fn load_file_any<P: AsRef<Path>>(&self, path: P) -> Result<ModelRef> {
        let mmap = map_file(path.as_ref())?;
        self.deserialize_any(&mut Cursor::new(&mmap[..]))
    }
}

fn map_file(path: &Path) -> Result<Mmap> {
    let file = File::open(path)?;
    if file.metadata()?.len() < FRAME_HEADER_SIZE as u64 {
        return Err(GraphError::Format("File smaller than frame header".into()));
    }

    // Safety: the map is read-only; a concurrent writer to the file would
    // surface as a checksum mismatch, not as undefined reads of our own data.
    #[allow(unsafe_code)]
    let mmap = unsafe { Mmap::map(&file)? };
    tracing::trace!(path = %path.display(), bytes = mmap.len(), "mapped file");
    Ok(mmap)
}

/// Configures a [`ModelSerializer`].
///
/// ```
/// use refgraph::RefGraph;
///
/// let serializer = RefGraph::builder().verify_root_type(true).build().unwrap();
/// assert!(serializer.options().verify_root_type);
/// ```
#[derive(Debug)]
pub struct RefGraphBuilder {
    options: SerializerOptions,
    catalog: Arc<MemberCatalog>,
    registry: Arc<TypeRegistry>,
    error: Option<GraphError>,
}

impl RefGraphBuilder {
    fn new() -> Self {
        Self {
            options: SerializerOptions::default(),
            catalog: Arc::new(MemberCatalog::new()),
            registry: Arc::new(TypeRegistry::new()),
            error: None,
        }
    }

    /// Compresses payloads with LZ4 (requires the `lz4_flex` feature).
    pub fn compression(mut self, enabled: bool) -> Self {
        self.options.compression = enabled;
        self
    }

    /// Rejects payloads whose root type differs from the target's.
    pub fn verify_root_type(mut self, enabled: bool) -> Self {
        self.options.verify_root_type = enabled;
        self
    }

    /// Shares an existing member catalog.
    pub fn catalog(mut self, catalog: Arc<MemberCatalog>) -> Self {
        self.catalog = catalog;
        self
    }

    /// Shares an existing type registry.
    pub fn registry(mut self, registry: Arc<TypeRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Registers `T` (and everything reachable from it) for
    /// [`ModelSerializer::deserialize_any`].
    pub fn register<T: Model>(self) -> Self {
        self.registry.register::<T>();
        self
    }

    /// Appends a runtime modifier to `T`'s chain.
    pub fn modifier<T: Model>(mut self, modifier: Arc<dyn SerializerModifier>) -> Self {
        if let Err(e) = self.catalog.register_modifier::<T>(modifier) {
            self.error.get_or_insert(e);
        }
        self
    }

    /// Builds the serializer.
    ///
    /// # Errors
    /// `GraphError::Compression` when compression is requested but not
    /// compiled in, or the first error met while configuring.
    pub fn build(self) -> Result<ModelSerializer> {
        if let Some(e) = self.error {
            return Err(e);
        }
        let mut format = BinaryFormat::new();
        if self.options.compression {
            format = format.with_compression(LZ4_ID)?;
        }
        Ok(ModelSerializer::from_parts(self.catalog, self.registry, format, self.options))
    }
}
