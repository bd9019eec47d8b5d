//! Pluggable payload compression.
//!
//! The compressor id is stored in the frame's `MetaByte` (bits 1-3), so a reader
//! picks the right algorithm without any out-of-band configuration.

use std::borrow::Cow;

use crate::error::{GraphError, Result};

/// Id of the LZ4 compressor in the frame's `MetaByte`.
pub const LZ4_ID: u8 = 1;

/// Interface for compression algorithms.
pub trait Compressor: Send + Sync + std::fmt::Debug {
    /// Unique id (0-7). 0 is reserved for no compression.
    fn id(&self) -> u8;

    /// Compresses the data, borrowing the input when nothing changes.
    fn compress<'a>(&self, data: &'a [u8]) -> Result<Cow<'a, [u8]>>;

    /// Restores the original bytes.
    fn decompress<'a>(&self, data: &'a [u8]) -> Result<Cow<'a, [u8]>>;
}

/// Pass-through compressor (id 0).
#[derive(Debug, Clone, Copy)]
pub struct NoCompression;

impl Compressor for NoCompression {
    fn id(&self) -> u8 {
        0
    }

    fn compress<'a>(&self, data: &'a [u8]) -> Result<Cow<'a, [u8]>> {
        Ok(Cow::Borrowed(data))
    }

    fn decompress<'a>(&self, data: &'a [u8]) -> Result<Cow<'a, [u8]>> {
        Ok(Cow::Borrowed(data))
    }
}

#[cfg(feature = "lz4_flex")]
/// LZ4 block compressor (id 1), size-prepended.
#[derive(Debug, Clone, Copy)]
pub struct Lz4Compressor;

#[cfg(feature = "lz4_flex")]
impl Compressor for Lz4Compressor {
    fn id(&self) -> u8 {
        LZ4_ID
    }

    fn compress<'a>(&self, data: &'a [u8]) -> Result<Cow<'a, [u8]>> {
        Ok(Cow::Owned(lz4_flex::compress_prepend_size(data)))
    }

    fn decompress<'a>(&self, data: &'a [u8]) -> Result<Cow<'a, [u8]>> {
        lz4_flex::decompress_size_prepended(data)
            .map(Cow::Owned)
            .map_err(|e| GraphError::Compression(e.to_string()))
    }
}

/// Maps compressor ids to implementations.
#[derive(Debug)]
pub struct CompressorRegistry {
    algorithms: Vec<Option<Box<dyn Compressor>>>,
}

impl CompressorRegistry {
    /// Creates a registry with the built-in algorithms.
    ///
    /// *   ID 0: `NoCompression`
    /// *   ID 1: `Lz4Compressor` (with the `lz4_flex` feature)
    pub fn new() -> Self {
        let mut reg = Self {
            algorithms: (0..8).map(|_| None).collect(),
        };
        reg.register(Box::new(NoCompression));
        #[cfg(feature = "lz4_flex")]
        reg.register(Box::new(Lz4Compressor));
        reg
    }

    /// Registers a compressor under its id, replacing any previous one.
    /// Ids outside 0-7 cannot be stored in a frame and are rejected.
    pub fn register(&mut self, algo: Box<dyn Compressor>) -> bool {
        match self.algorithms.get_mut(usize::from(algo.id())) {
            Some(slot) => {
                *slot = Some(algo);
                true
            }
            None => false,
        }
    }

    /// Returns true when `id` is available.
    pub fn contains(&self, id: u8) -> bool {
        self.get(id).is_ok()
    }

    /// Retrieves a compressor by id.
    ///
    /// # Errors
    /// Returns `GraphError::Compression` if the id is not registered.
    pub fn get(&self, id: u8) -> Result<&dyn Compressor> {
        self.algorithms
            .get(usize::from(id))
            .and_then(|slot| slot.as_deref())
            .ok_or_else(|| {
                GraphError::Compression(format!("Algorithm ID {id} is not registered or available"))
            })
    }
}

impl Default for CompressorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
