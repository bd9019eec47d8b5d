//! The binary format driver.
//!
//! Payloads are encoded with bincode (standard config) through its serde API,
//! optionally compressed, and framed as described in [`crate::format`].

use std::io::{Read, Write};

use crate::compression::{Compressor, CompressorRegistry, NoCompression};
use crate::error::Result;
use crate::format::{FormatDriver, FrameHeader, MetaByte, Payload};

/// Bincode-backed [`FormatDriver`].
#[derive(Debug)]
pub struct BinaryFormat {
    compressors: CompressorRegistry,
    compression_id: u8,
}

impl BinaryFormat {
    /// A driver writing uncompressed frames.
    pub fn new() -> Self {
        Self {
            compressors: CompressorRegistry::new(),
            compression_id: NoCompression.id(),
        }
    }

    /// Selects the compressor used for writing. Reading always honours the id
    /// stored in the frame.
    ///
    /// # Errors
    /// `GraphError::Compression` when the id is not registered.
    pub fn with_compression(mut self, compression_id: u8) -> Result<Self> {
        self.compressors.get(compression_id)?;
        self.compression_id = compression_id;
        Ok(self)
    }

    /// Id of the compressor used for writing.
    pub fn compression_id(&self) -> u8 {
        self.compression_id
    }

    /// Encodes a payload to the stored (possibly compressed) byte form.
    pub fn encode(&self, payload: &Payload) -> Result<Vec<u8>> {
        let raw = bincode::serde::encode_to_vec(payload, bincode::config::standard())?;
        let compressor = self.compressors.get(self.compression_id)?;
        Ok(compressor.compress(&raw)?.into_owned())
    }

    /// Decodes the stored byte form written with compressor `compression_id`.
    pub fn decode(&self, stored: &[u8], compression_id: u8) -> Result<Payload> {
        let compressor = self.compressors.get(compression_id)?;
        let raw = compressor.decompress(stored)?;
        let (payload, _) = bincode::serde::decode_from_slice(&raw, bincode::config::standard())?;
        Ok(payload)
    }
}

impl Default for BinaryFormat {
    fn default() -> Self {
        Self::new()
    }
}

impl FormatDriver for BinaryFormat {
    fn write_payload(&self, payload: &Payload, flat: bool, writer: &mut dyn Write) -> Result<()> {
        let stored = self.encode(payload)?;
        let header = FrameHeader::for_payload(MetaByte::new(flat, self.compression_id), &stored);
        tracing::trace!(
            type_name = %payload.type_name,
            bytes = stored.len(),
            compression = self.compression_id,
            "writing frame"
        );
        header.write_frame(&stored, writer)
    }

    fn read_payload(&self, reader: &mut dyn Read) -> Result<(Payload, bool)> {
        let (header, stored) = FrameHeader::read_frame(reader)?;
        let payload = self.decode(&stored, header.meta.compression_method())?;
        Ok((payload, header.meta.is_flat()))
    }
}
