//! Defines the on-wire records and the binary frame layout.
//!
//! # Records
//! A model is written as a flat list of [`PropertyValue`] records
//! `(name, value, graph_id, graph_ref_id)`:
//!
//! - scalar values: both ids are 0,
//! - first occurrence of a model instance: `graph_id != 0`, value is the full
//!   [`WireValue::Model`] encoding,
//! - any later occurrence: `graph_ref_id != 0`, value is [`WireValue::Null`].
//!
//! List items are records with an empty name, so items get the same
//! reference treatment as members.
//!
//! # Frame
//! `[Magic "RGF1"] [Version u16] [MetaByte] [Payload Length u64] [Checksum u64] [Payload]`
//!
//! All integers are little endian. The checksum is XxHash64 (seed 0) over the
//! payload bytes as stored, i.e. after compression. A reader consumes exactly
//! one frame, so frames can be concatenated on one stream.

use std::hash::Hasher;
use std::io::{Read, Write};

use serde::{Deserialize, Serialize};
use twox_hash::XxHash64;

use crate::error::{GraphError, Result};

/// Magic bytes identifying a frame: "RGF1".
pub const MAGIC_BYTES: [u8; 4] = *b"RGF1";

/// Current frame version.
pub const FORMAT_VERSION: u16 = 1;

/// Magic(4) + Version(2) + Meta(1) + Length(8) + Checksum(8) = 23
pub const FRAME_HEADER_SIZE: usize = 23;

/// One on-wire record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyValue {
    /// Member name. Empty for list items.
    pub name: String,
    /// Encoded value.
    pub value: WireValue,
    /// Non-zero on the canonical occurrence of a model instance.
    pub graph_id: u32,
    /// Non-zero when the value is elided in favour of an earlier occurrence.
    pub graph_ref_id: u32,
}

impl PropertyValue {
    /// A record holding a plain value.
    pub fn scalar(name: impl Into<String>, value: WireValue) -> Self {
        Self {
            name: name.into(),
            value,
            graph_id: 0,
            graph_ref_id: 0,
        }
    }

    /// A record pointing back at an already written instance.
    pub fn reference(name: impl Into<String>, graph_ref_id: u32) -> Self {
        Self {
            name: name.into(),
            value: WireValue::Null,
            graph_id: 0,
            graph_ref_id,
        }
    }
}

/// Encoded value of a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WireValue {
    /// Absent value, or elided by a reference.
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Unsigned integer.
    UInt(u64),
    /// Floating point number.
    Float(f64),
    /// String.
    Str(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// Items, as records with empty names.
    List(Vec<PropertyValue>),
    /// A nested model.
    Model(WireModel),
}

impl WireValue {
    /// Short name of the variant, for reports and diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::UInt(_) => "uint",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::List(_) => "list",
            Self::Model(_) => "model",
        }
    }
}

/// Full encoding of a nested model instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireModel {
    /// Wire name of the instance's type.
    pub type_name: String,
    /// Its member records.
    pub members: Vec<PropertyValue>,
}

/// The root record list of one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    /// Wire name of the root type.
    pub type_name: String,
    /// Root member records.
    pub members: Vec<PropertyValue>,
    /// Graph id of the root object itself. 0 when the root is not tracked.
    pub graph_id: u32,
}

/// Configuration flags of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetaByte(u8);

impl MetaByte {
    const FLAT_MASK: u8 = 0b0000_0001; // Bit 0
    const COMPRESSION_MASK: u8 = 0b0000_1110; // Bits 1-3

    /// Creates a new MetaByte.
    pub fn new(is_flat: bool, compression_id: u8) -> Self {
        let mut byte = 0;
        if is_flat {
            byte |= Self::FLAT_MASK;
        }
        byte |= (compression_id & 0x07) << 1;
        Self(byte)
    }

    /// Decodes the byte.
    pub fn from_byte(byte: u8) -> Self {
        Self(byte)
    }

    /// True for payloads written by `serialize_members`.
    pub fn is_flat(&self) -> bool {
        (self.0 & Self::FLAT_MASK) != 0
    }

    /// Compression algorithm id (0-7).
    pub fn compression_method(&self) -> u8 {
        (self.0 & Self::COMPRESSION_MASK) >> 1
    }

    /// Raw byte.
    pub fn as_u8(&self) -> u8 {
        self.0
    }
}

/// Fixed-size header preceding every payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Format flags.
    pub meta: MetaByte,
    /// Stored payload size in bytes.
    pub payload_len: u64,
    /// XxHash64 of the stored payload.
    pub checksum: u64,
}

impl FrameHeader {
    /// Builds the header for a stored payload.
    pub fn for_payload(meta: MetaByte, stored: &[u8]) -> Self {
        Self {
            meta,
            payload_len: stored.len() as u64,
            checksum: checksum(stored),
        }
    }

    /// Serializes the header.
    pub fn to_bytes(&self) -> [u8; FRAME_HEADER_SIZE] {
        let mut buf = [0u8; FRAME_HEADER_SIZE];
        buf[0..4].copy_from_slice(&MAGIC_BYTES);
        buf[4..6].copy_from_slice(&FORMAT_VERSION.to_le_bytes());
        buf[6] = self.meta.as_u8();
        buf[7..15].copy_from_slice(&self.payload_len.to_le_bytes());
        buf[15..23].copy_from_slice(&self.checksum.to_le_bytes());
        buf
    }

    /// Parses and validates a header.
    pub fn from_bytes(bytes: &[u8; FRAME_HEADER_SIZE]) -> Result<Self> {
        if bytes[0..4] != MAGIC_BYTES {
            return Err(GraphError::Format("Invalid Magic Bytes".into()));
        }
        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version != FORMAT_VERSION {
            return Err(GraphError::Format(format!("Unsupported version: {version}")));
        }
        Ok(Self {
            meta: MetaByte::from_byte(bytes[6]),
            payload_len: u64::from_le_bytes(le_array(&bytes[7..15])),
            checksum: u64::from_le_bytes(le_array(&bytes[15..23])),
        })
    }

    /// Writes the header followed by the stored payload.
    pub fn write_frame(&self, stored: &[u8], writer: &mut dyn Write) -> Result<()> {
        writer.write_all(&self.to_bytes())?;
        writer.write_all(stored)?;
        Ok(())
    }

    /// Reads one frame, returning the header and the verified stored payload.
    pub fn read_frame(reader: &mut dyn Read) -> Result<(Self, Vec<u8>)> {
        let mut raw = [0u8; FRAME_HEADER_SIZE];
        reader.read_exact(&mut raw).map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => GraphError::Format("Stream smaller than frame header".into()),
            _ => GraphError::from(e),
        })?;
        let header = Self::from_bytes(&raw)?;

        // Read through `take` so a bogus length cannot force a huge allocation.
        let mut stored = Vec::new();
        reader.take(header.payload_len).read_to_end(&mut stored)?;
        if stored.len() as u64 != header.payload_len {
            return Err(GraphError::Format(format!(
                "Truncated payload: expected {} bytes, got {}",
                header.payload_len,
                stored.len()
            )));
        }
        if checksum(&stored) != header.checksum {
            return Err(GraphError::Format("Payload checksum mismatch".into()));
        }
        Ok((header, stored))
    }
}

/// XxHash64 (seed 0) of `data`.
pub fn checksum(data: &[u8]) -> u64 {
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(data);
    hasher.finish()
}

fn le_array(bytes: &[u8]) -> [u8; 8] {
    bytes.try_into().unwrap_or([0; 8])
}

/// A format backend: turns a record list into bytes and back.
///
/// Framing is private to the driver; the orchestrator only ever sees
/// [`Payload`] values.
pub trait FormatDriver: Send + Sync + std::fmt::Debug {
    /// Writes one payload to the caller's stream.
    fn write_payload(&self, payload: &Payload, flat: bool, writer: &mut dyn Write) -> Result<()>;

    /// Reads one payload from the caller's stream.
    ///
    /// Returns the payload and whether it was written as a flat member list.
    fn read_payload(&self, reader: &mut dyn Read) -> Result<(Payload, bool)>;
}
