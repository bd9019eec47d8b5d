//! Tools for inspecting the record structure of a frame.
//! Useful for checking which instances were written once and which were
//! elided as references.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::Serialize;

use crate::binary::BinaryFormat;
use crate::error::Result;
use crate::format::{FrameHeader, PropertyValue, WireValue};

/// A structural report of one frame.
#[derive(Debug, Serialize)]
pub struct PayloadReport {
    /// Wire name of the root type.
    pub type_name: String,
    /// Graph id of the root object.
    pub graph_id: u32,
    /// Whether the frame holds a flat member list.
    pub is_flat: bool,
    /// Compression algorithm used.
    pub compression_algo: String,
    /// Size of the stored payload.
    pub stored_size: u64,
    /// Number of fully written model instances, root included.
    pub instance_count: usize,
    /// Number of records elided in favour of a graph reference.
    pub reference_count: usize,
    /// The root's records.
    pub records: Vec<RecordInfo>,
}

/// One record in the tree.
#[derive(Debug, Serialize)]
pub struct RecordInfo {
    /// Member name. Empty for list items.
    pub name: String,
    /// Kind of the encoded value (e.g. "int", "model", "list").
    pub kind: String,
    /// Graph id, for the canonical occurrence of an instance.
    pub graph_id: u32,
    /// Referenced graph id, for elided occurrences.
    pub graph_ref_id: u32,
    /// Type of a nested model.
    pub type_name: Option<String>,
    /// Nested records of models and lists.
    pub children: Vec<RecordInfo>,
}

/// The frame inspector tool.
#[derive(Debug)]
pub struct PayloadInspector;

impl PayloadInspector {
    /// Analyzes the first frame of a file.
    pub fn inspect<P: AsRef<Path>>(path: P) -> Result<PayloadReport> {
        let mut reader = BufReader::new(File::open(path)?);
        Self::inspect_reader(&mut reader)
    }

    /// Analyzes the frame at the start of `bytes`.
    pub fn inspect_bytes(bytes: &[u8]) -> Result<PayloadReport> {
        let mut reader = bytes;
        Self::inspect_reader(&mut reader)
    }

    /// Analyzes the next frame of a stream.
    pub fn inspect_reader(reader: &mut dyn Read) -> Result<PayloadReport> {
        let (header, stored) = FrameHeader::read_frame(reader)?;
        let algo_id = header.meta.compression_method();
        let payload = BinaryFormat::new().decode(&stored, algo_id)?;

        let records: Vec<RecordInfo> = payload.members.iter().map(Self::inspect_record).collect();
        let (nested_instances, reference_count) = count(&records);
        let root = usize::from(payload.graph_id != 0);

        Ok(PayloadReport {
            type_name: payload.type_name,
            graph_id: payload.graph_id,
            is_flat: header.meta.is_flat(),
            compression_algo: match algo_id {
                0 => "None".to_string(),
                1 => "LZ4".to_string(),
                _ => format!("Unknown({algo_id})"),
            },
            stored_size: header.payload_len,
            instance_count: nested_instances + root,
            reference_count,
            records,
        })
    }

    fn inspect_record(record: &PropertyValue) -> RecordInfo {
        let (type_name, children) = match &record.value {
            WireValue::Model(model) => (
                Some(model.type_name.clone()),
                model.members.iter().map(Self::inspect_record).collect(),
            ),
            WireValue::List(items) => (None, items.iter().map(Self::inspect_record).collect()),
            _ => (None, Vec::new()),
        };

        let kind = if record.graph_ref_id != 0 {
            "reference".to_string()
        } else {
            record.value.kind().to_string()
        };

        RecordInfo {
            name: record.name.clone(),
            kind,
            graph_id: record.graph_id,
            graph_ref_id: record.graph_ref_id,
            type_name,
            children,
        }
    }
}

impl PayloadReport {
    /// Finds a root record by name.
    pub fn record(&self, name: &str) -> Option<&RecordInfo> {
        self.records.iter().find(|r| r.name == name)
    }
}

impl RecordInfo {
    /// Finds a child record by name.
    pub fn child(&self, name: &str) -> Option<&RecordInfo> {
        self.children.iter().find(|r| r.name == name)
    }
}

fn count(records: &[RecordInfo]) -> (usize, usize) {
    records.iter().fold((0, 0), |(instances, references), record| {
        let (nested_instances, nested_references) = count(&record.children);
        (
            instances + usize::from(record.graph_id != 0) + nested_instances,
            references + usize::from(record.graph_ref_id != 0) + nested_references,
        )
    })
}

impl std::fmt::Display for PayloadReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== REFGRAPH INSPECTOR REPORT ===")?;
        writeln!(f, "Root Type:      {} (#{})", self.type_name, self.graph_id)?;
        writeln!(f, "Flat:           {}", self.is_flat)?;
        writeln!(f, "Payload:        {}b | Algo: {}", self.stored_size, self.compression_algo)?;
        writeln!(
            f,
            "Instances:      {} | References: {}",
            self.instance_count, self.reference_count
        )?;
        writeln!(f, "\n[RECORDS]")?;
        for (i, record) in self.records.iter().enumerate() {
            record.fmt_recursive(f, "", i == self.records.len() - 1)?;
        }
        Ok(())
    }
}

impl RecordInfo {
    fn fmt_recursive(&self, f: &mut std::fmt::Formatter<'_>, prefix: &str, is_last: bool) -> std::fmt::Result {
        let connector = if is_last { "└── " } else { "├── " };
        let child_prefix = if is_last { "    " } else { "│   " };
        let name = if self.name.is_empty() { "[item]" } else { &self.name };

        let detail = match (&self.type_name, self.graph_id, self.graph_ref_id) {
            (_, _, id) if id != 0 => format!(" -> #{id}"),
            (Some(type_name), id, _) => format!(" {type_name} #{id}"),
            _ => String::new(),
        };

        writeln!(f, "{prefix}{connector}{name}: {}{detail}", self.kind)?;

        for (i, child) in self.children.iter().enumerate() {
            let is_last_child = i == self.children.len() - 1;
            child.fmt_recursive(f, &format!("{prefix}{child_prefix}"), is_last_child)?;
        }
        Ok(())
    }
}
