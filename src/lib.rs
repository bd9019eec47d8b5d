//! # RefGraph
//!
//! Graph-aware serialization of in-memory object models.
//!
//! ## Overview
//!
//! RefGraph writes an object graph, not a tree. Models expose their members
//! through the [`Model`] trait (usually derived), and the engine walks the graph
//! from a root, writing each distinct instance once. Later occurrences of the
//! same instance are written as a back-reference to its graph id, so shared
//! instances stay shared and cycles terminate.
//!
//! ### Key Features
//!
//! *   **Reference Identity:** Shared instances and cycles round-trip to the same
//!     shape, including self-references.
//! *   **Member Catalog:** Which members participate is decided once per type from
//!     the derive attributes and cached.
//! *   **Serializer Modifiers:** Pluggable hooks can skip members, rewrite values
//!     on the way out and restore them on the way in.
//! *   **Lenient Decoding:** Unknown members are ignored and a member that fails
//!     to decode is skipped, so old payloads keep loading as types evolve.
//! *   **Compact Frames:** Bincode payloads in a checksummed frame, with optional
//!     LZ4 compression (feature: `lz4_flex`).
//!
//! ## Architecture
//!
//! A call to [`ModelSerializer::serialize`] proceeds as follows:
//!
//! 1. The [`MemberCatalog`] yields the serializable members and the modifier
//!    chain for the root's type.
//! 2. A [`SerializationContext`] is opened for the object. Modifiers run
//!    `on_serializing`, then each member is read, passed through the chain and
//!    encoded as a [`PropertyValue`] record.
//! 3. Model values consult the call's [`ReferenceManager`]: the first
//!    occurrence recurses with a nested context, later ones become references.
//! 4. The root record list is handed to the [`FormatDriver`].
//!
//! Deserialization mirrors this, with the modifier chain reversed and fresh
//! instances created through the [`TypeRegistry`].
//!
//! ### Frame Format
//!
//! ```text
//! [Magic "RGF1"] [Version u16] [MetaByte] [Length u64] [XxHash64 u64] [Payload]
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use refgraph::{Model, ModelSerializer, Shared};
//!
//! #[derive(Default, Model)]
//! struct Node {
//!     label: String,
//!     next: Option<Shared<Node>>,
//! }
//!
//! let a = Shared::new(Node { label: "a".into(), next: None });
//! let b = Shared::new(Node { label: "b".into(), next: Some(a.clone()) });
//! a.borrow_mut().next = Some(b.clone());
//!
//! let serializer = ModelSerializer::new();
//! let mut bytes = Vec::new();
//! serializer.serialize(&a.handle(), &mut bytes)?;
//!
//! let copy: Shared<Node> = serializer.deserialize(&mut bytes.as_slice())?;
//! let next = copy.borrow().next.clone().expect("b");
//! let back = next.borrow().next.clone().expect("a");
//! assert!(back.ptr_eq(&copy));
//!
//! // Break the cycles so the Rc graphs can be freed.
//! a.borrow_mut().next = None;
//! copy.borrow_mut().next = None;
//! # Ok::<(), refgraph::GraphError>(())
//! ```
//!
//! Derived models need `Default`, since loading starts from a blank instance:
//!
//! ```compile_fail
//! #[derive(refgraph::Model)]
//! struct NoDefault {
//!     label: String,
//! }
//! ```
//!
//! ### Safety and Error Handling
//!
//! * **Encapsulated Unsafe:** `unsafe` is used only to memory-map files in
//!   [`RefGraph::load`].
//! * **No Panics:** No `unwrap()` or `panic!()` calls in the library (enforced by clippy lints).
//! * **Comprehensive Errors:** All failures correspond to a [`GraphError`] type.

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![warn(missing_docs)]

// Lets the derive's `::refgraph` paths resolve inside this crate.
extern crate self as refgraph;

// --- PUBLIC API MODULES ---
pub mod api;
pub mod binary;
pub mod catalog;
pub mod collection;
pub mod compression;
pub mod context;
pub mod error;
pub mod format;
pub mod inspector;
pub mod member;
pub mod model;
pub mod modifier;
pub mod references;
pub mod registry;
pub mod serializer;
pub mod value;

// --- RE-EXPORTS ---

#[cfg(feature = "lz4_flex")]
pub use compression::Lz4Compressor;
pub use compression::{Compressor, NoCompression};

pub use api::{RefGraph, RefGraphBuilder};
pub use binary::BinaryFormat;
pub use catalog::{CatalogEntry, MemberCatalog};
pub use collection::ModelList;
pub use context::{ContextMode, SerializationContext};
pub use error::{GraphError, Result};
pub use format::{FormatDriver, Payload, PropertyValue, WireModel, WireValue};
pub use inspector::{PayloadInspector, PayloadReport, RecordInfo};
pub use member::MemberValue;
pub use model::{
    COLLECTION_MEMBER_NAME, MemberDescriptor, MemberGroup, Model, ModelKind, ModelRef, ModelType, Shared,
};
pub use modifier::SerializerModifier;
pub use references::{ReferenceInfo, ReferenceManager};
pub use registry::TypeRegistry;
pub use serializer::{ModelSerializer, SerializerOptions};
pub use value::{FromValue, IntoValue, Value};

// Re-export the derive macro so it is accessible as `refgraph::Model`
pub use refgraph_derive::Model;
