//! Protocol Buffers wire-format encoding driven by runtime schema
//! reflection.
//!
//! The workspace splits into two layers, both re-exported here:
//!
//! - [`Writer`]: the chunked byte emitter for the binary wire format, with
//!   fork/reset/finish sub-stream support.
//! - [`Root`] and [`Node`]: the reflection tree (namespaces, message
//!   types, enums, services, fields) that classifies JSON schemas,
//!   resolves symbolic type references, and dispatches per-field encoding
//!   onto a writer.
//!
//! # Example
//!
//! ```
//! use protopack::{ProtoValue, Root, Writer};
//! use serde_json::json;
//!
//! let root = Root::from_json(&json!({
//!     "nested": {
//!         "Greeting": {"fields": {
//!             "text": {"type": "string", "id": 1},
//!             "times": {"type": "uint32", "id": 2},
//!         }},
//!     },
//! })).unwrap();
//! root.resolve_all().unwrap();
//!
//! let greeting = root.lookup_type("Greeting").unwrap();
//! let mut writer = Writer::new();
//! greeting
//!     .encode(&ProtoValue::from(json!({"text": "hi", "times": 3})), &mut writer)
//!     .unwrap();
//! assert_eq!(writer.finish(), vec![0x0A, 0x02, b'h', b'i', 0x10, 0x03]);
//! ```

pub use protopack_buffers::{zigzag, Writer, DEFAULT_CHUNK};
pub use protopack_reflect::{
    FieldKind, JsonOptions, LongMode, Node, NodeKind, ProtoValue, ReflectError, Root, Rule,
    ScalarType,
};
