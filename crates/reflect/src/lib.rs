//! Schema reflection and wire-format encoding for protopack.
//!
//! A reflection tree (namespaces, message types, enums, services, fields)
//! is built programmatically or from the JSON schema dialect, resolved once
//! to bind symbolic type references, and then drives the encoder: message
//! values go in as dynamic [`ProtoValue`]s and come out as Protocol Buffers
//! wire-format bytes.
//!
//! # Example
//!
//! ```
//! use protopack_buffers::Writer;
//! use protopack_reflect::{ProtoValue, Root};
//! use serde_json::json;
//!
//! let root = Root::from_json(&json!({
//!     "nested": {
//!         "Point": {"fields": {
//!             "x": {"type": "int32", "id": 1},
//!             "y": {"type": "int32", "id": 2},
//!         }},
//!     },
//! })).unwrap();
//! root.resolve_all().unwrap();
//!
//! let point = root.lookup_type("Point").unwrap();
//! let mut writer = Writer::new();
//! point.encode(&ProtoValue::from(json!({"x": 150, "y": 1})), &mut writer).unwrap();
//! assert_eq!(writer.finish(), vec![0x08, 0x96, 0x01, 0x10, 0x01]);
//! ```

mod enums;
mod error;
mod field;
mod message;
mod namespace;
mod node;
mod root;
mod scalar;
mod service;
mod value;

pub use error::ReflectError;
pub use field::{JsonOptions, LongMode};
pub use node::{FieldKind, Node, NodeKind, Rule};
pub use root::Root;
pub use scalar::ScalarType;
pub use value::ProtoValue;
