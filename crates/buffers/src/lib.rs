//! Binary buffer utilities for protopack.
//!
//! This crate provides the byte-emission layer of the protopack encoder:
//!
//! - [`Writer`] - Appends Protocol Buffers wire-format primitives (varints,
//!   little-endian fixed widths, length-delimited bytes/strings) to a
//!   chunked, auto-growing buffer, with a fork/reset/finish snapshot stack
//!   for one-pass length-delimited sub-messages.
//! - [`zigzag`] - The 32/64-bit zig-zag integer maps used by `sint32` and
//!   `sint64`.
//!
//! # Example
//!
//! ```
//! use protopack_buffers::Writer;
//!
//! let mut writer = Writer::new();
//! writer.uint32(150);
//! assert_eq!(writer.finish(), vec![0x96, 0x01]);
//!
//! // Length-delimited sub-stream without precomputing its length:
//! let mut writer = Writer::new();
//! writer.fork();
//! writer.uint32(1).uint32(2);
//! let body = writer.finish();
//! writer.tag(3, 2).bytes(&body);
//! assert_eq!(writer.finish(), vec![0x1A, 0x02, 0x01, 0x02]);
//! ```

mod writer;
pub mod zigzag;

pub use writer::{Writer, DEFAULT_CHUNK};

/// Wire type code for varint-framed fields.
pub const WIRE_VARINT: u32 = 0;
/// Wire type code for 8-byte little-endian fields.
pub const WIRE_FIXED64: u32 = 1;
/// Wire type code for length-delimited fields.
pub const WIRE_LEN: u32 = 2;
/// Wire type code for 4-byte little-endian fields.
pub const WIRE_FIXED32: u32 = 5;
