//! The static scalar types table.

use protopack_buffers::{WIRE_FIXED32, WIRE_FIXED64, WIRE_LEN, WIRE_VARINT};

use crate::value::ProtoValue;

/// The fifteen Protocol Buffers scalar wire types.
///
/// The table maps each scalar to its default value, wire type code, and the
/// `is_long` / `is_packable` predicates the field encoder dispatches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    Double,
    Float,
    Int32,
    Uint32,
    Sint32,
    Fixed32,
    Sfixed32,
    Int64,
    Uint64,
    Sint64,
    Fixed64,
    Sfixed64,
    Bool,
    String,
    Bytes,
}

impl ScalarType {
    /// Looks up a scalar by its type keyword. Returns `None` for anything
    /// else (the caller then treats the name as a symbolic type reference).
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "double" => Self::Double,
            "float" => Self::Float,
            "int32" => Self::Int32,
            "uint32" => Self::Uint32,
            "sint32" => Self::Sint32,
            "fixed32" => Self::Fixed32,
            "sfixed32" => Self::Sfixed32,
            "int64" => Self::Int64,
            "uint64" => Self::Uint64,
            "sint64" => Self::Sint64,
            "fixed64" => Self::Fixed64,
            "sfixed64" => Self::Sfixed64,
            "bool" => Self::Bool,
            "string" => Self::String,
            "bytes" => Self::Bytes,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Double => "double",
            Self::Float => "float",
            Self::Int32 => "int32",
            Self::Uint32 => "uint32",
            Self::Sint32 => "sint32",
            Self::Fixed32 => "fixed32",
            Self::Sfixed32 => "sfixed32",
            Self::Int64 => "int64",
            Self::Uint64 => "uint64",
            Self::Sint64 => "sint64",
            Self::Fixed64 => "fixed64",
            Self::Sfixed64 => "sfixed64",
            Self::Bool => "bool",
            Self::String => "string",
            Self::Bytes => "bytes",
        }
    }

    /// Wire type code: 0 varint, 1 fixed64, 2 length-delimited, 5 fixed32.
    pub fn wire_type(self) -> u32 {
        match self {
            Self::Int32
            | Self::Uint32
            | Self::Sint32
            | Self::Int64
            | Self::Uint64
            | Self::Sint64
            | Self::Bool => WIRE_VARINT,
            Self::Double | Self::Fixed64 | Self::Sfixed64 => WIRE_FIXED64,
            Self::String | Self::Bytes => WIRE_LEN,
            Self::Float | Self::Fixed32 | Self::Sfixed32 => WIRE_FIXED32,
        }
    }

    /// True for the 8-byte integer family.
    pub fn is_long(self) -> bool {
        matches!(
            self,
            Self::Int64 | Self::Uint64 | Self::Sint64 | Self::Fixed64 | Self::Sfixed64
        )
    }

    /// True for every scalar that may appear in a packed repeated field
    /// (all numerics and bool; not string or bytes).
    pub fn is_packable(self) -> bool {
        !matches!(self, Self::String | Self::Bytes)
    }

    /// True for the unsigned integer family.
    pub fn is_unsigned(self) -> bool {
        matches!(self, Self::Uint32 | Self::Uint64 | Self::Fixed32 | Self::Fixed64)
    }

    /// True when the scalar may key a map field (any integral or string
    /// type; not float, double, or bytes).
    pub fn is_map_key(self) -> bool {
        !matches!(self, Self::Double | Self::Float | Self::Bytes)
    }

    /// The proto default for an absent field of this scalar type.
    pub fn default_value(self) -> ProtoValue {
        match self {
            Self::Double | Self::Float => ProtoValue::F64(0.0),
            Self::Int32 | Self::Sint32 | Self::Sfixed32 | Self::Int64 | Self::Sint64
            | Self::Sfixed64 => ProtoValue::I64(0),
            Self::Uint32 | Self::Fixed32 | Self::Uint64 | Self::Fixed64 => ProtoValue::U64(0),
            Self::Bool => ProtoValue::Bool(false),
            Self::String => ProtoValue::Str(String::new()),
            Self::Bytes => ProtoValue::Bytes(Vec::new()),
        }
    }
}
