use thiserror::Error;

/// Error type for schema construction, resolution, and encoding.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ReflectError {
    #[error("invalid name {0:?}")]
    InvalidName(String),
    #[error("invalid rule {0:?}")]
    InvalidRule(String),
    #[error("invalid map key type {0:?}")]
    InvalidKeyType(String),
    #[error("invalid schema json: {0}")]
    InvalidJson(String),
    #[error("duplicate name {name:?} in {owner:?}")]
    NameConflict { owner: String, name: String },
    #[error("{name:?} is not a member of {owner:?}")]
    NotAMember { owner: String, name: String },
    #[error("duplicate field id {id} in {owner:?}")]
    DuplicateId { owner: String, id: u32 },
    #[error("field {0:?} at namespace level must declare an extended type")]
    OrphanField(String),
    #[error("{name:?} is not a {expected}")]
    WrongKind { name: String, expected: &'static str },
    #[error("unresolvable field type {type_name:?} for {field:?}")]
    UnresolvableType { field: String, type_name: String },
    #[error("no such type: {0:?}")]
    MissingType(String),
    #[error("no such enum: {0:?}")]
    MissingEnum(String),
    #[error("detached node {0:?} cannot resolve type references")]
    Detached(String),
    #[error("wrong value kind for {context}: expected {expected}")]
    ValueType { context: String, expected: &'static str },
    #[error("{0} does not fit in a json number")]
    LongOverflow(String),
}
