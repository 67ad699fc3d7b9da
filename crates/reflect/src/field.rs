//! Field descriptors: reference resolution, default computation, per-field
//! wire encoding, and JSON value conversion.

use std::sync::Weak;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use indexmap::IndexMap;
use protopack_buffers::{Writer, WIRE_LEN, WIRE_VARINT};
use serde_json::Value;

use crate::error::ReflectError;
use crate::namespace::parse_options;
use crate::node::{FieldKind, Node, NodeKind, Rule};
use crate::scalar::ScalarType;
use crate::value::ProtoValue;

/// How `json_convert` renders 64-bit integer scalars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LongMode {
    /// JSON numbers; values beyond 2^53 - 1 in magnitude are an error.
    #[default]
    Number,
    /// Decimal strings, signed or unsigned per the scalar.
    String,
}

/// Options for [`Node::json_convert`].
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonOptions {
    /// Substitute enum numbers with their symbolic names where known.
    pub enums_as_names: bool,
    pub longs: LongMode,
}

impl Node {
    /// The field's id, for field nodes.
    pub fn field_id(&self) -> Option<u32> {
        let inner = self.read();
        match inner.kind() {
            NodeKind::Field => Some(inner.field().id),
            _ => None,
        }
    }

    /// The field's declared type name, for field nodes.
    pub fn type_name(&self) -> Option<String> {
        let inner = self.read();
        match inner.kind() {
            NodeKind::Field => Some(inner.field().type_name.clone()),
            _ => None,
        }
    }

    /// The field's cardinality rule, for field nodes.
    pub fn rule(&self) -> Option<Rule> {
        let inner = self.read();
        match inner.kind() {
            NodeKind::Field => Some(inner.field().rule),
            _ => None,
        }
    }

    /// True for map fields.
    pub fn is_map(&self) -> bool {
        let inner = self.read();
        matches!(inner.kind(), NodeKind::Field) && inner.field().key_type.is_some()
    }

    /// The default computed by `resolve`.
    pub fn default_value(&self) -> Option<ProtoValue> {
        let inner = self.read();
        match inner.kind() {
            NodeKind::Field => inner.field().default_value.clone(),
            _ => None,
        }
    }

    /// The message or enum node the field's type resolved to.
    pub fn resolved_type(&self) -> Option<Node> {
        let inner = self.read();
        match inner.kind() {
            NodeKind::Field => inner.field().resolved_type.as_ref().and_then(Weak::upgrade).map(Node),
            _ => None,
        }
    }

    /// The sister field installed on the extended type, for extension
    /// declarations.
    pub fn extension_field(&self) -> Option<Node> {
        let inner = self.read();
        match inner.kind() {
            NodeKind::Field => inner
                .field()
                .extension_field
                .as_ref()
                .and_then(Weak::upgrade)
                .map(Node),
            _ => None,
        }
    }

    /// The declaring field, on an installed extension sister.
    pub fn declaring_field(&self) -> Option<Node> {
        let inner = self.read();
        match inner.kind() {
            NodeKind::Field => inner
                .field()
                .declaring_field
                .as_ref()
                .and_then(Weak::upgrade)
                .map(Node),
            _ => None,
        }
    }

    /// Binds the field's symbolic type and computes its default.
    ///
    /// A scalar keyword hits the static table; anything else resolves
    /// through the enclosing scope (the declaring field's scope for an
    /// installed extension sister). A field declaring `extend` also installs
    /// its sister on the target type here.
    pub(crate) fn resolve_field(&self) -> Result<(), ReflectError> {
        let (type_name, rule, is_map, has_extend, explicit_default, declaring) = {
            let inner = self.read();
            let body = inner.field();
            (
                body.type_name.clone(),
                body.rule,
                body.key_type.is_some(),
                body.extend.is_some(),
                inner.options.as_ref().and_then(|o| o.get("default").cloned()),
                body.declaring_field.as_ref().and_then(Weak::upgrade).map(Node),
            )
        };
        let context = self.full_name();
        let scope = match &declaring {
            Some(declaring) => declaring.parent(),
            None => self.parent(),
        };

        let (kind, resolved_type, type_default) = if let Some(scalar) =
            ScalarType::from_name(&type_name)
        {
            (FieldKind::Scalar(scalar), None, Some(scalar.default_value()))
        } else {
            let scope = scope.ok_or_else(|| ReflectError::Detached(context.clone()))?;
            match scope.lookup(&type_name) {
                Some(found) if found.kind() == NodeKind::Message => {
                    (FieldKind::Message, Some(found.downgrade()), None)
                }
                Some(found) if found.kind() == NodeKind::Enum => {
                    (FieldKind::Enum, Some(found.downgrade()), Some(ProtoValue::I64(0)))
                }
                _ => {
                    return Err(ReflectError::UnresolvableType {
                        field: context,
                        type_name,
                    })
                }
            }
        };

        let enum_node = resolved_type.as_ref().and_then(Weak::upgrade).map(Node);
        let default_value = if is_map {
            Some(ProtoValue::Map(IndexMap::new()))
        } else if rule == Rule::Repeated {
            Some(ProtoValue::List(Vec::new()))
        } else if let Some(json_default) = explicit_default {
            convert_default(kind, enum_node.as_ref(), &json_default, &context)?.or(type_default)
        } else {
            type_default
        };

        {
            let mut inner = self.write();
            let body = inner.field_mut();
            body.kind = Some(kind);
            body.resolved_type = resolved_type;
            body.default_value = default_value;
        }
        if has_extend {
            self.install_extension()?;
        }
        Ok(())
    }

    /// Installs the extension sister field on the extended type and links
    /// the pair. Idempotent.
    fn install_extension(&self) -> Result<(), ReflectError> {
        let (extend, id, type_name, rule, installed) = {
            let inner = self.read();
            let body = inner.field();
            (
                body.extend.clone().expect("extension field"),
                body.id,
                body.type_name.clone(),
                body.rule,
                body.extension_field.is_some(),
            )
        };
        if installed {
            return Ok(());
        }
        let context = self.full_name();
        let parent = self
            .parent()
            .ok_or_else(|| ReflectError::Detached(context.clone()))?;
        let target = match parent.lookup(&extend) {
            Some(found) if found.kind() == NodeKind::Message => found,
            _ => {
                return Err(ReflectError::UnresolvableType {
                    field: context,
                    type_name: extend,
                })
            }
        };
        // The sister carries the declaring field's full name.
        let sister = Node::field_full(context, id, type_name, rule, None)?;
        let options = self.read().options.clone();
        sister.set_options(options);
        sister.write().field_mut().declaring_field = Some(self.downgrade());
        target.add(sister.clone())?;
        self.write().field_mut().extension_field = Some(sister.downgrade());
        sister.resolve()
    }

    /// Encodes one present field value onto the writer.
    pub(crate) fn encode_field(
        &self,
        value: &ProtoValue,
        writer: &mut Writer,
    ) -> Result<(), ReflectError> {
        self.resolve()?;
        let (id, rule, kind, key_type, packed_option) = {
            let inner = self.read();
            let body = inner.field();
            (
                body.id,
                body.rule,
                body.kind.expect("field is resolved"),
                body.key_type,
                inner
                    .options
                    .as_ref()
                    .and_then(|o| o.get("packed"))
                    .and_then(Value::as_bool),
            )
        };
        let resolved = self.resolved_type();
        let context = self.full_name();

        if let Some(key_type) = key_type {
            return self.encode_map_entries(id, key_type, kind, resolved.as_ref(), value, writer, &context);
        }

        match rule {
            Rule::Repeated => {
                let items = value.as_list().ok_or_else(|| ReflectError::ValueType {
                    context: context.clone(),
                    expected: "list",
                })?;
                let packable = match kind {
                    FieldKind::Scalar(scalar) => scalar.is_packable(),
                    FieldKind::Enum => true,
                    FieldKind::Message => false,
                };
                if packable && packed_option.unwrap_or(true) {
                    writer.fork();
                    for item in items {
                        write_element(kind, resolved.as_ref(), item, writer, &context)?;
                    }
                    let body = writer.finish();
                    // An empty packed field emits nothing at all.
                    if !body.is_empty() {
                        writer.tag(id, WIRE_LEN).bytes(&body);
                    }
                } else {
                    for item in items {
                        self.encode_single(id, kind, resolved.as_ref(), item, writer, &context)?;
                    }
                }
                Ok(())
            }
            _ => self.encode_single(id, kind, resolved.as_ref(), value, writer, &context),
        }
    }

    fn encode_single(
        &self,
        id: u32,
        kind: FieldKind,
        resolved: Option<&Node>,
        value: &ProtoValue,
        writer: &mut Writer,
        context: &str,
    ) -> Result<(), ReflectError> {
        match kind {
            FieldKind::Message => {
                let target = resolved.ok_or_else(|| ReflectError::ValueType {
                    context: context.to_string(),
                    expected: "resolved message type",
                })?;
                writer.tag(id, WIRE_LEN);
                target.encode_delimited(value, writer)
            }
            FieldKind::Scalar(scalar) => {
                writer.tag(id, scalar.wire_type());
                write_scalar(scalar, value, writer, context)
            }
            FieldKind::Enum => {
                writer.tag(id, WIRE_VARINT);
                write_enum(resolved, value, writer, context)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn encode_map_entries(
        &self,
        id: u32,
        key_type: ScalarType,
        kind: FieldKind,
        resolved: Option<&Node>,
        value: &ProtoValue,
        writer: &mut Writer,
        context: &str,
    ) -> Result<(), ReflectError> {
        let entries = value.as_map().ok_or_else(|| ReflectError::ValueType {
            context: context.to_string(),
            expected: "map object",
        })?;
        for (key, item) in entries {
            writer.tag(id, WIRE_LEN);
            writer.fork();
            writer.tag(1, key_type.wire_type());
            write_map_key(key_type, key, writer, context)?;
            match kind {
                FieldKind::Message => {
                    let target = resolved.ok_or_else(|| ReflectError::ValueType {
                        context: context.to_string(),
                        expected: "resolved message type",
                    })?;
                    writer.tag(2, WIRE_LEN);
                    target.encode_delimited(item, writer)?;
                }
                FieldKind::Scalar(scalar) => {
                    writer.tag(2, scalar.wire_type());
                    write_scalar(scalar, item, writer, context)?;
                }
                FieldKind::Enum => {
                    writer.tag(2, WIRE_VARINT);
                    write_enum(resolved, item, writer, context)?;
                }
            }
            let body = writer.finish();
            writer.bytes(&body);
        }
        Ok(())
    }

    /// Converts an in-memory field value to JSON, honoring `opts`: enum
    /// numbers may render as names, 64-bit integers as strings or checked
    /// numbers, bytes as base64. Repeated and map fields convert
    /// elementwise.
    pub fn json_convert(
        &self,
        value: &ProtoValue,
        opts: JsonOptions,
    ) -> Result<Value, ReflectError> {
        self.resolve()?;
        let (rule, kind, is_map) = {
            let inner = self.read();
            let body = inner.field();
            (body.rule, body.kind.expect("field is resolved"), body.key_type.is_some())
        };
        let resolved = self.resolved_type();
        let context = self.full_name();

        if is_map {
            let entries = value.as_map().ok_or_else(|| ReflectError::ValueType {
                context: context.clone(),
                expected: "map object",
            })?;
            let mut out = serde_json::Map::new();
            for (key, item) in entries {
                out.insert(
                    key.clone(),
                    convert_single(kind, resolved.as_ref(), item, opts, &context)?,
                );
            }
            return Ok(Value::Object(out));
        }
        if rule == Rule::Repeated {
            let items = value.as_list().ok_or_else(|| ReflectError::ValueType {
                context: context.clone(),
                expected: "list",
            })?;
            return items
                .iter()
                .map(|item| convert_single(kind, resolved.as_ref(), item, opts, &context))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array);
        }
        convert_single(kind, resolved.as_ref(), value, opts, &context)
    }

    pub(crate) fn field_from_json(
        name: &str,
        entry: &serde_json::Map<String, Value>,
    ) -> Result<Node, ReflectError> {
        let id = entry
            .get("id")
            .and_then(Value::as_u64)
            .filter(|&n| n <= u32::MAX as u64)
            .ok_or_else(|| ReflectError::InvalidJson(format!("field {name:?} has an invalid id")))?;
        let type_name = entry
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| ReflectError::InvalidJson(format!("field {name:?} is missing a type")))?;
        let rule = match entry.get("rule") {
            None => Rule::Optional,
            Some(rule) => Rule::from_name(rule.as_str().ok_or_else(|| {
                ReflectError::InvalidJson(format!("field {name:?} has a non-string rule"))
            })?)?,
        };
        let extend = match entry.get("extend") {
            None => None,
            Some(extend) => Some(
                extend
                    .as_str()
                    .ok_or_else(|| {
                        ReflectError::InvalidJson(format!(
                            "field {name:?} has a non-string extend"
                        ))
                    })?
                    .to_string(),
            ),
        };
        let node = Node::field_full(name, id as u32, type_name, rule, extend)?;
        if let Some(key_type) = entry.get("keyType") {
            let key_type = key_type
                .as_str()
                .and_then(ScalarType::from_name)
                .filter(|k| k.is_map_key())
                .ok_or_else(|| ReflectError::InvalidKeyType(key_type.to_string()))?;
            node.write().field_mut().key_type = Some(key_type);
        }
        node.set_options(parse_options(entry)?);
        Ok(node)
    }

    pub(crate) fn field_to_json(&self) -> Value {
        let mut entry = serde_json::Map::new();
        {
            let inner = self.read();
            let body = inner.field();
            if body.rule != Rule::Optional {
                entry.insert("rule".to_string(), Value::from(body.rule.as_str()));
            }
            entry.insert("type".to_string(), Value::from(body.type_name.clone()));
            entry.insert("id".to_string(), Value::from(body.id));
            if let Some(key_type) = body.key_type {
                entry.insert("keyType".to_string(), Value::from(key_type.as_str()));
            }
            if let Some(extend) = &body.extend {
                entry.insert("extend".to_string(), Value::from(extend.clone()));
            }
        }
        if let Some(options) = self.options_json() {
            entry.insert("options".to_string(), options);
        }
        Value::Object(entry)
    }
}

/// Writes one bare (untagged) element of a packed run or a tagged scalar.
fn write_element(
    kind: FieldKind,
    resolved: Option<&Node>,
    value: &ProtoValue,
    writer: &mut Writer,
    context: &str,
) -> Result<(), ReflectError> {
    match kind {
        FieldKind::Scalar(scalar) => write_scalar(scalar, value, writer, context),
        FieldKind::Enum => write_enum(resolved, value, writer, context),
        FieldKind::Message => Err(ReflectError::ValueType {
            context: context.to_string(),
            expected: "packable element",
        }),
    }
}

/// Writes a scalar value with the coercions the dynamic value model allows.
fn write_scalar(
    scalar: ScalarType,
    value: &ProtoValue,
    writer: &mut Writer,
    context: &str,
) -> Result<(), ReflectError> {
    let out_of_range = || ReflectError::ValueType {
        context: context.to_string(),
        expected: "value in range",
    };
    match scalar {
        ScalarType::Int32 => {
            let n = value.to_i64(context)?;
            let n = i32::try_from(n).map_err(|_| out_of_range())?;
            writer.int32(n);
        }
        ScalarType::Uint32 => {
            let n = value.to_u64(context)?;
            let n = u32::try_from(n).map_err(|_| out_of_range())?;
            writer.uint32(n);
        }
        ScalarType::Sint32 => {
            let n = value.to_i64(context)?;
            let n = i32::try_from(n).map_err(|_| out_of_range())?;
            writer.sint32(n);
        }
        ScalarType::Fixed32 => {
            let n = value.to_u64(context)?;
            let n = u32::try_from(n).map_err(|_| out_of_range())?;
            writer.fixed32(n);
        }
        ScalarType::Sfixed32 => {
            let n = value.to_i64(context)?;
            let n = i32::try_from(n).map_err(|_| out_of_range())?;
            writer.sfixed32(n);
        }
        ScalarType::Int64 => {
            writer.int64(value.to_i64(context)?);
        }
        ScalarType::Uint64 => {
            writer.uint64(value.to_u64(context)?);
        }
        ScalarType::Sint64 => {
            writer.sint64(value.to_i64(context)?);
        }
        ScalarType::Fixed64 => {
            writer.fixed64(value.to_u64(context)?);
        }
        ScalarType::Sfixed64 => {
            writer.sfixed64(value.to_i64(context)?);
        }
        ScalarType::Float => {
            writer.float(value.to_f64(context)? as f32);
        }
        ScalarType::Double => {
            writer.double(value.to_f64(context)?);
        }
        ScalarType::Bool => {
            writer.bool(value.to_bool(context)?);
        }
        ScalarType::String => match value {
            ProtoValue::Str(s) => {
                writer.string(s);
            }
            ProtoValue::Bytes(b) => {
                let s = std::str::from_utf8(b).map_err(|_| ReflectError::ValueType {
                    context: context.to_string(),
                    expected: "utf-8 string",
                })?;
                writer.string(s);
            }
            _ => {
                return Err(ReflectError::ValueType {
                    context: context.to_string(),
                    expected: "string",
                })
            }
        },
        ScalarType::Bytes => {
            writer.bytes(&value.to_bytes(context)?);
        }
    }
    Ok(())
}

/// Writes an enum element: symbolic names go through the enum's value map;
/// negative numbers take the sign-extended varint path.
fn write_enum(
    enum_node: Option<&Node>,
    value: &ProtoValue,
    writer: &mut Writer,
    context: &str,
) -> Result<(), ReflectError> {
    let number = match value {
        ProtoValue::Str(name) => enum_node
            .and_then(|e| e.values().get(name.as_str()).copied())
            .ok_or_else(|| ReflectError::ValueType {
                context: context.to_string(),
                expected: "enum value name",
            })?,
        other => other.to_i64(context)?,
    };
    if number < 0 {
        writer.int64(number);
    } else if number <= u32::MAX as i64 {
        writer.uint32(number as u32);
    } else {
        return Err(ReflectError::ValueType {
            context: context.to_string(),
            expected: "enum value in range",
        });
    }
    Ok(())
}

/// Writes a map key. Map keys arrive as the strings JSON objects carry;
/// integer and bool key types parse them back.
fn write_map_key(
    key_type: ScalarType,
    key: &str,
    writer: &mut Writer,
    context: &str,
) -> Result<(), ReflectError> {
    let bad_key = || ReflectError::ValueType {
        context: context.to_string(),
        expected: "map key matching the key type",
    };
    match key_type {
        ScalarType::String => {
            writer.string(key);
            Ok(())
        }
        ScalarType::Bool => match key {
            "true" | "1" => {
                writer.bool(true);
                Ok(())
            }
            "false" | "0" => {
                writer.bool(false);
                Ok(())
            }
            _ => Err(bad_key()),
        },
        ScalarType::Uint32 | ScalarType::Uint64 | ScalarType::Fixed32 | ScalarType::Fixed64 => {
            let n = key.parse::<u64>().map_err(|_| bad_key())?;
            write_scalar(key_type, &ProtoValue::U64(n), writer, context)
        }
        ScalarType::Int32
        | ScalarType::Sint32
        | ScalarType::Sfixed32
        | ScalarType::Int64
        | ScalarType::Sint64
        | ScalarType::Sfixed64 => {
            let n = key.parse::<i64>().map_err(|_| bad_key())?;
            write_scalar(key_type, &ProtoValue::I64(n), writer, context)
        }
        ScalarType::Double | ScalarType::Float | ScalarType::Bytes => {
            Err(ReflectError::InvalidKeyType(key_type.as_str().to_string()))
        }
    }
}

/// Converts an explicit `default` option to a typed value. Messages carry
/// no defaults.
fn convert_default(
    kind: FieldKind,
    enum_node: Option<&Node>,
    json: &Value,
    context: &str,
) -> Result<Option<ProtoValue>, ReflectError> {
    match kind {
        FieldKind::Message => Ok(None),
        FieldKind::Enum => {
            let number = match json {
                Value::String(name) => enum_node
                    .and_then(|e| e.values().get(name.as_str()).copied())
                    .ok_or_else(|| ReflectError::ValueType {
                        context: context.to_string(),
                        expected: "enum value name",
                    })?,
                other => ProtoValue::from(other).to_i64(context)?,
            };
            Ok(Some(ProtoValue::I64(number)))
        }
        FieldKind::Scalar(scalar) => {
            let raw = ProtoValue::from(json);
            let typed = match scalar {
                ScalarType::Bytes => ProtoValue::Bytes(raw.to_bytes(context)?),
                ScalarType::String => match raw {
                    ProtoValue::Str(s) => ProtoValue::Str(s),
                    _ => {
                        return Err(ReflectError::ValueType {
                            context: context.to_string(),
                            expected: "string",
                        })
                    }
                },
                ScalarType::Bool => ProtoValue::Bool(raw.to_bool(context)?),
                ScalarType::Double | ScalarType::Float => ProtoValue::F64(raw.to_f64(context)?),
                scalar if scalar.is_unsigned() => ProtoValue::U64(raw.to_u64(context)?),
                _ => ProtoValue::I64(raw.to_i64(context)?),
            };
            Ok(Some(typed))
        }
    }
}

/// Converts one element to JSON per the field kind and options.
fn convert_single(
    kind: FieldKind,
    enum_node: Option<&Node>,
    value: &ProtoValue,
    opts: JsonOptions,
    context: &str,
) -> Result<Value, ReflectError> {
    match kind {
        FieldKind::Enum => {
            if opts.enums_as_names {
                match value {
                    ProtoValue::Str(name) => Ok(Value::from(name.clone())),
                    other => {
                        let number = other.to_i64(context)?;
                        match enum_node.and_then(|e| e.value_name(number)) {
                            Some(name) => Ok(Value::from(name)),
                            // Unknown numbers stay numeric.
                            None => Ok(Value::from(number)),
                        }
                    }
                }
            } else {
                match value {
                    ProtoValue::Str(name) => enum_node
                        .and_then(|e| e.values().get(name.as_str()).copied())
                        .map(Value::from)
                        .ok_or_else(|| ReflectError::ValueType {
                            context: context.to_string(),
                            expected: "enum value name",
                        }),
                    other => Ok(Value::from(other.to_i64(context)?)),
                }
            }
        }
        FieldKind::Scalar(scalar) if scalar.is_long() => {
            const MAX_SAFE: u64 = (1 << 53) - 1;
            if scalar.is_unsigned() {
                let n = value.to_u64(context)?;
                match opts.longs {
                    LongMode::String => Ok(Value::from(n.to_string())),
                    LongMode::Number if n > MAX_SAFE => {
                        Err(ReflectError::LongOverflow(n.to_string()))
                    }
                    LongMode::Number => Ok(Value::from(n)),
                }
            } else {
                let n = value.to_i64(context)?;
                match opts.longs {
                    LongMode::String => Ok(Value::from(n.to_string())),
                    LongMode::Number if n.unsigned_abs() > MAX_SAFE => {
                        Err(ReflectError::LongOverflow(n.to_string()))
                    }
                    LongMode::Number => Ok(Value::from(n)),
                }
            }
        }
        FieldKind::Scalar(ScalarType::Bytes) => {
            Ok(Value::from(BASE64.encode(value.to_bytes(context)?)))
        }
        _ => Ok(value.to_json()),
    }
}
