//! Message types: the ordered field list and the message encoder.

use protopack_buffers::Writer;
use serde_json::Value;

use crate::error::ReflectError;
use crate::namespace::parse_options;
use crate::node::{Node, NodeBody, NodeKind};
use crate::value::ProtoValue;

impl Node {
    /// The message's field nodes in declaration order. Empty for other
    /// kinds.
    pub fn fields(&self) -> Vec<Node> {
        let inner = self.read();
        match &inner.body {
            NodeBody::Message(b) => b.fields.values().cloned().collect(),
            _ => Vec::new(),
        }
    }

    /// Encodes a value onto the writer.
    ///
    /// On a message node the value is a [`ProtoValue::Map`] keyed by field
    /// name; absent and [`ProtoValue::Null`] members are skipped. On a
    /// field node the value is that single field's value. Unresolved nodes
    /// resolve on first use.
    pub fn encode(&self, value: &ProtoValue, writer: &mut Writer) -> Result<(), ReflectError> {
        match self.kind() {
            NodeKind::Message => self.encode_message(value, writer),
            NodeKind::Field => self.encode_field(value, writer),
            _ => Err(ReflectError::WrongKind {
                name: self.full_name(),
                expected: "message or field",
            }),
        }
    }

    fn encode_message(&self, value: &ProtoValue, writer: &mut Writer) -> Result<(), ReflectError> {
        let entries = value.as_map().ok_or_else(|| ReflectError::ValueType {
            context: self.full_name(),
            expected: "message object",
        })?;
        for field in self.fields() {
            if let Some(member) = entries.get(&field.name()) {
                if !matches!(member, ProtoValue::Null) {
                    field.encode_field(member, writer)?;
                }
            }
        }
        Ok(())
    }

    /// Encodes a message body prefixed with its byte length. The length is
    /// unknown up front, so the body is written into a forked sub-stream
    /// and emitted through [`Writer::bytes`].
    pub fn encode_delimited(
        &self,
        value: &ProtoValue,
        writer: &mut Writer,
    ) -> Result<(), ReflectError> {
        if self.kind() != NodeKind::Message {
            return Err(ReflectError::WrongKind {
                name: self.full_name(),
                expected: "message",
            });
        }
        writer.fork();
        self.encode_message(value, writer)?;
        let body = writer.finish();
        writer.bytes(&body);
        Ok(())
    }

    pub(crate) fn message_from_json(
        name: &str,
        entry: &serde_json::Map<String, Value>,
    ) -> Result<Node, ReflectError> {
        let message = Node::message(name)?;
        message.set_options(parse_options(entry)?);
        let fields = entry
            .get("fields")
            .and_then(Value::as_object)
            .ok_or_else(|| {
                ReflectError::InvalidJson(format!("message {name:?} fields must be an object"))
            })?;
        for (field_name, field_json) in fields {
            let field_entry = field_json.as_object().ok_or_else(|| {
                ReflectError::InvalidJson(format!("field {field_name:?} is not an object"))
            })?;
            message.add(Node::field_from_json(field_name, field_entry)?)?;
        }
        if let Some(nested) = entry.get("nested") {
            message.add_json(nested)?;
        }
        Ok(message)
    }

    pub(crate) fn message_to_json(&self, force: bool) -> Value {
        let mut entry = serde_json::Map::new();
        if let Some(options) = self.options_json() {
            entry.insert("options".to_string(), options);
        }
        let mut fields = serde_json::Map::new();
        for field in self.fields() {
            // Installed extension sisters live on the target but belong to
            // their declaring scope.
            if field.declaring_field().is_some() {
                continue;
            }
            fields.insert(field.name(), field.field_to_json());
        }
        entry.insert("fields".to_string(), Value::Object(fields));
        if let Some(nested) = self.nested_to_json(force) {
            entry.insert("nested".to_string(), nested);
        }
        Value::Object(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn root_with(json: Value) -> Node {
        let root = Node::root_namespace();
        root.add_json(&json).unwrap();
        root.resolve_all().unwrap();
        root
    }

    fn value(json: Value) -> ProtoValue {
        ProtoValue::from(json)
    }

    #[test]
    fn encode_skips_absent_and_null_fields() {
        let root = root_with(json!({
            "M": {"fields": {
                "a": {"type": "uint32", "id": 1},
                "b": {"type": "uint32", "id": 2},
            }},
        }));
        let m = root.lookup_type("M").unwrap();
        let mut w = Writer::new();
        m.encode(&value(json!({"b": 150, "ignored": 1, "a": null})), &mut w)
            .unwrap();
        assert_eq!(w.finish(), vec![0x10, 0x96, 0x01]);
    }

    #[test]
    fn encode_fields_in_declaration_order() {
        let root = root_with(json!({
            "M": {"fields": {
                "a": {"type": "uint32", "id": 1},
                "b": {"type": "uint32", "id": 2},
            }},
        }));
        let m = root.lookup_type("M").unwrap();
        let mut w = Writer::new();
        // Value order does not matter; declaration order wins.
        m.encode(&value(json!({"b": 2, "a": 1})), &mut w).unwrap();
        assert_eq!(w.finish(), vec![0x08, 0x01, 0x10, 0x02]);
    }

    #[test]
    fn encode_nested_message() {
        let root = root_with(json!({
            "Inner": {"fields": {"x": {"type": "uint32", "id": 1}}},
            "Outer": {"fields": {"inner": {"type": "Inner", "id": 1}}},
        }));
        let outer = root.lookup_type("Outer").unwrap();
        let mut w = Writer::new();
        outer
            .encode(&value(json!({"inner": {"x": 150}})), &mut w)
            .unwrap();
        assert_eq!(w.finish(), vec![0x0A, 0x03, 0x08, 0x96, 0x01]);
    }

    #[test]
    fn encode_empty_nested_message_is_zero_length() {
        let root = root_with(json!({
            "Inner": {"fields": {"x": {"type": "uint32", "id": 1}}},
            "Outer": {"fields": {"inner": {"type": "Inner", "id": 1}}},
        }));
        let outer = root.lookup_type("Outer").unwrap();
        let mut w = Writer::new();
        outer.encode(&value(json!({"inner": {}})), &mut w).unwrap();
        assert_eq!(w.finish(), vec![0x0A, 0x00]);
    }

    #[test]
    fn encode_packed_repeated() {
        let root = root_with(json!({
            "M": {"fields": {
                "v": {"rule": "repeated", "type": "int32", "id": 3},
            }},
        }));
        let m = root.lookup_type("M").unwrap();
        let mut w = Writer::new();
        m.encode(&value(json!({"v": [1, 2, 150]})), &mut w).unwrap();
        assert_eq!(w.finish(), vec![0x1A, 0x04, 0x01, 0x02, 0x96, 0x01]);
        // Zero elements emit nothing.
        m.encode(&value(json!({"v": []})), &mut w).unwrap();
        assert_eq!(w.finish(), Vec::<u8>::new());
    }

    #[test]
    fn encode_unpacked_repeated() {
        let root = root_with(json!({
            "M": {"fields": {
                "v": {"rule": "repeated", "type": "int32", "id": 1,
                       "options": {"packed": false}},
            }},
        }));
        let m = root.lookup_type("M").unwrap();
        let mut w = Writer::new();
        m.encode(&value(json!({"v": [1, 150]})), &mut w).unwrap();
        assert_eq!(w.finish(), vec![0x08, 0x01, 0x08, 0x96, 0x01]);
    }

    #[test]
    fn encode_repeated_strings_are_never_packed() {
        let root = root_with(json!({
            "M": {"fields": {
                "v": {"rule": "repeated", "type": "string", "id": 1},
            }},
        }));
        let m = root.lookup_type("M").unwrap();
        let mut w = Writer::new();
        m.encode(&value(json!({"v": ["a", "b"]})), &mut w).unwrap();
        assert_eq!(w.finish(), vec![0x0A, 0x01, b'a', 0x0A, 0x01, b'b']);
    }

    #[test]
    fn encode_repeated_messages() {
        let root = root_with(json!({
            "P": {"fields": {"x": {"type": "uint32", "id": 1}}},
            "M": {"fields": {"p": {"rule": "repeated", "type": "P", "id": 2}}},
        }));
        let m = root.lookup_type("M").unwrap();
        let mut w = Writer::new();
        m.encode(&value(json!({"p": [{"x": 1}, {"x": 2}]})), &mut w)
            .unwrap();
        assert_eq!(
            w.finish(),
            vec![0x12, 0x02, 0x08, 0x01, 0x12, 0x02, 0x08, 0x02]
        );
    }

    #[test]
    fn encode_map_field() {
        let root = root_with(json!({
            "M": {"fields": {
                "m": {"keyType": "string", "type": "uint32", "id": 1},
            }},
        }));
        let m = root.lookup_type("M").unwrap();
        let mut w = Writer::new();
        m.encode(&value(json!({"m": {"a": 1, "b": 150}})), &mut w)
            .unwrap();
        assert_eq!(
            w.finish(),
            vec![
                0x0A, 0x05, 0x0A, 0x01, b'a', 0x10, 0x01, // {"a": 1}
                0x0A, 0x06, 0x0A, 0x01, b'b', 0x10, 0x96, 0x01, // {"b": 150}
            ]
        );
    }

    #[test]
    fn encode_map_field_with_int_keys() {
        let root = root_with(json!({
            "M": {"fields": {
                "m": {"keyType": "int32", "type": "string", "id": 1},
            }},
        }));
        let m = root.lookup_type("M").unwrap();
        let mut w = Writer::new();
        m.encode(&value(json!({"m": {"5": "x"}})), &mut w).unwrap();
        assert_eq!(
            w.finish(),
            vec![0x0A, 0x05, 0x08, 0x05, 0x12, 0x01, b'x']
        );
        assert!(m.encode(&value(json!({"m": {"no": "x"}})), &mut w).is_err());
    }

    #[test]
    fn encode_rejects_non_map_value() {
        let root = root_with(json!({
            "M": {"fields": {"a": {"type": "uint32", "id": 1}}},
        }));
        let m = root.lookup_type("M").unwrap();
        let mut w = Writer::new();
        assert!(m.encode(&ProtoValue::I64(1), &mut w).is_err());
    }

    #[test]
    fn message_json_roundtrip() {
        let doc = json!({
            "options": {"deprecated": true},
            "fields": {
                "a": {"type": "uint32", "id": 1},
                "b": {"rule": "repeated", "type": "string", "id": 2},
            },
            "nested": {"E": {"values": {"X": 0}}},
        });
        let m = Node::message_from_json("M", doc.as_object().unwrap()).unwrap();
        assert_eq!(m.to_json(), Some(doc));
    }
}
