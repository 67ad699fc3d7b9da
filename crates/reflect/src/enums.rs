//! Enum types: an insertion-ordered value map with reverse lookup.

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::ReflectError;
use crate::namespace::parse_options;
use crate::node::{Node, NodeBody};

impl Node {
    /// The enum's values, name to number, in declaration order. Empty for
    /// other kinds.
    pub fn values(&self) -> IndexMap<String, i64> {
        let inner = self.read();
        match &inner.body {
            NodeBody::Enum(b) => b.values.clone(),
            _ => IndexMap::new(),
        }
    }

    /// The first name declared for `number`, if any.
    pub fn value_name(&self, number: i64) -> Option<String> {
        let inner = self.read();
        match &inner.body {
            NodeBody::Enum(b) => b
                .values
                .iter()
                .find(|(_, &n)| n == number)
                .map(|(name, _)| name.clone()),
            _ => None,
        }
    }

    /// Declares a value on an enum node.
    pub fn add_value(&self, name: &str, number: i64) -> Result<(), ReflectError> {
        if name.is_empty() {
            return Err(ReflectError::InvalidName(name.to_string()));
        }
        let owner = self.full_name();
        let mut inner = self.write();
        match &mut inner.body {
            NodeBody::Enum(b) => {
                if b.values.contains_key(name) {
                    return Err(ReflectError::NameConflict {
                        owner,
                        name: name.to_string(),
                    });
                }
                b.values.insert(name.to_string(), number);
                Ok(())
            }
            _ => Err(ReflectError::WrongKind {
                name: owner,
                expected: "enum",
            }),
        }
    }

    /// Removes a declared value from an enum node.
    pub fn remove_value(&self, name: &str) -> Result<(), ReflectError> {
        let owner = self.full_name();
        let mut inner = self.write();
        match &mut inner.body {
            NodeBody::Enum(b) => {
                if b.values.shift_remove(name).is_none() {
                    return Err(ReflectError::NotAMember {
                        owner,
                        name: name.to_string(),
                    });
                }
                Ok(())
            }
            _ => Err(ReflectError::WrongKind {
                name: owner,
                expected: "enum",
            }),
        }
    }

    pub(crate) fn enum_from_json(
        name: &str,
        entry: &serde_json::Map<String, Value>,
    ) -> Result<Node, ReflectError> {
        let node = Node::enumeration(name)?;
        node.set_options(parse_options(entry)?);
        let values = entry
            .get("values")
            .and_then(Value::as_object)
            .ok_or_else(|| {
                ReflectError::InvalidJson(format!("enum {name:?} values must be an object"))
            })?;
        for (value_name, number) in values {
            let number = number.as_i64().ok_or_else(|| {
                ReflectError::InvalidJson(format!(
                    "enum value {value_name:?} must be an integer"
                ))
            })?;
            node.add_value(value_name, number)?;
        }
        Ok(node)
    }

    pub(crate) fn enum_to_json(&self) -> Value {
        let mut entry = serde_json::Map::new();
        if let Some(options) = self.options_json() {
            entry.insert("options".to_string(), options);
        }
        let values: serde_json::Map<String, Value> = self
            .values()
            .into_iter()
            .map(|(name, number)| (name, Value::from(number)))
            .collect();
        entry.insert("values".to_string(), Value::Object(values));
        Value::Object(entry)
    }
}
