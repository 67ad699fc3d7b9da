//! The tree anchor: a nameless namespace plus whole-document JSON
//! ingestion and export.

use serde_json::Value;

use crate::error::ReflectError;
use crate::node::Node;

/// The root of a reflection tree.
///
/// Constructed fresh per schema, either empty or from a schema document
/// (`{ "options"?: …, "nested"?: … }`). Dropping the root drops the whole
/// tree.
#[derive(Debug, Clone)]
pub struct Root {
    node: Node,
}

impl Default for Root {
    fn default() -> Self {
        Root {
            node: Node::root_namespace(),
        }
    }
}

impl Root {
    pub fn new() -> Self {
        Self::default()
    }

    /// The underlying namespace node.
    pub fn node(&self) -> &Node {
        &self.node
    }

    /// Ingests a whole schema document.
    pub fn from_json(json: &Value) -> Result<Self, ReflectError> {
        let entry = json.as_object().ok_or_else(|| {
            ReflectError::InvalidJson("schema document must be an object".to_string())
        })?;
        let root = Self::new();
        root.node
            .set_options(crate::namespace::parse_options(entry)?);
        if let Some(nested) = entry.get("nested") {
            root.node.add_json(nested)?;
        }
        Ok(root)
    }

    /// Exports the whole document; an empty tree yields an empty object.
    pub fn to_json(&self) -> Value {
        self.node
            .to_json_opt(true)
            .unwrap_or_else(|| Value::Object(serde_json::Map::new()))
    }

    pub fn add(&self, node: Node) -> Result<(), ReflectError> {
        self.node.add(node)
    }

    pub fn remove(&self, node: &Node) -> Result<(), ReflectError> {
        self.node.remove(node)
    }

    pub fn get(&self, name: &str) -> Option<Node> {
        self.node.get(name)
    }

    pub fn define(
        &self,
        path: &str,
        json: Option<&Value>,
        visible: Option<bool>,
    ) -> Result<Node, ReflectError> {
        self.node.define(path, json, visible)
    }

    pub fn lookup(&self, path: &str) -> Option<Node> {
        self.node.lookup(path)
    }

    pub fn lookup_type(&self, path: &str) -> Result<Node, ReflectError> {
        self.node.lookup_type(path)
    }

    pub fn lookup_enum(&self, path: &str) -> Result<Node, ReflectError> {
        self.node.lookup_enum(path)
    }

    pub fn add_json(&self, json: &Value) -> Result<(), ReflectError> {
        self.node.add_json(json)
    }

    /// Resolves every node in the tree, depth-first.
    pub fn resolve_all(&self) -> Result<(), ReflectError> {
        self.node.resolve_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_json_and_back() {
        let doc = json!({
            "options": {"syntax": "proto3"},
            "nested": {
                "pkg": {"nested": {
                    "M": {"fields": {"x": {"type": "int32", "id": 1}}},
                }},
            },
        });
        let root = Root::from_json(&doc).unwrap();
        root.resolve_all().unwrap();
        assert_eq!(root.to_json(), doc);
    }

    #[test]
    fn empty_root_exports_empty_object() {
        let root = Root::new();
        assert_eq!(root.to_json(), json!({}));
    }

    #[test]
    fn from_json_rejects_non_object() {
        assert!(Root::from_json(&json!("nope")).is_err());
        assert!(Root::from_json(&json!({"nested": 3})).is_err());
    }

    #[test]
    fn lookup_from_root() {
        let root = Root::from_json(&json!({
            "nested": {"A": {"nested": {"E": {"values": {"X": 0}}}}},
        }))
        .unwrap();
        assert!(root.lookup("A.E").is_some());
        assert!(root.lookup_enum("A.E").is_ok());
        assert!(root.lookup_type("A.E").is_err());
    }
}
