//! Hierarchical container operations: membership, scoped lookup, dotted
//! `define`, and the JSON schema dialect (ingestion and export).

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::ReflectError;
use crate::node::{Node, NodeBody, NodeKind};

impl Node {
    /// Adds a child to this container.
    ///
    /// Methods go into a service's method map, fields into a message's
    /// field map; a field may only land directly in a namespace when it
    /// declares an `extend` target. A name collision is an error unless the
    /// existing entry is a plain namespace and the new one is a message
    /// type: the namespace's children are re-parented into the message and
    /// the namespace is dropped.
    pub fn add(&self, node: Node) -> Result<(), ReflectError> {
        if !self.is_namespace_like() {
            return Err(ReflectError::WrongKind {
                name: self.full_name(),
                expected: "namespace",
            });
        }
        let child_name = node.name();
        match node.kind() {
            NodeKind::Method => {
                if self.kind() != NodeKind::Service {
                    return Err(ReflectError::WrongKind {
                        name: self.full_name(),
                        expected: "service",
                    });
                }
                if self.get(&child_name).is_some() {
                    return Err(ReflectError::NameConflict {
                        owner: self.full_name(),
                        name: child_name,
                    });
                }
                {
                    let mut inner = self.write();
                    match &mut inner.body {
                        NodeBody::Service(b) => b.methods.insert(child_name, node.clone()),
                        _ => unreachable!(),
                    };
                }
                node.on_add(self);
                Ok(())
            }
            NodeKind::Field => {
                let (extend, id) = {
                    let inner = node.read();
                    let body = inner.field();
                    (body.extend.clone(), body.id)
                };
                if self.kind() == NodeKind::Message && extend.is_none() {
                    if self.get(&child_name).is_some() {
                        return Err(ReflectError::NameConflict {
                            owner: self.full_name(),
                            name: child_name,
                        });
                    }
                    for existing in self.fields() {
                        if existing.field_id() == Some(id) {
                            return Err(ReflectError::DuplicateId {
                                owner: self.full_name(),
                                id,
                            });
                        }
                    }
                    {
                        let mut inner = self.write();
                        match &mut inner.body {
                            NodeBody::Message(b) => b.fields.insert(child_name, node.clone()),
                            _ => unreachable!(),
                        };
                    }
                    node.on_add(self);
                    Ok(())
                } else if extend.is_some() {
                    self.insert_nested(node)
                } else {
                    Err(ReflectError::OrphanField(child_name))
                }
            }
            _ => self.insert_nested(node),
        }
    }

    fn insert_nested(&self, node: Node) -> Result<(), ReflectError> {
        let name = node.name();
        if let Some(previous) = self.get(&name) {
            let upgradable =
                previous.kind() == NodeKind::Namespace && node.kind() == NodeKind::Message;
            if !upgradable {
                return Err(ReflectError::NameConflict {
                    owner: self.full_name(),
                    name,
                });
            }
            // The new node absorbs the namespace that held its name.
            let children = previous.nested_children();
            self.remove(&previous)?;
            {
                let mut inner = self.write();
                let slot = inner.nested_slot().expect("namespace-like");
                slot.get_or_insert_with(IndexMap::new)
                    .insert(name, node.clone());
            }
            node.on_add(self);
            for child in children {
                node.add(child)?;
            }
            return Ok(());
        }
        {
            let mut inner = self.write();
            let slot = inner.nested_slot().expect("namespace-like");
            slot.get_or_insert_with(IndexMap::new)
                .insert(name, node.clone());
        }
        node.on_add(self);
        Ok(())
    }

    /// Removes a child previously added to this container.
    pub fn remove(&self, node: &Node) -> Result<(), ReflectError> {
        fn take(map: &mut Option<IndexMap<String, Node>>, name: &str, node: &Node) -> bool {
            if let Some(entries) = map {
                if entries.get(name).is_some_and(|e| e.ptr_eq(node)) {
                    entries.shift_remove(name);
                    if entries.is_empty() {
                        *map = None;
                    }
                    return true;
                }
            }
            false
        }

        let name = node.name();
        let found = {
            let mut inner = self.write();
            match &mut inner.body {
                NodeBody::Namespace(b) => take(&mut b.nested, &name, node),
                NodeBody::Message(b) => {
                    take(&mut b.nested, &name, node)
                        || (b.fields.get(&name).is_some_and(|e| e.ptr_eq(node)) && {
                            b.fields.shift_remove(&name);
                            true
                        })
                }
                NodeBody::Service(b) => {
                    take(&mut b.nested, &name, node)
                        || (b.methods.get(&name).is_some_and(|e| e.ptr_eq(node)) && {
                            b.methods.shift_remove(&name);
                            true
                        })
                }
                _ => false,
            }
        };
        if !found {
            return Err(ReflectError::NotAMember {
                owner: self.full_name(),
                name,
            });
        }
        node.on_remove();
        Ok(())
    }

    /// Gets a direct child by name: nested entries, then a message's fields
    /// or a service's methods.
    pub fn get(&self, name: &str) -> Option<Node> {
        let inner = self.read();
        if let Some(found) = inner.nested().and_then(|m| m.get(name)) {
            return Some(found.clone());
        }
        match &inner.body {
            NodeBody::Message(b) => b.fields.get(name).cloned(),
            NodeBody::Service(b) => b.methods.get(name).cloned(),
            _ => None,
        }
    }

    /// The values of a directly nested enum.
    pub fn get_enum(&self, name: &str) -> Result<IndexMap<String, i64>, ReflectError> {
        match self.get(name) {
            Some(node) if node.kind() == NodeKind::Enum => Ok(node.values()),
            _ => Err(ReflectError::MissingEnum(name.to_string())),
        }
    }

    /// Nested children in insertion order.
    pub(crate) fn nested_children(&self) -> Vec<Node> {
        self.read()
            .nested()
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default()
    }

    /// All owned children: nested entries plus message fields and service
    /// methods.
    pub(crate) fn all_children(&self) -> Vec<Node> {
        let inner = self.read();
        let mut children: Vec<Node> = inner
            .nested()
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default();
        match &inner.body {
            NodeBody::Message(b) => children.extend(b.fields.values().cloned()),
            NodeBody::Service(b) => children.extend(b.methods.values().cloned()),
            _ => {}
        }
        children
    }

    /// Calls `f` for each nested child, in insertion order.
    pub fn each<F: FnMut(&Node)>(&self, mut f: F) {
        for child in self.nested_children() {
            f(&child);
        }
    }

    /// Resolves a dotted path or path segments against this scope.
    ///
    /// An empty path yields `None`. A leading empty segment (`.A.B`)
    /// restarts at the root. Relative paths try the local nested entries
    /// first, then climb to the parent scope unless the parent was already
    /// consulted while descending.
    pub fn lookup(&self, path: &str) -> Option<Node> {
        if path.is_empty() {
            return None;
        }
        let parts: Vec<&str> = path.split('.').collect();
        self.lookup_parts(&parts, false)
    }

    pub(crate) fn lookup_parts(&self, parts: &[&str], parent_checked: bool) -> Option<Node> {
        let &first = parts.first()?;
        if first.is_empty() {
            return self.root().lookup_parts(&parts[1..], true);
        }
        let local = {
            let inner = self.read();
            inner.nested().and_then(|m| m.get(first).cloned())
        };
        if let Some(found) = local {
            if parts.len() == 1 {
                return Some(found);
            }
            if found.is_namespace_like() {
                if let Some(deep) = found.lookup_parts(&parts[1..], true) {
                    return Some(deep);
                }
            }
        }
        if parent_checked {
            return None;
        }
        self.parent()?.lookup_parts(parts, false)
    }

    /// Like [`lookup`](Node::lookup), but requires a message type.
    pub fn lookup_type(&self, path: &str) -> Result<Node, ReflectError> {
        self.lookup(path)
            .filter(|n| n.kind() == NodeKind::Message)
            .ok_or_else(|| ReflectError::MissingType(path.to_string()))
    }

    /// Like [`lookup`](Node::lookup), but requires an enum.
    pub fn lookup_enum(&self, path: &str) -> Result<Node, ReflectError> {
        self.lookup(path)
            .filter(|n| n.kind() == NodeKind::Enum)
            .ok_or_else(|| ReflectError::MissingEnum(path.to_string()))
    }

    /// Creates the namespaces missing along a dotted path and returns the
    /// terminal one; newly created namespaces take `visible`. With `json`,
    /// seeds the terminal namespace via [`add_json`](Node::add_json).
    pub fn define(
        &self,
        path: &str,
        json: Option<&Value>,
        visible: Option<bool>,
    ) -> Result<Node, ReflectError> {
        let mut ptr = if path.starts_with('.') {
            self.root()
        } else {
            self.clone()
        };
        let trimmed = path.trim_start_matches('.');
        if !trimmed.is_empty() {
            for part in trimmed.split('.') {
                match ptr.get(part) {
                    Some(existing) => {
                        if !existing.is_namespace_like() {
                            return Err(ReflectError::NameConflict {
                                owner: ptr.full_name(),
                                name: part.to_string(),
                            });
                        }
                        ptr = existing;
                    }
                    None => {
                        let ns = Node::namespace(part)?;
                        ns.set_visible(visible);
                        ptr.add(ns.clone())?;
                        ptr = ns;
                    }
                }
            }
        }
        if let Some(json) = json {
            ptr.add_json(json)?;
        }
        Ok(ptr)
    }

    /// Ingests a JSON map of named entries, classifying each body by shape:
    /// a field has `id`, an enum has `values`, a message has `fields`, a
    /// service has `methods`, a method has `requestType`; any other object
    /// is a namespace. A non-object body is rejected.
    pub fn add_json(&self, json: &Value) -> Result<(), ReflectError> {
        let entries = json.as_object().ok_or_else(|| {
            ReflectError::InvalidJson("expected an object of named entries".to_string())
        })?;
        for (name, body) in entries {
            self.add(Node::from_json(name, body)?)?;
        }
        Ok(())
    }

    /// Constructs a node from one named entry of the JSON schema dialect.
    pub fn from_json(name: &str, json: &Value) -> Result<Node, ReflectError> {
        let entry = json.as_object().ok_or_else(|| {
            ReflectError::InvalidJson(format!("entry {name:?} is not an object"))
        })?;
        if entry.contains_key("id") {
            Node::field_from_json(name, entry)
        } else if entry.contains_key("values") {
            Node::enum_from_json(name, entry)
        } else if entry.contains_key("fields") {
            Node::message_from_json(name, entry)
        } else if entry.contains_key("methods") {
            Node::service_from_json(name, entry)
        } else if entry.contains_key("requestType") {
            Node::method_from_json(name, entry)
        } else {
            Node::namespace_from_json(name, entry)
        }
    }

    pub(crate) fn namespace_from_json(
        name: &str,
        entry: &serde_json::Map<String, Value>,
    ) -> Result<Node, ReflectError> {
        let ns = Node::namespace(name)?;
        ns.set_options(parse_options(entry)?);
        if let Some(nested) = entry.get("nested") {
            ns.add_json(nested)?;
        }
        Ok(ns)
    }

    /// Exports this node back to the JSON dialect.
    ///
    /// A plain namespace is emitted when it is explicitly visible or when
    /// any descendant produced JSON; an invisible subtree collapses to
    /// nothing and the parent omits it. Every other kind is emitted unless
    /// explicitly hidden.
    pub fn to_json(&self) -> Option<Value> {
        self.to_json_opt(false)
    }

    pub(crate) fn to_json_opt(&self, force: bool) -> Option<Value> {
        let (kind, visible) = {
            let inner = self.read();
            (inner.kind(), inner.visible)
        };
        if visible == Some(false) && !force {
            return None;
        }
        match kind {
            NodeKind::Namespace => {
                let force_children = force || visible == Some(true);
                let mut nested = serde_json::Map::new();
                for child in self.nested_children() {
                    if let Some(child_json) = child.to_json_opt(force_children) {
                        nested.insert(child.name(), child_json);
                    }
                }
                if !force_children && nested.is_empty() {
                    return None;
                }
                let mut entry = serde_json::Map::new();
                if let Some(options) = self.options_json() {
                    entry.insert("options".to_string(), options);
                }
                if !nested.is_empty() {
                    entry.insert("nested".to_string(), Value::Object(nested));
                }
                Some(Value::Object(entry))
            }
            NodeKind::Message => Some(self.message_to_json(force)),
            NodeKind::Enum => Some(self.enum_to_json()),
            NodeKind::Service => Some(self.service_to_json(force)),
            NodeKind::Field => Some(self.field_to_json()),
            NodeKind::Method => Some(self.method_to_json()),
        }
    }

    /// Emits the nested entries of a container as a JSON map, honoring
    /// visibility.
    pub(crate) fn nested_to_json(&self, force: bool) -> Option<Value> {
        let mut nested = serde_json::Map::new();
        for child in self.nested_children() {
            if let Some(child_json) = child.to_json_opt(force) {
                nested.insert(child.name(), child_json);
            }
        }
        if nested.is_empty() {
            None
        } else {
            Some(Value::Object(nested))
        }
    }

    /// Resolves every descendant depth-first, then this node.
    pub fn resolve_all(&self) -> Result<(), ReflectError> {
        for child in self.all_children() {
            child.resolve_all()?;
        }
        self.resolve()
    }
}

/// Parses an optional `options` object into an insertion-ordered bag.
pub(crate) fn parse_options(
    entry: &serde_json::Map<String, Value>,
) -> Result<Option<IndexMap<String, Value>>, ReflectError> {
    match entry.get("options") {
        None => Ok(None),
        Some(Value::Object(opts)) => Ok(Some(
            opts.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        )),
        Some(_) => Err(ReflectError::InvalidJson(
            "options must be an object".to_string(),
        )),
    }
}
