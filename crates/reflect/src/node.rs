//! Reflection node core: the shared handle type, per-kind bodies, and the
//! state common to every node (name, parent link, options, flags).

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::ReflectError;
use crate::scalar::ScalarType;
use crate::value::ProtoValue;

pub(crate) type NodeRef = Arc<RwLock<NodeInner>>;
pub(crate) type NodeWeak = Weak<RwLock<NodeInner>>;

/// The reflection kinds a schema tree is made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Namespace,
    Message,
    Enum,
    Service,
    Field,
    Method,
}

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Namespace => "namespace",
            Self::Message => "message",
            Self::Enum => "enum",
            Self::Service => "service",
            Self::Field => "field",
            Self::Method => "method",
        }
    }
}

/// Field cardinality. `optional` is the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rule {
    Required,
    #[default]
    Optional,
    Repeated,
}

impl Rule {
    pub fn from_name(name: &str) -> Result<Self, ReflectError> {
        match name.to_ascii_lowercase().as_str() {
            "required" => Ok(Self::Required),
            "optional" => Ok(Self::Optional),
            "repeated" => Ok(Self::Repeated),
            _ => Err(ReflectError::InvalidRule(name.to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::Optional => "optional",
            Self::Repeated => "repeated",
        }
    }
}

/// What a field's symbolic type resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Scalar(ScalarType),
    Message,
    Enum,
}

#[derive(Debug, Default)]
pub(crate) struct NamespaceBody {
    /// Nested entries by name, insertion-ordered. Absent when empty.
    pub nested: Option<IndexMap<String, Node>>,
}

#[derive(Debug, Default)]
pub(crate) struct MessageBody {
    pub nested: Option<IndexMap<String, Node>>,
    /// Field nodes in declaration order.
    pub fields: IndexMap<String, Node>,
}

#[derive(Debug, Default)]
pub(crate) struct EnumBody {
    /// Value name to number, insertion-ordered.
    pub values: IndexMap<String, i64>,
}

#[derive(Debug, Default)]
pub(crate) struct ServiceBody {
    pub nested: Option<IndexMap<String, Node>>,
    pub methods: IndexMap<String, Node>,
}

#[derive(Debug)]
pub(crate) struct FieldBody {
    pub id: u32,
    /// Scalar keyword or symbolic (possibly dotted) type reference.
    pub type_name: String,
    pub rule: Rule,
    /// Dotted path of the extended type, for extension declarations.
    pub extend: Option<String>,
    /// Present iff this is a map field.
    pub key_type: Option<ScalarType>,
    /// Set by `resolve`.
    pub kind: Option<FieldKind>,
    /// Weak reference to the resolved message or enum node.
    pub resolved_type: Option<NodeWeak>,
    pub default_value: Option<ProtoValue>,
    /// On an installed extension sister: the declaring field.
    pub declaring_field: Option<NodeWeak>,
    /// On a declaring extension field: the installed sister.
    pub extension_field: Option<NodeWeak>,
}

#[derive(Debug)]
pub(crate) struct MethodBody {
    pub request_type: String,
    pub response_type: String,
    pub request_stream: bool,
    pub response_stream: bool,
    pub resolved_request: Option<NodeWeak>,
    pub resolved_response: Option<NodeWeak>,
}

#[derive(Debug)]
pub(crate) enum NodeBody {
    Namespace(NamespaceBody),
    Message(MessageBody),
    Enum(EnumBody),
    Service(ServiceBody),
    Field(FieldBody),
    Method(MethodBody),
}

/// State shared by every reflection node.
#[derive(Debug)]
pub(crate) struct NodeInner {
    pub name: String,
    /// Weak up-link; the parent owns the child, never the reverse.
    pub parent: Option<NodeWeak>,
    /// Option bag, insertion-ordered. Absent when empty.
    pub options: Option<IndexMap<String, Value>>,
    pub resolved: bool,
    /// Export visibility: `None` defers to the export rules.
    pub visible: Option<bool>,
    pub body: NodeBody,
}

impl NodeInner {
    pub(crate) fn kind(&self) -> NodeKind {
        match self.body {
            NodeBody::Namespace(_) => NodeKind::Namespace,
            NodeBody::Message(_) => NodeKind::Message,
            NodeBody::Enum(_) => NodeKind::Enum,
            NodeBody::Service(_) => NodeKind::Service,
            NodeBody::Field(_) => NodeKind::Field,
            NodeBody::Method(_) => NodeKind::Method,
        }
    }

    pub(crate) fn nested(&self) -> Option<&IndexMap<String, Node>> {
        match &self.body {
            NodeBody::Namespace(b) => b.nested.as_ref(),
            NodeBody::Message(b) => b.nested.as_ref(),
            NodeBody::Service(b) => b.nested.as_ref(),
            _ => None,
        }
    }

    pub(crate) fn nested_slot(&mut self) -> Option<&mut Option<IndexMap<String, Node>>> {
        match &mut self.body {
            NodeBody::Namespace(b) => Some(&mut b.nested),
            NodeBody::Message(b) => Some(&mut b.nested),
            NodeBody::Service(b) => Some(&mut b.nested),
            _ => None,
        }
    }

    pub(crate) fn field(&self) -> &FieldBody {
        match &self.body {
            NodeBody::Field(b) => b,
            _ => panic!("not a field node"),
        }
    }

    pub(crate) fn field_mut(&mut self) -> &mut FieldBody {
        match &mut self.body {
            NodeBody::Field(b) => b,
            _ => panic!("not a field node"),
        }
    }
}

/// A handle to a reflection node.
///
/// Nodes share the `Arc<RwLock<_>>` representation: clones are cheap and
/// refer to the same node. The tree is built and resolved single-threaded;
/// after `resolve_all` it is effectively immutable and concurrent readers
/// are safe.
#[derive(Debug, Clone)]
pub struct Node(pub(crate) NodeRef);

impl Node {
    fn with_body(name: String, body: NodeBody) -> Self {
        Node(Arc::new(RwLock::new(NodeInner {
            name,
            parent: None,
            options: None,
            resolved: false,
            visible: None,
            body,
        })))
    }

    fn checked_name(name: impl Into<String>) -> Result<String, ReflectError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ReflectError::InvalidName(name));
        }
        Ok(name)
    }

    /// Creates a plain namespace.
    pub fn namespace(name: impl Into<String>) -> Result<Self, ReflectError> {
        Ok(Self::with_body(
            Self::checked_name(name)?,
            NodeBody::Namespace(NamespaceBody::default()),
        ))
    }

    /// Creates the nameless namespace a [`Root`](crate::Root) anchors.
    pub(crate) fn root_namespace() -> Self {
        Self::with_body(String::new(), NodeBody::Namespace(NamespaceBody::default()))
    }

    /// Creates a message type.
    pub fn message(name: impl Into<String>) -> Result<Self, ReflectError> {
        Ok(Self::with_body(
            Self::checked_name(name)?,
            NodeBody::Message(MessageBody::default()),
        ))
    }

    /// Creates an enum with no values.
    pub fn enumeration(name: impl Into<String>) -> Result<Self, ReflectError> {
        Ok(Self::with_body(
            Self::checked_name(name)?,
            NodeBody::Enum(EnumBody::default()),
        ))
    }

    /// Creates a service with no methods.
    pub fn service(name: impl Into<String>) -> Result<Self, ReflectError> {
        Ok(Self::with_body(
            Self::checked_name(name)?,
            NodeBody::Service(ServiceBody::default()),
        ))
    }

    /// Creates an optional field.
    pub fn field(
        name: impl Into<String>,
        id: u32,
        type_name: impl Into<String>,
    ) -> Result<Self, ReflectError> {
        Self::field_full(name, id, type_name, Rule::Optional, None)
    }

    /// Creates a field with an explicit rule and optional `extend` target.
    pub fn field_full(
        name: impl Into<String>,
        id: u32,
        type_name: impl Into<String>,
        rule: Rule,
        extend: Option<String>,
    ) -> Result<Self, ReflectError> {
        let type_name = type_name.into();
        if type_name.is_empty() {
            return Err(ReflectError::InvalidName(type_name));
        }
        Ok(Self::with_body(
            Self::checked_name(name)?,
            NodeBody::Field(FieldBody {
                id,
                type_name,
                rule,
                extend,
                key_type: None,
                kind: None,
                resolved_type: None,
                default_value: None,
                declaring_field: None,
                extension_field: None,
            }),
        ))
    }

    /// Creates a map field keyed by `key_type`.
    pub fn map_field(
        name: impl Into<String>,
        id: u32,
        key_type: ScalarType,
        type_name: impl Into<String>,
    ) -> Result<Self, ReflectError> {
        if !key_type.is_map_key() {
            return Err(ReflectError::InvalidKeyType(key_type.as_str().to_string()));
        }
        let node = Self::field(name, id, type_name)?;
        node.write().field_mut().key_type = Some(key_type);
        Ok(node)
    }

    /// Creates a service method.
    pub fn method(
        name: impl Into<String>,
        request_type: impl Into<String>,
        response_type: impl Into<String>,
    ) -> Result<Self, ReflectError> {
        Ok(Self::with_body(
            Self::checked_name(name)?,
            NodeBody::Method(MethodBody {
                request_type: request_type.into(),
                response_type: response_type.into(),
                request_stream: false,
                response_stream: false,
                resolved_request: None,
                resolved_response: None,
            }),
        ))
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, NodeInner> {
        self.0.read().unwrap()
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, NodeInner> {
        self.0.write().unwrap()
    }

    pub(crate) fn downgrade(&self) -> NodeWeak {
        Arc::downgrade(&self.0)
    }

    /// True when both handles refer to the same node.
    pub fn ptr_eq(&self, other: &Node) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn name(&self) -> String {
        self.read().name.clone()
    }

    pub fn kind(&self) -> NodeKind {
        self.read().kind()
    }

    /// True for the kinds that can contain nested entries.
    pub fn is_namespace_like(&self) -> bool {
        matches!(
            self.kind(),
            NodeKind::Namespace | NodeKind::Message | NodeKind::Service
        )
    }

    pub fn parent(&self) -> Option<Node> {
        self.read().parent.as_ref().and_then(Weak::upgrade).map(Node)
    }

    /// The topmost node reachable through parent links.
    pub fn root(&self) -> Node {
        let mut current = self.clone();
        while let Some(parent) = current.parent() {
            current = parent;
        }
        current
    }

    /// Dot-joined path from the root; the root's empty name is omitted.
    pub fn full_name(&self) -> String {
        let mut parts = Vec::new();
        let mut current = Some(self.clone());
        while let Some(node) = current {
            let name = node.name();
            if !name.is_empty() {
                parts.push(name);
            }
            current = node.parent();
        }
        parts.reverse();
        parts.join(".")
    }

    pub fn is_resolved(&self) -> bool {
        self.read().resolved
    }

    pub fn visible(&self) -> Option<bool> {
        self.read().visible
    }

    pub fn set_visible(&self, visible: Option<bool>) {
        self.write().visible = visible;
    }

    pub fn get_option(&self, name: &str) -> Option<Value> {
        self.read()
            .options
            .as_ref()
            .and_then(|opts| opts.get(name).cloned())
    }

    /// Sets an option; with `if_not_set`, keeps an existing value.
    pub fn set_option(&self, name: &str, value: Value, if_not_set: bool) {
        let mut inner = self.write();
        let opts = inner.options.get_or_insert_with(IndexMap::new);
        if !if_not_set || !opts.contains_key(name) {
            opts.insert(name.to_string(), value);
        }
    }

    pub(crate) fn set_options(&self, options: Option<IndexMap<String, Value>>) {
        self.write().options = options;
    }

    pub(crate) fn options_json(&self) -> Option<Value> {
        let inner = self.read();
        inner.options.as_ref().map(|opts| {
            Value::Object(
                opts.iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            )
        })
    }

    /// Installs `parent` as the up-link, detaching from any previous parent
    /// and invalidating resolution state.
    pub(crate) fn on_add(&self, parent: &Node) {
        if let Some(old) = self.parent() {
            if !old.ptr_eq(parent) {
                // Best effort: the old parent may already have dropped us.
                let _ = old.remove(self);
            }
        }
        let mut inner = self.write();
        inner.parent = Some(parent.downgrade());
        inner.resolved = false;
    }

    /// Clears the up-link.
    pub(crate) fn on_remove(&self) {
        self.write().parent = None;
    }

    /// Resolves this node once: binds symbolic type references and computes
    /// field defaults. Idempotent.
    pub fn resolve(&self) -> Result<(), ReflectError> {
        if self.read().resolved {
            return Ok(());
        }
        match self.kind() {
            NodeKind::Field => self.resolve_field()?,
            NodeKind::Method => self.resolve_method()?,
            _ => {}
        }
        self.write().resolved = true;
        Ok(())
    }
}
