//! Services and methods: reflection-only RPC descriptors whose request and
//! response types resolve through the enclosing scope.

use std::sync::Weak;

use serde_json::Value;

use crate::error::ReflectError;
use crate::namespace::parse_options;
use crate::node::{Node, NodeBody, NodeKind};

impl Node {
    /// The service's method nodes in declaration order. Empty for other
    /// kinds.
    pub fn methods(&self) -> Vec<Node> {
        let inner = self.read();
        match &inner.body {
            NodeBody::Service(b) => b.methods.values().cloned().collect(),
            _ => Vec::new(),
        }
    }

    /// The message node a method's request type resolved to.
    pub fn request_type(&self) -> Option<Node> {
        let inner = self.read();
        match &inner.body {
            NodeBody::Method(b) => b.resolved_request.as_ref().and_then(Weak::upgrade).map(Node),
            _ => None,
        }
    }

    /// The message node a method's response type resolved to.
    pub fn response_type(&self) -> Option<Node> {
        let inner = self.read();
        match &inner.body {
            NodeBody::Method(b) => b.resolved_response.as_ref().and_then(Weak::upgrade).map(Node),
            _ => None,
        }
    }

    /// Binds a method's request and response type names to message nodes.
    pub(crate) fn resolve_method(&self) -> Result<(), ReflectError> {
        let (request_name, response_name) = {
            let inner = self.read();
            match &inner.body {
                NodeBody::Method(b) => (b.request_type.clone(), b.response_type.clone()),
                _ => unreachable!("resolve_method on a non-method node"),
            }
        };
        let context = self.full_name();
        let scope = self
            .parent()
            .ok_or_else(|| ReflectError::Detached(context.clone()))?;
        let request = match scope.lookup(&request_name) {
            Some(found) if found.kind() == NodeKind::Message => found,
            _ => {
                return Err(ReflectError::UnresolvableType {
                    field: context,
                    type_name: request_name,
                })
            }
        };
        let response = match scope.lookup(&response_name) {
            Some(found) if found.kind() == NodeKind::Message => found,
            _ => {
                return Err(ReflectError::UnresolvableType {
                    field: context,
                    type_name: response_name,
                })
            }
        };
        let mut inner = self.write();
        match &mut inner.body {
            NodeBody::Method(b) => {
                b.resolved_request = Some(request.downgrade());
                b.resolved_response = Some(response.downgrade());
            }
            _ => unreachable!(),
        }
        Ok(())
    }

    pub(crate) fn service_from_json(
        name: &str,
        entry: &serde_json::Map<String, Value>,
    ) -> Result<Node, ReflectError> {
        let service = Node::service(name)?;
        service.set_options(parse_options(entry)?);
        let methods = entry
            .get("methods")
            .and_then(Value::as_object)
            .ok_or_else(|| {
                ReflectError::InvalidJson(format!("service {name:?} methods must be an object"))
            })?;
        for (method_name, method_json) in methods {
            let method_entry = method_json.as_object().ok_or_else(|| {
                ReflectError::InvalidJson(format!("method {method_name:?} is not an object"))
            })?;
            service.add(Node::method_from_json(method_name, method_entry)?)?;
        }
        if let Some(nested) = entry.get("nested") {
            service.add_json(nested)?;
        }
        Ok(service)
    }

    pub(crate) fn method_from_json(
        name: &str,
        entry: &serde_json::Map<String, Value>,
    ) -> Result<Node, ReflectError> {
        let request_type = entry
            .get("requestType")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ReflectError::InvalidJson(format!("method {name:?} is missing a requestType"))
            })?;
        let response_type = entry
            .get("responseType")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ReflectError::InvalidJson(format!("method {name:?} is missing a responseType"))
            })?;
        let method = Node::method(name, request_type, response_type)?;
        {
            let mut inner = method.write();
            match &mut inner.body {
                NodeBody::Method(b) => {
                    b.request_stream = entry
                        .get("requestStream")
                        .and_then(Value::as_bool)
                        .unwrap_or(false);
                    b.response_stream = entry
                        .get("responseStream")
                        .and_then(Value::as_bool)
                        .unwrap_or(false);
                }
                _ => unreachable!(),
            }
        }
        method.set_options(parse_options(entry)?);
        Ok(method)
    }

    pub(crate) fn service_to_json(&self, force: bool) -> Value {
        let mut entry = serde_json::Map::new();
        if let Some(options) = self.options_json() {
            entry.insert("options".to_string(), options);
        }
        let mut methods = serde_json::Map::new();
        for method in self.methods() {
            methods.insert(method.name(), method.method_to_json());
        }
        entry.insert("methods".to_string(), Value::Object(methods));
        if let Some(nested) = self.nested_to_json(force) {
            entry.insert("nested".to_string(), nested);
        }
        Value::Object(entry)
    }

    pub(crate) fn method_to_json(&self) -> Value {
        let mut entry = serde_json::Map::new();
        {
            let inner = self.read();
            if let NodeBody::Method(b) = &inner.body {
                entry.insert("requestType".to_string(), Value::from(b.request_type.clone()));
                entry.insert(
                    "responseType".to_string(),
                    Value::from(b.response_type.clone()),
                );
                if b.request_stream {
                    entry.insert("requestStream".to_string(), Value::Bool(true));
                }
                if b.response_stream {
                    entry.insert("responseStream".to_string(), Value::Bool(true));
                }
            }
        }
        if let Some(options) = self.options_json() {
            entry.insert("options".to_string(), options);
        }
        Value::Object(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn methods_resolve_request_and_response() {
        let root = Node::root_namespace();
        root.add_json(&json!({
            "Req": {"fields": {}},
            "Res": {"fields": {}},
            "Svc": {"methods": {
                "Call": {"requestType": "Req", "responseType": "Res"},
            }},
        }))
        .unwrap();
        root.resolve_all().unwrap();
        let svc = root.lookup("Svc").unwrap();
        assert_eq!(svc.kind(), NodeKind::Service);
        let call = svc.get("Call").unwrap();
        assert!(call.request_type().unwrap().ptr_eq(&root.lookup("Req").unwrap()));
        assert!(call.response_type().unwrap().ptr_eq(&root.lookup("Res").unwrap()));
    }

    #[test]
    fn unresolvable_method_type_fails() {
        let root = Node::root_namespace();
        root.add_json(&json!({
            "Svc": {"methods": {
                "Call": {"requestType": "Nope", "responseType": "Nope"},
            }},
        }))
        .unwrap();
        assert!(matches!(
            root.resolve_all().unwrap_err(),
            ReflectError::UnresolvableType { .. }
        ));
    }

    #[test]
    fn methods_only_live_in_services() {
        let ns = Node::namespace("x").unwrap();
        let m = Node::method("Call", "A", "B").unwrap();
        assert!(matches!(
            ns.add(m).unwrap_err(),
            ReflectError::WrongKind { .. }
        ));
    }

    #[test]
    fn service_json_roundtrip() {
        let doc = json!({
            "methods": {
                "Watch": {
                    "requestType": "Req",
                    "responseType": "Res",
                    "responseStream": true,
                },
            },
        });
        let svc = Node::service_from_json("Svc", doc.as_object().unwrap()).unwrap();
        assert_eq!(svc.to_json(), Some(doc));
    }
}
