//! Field trees over OpenAPI v3 schemas as found in CRDs.

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, trace};

use crate::{join_path, FieldNode, MAX_DEPTH, TRUNCATED};

const COMPOSITIONS: [&str; 3] = ["anyOf", "allOf", "oneOf"];

/// Tree for the version of a CRD that was picked for browsing.
#[derive(Debug, Clone, Serialize)]
pub struct CrdSchemaTree {
    pub version: String,
    pub fields: Vec<FieldNode>,
}

/// Build a tree from an `openAPIV3Schema`. An array-of-object root is
/// flattened to its item properties; compositions are labelled, never
/// expanded.
pub fn build_schema_tree(schema: &Value) -> Vec<FieldNode> {
    walk(schema, "", 0)
}

/// Tree of the first served version carrying a schema. Falls back to the
/// legacy `spec.validation` location when no version has one.
pub fn crd_schema_tree(crd: &Value) -> Option<CrdSchemaTree> {
    let versions = crd.pointer("/spec/versions").and_then(Value::as_array);
    for v in versions.into_iter().flatten() {
        if !v.get("served").and_then(Value::as_bool).unwrap_or(false) {
            continue;
        }
        if let Some(schema) = v.pointer("/schema/openAPIV3Schema") {
            let version = v.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
            debug!(%version, "building schema tree");
            return Some(CrdSchemaTree { version, fields: build_schema_tree(schema) });
        }
    }
    let legacy = crd.pointer("/spec/validation/openAPIV3Schema")?;
    let version = crd.pointer("/spec/version").and_then(Value::as_str).unwrap_or_default().to_string();
    Some(CrdSchemaTree { version, fields: build_schema_tree(legacy) })
}

fn walk(schema: &Value, base: &str, depth: usize) -> Vec<FieldNode> {
    if type_of(schema) == Some("array") {
        if let Some(items) = object_items(schema) {
            return walk(items, &format!("{}[]", base), depth);
        }
    }
    let Some(props) = schema.get("properties").and_then(Value::as_object) else {
        return Vec::new();
    };
    let required: Vec<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|r| r.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let mut names: Vec<&String> = props.keys().collect();
    names.sort();
    names.into_iter()
        .map(|name| {
            let prop = &props[name.as_str()];
            let path = join_path(base, name);
            let mut n = FieldNode {
                name: name.clone(),
                type_label: type_label(prop),
                value: prop.get("description").and_then(Value::as_str).unwrap_or_default().to_string(),
                required: required.contains(&name.as_str()),
                path,
                children: Vec::new(),
            };
            expand(&mut n, prop, depth);
            n
        })
        .collect()
}

fn expand(n: &mut FieldNode, prop: &Value, depth: usize) {
    match n.type_label.as_str() {
        "object" if has_properties(prop) => {
            if depth + 1 >= MAX_DEPTH {
                return truncate(n);
            }
            n.children = walk(prop, &n.path, depth + 1);
        }
        "array" => {
            let Some(items) = prop.get("items") else { return };
            if has_properties(items) {
                n.type_label = "array of object".to_string();
                if depth + 1 >= MAX_DEPTH {
                    return truncate(n);
                }
                n.children = walk(items, &format!("{}[]", n.path), depth + 1);
            } else if let Some(t) = type_of(items) {
                n.type_label = format!("array of {}", t);
            }
        }
        _ => {}
    }
}

fn truncate(n: &mut FieldNode) {
    trace!(path = %n.path, "schema tree truncated");
    n.type_label = TRUNCATED.to_string();
}

fn type_label(prop: &Value) -> String {
    if prop.get("x-kubernetes-int-or-string").and_then(Value::as_bool) == Some(true) {
        return "int-or-string".to_string();
    }
    if let Some(t) = type_of(prop) {
        return t.to_string();
    }
    COMPOSITIONS
        .iter()
        .find(|c| prop.get(**c).and_then(Value::as_array).is_some_and(|a| !a.is_empty()))
        .map(|c| c.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn type_of(schema: &Value) -> Option<&str> {
    schema.get("type").and_then(Value::as_str).filter(|t| !t.is_empty())
}

fn has_properties(schema: &Value) -> bool {
    schema.get("properties").and_then(Value::as_object).is_some_and(|p| !p.is_empty())
}

fn object_items(schema: &Value) -> Option<&Value> {
    schema.get("items").filter(|i| has_properties(i))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn certificate_schema() -> Value {
        json!({
            "type": "object",
            "required": ["spec"],
            "properties": {
                "spec": {
                    "type": "object",
                    "description": "desired state",
                    "required": ["secretName"],
                    "properties": {
                        "secretName": {"type": "string"},
                        "dnsNames": {"type": "array", "items": {"type": "string"}},
                        "port": {"x-kubernetes-int-or-string": true, "anyOf": [{"type": "integer"}, {"type": "string"}]},
                        "issuerRef": {"anyOf": [{"type": "object"}]},
                        "rules": {
                            "type": "array",
                            "items": {"type": "object", "required": ["host"], "properties": {"host": {"type": "string"}, "paths": {"type": "array"}}}
                        }
                    }
                },
                "status": {"type": "object"}
            }
        })
    }

    #[test]
    fn walks_objects_arrays_and_labels() {
        let tree = build_schema_tree(&certificate_schema());
        assert_eq!(tree.len(), 2);
        let spec = &tree[0];
        assert!(spec.required);
        assert_eq!(spec.value, "desired state");
        assert!(!tree[1].required);
        assert!(tree[1].children.is_empty(), "object without properties is a leaf");

        let field = |name: &str| spec.children.iter().find(|n| n.name == name).expect("field");
        assert!(field("secretName").required);
        assert_eq!(field("dnsNames").type_label, "array of string");
        assert_eq!(field("port").type_label, "int-or-string");
        assert_eq!(field("issuerRef").type_label, "anyOf");
        assert!(field("issuerRef").children.is_empty());

        let rules = field("rules");
        assert_eq!(rules.type_label, "array of object");
        assert_eq!(rules.children[0].path, "spec.rules[].host");
        assert!(rules.children[0].required);
        assert_eq!(rules.children[1].type_label, "array");
    }

    #[test]
    fn array_root_is_flattened() {
        let tree = build_schema_tree(&json!({
            "type": "array",
            "items": {"type": "object", "properties": {"name": {"type": "string"}}}
        }));
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].path, "[].name");
    }

    #[test]
    fn missing_type_is_unknown() {
        let tree = build_schema_tree(&json!({"properties": {"x": {}}}));
        assert_eq!(tree[0].type_label, "unknown");
    }

    #[test]
    fn crd_picks_first_served_version_with_schema() {
        let crd = json!({
            "spec": {
                "versions": [
                    {"name": "v1alpha1", "served": false, "schema": {"openAPIV3Schema": {"properties": {"old": {"type": "string"}}}}},
                    {"name": "v1beta1", "served": true},
                    {"name": "v1", "served": true, "schema": {"openAPIV3Schema": {"properties": {"spec": {"type": "object"}}}}}
                ]
            }
        });
        let tree = crd_schema_tree(&crd).expect("tree");
        assert_eq!(tree.version, "v1");
        assert_eq!(tree.fields[0].name, "spec");
        assert!(crd_schema_tree(&json!({"spec": {"versions": []}})).is_none());
    }

    #[test]
    fn crd_legacy_validation_block() {
        let crd = json!({
            "spec": {"version": "v1beta1", "validation": {"openAPIV3Schema": {"properties": {"a": {"type": "integer"}}}}}
        });
        let tree = crd_schema_tree(&crd).expect("tree");
        assert_eq!(tree.version, "v1beta1");
        assert_eq!(tree.fields[0].type_label, "integer");
    }
}
