use serde_json::{Map, Value};
use tracing::trace;

use crate::{join_path, FieldNode, MAX_DEPTH, TRUNCATED};

/// Build a tree over an arbitrary document. Keys sort lexicographically at
/// every level; array elements become `[i]` children. A scalar root yields
/// no nodes.
pub fn build_value_tree(doc: &Value) -> Vec<FieldNode> {
    match doc {
        Value::Object(map) => object_fields(map, "", 0),
        Value::Array(items) => list_fields(items, "", 0),
        _ => Vec::new(),
    }
}

fn object_fields(map: &Map<String, Value>, base: &str, depth: usize) -> Vec<FieldNode> {
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort();
    keys.into_iter()
        .map(|k| {
            let path = join_path(base, k);
            node(k.clone(), path, &map[k.as_str()], "map", depth)
        })
        .collect()
}

fn list_fields(items: &[Value], base: &str, depth: usize) -> Vec<FieldNode> {
    items
        .iter()
        .enumerate()
        .map(|(i, v)| {
            let name = format!("[{}]", i);
            let path = format!("{}{}", base, name);
            node(name, path, v, "object", depth)
        })
        .collect()
}

/// `map_label` distinguishes objects under a key (`map`) from objects
/// inside arrays (`object`).
fn node(name: String, path: String, v: &Value, map_label: &str, depth: usize) -> FieldNode {
    let mut n = FieldNode { name, path, ..FieldNode::default() };
    match v {
        Value::Object(m) if depth + 1 >= MAX_DEPTH => truncate(&mut n, format!("{{{} fields}}", m.len())),
        Value::Array(a) if depth + 1 >= MAX_DEPTH => truncate(&mut n, format!("[{} items]", a.len())),
        Value::Object(m) => {
            n.type_label = map_label.to_string();
            n.children = object_fields(m, &n.path, depth + 1);
        }
        Value::Array(a) => {
            n.type_label = "list".to_string();
            n.value = format!("[{} items]", a.len());
            n.children = list_fields(a, &n.path, depth + 1);
        }
        Value::String(s) => {
            n.type_label = "string".to_string();
            n.value = s.clone();
        }
        Value::Number(num) => {
            n.type_label = "number".to_string();
            n.value = num.to_string();
        }
        Value::Bool(b) => {
            n.type_label = "bool".to_string();
            n.value = b.to_string();
        }
        Value::Null => {
            n.type_label = "null".to_string();
            n.value = "null".to_string();
        }
    }
    n
}

fn truncate(n: &mut FieldNode, summary: String) {
    trace!(path = %n.path, "value tree truncated");
    n.type_label = TRUNCATED.to_string();
    n.value = summary;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_map_and_list() {
        let tree = build_value_tree(&json!({"c": [1, 2], "a": {"b": 1}}));
        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].name, "a");
        assert_eq!(tree[0].type_label, "map");
        assert_eq!(tree[0].children.len(), 1);
        assert_eq!(tree[0].children[0].name, "b");
        assert_eq!(tree[0].children[0].value, "1");
        assert_eq!(tree[0].children[0].path, "a.b");

        let c = &tree[1];
        assert_eq!(c.type_label, "list");
        assert_eq!(c.value, "[2 items]");
        let names: Vec<_> = c.children.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["[0]", "[1]"]);
        assert_eq!(c.children[1].path, "c[1]");
        assert_eq!(c.children[1].type_label, "number");
    }

    #[test]
    fn scalar_types_and_array_objects() {
        let tree = build_value_tree(&json!({
            "s": "x", "n": 1.5, "b": false, "z": null,
            "items": [{"k": "v"}]
        }));
        let by_name = |name: &str| tree.iter().find(|n| n.name == name).expect("node");
        assert_eq!(by_name("s").type_label, "string");
        assert_eq!(by_name("n").value, "1.5");
        assert_eq!(by_name("b").value, "false");
        assert_eq!(by_name("z").type_label, "null");
        let item = &by_name("items").children[0];
        assert_eq!(item.type_label, "object");
        assert_eq!(item.children[0].path, "items[0].k");
    }

    #[test]
    fn keys_sorted_deterministically() {
        let tree = build_value_tree(&json!({"zeta": 1, "alpha": 2, "Mid": 3}));
        let names: Vec<_> = tree.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["Mid", "alpha", "zeta"]);
    }

    #[test]
    fn scalar_root_is_empty() {
        assert!(build_value_tree(&json!(42)).is_empty());
        assert_eq!(build_value_tree(&json!(["a"])).len(), 1);
    }

    #[test]
    fn deep_documents_truncate() {
        let mut doc = json!({"leaf": 1});
        for _ in 0..(MAX_DEPTH + 10) {
            doc = json!({ "n": doc });
        }
        let tree = build_value_tree(&doc);
        let mut cur = &tree[0];
        let mut depth = 1;
        while cur.has_children() {
            cur = &cur.children[0];
            depth += 1;
        }
        assert_eq!(cur.type_label, TRUNCATED);
        assert_eq!(depth, MAX_DEPTH);
    }
}
