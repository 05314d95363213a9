//! driftscope schema: navigable field trees.
//!
//! Two builders produce the same [`FieldNode`] shape: [`build_value_tree`]
//! over a resource body and [`build_schema_tree`] over an `openAPIV3Schema`.
//! [`NavStack`] drives drill-down/back over either.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

pub mod nav;
mod openapi;
mod value;

pub use nav::{NavFrame, NavStack};
pub use openapi::{build_schema_tree, crd_schema_tree, CrdSchemaTree};
pub use value::build_value_tree;

/// Containers nested deeper than this become `truncated` leaves.
pub const MAX_DEPTH: usize = 64;

pub const TRUNCATED: &str = "truncated";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldNode {
    pub name: String,
    /// Dotted path from the root, e.g. `spec.containers[0].image`.
    pub path: String,
    pub type_label: String,
    /// Stringified scalar, `[n items]` for lists, description for schema nodes.
    pub value: String,
    pub children: Vec<FieldNode>,
    pub required: bool,
}

impl FieldNode {
    pub fn has_children(&self) -> bool { !self.children.is_empty() }
}

/// What [`NavStack`] needs from a node.
pub trait TreeNode: Clone {
    fn name(&self) -> &str;
    fn path(&self) -> &str;
    fn children(&self) -> &[Self];
}

impl TreeNode for FieldNode {
    fn name(&self) -> &str { &self.name }
    fn path(&self) -> &str { &self.path }
    fn children(&self) -> &[Self] { &self.children }
}

/// Pre-order walk emitting every node, parents before their children.
pub fn flatten_tree(nodes: &[FieldNode]) -> Vec<&FieldNode> {
    fn walk<'a>(nodes: &'a [FieldNode], out: &mut Vec<&'a FieldNode>) {
        for n in nodes {
            out.push(n);
            walk(&n.children, out);
        }
    }
    let mut out = Vec::new();
    walk(nodes, &mut out);
    out
}

pub(crate) fn join_path(base: &str, key: &str) -> String {
    if base.is_empty() { key.to_string() } else { format!("{}.{}", base, key) }
}
