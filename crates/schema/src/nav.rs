//! Drill-down / back navigation over a node tree.
//!
//! Invalid moves (drilling into a leaf, going back at the root) are no-ops
//! reported as `false`, so callers can map every keypress the same way.

use crate::TreeNode;

/// Saved position, restored by [`NavStack::go_back`].
#[derive(Debug, Clone)]
pub struct NavFrame<T> {
    pub nodes: Vec<T>,
    pub cursor: usize,
    pub breadcrumb: String,
}

#[derive(Debug, Clone)]
pub struct NavStack<T: TreeNode> {
    nodes: Vec<T>,
    cursor: usize,
    breadcrumb: String,
    frames: Vec<NavFrame<T>>,
}

impl<T: TreeNode> NavStack<T> {
    pub fn new(root: Vec<T>, root_label: impl Into<String>) -> Self {
        Self { nodes: root, cursor: 0, breadcrumb: root_label.into(), frames: Vec::new() }
    }

    pub fn current(&self) -> &[T] { &self.nodes }
    pub fn cursor(&self) -> usize { self.cursor }
    /// Number of active drill-downs.
    pub fn depth(&self) -> usize { self.frames.len() }
    pub fn breadcrumb(&self) -> &str { &self.breadcrumb }

    /// Labels from the root to the current level.
    pub fn breadcrumbs(&self) -> Vec<&str> {
        self.frames.iter().map(|f| f.breadcrumb.as_str()).chain(std::iter::once(self.breadcrumb.as_str())).collect()
    }

    pub fn selected(&self) -> Option<&T> { self.nodes.get(self.cursor) }

    /// Clamped to the current list.
    pub fn set_cursor(&mut self, cursor: usize) {
        self.cursor = cursor.min(self.nodes.len().saturating_sub(1));
    }

    /// Replace the current list with the children of `nodes[index]`.
    pub fn drill_into(&mut self, index: usize) -> bool {
        let Some(node) = self.nodes.get(index) else { return false };
        if node.children().is_empty() {
            return false;
        }
        let children = node.children().to_vec();
        let label = node.path().to_string();
        let nodes = std::mem::replace(&mut self.nodes, children);
        let breadcrumb = std::mem::replace(&mut self.breadcrumb, label);
        self.frames.push(NavFrame { nodes, cursor: self.cursor, breadcrumb });
        self.cursor = 0;
        true
    }

    pub fn drill_selected(&mut self) -> bool { self.drill_into(self.cursor) }

    pub fn go_back(&mut self) -> bool {
        match self.frames.pop() {
            Some(f) => {
                self.nodes = f.nodes;
                self.cursor = f.cursor;
                self.breadcrumb = f.breadcrumb;
                true
            }
            None => false,
        }
    }

    /// Drill by successive names. Stops at the first name that does not
    /// resolve to a node with children and returns how many steps succeeded.
    pub fn drill_path<S: AsRef<str>>(&mut self, names: &[S]) -> usize {
        let mut steps = 0;
        for name in names {
            let Some(idx) = self.nodes.iter().position(|n| n.name() == name.as_ref()) else { break };
            if !self.drill_into(idx) {
                self.cursor = idx;
                break;
            }
            steps += 1;
        }
        steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{build_value_tree, FieldNode};
    use serde_json::json;

    fn stack() -> NavStack<FieldNode> {
        NavStack::new(build_value_tree(&json!({"a": {"b": 1}, "c": [1, 2]})), "widget")
    }

    #[test]
    fn drill_then_back_restores_list_and_cursor() {
        let mut nav = stack();
        let before: Vec<String> = nav.current().iter().map(|n| n.name.clone()).collect();
        nav.set_cursor(0);
        assert!(nav.drill_into(0));
        assert_eq!(nav.depth(), 1);
        assert_eq!(nav.current().len(), 1);
        assert_eq!(nav.current()[0].name, "b");
        assert_eq!(nav.breadcrumb(), "a");
        assert_eq!(nav.cursor(), 0);

        assert!(nav.go_back());
        let after: Vec<String> = nav.current().iter().map(|n| n.name.clone()).collect();
        assert_eq!(before, after);
        assert_eq!(nav.cursor(), 0);
        assert_eq!(nav.breadcrumb(), "widget");
        assert_eq!(nav.depth(), 0);
    }

    #[test]
    fn back_restores_non_zero_cursor() {
        let mut nav = stack();
        nav.set_cursor(1);
        assert!(nav.drill_selected());
        assert_eq!(nav.current()[1].path, "c[1]");
        assert!(nav.go_back());
        assert_eq!(nav.cursor(), 1);
    }

    #[test]
    fn back_restores_cursor_not_drilled_index() {
        let mut nav = stack();
        nav.set_cursor(1);
        assert!(nav.drill_into(0));
        assert_eq!(nav.current()[0].name, "b");
        assert!(nav.go_back());
        assert_eq!(nav.cursor(), 1);
        assert_eq!(nav.selected().map(|n| n.name.as_str()), Some("c"));
    }

    #[test]
    fn invalid_moves_are_noops() {
        let mut nav = stack();
        assert!(!nav.go_back());
        assert!(!nav.drill_into(7));
        assert!(nav.drill_into(0));
        assert!(!nav.drill_into(0), "b is a leaf");
        assert_eq!(nav.depth(), 1);
    }

    #[test]
    fn cursor_is_clamped() {
        let mut nav = stack();
        nav.set_cursor(99);
        assert_eq!(nav.cursor(), 1);
        let mut empty: NavStack<FieldNode> = NavStack::new(Vec::new(), "");
        empty.set_cursor(3);
        assert_eq!(empty.cursor(), 0);
        assert!(empty.selected().is_none());
    }

    #[test]
    fn drill_path_by_names() {
        let tree = build_value_tree(&json!({"spec": {"template": {"containers": [{"image": "nginx"}]}}}));
        let mut nav = NavStack::new(tree, "deploy");
        assert_eq!(nav.drill_path(&["spec", "template", "containers", "[0]"]), 4);
        assert_eq!(nav.breadcrumbs(), vec!["deploy", "spec", "spec.template", "spec.template.containers", "spec.template.containers[0]"]);
        assert_eq!(nav.selected().map(|n| n.value.as_str()), Some("nginx"));

        let mut nav = NavStack::new(build_value_tree(&json!({"a": {"b": 1}})), "");
        assert_eq!(nav.drill_path(&["a", "b", "zzz"]), 1);
        assert_eq!(nav.selected().map(|n| n.name.as_str()), Some("b"));
    }
}
