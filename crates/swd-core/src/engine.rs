//! Non-executing traversal: `ForEach`, used by `--list-steps` and
//! `--list-artifacts` to walk the whole tree without running anything.
//! `Path` (ancestor-to-node) is `Tree::canonical_path`; `FindUnit` is
//! `Tree::find_unit`. Both already live on `Tree` and don't need a separate
//! wrapper here.

use crate::unit::{Node, NodeId, Tree};

/// Visit `start` pre-order: the node itself, then its children
/// (Group → Group/Script children, Script → Step children), depth-first.
pub fn for_each<F>(tree: &Tree, start: NodeId, visitor: &mut F)
where
    F: FnMut(&Tree, NodeId),
{
    visitor(tree, start);
    match tree.node(start) {
        Node::Group(g) => {
            for &child in &g.children {
                for_each(tree, child, visitor);
            }
        }
        Node::Script(s) => {
            for &step in &s.steps {
                for_each(tree, step, visitor);
            }
        }
        Node::Step(_) => {}
    }
}

/// Every Step under `start`, in pre-order, paired with its canonical path.
/// Convenience built on `for_each`, used by `--list-steps`.
pub fn list_step_paths(tree: &Tree, start: NodeId) -> Vec<(NodeId, String)> {
    let mut out = Vec::new();
    for_each(tree, start, &mut |t, id| {
        if matches!(t.node(id), Node::Step(_)) {
            out.push((id, t.canonical_path(id)));
        }
    });
    out
}
