use crate::document::{Node, ParentIndex};

/// Parent id given to actions with no enclosing action.
pub const ROOT_PARENT: &str = "root";

/// Id of the nearest ancestor of `node` tagged `action_tag`.
///
/// Walks upward through `parents` only. Returns the ancestor's `id`
/// attribute (empty when it has none), or [`ROOT_PARENT`] when no action
/// encloses `node`, including when `node` is absent from the index.
pub fn resolve_parent_id(node: &Node<'_>, parents: &ParentIndex, action_tag: &str) -> String {
    let doc = node.document();
    let mut current = node.id();
    // The index has one entry per non-root node, so a longer walk means a cycle.
    for _ in 0..=parents.len() {
        let Some(parent_id) = parents.parent_of(current) else {
            return ROOT_PARENT.to_string();
        };
        let Some(parent) = doc.get(parent_id) else {
            tracing::warn!(node = parent_id.index(), "parent index does not match the document");
            return ROOT_PARENT.to_string();
        };
        if parent.is(action_tag) {
            return parent.attr_lossy("id");
        }
        current = parent_id;
    }
    tracing::warn!(node = current.index(), "parent chain did not terminate");
    ROOT_PARENT.to_string()
}
