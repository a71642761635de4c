//! The contract between the scheduler and a host backend.
//!
//! The scheduler never touches host objects itself. It creates, moves, patches and removes them
//! only through [`Renderer`], so the same engine drives any backend that implements it.

use std::rc::Rc;

use parse_display::Display;

use crate::{Flags, NodeId, Props, Tree};

pub mod canvas;
pub mod dom;

/// Opaque handle to a host object, allocated by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
#[display("@{0}")]
pub struct HostHandle(pub usize);

/// An event delivered by a backend to a handler prop.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub name: String,
    pub target: HostHandle,
    pub value: Option<String>,
}

/// Host backend.
///
/// Methods taking a [`Tree`] and a [`NodeId`] may read anything about the node, but the tree is
/// owned by the scheduler for the whole commit.
pub trait Renderer {
    /// Prepares `container` to receive a root.
    fn create_root(&mut self, container: HostHandle) {
        let _ = container;
    }
    /// Called once, after the first commit of the root at `root`.
    fn on_root_mounted(&mut self, tree: &Tree, root: NodeId) {
        let _ = (tree, root);
    }

    /// Creates the host object of a host or text node. Props are applied afterwards with
    /// [`Renderer::update_element`].
    fn create_element(&mut self, tree: &Tree, node: NodeId) -> HostHandle;

    /// Moves `child` to the end of `parent`, detaching it first if it is attached elsewhere.
    fn append_child(&mut self, parent: HostHandle, child: HostHandle);
    /// Moves `child` to the start of `parent`.
    fn prepend_child(&mut self, parent: HostHandle, child: HostHandle);
    /// Moves `child` right after `prev`, which is a child of `parent`.
    fn insert_after(&mut self, parent: HostHandle, prev: HostHandle, child: HostHandle);

    /// Detaches and releases the host object of `node`, which is about to be destroyed.
    fn on_remove(&mut self, tree: &Tree, node: NodeId);

    /// Applies the difference between `prev` and `next` to the host object of `node`.
    ///
    /// `prev` is `None` right after creation.
    fn update_element(&mut self, tree: &Tree, node: NodeId, prev: Option<&Props>, next: &Props);

    /// The nearest ancestor of `node` that owns a host object.
    fn get_mountable_parent(&self, tree: &Tree, node: NodeId) -> Option<NodeId> {
        tree.ancestors(node).find(|&id| tree[id].dom.is_some())
    }
    /// Whether the host object of `parent` may contain children.
    fn is_valid_parent(&self, tree: &Tree, parent: NodeId) -> bool {
        let _ = (tree, parent);
        true
    }
    /// Whether `anchor` may serve as the previous sibling for an insertion into `mount_parent`.
    fn can_insert_after(&self, tree: &Tree, anchor: NodeId, mount_parent: NodeId) -> bool {
        let _ = (tree, anchor, mount_parent);
        true
    }

    fn on_before_commit(&mut self) {}
    fn on_after_commit(&mut self) {}
    fn on_commit_traversal_descend(&mut self, tree: &Tree, node: NodeId) {
        let _ = (tree, node);
    }
    fn on_update_traversal_ascend(&mut self, tree: &Tree, node: NodeId) {
        let _ = (tree, node);
    }

    /// A closure replacing the content of the text object `handle`.
    ///
    /// Signal-bound text is kept current through this closure without a render.
    fn text_patcher(&self, handle: HostHandle) -> Rc<dyn Fn(&str)>;
    /// A closure replacing attribute `name` of `handle`.
    fn attr_patcher(&self, handle: HostHandle, name: &str) -> Rc<dyn Fn(&str)>;
}

/// Finds the host node after which `node` must be inserted inside `mount_parent`.
///
/// Searches the previous siblings of `node` and of its host-less ancestors, descending into each
/// one for its last committed host node. `None` means `node` becomes the first child.
pub(crate) fn find_anchor(
    renderer: &impl Renderer,
    tree: &Tree,
    node: NodeId,
    mount_parent: NodeId,
) -> Option<NodeId> {
    let mut current = node;
    loop {
        let mut prev = tree.previous_sibling(current);
        while let Some(p) = prev {
            if let Some(anchor) = last_host(tree, p) {
                if renderer.can_insert_after(tree, anchor, mount_parent) {
                    return Some(anchor);
                }
            }
            prev = tree.previous_sibling(p);
        }
        let parent = tree[current].parent?;
        if parent == mount_parent || tree[parent].dom.is_some() {
            return None;
        }
        current = parent;
    }
}

/// The last host node in document order within the subtree at `id` that is already in place.
fn last_host(tree: &Tree, id: NodeId) -> Option<NodeId> {
    let node = &tree[id];
    if node.flags.intersects(Flags::PLACEMENT | Flags::DELETION) {
        return None;
    }
    if node.ty.is_host() {
        return node.dom.map(|_| id);
    }
    let children: Vec<NodeId> = tree.children(id).collect();
    children.into_iter().rev().find_map(|c| last_host(tree, c))
}
