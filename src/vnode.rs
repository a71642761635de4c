use std::{
    any::Any,
    ops::{Index, IndexMut},
};

use parse_display::Display;
use slabmap::SlabMap;

use crate::{Flags, HostHandle, Key, NodeType, Props, Subscription};

#[cfg(test)]
mod tests;

/// Identifies a node inside a [`Tree`].
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd, Display)]
#[display("#{0}")]
pub struct NodeId(pub(crate) usize);

pub type Effect = Box<dyn FnOnce() -> Option<Cleanup>>;
pub type Cleanup = Box<dyn FnOnce()>;

/// State of a node as of its last commit.
///
/// Holds no snapshot of its own, so at most one previous generation is ever retained.
#[derive(Debug)]
pub struct Snapshot {
    pub props: Props,
    pub index: usize,
}

/// One node of the live tree.
pub struct VNode {
    pub(crate) ty: NodeType,
    pub(crate) key: Option<Key>,
    pub(crate) props: Props,
    pub(crate) flags: Flags,
    pub(crate) parent: Option<NodeId>,
    pub(crate) child: Option<NodeId>,
    pub(crate) sibling: Option<NodeId>,
    pub(crate) prev: Option<Box<Snapshot>>,
    pub(crate) index: usize,
    pub(crate) depth: usize,
    pub(crate) dom: Option<HostHandle>,
    pub(crate) hooks: Vec<Box<dyn Any>>,
    pub(crate) effects: Vec<Effect>,
    pub(crate) immediate_effects: Vec<Effect>,
    pub(crate) effect_cleanups: Vec<Cleanup>,
    pub(crate) cleanups: Vec<Cleanup>,
    pub(crate) deletions: Vec<NodeId>,
    pub(crate) subscriptions: Vec<Subscription>,
    pub(crate) mounted: bool,
    pub(crate) dirty: bool,
    pub(crate) pass: u64,
}

impl VNode {
    pub fn new(ty: NodeType, key: Option<Key>, props: Props) -> Self {
        Self {
            ty,
            key,
            props,
            flags: Flags::empty(),
            parent: None,
            child: None,
            sibling: None,
            prev: None,
            index: 0,
            depth: 0,
            dom: None,
            hooks: Vec::new(),
            effects: Vec::new(),
            immediate_effects: Vec::new(),
            effect_cleanups: Vec::new(),
            cleanups: Vec::new(),
            deletions: Vec::new(),
            subscriptions: Vec::new(),
            mounted: false,
            dirty: false,
            pass: 0,
        }
    }

    pub fn ty(&self) -> &NodeType {
        &self.ty
    }
    pub fn key(&self) -> Option<&Key> {
        self.key.as_ref()
    }
    pub fn props(&self) -> &Props {
        &self.props
    }
    pub fn flags(&self) -> Flags {
        self.flags
    }
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }
    pub fn child(&self) -> Option<NodeId> {
        self.child
    }
    pub fn sibling(&self) -> Option<NodeId> {
        self.sibling
    }
    pub fn prev(&self) -> Option<&Snapshot> {
        self.prev.as_deref()
    }
    pub fn index(&self) -> usize {
        self.index
    }
    pub fn depth(&self) -> usize {
        self.depth
    }
    pub fn dom(&self) -> Option<HostHandle> {
        self.dom
    }
    pub fn hook_count(&self) -> usize {
        self.hooks.len()
    }
    pub fn deletions(&self) -> &[NodeId] {
        &self.deletions
    }
    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// Marks this node as committed and clears its pending operations.
    pub(crate) fn settle(&mut self) {
        self.flags -= Flags::PENDING;
        self.prev = None;
        self.mounted = true;
        self.dirty = false;
    }

    /// Index this node had when it was last committed.
    pub(crate) fn committed_index(&self) -> Option<usize> {
        if !self.mounted {
            return None;
        }
        Some(self.prev.as_ref().map_or(self.index, |p| p.index))
    }
    /// Props this node had when it was last committed.
    pub(crate) fn committed_props(&self) -> Option<&Props> {
        if !self.mounted {
            return None;
        }
        Some(self.prev.as_ref().map_or(&self.props, |p| &p.props))
    }
}

impl std::fmt::Debug for VNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VNode")
            .field("ty", &self.ty)
            .field("key", &self.key)
            .field("props", &self.props)
            .field("flags", &self.flags)
            .field("index", &self.index)
            .field("dom", &self.dom)
            .finish_non_exhaustive()
    }
}

/// Arena owning every node of one application.
///
/// Links between nodes are [`NodeId`]s, so the tree holds no reference cycles.
#[derive(Default)]
pub struct Tree {
    nodes: SlabMap<VNode>,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn len(&self) -> usize {
        self.nodes.len()
    }
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id.0)
    }
    pub fn get(&self, id: NodeId) -> Option<&VNode> {
        self.nodes.get(id.0)
    }
    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut VNode> {
        self.nodes.get_mut(id.0)
    }
    pub(crate) fn insert(&mut self, node: VNode) -> NodeId {
        NodeId(self.nodes.insert(node))
    }
    pub(crate) fn remove(&mut self, id: NodeId) -> Option<VNode> {
        self.nodes.remove(id.0)
    }

    /// Children of `id`, first to last.
    pub fn children(&self, id: NodeId) -> Children<'_> {
        Children {
            tree: self,
            next: self[id].child,
        }
    }
    /// Ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self[id].parent, |&p| self[p].parent)
    }
    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self[id].parent?;
        let mut prev = None;
        for c in self.children(parent) {
            if c == id {
                return prev;
            }
            prev = Some(c);
        }
        None
    }

    /// Returns `true` if `ancestor` is a strict ancestor of `node`.
    ///
    /// Uses the cached depth to climb exactly the distance between the two nodes.
    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let (Some(a), Some(n)) = (self.get(ancestor), self.get(node)) else {
            return false;
        };
        if a.depth >= n.depth {
            return false;
        }
        let mut id = node;
        for _ in 0..(n.depth - a.depth) {
            match self[id].parent {
                Some(p) => id = p,
                None => return false,
            }
        }
        id == ancestor
    }
    pub fn contains_node(&self, root: NodeId, node: NodeId) -> bool {
        root == node || self.is_ancestor(root, node)
    }

    /// `root` and its descendants in pre-order.
    pub fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            out.push(id);
            let start = stack.len();
            stack.extend(self.children(id));
            stack[start..].reverse();
        }
        out
    }

    /// Detaches `id` from its parent's child chain.
    pub(crate) fn unlink(&mut self, id: NodeId) {
        let Some(parent) = self[id].parent else {
            return;
        };
        let next = self[id].sibling.take();
        if self[parent].child == Some(id) {
            self[parent].child = next;
        } else if let Some(prev) = self.previous_sibling(id) {
            self[prev].sibling = next;
        }
    }

    /// Marks `root` and its descendants as committed and clears their pending operations.
    #[cfg(test)]
    pub(crate) fn settle(&mut self, root: NodeId) {
        for id in self.descendants(root) {
            self[id].settle();
        }
    }

    /// Renders the structure below `root` for debugging and tests.
    pub fn dump(&self, root: NodeId) -> String {
        let mut out = String::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let node = &self[id];
            let depth = node.depth - self[root].depth;
            out.push_str(&"  ".repeat(depth));
            out.push_str(&node.ty.to_string());
            if let Some(key) = &node.key {
                out.push_str(&format!(" key={key}"));
            }
            if let Some(text) = node.props.text() {
                out.push_str(&format!(" {:?}", text.get()));
            }
            out.push('\n');
            let start = stack.len();
            stack.extend(self.children(id));
            stack[start..].reverse();
        }
        out
    }
}

impl Index<NodeId> for Tree {
    type Output = VNode;
    fn index(&self, id: NodeId) -> &VNode {
        &self.nodes[id.0]
    }
}
impl IndexMut<NodeId> for Tree {
    fn index_mut(&mut self, id: NodeId) -> &mut VNode {
        &mut self.nodes[id.0]
    }
}

pub struct Children<'a> {
    tree: &'a Tree,
    next: Option<NodeId>,
}
impl Iterator for Children<'_> {
    type Item = NodeId;
    fn next(&mut self) -> Option<NodeId> {
        let id = self.next?;
        self.next = self.tree[id].sibling;
        Some(id)
    }
}
