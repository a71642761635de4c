//! Keyed child diffing.
//!
//! [`Reconciler::reconcile`] matches a new children description against the current children of a
//! node in two phases. The first walks both lists in lockstep while they stay compatible. The
//! second indexes the remaining old children by key (or position, for unkeyed ones) and resolves
//! each remaining description against that index. Old children left over are scheduled for
//! deletion on the parent.
//!
//! Moves are detected with a monotonic heuristic: a reused child whose committed index is lower
//! than the highest committed index already kept in place is flagged for placement. This is not a
//! minimal move set.

use std::collections::{HashMap, HashSet, VecDeque};

use bumpalo::{collections::Vec as BumpVec, Bump};

use crate::{
    element::{Element, TextContent},
    Child, Flags, Key, NodeId, NodeType, Props, Snapshot, Tree, VNode,
};


/// A development-time finding about a children description. Never affects the result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// Two siblings in one array share an explicit key.
    DuplicateKey { parent: NodeId, key: Key },
    /// A list mixes keyed and unkeyed elements.
    MissingKeys { parent: NodeId },
}

#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }
    pub fn len(&self) -> usize {
        self.warnings.len()
    }
    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }
    pub fn clear(&mut self) {
        self.warnings.clear();
    }
    fn push(&mut self, warning: Warning) {
        match &warning {
            Warning::DuplicateKey { parent, key } => {
                tracing::warn!(%parent, %key, "duplicate key among siblings");
            }
            Warning::MissingKeys { parent } => {
                tracing::warn!(%parent, "list mixes keyed and unkeyed children");
            }
        }
        self.warnings.push(warning);
    }
}

#[derive(PartialEq, Eq, Hash)]
enum MapKey {
    Key(Key),
    Index(usize),
}

/// A child description reduced to what a node is built from.
struct Desc {
    ty: NodeType,
    key: Option<Key>,
    props: Props,
    hints: Flags,
}

impl Desc {
    fn from_child(child: &Child) -> Option<Desc> {
        let text = |text| {
            let mut props = Props::default();
            props.text = Some(text);
            Desc {
                ty: NodeType::Text,
                key: None,
                props,
                hints: Flags::empty(),
            }
        };
        let group = |items: &std::rc::Rc<Vec<Child>>, list_context| {
            let mut props = Props::default();
            props.children = items.clone();
            props.list_context = list_context;
            Desc {
                ty: NodeType::Fragment,
                key: None,
                props,
                hints: Flags::empty(),
            }
        };
        Some(match child {
            Child::Empty => return None,
            Child::Text(s) => text(TextContent::Static(s.clone())),
            Child::Signal(s) => text(TextContent::Signal(s.clone())),
            Child::Element(Element {
                ty,
                key,
                props,
                hints,
            }) => Desc {
                ty: ty.clone(),
                key: key.clone(),
                props: props.clone(),
                hints: *hints,
            },
            Child::Fragment(items) => group(items, false),
            Child::List(items) => group(items, true),
        })
    }
}

/// Reconciles children of nodes in one tree.
pub struct Reconciler<'a> {
    pub tree: &'a mut Tree,
    /// Receives warnings. `None` disables the checks.
    pub diagnostics: Option<&'a mut Diagnostics>,
    /// Scratch space, reset by the owner between passes.
    pub bump: &'a Bump,
}

impl Reconciler<'_> {
    /// Makes the children of `parent` match `children`, returning the new first child.
    ///
    /// Reused children keep their identity and get [`Flags::UPDATE`] when their props differ from
    /// the committed ones. New children get [`Flags::PLACEMENT`]. Children that are no longer
    /// described are flagged [`Flags::DELETION`] and appended to the `deletions` of `parent`.
    pub fn reconcile(&mut self, parent: NodeId, children: &[Child], is_list: bool) -> Option<NodeId> {
        if let Some(diagnostics) = self.diagnostics.as_deref_mut() {
            check_keys(diagnostics, parent, children, is_list);
        }
        let mut olds = BumpVec::new_in(self.bump);
        olds.extend(self.tree.children(parent));
        let mut news = BumpVec::with_capacity_in(children.len(), self.bump);

        let mut last_placed = 0;
        let mut old_pos = 0;
        let mut i = 0;
        while i < children.len() && old_pos < olds.len() {
            let old = olds[old_pos];
            let Some(desc) = Desc::from_child(&children[i]) else {
                if self.tree[old].index > i {
                    i += 1;
                    continue;
                }
                break;
            };
            if self.tree[old].index > i || !self.is_compatible(old, &desc) {
                break;
            }
            self.reuse(old, desc);
            last_placed = self.place(old, last_placed, i);
            news.push(old);
            old_pos += 1;
            i += 1;
        }

        // Siblings sharing a key queue up in committed order so none of them is lost.
        let mut remaining: HashMap<MapKey, VecDeque<NodeId>> = HashMap::new();
        for &id in &olds[old_pos..] {
            let node = &self.tree[id];
            let key = match &node.key {
                Some(key) => MapKey::Key(key.clone()),
                None => MapKey::Index(node.index),
            };
            remaining.entry(key).or_default().push_back(id);
        }
        while i < children.len() {
            if let Some(desc) = Desc::from_child(&children[i]) {
                let map_key = match &desc.key {
                    Some(key) => MapKey::Key(key.clone()),
                    None => MapKey::Index(i),
                };
                let matched = match remaining.get_mut(&map_key) {
                    Some(queue)
                        if queue
                            .front()
                            .is_some_and(|&old| self.tree[old].ty.is_same(&desc.ty)) =>
                    {
                        queue.pop_front()
                    }
                    _ => None,
                };
                let id = match matched {
                    Some(old) => {
                        self.reuse(old, desc);
                        old
                    }
                    None => self.create(parent, desc),
                };
                last_placed = self.place(id, last_placed, i);
                news.push(id);
            }
            i += 1;
        }

        let depth = self.tree[parent].depth + 1;
        let inherited = self.tree[parent].flags.inherited();
        let mut next = None;
        for &id in news.iter().rev() {
            let node = &mut self.tree[id];
            node.parent = Some(parent);
            node.sibling = next;
            node.depth = depth;
            node.flags.set(Flags::HAS_MEMO_ANCESTOR, !inherited.is_empty());
            next = Some(id);
        }
        self.tree[parent].child = next;

        let mut deleted: Vec<NodeId> = remaining.into_values().flatten().collect();
        deleted.sort_by_key(|&id| self.tree[id].index);
        for &id in &deleted {
            let node = &mut self.tree[id];
            node.flags |= Flags::DELETION;
            node.sibling = None;
        }
        self.tree[parent].deletions.extend(deleted);
        next
    }

    fn is_compatible(&self, old: NodeId, desc: &Desc) -> bool {
        let node = &self.tree[old];
        node.ty.is_same(&desc.ty) && node.key == desc.key
    }

    fn reuse(&mut self, id: NodeId, desc: Desc) {
        let node = &mut self.tree[id];
        let old_props = std::mem::replace(&mut node.props, desc.props);
        if node.mounted && node.prev.is_none() {
            node.prev = Some(Box::new(Snapshot {
                props: old_props,
                index: node.index,
            }));
        }
        node.flags = (node.flags - Flags::HINTS) | desc.hints;
        if node.mounted {
            let changed = !node.flags.contains(Flags::STATIC_DOM)
                && node.committed_props() != Some(&node.props);
            node.flags.set(Flags::UPDATE, changed);
        }
    }

    fn create(&mut self, parent: NodeId, desc: Desc) -> NodeId {
        let mut node = VNode::new(desc.ty, desc.key, desc.props);
        node.flags = Flags::PLACEMENT | desc.hints | self.tree[parent].flags.inherited();
        node.parent = Some(parent);
        let id = self.tree.insert(node);
        tracing::trace!(node = %id, ty = %self.tree[id].ty, "created");
        id
    }

    /// Records the new position of `id` and flags it for placement when it moved backwards.
    fn place(&mut self, id: NodeId, last_placed: usize, index: usize) -> usize {
        let node = &mut self.tree[id];
        let committed = node.committed_index();
        node.index = index;
        match committed {
            Some(old) if old >= last_placed => old,
            Some(_) => {
                node.flags |= Flags::PLACEMENT;
                last_placed
            }
            None => {
                node.flags |= Flags::PLACEMENT;
                last_placed
            }
        }
    }
}

fn check_keys(diagnostics: &mut Diagnostics, parent: NodeId, children: &[Child], is_list: bool) {
    if children.len() < 2 {
        return;
    }
    let mut seen = HashSet::new();
    for key in children.iter().filter_map(Child::key) {
        if !seen.insert(key) {
            diagnostics.push(Warning::DuplicateKey {
                parent,
                key: key.clone(),
            });
            break;
        }
    }
    if is_list {
        let elements = children.iter().filter(|c| matches!(c, Child::Element(_)));
        let (keyed, unkeyed) = elements.fold((0, 0), |(k, u), c| match c.key() {
            Some(_) => (k + 1, u),
            None => (k, u + 1),
        });
        if keyed > 0 && unkeyed > 0 {
            diagnostics.push(Warning::MissingKeys { parent });
        }
    }
}
