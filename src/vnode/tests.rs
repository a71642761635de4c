use crate::{Flags, NodeId, NodeType, Props, Tree, VNode};

fn node(tag: &str) -> VNode {
    VNode::new(NodeType::Host(tag.into()), None, Props::default())
}

/// Builds `root -> [a -> [a1, a2], b]` and returns `[root, a, a1, a2, b]`.
fn sample() -> (Tree, [NodeId; 5]) {
    let mut tree = Tree::new();
    let root = tree.insert(node("root"));
    let ids = ["a", "a1", "a2", "b"].map(|tag| tree.insert(node(tag)));
    let [a, a1, a2, b] = ids;
    link(&mut tree, root, &[a, b]);
    link(&mut tree, a, &[a1, a2]);
    (tree, [root, a, a1, a2, b])
}

fn link(tree: &mut Tree, parent: NodeId, children: &[NodeId]) {
    let depth = tree[parent].depth + 1;
    tree[parent].child = children.first().copied();
    for (i, &c) in children.iter().enumerate() {
        tree[c].parent = Some(parent);
        tree[c].sibling = children.get(i + 1).copied();
        tree[c].depth = depth;
        tree[c].index = i;
    }
}

#[test]
fn children_and_ancestors() {
    let (tree, [root, a, a1, a2, b]) = sample();
    assert_eq!(tree.children(root).collect::<Vec<_>>(), [a, b]);
    assert_eq!(tree.children(a).collect::<Vec<_>>(), [a1, a2]);
    assert_eq!(tree.ancestors(a2).collect::<Vec<_>>(), [a, root]);
    assert_eq!(tree.previous_sibling(a2), Some(a1));
    assert_eq!(tree.previous_sibling(a1), None);
    assert_eq!(tree.descendants(root), [root, a, a1, a2, b]);
}

#[test]
fn containment_uses_depth() {
    let (tree, [root, a, a1, _, b]) = sample();
    assert!(tree.is_ancestor(root, a1));
    assert!(tree.is_ancestor(a, a1));
    assert!(!tree.is_ancestor(b, a1));
    assert!(!tree.is_ancestor(a1, a));
    assert!(!tree.is_ancestor(a, a));
    assert!(tree.contains_node(a, a));
    assert!(!tree.contains_node(b, a));
}

#[test]
fn unlink_middle_and_first() {
    let (mut tree, [root, a, a1, a2, b]) = sample();
    tree.unlink(a1);
    assert_eq!(tree.children(a).collect::<Vec<_>>(), [a2]);
    tree.unlink(b);
    assert_eq!(tree.children(root).collect::<Vec<_>>(), [a]);
    tree.unlink(a);
    assert_eq!(tree.children(root).count(), 0);
}

#[test]
fn settle_clears_pending_only() {
    let (mut tree, [root, a, ..]) = sample();
    tree[a].flags = Flags::PLACEMENT | Flags::UPDATE | Flags::MEMO;
    tree.settle(root);
    assert_eq!(tree[a].flags(), Flags::MEMO);
    assert!(tree[a].is_mounted());
    assert_eq!(tree[a].committed_index(), Some(0));
}

#[test]
fn committed_state_prefers_snapshot() {
    let (mut tree, [root, _, _, _, b]) = sample();
    assert_eq!(tree[b].committed_index(), None);
    tree.settle(root);
    tree[b].prev = Some(Box::new(crate::Snapshot {
        props: Props::default(),
        index: 1,
    }));
    tree[b].index = 0;
    assert_eq!(tree[b].committed_index(), Some(1));
}

#[test]
fn dump() {
    let (tree, [root, ..]) = sample();
    assert_eq!(
        tree.dump(root),
        "<root>\n  <a>\n    <a1>\n    <a2>\n  <b>\n"
    );
}
