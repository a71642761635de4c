//! Retained scene backend.
//!
//! Nodes map to scene objects instead of document elements: `group` objects contain other
//! objects, every other tag is a leaf shape, and text becomes a label. The scene is painted in
//! tree order, which [`Scene::display_list`] exposes.

use std::{cell::RefCell, collections::BTreeMap, rc::Rc};

use slabmap::SlabMap;

use crate::{HostHandle, NodeId, NodeType, Props, Tree};

use super::Renderer;

pub const GROUP: &str = "group";

#[derive(Clone, Default)]
pub struct Scene(Rc<RefCell<SceneData>>);

#[derive(Default)]
struct SceneData {
    objects: SlabMap<Object>,
}

struct Object {
    kind: ObjectKind,
    props: BTreeMap<String, String>,
    parent: Option<usize>,
    children: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ObjectKind {
    Group,
    Shape(String),
    Label(String),
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the top-level group an application is mounted into.
    pub fn create_layer(&self) -> HostHandle {
        self.insert(ObjectKind::Group)
    }
    fn insert(&self, kind: ObjectKind) -> HostHandle {
        HostHandle(self.0.borrow_mut().objects.insert(Object {
            kind,
            props: BTreeMap::new(),
            parent: None,
            children: Vec::new(),
        }))
    }

    pub fn len(&self) -> usize {
        self.0.borrow().objects.len()
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    pub fn is_group(&self, handle: HostHandle) -> bool {
        matches!(
            self.0.borrow().objects.get(handle.0).map(|o| &o.kind),
            Some(ObjectKind::Group)
        )
    }
    pub fn parent(&self, handle: HostHandle) -> Option<HostHandle> {
        self.0.borrow().objects.get(handle.0)?.parent.map(HostHandle)
    }
    pub fn prop(&self, handle: HostHandle, name: &str) -> Option<String> {
        self.0.borrow().objects.get(handle.0)?.props.get(name).cloned()
    }

    /// One line per object below `root`, in paint order, indented by nesting depth.
    pub fn display_list(&self, root: HostHandle) -> Vec<String> {
        let d = self.0.borrow();
        let mut out = Vec::new();
        let mut stack: Vec<(usize, usize)> = match d.objects.get(root.0) {
            Some(o) => o.children.iter().rev().map(|&c| (c, 0)).collect(),
            None => Vec::new(),
        };
        while let Some((id, depth)) = stack.pop() {
            let o = &d.objects[id];
            let mut line = "  ".repeat(depth);
            match &o.kind {
                ObjectKind::Group => line.push_str(GROUP),
                ObjectKind::Shape(tag) => line.push_str(tag),
                ObjectKind::Label(text) => line.push_str(&format!("label {text:?}")),
            }
            for (name, value) in &o.props {
                line.push_str(&format!(" {name}={value}"));
            }
            out.push(line);
            stack.extend(o.children.iter().rev().map(|&c| (c, depth + 1)));
        }
        out
    }

    fn set_label(&self, handle: HostHandle, text: &str) {
        if let Some(o) = self.0.borrow_mut().objects.get_mut(handle.0) {
            if let ObjectKind::Label(t) = &mut o.kind {
                *t = text.to_string();
            }
        }
    }
    fn set_prop(&self, handle: HostHandle, name: &str, value: Option<String>) {
        if let Some(o) = self.0.borrow_mut().objects.get_mut(handle.0) {
            match value {
                Some(value) => o.props.insert(name.to_string(), value),
                None => o.props.remove(name),
            };
        }
    }

    fn attach(&self, parent: HostHandle, child: HostHandle, at: impl FnOnce(&[usize]) -> usize) {
        let mut d = self.0.borrow_mut();
        d.detach(child.0);
        let index = at(&d.objects[parent.0].children);
        d.objects[parent.0].children.insert(index, child.0);
        d.objects[child.0].parent = Some(parent.0);
    }
    fn remove(&self, handle: HostHandle) {
        let mut d = self.0.borrow_mut();
        if !d.objects.contains_key(handle.0) {
            return;
        }
        d.detach(handle.0);
        let mut stack = vec![handle.0];
        while let Some(id) = stack.pop() {
            if let Some(o) = d.objects.remove(id) {
                stack.extend(o.children);
            }
        }
    }
}

impl SceneData {
    fn detach(&mut self, id: usize) {
        if let Some(parent) = self.objects[id].parent.take() {
            self.objects[parent].children.retain(|&c| c != id);
        }
    }
}

/// Drives a [`Scene`].
pub struct CanvasRenderer {
    scene: Scene,
}

impl CanvasRenderer {
    pub fn new(scene: &Scene) -> Self {
        Self {
            scene: scene.clone(),
        }
    }
    pub fn scene(&self) -> &Scene {
        &self.scene
    }
}

impl Renderer for CanvasRenderer {
    fn create_element(&mut self, tree: &Tree, node: NodeId) -> HostHandle {
        match &tree[node].ty {
            NodeType::Host(tag) if &**tag == GROUP => self.scene.insert(ObjectKind::Group),
            NodeType::Host(tag) => self.scene.insert(ObjectKind::Shape(tag.to_string())),
            _ => self.scene.insert(ObjectKind::Label(String::new())),
        }
    }

    fn append_child(&mut self, parent: HostHandle, child: HostHandle) {
        self.scene.attach(parent, child, |c| c.len());
    }
    fn prepend_child(&mut self, parent: HostHandle, child: HostHandle) {
        self.scene.attach(parent, child, |_| 0);
    }
    fn insert_after(&mut self, parent: HostHandle, prev: HostHandle, child: HostHandle) {
        self.scene.attach(parent, child, |c| {
            c.iter().position(|&x| x == prev.0).map_or(c.len(), |i| i + 1)
        });
    }

    fn on_remove(&mut self, tree: &Tree, node: NodeId) {
        if let Some(handle) = tree[node].dom {
            self.scene.remove(handle);
        }
    }

    fn update_element(&mut self, tree: &Tree, node: NodeId, prev: Option<&Props>, next: &Props) {
        let Some(handle) = tree[node].dom else {
            return;
        };
        if matches!(tree[node].ty, NodeType::Text) {
            if let Some(text) = next.text() {
                self.scene.set_label(handle, &text.get());
            }
            return;
        }
        for (name, value) in next.attrs() {
            if prev.and_then(|p| p.get(name)) != Some(value) {
                self.scene.set_prop(handle, name, value.to_attr());
            }
        }
        if let Some(prev) = prev {
            for (name, _) in prev.attrs() {
                if next.get(name).is_none() {
                    self.scene.set_prop(handle, name, None);
                }
            }
        }
    }

    fn is_valid_parent(&self, tree: &Tree, parent: NodeId) -> bool {
        tree[parent].dom.is_some_and(|h| self.scene.is_group(h))
    }
    fn can_insert_after(&self, tree: &Tree, anchor: NodeId, mount_parent: NodeId) -> bool {
        tree[anchor].dom.and_then(|h| self.scene.parent(h)) == tree[mount_parent].dom
    }

    fn text_patcher(&self, handle: HostHandle) -> Rc<dyn Fn(&str)> {
        let scene = self.scene.clone();
        Rc::new(move |text| scene.set_label(handle, text))
    }
    fn attr_patcher(&self, handle: HostHandle, name: &str) -> Rc<dyn Fn(&str)> {
        let scene = self.scene.clone();
        let name = name.to_string();
        Rc::new(move |value| scene.set_prop(handle, &name, Some(value.to_string())))
    }
}
