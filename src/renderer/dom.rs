//! In-memory DOM backend.
//!
//! [`Document`] models the part of a browser document the runtime relies on: elements with
//! attributes, inline style, listeners and raw inner HTML, text nodes, and a focused element that
//! is lost when it is detached.

use std::{cell::RefCell, collections::BTreeMap, rc::Rc};

use slabmap::SlabMap;

use crate::{element::Handler, Event, HostHandle, NodeId, NodeType, PropValue, Props, Tree};

use super::Renderer;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// A shared in-memory document.
#[derive(Clone, Default)]
pub struct Document(Rc<RefCell<DocumentData>>);

#[derive(Default)]
struct DocumentData {
    nodes: SlabMap<DomNode>,
    focused: Option<usize>,
}

struct DomNode {
    kind: DomKind,
    parent: Option<usize>,
    children: Vec<usize>,
}

enum DomKind {
    Element(ElementData),
    Text(String),
}

#[derive(Default)]
struct ElementData {
    tag: String,
    attrs: BTreeMap<String, String>,
    style: BTreeMap<String, String>,
    listeners: BTreeMap<String, Handler>,
    inner_html: Option<String>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a detached element to mount an application into.
    pub fn create_container(&self, tag: &str) -> HostHandle {
        self.create_element(tag)
    }
    pub fn create_element(&self, tag: &str) -> HostHandle {
        self.insert(DomKind::Element(ElementData {
            tag: tag.to_string(),
            ..ElementData::default()
        }))
    }
    pub fn create_text(&self, text: &str) -> HostHandle {
        self.insert(DomKind::Text(text.to_string()))
    }
    fn insert(&self, kind: DomKind) -> HostHandle {
        HostHandle(self.0.borrow_mut().nodes.insert(DomNode {
            kind,
            parent: None,
            children: Vec::new(),
        }))
    }

    /// Number of live host objects, attached or not.
    pub fn len(&self) -> usize {
        self.0.borrow().nodes.len()
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    pub fn contains(&self, handle: HostHandle) -> bool {
        self.0.borrow().nodes.contains_key(handle.0)
    }
    pub fn parent(&self, handle: HostHandle) -> Option<HostHandle> {
        self.0.borrow().nodes.get(handle.0)?.parent.map(HostHandle)
    }
    pub fn children(&self, handle: HostHandle) -> Vec<HostHandle> {
        self.0
            .borrow()
            .nodes
            .get(handle.0)
            .map(|n| n.children.iter().copied().map(HostHandle).collect())
            .unwrap_or_default()
    }
    pub fn tag(&self, handle: HostHandle) -> Option<String> {
        match &self.0.borrow().nodes.get(handle.0)?.kind {
            DomKind::Element(e) => Some(e.tag.clone()),
            DomKind::Text(_) => None,
        }
    }
    /// Text content of `handle` and its descendants.
    pub fn text(&self, handle: HostHandle) -> String {
        let d = self.0.borrow();
        let mut out = String::new();
        d.write_text(handle.0, &mut out);
        out
    }
    pub fn attr(&self, handle: HostHandle, name: &str) -> Option<String> {
        match &self.0.borrow().nodes.get(handle.0)?.kind {
            DomKind::Element(e) => e.attrs.get(name).cloned(),
            DomKind::Text(_) => None,
        }
    }
    pub fn style(&self, handle: HostHandle, name: &str) -> Option<String> {
        match &self.0.borrow().nodes.get(handle.0)?.kind {
            DomKind::Element(e) => e.style.get(name).cloned(),
            DomKind::Text(_) => None,
        }
    }
    pub fn has_listener(&self, handle: HostHandle, event: &str) -> bool {
        match self.0.borrow().nodes.get(handle.0).map(|n| &n.kind) {
            Some(DomKind::Element(e)) => e.listeners.contains_key(event),
            _ => false,
        }
    }

    /// Serializes the children of `handle`.
    pub fn inner_html(&self, handle: HostHandle) -> String {
        let d = self.0.borrow();
        let mut out = String::new();
        if let Some(node) = d.nodes.get(handle.0) {
            d.write_children(node, &mut out);
        }
        out
    }
    /// Serializes `handle` itself.
    pub fn outer_html(&self, handle: HostHandle) -> String {
        let d = self.0.borrow();
        let mut out = String::new();
        d.write_html(handle.0, &mut out);
        out
    }

    pub fn focus(&self, handle: HostHandle) {
        self.0.borrow_mut().focused = Some(handle.0);
    }
    pub fn blur(&self) {
        self.0.borrow_mut().focused = None;
    }
    pub fn focused(&self) -> Option<HostHandle> {
        self.0.borrow().focused.map(HostHandle)
    }

    /// Calls the `event` listener of `handle`. Returns `false` if there is none.
    pub fn dispatch(&self, handle: HostHandle, event: &str, value: Option<&str>) -> bool {
        let listener = match self.0.borrow().nodes.get(handle.0).map(|n| &n.kind) {
            Some(DomKind::Element(e)) => e.listeners.get(event).cloned(),
            _ => None,
        };
        let Some(listener) = listener else {
            return false;
        };
        listener(&Event {
            name: event.to_string(),
            target: handle,
            value: value.map(str::to_string),
        });
        true
    }

    pub fn set_text(&self, handle: HostHandle, text: &str) {
        if let Some(DomKind::Text(t)) = self.0.borrow_mut().nodes.get_mut(handle.0).map(|n| &mut n.kind) {
            *t = text.to_string();
        }
    }
    pub fn set_attr(&self, handle: HostHandle, name: &str, value: &str) {
        self.with_element(handle, |e| {
            e.attrs.insert(name.to_string(), value.to_string());
        });
    }
    pub fn remove_attr(&self, handle: HostHandle, name: &str) {
        self.with_element(handle, |e| {
            e.attrs.remove(name);
        });
    }
    fn with_element(&self, handle: HostHandle, f: impl FnOnce(&mut ElementData)) {
        if let Some(DomKind::Element(e)) = self.0.borrow_mut().nodes.get_mut(handle.0).map(|n| &mut n.kind) {
            f(e)
        }
    }

    pub fn append_child(&self, parent: HostHandle, child: HostHandle) {
        let mut d = self.0.borrow_mut();
        d.detach(child.0);
        d.nodes[parent.0].children.push(child.0);
        d.nodes[child.0].parent = Some(parent.0);
    }
    pub fn insert_at(&self, parent: HostHandle, index: usize, child: HostHandle) {
        let mut d = self.0.borrow_mut();
        d.detach(child.0);
        let children = &mut d.nodes[parent.0].children;
        let index = index.min(children.len());
        children.insert(index, child.0);
        d.nodes[child.0].parent = Some(parent.0);
    }
    pub fn insert_after(&self, parent: HostHandle, prev: HostHandle, child: HostHandle) {
        let mut d = self.0.borrow_mut();
        d.detach(child.0);
        let children = &mut d.nodes[parent.0].children;
        let index = children
            .iter()
            .position(|&c| c == prev.0)
            .map_or(children.len(), |i| i + 1);
        children.insert(index, child.0);
        d.nodes[child.0].parent = Some(parent.0);
    }
    /// Detaches `handle` and frees it with its descendants.
    pub fn remove(&self, handle: HostHandle) {
        let mut d = self.0.borrow_mut();
        if !d.nodes.contains_key(handle.0) {
            return;
        }
        d.detach(handle.0);
        let mut stack = vec![handle.0];
        while let Some(id) = stack.pop() {
            if let Some(node) = d.nodes.remove(id) {
                stack.extend(node.children);
            }
        }
    }
}

impl DocumentData {
    fn detach(&mut self, id: usize) {
        let Some(parent) = self.nodes[id].parent.take() else {
            return;
        };
        self.nodes[parent].children.retain(|&c| c != id);
        if let Some(focused) = self.focused {
            if self.is_inclusive_ancestor(id, focused) {
                self.focused = None;
            }
        }
    }
    fn is_inclusive_ancestor(&self, ancestor: usize, mut id: usize) -> bool {
        loop {
            if id == ancestor {
                return true;
            }
            match self.nodes.get(id).and_then(|n| n.parent) {
                Some(p) => id = p,
                None => return false,
            }
        }
    }
    fn is_attached_to(&self, root: usize, id: usize) -> bool {
        self.nodes.contains_key(id) && self.is_inclusive_ancestor(root, id)
    }

    fn write_text(&self, id: usize, out: &mut String) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        match &node.kind {
            DomKind::Text(t) => out.push_str(t),
            DomKind::Element(_) => {
                for &c in &node.children {
                    self.write_text(c, out);
                }
            }
        }
    }
    fn write_html(&self, id: usize, out: &mut String) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        match &node.kind {
            DomKind::Text(t) => out.push_str(&escape(t)),
            DomKind::Element(e) => {
                out.push('<');
                out.push_str(&e.tag);
                for (name, value) in &e.attrs {
                    if value.is_empty() {
                        out.push_str(&format!(" {name}"));
                    } else {
                        out.push_str(&format!(" {name}=\"{}\"", escape(value)));
                    }
                }
                if !e.style.is_empty() {
                    let style: Vec<String> =
                        e.style.iter().map(|(k, v)| format!("{k}: {v};")).collect();
                    out.push_str(&format!(" style=\"{}\"", style.join(" ")));
                }
                out.push('>');
                if VOID_ELEMENTS.contains(&e.tag.as_str()) {
                    return;
                }
                self.write_children(node, out);
                out.push_str(&format!("</{}>", e.tag));
            }
        }
    }
    fn write_children(&self, node: &DomNode, out: &mut String) {
        if let DomKind::Element(ElementData {
            inner_html: Some(html),
            ..
        }) = &node.kind
        {
            out.push_str(html);
            return;
        }
        for &c in &node.children {
            self.write_html(c, out);
        }
    }
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Drives a [`Document`].
pub struct DomRenderer {
    doc: Document,
    saved_focus: Option<HostHandle>,
    root: Option<HostHandle>,
}

impl DomRenderer {
    pub fn new(doc: &Document) -> Self {
        Self {
            doc: doc.clone(),
            saved_focus: None,
            root: None,
        }
    }
    pub fn document(&self) -> &Document {
        &self.doc
    }

    fn update_attr(&self, handle: HostHandle, name: &str, prev: Option<&PropValue>, next: Option<&PropValue>) {
        if prev == next {
            return;
        }
        if let Some(event) = name.strip_prefix("on") {
            self.doc.with_element(handle, |e| match next {
                Some(PropValue::Handler(h)) => {
                    e.listeners.insert(event.to_string(), h.clone());
                }
                _ => {
                    e.listeners.remove(event);
                }
            });
            return;
        }
        match next {
            Some(PropValue::Style(next)) => {
                let prev = match prev {
                    Some(PropValue::Style(prev)) => Some(prev),
                    _ => None,
                };
                self.doc.with_element(handle, |e| {
                    if let Some(prev) = prev {
                        for name in prev.keys() {
                            if !next.contains_key(name) {
                                e.style.remove(&**name);
                            }
                        }
                    }
                    for (name, value) in next.iter() {
                        if prev.and_then(|p| p.get(name)) != Some(value) {
                            e.style.insert(name.to_string(), value.to_string());
                        }
                    }
                });
            }
            Some(value) => match value.to_attr() {
                Some(text) => self.doc.set_attr(handle, name, &text),
                None => self.doc.remove_attr(handle, name),
            },
            None => {
                if name == "style" {
                    self.doc.with_element(handle, |e| e.style.clear());
                } else {
                    self.doc.remove_attr(handle, name);
                }
            }
        }
    }
}

impl Renderer for DomRenderer {
    fn create_root(&mut self, container: HostHandle) {
        for child in self.doc.children(container) {
            self.doc.remove(child);
        }
        self.root = Some(container);
    }

    fn create_element(&mut self, tree: &Tree, node: NodeId) -> HostHandle {
        let node = &tree[node];
        match &node.ty {
            NodeType::Host(tag) => self.doc.create_element(tag),
            _ => self.doc.create_text(""),
        }
    }

    fn append_child(&mut self, parent: HostHandle, child: HostHandle) {
        self.doc.append_child(parent, child);
    }
    fn prepend_child(&mut self, parent: HostHandle, child: HostHandle) {
        self.doc.insert_at(parent, 0, child);
    }
    fn insert_after(&mut self, parent: HostHandle, prev: HostHandle, child: HostHandle) {
        self.doc.insert_after(parent, prev, child);
    }

    fn on_remove(&mut self, tree: &Tree, node: NodeId) {
        if let Some(handle) = tree[node].dom {
            self.doc.remove(handle);
        }
    }

    fn update_element(&mut self, tree: &Tree, node: NodeId, prev: Option<&Props>, next: &Props) {
        let Some(handle) = tree[node].dom else {
            return;
        };
        if matches!(tree[node].ty, NodeType::Text) {
            let text = next.text().map(|t| t.get()).unwrap_or_default();
            if prev.and_then(|p| p.text()) != next.text() {
                self.doc.set_text(handle, &text);
            }
            return;
        }
        for (name, value) in next.attrs() {
            self.update_attr(handle, name, prev.and_then(|p| p.get(name)), Some(value));
        }
        if let Some(prev) = prev {
            for (name, value) in prev.attrs() {
                if next.get(name).is_none() {
                    self.update_attr(handle, name, Some(value), None);
                }
            }
        }
        if prev.and_then(|p| p.inner_html()) != next.inner_html() {
            let html = next.inner_html().map(str::to_string);
            self.doc.with_element(handle, |e| e.inner_html = html);
        }
    }

    fn is_valid_parent(&self, tree: &Tree, parent: NodeId) -> bool {
        match &tree[parent].ty {
            NodeType::Host(tag) => !VOID_ELEMENTS.contains(&&**tag),
            NodeType::Text => false,
            _ => true,
        }
    }
    fn can_insert_after(&self, tree: &Tree, anchor: NodeId, mount_parent: NodeId) -> bool {
        match (tree[anchor].dom, tree[mount_parent].dom) {
            (Some(anchor), Some(parent)) => self.doc.parent(anchor) == Some(parent),
            _ => false,
        }
    }

    fn on_before_commit(&mut self) {
        self.saved_focus = self.doc.focused();
    }
    fn on_after_commit(&mut self) {
        let Some(saved) = self.saved_focus.take() else {
            return;
        };
        if self.doc.focused().is_some() {
            return;
        }
        let d = self.doc.0.borrow();
        let attached = match self.root {
            Some(root) => d.is_attached_to(root.0, saved.0),
            None => d.nodes.contains_key(saved.0),
        };
        drop(d);
        if attached {
            tracing::trace!(handle = %saved, "restoring focus");
            self.doc.focus(saved);
        }
    }

    fn text_patcher(&self, handle: HostHandle) -> Rc<dyn Fn(&str)> {
        let doc = self.doc.clone();
        Rc::new(move |text| doc.set_text(handle, text))
    }
    fn attr_patcher(&self, handle: HostHandle, name: &str) -> Rc<dyn Fn(&str)> {
        let doc = self.doc.clone();
        let name = name.to_string();
        Rc::new(move |value| doc.set_attr(handle, &name, value))
    }
}
