use std::rc::Rc;

use assert_call::{call, CallRecorder};
use fibril::{
    h,
    renderer::{
        canvas::{CanvasRenderer, Scene, GROUP},
        dom::{Document, DomRenderer},
    },
    App, Child, Error, HostHandle, NodeId, Props, Renderer, Tree,
};

/// Forwards to a [`DomRenderer`] and records structural mutations of mounted parents.
struct Recorder(DomRenderer);

impl Renderer for Recorder {
    fn create_root(&mut self, container: HostHandle) {
        self.0.create_root(container);
    }
    fn create_element(&mut self, tree: &Tree, node: NodeId) -> HostHandle {
        self.0.create_element(tree, node)
    }
    fn append_child(&mut self, parent: HostHandle, child: HostHandle) {
        self.0.append_child(parent, child);
    }
    fn prepend_child(&mut self, parent: HostHandle, child: HostHandle) {
        call!("prepend");
        self.0.prepend_child(parent, child);
    }
    fn insert_after(&mut self, parent: HostHandle, prev: HostHandle, child: HostHandle) {
        call!("insert after");
        self.0.insert_after(parent, prev, child);
    }
    fn on_remove(&mut self, tree: &Tree, node: NodeId) {
        let key = tree[node].key().map(|k| k.to_string()).unwrap_or_default();
        call!("remove {key}");
        self.0.on_remove(tree, node);
    }
    fn update_element(&mut self, tree: &Tree, node: NodeId, prev: Option<&Props>, next: &Props) {
        self.0.update_element(tree, node, prev, next);
    }
    fn is_valid_parent(&self, tree: &Tree, parent: NodeId) -> bool {
        self.0.is_valid_parent(tree, parent)
    }
    fn can_insert_after(&self, tree: &Tree, anchor: NodeId, mount_parent: NodeId) -> bool {
        self.0.can_insert_after(tree, anchor, mount_parent)
    }
    fn text_patcher(&self, handle: HostHandle) -> Rc<dyn Fn(&str)> {
        self.0.text_patcher(handle)
    }
    fn attr_patcher(&self, handle: HostHandle, name: &str) -> Rc<dyn Fn(&str)> {
        self.0.attr_patcher(handle, name)
    }
}

fn items(keys: &str) -> Child {
    h("ul")
        .children(keys.chars().map(|k| h("li").key(k).child(k.to_string())))
        .into()
}

#[test]
fn deletion_is_removed_before_insertion() {
    let mut cr = CallRecorder::new();
    let doc = Document::new();
    let container = doc.create_container("main");
    let mut app = App::new(Recorder(DomRenderer::new(&doc)), container);
    app.mount(items("a")).unwrap();
    app.flush_sync().unwrap();
    cr.verify(());

    app.render(items("b")).unwrap();
    app.flush_sync().unwrap();
    cr.verify(["remove a", "prepend"]);
    assert_eq!(doc.inner_html(container), "<ul><li>b</li></ul>");
}

#[test]
fn deletions_commit_before_moves() {
    let mut cr = CallRecorder::new();
    let doc = Document::new();
    let container = doc.create_container("main");
    let mut app = App::new(Recorder(DomRenderer::new(&doc)), container);
    app.mount(items("abc")).unwrap();
    app.flush_sync().unwrap();

    app.render(items("cax")).unwrap();
    app.flush_sync().unwrap();
    cr.verify(["remove b", "insert after", "insert after"]);
    assert_eq!(
        doc.inner_html(container),
        "<ul><li>c</li><li>a</li><li>x</li></ul>"
    );
}

#[test]
fn void_element_cannot_contain_elements() {
    let mut cr = CallRecorder::new();
    let doc = Document::new();
    let container = doc.create_container("main");
    let mut app = App::new(DomRenderer::new(&doc), container);
    let _e = app.on_error(|e| call!("{}", matches!(e, Error::Contract { .. })));
    app.mount(h("img").child(h("b"))).unwrap();
    app.flush_sync().unwrap();
    cr.verify("true");
    assert_eq!(doc.inner_html(container), "<img>");
}

fn scene_app() -> (Scene, HostHandle, App<CanvasRenderer>) {
    let scene = Scene::new();
    let layer = scene.create_layer();
    let app = App::new(CanvasRenderer::new(&scene), layer);
    (scene, layer, app)
}

fn shapes(keys: &str) -> Child {
    h(GROUP)
        .attr("x", 10)
        .children(keys.chars().map(|k| h("rect").key(k).attr("id", k.to_string())))
        .into()
}

#[test]
fn canvas_mounts_scene_objects() {
    let (scene, layer, mut app) = scene_app();
    app.mount(h(GROUP).child(h("circle").attr("r", 2)).child("caption"))
        .unwrap();
    app.flush_sync().unwrap();
    assert_eq!(
        scene.display_list(layer),
        ["group", "  circle r=2", "  label \"caption\""]
    );
}

#[test]
fn canvas_reorders_and_updates() {
    let (scene, layer, mut app) = scene_app();
    app.mount(shapes("abc")).unwrap();
    app.flush_sync().unwrap();
    assert_eq!(
        scene.display_list(layer),
        ["group x=10", "  rect id=a", "  rect id=b", "  rect id=c"]
    );
    let objects = scene.len();

    app.render(shapes("cba")).unwrap();
    app.flush_sync().unwrap();
    assert_eq!(
        scene.display_list(layer),
        ["group x=10", "  rect id=c", "  rect id=b", "  rect id=a"]
    );
    assert_eq!(scene.len(), objects);

    app.render(shapes("c")).unwrap();
    app.flush_sync().unwrap();
    assert_eq!(scene.display_list(layer), ["group x=10", "  rect id=c"]);
    assert_eq!(scene.len(), objects - 2);
}

#[test]
fn canvas_shapes_cannot_contain_objects() {
    let (scene, layer, mut app) = scene_app();
    let _e = app.on_error(|e| call!("{}", matches!(e, Error::Contract { .. })));
    let mut cr = CallRecorder::new();
    app.mount(h("rect").child(h("circle"))).unwrap();
    app.flush_sync().unwrap();
    cr.verify("true");
    assert_eq!(scene.display_list(layer), ["rect"]);
}

#[test]
fn canvas_label_follows_signal() {
    let (scene, layer, mut app) = scene_app();
    let text = fibril::signal(String::from("1"));
    app.mount(h(GROUP).child(text.clone())).unwrap();
    app.flush_sync().unwrap();
    text.set(String::from("2"));
    assert_eq!(scene.display_list(layer), ["group", "  label \"2\""]);
}
