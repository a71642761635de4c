use std::{cell::Cell, rc::Rc, time::Duration};

use assert_call::{call, CallRecorder};

use crate::{
    h,
    renderer::dom::{Document, DomRenderer},
    Child, Component, Config, Error, HostHandle, NodeId, Phase,
};

use super::Scheduler;

struct Fixture {
    doc: Document,
    container: HostHandle,
    s: Scheduler<DomRenderer>,
}

impl Fixture {
    fn new(config: Config) -> Self {
        let doc = Document::new();
        let container = doc.create_container("main");
        let s = Scheduler::new(DomRenderer::new(&doc), config.with_dev(true));
        Self { doc, container, s }
    }
    fn mount(&mut self, child: impl Into<Child>) -> NodeId {
        self.s.mount(self.container, child.into()).unwrap()
    }
    fn html(&self) -> String {
        self.doc.inner_html(self.container)
    }
    /// The first child of `id`.
    fn child(&self, id: NodeId) -> NodeId {
        self.s.tree()[id].child().unwrap()
    }
}

/// A budget no test run exhausts.
fn unhurried() -> Config {
    Config::new().with_frame_budget(Duration::from_secs(60))
}

fn counted(name: &'static str, count: &Rc<Cell<usize>>, child: impl Fn() -> Child + 'static) -> Component {
    let count = count.clone();
    Component::new(name, move |_| {
        count.set(count.get() + 1);
        Ok(child())
    })
}

/// `root -> app -> mid -> leaf -> <i>`, returning `[app, mid, leaf]`.
fn nested(f: &mut Fixture, renders: &Rc<Cell<usize>>) -> [NodeId; 3] {
    let leaf = Component::new("leaf", |_| Ok(h("i").into()));
    let mid = Component::new("mid", move |_| Ok(leaf.element().into()));
    let app = counted("app", renders, move || mid.element().into());
    let root = f.mount(&app);
    f.s.flush_sync().unwrap();
    let app = f.child(root);
    let mid = f.child(app);
    let leaf = f.child(mid);
    [app, mid, leaf]
}

#[test]
fn mount_commits_host_tree() {
    let mut f = Fixture::new(Config::new());
    let root = f.mount(h("ul").children(["a", "b"].map(|k| h("li").key(k).child(k))));
    assert_eq!(f.s.phase(), Phase::Running);
    f.s.flush_sync().unwrap();
    assert_eq!(f.html(), "<ul><li>a</li><li>b</li></ul>");
    assert_eq!(f.s.phase(), Phase::Idle);
    let tree = f.s.tree();
    for id in tree.descendants(root).into_iter().skip(1) {
        assert!(!tree[id].flags().has_pending(), "{}", tree.dump(root));
        assert!(tree[id].is_mounted());
    }
}

#[test]
fn mount_twice_fails() {
    let mut f = Fixture::new(Config::new());
    f.mount(h("p"));
    assert_eq!(
        f.s.mount(f.container, h("p").into()),
        Err(Error::AlreadyMounted)
    );
}

#[test]
fn request_inside_queued_tree_is_covered() {
    let mut f = Fixture::new(Config::new());
    let [app, mid, leaf] = nested(&mut f, &Rc::default());
    f.s.queue_update(mid).unwrap();
    assert_eq!(f.s.trees_in_progress(), [mid]);
    f.s.queue_update(leaf).unwrap();
    assert_eq!(f.s.trees_in_progress(), [mid]);
    f.s.queue_update(app).unwrap();
    assert_eq!(f.s.trees_in_progress(), [app]);
    f.s.flush_sync().unwrap();
    assert!(f.s.trees_in_progress().is_empty());
}

#[test]
fn ancestor_request_restarts_current_walk() {
    let mut f = Fixture::new(Config::new().with_frame_budget(Duration::ZERO));
    let renders = Rc::new(Cell::new(0));
    let [app, _, leaf] = nested(&mut f, &renders);

    f.s.queue_update(leaf).unwrap();
    f.s.tick().unwrap();
    assert_eq!(f.s.phase(), Phase::Running);
    assert_eq!(f.s.trees_in_progress(), [leaf]);

    f.s.queue_update(app).unwrap();
    assert_eq!(f.s.trees_in_progress(), [app]);
    assert_eq!(renders.get(), 1);
    f.s.flush_sync().unwrap();
    assert_eq!(renders.get(), 2);
    assert!(f.s.trees_in_progress().is_empty());
    assert_eq!(f.html(), "<i></i>");
}

#[test]
fn sibling_requests_are_separate_trees() {
    let mut f = Fixture::new(Config::new());
    let a = Component::new("a", |_| Ok(h("a").into()));
    let b = Component::new("b", |_| Ok(h("b").into()));
    let root = f.mount(h("div").child(&a).child(&b));
    f.s.flush_sync().unwrap();
    let div = f.child(root);
    let a = f.child(div);
    let b = f.s.tree()[a].sibling().unwrap();
    f.s.queue_update(b).unwrap();
    f.s.queue_update(a).unwrap();
    assert_eq!(f.s.trees_in_progress(), [b, a]);
    f.s.flush_sync().unwrap();
    assert_eq!(f.html(), "<div><a></a><b></b></div>");
}

#[test]
fn request_for_walked_root_queues_again() {
    let mut f = Fixture::new(Config::new().with_frame_budget(Duration::ZERO));
    let renders = Rc::new(Cell::new(0));
    let [app, mid, _] = nested(&mut f, &renders);
    assert_eq!(renders.get(), 1);

    f.s.queue_update(app).unwrap();
    f.s.tick().unwrap();
    assert_eq!(renders.get(), 2);
    assert_eq!(f.s.trees_in_progress(), [app]);

    f.s.queue_update(mid).unwrap();
    assert_eq!(f.s.trees_in_progress(), [app]);
    f.s.queue_update(app).unwrap();
    assert_eq!(f.s.trees_in_progress(), [app, app]);

    f.s.flush_sync().unwrap();
    assert_eq!(renders.get(), 3);
    assert_eq!(f.html(), "<i></i>");
}

#[test]
fn zero_budget_yields_after_every_unit() {
    let mut f = Fixture::new(Config::new().with_frame_budget(Duration::ZERO));
    let requested = Rc::new(Cell::new(0));
    let requested0 = requested.clone();
    f.s.set_frame_requester(Some(Rc::new(move || requested0.set(requested0.get() + 1))));
    f.mount(h("ul").children((0..5i64).map(|i| h("li").key(i).child(i))));

    let mut ticks = 0;
    while f.s.phase() != Phase::Idle {
        f.s.tick().unwrap();
        ticks += 1;
        assert!(ticks < 100);
    }
    assert!(ticks > 1);
    assert!(requested.get() >= ticks - 1);
    assert_eq!(f.html(), "<ul><li>0</li><li>1</li><li>2</li><li>3</li><li>4</li></ul>");
}

#[test]
fn render_loop_is_fatal() {
    let mut f = Fixture::new(Config::new());
    let looping = Component::new("looping", |cx| {
        let n = cx.state(|| 0);
        n.set(n.peek() + 1);
        Ok(Child::Empty)
    });
    let root = f.mount(&looping);
    let result = f.s.flush_sync();
    let node = f.child(root);
    assert_eq!(
        result,
        Err(Error::RenderLoop {
            node,
            limit: Config::new().max_render_loops,
        })
    );
    assert_eq!(f.s.phase(), Phase::Idle);
    assert!(f.s.trees_in_progress().is_empty());
}

#[test]
fn fatal_error_surfaces_on_next_tick() {
    let mut f = Fixture::new(unhurried());
    let looping = Component::new("looping", |cx| {
        let n = cx.state(|| 0);
        n.set(n.peek() + 1);
        Ok(Child::Empty)
    });
    f.mount(&looping);
    assert_eq!(f.s.tick(), Ok(()));
    assert!(matches!(f.s.tick(), Err(Error::RenderLoop { .. })));
    assert_eq!(f.s.tick(), Ok(()));
}

#[test]
fn dirty_loop_is_fatal() {
    let mut f = Fixture::new(Config::new().with_max_consecutive_dirty(3));
    let renders = Rc::new(Cell::new(0));
    let renders0 = renders.clone();
    let dirty = Component::new("dirty", move |cx| {
        renders0.set(renders0.get() + 1);
        let updater = cx.updater();
        cx.immediate_effect(move || {
            updater.request();
            None
        });
        Ok(Child::Empty)
    });
    f.mount(&dirty);
    assert_eq!(f.s.flush_sync(), Err(Error::DirtyLoop { limit: 3 }));
    assert_eq!(renders.get(), 4);
}

#[test]
fn settling_immediate_effect_reruns_synchronously() {
    let mut f = Fixture::new(unhurried());
    let settle = Component::new("settle", |cx| {
        let n = cx.state(|| 0);
        let value = n.get();
        let n0 = n.clone();
        cx.immediate_effect(move || {
            if value < 3 {
                n0.set(value + 1);
            }
            None
        });
        Ok(h("p").child(value.to_string()).into())
    });
    f.mount(&settle);
    assert_eq!(f.s.tick(), Ok(()));
    assert_eq!(f.html(), "<p>3</p>");
    assert_eq!(f.s.phase(), Phase::Idle);
}

#[test]
fn effects_run_in_order_with_cleanups() {
    let mut cr = CallRecorder::new();
    let mut f = Fixture::new(Config::new());
    let c = Component::new("c", |cx| {
        let n = cx.props().get("n").and_then(|v| v.as_num()).unwrap_or_default();
        cx.effect(move || {
            call!("effect {n}");
            Some(Box::new(move || call!("cleanup effect {n}")))
        });
        cx.immediate_effect(move || {
            call!("immediate {n}");
            Some(Box::new(move || call!("cleanup immediate {n}")))
        });
        cx.on_cleanup(|| call!("removed"));
        Ok(Child::Empty)
    });
    f.mount(c.element().attr("n", 1));
    f.s.flush_sync().unwrap();
    cr.verify(["immediate 1", "effect 1"]);

    f.s.render(c.element().attr("n", 2).into()).unwrap();
    f.s.flush_sync().unwrap();
    cr.verify([
        "cleanup immediate 1",
        "cleanup effect 1",
        "immediate 2",
        "effect 2",
    ]);

    f.s.unmount().unwrap();
    cr.verify(["cleanup immediate 2", "cleanup effect 2", "removed"]);
    assert_eq!(f.html(), "");
}

#[test]
fn failing_component_does_not_stop_siblings() {
    let mut cr = CallRecorder::new();
    let mut f = Fixture::new(Config::new());
    let _s = f.s.on_error(|e| call!("{}", matches!(e, Error::Render { .. })));
    let failing = Component::new("failing", |_| Err("broken".into()));
    f.mount(h("div").child(&failing).child(h("p").child("ok")));
    assert_eq!(f.s.flush_sync(), Ok(()));
    cr.verify("true");
    assert_eq!(f.html(), "<div><p>ok</p></div>");
}

#[test]
fn inner_html_with_children_is_a_contract_error() {
    let mut cr = CallRecorder::new();
    let mut f = Fixture::new(Config::new());
    let _s = f.s.on_error(|e| call!("{}", matches!(e, Error::Contract { .. })));
    f.mount(h("div").inner_html("<b>x</b>").child("y"));
    f.s.flush_sync().unwrap();
    cr.verify("true");
}

#[test]
fn inner_html_with_empty_list_renders() {
    let mut cr = CallRecorder::new();
    let mut f = Fixture::new(Config::new());
    let _s = f.s.on_error(|e| call!("{e}"));
    f.mount(
        h("div")
            .inner_html("<b>x</b>")
            .child(Child::list(Vec::<Child>::new())),
    );
    f.s.flush_sync().unwrap();
    cr.verify(());
    assert_eq!(f.html(), "<div><b>x</b></div>");
}

#[test]
fn memo_skips_equal_props() {
    let mut f = Fixture::new(Config::new());
    let renders = Rc::new(Cell::new(0));
    let inner = counted("inner", &renders, || h("i").into());
    let outer = Component::new("outer", move |_| {
        Ok(inner.element().attr("label", "same").memo().into())
    });
    let root = f.mount(&outer);
    f.s.flush_sync().unwrap();
    assert_eq!(renders.get(), 1);
    let outer = f.child(root);

    f.s.queue_update(outer).unwrap();
    f.s.flush_sync().unwrap();
    assert_eq!(renders.get(), 1);
    let inner = f.child(outer);
    f.s.queue_update(inner).unwrap();
    f.s.flush_sync().unwrap();
    assert_eq!(renders.get(), 2);
}

#[test]
fn delete_request_removes_subtree() {
    let mut f = Fixture::new(Config::new());
    let gone = Component::new("gone", |_| Ok(h("b").into()));
    let root = f.mount(h("div").child(&gone).child(h("i")));
    f.s.flush_sync().unwrap();
    let div = f.child(root);
    let gone = f.child(div);
    f.s.updater(gone).delete();
    f.s.flush_sync().unwrap();
    assert_eq!(f.html(), "<div><i></i></div>");
    assert!(!f.s.tree().contains(gone));
    assert_eq!(f.s.queue_update(gone), Err(Error::UnknownNode(gone)));
}

#[test]
fn deleted_unit_is_skipped_by_current_walk() {
    let mut f = Fixture::new(Config::new().with_frame_budget(Duration::ZERO));
    let (a_renders, b_renders) = (Rc::new(Cell::new(0)), Rc::new(Cell::new(0)));
    let a = counted("a", &a_renders, || h("a").into());
    let b = counted("b", &b_renders, || h("b").into());
    let root = f.mount(h("div").child(&a).child(&b));
    f.s.flush_sync().unwrap();
    let div = f.child(root);
    let a = f.child(div);

    f.s.queue_update(div).unwrap();
    f.s.tick().unwrap();
    assert_eq!(f.s.trees_in_progress(), [div]);
    f.s.queue_delete(a).unwrap();
    while f.s.phase() != Phase::Idle {
        f.s.tick().unwrap();
    }
    assert_eq!(a_renders.get(), 1);
    assert_eq!(b_renders.get(), 2);
    assert_eq!(f.html(), "<div><b></b></div>");
}

#[test]
fn deleted_last_unit_resumes_at_parent_sibling() {
    let mut f = Fixture::new(Config::new().with_frame_budget(Duration::ZERO));
    let renders = Rc::new(Cell::new(0));
    let gone = counted("gone", &renders, || h("b").into());
    let root = f.mount(h("section").child(h("div").child(&gone)).child(h("p")));
    f.s.flush_sync().unwrap();
    let section = f.child(root);
    let div = f.child(section);
    let gone = f.child(div);

    f.s.queue_update(section).unwrap();
    f.s.tick().unwrap();
    f.s.tick().unwrap();
    f.s.queue_delete(gone).unwrap();
    while f.s.phase() != Phase::Idle {
        f.s.tick().unwrap();
    }
    assert_eq!(renders.get(), 1);
    assert_eq!(f.html(), "<section><div></div><p></p></section>");
}

#[test]
fn next_idle_waits_for_commit() {
    let mut cr = CallRecorder::new();
    let mut f = Fixture::new(Config::new());
    f.s.next_idle(|| call!("idle before mount"));
    cr.verify("idle before mount");
    f.mount(h("p"));
    f.s.next_idle(|| call!("idle"));
    cr.verify(());
    f.s.flush_sync().unwrap();
    cr.verify("idle");
}

#[test]
fn update_listener_fires_per_commit() {
    let mut cr = CallRecorder::new();
    let mut f = Fixture::new(Config::new());
    let _s = f.s.on_update(|| call!("update"));
    f.mount(h("p"));
    f.s.flush_sync().unwrap();
    cr.verify("update");
    f.s.flush_sync().unwrap();
    cr.verify(());
}
