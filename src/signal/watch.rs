use std::{
    cell::{Cell, RefCell},
    rc::{Rc, Weak},
};

use crate::Subscription;

use super::{collect, untrack, Dependent, Trackable};

/// Runs a callback whenever one of its dependencies changes. Dropping it stops watching.
#[must_use]
pub struct Watch(Rc<WatchNode>);

struct WatchNode {
    callback: RefCell<Box<dyn FnMut()>>,
    auto_track: bool,
    sources: RefCell<Vec<Subscription>>,
    running: Cell<bool>,
    rerun: Cell<bool>,
    stopped: Cell<bool>,
    this: Weak<WatchNode>,
}

/// Calls `f` now and again every time one of `deps` changes.
///
/// Reads made by `f` itself are not tracked.
pub fn watch(deps: &[&dyn Trackable], f: impl FnMut() + 'static) -> Watch {
    let node = WatchNode::new(f, false);
    let dependent: Weak<dyn Dependent> = node.this.clone();
    *node.sources.borrow_mut() = deps
        .iter()
        .map(|d| d.to_source().add_dependent(dependent.clone()))
        .collect();
    node.run();
    Watch(node)
}

/// Calls `f` now and again every time a value it read during its last run changes.
pub fn effect(f: impl FnMut() + 'static) -> Watch {
    let node = WatchNode::new(f, true);
    node.run();
    Watch(node)
}

impl Watch {
    pub fn stop(self) {}

    /// Keeps watching until the thread exits.
    pub fn detach(self) {
        std::mem::forget(self)
    }
}

impl WatchNode {
    fn new(f: impl FnMut() + 'static, auto_track: bool) -> Rc<Self> {
        Rc::new_cyclic(|this| WatchNode {
            callback: RefCell::new(Box::new(f)),
            auto_track,
            sources: RefCell::new(Vec::new()),
            running: Cell::new(false),
            rerun: Cell::new(false),
            stopped: Cell::new(false),
            this: this.clone(),
        })
    }

    fn run(&self) {
        if self.running.get() {
            self.rerun.set(true);
            return;
        }
        self.running.set(true);
        loop {
            self.rerun.set(false);
            if self.auto_track {
                let ((), sources) = collect(|| (&mut *self.callback.borrow_mut())());
                let dependent: Weak<dyn Dependent> = self.this.clone();
                let sources = sources
                    .iter()
                    .map(|s| s.add_dependent(dependent.clone()))
                    .collect();
                let old = std::mem::replace(&mut *self.sources.borrow_mut(), sources);
                drop(old);
            } else {
                untrack(|| (&mut *self.callback.borrow_mut())());
            }
            if !self.rerun.get() || self.stopped.get() {
                break;
            }
        }
        self.running.set(false);
    }
}

impl Dependent for WatchNode {
    fn invalidate(self: Rc<Self>) {
        if !self.stopped.get() {
            self.run();
        }
    }
}

impl Drop for Watch {
    fn drop(&mut self) {
        self.0.stopped.set(true);
        self.0.sources.borrow_mut().clear();
    }
}

impl std::fmt::Debug for Watch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watch")
            .field("sources", &self.0.sources.borrow().len())
            .finish()
    }
}
