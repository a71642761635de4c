use std::{
    any::type_name,
    cell::RefCell,
    rc::{Rc, Weak},
};

use crate::{
    element::PROVIDER_VALUE, vnode::Cleanup, watch, Child, Context, NodeId, NodeType, Props,
    Signal, Subscription, Trackable, Tree,
};

/// Requests raised outside the scheduler, drained before every unit of work.
#[derive(Default)]
pub(crate) struct Mailbox {
    state: RefCell<MailboxState>,
}

#[derive(Default)]
struct MailboxState {
    updates: Vec<NodeId>,
    deletes: Vec<NodeId>,
    frame_requested: bool,
    requester: Option<Rc<dyn Fn()>>,
}

impl Mailbox {
    pub fn push_update(&self, node: NodeId) {
        self.state.borrow_mut().updates.push(node);
        self.request_frame();
    }
    pub fn push_delete(&self, node: NodeId) {
        self.state.borrow_mut().deletes.push(node);
        self.request_frame();
    }
    pub fn take(&self) -> (Vec<NodeId>, Vec<NodeId>) {
        let mut s = self.state.borrow_mut();
        (std::mem::take(&mut s.updates), std::mem::take(&mut s.deletes))
    }
    /// Removes pending update requests for `node`, returning whether there were any.
    pub fn take_update(&self, node: NodeId) -> bool {
        let mut s = self.state.borrow_mut();
        let len = s.updates.len();
        s.updates.retain(|&n| n != node);
        s.updates.len() != len
    }
    pub fn forget(&self, node: NodeId) {
        let mut s = self.state.borrow_mut();
        s.updates.retain(|&n| n != node);
        s.deletes.retain(|&n| n != node);
    }
    pub fn is_empty(&self) -> bool {
        let s = self.state.borrow();
        s.updates.is_empty() && s.deletes.is_empty()
    }

    pub fn set_requester(&self, requester: Option<Rc<dyn Fn()>>) {
        self.state.borrow_mut().requester = requester;
    }
    /// Asks the host for a frame callback, at most once until the next frame starts.
    pub fn request_frame(&self) {
        let requester = {
            let mut s = self.state.borrow_mut();
            if s.frame_requested {
                return;
            }
            let Some(r) = s.requester.clone() else {
                return;
            };
            s.frame_requested = true;
            r
        };
        requester();
    }
    pub fn frame_started(&self) {
        self.state.borrow_mut().frame_requested = false;
    }
}

/// A handle that requests re-renders of one node.
///
/// Holds no reference to the scheduler, so it can be stored in signal subscribers, event
/// handlers and effects, and it may be used while the scheduler is busy.
#[derive(Clone)]
pub struct Updater {
    mailbox: Weak<Mailbox>,
    node: NodeId,
}

impl Updater {
    pub(crate) fn new(mailbox: &Rc<Mailbox>, node: NodeId) -> Self {
        Self {
            mailbox: Rc::downgrade(mailbox),
            node,
        }
    }
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Queues a re-render. Returns `false` if the application is gone.
    pub fn request(&self) -> bool {
        let Some(mailbox) = self.mailbox.upgrade() else {
            return false;
        };
        mailbox.push_update(self.node);
        true
    }

    /// Queues removal of the node and its subtree.
    pub fn delete(&self) -> bool {
        let Some(mailbox) = self.mailbox.upgrade() else {
            return false;
        };
        mailbox.push_delete(self.node);
        true
    }
}
impl std::fmt::Debug for Updater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Updater({})", self.node)
    }
}

/// Context passed to a component while it renders.
///
/// Hook slots are addressed by call order, so a component must call hooks in the same order on
/// every render.
pub struct RenderCx<'a> {
    tree: &'a mut Tree,
    node: NodeId,
    mailbox: &'a Rc<Mailbox>,
    hook_index: usize,
}

struct TrackSlot {
    source: *const (),
    _subscription: Subscription,
}

impl<'a> RenderCx<'a> {
    pub(crate) fn new(tree: &'a mut Tree, node: NodeId, mailbox: &'a Rc<Mailbox>) -> Self {
        Self {
            tree,
            node,
            mailbox,
            hook_index: 0,
        }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }
    pub fn tree(&self) -> &Tree {
        &*self.tree
    }
    pub fn props(&self) -> &Props {
        &self.tree[self.node].props
    }
    /// The children passed to this component.
    pub fn children(&self) -> Child {
        Child::Fragment(self.tree[self.node].props.children.clone())
    }

    /// Returns the next hook slot, initializing it with `init` on the first render.
    ///
    /// # Panics
    ///
    /// Panics if the slot was created with a different type.
    pub fn hook<T: 'static>(&mut self, init: impl FnOnce() -> T) -> &mut T {
        let index = self.hook_index;
        self.hook_index += 1;
        let node = &mut self.tree[self.node];
        if index == node.hooks.len() {
            node.hooks.push(Box::new(init()));
        }
        if !node.hooks[index].is::<T>() {
            panic!(
                "hook {index} of {} is not a `{}`; hooks must be called in the same order on every render",
                node.ty,
                type_name::<T>()
            );
        }
        match node.hooks[index].downcast_mut::<T>() {
            Some(value) => value,
            None => unreachable!(),
        }
    }

    /// Returns a signal owned by this node. Writing it re-renders the node.
    pub fn state<T: 'static>(&mut self, init: impl FnOnce() -> T) -> Signal<T> {
        let updater = self.updater();
        let (signal, _) = self.hook(move || {
            let signal = Signal::new(init());
            let subscription = signal.to_source().subscribe_node(updater);
            (signal, subscription)
        });
        signal.clone()
    }

    /// Re-renders this node whenever `value` changes.
    pub fn track(&mut self, value: &dyn Trackable) {
        let source = value.to_source();
        let updater = self.updater();
        let slot = self.hook(|| TrackSlot {
            source: std::ptr::null(),
            _subscription: Subscription::empty(),
        });
        if slot.source != source.source_id() {
            slot.source = source.source_id();
            slot._subscription = source.subscribe_node(updater);
        }
    }

    pub fn updater(&self) -> Updater {
        Updater::new(self.mailbox, self.node)
    }
    pub fn request_update(&self) {
        self.updater().request();
    }

    /// Runs `f` after the commit that includes this render.
    ///
    /// A cleanup returned by `f` runs before the node's next effects, or when it is removed.
    pub fn effect(&mut self, f: impl FnOnce() -> Option<Cleanup> + 'static) {
        self.tree[self.node].effects.push(Box::new(f));
    }

    /// Runs `f` right after the commit, before deferred effects and before the host gets a
    /// chance to paint.
    pub fn immediate_effect(&mut self, f: impl FnOnce() -> Option<Cleanup> + 'static) {
        self.tree[self.node].immediate_effects.push(Box::new(f));
    }

    /// Runs `f` when this node is removed. Only the call made on the first render registers.
    pub fn on_cleanup(&mut self, f: impl FnOnce() + 'static) {
        let registered = self.hook(|| false);
        if !std::mem::replace(registered, true) {
            self.tree[self.node].cleanups.push(Box::new(f));
        }
    }

    /// Runs `f` when one of `deps` changes, or after every render when `deps` is `None`.
    ///
    /// With dependencies the watch is created on the first render and `f` from later renders is
    /// ignored.
    pub fn watch(&mut self, deps: Option<&[&dyn Trackable]>, mut f: impl FnMut() + 'static) {
        match deps {
            Some(deps) => {
                self.hook(|| watch(deps, f));
            }
            None => self.effect(move || {
                f();
                None
            }),
        }
    }

    /// Returns the value of the nearest provider of `context` above this node.
    pub fn context<T: 'static>(&self, context: &Context<T>) -> Option<Rc<T>> {
        self.tree.ancestors(self.node).find_map(|id| {
            let node = &self.tree[id];
            match &node.ty {
                NodeType::Provider(cid) if *cid == context.id() => {
                    node.props.get(PROVIDER_VALUE)?.downcast::<T>()
                }
                _ => None,
            }
        })
    }
}
