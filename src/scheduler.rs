//! Cooperative work loop, commit and effects.
//!
//! Updates are tracked as independent "trees in progress", each rooted at the node an update was
//! requested for. The work loop walks them one unit (one node) at a time and yields once the
//! frame budget is spent. When every tree is walked, all of them are committed together:
//! deletions first, then each tree in post-order. Immediate effects run next and may dirty the
//! tree again, in which case the cycle repeats synchronously up to a fixed limit. Deferred effects
//! run last.

use std::{cell::RefCell, collections::VecDeque, mem::take, rc::Rc};

use bumpalo::Bump;
use parse_display::Display;
use web_time::Instant;

use crate::{
    context::{Mailbox, RenderCx, Updater},
    reconciler::{Diagnostics, Reconciler},
    renderer::find_anchor,
    signal::{subscription_for, Subscriber, Subscribers},
    Child, Component, Config, Error, Flags, HostHandle, NodeId, NodeType, Props, Renderer, Result,
    Subscription, Tree, VNode,
};

#[cfg(test)]
mod tests;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Phase {
    Idle,
    Running,
    Committing,
    FiringEffects,
}

struct Listeners<T: 'static>(Rc<RefCell<Subscribers<T>>>);

impl<T: 'static> Listeners<T> {
    fn new() -> Self {
        Self(Rc::new(RefCell::new(Subscribers::new())))
    }
    fn add(&self, f: impl Fn(&T) + 'static) -> Subscription {
        let id = self.0.borrow_mut().insert(Subscriber::Callback(Rc::new(f)));
        subscription_for(Rc::downgrade(&self.0), id)
    }
    fn emit(&self, value: &T) {
        let snapshot = self.0.borrow().snapshot();
        for s in snapshot {
            if let Subscriber::Callback(f) = s {
                f(value);
            }
        }
    }
}

pub struct Scheduler<R> {
    tree: Tree,
    renderer: R,
    config: Config,
    mailbox: Rc<Mailbox>,
    root: Option<NodeId>,
    root_mounted: bool,
    phase: Phase,

    pending: VecDeque<NodeId>,
    current: Option<NodeId>,
    next_unit: Option<NodeId>,
    done: Vec<NodeId>,
    pass: u64,

    explicit_deletions: Vec<NodeId>,
    deletion_parents: Vec<NodeId>,
    effect_nodes: Vec<NodeId>,
    deferred: Vec<NodeId>,
    consecutive_dirty: usize,
    sync_mode: bool,
    fatal: Option<Error>,

    idle_callbacks: Vec<Box<dyn FnOnce()>>,
    update_listeners: Listeners<()>,
    error_listeners: Listeners<Error>,
    diagnostics: Diagnostics,
    bump: Bump,
}

impl<R: Renderer> Scheduler<R> {
    pub fn new(renderer: R, config: Config) -> Self {
        Self {
            tree: Tree::new(),
            renderer,
            config,
            mailbox: Rc::new(Mailbox::default()),
            root: None,
            root_mounted: false,
            phase: Phase::Idle,
            pending: VecDeque::new(),
            current: None,
            next_unit: None,
            done: Vec::new(),
            pass: 1,
            explicit_deletions: Vec::new(),
            deletion_parents: Vec::new(),
            effect_nodes: Vec::new(),
            deferred: Vec::new(),
            consecutive_dirty: 0,
            sync_mode: false,
            fatal: None,
            idle_callbacks: Vec::new(),
            update_listeners: Listeners::new(),
            error_listeners: Listeners::new(),
            diagnostics: Diagnostics::new(),
            bump: Bump::new(),
        }
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }
    pub fn renderer(&self) -> &R {
        &self.renderer
    }
    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }
    pub fn config(&self) -> &Config {
        &self.config
    }
    pub fn phase(&self) -> Phase {
        self.phase
    }
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }
    pub fn updater(&self, node: NodeId) -> Updater {
        Updater::new(&self.mailbox, node)
    }

    /// Roots of the trees queued, being walked, or walked and waiting for commit.
    pub fn trees_in_progress(&self) -> Vec<NodeId> {
        self.current
            .iter()
            .chain(&self.pending)
            .chain(&self.done)
            .copied()
            .collect()
    }

    pub fn on_update(&self, f: impl Fn() + 'static) -> Subscription {
        self.update_listeners.add(move |_| f())
    }
    pub fn on_error(&self, f: impl Fn(&Error) + 'static) -> Subscription {
        self.error_listeners.add(f)
    }
    /// Sets the callback used to ask the host for a frame. The host answers by calling
    /// [`Scheduler::tick`].
    pub fn set_frame_requester(&self, requester: Option<Rc<dyn Fn()>>) {
        self.mailbox.set_requester(requester);
    }

    /// Runs `f` the next time the scheduler becomes idle, or now if it is idle.
    pub fn next_idle(&mut self, f: impl FnOnce() + 'static) {
        if self.phase == Phase::Idle && !self.has_work() && self.mailbox.is_empty() {
            f();
        } else {
            self.idle_callbacks.push(Box::new(f));
        }
    }

    pub fn mount(&mut self, container: HostHandle, child: Child) -> Result<NodeId> {
        if self.root.is_some() {
            return Err(Error::AlreadyMounted);
        }
        self.renderer.create_root(container);
        let mut props = Props::default();
        props.children = Rc::new(vec![child]);
        let mut node = VNode::new(NodeType::Host("#root".into()), None, props);
        node.dom = Some(container);
        let root = self.tree.insert(node);
        self.root = Some(root);
        self.root_mounted = false;
        tracing::debug!(%root, %container, "mounting");
        self.queue_update(root)?;
        Ok(root)
    }

    /// Replaces the children of the root and queues it.
    pub fn render(&mut self, child: Child) -> Result<()> {
        let root = self.root.ok_or(Error::NotMounted)?;
        self.tree[root].props.children = Rc::new(vec![child]);
        self.queue_update(root)
    }

    /// Removes everything below the root from the host and destroys the tree.
    pub fn unmount(&mut self) -> Result<()> {
        let root = self.root.take().ok_or(Error::NotMounted)?;
        tracing::debug!(%root, "unmounting");
        self.pending.clear();
        self.current = None;
        self.next_unit = None;
        self.done.clear();
        self.effect_nodes.clear();
        self.deferred.clear();
        self.renderer.on_before_commit();
        for id in take(&mut self.explicit_deletions) {
            self.commit_deletion(id);
        }
        let children: Vec<NodeId> = self.tree.children(root).collect();
        for id in children {
            self.commit_deletion(id);
        }
        self.commit_pending_deletions();
        self.tree.remove(root);
        self.renderer.on_after_commit();
        self.go_idle();
        Ok(())
    }

    /// Requests re-evaluation of the subtree at `node`.
    ///
    /// A request already covered by a tree in progress is dropped. A request for an ancestor of
    /// trees in progress replaces them.
    pub fn queue_update(&mut self, node: NodeId) -> Result<()> {
        if !self.is_live(node) {
            return Err(Error::UnknownNode(node));
        }
        self.tree[node].dirty = true;
        let tree = &self.tree;
        let behind_memo = tree[node].flags.contains(Flags::HAS_MEMO_ANCESTOR);
        let covers = |root: NodeId| root == node || (!behind_memo && tree.is_ancestor(root, node));
        let contained = |root: NodeId| {
            root != node
                && tree.is_ancestor(node, root)
                && !tree[root].flags.contains(Flags::HAS_MEMO_ANCESTOR)
        };

        if self.pending.iter().any(|&r| covers(r)) {
            tracing::trace!(%node, "covered by a queued tree");
            return Ok(());
        }
        if let Some(current) = self.current {
            if covers(current) && tree[node].pass != self.pass {
                tracing::trace!(%node, %current, "covered by the current tree");
                return Ok(());
            }
        }

        let mut queued = false;
        if let Some(current) = self.current {
            if contained(current) {
                tracing::debug!(%node, superseded = %current, "restarting walk");
                self.current = Some(node);
                self.next_unit = Some(node);
                queued = true;
            }
        }
        let mut pending = VecDeque::with_capacity(self.pending.len() + 1);
        for &r in &self.pending {
            if !contained(r) {
                pending.push_back(r);
            } else if !queued {
                tracing::debug!(%node, superseded = %r, "replacing queued tree");
                pending.push_back(node);
                queued = true;
            }
        }
        self.done.retain(|&r| !contained(r));
        if !queued {
            pending.push_back(node);
        }
        self.pending = pending;
        self.wake();
        Ok(())
    }

    /// Marks `node` and its subtree for deletion and drops trees in progress inside it.
    pub fn queue_delete(&mut self, node: NodeId) -> Result<()> {
        if Some(node) == self.root {
            return self.unmount();
        }
        if !self.is_live(node) {
            return Err(Error::UnknownNode(node));
        }
        let walk_inside = self.current.is_some_and(|c| self.tree.contains_node(node, c));
        let next_inside = self.next_unit.is_some_and(|u| self.tree.contains_node(node, u));
        if next_inside && !walk_inside {
            // `node` lies strictly inside the current tree, so it has a parent.
            self.next_unit = match self.tree[node].sibling {
                Some(sibling) => Some(sibling),
                None => self.tree[node].parent.and_then(|p| self.complete_unit(p)),
            };
            tracing::trace!(%node, next = ?self.next_unit, "skipping deleted unit");
        }
        self.tree.unlink(node);
        self.tree[node].flags |= Flags::DELETION;
        self.explicit_deletions.push(node);

        let tree = &self.tree;
        let inside = |root: NodeId| tree.contains_node(node, root);
        self.pending.retain(|&r| !inside(r));
        self.done.retain(|&r| !inside(r));
        if self.current.is_some_and(inside) {
            self.current = None;
            self.next_unit = None;
        }
        tracing::debug!(%node, "queued deletion");
        self.wake();
        Ok(())
    }

    /// Works until the frame budget is spent or everything is committed.
    ///
    /// Returns a fatal error raised during the previous call.
    pub fn tick(&mut self) -> Result<()> {
        let deadline = Instant::now() + self.config.frame_budget;
        self.run(Some(deadline))
    }

    /// Works until idle, ignoring the frame budget.
    pub fn flush_sync(&mut self) -> Result<()> {
        self.run(None)?;
        match self.fatal.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn run(&mut self, deadline: Option<Instant>) -> Result<()> {
        if let Some(e) = self.fatal.take() {
            return Err(e);
        }
        self.mailbox.frame_started();
        loop {
            self.drain_mailbox();
            if !self.has_work() && self.deferred.is_empty() {
                self.go_idle();
                return Ok(());
            }
            if !self.work_loop(deadline) {
                if self.fatal.is_some() {
                    self.abandon();
                } else {
                    self.mailbox.request_frame();
                }
                return Ok(());
            }
            self.commit();
            self.fire_effects();
            if self.fatal.is_some() {
                self.abandon();
                return Ok(());
            }
            if self.phase == Phase::Idle {
                return Ok(());
            }
            if !self.sync_mode && deadline.is_some_and(|d| Instant::now() >= d) {
                self.mailbox.request_frame();
                return Ok(());
            }
        }
    }

    /// Returns `true` once every tree in progress has been walked.
    fn work_loop(&mut self, deadline: Option<Instant>) -> bool {
        self.set_phase(Phase::Running);
        loop {
            self.drain_mailbox();
            if self.next_unit.is_none() {
                if let Some(current) = self.current.take() {
                    self.done.push(current);
                }
                let Some(root) = self.pending.pop_front() else {
                    return true;
                };
                if !self.is_live(root) {
                    continue;
                }
                tracing::trace!(tree = %root, "starting tree");
                self.current = Some(root);
                self.next_unit = Some(root);
            }
            if let Some(unit) = self.next_unit {
                self.next_unit = self.perform_unit(unit);
            }
            if self.fatal.is_some() {
                return false;
            }
            if !self.sync_mode && deadline.is_some_and(|d| Instant::now() >= d) {
                tracing::trace!("frame budget spent");
                return false;
            }
        }
    }

    fn perform_unit(&mut self, unit: NodeId) -> Option<NodeId> {
        self.tree[unit].pass = self.pass;
        tracing::trace!(node = %unit, ty = %self.tree[unit].ty, "unit of work");
        let result = match self.tree[unit].ty.clone() {
            NodeType::Component(component) => self.update_component(unit, &component),
            NodeType::Host(_) => self.update_host(unit),
            NodeType::Text => Ok(false),
            NodeType::Fragment | NodeType::Provider(_) => {
                let props = &self.tree[unit].props;
                let (children, is_list) = (props.children.clone(), props.list_context);
                self.reconcile(unit, &children, is_list);
                Ok(true)
            }
        };
        match result {
            Ok(true) => {
                if let Some(child) = self.tree[unit].child {
                    return Some(child);
                }
            }
            Ok(false) => {}
            Err(e) => self.report(e),
        }
        self.complete_unit(unit)
    }

    /// Returns whether the children of `unit` need to be walked.
    fn update_component(&mut self, unit: NodeId, component: &Component) -> Result<bool> {
        let node = &self.tree[unit];
        if node.flags.contains(Flags::MEMO)
            && node.mounted
            && !node.dirty
            && !node.flags.contains(Flags::UPDATE)
            && !node.props.has_children()
        {
            tracing::trace!(node = %unit, "memo bail-out");
            return Ok(false);
        }
        let mut loops = 0;
        loop {
            self.mailbox.take_update(unit);
            let node = &mut self.tree[unit];
            node.effects.clear();
            node.immediate_effects.clear();
            let rendered = component.render(&mut RenderCx::new(&mut self.tree, unit, &self.mailbox));
            let child = rendered.map_err(|e| Error::Render {
                node: unit,
                message: e.to_string(),
            })?;
            if self.mailbox.take_update(unit) {
                loops += 1;
                if loops > self.config.max_render_loops {
                    return Err(Error::RenderLoop {
                        node: unit,
                        limit: self.config.max_render_loops,
                    });
                }
                tracing::trace!(node = %unit, loops, "re-rendering in place");
                continue;
            }
            self.tree[unit].dirty = false;
            let (items, is_list) = child.as_items();
            self.reconcile(unit, items, is_list);
            return Ok(true);
        }
    }

    fn update_host(&mut self, unit: NodeId) -> Result<bool> {
        let props = &self.tree[unit].props;
        if props.inner_html.is_some() && props.has_children() {
            return Err(Error::Contract {
                node: unit,
                message: "`inner_html` cannot be combined with children".into(),
            });
        }
        let children = props.children.clone();
        self.reconcile(unit, &children, false);
        Ok(true)
    }

    fn reconcile(&mut self, parent: NodeId, children: &[Child], is_list: bool) {
        Reconciler {
            tree: &mut self.tree,
            diagnostics: self.config.dev.then_some(&mut self.diagnostics),
            bump: &self.bump,
        }
        .reconcile(parent, children, is_list);
        if !self.tree[parent].deletions.is_empty() && !self.deletion_parents.contains(&parent) {
            self.deletion_parents.push(parent);
        }
    }

    /// The next unit after `unit`: its next sibling, or that of the nearest ancestor below the
    /// root of the current tree.
    fn complete_unit(&mut self, unit: NodeId) -> Option<NodeId> {
        let root = self.current;
        let mut id = unit;
        loop {
            self.renderer.on_update_traversal_ascend(&self.tree, id);
            if Some(id) == root {
                return None;
            }
            if let Some(sibling) = self.tree[id].sibling {
                return Some(sibling);
            }
            id = self.tree[id].parent?;
        }
    }

    fn commit(&mut self) {
        self.set_phase(Phase::Committing);
        self.renderer.on_before_commit();
        for id in take(&mut self.explicit_deletions) {
            self.commit_deletion(id);
        }
        self.commit_pending_deletions();

        let trees = self.trees_to_commit();
        for &root in &trees {
            self.commit_tree(root);
        }
        self.renderer.on_after_commit();

        if !self.root_mounted {
            if let Some(root) = self.root.filter(|&r| self.tree[r].mounted) {
                self.root_mounted = true;
                self.renderer.on_root_mounted(&self.tree, root);
            }
        }
        tracing::debug!(pass = self.pass, trees = trees.len(), "committed");
        self.pass += 1;
        self.bump.reset();
    }

    fn commit_pending_deletions(&mut self) {
        for parent in take(&mut self.deletion_parents) {
            if let Some(node) = self.tree.get_mut(parent) {
                for id in take(&mut node.deletions) {
                    self.commit_deletion(id);
                }
            }
        }
    }

    /// Walked trees that are still attached, without trees nested in other ones.
    fn trees_to_commit(&mut self) -> Vec<NodeId> {
        let mut trees = take(&mut self.done);
        trees.retain(|&r| self.is_live(r));
        trees.sort();
        trees.dedup();
        let tree = &self.tree;
        let nested: Vec<NodeId> = trees
            .iter()
            .copied()
            .filter(|&r| trees.iter().any(|&o| tree.is_ancestor(o, r)))
            .collect();
        trees.retain(|r| !nested.contains(r));
        trees
    }

    fn commit_deletion(&mut self, id: NodeId) {
        if !self.tree.contains(id) {
            return;
        }
        let nodes = self.tree.descendants(id);
        let nested: Vec<NodeId> = nodes
            .iter()
            .flat_map(|&n| take(&mut self.tree[n].deletions))
            .collect();
        for n in nested {
            self.commit_deletion(n);
        }

        let mut hosts = Vec::new();
        top_hosts(&self.tree, id, &mut hosts);
        for h in hosts {
            self.renderer.on_remove(&self.tree, h);
        }
        for &n in nodes.iter().rev() {
            let node = &mut self.tree[n];
            if let Some(node_ref) = &node.props.node_ref {
                node_ref.set(None);
            }
            let cleanups: Vec<_> = node
                .effect_cleanups
                .drain(..)
                .chain(node.cleanups.drain(..))
                .collect();
            for cleanup in cleanups {
                cleanup();
            }
        }
        for n in nodes {
            self.tree.remove(n);
            self.mailbox.forget(n);
        }
        tracing::trace!(node = %id, "deleted");
    }

    fn commit_tree(&mut self, root: NodeId) {
        tracing::trace!(tree = %root, "committing tree");
        let mut stack = vec![(root, false)];
        while let Some((id, ascend)) = stack.pop() {
            if ascend {
                self.commit_ascend(id);
                continue;
            }
            self.commit_descend(id);
            stack.push((id, true));
            let start = stack.len();
            stack.extend(self.tree.children(id).map(|c| (c, false)));
            stack[start..].reverse();
        }
    }

    fn commit_descend(&mut self, id: NodeId) {
        self.renderer.on_commit_traversal_descend(&self.tree, id);
        let node = &self.tree[id];
        let is_host = node.ty.is_host();
        if !is_host && node.flags.contains(Flags::PLACEMENT) {
            let children: Vec<NodeId> = self.tree.children(id).collect();
            for c in children {
                self.tree[c].flags |= Flags::PLACEMENT;
            }
        }
        if is_host && self.tree[id].dom.is_none() {
            let handle = self.renderer.create_element(&self.tree, id);
            self.tree[id].dom = Some(handle);
            self.renderer
                .update_element(&self.tree, id, None, &self.tree[id].props);
            self.bind_signals(id);
        }
    }

    fn commit_ascend(&mut self, id: NodeId) {
        let node = &self.tree[id];
        let flags = node.flags;
        let is_host = node.ty.is_host();
        if is_host && flags.contains(Flags::UPDATE) && node.dom.is_some() {
            let prev = self.tree[id].prev.take();
            self.renderer.update_element(
                &self.tree,
                id,
                prev.as_ref().map(|p| &p.props),
                &self.tree[id].props,
            );
            self.bind_signals(id);
        }
        if is_host && flags.contains(Flags::PLACEMENT) {
            self.place(id);
        }
        let node = &mut self.tree[id];
        if is_host {
            if let Some(node_ref) = &node.props.node_ref {
                node_ref.set(node.dom);
            }
        }
        if !node.effects.is_empty() || !node.immediate_effects.is_empty() {
            self.effect_nodes.push(id);
        }
        node.settle();
    }

    /// Subscribes the host object of `id` to the signals in its props.
    fn bind_signals(&mut self, id: NodeId) {
        let Some(handle) = self.tree[id].dom else {
            return;
        };
        let props = &self.tree[id].props;
        let mut subscriptions = Vec::new();
        if let Some(s) = props.text_signal() {
            let patch = self.renderer.text_patcher(handle);
            subscriptions.push(s.subscribe(move |v: &String| patch(v)));
        }
        for (name, s) in props.signals() {
            let patch = self.renderer.attr_patcher(handle, name);
            subscriptions.push(s.subscribe(move |v: &String| patch(v)));
        }
        self.tree[id].subscriptions = subscriptions;
    }

    fn place(&mut self, id: NodeId) {
        let Some(handle) = self.tree[id].dom else {
            return;
        };
        let Some(parent) = self.renderer.get_mountable_parent(&self.tree, id) else {
            return;
        };
        if !self.renderer.is_valid_parent(&self.tree, parent) {
            let message = format!("{} cannot contain {}", self.tree[parent].ty, self.tree[id].ty);
            self.report(Error::Contract { node: id, message });
            return;
        }
        let Some(parent_handle) = self.tree[parent].dom else {
            return;
        };
        if !self.tree[parent].mounted {
            self.renderer.append_child(parent_handle, handle);
            return;
        }
        let anchor = find_anchor(&self.renderer, &self.tree, id, parent).and_then(|a| self.tree[a].dom);
        match anchor {
            Some(anchor) => self.renderer.insert_after(parent_handle, anchor, handle),
            None => self.renderer.prepend_child(parent_handle, handle),
        }
    }

    fn fire_effects(&mut self) {
        self.set_phase(Phase::FiringEffects);
        let nodes = take(&mut self.effect_nodes);
        for &id in &nodes {
            let Some(node) = self.tree.get_mut(id) else {
                continue;
            };
            let cleanups = take(&mut node.effect_cleanups);
            let immediate = take(&mut node.immediate_effects);
            for cleanup in cleanups {
                cleanup();
            }
            for effect in immediate {
                if let Some(cleanup) = effect() {
                    self.tree[id].effect_cleanups.push(cleanup);
                }
            }
        }
        self.deferred.extend(nodes);

        if !self.mailbox.is_empty() {
            self.consecutive_dirty += 1;
            if self.consecutive_dirty > self.config.max_consecutive_dirty {
                self.report(Error::DirtyLoop {
                    limit: self.config.max_consecutive_dirty,
                });
                return;
            }
            tracing::trace!(count = self.consecutive_dirty, "immediate effects dirtied the tree");
            self.sync_mode = true;
            self.set_phase(Phase::Running);
            return;
        }
        self.sync_mode = false;
        self.consecutive_dirty = 0;
        for id in take(&mut self.deferred) {
            let Some(node) = self.tree.get_mut(id) else {
                continue;
            };
            for effect in take(&mut node.effects) {
                if let Some(cleanup) = effect() {
                    self.tree[id].effect_cleanups.push(cleanup);
                }
            }
        }
        self.update_listeners.emit(&());
        if self.mailbox.is_empty() && !self.has_work() {
            self.go_idle();
        } else {
            self.set_phase(Phase::Running);
        }
    }

    fn go_idle(&mut self) {
        self.set_phase(Phase::Idle);
        for f in take(&mut self.idle_callbacks) {
            f();
        }
    }

    /// Drops all work in progress after a fatal error.
    fn abandon(&mut self) {
        self.pending.clear();
        self.current = None;
        self.next_unit = None;
        self.done.clear();
        self.effect_nodes.clear();
        self.deferred.clear();
        self.sync_mode = false;
        self.consecutive_dirty = 0;
        self.mailbox.take();
        self.set_phase(Phase::Idle);
        self.mailbox.request_frame();
    }

    fn report(&mut self, e: Error) {
        if e.is_fatal() {
            tracing::error!(error = %e, "fatal error");
            self.fatal = Some(e.clone());
        } else {
            tracing::error!(error = %e, "update failed");
        }
        self.error_listeners.emit(&e);
    }

    fn drain_mailbox(&mut self) {
        let (updates, deletes) = self.mailbox.take();
        for node in deletes {
            if let Err(e) = self.queue_delete(node) {
                tracing::trace!(error = %e, "dropped deletion request");
            }
        }
        for node in updates {
            if let Err(e) = self.queue_update(node) {
                tracing::trace!(error = %e, "dropped update request");
            }
        }
    }

    fn wake(&mut self) {
        if self.phase == Phase::Idle {
            self.set_phase(Phase::Running);
        }
        self.mailbox.request_frame();
    }

    fn has_work(&self) -> bool {
        self.current.is_some()
            || !self.pending.is_empty()
            || !self.done.is_empty()
            || !self.explicit_deletions.is_empty()
    }

    /// Whether `node` is attached below the mounted root and not being deleted.
    fn is_live(&self, node: NodeId) -> bool {
        let Some(root) = self.root else {
            return false;
        };
        if !self.tree.contains(node) {
            return false;
        }
        let mut id = node;
        loop {
            if self.tree[id].flags.contains(Flags::DELETION) {
                return false;
            }
            if id == root {
                return true;
            }
            match self.tree[id].parent {
                Some(p) => id = p,
                None => return false,
            }
        }
    }

    fn set_phase(&mut self, phase: Phase) {
        if self.phase != phase {
            tracing::debug!(from = %self.phase, to = %phase, "phase");
            self.phase = phase;
        }
    }
}

fn top_hosts(tree: &Tree, id: NodeId, out: &mut Vec<NodeId>) {
    if tree[id].dom.is_some() {
        out.push(id);
        return;
    }
    for c in tree.children(id) {
        top_hosts(tree, c, out);
    }
}
