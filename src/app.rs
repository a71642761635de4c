use std::{future::Future, rc::Rc};

use futures::channel::oneshot;

use crate::{
    Child, Config, Diagnostics, Error, HostHandle, NodeId, Phase, Renderer, Result, Scheduler,
    Subscription, Tree, Updater,
};

/// An application mounted into one host container.
///
/// `App` is the surface routers, form libraries and devtools build on. The host drives it by
/// calling [`App::tick`] from its frame callback, registered with [`App::set_frame_requester`].
pub struct App<R: Renderer> {
    scheduler: Scheduler<R>,
    container: HostHandle,
}

impl<R: Renderer> App<R> {
    pub fn new(renderer: R, container: HostHandle) -> Self {
        Self::with_config(renderer, container, Config::default())
    }
    pub fn with_config(renderer: R, container: HostHandle, config: Config) -> Self {
        Self {
            scheduler: Scheduler::new(renderer, config),
            container,
        }
    }

    /// Mounts `child` into the container. Nothing is rendered until the next tick or flush.
    pub fn mount(&mut self, child: impl Into<Child>) -> Result<NodeId> {
        self.scheduler.mount(self.container, child.into())
    }

    /// Replaces what is rendered below the root.
    pub fn render(&mut self, child: impl Into<Child>) -> Result<()> {
        self.scheduler.render(child.into())
    }

    pub fn unmount(&mut self) -> Result<()> {
        self.scheduler.unmount()
    }

    /// Queues `node`, or the whole application when `None`.
    pub fn request_update(&mut self, node: Option<NodeId>) -> Result<()> {
        let node = match node {
            Some(node) => node,
            None => self.root().ok_or(Error::NotMounted)?,
        };
        self.scheduler.queue_update(node)
    }
    pub fn request_delete(&mut self, node: NodeId) -> Result<()> {
        self.scheduler.queue_delete(node)
    }

    pub fn flush_sync(&mut self) -> Result<()> {
        self.scheduler.flush_sync()
    }
    pub fn tick(&mut self) -> Result<()> {
        self.scheduler.tick()
    }

    pub fn root(&self) -> Option<NodeId> {
        self.scheduler.root()
    }
    pub fn container(&self) -> HostHandle {
        self.container
    }
    pub fn tree(&self) -> &Tree {
        self.scheduler.tree()
    }
    pub fn renderer(&self) -> &R {
        self.scheduler.renderer()
    }
    pub fn renderer_mut(&mut self) -> &mut R {
        self.scheduler.renderer_mut()
    }
    pub fn scheduler(&self) -> &Scheduler<R> {
        &self.scheduler
    }
    pub fn diagnostics(&self) -> &Diagnostics {
        self.scheduler.diagnostics()
    }
    pub fn phase(&self) -> Phase {
        self.scheduler.phase()
    }
    pub fn trees_in_progress(&self) -> Vec<NodeId> {
        self.scheduler.trees_in_progress()
    }
    pub fn updater(&self, node: NodeId) -> Updater {
        self.scheduler.updater(node)
    }

    /// Calls `f` after every commit batch, once its effects have run.
    pub fn on_update(&self, f: impl Fn() + 'static) -> Subscription {
        self.scheduler.on_update(f)
    }
    /// Calls `f` for every error raised while updating, fatal or not.
    pub fn on_error(&self, f: impl Fn(&Error) + 'static) -> Subscription {
        self.scheduler.on_error(f)
    }
    pub fn set_frame_requester(&self, f: impl Fn() + 'static) {
        self.scheduler.set_frame_requester(Some(Rc::new(f)));
    }

    pub fn next_idle(&mut self, f: impl FnOnce() + 'static) {
        self.scheduler.next_idle(f);
    }

    /// Resolves once all queued work has been committed.
    pub fn idle(&mut self) -> impl Future<Output = ()> + 'static {
        let (sender, receiver) = oneshot::channel();
        self.scheduler.next_idle(move || {
            let _ = sender.send(());
        });
        async move {
            let _ = receiver.await;
        }
    }
}
