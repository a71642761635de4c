//! Fine-grained reactive cells.
//!
//! Writing a [`Signal`] notifies its subscribers synchronously, in subscription order. A
//! subscriber is either a callback (typically a host patch that touches a single attribute or
//! text node), a tree node to re-render through its [`Updater`], or a dependent [`Computed`] /
//! [`Watch`].
//!
//! Reads made while a computed or watch is evaluating are recorded on a thread-local collector
//! stack, which is how dependencies are discovered without being declared.

use std::{
    cell::{Cell, Ref, RefCell},
    collections::BTreeMap,
    ops::Deref,
    rc::{Rc, Weak},
};

use derive_ex::derive_ex;
use serde::{Deserialize, Serialize};

use crate::{context::Updater, Subscription};

mod computed;
mod watch;

pub use computed::*;
pub use watch::*;

#[cfg(test)]
mod tests;

thread_local! {
    static COLLECTORS: RefCell<Vec<Option<Vec<Rc<dyn Source>>>>> = const { RefCell::new(Vec::new()) };
}

/// Records `source` as a dependency of the evaluation currently running, if any.
fn track(source: Rc<dyn Source>) {
    COLLECTORS.with(|c| {
        if let Some(Some(frame)) = c.borrow_mut().last_mut() {
            if !frame.iter().any(|s| s.source_id() == source.source_id()) {
                frame.push(source);
            }
        }
    })
}

struct CollectorGuard;
impl Drop for CollectorGuard {
    fn drop(&mut self) {
        COLLECTORS.with(|c| c.borrow_mut().pop());
    }
}

/// Runs `f` and returns the sources it read.
fn collect<T>(f: impl FnOnce() -> T) -> (T, Vec<Rc<dyn Source>>) {
    COLLECTORS.with(|c| c.borrow_mut().push(Some(Vec::new())));
    let guard = CollectorGuard;
    let value = f();
    let sources = COLLECTORS.with(|c| c.borrow_mut().last_mut().and_then(Option::take));
    drop(guard);
    (value, sources.unwrap_or_default())
}

/// Runs `f` without recording the reads it makes.
pub fn untrack<T>(f: impl FnOnce() -> T) -> T {
    COLLECTORS.with(|c| c.borrow_mut().push(None));
    let _guard = CollectorGuard;
    f()
}

/// Something that can be notified when a source changes.
pub trait Dependent {
    fn invalidate(self: Rc<Self>);
}

/// Type-erased side of a reactive value, used for dependency bookkeeping.
pub trait Source {
    fn add_dependent(&self, dependent: Weak<dyn Dependent>) -> Subscription;
    fn subscribe_node(&self, updater: Updater) -> Subscription;
    fn source_id(&self) -> *const ();
}

/// Values that can appear in a dependency list.
pub trait Trackable {
    fn to_source(&self) -> Rc<dyn Source>;
}

#[derive_ex(Clone, bound())]
pub(crate) enum Subscriber<T> {
    Callback(Rc<dyn Fn(&T)>),
    Node(Updater),
    Dependent(Weak<dyn Dependent>),
}

/// Subscribers in subscription order.
pub(crate) struct Subscribers<T> {
    next_id: u64,
    entries: BTreeMap<u64, Subscriber<T>>,
}
impl<T> Subscribers<T> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            entries: BTreeMap::new(),
        }
    }
    pub fn insert(&mut self, s: Subscriber<T>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.insert(id, s);
        id
    }
    pub fn remove(&mut self, id: u64) {
        self.entries.remove(&id);
    }
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    pub fn snapshot(&self) -> Vec<Subscriber<T>> {
        self.entries.values().cloned().collect()
    }
}

/// Removes subscriber `id` from `subscribers` when the returned subscription is dropped.
pub(crate) fn subscription_for<T: 'static>(
    subscribers: Weak<RefCell<Subscribers<T>>>,
    id: u64,
) -> Subscription {
    Subscription::from_fn(move || {
        if let Some(s) = subscribers.upgrade() {
            s.borrow_mut().remove(id);
        }
    })
}

/// Delivers a change to a point-in-time snapshot of `subscribers`.
///
/// Subscribers added or removed while delivering do not affect the current delivery.
pub(crate) fn notify<T, V: Deref<Target = T>>(
    subscribers: &RefCell<Subscribers<T>>,
    value: impl Fn() -> V,
) {
    let snapshot = subscribers.borrow().snapshot();
    for s in snapshot {
        match s {
            Subscriber::Callback(f) => f(&*value()),
            Subscriber::Node(updater) => {
                updater.request();
            }
            Subscriber::Dependent(d) => {
                if let Some(d) = d.upgrade() {
                    d.invalidate();
                }
            }
        }
    }
}

/// A reactive value cell.
#[derive_ex(Clone, bound())]
pub struct Signal<T: 'static>(Rc<SignalNode<T>>);

struct SignalNode<T: 'static> {
    value: RefCell<T>,
    subscribers: Rc<RefCell<Subscribers<T>>>,
    notifying: Cell<bool>,
    deferred: RefCell<Vec<Write<T>>>,
}

/// A pending write. Returns `true` if it changed the value.
type Write<T> = Box<dyn FnOnce(&mut T) -> bool>;

struct NotifyingGuard<'a>(&'a Cell<bool>);
impl Drop for NotifyingGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// Creates a new [`Signal`].
pub fn signal<T: 'static>(value: T) -> Signal<T> {
    Signal::new(value)
}

impl<T: 'static> Signal<T> {
    pub fn new(value: T) -> Self {
        Self(Rc::new(SignalNode {
            value: RefCell::new(value),
            subscribers: Rc::new(RefCell::new(Subscribers::new())),
            notifying: Cell::new(false),
            deferred: RefCell::new(Vec::new()),
        }))
    }

    /// Gets the current value and registers this signal as a dependency of the running evaluation.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.with(T::clone)
    }

    /// Calls `f` with the current value and registers this signal as a dependency.
    pub fn with<U>(&self, f: impl FnOnce(&T) -> U) -> U {
        track(self.0.clone());
        f(&self.borrow_value())
    }

    /// Gets the current value without registering a dependency.
    pub fn peek(&self) -> T
    where
        T: Clone,
    {
        self.borrow_value().clone()
    }

    /// Sets the value and notifies every subscriber.
    ///
    /// A write made by a subscriber while this signal is notifying is applied once the current
    /// delivery has reached every subscriber, and is then delivered in turn.
    pub fn set(&self, value: T) {
        self.write(move |current| {
            *current = value;
            true
        });
    }

    /// Sets the value and notifies subscribers only if it changed.
    pub fn set_dedup(&self, value: T)
    where
        T: PartialEq,
    {
        self.write(move |current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
    }

    /// Modifies the value in place and notifies every subscriber.
    pub fn update(&self, f: impl FnOnce(&mut T) + 'static) {
        self.write(move |current| {
            f(current);
            true
        });
    }

    /// Calls `f` with the new value after every write.
    pub fn subscribe(&self, f: impl Fn(&T) + 'static) -> Subscription {
        self.add(Subscriber::Callback(Rc::new(f)))
    }

    pub fn subscriber_count(&self) -> usize {
        self.0.subscribers.borrow().len()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Creates a computed value derived from this signal.
    pub fn map<U: 'static>(&self, f: impl Fn(&T) -> U + 'static) -> Computed<U> {
        let this = self.clone();
        Computed::new(move || this.with(&f))
    }

    fn add(&self, s: Subscriber<T>) -> Subscription {
        let id = self.0.subscribers.borrow_mut().insert(s);
        subscription_for(Rc::downgrade(&self.0.subscribers), id)
    }
    fn write(&self, f: impl FnOnce(&mut T) -> bool + 'static) {
        if self.0.notifying.get() {
            self.0.deferred.borrow_mut().push(Box::new(f));
            return;
        }
        if !f(&mut *self.borrow_value_mut()) {
            return;
        }
        self.0.notifying.set(true);
        let _guard = NotifyingGuard(&self.0.notifying);
        loop {
            notify(&self.0.subscribers, || self.borrow_value());
            let writes = std::mem::take(&mut *self.0.deferred.borrow_mut());
            let mut changed = false;
            let mut current = self.borrow_value_mut();
            for pending in writes {
                changed |= pending(&mut *current);
            }
            if !changed {
                break;
            }
        }
    }
    fn borrow_value(&self) -> Ref<'_, T> {
        match self.0.value.try_borrow() {
            Ok(value) => value,
            Err(_) => panic!("signal read while it is being written"),
        }
    }
    fn borrow_value_mut(&self) -> std::cell::RefMut<'_, T> {
        match self.0.value.try_borrow_mut() {
            Ok(value) => value,
            Err(_) => panic!("signal written while it is being read"),
        }
    }
}

impl<T: 'static> Source for SignalNode<T> {
    fn add_dependent(&self, dependent: Weak<dyn Dependent>) -> Subscription {
        let id = self
            .subscribers
            .borrow_mut()
            .insert(Subscriber::Dependent(dependent));
        subscription_for(Rc::downgrade(&self.subscribers), id)
    }
    fn subscribe_node(&self, updater: Updater) -> Subscription {
        let id = self.subscribers.borrow_mut().insert(Subscriber::Node(updater));
        subscription_for(Rc::downgrade(&self.subscribers), id)
    }
    fn source_id(&self) -> *const () {
        self as *const Self as *const ()
    }
}

impl<T: 'static> Trackable for Signal<T> {
    fn to_source(&self) -> Rc<dyn Source> {
        self.0.clone()
    }
}

impl<T: std::fmt::Debug + 'static> std::fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0.value.try_borrow() {
            Ok(value) => write!(f, "Signal({:?})", &*value),
            Err(_) => write!(f, "Signal(<borrowed>)"),
        }
    }
}
impl<T: Default + 'static> Default for Signal<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> Serialize for Signal<T>
where
    T: Serialize + 'static,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        match self.0.value.try_borrow() {
            Ok(value) => T::serialize(&*value, serializer),
            Err(_) => Err(serde::ser::Error::custom("borrowed")),
        }
    }
}
impl<'de, T> Deserialize<'de> for Signal<T>
where
    T: Deserialize<'de> + 'static,
{
    fn deserialize<D>(deserializer: D) -> Result<Signal<T>, D::Error>
    where
        D: serde::de::Deserializer<'de>,
    {
        T::deserialize(deserializer).map(Signal::new)
    }
}
