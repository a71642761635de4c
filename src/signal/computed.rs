use std::{
    cell::{Cell, RefCell},
    rc::{Rc, Weak},
};

use derive_ex::derive_ex;

use crate::{context::Updater, Subscription};

use super::{
    collect, notify, subscription_for, track, Dependent, Source, Subscriber, Subscribers,
    Trackable,
};

/// A value derived from other reactive values.
///
/// The function runs lazily on the first read after any dependency changed, and the result is
/// kept until the next change. Dependencies are whatever the function read last time it ran.
#[derive_ex(Clone, bound())]
pub struct Computed<T: 'static>(Rc<ComputedNode<T>>);

struct ComputedNode<T: 'static> {
    f: Box<dyn Fn() -> T>,
    state: RefCell<ComputedState<T>>,
    evaluating: Cell<bool>,
    subscribers: Rc<RefCell<Subscribers<T>>>,
    this: Weak<ComputedNode<T>>,
}

struct ComputedState<T> {
    value: Option<Rc<T>>,
    dirty: bool,
    sources: Vec<Subscription>,
}

/// Creates a new [`Computed`].
pub fn computed<T: 'static>(f: impl Fn() -> T + 'static) -> Computed<T> {
    Computed::new(f)
}

impl<T: 'static> Computed<T> {
    pub fn new(f: impl Fn() -> T + 'static) -> Self {
        Self(Rc::new_cyclic(|this| ComputedNode {
            f: Box::new(f),
            state: RefCell::new(ComputedState {
                value: None,
                dirty: true,
                sources: Vec::new(),
            }),
            evaluating: Cell::new(false),
            subscribers: Rc::new(RefCell::new(Subscribers::new())),
            this: this.clone(),
        }))
    }

    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.with(T::clone)
    }

    pub fn with<U>(&self, f: impl FnOnce(&T) -> U) -> U {
        track(self.0.clone());
        f(&self.0.value())
    }

    pub fn peek(&self) -> T
    where
        T: Clone,
    {
        T::clone(&self.0.value())
    }

    /// Calls `f` with the recomputed value whenever a dependency changes.
    pub fn subscribe(&self, f: impl Fn(&T) + 'static) -> Subscription {
        let id = self
            .0
            .subscribers
            .borrow_mut()
            .insert(Subscriber::Callback(Rc::new(f)));
        subscription_for(Rc::downgrade(&self.0.subscribers), id)
    }

    /// Returns `true` if the next read will run the function.
    pub fn is_dirty(&self) -> bool {
        self.0.state.borrow().dirty
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl<T: 'static> ComputedNode<T> {
    fn value(&self) -> Rc<T> {
        self.ensure();
        match &self.state.borrow().value {
            Some(value) => value.clone(),
            None => unreachable!("computed value is evaluated by ensure"),
        }
    }

    fn ensure(&self) {
        {
            let state = self.state.borrow();
            if !state.dirty && state.value.is_some() {
                return;
            }
        }
        if self.evaluating.replace(true) {
            panic!("computed value depends on itself");
        }
        let (value, sources) = collect(|| (self.f)());
        self.evaluating.set(false);

        let dependent: Weak<dyn Dependent> = self.this.clone();
        let sources = sources
            .iter()
            .map(|s| s.add_dependent(dependent.clone()))
            .collect();
        let old_sources = {
            let mut state = self.state.borrow_mut();
            state.value = Some(Rc::new(value));
            state.dirty = false;
            std::mem::replace(&mut state.sources, sources)
        };
        drop(old_sources);
    }
}

impl<T: 'static> Dependent for ComputedNode<T> {
    fn invalidate(self: Rc<Self>) {
        self.state.borrow_mut().dirty = true;
        let this = &*self;
        notify(&this.subscribers, || this.value());
    }
}

impl<T: 'static> Source for ComputedNode<T> {
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

impl<T: 'static> Trackable for Computed<T> {
    fn to_source(&self) -> Rc<dyn Source> {
        self.0.clone()
    }
}

impl<T: std::fmt::Debug + 'static> std::fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0.state.try_borrow() {
            Ok(state) => match &state.value {
                Some(value) if !state.dirty => write!(f, "Computed({value:?})"),
                _ => write!(f, "Computed(<dirty>)"),
            },
            Err(_) => write!(f, "Computed(<borrowed>)"),
        }
    }
}
