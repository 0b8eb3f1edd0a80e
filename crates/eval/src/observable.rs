//! Observer lists, subscriptions, teardown signals and boolean streams.
//!
//! Everything here is single-threaded and synchronous: notifying runs
//! every current observer before returning. Observers may subscribe,
//! unsubscribe or mutate other values while being notified; an observer
//! removed mid-notification is not called again.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::value::Value;

struct Observer<T: ?Sized> {
    id: u64,
    active: Cell<bool>,
    callback: Box<dyn Fn(&T)>,
}

/// An explicit observer list.
pub(crate) struct Observers<T: ?Sized> {
    list: RefCell<Vec<Rc<Observer<T>>>>,
    next_id: Cell<u64>,
}

impl<T: ?Sized + 'static> Observers<T> {
    pub(crate) fn new() -> Self {
        Observers {
            list: RefCell::new(Vec::new()),
            next_id: Cell::new(0),
        }
    }

    pub(crate) fn add(this: &Rc<Self>, callback: impl Fn(&T) + 'static) -> Subscription {
        let id = this.next_id.get();
        this.next_id.set(id + 1);
        this.list.borrow_mut().push(Rc::new(Observer {
            id,
            active: Cell::new(true),
            callback: Box::new(callback),
        }));
        let weak: Weak<Self> = Rc::downgrade(this);
        Subscription::new(move || {
            if let Some(observers) = weak.upgrade() {
                observers.remove(id);
            }
        })
    }

    fn remove(&self, id: u64) {
        // Dropped outside the borrow: a callback's captures may unsubscribe
        // from this same list when they go away.
        let removed = {
            let mut list = self.list.borrow_mut();
            let pos = list.iter().position(|o| o.id == id);
            pos.map(|i| list.remove(i))
        };
        if let Some(observer) = &removed {
            observer.active.set(false);
        }
        drop(removed);
    }

    pub(crate) fn notify(&self, value: &T) {
        let snapshot: Vec<Rc<Observer<T>>> = self.list.borrow().clone();
        for observer in snapshot {
            if observer.active.get() {
                (observer.callback)(value);
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.list.borrow().len()
    }
}

/// Handle to a registered observer. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub(crate) fn new(cancel: impl FnOnce() + 'static) -> Self {
        Subscription {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A subscription with nothing to release.
    pub fn empty() -> Self {
        Subscription { cancel: None }
    }

    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// One-shot unsubscribe signal shared by everything an owner registered.
///
/// Firing releases every held subscription; anything handed over after
/// that is released on the spot.
#[derive(Clone, Default)]
pub struct Teardown(Rc<TeardownInner>);

#[derive(Default)]
struct TeardownInner {
    fired: Cell<bool>,
    held: RefCell<Vec<Subscription>>,
}

impl Teardown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hold(&self, sub: Subscription) {
        if self.0.fired.get() {
            drop(sub);
        } else {
            self.0.held.borrow_mut().push(sub);
        }
    }

    pub fn fire(&self) {
        self.0.fired.set(true);
        let held = std::mem::take(&mut *self.0.held.borrow_mut());
        drop(held);
    }

    pub fn is_fired(&self) -> bool {
        self.0.fired.get()
    }

    pub fn held(&self) -> usize {
        self.0.held.borrow().len()
    }
}

// ──────────────────────────────────────────────
// Boolean streams
// ──────────────────────────────────────────────

/// A replaying observable boolean.
///
/// Subscribers get the current value immediately, then every change.
/// A stream keeps its upstream subscriptions (and child streams) alive
/// for as long as any handle to it exists.
#[derive(Clone)]
pub struct BoolStream(Rc<BoolStreamInner>);

struct BoolStreamInner {
    value: Cell<bool>,
    observers: Rc<Observers<bool>>,
    upstream: RefCell<Vec<Subscription>>,
    children: RefCell<Vec<BoolStream>>,
    /// Operands the stream reads; a local map may be dropped while the
    /// stream is still observed.
    operands: RefCell<Vec<Value>>,
}

#[derive(Clone)]
pub(crate) struct WeakBoolStream(Weak<BoolStreamInner>);

impl WeakBoolStream {
    pub(crate) fn upgrade(&self) -> Option<BoolStream> {
        self.0.upgrade().map(BoolStream)
    }
}

impl BoolStream {
    pub(crate) fn new(initial: bool) -> Self {
        BoolStream(Rc::new(BoolStreamInner {
            value: Cell::new(initial),
            observers: Rc::new(Observers::new()),
            upstream: RefCell::new(Vec::new()),
            children: RefCell::new(Vec::new()),
            operands: RefCell::new(Vec::new()),
        }))
    }

    /// A stream that never changes.
    pub fn constant(value: bool) -> Self {
        Self::new(value)
    }

    pub fn get(&self) -> bool {
        self.0.value.get()
    }

    pub(crate) fn set(&self, value: bool) {
        if self.0.value.get() != value {
            self.0.value.set(value);
            self.0.observers.notify(&value);
        }
    }

    pub fn subscribe(&self, f: impl Fn(bool) + 'static) -> Subscription {
        let f = Rc::new(f);
        let g = f.clone();
        let sub = Observers::add(&self.0.observers, move |v: &bool| g(*v));
        f(self.get());
        sub
    }

    pub fn subscriber_count(&self) -> usize {
        self.0.observers.len()
    }

    pub(crate) fn hold(&self, sub: Subscription) {
        self.0.upstream.borrow_mut().push(sub);
    }

    pub(crate) fn retain_child(&self, child: BoolStream) {
        self.0.children.borrow_mut().push(child);
    }

    pub(crate) fn retain_value(&self, value: Value) {
        self.0.operands.borrow_mut().push(value);
    }

    pub(crate) fn downgrade(&self) -> WeakBoolStream {
        WeakBoolStream(Rc::downgrade(&self.0))
    }
}

impl std::fmt::Debug for BoolStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BoolStream({})", self.get())
    }
}
