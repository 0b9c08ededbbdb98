//! A mutable value observers can subscribe to.

use std::{
    cell::{Cell, RefCell},
    rc::{Rc, Weak},
};

use crate::cancel::{CancellationScope, CleanupId};

type Observer<T> = Rc<dyn Fn(&T, &Subscription<T>)>;

struct ObserverEntry<T> {
    id: u64,
    callback: Observer<T>,
    subscription: Subscription<T>,
}

struct SharedInner<T> {
    value: T,
    observers: Vec<ObserverEntry<T>>,
    next_id: u64,
    finished: bool,
    /// Cleanup finishing this value, registered on the scope it is tied to.
    scope_link: Option<(CancellationScope, CleanupId)>,
}

/// Options accepted by [`SharedValue::on_update`].
#[derive(Default, Clone, Copy)]
pub struct ObserveOptions<'a> {
    /// Call the observer right away with the current value.
    pub emit_current_value: bool,
    /// Stop observing once this scope is cancelled.
    pub clear_scope: Option<&'a CancellationScope>,
}

impl<'a> ObserveOptions<'a> {
    pub fn emit_current_value(mut self) -> Self {
        self.emit_current_value = true;
        self
    }

    pub fn clear_on(mut self, scope: &'a CancellationScope) -> Self {
        self.clear_scope = Some(scope);
        self
    }
}

struct SubscriptionState<T> {
    source: Weak<RefCell<SharedInner<T>>>,
    id: u64,
    cleared: Cell<bool>,
    scope_link: RefCell<Option<(CancellationScope, CleanupId)>>,
}

/// Token handed to observers, allowing them to stop listening.
pub struct Subscription<T> {
    state: Rc<SubscriptionState<T>>,
}

impl<T> Clone for Subscription<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<T> Subscription<T> {
    pub fn is_cleared(&self) -> bool {
        self.state.cleared.get()
    }

    /// Removes the observer. Idempotent.
    pub fn stop(&self) {
        if self.state.cleared.replace(true) {
            return;
        }

        // Entries are dropped outside of the borrow: their callbacks may own
        // other handles on this value.
        let removed = self.state.source.upgrade().and_then(|source| {
            let mut inner = source.borrow_mut();
            let position = inner
                .observers
                .iter()
                .position(|entry| entry.id == self.state.id)?;
            let entry = inner.observers.remove(position);
            Some(entry)
        });
        drop(removed);

        if let Some((scope, cleanup)) = self.state.scope_link.borrow_mut().take() {
            scope.deregister(cleanup);
        }
    }
}

/// A value shared between a single writer and any number of observers.
///
/// Observers are notified synchronously, in subscription order, each time the
/// value is set. The observer list is snapshot before notifying, so observers
/// may subscribe or unsubscribe while being called.
///
/// Once finished, a `SharedValue` ignores updates and drops every observer.
pub struct SharedValue<T> {
    inner: Rc<RefCell<SharedInner<T>>>,
}

impl<T> Clone for SharedValue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + 'static> SharedValue<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(SharedInner {
                value,
                observers: Vec::new(),
                next_id: 0,
                finished: false,
                scope_link: None,
            })),
        }
    }

    /// Creates a value which finishes itself once `scope` is cancelled.
    pub fn new_with_scope(value: T, scope: &CancellationScope) -> Self {
        let shared = Self::new(value);
        let weak = Rc::downgrade(&shared.inner);
        let cleanup = scope.register(move || {
            if let Some(inner) = weak.upgrade() {
                SharedValue { inner }.finish();
            }
        });
        if let Some(cleanup) = cleanup {
            shared.inner.borrow_mut().scope_link = Some((scope.clone(), cleanup));
        }
        shared
    }

    pub fn get_value(&self) -> T {
        self.inner.borrow().value.clone()
    }

    /// Reads the current value without cloning it.
    pub fn with_value<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.borrow().value)
    }

    pub fn set_value(&self, value: T) {
        let observers = {
            let mut inner = self.inner.borrow_mut();
            if inner.finished {
                tracing::warn!("Setting the value of a finished SharedValue");
                return;
            }
            inner.value = value.clone();
            inner
                .observers
                .iter()
                .map(|entry| (entry.callback.clone(), entry.subscription.clone()))
                .collect::<Vec<_>>()
        };

        for (callback, subscription) in observers {
            if !subscription.is_cleared() {
                callback(&value, &subscription);
            }
        }
    }

    pub fn set_value_if_changed(&self, value: T)
    where
        T: PartialEq,
    {
        let changed = self.inner.borrow().value != value;
        if changed {
            self.set_value(value);
        }
    }

    /// Registers an observer called on each update.
    pub fn on_update<F>(&self, callback: F, options: ObserveOptions<'_>) -> Subscription<T>
    where
        F: Fn(&T, &Subscription<T>) + 'static,
    {
        let callback: Observer<T> = Rc::new(callback);
        let subscription = {
            let mut inner = self.inner.borrow_mut();
            let id = inner.next_id;
            inner.next_id += 1;
            let subscription = Subscription {
                state: Rc::new(SubscriptionState {
                    source: Rc::downgrade(&self.inner),
                    id,
                    cleared: Cell::new(false),
                    scope_link: RefCell::new(None),
                }),
            };
            inner.observers.push(ObserverEntry {
                id,
                callback: callback.clone(),
                subscription: subscription.clone(),
            });
            subscription
        };

        if options.emit_current_value {
            let value = self.get_value();
            callback(&value, &subscription);
        }

        if self.is_finished() || subscription.is_cleared() {
            subscription.stop();
            return subscription;
        }

        if let Some(scope) = options.clear_scope {
            let to_stop = subscription.clone();
            if let Some(cleanup) = scope.register(move || to_stop.stop()) {
                *subscription.state.scope_link.borrow_mut() = Some((scope.clone(), cleanup));
            }
        }
        subscription
    }

    /// Marks this value as finished and removes all observers.
    pub fn finish(&self) {
        let (observers, scope_link) = {
            let mut inner = self.inner.borrow_mut();
            if inner.finished {
                return;
            }
            inner.finished = true;
            let observers = std::mem::take(&mut inner.observers);
            (observers, inner.scope_link.take())
        };

        for entry in observers.iter() {
            entry.subscription.stop();
        }
        if let Some((scope, cleanup)) = scope_link {
            scope.deregister(cleanup);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.inner.borrow().finished
    }
}

impl<U: Clone + 'static> SharedValue<Option<U>> {
    /// Calls `callback` once with the inner value, as soon as it is `Some`.
    pub fn wait_until_defined<F>(&self, callback: F, clear_scope: Option<&CancellationScope>)
    where
        F: FnOnce(U) + 'static,
    {
        let callback = RefCell::new(Some(callback));
        let options = ObserveOptions {
            emit_current_value: true,
            clear_scope,
        };
        self.on_update(
            move |value, subscription| {
                if let Some(value) = value {
                    subscription.stop();
                    if let Some(callback) = callback.borrow_mut().take() {
                        callback(value.clone());
                    }
                }
            },
            options,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observers_receive_updates() {
        let value = SharedValue::new(1);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        value.on_update(
            move |v, _| sink.borrow_mut().push(*v),
            ObserveOptions::default().emit_current_value(),
        );

        value.set_value(2);
        value.set_value(3);
        assert_eq!(*seen.borrow(), vec![1, 2, 3]);
    }

    #[test]
    fn test_set_value_if_changed() {
        let value = SharedValue::new(1);
        let count = Rc::new(Cell::new(0));
        let counter = count.clone();
        value.on_update(move |_, _| counter.set(counter.get() + 1), Default::default());

        value.set_value_if_changed(1);
        value.set_value_if_changed(2);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_stop_from_inside_observer() {
        let value = SharedValue::new(0);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        value.on_update(
            move |v, subscription| {
                sink.borrow_mut().push(*v);
                if *v == 2 {
                    subscription.stop();
                }
            },
            Default::default(),
        );

        value.set_value(1);
        value.set_value(2);
        value.set_value(3);
        assert_eq!(*seen.borrow(), vec![1, 2]);
    }

    #[test]
    fn test_observer_added_during_notification_waits_for_next_update() {
        let value = SharedValue::new(0);
        let late = Rc::new(RefCell::new(Vec::new()));

        let handle = value.clone();
        let sink = late.clone();
        let subscribed = Cell::new(false);
        value.on_update(
            move |_, _| {
                if !subscribed.replace(true) {
                    let sink = sink.clone();
                    handle.on_update(move |v, _| sink.borrow_mut().push(*v), Default::default());
                }
            },
            Default::default(),
        );

        value.set_value(1);
        assert!(late.borrow().is_empty());
        value.set_value(2);
        assert_eq!(*late.borrow(), vec![2]);
    }

    #[test]
    fn test_clear_scope_deregisters() {
        let value = SharedValue::new(0);
        let scope = CancellationScope::new();
        let count = Rc::new(Cell::new(0));
        let counter = count.clone();
        value.on_update(
            move |_, _| counter.set(counter.get() + 1),
            ObserveOptions::default().clear_on(&scope),
        );

        value.set_value(1);
        scope.cancel();
        value.set_value(2);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_finished_by_scope() {
        let scope = CancellationScope::new();
        let value = SharedValue::new_with_scope(0, &scope);
        scope.cancel();

        assert!(value.is_finished());
        value.set_value(5);
        assert_eq!(value.get_value(), 0);
    }

    #[test]
    fn test_wait_until_defined() {
        let value: SharedValue<Option<u32>> = SharedValue::new(None);
        let seen = Rc::new(RefCell::new(Vec::new()));
        for tag in ["first", "second"] {
            let sink = seen.clone();
            value.wait_until_defined(move |v| sink.borrow_mut().push((tag, v)), None);
        }

        value.set_value(None);
        value.set_value(Some(7));
        value.set_value(Some(8));
        assert_eq!(*seen.borrow(), vec![("first", 7), ("second", 7)]);
    }

    #[test]
    fn test_wait_until_defined_when_already_defined() {
        let value = SharedValue::new(Some(3));
        let seen = Rc::new(Cell::new(0));
        let sink = seen.clone();
        value.wait_until_defined(move |v| sink.set(v), None);
        assert_eq!(seen.get(), 3);
    }
}
