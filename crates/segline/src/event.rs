use std::{cell::RefCell, rc::Rc};

type Listener<E> = Rc<dyn Fn(&E)>;

/// Identifies a listener added with [`EventEmitter::add_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(u64);

struct Listeners<E> {
    entries: Vec<(ListenerId, Listener<E>)>,
    next_id: u64,
}

/// Synchronous, single-threaded event dispatch.
pub struct EventEmitter<E> {
    listeners: Rc<RefCell<Listeners<E>>>,
}

impl<E> Clone for EventEmitter<E> {
    fn clone(&self) -> Self {
        Self {
            listeners: self.listeners.clone(),
        }
    }
}

impl<E> Default for EventEmitter<E> {
    fn default() -> Self {
        Self {
            listeners: Rc::new(RefCell::new(Listeners {
                entries: Vec::new(),
                next_id: 0,
            })),
        }
    }
}

impl<E> EventEmitter<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&E) + 'static,
    {
        let mut listeners = self.listeners.borrow_mut();
        let id = ListenerId(listeners.next_id);
        listeners.next_id += 1;
        listeners.entries.push((id, Rc::new(listener)));
        id
    }

    pub fn remove_listener(&self, id: ListenerId) {
        let removed = {
            let mut listeners = self.listeners.borrow_mut();
            let Some(position) = listeners.entries.iter().position(|(other, _)| *other == id)
            else {
                return;
            };
            listeners.entries.remove(position)
        };
        drop(removed);
    }

    /// Calls every listener registered at the time of the call.
    ///
    /// A listener removed by an earlier listener of the same emission is
    /// skipped.
    pub fn emit(&self, event: &E) {
        let snapshot: Vec<_> = self.listeners.borrow().entries.clone();
        for (id, listener) in snapshot {
            let still_registered = self
                .listeners
                .borrow()
                .entries
                .iter()
                .any(|(other, _)| *other == id);
            if still_registered {
                listener(event);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_emit_to_all_listeners() {
        let emitter = EventEmitter::<u32>::new();
        let sum = Rc::new(Cell::new(0));
        for _ in 0..3 {
            let sum = sum.clone();
            emitter.add_listener(move |v| sum.set(sum.get() + v));
        }

        emitter.emit(&2);
        assert_eq!(sum.get(), 6);
    }

    #[test]
    fn test_listener_removed_mid_emission_is_skipped() {
        let emitter = EventEmitter::<()>::new();
        let called = Rc::new(Cell::new(false));

        let handle = emitter.clone();
        let second = Rc::new(Cell::new(None));
        let to_remove = second.clone();
        emitter.add_listener(move |_| {
            if let Some(id) = to_remove.get() {
                handle.remove_listener(id);
            }
        });
        let flag = called.clone();
        second.set(Some(emitter.add_listener(move |_| flag.set(true))));

        emitter.emit(&());
        assert!(!called.get());
    }

    #[test]
    fn test_listener_added_mid_emission_waits() {
        let emitter = EventEmitter::<()>::new();
        let count = Rc::new(Cell::new(0));

        let handle = emitter.clone();
        let counter = count.clone();
        let added = Cell::new(false);
        emitter.add_listener(move |_| {
            if !added.replace(true) {
                let counter = counter.clone();
                handle.add_listener(move |_| counter.set(counter.get() + 1));
            }
        });

        emitter.emit(&());
        assert_eq!(count.get(), 0);
        emitter.emit(&());
        assert_eq!(count.get(), 1);
    }
}
