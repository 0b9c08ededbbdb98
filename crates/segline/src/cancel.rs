//! Hierarchical cancellation.
//!
//! Every [`CancellationScope`] is a handle on a node of an arena shared by the
//! whole tree. A node keeps an ordered list of entries: cleanup closures
//! registered on it and the keys of child scopes derived from it. Cancelling a
//! node walks that list once, in registration order, running cleanups and
//! cancelling children as they come.
//!
//! Keys are generational: once a node is cancelled (or released) its slot may
//! be reused, and handles still pointing at the old generation keep reporting
//! the scope as cancelled.

use std::{cell::RefCell, fmt, rc::Rc};

type Cleanup = Box<dyn FnOnce()>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ScopeKey {
    index: usize,
    generation: u64,
}

/// Identifies a cleanup registered on a scope, used to deregister it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CleanupId(u64);

enum ScopeEntry {
    Cleanup(CleanupId, Cleanup),
    Child(ScopeKey),
}

struct ScopeNode {
    parent: Option<ScopeKey>,
    entries: Vec<ScopeEntry>,
}

struct Slot {
    generation: u64,
    node: Option<ScopeNode>,
}

#[derive(Default)]
struct ScopeArena {
    slots: Vec<Slot>,
    free: Vec<usize>,
    next_cleanup: u64,
}

impl ScopeArena {
    fn insert(&mut self, parent: Option<ScopeKey>) -> ScopeKey {
        let node = ScopeNode {
            parent,
            entries: Vec::new(),
        };
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index];
                slot.node = Some(node);
                ScopeKey {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                ScopeKey {
                    index: self.slots.len() - 1,
                    generation: 0,
                }
            }
        }
    }

    fn get_mut(&mut self, key: ScopeKey) -> Option<&mut ScopeNode> {
        self.slots
            .get_mut(key.index)
            .filter(|slot| slot.generation == key.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    fn contains(&self, key: ScopeKey) -> bool {
        self.slots
            .get(key.index)
            .is_some_and(|slot| slot.generation == key.generation && slot.node.is_some())
    }

    /// Removes a node and unlinks it from its parent.
    fn remove(&mut self, key: ScopeKey) -> Option<ScopeNode> {
        let slot = self
            .slots
            .get_mut(key.index)
            .filter(|slot| slot.generation == key.generation)?;
        let node = slot.node.take()?;
        slot.generation += 1;
        self.free.push(key.index);

        if let Some(parent) = node.parent.and_then(|parent| self.get_mut(parent)) {
            parent
                .entries
                .retain(|entry| !matches!(entry, ScopeEntry::Child(child) if *child == key));
        }
        Some(node)
    }
}

/// A node of a cancellation tree.
///
/// Handles are cheap to clone and all clones designate the same scope.
#[derive(Clone)]
pub struct CancellationScope {
    arena: Rc<RefCell<ScopeArena>>,
    key: ScopeKey,
}

impl CancellationScope {
    /// Creates the root of a new cancellation tree.
    pub fn new() -> Self {
        let mut arena = ScopeArena::default();
        let key = arena.insert(None);
        Self {
            arena: Rc::new(RefCell::new(arena)),
            key,
        }
    }

    /// Derives a child scope, cancelled automatically when `self` is.
    ///
    /// Deriving from an already cancelled scope returns a cancelled child.
    pub fn child(&self) -> Self {
        let key = {
            let mut arena = self.arena.borrow_mut();
            if arena.contains(self.key) {
                let key = arena.insert(Some(self.key));
                if let Some(parent) = arena.get_mut(self.key) {
                    parent.entries.push(ScopeEntry::Child(key));
                }
                key
            } else {
                let key = arena.insert(None);
                arena.remove(key);
                key
            }
        };

        Self {
            arena: self.arena.clone(),
            key,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        !self.arena.borrow().contains(self.key)
    }

    /// Registers a cleanup to run when this scope is cancelled.
    ///
    /// If the scope is already cancelled, the cleanup runs immediately and
    /// `None` is returned.
    pub fn register<F>(&self, cleanup: F) -> Option<CleanupId>
    where
        F: FnOnce() + 'static,
    {
        let registered = {
            let mut arena = self.arena.borrow_mut();
            let id = CleanupId(arena.next_cleanup);
            match arena.get_mut(self.key) {
                Some(node) => {
                    node.entries.push(ScopeEntry::Cleanup(id, Box::new(cleanup)));
                    arena.next_cleanup += 1;
                    Ok(id)
                }
                None => Err(cleanup),
            }
        };

        match registered {
            Ok(id) => Some(id),
            Err(cleanup) => {
                cleanup();
                None
            }
        }
    }

    /// Removes a pending cleanup. Does nothing if it already ran.
    pub fn deregister(&self, id: CleanupId) {
        // The dropped closure may own handles on this arena, drop it outside
        // of the borrow.
        let removed = {
            let mut arena = self.arena.borrow_mut();
            let Some(node) = arena.get_mut(self.key) else {
                return;
            };
            let Some(position) = node
                .entries
                .iter()
                .position(|entry| matches!(entry, ScopeEntry::Cleanup(cleanup, _) if *cleanup == id))
            else {
                return;
            };
            node.entries.remove(position)
        };
        drop(removed);
    }

    /// Cancels this scope and every scope derived from it.
    ///
    /// Cleanups run exactly once, in registration order. Calling this again,
    /// including from inside one of the cleanups, is a no-op.
    pub fn cancel(&self) {
        let Some(node) = self.arena.borrow_mut().remove(self.key) else {
            return;
        };
        tracing::trace!(scope = ?self.key, entries = node.entries.len(), "Cancelling scope");

        for entry in node.entries {
            match entry {
                ScopeEntry::Cleanup(_, cleanup) => cleanup(),
                ScopeEntry::Child(key) => Self {
                    arena: self.arena.clone(),
                    key,
                }
                .cancel(),
            }
        }
    }

    /// Frees this scope without running its cleanups.
    ///
    /// Used once the work a scope guarded has finished on its own. Child
    /// scopes are cancelled. The scope reports itself as cancelled afterwards.
    pub fn release(&self) {
        let Some(node) = self.arena.borrow_mut().remove(self.key) else {
            return;
        };

        for entry in node.entries {
            if let ScopeEntry::Child(key) = entry {
                Self {
                    arena: self.arena.clone(),
                    key,
                }
                .cancel();
            }
        }
    }
}

impl Default for CancellationScope {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancellationScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationScope")
            .field("index", &self.key.index)
            .field("generation", &self.key.generation)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl PartialEq for CancellationScope {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.arena, &other.arena) && self.key == other.key
    }
}
