use std::fmt;
use std::sync::OnceLock;

use crate::identity::ObjectId;

/// An entity with a network-wide identifier.
pub trait Identifiable {
    /// The entity's identifier, assigning one on first access if needed.
    fn id(&self) -> ObjectId;
}

/// Identifier slot populated at most once, on first access.
///
/// No identifier is generated until [`LazyId::get`] is called, so entities
/// that are never asked for their identity never consume one. Concurrent
/// first access from several threads generates exactly once: every caller
/// observes the same cached value.
#[derive(Default)]
pub struct LazyId {
    cell: OnceLock<ObjectId>,
}

impl LazyId {
    /// An empty slot.
    pub const fn new() -> Self {
        Self {
            cell: OnceLock::new(),
        }
    }

    /// A slot that already holds `id` (e.g. an entity received from a peer).
    pub fn assigned(id: ObjectId) -> Self {
        let cell = OnceLock::new();
        let _ = cell.set(id);
        Self { cell }
    }

    /// The identifier, generating and caching it on first call.
    pub fn get(&self) -> ObjectId {
        *self.cell.get_or_init(ObjectId::generate)
    }

    /// The identifier if one has been assigned, without assigning one.
    pub fn peek(&self) -> Option<ObjectId> {
        self.cell.get().copied()
    }

    /// Returns `true` once an identifier has been assigned.
    pub fn is_assigned(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl Clone for LazyId {
    fn clone(&self) -> Self {
        match self.peek() {
            Some(id) => Self::assigned(id),
            None => Self::new(),
        }
    }
}

impl fmt::Debug for LazyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.peek() {
            Some(id) => write!(f, "LazyId({id})"),
            None => write!(f, "LazyId(<unassigned>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn unassigned_until_first_access() {
        let lazy = LazyId::new();
        assert!(!lazy.is_assigned());
        assert!(lazy.peek().is_none());

        let id = lazy.get();
        assert!(lazy.is_assigned());
        assert_eq!(lazy.peek(), Some(id));
    }

    #[test]
    fn repeated_access_returns_same_id() {
        let lazy = LazyId::new();
        let first = lazy.get();
        let second = lazy.get();
        assert_eq!(first, second);
    }

    #[test]
    fn assigned_slot_keeps_given_id() {
        let id = ObjectId::generate();
        let lazy = LazyId::assigned(id);
        assert_eq!(lazy.peek(), Some(id));
        assert_eq!(lazy.get(), id);
    }

    #[test]
    fn clone_of_unassigned_stays_unassigned() {
        let lazy = LazyId::new();
        let copy = lazy.clone();
        assert!(!copy.is_assigned());
        lazy.get();
        assert!(!copy.is_assigned());
    }

    #[test]
    fn concurrent_first_access_generates_once() {
        let lazy = Arc::new(LazyId::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let lazy = Arc::clone(&lazy);
                thread::spawn(move || lazy.get())
            })
            .collect();

        let ids: Vec<ObjectId> = handles
            .into_iter()
            .map(|h| h.join().expect("thread should not panic"))
            .collect();
        assert!(ids.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn debug_format() {
        let lazy = LazyId::new();
        assert_eq!(format!("{lazy:?}"), "LazyId(<unassigned>)");
        let id = lazy.get();
        assert_eq!(format!("{lazy:?}"), format!("LazyId({id})"));
    }
}
