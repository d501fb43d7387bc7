use std::collections::{HashMap, VecDeque};

use crate::notification::Notification;

/// How many sent notifications an app remembers for error attribution.
pub const RING_CAPACITY: usize = 10_000;

/// Wrapping 16-bit identifier sequence.
///
/// The identifier field of the enhanced frame is a ushort, so the sequence
/// runs 1..=0xFFFF and then wraps to 0. A collision with a live ring entry
/// would need more than 65 536 remembered notifications; the ring holds
/// 10 000, so allocation never collides.
#[derive(Debug, Default)]
pub struct IdentSequence {
    counter: u16,
}

impl IdentSequence {
    pub fn next(&mut self) -> u16 {
        self.counter = self.counter.wrapping_add(1);
        self.counter
    }
}

#[derive(Debug)]
struct Remembered {
    internal: u16,
    notification: Notification,
}

/// Bounded FIFO memory of recently sent notifications.
///
/// Three views share identical membership: external identifier to
/// notification, insertion order for eviction, and the internal identifier
/// index used to attribute error responses. Re-inserting a known external
/// identifier reuses its internal identifier and leaves eviction order
/// untouched.
#[derive(Debug)]
pub struct RecentNotifications {
    capacity: usize,
    order: VecDeque<String>,
    by_external: HashMap<String, Remembered>,
    by_internal: HashMap<u16, String>,
    sequence: IdentSequence,
}

impl Default for RecentNotifications {
    fn default() -> Self {
        Self::with_capacity(RING_CAPACITY)
    }
}

impl RecentNotifications {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            order: VecDeque::new(),
            by_external: HashMap::new(),
            by_internal: HashMap::new(),
            sequence: IdentSequence::default(),
        }
    }

    /// Remembers a notification and returns its internal identifier.
    pub fn insert(&mut self, notification: &Notification) -> u16 {
        if let Some(existing) = self.by_external.get(&notification.identifier) {
            return existing.internal;
        }

        if self.order.len() >= self.capacity {
            self.evict_oldest();
        }

        let internal = self.sequence.next();
        debug_assert!(
            !self.by_internal.contains_key(&internal),
            "internal identifier {internal} still live in the ring"
        );

        self.order.push_back(notification.identifier.clone());
        self.by_internal
            .insert(internal, notification.identifier.clone());
        self.by_external.insert(
            notification.identifier.clone(),
            Remembered {
                internal,
                notification: notification.clone(),
            },
        );

        internal
    }

    /// Resolves the internal identifier reported by an error response.
    pub fn lookup(&self, internal: u16) -> Option<&Notification> {
        let external = self.by_internal.get(&internal)?;
        self.by_external
            .get(external)
            .map(|remembered| &remembered.notification)
    }

    pub fn contains(&self, external: &str) -> bool {
        self.by_external.contains_key(external)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    fn evict_oldest(&mut self) {
        let Some(external) = self.order.pop_front() else {
            return;
        };
        if let Some(removed) = self.by_external.remove(&external) {
            self.by_internal.remove(&removed.internal);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn note(identifier: &str) -> Notification {
        Notification {
            token: "ab".repeat(32).parse().unwrap(),
            payload: json!({"aps": {"alert": "hi"}}),
            expiry: 0,
            identifier: identifier.into(),
        }
    }

    #[test]
    fn sequence_starts_at_one_and_wraps_to_zero() {
        let mut sequence = IdentSequence::default();
        assert_eq!(sequence.next(), 1);
        assert_eq!(sequence.next(), 2);

        let mut sequence = IdentSequence { counter: 0xFFFE };
        assert_eq!(sequence.next(), 0xFFFF);
        assert_eq!(sequence.next(), 0);
        assert_eq!(sequence.next(), 1);
    }

    #[test]
    fn assigns_sequential_internal_identifiers() {
        let mut ring = RecentNotifications::default();
        assert_eq!(ring.insert(&note("a")), 1);
        assert_eq!(ring.insert(&note("b")), 2);
        assert_eq!(ring.insert(&note("c")), 3);
        assert_eq!(ring.lookup(2).map(|n| n.identifier.as_str()), Some("b"));
        assert_eq!(ring.lookup(4), None);
    }

    #[test]
    fn reinsert_reuses_identifier_and_order() {
        let mut ring = RecentNotifications::with_capacity(2);
        assert_eq!(ring.insert(&note("a")), 1);
        assert_eq!(ring.insert(&note("b")), 2);

        // Re-inserting "a" neither grows the ring nor refreshes its slot.
        assert_eq!(ring.insert(&note("a")), 1);
        assert_eq!(ring.len(), 2);

        // "a" is still the oldest, so the next fresh insert evicts it.
        assert_eq!(ring.insert(&note("c")), 3);
        assert!(!ring.contains("a"));
        assert!(ring.contains("b"));
        assert!(ring.contains("c"));
    }

    #[test]
    fn full_ring_evicts_the_first_insert() {
        let mut ring = RecentNotifications::default();
        for i in 0..=RING_CAPACITY {
            ring.insert(&note(&format!("n{i}")));
        }

        assert_eq!(ring.len(), RING_CAPACITY);
        assert!(!ring.contains("n0"));
        assert_eq!(ring.lookup(1), None);
    }

    #[test]
    fn eviction_removes_from_every_index() {
        let capacity = 100;
        let mut ring = RecentNotifications::with_capacity(capacity);
        for i in 0..=capacity {
            ring.insert(&note(&format!("n{i}")));
        }

        assert_eq!(ring.len(), capacity);
        assert!(!ring.contains("n0"));
        assert_eq!(ring.lookup(1), None);
        assert!(ring.contains(&format!("n{capacity}")));
    }

    proptest! {
        // Inserts a mix of fresh and repeated identifiers and checks the
        // three views stay consistent and bounded.
        #[test]
        fn views_share_membership(identifiers in proptest::collection::vec(0u32..50, 0..200)) {
            let capacity = 16;
            let mut ring = RecentNotifications::with_capacity(capacity);
            for identifier in identifiers {
                ring.insert(&note(&identifier.to_string()));
            }

            prop_assert!(ring.len() <= capacity);
            prop_assert_eq!(ring.order.len(), ring.by_external.len());
            prop_assert_eq!(ring.by_internal.len(), ring.by_external.len());
            for (internal, external) in &ring.by_internal {
                let remembered = &ring.by_external[external];
                prop_assert_eq!(remembered.internal, *internal);
            }
            for external in &ring.order {
                prop_assert!(ring.by_external.contains_key(external));
            }
        }

        #[test]
        fn internal_identifiers_unique_within_ring(count in 1usize..300) {
            let mut ring = RecentNotifications::with_capacity(64);
            for i in 0..count {
                ring.insert(&note(&format!("n{i}")));
            }

            let mut seen = std::collections::HashSet::new();
            for internal in ring.by_internal.keys() {
                prop_assert!(seen.insert(*internal));
            }
        }
    }
}
