//! Keyed Linked List
//!
//! A doubly linked list that is also a hash map: every entry is addressable
//! by its key, so removal from the middle of the list is O(1). The recompute
//! heap uses one of these per height bucket, which is what makes "remove this
//! node from wherever it is queued" constant-time.
//!
//! # Implementation
//!
//! Entries live in a slab (`Vec<Option<Slot>>`) and link to one another by
//! slab index; freed slots are recycled through a free list. A `HashMap`
//! keyed by `K` points at the slab slot holding each key. No entry is ever
//! moved once inserted, so indices stay valid until removal.

use std::collections::HashMap;
use std::hash::Hash;

struct Slot<K, V> {
    key: K,
    value: V,
    prev: Option<usize>,
    next: Option<usize>,
}

/// An insertion-ordered list with O(1) removal and lookup by key.
///
/// At most one entry per key: pushing an existing key replaces its value
/// without changing its position.
pub struct KeyedList<K, V> {
    slots: Vec<Option<Slot<K, V>>>,
    free: Vec<usize>,
    index: HashMap<K, usize>,
    head: Option<usize>,
    tail: Option<usize>,
}

impl<K, V> KeyedList<K, V>
where
    K: Copy + Eq + Hash,
{
    /// Create an empty list.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            index: HashMap::new(),
            head: None,
            tail: None,
        }
    }

    /// Number of entries in the list.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// True if the list holds no entries.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// True if the key is present.
    pub fn contains(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    /// Get the value stored under a key.
    pub fn get(&self, key: &K) -> Option<&V> {
        let slot = *self.index.get(key)?;
        self.slots[slot].as_ref().map(|s| &s.value)
    }

    /// Append an entry. If the key is already present its value is replaced
    /// in place and its list position is unchanged.
    pub fn push_back(&mut self, key: K, value: V) {
        if let Some(&slot) = self.index.get(&key) {
            if let Some(s) = self.slots[slot].as_mut() {
                s.value = value;
            }
            return;
        }

        let slot = match self.free.pop() {
            Some(slot) => slot,
            None => {
                self.slots.push(None);
                self.slots.len() - 1
            }
        };
        self.slots[slot] = Some(Slot {
            key,
            value,
            prev: self.tail,
            next: None,
        });

        if let Some(tail) = self.tail {
            if let Some(t) = self.slots[tail].as_mut() {
                t.next = Some(slot);
            }
        } else {
            self.head = Some(slot);
        }
        self.tail = Some(slot);
        self.index.insert(key, slot);
    }

    /// Remove an entry by key, returning its value.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let slot = self.index.remove(key)?;
        let entry = self.slots[slot].take()?;
        self.unlink(slot, entry.prev, entry.next);
        self.free.push(slot);
        Some(entry.value)
    }

    /// Remove and return the oldest entry.
    pub fn pop_front(&mut self) -> Option<(K, V)> {
        let slot = self.head?;
        let entry = self.slots[slot].take()?;
        self.index.remove(&entry.key);
        self.unlink(slot, entry.prev, entry.next);
        self.free.push(slot);
        Some((entry.key, entry.value))
    }

    /// Remove every entry, returning the keys in insertion order.
    pub fn drain_keys(&mut self) -> Vec<K> {
        let mut keys = Vec::with_capacity(self.len());
        while let Some((key, _)) = self.pop_front() {
            keys.push(key);
        }
        keys
    }

    /// Iterate keys in insertion order.
    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys {
            list: self,
            cursor: self.head,
        }
    }

    fn unlink(&mut self, _slot: usize, prev: Option<usize>, next: Option<usize>) {
        match prev {
            Some(p) => {
                if let Some(s) = self.slots[p].as_mut() {
                    s.next = next;
                }
            }
            None => self.head = next,
        }
        match next {
            Some(n) => {
                if let Some(s) = self.slots[n].as_mut() {
                    s.prev = prev;
                }
            }
            None => self.tail = prev,
        }
    }
}

impl<K, V> Default for KeyedList<K, V>
where
    K: Copy + Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over keys in insertion order.
pub struct Keys<'a, K, V> {
    list: &'a KeyedList<K, V>,
    cursor: Option<usize>,
}

impl<K, V> Iterator for Keys<'_, K, V>
where
    K: Copy + Eq + Hash,
{
    type Item = K;

    fn next(&mut self) -> Option<K> {
        let slot = self.cursor?;
        let entry = self.list.slots[slot].as_ref()?;
        self.cursor = entry.next;
        Some(entry.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_and_remove_by_key() {
        let mut list: KeyedList<u32, &str> = KeyedList::new();
        list.push_back(1, "a");
        list.push_back(2, "b");
        list.push_back(3, "c");

        assert_eq!(list.len(), 3);
        assert!(list.contains(&2));
        assert_eq!(list.remove(&2), Some("b"));
        assert!(!list.contains(&2));
        assert_eq!(list.len(), 2);

        // Order preserved around the removal.
        assert_eq!(list.keys().collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn push_existing_key_keeps_position() {
        let mut list: KeyedList<u32, &str> = KeyedList::new();
        list.push_back(1, "a");
        list.push_back(2, "b");
        list.push_back(1, "a2");

        assert_eq!(list.len(), 2);
        assert_eq!(list.get(&1), Some(&"a2"));
        assert_eq!(list.keys().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn pop_front_is_fifo() {
        let mut list: KeyedList<u32, u32> = KeyedList::new();
        for i in 0..5 {
            list.push_back(i, i * 10);
        }
        assert_eq!(list.pop_front(), Some((0, 0)));
        assert_eq!(list.pop_front(), Some((1, 10)));
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn drain_returns_all_keys_in_order() {
        let mut list: KeyedList<u32, ()> = KeyedList::new();
        for i in [5, 3, 9, 1] {
            list.push_back(i, ());
        }
        assert_eq!(list.drain_keys(), vec![5, 3, 9, 1]);
        assert!(list.is_empty());
    }

    #[test]
    fn slots_are_recycled() {
        let mut list: KeyedList<u32, ()> = KeyedList::new();
        for i in 0..100 {
            list.push_back(i, ());
            list.remove(&i);
        }
        // Every insert reuses the single freed slot.
        assert!(list.slots.len() <= 1);
    }

    #[test]
    fn remove_head_and_tail() {
        let mut list: KeyedList<u32, ()> = KeyedList::new();
        list.push_back(1, ());
        list.push_back(2, ());
        list.push_back(3, ());

        list.remove(&1);
        list.remove(&3);
        assert_eq!(list.keys().collect::<Vec<_>>(), vec![2]);

        list.push_back(4, ());
        assert_eq!(list.keys().collect::<Vec<_>>(), vec![2, 4]);
    }
}
