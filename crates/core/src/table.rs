//! Open-addressed hash table keyed by interned-string identity.
//!
//! Linear probing with tombstones: deleting an entry marks it rather than
//! clearing it, so a probe chain that passes through a deleted slot keeps
//! going instead of stopping early and missing a live entry placed further
//! along the chain. The cost is that `count` (and therefore the load
//! factor) includes tombstones. A rehash is the only thing that reclaims
//! them.

use crate::object::ObjString;
use crate::value::Value;
use std::rc::Rc;

const TABLE_MAX_LOAD: f64 = 0.75;

#[derive(Clone)]
enum Slot {
    Empty,
    Tombstone,
    Live(Rc<ObjString>, Value),
}

/// Map from interned string handles to values, used for both the VM's
/// `globals` table and the interner's own content-addressed pool.
#[derive(Default)]
pub struct Table {
    count: usize,
    entries: Vec<Slot>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live entries plus tombstones, for load-factor accounting, not the
    /// number of keys you could actually `get` back.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn capacity(&self) -> usize {
        self.entries.len()
    }

    fn find_index(entries: &[Slot], capacity: usize, key: &Rc<ObjString>) -> usize {
        let mut index = (key.hash as usize) % capacity;
        let mut tombstone: Option<usize> = None;
        loop {
            match &entries[index] {
                Slot::Empty => return tombstone.unwrap_or(index),
                Slot::Tombstone => {
                    if tombstone.is_none() {
                        tombstone = Some(index);
                    }
                }
                Slot::Live(existing, _) => {
                    if Rc::ptr_eq(existing, key) {
                        return index;
                    }
                }
            }
            index = (index + 1) % capacity;
        }
    }

    fn grow_capacity(capacity: usize) -> usize {
        if capacity < 8 { 8 } else { capacity * 2 }
    }

    fn adjust_capacity(&mut self, capacity: usize) {
        let mut new_entries: Vec<Slot> = (0..capacity).map(|_| Slot::Empty).collect();
        let mut live = 0usize;
        for slot in self.entries.drain(..) {
            if let Slot::Live(key, value) = slot {
                let idx = Self::find_index(&new_entries, capacity, &key);
                new_entries[idx] = Slot::Live(key, value);
                live += 1;
            }
        }
        self.entries = new_entries;
        self.count = live;
    }

    /// Inserts or overwrites `key`. Returns `true` if the slot was empty
    /// or a tombstone beforehand, i.e. `key` was not already bound.
    pub fn set(&mut self, key: Rc<ObjString>, value: Value) -> bool {
        if (self.count + 1) as f64 > self.capacity() as f64 * TABLE_MAX_LOAD {
            let new_capacity = Self::grow_capacity(self.capacity());
            self.adjust_capacity(new_capacity);
        }
        let idx = Self::find_index(&self.entries, self.capacity(), &key);
        let is_new = !matches!(self.entries[idx], Slot::Live(_, _));
        if is_new {
            self.count += 1;
        }
        self.entries[idx] = Slot::Live(key, value);
        is_new
    }

    pub fn get(&self, key: &Rc<ObjString>) -> Option<&Value> {
        if self.count == 0 {
            return None;
        }
        let idx = Self::find_index(&self.entries, self.capacity(), key);
        match &self.entries[idx] {
            Slot::Live(_, value) => Some(value),
            _ => None,
        }
    }

    /// Marks `key`'s slot as a tombstone. `count` is deliberately left
    /// unchanged, see the module doc.
    pub fn delete(&mut self, key: &Rc<ObjString>) -> bool {
        if self.count == 0 {
            return false;
        }
        let idx = Self::find_index(&self.entries, self.capacity(), key);
        if matches!(self.entries[idx], Slot::Live(_, _)) {
            self.entries[idx] = Slot::Tombstone;
            true
        } else {
            false
        }
    }

    /// Content-based probe (length, hash, then bytes) rather than
    /// identity, the one place this table is searched by value instead
    /// of by handle, used solely to canonicalize a freshly scanned string
    /// literal against anything already interned.
    pub fn find_string(&self, text: &str, hash: u32) -> Option<Rc<ObjString>> {
        if self.count == 0 {
            return None;
        }
        let capacity = self.capacity();
        let mut index = (hash as usize) % capacity;
        loop {
            match &self.entries[index] {
                Slot::Empty => return None,
                Slot::Tombstone => {}
                Slot::Live(key, _) => {
                    if key.hash == hash && key.as_str() == text {
                        return Some(Rc::clone(key));
                    }
                }
            }
            index = (index + 1) % capacity;
        }
    }

    pub fn add_all(&mut self, other: &Table) {
        for slot in &other.entries {
            if let Slot::Live(key, value) = slot {
                self.set(Rc::clone(key), value.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(bytes: &str, hash: u32) -> Rc<ObjString> {
        Rc::new(ObjString { bytes: bytes.into(), hash })
    }

    #[test]
    fn set_then_get_round_trips() {
        let mut table = Table::new();
        let k = key("x", 1);
        assert!(table.set(Rc::clone(&k), Value::Number(42.0)));
        assert_eq!(table.get(&k), Some(&Value::Number(42.0)));
    }

    #[test]
    fn second_set_on_same_key_is_not_new() {
        let mut table = Table::new();
        let k = key("x", 1);
        assert!(table.set(Rc::clone(&k), Value::Number(1.0)));
        assert!(!table.set(Rc::clone(&k), Value::Number(2.0)));
        assert_eq!(table.get(&k), Some(&Value::Number(2.0)));
    }

    #[test]
    fn delete_then_get_is_none_but_other_keys_survive() {
        let mut table = Table::new();
        let a = key("a", 1);
        let b = key("b", 2);
        table.set(Rc::clone(&a), Value::Number(1.0));
        table.set(Rc::clone(&b), Value::Number(2.0));

        assert!(table.delete(&a));
        assert_eq!(table.get(&a), None);
        assert_eq!(table.get(&b), Some(&Value::Number(2.0)));
        assert!(!table.delete(&a));
    }

    #[test]
    fn tombstone_does_not_break_probe_chain() {
        // Force two keys into the same 8-slot bucket, delete the first,
        // then confirm the second (further along the probe chain) is
        // still reachable through the tombstone.
        let mut table = Table::new();
        let a = key("a", 0);
        let b = key("b", 0);
        table.set(Rc::clone(&a), Value::Number(1.0));
        table.set(Rc::clone(&b), Value::Number(2.0));

        assert!(table.delete(&a));
        assert_eq!(table.get(&b), Some(&Value::Number(2.0)));
    }

    #[test]
    fn find_string_matches_by_content_not_identity() {
        let mut table = Table::new();
        let stored = key("hello", 99);
        table.set(Rc::clone(&stored), Value::Nil);

        let probe_only = key("hello", 99);
        let found = table.find_string(probe_only.as_str(), 99).expect("should find by content");
        assert!(Rc::ptr_eq(&found, &stored));
    }

    #[test]
    fn survives_growth_past_load_factor() {
        let mut table = Table::new();
        let handles: Vec<Rc<ObjString>> = (0..100u32).map(|i| key(&i.to_string(), i)).collect();
        for (i, handle) in handles.iter().enumerate() {
            table.set(Rc::clone(handle), Value::Number(i as f64));
        }
        for (i, handle) in handles.iter().enumerate() {
            assert_eq!(table.get(handle), Some(&Value::Number(i as f64)));
        }
    }
}
