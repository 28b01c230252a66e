//! Maps from recorded handles to replay-side objects.
//!
//! The recorded process identified its contexts and drawables by pointer
//! values and XIDs that mean nothing to us. A `HandleMap` owns the objects we
//! create to stand in for them, in a slot arena, and indexes the arena by the
//! recorded identifier. Everything else in the replayer refers to objects by
//! arena key, so "is this the same object?" is a key comparison, and a key
//! whose object has been removed never compares equal to a live one.

use slotmap::{Key, SlotMap};
use std::collections::HashMap;

slotmap::new_key_type! {
    /// A replay-side surface, owned by a `HandleRegistry`.
    pub struct SurfaceKey;

    /// A replay-side context, owned by a `HandleRegistry`.
    pub struct ContextKey;
}

/// An arena of `T` objects, indexed by recorded `u64` identifiers.
///
/// The identifier zero never maps to anything: recordings use it to mean "no
/// object".
pub struct HandleMap<K: Key, T> {
    objects: SlotMap<K, T>,
    by_id: HashMap<u64, K>,
}

impl<K: Key, T> HandleMap<K, T> {
    pub fn new() -> HandleMap<K, T> {
        HandleMap {
            objects: SlotMap::with_key(),
            by_id: HashMap::new(),
        }
    }

    /// Return the key for the object mapped to `id`, creating it with `create`
    /// if there isn't one yet. Also return true if the object was created by
    /// this call.
    ///
    /// If `id` is zero, return `Ok(None)` without calling `create`. If
    /// `create` fails, return its error and leave the map unchanged.
    pub fn get_or_create<E, F>(&mut self, id: u64, create: F) -> Result<Option<(K, bool)>, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        if id == 0 {
            return Ok(None);
        }
        if let Some(&key) = self.by_id.get(&id) {
            return Ok(Some((key, false)));
        }

        let key = self.objects.insert(create()?);
        self.by_id.insert(id, key);
        Ok(Some((key, true)))
    }

    /// Map `id` to `object`, and return its new key. If `id` was already
    /// mapped, the old object is removed and returned too.
    ///
    /// If `id` is zero, nothing is inserted; `object` is handed back.
    pub fn insert(&mut self, id: u64, object: T) -> Result<(K, Option<T>), T> {
        if id == 0 {
            return Err(object);
        }
        let old = self.remove(id);
        let key = self.objects.insert(object);
        self.by_id.insert(id, key);
        Ok((key, old))
    }

    /// Remove the object mapped to `id`, if any, and return it.
    pub fn remove(&mut self, id: u64) -> Option<T> {
        let key = self.by_id.remove(&id)?;
        self.objects.remove(key)
    }

    /// Return the key for `id`, if it's mapped.
    pub fn lookup(&self, id: u64) -> Option<K> {
        self.by_id.get(&id).copied()
    }

    pub fn get(&self, key: K) -> Option<&T> {
        self.objects.get(key)
    }

    pub fn contains_key(&self, key: K) -> bool {
        self.objects.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl<K: Key, T> Default for HandleMap<K, T> {
    fn default() -> HandleMap<K, T> {
        HandleMap::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn make(counter: &mut u32) -> Result<u32, ()> {
        *counter += 1;
        Ok(*counter)
    }

    #[test]
    fn zero_is_never_mapped() {
        let mut map: HandleMap<ContextKey, u32> = HandleMap::new();
        let mut made = 0;
        assert_eq!(map.get_or_create(0, || make(&mut made)), Ok(None));
        assert_eq!(made, 0);
        assert_eq!(map.insert(0, 17), Err(17));
        assert!(map.is_empty());
    }

    #[test]
    fn creation_failure_leaves_map_unchanged() {
        let mut map: HandleMap<ContextKey, u32> = HandleMap::new();
        assert_eq!(map.get_or_create(0xaaa, || Err("no")), Err("no"));
        assert!(map.is_empty());
        assert_eq!(map.lookup(0xaaa), None);
    }

    #[test]
    fn insert_replaces() {
        let mut map: HandleMap<ContextKey, u32> = HandleMap::new();
        let (first, old) = map.insert(0xaaa, 1).unwrap();
        assert_eq!(old, None);
        let (second, old) = map.insert(0xaaa, 2).unwrap();
        assert_eq!(old, Some(1));
        assert_ne!(first, second);
        assert!(!map.contains_key(first));
        assert_eq!(map.get(second), Some(&2));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn removed_keys_stay_dead() {
        let mut map: HandleMap<SurfaceKey, u32> = HandleMap::new();
        let mut made = 0;
        let (key, created) = map.get_or_create(5, || make(&mut made)).unwrap().unwrap();
        assert!(created);
        assert_eq!(map.remove(5), Some(1));
        assert_eq!(map.remove(5), None);
        assert_eq!(map.get(key), None);

        // The slot may be reused, but not under the old key.
        let (again, created) = map.get_or_create(5, || make(&mut made)).unwrap().unwrap();
        assert!(created);
        assert_ne!(key, again);
    }

    proptest! {
        #[test]
        fn get_or_create_is_idempotent(ids in prop::collection::vec(0_u64..8, 0..64)) {
            let mut map: HandleMap<SurfaceKey, u64> = HandleMap::new();
            let mut first_keys = HashMap::new();
            for id in ids {
                let result = map.get_or_create(id, || Ok::<_, ()>(id)).unwrap();
                match result {
                    None => prop_assert_eq!(id, 0),
                    Some((key, created)) => {
                        prop_assert_eq!(created, !first_keys.contains_key(&id));
                        let first = *first_keys.entry(id).or_insert(key);
                        prop_assert_eq!(key, first);
                        prop_assert_eq!(map.get(key), Some(&id));
                    }
                }
            }
            prop_assert_eq!(map.len(), first_keys.len());
        }
    }
}
