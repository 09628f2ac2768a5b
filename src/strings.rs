//! Interned string cache.
//!
//! Mirrors the reference-counted, content-addressed string table used by
//! the original virtual machine: every `Str` value on the VM stack holds a
//! [`StringHandle`] into a single [`StringCache`] owned by the
//! [`VirtualMachine`](crate::vm::VirtualMachine). Interning the same text
//! twice returns the same handle and bumps a refcount instead of
//! allocating again; releasing the last handle for a piece of text drops
//! the backing storage.

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// A handle into a [`StringCache`]. Two handles compare equal by content
/// (cheaply, since both point at the same `Rc<str>` once interned through
/// the same cache) rather than by address.
#[derive(Clone, Debug)]
pub struct StringHandle(pub(crate) Rc<str>);

impl StringHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Pointer-equality fast path; valid only when both handles were
    /// produced by the same `StringCache`.
    pub fn ptr_eq(&self, other: &StringHandle) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for StringHandle {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.0 == other.0
    }
}
impl Eq for StringHandle {}

impl std::fmt::Display for StringHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn hash_of(s: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    s.hash(&mut hasher);
    hasher.finish()
}

struct Entry {
    storage: Rc<str>,
    refcount: usize,
}

/// Content-hashed string table with manual refcounting, plus memoization
/// of pairwise concatenation so that repeatedly concatenating the same two
/// interned strings (e.g. in a loop) does not re-intern a fresh string
/// each time.
#[derive(Default)]
pub struct StringCache {
    entries: HashMap<u64, Vec<Entry>>,
    concat_memo: HashMap<(u64, u64), StringHandle>,
}

impl StringCache {
    pub fn new() -> StringCache {
        StringCache::default()
    }

    /// Insert `s`, returning a stable handle and incrementing its
    /// refcount.
    pub fn intern(&mut self, s: &str) -> StringHandle {
        let hash = hash_of(s);
        let bucket = self.entries.entry(hash).or_insert_with(Vec::new);
        for entry in bucket.iter_mut() {
            if &*entry.storage == s {
                entry.refcount += 1;
                return StringHandle(entry.storage.clone());
            }
        }
        let storage: Rc<str> = Rc::from(s);
        bucket.push(Entry { storage: storage.clone(), refcount: 1 });
        StringHandle(storage)
    }

    /// Bump the refcount of an already-interned handle (used when a value
    /// is copied onto the stack rather than freshly constructed).
    pub fn retain(&mut self, handle: &StringHandle) {
        let hash = hash_of(&handle.0);
        if let Some(bucket) = self.entries.get_mut(&hash) {
            for entry in bucket.iter_mut() {
                if Rc::ptr_eq(&entry.storage, &handle.0) {
                    entry.refcount += 1;
                    return;
                }
            }
        }
    }

    /// Decrement the refcount for `handle`, deleting the backing entry
    /// when it reaches zero. Corresponds to the `POP_STRING` family of
    /// opcodes.
    pub fn release(&mut self, handle: &StringHandle) {
        let hash = hash_of(&handle.0);
        if let Some(bucket) = self.entries.get_mut(&hash) {
            if let Some(pos) = bucket
                .iter()
                .position(|entry| Rc::ptr_eq(&entry.storage, &handle.0))
            {
                bucket[pos].refcount -= 1;
                if bucket[pos].refcount == 0 {
                    bucket.remove(pos);
                }
            }
            if bucket.is_empty() {
                self.entries.remove(&hash);
            }
        }
        let entries = &self.entries;
        let alive = |h: &StringHandle| -> bool {
            let hash = hash_of(&h.0);
            entries
                .get(&hash)
                .map(|bucket| bucket.iter().any(|e| Rc::ptr_eq(&e.storage, &h.0)))
                .unwrap_or(false)
        };
        self.concat_memo.retain(|_, v| !v.ptr_eq(handle) || alive(handle));
    }

    fn entry_alive(&self, handle: &StringHandle) -> bool {
        let hash = hash_of(&handle.0);
        self.entries
            .get(&hash)
            .map(|bucket| bucket.iter().any(|e| Rc::ptr_eq(&e.storage, &handle.0)))
            .unwrap_or(false)
    }

    /// `CONCATENATE`: memoized on the pair of operand hashes.
    pub fn concat(&mut self, a: &StringHandle, b: &StringHandle) -> StringHandle {
        let key = (hash_of(&a.0), hash_of(&b.0));
        if let Some(existing) = self.concat_memo.get(&key).cloned() {
            self.retain(&existing);
            return existing;
        }
        let mut joined = String::with_capacity(a.0.len() + b.0.len());
        joined.push_str(&a.0);
        joined.push_str(&b.0);
        let handle = self.intern(&joined);
        self.concat_memo.insert(key, handle.clone());
        handle
    }

    /// Total number of live distinct strings; used by tests asserting
    /// refcount net-zero after a program runs to completion.
    pub fn live_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_same_text_shares_storage() {
        let mut cache = StringCache::new();
        let a = cache.intern("hello");
        let b = cache.intern("hello");
        assert!(a.ptr_eq(&b));
        assert_eq!(cache.live_count(), 1);
    }

    #[test]
    fn release_drops_at_zero_refcount() {
        let mut cache = StringCache::new();
        let a = cache.intern("x");
        let b = cache.intern("x");
        cache.release(&a);
        assert_eq!(cache.live_count(), 1);
        cache.release(&b);
        assert_eq!(cache.live_count(), 0);
    }

    #[test]
    fn concat_is_memoized() {
        let mut cache = StringCache::new();
        let a = cache.intern("foo");
        let b = cache.intern("bar");
        let c1 = cache.concat(&a, &b);
        let c2 = cache.concat(&a, &b);
        assert!(c1.ptr_eq(&c2));
        assert_eq!(c1.as_str(), "foobar");
    }
}
