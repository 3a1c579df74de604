//! Chained hash table with arena-allocated nodes.
//!
//! Buckets hold the slot index of the first node of their chain and every node
//! holds the slot index of its successor, so no node owns another. Freed slots
//! are recycled by later insertions. Bucket selection hashes the key through
//! SHA-1 and reduces the leading eight digest bytes modulo the capacity.

use serde::Serialize;
use sha1::{Digest, Sha1};
use std::borrow::Borrow;
use std::hash::{Hash, Hasher};
use std::mem;

/// `Hasher` that feeds everything written into a SHA-1 digest.
#[derive(Clone, Default)]
struct DigestHasher(Sha1);

impl Hasher for DigestHasher {
    fn write(&mut self, bytes: &[u8]) {
        self.0.update(bytes);
    }

    fn finish(&self) -> u64 {
        let digest = self.0.clone().finalize();
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        u64::from_be_bytes(head)
    }
}

fn digest_of<Q: Hash + ?Sized>(key: &Q) -> u64 {
    let mut hasher = DigestHasher::default();
    key.hash(&mut hasher);
    hasher.finish()
}

#[derive(Debug, Clone)]
struct Node<K, V> {
    key: K,
    value: V,
    next: Option<usize>,
}

/// Load and chain statistics of a [`HashTable`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HashTableStats {
    pub count: usize,
    pub capacity: usize,
    pub occupied_buckets: usize,
    pub load_factor: f64,
    pub collisions: usize,
    pub average_chain_length: f64,
    pub max_chain_length: usize,
}

#[derive(Debug, Clone)]
pub struct HashTable<K, V> {
    buckets: Vec<Option<usize>>,
    slots: Vec<Option<Node<K, V>>>,
    free: Vec<usize>,
    count: usize,
    collisions: usize,
    max_load_factor: Option<f64>,
}

impl<K: Hash + Eq, V> HashTable<K, V> {
    /// Fixed-capacity table. It never rehashes; watch `statistics().load_factor`.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buckets: vec![None; capacity],
            slots: Vec::new(),
            free: Vec::new(),
            count: 0,
            collisions: 0,
            max_load_factor: None,
        }
    }

    /// Table that doubles its bucket array once `count / capacity` exceeds `max_load_factor`.
    pub fn growable(capacity: usize, max_load_factor: f64) -> Self {
        let mut table = Self::with_capacity(capacity);
        table.max_load_factor = Some(max_load_factor);
        table
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn capacity(&self) -> usize {
        self.buckets.len()
    }

    fn bucket_of<Q: Hash + ?Sized>(&self, key: &Q) -> usize {
        (digest_of(key) % self.buckets.len() as u64) as usize
    }

    fn node(&self, idx: usize) -> &Node<K, V> {
        self.slots[idx].as_ref().expect("chain links only point at live slots")
    }

    fn node_mut(&mut self, idx: usize) -> &mut Node<K, V> {
        self.slots[idx].as_mut().expect("chain links only point at live slots")
    }

    fn find<Q>(&self, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut cursor = self.buckets[self.bucket_of(key)];
        while let Some(idx) = cursor {
            let node = self.node(idx);
            if node.key.borrow() == key {
                return Some(idx);
            }
            cursor = node.next;
        }
        None
    }

    /// Inserts or overwrites. Returns the previous value for an existing key.
    pub fn put(&mut self, key: K, value: V) -> Option<V> {
        if let Some(idx) = self.find(&key) {
            return Some(mem::replace(&mut self.node_mut(idx).value, value));
        }
        self.insert_new(key, value);
        None
    }

    /// Returns the value for `key`, inserting `make()` first if it is absent.
    pub fn get_or_insert_with<F: FnOnce() -> V>(&mut self, key: K, make: F) -> &mut V {
        let idx = match self.find(&key) {
            Some(idx) => idx,
            None => self.insert_new(key, make()),
        };
        &mut self.node_mut(idx).value
    }

    // Appends at the chain tail; the caller guarantees `key` is absent.
    fn insert_new(&mut self, key: K, value: V) -> usize {
        let bucket = self.bucket_of(&key);
        let node = Node { key, value, next: None };
        let idx = match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = Some(node);
                idx
            }
            None => {
                self.slots.push(Some(node));
                self.slots.len() - 1
            }
        };
        match self.buckets[bucket] {
            None => self.buckets[bucket] = Some(idx),
            Some(head) => {
                let mut tail = head;
                while let Some(next) = self.node(tail).next {
                    tail = next;
                }
                self.node_mut(tail).next = Some(idx);
                self.collisions += 1;
            }
        }
        self.count += 1;
        self.grow_if_needed();
        idx
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.find(key).map(|idx| &self.node(idx).value)
    }

    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let idx = self.find(key)?;
        Some(&mut self.node_mut(idx).value)
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.find(key).is_some()
    }

    /// Unlinks `key` from its chain. `None` when the key was not present.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let bucket = self.bucket_of(key);
        let mut prev: Option<usize> = None;
        let mut cursor = self.buckets[bucket];
        while let Some(idx) = cursor {
            let (matches, next) = {
                let node = self.node(idx);
                (node.key.borrow() == key, node.next)
            };
            if matches {
                match prev {
                    None => self.buckets[bucket] = next,
                    Some(p) => self.node_mut(p).next = next,
                }
                let node = self.slots[idx].take().expect("chain links only point at live slots");
                self.free.push(idx);
                self.count -= 1;
                return Some(node.value);
            }
            prev = Some(idx);
            cursor = next;
        }
        None
    }

    fn grow_if_needed(&mut self) {
        if let Some(max) = self.max_load_factor {
            if self.count as f64 / self.buckets.len() as f64 > max {
                self.rehash(self.buckets.len() * 2);
            }
        }
    }

    /// Relinks every live node into a bucket array of `capacity` buckets.
    pub fn rehash(&mut self, capacity: usize) {
        let capacity = capacity.max(1);
        let live: Vec<usize> = self.chain_indices().collect();
        self.buckets = vec![None; capacity];
        let mut tails: Vec<Option<usize>> = vec![None; capacity];
        for idx in live {
            let bucket = self.bucket_of(&self.node(idx).key);
            self.node_mut(idx).next = None;
            match tails[bucket] {
                None => self.buckets[bucket] = Some(idx),
                Some(tail) => self.node_mut(tail).next = Some(idx),
            }
            tails[bucket] = Some(idx);
        }
        let occupied = self.buckets.iter().filter(|b| b.is_some()).count();
        self.collisions = self.count - occupied;
        tracing::debug!(capacity, count = self.count, "hash table rehashed");
    }

    fn chain_indices(&self) -> ChainIndices<'_, K, V> {
        ChainIndices { table: self, bucket: 0, cursor: None }
    }

    /// Entries in bucket order, then chain order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> + '_ {
        self.chain_indices().map(move |idx| {
            let node = self.node(idx);
            (&node.key, &node.value)
        })
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.iter().map(|(_, v)| v)
    }

    pub fn statistics(&self) -> HashTableStats {
        let mut occupied_buckets = 0usize;
        let mut max_chain_length = 0usize;
        for head in &self.buckets {
            let mut len = 0usize;
            let mut cursor = *head;
            while let Some(idx) = cursor {
                len += 1;
                cursor = self.node(idx).next;
            }
            if len > 0 {
                occupied_buckets += 1;
                max_chain_length = max_chain_length.max(len);
            }
        }
        let average_chain_length = if occupied_buckets == 0 { 0.0 } else { self.count as f64 / occupied_buckets as f64 };
        HashTableStats {
            count: self.count,
            capacity: self.buckets.len(),
            occupied_buckets,
            load_factor: self.count as f64 / self.buckets.len() as f64,
            collisions: self.collisions,
            average_chain_length,
            max_chain_length,
        }
    }
}

struct ChainIndices<'a, K, V> {
    table: &'a HashTable<K, V>,
    bucket: usize,
    cursor: Option<usize>,
}

impl<'a, K: Hash + Eq, V> Iterator for ChainIndices<'a, K, V> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        loop {
            if let Some(idx) = self.cursor {
                self.cursor = self.table.node(idx).next;
                return Some(idx);
            }
            if self.bucket >= self.table.buckets.len() {
                return None;
            }
            self.cursor = self.table.buckets[self.bucket];
            self.bucket += 1;
        }
    }
}
