//! Open-chained hash tables over arena slots.
//!
//! Two tables locate a child from its parent: one keyed by
//! `(parent, name)`, one by `(parent, index)`. Chain links live here,
//! one link per slot per table, so membership costs no allocation and
//! removal is O(1). Key comparison is left to the caller through a
//! predicate, since only the arena knows each slot's current key.

/// Chain membership of one slot in one table.
#[derive(Debug, Clone, Copy, Default)]
struct Link {
    prev: Option<usize>,
    next: Option<usize>,
    /// Bucket the slot is chained into, if any.
    bucket: Option<usize>,
}

/// One hash table: bucket heads plus per-slot doubly linked chains.
#[derive(Debug)]
struct HashChains {
    heads: Vec<Option<usize>>,
    links: Vec<Link>,
}

impl HashChains {
    fn new(buckets: usize, slots: usize) -> Self {
        Self {
            heads: vec![None; buckets.max(1)],
            links: vec![Link::default(); slots],
        }
    }

    fn bucket_count(&self) -> usize {
        self.heads.len()
    }

    fn is_linked(&self, slot: usize) -> bool {
        self.links[slot].bucket.is_some()
    }

    fn insert(&mut self, bucket: usize, slot: usize) {
        assert!(!self.is_linked(slot), "slot {slot} is already chained");
        let old_head = self.heads[bucket];
        if let Some(head) = old_head {
            self.links[head].prev = Some(slot);
        }
        self.links[slot] = Link {
            prev: None,
            next: old_head,
            bucket: Some(bucket),
        };
        self.heads[bucket] = Some(slot);
    }

    fn remove(&mut self, slot: usize) -> bool {
        let Link { prev, next, bucket } = self.links[slot];
        let Some(bucket) = bucket else {
            return false;
        };
        match prev {
            Some(p) => self.links[p].next = next,
            None => self.heads[bucket] = next,
        }
        if let Some(n) = next {
            self.links[n].prev = prev;
        }
        self.links[slot] = Link::default();
        true
    }

    fn find(&self, bucket: usize, mut matches: impl FnMut(usize) -> bool) -> Option<usize> {
        let mut cur = self.heads[bucket];
        while let Some(slot) = cur {
            if matches(slot) {
                return Some(slot);
            }
            cur = self.links[slot].next;
        }
        None
    }

    #[cfg(test)]
    fn chain_len(&self, bucket: usize) -> usize {
        let mut len = 0;
        let mut cur = self.heads[bucket];
        while let Some(slot) = cur {
            len += 1;
            cur = self.links[slot].next;
        }
        len
    }
}

/// The pair of child-lookup tables used by the arena.
#[derive(Debug)]
pub struct HashIndex {
    by_name: HashChains,
    by_index: HashChains,
}

impl HashIndex {
    /// Build tables for `slots` arena slots, one bucket per slot.
    pub fn new(slots: usize) -> Self {
        Self::with_buckets(slots, slots)
    }

    pub fn with_buckets(slots: usize, buckets: usize) -> Self {
        Self {
            by_name: HashChains::new(buckets, slots),
            by_index: HashChains::new(buckets, slots),
        }
    }

    fn name_bucket(&self, parent: usize, name: &str) -> usize {
        let h = fmix64(sdbm(name.as_bytes()) ^ (parent as u64).wrapping_mul(PARENT_MIX));
        (h % self.by_name.bucket_count() as u64) as usize
    }

    fn index_bucket(&self, parent: usize, index: u32) -> usize {
        let h = fmix64(((parent as u64) << 32) ^ u64::from(index));
        (h % self.by_index.bucket_count() as u64) as usize
    }

    pub fn insert_name(&mut self, parent: usize, name: &str, slot: usize) {
        let bucket = self.name_bucket(parent, name);
        self.by_name.insert(bucket, slot);
    }

    pub fn insert_index(&mut self, parent: usize, index: u32, slot: usize) {
        let bucket = self.index_bucket(parent, index);
        self.by_index.insert(bucket, slot);
    }

    /// Unchain `slot` from both tables; a no-op for tables it is not in.
    pub fn remove(&mut self, slot: usize) {
        self.by_name.remove(slot);
        self.by_index.remove(slot);
    }

    pub fn is_named(&self, slot: usize) -> bool {
        self.by_name.is_linked(slot)
    }

    pub fn is_indexed(&self, slot: usize) -> bool {
        self.by_index.is_linked(slot)
    }

    /// First slot in the `(parent, name)` chain accepted by `matches`.
    pub fn find_name(
        &self,
        parent: usize,
        name: &str,
        matches: impl FnMut(usize) -> bool,
    ) -> Option<usize> {
        self.by_name.find(self.name_bucket(parent, name), matches)
    }

    /// First slot in the `(parent, index)` chain accepted by `matches`.
    pub fn find_index(
        &self,
        parent: usize,
        index: u32,
        matches: impl FnMut(usize) -> bool,
    ) -> Option<usize> {
        self.by_index.find(self.index_bucket(parent, index), matches)
    }

    #[cfg(test)]
    fn longest_name_chain(&self) -> usize {
        (0..self.by_name.bucket_count())
            .map(|b| self.by_name.chain_len(b))
            .max()
            .unwrap_or(0)
    }
}

const PARENT_MIX: u64 = 0x9e37_79b9_7f4a_7c15;

/// sdbm string hash.
fn sdbm(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |h, &b| {
        u64::from(b)
            .wrapping_add(h << 6)
            .wrapping_add(h << 16)
            .wrapping_sub(h)
    })
}

/// MurmurHash3 64-bit finalizer.
#[inline(always)]
fn fmix64(mut k: u64) -> u64 {
    k ^= k >> 33;
    k = k.wrapping_mul(0xff51afd7ed558ccd);
    k ^= k >> 33;
    k = k.wrapping_mul(0xc4ceb9fe1a85ec53);
    k ^= k >> 33;
    k
}
