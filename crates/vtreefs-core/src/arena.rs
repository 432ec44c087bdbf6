//! Fixed-capacity inode table.
//!
//! All inodes live in one `Vec` allocated at mount time. Slot 0 is the root
//! and is never freed. Other slots cycle between the free list and the
//! tree: `create` takes the oldest free slot, and a slot returns to the
//! back of the free list once its inode is deleted, unreferenced and
//! childless.
//!
//! Deleting a directory that still has referenced descendants only marks
//! them; each one is reclaimed when its last reference goes away, and a
//! deleted directory is reclaimed when its last child is.

use std::collections::VecDeque;

use tracing::{trace, warn};
use vtreefs_types::{make_error_msg, InodeNo, Result, StatusCode, VtreeCode, ROOT_INODE_NO};

use crate::hash_index::HashIndex;
use crate::inode::{ino_to_slot, slot_to_ino, Inode};
use crate::types::InodeStat;

const ROOT_SLOT: usize = 0;

pub struct InodeArena<H> {
    nodes: Vec<Inode<H>>,
    free: VecDeque<usize>,
    index: HashIndex,
    /// Where the next eviction scan starts.
    evict_cursor: usize,
    max_name_len: usize,
}

impl<H> InodeArena<H> {
    /// Allocate `capacity` slots and install the root directory.
    pub fn new(
        capacity: usize,
        root_stat: InodeStat,
        root_indexed: u32,
        max_name_len: usize,
    ) -> Self {
        assert!(capacity >= 1, "the arena needs at least the root slot");
        assert!(root_stat.is_dir(), "the root inode must be a directory");

        let mut nodes: Vec<Inode<H>> = (0..capacity)
            .map(|slot| Inode::vacant(slot, InodeStat::default()))
            .collect();
        let root = &mut nodes[ROOT_SLOT];
        root.free = false;
        root.stat = root_stat;
        root.indexed_entries = root_indexed;

        Self {
            nodes,
            free: (1..capacity).collect(),
            index: HashIndex::new(capacity),
            evict_cursor: 1 % capacity,
            max_name_len,
        }
    }

    pub fn capacity(&self) -> usize {
        self.nodes.len()
    }

    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// Slots not on the free list, root and deleted-but-referenced
    /// inodes included.
    pub fn in_use(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    pub fn root(&self) -> InodeNo {
        ROOT_INODE_NO
    }

    pub fn max_name_len(&self) -> usize {
        self.max_name_len
    }

    fn slot_of(&self, ino: InodeNo) -> Result<usize> {
        match ino_to_slot(ino, self.nodes.len()) {
            Some(slot) if !self.nodes[slot].free => Ok(slot),
            Some(_) => make_error_msg(StatusCode::INVALID_ARG, format!("inode {ino} is not in use")),
            None => make_error_msg(StatusCode::INVALID_ARG, format!("inode {ino} out of range")),
        }
    }

    /// Slot of an inode the caller already knows to be live.
    fn live_slot(&self, ino: InodeNo) -> usize {
        match self.slot_of(ino) {
            Ok(slot) => slot,
            Err(status) => panic!("{status}"),
        }
    }

    /// Look an inode up by number. Deleted inodes that are still
    /// referenced are returned; free slots are not.
    pub fn get(&self, ino: InodeNo) -> Result<&Inode<H>> {
        let slot = self.slot_of(ino)?;
        Ok(&self.nodes[slot])
    }

    pub fn get_mut(&mut self, ino: InodeNo) -> Result<&mut Inode<H>> {
        let slot = self.slot_of(ino)?;
        Ok(&mut self.nodes[slot])
    }

    /// Like `get`, for numbers obtained from the arena itself during the
    /// current request. Panics if the slot is free.
    pub fn node(&self, ino: InodeNo) -> &Inode<H> {
        &self.nodes[self.live_slot(ino)]
    }

    /// Parent of an inode; `None` for the root and for deleted inodes
    /// already detached from their directory.
    pub fn parent(&self, ino: InodeNo) -> Result<Option<InodeNo>> {
        let slot = self.slot_of(ino)?;
        Ok(self.nodes[slot].parent.map(slot_to_ino))
    }

    /// Add a child to `parent`.
    ///
    /// When no slot is free, one evictable inode is deleted first. An
    /// inode is evictable when it has an index, no references and no
    /// children; the provider can bring it back on demand.
    pub fn create(
        &mut self,
        parent: InodeNo,
        name: &str,
        index: Option<u32>,
        stat: InodeStat,
        indexed_entries: u32,
        handle: H,
    ) -> Result<InodeNo> {
        let parent_slot = self.live_slot(parent);
        let dir = &self.nodes[parent_slot];
        assert!(dir.is_dir(), "cannot create {name:?} under non-directory {parent}");
        assert!(!dir.deleted, "cannot create {name:?} under deleted directory {parent}");

        self.check_name(name)?;
        if self.find_named(parent_slot, name).is_some() {
            return make_error_msg(
                VtreeCode::ALREADY_EXISTS,
                format!("{name:?} already exists in {parent}"),
            );
        }
        if let Some(i) = index {
            if self.find_indexed(parent_slot, i).is_some() {
                return make_error_msg(
                    VtreeCode::ALREADY_EXISTS,
                    format!("index {i} already taken in {parent}"),
                );
            }
        }

        if self.free.is_empty() {
            self.evict_one(parent_slot);
        }
        let Some(slot) = self.free.pop_front() else {
            warn!(%parent, name, capacity = self.nodes.len(), "inode table exhausted");
            return make_error_msg(VtreeCode::OUT_OF_NODES, "no free or evictable inode");
        };

        let node = &mut self.nodes[slot];
        debug_assert!(node.free && node.refs.is_zero() && node.children.len == 0);
        node.free = false;
        node.deleted = false;
        node.name.clear();
        node.name.push_str(name);
        node.index = index;
        node.stat = stat;
        node.indexed_entries = indexed_entries;
        node.handle = Some(handle);

        self.attach(parent_slot, slot);
        self.index.insert_name(parent_slot, name, slot);
        if let Some(i) = index {
            self.index.insert_index(parent_slot, i, slot);
        }

        let ino = slot_to_ino(slot);
        trace!(%ino, %parent, name, ?index, "created inode");
        Ok(ino)
    }

    fn check_name(&self, name: &str) -> Result<()> {
        if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\0']) {
            return make_error_msg(StatusCode::INVALID_ARG, format!("invalid name {name:?}"));
        }
        if name.len() > self.max_name_len {
            return make_error_msg(
                VtreeCode::NAME_TOO_LONG,
                format!("name is {} bytes, limit {}", name.len(), self.max_name_len),
            );
        }
        Ok(())
    }

    fn find_named(&self, parent_slot: usize, name: &str) -> Option<usize> {
        self.index.find_name(parent_slot, name, |s| {
            let n = &self.nodes[s];
            n.parent == Some(parent_slot) && n.name == name
        })
    }

    fn find_indexed(&self, parent_slot: usize, index: u32) -> Option<usize> {
        self.index.find_index(parent_slot, index, |s| {
            let n = &self.nodes[s];
            n.parent == Some(parent_slot) && n.index == Some(index)
        })
    }

    /// Live child of `parent` called `name`.
    pub fn lookup_by_name(&self, parent: InodeNo, name: &str) -> Option<InodeNo> {
        let parent_slot = self.slot_of(parent).ok()?;
        self.find_named(parent_slot, name).map(slot_to_ino)
    }

    /// Live child of `parent` with the given index.
    pub fn lookup_by_index(&self, parent: InodeNo, index: u32) -> Option<InodeNo> {
        let parent_slot = self.slot_of(parent).ok()?;
        self.find_indexed(parent_slot, index).map(slot_to_ino)
    }

    /// Validate an inode number and take a reference on it.
    pub fn acquire(&mut self, ino: InodeNo) -> Result<InodeNo> {
        let slot = self.slot_of(ino)?;
        self.nodes[slot].refs.increment();
        Ok(ino)
    }

    /// Take another reference on a live inode.
    pub fn add_ref(&mut self, ino: InodeNo) {
        let slot = self.live_slot(ino);
        self.nodes[slot].refs.increment();
    }

    pub fn release(&mut self, ino: InodeNo) {
        self.release_many(ino, 1);
    }

    /// Drop `count` references. A deleted inode left without references
    /// or children is reclaimed, along with any deleted ancestors this
    /// leaves empty.
    pub fn release_many(&mut self, ino: InodeNo, count: u32) {
        let slot = self.live_slot(ino);
        self.nodes[slot].refs.decrement(count);
        if self.nodes[slot].deleted && self.nodes[slot].recyclable() {
            self.reclaim(slot);
        }
    }

    /// Delete an inode and its whole subtree.
    ///
    /// Every inode of the subtree is unhashed at once, so lookups stop
    /// finding it. Non-directories are detached from their parent right
    /// away; directories stay linked until their children are gone. Slots
    /// without references are reclaimed now, the rest on last release.
    pub fn mark_deleted(&mut self, ino: InodeNo) {
        let slot = self.live_slot(ino);
        assert_ne!(slot, ROOT_SLOT, "the root inode cannot be deleted");

        if !self.nodes[slot].deleted {
            for s in self.live_subtree_postorder(slot) {
                self.flag_deleted(s);
                // Parents come later in post-order, so this never cascades.
                self.reclaim(s);
            }
            trace!(%ino, "deleted subtree");
        }
        self.reclaim(slot);
    }

    /// Non-deleted inodes of the subtree at `top`, children before parents.
    fn live_subtree_postorder(&self, top: usize) -> Vec<usize> {
        let mut order = Vec::new();
        let mut stack = vec![(top, false)];
        while let Some((slot, expanded)) = stack.pop() {
            if expanded {
                order.push(slot);
                continue;
            }
            stack.push((slot, true));
            let mut child = self.nodes[slot].children.first;
            while let Some(c) = child {
                if !self.nodes[c].deleted {
                    stack.push((c, false));
                }
                child = self.nodes[c].next_sibling;
            }
        }
        order
    }

    fn flag_deleted(&mut self, slot: usize) {
        self.nodes[slot].deleted = true;
        self.index.remove(slot);
        if !self.nodes[slot].is_dir() {
            self.detach(slot);
        }
    }

    /// Free `slot` if it is deleted and recyclable, then walk up through
    /// deleted parents that became empty.
    fn reclaim(&mut self, slot: usize) {
        let mut cur = Some(slot);
        while let Some(s) = cur {
            let node = &self.nodes[s];
            if !node.deleted || !node.recyclable() {
                break;
            }
            let parent = node.parent;
            self.detach(s);
            self.recycle(s);
            cur = parent.filter(|&p| self.nodes[p].deleted);
        }
    }

    fn recycle(&mut self, slot: usize) {
        debug_assert!(!self.index.is_named(slot) && !self.index.is_indexed(slot));
        let node = &mut self.nodes[slot];
        node.name.clear();
        node.index = None;
        node.handle = None;
        node.indexed_entries = 0;
        node.stat = InodeStat::default();
        node.deleted = false;
        node.free = true;
        self.free.push_back(slot);
        trace!(ino = %slot_to_ino(slot), "inode slot freed");
    }

    /// Delete one evictable inode, scanning round-robin from the cursor.
    /// `keep` is the directory a create is about to insert into.
    fn evict_one(&mut self, keep: usize) -> bool {
        let n = self.nodes.len();
        for _ in 0..n {
            let slot = self.evict_cursor;
            let node = &self.nodes[slot];
            if slot != keep
                && slot != ROOT_SLOT
                && !node.free
                && !node.deleted
                && node.index.is_some()
                && node.recyclable()
            {
                trace!(ino = %slot_to_ino(slot), name = %node.name, "evicting inode");
                self.evict_cursor = (slot + 1) % n;
                self.mark_deleted(slot_to_ino(slot));
                return true;
            }
            self.evict_cursor = (slot + 1) % n;
        }
        false
    }

    fn attach(&mut self, parent: usize, slot: usize) {
        let tail = self.nodes[parent].children.last;
        {
            let node = &mut self.nodes[slot];
            node.parent = Some(parent);
            node.prev_sibling = tail;
            node.next_sibling = None;
        }
        match tail {
            Some(t) => self.nodes[t].next_sibling = Some(slot),
            None => self.nodes[parent].children.first = Some(slot),
        }
        let list = &mut self.nodes[parent].children;
        list.last = Some(slot);
        list.len += 1;
    }

    fn detach(&mut self, slot: usize) {
        let Some(parent) = self.nodes[slot].parent else {
            return;
        };
        let (prev, next) = (self.nodes[slot].prev_sibling, self.nodes[slot].next_sibling);
        match prev {
            Some(p) => self.nodes[p].next_sibling = next,
            None => self.nodes[parent].children.first = next,
        }
        match next {
            Some(n) => self.nodes[n].prev_sibling = prev,
            None => self.nodes[parent].children.last = prev,
        }
        self.nodes[parent].children.len -= 1;

        let node = &mut self.nodes[slot];
        node.parent = None;
        node.prev_sibling = None;
        node.next_sibling = None;
    }

    fn live_from(&self, mut cursor: Option<usize>) -> Option<usize> {
        while let Some(s) = cursor {
            if !self.nodes[s].deleted {
                return Some(s);
            }
            cursor = self.nodes[s].next_sibling;
        }
        None
    }

    /// First non-deleted child, in insertion order.
    pub fn first_child(&self, parent: InodeNo) -> Option<InodeNo> {
        let slot = self.live_slot(parent);
        self.live_from(self.nodes[slot].children.first).map(slot_to_ino)
    }

    /// Next non-deleted sibling after `prev`.
    pub fn next_child(&self, prev: InodeNo) -> Option<InodeNo> {
        let slot = self.live_slot(prev);
        self.live_from(self.nodes[slot].next_sibling).map(slot_to_ino)
    }

    pub fn children(&self, parent: InodeNo) -> Children<'_, H> {
        Children {
            arena: self,
            next: self.first_child(parent),
        }
    }

    /// Walk every slot and check the structural invariants. Meant for
    /// tests and debugging; cost is linear in the capacity.
    pub fn check_consistency(&self) -> Result<()> {
        let bug = |msg: String| make_error_msg(StatusCode::FOUND_BUG, msg);

        let root = &self.nodes[ROOT_SLOT];
        if root.free || root.deleted || root.parent.is_some() || !root.is_dir() {
            return bug("root slot is not a live parentless directory".into());
        }
        let mut free_seen = vec![false; self.nodes.len()];
        for &s in &self.free {
            if !self.nodes[s].free || std::mem::replace(&mut free_seen[s], true) {
                return bug(format!("free list entry {s} is inconsistent"));
            }
        }
        for (slot, node) in self.nodes.iter().enumerate() {
            if node.free != free_seen[slot] {
                return bug(format!("slot {slot} free flag disagrees with the free list"));
            }
            if node.free || slot == ROOT_SLOT {
                continue;
            }
            let hashed = self.index.is_named(slot);
            if hashed == node.deleted {
                return bug(format!("slot {slot} hashed={hashed} deleted={}", node.deleted));
            }
            if self.index.is_indexed(slot) != (!node.deleted && node.index.is_some()) {
                return bug(format!("slot {slot} index chain membership is wrong"));
            }
            if !node.deleted && node.parent.is_none() {
                return bug(format!("live slot {slot} has no parent"));
            }
            if node.deleted && node.recyclable() {
                return bug(format!("slot {slot} should have been reclaimed"));
            }
            let mut len = 0;
            let mut child = node.children.first;
            while let Some(c) = child {
                if self.nodes[c].parent != Some(slot) {
                    return bug(format!("slot {c} is listed under {slot} but points elsewhere"));
                }
                len += 1;
                child = self.nodes[c].next_sibling;
            }
            if len != node.children.len {
                return bug(format!("slot {slot} child count {} != {len}", node.children.len));
            }
        }
        Ok(())
    }
}

/// Iterator over the live children of a directory.
pub struct Children<'a, H> {
    arena: &'a InodeArena<H>,
    next: Option<InodeNo>,
}

impl<H> Iterator for Children<'_, H> {
    type Item = InodeNo;

    fn next(&mut self) -> Option<InodeNo> {
        let cur = self.next?;
        self.next = self.arena.next_child(cur);
        Some(cur)
    }
}
