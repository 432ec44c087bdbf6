//! Inode records stored in the arena.
//!
//! Links between records (parent, children, siblings) are slot indices.
//! The parent link does not own anything; the child list does, in the
//! sense that a record cannot be recycled while it has children.

use vtreefs_types::InodeNo;

use crate::types::{FileKind, InodeStat};

/// Reference count that refuses to underflow or overflow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefCount(u32);

impl RefCount {
    pub fn get(self) -> u32 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub(crate) fn increment(&mut self) {
        self.0 = self
            .0
            .checked_add(1)
            .unwrap_or_else(|| panic!("inode reference count overflow"));
    }

    pub(crate) fn decrement(&mut self, n: u32) {
        self.0 = self
            .0
            .checked_sub(n)
            .unwrap_or_else(|| panic!("releasing {n} references, only {} held", self.0));
    }
}

/// Intrusive child list head, kept in the parent.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ChildList {
    pub(crate) first: Option<usize>,
    pub(crate) last: Option<usize>,
    pub(crate) len: usize,
}

/// One arena slot.
#[derive(Debug)]
pub struct Inode<H> {
    pub(crate) slot: usize,
    pub(crate) name: String,
    pub(crate) index: Option<u32>,
    pub(crate) stat: InodeStat,
    pub(crate) indexed_entries: u32,
    pub(crate) handle: Option<H>,
    pub(crate) refs: RefCount,
    pub(crate) deleted: bool,
    /// Set while the slot sits on the free list.
    pub(crate) free: bool,

    pub(crate) parent: Option<usize>,
    pub(crate) children: ChildList,
    pub(crate) prev_sibling: Option<usize>,
    pub(crate) next_sibling: Option<usize>,
}

impl<H> Inode<H> {
    pub(crate) fn vacant(slot: usize, stat: InodeStat) -> Self {
        Self {
            slot,
            name: String::new(),
            index: None,
            stat,
            indexed_entries: 0,
            handle: None,
            refs: RefCount::default(),
            deleted: false,
            free: true,
            parent: None,
            children: ChildList::default(),
            prev_sibling: None,
            next_sibling: None,
        }
    }

    /// The 1-based inode number of this slot.
    pub fn number(&self) -> InodeNo {
        slot_to_ino(self.slot)
    }

    /// Name within the parent; empty only for the root.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Position among the parent's indexed children, if regenerable.
    pub fn index(&self) -> Option<u32> {
        self.index
    }

    pub fn stat(&self) -> &InodeStat {
        &self.stat
    }

    /// Replace the stat block. The file type must not change, since the
    /// arena's handling of links and deletion depends on it.
    pub fn set_stat(&mut self, stat: InodeStat) {
        assert_eq!(
            stat.kind(),
            self.stat.kind(),
            "set_stat cannot change the file type of inode {}",
            self.number()
        );
        self.stat = stat;
    }

    /// Number of indexed children the provider declares for a directory.
    pub fn indexed_entries(&self) -> u32 {
        self.indexed_entries
    }

    pub fn set_indexed_entries(&mut self, n: u32) {
        self.indexed_entries = n;
    }

    pub fn handle(&self) -> Option<&H> {
        self.handle.as_ref()
    }

    pub fn handle_mut(&mut self) -> Option<&mut H> {
        self.handle.as_mut()
    }

    pub fn ref_count(&self) -> u32 {
        self.refs.get()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub fn is_dir(&self) -> bool {
        self.stat.is_dir()
    }

    pub fn is_symlink(&self) -> bool {
        self.stat.is_symlink()
    }

    pub fn kind(&self) -> FileKind {
        self.stat.kind()
    }

    pub(crate) fn recyclable(&self) -> bool {
        self.refs.is_zero() && self.children.len == 0
    }
}

pub(crate) fn slot_to_ino(slot: usize) -> InodeNo {
    InodeNo(slot as u64 + 1)
}

/// Slot for an inode number, if the number is in `1..=capacity`.
pub(crate) fn ino_to_slot(ino: InodeNo, capacity: usize) -> Option<usize> {
    let n = ino.get();
    if n == 0 || n > capacity as u64 {
        None
    } else {
        Some((n - 1) as usize)
    }
}
