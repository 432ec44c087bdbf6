//! Scripted provider for unit tests.

use std::collections::HashMap;

use vtreefs_types::{make_error, InodeNo, Result, StatusCode, VtreeCode};

use crate::arena::InodeArena;
use crate::provider::Provider;
use crate::types::InodeStat;

pub(crate) fn root_stat() -> InodeStat {
    InodeStat::directory(0o755)
}

pub(crate) fn new_arena(capacity: usize) -> InodeArena<u32> {
    InodeArena::new(capacity, root_stat(), 0, 255)
}

/// Provider whose file contents and link targets are keyed by the handle
/// it hands out, so recycled inode numbers never see stale data.
#[derive(Debug, Default)]
pub(crate) struct MockProvider {
    next_handle: u32,
    contents: HashMap<u32, Vec<u8>>,
    targets: HashMap<u32, String>,

    /// `(parent, name)` pairs the lookup hook creates on first use.
    pub lazy: Vec<(InodeNo, String)>,
    /// Inodes the refresh hook deletes.
    pub prune_on_refresh: Vec<InodeNo>,
    /// Names the lookup hook fails for with `BUSY`.
    pub busy: Vec<String>,

    pub inits: usize,
    pub cleanups: usize,
    pub lookups: usize,
    pub refreshes: usize,
    pub reads: usize,
    pub readlinks: usize,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&mut self) -> u32 {
        self.next_handle += 1;
        self.next_handle
    }

    pub fn add_dir(
        &mut self,
        arena: &mut InodeArena<u32>,
        parent: InodeNo,
        name: &str,
        index: Option<u32>,
    ) -> InodeNo {
        let h = self.handle();
        arena
            .create(parent, name, index, InodeStat::directory(0o755), 0, h)
            .unwrap()
    }

    pub fn add_file(
        &mut self,
        arena: &mut InodeArena<u32>,
        parent: InodeNo,
        name: &str,
        index: Option<u32>,
        contents: &[u8],
    ) -> InodeNo {
        let h = self.handle();
        self.contents.insert(h, contents.to_vec());
        let stat = InodeStat::regular(0o644, contents.len() as u64);
        arena.create(parent, name, index, stat, 0, h).unwrap()
    }

    pub fn add_symlink(
        &mut self,
        arena: &mut InodeArena<u32>,
        parent: InodeNo,
        name: &str,
        target: &str,
    ) -> InodeNo {
        let h = self.handle();
        self.targets.insert(h, target.to_string());
        arena
            .create(parent, name, None, InodeStat::symlink(), 0, h)
            .unwrap()
    }

    fn handle_of(arena: &InodeArena<u32>, ino: InodeNo) -> Result<u32> {
        match arena.get(ino)?.handle() {
            Some(h) => Ok(*h),
            None => make_error(StatusCode::FOUND_BUG),
        }
    }
}

impl Provider for MockProvider {
    type Handle = u32;

    fn init(&mut self, _arena: &mut InodeArena<u32>) -> Result<()> {
        self.inits += 1;
        Ok(())
    }

    fn cleanup(&mut self, _arena: &mut InodeArena<u32>) {
        self.cleanups += 1;
    }

    fn lookup(&mut self, arena: &mut InodeArena<u32>, parent: InodeNo, name: &str) -> Result<()> {
        self.lookups += 1;
        if self.busy.iter().any(|n| n == name) {
            return make_error(VtreeCode::BUSY);
        }
        let wanted = self.lazy.iter().any(|(p, n)| *p == parent && n == name);
        if wanted && arena.lookup_by_name(parent, name).is_none() {
            self.add_file(arena, parent, name, None, name.as_bytes());
        }
        Ok(())
    }

    fn refresh_directory(&mut self, arena: &mut InodeArena<u32>, _dir: InodeNo) -> Result<()> {
        self.refreshes += 1;
        for ino in std::mem::take(&mut self.prune_on_refresh) {
            if arena.get(ino).map(|n| !n.is_deleted()).unwrap_or(false) {
                arena.mark_deleted(ino);
            }
        }
        Ok(())
    }

    fn read(
        &mut self,
        arena: &InodeArena<u32>,
        ino: InodeNo,
        offset: u64,
        len: usize,
    ) -> Result<&[u8]> {
        self.reads += 1;
        let h = Self::handle_of(arena, ino)?;
        let data = self.contents.get(&h).map(Vec::as_slice).unwrap_or(&[]);
        let start = (offset as usize).min(data.len());
        let end = start.saturating_add(len).min(data.len());
        Ok(&data[start..end])
    }

    fn readlink(&mut self, arena: &InodeArena<u32>, ino: InodeNo) -> Result<String> {
        self.readlinks += 1;
        let h = Self::handle_of(arena, ino)?;
        match self.targets.get(&h) {
            Some(t) => Ok(t.clone()),
            None => make_error(StatusCode::IO_ERROR),
        }
    }
}
