//! Hooks an embedder implements to back the tree with data.
//!
//! The engine owns the inode arena; the provider owns everything else. Each
//! hook receives the arena so it can materialize, update or delete nodes,
//! and every hook has a default so a provider only writes the ones it
//! needs. Hooks run inline on the request path.

use vtreefs_types::{make_error_msg, InodeNo, Result, StatusCode};

use crate::arena::InodeArena;
use crate::types::StatVfs;

/// Default block size reported by statvfs.
pub const DEFAULT_BLOCK_SIZE: u64 = 4096;

pub trait Provider {
    /// Per-inode value the provider attaches when it creates a node. The
    /// arena drops it when the slot is recycled.
    type Handle;

    /// Called once at mount, after the root exists.
    fn init(&mut self, arena: &mut InodeArena<Self::Handle>) -> Result<()> {
        let _ = arena;
        Ok(())
    }

    /// Called once at unmount.
    fn cleanup(&mut self, arena: &mut InodeArena<Self::Handle>) {
        let _ = arena;
    }

    /// Called before `name` is looked up under `parent` during path
    /// resolution, so the provider can create the child lazily. An error
    /// aborts the resolution.
    fn lookup(
        &mut self,
        arena: &mut InodeArena<Self::Handle>,
        parent: InodeNo,
        name: &str,
    ) -> Result<()> {
        let _ = (arena, parent, name);
        Ok(())
    }

    /// Called before a directory is listed, so the provider can add or
    /// delete children.
    fn refresh_directory(
        &mut self,
        arena: &mut InodeArena<Self::Handle>,
        dir: InodeNo,
    ) -> Result<()> {
        let _ = (arena, dir);
        Ok(())
    }

    /// Bytes of a regular file starting at `offset`, at most `len` of them.
    /// An empty slice means end of file. The slice is borrowed from the
    /// provider and copied out by the caller.
    fn read(
        &mut self,
        arena: &InodeArena<Self::Handle>,
        ino: InodeNo,
        offset: u64,
        len: usize,
    ) -> Result<&[u8]> {
        let _ = (arena, offset, len);
        make_error_msg(StatusCode::NOT_SUPPORTED, format!("read of inode {ino}"))
    }

    /// Target of a symbolic link.
    fn readlink(&mut self, arena: &InodeArena<Self::Handle>, ino: InodeNo) -> Result<String> {
        let _ = arena;
        make_error_msg(StatusCode::NOT_SUPPORTED, format!("readlink of inode {ino}"))
    }

    /// Filesystem statistics. The default reports the arena's slot usage
    /// and name limit with no data blocks.
    fn statvfs(&self, arena: &InodeArena<Self::Handle>) -> Result<StatVfs> {
        Ok(StatVfs {
            bsize: DEFAULT_BLOCK_SIZE,
            blocks: 0,
            bfree: 0,
            bavail: 0,
            files: arena.capacity() as u64,
            ffree: arena.free_count() as u64,
            namemax: arena.max_name_len() as u32,
        })
    }
}
