//! Request surface.
//!
//! One method per request a filesystem client can send. Every method has a
//! default that fails with `NOT_SUPPORTED`, so an implementation only
//! overrides what it serves. The tree is read-only: the mutating requests
//! keep their defaults in [`VtreeFs`](crate::VtreeFs).
//!
//! Requests run one at a time; methods take `&mut self`.

use vtreefs_types::{make_error_msg, Gid, InodeNo, Result, StatusCode, Uid};

use crate::reply::{Listing, LookupReply, NodeDetails, ReadOutcome};
use crate::types::{Credentials, StatVfs};

/// Parameters of a path lookup.
#[derive(Debug, Clone)]
pub struct LookupRequest<'a> {
    /// Directory the path is relative to.
    pub dir: InodeNo,
    /// The requester's root, if inside this tree. `..` stops there.
    pub root: Option<InodeNo>,
    pub path: &'a str,
    /// `None` means the super-user.
    pub creds: Option<Credentials>,
    /// Expand a symlink in the final component.
    pub follow_last: bool,
    /// Symlinks already traversed before this request.
    pub symlinks: u32,
}

impl<'a> LookupRequest<'a> {
    pub fn new(dir: InodeNo, path: &'a str) -> Self {
        Self {
            dir,
            root: None,
            path,
            creds: None,
            follow_last: true,
            symlinks: 0,
        }
    }

    pub fn with_root(self, root: InodeNo) -> Self {
        Self {
            root: Some(root),
            ..self
        }
    }

    pub fn with_creds(self, creds: Credentials) -> Self {
        Self {
            creds: Some(creds),
            ..self
        }
    }

    pub fn no_follow(self) -> Self {
        Self {
            follow_last: false,
            ..self
        }
    }

    pub fn with_symlinks(self, symlinks: u32) -> Self {
        Self { symlinks, ..self }
    }
}

fn not_supported<T>(op: &str) -> Result<T> {
    make_error_msg(StatusCode::NOT_SUPPORTED, op.to_string())
}

pub trait FsOps {
    // ── References ──────────────────────────────────────────────────────

    /// Drop `count` references the requester holds on `ino`.
    fn put_node(&mut self, ino: InodeNo, count: u32) -> Result<()> {
        let _ = (ino, count);
        not_supported("put_node")
    }

    // ── Lookup ──────────────────────────────────────────────────────────

    fn lookup(&mut self, req: &LookupRequest<'_>) -> Result<LookupReply> {
        let _ = req;
        not_supported("lookup")
    }

    // ── Data ────────────────────────────────────────────────────────────

    fn read(&mut self, ino: InodeNo, offset: u64, dest: &mut [u8]) -> Result<ReadOutcome> {
        let _ = (ino, offset, dest);
        not_supported("read")
    }

    fn write(&mut self, ino: InodeNo, offset: u64, data: &[u8]) -> Result<usize> {
        let _ = (ino, offset, data);
        not_supported("write")
    }

    fn truncate(&mut self, ino: InodeNo, start: u64, end: u64) -> Result<()> {
        let _ = (ino, start, end);
        not_supported("truncate")
    }

    // ── Directories ─────────────────────────────────────────────────────

    fn getdents(&mut self, ino: InodeNo, position: u64, dest: &mut [u8]) -> Result<Listing> {
        let _ = (ino, position, dest);
        not_supported("getdents")
    }

    fn create(
        &mut self,
        dir: InodeNo,
        name: &str,
        mode: u32,
        uid: Uid,
        gid: Gid,
    ) -> Result<NodeDetails> {
        let _ = (dir, name, mode, uid, gid);
        not_supported("create")
    }

    fn mkdir(&mut self, dir: InodeNo, name: &str, mode: u32, uid: Uid, gid: Gid) -> Result<()> {
        let _ = (dir, name, mode, uid, gid);
        not_supported("mkdir")
    }

    fn mknod(
        &mut self,
        dir: InodeNo,
        name: &str,
        mode: u32,
        uid: Uid,
        gid: Gid,
        rdev: u64,
    ) -> Result<()> {
        let _ = (dir, name, mode, uid, gid, rdev);
        not_supported("mknod")
    }

    fn unlink(&mut self, dir: InodeNo, name: &str) -> Result<()> {
        let _ = (dir, name);
        not_supported("unlink")
    }

    fn rmdir(&mut self, dir: InodeNo, name: &str) -> Result<()> {
        let _ = (dir, name);
        not_supported("rmdir")
    }

    fn rename(
        &mut self,
        old_dir: InodeNo,
        old_name: &str,
        new_dir: InodeNo,
        new_name: &str,
    ) -> Result<()> {
        let _ = (old_dir, old_name, new_dir, new_name);
        not_supported("rename")
    }

    fn link(&mut self, dir: InodeNo, name: &str, ino: InodeNo) -> Result<()> {
        let _ = (dir, name, ino);
        not_supported("link")
    }

    // ── Symlinks ────────────────────────────────────────────────────────

    fn readlink(&mut self, ino: InodeNo, dest: &mut [u8]) -> Result<usize> {
        let _ = (ino, dest);
        not_supported("readlink")
    }

    fn symlink(
        &mut self,
        dir: InodeNo,
        name: &str,
        target: &str,
        uid: Uid,
        gid: Gid,
    ) -> Result<()> {
        let _ = (dir, name, target, uid, gid);
        not_supported("symlink")
    }

    // ── Attributes ──────────────────────────────────────────────────────

    fn stat(&mut self, ino: InodeNo) -> Result<NodeDetails> {
        let _ = ino;
        not_supported("stat")
    }

    /// Returns the new mode.
    fn chmod(&mut self, ino: InodeNo, mode: u32) -> Result<u32> {
        let _ = (ino, mode);
        not_supported("chmod")
    }

    fn chown(&mut self, ino: InodeNo, uid: Uid, gid: Gid) -> Result<()> {
        let _ = (ino, uid, gid);
        not_supported("chown")
    }

    fn utime(&mut self, ino: InodeNo, atime: i64, mtime: i64) -> Result<()> {
        let _ = (ino, atime, mtime);
        not_supported("utime")
    }

    fn statvfs(&mut self) -> Result<StatVfs> {
        not_supported("statvfs")
    }
}
