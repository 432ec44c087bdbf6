//! Value types shared by the arena, the resolver and the request surface.

use serde::{Deserialize, Serialize};
use vtreefs_types::{Gid, Uid, SUPER_USER};

// ── Mode bits (matching libc S_IF* / S_IX* constants) ───────────────────────

pub const S_IFMT: u32 = libc::S_IFMT as u32;
pub const S_IFREG: u32 = libc::S_IFREG as u32;
pub const S_IFDIR: u32 = libc::S_IFDIR as u32;
pub const S_IFLNK: u32 = libc::S_IFLNK as u32;
pub const S_IFCHR: u32 = libc::S_IFCHR as u32;
pub const S_IFBLK: u32 = libc::S_IFBLK as u32;
pub const S_IFIFO: u32 = libc::S_IFIFO as u32;
pub const S_IFSOCK: u32 = libc::S_IFSOCK as u32;

pub const S_IXUSR: u32 = libc::S_IXUSR as u32;
pub const S_IXGRP: u32 = libc::S_IXGRP as u32;
pub const S_IXOTH: u32 = libc::S_IXOTH as u32;

// ── File kind ───────────────────────────────────────────────────────────────

/// The type of object an inode represents, decoded from its mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileKind {
    Regular,
    Directory,
    Symlink,
    CharDevice,
    BlockDevice,
    Fifo,
    Socket,
    Unknown,
}

impl FileKind {
    pub fn from_mode(mode: u32) -> Self {
        match mode & S_IFMT {
            S_IFREG => FileKind::Regular,
            S_IFDIR => FileKind::Directory,
            S_IFLNK => FileKind::Symlink,
            S_IFCHR => FileKind::CharDevice,
            S_IFBLK => FileKind::BlockDevice,
            S_IFIFO => FileKind::Fifo,
            S_IFSOCK => FileKind::Socket,
            _ => FileKind::Unknown,
        }
    }

    /// The `d_type` byte written into directory records.
    pub fn dirent_type(self) -> u8 {
        match self {
            FileKind::Regular => libc::DT_REG,
            FileKind::Directory => libc::DT_DIR,
            FileKind::Symlink => libc::DT_LNK,
            FileKind::CharDevice => libc::DT_CHR,
            FileKind::BlockDevice => libc::DT_BLK,
            FileKind::Fifo => libc::DT_FIFO,
            FileKind::Socket => libc::DT_SOCK,
            FileKind::Unknown => libc::DT_UNKNOWN,
        }
    }

    pub fn from_dirent_type(d_type: u8) -> Self {
        match d_type {
            libc::DT_REG => FileKind::Regular,
            libc::DT_DIR => FileKind::Directory,
            libc::DT_LNK => FileKind::Symlink,
            libc::DT_CHR => FileKind::CharDevice,
            libc::DT_BLK => FileKind::BlockDevice,
            libc::DT_FIFO => FileKind::Fifo,
            libc::DT_SOCK => FileKind::Socket,
            _ => FileKind::Unknown,
        }
    }
}

// ── Stat block ──────────────────────────────────────────────────────────────

/// Provider-supplied attributes of an inode.
///
/// The arena only ever looks at the type bits of `mode` and, during path
/// resolution, at the owner, group and execute bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InodeStat {
    /// File type and permission bits.
    pub mode: u32,
    pub uid: Uid,
    pub gid: Gid,
    pub size: u64,
    /// Device number for character and block special files.
    pub rdev: u64,
}

impl InodeStat {
    pub fn directory(perm: u32) -> Self {
        Self::with_type(S_IFDIR, perm)
    }

    pub fn regular(perm: u32, size: u64) -> Self {
        Self {
            size,
            ..Self::with_type(S_IFREG, perm)
        }
    }

    pub fn symlink() -> Self {
        Self::with_type(S_IFLNK, 0o777)
    }

    fn with_type(file_type: u32, perm: u32) -> Self {
        Self {
            mode: file_type | (perm & 0o7777),
            uid: Uid(0),
            gid: Gid(0),
            size: 0,
            rdev: 0,
        }
    }

    pub fn owned_by(self, uid: Uid, gid: Gid) -> Self {
        Self { uid, gid, ..self }
    }

    pub fn kind(&self) -> FileKind {
        FileKind::from_mode(self.mode)
    }

    pub fn is_dir(&self) -> bool {
        self.mode & S_IFMT == S_IFDIR
    }

    pub fn is_symlink(&self) -> bool {
        self.mode & S_IFMT == S_IFLNK
    }

    pub fn is_regular(&self) -> bool {
        self.mode & S_IFMT == S_IFREG
    }
}

// ── Credentials ─────────────────────────────────────────────────────────────

/// Identity of the process a lookup is performed for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub uid: Uid,
    pub gid: Gid,
    /// Supplementary groups.
    pub groups: Vec<Gid>,
}

impl Credentials {
    pub fn new(uid: Uid, gid: Gid, groups: Vec<Gid>) -> Self {
        Self { uid, gid, groups }
    }

    pub fn root() -> Self {
        Self::new(SUPER_USER, Gid(0), Vec::new())
    }

    pub fn is_super_user(&self) -> bool {
        self.uid == SUPER_USER
    }

    /// Whether these credentials may search (traverse) a directory.
    ///
    /// The permission class is picked first: owner if the uid matches,
    /// group if the primary or any supplementary gid matches, other
    /// otherwise. Only that class's execute bit counts.
    pub fn can_search(&self, stat: &InodeStat) -> bool {
        if self.is_super_user() {
            return true;
        }
        let mask = if self.uid == stat.uid {
            S_IXUSR
        } else if self.gid == stat.gid || self.groups.contains(&stat.gid) {
            S_IXGRP
        } else {
            S_IXOTH
        };
        stat.mode & mask != 0
    }
}

// ── Filesystem statistics ───────────────────────────────────────────────────

/// Filesystem statistics returned by statvfs. Mirrors `struct statvfs`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatVfs {
    pub bsize: u64,
    pub blocks: u64,
    pub bfree: u64,
    pub bavail: u64,
    /// Total inode slots.
    pub files: u64,
    /// Unused inode slots.
    pub ffree: u64,
    pub namemax: u32,
}
