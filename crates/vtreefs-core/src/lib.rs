//! vtreefs-core: a reusable in-memory virtual filesystem tree.
//!
//! A data provider (device state, configuration, any synthetic hierarchy)
//! exposes a POSIX-like directory tree to a filesystem client without
//! writing its own inode management, path resolution or directory listing.
//!
//! # Architecture
//!
//! - **[`hash_index`]** - open-chained `(parent, name)` and
//!   `(parent, index)` tables over arena slots.
//! - **[`arena`]** - [`InodeArena`], a fixed-capacity inode table with a
//!   free list, reference counts, deferred deletion and eviction of
//!   regenerable entries.
//! - **[`path_resolve`]** - [`PathResolver`], component-by-component path
//!   walking with `..`, symlink expansion and boundary redirects.
//! - **[`enumerate`]** - resumable directory listing serialized through
//!   the [`dirent`] record codec.
//! - **[`read`]** - copies provider byte ranges into caller buffers.
//! - **[`provider`]** - the [`Provider`] hooks an embedder implements.
//! - **[`ops`]** / **[`reply`]** - the request surface; [`VtreeFs`] in
//!   [`mount`] is the per-mount context that implements it.
//!
//! Everything runs on the caller's thread, one request at a time. Provider
//! hooks are called inline; a hook that blocks stalls the whole service.

pub mod arena;
pub mod config;
pub mod dirent;
pub mod enumerate;
pub mod hash_index;
pub mod inode;
pub mod mount;
pub mod ops;
pub mod path_resolve;
pub mod provider;
pub mod read;
pub mod reply;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use arena::InodeArena;
pub use config::{ConfigError, VtreeConfig};
pub use mount::VtreeFs;
pub use ops::FsOps;
pub use path_resolve::{PathResolver, Resolution};
pub use provider::Provider;
pub use types::{Credentials, FileKind, InodeStat, StatVfs};
