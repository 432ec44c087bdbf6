//! Per-mount context.
//!
//! `VtreeFs` owns the provider, the inode arena and the configuration of
//! one mounted tree, and serves requests against them through [`FsOps`].
//! A tree is mounted by constructing it and unmounted by consuming it, so
//! requests can only ever reach a mounted tree.

use tracing::{debug, info};
use vtreefs_types::{make_error_msg, DevNo, InodeNo, Result, Status, StatusCode};

use crate::arena::InodeArena;
use crate::config::VtreeConfig;
use crate::enumerate;
use crate::ops::{FsOps, LookupRequest};
use crate::path_resolve::{PathResolver, Resolution, ResolveLimits};
use crate::provider::Provider;
use crate::read;
use crate::reply::{Listing, LookupReply, MountReply, NodeDetails, ReadOutcome};
use crate::types::{Credentials, InodeStat, StatVfs};

pub struct VtreeFs<P: Provider> {
    provider: P,
    arena: InodeArena<P::Handle>,
    config: VtreeConfig,
    dev: DevNo,
}

impl<P: Provider> VtreeFs<P> {
    /// Build the tree and run the provider's init hook.
    ///
    /// `root_stat` must describe a directory; `root_indexed` is its
    /// declared number of indexed children.
    pub fn mount(
        mut provider: P,
        config: VtreeConfig,
        dev: DevNo,
        root_stat: InodeStat,
        root_indexed: u32,
    ) -> Result<(Self, MountReply)> {
        config
            .validate()
            .map_err(|e| Status::with_message(StatusCode::INVALID_CONFIG, e.to_string()))?;
        if !root_stat.is_dir() {
            return make_error_msg(StatusCode::INVALID_ARG, "root must be a directory");
        }

        let mut arena = InodeArena::new(
            config.nr_inodes,
            root_stat,
            root_indexed,
            config.max_name_len,
        );
        provider.init(&mut arena)?;

        let root = arena.root();
        info!(%dev, nr_inodes = config.nr_inodes, in_use = arena.in_use(), "mounted");
        let fs = Self {
            provider,
            arena,
            config,
            dev,
        };
        let reply = MountReply {
            root,
            stat: root_stat,
            dev,
        };
        Ok((fs, reply))
    }

    /// Run the provider's cleanup hook and hand the provider back.
    pub fn unmount(mut self) -> P {
        self.provider.cleanup(&mut self.arena);
        info!(dev = %self.dev, in_use = self.arena.in_use(), "unmounted");
        self.provider
    }

    pub fn arena(&self) -> &InodeArena<P::Handle> {
        &self.arena
    }

    pub fn arena_mut(&mut self) -> &mut InodeArena<P::Handle> {
        &mut self.arena
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn provider_mut(&mut self) -> &mut P {
        &mut self.provider
    }

    /// Provider and arena together, for embedder code that updates the
    /// tree between requests.
    pub fn parts_mut(&mut self) -> (&mut P, &mut InodeArena<P::Handle>) {
        (&mut self.provider, &mut self.arena)
    }

    pub fn config(&self) -> &VtreeConfig {
        &self.config
    }

    pub fn dev(&self) -> DevNo {
        self.dev
    }

    fn details(&self, ino: InodeNo) -> Result<NodeDetails> {
        let node = self.arena.get(ino)?;
        Ok(NodeDetails {
            ino,
            stat: *node.stat(),
            dev: self.dev,
        })
    }
}

impl<P: Provider> FsOps for VtreeFs<P> {
    fn put_node(&mut self, ino: InodeNo, count: u32) -> Result<()> {
        debug!(%ino, count, "put_node");
        let held = self.arena.get(ino)?.ref_count();
        if count == 0 || count > held {
            return make_error_msg(
                StatusCode::INVALID_ARG,
                format!("releasing {count} references on inode {ino}, {held} held"),
            );
        }
        self.arena.release_many(ino, count);
        Ok(())
    }

    fn lookup(&mut self, req: &LookupRequest<'_>) -> Result<LookupReply> {
        debug!(dir = %req.dir, path = req.path, follow = req.follow_last, "lookup");
        let creds = req.creds.clone().unwrap_or_else(Credentials::root);
        let limits = ResolveLimits::from(&self.config);

        self.arena.acquire(req.dir)?;
        let resolution = PathResolver::new(&mut self.provider, &mut self.arena, &creds, limits)
            .with_symlinks(req.symlinks)
            .resolve(req.dir, req.path, req.root, req.follow_last)?;

        Ok(match resolution {
            Resolution::Found(ino) => LookupReply::Node(self.details(ino)?),
            Resolution::LeaveBoundary {
                path,
                offset,
                symlinks,
            } => LookupReply::LeaveBoundary {
                path,
                offset,
                symlinks,
            },
            Resolution::Symlink { path, symlinks } => LookupReply::Symlink { path, symlinks },
        })
    }

    fn read(&mut self, ino: InodeNo, offset: u64, dest: &mut [u8]) -> Result<ReadOutcome> {
        read::read_file(
            &mut self.provider,
            &self.arena,
            ino,
            offset,
            dest,
            self.config.read_buf_size,
        )
    }

    fn getdents(&mut self, ino: InodeNo, position: u64, dest: &mut [u8]) -> Result<Listing> {
        enumerate::list(
            &mut self.provider,
            &mut self.arena,
            ino,
            position,
            dest,
            self.config.getdents_buf_size,
        )
    }

    fn readlink(&mut self, ino: InodeNo, dest: &mut [u8]) -> Result<usize> {
        read::read_link(&mut self.provider, &self.arena, ino, dest)
    }

    fn stat(&mut self, ino: InodeNo) -> Result<NodeDetails> {
        self.details(ino)
    }

    fn statvfs(&mut self) -> Result<StatVfs> {
        self.provider.statvfs(&self.arena)
    }
}
