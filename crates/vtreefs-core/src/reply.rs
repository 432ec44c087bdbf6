//! Reply types for the request surface.
//!
//! A transport turns these into whatever its wire format needs. Reads,
//! listings and readlink replies are plain byte counts into the caller's
//! buffer and reuse [`ReadOutcome`] and [`Listing`].

use vtreefs_types::{is_redirect, status_code_t, DevNo, InodeNo, StatusCode, VtreeCode};

use crate::types::InodeStat;

pub use crate::enumerate::Listing;
pub use crate::read::ReadOutcome;

/// Reply for mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountReply {
    pub root: InodeNo,
    pub stat: InodeStat,
    pub dev: DevNo,
}

/// Reply for stat, and the node half of a lookup reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeDetails {
    pub ino: InodeNo,
    pub stat: InodeStat,
    pub dev: DevNo,
}

/// Reply for lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupReply {
    /// The path resolved. The requester now holds one reference on the
    /// node and gives it back with put_node.
    Node(NodeDetails),
    /// Continue in the enclosing namespace with `path[offset..]`.
    LeaveBoundary {
        path: String,
        offset: usize,
        symlinks: u32,
    },
    /// Restart from the requester's root with `path`.
    Symlink { path: String, symlinks: u32 },
}

impl LookupReply {
    /// Status code a transport sends alongside the reply.
    pub fn code(&self) -> status_code_t {
        match self {
            LookupReply::Node(_) => StatusCode::OK,
            LookupReply::LeaveBoundary { .. } => VtreeCode::LEAVE_BOUNDARY,
            LookupReply::Symlink { .. } => VtreeCode::IS_SYMLINK,
        }
    }

    /// The lookup stopped early and the requester must continue it.
    pub fn is_redirect(&self) -> bool {
        is_redirect(self.code())
    }
}
