//! Copying provider data into caller buffers.

use tracing::debug;
use vtreefs_types::{make_error_msg, InodeNo, Result, StatusCode};

use crate::arena::InodeArena;
use crate::provider::Provider;

/// Result of a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOutcome {
    pub bytes: usize,
    /// Offset just past the last byte returned.
    pub next_offset: u64,
}

/// Read from a regular file at `offset` into `dest`, at most `max_len`
/// bytes. Zero bytes means end of file.
pub fn read_file<P: Provider>(
    provider: &mut P,
    arena: &InodeArena<P::Handle>,
    ino: InodeNo,
    offset: u64,
    dest: &mut [u8],
    max_len: usize,
) -> Result<ReadOutcome> {
    let node = arena.get(ino)?;
    if node.is_deleted() {
        return make_error_msg(StatusCode::IO_ERROR, format!("inode {ino} was deleted"));
    }
    if !node.stat().is_regular() {
        return make_error_msg(StatusCode::INVALID_ARG, format!("inode {ino} is not a file"));
    }

    let want = dest.len().min(max_len);
    if want == 0 {
        return Ok(ReadOutcome {
            bytes: 0,
            next_offset: offset,
        });
    }
    let data = provider.read(arena, ino, offset, want)?;
    let n = data.len().min(want);
    dest[..n].copy_from_slice(&data[..n]);

    debug!(%ino, offset, want, got = n, "read");
    Ok(ReadOutcome {
        bytes: n,
        next_offset: offset + n as u64,
    })
}

/// Copy a symlink's target into `dest`, truncating it to fit. Returns the
/// number of bytes copied.
pub fn read_link<P: Provider>(
    provider: &mut P,
    arena: &InodeArena<P::Handle>,
    ino: InodeNo,
    dest: &mut [u8],
) -> Result<usize> {
    let node = arena.get(ino)?;
    if !node.is_symlink() {
        return make_error_msg(StatusCode::INVALID_ARG, format!("inode {ino} is not a symlink"));
    }
    let target = provider.readlink(arena, ino)?;
    let n = target.len().min(dest.len());
    dest[..n].copy_from_slice(&target.as_bytes()[..n]);
    debug!(%ino, len = target.len(), copied = n, "readlink");
    Ok(n)
}
