//! Resumable directory listing.
//!
//! A listing position fully describes where the next call picks up:
//!
//! | position          | entry                                             |
//! |-------------------|---------------------------------------------------|
//! | 0                 | `.`                                               |
//! | 1                 | `..` (the directory itself for the root)          |
//! | 2 ..= K+1         | indexed child `position - 2`, skipped if absent   |
//! | K+2 ..            | other children in storage order                   |
//!
//! K is the directory's declared indexed-entry count. Children whose
//! index is K or more fall in the last region with the unindexed ones.

use bytes::BytesMut;
use tracing::debug;
use vtreefs_types::{make_error_msg, InodeNo, Result, StatusCode, VtreeCode};

use crate::arena::InodeArena;
use crate::dirent::{encode, record_len};
use crate::provider::Provider;
use crate::types::FileKind;

/// Result of one listing call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Listing {
    /// Bytes of records written to the destination.
    pub bytes: usize,
    /// Position to pass to the next call.
    pub next_position: u64,
    /// No entries remain past `next_position`.
    pub end: bool,
}

/// Packs records into a staging buffer and flushes it into the caller's
/// destination whenever the next record would overflow it.
struct DirentWriter<'a> {
    dest: &'a mut [u8],
    written: usize,
    staging: BytesMut,
    staging_size: usize,
}

impl<'a> DirentWriter<'a> {
    fn new(dest: &'a mut [u8], staging_size: usize) -> Self {
        Self {
            dest,
            written: 0,
            staging: BytesMut::with_capacity(staging_size),
            staging_size,
        }
    }

    /// Add a record. `Ok(false)` means the destination is full.
    fn push(&mut self, ino: InodeNo, kind: FileKind, name: &str) -> Result<bool> {
        let len = record_len(name.len());
        let used = self.written + self.staging.len();
        if used + len > self.dest.len() {
            if used == 0 {
                return make_error_msg(
                    StatusCode::INVALID_ARG,
                    format!("buffer of {} bytes cannot hold a {len}-byte record", self.dest.len()),
                );
            }
            return Ok(false);
        }
        if self.staging.len() + len > self.staging_size {
            self.flush();
        }
        encode(&mut self.staging, ino, kind, name);
        Ok(true)
    }

    fn flush(&mut self) {
        let n = self.staging.len();
        self.dest[self.written..self.written + n].copy_from_slice(&self.staging);
        self.written += n;
        self.staging.clear();
    }

    fn finish(mut self) -> usize {
        self.flush();
        self.written
    }
}

/// List `dir` from `position` into `dest`.
///
/// The provider's refresh hook runs first unless the directory is
/// deleted. Deleted children are never listed. Fails with `INVALID_ARG`
/// when `dest` cannot hold even the first record.
pub fn list<P: Provider>(
    provider: &mut P,
    arena: &mut InodeArena<P::Handle>,
    dir: InodeNo,
    position: u64,
    dest: &mut [u8],
    staging_size: usize,
) -> Result<Listing> {
    let node = arena.get(dir)?;
    if !node.is_dir() {
        return make_error_msg(VtreeCode::NOT_DIRECTORY, format!("inode {dir}"));
    }
    if !node.is_deleted() {
        provider.refresh_directory(arena, dir)?;
    }

    let arena = &*arena;
    let indexed = u64::from(arena.get(dir)?.indexed_entries());
    let mut out = DirentWriter::new(dest, staging_size);
    let mut pos = position;

    while pos < 2 + indexed {
        let entry = match pos {
            0 => Some((dir, FileKind::Directory, ".")),
            1 => {
                let parent = arena.parent(dir)?.unwrap_or(dir);
                Some((parent, FileKind::Directory, ".."))
            }
            _ => arena.lookup_by_index(dir, (pos - 2) as u32).map(|c| {
                let child = arena.node(c);
                (c, child.kind(), child.name())
            }),
        };
        if let Some((ino, kind, name)) = entry {
            if !out.push(ino, kind, name)? {
                return Ok(finish(out, dir, position, pos, false));
            }
        }
        pos += 1;
    }

    let skip = (pos - 2 - indexed) as usize;
    let rest = arena
        .children(dir)
        .filter(|&c| match arena.node(c).index() {
            Some(i) => u64::from(i) >= indexed,
            None => true,
        })
        .skip(skip);
    for c in rest {
        let child = arena.node(c);
        if !out.push(c, child.kind(), child.name())? {
            return Ok(finish(out, dir, position, pos, false));
        }
        pos += 1;
    }

    Ok(finish(out, dir, position, pos, true))
}

fn finish(out: DirentWriter<'_>, dir: InodeNo, from: u64, pos: u64, end: bool) -> Listing {
    let listing = Listing {
        bytes: out.finish(),
        next_position: pos,
        end,
    };
    debug!(%dir, from, next = pos, bytes = listing.bytes, end, "listed directory");
    listing
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dirent::decode;
    use crate::testing::{new_arena, MockProvider};

    fn list_all(
        provider: &mut MockProvider,
        arena: &mut InodeArena<u32>,
        dir: InodeNo,
        buf_size: usize,
        staging: usize,
    ) -> Vec<(InodeNo, String)> {
        let mut out = Vec::new();
        let mut pos = 0;
        loop {
            let mut buf = vec![0u8; buf_size];
            let l = list(provider, arena, dir, pos, &mut buf, staging).unwrap();
            out.extend(decode(&buf[..l.bytes]).map(|r| (r.ino, r.name)));
            pos = l.next_position;
            if l.end {
                return out;
            }
            assert!(l.bytes > 0, "no progress at position {pos}");
        }
    }

    fn names(entries: &[(InodeNo, String)]) -> Vec<&str> {
        entries.iter().map(|(_, n)| n.as_str()).collect()
    }

    #[test]
    fn test_list_nested_directory() {
        let mut p = MockProvider::new();
        let mut arena = new_arena(16);
        let root = arena.root();
        let a = p.add_dir(&mut arena, root, "a", Some(0));
        let b = p.add_file(&mut arena, a, "b", None, b"");

        let mut buf = vec![0u8; 4096];
        let l = list(&mut p, &mut arena, a, 0, &mut buf, 4096).unwrap();
        assert!(l.end);
        assert_eq!(l.next_position, 3);
        let recs: Vec<_> = decode(&buf[..l.bytes]).collect();
        let got: Vec<_> = recs.iter().map(|r| (r.ino, r.name.as_str(), r.kind)).collect();
        assert_eq!(
            got,
            [
                (a, ".", FileKind::Directory),
                (root, "..", FileKind::Directory),
                (b, "b", FileKind::Regular),
            ]
        );
        assert_eq!(p.refreshes, 1);
    }

    #[test]
    fn test_root_dotdot_is_itself() {
        let mut p = MockProvider::new();
        let mut arena = new_arena(4);
        let root = arena.root();
        let entries = list_all(&mut p, &mut arena, root, 4096, 4096);
        assert_eq!(entries, [(root, ".".to_string()), (root, "..".to_string())]);
    }

    #[test]
    fn test_indexed_region_then_others() {
        let mut p = MockProvider::new();
        let mut arena = new_arena(32);
        let root = arena.root();
        let d = p.add_dir(&mut arena, root, "d", None);
        arena.get_mut(d).unwrap().set_indexed_entries(4);

        p.add_file(&mut arena, d, "named1", None, b"");
        p.add_file(&mut arena, d, "i2", Some(2), b"");
        p.add_file(&mut arena, d, "beyond", Some(9), b"");
        p.add_file(&mut arena, d, "i0", Some(0), b"");
        p.add_file(&mut arena, d, "named2", None, b"");

        let entries = list_all(&mut p, &mut arena, d, 4096, 4096);
        assert_eq!(
            names(&entries),
            [".", "..", "i0", "i2", "named1", "beyond", "named2"]
        );
    }

    #[test]
    fn test_resumes_with_small_buffers() {
        let mut p = MockProvider::new();
        let mut arena = new_arena(64);
        let root = arena.root();
        let d = p.add_dir(&mut arena, root, "d", None);
        arena.get_mut(d).unwrap().set_indexed_entries(6);
        for i in [0u32, 1, 3, 5] {
            p.add_file(&mut arena, d, &format!("idx{i}"), Some(i), b"");
        }
        for n in ["x", "a-rather-long-entry-name", "yy", "z"] {
            p.add_file(&mut arena, d, n, None, b"");
        }

        let expected = list_all(&mut p, &mut arena, d, 4096, 4096);
        assert_eq!(expected.len(), 10);
        // The longest record here is 40 bytes.
        for (buf, staging) in [(40, 4096), (48, 40), (64, 40), (100, 48), (4096, 40)] {
            let got = list_all(&mut p, &mut arena, d, buf, staging);
            assert_eq!(got, expected, "buffer {buf}, staging {staging}");
        }
    }

    #[test]
    fn test_buffer_size_changes_between_calls() {
        let mut p = MockProvider::new();
        let mut arena = new_arena(64);
        let root = arena.root();
        let d = p.add_dir(&mut arena, root, "d", None);
        arena.get_mut(d).unwrap().set_indexed_entries(3);
        for i in [0u32, 2] {
            p.add_file(&mut arena, d, &format!("idx{i}"), Some(i), b"");
        }
        for n in ["x", "a-rather-long-entry-name", "yy", "middle-sized", "z"] {
            p.add_file(&mut arena, d, n, None, b"");
        }
        let expected = list_all(&mut p, &mut arena, d, 4096, 4096);

        // A caller retries with the next size when a record does not fit.
        let sizes = [16usize, 40, 24, 100];
        let mut got = Vec::new();
        let mut pos = 0;
        let mut calls = 0;
        loop {
            let mut buf = vec![0u8; sizes[calls % sizes.len()]];
            calls += 1;
            let l = match list(&mut p, &mut arena, d, pos, &mut buf, 48) {
                Ok(l) => l,
                Err(e) => {
                    assert_eq!(e.code(), StatusCode::INVALID_ARG);
                    continue;
                }
            };
            got.extend(decode(&buf[..l.bytes]).map(|r| (r.ino, r.name)));
            pos = l.next_position;
            if l.end {
                break;
            }
        }
        assert_eq!(got, expected);
        assert!(calls > sizes.len());
    }

    #[test]
    fn test_buffer_too_small() {
        let mut p = MockProvider::new();
        let mut arena = new_arena(4);
        let root = arena.root();
        let mut buf = [0u8; 8];
        let err = list(&mut p, &mut arena, root, 0, &mut buf, 4096).unwrap_err();
        assert_eq!(err.code(), StatusCode::INVALID_ARG);
    }

    #[test]
    fn test_past_end_is_empty() {
        let mut p = MockProvider::new();
        let mut arena = new_arena(4);
        let root = arena.root();
        let mut buf = [0u8; 64];
        let l = list(&mut p, &mut arena, root, 17, &mut buf, 4096).unwrap();
        assert_eq!(l, Listing { bytes: 0, next_position: 17, end: true });
    }

    #[test]
    fn test_refresh_prunes_and_deleted_are_hidden() {
        let mut p = MockProvider::new();
        let mut arena = new_arena(16);
        let root = arena.root();
        let gone = p.add_file(&mut arena, root, "gone", None, b"");
        let held = p.add_file(&mut arena, root, "held", None, b"");
        p.add_file(&mut arena, root, "kept", None, b"");
        arena.acquire(held).unwrap();
        arena.mark_deleted(held);
        p.prune_on_refresh.push(gone);

        let entries = list_all(&mut p, &mut arena, root, 4096, 4096);
        assert_eq!(names(&entries), [".", "..", "kept"]);
    }

    #[test]
    fn test_deleted_directory_lists_only_dots() {
        let mut p = MockProvider::new();
        let mut arena = new_arena(16);
        let root = arena.root();
        let d = p.add_dir(&mut arena, root, "d", None);
        p.add_file(&mut arena, d, "f", None, b"");
        arena.acquire(d).unwrap();
        arena.mark_deleted(d);

        let entries = list_all(&mut p, &mut arena, d, 4096, 4096);
        assert_eq!(entries, [(d, ".".to_string()), (root, "..".to_string())]);
        assert_eq!(p.refreshes, 0);
    }

    #[test]
    fn test_not_a_directory() {
        let mut p = MockProvider::new();
        let mut arena = new_arena(4);
        let root = arena.root();
        let f = p.add_file(&mut arena, root, "f", None, b"");
        let mut buf = [0u8; 64];
        let err = list(&mut p, &mut arena, f, 0, &mut buf, 4096).unwrap_err();
        assert_eq!(err.code(), VtreeCode::NOT_DIRECTORY);
    }
}
