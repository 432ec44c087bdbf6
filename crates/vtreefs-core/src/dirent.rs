//! Directory record wire format.
//!
//! ```text
//! +--------+--------+--------+------+-----------+-----+---------+
//! | ino    | reclen | namlen | type | name      | NUL | padding |
//! | u64 LE | u16 LE | u16 LE | u8   | namlen B  | 1 B | to 8 B  |
//! +--------+--------+--------+------+-----------+-----+---------+
//! ```
//!
//! `reclen` covers the whole record, padding included, so a reader can
//! step from one record to the next without parsing the name.

use bytes::{Buf, BufMut};
use vtreefs_types::InodeNo;

use crate::types::FileKind;

const HEADER_LEN: usize = 8 + 2 + 2 + 1;
const ALIGN: usize = 8;

/// Bytes one record with an `name_len`-byte name occupies.
pub fn record_len(name_len: usize) -> usize {
    (HEADER_LEN + name_len + 1 + ALIGN - 1) & !(ALIGN - 1)
}

/// Append one record to `buf`. The caller checks that it fits.
pub fn encode(buf: &mut impl BufMut, ino: InodeNo, kind: FileKind, name: &str) {
    let reclen = record_len(name.len());
    buf.put_u64_le(ino.get());
    buf.put_u16_le(reclen as u16);
    buf.put_u16_le(name.len() as u16);
    buf.put_u8(kind.dirent_type());
    buf.put_slice(name.as_bytes());
    buf.put_bytes(0, reclen - HEADER_LEN - name.len());
}

/// One decoded record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirentRecord {
    pub ino: InodeNo,
    pub kind: FileKind,
    pub name: String,
}

/// Iterate over the records packed in `buf`. Stops at the first record
/// that is truncated or malformed.
pub fn decode(buf: &[u8]) -> Records<'_> {
    Records { buf }
}

pub struct Records<'a> {
    buf: &'a [u8],
}

impl Iterator for Records<'_> {
    type Item = DirentRecord;

    fn next(&mut self) -> Option<DirentRecord> {
        if self.buf.len() < HEADER_LEN {
            return None;
        }
        let mut header = &self.buf[..HEADER_LEN];
        let ino = InodeNo(header.get_u64_le());
        let reclen = header.get_u16_le() as usize;
        let namlen = header.get_u16_le() as usize;
        let kind = FileKind::from_dirent_type(header.get_u8());
        if reclen != record_len(namlen) || reclen > self.buf.len() {
            return None;
        }
        let name = String::from_utf8_lossy(&self.buf[HEADER_LEN..HEADER_LEN + namlen]).into_owned();
        self.buf = &self.buf[reclen..];
        Some(DirentRecord { ino, kind, name })
    }
}
