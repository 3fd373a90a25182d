//! inotify record decoding
//!
//! A read from the queue yields zero or more records back to back:
//!
//! ```text
//! +--------+--------+--------+--------+----------------------------+
//! | wd i32 |mask u32|cookie  | len u32| name: len bytes, NUL padded|
//! +--------+--------+--------+--------+----------------------------+
//! ```
//!
//! `len` already covers the padding, so the next record starts right
//! after the name field. Fields are read with `from_ne_bytes`, so the
//! buffer itself needs no particular alignment.

use std::borrow::Cow;
use tracing::warn;

use super::mask::EventMask;
use crate::handle::WatchHandle;

/// Size of the fixed record header
pub const HEADER_LEN: usize = std::mem::size_of::<libc::inotify_event>();

/// Alignment the kernel uses for record headers
pub const HEADER_ALIGN: usize = std::mem::align_of::<libc::inotify_event>();

/// Longest entry name the kernel reports
pub const NAME_MAX: usize = 255;

/// One decoded kernel notification record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub handle: WatchHandle,
    pub mask: EventMask,
    /// Pairs the two halves of a rename
    pub cookie: u32,
    /// Entry name without NUL padding; empty for events on the watched
    /// directory itself
    pub name: Vec<u8>,
}

impl RawRecord {
    pub fn new(handle: WatchHandle, mask: EventMask, cookie: u32, name: impl Into<Vec<u8>>) -> Self {
        Self {
            handle,
            mask,
            cookie,
            name: name.into(),
        }
    }

    /// Entry name, with invalid UTF-8 replaced
    pub fn name_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.name)
    }

    /// Length of the padded name field as the kernel would report it
    pub fn padded_name_len(&self) -> usize {
        if self.name.is_empty() {
            0
        } else {
            (self.name.len() + 1).next_multiple_of(HEADER_ALIGN)
        }
    }

    /// Append the record in kernel layout
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        let name_len = self.padded_name_len();
        out.extend_from_slice(&self.handle.as_raw().to_ne_bytes());
        out.extend_from_slice(&self.mask.bits().to_ne_bytes());
        out.extend_from_slice(&self.cookie.to_ne_bytes());
        out.extend_from_slice(&(name_len as u32).to_ne_bytes());
        out.extend_from_slice(&self.name);
        out.resize(out.len() + name_len - self.name.len(), 0);
    }

    /// Total encoded size
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + self.padded_name_len()
    }
}

/// Offset of the first byte in `buf` suitable for a record header
pub fn aligned_start(buf: &[u8]) -> usize {
    buf.as_ptr().align_offset(HEADER_ALIGN).min(buf.len())
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut field = [0u8; 4];
    field.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_ne_bytes(field)
}

/// Decode every complete record in `bytes`
///
/// Trailing bytes that do not form a whole record are logged and dropped.
pub fn decode_records(bytes: &[u8]) -> Vec<RawRecord> {
    let mut records = Vec::new();
    let mut offset = 0;

    while offset + HEADER_LEN <= bytes.len() {
        let wd = read_u32(bytes, offset) as i32;
        let mask = read_u32(bytes, offset + 4);
        let cookie = read_u32(bytes, offset + 8);
        let name_len = read_u32(bytes, offset + 12) as usize;

        let name_start = offset + HEADER_LEN;
        let name_end = name_start + name_len;
        if name_end > bytes.len() {
            warn!(
                "truncated record at offset {}: name needs {} bytes, {} left",
                offset,
                name_len,
                bytes.len() - name_start
            );
            return records;
        }

        let field = &bytes[name_start..name_end];
        let name = match field.iter().position(|&b| b == 0) {
            Some(nul) => &field[..nul],
            None => field,
        };

        records.push(RawRecord {
            handle: WatchHandle::from_raw(wd),
            mask: EventMask::from_bits_retain(mask),
            cookie,
            name: name.to_vec(),
        });
        offset = name_end;
    }

    if offset < bytes.len() {
        warn!("dropping {} trailing bytes after last record", bytes.len() - offset);
    }

    records
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(records: &[RawRecord]) -> Vec<u8> {
        let mut out = Vec::new();
        for r in records {
            r.encode_into(&mut out);
        }
        out
    }

    #[test]
    fn test_header_layout() {
        assert_eq!(HEADER_LEN, 16);
        assert_eq!(HEADER_ALIGN, 4);
    }

    #[test]
    fn test_decode_single_record() {
        let record = RawRecord::new(WatchHandle::from_raw(3), EventMask::CREATE, 0, "filename");
        let bytes = encode(&[record.clone()]);
        // "filename" + NUL rounds up to 12
        assert_eq!(bytes.len(), HEADER_LEN + 12);
        assert_eq!(decode_records(&bytes), vec![record]);
    }

    #[test]
    fn test_decode_batch() {
        let records = vec![
            RawRecord::new(WatchHandle::from_raw(1), EventMask::CREATE | EventMask::ISDIR, 0, "s"),
            RawRecord::new(WatchHandle::from_raw(1), EventMask::MOVED_FROM, 77, "old"),
            RawRecord::new(WatchHandle::from_raw(2), EventMask::DELETE_SELF, 0, ""),
            RawRecord::new(WatchHandle::from_raw(1), EventMask::DELETE, 0, "abcd"),
        ];
        let decoded = decode_records(&encode(&records));
        assert_eq!(decoded, records);
        assert_eq!(decoded[1].cookie, 77);
        assert!(decoded[2].name.is_empty());
    }

    #[test]
    fn test_name_exactly_fills_padding() {
        // 3 chars + NUL = 4, no extra padding
        let record = RawRecord::new(WatchHandle::from_raw(0), EventMask::CREATE, 0, "abc");
        assert_eq!(record.padded_name_len(), 4);
        assert_eq!(decode_records(&encode(&[record.clone()])), vec![record]);
    }

    #[test]
    fn test_decode_from_unaligned_start() {
        let record = RawRecord::new(WatchHandle::from_raw(9), EventMask::DELETE, 0, "f");
        let mut bytes = vec![0xAA];
        record.encode_into(&mut bytes);
        assert_eq!(decode_records(&bytes[1..]), vec![record]);
    }

    #[test]
    fn test_truncated_tail_is_dropped() {
        let first = RawRecord::new(WatchHandle::from_raw(1), EventMask::CREATE, 0, "keep");
        let second = RawRecord::new(WatchHandle::from_raw(1), EventMask::CREATE, 0, "cut-off-name");
        let mut bytes = encode(&[first.clone(), second]);
        bytes.truncate(bytes.len() - 5);
        assert_eq!(decode_records(&bytes), vec![first]);

        // Partial header only
        assert!(decode_records(&[0u8; HEADER_LEN - 1]).is_empty());
    }

    #[test]
    fn test_name_without_terminator() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&4i32.to_ne_bytes());
        bytes.extend_from_slice(&libc::IN_CREATE.to_ne_bytes());
        bytes.extend_from_slice(&0u32.to_ne_bytes());
        bytes.extend_from_slice(&4u32.to_ne_bytes());
        bytes.extend_from_slice(b"wxyz");

        let decoded = decode_records(&bytes);
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].name, b"wxyz");
    }

    #[test]
    fn test_overflow_record_has_invalid_handle() {
        let record = RawRecord::new(WatchHandle::INVALID, EventMask::Q_OVERFLOW, 0, "");
        let decoded = decode_records(&encode(&[record]));
        assert_eq!(decoded[0].handle, WatchHandle::INVALID);
        assert!(!decoded[0].handle.is_registered());
    }

    #[test]
    fn test_aligned_start() {
        let buf = [0u8; 64];
        let start = aligned_start(&buf);
        assert!(start < HEADER_ALIGN);
        assert_eq!((buf[start..].as_ptr() as usize) % HEADER_ALIGN, 0);
        assert_eq!(aligned_start(&[]), 0);
    }

    #[test]
    fn test_lossy_name() {
        let record = RawRecord::new(WatchHandle::from_raw(0), EventMask::CREATE, 0, vec![b'a', 0xFF]);
        assert_eq!(record.name_lossy(), "a\u{FFFD}");
    }
}
