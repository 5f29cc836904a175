//! Snapshot Entry Format
//!
//! One snapshot file is a flat concatenation of entries:
//!
//! ```text
//! [key_len: u32][key bytes][value_len: u32][value bytes][deadline_ms: i64]
//! ```
//!
//! All integers are little-endian. The original engine wrote host byte
//! order; fixing little-endian trades snapshot compatibility with it for
//! files that are portable across machines.
//!
//! `deadline_ms` is an absolute UNIX-epoch timestamp in milliseconds, or
//! [`NO_EXP_TS`](crate::storage::NO_EXP_TS) (-1) for entries without a TTL.
//!
//! End of file is only clean at an entry boundary: reading zero bytes where
//! the next `key_len` would start signals completion, while running out of
//! bytes anywhere inside an entry is a [`FormatError::TruncatedEntry`].

use std::io::{self, Read, Write};

use thiserror::Error;

/// Errors that can occur while reading snapshot entries.
#[derive(Debug, Error)]
pub enum FormatError {
    /// The stream ended in the middle of an entry.
    #[error("unexpected end of file inside a snapshot entry")]
    TruncatedEntry,

    /// A key or value in the file is not valid UTF-8.
    #[error("snapshot entry is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// One decoded snapshot entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotEntry {
    pub key: String,
    pub value: String,
    /// Absolute deadline in milliseconds, or `NO_EXP_TS` for none.
    pub deadline_ms: i64,
}

/// Writes a single entry to `w`.
pub fn write_entry(
    w: &mut impl Write,
    key: &str,
    value: &str,
    deadline_ms: i64,
) -> io::Result<()> {
    w.write_all(&(key.len() as u32).to_le_bytes())?;
    w.write_all(key.as_bytes())?;
    w.write_all(&(value.len() as u32).to_le_bytes())?;
    w.write_all(value.as_bytes())?;
    w.write_all(&deadline_ms.to_le_bytes())?;
    Ok(())
}

/// Reads the next entry from `r`.
///
/// Returns `Ok(None)` on a clean end of file, i.e. zero bytes available at
/// the position where the next `key_len` would start. Any shortfall after
/// that point is a truncation error.
pub fn read_entry(r: &mut impl Read) -> Result<Option<SnapshotEntry>, FormatError> {
    let mut len_buf = [0u8; 4];
    if !read_exact_or_eof(r, &mut len_buf)? {
        return Ok(None);
    }
    let key_len = u32::from_le_bytes(len_buf) as usize;

    let mut key_buf = vec![0u8; key_len];
    read_exact_entry(r, &mut key_buf)?;

    read_exact_entry(r, &mut len_buf)?;
    let value_len = u32::from_le_bytes(len_buf) as usize;

    let mut value_buf = vec![0u8; value_len];
    read_exact_entry(r, &mut value_buf)?;

    let mut deadline_buf = [0u8; 8];
    read_exact_entry(r, &mut deadline_buf)?;

    Ok(Some(SnapshotEntry {
        key: String::from_utf8(key_buf)?,
        value: String::from_utf8(value_buf)?,
        deadline_ms: i64::from_le_bytes(deadline_buf),
    }))
}

/// Fills `buf` completely, or returns `Ok(false)` when the stream is
/// already exhausted. A partial fill is a truncation error.
fn read_exact_or_eof(r: &mut impl Read, buf: &mut [u8]) -> Result<bool, FormatError> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => {
                if filled == 0 {
                    return Ok(false);
                }
                return Err(FormatError::TruncatedEntry);
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(true)
}

/// Fills `buf` completely; end of stream anywhere is a truncation error.
fn read_exact_entry(r: &mut impl Read, buf: &mut [u8]) -> Result<(), FormatError> {
    if read_exact_or_eof(r, buf)? {
        Ok(())
    } else {
        Err(FormatError::TruncatedEntry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn entry_round_trip() {
        let mut buf = Vec::new();
        write_entry(&mut buf, "key", "value", 1234).unwrap();
        write_entry(&mut buf, "other", r#"{"a":[1,2]}"#, -1).unwrap();

        let mut cursor = Cursor::new(buf);
        let first = read_entry(&mut cursor).unwrap().unwrap();
        assert_eq!(first.key, "key");
        assert_eq!(first.value, "value");
        assert_eq!(first.deadline_ms, 1234);

        let second = read_entry(&mut cursor).unwrap().unwrap();
        assert_eq!(second.value, r#"{"a":[1,2]}"#);
        assert_eq!(second.deadline_ms, -1);

        assert!(read_entry(&mut cursor).unwrap().is_none());
    }

    #[test]
    fn empty_stream_is_clean_eof() {
        let mut cursor = Cursor::new(Vec::new());
        assert!(read_entry(&mut cursor).unwrap().is_none());
    }

    #[test]
    fn empty_key_and_value_survive() {
        let mut buf = Vec::new();
        write_entry(&mut buf, "", "", i64::MIN).unwrap();

        let entry = read_entry(&mut Cursor::new(buf)).unwrap().unwrap();
        assert_eq!(entry.key, "");
        assert_eq!(entry.value, "");
        assert_eq!(entry.deadline_ms, i64::MIN);
    }

    #[test]
    fn partial_length_prefix_is_truncation() {
        // Two bytes where a four-byte key_len should be.
        let mut cursor = Cursor::new(vec![0x01, 0x00]);
        assert!(matches!(
            read_entry(&mut cursor),
            Err(FormatError::TruncatedEntry)
        ));
    }

    #[test]
    fn truncated_tail_is_an_error() {
        let mut buf = Vec::new();
        write_entry(&mut buf, "key", "value", 99).unwrap();
        buf.truncate(buf.len() - 3);

        let mut cursor = Cursor::new(buf);
        assert!(matches!(
            read_entry(&mut cursor),
            Err(FormatError::TruncatedEntry)
        ));
    }

    #[test]
    fn missing_value_bytes_is_truncation() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&3u32.to_le_bytes());
        buf.extend_from_slice(b"key");
        buf.extend_from_slice(&10u32.to_le_bytes());
        buf.extend_from_slice(b"short");

        let mut cursor = Cursor::new(buf);
        assert!(matches!(
            read_entry(&mut cursor),
            Err(FormatError::TruncatedEntry)
        ));
    }
}
