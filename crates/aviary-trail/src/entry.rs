//! Entry Framing
//!
//! One entry on disk is `varint(len) || bytes[len] || varint(len)`, inside
//! the segment's uncompressed stream. The duplicated trailing length lets a
//! scanner detect truncation (and, in principle, walk backwards).

use std::io::{self, Read, Write};

use aviary_core::varint;

use crate::error::{Error, Result};

/// Upper bound on a single entry payload. Anything larger in a length
/// prefix is treated as corruption rather than an allocation request.
const MAX_ENTRY_LEN: i64 = 1 << 31;

/// Write one framed entry. Returns the total bytes written, framing included.
pub(crate) fn write_entry(w: &mut impl Write, payload: &[u8]) -> Result<u64> {
    let len = payload.len() as i64;
    let mut total = varint::write_varint(w, len)? as u64;
    w.write_all(payload)?;
    total += payload.len() as u64;
    total += varint::write_varint(w, len)? as u64;
    Ok(total)
}

/// Read one framed entry. `None` at a clean end of the stream.
///
/// The trailing length is cross-checked against the leading one; a mismatch
/// or a stream ending mid-entry surfaces as [`Error::Corrupt`].
pub(crate) fn read_entry(r: &mut impl Read) -> Result<Option<Vec<u8>>> {
    let leading = match varint::read_varint(r)? {
        Some(len) => len,
        None => return Ok(None),
    };
    if !(0..=MAX_ENTRY_LEN).contains(&leading) {
        return Err(Error::Corrupt(format!(
            "entry length {} out of range",
            leading
        )));
    }

    let mut payload = vec![0u8; leading as usize];
    r.read_exact(&mut payload).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            Error::Corrupt("stream ended in the middle of an entry".to_string())
        } else {
            Error::Io(e)
        }
    })?;

    let trailing = varint::read_varint(r)?
        .ok_or_else(|| Error::Corrupt("entry missing trailing length".to_string()))?;
    if trailing != leading {
        return Err(Error::Corrupt(format!(
            "trailing length {} does not match leading length {}",
            trailing, leading
        )));
    }

    Ok(Some(payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_single() {
        let mut buf = Vec::new();
        write_entry(&mut buf, b"hello world").unwrap();
        let mut cursor = buf.as_slice();
        assert_eq!(read_entry(&mut cursor).unwrap().unwrap(), b"hello world");
        assert!(read_entry(&mut cursor).unwrap().is_none());
    }

    #[test]
    fn test_roundtrip_empty_payload() {
        let mut buf = Vec::new();
        write_entry(&mut buf, b"").unwrap();
        let mut cursor = buf.as_slice();
        assert_eq!(read_entry(&mut cursor).unwrap().unwrap(), b"");
    }

    #[test]
    fn test_roundtrip_sequence() {
        let payloads: [&[u8]; 3] = [b"one", b"two", b"three"];
        let mut buf = Vec::new();
        for p in payloads {
            write_entry(&mut buf, p).unwrap();
        }
        let mut cursor = buf.as_slice();
        for p in payloads {
            assert_eq!(read_entry(&mut cursor).unwrap().unwrap(), p);
        }
        assert!(read_entry(&mut cursor).unwrap().is_none());
    }

    #[test]
    fn test_written_size_accounts_for_framing() {
        let mut buf = Vec::new();
        let written = write_entry(&mut buf, b"abc").unwrap();
        // 1-byte varint on each side of a 3-byte payload.
        assert_eq!(written, 5);
        assert_eq!(buf.len(), 5);
    }

    #[test]
    fn test_truncated_payload_is_corrupt() {
        let mut buf = Vec::new();
        write_entry(&mut buf, b"hello world").unwrap();
        buf.truncate(6); // cut inside the payload
        let err = read_entry(&mut buf.as_slice()).unwrap_err();
        assert!(matches!(err, Error::Corrupt(_)));
    }

    #[test]
    fn test_missing_trailing_length_is_corrupt() {
        let mut buf = Vec::new();
        write_entry(&mut buf, b"abc").unwrap();
        buf.truncate(buf.len() - 1); // drop the trailing varint
        let err = read_entry(&mut buf.as_slice()).unwrap_err();
        assert!(matches!(err, Error::Corrupt(_)));
    }

    #[test]
    fn test_mismatched_trailing_length_is_corrupt() {
        let mut buf = Vec::new();
        write_entry(&mut buf, b"abc").unwrap();
        let last = buf.len() - 1;
        buf[last] = buf[last].wrapping_add(2); // corrupt the trailing varint
        let err = read_entry(&mut buf.as_slice()).unwrap_err();
        assert!(matches!(err, Error::Corrupt(_)));
    }

    #[test]
    fn test_negative_length_is_corrupt() {
        let mut buf = Vec::new();
        aviary_core::varint::write_varint(&mut buf, -4).unwrap();
        let err = read_entry(&mut buf.as_slice()).unwrap_err();
        assert!(matches!(err, Error::Corrupt(_)));
    }
}
