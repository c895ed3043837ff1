//! Koopman CRC32 Content Digest
//!
//! Packed segment filenames embed a CRC32 of the uncompressed entry payloads
//! written to the segment. The digest covers only the payload bytes, never
//! the framing or the gzip output, so re-packing the same logical records
//! yields a comparable digest regardless of compression timing.
//!
//! The polynomial is Koopman's `0x741b8cd7` rather than the common IEEE one,
//! which rules out `crc32fast` (IEEE only); the parameterized `crc` crate
//! carries the algorithm instead.

use crc::{Algorithm, Crc, Digest};

/// CRC-32 with the Koopman polynomial.
///
/// Reflected, init and xorout `0xffffffff`. Check value: the digest of
/// `"123456789"` is `0x2d3dd0ae`.
pub const CRC_32_KOOPMAN: Algorithm<u32> = Algorithm {
    width: 32,
    poly: 0x741b_8cd7,
    init: 0xffff_ffff,
    refin: true,
    refout: true,
    xorout: 0xffff_ffff,
    check: 0x2d3d_d0ae,
    residue: 0x0843_323b,
};

static KOOPMAN: Crc<u32> = Crc::<u32>::new(&CRC_32_KOOPMAN);

/// Incremental digest over a segment's payloads.
pub fn digest() -> Digest<'static, u32> {
    KOOPMAN.digest()
}

/// Digest of a complete buffer.
pub fn content_digest(data: &[u8]) -> u32 {
    KOOPMAN.checksum(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_value() {
        assert_eq!(content_digest(b"123456789"), 0x2d3d_d0ae);
    }

    #[test]
    fn test_empty_digest() {
        assert_eq!(content_digest(b""), 0);
    }

    #[test]
    fn test_incremental_matches_oneshot() {
        let mut d = digest();
        d.update(b"hello ");
        d.update(b"world");
        assert_eq!(d.finalize(), content_digest(b"hello world"));
    }

    #[test]
    fn test_digest_order_sensitive() {
        assert_ne!(content_digest(b"ab"), content_digest(b"ba"));
    }
}
