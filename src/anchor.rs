//! Anchor record — the dataset's commit marker.
//!
//! Layout (little-endian), bit-exact and compatibility-critical:
//! ```text
//! offset 0  : u32 version
//! offset 4  : u32 nBytesHeader
//! offset 8  : u32 lenHeader
//! offset 12 : u32 nBytesFooter
//! offset 16 : u32 lenFooter
//! offset 20 : u32 classNameLen
//! offset 24 : classNameLen bytes UTF-8 object-class name
//! ```
//! `nBytes*` is the on-storage (compressed) length, `len*` the uncompressed
//! length. The anchor is always written and read in a buffer of
//! `Anchor::max_size()` bytes; trailing bytes beyond what was serialized
//! are ignored on read.

use byteorder::{ByteOrder, LittleEndian};

use crate::consts::{ANCHOR_VERSION, MAX_CLASS_NAME};
use crate::error::{Error, Result};

const FIXED_SIZE: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    pub version: u32,
    pub n_bytes_header: u32,
    pub len_header: u32,
    pub n_bytes_footer: u32,
    pub len_footer: u32,
    pub object_class: String,
}

impl Anchor {
    pub fn new(object_class: impl Into<String>) -> Self {
        Self {
            version: ANCHOR_VERSION,
            n_bytes_header: 0,
            len_header: 0,
            n_bytes_footer: 0,
            len_footer: 0,
            object_class: object_class.into(),
        }
    }

    /// Upper bound on the serialized anchor size, used to size the buffer
    /// passed to both `serialize` and `deserialize`.
    pub fn max_size() -> usize {
        FIXED_SIZE + 4 + MAX_CLASS_NAME
    }

    /// Writes the anchor into `out_buf` and returns the number of bytes
    /// written. If `out_buf` is `None`, returns the length a buffer would
    /// need without writing anything.
    pub fn serialize(&self, out_buf: Option<&mut [u8]>) -> usize {
        let class_bytes = self.object_class.as_bytes();
        let needed = FIXED_SIZE + 4 + class_bytes.len();

        let buf = match out_buf {
            Some(b) => b,
            None => return needed,
        };
        assert!(buf.len() >= needed, "anchor buffer too small");

        LittleEndian::write_u32(&mut buf[0..4], self.version);
        LittleEndian::write_u32(&mut buf[4..8], self.n_bytes_header);
        LittleEndian::write_u32(&mut buf[8..12], self.len_header);
        LittleEndian::write_u32(&mut buf[12..16], self.n_bytes_footer);
        LittleEndian::write_u32(&mut buf[16..20], self.len_footer);
        LittleEndian::write_u32(&mut buf[20..24], class_bytes.len() as u32);
        buf[24..24 + class_bytes.len()].copy_from_slice(class_bytes);

        needed
    }

    /// Parses an anchor out of `buf[..buf_len]`, returning the anchor and
    /// the number of bytes actually consumed.
    pub fn deserialize(buf: &[u8], buf_len: usize) -> Result<(Self, usize)> {
        if buf_len < FIXED_SIZE {
            return Err(Error::AnchorTooShort { len: buf_len });
        }
        let buf = &buf[..buf_len];

        let version = LittleEndian::read_u32(&buf[0..4]);
        let n_bytes_header = LittleEndian::read_u32(&buf[4..8]);
        let len_header = LittleEndian::read_u32(&buf[8..12]);
        let n_bytes_footer = LittleEndian::read_u32(&buf[12..16]);
        let len_footer = LittleEndian::read_u32(&buf[16..20]);

        let remaining = buf_len - FIXED_SIZE;
        if remaining < 4 {
            return Err(Error::AnchorDecodeFailed(
                "buffer too short for class-name length prefix".into(),
            ));
        }
        let class_len = LittleEndian::read_u32(&buf[20..24]) as usize;
        let class_start: usize = 24;
        let class_end = class_start
            .checked_add(class_len)
            .ok_or_else(|| Error::AnchorDecodeFailed("class-name length overflow".into()))?;
        if class_end > buf_len {
            return Err(Error::AnchorDecodeFailed(
                "class-name length exceeds buffer".into(),
            ));
        }

        let object_class = String::from_utf8(buf[class_start..class_end].to_vec())
            .map_err(|e| Error::AnchorDecodeFailed(e.to_string()))?;

        Ok((
            Self {
                version,
                n_bytes_header,
                len_header,
                n_bytes_footer,
                len_footer,
                object_class,
            },
            class_end,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let a = Anchor {
            version: ANCHOR_VERSION,
            n_bytes_header: 111,
            len_header: 222,
            n_bytes_footer: 333,
            len_footer: 444,
            object_class: "MY_CLASS".to_string(),
        };
        let mut buf = vec![0u8; Anchor::max_size()];
        let n = a.serialize(Some(&mut buf));
        let (b, consumed) = Anchor::deserialize(&buf, n).unwrap();
        assert_eq!(a, b);
        assert_eq!(consumed, n);
    }

    #[test]
    fn ignores_trailing_bytes() {
        let a = Anchor::new("C");
        let mut buf = vec![0xAAu8; Anchor::max_size()];
        let n = a.serialize(Some(&mut buf));
        let (b, _) = Anchor::deserialize(&buf, buf.len()).unwrap();
        assert_eq!(a, b);
        let _ = n;
    }

    #[test]
    fn too_short_errors() {
        let buf = [0u8; 16];
        let err = Anchor::deserialize(&buf, buf.len()).unwrap_err();
        assert!(matches!(err, Error::AnchorTooShort { len: 16 }));
    }

    #[test]
    fn serialize_without_buffer_returns_length() {
        let a = Anchor::new("ABCDE");
        let n = a.serialize(None);
        assert_eq!(n, FIXED_SIZE + 4 + 5);
    }

    #[test]
    fn round_trip_random_class_name_lengths() {
        let mut rng = oorandom::Rand64::new(0xA7C0FFEE);
        for _ in 0..200 {
            let len = (rng.rand_u64() % (MAX_CLASS_NAME as u64 + 1)) as usize;
            let class: String = (0..len)
                .map(|_| (b'A' + (rng.rand_u64() % 26) as u8) as char)
                .collect();
            let a = Anchor {
                version: ANCHOR_VERSION,
                n_bytes_header: rng.rand_u64() as u32,
                len_header: rng.rand_u64() as u32,
                n_bytes_footer: rng.rand_u64() as u32,
                len_footer: rng.rand_u64() as u32,
                object_class: class,
            };
            let mut buf = vec![0u8; Anchor::max_size()];
            let n = a.serialize(Some(&mut buf));
            let (b, consumed) = Anchor::deserialize(&buf, n).unwrap();
            assert_eq!(a, b);
            assert_eq!(consumed, n);
        }
    }
}
