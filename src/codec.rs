//! Seal/unseal: compress+frame and decompress+unframe a payload.
//!
//! The column-element codec itself is an external collaborator (§1); this
//! module is the thin adapter the sink/source drive it through, built on
//! zstd the same way a small integer tag elsewhere picks a codec by id.
//! No framing is added beyond what the codec produces — raw sealed page
//! bytes are exactly what `commitPage` stores (§6).

use std::io::{Read, Write};

use crate::error::{Error, Result};
use crate::metrics::{Metrics, TimerKind};

/// Compresses `data` at `level`. `level <= 0` means "store uncompressed",
/// which keeps `commitPage` usable for schemas whose codec is a no-op.
pub fn seal(data: &[u8], level: i32, metrics: &Metrics) -> Vec<u8> {
    let _t = metrics.timer(TimerKind::Zip);
    if level <= 0 {
        return data.to_vec();
    }
    let mut encoder = zstd::Encoder::new(Vec::new(), level).expect("zstd encoder init");
    encoder.write_all(data).expect("zstd write");
    encoder.finish().expect("zstd finish")
}

/// Decompresses `sealed` into a buffer of `uncompressed_len` bytes.
/// `compressed` distinguishes a zstd frame from a store-uncompressed
/// buffer; callers derive it from the locator/anchor (`bytesOnStorage !=
/// len` implies compressed). A decode failure on a payload that claims to
/// be compressed is on-storage corruption, not a programmer error.
pub fn unseal(sealed: &[u8], compressed: bool, uncompressed_len: usize, metrics: &Metrics) -> Result<Vec<u8>> {
    let _t = metrics.timer(TimerKind::Unzip);
    if !compressed {
        return Ok(sealed.to_vec());
    }
    let mut decoder = zstd::Decoder::new(sealed).map_err(|_| Error::Corrupt {
        on_storage: sealed.len(),
        expected: uncompressed_len,
    })?;
    let mut out = Vec::with_capacity(uncompressed_len);
    decoder.read_to_end(&mut out).map_err(|_| Error::Corrupt {
        on_storage: sealed.len(),
        expected: uncompressed_len,
    })?;
    Ok(out)
}
