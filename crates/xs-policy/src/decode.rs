// decode.rs - Hypervisor error report decoding.
//
// When the hypervisor rejects a policy it returns a sequence of fixed-size
// records, no separators:
//
//   offset 0: i32 code (big-endian)
//   offset 4: u32 data (big-endian)
//
// Each record is looked up in the hv_errors table and rendered as text. A
// trailing partial record is ignored rather than treated as an error.

use crate::error::PolicyError;
use crate::hv_errors;

/// Size in bytes of one encoded record.
pub const RECORD_LEN: usize = 8;

/// Prefix of every decoded report.
pub const REPORT_BANNER: &str = "Hypervisor reported errors:";

/// One decoded `(code, data)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HvErrorRecord {
    pub code: i32,
    pub data: u32,
}

impl HvErrorRecord {
    /// Parse one 8-byte record.
    pub fn from_bytes(bytes: [u8; RECORD_LEN]) -> Self {
        let [c0, c1, c2, c3, d0, d1, d2, d3] = bytes;
        Self {
            code: i32::from_be_bytes([c0, c1, c2, c3]),
            data: u32::from_be_bytes([d0, d1, d2, d3]),
        }
    }

    pub fn to_bytes(self) -> [u8; RECORD_LEN] {
        let mut out = [0u8; RECORD_LEN];
        out[..4].copy_from_slice(&self.code.to_be_bytes());
        out[4..].copy_from_slice(&self.data.to_be_bytes());
        out
    }
}

/// Iterate over every complete record in `blob`, in order.
pub fn records(blob: &[u8]) -> impl Iterator<Item = HvErrorRecord> + '_ {
    blob.chunks_exact(RECORD_LEN).map(|chunk| {
        let mut bytes = [0u8; RECORD_LEN];
        bytes.copy_from_slice(chunk);
        HvErrorRecord::from_bytes(bytes)
    })
}

/// Number of bytes at the end of `blob` that do not form a whole record.
pub fn trailing_bytes(blob: &[u8]) -> usize {
    blob.len() % RECORD_LEN
}

/// Render a hypervisor error report as a single line of text.
///
/// Fails with [`PolicyError::UnknownErrorCode`] if any record carries a code
/// missing from the table; nothing is rendered in that case.
pub fn decode(blob: &[u8]) -> Result<String, PolicyError> {
    let segments = records(blob)
        .enumerate()
        .map(|(i, record)| match hv_errors::lookup(record.code) {
            Some(entry) => Ok(entry.render(record.data)),
            None => Err(PolicyError::UnknownErrorCode {
                code: record.code,
                offset: i * RECORD_LEN,
            }),
        })
        .collect::<Result<Vec<_>, _>>()?;

    if segments.is_empty() {
        return Ok(REPORT_BANNER.to_string());
    }
    Ok(format!("{} {}", REPORT_BANNER, segments.join("; ")))
}
