//! fixed width text fields padded with NUL bytes
use crate::error::{FsError, Result};

/// pack `text` into a NUL padded array
///
/// text longer than `N` bytes is rejected rather than truncated
pub fn encode_fixed<const N: usize>(text: &str) -> Result<[u8; N]> {
    let bytes = text.as_bytes();
    if bytes.len() > N {
        return Err(FsError::InvalidParameter(format!(
            "'{text}' is longer than {N} bytes"
        )));
    }
    let mut field = [0u8; N];
    field[..bytes.len()].copy_from_slice(bytes);
    Ok(field)
}

/// read text up to the first NUL byte
pub fn decode_fixed(field: &[u8]) -> String {
    let end = field.iter().position(|b| *b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}
