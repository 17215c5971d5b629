// Shared binary reading utilities for header parsers
//
// Parsers operate on a bounded prefix buffer, so these readers take a slice
// and an offset rather than seeking a file handle. Out-of-range reads are an
// Option::None, which parsers map to their own error types.

/// Read u32 big-endian at a byte offset within the buffer
pub fn read_u32_be(data: &[u8], offset: usize) -> Option<u32> {
    let end = offset.checked_add(4)?;
    let bytes = data.get(offset..end)?;
    Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Read u32 little-endian at a byte offset within the buffer
pub fn read_u32_le(data: &[u8], offset: usize) -> Option<u32> {
    let end = offset.checked_add(4)?;
    let bytes = data.get(offset..end)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Read the run of printable ASCII at `offset`, up to `max_len` bytes.
///
/// Stops at the first byte outside 0x20..=0x7E or at the end of the buffer.
/// Returns an empty string when the offset is out of range.
pub fn printable_ascii_at(data: &[u8], offset: usize, max_len: usize) -> String {
    let Some(slice) = data.get(offset..) else {
        return String::new();
    };
    let slice = &slice[..slice.len().min(max_len)];
    let end = slice
        .iter()
        .position(|&b| !(0x20..=0x7E).contains(&b))
        .unwrap_or(slice.len());
    String::from_utf8_lossy(&slice[..end]).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_integers() {
        let data = [0x00, 0x00, 0x10, 0x00, 0x78, 0x56, 0x34, 0x12];
        assert_eq!(read_u32_be(&data, 0).unwrap(), 0x1000);
        assert_eq!(read_u32_le(&data, 4).unwrap(), 0x12345678);
        assert_eq!(read_u32_be(&data, 5), None);
        assert_eq!(read_u32_be(&data, usize::MAX), None);
    }

    #[test]
    fn test_printable_ascii() {
        let data = b"....KMDBK12345\x00rest";
        assert_eq!(printable_ascii_at(data, 4, 16), "KMDBK12345");
        assert_eq!(printable_ascii_at(data, 4, 5), "KMDBK");
        assert_eq!(printable_ascii_at(data, 200, 16), "");
    }

}
