use crate::error::WireError;
use byteorder::{BigEndian, ByteOrder, LittleEndian};

/// A cursor over an immutable byte slice used by the protocol decoders.
///
/// All Source/Valve multi-byte integers are little-endian except the Master
/// Server's packed IP:port pairs, which are big-endian (network order) —
/// callers pick the matching method per spec.md §4.2/§6.
pub struct PacketReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> PacketReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        PacketReader { buf, pos: 0 }
    }

    pub fn remaining(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], WireError> {
        if self.pos + n > self.buf.len() {
            return Err(WireError::malformed(format!(
                "expected {n} more bytes at offset {}, have {}",
                self.pos,
                self.buf.len() - self.pos
            )));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8, WireError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8, WireError> {
        Ok(self.take(1)?[0] as i8)
    }

    pub fn read_u16_le(&mut self) -> Result<u16, WireError> {
        Ok(LittleEndian::read_u16(self.take(2)?))
    }

    pub fn read_u16_be(&mut self) -> Result<u16, WireError> {
        Ok(BigEndian::read_u16(self.take(2)?))
    }

    pub fn read_i32_le(&mut self) -> Result<i32, WireError> {
        Ok(LittleEndian::read_i32(self.take(4)?))
    }

    pub fn read_u32_le(&mut self) -> Result<u32, WireError> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    pub fn read_u32_be(&mut self) -> Result<u32, WireError> {
        Ok(BigEndian::read_u32(self.take(4)?))
    }

    pub fn read_u64_le(&mut self) -> Result<u64, WireError> {
        Ok(LittleEndian::read_u64(self.take(8)?))
    }

    pub fn read_f32_le(&mut self) -> Result<f32, WireError> {
        Ok(LittleEndian::read_f32(self.take(4)?))
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], WireError> {
        self.take(n)
    }

    /// Reads a NUL-terminated UTF-8 string. Rejects (as `MalformedPayload`) a
    /// string without a terminator within the buffer, per spec.md §4.2.
    pub fn read_cstring(&mut self) -> Result<String, WireError> {
        let start = self.pos;
        let nul_offset = self.buf[start..]
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| WireError::malformed("unterminated string"))?;
        let bytes = &self.buf[start..start + nul_offset];
        self.pos = start + nul_offset + 1;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| WireError::malformed(format!("invalid utf-8 in string: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_little_endian_ints() {
        let buf = [0x01, 0x00, 0x00, 0x00, 0xFF, 0xFF];
        let mut r = PacketReader::new(&buf);
        assert_eq!(r.read_i32_le().unwrap(), 1);
        assert_eq!(r.read_u16_le().unwrap(), 0xFFFF);
    }

    #[test]
    fn reads_big_endian_for_master_ips() {
        let buf = [192, 168, 1, 1, 0x69, 0x87];
        let mut r = PacketReader::new(&buf);
        assert_eq!(r.read_u32_be().unwrap(), 0xC0A80101);
        assert_eq!(r.read_u16_be().unwrap(), 0x6987);
    }

    #[test]
    fn cstring_reads_up_to_nul() {
        let buf = b"hello\0world";
        let mut r = PacketReader::new(buf);
        assert_eq!(r.read_cstring().unwrap(), "hello");
        assert_eq!(r.remaining(), b"world");
    }

    #[test]
    fn cstring_without_terminator_is_malformed() {
        let buf = b"no terminator here";
        let mut r = PacketReader::new(buf);
        assert!(matches!(
            r.read_cstring(),
            Err(WireError::MalformedPayload(_))
        ));
    }

    #[test]
    fn truncated_read_is_malformed_not_panic() {
        let buf = [0x01, 0x02];
        let mut r = PacketReader::new(&buf);
        assert!(matches!(r.read_u32_le(), Err(WireError::MalformedPayload(_))));
    }
}
