use std::io::{self, Write};

/// Write big-endian values directly to a snapshot stream.
pub trait WriteBE: Write {
    fn write_u8(&mut self, val: u8) -> io::Result<()>;
    fn write_be_u16(&mut self, val: u16) -> io::Result<()>;
    fn write_be_u32(&mut self, val: u32) -> io::Result<()>;
    fn write_bool(&mut self, val: bool) -> io::Result<()>;
}

/// Everything that implements Write can also implement WriteBE.
impl<T: Write + ?Sized> WriteBE for T {
    fn write_u8(&mut self, val: u8) -> io::Result<()> {
        self.write_all(&[val])
    }

    fn write_be_u16(&mut self, val: u16) -> io::Result<()> {
        self.write_all(&val.to_be_bytes())
    }

    fn write_be_u32(&mut self, val: u32) -> io::Result<()> {
        self.write_all(&val.to_be_bytes())
    }

    fn write_bool(&mut self, val: bool) -> io::Result<()> {
        self.write_u8(val as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_values() {
        let mut out = Vec::new();
        out.write_u8(0x12).unwrap();
        out.write_be_u16(0x3456).unwrap();
        out.write_be_u32(0x789ABCDE).unwrap();
        out.write_bool(true).unwrap();
        out.write_bool(false).unwrap();
        assert_eq!(out, vec![0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC, 0xDE, 0x01, 0x00]);
    }
}
