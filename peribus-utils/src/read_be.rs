use std::io::{self, Read};

/// Read big-endian values directly from a snapshot stream.
pub trait ReadBE: Read {
    fn read_u8(&mut self) -> io::Result<u8>;
    fn read_be_u16(&mut self) -> io::Result<u16>;
    fn read_be_u32(&mut self) -> io::Result<u32>;
    fn read_bool(&mut self) -> io::Result<bool>;
}

/// Everything that implements Read can also implement ReadBE.
impl<T: Read + ?Sized> ReadBE for T {
    fn read_u8(&mut self) -> io::Result<u8> {
        let mut buf = [0; 1];
        self.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    fn read_be_u16(&mut self) -> io::Result<u16> {
        let mut buf = [0; 2];
        self.read_exact(&mut buf)?;
        Ok(u16::from_be_bytes(buf))
    }

    fn read_be_u32(&mut self) -> io::Result<u32> {
        let mut buf = [0; 4];
        self.read_exact(&mut buf)?;
        Ok(u32::from_be_bytes(buf))
    }

    /// Booleans are stored as a single byte; anything but 0 or 1 is corrupt.
    fn read_bool(&mut self) -> io::Result<bool> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Invalid boolean byte in snapshot: {:#04X}", other))),
        }
    }
}
