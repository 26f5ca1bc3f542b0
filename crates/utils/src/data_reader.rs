use std::io::{self, Read, Seek};

/// A positioned little-endian reader over a byte stream.
///
/// Every read is bounds-checked by the underlying stream; reads past the end
/// surface as `io::Error` instead of returning garbage.
pub trait DataReader {
    fn read_u8(&mut self) -> io::Result<u8>;
    fn read_u16_le(&mut self) -> io::Result<u16>;
    fn read_i16_le(&mut self) -> io::Result<i16>;
    fn read_u24_le(&mut self) -> io::Result<u32>;
    fn read_u32_le(&mut self) -> io::Result<u32>;
    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()>;
    fn seek_to(&mut self, offset: u32) -> io::Result<()>;
    fn seek_end(&mut self, rewind: u32) -> io::Result<()>;
    fn skip(&mut self, count: u32) -> io::Result<()>;
    fn tell(&mut self) -> io::Result<u32>;
    fn file_size(&mut self) -> io::Result<u32>;
}

impl<T> DataReader for Box<T>
where
    T: DataReader + ?Sized,
{
    fn read_u8(&mut self) -> io::Result<u8> {
        (**self).read_u8()
    }

    fn read_u16_le(&mut self) -> io::Result<u16> {
        (**self).read_u16_le()
    }

    fn read_i16_le(&mut self) -> io::Result<i16> {
        (**self).read_i16_le()
    }

    fn read_u24_le(&mut self) -> io::Result<u32> {
        (**self).read_u24_le()
    }

    fn read_u32_le(&mut self) -> io::Result<u32> {
        (**self).read_u32_le()
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        (**self).read_exact(buf)
    }

    fn seek_to(&mut self, offset: u32) -> io::Result<()> {
        (**self).seek_to(offset)
    }

    fn seek_end(&mut self, rewind: u32) -> io::Result<()> {
        (**self).seek_end(rewind)
    }

    fn skip(&mut self, count: u32) -> io::Result<()> {
        (**self).skip(count)
    }

    fn tell(&mut self) -> io::Result<u32> {
        (**self).tell()
    }

    fn file_size(&mut self) -> io::Result<u32> {
        (**self).file_size()
    }
}

pub struct IoDataReader<R>(R);

impl<R: Read + Seek> IoDataReader<R> {
    pub fn new(reader: R) -> IoDataReader<R> {
        IoDataReader(reader)
    }
}

impl<R: Read + Seek> DataReader for IoDataReader<R> {
    fn read_u8(&mut self) -> io::Result<u8> {
        let mut buf = [0; 1];
        self.0.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    fn read_u16_le(&mut self) -> io::Result<u16> {
        let mut buf = [0; 2];
        self.0.read_exact(&mut buf)?;
        Ok(u16::from_le_bytes(buf))
    }

    fn read_i16_le(&mut self) -> io::Result<i16> {
        let mut buf = [0; 2];
        self.0.read_exact(&mut buf)?;
        Ok(i16::from_le_bytes(buf))
    }

    fn read_u24_le(&mut self) -> io::Result<u32> {
        let mut buf = [0; 3];
        self.0.read_exact(&mut buf)?;
        Ok(u32::from_le_bytes([buf[0], buf[1], buf[2], 0]))
    }

    fn read_u32_le(&mut self) -> io::Result<u32> {
        let mut buf = [0; 4];
        self.0.read_exact(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        self.0.read_exact(buf)
    }

    fn seek_to(&mut self, offset: u32) -> io::Result<()> {
        self.0.seek(io::SeekFrom::Start(u64::from(offset)))?;
        Ok(())
    }

    fn seek_end(&mut self, rewind: u32) -> io::Result<()> {
        self.0.seek(io::SeekFrom::End(-i64::from(rewind)))?;
        Ok(())
    }

    fn skip(&mut self, count: u32) -> io::Result<()> {
        self.0.seek(io::SeekFrom::Current(i64::from(count)))?;
        Ok(())
    }

    fn tell(&mut self) -> io::Result<u32> {
        Ok(self.0.stream_position()?.try_into().unwrap())
    }

    fn file_size(&mut self) -> io::Result<u32> {
        let curr_offset = self.tell()?;
        let result = self.0.seek(io::SeekFrom::End(0))?.try_into().unwrap();
        self.seek_to(curr_offset)?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn reads_little_endian_fields() {
        let data: &[u8] = &[0x01, 0x02, 0x03, 0xFF, 0xFF, 0x04, 0x05, 0x06, 0x07];
        let mut reader = IoDataReader::new(Cursor::new(data));
        assert_eq!(reader.read_u8().unwrap(), 0x01);
        assert_eq!(reader.read_u16_le().unwrap(), 0x0302);
        assert_eq!(reader.read_i16_le().unwrap(), -1);
        assert_eq!(reader.read_u32_le().unwrap(), 0x07060504);
        assert_eq!(reader.tell().unwrap(), 9);
    }

    #[test]
    fn read_u24_stops_after_three_bytes() {
        let data: &[u8] = &[0xAA, 0xBB, 0xCC, 0xDD];
        let mut reader = IoDataReader::new(Cursor::new(data));
        assert_eq!(reader.read_u24_le().unwrap(), 0x00CCBBAA);
        assert_eq!(reader.tell().unwrap(), 3);
    }

    #[test]
    fn read_past_end_is_an_error() {
        let data: &[u8] = &[0x01];
        let mut reader = IoDataReader::new(Cursor::new(data));
        assert!(reader.read_u16_le().is_err());
    }

    #[test]
    fn file_size_preserves_position() {
        let data: &[u8] = &[0; 16];
        let mut reader = IoDataReader::new(Cursor::new(data));
        reader.seek_to(4).unwrap();
        assert_eq!(reader.file_size().unwrap(), 16);
        assert_eq!(reader.tell().unwrap(), 4);
    }
}
