use crate::error::{DbError, Result};

const U8_SIZE: usize = std::mem::size_of::<u8>();
const U32_SIZE: usize = std::mem::size_of::<u32>();
const U64_SIZE: usize = std::mem::size_of::<u64>();
const I32_SIZE: usize = std::mem::size_of::<i32>();

/// Writes big-endian values into a pre-sized buffer. Callers size the
/// buffer from the schema, so running past the end is a programming error
/// and panics via the slice bounds check.
pub struct Serializer<'a> {
    buffer: &'a mut [u8],
    pos: usize,
}

impl<'a> Serializer<'a> {
    pub fn new(buffer: &'a mut [u8]) -> Self {
        Self { buffer, pos: 0 }
    }

    pub fn write_u8(&mut self, val: u8) {
        self.buffer[self.pos..self.pos + U8_SIZE].copy_from_slice(&val.to_be_bytes());
        self.pos += U8_SIZE;
    }

    pub fn write_u32(&mut self, val: u32) {
        self.buffer[self.pos..self.pos + U32_SIZE].copy_from_slice(&val.to_be_bytes());
        self.pos += U32_SIZE;
    }

    pub fn write_u64(&mut self, val: u64) {
        self.buffer[self.pos..self.pos + U64_SIZE].copy_from_slice(&val.to_be_bytes());
        self.pos += U64_SIZE;
    }

    pub fn write_i32(&mut self, val: i32) {
        self.buffer[self.pos..self.pos + I32_SIZE].copy_from_slice(&val.to_be_bytes());
        self.pos += I32_SIZE;
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buffer[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
    }

    /// The buffer is zeroed on allocation, so padding just advances.
    pub fn write_zeros(&mut self, count: usize) {
        self.buffer[self.pos..self.pos + count].fill(0);
        self.pos += count;
    }

    pub fn position(&self) -> usize {
        self.pos
    }
}

/// Bounds-checked big-endian reads; a truncated buffer surfaces as a
/// format error rather than a panic, since page and log bytes come from
/// disk.
pub struct Deserializer<'a> {
    buffer: &'a [u8],
    pos: usize,
}

impl<'a> Deserializer<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, pos: 0 }
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8]> {
        if self.pos + count > self.buffer.len() {
            return Err(DbError::FormatError(format!(
                "unexpected end of input at byte {}",
                self.pos
            )));
        }
        let slice = &self.buffer[self.pos..self.pos + count];
        self.pos += count;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(U8_SIZE)?[0])
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.take(U32_SIZE)?;
        Ok(u32::from_be_bytes(bytes.try_into().expect("sized read")))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        let bytes = self.take(U64_SIZE)?;
        Ok(u64::from_be_bytes(bytes.try_into().expect("sized read")))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        let bytes = self.take(I32_SIZE)?;
        Ok(i32::from_be_bytes(bytes.try_into().expect("sized read")))
    }

    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        self.take(count)
    }

    pub fn skip(&mut self, count: usize) -> Result<()> {
        self.take(count).map(|_| ())
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.pos
    }
}
