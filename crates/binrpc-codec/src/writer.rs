use bytes::BytesMut;

use crate::buffer::extend;
use crate::error::{CodecError, Result};
use crate::limits::Limits;
use crate::traits::Encode;

/// Encodes values into a growable buffer.
///
/// Writing starts at offset 0 of the supplied buffer and reuses its
/// allocation; the buffer only ever grows. `len()` is the logical length
/// (the furthest byte written), which may be shorter than `buf.len()` when a
/// larger scratch buffer is reused.
pub struct Writer<'a> {
    buf: &'a mut BytesMut,
    pos: usize,
    written: usize,
    limits: Limits,
}

macro_rules! write_le {
    ($($name:ident: $ty:ty),* $(,)?) => {
        $(
            #[doc = concat!("Write a little-endian `", stringify!($ty), "`.")]
            pub fn $name(&mut self, value: $ty) -> Result<()> {
                self.put(&value.to_le_bytes())
            }
        )*
    };
}

impl<'a> Writer<'a> {
    /// Create a writer over `buf`.
    pub fn new(buf: &'a mut BytesMut, limits: &Limits) -> Self {
        Self {
            buf,
            pos: 0,
            written: 0,
            limits: *limits,
        }
    }

    /// Current cursor position.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Logical length of the encoded data.
    pub fn len(&self) -> usize {
        self.written
    }

    /// True when nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.written == 0
    }

    /// The encoded bytes written so far.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf[..self.written]
    }

    /// Limits this writer enforces.
    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Move the cursor to an already-written position.
    pub fn set_position(&mut self, pos: usize) -> Result<()> {
        if pos > self.written {
            return Err(CodecError::OutOfRange {
                pos,
                len: 0,
                written: self.written,
            });
        }
        self.pos = pos;
        Ok(())
    }

    /// Advance the cursor by `n` zeroed bytes, e.g. to reserve a header.
    pub fn skip(&mut self, n: usize) -> Result<()> {
        let end = self.ensure(n)?;
        self.buf[self.pos..end].fill(0);
        self.advance_to(end);
        Ok(())
    }

    /// Overwrite already-written bytes at `pos` without moving the cursor.
    pub fn write_at(&mut self, pos: usize, bytes: &[u8]) -> Result<()> {
        let end = pos
            .checked_add(bytes.len())
            .ok_or(CodecError::Overflow {
                required: usize::MAX,
                max: self.limits.data_max_len(),
            })?;
        if end > self.limits.data_max_len() {
            return Err(CodecError::Overflow {
                required: end,
                max: self.limits.data_max_len(),
            });
        }
        if end > self.written {
            return Err(CodecError::OutOfRange {
                pos,
                len: bytes.len(),
                written: self.written,
            });
        }
        self.buf[pos..end].copy_from_slice(bytes);
        Ok(())
    }

    /// Write a bool as a single byte (0 or 1).
    pub fn write_bool(&mut self, value: bool) -> Result<()> {
        self.put(&[u8::from(value)])
    }

    write_le! {
        write_u8: u8,
        write_i8: i8,
        write_u16: u16,
        write_i16: i16,
        write_u32: u32,
        write_i32: i32,
        write_u64: u64,
        write_i64: i64,
    }

    /// Write an `f32` as its raw little-endian bit pattern.
    pub fn write_f32(&mut self, value: f32) -> Result<()> {
        self.write_u32(value.to_bits())
    }

    /// Write an `f64` as its raw little-endian bit pattern.
    pub fn write_f64(&mut self, value: f64) -> Result<()> {
        self.write_u64(value.to_bits())
    }

    /// Write a length-prefixed UTF-8 string.
    pub fn write_str(&mut self, value: &str) -> Result<()> {
        let len = value.len();
        if len > self.limits.string_max_len() {
            return Err(CodecError::StringOverflow {
                len,
                max: self.limits.string_max_len(),
            });
        }
        self.put_prefixed(value.as_bytes())
    }

    /// Write a length-prefixed byte array.
    pub fn write_bytes(&mut self, value: &[u8]) -> Result<()> {
        self.check_array_len(value.len())?;
        self.put_prefixed(value)
    }

    /// Write an array count after checking it against the array ceiling.
    pub fn write_array_len(&mut self, len: usize) -> Result<()> {
        self.check_array_len(len)?;
        self.write_u32(len as u32)
    }

    /// Write a length-prefixed array of encodable elements.
    ///
    /// If any element fails, the cursor and logical length are restored to
    /// where they were before the array.
    pub fn write_array<T: Encode>(&mut self, items: &[T]) -> Result<()> {
        let (pos, written) = (self.pos, self.written);
        let result = self.write_array_len(items.len()).and_then(|()| {
            items.iter().try_for_each(|item| item.encode(self))
        });
        if result.is_err() {
            self.pos = pos;
            self.written = written;
        }
        result
    }

    /// Encode any value implementing [`Encode`].
    pub fn write<T: Encode + ?Sized>(&mut self, value: &T) -> Result<()> {
        value.encode(self)
    }

    fn check_array_len(&self, len: usize) -> Result<()> {
        let max = self.limits.array_max_len().min(u32::MAX as usize);
        if len > max {
            return Err(CodecError::ArrayOverflow { len, max });
        }
        Ok(())
    }

    fn put_prefixed(&mut self, content: &[u8]) -> Result<()> {
        // Reserve prefix and content together so a failure leaves no partial prefix.
        let end = self.ensure(4 + content.len())?;
        let start = self.pos;
        self.buf[start..start + 4].copy_from_slice(&(content.len() as u32).to_le_bytes());
        self.buf[start + 4..end].copy_from_slice(content);
        self.advance_to(end);
        Ok(())
    }

    fn put(&mut self, bytes: &[u8]) -> Result<()> {
        let end = self.ensure(bytes.len())?;
        self.buf[self.pos..end].copy_from_slice(bytes);
        self.advance_to(end);
        Ok(())
    }

    fn ensure(&mut self, n: usize) -> Result<usize> {
        let max = self.limits.data_max_len();
        let end = self.pos.checked_add(n).ok_or(CodecError::Overflow {
            required: usize::MAX,
            max,
        })?;
        if end > max {
            return Err(CodecError::Overflow { required: end, max });
        }
        extend(self.buf, end, self.limits.growth_slack());
        Ok(end)
    }

    fn advance_to(&mut self, end: usize) {
        self.pos = end;
        self.written = self.written.max(end);
    }
}
