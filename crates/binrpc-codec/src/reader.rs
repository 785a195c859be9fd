use crate::error::{CodecError, Result};
use crate::limits::Limits;
use crate::traits::Decode;

/// Decodes values from a borrowed byte slice.
///
/// Composite reads (strings, arrays) leave the cursor where it was when they
/// fail, so a failed read never half-consumes a value.
#[derive(Debug)]
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
    limits: Limits,
}

macro_rules! read_le {
    ($($name:ident: $ty:ty),* $(,)?) => {
        $(
            #[doc = concat!("Read a little-endian `", stringify!($ty), "`.")]
            pub fn $name(&mut self) -> Result<$ty> {
                let bytes = self.take(std::mem::size_of::<$ty>())?;
                let mut raw = [0u8; std::mem::size_of::<$ty>()];
                raw.copy_from_slice(bytes);
                Ok(<$ty>::from_le_bytes(raw))
            }
        )*
    };
}

impl<'a> Reader<'a> {
    /// Create a reader over `data`.
    pub fn new(data: &'a [u8], limits: &Limits) -> Result<Self> {
        if data.is_empty() {
            return Err(CodecError::EmptyBuffer);
        }
        if data.len() > limits.data_max_len() {
            return Err(CodecError::Overflow {
                required: data.len(),
                max: limits.data_max_len(),
            });
        }
        Ok(Self {
            data,
            pos: 0,
            limits: *limits,
        })
    }

    /// Current cursor position.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// True once every byte has been consumed.
    pub fn is_exhausted(&self) -> bool {
        self.pos == self.data.len()
    }

    /// Limits this reader enforces.
    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Read a single-byte bool; any non-zero byte is `true`.
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    read_le! {
        read_u8: u8,
        read_i8: i8,
        read_u16: u16,
        read_i16: i16,
        read_u32: u32,
        read_i32: i32,
        read_u64: u64,
        read_i64: i64,
    }

    /// Read an `f32` from its raw bit pattern.
    pub fn read_f32(&mut self) -> Result<f32> {
        self.read_u32().map(f32::from_bits)
    }

    /// Read an `f64` from its raw bit pattern.
    pub fn read_f64(&mut self) -> Result<f64> {
        self.read_u64().map(f64::from_bits)
    }

    /// Read a length-prefixed UTF-8 string.
    pub fn read_string(&mut self) -> Result<String> {
        self.atomic(|reader| {
            let len = reader.read_u32()? as usize;
            let max = reader.limits.string_max_len();
            if len > max {
                return Err(CodecError::StringOverflow { len, max });
            }
            let start = reader.pos;
            let bytes = reader.take(len)?;
            std::str::from_utf8(bytes)
                .map(str::to_owned)
                .map_err(|_| CodecError::InvalidUtf8 { pos: start })
        })
    }

    /// Read a length-prefixed byte array.
    ///
    /// An empty array decodes to an empty (never absent) `Vec`.
    pub fn read_bytes(&mut self) -> Result<Vec<u8>> {
        self.atomic(|reader| {
            let len = reader.read_array_len()?;
            reader.take(len).map(<[u8]>::to_vec)
        })
    }

    /// Read an array count and check it against the array ceiling.
    pub fn read_array_len(&mut self) -> Result<usize> {
        self.atomic(|reader| {
            let len = reader.read_u32()? as usize;
            let max = reader.limits.array_max_len();
            if len > max {
                return Err(CodecError::ArrayOverflow { len, max });
            }
            Ok(len)
        })
    }

    /// Read a length-prefixed array of decodable elements.
    pub fn read_array<T: Decode>(&mut self) -> Result<Vec<T>> {
        self.atomic(|reader| {
            let len = reader.read_array_len()?;
            // Never reserve more memory than the remaining input occupies.
            let fits = reader.remaining() / std::mem::size_of::<T>().max(1);
            let mut items = Vec::with_capacity(len.min(fits));
            for _ in 0..len {
                items.push(T::decode(reader)?);
            }
            Ok(items)
        })
    }

    /// Decode any value implementing [`Decode`].
    pub fn read<T: Decode>(&mut self) -> Result<T> {
        T::decode(self)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let available = self.remaining();
        if n > available {
            return Err(CodecError::Truncated {
                pos: self.pos,
                needed: n,
                available,
            });
        }
        let start = self.pos;
        self.pos += n;
        Ok(&self.data[start..self.pos])
    }

    fn atomic<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let pos = self.pos;
        let result = f(self);
        if result.is_err() {
            self.pos = pos;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;

    use super::*;
    use crate::writer::Writer;

    fn small_limits() -> Limits {
        Limits::new(1024, 16, 16, 16).unwrap()
    }

    fn encode(limits: &Limits, f: impl FnOnce(&mut Writer<'_>)) -> Vec<u8> {
        let mut buf = BytesMut::new();
        let mut writer = Writer::new(&mut buf, limits);
        f(&mut writer);
        writer.as_slice().to_vec()
    }

    #[test]
    fn every_primitive_roundtrips() {
        let limits = Limits::default();
        let wire = encode(&limits, |w| {
            w.write_bool(true).unwrap();
            w.write_bool(false).unwrap();
            w.write_i8(i8::MIN).unwrap();
            w.write_u8(u8::MAX).unwrap();
            w.write_i16(i16::MIN).unwrap();
            w.write_u16(u16::MAX).unwrap();
            w.write_i32(i32::MIN).unwrap();
            w.write_u32(u32::MAX).unwrap();
            w.write_i64(i64::MIN).unwrap();
            w.write_u64(u64::MAX).unwrap();
            w.write_f32(f32::MIN_POSITIVE).unwrap();
            w.write_f64(-0.0003).unwrap();
        });

        let mut r = Reader::new(&wire, &limits).unwrap();
        assert!(r.read_bool().unwrap());
        assert!(!r.read_bool().unwrap());
        assert_eq!(r.read_i8().unwrap(), i8::MIN);
        assert_eq!(r.read_u8().unwrap(), u8::MAX);
        assert_eq!(r.read_i16().unwrap(), i16::MIN);
        assert_eq!(r.read_u16().unwrap(), u16::MAX);
        assert_eq!(r.read_i32().unwrap(), i32::MIN);
        assert_eq!(r.read_u32().unwrap(), u32::MAX);
        assert_eq!(r.read_i64().unwrap(), i64::MIN);
        assert_eq!(r.read_u64().unwrap(), u64::MAX);
        assert_eq!(r.read_f32().unwrap(), f32::MIN_POSITIVE);
        assert_eq!(r.read_f64().unwrap(), -0.0003);
        assert!(r.is_exhausted());
    }

    #[test]
    fn nan_bit_pattern_survives() {
        let limits = Limits::default();
        let nan = f64::from_bits(0x7FF8_0000_0000_1234);
        let wire = encode(&limits, |w| w.write_f64(nan).unwrap());
        let mut r = Reader::new(&wire, &limits).unwrap();
        assert_eq!(r.read_f64().unwrap().to_bits(), nan.to_bits());
    }

    #[test]
    fn empty_input_rejected() {
        let err = Reader::new(&[], &Limits::default()).unwrap_err();
        assert_eq!(err, CodecError::EmptyBuffer);
    }

    #[test]
    fn short_input_is_truncated_not_overflow() {
        let mut r = Reader::new(&[1, 2, 3], &Limits::default()).unwrap();
        let err = r.read_u32().unwrap_err();
        assert_eq!(
            err,
            CodecError::Truncated {
                pos: 0,
                needed: 4,
                available: 3
            }
        );
        assert!(!err.is_overflow());
        assert_eq!(r.position(), 0);
    }

    #[test]
    fn string_and_array_at_max_roundtrip() {
        let limits = small_limits();
        let text = "z".repeat(16);
        let items: Vec<i16> = (0..16).collect();
        let wire = encode(&limits, |w| {
            w.write_str(&text).unwrap();
            w.write_array(&items).unwrap();
            w.write_bytes(&[9; 16]).unwrap();
        });

        let mut r = Reader::new(&wire, &limits).unwrap();
        assert_eq!(r.read_string().unwrap(), text);
        assert_eq!(r.read_array::<i16>().unwrap(), items);
        assert_eq!(r.read_bytes().unwrap(), vec![9; 16]);
    }

    #[test]
    fn declared_string_over_max_rejected_before_reading_content() {
        let limits = small_limits();
        // Declares 17 bytes but carries none: the ceiling check must fire first.
        let wire = 17u32.to_le_bytes();
        let mut r = Reader::new(&wire, &limits).unwrap();

        let err = r.read_string().unwrap_err();
        assert_eq!(err, CodecError::StringOverflow { len: 17, max: 16 });
        assert_eq!(r.position(), 0);
    }

    #[test]
    fn declared_array_over_max_rejected_before_allocation() {
        let limits = small_limits();
        let wire = u32::MAX.to_le_bytes();
        let mut r = Reader::new(&wire, &limits).unwrap();

        let err = r.read_array::<u64>().unwrap_err();
        assert!(matches!(err, CodecError::ArrayOverflow { max: 16, .. }));

        let err = r.read_bytes().unwrap_err();
        assert!(matches!(err, CodecError::ArrayOverflow { .. }));
    }

    #[test]
    fn array_at_max_accepted_and_max_plus_one_rejected() {
        let limits = small_limits();
        let mut wire = encode(&limits, |w| w.write_array(&[5u8; 16]).unwrap());
        let mut r = Reader::new(&wire, &limits).unwrap();
        assert_eq!(r.read_array::<u8>().unwrap(), vec![5u8; 16]);

        wire = 17u32.to_le_bytes().to_vec();
        wire.extend_from_slice(&[5u8; 17]);
        let mut r = Reader::new(&wire, &limits).unwrap();
        let err = r.read_array::<u8>().unwrap_err();
        assert_eq!(err, CodecError::ArrayOverflow { len: 17, max: 16 });
        assert_eq!(r.position(), 0);

        let err = r.read_bytes().unwrap_err();
        assert_eq!(err, CodecError::ArrayOverflow { len: 17, max: 16 });
        assert_eq!(r.position(), 0);
    }

    #[test]
    fn wide_elements_do_not_overreserve() {
        #[derive(Debug)]
        #[allow(dead_code)]
        struct Wide([u64; 8]);

        impl Decode for Wide {
            fn decode(reader: &mut Reader<'_>) -> Result<Self> {
                let mut words = [0u64; 8];
                for word in &mut words {
                    *word = reader.read_u64()?;
                }
                Ok(Wide(words))
            }
        }

        let limits = Limits::default();
        let mut wire = 1000u32.to_le_bytes().to_vec();
        wire.extend_from_slice(&[0u8; 64]);
        let mut r = Reader::new(&wire, &limits).unwrap();

        let err = r.read_array::<Wide>().unwrap_err();
        assert!(matches!(err, CodecError::Truncated { .. }));
        assert_eq!(r.position(), 0);
    }

    #[test]
    fn array_count_larger_than_input_is_truncated() {
        let limits = Limits::default();
        let mut wire = 1000u32.to_le_bytes().to_vec();
        wire.extend_from_slice(&[1, 2, 3]);
        let mut r = Reader::new(&wire, &limits).unwrap();

        let err = r.read_bytes().unwrap_err();
        assert!(matches!(err, CodecError::Truncated { needed: 1000, .. }));
        assert_eq!(r.position(), 0);
    }

    #[test]
    fn invalid_utf8_rejected() {
        let limits = Limits::default();
        let mut wire = 2u32.to_le_bytes().to_vec();
        wire.extend_from_slice(&[0xC3, 0x28]);
        let mut r = Reader::new(&wire, &limits).unwrap();

        let err = r.read_string().unwrap_err();
        assert_eq!(err, CodecError::InvalidUtf8 { pos: 4 });
    }

    #[test]
    fn input_longer_than_data_ceiling_rejected() {
        let limits = Limits::new(16, 16, 16, 16).unwrap();
        let err = Reader::new(&[0; 17], &limits).unwrap_err();
        assert!(matches!(err, CodecError::Overflow { required: 17, max: 16 }));
    }

    #[test]
    fn empty_bytes_decode_to_empty_vec() {
        let limits = Limits::default();
        let wire = encode(&limits, |w| w.write_bytes(&[]).unwrap());
        let mut r = Reader::new(&wire, &limits).unwrap();
        let bytes = r.read_bytes().unwrap();
        assert!(bytes.is_empty());
    }
}
