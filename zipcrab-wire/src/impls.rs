//! Builtin implementations for primitive field types.

use crate::{BitReader, BitWriter, WireError, ZipWireRead, ZipWireWrite};

macro_rules! impl_primitive_wire_field {
    ($ty:ty, $size:expr) => {
        impl ZipWireWrite for $ty {
            fn serialize(&self, writer: &mut BitWriter) -> Result<(), WireError> {
                writer.bytes(&self.to_be_bytes())
            }
        }

        impl ZipWireRead for $ty {
            fn deserialize(reader: &mut BitReader<'_>) -> Result<Self, WireError> {
                reader
                    .bytes($size)
                    .map(|raw| Self::from_be_bytes(raw.try_into().expect("sized read")))
            }
        }
    };
}

impl_primitive_wire_field!(u8, 1);
impl_primitive_wire_field!(u16, 2);
impl_primitive_wire_field!(u32, 4);
impl_primitive_wire_field!(i8, 1);
impl_primitive_wire_field!(i16, 2);
impl_primitive_wire_field!(i32, 4);

/// A flag occupies a single bit.
impl ZipWireWrite for bool {
    fn serialize(&self, writer: &mut BitWriter) -> Result<(), WireError> {
        writer.flag(*self);

        Ok(())
    }
}

impl ZipWireRead for bool {
    fn deserialize(reader: &mut BitReader<'_>) -> Result<Self, WireError> {
        reader.bit()
    }
}

impl<const N: usize> ZipWireWrite for [u8; N] {
    fn serialize(&self, writer: &mut BitWriter) -> Result<(), WireError> {
        writer.bytes(self)
    }
}

impl<const N: usize> ZipWireRead for [u8; N] {
    fn deserialize(reader: &mut BitReader<'_>) -> Result<Self, WireError> {
        reader
            .bytes(N)
            .map(|raw| raw.try_into().expect("sized read"))
    }
}

/// Raw bytes extending to the end of the current frame.
impl ZipWireWrite for Vec<u8> {
    fn serialize(&self, writer: &mut BitWriter) -> Result<(), WireError> {
        writer.bytes(self)
    }
}

impl ZipWireRead for Vec<u8> {
    fn deserialize(reader: &mut BitReader<'_>) -> Result<Self, WireError> {
        Ok(reader.remaining().to_vec())
    }
}

/// Length-prefixed UTF-8 string: one length byte, then the text.
impl ZipWireWrite for String {
    fn serialize(&self, writer: &mut BitWriter) -> Result<(), WireError> {
        let len = u8::try_from(self.len()).map_err(|_| WireError::ValueOutOfRange)?;

        writer.byte(len)?;
        writer.bytes(self.as_bytes())
    }
}

impl ZipWireRead for String {
    fn deserialize(reader: &mut BitReader<'_>) -> Result<Self, WireError> {
        let len = usize::from(reader.byte()?);
        let raw = reader.bytes(len)?;

        core::str::from_utf8(raw)
            .map(str::to_owned)
            .map_err(|_| WireError::BadFormat)
    }
}

/// 16 bytes, network order.
impl ZipWireWrite for core::net::Ipv6Addr {
    fn serialize(&self, writer: &mut BitWriter) -> Result<(), WireError> {
        writer.bytes(&self.octets())
    }
}

impl ZipWireRead for core::net::Ipv6Addr {
    fn deserialize(reader: &mut BitReader<'_>) -> Result<Self, WireError> {
        <[u8; 16]>::deserialize(reader).map(Self::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives_big_endian() {
        let mut w = BitWriter::new();

        0xaau8.serialize(&mut w).unwrap();
        0xbbccu16.serialize(&mut w).unwrap();
        0x33445566u32.serialize(&mut w).unwrap();

        assert_eq!(
            w.as_slice(),
            &[0xaa, 0xbb, 0xcc, 0x33, 0x44, 0x55, 0x66][..]
        );

        let mut r = BitReader::new(w.as_slice());

        assert_eq!(u8::deserialize(&mut r).unwrap(), 0xaa);
        assert_eq!(u16::deserialize(&mut r).unwrap(), 0xbbcc);
        assert_eq!(u32::deserialize(&mut r).unwrap(), 0x33445566);
    }

    #[test]
    fn string_round_trip() {
        let mut w = BitWriter::new();

        "zipcrab".to_owned().serialize(&mut w).unwrap();

        assert_eq!(w.as_slice()[0], 7);

        let mut r = BitReader::new(w.as_slice());

        assert_eq!(String::deserialize(&mut r).unwrap(), "zipcrab");
    }

    #[test]
    fn bytes_consume_to_end() {
        let mut r = BitReader::new(&[0x01, 0x02, 0x03]);

        r.byte().unwrap();

        assert_eq!(Vec::<u8>::deserialize(&mut r).unwrap(), vec![0x02, 0x03]);
        assert!(r.is_empty());
    }

    #[test]
    fn ipv6_octets() {
        let addr: core::net::Ipv6Addr = "fd00:aaaa::3".parse().unwrap();
        let mut w = BitWriter::new();

        addr.serialize(&mut w).unwrap();

        let mut r = BitReader::new(w.as_slice());

        assert_eq!(core::net::Ipv6Addr::deserialize(&mut r).unwrap(), addr);
    }
}
