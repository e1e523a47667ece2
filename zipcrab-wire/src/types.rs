//! Field types with non-trivial wire forms.

use crate::{BitReader, BitWriter, WireError, ZipWireRead, ZipWireWrite};
use core::fmt;
use core::str::FromStr;

/// A bit group carrying its own width. Equal and ordered by integer value.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Bits<const N: u8>(pub u8);

impl<const N: u8> Bits<N> {
    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    pub const fn value(self) -> u8 {
        self.0
    }
}

impl<const N: u8> From<u8> for Bits<N> {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

impl<const N: u8> PartialEq<u8> for Bits<N> {
    fn eq(&self, other: &u8) -> bool {
        self.0 == *other
    }
}

impl<const N: u8> fmt::Display for Bits<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<const N: u8> ZipWireWrite for Bits<N> {
    fn serialize(&self, writer: &mut BitWriter) -> Result<(), WireError> {
        if N < 8 && self.0 >> N != 0 {
            return Err(WireError::ValueOutOfRange);
        }

        writer.bits(self.0, N);

        Ok(())
    }
}

impl<const N: u8> ZipWireRead for Bits<N> {
    fn deserialize(reader: &mut BitReader<'_>) -> Result<Self, WireError> {
        reader.bits(N).map(Self)
    }
}

/// A decimal value with an explicit scale, as used by metering and
/// multilevel sensor reports.
///
/// Wire form is a tri-field header `precision:3 | scale:2 | size:3`
/// followed by a signed `size`-byte big-endian mantissa. The numeric value
/// is `mantissa / 10^precision`; `scale` is unit selection and is kept
/// verbatim for the consumer to interpret.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScaledValue {
    pub precision: u8,
    pub scale: u8,
    pub size: u8,
    pub mantissa: i32,
}

impl ScaledValue {
    pub fn value(&self) -> f64 {
        f64::from(self.mantissa) / 10f64.powi(i32::from(self.precision))
    }
}

impl fmt::Display for ScaledValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.*} (scale {})",
            usize::from(self.precision),
            self.value(),
            self.scale
        )
    }
}

impl ZipWireWrite for ScaledValue {
    fn serialize(&self, writer: &mut BitWriter) -> Result<(), WireError> {
        if !matches!(self.size, 1 | 2 | 4) {
            return Err(WireError::ValueOutOfRange);
        }

        writer.bits(self.precision, 3);
        writer.bits(self.scale, 2);
        writer.bits(self.size, 3);

        let raw = self.mantissa.to_be_bytes();

        writer.bytes(&raw[4 - usize::from(self.size)..])
    }
}

impl ZipWireRead for ScaledValue {
    fn deserialize(reader: &mut BitReader<'_>) -> Result<Self, WireError> {
        let precision = reader.bits(3)?;
        let scale = reader.bits(2)?;
        let size = reader.bits(3)?;

        if !matches!(size, 1 | 2 | 4) {
            return Err(WireError::BadLength);
        }

        let raw = reader.bytes(usize::from(size))?;

        // Sign-extend into an i32.
        let mut mantissa = if raw[0] & 0x80 != 0 { -1i32 } else { 0 };

        for byte in raw {
            mantissa = (mantissa << 8) | i32::from(*byte);
        }

        Ok(Self {
            precision,
            scale,
            size,
            mantissa,
        })
    }
}

/// Device-Specific Key: 16 bytes shown as eight dash-separated 5-digit
/// decimals. An empty DSK (no bytes on the wire) is permitted.
///
/// The wire form is length-prefixed: one length byte, then the raw key.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Dsk(Vec<u8>);

impl Dsk {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, WireError> {
        let bytes = bytes.into();

        if !bytes.is_empty() && bytes.len() != 16 {
            return Err(WireError::BadLength);
        }

        Ok(Self(bytes))
    }

    pub const fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Dsk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;

        for pair in self.0.chunks(2) {
            if !first {
                f.write_str("-")?;
            }

            first = false;

            write!(f, "{:05}", u16::from_be_bytes([pair[0], pair[1]]))?;
        }

        Ok(())
    }
}

impl FromStr for Dsk {
    type Err = WireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(Self::empty());
        }

        let mut bytes = Vec::with_capacity(16);

        for group in s.split('-') {
            let word: u16 = group.parse().map_err(|_| WireError::BadFormat)?;

            bytes.extend_from_slice(&word.to_be_bytes());
        }

        Self::new(bytes)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Dsk {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Dsk {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;

        s.parse().map_err(serde::de::Error::custom)
    }
}

impl ZipWireWrite for Dsk {
    fn serialize(&self, writer: &mut BitWriter) -> Result<(), WireError> {
        writer.byte(self.0.len() as u8)?;
        writer.bytes(&self.0)
    }
}

impl ZipWireRead for Dsk {
    fn deserialize(reader: &mut BitReader<'_>) -> Result<Self, WireError> {
        // Absent entirely: some frames simply end before the DSK.
        if reader.is_empty() {
            return Ok(Self::empty());
        }

        let len = usize::from(reader.byte()?);

        Self::new(reader.bytes(len)?.to_vec())
    }
}

/// Z-Wave network home id, rendered as hex.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HomeId(pub u32);

impl fmt::Display for HomeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08X}", self.0)
    }
}

impl ZipWireWrite for HomeId {
    fn serialize(&self, writer: &mut BitWriter) -> Result<(), WireError> {
        self.0.serialize(writer)
    }
}

impl ZipWireRead for HomeId {
    fn deserialize(reader: &mut BitReader<'_>) -> Result<Self, WireError> {
        u32::deserialize(reader).map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn bits_width_check() {
        let mut w = BitWriter::new();

        assert_eq!(
            Bits::<3>(0x0a).serialize(&mut w),
            Err(WireError::ValueOutOfRange)
        );

        Bits::<3>(0x05).serialize(&mut w).unwrap();
        Bits::<5>(0x11).serialize(&mut w).unwrap();

        assert_eq!(w.as_slice(), &[0b1011_0001]);
    }

    #[test]
    fn scaled_value_round_trip() {
        let v = ScaledValue {
            precision: 2,
            scale: 1,
            size: 2,
            mantissa: -1234,
        };

        let mut w = BitWriter::new();

        v.serialize(&mut w).unwrap();

        // 010 01 010 | 0xfb2e
        assert_eq!(w.as_slice(), &[0b0100_1010, 0xfb, 0x2e]);

        let mut r = BitReader::new(w.as_slice());
        let back = ScaledValue::deserialize(&mut r).unwrap();

        assert_eq!(back, v);
        assert_eq!(back.value(), -12.34);
    }

    #[test]
    fn dsk_canonical_form() {
        let text = "32333-28706-61913-46249-43027-54794-27762-42208";
        let dsk: Dsk = text.parse().unwrap();

        assert_eq!(
            dsk.as_bytes(),
            &[
                0x7e, 0x4d, 0x70, 0x22, 0xf1, 0xd9, 0xb4, 0xa9, 0xa8, 0x13, 0xd6, 0x0a, 0x6c,
                0x72, 0xa4, 0xe0
            ]
        );

        let mut w = BitWriter::new();

        dsk.serialize(&mut w).unwrap();

        // Length byte, then the raw key.
        assert_eq!(w.as_slice()[0], 0x10);
        assert_eq!(&w.as_slice()[1..], dsk.as_bytes());

        let mut r = BitReader::new(w.as_slice());
        let back = Dsk::deserialize(&mut r).unwrap();

        assert_eq!(back, dsk);
        assert_eq!(back.to_string(), text);
    }

    #[test]
    fn dsk_absent() {
        let mut r = BitReader::new(&[]);

        assert_eq!(Dsk::deserialize(&mut r).unwrap(), Dsk::empty());
        assert_eq!(Dsk::empty().to_string(), "");
    }

    #[test]
    fn home_id_hex() {
        assert_eq!(HomeId(0xdeadbe3f).to_string(), "DEADBE3F");
    }
}
