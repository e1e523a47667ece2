//! Bit-granular codec primitives used to pack/unpack Z-Wave command class
//! frames on the wire.
//!
//! Z-Wave frames pack flags and sub-byte integers MSB-first within each
//! byte and use big-endian multi-byte integers, so the read/write traits
//! stream through a [`BitReader`]/[`BitWriter`] pair rather than operating
//! on plain byte slices. This crate carries no protocol knowledge; frame
//! schemas live in `zipcrab`.

#![deny(trivial_casts)]
#![deny(trivial_numeric_casts)]
#![deny(unused_import_braces)]
#![deny(unused_qualifications)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]

mod error;
mod impls;
mod stream;
mod types;

pub use error::WireError;
pub use stream::{BitReader, BitWriter};
pub use types::{Bits, Dsk, HomeId, ScaledValue};

/// A field type that can be written to the bit stream.
pub trait ZipWireWrite {
    /// Append this value's wire form to `writer`.
    fn serialize(&self, writer: &mut BitWriter) -> Result<(), WireError>;
}

/// A field type that can be read back from the bit stream.
pub trait ZipWireRead: Sized {
    /// Consume this value's wire form from `reader`.
    fn deserialize(reader: &mut BitReader<'_>) -> Result<Self, WireError>;
}
