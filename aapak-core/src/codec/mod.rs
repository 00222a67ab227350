//! Byte-level codecs for the pak header and FAT records.
//!
//! Both codecs walk the element layout of a [`crate::pak::FormatDescriptor`],
//! so a new pak generation only needs a new descriptor.

pub mod entry;
pub mod header;
