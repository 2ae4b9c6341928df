//! MXF essence plumbing for the dcpack library.
//!
//! A DCP wraps its picture, sound, Atmos and SMPTE timed-text essence in
//! MXF. This crate provides what the package layer needs from those files
//! and nothing more: KLV and partition parsing, essence-kind sniffing from
//! container labels, descriptor extraction (edit rate, intrinsic duration,
//! content-key id), a frame-indexed reader for hash and frame-size walks,
//! and a minimal writer used as the authoring seam. Codec internals stay
//! behind this boundary.

mod descriptor;
mod klv;
mod partition;
mod reader;
mod ul;
mod writer;

pub use descriptor::{decode_key_id, encode_key_id, EssenceDescriptor, EssenceKind};
pub use klv::{encode_ber_length, write_klv, KlvHeader, KlvScanner};
pub use partition::{Partition, PartitionKind};
pub use reader::MxfReader;
pub use ul::{labels, UniversalLabel, UL};
pub use writer::MxfWriter;

pub use dcpack_core::MxfError;

/// Result type for MXF operations.
pub type Result<T> = std::result::Result<T, MxfError>;
