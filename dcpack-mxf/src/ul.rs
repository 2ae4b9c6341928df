//! Universal Label (UL) types.
//!
//! Universal Labels are 16-byte identifiers defined by SMPTE for
//! identifying all elements in MXF files. Only the labels a DCP actually
//! carries are registered here.

use std::fmt;

/// A 16-byte Universal Label.
pub type UL = [u8; 16];

/// Universal Label wrapper with helper methods.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniversalLabel(pub UL);

impl UniversalLabel {
    /// Create from raw bytes.
    pub fn new(bytes: UL) -> Self {
        UniversalLabel(bytes)
    }

    /// Get raw bytes.
    pub fn as_bytes(&self) -> &UL {
        &self.0
    }

    /// Check if this is a SMPTE-registered label (starts with 06 0E 2B 34).
    pub fn is_smpte(&self) -> bool {
        self.0[0] == 0x06 && self.0[1] == 0x0E && self.0[2] == 0x2B && self.0[3] == 0x34
    }

    /// Check if this matches a pattern, ignoring the version byte.
    pub fn matches_base(&self, pattern: &UL) -> bool {
        self.0[0..7] == pattern[0..7] && self.0[8..] == pattern[8..]
    }

    /// Check if this is a partition pack.
    pub fn is_partition_pack(&self) -> bool {
        self.0[0..13] == labels::PARTITION_PACK_BASE[0..13]
            && (0x02..=0x04).contains(&self.0[13])
    }

    /// Check if this is a primer pack.
    pub fn is_primer_pack(&self) -> bool {
        self.0 == labels::PRIMER_PACK
    }

    /// Check if this is a KLV fill item.
    pub fn is_fill_item(&self) -> bool {
        self.0[0..13] == labels::FILL_ITEM[0..13]
    }

    /// Check if this is an essence element.
    pub fn is_essence(&self) -> bool {
        self.is_smpte() && self.0[4] == 0x01 && self.0[8] == 0x0D
    }

    /// Check if this is a metadata local set.
    pub fn is_metadata(&self) -> bool {
        self.is_smpte() && self.0[4] == 0x02
    }
}

impl fmt::Debug for UniversalLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UL(")?;
        for (i, b) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{b:02x}")?;
        }
        write!(f, ")")
    }
}

impl From<UL> for UniversalLabel {
    fn from(bytes: UL) -> Self {
        UniversalLabel(bytes)
    }
}

/// The label registry for DCP essence files.
pub mod labels {
    use super::UL;

    /// Base pattern for partition packs; byte 13 selects header (0x02),
    /// body (0x03) or footer (0x04), byte 14 the open/closed status.
    pub const PARTITION_PACK_BASE: UL = [
        0x06, 0x0E, 0x2B, 0x34, 0x02, 0x05, 0x01, 0x01, 0x0D, 0x01, 0x02, 0x01, 0x01, 0x02, 0x04,
        0x00,
    ];

    /// Header partition, closed and complete.
    pub const HEADER_PARTITION_CLOSED_COMPLETE: UL = [
        0x06, 0x0E, 0x2B, 0x34, 0x02, 0x05, 0x01, 0x01, 0x0D, 0x01, 0x02, 0x01, 0x01, 0x02, 0x04,
        0x00,
    ];

    /// Footer partition, closed and complete.
    pub const FOOTER_PARTITION: UL = [
        0x06, 0x0E, 0x2B, 0x34, 0x02, 0x05, 0x01, 0x01, 0x0D, 0x01, 0x02, 0x01, 0x01, 0x04, 0x04,
        0x00,
    ];

    /// Primer pack.
    pub const PRIMER_PACK: UL = [
        0x06, 0x0E, 0x2B, 0x34, 0x02, 0x05, 0x01, 0x01, 0x0D, 0x01, 0x02, 0x01, 0x01, 0x05, 0x01,
        0x00,
    ];

    /// KLV fill item.
    pub const FILL_ITEM: UL = [
        0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x02, 0x03, 0x01, 0x02, 0x10, 0x01, 0x00, 0x00,
        0x00,
    ];

    /// OP1a operational pattern.
    pub const OP1A: UL = [
        0x06, 0x0E, 0x2B, 0x34, 0x04, 0x01, 0x01, 0x01, 0x0D, 0x01, 0x02, 0x01, 0x01, 0x01, 0x01,
        0x00,
    ];

    /// Essence container: frame-wrapped JPEG 2000 picture.
    pub const EC_JPEG2000: UL = [
        0x06, 0x0E, 0x2B, 0x34, 0x04, 0x01, 0x01, 0x07, 0x0D, 0x01, 0x03, 0x01, 0x02, 0x0C, 0x01,
        0x00,
    ];

    /// Essence container: frame-wrapped broadcast-wave PCM sound.
    pub const EC_PCM: UL = [
        0x06, 0x0E, 0x2B, 0x34, 0x04, 0x01, 0x01, 0x01, 0x0D, 0x01, 0x03, 0x01, 0x02, 0x06, 0x01,
        0x00,
    ];

    /// Essence container: immersive audio bitstream (Atmos).
    pub const EC_ATMOS: UL = [
        0x06, 0x0E, 0x2B, 0x34, 0x04, 0x01, 0x01, 0x0D, 0x0D, 0x01, 0x03, 0x01, 0x02, 0x16, 0x00,
        0x00,
    ];

    /// Essence container: D-Cinema timed text.
    pub const EC_TIMED_TEXT: UL = [
        0x06, 0x0E, 0x2B, 0x34, 0x04, 0x01, 0x01, 0x0A, 0x0D, 0x01, 0x03, 0x01, 0x02, 0x13, 0x01,
        0x01,
    ];

    /// Picture essence descriptor local set.
    pub const PICTURE_DESCRIPTOR: UL = [
        0x06, 0x0E, 0x2B, 0x34, 0x02, 0x53, 0x01, 0x01, 0x0D, 0x01, 0x01, 0x01, 0x01, 0x01, 0x29,
        0x00,
    ];

    /// Wave PCM sound essence descriptor local set.
    pub const SOUND_DESCRIPTOR: UL = [
        0x06, 0x0E, 0x2B, 0x34, 0x02, 0x53, 0x01, 0x01, 0x0D, 0x01, 0x01, 0x01, 0x01, 0x01, 0x48,
        0x00,
    ];

    /// Immersive audio (Atmos) descriptor local set.
    pub const ATMOS_DESCRIPTOR: UL = [
        0x06, 0x0E, 0x2B, 0x34, 0x02, 0x53, 0x01, 0x01, 0x0D, 0x01, 0x01, 0x01, 0x01, 0x01, 0x7B,
        0x00,
    ];

    /// Timed text descriptor local set.
    pub const TIMED_TEXT_DESCRIPTOR: UL = [
        0x06, 0x0E, 0x2B, 0x34, 0x02, 0x53, 0x01, 0x01, 0x0D, 0x01, 0x01, 0x01, 0x01, 0x01, 0x64,
        0x00,
    ];

    /// Cryptographic context set; the value is the content-key UUID.
    pub const CRYPTOGRAPHIC_CONTEXT: UL = [
        0x06, 0x0E, 0x2B, 0x34, 0x02, 0x53, 0x01, 0x01, 0x0D, 0x01, 0x04, 0x01, 0x02, 0x02, 0x00,
        0x00,
    ];

    /// Essence element: JPEG 2000 picture frame.
    pub const EE_JPEG2000: UL = [
        0x06, 0x0E, 0x2B, 0x34, 0x01, 0x02, 0x01, 0x01, 0x0D, 0x01, 0x03, 0x01, 0x15, 0x01, 0x08,
        0x01,
    ];

    /// Essence element: PCM sound frame.
    pub const EE_PCM: UL = [
        0x06, 0x0E, 0x2B, 0x34, 0x01, 0x02, 0x01, 0x01, 0x0D, 0x01, 0x03, 0x01, 0x16, 0x01, 0x01,
        0x01,
    ];

    /// Essence element: Atmos frame.
    pub const EE_ATMOS: UL = [
        0x06, 0x0E, 0x2B, 0x34, 0x01, 0x02, 0x01, 0x01, 0x0D, 0x01, 0x03, 0x01, 0x17, 0x01, 0x02,
        0x01,
    ];

    /// Essence element: timed text payload or ancillary resource.
    pub const EE_TIMED_TEXT: UL = [
        0x06, 0x0E, 0x2B, 0x34, 0x01, 0x02, 0x01, 0x01, 0x0D, 0x01, 0x03, 0x01, 0x18, 0x01, 0x01,
        0x01,
    ];
}
