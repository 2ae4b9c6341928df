//! Core value types for the dcpack library.
//!
//! This crate holds the primitives shared by every part of dcpack: typed
//! errors, identifiers, rationals, timecodes, wall-clock stamps, language
//! tags, the small closed enums of the DCP XML vocabulary and the SHA-1
//! file digest that underpins packing-list integrity.

pub mod digest;
pub mod error;
pub mod fraction;
pub mod id;
pub mod language;
pub mod local_time;
pub mod time;
pub mod types;

pub use digest::{base64_decode, base64_encode, make_digest, make_digest_of_bytes, ProgressFn};
pub use error::{Error, MxfError, Result, XmlError};
pub use fraction::Fraction;
pub use id::{ids_equal, make_uuid, remove_urn_uuid};
pub use language::{LanguageTag, RegionSubtag};
pub use local_time::{LocalTime, UtcOffset};
pub use time::Time;
pub use types::{
    Colour, ContentKind, Direction, Effect, HAlign, Marker, NameFormat, Size, Standard, VAlign,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
