//! # dcpack
//!
//! A library for reading, authoring and verifying Digital Cinema Packages
//! (DCPs): the on-disk bundles of XML manifests and MXF-wrapped essence
//! used to distribute features to theatrical exhibitors. Both the older
//! Interop dialect and the SMPTE dialect are supported, the latter with
//! the checks of the Bv2.1 exhibitor profile.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use dcpack::{ContentKind, Cpl, Dcp, NameFormat, Reel, Standard, XmlMetadata};
//! use std::path::Path;
//!
//! fn main() -> dcpack::Result<()> {
//!     // Read a package and list its compositions.
//!     let mut dcp = Dcp::new(Path::new("/media/MOVIE_FTR"))?;
//!     let mut notes = Vec::new();
//!     dcp.read(Some(&mut notes))?;
//!     for cpl in dcp.cpls() {
//!         println!("{}: {}", cpl.id, cpl.content_title_text);
//!     }
//!
//!     // Author one: assemble reels into a CPL and write the manifests.
//!     let mut out = Dcp::new(Path::new("/media/OUT_TST"))?;
//!     let mut cpl = Cpl::new("A Test DCP", ContentKind::Feature);
//!     cpl.add_reel(Reel::new());
//!     out.add_cpl(cpl);
//!     out.write_xml(
//!         Standard::Smpte,
//!         &XmlMetadata::default(),
//!         None,
//!         &NameFormat::default(),
//!     )?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! The work is split across a small workspace:
//! - `dcpack-core`: identifiers, rationals, timecodes, language tags,
//!   digests and errors
//! - `dcpack-mxf`: KLV plumbing and essence descriptors
//! - `dcpack-xml`: the XML element tree, canonicalisation, signatures and
//!   certificate chains
//!
//! This crate holds the package model itself (assets, subtitles, reels,
//! CPL, PKL, asset map, KDM consumption) and the verifier, and re-exports
//! the pieces callers need.

mod asset;
mod asset_map;
mod atmos;
mod codec;
mod cpl;
mod dcp;
mod equality;
mod font;
mod kdm;
mod picture;
mod pkl;
mod reel;
mod sound;
pub mod subtitle;
pub mod verify;

pub use asset::{Asset, AssetCommon};
pub use asset_map::{AssetMap, AssetMapEntry};
pub use atmos::AtmosAsset;
pub use codec::{Jpeg2000Codec, XyzImage};
pub use cpl::{
    CompositionMetadata, ContentVersion, Cpl, Luminance, Rating, CPL_INTEROP_NS,
    CPL_METADATA_NS, CPL_SMPTE_NS,
};
pub use dcp::{Dcp, XmlMetadata};
pub use equality::{EqualityOptions, NoteHandler, NoteKind};
pub use font::FontAsset;
pub use kdm::{DecryptedKdm, DecryptedKdmKey, EncryptedKdm, TypedKeyId};
pub use picture::PictureAsset;
pub use pkl::{Pkl, PklAsset};
pub use reel::{
    Reel, ReelAssetData, ReelAtmos, ReelMarkers, ReelPicture, ReelSound, ReelSubtitle, Ref,
};
pub use sound::SoundAsset;
pub use subtitle::{
    InteropSubtitleAsset, SmpteSubtitleAsset, Subtitle, SubtitleImage, SubtitlePlacement,
    SubtitleStyle, SubtitleText,
};
pub use verify::{
    note_to_string, verify, NoteSeverity, VerificationCode, VerificationNote,
};

// The primitives callers constantly need travel with this crate.
pub use dcpack_core::{
    ids_equal, make_uuid, Colour, ContentKind, Direction, Effect, Error, Fraction, HAlign,
    LanguageTag, LocalTime, Marker, MxfError, NameFormat, Result, Size, Standard, Time,
    UtcOffset, VAlign, XmlError,
};
pub use dcpack_mxf::{EssenceDescriptor, EssenceKind, MxfReader, MxfWriter};
pub use dcpack_xml::{Certificate, CertificateChain, ChainBuilder};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
