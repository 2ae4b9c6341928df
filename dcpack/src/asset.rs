//! The polymorphic asset model.
//!
//! Every file a DCP tracks is an [`Asset`]: a tagged variant over the
//! concrete kinds, with an [`AssetCommon`] record carrying what they all
//! share. Cross-variant queries (edit rate, hash, encryption) dispatch by
//! pattern match.

use crate::atmos::AtmosAsset;
use crate::font::FontAsset;
use crate::picture::PictureAsset;
use crate::sound::SoundAsset;
use crate::subtitle::{InteropSubtitleAsset, SmpteSubtitleAsset};
use dcpack_core::{make_digest, Error, Fraction, ProgressFn, Result, Standard};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// State shared by every asset kind.
#[derive(Debug, Default)]
pub struct AssetCommon {
    /// The asset's UUID, stored bare.
    pub id: String,
    /// Where the asset lives on disk, once known.
    pub file: Option<PathBuf>,
    hash: OnceLock<String>,
}

impl AssetCommon {
    /// Create common state for a fresh asset.
    pub fn new(id: String, file: Option<PathBuf>) -> Self {
        AssetCommon {
            id,
            file,
            hash: OnceLock::new(),
        }
    }

    /// The base64 SHA-1 of the file's bytes, computed on first use and
    /// cached.
    pub fn hash(&self, progress: Option<ProgressFn>) -> Result<String> {
        if let Some(hash) = self.hash.get() {
            return Ok(hash.clone());
        }
        let file = self
            .file
            .as_ref()
            .ok_or_else(|| Error::misc(format!("asset {} has no file to hash", self.id)))?;
        let hash = make_digest(file, progress)?;
        let _ = self.hash.set(hash.clone());
        Ok(hash)
    }

    /// Record the file path once the asset has been written.
    pub fn set_file(&mut self, file: PathBuf) {
        self.file = Some(file);
    }
}

impl Clone for AssetCommon {
    fn clone(&self) -> Self {
        let hash = OnceLock::new();
        if let Some(h) = self.hash.get() {
            let _ = hash.set(h.clone());
        }
        AssetCommon {
            id: self.id.clone(),
            file: self.file.clone(),
            hash,
        }
    }
}

/// Any file a DCP tracks, other than its manifests.
#[derive(Debug, Clone)]
pub enum Asset {
    /// 2D JPEG 2000 picture.
    MonoPicture(PictureAsset),
    /// Stereoscopic JPEG 2000 picture.
    StereoPicture(PictureAsset),
    /// PCM sound.
    Sound(SoundAsset),
    /// Dolby Atmos data.
    Atmos(AtmosAsset),
    /// Interop subtitles (an XML file with PNG and font sidecars).
    InteropSubtitle(InteropSubtitleAsset),
    /// SMPTE subtitles (MXF-wrapped XML with embedded resources).
    SmpteSubtitle(SmpteSubtitleAsset),
    /// A font referenced by Interop subtitles.
    Font(FontAsset),
}

impl Asset {
    /// Common state of any variant.
    pub fn common(&self) -> &AssetCommon {
        match self {
            Asset::MonoPicture(a) | Asset::StereoPicture(a) => &a.common,
            Asset::Sound(a) => &a.common,
            Asset::Atmos(a) => &a.common,
            Asset::InteropSubtitle(a) => &a.common,
            Asset::SmpteSubtitle(a) => &a.common,
            Asset::Font(a) => &a.common,
        }
    }

    /// The asset's UUID.
    pub fn id(&self) -> &str {
        &self.common().id
    }

    /// The asset's file, if it has been read from or written to disk.
    pub fn file(&self) -> Option<&Path> {
        self.common().file.as_deref()
    }

    /// The base64 SHA-1 of the on-disk bytes.
    pub fn hash(&self, progress: Option<ProgressFn>) -> Result<String> {
        self.common().hash(progress)
    }

    /// File size in bytes.
    pub fn size_on_disk(&self) -> Result<u64> {
        let file = self
            .file()
            .ok_or_else(|| Error::misc(format!("asset {} has no file", self.id())))?;
        Ok(std::fs::metadata(file)?.len())
    }

    /// Edit rate, for kinds that have one intrinsically.
    pub fn edit_rate(&self) -> Option<Fraction> {
        match self {
            Asset::MonoPicture(a) | Asset::StereoPicture(a) => Some(a.edit_rate),
            Asset::Sound(a) => Some(a.edit_rate),
            Asset::Atmos(a) => Some(a.edit_rate),
            Asset::SmpteSubtitle(a) => Some(a.edit_rate),
            Asset::InteropSubtitle(_) | Asset::Font(_) => None,
        }
    }

    /// Intrinsic duration in edit units, for kinds that have one.
    pub fn intrinsic_duration(&self) -> Option<i64> {
        match self {
            Asset::MonoPicture(a) | Asset::StereoPicture(a) => Some(a.intrinsic_duration),
            Asset::Sound(a) => Some(a.intrinsic_duration),
            Asset::Atmos(a) => Some(a.intrinsic_duration),
            Asset::SmpteSubtitle(a) => Some(a.intrinsic_duration),
            Asset::InteropSubtitle(_) | Asset::Font(_) => None,
        }
    }

    /// Content-key id declared by the MXF header, if any.
    pub fn key_id(&self) -> Option<&str> {
        match self {
            Asset::MonoPicture(a) | Asset::StereoPicture(a) => a.key_id.as_deref(),
            Asset::Sound(a) => a.key_id.as_deref(),
            Asset::Atmos(a) => a.key_id.as_deref(),
            Asset::SmpteSubtitle(a) => a.key_id.as_deref(),
            Asset::InteropSubtitle(_) | Asset::Font(_) => None,
        }
    }

    /// Whether the asset's essence is encrypted.
    pub fn encrypted(&self) -> bool {
        self.key_id().is_some()
    }

    /// The `<Type>` this asset carries in a PKL.
    pub fn pkl_type(&self, standard: Standard) -> String {
        match self {
            Asset::MonoPicture(_)
            | Asset::StereoPicture(_)
            | Asset::Sound(_)
            | Asset::Atmos(_)
            | Asset::SmpteSubtitle(_) => "application/mxf".to_string(),
            Asset::InteropSubtitle(_) => "text/xml".to_string(),
            Asset::Font(_) => match standard {
                Standard::Smpte => "application/x-font-opentype".to_string(),
                Standard::Interop => "text/xml".to_string(),
            },
        }
    }

    /// Attach a decrypted content key to an encrypted asset. Attaching
    /// the same key again is a no-op.
    pub fn attach_content_key(&self, key: [u8; 16]) {
        match self {
            Asset::MonoPicture(a) | Asset::StereoPicture(a) => a.attach_content_key(key),
            Asset::Sound(a) => a.attach_content_key(key),
            Asset::Atmos(a) => a.attach_content_key(key),
            Asset::SmpteSubtitle(a) => a.attach_content_key(key),
            Asset::InteropSubtitle(_) | Asset::Font(_) => {}
        }
    }

    /// The attached content key, if any.
    pub fn content_key(&self) -> Option<[u8; 16]> {
        match self {
            Asset::MonoPicture(a) | Asset::StereoPicture(a) => a.content_key(),
            Asset::Sound(a) => a.content_key(),
            Asset::Atmos(a) => a.content_key(),
            Asset::SmpteSubtitle(a) => a.content_key(),
            Asset::InteropSubtitle(_) | Asset::Font(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_hash_cached() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"essence").unwrap();

        let common = AssetCommon::new("abc".into(), Some(file.path().to_path_buf()));
        let first = common.hash(None).unwrap();

        // Rewriting the file does not change the cached hash.
        file.write_all(b"more").unwrap();
        file.flush().unwrap();
        assert_eq!(common.hash(None).unwrap(), first);
    }

    #[test]
    fn test_hash_without_file_fails() {
        let common = AssetCommon::new("abc".into(), None);
        assert!(common.hash(None).is_err());
    }
}
