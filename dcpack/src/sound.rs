//! PCM sound assets.

use crate::asset::{Asset, AssetCommon};
use dcpack_core::{Fraction, LanguageTag, MxfError, Result};
use dcpack_mxf::{EssenceKind, MxfReader};
use std::path::Path;
use std::sync::OnceLock;

/// A sound track file.
#[derive(Debug, Clone)]
pub struct SoundAsset {
    /// Shared asset state.
    pub common: AssetCommon,
    /// Edit rate from the MXF descriptor.
    pub edit_rate: Fraction,
    /// Total edit units in the file.
    pub intrinsic_duration: i64,
    /// Audio sampling rate in hertz.
    pub sampling_rate: i64,
    /// Channel count.
    pub channels: u32,
    /// Language of the track, where declared.
    pub language: Option<LanguageTag>,
    /// Content-key id if encrypted.
    pub key_id: Option<String>,
    content_key: OnceLock<[u8; 16]>,
}

impl SoundAsset {
    /// Open a sound MXF.
    pub fn from_file(path: &Path) -> Result<Asset> {
        let descriptor = MxfReader::probe(path)?;
        if descriptor.kind != EssenceKind::Pcm {
            return Err(MxfError::UnknownEssence(path.to_path_buf()).into());
        }

        Ok(Asset::Sound(SoundAsset {
            common: AssetCommon::new(dcpack_core::make_uuid(), Some(path.to_path_buf())),
            edit_rate: descriptor.edit_rate,
            intrinsic_duration: descriptor.intrinsic_duration,
            sampling_rate: descriptor.sampling_rate.unwrap_or(48000),
            channels: descriptor.channels.unwrap_or(0),
            language: None,
            key_id: descriptor.key_id.clone(),
            content_key: OnceLock::new(),
        }))
    }

    /// As [`from_file`], but with a known asset id (from an asset map).
    ///
    /// [`from_file`]: SoundAsset::from_file
    pub fn from_file_with_id(path: &Path, id: &str) -> Result<Asset> {
        let mut asset = Self::from_file(path)?;
        if let Asset::Sound(a) = &mut asset {
            a.common.id = id.to_string();
        }
        Ok(asset)
    }

    /// Set the track language.
    pub fn set_language(&mut self, language: LanguageTag) {
        self.language = Some(language);
    }

    /// Open a frame-indexed reader over the essence.
    pub fn start_read(&self) -> Result<MxfReader> {
        let file = self
            .common
            .file
            .as_ref()
            .ok_or_else(|| dcpack_core::Error::misc("sound asset has no file"))?;
        Ok(MxfReader::open(file)?)
    }

    pub(crate) fn attach_content_key(&self, key: [u8; 16]) {
        let _ = self.content_key.set(key);
    }

    pub(crate) fn content_key(&self) -> Option<[u8; 16]> {
        self.content_key.get().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dcpack_mxf::{EssenceDescriptor, MxfWriter};

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sound.mxf");

        let mut descriptor = EssenceDescriptor::new(EssenceKind::Pcm, Fraction::new(24, 1));
        descriptor.sampling_rate = Some(48000);
        descriptor.channels = Some(6);
        let mut writer = MxfWriter::create(&path, descriptor).unwrap();
        for _ in 0..48 {
            writer.append_frame(&[0u8; 16]).unwrap();
        }
        writer.finalize().unwrap();

        let asset = SoundAsset::from_file(&path).unwrap();
        match &asset {
            Asset::Sound(s) => {
                assert_eq!(s.sampling_rate, 48000);
                assert_eq!(s.channels, 6);
                assert_eq!(s.intrinsic_duration, 48);
            }
            other => panic!("expected sound, got {other:?}"),
        }
    }

    #[test]
    fn test_encrypted_flag() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("enc.mxf");

        let mut descriptor = EssenceDescriptor::new(EssenceKind::Pcm, Fraction::new(24, 1));
        descriptor.key_id = Some("9c79a81c-2575-4f0a-816f-2d79d952ab2b".into());
        MxfWriter::create(&path, descriptor)
            .unwrap()
            .finalize()
            .unwrap();

        let asset = SoundAsset::from_file(&path).unwrap();
        assert!(asset.encrypted());
        assert_eq!(asset.key_id(), Some("9c79a81c-2575-4f0a-816f-2d79d952ab2b"));
    }
}
