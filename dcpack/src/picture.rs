//! JPEG 2000 picture assets.

use crate::asset::{Asset, AssetCommon};
use dcpack_core::{Fraction, MxfError, Result, Size};
use dcpack_mxf::{EssenceKind, MxfReader};
use std::path::Path;
use std::sync::OnceLock;

/// A picture track file. The same data backs both the 2D and the
/// stereoscopic variants; the MXF frame layout decides which.
#[derive(Debug, Clone)]
pub struct PictureAsset {
    /// Shared asset state.
    pub common: AssetCommon,
    /// Edit rate from the MXF descriptor.
    pub edit_rate: Fraction,
    /// Total edit units in the file.
    pub intrinsic_duration: i64,
    /// Stored picture dimensions.
    pub size: Size,
    /// Content-key id if encrypted.
    pub key_id: Option<String>,
    content_key: OnceLock<[u8; 16]>,
}

impl PictureAsset {
    /// Open a picture MXF, returning the mono or stereo variant according
    /// to its frame layout.
    pub fn from_file(path: &Path) -> Result<Asset> {
        let descriptor = MxfReader::probe(path)?;
        if descriptor.kind != EssenceKind::Jpeg2000 {
            return Err(MxfError::UnknownEssence(path.to_path_buf()).into());
        }

        let asset = PictureAsset {
            common: AssetCommon::new(
                dcpack_core::make_uuid(),
                Some(path.to_path_buf()),
            ),
            edit_rate: descriptor.edit_rate,
            intrinsic_duration: descriptor.intrinsic_duration,
            size: descriptor.stored_size.unwrap_or(Size::new(0, 0)),
            key_id: descriptor.key_id.clone(),
            content_key: OnceLock::new(),
        };

        Ok(if descriptor.stereoscopic {
            Asset::StereoPicture(asset)
        } else {
            Asset::MonoPicture(asset)
        })
    }

    /// As [`from_file`], but with a known asset id (from an asset map).
    ///
    /// [`from_file`]: PictureAsset::from_file
    pub fn from_file_with_id(path: &Path, id: &str) -> Result<Asset> {
        let mut asset = Self::from_file(path)?;
        match &mut asset {
            Asset::MonoPicture(a) | Asset::StereoPicture(a) => a.common.id = id.to_string(),
            _ => unreachable!(),
        }
        Ok(asset)
    }

    /// Open a frame-indexed reader over the essence.
    pub fn start_read(&self) -> Result<MxfReader> {
        let file = self
            .common
            .file
            .as_ref()
            .ok_or_else(|| dcpack_core::Error::misc("picture asset has no file"))?;
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

    fn write_picture(path: &Path, stereoscopic: bool, frames: usize) {
        let mut descriptor = EssenceDescriptor::new(EssenceKind::Jpeg2000, Fraction::new(24, 1));
        descriptor.stored_size = Some(Size::new(1998, 1080));
        descriptor.stereoscopic = stereoscopic;
        let mut writer = MxfWriter::create(path, descriptor).unwrap();
        for _ in 0..frames {
            writer.append_frame(&[0u8; 128]).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_mono_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("picture.mxf");
        write_picture(&path, false, 24);

        let asset = PictureAsset::from_file(&path).unwrap();
        match &asset {
            Asset::MonoPicture(p) => {
                assert_eq!(p.intrinsic_duration, 24);
                assert_eq!(p.size, Size::new(1998, 1080));
                assert_eq!(p.edit_rate, Fraction::new(24, 1));
            }
            other => panic!("expected mono picture, got {other:?}"),
        }
        assert!(!asset.encrypted());
    }

    #[test]
    fn test_stereo_detected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.mxf");
        write_picture(&path, true, 2);

        let asset = PictureAsset::from_file(&path).unwrap();
        assert!(matches!(asset, Asset::StereoPicture(_)));
    }

    #[test]
    fn test_rejects_wrong_essence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sound.mxf");
        let descriptor = EssenceDescriptor::new(EssenceKind::Pcm, Fraction::new(24, 1));
        MxfWriter::create(&path, descriptor)
            .unwrap()
            .finalize()
            .unwrap();
        assert!(PictureAsset::from_file(&path).is_err());
    }
}
