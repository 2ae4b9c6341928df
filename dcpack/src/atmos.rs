//! Dolby Atmos auxiliary data assets.

use crate::asset::{Asset, AssetCommon};
use dcpack_core::{Fraction, MxfError, Result};
use dcpack_mxf::{EssenceKind, MxfReader};
use std::path::Path;
use std::sync::OnceLock;

/// An Atmos track file.
#[derive(Debug, Clone)]
pub struct AtmosAsset {
    /// Shared asset state.
    pub common: AssetCommon,
    /// Edit rate from the MXF descriptor.
    pub edit_rate: Fraction,
    /// Total edit units in the file.
    pub intrinsic_duration: i64,
    /// First frame of the bitstream.
    pub first_frame: i64,
    /// Maximum channel count.
    pub max_channel_count: u32,
    /// Maximum object count.
    pub max_object_count: u32,
    /// Content-key id if encrypted.
    pub key_id: Option<String>,
    content_key: OnceLock<[u8; 16]>,
}

impl AtmosAsset {
    /// Open an Atmos MXF.
    pub fn from_file(path: &Path) -> Result<Asset> {
        let descriptor = MxfReader::probe(path)?;
        if descriptor.kind != EssenceKind::Atmos {
            return Err(MxfError::UnknownEssence(path.to_path_buf()).into());
        }

        Ok(Asset::Atmos(AtmosAsset {
            common: AssetCommon::new(dcpack_core::make_uuid(), Some(path.to_path_buf())),
            edit_rate: descriptor.edit_rate,
            intrinsic_duration: descriptor.intrinsic_duration,
            first_frame: descriptor.atmos_first_frame.unwrap_or(0),
            max_channel_count: descriptor.atmos_max_channel_count.unwrap_or(0),
            max_object_count: descriptor.atmos_max_object_count.unwrap_or(0),
            key_id: descriptor.key_id.clone(),
            content_key: OnceLock::new(),
        }))
    }

    /// As [`from_file`], but with a known asset id (from an asset map).
    ///
    /// [`from_file`]: AtmosAsset::from_file
    pub fn from_file_with_id(path: &Path, id: &str) -> Result<Asset> {
        let mut asset = Self::from_file(path)?;
        if let Asset::Atmos(a) = &mut asset {
            a.common.id = id.to_string();
        }
        Ok(asset)
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
        let path = dir.path().join("atmos.mxf");

        let mut descriptor = EssenceDescriptor::new(EssenceKind::Atmos, Fraction::new(24, 1));
        descriptor.atmos_first_frame = Some(1);
        descriptor.atmos_max_channel_count = Some(10);
        descriptor.atmos_max_object_count = Some(118);
        let mut writer = MxfWriter::create(&path, descriptor).unwrap();
        writer.append_frame(&[0u8; 8]).unwrap();
        writer.finalize().unwrap();

        let asset = AtmosAsset::from_file(&path).unwrap();
        match &asset {
            Asset::Atmos(a) => {
                assert_eq!(a.first_frame, 1);
                assert_eq!(a.max_channel_count, 10);
                assert_eq!(a.max_object_count, 118);
            }
            other => panic!("expected atmos, got {other:?}"),
        }
    }
}
