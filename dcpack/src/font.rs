//! Font assets for Interop subtitles.

use crate::asset::AssetCommon;
use dcpack_core::Result;
use std::path::Path;

/// A font file referenced from Interop subtitle XML via `<LoadFont>`.
#[derive(Debug, Clone)]
pub struct FontAsset {
    /// Shared asset state. The id is the LoadFont id, not a UUID.
    pub common: AssetCommon,
}

impl FontAsset {
    /// Track a font file under a LoadFont id.
    pub fn new(id: &str, path: &Path) -> Self {
        FontAsset {
            common: AssetCommon::new(id.to_string(), Some(path.to_path_buf())),
        }
    }

    /// The font's bytes.
    pub fn data(&self) -> Result<Vec<u8>> {
        let file = self
            .common
            .file
            .as_ref()
            .ok_or_else(|| dcpack_core::Error::misc("font asset has no file"))?;
        Ok(std::fs::read(file)?)
    }
}
