//! The package container.
//!
//! A [`Dcp`] ties the pieces together: it discovers a package through its
//! asset map, loads the packing lists and typed assets, resolves the
//! reference graph, and writes everything back out in commit order with
//! the asset map last.

use crate::asset::Asset;
use crate::asset_map::{
    write_asset_map, write_volindex, AssetMap, AssetMapWriteEntry,
};
use crate::atmos::AtmosAsset;
use crate::cpl::Cpl;
use crate::equality::{EqualityOptions, NoteHandler, NoteKind};
use crate::font::FontAsset;
use crate::kdm::DecryptedKdm;
use crate::picture::PictureAsset;
use crate::pkl::Pkl;
use crate::sound::SoundAsset;
use crate::subtitle::{InteropSubtitleAsset, SmpteSubtitleAsset};
use crate::verify::{NoteSeverity, VerificationCode, VerificationNote};
use dcpack_core::{
    ids_equal, make_digest, Error, LocalTime, NameFormat, Result, Standard, XmlError,
};
use dcpack_mxf::{EssenceKind, MxfReader};
use dcpack_xml::CertificateChain;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Issue metadata stamped into the PKL and asset map.
#[derive(Debug, Clone)]
pub struct XmlMetadata {
    pub issuer: String,
    pub creator: String,
    pub issue_date: String,
    pub annotation_text: String,
}

impl Default for XmlMetadata {
    fn default() -> Self {
        let tool = format!("dcpack {}", dcpack_core::VERSION);
        XmlMetadata {
            issuer: tool.clone(),
            creator: tool,
            issue_date: LocalTime::now().as_string(),
            annotation_text: String::new(),
        }
    }
}

/// A Digital Cinema Package rooted at one directory.
#[derive(Debug, Default)]
pub struct Dcp {
    directory: PathBuf,
    cpls: Vec<Cpl>,
    pkls: Vec<Pkl>,
    assets: Vec<Arc<Asset>>,
    asset_map_path: Option<PathBuf>,
    standard: Option<Standard>,
}

impl Dcp {
    /// Open (and create if necessary) a package directory.
    pub fn new(directory: &Path) -> Result<Self> {
        if !directory.exists() {
            std::fs::create_dir_all(directory)?;
        }
        Ok(Dcp {
            directory: directory.canonicalize()?,
            ..Default::default()
        })
    }

    /// The package directory.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// The dialect found on read or used on write.
    pub fn standard(&self) -> Option<Standard> {
        self.standard
    }

    /// Where the asset map was found or written.
    pub fn asset_map_path(&self) -> Option<&Path> {
        self.asset_map_path.as_deref()
    }

    /// The composition playlists.
    pub fn cpls(&self) -> &[Cpl] {
        &self.cpls
    }

    /// Mutable access to the CPLs.
    pub fn cpls_mut(&mut self) -> &mut [Cpl] {
        &mut self.cpls
    }

    /// The packing lists.
    pub fn pkls(&self) -> &[Pkl] {
        &self.pkls
    }

    /// Add a CPL for authoring.
    pub fn add_cpl(&mut self, cpl: Cpl) {
        self.cpls.push(cpl);
    }

    /// Whether any CPL references encrypted essence.
    pub fn any_encrypted(&self) -> bool {
        self.cpls.iter().any(Cpl::any_encrypted)
    }

    /// Apply a decrypted KDM to the CPLs it names. Applying it twice is
    /// equivalent to applying it once.
    pub fn add_kdm(&mut self, kdm: &DecryptedKdm) {
        for cpl in &mut self.cpls {
            if kdm.keys().iter().any(|k| ids_equal(&k.cpl_id, &cpl.id)) {
                cpl.add_kdm(kdm);
            }
        }
    }

    /// Read the package. Fatal problems return an error; recoverable
    /// defects append to `notes` when given.
    pub fn read(&mut self, mut notes: Option<&mut Vec<VerificationNote>>) -> Result<()> {
        let asset_map_path = AssetMap::find(&self.directory).ok_or_else(|| {
            Error::read(format!(
                "Could not find ASSETMAP nor ASSETMAP.xml in '{}'",
                self.directory.display()
            ))
        })?;
        let asset_map = AssetMap::from_file(&asset_map_path)?;
        self.asset_map_path = Some(asset_map_path);
        self.standard = Some(asset_map.standard);
        let standard = asset_map.standard;

        let pkl_paths = asset_map.pkl_paths();
        if pkl_paths.is_empty() {
            return Err(XmlError::BadContent {
                element: "AssetMap".to_string(),
                message: "no packing lists found in asset map".to_string(),
            }
            .into());
        }
        for pkl_path in pkl_paths {
            self.pkls.push(Pkl::from_file(&self.directory.join(pkl_path))?);
        }

        for entry in asset_map.asset_entries() {
            if entry.path.is_empty() {
                // Seen in the wild; the entry is unusable but the rest of
                // the package may well be fine.
                if let Some(notes) = notes.as_mut() {
                    notes.push(VerificationNote::new(
                        NoteSeverity::Warning,
                        VerificationCode::EmptyAssetPath,
                    ));
                }
                continue;
            }

            let path = self.directory.join(&entry.path);
            if !path.exists() {
                if let Some(notes) = notes.as_mut() {
                    notes.push(
                        VerificationNote::new(
                            NoteSeverity::Error,
                            VerificationCode::MissingAsset,
                        )
                        .with_file(&path),
                    );
                }
                continue;
            }

            // The PKL's type decides how to load the file; assets the
            // PKLs do not mention are none of our business.
            let Some(pkl_type) = self
                .pkls
                .iter()
                .find_map(|p| p.type_(&entry.id))
                .map(str::to_string)
            else {
                continue;
            };

            self.load_asset(&path, entry.id.as_str(), &pkl_type, standard, &mut notes)?;
        }

        self.resolve_refs();

        // Anything still unresolved that the asset map does not know
        // about lives outside this package.
        if let Some(notes) = notes.as_mut() {
            for cpl in &self.cpls {
                for data in cpl.reel_assets() {
                    if !data.asset.is_resolved()
                        && !asset_map.entries.iter().any(|e| ids_equal(&e.id, data.id()))
                    {
                        notes.push(
                            VerificationNote::new(
                                NoteSeverity::Warning,
                                VerificationCode::ExternalAsset,
                            )
                            .with_note(data.id()),
                        );
                    }
                }
            }
        }

        info!(
            directory = %self.directory.display(),
            cpls = self.cpls.len(),
            assets = self.assets.len(),
            "read DCP"
        );
        Ok(())
    }

    fn load_asset(
        &mut self,
        path: &Path,
        id: &str,
        pkl_type: &str,
        standard: Standard,
        notes: &mut Option<&mut Vec<VerificationNote>>,
    ) -> Result<()> {
        let cpl_type = Cpl::pkl_type(standard);

        if pkl_type == cpl_type || pkl_type == "text/xml" {
            match dcpack_xml::parse_file(path) {
                Ok(root) => match root.name.as_str() {
                    "CompositionPlaylist" => {
                        let cpl = Cpl::from_file(path)?;
                        if cpl.standard().is_some() && cpl.standard() != self.standard {
                            if let Some(notes) = notes.as_mut() {
                                notes.push(VerificationNote::new(
                                    NoteSeverity::Error,
                                    VerificationCode::MismatchedStandard,
                                ));
                            }
                        }
                        self.cpls.push(cpl);
                    }
                    "DCSubtitle" => {
                        if standard == Standard::Smpte {
                            if let Some(notes) = notes.as_mut() {
                                notes.push(VerificationNote::new(
                                    NoteSeverity::Error,
                                    VerificationCode::MismatchedStandard,
                                ));
                            }
                        }
                        let subtitle = InteropSubtitleAsset::from_file(path)?;
                        self.assets
                            .push(Arc::new(Asset::InteropSubtitle(subtitle)));
                    }
                    other => {
                        return Err(Error::read(format!(
                            "unknown XML root <{other}> for asset {id}"
                        )));
                    }
                },
                Err(e) => {
                    // Interop packs fonts under text/xml; anything that
                    // is not XML at all is treated as one.
                    if standard == Standard::Interop && pkl_type != cpl_type {
                        warn!(path = %path.display(), "not XML, treating as font");
                        self.assets
                            .push(Arc::new(Asset::Font(FontAsset::new(id, path))));
                    } else {
                        return Err(Error::read(format!(
                            "XML error in {}: {e}",
                            path.display()
                        )));
                    }
                }
            }
        } else if pkl_type == "application/mxf" {
            let descriptor = MxfReader::probe(path)?;
            let asset = match descriptor.kind {
                EssenceKind::Jpeg2000 => PictureAsset::from_file_with_id(path, id)?,
                EssenceKind::Pcm => SoundAsset::from_file_with_id(path, id)?,
                EssenceKind::Atmos => AtmosAsset::from_file_with_id(path, id)?,
                EssenceKind::TimedText => {
                    Asset::SmpteSubtitle(SmpteSubtitleAsset::from_file_with_id(path, id)?)
                }
            };
            self.assets.push(Arc::new(asset));
        } else if pkl_type == "application/x-font-opentype" {
            self.assets
                .push(Arc::new(Asset::Font(FontAsset::new(id, path))));
        } else if pkl_type == "image/png" {
            // An Interop PNG subtitle image; the subtitle XML pulls it in.
        } else {
            return Err(Error::read(format!("Unknown asset type {pkl_type} in PKL")));
        }

        debug!(path = %path.display(), pkl_type, "loaded asset");
        Ok(())
    }

    /// Resolve every CPL reference against the loaded asset pool.
    pub fn resolve_refs(&mut self) {
        for cpl in &mut self.cpls {
            cpl.resolve_refs(&self.assets);
        }
    }

    /// Every asset of the package: the CPL-referenced pool plus Interop
    /// subtitle fonts, deduplicated by id. Unresolved references are an
    /// error unless `ignore_unresolved`.
    pub fn assets(&self, ignore_unresolved: bool) -> Result<Vec<Arc<Asset>>> {
        let mut out: Vec<Arc<Asset>> = Vec::new();
        for cpl in &self.cpls {
            for data in cpl.reel_assets() {
                let Some(asset) = data.asset.asset() else {
                    if ignore_unresolved {
                        continue;
                    }
                    return Err(Error::misc(format!(
                        "asset {} is unresolved",
                        data.id()
                    )));
                };
                if out.iter().any(|a| ids_equal(a.id(), asset.id())) {
                    continue;
                }
                out.push(asset.clone());
                if let Asset::InteropSubtitle(subtitle) = &**asset {
                    for font in subtitle.font_assets() {
                        if !out.iter().any(|a| ids_equal(a.id(), &font.common.id)) {
                            out.push(Arc::new(Asset::Font(font.clone())));
                        }
                    }
                }
            }
        }
        Ok(out)
    }

    /// Write every sidecar XML of the package: CPLs first, then the PKL,
    /// VOLINDEX and finally the ASSETMAP, which is the commit point.
    pub fn write_xml(
        &mut self,
        standard: Standard,
        metadata: &XmlMetadata,
        signer: Option<&CertificateChain>,
        name_format: &NameFormat,
    ) -> Result<()> {
        self.write_missing_sidecars()?;

        let mut cpl_files: Vec<(String, PathBuf)> = Vec::new();
        for cpl in &mut self.cpls {
            let filename = name_format.format("cpl", &cpl.id);
            let path = self.directory.join(&filename);
            cpl.write_xml(&path, standard, signer)?;
            cpl_files.push((cpl.id.clone(), path));
        }

        let assets = self.assets(true)?;

        let mut pkl = match self.pkls.pop() {
            Some(pkl) => pkl,
            None => {
                let mut pkl = Pkl::new(
                    standard,
                    &metadata.annotation_text,
                    &metadata.issue_date,
                    &metadata.issuer,
                    &metadata.creator,
                );
                for (cpl_id, cpl_path) in &cpl_files {
                    pkl.add(
                        cpl_id,
                        make_digest(cpl_path, None)?,
                        std::fs::metadata(cpl_path)?.len(),
                        Cpl::pkl_type(standard),
                    );
                }
                for asset in &assets {
                    pkl.add(
                        asset.id(),
                        asset.hash(None)?,
                        asset.size_on_disk()?,
                        &asset.pkl_type(standard),
                    );
                }
                pkl
            }
        };

        let pkl_path = self.directory.join(name_format.format("pkl", &pkl.id));
        pkl.write(&pkl_path, signer)?;
        let pkl_id = pkl.id.clone();
        self.pkls = vec![pkl];

        write_volindex(&self.directory, standard)?;

        let mut entries = Vec::new();
        for (cpl_id, cpl_path) in &cpl_files {
            entries.push(AssetMapWriteEntry {
                id: cpl_id.clone(),
                filename: filename_of(cpl_path),
                length: std::fs::metadata(cpl_path)?.len(),
            });
        }
        for asset in &assets {
            let file = asset
                .file()
                .ok_or_else(|| Error::misc(format!("asset {} has no file", asset.id())))?;
            entries.push(AssetMapWriteEntry {
                id: asset.id().to_string(),
                filename: filename_of(file),
                length: std::fs::metadata(file)?.len(),
            });
        }

        self.asset_map_path = Some(write_asset_map(
            &self.directory,
            standard,
            &pkl_id,
            &pkl_path,
            &metadata.issuer,
            &metadata.creator,
            &metadata.issue_date,
            &metadata.annotation_text,
            &entries,
        )?);
        self.standard = Some(standard);

        info!(directory = %self.directory.display(), "wrote DCP");
        Ok(())
    }

    /// Write subtitle assets that exist only in memory, replacing the
    /// reel references with file-backed copies.
    fn write_missing_sidecars(&mut self) -> Result<()> {
        let directory = self.directory.clone();
        for cpl in &mut self.cpls {
            for reel in cpl.reels_mut() {
                if let Some(subtitle) = &mut reel.main_subtitle {
                    write_subtitle_sidecar(&directory, &mut subtitle.data)?;
                }
                for caption in &mut reel.closed_captions {
                    write_subtitle_sidecar(&directory, &mut caption.data)?;
                }
            }
        }
        Ok(())
    }

    /// Compare two packages CPL by CPL.
    pub fn equals(&self, other: &Dcp, options: &EqualityOptions, note: NoteHandler) -> bool {
        if self.cpls.len() != other.cpls.len() {
            note(
                NoteKind::Error,
                &format!(
                    "CPL counts differ: {} vs {}",
                    self.cpls.len(),
                    other.cpls.len()
                ),
            );
            return false;
        }

        for cpl in &self.cpls {
            let mut matched = false;
            for candidate in &other.cpls {
                let mut quiet = |_: NoteKind, _: &str| {};
                if cpl.equals(candidate, options, &mut quiet) {
                    matched = true;
                    break;
                }
            }
            if !matched {
                note(
                    NoteKind::Error,
                    &format!("no matching CPL for {}", cpl.id),
                );
                return false;
            }
        }
        true
    }

    /// Given files belonging to one or more DCPs, return the package
    /// directories (those containing an asset map).
    pub fn directories_from_files(files: &[PathBuf]) -> Vec<PathBuf> {
        let mut out = Vec::new();
        for file in files {
            let is_map = file
                .file_name()
                .map(|n| n == "ASSETMAP" || n == "ASSETMAP.xml")
                .unwrap_or(false);
            if is_map {
                if let Some(parent) = file.parent() {
                    if !out.contains(&parent.to_path_buf()) {
                        out.push(parent.to_path_buf());
                    }
                }
            }
        }
        out
    }
}

fn write_subtitle_sidecar(
    directory: &Path,
    data: &mut crate::reel::ReelAssetData,
) -> Result<()> {
    let Some(asset) = data.asset.asset() else {
        return Ok(());
    };
    if asset.file().is_some() {
        return Ok(());
    }
    let replacement = match &**asset {
        Asset::InteropSubtitle(subtitle) => {
            let mut copy = subtitle.clone();
            copy.write(&directory.join(format!("sub_{}.xml", copy.common.id)))?;
            Asset::InteropSubtitle(copy)
        }
        Asset::SmpteSubtitle(subtitle) => {
            let mut copy = subtitle.clone();
            copy.write(&directory.join(format!("sub_{}.mxf", copy.common.id)))?;
            Asset::SmpteSubtitle(copy)
        }
        _ => return Ok(()),
    };
    data.asset = crate::reel::Ref::resolved(Arc::new(replacement));
    Ok(())
}

fn filename_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_missing_assetmap_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut dcp = Dcp::new(dir.path()).unwrap();
        let err = dcp.read(None).unwrap_err();
        assert!(matches!(err, Error::Read(_)));
        assert!(err.to_string().contains("ASSETMAP"));
    }

    #[test]
    fn test_directories_from_files() {
        let files = vec![
            PathBuf::from("/a/ASSETMAP.xml"),
            PathBuf::from("/a/video.mxf"),
            PathBuf::from("/b/ASSETMAP"),
        ];
        let dirs = Dcp::directories_from_files(&files);
        assert_eq!(dirs, vec![PathBuf::from("/a"), PathBuf::from("/b")]);
    }
}
