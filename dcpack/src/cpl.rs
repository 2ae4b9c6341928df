//! Composition playlists.

use crate::equality::{EqualityOptions, NoteHandler, NoteKind};
use crate::kdm::DecryptedKdm;
use crate::reel::{Reel, ReelAssetData};
use dcpack_core::{
    make_uuid, remove_urn_uuid, ContentKind, Error, Fraction, LocalTime, Result, Size, Standard,
    XmlError,
};
use dcpack_xml::{parse_file, sign_document, write_document, CertificateChain, Element};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// The Interop CPL namespace.
pub const CPL_INTEROP_NS: &str = "http://www.digicine.com/PROTO-ASDCP-CPL-20040511#";
/// The SMPTE CPL namespace.
pub const CPL_SMPTE_NS: &str = "http://www.smpte-ra.org/schemas/429-7/2006/CPL";
/// The SMPTE CPL metadata namespace.
pub const CPL_METADATA_NS: &str = "http://www.smpte-ra.org/schemas/429-16/2014/CPL-Metadata";

const APP_SCOPE: &str = "http://isdcf.com/ns/cplmd/app";
const BV21_PROFILE: &str = "SMPTE-RDD-52:2020-Bv2.1";

/// A `<ContentVersion>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentVersion {
    /// Free-form id, conventionally `urn:uuid:<uuid><timestamp>`.
    pub id: String,
    /// Human-readable label.
    pub label_text: String,
}

impl ContentVersion {
    /// A fresh version stamped with the current time.
    pub fn new() -> Self {
        let id = format!("urn:uuid:{}{}", make_uuid(), LocalTime::now().as_string());
        ContentVersion {
            label_text: id.clone(),
            id,
        }
    }
}

impl Default for ContentVersion {
    fn default() -> Self {
        Self::new()
    }
}

/// A `<Rating>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rating {
    /// URI of the rating agency.
    pub agency: String,
    /// The rating label, e.g. `12A`.
    pub label: String,
}

/// A `<Luminance>` with its unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Luminance {
    pub value: f32,
    /// `candela-per-square-metre` or `foot-lambert`.
    pub unit: String,
}

/// The SMPTE `<CompositionMetadataAsset>`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompositionMetadata {
    /// The metadata asset's own UUID.
    pub id: String,
    /// Full (unabbreviated) content title.
    pub full_content_title: String,
    /// Language of the full title.
    pub full_content_title_language: Option<String>,
    /// Release territory (a region subtag, or `001` for worldwide).
    pub release_territory: Option<String>,
    /// Scope URI qualifying the territory.
    pub release_territory_scope: Option<String>,
    /// Version number, starting at 1.
    pub version_number: Option<u32>,
    /// Version status, e.g. `final`.
    pub status: Option<String>,
    /// Main sound configuration, e.g. `51/L,R,C,LFE,Ls,Rs`.
    pub main_sound_configuration: Option<String>,
    /// Main sound sampling rate in hertz.
    pub main_sound_sample_rate: Option<i64>,
    /// Stored picture area.
    pub main_picture_stored_area: Option<Size>,
    /// Active picture area.
    pub main_picture_active_area: Option<Size>,
    /// Subtitle language tags, in track order.
    pub subtitle_languages: Vec<String>,
    /// Luminance of the intended presentation.
    pub luminance: Option<Luminance>,
}

impl CompositionMetadata {
    /// Metadata for a title, with a fresh id and version 1.
    pub fn new(full_content_title: impl Into<String>) -> Self {
        CompositionMetadata {
            id: make_uuid(),
            full_content_title: full_content_title.into(),
            version_number: Some(1),
            ..Default::default()
        }
    }

    /// Set the version number; negative values are rejected.
    pub fn set_version_number(&mut self, version: i64) -> Result<()> {
        if version < 0 {
            return Err(Error::bad_setting(format!("version number {version}")));
        }
        self.version_number = Some(version as u32);
        Ok(())
    }
}

fn meta(name: &str) -> Element {
    Element::prefixed("meta", name, CPL_METADATA_NS)
}

fn meta_text(name: &str, text: impl Into<String>) -> Element {
    let mut element = meta(name);
    element.add_text(text);
    element
}

/// A composition playlist: an ordered list of reels plus titling metadata.
#[derive(Debug, Clone)]
pub struct Cpl {
    /// The CPL's UUID.
    pub id: String,
    /// Where the CPL lives on disk, once read or written.
    pub file: Option<PathBuf>,
    /// Optional annotation.
    pub annotation_text: Option<String>,
    pub issuer: String,
    pub creator: String,
    pub issue_date: String,
    pub content_title_text: String,
    pub content_kind: ContentKind,
    content_versions: Vec<ContentVersion>,
    /// Ratings, round-tripped on both dialects.
    pub ratings: Vec<Rating>,
    reels: Vec<Reel>,
    /// SMPTE composition metadata, carried in the first reel.
    pub metadata: Option<CompositionMetadata>,
    standard: Option<Standard>,
}

impl Cpl {
    /// Create a CPL for authoring. The content title defaults to the
    /// annotation text and a content version is generated.
    pub fn new(annotation_text: impl Into<String>, content_kind: ContentKind) -> Self {
        let annotation_text = annotation_text.into();
        Cpl {
            id: make_uuid(),
            file: None,
            content_title_text: annotation_text.clone(),
            annotation_text: Some(annotation_text),
            issuer: String::new(),
            creator: String::new(),
            issue_date: LocalTime::now().as_string(),
            content_kind,
            content_versions: vec![ContentVersion::new()],
            ratings: Vec::new(),
            reels: Vec::new(),
            metadata: None,
            standard: None,
        }
    }

    /// Load a CPL from an XML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let root = parse_file(path)?;
        if root.name != "CompositionPlaylist" {
            return Err(XmlError::UnexpectedRoot {
                expected: "CompositionPlaylist".to_string(),
                found: root.name.clone(),
            }
            .into());
        }

        let standard = match root.namespace.as_deref() {
            Some(CPL_INTEROP_NS) => Some(Standard::Interop),
            Some(CPL_SMPTE_NS) => Some(Standard::Smpte),
            _ => None,
        };

        let content_versions = root
            .children_named("ContentVersion")
            .map(|e| {
                Ok(ContentVersion {
                    id: e.optional_string_child("Id").unwrap_or_default(),
                    label_text: e.string_child("LabelText")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut ratings = Vec::new();
        if let Some(list) = root.child("RatingList") {
            for rating in list.children_named("Rating") {
                ratings.push(Rating {
                    agency: rating.string_child("Agency")?,
                    label: rating.string_child("Label")?,
                });
            }
        }

        let mut reels = Vec::new();
        let mut metadata = None;
        if let Some(list) = root.child("ReelList") {
            for (index, reel) in list.children_named("Reel").enumerate() {
                if index == 0 {
                    if let Some(asset_list) = reel.child("AssetList") {
                        if let Some(node) = asset_list.child("CompositionMetadataAsset") {
                            metadata = Some(Self::metadata_from_element(node)?);
                        }
                    }
                }
                reels.push(Reel::from_element(reel)?);
            }
        }

        debug!(path = %path.display(), reels = reels.len(), "read CPL");

        Ok(Cpl {
            id: remove_urn_uuid(&root.string_child("Id")?),
            file: Some(path.to_path_buf()),
            annotation_text: root.optional_string_child("AnnotationText"),
            issuer: root.optional_string_child("Issuer").unwrap_or_default(),
            creator: root.optional_string_child("Creator").unwrap_or_default(),
            issue_date: root.string_child("IssueDate")?,
            content_title_text: root.string_child("ContentTitleText")?,
            content_kind: root.string_child("ContentKind")?.trim().parse()?,
            content_versions,
            ratings,
            reels,
            metadata,
            standard,
        })
    }

    /// The dialect the CPL was read as, if it has been read.
    pub fn standard(&self) -> Option<Standard> {
        self.standard
    }

    /// Add a reel.
    pub fn add_reel(&mut self, reel: Reel) {
        self.reels.push(reel);
    }

    /// The reels in order.
    pub fn reels(&self) -> &[Reel] {
        &self.reels
    }

    /// Mutable access to the reels.
    pub fn reels_mut(&mut self) -> &mut [Reel] {
        &mut self.reels
    }

    /// The content versions in order.
    pub fn content_versions(&self) -> &[ContentVersion] {
        &self.content_versions
    }

    /// Add a content version; ids must be unique within the CPL.
    pub fn add_content_version(&mut self, version: ContentVersion) -> Result<()> {
        if self.content_versions.iter().any(|v| v.id == version.id) {
            return Err(Error::DuplicateId(version.id));
        }
        self.content_versions.push(version);
        Ok(())
    }

    /// Every reel-asset entry across all reels.
    pub fn reel_assets(&self) -> Vec<&ReelAssetData> {
        self.reels.iter().flat_map(|r| r.assets()).collect()
    }

    /// Whether any entry refers to encrypted essence.
    pub fn any_encrypted(&self) -> bool {
        self.reels.iter().any(Reel::encrypted)
    }

    /// Whether every essence entry is encrypted.
    pub fn all_encrypted(&self) -> bool {
        self.reel_assets().iter().all(|data| data.key_id.is_some())
    }

    /// Total presented duration, in edit units.
    pub fn duration(&self) -> i64 {
        self.reels.iter().map(Reel::duration).sum()
    }

    /// Resolve reel references against the pool.
    pub fn resolve_refs(&mut self, pool: &[Arc<crate::asset::Asset>]) {
        for reel in &mut self.reels {
            reel.resolve_refs(pool);
        }
    }

    /// Apply a decrypted KDM to every reel. Applying the same KDM twice
    /// is equivalent to applying it once.
    pub fn add_kdm(&mut self, kdm: &DecryptedKdm) {
        for reel in &mut self.reels {
            reel.add_kdm_keys(kdm.keys());
        }
    }

    /// The `<Type>` a CPL carries in a PKL.
    pub fn pkl_type(standard: Standard) -> &'static str {
        match standard {
            Standard::Interop => "text/xml;asdcpKind=CPL",
            Standard::Smpte => "text/xml",
        }
    }

    /// Write the CPL, optionally signing it.
    pub fn write_xml(
        &mut self,
        path: &Path,
        standard: Standard,
        signer: Option<&CertificateChain>,
    ) -> Result<()> {
        for reel in &mut self.reels {
            reel.prepare_hashes()?;
        }

        let namespace = match standard {
            Standard::Interop => CPL_INTEROP_NS,
            Standard::Smpte => CPL_SMPTE_NS,
        };
        let mut root = Element::root("CompositionPlaylist", namespace);

        root.add_text_child("Id", format!("urn:uuid:{}", self.id));
        if let Some(annotation) = &self.annotation_text {
            if !annotation.is_empty() {
                root.add_text_child("AnnotationText", annotation);
            }
        }
        root.add_text_child("IssueDate", &self.issue_date);
        root.add_text_child("Issuer", &self.issuer);
        root.add_text_child("Creator", &self.creator);
        root.add_text_child("ContentTitleText", &self.content_title_text);
        root.add_text_child("ContentKind", self.content_kind.as_str());
        for version in &self.content_versions {
            let node = root.add_child(Element::new("ContentVersion"));
            node.add_text_child("Id", &version.id);
            node.add_text_child("LabelText", &version.label_text);
        }
        let rating_list = root.add_child(Element::new("RatingList"));
        for rating in &self.ratings {
            let node = rating_list.add_child(Element::new("Rating"));
            node.add_text_child("Agency", &rating.agency);
            node.add_text_child("Label", &rating.label);
        }

        let reel_list = root.add_child(Element::new("ReelList"));
        for (index, reel) in self.reels.iter().enumerate() {
            let first_asset = if index == 0 && standard == Standard::Smpte {
                self.metadata_element(reel)
            } else {
                None
            };
            reel_list.add_child(reel.write_to_cpl(standard, first_asset));
        }

        if let Some(chain) = signer {
            sign_document(&mut root, chain, standard)?;
        }

        write_document(&root, path)?;
        self.file = Some(path.to_path_buf());
        self.standard = Some(standard);
        info!(path = %path.display(), id = %self.id, "wrote CPL");
        Ok(())
    }

    fn metadata_element(&self, first_reel: &Reel) -> Option<Element> {
        let metadata = self.metadata.as_ref()?;

        let (edit_rate, intrinsic_duration) = first_reel
            .main_picture
            .as_ref()
            .map(|p| (p.data.edit_rate, p.data.intrinsic_duration))
            .unwrap_or((Fraction::new(24, 1), 0));

        let mut node = meta("CompositionMetadataAsset");
        node.declare_namespace(Some("meta"), CPL_METADATA_NS);
        node.add_text_child("Id", format!("urn:uuid:{}", metadata.id));
        node.add_text_child("EditRate", edit_rate.as_string());
        node.add_text_child("IntrinsicDuration", intrinsic_duration.to_string());

        let mut title = meta_text("FullContentTitleText", &metadata.full_content_title);
        if let Some(language) = &metadata.full_content_title_language {
            title.set_attribute("language", language);
        }
        node.add_child(title);

        if let Some(territory) = &metadata.release_territory {
            let mut e = meta_text("ReleaseTerritory", territory);
            if let Some(scope) = &metadata.release_territory_scope {
                e.set_attribute("scope", scope);
            }
            node.add_child(e);
        }
        if let Some(version) = metadata.version_number {
            let mut e = meta_text("VersionNumber", version.to_string());
            if let Some(status) = &metadata.status {
                e.set_attribute("status", status);
            }
            node.add_child(e);
        }
        if let Some(luminance) = &metadata.luminance {
            let mut e = meta_text("Luminance", format!("{}", luminance.value));
            e.set_attribute("units", &luminance.unit);
            node.add_child(e);
        }
        if let Some(configuration) = &metadata.main_sound_configuration {
            node.add_child(meta_text("MainSoundConfiguration", configuration));
        }
        if let Some(rate) = metadata.main_sound_sample_rate {
            node.add_child(meta_text("MainSoundSampleRate", format!("{rate} 1")));
        }
        if let Some(area) = metadata.main_picture_stored_area {
            let e = node.add_child(meta("MainPictureStoredArea"));
            e.add_child(meta_text("Width", area.width.to_string()));
            e.add_child(meta_text("Height", area.height.to_string()));
        }
        if let Some(area) = metadata.main_picture_active_area {
            let e = node.add_child(meta("MainPictureActiveArea"));
            e.add_child(meta_text("Width", area.width.to_string()));
            e.add_child(meta_text("Height", area.height.to_string()));
        }

        // The first language is left out when the subtitle track itself
        // already declares it.
        let first_subtitle_language = first_reel
            .main_subtitle
            .as_ref()
            .and_then(|s| s.language.clone());
        let languages: Vec<&String> = metadata
            .subtitle_languages
            .iter()
            .enumerate()
            .filter(|(index, language)| {
                !(*index == 0 && Some(language.as_str()) == first_subtitle_language.as_deref())
            })
            .map(|(_, language)| language)
            .collect();
        if !languages.is_empty() {
            let joined = languages
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            node.add_child(meta_text("MainSubtitleLanguageList", joined));
        }

        let extension_list = node.add_child(meta("ExtensionMetadataList"));
        let extension = extension_list.add_child({
            let mut e = meta("ExtensionMetadata");
            e.set_attribute("scope", APP_SCOPE);
            e
        });
        extension.add_child(meta_text("Name", "Application"));
        let property_list = extension.add_child(meta("PropertyList"));
        let property = property_list.add_child(meta("Property"));
        property.add_child(meta_text("Name", "DCP Constraints Profile"));
        property.add_child(meta_text("Value", BV21_PROFILE));

        Some(node)
    }

    fn metadata_from_element(node: &Element) -> Result<CompositionMetadata> {
        let mut metadata = CompositionMetadata {
            id: remove_urn_uuid(&node.string_child("Id")?),
            full_content_title: node
                .optional_string_child("FullContentTitleText")
                .unwrap_or_default(),
            ..Default::default()
        };
        if let Some(title) = node.child("FullContentTitleText") {
            metadata.full_content_title_language =
                title.attribute("language").map(str::to_string);
        }
        if let Some(territory) = node.child("ReleaseTerritory") {
            metadata.release_territory = Some(territory.text());
            metadata.release_territory_scope =
                territory.attribute("scope").map(str::to_string);
        }
        if let Some(version) = node.child("VersionNumber") {
            metadata.version_number = version.text().trim().parse().ok();
            metadata.status = version.attribute("status").map(str::to_string);
        }
        if let Some(luminance) = node.child("Luminance") {
            if let Ok(value) = luminance.text().trim().parse() {
                metadata.luminance = Some(Luminance {
                    value,
                    unit: luminance.attribute("units").unwrap_or_default().to_string(),
                });
            }
        }
        metadata.main_sound_configuration =
            node.optional_string_child("MainSoundConfiguration");
        metadata.main_sound_sample_rate = node
            .optional_string_child("MainSoundSampleRate")
            .and_then(|s| s.split_whitespace().next().and_then(|n| n.parse().ok()));
        metadata.main_picture_stored_area = area_from_element(node.child("MainPictureStoredArea"));
        metadata.main_picture_active_area = area_from_element(node.child("MainPictureActiveArea"));
        if let Some(list) = node.optional_string_child("MainSubtitleLanguageList") {
            metadata.subtitle_languages =
                list.split_whitespace().map(str::to_string).collect();
        }
        Ok(metadata)
    }

    /// Compare with another CPL.
    pub fn equals(&self, other: &Cpl, options: &EqualityOptions, note: NoteHandler) -> bool {
        if self.annotation_text != other.annotation_text
            && !options.cpl_annotation_texts_can_differ
        {
            note(
                NoteKind::Error,
                &format!(
                    "CPL: annotation texts differ: {:?} vs {:?}",
                    self.annotation_text, other.annotation_text
                ),
            );
            return false;
        }
        if self.content_kind != other.content_kind {
            note(NoteKind::Error, "CPL: content kinds differ");
            return false;
        }
        if self.issue_date != other.issue_date && !options.issue_dates_can_differ {
            note(NoteKind::Error, "CPL: issue dates differ");
            return false;
        }
        if self.ratings != other.ratings {
            note(NoteKind::Error, "CPL: ratings differ");
            return false;
        }
        if self.reels.len() != other.reels.len() {
            note(
                NoteKind::Error,
                &format!(
                    "CPL: reel counts differ ({} vs {})",
                    self.reels.len(),
                    other.reels.len()
                ),
            );
            return false;
        }
        for (a, b) in self.reels.iter().zip(&other.reels) {
            if !a.equals(b, options, &mut *note) {
                return false;
            }
        }
        true
    }
}

fn area_from_element(node: Option<&Element>) -> Option<Size> {
    let node = node?;
    let width = node.number_child("Width").ok()?;
    let height = node.number_child("Height").ok()?;
    Some(Size::new(width, height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reel::{Reel, ReelMarkers};
    use dcpack_core::{Marker, Time};

    fn sample_cpl() -> Cpl {
        let mut cpl = Cpl::new("A Test DCP", ContentKind::Feature);
        cpl.issuer = "acme".to_string();
        cpl.creator = "acme".to_string();
        cpl.ratings.push(Rating {
            agency: "http://www.mpaa.org/2003-ratings".to_string(),
            label: "PG".to_string(),
        });

        let mut reel = Reel::new();
        let mut markers = ReelMarkers::new(Fraction::new(24, 1), 240);
        markers.set(Marker::Ffoc, Time::from_editable_units(1, 24));
        reel.main_markers = Some(markers);
        cpl.add_reel(reel);
        cpl
    }

    #[test]
    fn test_round_trip_interop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cpl.xml");

        let mut cpl = sample_cpl();
        cpl.write_xml(&path, Standard::Interop, None).unwrap();

        let read = Cpl::from_file(&path).unwrap();
        assert_eq!(read.id, cpl.id);
        assert_eq!(read.standard(), Some(Standard::Interop));
        assert_eq!(read.content_kind, ContentKind::Feature);
        assert_eq!(read.annotation_text.as_deref(), Some("A Test DCP"));
        // Ratings survive the round trip.
        assert_eq!(read.ratings, cpl.ratings);
        assert_eq!(read.reels().len(), 1);
        assert!(read.reels()[0].main_markers.is_some());
    }

    #[test]
    fn test_smpte_metadata_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cpl.xml");

        let mut cpl = sample_cpl();
        let mut metadata = CompositionMetadata::new("A Test DCP: The Full Title");
        metadata.release_territory = Some("001".to_string());
        metadata.main_sound_configuration = Some("51/L,R,C,LFE,Ls,Rs".to_string());
        metadata.main_sound_sample_rate = Some(48000);
        metadata.main_picture_stored_area = Some(Size::new(1998, 1080));
        metadata.main_picture_active_area = Some(Size::new(1998, 1080));
        metadata.subtitle_languages = vec!["de-DE".to_string(), "fr-FR".to_string()];
        cpl.metadata = Some(metadata.clone());
        cpl.write_xml(&path, Standard::Smpte, None).unwrap();

        let read = Cpl::from_file(&path).unwrap();
        assert_eq!(read.standard(), Some(Standard::Smpte));
        let read_metadata = read.metadata.unwrap();
        assert_eq!(read_metadata.full_content_title, "A Test DCP: The Full Title");
        assert_eq!(read_metadata.version_number, Some(1));
        assert_eq!(read_metadata.release_territory.as_deref(), Some("001"));
        assert_eq!(read_metadata.main_sound_sample_rate, Some(48000));
        assert_eq!(
            read_metadata.subtitle_languages,
            vec!["de-DE".to_string(), "fr-FR".to_string()]
        );
    }

    #[test]
    fn test_extension_metadata_profile_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cpl.xml");

        let mut cpl = sample_cpl();
        cpl.metadata = Some(CompositionMetadata::new("Title"));
        cpl.write_xml(&path, Standard::Smpte, None).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("DCP Constraints Profile"));
        assert!(text.contains("SMPTE-RDD-52:2020-Bv2.1"));
        assert!(text.contains("http://isdcf.com/ns/cplmd/app"));
    }

    #[test]
    fn test_duplicate_content_version_rejected() {
        let mut cpl = sample_cpl();
        let version = ContentVersion {
            id: "urn:uuid:x".to_string(),
            label_text: "v".to_string(),
        };
        cpl.add_content_version(version.clone()).unwrap();
        assert!(matches!(
            cpl.add_content_version(version),
            Err(Error::DuplicateId(_))
        ));
    }

    #[test]
    fn test_negative_version_number_rejected() {
        let mut metadata = CompositionMetadata::new("Title");
        assert!(metadata.set_version_number(-1).is_err());
        metadata.set_version_number(2).unwrap();
        assert_eq!(metadata.version_number, Some(2));
    }

    #[test]
    fn test_equals_flags_content_kind() {
        let a = sample_cpl();
        let mut b = a.clone();
        b.content_kind = ContentKind::Trailer;

        let mut notes = Vec::new();
        let mut handler = |kind: NoteKind, message: &str| {
            notes.push((kind, message.to_string()));
        };
        assert!(!a.equals(&b, &EqualityOptions::default(), &mut handler));
        assert!(notes.iter().any(|(_, m)| m.contains("content kinds")));
    }
}
