//! SMPTE subtitle assets.
//!
//! A SMPTE subtitle asset is an MXF file whose first essence unit is the
//! `<SubtitleReel>` XML and whose following units are ancillary resources:
//! fonts referenced by `<LoadFont>` and PNGs referenced by `<Image>`, in
//! reference order. The XML carries its own `<Id>`, tracked separately
//! from the asset id so both survive a round trip.

use crate::asset::AssetCommon;
use crate::subtitle::{parse_subtitle_nodes, subtitles_to_nodes, ParseContext, Subtitle};
use dcpack_core::{
    make_uuid, Error, Fraction, LocalTime, MxfError, Result, Standard, Time, XmlError,
};
use dcpack_mxf::{EssenceDescriptor, EssenceKind, MxfReader, MxfWriter};
use dcpack_xml::{document_to_string, parse_string, Element};
use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;
use tracing::debug;

/// The SMPTE 428-7 subtitle namespace.
pub const SMPTE_SUBTITLE_NS: &str = "http://www.smpte-ra.org/schemas/428-7/2010/DCST";

const ROOT: &str = "SubtitleReel";

/// A SMPTE `<LoadFont>` reference.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadFont {
    /// The id that `<Font Id="...">` refers to.
    pub id: String,
    /// UUID of the font resource inside the MXF.
    pub resource_id: String,
}

/// A SMPTE subtitle asset.
#[derive(Debug, Clone)]
pub struct SmpteSubtitleAsset {
    /// Shared asset state; the id names the MXF track file.
    pub common: AssetCommon,
    /// The `<Id>` of the XML document inside the MXF.
    pub xml_id: String,
    /// The `<ContentTitleText>`.
    pub content_title_text: String,
    /// The `<IssueDate>`, kept as written.
    pub issue_date: String,
    /// The `<ReelNumber>`.
    pub reel_number: Option<i64>,
    /// The `<Language>`, an RFC 5646 tag.
    pub language: Option<String>,
    /// The `<EditRate>`.
    pub edit_rate: Fraction,
    /// The `<TimeCodeRate>`, ticks per second for all times.
    pub time_code_rate: i64,
    /// The `<StartTime>`.
    pub start_time: Option<Time>,
    /// `<LoadFont>` references.
    pub load_fonts: Vec<LoadFont>,
    /// The subtitles themselves.
    pub subtitles: Vec<Subtitle>,
    /// Edit units in the MXF.
    pub intrinsic_duration: i64,
    /// Content-key id if encrypted.
    pub key_id: Option<String>,
    fonts: Vec<(String, Vec<u8>)>,
    raw_xml: Option<String>,
    content_key: OnceLock<[u8; 16]>,
}

impl SmpteSubtitleAsset {
    /// Create an empty asset for authoring.
    pub fn new(
        content_title_text: impl Into<String>,
        edit_rate: Fraction,
        time_code_rate: i64,
    ) -> Self {
        SmpteSubtitleAsset {
            common: AssetCommon::new(make_uuid(), None),
            xml_id: make_uuid(),
            content_title_text: content_title_text.into(),
            issue_date: LocalTime::now().as_string(),
            reel_number: Some(1),
            language: None,
            edit_rate,
            time_code_rate,
            start_time: Some(Time::new(0, 0, 0, 0, time_code_rate)),
            load_fonts: Vec::new(),
            subtitles: Vec::new(),
            intrinsic_duration: 0,
            key_id: None,
            fonts: Vec::new(),
            raw_xml: None,
            content_key: OnceLock::new(),
        }
    }

    /// Load from an MXF-wrapped subtitle file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let mut reader = MxfReader::open(path)?;
        if reader.descriptor().kind != EssenceKind::TimedText {
            return Err(MxfError::UnknownEssence(path.to_path_buf()).into());
        }
        if reader.frame_count() == 0 {
            return Err(Error::read(format!(
                "subtitle MXF {} carries no XML payload",
                path.display()
            )));
        }

        let raw = String::from_utf8(reader.read_frame(0)?)
            .map_err(|_| Error::read("subtitle XML is not UTF-8".to_string()))?;
        let root = parse_string(&raw)?;
        if root.name != ROOT {
            return Err(XmlError::UnexpectedRoot {
                expected: ROOT.to_string(),
                found: root.name.clone(),
            }
            .into());
        }

        let time_code_rate: i64 = root.number_child("TimeCodeRate")?;

        let load_fonts: Vec<LoadFont> = root
            .children_named("LoadFont")
            .map(|e| {
                Ok(LoadFont {
                    id: e.string_attribute("ID")?,
                    resource_id: dcpack_core::remove_urn_uuid(e.text().trim()),
                })
            })
            .collect::<Result<_>>()?;

        // Ancillary resources follow the XML in reference order: fonts
        // first, then images in document order.
        let mut references: Vec<String> =
            load_fonts.iter().map(|f| f.resource_id.clone()).collect();
        collect_image_references(&root, &mut references);

        let mut resources: HashMap<String, Vec<u8>> = HashMap::new();
        for (index, reference) in references.iter().enumerate() {
            let frame = index as i64 + 1;
            if frame < reader.frame_count() {
                resources.insert(reference.clone(), reader.read_frame(frame)?);
            }
        }

        let fonts: Vec<(String, Vec<u8>)> = load_fonts
            .iter()
            .filter_map(|f| {
                resources
                    .get(&f.resource_id)
                    .map(|data| (f.resource_id.clone(), data.clone()))
            })
            .collect();

        let resolver = |reference: &str| -> Option<Vec<u8>> {
            resources
                .get(&dcpack_core::remove_urn_uuid(reference))
                .cloned()
        };

        let subtitle_list = root.required_child("SubtitleList")?;
        let subtitles = parse_subtitle_nodes(
            subtitle_list,
            &ParseContext {
                tcr: time_code_rate,
                image_resolver: Some(&resolver),
            },
        )?;

        debug!(path = %path.display(), count = subtitles.len(), "read SMPTE subtitles");

        Ok(SmpteSubtitleAsset {
            common: AssetCommon::new(make_uuid(), Some(path.to_path_buf())),
            xml_id: dcpack_core::remove_urn_uuid(&root.string_child("Id")?),
            content_title_text: root.string_child("ContentTitleText")?,
            issue_date: root.optional_string_child("IssueDate").unwrap_or_default(),
            reel_number: root.optional_number_child("ReelNumber")?,
            language: root.optional_string_child("Language"),
            edit_rate: root
                .optional_string_child("EditRate")
                .map(|s| s.parse())
                .transpose()?
                .unwrap_or(Fraction::new(24, 1)),
            time_code_rate,
            start_time: root
                .optional_string_child("StartTime")
                .map(|s| Time::from_string(s.trim(), time_code_rate))
                .transpose()?,
            load_fonts,
            subtitles,
            intrinsic_duration: reader.descriptor().intrinsic_duration,
            key_id: reader.descriptor().key_id.clone(),
            fonts,
            raw_xml: Some(raw),
            content_key: OnceLock::new(),
        })
    }

    /// As [`from_file`], but with a known asset id (from an asset map).
    ///
    /// [`from_file`]: SmpteSubtitleAsset::from_file
    pub fn from_file_with_id(path: &Path, id: &str) -> Result<Self> {
        let mut asset = Self::from_file(path)?;
        asset.common.id = id.to_string();
        Ok(asset)
    }

    /// Add a subtitle.
    pub fn add(&mut self, subtitle: Subtitle) {
        self.subtitles.push(subtitle);
    }

    /// Embed a font under a `<LoadFont>` id, returning the new resource
    /// id.
    pub fn add_font(&mut self, id: &str, data: Vec<u8>) -> String {
        let resource_id = make_uuid();
        self.load_fonts.push(LoadFont {
            id: id.to_string(),
            resource_id: resource_id.clone(),
        });
        self.fonts.push((resource_id.clone(), data));
        resource_id
    }

    /// The embedded fonts as `(resource id, bytes)`.
    pub fn font_data(&self) -> &[(String, Vec<u8>)] {
        &self.fonts
    }

    /// The XML text as stored in the MXF, when loaded from a file.
    pub fn raw_xml(&self) -> Option<&str> {
        self.raw_xml.as_deref()
    }

    /// Serialise the `SubtitleReel` document.
    pub fn as_xml(&self) -> String {
        let mut root = Element::root(ROOT, SMPTE_SUBTITLE_NS);
        root.add_text_child("Id", format!("urn:uuid:{}", self.xml_id));
        root.add_text_child("ContentTitleText", &self.content_title_text);
        root.add_text_child("IssueDate", &self.issue_date);
        if let Some(reel_number) = self.reel_number {
            root.add_text_child("ReelNumber", reel_number.to_string());
        }
        if let Some(language) = &self.language {
            root.add_text_child("Language", language);
        }
        root.add_text_child("EditRate", self.edit_rate.as_string());
        root.add_text_child("TimeCodeRate", self.time_code_rate.to_string());
        if let Some(start_time) = self.start_time {
            root.add_text_child(
                "StartTime",
                start_time.rebase(self.time_code_rate).to_string(),
            );
        }
        for load_font in &self.load_fonts {
            let mut node = Element::new("LoadFont");
            node.set_attribute("ID", &load_font.id);
            node.add_text(format!("urn:uuid:{}", load_font.resource_id));
            root.add_child(node);
        }
        let list = root.add_child(Element::new("SubtitleList"));
        for node in subtitles_to_nodes(&self.subtitles, self.time_code_rate, Standard::Smpte) {
            list.add_child(node);
        }
        document_to_string(&root)
    }

    /// Write the MXF wrapper: XML payload first, then font and image
    /// resources in reference order.
    pub fn write(&mut self, path: &Path) -> Result<()> {
        let mut descriptor = EssenceDescriptor::new(EssenceKind::TimedText, self.edit_rate);
        descriptor.key_id = self.key_id.clone();

        let mut writer = MxfWriter::create(path, descriptor)?;
        writer.append_frame(self.as_xml().as_bytes())?;
        for (_, data) in &self.fonts {
            writer.append_frame(data)?;
        }
        for subtitle in &self.subtitles {
            if let Subtitle::Image(image) = subtitle {
                writer.append_frame(&image.png)?;
            }
        }
        writer.finalize()?;

        self.common.set_file(path.to_path_buf());
        Ok(())
    }

    pub(crate) fn attach_content_key(&self, key: [u8; 16]) {
        let _ = self.content_key.set(key);
    }

    pub(crate) fn content_key(&self) -> Option<[u8; 16]> {
        self.content_key.get().copied()
    }
}

fn collect_image_references(element: &Element, out: &mut Vec<String>) {
    for child in element.elements() {
        if child.name == "Image" {
            out.push(dcpack_core::remove_urn_uuid(child.text().trim()));
        } else {
            collect_image_references(child, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subtitle::{SubtitlePlacement, SubtitleStyle, SubtitleText};
    use dcpack_core::VAlign;

    fn sample_asset() -> SmpteSubtitleAsset {
        let mut asset = SmpteSubtitleAsset::new("A Test DCP", Fraction::new(24, 1), 24);
        asset.language = Some("de-DE".to_string());
        let mut placement = SubtitlePlacement::new(
            Time::new(0, 0, 5, 0, 24),
            Time::new(0, 0, 7, 12, 24),
        );
        placement.v_align = VAlign::Top;
        placement.v_position = 0.8;
        asset.add(Subtitle::Text(SubtitleText {
            placement,
            style: SubtitleStyle::default(),
            text: "Hallo".into(),
            space_before: 0.0,
        }));
        asset
    }

    #[test]
    fn test_ids_distinguishable_after_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subs.mxf");

        let mut asset = sample_asset();
        asset.write(&path).unwrap();

        let read = SmpteSubtitleAsset::from_file(&path).unwrap();
        assert_eq!(read.xml_id, asset.xml_id);
        assert_ne!(read.xml_id, read.common.id);
    }

    #[test]
    fn test_round_trip_fields_and_subtitles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subs.mxf");

        let mut asset = sample_asset();
        asset.write(&path).unwrap();

        let read = SmpteSubtitleAsset::from_file(&path).unwrap();
        assert_eq!(read.content_title_text, "A Test DCP");
        assert_eq!(read.language.as_deref(), Some("de-DE"));
        assert_eq!(read.time_code_rate, 24);
        assert_eq!(read.start_time, Some(Time::new(0, 0, 0, 0, 24)));
        assert_eq!(read.subtitles, asset.subtitles);
        assert!(read.raw_xml().unwrap().contains("SubtitleReel"));
    }

    #[test]
    fn test_fonts_embedded_and_recovered() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subs.mxf");

        let mut asset = sample_asset();
        let resource_id = asset.add_font("theFont", b"pretend font".to_vec());
        asset.write(&path).unwrap();

        let read = SmpteSubtitleAsset::from_file(&path).unwrap();
        assert_eq!(read.load_fonts.len(), 1);
        assert_eq!(read.load_fonts[0].id, "theFont");
        assert_eq!(read.load_fonts[0].resource_id, resource_id);
        assert_eq!(read.font_data().len(), 1);
        assert_eq!(read.font_data()[0].1, b"pretend font");
    }

    #[test]
    fn test_rejects_wrong_essence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subs.mxf");
        let descriptor = EssenceDescriptor::new(EssenceKind::Pcm, Fraction::new(24, 1));
        MxfWriter::create(&path, descriptor)
            .unwrap()
            .finalize()
            .unwrap();
        assert!(SmpteSubtitleAsset::from_file(&path).is_err());
    }
}
