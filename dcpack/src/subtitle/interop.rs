//! Interop subtitle assets.
//!
//! An Interop subtitle asset is a bare `<DCSubtitle>` XML file sitting in
//! the package directory, pulling in fonts via `<LoadFont URI="...">` and
//! PNG images via `<Image>` references, all as sibling files.

use crate::asset::AssetCommon;
use crate::font::FontAsset;
use crate::subtitle::{parse_subtitle_nodes, subtitles_to_nodes, ParseContext, Subtitle};
use dcpack_core::{make_uuid, Result, Standard, XmlError};
use dcpack_xml::{document_to_string, parse_string, Element};
use std::path::Path;
use tracing::debug;

/// Ticks per second of Interop subtitle times.
pub const INTEROP_TCR: i64 = 250;

const ROOT: &str = "DCSubtitle";

/// An Interop `<LoadFont>` reference.
#[derive(Debug, Clone, PartialEq)]
pub struct InteropLoadFont {
    /// The id that `<Font Id="...">` refers to.
    pub id: String,
    /// URI of the font file, relative to the subtitle XML.
    pub uri: String,
}

/// An Interop subtitle asset.
#[derive(Debug, Clone)]
pub struct InteropSubtitleAsset {
    /// Shared asset state.
    pub common: AssetCommon,
    /// The `<MovieTitle>`.
    pub movie_title: Option<String>,
    /// The `<ReelNumber>`; strangely, sometimes a free-form string.
    pub reel_number: String,
    /// The `<Language>`, a display name rather than an RFC 5646 tag.
    pub language: Option<String>,
    /// `<LoadFont>` references.
    pub load_fonts: Vec<InteropLoadFont>,
    /// The subtitles themselves.
    pub subtitles: Vec<Subtitle>,
    fonts: Vec<FontAsset>,
    raw_xml: Option<String>,
}

impl InteropSubtitleAsset {
    /// Create an empty asset for authoring.
    pub fn new(movie_title: impl Into<String>, language: impl Into<String>) -> Self {
        InteropSubtitleAsset {
            common: AssetCommon::new(make_uuid(), None),
            movie_title: Some(movie_title.into()),
            reel_number: "1".to_string(),
            language: Some(language.into()),
            load_fonts: Vec::new(),
            subtitles: Vec::new(),
            fonts: Vec::new(),
            raw_xml: None,
        }
    }

    /// Load from a `DCSubtitle` XML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let root = parse_string(&raw)?;
        if root.name != ROOT {
            return Err(XmlError::UnexpectedRoot {
                expected: ROOT.to_string(),
                found: root.name.clone(),
            }
            .into());
        }

        let directory = path.parent().map(Path::to_path_buf);
        let resolver = |reference: &str| -> Option<Vec<u8>> {
            let dir = directory.as_ref()?;
            std::fs::read(dir.join(reference)).ok()
        };

        let load_fonts: Vec<InteropLoadFont> = root
            .children_named("LoadFont")
            .map(|e| {
                Ok(InteropLoadFont {
                    id: e.string_attribute("Id")?,
                    uri: e.string_attribute("URI")?,
                })
            })
            .collect::<Result<_>>()?;

        // Font files referenced by URI become sibling font assets when
        // they exist on disk.
        let mut fonts = Vec::new();
        for load_font in &load_fonts {
            if let Some(dir) = path.parent() {
                let font_path = dir.join(&load_font.uri);
                if font_path.exists() {
                    fonts.push(FontAsset::new(&load_font.id, &font_path));
                }
            }
        }

        let subtitles = parse_subtitle_nodes(
            &root,
            &ParseContext {
                tcr: INTEROP_TCR,
                image_resolver: Some(&resolver),
            },
        )?;

        debug!(path = %path.display(), count = subtitles.len(), "read Interop subtitles");

        Ok(InteropSubtitleAsset {
            common: AssetCommon::new(
                root.optional_string_child("SubtitleID")
                    .map(|id| dcpack_core::remove_urn_uuid(&id))
                    .unwrap_or_else(make_uuid),
                Some(path.to_path_buf()),
            ),
            movie_title: root.optional_string_child("MovieTitle"),
            reel_number: root
                .optional_string_child("ReelNumber")
                .unwrap_or_else(|| "1".to_string()),
            language: root.optional_string_child("Language"),
            load_fonts,
            subtitles,
            fonts,
            raw_xml: Some(raw),
        })
    }

    /// Add a subtitle.
    pub fn add(&mut self, subtitle: Subtitle) {
        self.subtitles.push(subtitle);
    }

    /// Reference a font file.
    pub fn add_font(&mut self, id: &str, path: &Path) {
        self.load_fonts.push(InteropLoadFont {
            id: id.to_string(),
            uri: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        });
        self.fonts.push(FontAsset::new(id, path));
    }

    /// Font assets referenced by this subtitle file.
    pub fn font_assets(&self) -> &[FontAsset] {
        &self.fonts
    }

    /// The XML text as on disk, when loaded from a file.
    pub fn raw_xml(&self) -> Option<&str> {
        self.raw_xml.as_deref()
    }

    /// Serialise to `DCSubtitle` XML.
    pub fn as_xml(&self) -> String {
        let mut root = Element::new(ROOT);
        root.set_attribute("Version", "1.0");
        root.add_text_child("SubtitleID", &self.common.id);
        if let Some(title) = &self.movie_title {
            root.add_text_child("MovieTitle", title);
        }
        root.add_text_child("ReelNumber", &self.reel_number);
        if let Some(language) = &self.language {
            root.add_text_child("Language", language);
        }
        for load_font in &self.load_fonts {
            let mut node = Element::new("LoadFont");
            node.set_attribute("Id", &load_font.id);
            node.set_attribute("URI", &load_font.uri);
            root.add_child(node);
        }
        for node in subtitles_to_nodes(&self.subtitles, INTEROP_TCR, Standard::Interop) {
            root.add_child(node);
        }
        document_to_string(&root)
    }

    /// Write the XML and any image sidecars, recording the file path.
    pub fn write(&mut self, path: &Path) -> Result<()> {
        std::fs::write(path, self.as_xml())?;
        if let Some(dir) = path.parent() {
            for subtitle in &self.subtitles {
                if let Subtitle::Image(image) = subtitle {
                    std::fs::write(dir.join(format!("{}.png", image.id)), &image.png)?;
                }
            }
        }
        self.common.set_file(path.to_path_buf());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subtitle::{SubtitlePlacement, SubtitleStyle, SubtitleText};
    use dcpack_core::{Time, VAlign};

    fn sample_asset() -> InteropSubtitleAsset {
        let mut asset = InteropSubtitleAsset::new("A Movie", "French");
        let mut placement = SubtitlePlacement::new(
            Time::new(0, 0, 5, 0, INTEROP_TCR),
            Time::new(0, 0, 7, 0, INTEROP_TCR),
        );
        placement.v_align = VAlign::Bottom;
        placement.v_position = 0.2;
        asset.add(Subtitle::Text(SubtitleText {
            placement,
            style: SubtitleStyle {
                font_id: Some("theFont".into()),
                ..Default::default()
            },
            text: "Bonjour".into(),
            space_before: 0.0,
        }));
        asset
    }

    #[test]
    fn test_write_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subs.xml");

        let mut asset = sample_asset();
        asset.write(&path).unwrap();

        let read = InteropSubtitleAsset::from_file(&path).unwrap();
        assert_eq!(read.common.id, asset.common.id);
        assert_eq!(read.movie_title.as_deref(), Some("A Movie"));
        assert_eq!(read.language.as_deref(), Some("French"));
        assert_eq!(read.subtitles, asset.subtitles);
        assert!(read.raw_xml().is_some());
    }

    #[test]
    fn test_load_font_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let font_path = dir.path().join("theFont.ttf");
        std::fs::write(&font_path, b"not really a font").unwrap();

        let mut asset = sample_asset();
        asset.add_font("theFont", &font_path);
        let path = dir.path().join("subs.xml");
        asset.write(&path).unwrap();

        let read = InteropSubtitleAsset::from_file(&path).unwrap();
        assert_eq!(read.load_fonts.len(), 1);
        assert_eq!(read.load_fonts[0].id, "theFont");
        assert_eq!(read.font_assets().len(), 1);
        assert_eq!(read.font_assets()[0].data().unwrap(), b"not really a font");
    }

    #[test]
    fn test_rejects_wrong_root() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subs.xml");
        std::fs::write(&path, "<SubtitleReel/>").unwrap();
        assert!(InteropSubtitleAsset::from_file(&path).is_err());
    }
}
