//! Shared enumerations and small value types.
//!
//! The string forms here are the exact tokens used in DCP XML; parsing is
//! tolerant of case but rejects unknown values.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The two interoperable DCP dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Standard {
    /// The older MXF-Interop form.
    Interop,
    /// The SMPTE standardised form.
    Smpte,
}

impl fmt::Display for Standard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Standard::Interop => write!(f, "Interop"),
            Standard::Smpte => write!(f, "SMPTE"),
        }
    }
}

/// The kind of content in a composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentKind {
    Feature,
    Short,
    Trailer,
    Test,
    Transitional,
    Rating,
    Teaser,
    Policy,
    PublicServiceAnnouncement,
    Advertisement,
}

impl ContentKind {
    /// The token written to `<ContentKind>`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Feature => "feature",
            ContentKind::Short => "short",
            ContentKind::Trailer => "trailer",
            ContentKind::Test => "test",
            ContentKind::Transitional => "transitional",
            ContentKind::Rating => "rating",
            ContentKind::Teaser => "teaser",
            ContentKind::Policy => "policy",
            ContentKind::PublicServiceAnnouncement => "psa",
            ContentKind::Advertisement => "advertisement",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ContentKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "feature" => Ok(ContentKind::Feature),
            "short" => Ok(ContentKind::Short),
            "trailer" => Ok(ContentKind::Trailer),
            "test" => Ok(ContentKind::Test),
            "transitional" => Ok(ContentKind::Transitional),
            "rating" => Ok(ContentKind::Rating),
            "teaser" => Ok(ContentKind::Teaser),
            "policy" => Ok(ContentKind::Policy),
            "psa" => Ok(ContentKind::PublicServiceAnnouncement),
            "advertisement" => Ok(ContentKind::Advertisement),
            _ => Err(Error::misc(format!("unknown content kind '{s}'"))),
        }
    }
}

/// Width and height in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Size {
    /// Create a new size.
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// An ARGB colour, serialised as eight hex digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Colour {
    pub a: u8,
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Colour {
    /// Opaque white, the subtitle default.
    pub const WHITE: Colour = Colour {
        a: 255,
        r: 255,
        g: 255,
        b: 255,
    };

    /// Opaque black, the default effect colour.
    pub const BLACK: Colour = Colour {
        a: 255,
        r: 0,
        g: 0,
        b: 0,
    };

    /// Create a colour from components.
    pub fn new(a: u8, r: u8, g: u8, b: u8) -> Self {
        Self { a, r, g, b }
    }

    /// The `AARRGGBB` hex form used in subtitle XML.
    pub fn as_argb_string(&self) -> String {
        format!("{:02X}{:02X}{:02X}{:02X}", self.a, self.r, self.g, self.b)
    }
}

impl Default for Colour {
    fn default() -> Self {
        Colour::WHITE
    }
}

impl FromStr for Colour {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.len() != 8 || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::misc(format!("bad colour '{s}'")));
        }
        let byte = |i: usize| u8::from_str_radix(&s[i..i + 2], 16).unwrap();
        Ok(Self {
            a: byte(0),
            r: byte(2),
            g: byte(4),
            b: byte(6),
        })
    }
}

/// Subtitle text effect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Effect {
    #[default]
    None,
    /// An outline around the glyphs.
    Border,
    /// A drop shadow behind the glyphs.
    Shadow,
}

impl Effect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Effect::None => "none",
            Effect::Border => "border",
            Effect::Shadow => "shadow",
        }
    }
}

impl FromStr for Effect {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Effect::None),
            "border" => Ok(Effect::Border),
            "shadow" => Ok(Effect::Shadow),
            _ => Err(Error::misc(format!("unknown effect '{s}'"))),
        }
    }
}

/// Horizontal alignment of a subtitle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HAlign {
    Left,
    #[default]
    Center,
    Right,
}

impl HAlign {
    pub fn as_str(&self) -> &'static str {
        match self {
            HAlign::Left => "left",
            HAlign::Center => "center",
            HAlign::Right => "right",
        }
    }
}

impl FromStr for HAlign {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "left" => Ok(HAlign::Left),
            "center" => Ok(HAlign::Center),
            "right" => Ok(HAlign::Right),
            _ => Err(Error::misc(format!("unknown halign '{s}'"))),
        }
    }
}

/// Vertical alignment of a subtitle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VAlign {
    Top,
    #[default]
    Center,
    Bottom,
}

impl VAlign {
    pub fn as_str(&self) -> &'static str {
        match self {
            VAlign::Top => "top",
            VAlign::Center => "center",
            VAlign::Bottom => "bottom",
        }
    }
}

impl FromStr for VAlign {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "top" => Ok(VAlign::Top),
            "center" => Ok(VAlign::Center),
            "bottom" => Ok(VAlign::Bottom),
            _ => Err(Error::misc(format!("unknown valign '{s}'"))),
        }
    }
}

/// Writing direction of subtitle text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    Ltr,
    Rtl,
    Ttb,
    Btt,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Ltr => "ltr",
            Direction::Rtl => "rtl",
            Direction::Ttb => "ttb",
            Direction::Btt => "btt",
        }
    }
}

impl FromStr for Direction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            // Both token sets appear in the wild.
            "ltr" | "horizontal" => Ok(Direction::Ltr),
            "rtl" => Ok(Direction::Rtl),
            "ttb" | "vertical" => Ok(Direction::Ttb),
            "btt" => Ok(Direction::Btt),
            _ => Err(Error::misc(format!("unknown direction '{s}'"))),
        }
    }
}

/// Composition markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Marker {
    /// First frame of composition.
    Ffoc,
    /// Last frame of composition.
    Lfoc,
    /// First frame of title credits.
    Fftc,
    /// Last frame of title credits.
    Lftc,
    /// First frame of intermission.
    Ffoi,
    /// Last frame of intermission.
    Lfoi,
    /// First frame of end credits.
    Ffec,
    /// Last frame of end credits.
    Lfec,
    /// First frame of moving credits.
    Ffmc,
    /// Last frame of moving credits.
    Lfmc,
}

impl Marker {
    /// The label used in `<MarkerList>`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Marker::Ffoc => "FFOC",
            Marker::Lfoc => "LFOC",
            Marker::Fftc => "FFTC",
            Marker::Lftc => "LFTC",
            Marker::Ffoi => "FFOI",
            Marker::Lfoi => "LFOI",
            Marker::Ffec => "FFEC",
            Marker::Lfec => "LFEC",
            Marker::Ffmc => "FFMC",
            Marker::Lfmc => "LFMC",
        }
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Marker {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "FFOC" => Ok(Marker::Ffoc),
            "LFOC" => Ok(Marker::Lfoc),
            "FFTC" => Ok(Marker::Fftc),
            "LFTC" => Ok(Marker::Lftc),
            "FFOI" => Ok(Marker::Ffoi),
            "LFOI" => Ok(Marker::Lfoi),
            "FFEC" => Ok(Marker::Ffec),
            "LFEC" => Ok(Marker::Lfec),
            "FFMC" => Ok(Marker::Ffmc),
            "LFMC" => Ok(Marker::Lfmc),
            _ => Err(Error::misc(format!("unknown marker '{s}'"))),
        }
    }
}

/// Template for sidecar XML filenames.
///
/// `%t` expands to the document type (`cpl`, `pkl`) and `%i` to the
/// document's UUID. The default template produces `cpl_<uuid>.xml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameFormat {
    template: String,
}

impl NameFormat {
    /// Create a format from a template string.
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Expand the template for a document type and id.
    pub fn format(&self, type_name: &str, id: &str) -> String {
        self.template.replace("%t", type_name).replace("%i", id)
    }
}

impl Default for NameFormat {
    fn default() -> Self {
        Self::new("%t_%i.xml")
    }
}
