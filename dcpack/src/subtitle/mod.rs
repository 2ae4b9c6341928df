//! The subtitle model.
//!
//! Both subtitle dialects share this in-memory form: a flat, time-ordered
//! list of [`Subtitle`] entries, each either text with styling or a PNG
//! image, carrying its own timing and placement. The XML engines in
//! [`parse`] and [`write`] translate between this and the two schemas.

mod interop;
mod parse;
mod smpte;
mod write;

pub use interop::{InteropLoadFont, InteropSubtitleAsset, INTEROP_TCR};
pub use parse::{parse_subtitle_nodes, ParseContext};
pub use smpte::{LoadFont, SmpteSubtitleAsset, SMPTE_SUBTITLE_NS};
pub use write::subtitles_to_nodes;

use dcpack_core::{Colour, Direction, Effect, HAlign, Time, VAlign};

/// Timing and placement shared by text and image subtitles.
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitlePlacement {
    /// Time the subtitle appears.
    pub in_time: Time,
    /// Time the subtitle disappears.
    pub out_time: Time,
    /// Fade-up duration.
    pub fade_up: Time,
    /// Fade-down duration.
    pub fade_down: Time,
    /// Horizontal position as a fraction of the screen (0 to 1).
    pub h_position: f32,
    /// Which edge `h_position` is measured from.
    pub h_align: HAlign,
    /// Vertical position as a fraction of the screen (0 to 1).
    pub v_position: f32,
    /// Which edge `v_position` is measured from.
    pub v_align: VAlign,
    /// Z position for stereoscopic placement.
    pub z_position: f32,
    /// Writing direction.
    pub direction: Direction,
}

impl SubtitlePlacement {
    /// Placement with both times at a tick rate and everything else
    /// defaulted.
    pub fn new(in_time: Time, out_time: Time) -> Self {
        let tcr = in_time.tcr;
        SubtitlePlacement {
            in_time,
            out_time,
            fade_up: Time::new(0, 0, 0, 0, tcr),
            fade_down: Time::new(0, 0, 0, 0, tcr),
            h_position: 0.0,
            h_align: HAlign::Center,
            v_position: 0.0,
            v_align: VAlign::Center,
            z_position: 0.0,
            direction: Direction::Ltr,
        }
    }

    /// The key identifying one `<Subtitle>` spot: identical timing.
    pub(crate) fn spot_key(&self) -> (Time, Time, Time, Time) {
        (self.in_time, self.out_time, self.fade_up, self.fade_down)
    }

    /// The key identifying one `<Text>` group within a spot.
    pub(crate) fn text_key(&self) -> (VAlign, i64, HAlign, i64, i64, Direction) {
        (
            self.v_align,
            (self.v_position * 100_000.0) as i64,
            self.h_align,
            (self.h_position * 100_000.0) as i64,
            (self.z_position * 100_000.0) as i64,
            self.direction,
        )
    }
}

/// Character styling of a text subtitle.
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleStyle {
    /// Font id, referring to a `<LoadFont>`.
    pub font_id: Option<String>,
    /// Point size at 11 inches of screen height.
    pub size: i64,
    /// Aspect-ratio correction.
    pub aspect_adjust: f32,
    pub italic: bool,
    pub bold: bool,
    pub underline: bool,
    /// Glyph colour.
    pub colour: Colour,
    /// Effect around the glyphs.
    pub effect: Effect,
    /// Colour of the effect.
    pub effect_colour: Colour,
}

impl Default for SubtitleStyle {
    fn default() -> Self {
        SubtitleStyle {
            font_id: None,
            size: 42,
            aspect_adjust: 1.0,
            italic: false,
            bold: false,
            underline: false,
            colour: Colour::WHITE,
            effect: Effect::None,
            effect_colour: Colour::BLACK,
        }
    }
}

/// One run of styled text on screen.
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleText {
    /// Timing and placement.
    pub placement: SubtitlePlacement,
    /// Styling.
    pub style: SubtitleStyle,
    /// The text itself.
    pub text: String,
    /// Horizontal space inserted before this run, in ems.
    pub space_before: f32,
}

/// A PNG image subtitle.
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleImage {
    /// Timing and placement.
    pub placement: SubtitlePlacement,
    /// The image's own UUID.
    pub id: String,
    /// PNG bytes.
    pub png: Vec<u8>,
}

/// Any subtitle entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Subtitle {
    Text(SubtitleText),
    Image(SubtitleImage),
}

impl Subtitle {
    /// Timing and placement of either kind.
    pub fn placement(&self) -> &SubtitlePlacement {
        match self {
            Subtitle::Text(t) => &t.placement,
            Subtitle::Image(i) => &i.placement,
        }
    }

    /// The text content, if this is a text subtitle.
    pub fn text(&self) -> Option<&str> {
        match self {
            Subtitle::Text(t) => Some(&t.text),
            Subtitle::Image(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spot_key_groups_identical_timing() {
        let a = SubtitlePlacement::new(
            Time::new(0, 0, 1, 0, 24),
            Time::new(0, 0, 3, 0, 24),
        );
        let mut b = a.clone();
        b.v_position = 0.8;
        assert_eq!(a.spot_key(), b.spot_key());
        assert_ne!(a.text_key(), b.text_key());
    }

    #[test]
    fn test_default_style() {
        let style = SubtitleStyle::default();
        assert_eq!(style.size, 42);
        assert_eq!(style.colour, Colour::WHITE);
        assert_eq!(style.effect, Effect::None);
    }
}
