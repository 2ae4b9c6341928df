//! Parsing subtitle XML into the flat model.
//!
//! Both dialects nest `<Font>`, `<Subtitle>` and `<Text>` freely, with any
//! styling attribute inheritable from an enclosing node. The parser walks
//! the tree with an explicit stack of attribute frames; each text leaf is
//! emitted with the stack's effective composition.

use crate::subtitle::{
    Subtitle, SubtitleImage, SubtitlePlacement, SubtitleStyle, SubtitleText,
};
use dcpack_core::{
    remove_urn_uuid, Colour, Direction, Effect, Error, HAlign, Result, Time, VAlign,
};
use dcpack_xml::{Element, Node};

/// Dialect-specific parsing inputs.
pub struct ParseContext<'a> {
    /// Ticks per second for time attributes.
    pub tcr: i64,
    /// Resolves an `<Image>` reference to PNG bytes.
    pub image_resolver: Option<&'a dyn Fn(&str) -> Option<Vec<u8>>>,
}

/// One level of inherited attributes.
#[derive(Debug, Clone, Default)]
struct Frame {
    font_id: Option<String>,
    size: Option<i64>,
    aspect_adjust: Option<f32>,
    italic: Option<bool>,
    bold: Option<bool>,
    underline: Option<bool>,
    colour: Option<Colour>,
    effect: Option<Effect>,
    effect_colour: Option<Colour>,

    h_position: Option<f32>,
    h_align: Option<HAlign>,
    v_position: Option<f32>,
    v_align: Option<VAlign>,
    z_position: Option<f32>,
    direction: Option<Direction>,

    in_time: Option<Time>,
    out_time: Option<Time>,
    fade_up: Option<Time>,
    fade_down: Option<Time>,
}

fn attribute<'a>(element: &'a Element, names: &[&str]) -> Option<&'a str> {
    names.iter().find_map(|n| element.attribute(n))
}

fn parse_bool(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "yes" | "true" | "1")
}

/// Times are either `HH:MM:SS:EEE` or a bare tick count.
fn parse_time(value: &str, tcr: i64) -> Result<Time> {
    if value.contains(':') {
        Time::from_string(value, tcr)
    } else {
        let ticks: i64 = value
            .trim()
            .parse()
            .map_err(|_| Error::misc(format!("bad time '{value}'")))?;
        Ok(Time::from_editable_units(ticks, tcr))
    }
}

fn parse_percent(value: &str) -> Result<f32> {
    let v: f32 = value
        .trim()
        .parse()
        .map_err(|_| Error::misc(format!("bad position '{value}'")))?;
    Ok(v / 100.0)
}

impl Frame {
    fn from_font(element: &Element) -> Result<Self> {
        let mut frame = Frame::default();
        if let Some(v) = attribute(element, &["Id", "ID"]) {
            frame.font_id = Some(v.to_string());
        }
        if let Some(v) = element.attribute("Size") {
            frame.size = Some(
                v.trim()
                    .parse()
                    .map_err(|_| Error::misc(format!("bad font size '{v}'")))?,
            );
        }
        if let Some(v) = element.attribute("AspectAdjust") {
            frame.aspect_adjust = Some(
                v.trim()
                    .parse()
                    .map_err(|_| Error::misc(format!("bad aspect adjust '{v}'")))?,
            );
        }
        if let Some(v) = element.attribute("Italic") {
            frame.italic = Some(parse_bool(v));
        }
        if let Some(v) = element.attribute("Bold") {
            frame.bold = Some(parse_bool(v));
        }
        if let Some(v) = element.attribute("Underline") {
            frame.underline = Some(parse_bool(v));
        }
        if let Some(v) = attribute(element, &["Color", "Colour"]) {
            frame.colour = Some(v.parse()?);
        }
        if let Some(v) = element.attribute("Effect") {
            frame.effect = Some(v.parse()?);
        }
        if let Some(v) = attribute(element, &["EffectColor", "EffectColour"]) {
            frame.effect_colour = Some(v.parse()?);
        }
        Ok(frame)
    }

    fn from_subtitle(element: &Element, tcr: i64) -> Result<Self> {
        let mut frame = Frame::default();
        if let Some(v) = element.attribute("TimeIn") {
            frame.in_time = Some(parse_time(v, tcr)?);
        }
        if let Some(v) = element.attribute("TimeOut") {
            frame.out_time = Some(parse_time(v, tcr)?);
        }
        if let Some(v) = element.attribute("FadeUpTime") {
            frame.fade_up = Some(parse_time(v, tcr)?);
        }
        if let Some(v) = element.attribute("FadeDownTime") {
            frame.fade_down = Some(parse_time(v, tcr)?);
        }
        Ok(frame)
    }

    fn from_placed(element: &Element) -> Result<Self> {
        let mut frame = Frame::default();
        if let Some(v) = attribute(element, &["Valign", "VAlign"]) {
            frame.v_align = Some(v.parse()?);
        }
        if let Some(v) = attribute(element, &["Vposition", "VPosition"]) {
            frame.v_position = Some(parse_percent(v)?);
        }
        if let Some(v) = attribute(element, &["Halign", "HAlign"]) {
            frame.h_align = Some(v.parse()?);
        }
        if let Some(v) = attribute(element, &["Hposition", "HPosition"]) {
            frame.h_position = Some(parse_percent(v)?);
        }
        if let Some(v) = element.attribute("Zposition") {
            frame.z_position = Some(parse_percent(v)?);
        }
        if let Some(v) = element.attribute("Direction") {
            frame.direction = Some(v.parse()?);
        }
        Ok(frame)
    }
}

struct Effective {
    placement: SubtitlePlacement,
    style: SubtitleStyle,
}

fn effective(stack: &[Frame], tcr: i64) -> Result<Effective> {
    let mut in_time = None;
    let mut out_time = None;
    let zero = Time::new(0, 0, 0, 0, tcr);
    let mut placement = SubtitlePlacement::new(zero, zero);
    let mut style = SubtitleStyle::default();

    for frame in stack {
        if let Some(v) = frame.in_time {
            in_time = Some(v);
        }
        if let Some(v) = frame.out_time {
            out_time = Some(v);
        }
        if let Some(v) = frame.fade_up {
            placement.fade_up = v;
        }
        if let Some(v) = frame.fade_down {
            placement.fade_down = v;
        }
        if let Some(v) = frame.h_position {
            placement.h_position = v;
        }
        if let Some(v) = frame.h_align {
            placement.h_align = v;
        }
        if let Some(v) = frame.v_position {
            placement.v_position = v;
        }
        if let Some(v) = frame.v_align {
            placement.v_align = v;
        }
        if let Some(v) = frame.z_position {
            placement.z_position = v;
        }
        if let Some(v) = frame.direction {
            placement.direction = v;
        }
        if let Some(v) = &frame.font_id {
            style.font_id = Some(v.clone());
        }
        if let Some(v) = frame.size {
            style.size = v;
        }
        if let Some(v) = frame.aspect_adjust {
            style.aspect_adjust = v;
        }
        if let Some(v) = frame.italic {
            style.italic = v;
        }
        if let Some(v) = frame.bold {
            style.bold = v;
        }
        if let Some(v) = frame.underline {
            style.underline = v;
        }
        if let Some(v) = frame.colour {
            style.colour = v;
        }
        if let Some(v) = frame.effect {
            style.effect = v;
        }
        if let Some(v) = frame.effect_colour {
            style.effect_colour = v;
        }
    }

    placement.in_time =
        in_time.ok_or_else(|| Error::misc("subtitle has no TimeIn".to_string()))?;
    placement.out_time =
        out_time.ok_or_else(|| Error::misc("subtitle has no TimeOut".to_string()))?;
    Ok(Effective { placement, style })
}

/// Parse the subtitle nodes below `parent` (a `<DCSubtitle>` root or a
/// `<SubtitleList>`).
pub fn parse_subtitle_nodes(parent: &Element, ctx: &ParseContext) -> Result<Vec<Subtitle>> {
    let mut stack = Vec::new();
    let mut out = Vec::new();
    for child in parent.elements() {
        walk(child, &mut stack, &mut out, ctx)?;
    }
    Ok(out)
}

fn walk(
    element: &Element,
    stack: &mut Vec<Frame>,
    out: &mut Vec<Subtitle>,
    ctx: &ParseContext,
) -> Result<()> {
    match element.name.as_str() {
        "Font" => {
            stack.push(Frame::from_font(element)?);
            for child in element.elements() {
                walk(child, stack, out, ctx)?;
            }
            stack.pop();
        }
        "Subtitle" => {
            stack.push(Frame::from_subtitle(element, ctx.tcr)?);
            for child in element.elements() {
                walk(child, stack, out, ctx)?;
            }
            stack.pop();
        }
        "Text" => {
            stack.push(Frame::from_placed(element)?);
            let mut space = 0.0f32;
            collect_runs(element, stack, out, ctx, &mut space)?;
            stack.pop();
        }
        "Image" => {
            stack.push(Frame::from_placed(element)?);
            let reference = element.text().trim().to_string();
            let png = ctx
                .image_resolver
                .and_then(|resolve| resolve(&reference))
                .unwrap_or_default();
            let id = image_id(&reference);
            let state = effective(stack, ctx.tcr)?;
            out.push(Subtitle::Image(SubtitleImage {
                placement: state.placement,
                id,
                png,
            }));
            stack.pop();
        }
        // LoadFont and anything unknown carry no subtitle content of
        // their own.
        _ => {}
    }
    Ok(())
}

fn collect_runs(
    element: &Element,
    stack: &mut Vec<Frame>,
    out: &mut Vec<Subtitle>,
    ctx: &ParseContext,
    space: &mut f32,
) -> Result<()> {
    for node in &element.children {
        match node {
            Node::Text(text) => {
                let state = effective(stack, ctx.tcr)?;
                out.push(Subtitle::Text(SubtitleText {
                    placement: state.placement,
                    style: state.style,
                    text: text.clone(),
                    space_before: *space,
                }));
                *space = 0.0;
            }
            Node::Element(child) => match child.name.as_str() {
                "Font" => {
                    stack.push(Frame::from_font(child)?);
                    collect_runs(child, stack, out, ctx, space)?;
                    stack.pop();
                }
                "Space" => {
                    let size = child
                        .attribute("Size")
                        .and_then(|v| v.trim_end_matches("em").parse().ok())
                        .unwrap_or(0.5);
                    *space += size;
                }
                "Ruby" => {}
                _ => {}
            },
        }
    }
    Ok(())
}

/// Derive the image id from its reference: a `urn:uuid:` for SMPTE, the
/// file stem for an Interop PNG path.
fn image_id(reference: &str) -> String {
    if reference.starts_with("urn:uuid:") {
        remove_urn_uuid(reference)
    } else {
        std::path::Path::new(reference)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| reference.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dcpack_xml::parse_string;

    fn parse_fragment(xml: &str, tcr: i64) -> Vec<Subtitle> {
        let doc = parse_string(xml).unwrap();
        parse_subtitle_nodes(&doc, &ParseContext {
            tcr,
            image_resolver: None,
        })
        .unwrap()
    }

    #[test]
    fn test_inherited_styles_compose() {
        let subtitles = parse_fragment(
            concat!(
                "<DCSubtitle>",
                "<Font Id=\"theFont\" Size=\"42\" Italic=\"no\">",
                "<Subtitle TimeIn=\"00:00:01:000\" TimeOut=\"00:00:03:000\">",
                "<Text Valign=\"bottom\" Vposition=\"10\">Plain",
                "<Font Italic=\"yes\">leaning</Font>",
                "</Text>",
                "</Subtitle>",
                "</Font>",
                "</DCSubtitle>",
            ),
            250,
        );

        assert_eq!(subtitles.len(), 2);
        let Subtitle::Text(first) = &subtitles[0] else {
            panic!()
        };
        assert_eq!(first.text, "Plain");
        assert!(!first.style.italic);
        assert_eq!(first.style.font_id.as_deref(), Some("theFont"));
        assert_eq!(first.placement.v_align, dcpack_core::VAlign::Bottom);
        assert!((first.placement.v_position - 0.1).abs() < 1e-6);

        let Subtitle::Text(second) = &subtitles[1] else {
            panic!()
        };
        assert_eq!(second.text, "leaning");
        assert!(second.style.italic);
        assert_eq!(second.style.size, 42);
    }

    #[test]
    fn test_times_parse_both_forms() {
        let subtitles = parse_fragment(
            concat!(
                "<DCSubtitle>",
                "<Subtitle TimeIn=\"00:00:01:125\" TimeOut=\"00:00:02:000\" ",
                "FadeUpTime=\"25\">",
                "<Text>hello</Text>",
                "</Subtitle>",
                "</DCSubtitle>",
            ),
            250,
        );
        let placement = subtitles[0].placement();
        assert_eq!(placement.in_time, Time::new(0, 0, 1, 125, 250));
        assert_eq!(placement.fade_up, Time::new(0, 0, 0, 25, 250));
    }

    #[test]
    fn test_space_before() {
        let subtitles = parse_fragment(
            concat!(
                "<DCSubtitle>",
                "<Subtitle TimeIn=\"00:00:01:000\" TimeOut=\"00:00:02:000\">",
                "<Text>one<Space Size=\"2\"/>two</Text>",
                "</Subtitle>",
                "</DCSubtitle>",
            ),
            250,
        );
        assert_eq!(subtitles.len(), 2);
        let Subtitle::Text(second) = &subtitles[1] else {
            panic!()
        };
        assert!((second.space_before - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_missing_time_is_an_error() {
        let doc = parse_string("<DCSubtitle><Subtitle><Text>x</Text></Subtitle></DCSubtitle>")
            .unwrap();
        let result = parse_subtitle_nodes(&doc, &ParseContext {
            tcr: 250,
            image_resolver: None,
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_image_reference() {
        let resolver = |reference: &str| {
            (reference == "sub.png").then(|| vec![1u8, 2, 3])
        };
        let doc = parse_string(concat!(
            "<DCSubtitle>",
            "<Subtitle TimeIn=\"00:00:01:000\" TimeOut=\"00:00:02:000\">",
            "<Image Valign=\"bottom\" Vposition=\"20\">sub.png</Image>",
            "</Subtitle>",
            "</DCSubtitle>",
        ))
        .unwrap();
        let subtitles = parse_subtitle_nodes(&doc, &ParseContext {
            tcr: 250,
            image_resolver: Some(&resolver),
        })
        .unwrap();

        let Subtitle::Image(image) = &subtitles[0] else {
            panic!()
        };
        assert_eq!(image.id, "sub");
        assert_eq!(image.png, vec![1, 2, 3]);
    }
}
