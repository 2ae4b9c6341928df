//! Serialising the flat subtitle model back to XML.
//!
//! Entries are grouped into `<Subtitle>` spots by identical timing and,
//! within each spot, into `<Text>` elements by identical placement. Text
//! groups are emitted in increasing on-screen vertical order, and the
//! longest common stylistic prefix of a spot is factored out onto an
//! enclosing `<Font>`, leaving only differing attributes on inner
//! wrappers.

use crate::subtitle::{Subtitle, SubtitleImage, SubtitleStyle, SubtitleText};
use dcpack_core::{Direction, HAlign, Standard, Time, VAlign};
use dcpack_xml::Element;

/// Serialise subtitles as the child nodes of a subtitle list.
pub fn subtitles_to_nodes(subtitles: &[Subtitle], tcr: i64, standard: Standard) -> Vec<Element> {
    let mut spots: Vec<(Vec<&Subtitle>, (Time, Time, Time, Time))> = Vec::new();
    for subtitle in subtitles {
        let key = subtitle.placement().spot_key();
        match spots.iter_mut().find(|(_, k)| *k == key) {
            Some((group, _)) => group.push(subtitle),
            None => spots.push((vec![subtitle], key)),
        }
    }

    let mut out = Vec::new();
    for (spot_number, (group, _)) in spots.iter().enumerate() {
        out.push(spot_to_node(group, spot_number as i64 + 1, tcr, standard));
    }
    out
}

fn spot_to_node(
    group: &[&Subtitle],
    spot_number: i64,
    tcr: i64,
    standard: Standard,
) -> Element {
    let first = group[0].placement();

    let mut subtitle_node = Element::new("Subtitle");
    subtitle_node.set_attribute("SpotNumber", &spot_number.to_string());
    subtitle_node.set_attribute("TimeIn", &format_time(first.in_time, tcr));
    subtitle_node.set_attribute("TimeOut", &format_time(first.out_time, tcr));
    subtitle_node.set_attribute("FadeUpTime", &format_time(first.fade_up, tcr));
    subtitle_node.set_attribute("FadeDownTime", &format_time(first.fade_down, tcr));

    // Placement groups in first-appearance order, then sorted into
    // on-screen vertical order.
    let mut texts: Vec<Vec<&Subtitle>> = Vec::new();
    for subtitle in group {
        if matches!(subtitle, Subtitle::Image(_)) {
            // Images never merge into a shared element.
            texts.push(vec![subtitle]);
            continue;
        }
        let key = subtitle.placement().text_key();
        match texts
            .iter_mut()
            .find(|g| matches!(g[0], Subtitle::Text(_)) && g[0].placement().text_key() == key)
        {
            Some(g) => g.push(subtitle),
            None => texts.push(vec![subtitle]),
        }
    }
    texts.sort_by(|a, b| {
        screen_position(a[0])
            .partial_cmp(&screen_position(b[0]))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let common = common_style(group);

    for text_group in &texts {
        match text_group[0] {
            Subtitle::Text(_) => {
                let mut text_node = Element::new("Text");
                set_placement_attributes(&mut text_node, text_group[0]);
                for subtitle in text_group {
                    let Subtitle::Text(text) = subtitle else {
                        continue;
                    };
                    append_run(&mut text_node, text, &common);
                }
                subtitle_node.add_child(text_node);
            }
            Subtitle::Image(image) => {
                let mut image_node = Element::new("Image");
                set_placement_attributes(&mut image_node, text_group[0]);
                image_node.add_text(image_reference(image, standard));
                subtitle_node.add_child(image_node);
            }
        }
    }

    // Factor the common style out onto an enclosing <Font>, unless there
    // is nothing to say.
    let mut font_node = Element::new("Font");
    set_style_attributes(&mut font_node, &common, &SubtitleStyle::default());
    if font_node.attributes.is_empty() {
        subtitle_node
    } else {
        font_node.add_child(subtitle_node);
        font_node
    }
}

fn append_run(text_node: &mut Element, text: &SubtitleText, common: &SubtitleStyle) {
    if text.space_before != 0.0 {
        let mut space = Element::new("Space");
        space.set_attribute("Size", &format_float(text.space_before));
        text_node.add_child(space);
    }

    let mut wrapper = Element::new("Font");
    set_style_attributes(&mut wrapper, &text.style, common);
    if wrapper.attributes.is_empty() {
        text_node.add_text(text.text.clone());
    } else {
        wrapper.add_text(text.text.clone());
        text_node.add_child(wrapper);
    }
}

/// The style every text entry of a spot agrees on; fields they disagree on
/// fall back to the defaults so inner wrappers restate them.
fn common_style(group: &[&Subtitle]) -> SubtitleStyle {
    let mut styles = group.iter().filter_map(|s| match s {
        Subtitle::Text(t) => Some(&t.style),
        Subtitle::Image(_) => None,
    });
    let Some(first) = styles.next() else {
        return SubtitleStyle::default();
    };
    let mut common = first.clone();
    let defaults = SubtitleStyle::default();
    for style in styles {
        if style.font_id != common.font_id {
            common.font_id = defaults.font_id.clone();
        }
        if style.size != common.size {
            common.size = defaults.size;
        }
        if style.aspect_adjust != common.aspect_adjust {
            common.aspect_adjust = defaults.aspect_adjust;
        }
        if style.italic != common.italic {
            common.italic = defaults.italic;
        }
        if style.bold != common.bold {
            common.bold = defaults.bold;
        }
        if style.underline != common.underline {
            common.underline = defaults.underline;
        }
        if style.colour != common.colour {
            common.colour = defaults.colour;
        }
        if style.effect != common.effect {
            common.effect = defaults.effect;
        }
        if style.effect_colour != common.effect_colour {
            common.effect_colour = defaults.effect_colour;
        }
    }
    common
}

/// Write the attributes of `style` that differ from `base`.
fn set_style_attributes(node: &mut Element, style: &SubtitleStyle, base: &SubtitleStyle) {
    if style.font_id != base.font_id {
        if let Some(id) = &style.font_id {
            node.set_attribute("Id", id);
        }
    }
    if style.size != base.size {
        node.set_attribute("Size", &style.size.to_string());
    }
    if style.aspect_adjust != base.aspect_adjust {
        node.set_attribute("AspectAdjust", &format_float(style.aspect_adjust));
    }
    if style.italic != base.italic {
        node.set_attribute("Italic", if style.italic { "yes" } else { "no" });
    }
    if style.bold != base.bold {
        node.set_attribute("Bold", if style.bold { "yes" } else { "no" });
    }
    if style.underline != base.underline {
        node.set_attribute("Underline", if style.underline { "yes" } else { "no" });
    }
    if style.colour != base.colour {
        node.set_attribute("Color", &style.colour.as_argb_string());
    }
    if style.effect != base.effect {
        node.set_attribute("Effect", style.effect.as_str());
    }
    if style.effect_colour != base.effect_colour {
        node.set_attribute("EffectColor", &style.effect_colour.as_argb_string());
    }
}

fn set_placement_attributes(node: &mut Element, subtitle: &Subtitle) {
    let placement = subtitle.placement();
    if placement.v_align != VAlign::Center {
        node.set_attribute("Valign", placement.v_align.as_str());
    }
    if placement.v_position != 0.0 {
        node.set_attribute("Vposition", &format_percent(placement.v_position));
    }
    if placement.h_align != HAlign::Center {
        node.set_attribute("Halign", placement.h_align.as_str());
    }
    if placement.h_position != 0.0 {
        node.set_attribute("Hposition", &format_percent(placement.h_position));
    }
    if placement.z_position != 0.0 {
        node.set_attribute("Zposition", &format_percent(placement.z_position));
    }
    if placement.direction != Direction::Ltr {
        node.set_attribute("Direction", placement.direction.as_str());
    }
}

fn image_reference(image: &SubtitleImage, standard: Standard) -> String {
    match standard {
        Standard::Interop => format!("{}.png", image.id),
        Standard::Smpte => format!("urn:uuid:{}", image.id),
    }
}

/// Vertical position on screen, 0 at the top to 1 at the bottom.
fn screen_position(subtitle: &Subtitle) -> f32 {
    let placement = subtitle.placement();
    match placement.v_align {
        VAlign::Top => placement.v_position,
        VAlign::Center => 0.5 + placement.v_position,
        VAlign::Bottom => 1.0 - placement.v_position,
    }
}

fn format_time(time: Time, tcr: i64) -> String {
    let t = time.rebase(tcr);
    let width = if tcr > 99 { 3 } else { 2 };
    format!(
        "{:02}:{:02}:{:02}:{:0width$}",
        t.h,
        t.m,
        t.s,
        t.e,
        width = width
    )
}

fn format_percent(fraction: f32) -> String {
    format_float(fraction * 100.0)
}

fn format_float(value: f32) -> String {
    if (value - value.round()).abs() < 1e-4 {
        format!("{}", value.round() as i64)
    } else {
        let formatted = format!("{value:.4}");
        formatted
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subtitle::{parse_subtitle_nodes, ParseContext, SubtitlePlacement};
    use dcpack_xml::element_to_string;

    fn text_subtitle(
        v_align: VAlign,
        v_position: f32,
        text: &str,
        in_s: i64,
        out_s: i64,
    ) -> Subtitle {
        let mut placement = SubtitlePlacement::new(
            Time::new(0, 0, in_s, 0, 24),
            Time::new(0, 0, out_s, 0, 24),
        );
        placement.v_align = v_align;
        placement.v_position = v_position;
        Subtitle::Text(SubtitleText {
            placement,
            style: SubtitleStyle::default(),
            text: text.to_string(),
            space_before: 0.0,
        })
    }

    #[test]
    fn test_top_alignment_written_in_ascending_order() {
        // Two strings at Valign=top, Vposition 0.8 then 0.9, given in
        // reverse order.
        let subtitles = vec![
            text_subtitle(VAlign::Top, 0.9, "lower", 1, 3),
            text_subtitle(VAlign::Top, 0.8, "upper", 1, 3),
        ];
        let nodes = subtitles_to_nodes(&subtitles, 24, Standard::Smpte);
        assert_eq!(nodes.len(), 1);
        let xml = element_to_string(&nodes[0]);

        let first = xml.find("Vposition=\"80\"").unwrap();
        let second = xml.find("Vposition=\"90\"").unwrap();
        assert!(first < second, "{xml}");
    }

    #[test]
    fn test_bottom_alignment_written_in_descending_order() {
        let subtitles = vec![
            text_subtitle(VAlign::Bottom, 0.7, "lower", 1, 3),
            text_subtitle(VAlign::Bottom, 0.8, "upper", 1, 3),
        ];
        let nodes = subtitles_to_nodes(&subtitles, 24, Standard::Smpte);
        let xml = element_to_string(&nodes[0]);

        let first = xml.find("Vposition=\"80\"").unwrap();
        let second = xml.find("Vposition=\"70\"").unwrap();
        assert!(first < second, "{xml}");
    }

    #[test]
    fn test_common_style_factored_out() {
        let mut a = text_subtitle(VAlign::Bottom, 0.1, "one", 1, 3);
        let mut b = text_subtitle(VAlign::Bottom, 0.2, "two", 1, 3);
        for s in [&mut a, &mut b] {
            let Subtitle::Text(t) = s else { panic!() };
            t.style.font_id = Some("theFont".into());
            t.style.size = 39;
        }
        let Subtitle::Text(t) = &mut b else { panic!() };
        t.style.italic = true;

        let nodes = subtitles_to_nodes(&[a, b], 24, Standard::Smpte);
        let xml = element_to_string(&nodes[0]);

        // The shared attributes appear once, on the outer <Font>; only
        // the italic difference is restated inside.
        assert!(xml.starts_with("<Font Id=\"theFont\" Size=\"39\">"), "{xml}");
        assert!(xml.contains("<Font Italic=\"yes\">two</Font>"), "{xml}");
        assert!(xml.contains(">one<"), "{xml}");
    }

    #[test]
    fn test_spots_split_by_timing() {
        let subtitles = vec![
            text_subtitle(VAlign::Bottom, 0.1, "first", 1, 3),
            text_subtitle(VAlign::Bottom, 0.1, "second", 4, 6),
        ];
        let nodes = subtitles_to_nodes(&subtitles, 24, Standard::Smpte);
        assert_eq!(nodes.len(), 2);
        let first = element_to_string(&nodes[0]);
        let second = element_to_string(&nodes[1]);
        assert!(first.contains("SpotNumber=\"1\""));
        assert!(second.contains("SpotNumber=\"2\""));
    }

    #[test]
    fn test_round_trip_preserves_model() {
        let mut a = text_subtitle(VAlign::Top, 0.15, "hello", 1, 3);
        if let Subtitle::Text(t) = &mut a {
            t.style.size = 48;
            t.style.italic = true;
        }
        let b = text_subtitle(VAlign::Bottom, 0.2, "world", 4, 6);

        let originals = vec![a, b];
        let nodes = subtitles_to_nodes(&originals, 24, Standard::Smpte);

        let mut list = Element::new("SubtitleList");
        for node in nodes {
            list.add_child(node);
        }
        let reparsed = dcpack_xml::parse_string(&element_to_string(&list)).unwrap();
        let parsed = parse_subtitle_nodes(&reparsed, &ParseContext {
            tcr: 24,
            image_resolver: None,
        })
        .unwrap();

        assert_eq!(parsed, originals);
    }
}
