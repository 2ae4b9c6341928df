//! Reels and the reel-asset references inside a CPL.
//!
//! A reel never owns its assets: each entry carries the asset's id plus
//! the timing fields the CPL declares for it, and a [`Ref`] that may or
//! may not have been resolved against the package's asset pool. Unresolved
//! references are legal; version files point at assets they do not ship.

use crate::asset::Asset;
use crate::equality::{EqualityOptions, NoteHandler, NoteKind};
use crate::kdm::DecryptedKdmKey;
use dcpack_core::{
    ids_equal, make_uuid, remove_urn_uuid, Fraction, Marker, Result, Standard, Time,
};
use dcpack_xml::Element;
use std::collections::BTreeMap;
use std::sync::Arc;

const MSP_INTEROP_NS: &str = "http://www.digicine.com/schemas/437-Y/2007/Main-Stereo-Picture-CPL.xsd";
const MSP_SMPTE_NS: &str = "http://www.smpte-ra.org/schemas/429-10/2008/Main-Stereo-Picture-CPL";
const CC_INTEROP_NS: &str = "http://www.digicine.com/PROTO-ASDCP-CC-CPL-20070926#";
const CC_SMPTE_NS: &str = "http://www.smpte-ra.org/schemas/429-12/2008/TT#";
const ATMOS_NS: &str = "http://www.dolby.com/schemas/2012/AD";

/// A lazy pointer to an asset: always an id, sometimes a handle.
#[derive(Debug, Clone)]
pub struct Ref {
    id: String,
    asset: Option<Arc<Asset>>,
}

impl Ref {
    /// A reference that has not been resolved.
    pub fn unresolved(id: impl Into<String>) -> Self {
        Ref {
            id: id.into(),
            asset: None,
        }
    }

    /// A reference created directly from an asset.
    pub fn resolved(asset: Arc<Asset>) -> Self {
        Ref {
            id: asset.id().to_string(),
            asset: Some(asset),
        }
    }

    /// The referenced id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether the reference has been resolved.
    pub fn is_resolved(&self) -> bool {
        self.asset.is_some()
    }

    /// The asset, if resolved.
    pub fn asset(&self) -> Option<&Arc<Asset>> {
        self.asset.as_ref()
    }

    /// Try to resolve against a pool of assets; ids compare
    /// case-insensitively.
    pub fn resolve(&mut self, pool: &[Arc<Asset>]) -> bool {
        if self.asset.is_some() {
            return true;
        }
        if let Some(found) = pool.iter().find(|a| ids_equal(a.id(), &self.id)) {
            self.asset = Some(found.clone());
            return true;
        }
        false
    }
}

/// The fields every reel-asset entry carries.
#[derive(Debug, Clone)]
pub struct ReelAssetData {
    /// Reference to the underlying asset.
    pub asset: Ref,
    /// Optional annotation; empty annotations are never written.
    pub annotation_text: Option<String>,
    /// Edit rate declared in the CPL.
    pub edit_rate: Fraction,
    /// Total edit units in the underlying asset.
    pub intrinsic_duration: i64,
    /// First edit unit to present.
    pub entry_point: Option<i64>,
    /// Number of edit units to present.
    pub duration: Option<i64>,
    /// Base64 SHA-1 matching the PKL entry.
    pub hash: Option<String>,
    /// Content-key id for encrypted essence.
    pub key_id: Option<String>,
}

impl ReelAssetData {
    /// Build an entry for an asset, presenting it from `entry_point` to
    /// its end.
    pub fn from_asset(asset: &Arc<Asset>, entry_point: i64) -> Self {
        let intrinsic = asset.intrinsic_duration().unwrap_or(0);
        ReelAssetData {
            annotation_text: None,
            edit_rate: asset.edit_rate().unwrap_or(Fraction::new(24, 1)),
            intrinsic_duration: intrinsic,
            entry_point: Some(entry_point),
            duration: Some(intrinsic - entry_point),
            hash: None,
            key_id: asset.key_id().map(str::to_string),
            asset: Ref::resolved(asset.clone()),
        }
    }

    /// The referenced asset id.
    pub fn id(&self) -> &str {
        self.asset.id()
    }

    /// Duration actually presented: the declared duration, or whatever
    /// remains after the entry point.
    pub fn actual_duration(&self) -> i64 {
        match self.duration {
            Some(duration) => duration,
            None => self.intrinsic_duration - self.entry_point.unwrap_or(0),
        }
    }

    /// Fill the hash from the resolved asset if it is not already known.
    pub fn prepare_hash(&mut self) -> Result<()> {
        if self.hash.is_none() {
            if let Some(asset) = self.asset.asset() {
                if asset.file().is_some() {
                    self.hash = Some(asset.hash(None)?);
                }
            }
        }
        Ok(())
    }

    fn from_element(element: &Element) -> Result<Self> {
        Ok(ReelAssetData {
            asset: Ref::unresolved(remove_urn_uuid(&element.string_child("Id")?)),
            annotation_text: element.optional_string_child("AnnotationText"),
            edit_rate: element.string_child("EditRate")?.parse()?,
            intrinsic_duration: element.number_child("IntrinsicDuration")?,
            entry_point: element.optional_number_child("EntryPoint")?,
            duration: element.optional_number_child("Duration")?,
            hash: element.optional_string_child("Hash"),
            key_id: element
                .optional_string_child("KeyId")
                .map(|k| remove_urn_uuid(&k)),
        })
    }

    /// Serialise the shared children into `node`, in schema order.
    /// `KeyId` goes immediately before `Hash`.
    fn write_into(&self, node: &mut Element) {
        node.add_text_child("Id", format!("urn:uuid:{}", self.asset.id()));
        // Empty <AnnotationText> tags cause refusal to play on some
        // playback systems.
        if let Some(annotation) = &self.annotation_text {
            if !annotation.is_empty() {
                node.add_text_child("AnnotationText", annotation);
            }
        }
        node.add_text_child("EditRate", self.edit_rate.as_string());
        node.add_text_child("IntrinsicDuration", self.intrinsic_duration.to_string());
        if let Some(entry_point) = self.entry_point {
            node.add_text_child("EntryPoint", entry_point.to_string());
        }
        if let Some(duration) = self.duration {
            node.add_text_child("Duration", duration.to_string());
        }
        if let Some(hash) = &self.hash {
            node.add_text_child("Hash", hash);
        }
        if let Some(key_id) = &self.key_id {
            node.insert_child_before("Hash", {
                let mut e = Element::new("KeyId");
                e.add_text(format!("urn:uuid:{key_id}"));
                e
            });
        }
    }

    fn equals(
        &self,
        other: &Self,
        options: &EqualityOptions,
        note: &mut dyn FnMut(NoteKind, &str),
        label: &str,
    ) -> bool {
        if self.annotation_text != other.annotation_text {
            let message = format!("Reel {label}: annotation texts differ");
            if options.reel_annotation_texts_can_differ {
                note(NoteKind::Note, &message);
            } else {
                note(NoteKind::Error, &message);
                return false;
            }
        }
        if self.edit_rate != other.edit_rate {
            note(NoteKind::Error, &format!("Reel {label}: edit rates differ"));
            return false;
        }
        if self.intrinsic_duration != other.intrinsic_duration {
            note(
                NoteKind::Error,
                &format!(
                    "Reel {label}: intrinsic durations differ ({} vs {})",
                    self.intrinsic_duration, other.intrinsic_duration
                ),
            );
            return false;
        }
        if self.entry_point != other.entry_point {
            note(NoteKind::Error, &format!("Reel {label}: entry points differ"));
            return false;
        }
        if self.duration != other.duration {
            note(NoteKind::Error, &format!("Reel {label}: durations differ"));
            return false;
        }
        if self.hash != other.hash && !options.reel_hashes_can_differ {
            note(NoteKind::Error, &format!("Reel {label}: hashes differ"));
            return false;
        }
        if self.key_id != other.key_id {
            note(NoteKind::Error, &format!("Reel {label}: key ids differ"));
            return false;
        }

        // When both sides are resolved to files, the actual bytes must
        // agree too.
        if let (Some(a), Some(b)) = (self.asset.asset(), other.asset.asset()) {
            if a.file().is_some() && b.file().is_some() {
                if let (Ok(hash_a), Ok(hash_b)) = (a.hash(None), b.hash(None)) {
                    if hash_a != hash_b {
                        note(
                            NoteKind::Error,
                            &format!("Reel {label}: asset content hashes differ"),
                        );
                        return false;
                    }
                }
            }
        }
        true
    }
}

/// A main picture (or stereoscopic picture) entry.
#[derive(Debug, Clone)]
pub struct ReelPicture {
    pub data: ReelAssetData,
    /// Whether this is a stereoscopic track.
    pub stereoscopic: bool,
    /// Frame rate as presented.
    pub frame_rate: Fraction,
    /// Screen aspect ratio; written as a rational under SMPTE and as a
    /// decimal under Interop.
    pub screen_aspect_ratio: Option<Fraction>,
}

impl ReelPicture {
    /// Build from a picture asset.
    pub fn from_asset(asset: &Arc<Asset>, entry_point: i64) -> Self {
        let data = ReelAssetData::from_asset(asset, entry_point);
        let stereoscopic = matches!(**asset, Asset::StereoPicture(_));
        let screen_aspect_ratio = match &**asset {
            Asset::MonoPicture(p) | Asset::StereoPicture(p) if p.size.height > 0 => Some(
                Fraction::new(p.size.width as i64, p.size.height as i64),
            ),
            _ => None,
        };
        ReelPicture {
            frame_rate: data.edit_rate,
            data,
            stereoscopic,
            screen_aspect_ratio,
        }
    }

    fn write_to_cpl(&self, standard: Standard) -> Element {
        let mut node = if self.stereoscopic {
            let ns = match standard {
                Standard::Interop => MSP_INTEROP_NS,
                Standard::Smpte => MSP_SMPTE_NS,
            };
            let mut e = Element::prefixed("msp-cpl", "MainStereoscopicPicture", ns);
            e.declare_namespace(Some("msp-cpl"), ns);
            e
        } else {
            Element::new("MainPicture")
        };
        self.data.write_into(&mut node);
        node.add_text_child("FrameRate", self.frame_rate.as_string());
        if let Some(ratio) = self.screen_aspect_ratio {
            let text = match standard {
                Standard::Smpte => ratio.as_string(),
                Standard::Interop => format!("{:.2}", ratio.as_f64()),
            };
            node.add_text_child("ScreenAspectRatio", text);
        }
        node
    }

    fn from_element(element: &Element, stereoscopic: bool) -> Result<Self> {
        let data = ReelAssetData::from_element(element)?;
        let frame_rate = element
            .optional_string_child("FrameRate")
            .map(|s| s.parse())
            .transpose()?
            .unwrap_or(data.edit_rate);
        let screen_aspect_ratio = element
            .optional_string_child("ScreenAspectRatio")
            .and_then(|s| parse_aspect_ratio(&s));
        Ok(ReelPicture {
            data,
            stereoscopic,
            frame_rate,
            screen_aspect_ratio,
        })
    }
}

fn parse_aspect_ratio(text: &str) -> Option<Fraction> {
    if text.contains(' ') {
        text.parse().ok()
    } else {
        let ratio: f64 = text.trim().parse().ok()?;
        Some(Fraction::new((ratio * 100.0).round() as i64, 100))
    }
}

/// A main sound entry.
#[derive(Debug, Clone)]
pub struct ReelSound {
    pub data: ReelAssetData,
}

impl ReelSound {
    /// Build from a sound asset.
    pub fn from_asset(asset: &Arc<Asset>, entry_point: i64) -> Self {
        ReelSound {
            data: ReelAssetData::from_asset(asset, entry_point),
        }
    }
}

/// A main subtitle or closed caption entry.
#[derive(Debug, Clone)]
pub struct ReelSubtitle {
    pub data: ReelAssetData,
    /// Language of the track, as declared in the reel.
    pub language: Option<String>,
}

impl ReelSubtitle {
    /// Build from a subtitle asset.
    pub fn from_asset(asset: &Arc<Asset>, entry_point: i64) -> Self {
        let language = match &**asset {
            Asset::SmpteSubtitle(s) => s.language.clone(),
            _ => None,
        };
        ReelSubtitle {
            data: ReelAssetData::from_asset(asset, entry_point),
            language,
        }
    }

    fn write_to_cpl(&self, node_name: &str, standard: Standard) -> Element {
        let mut node = if node_name == "MainClosedCaption" {
            let ns = match standard {
                Standard::Interop => CC_INTEROP_NS,
                Standard::Smpte => CC_SMPTE_NS,
            };
            let mut e = Element::prefixed("cc-cpl", node_name, ns);
            e.declare_namespace(Some("cc-cpl"), ns);
            e
        } else {
            Element::new(node_name)
        };
        self.data.write_into(&mut node);
        if let Some(language) = &self.language {
            node.add_text_child("Language", language);
        }
        node
    }

    fn from_element(element: &Element) -> Result<Self> {
        Ok(ReelSubtitle {
            data: ReelAssetData::from_element(element)?,
            language: element.optional_string_child("Language"),
        })
    }
}

/// An Atmos (auxiliary data) entry.
#[derive(Debug, Clone)]
pub struct ReelAtmos {
    pub data: ReelAssetData,
}

impl ReelAtmos {
    /// Build from an Atmos asset.
    pub fn from_asset(asset: &Arc<Asset>, entry_point: i64) -> Self {
        ReelAtmos {
            data: ReelAssetData::from_asset(asset, entry_point),
        }
    }
}

/// The markers track of a reel.
#[derive(Debug, Clone, PartialEq)]
pub struct ReelMarkers {
    /// The track's own UUID.
    pub id: String,
    /// Edit rate the offsets are expressed in.
    pub edit_rate: Fraction,
    /// Total edit units covered.
    pub intrinsic_duration: i64,
    /// The markers, as offsets from the start of the reel.
    pub markers: BTreeMap<Marker, Time>,
}

impl ReelMarkers {
    /// An empty markers track.
    pub fn new(edit_rate: Fraction, intrinsic_duration: i64) -> Self {
        ReelMarkers {
            id: make_uuid(),
            edit_rate,
            intrinsic_duration,
            markers: BTreeMap::new(),
        }
    }

    /// Set a marker at an offset.
    pub fn set(&mut self, marker: Marker, time: Time) {
        self.markers.insert(marker, time);
    }

    /// The offset of a marker, if set.
    pub fn get(&self, marker: Marker) -> Option<&Time> {
        self.markers.get(&marker)
    }

    fn rate(&self) -> i64 {
        (self.edit_rate.numerator / self.edit_rate.denominator).max(1)
    }

    fn write_to_cpl(&self) -> Element {
        let mut node = Element::new("MainMarkers");
        node.add_text_child("Id", format!("urn:uuid:{}", self.id));
        node.add_text_child("EditRate", self.edit_rate.as_string());
        node.add_text_child("IntrinsicDuration", self.intrinsic_duration.to_string());
        let list = node.add_child(Element::new("MarkerList"));
        for (marker, time) in &self.markers {
            let entry = list.add_child(Element::new("Marker"));
            entry.add_text_child("Label", marker.as_str());
            entry.add_text_child("Offset", time.as_editable_units(self.rate()).to_string());
        }
        node
    }

    fn from_element(element: &Element) -> Result<Self> {
        let edit_rate: Fraction = element.string_child("EditRate")?.parse()?;
        let mut markers = ReelMarkers {
            id: remove_urn_uuid(&element.string_child("Id")?),
            edit_rate,
            intrinsic_duration: element.number_child("IntrinsicDuration")?,
            markers: BTreeMap::new(),
        };
        if let Some(list) = element.child("MarkerList") {
            for entry in list.children_named("Marker") {
                let label: Marker = entry.string_child("Label")?.trim().parse()?;
                let offset: i64 = entry.number_child("Offset")?;
                markers
                    .markers
                    .insert(label, Time::from_editable_units(offset, markers.rate()));
            }
        }
        Ok(markers)
    }
}

/// One reel of a composition.
#[derive(Debug, Clone, Default)]
pub struct Reel {
    /// The reel's UUID.
    pub id: String,
    /// Optional annotation.
    pub annotation_text: Option<String>,
    /// The main picture track.
    pub main_picture: Option<ReelPicture>,
    /// The main sound track.
    pub main_sound: Option<ReelSound>,
    /// The main subtitle track.
    pub main_subtitle: Option<ReelSubtitle>,
    /// Closed caption tracks.
    pub closed_captions: Vec<ReelSubtitle>,
    /// The Atmos track.
    pub atmos: Option<ReelAtmos>,
    /// The markers track.
    pub main_markers: Option<ReelMarkers>,
}

impl Reel {
    /// An empty reel with a fresh id.
    pub fn new() -> Self {
        Reel {
            id: make_uuid(),
            ..Default::default()
        }
    }

    /// Every reel-asset entry, in CPL order.
    pub fn assets(&self) -> Vec<&ReelAssetData> {
        let mut out = Vec::new();
        if let Some(p) = &self.main_picture {
            out.push(&p.data);
        }
        if let Some(s) = &self.main_sound {
            out.push(&s.data);
        }
        if let Some(s) = &self.main_subtitle {
            out.push(&s.data);
        }
        for c in &self.closed_captions {
            out.push(&c.data);
        }
        if let Some(a) = &self.atmos {
            out.push(&a.data);
        }
        out
    }

    fn assets_mut(&mut self) -> Vec<&mut ReelAssetData> {
        let mut out = Vec::new();
        if let Some(p) = &mut self.main_picture {
            out.push(&mut p.data);
        }
        if let Some(s) = &mut self.main_sound {
            out.push(&mut s.data);
        }
        if let Some(s) = &mut self.main_subtitle {
            out.push(&mut s.data);
        }
        for c in &mut self.closed_captions {
            out.push(&mut c.data);
        }
        if let Some(a) = &mut self.atmos {
            out.push(&mut a.data);
        }
        out
    }

    /// Resolve every unresolved reference against the pool.
    pub fn resolve_refs(&mut self, pool: &[Arc<Asset>]) {
        for data in self.assets_mut() {
            data.asset.resolve(pool);
        }
    }

    /// Fill in missing hashes from resolved assets.
    pub fn prepare_hashes(&mut self) -> Result<()> {
        for data in self.assets_mut() {
            data.prepare_hash()?;
        }
        Ok(())
    }

    /// Whether any entry refers to encrypted essence.
    pub fn encrypted(&self) -> bool {
        self.assets().iter().any(|data| data.key_id.is_some())
    }

    /// Attach any matching decrypted keys to this reel's assets.
    pub fn add_kdm_keys(&mut self, keys: &[DecryptedKdmKey]) {
        for data in self.assets_mut() {
            let Some(key_id) = data.key_id.clone() else {
                continue;
            };
            let Some(key) = keys.iter().find(|k| ids_equal(&k.key_id, &key_id)) else {
                continue;
            };
            if let Some(asset) = data.asset.asset() {
                asset.attach_content_key(key.key);
            }
        }
    }

    /// The presented duration of the reel.
    pub fn duration(&self) -> i64 {
        if let Some(picture) = &self.main_picture {
            return picture.data.actual_duration();
        }
        self.assets()
            .iter()
            .map(|data| data.actual_duration())
            .max()
            .unwrap_or(0)
    }

    /// Serialise this reel. `first_asset` is prepended to the asset list
    /// (the SMPTE composition metadata rides in the first reel).
    pub fn write_to_cpl(&self, standard: Standard, first_asset: Option<Element>) -> Element {
        let mut node = Element::new("Reel");
        node.add_text_child("Id", format!("urn:uuid:{}", self.id));
        if let Some(annotation) = &self.annotation_text {
            if !annotation.is_empty() {
                node.add_text_child("AnnotationText", annotation);
            }
        }
        let list = node.add_child(Element::new("AssetList"));
        if let Some(extra) = first_asset {
            list.add_child(extra);
        }
        if let Some(picture) = &self.main_picture {
            list.add_child(picture.write_to_cpl(standard));
        }
        if let Some(sound) = &self.main_sound {
            let mut e = Element::new("MainSound");
            sound.data.write_into(&mut e);
            list.add_child(e);
        }
        if let Some(subtitle) = &self.main_subtitle {
            list.add_child(subtitle.write_to_cpl("MainSubtitle", standard));
        }
        if let Some(markers) = &self.main_markers {
            list.add_child(markers.write_to_cpl());
        }
        for caption in &self.closed_captions {
            list.add_child(caption.write_to_cpl("MainClosedCaption", standard));
        }
        if let Some(atmos) = &self.atmos {
            let mut e = Element::prefixed("axd-cpl", "AuxData", ATMOS_NS);
            e.declare_namespace(Some("axd-cpl"), ATMOS_NS);
            atmos.data.write_into(&mut e);
            list.add_child(e);
        }
        node
    }

    /// Parse a `<Reel>` element.
    pub fn from_element(element: &Element) -> Result<Self> {
        let mut reel = Reel {
            id: remove_urn_uuid(&element.string_child("Id")?),
            annotation_text: element.optional_string_child("AnnotationText"),
            ..Default::default()
        };

        let Some(list) = element.child("AssetList") else {
            return Ok(reel);
        };
        for entry in list.elements() {
            match entry.name.as_str() {
                "MainPicture" => {
                    reel.main_picture = Some(ReelPicture::from_element(entry, false)?);
                }
                "MainStereoscopicPicture" => {
                    reel.main_picture = Some(ReelPicture::from_element(entry, true)?);
                }
                "MainSound" => {
                    reel.main_sound = Some(ReelSound {
                        data: ReelAssetData::from_element(entry)?,
                    });
                }
                "MainSubtitle" => {
                    reel.main_subtitle = Some(ReelSubtitle::from_element(entry)?);
                }
                "MainClosedCaption" | "ClosedCaption" => {
                    reel.closed_captions.push(ReelSubtitle::from_element(entry)?);
                }
                "AuxData" => {
                    reel.atmos = Some(ReelAtmos {
                        data: ReelAssetData::from_element(entry)?,
                    });
                }
                "MainMarkers" => {
                    reel.main_markers = Some(ReelMarkers::from_element(entry)?);
                }
                // CompositionMetadataAsset is handled by the CPL reader.
                _ => {}
            }
        }
        Ok(reel)
    }

    /// Compare two reels.
    pub fn equals(
        &self,
        other: &Reel,
        options: &EqualityOptions,
        note: NoteHandler,
    ) -> bool {
        let pairs: [(&str, Option<&ReelAssetData>, Option<&ReelAssetData>); 4] = [
            (
                "MainPicture",
                self.main_picture.as_ref().map(|a| &a.data),
                other.main_picture.as_ref().map(|a| &a.data),
            ),
            (
                "MainSound",
                self.main_sound.as_ref().map(|a| &a.data),
                other.main_sound.as_ref().map(|a| &a.data),
            ),
            (
                "MainSubtitle",
                self.main_subtitle.as_ref().map(|a| &a.data),
                other.main_subtitle.as_ref().map(|a| &a.data),
            ),
            (
                "AuxData",
                self.atmos.as_ref().map(|a| &a.data),
                other.atmos.as_ref().map(|a| &a.data),
            ),
        ];

        for (label, mine, theirs) in pairs {
            match (mine, theirs) {
                (None, None) => {}
                (Some(a), Some(b)) => {
                    if !a.equals(b, options, &mut *note, label) {
                        return false;
                    }
                }
                _ => {
                    note(NoteKind::Error, &format!("Reel {label}: presence differs"));
                    return false;
                }
            }
        }

        if self.closed_captions.len() != other.closed_captions.len() {
            note(NoteKind::Error, "Reel: closed caption counts differ");
            return false;
        }
        for (a, b) in self.closed_captions.iter().zip(&other.closed_captions) {
            if !a.data.equals(&b.data, options, &mut *note, "MainClosedCaption") {
                return false;
            }
        }

        // Marker tracks compare by content; their generated ids do not
        // matter.
        let markers_equal = match (&self.main_markers, &other.main_markers) {
            (None, None) => true,
            (Some(a), Some(b)) => {
                a.edit_rate == b.edit_rate
                    && a.intrinsic_duration == b.intrinsic_duration
                    && a.markers == b.markers
            }
            _ => false,
        };
        if !markers_equal {
            note(NoteKind::Error, "Reel: markers differ");
            return false;
        }

        // Subtitle content compares deeply when both sides are resolved.
        if let (Some(a), Some(b)) = (&self.main_subtitle, &other.main_subtitle) {
            if let (Some(asset_a), Some(asset_b)) = (a.data.asset.asset(), b.data.asset.asset()) {
                if !subtitle_content_equals(asset_a, asset_b) {
                    note(NoteKind::Error, "Reel MainSubtitle: content differs");
                    return false;
                }
            }
        }

        true
    }
}

fn subtitle_content_equals(a: &Asset, b: &Asset) -> bool {
    match (a, b) {
        (Asset::SmpteSubtitle(x), Asset::SmpteSubtitle(y)) => {
            x.subtitles == y.subtitles && x.language == y.language
        }
        (Asset::InteropSubtitle(x), Asset::InteropSubtitle(y)) => {
            x.subtitles == y.subtitles && x.language == y.language
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dcpack_xml::{element_to_string, parse_string};
    use std::path::Path;

    fn sample_data(id: &str) -> ReelAssetData {
        ReelAssetData {
            asset: Ref::unresolved(id),
            annotation_text: None,
            edit_rate: Fraction::new(24, 1),
            intrinsic_duration: 240,
            entry_point: Some(0),
            duration: Some(240),
            hash: Some("aGFzaA==".to_string()),
            key_id: None,
        }
    }

    #[test]
    fn test_key_id_written_before_hash() {
        let mut data = sample_data("5ab6e7ae-0c1a-4e10-bb32-31e0b7e4c3f1");
        data.key_id = Some("be1a1b3e-7e2c-44a0-bf63-06c92c8472be".to_string());

        let mut node = Element::new("MainSound");
        data.write_into(&mut node);
        let xml = element_to_string(&node);

        let key_at = xml.find("<KeyId>").unwrap();
        let hash_at = xml.find("<Hash>").unwrap();
        assert!(key_at < hash_at, "{xml}");
    }

    #[test]
    fn test_empty_annotation_omitted() {
        let mut data = sample_data("5ab6e7ae-0c1a-4e10-bb32-31e0b7e4c3f1");
        data.annotation_text = Some(String::new());

        let mut node = Element::new("MainSound");
        data.write_into(&mut node);
        assert!(!element_to_string(&node).contains("AnnotationText"));
    }

    #[test]
    fn test_round_trip_entry() {
        let data = sample_data("5ab6e7ae-0c1a-4e10-bb32-31e0b7e4c3f1");
        let mut node = Element::new("MainSound");
        data.write_into(&mut node);

        let parsed = parse_string(&element_to_string(&node)).unwrap();
        let read = ReelAssetData::from_element(&parsed).unwrap();
        assert_eq!(read.id(), data.id());
        assert_eq!(read.edit_rate, data.edit_rate);
        assert_eq!(read.intrinsic_duration, 240);
        assert_eq!(read.entry_point, Some(0));
        assert_eq!(read.duration, Some(240));
        assert_eq!(read.hash.as_deref(), Some("aGFzaA=="));
    }

    #[test]
    fn test_actual_duration() {
        let mut data = sample_data("x");
        assert_eq!(data.actual_duration(), 240);
        data.duration = None;
        data.entry_point = Some(24);
        assert_eq!(data.actual_duration(), 216);
    }

    #[test]
    fn test_markers_round_trip() {
        let mut markers = ReelMarkers::new(Fraction::new(24, 1), 240);
        markers.set(Marker::Ffoc, Time::from_editable_units(1, 24));
        markers.set(Marker::Lfoc, Time::from_editable_units(239, 24));

        let node = markers.write_to_cpl();
        let parsed = parse_string(&element_to_string(&node)).unwrap();
        let read = ReelMarkers::from_element(&parsed).unwrap();
        assert_eq!(read, markers);
        assert_eq!(
            read.get(Marker::Lfoc).unwrap().as_editable_units(24),
            239
        );
    }

    #[test]
    fn test_ref_resolution() {
        let mut reference = Ref::unresolved("ABC-123");
        assert!(!reference.is_resolved());
        assert!(!reference.resolve(&[]));

        // Resolution is case-insensitive on ids.
        let asset = Arc::new(Asset::Font(crate::font::FontAsset::new(
            "abc-123",
            Path::new("font.ttf"),
        )));
        assert!(reference.resolve(&[asset]));
        assert!(reference.is_resolved());
    }
}
