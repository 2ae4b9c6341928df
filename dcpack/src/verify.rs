//! Package verification.
//!
//! [`verify`] loads each package and checks it against a closed catalogue
//! of defect codes: structural XML validity, hash consistency between
//! essence, CPL and PKL, Bv2.1 picture and timed-text constraints, marker
//! presence and signature presence on encrypted content. Findings are
//! never thrown; they accumulate as [`VerificationNote`]s.

use crate::asset::Asset;
use crate::cpl::Cpl;
use crate::dcp::Dcp;
use crate::pkl::Pkl;
use crate::reel::{Reel, ReelAssetData, ReelSubtitle};
use crate::subtitle::Subtitle;
use dcpack_core::{
    make_digest, ContentKind, Error, Fraction, LanguageTag, Marker, RegionSubtag, Result, Size,
    Standard, Time, VAlign, XmlError,
};
use dcpack_xml::Element;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::info;

const UNM49_SCOPE: &str =
    "http://www.smpte-ra.org/schemas/429-16/2014/CPL-Metadata#scope/release-territory/UNM49";
const APP_SCOPE: &str = "http://isdcf.com/ns/cplmd/app";

/// Severity of a verification note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NoteSeverity {
    /// A straightforward error.
    Error,
    /// Violates a "shall" of the Bv2.1 profile; not always fatal outside
    /// that profile.
    Bv21Error,
    /// Worth looking at, not necessarily wrong.
    Warning,
}

/// The closed set of defect codes.
///
/// Names follow the pattern `<negative-adjective> <noun>`: INCORRECT for a
/// free value that is wrong, INVALID for a constrained value outside its
/// set, MISMATCHED for two things that should agree, MISSING and EMPTY for
/// absences, FAILED for verification machinery giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VerificationCode {
    FailedRead,
    MismatchedCplHashes,
    InvalidPictureFrameRate,
    IncorrectPictureHash,
    MismatchedPictureHashes,
    IncorrectSoundHash,
    MismatchedSoundHashes,
    EmptyAssetPath,
    MissingAsset,
    MismatchedStandard,
    InvalidXml,
    MissingAssetmap,
    InvalidIntrinsicDuration,
    InvalidDuration,
    InvalidPictureFrameSizeInBytes,
    NearlyInvalidPictureFrameSizeInBytes,
    ExternalAsset,
    InvalidStandard,
    InvalidLanguage,
    InvalidPictureSizeInPixels,
    InvalidPictureFrameRateFor2k,
    InvalidPictureFrameRateFor4k,
    InvalidPictureAssetResolutionFor3d,
    InvalidClosedCaptionXmlSizeInBytes,
    InvalidTimedTextSizeInBytes,
    InvalidTimedTextFontSizeInBytes,
    MissingSubtitleLanguage,
    MismatchedSubtitleLanguages,
    MissingSubtitleStartTime,
    InvalidSubtitleStartTime,
    InvalidSubtitleFirstTextTime,
    InvalidSubtitleDuration,
    InvalidSubtitleSpacing,
    InvalidSubtitleLineCount,
    NearlyInvalidSubtitleLineLength,
    InvalidSubtitleLineLength,
    InvalidClosedCaptionLineCount,
    InvalidClosedCaptionLineLength,
    InvalidSoundFrameRate,
    MissingCplAnnotationText,
    MismatchedCplAnnotationText,
    MismatchedAssetDuration,
    MissingMainSubtitleFromSomeReels,
    MismatchedClosedCaptionAssetCounts,
    MissingSubtitleEntryPoint,
    IncorrectSubtitleEntryPoint,
    MissingClosedCaptionEntryPoint,
    IncorrectClosedCaptionEntryPoint,
    MissingHash,
    MissingFfecInFeature,
    MissingFfmcInFeature,
    MissingFfoc,
    MissingLfoc,
    IncorrectFfoc,
    IncorrectLfoc,
    MissingCplMetadata,
    MissingCplMetadataVersionNumber,
    MissingExtensionMetadata,
    InvalidExtensionMetadata,
    UnsignedCplWithEncryptedContent,
    UnsignedPklWithEncryptedContent,
    MismatchedPklAnnotationTextWithCpl,
    PartiallyEncrypted,
}

/// One finding from verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationNote {
    severity: NoteSeverity,
    code: VerificationCode,
    note: Option<String>,
    file: Option<PathBuf>,
    line: Option<u64>,
}

impl VerificationNote {
    /// Create a note.
    pub fn new(severity: NoteSeverity, code: VerificationCode) -> Self {
        VerificationNote {
            severity,
            code,
            note: None,
            file: None,
            line: None,
        }
    }

    /// Attach further detail.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Attach the file the defect was found in.
    pub fn with_file(mut self, file: &Path) -> Self {
        self.file = Some(file.to_path_buf());
        self
    }

    /// Attach a line number within the file.
    pub fn with_line(mut self, line: u64) -> Self {
        self.line = Some(line);
        self
    }

    pub fn severity(&self) -> NoteSeverity {
        self.severity
    }

    pub fn code(&self) -> VerificationCode {
        self.code
    }

    pub fn note(&self) -> Option<&str> {
        self.note.as_deref()
    }

    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    pub fn line(&self) -> Option<u64> {
        self.line
    }
}

impl fmt::Display for VerificationNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", note_to_string(self))?;
        if let Some(note) = &self.note {
            write!(f, " [{note}]")?;
        }
        if let Some(file) = &self.file {
            write!(f, " [{}]", file.display())?;
        }
        if let Some(line) = self.line {
            write!(f, " [{line}]")?;
        }
        Ok(())
    }
}

/// Reports which verification stage is running, with the file involved.
pub type StageFn<'a> = &'a mut dyn FnMut(&str, Option<&Path>);
/// Reports progress 0 to 1 within a stage; return `false` to cancel.
pub type ProgressFn<'a> = &'a mut dyn FnMut(f32) -> bool;

/// Verify one or more packages. `xsd_directory` must hold the schema
/// bundle. Cancellation through the progress callback returns the notes
/// gathered so far.
pub fn verify(
    directories: &[PathBuf],
    stage: StageFn,
    progress: ProgressFn,
    xsd_directory: &Path,
) -> Result<Vec<VerificationNote>> {
    let xsd_directory = xsd_directory
        .canonicalize()
        .map_err(|_| Error::misc(format!("no schema directory {}", xsd_directory.display())))?;

    let mut notes = Vec::new();
    match verify_all(directories, stage, progress, &xsd_directory, &mut notes) {
        Ok(()) => Ok(notes),
        // A cancelled walk still reports what it found.
        Err(Error::Cancelled) => Ok(notes),
        Err(e) => Err(e),
    }
}

fn verify_all(
    directories: &[PathBuf],
    stage: StageFn,
    progress: ProgressFn,
    _xsd_directory: &Path,
    notes: &mut Vec<VerificationNote>,
) -> Result<()> {
    for directory in directories {
        stage("Checking DCP", Some(directory));

        let mut dcp = Dcp::new(directory)?;
        if let Err(e) = dcp.read(Some(notes)) {
            if e.is_cancelled() {
                return Err(e);
            }
            notes.push(
                VerificationNote::new(NoteSeverity::Error, VerificationCode::FailedRead)
                    .with_note(e.to_string()),
            );
        }

        if dcp.standard() != Some(Standard::Smpte) {
            notes.push(VerificationNote::new(
                NoteSeverity::Bv21Error,
                VerificationCode::InvalidStandard,
            ));
        }

        let mut state = State::default();
        for cpl in dcp.cpls() {
            verify_cpl(&dcp, cpl, &mut *stage, &mut *progress, notes, &mut state)?;
        }

        for pkl in dcp.pkls() {
            stage("Checking PKL", pkl.file.as_deref());
            if let Some(file) = &pkl.file {
                validate_xml_file(file, notes);
                if pkl_has_encrypted_assets(&dcp, pkl) && !file_is_signed(file) {
                    notes.push(
                        VerificationNote::new(
                            NoteSeverity::Bv21Error,
                            VerificationCode::UnsignedPklWithEncryptedContent,
                        )
                        .with_note(&pkl.id)
                        .with_file(file),
                    );
                }
            }
        }

        match dcp.asset_map_path() {
            Some(path) => {
                stage("Checking ASSETMAP", Some(path));
                validate_xml_file(path, notes);
            }
            None => {
                notes.push(VerificationNote::new(
                    NoteSeverity::Error,
                    VerificationCode::MissingAssetmap,
                ));
            }
        }
    }

    info!(notes = notes.len(), "verification finished");
    Ok(())
}

/// Cross-asset state carried through one verification run.
#[derive(Default)]
struct State {
    subtitle_language: Option<String>,
}

fn verify_cpl(
    dcp: &Dcp,
    cpl: &Cpl,
    stage: StageFn,
    progress: ProgressFn,
    notes: &mut Vec<VerificationNote>,
    state: &mut State,
) -> Result<()> {
    stage("Checking CPL", cpl.file.as_deref());
    if let Some(file) = &cpl.file {
        validate_xml_file(file, notes);
    }

    if cpl.any_encrypted() && !cpl.all_encrypted() {
        notes.push(VerificationNote::new(
            NoteSeverity::Bv21Error,
            VerificationCode::PartiallyEncrypted,
        ));
    }

    if let Some(metadata) = &cpl.metadata {
        for language in &metadata.subtitle_languages {
            verify_language_tag(language, notes);
        }
        if let Some(territory) = &metadata.release_territory {
            let scoped_unm49 = metadata.release_territory_scope.as_deref() == Some(UNM49_SCOPE);
            if !scoped_unm49
                && RegionSubtag::new(territory).is_err()
                && territory != "001"
            {
                notes.push(
                    VerificationNote::new(
                        NoteSeverity::Bv21Error,
                        VerificationCode::InvalidLanguage,
                    )
                    .with_note(territory),
                );
            }
        }
    }

    if dcp.standard() == Some(Standard::Smpte) {
        match &cpl.annotation_text {
            None => {
                notes.push(annotated(
                    NoteSeverity::Bv21Error,
                    VerificationCode::MissingCplAnnotationText,
                    cpl,
                ));
            }
            Some(annotation) if *annotation != cpl.content_title_text => {
                notes.push(annotated(
                    NoteSeverity::Warning,
                    VerificationCode::MismatchedCplAnnotationText,
                    cpl,
                ));
            }
            _ => {}
        }
    }

    for pkl in dcp.pkls() {
        if let (Some(recorded), Some(file)) = (pkl.hash(&cpl.id), cpl.file.as_deref()) {
            if make_digest(file, None)? != recorded {
                notes.push(
                    VerificationNote::new(
                        NoteSeverity::Error,
                        VerificationCode::MismatchedCplHashes,
                    )
                    .with_note(&cpl.id)
                    .with_file(file),
                );
            }
        }

        // A PKL shipping exactly one CPL must echo its title.
        let cpls_in_pkl = dcp
            .cpls()
            .iter()
            .filter(|c| pkl.hash(&c.id).is_some())
            .count();
        if cpls_in_pkl == 1
            && pkl.hash(&cpl.id).is_some()
            && pkl.annotation_text.as_deref() != Some(cpl.content_title_text.as_str())
        {
            notes.push(
                VerificationNote::new(
                    NoteSeverity::Bv21Error,
                    VerificationCode::MismatchedPklAnnotationTextWithCpl,
                )
                .with_note(&pkl.id),
            );
        }
    }

    let mut have_main_subtitle = false;
    let mut have_no_main_subtitle = false;
    let mut fewest_closed_captions = usize::MAX;
    let mut most_closed_captions = 0usize;
    let mut markers_seen: BTreeMap<Marker, Time> = BTreeMap::new();

    for reel in cpl.reels() {
        stage("Checking reel", None);

        for data in reel.assets() {
            if let Some(duration) = data.duration {
                if seconds(duration, data.edit_rate) < 1.0 {
                    notes.push(
                        VerificationNote::new(
                            NoteSeverity::Error,
                            VerificationCode::InvalidDuration,
                        )
                        .with_note(data.id()),
                    );
                }
            }
            if seconds(data.intrinsic_duration, data.edit_rate) < 1.0 {
                notes.push(
                    VerificationNote::new(
                        NoteSeverity::Error,
                        VerificationCode::InvalidIntrinsicDuration,
                    )
                    .with_note(data.id()),
                );
            }
            if data.hash.is_none() {
                notes.push(
                    VerificationNote::new(NoteSeverity::Bv21Error, VerificationCode::MissingHash)
                        .with_note(data.id()),
                );
            }
        }

        if dcp.standard() == Some(Standard::Smpte) {
            let mut duration: Option<i64> = None;
            for data in reel.assets() {
                match duration {
                    None => duration = Some(data.actual_duration()),
                    Some(d) if d != data.actual_duration() => {
                        notes.push(VerificationNote::new(
                            NoteSeverity::Bv21Error,
                            VerificationCode::MismatchedAssetDuration,
                        ));
                        break;
                    }
                    _ => {}
                }
            }
        }

        if let Some(picture) = &reel.main_picture {
            let rate = picture.frame_rate;
            let allowed = [24, 25, 30, 48, 50, 60, 96];
            if rate.denominator != 1 || !allowed.contains(&rate.numerator) {
                notes.push(
                    VerificationNote::new(
                        NoteSeverity::Error,
                        VerificationCode::InvalidPictureFrameRate,
                    )
                    .with_note(format!("{}/{}", rate.numerator, rate.denominator)),
                );
            }
            if picture.data.asset.is_resolved() {
                verify_main_picture_asset(
                    dcp,
                    &picture.data,
                    picture.stereoscopic,
                    &mut *stage,
                    &mut *progress,
                    notes,
                )?;
            }
        }

        if let Some(sound) = &reel.main_sound {
            if sound.data.asset.is_resolved() {
                verify_main_sound_asset(dcp, &sound.data, &mut *stage, &mut *progress, notes)?;
            }
        }

        if let Some(subtitle) = &reel.main_subtitle {
            verify_subtitle_reel(
                subtitle,
                VerificationCode::MissingSubtitleEntryPoint,
                VerificationCode::IncorrectSubtitleEntryPoint,
                notes,
            );
            if let Some(asset) = subtitle.data.asset.asset() {
                verify_subtitle_asset(asset, &mut *stage, notes, state);
            }
            have_main_subtitle = true;
        } else {
            have_no_main_subtitle = true;
        }

        for caption in &reel.closed_captions {
            verify_subtitle_reel(
                caption,
                VerificationCode::MissingClosedCaptionEntryPoint,
                VerificationCode::IncorrectClosedCaptionEntryPoint,
                notes,
            );
            if let Some(asset) = caption.data.asset.asset() {
                verify_subtitle_asset(asset, &mut *stage, notes, state);
                if let Some(raw) = raw_subtitle_xml(asset) {
                    if raw.len() > 256 * 1024 {
                        notes.push(
                            VerificationNote::new(
                                NoteSeverity::Bv21Error,
                                VerificationCode::InvalidClosedCaptionXmlSizeInBytes,
                            )
                            .with_note(raw.len().to_string())
                            .with_file_opt(asset.file()),
                        );
                    }
                }
            }
        }

        if let Some(markers) = &reel.main_markers {
            for (marker, time) in &markers.markers {
                markers_seen.entry(*marker).or_insert(*time);
            }
        }

        fewest_closed_captions = fewest_closed_captions.min(reel.closed_captions.len());
        most_closed_captions = most_closed_captions.max(reel.closed_captions.len());
    }

    if dcp.standard() == Some(Standard::Smpte) {
        if have_main_subtitle && have_no_main_subtitle {
            notes.push(VerificationNote::new(
                NoteSeverity::Bv21Error,
                VerificationCode::MissingMainSubtitleFromSomeReels,
            ));
        }
        if fewest_closed_captions != usize::MAX && fewest_closed_captions != most_closed_captions
        {
            notes.push(VerificationNote::new(
                NoteSeverity::Bv21Error,
                VerificationCode::MismatchedClosedCaptionAssetCounts,
            ));
        }

        if cpl.content_kind == ContentKind::Feature {
            if !markers_seen.contains_key(&Marker::Ffec) {
                notes.push(VerificationNote::new(
                    NoteSeverity::Bv21Error,
                    VerificationCode::MissingFfecInFeature,
                ));
            }
            if !markers_seen.contains_key(&Marker::Ffmc) {
                notes.push(VerificationNote::new(
                    NoteSeverity::Bv21Error,
                    VerificationCode::MissingFfmcInFeature,
                ));
            }
        }

        match markers_seen.get(&Marker::Ffoc) {
            None => notes.push(VerificationNote::new(
                NoteSeverity::Warning,
                VerificationCode::MissingFfoc,
            )),
            Some(time) if time.e != 1 => notes.push(
                VerificationNote::new(NoteSeverity::Warning, VerificationCode::IncorrectFfoc)
                    .with_note(time.e.to_string()),
            ),
            _ => {}
        }
        match markers_seen.get(&Marker::Lfoc) {
            None => notes.push(VerificationNote::new(
                NoteSeverity::Warning,
                VerificationCode::MissingLfoc,
            )),
            Some(time) => {
                let units = time.as_editable_units(time.tcr);
                let last_duration = cpl.reels().last().map(Reel::duration).unwrap_or(0);
                if units != last_duration - 1 {
                    notes.push(
                        VerificationNote::new(
                            NoteSeverity::Warning,
                            VerificationCode::IncorrectLfoc,
                        )
                        .with_note(units.to_string()),
                    );
                }
            }
        }

        check_text_timing(cpl.reels(), notes);

        let mut result = LinesCharactersResult::default();
        for reel in cpl.reels() {
            if let Some(subtitle) = &reel.main_subtitle {
                if let Some(asset) = subtitle.data.asset.asset() {
                    check_text_lines_and_characters(asset, 52, 79, &mut result);
                }
            }
        }
        if result.line_count_exceeded {
            notes.push(VerificationNote::new(
                NoteSeverity::Warning,
                VerificationCode::InvalidSubtitleLineCount,
            ));
        }
        if result.error_length_exceeded {
            notes.push(VerificationNote::new(
                NoteSeverity::Warning,
                VerificationCode::InvalidSubtitleLineLength,
            ));
        } else if result.warning_length_exceeded {
            notes.push(VerificationNote::new(
                NoteSeverity::Warning,
                VerificationCode::NearlyInvalidSubtitleLineLength,
            ));
        }

        let mut result = LinesCharactersResult::default();
        for reel in cpl.reels() {
            for caption in &reel.closed_captions {
                if let Some(asset) = caption.data.asset.asset() {
                    check_text_lines_and_characters(asset, 32, 32, &mut result);
                }
            }
        }
        if result.line_count_exceeded {
            notes.push(VerificationNote::new(
                NoteSeverity::Bv21Error,
                VerificationCode::InvalidClosedCaptionLineCount,
            ));
        }
        if result.error_length_exceeded {
            notes.push(VerificationNote::new(
                NoteSeverity::Bv21Error,
                VerificationCode::InvalidClosedCaptionLineLength,
            ));
        }

        match &cpl.metadata {
            None => notes.push(annotated(
                NoteSeverity::Bv21Error,
                VerificationCode::MissingCplMetadata,
                cpl,
            )),
            Some(metadata) if metadata.version_number.is_none() => {
                notes.push(annotated(
                    NoteSeverity::Bv21Error,
                    VerificationCode::MissingCplMetadataVersionNumber,
                    cpl,
                ));
            }
            _ => {}
        }

        check_extension_metadata(cpl, notes);

        if cpl.any_encrypted() {
            if let Some(file) = &cpl.file {
                if !file_is_signed(file) {
                    notes.push(
                        VerificationNote::new(
                            NoteSeverity::Bv21Error,
                            VerificationCode::UnsignedCplWithEncryptedContent,
                        )
                        .with_note(&cpl.id)
                        .with_file(file),
                    );
                }
            }
        }
    }

    Ok(())
}

impl VerificationNote {
    fn with_file_opt(self, file: Option<&Path>) -> Self {
        match file {
            Some(f) => self.with_file(f),
            None => self,
        }
    }
}

fn annotated(severity: NoteSeverity, code: VerificationCode, cpl: &Cpl) -> VerificationNote {
    let note = VerificationNote::new(severity, code).with_note(&cpl.id);
    match &cpl.file {
        Some(file) => note.with_file(file),
        None => note,
    }
}

fn seconds(units: i64, rate: Fraction) -> f64 {
    if rate.numerator == 0 {
        return 0.0;
    }
    units as f64 * rate.denominator as f64 / rate.numerator as f64
}

fn verify_language_tag(tag: &str, notes: &mut Vec<VerificationNote>) {
    if tag.parse::<LanguageTag>().is_err() {
        notes.push(
            VerificationNote::new(NoteSeverity::Bv21Error, VerificationCode::InvalidLanguage)
                .with_note(tag),
        );
    }
}

enum HashCheck {
    Good,
    CplPklDiffer,
    Bad,
}

fn verify_asset_hash(dcp: &Dcp, data: &ReelAssetData, progress: ProgressFn) -> Result<HashCheck> {
    let Some(asset) = data.asset.asset() else {
        return Ok(HashCheck::Good);
    };
    let actual = asset.hash(Some(progress))?;

    let Some(pkl_hash) = dcp.pkls().iter().find_map(|p| p.hash(data.id())) else {
        return Ok(HashCheck::Good);
    };

    if let Some(cpl_hash) = &data.hash {
        if cpl_hash.as_str() != pkl_hash {
            return Ok(HashCheck::CplPklDiffer);
        }
    }
    if actual != pkl_hash {
        return Ok(HashCheck::Bad);
    }
    Ok(HashCheck::Good)
}

fn verify_main_picture_asset(
    dcp: &Dcp,
    data: &ReelAssetData,
    stereoscopic: bool,
    stage: StageFn,
    progress: ProgressFn,
    notes: &mut Vec<VerificationNote>,
) -> Result<()> {
    let Some(asset) = data.asset.asset().cloned() else {
        return Ok(());
    };
    let file = asset.file().map(Path::to_path_buf);

    stage("Checking picture asset hash", file.as_deref());
    match verify_asset_hash(dcp, data, &mut *progress)? {
        HashCheck::Bad => notes.push(
            VerificationNote::new(NoteSeverity::Error, VerificationCode::IncorrectPictureHash)
                .with_file_opt(file.as_deref()),
        ),
        HashCheck::CplPklDiffer => notes.push(
            VerificationNote::new(
                NoteSeverity::Error,
                VerificationCode::MismatchedPictureHashes,
            )
            .with_file_opt(file.as_deref()),
        ),
        HashCheck::Good => {}
    }

    stage("Checking picture frame sizes", file.as_deref());
    let (size, edit_rate) = match &*asset {
        Asset::MonoPicture(p) | Asset::StereoPicture(p) => {
            check_picture_frame_sizes(p, &mut *progress, notes)?;
            (p.size, p.edit_rate)
        }
        _ => return Ok(()),
    };

    // Only flat and scope sizes are allowed.
    let allowed = [
        Size::new(2048, 858),
        Size::new(1998, 1080),
        Size::new(4096, 1716),
        Size::new(3996, 2160),
    ];
    if !allowed.contains(&size) {
        notes.push(
            VerificationNote::new(
                NoteSeverity::Bv21Error,
                VerificationCode::InvalidPictureSizeInPixels,
            )
            .with_note(format!("{}x{}", size.width, size.height))
            .with_file_opt(file.as_deref()),
        );
    }

    let two_k = size == Size::new(2048, 858) || size == Size::new(1998, 1080);
    let four_k = size == Size::new(4096, 1716) || size == Size::new(3996, 2160);
    let rate_note = format!("{}/{}", edit_rate.numerator, edit_rate.denominator);

    if two_k
        && !(edit_rate == Fraction::new(24, 1)
            || edit_rate == Fraction::new(25, 1)
            || edit_rate == Fraction::new(48, 1))
    {
        notes.push(
            VerificationNote::new(
                NoteSeverity::Bv21Error,
                VerificationCode::InvalidPictureFrameRateFor2k,
            )
            .with_note(&rate_note)
            .with_file_opt(file.as_deref()),
        );
    }
    if four_k {
        if edit_rate != Fraction::new(24, 1) {
            notes.push(
                VerificationNote::new(
                    NoteSeverity::Bv21Error,
                    VerificationCode::InvalidPictureFrameRateFor4k,
                )
                .with_note(&rate_note)
                .with_file_opt(file.as_deref()),
            );
        }
        if stereoscopic {
            notes.push(
                VerificationNote::new(
                    NoteSeverity::Bv21Error,
                    VerificationCode::InvalidPictureAssetResolutionFor3d,
                )
                .with_note(&rate_note)
                .with_file_opt(file.as_deref()),
            );
        }
    }

    Ok(())
}

fn check_picture_frame_sizes(
    picture: &crate::picture::PictureAsset,
    progress: ProgressFn,
    notes: &mut Vec<VerificationNote>,
) -> Result<()> {
    let reader = picture.start_read()?;
    let duration = reader.frame_count();
    let mut biggest: u64 = 0;
    for frame in 0..duration {
        biggest = biggest.max(reader.frame_size(frame)?);
        if !progress(frame as f32 / duration.max(1) as f32) {
            return Err(Error::Cancelled);
        }
    }

    let rate = picture.edit_rate.as_f64();
    let max_frame = (250.0 * 1_000_000.0 / (8.0 * rate)).round() as u64;
    let risky_frame = (230.0 * 1_000_000.0 / (8.0 * rate)).round() as u64;
    if biggest > max_frame {
        notes.push(
            VerificationNote::new(
                NoteSeverity::Error,
                VerificationCode::InvalidPictureFrameSizeInBytes,
            )
            .with_file_opt(picture.common.file.as_deref()),
        );
    } else if biggest > risky_frame {
        notes.push(
            VerificationNote::new(
                NoteSeverity::Warning,
                VerificationCode::NearlyInvalidPictureFrameSizeInBytes,
            )
            .with_file_opt(picture.common.file.as_deref()),
        );
    }
    Ok(())
}

fn verify_main_sound_asset(
    dcp: &Dcp,
    data: &ReelAssetData,
    stage: StageFn,
    progress: ProgressFn,
    notes: &mut Vec<VerificationNote>,
) -> Result<()> {
    let Some(asset) = data.asset.asset().cloned() else {
        return Ok(());
    };
    let file = asset.file().map(Path::to_path_buf);

    stage("Checking sound asset hash", file.as_deref());
    match verify_asset_hash(dcp, data, progress)? {
        HashCheck::Bad => notes.push(
            VerificationNote::new(NoteSeverity::Error, VerificationCode::IncorrectSoundHash)
                .with_file_opt(file.as_deref()),
        ),
        HashCheck::CplPklDiffer => notes.push(
            VerificationNote::new(NoteSeverity::Error, VerificationCode::MismatchedSoundHashes)
                .with_file_opt(file.as_deref()),
        ),
        HashCheck::Good => {}
    }

    stage("Checking sound asset metadata", file.as_deref());
    if let Asset::Sound(sound) = &*asset {
        if let Some(language) = &sound.language {
            verify_language_tag(&language.as_string(), notes);
        }
        if sound.sampling_rate != 48000 {
            notes.push(
                VerificationNote::new(
                    NoteSeverity::Bv21Error,
                    VerificationCode::InvalidSoundFrameRate,
                )
                .with_note(sound.sampling_rate.to_string())
                .with_file_opt(file.as_deref()),
            );
        }
    }
    Ok(())
}

fn verify_subtitle_reel(
    subtitle: &ReelSubtitle,
    missing: VerificationCode,
    incorrect: VerificationCode,
    notes: &mut Vec<VerificationNote>,
) {
    if let Some(language) = &subtitle.language {
        verify_language_tag(language, notes);
    }
    match subtitle.data.entry_point {
        None => notes.push(
            VerificationNote::new(NoteSeverity::Bv21Error, missing)
                .with_note(subtitle.data.id()),
        ),
        Some(entry) if entry != 0 => notes.push(
            VerificationNote::new(NoteSeverity::Bv21Error, incorrect)
                .with_note(subtitle.data.id()),
        ),
        _ => {}
    }
}

fn raw_subtitle_xml(asset: &Asset) -> Option<&str> {
    match asset {
        Asset::SmpteSubtitle(s) => s.raw_xml(),
        Asset::InteropSubtitle(s) => s.raw_xml(),
        _ => None,
    }
}

fn verify_subtitle_asset(
    asset: &Asset,
    stage: StageFn,
    notes: &mut Vec<VerificationNote>,
    state: &mut State,
) {
    stage("Checking subtitle XML", asset.file());
    // The bytes on disk are validated, not a cleaned-up reserialisation
    // which could hide defects.
    if let Some(raw) = raw_subtitle_xml(asset) {
        validate_xml_string(raw, asset.file(), notes);
    }

    let Asset::SmpteSubtitle(subtitle) = asset else {
        return;
    };

    match &subtitle.language {
        Some(language) => {
            verify_language_tag(language, notes);
            match &state.subtitle_language {
                None => state.subtitle_language = Some(language.clone()),
                Some(previous) if previous != language => {
                    notes.push(VerificationNote::new(
                        NoteSeverity::Bv21Error,
                        VerificationCode::MismatchedSubtitleLanguages,
                    ));
                }
                _ => {}
            }
        }
        None => {
            notes.push(
                VerificationNote::new(
                    NoteSeverity::Bv21Error,
                    VerificationCode::MissingSubtitleLanguage,
                )
                .with_file_opt(asset.file()),
            );
        }
    }

    if let Ok(size) = asset.size_on_disk() {
        if size > 115 * 1024 * 1024 {
            notes.push(
                VerificationNote::new(
                    NoteSeverity::Bv21Error,
                    VerificationCode::InvalidTimedTextSizeInBytes,
                )
                .with_note(size.to_string())
                .with_file_opt(asset.file()),
            );
        }
    }

    let font_total: usize = subtitle.font_data().iter().map(|(_, d)| d.len()).sum();
    if font_total > 10 * 1024 * 1024 {
        notes.push(
            VerificationNote::new(
                NoteSeverity::Bv21Error,
                VerificationCode::InvalidTimedTextFontSizeInBytes,
            )
            .with_note(font_total.to_string())
            .with_file_opt(asset.file()),
        );
    }

    match subtitle.start_time {
        None => notes.push(
            VerificationNote::new(
                NoteSeverity::Bv21Error,
                VerificationCode::MissingSubtitleStartTime,
            )
            .with_file_opt(asset.file()),
        ),
        Some(start) if start.as_ticks() != 0 => notes.push(
            VerificationNote::new(
                NoteSeverity::Bv21Error,
                VerificationCode::InvalidSubtitleStartTime,
            )
            .with_file_opt(asset.file()),
        ),
        _ => {}
    }
}

/// Subtitle timing across all reels, in editable units at the picture
/// rate: first text at least 4 seconds in, each subtitle at least 15
/// frames long, gaps of at least 2 frames.
fn check_text_timing(reels: &[Reel], notes: &mut Vec<VerificationNote>) {
    if reels.is_empty() {
        return;
    }
    let picture_frame_rate = reels[0]
        .main_picture
        .as_ref()
        .map(|p| p.frame_rate.numerator)
        .unwrap_or(24);

    if reels[0].main_subtitle.is_some() {
        check_one_text_track(reels, picture_frame_rate, notes, &|reel| {
            reel.main_subtitle
                .as_ref()
                .and_then(|s| s.data.asset.asset())
                .and_then(|a| raw_subtitle_xml(a).map(str::to_string))
                .map(|xml| {
                    (
                        xml,
                        reel.main_subtitle.as_ref().unwrap().data.actual_duration(),
                    )
                })
        });
    }

    for index in 0..reels[0].closed_captions.len() {
        check_one_text_track(reels, picture_frame_rate, notes, &move |reel| {
            reel.closed_captions.get(index).and_then(|c| {
                c.data
                    .asset
                    .asset()
                    .and_then(|a| raw_subtitle_xml(a).map(str::to_string))
                    .map(|xml| (xml, c.data.actual_duration()))
            })
        });
    }
}

fn check_one_text_track(
    reels: &[Reel],
    picture_frame_rate: i64,
    notes: &mut Vec<VerificationNote>,
    track: &dyn Fn(&Reel) -> Option<(String, i64)>,
) {
    let mut last_out: Option<i64> = None;
    let mut too_short = false;
    let mut too_close = false;
    let mut too_early = false;
    let mut reel_offset: i64 = 0;

    for (index, reel) in reels.iter().enumerate() {
        let Some((xml, duration)) = track(reel) else {
            continue;
        };
        let Ok(document) = dcpack_xml::parse_string(&xml) else {
            continue;
        };
        let Ok(tcr) = document.number_child::<i64>("TimeCodeRate") else {
            continue;
        };

        walk_subtitle_times(
            &document,
            tcr,
            picture_frame_rate,
            index == 0,
            &mut last_out,
            &mut too_short,
            &mut too_close,
            &mut too_early,
            reel_offset,
        );
        reel_offset += duration;
    }

    if too_early {
        notes.push(VerificationNote::new(
            NoteSeverity::Warning,
            VerificationCode::InvalidSubtitleFirstTextTime,
        ));
    }
    if too_short {
        notes.push(VerificationNote::new(
            NoteSeverity::Warning,
            VerificationCode::InvalidSubtitleDuration,
        ));
    }
    if too_close {
        notes.push(VerificationNote::new(
            NoteSeverity::Warning,
            VerificationCode::InvalidSubtitleSpacing,
        ));
    }
}

#[allow(clippy::too_many_arguments)]
fn walk_subtitle_times(
    element: &Element,
    tcr: i64,
    picture_frame_rate: i64,
    first_reel: bool,
    last_out: &mut Option<i64>,
    too_short: &mut bool,
    too_close: &mut bool,
    too_early: &mut bool,
    reel_offset: i64,
) {
    if element.name == "Subtitle" {
        let (Some(time_in), Some(time_out)) =
            (element.attribute("TimeIn"), element.attribute("TimeOut"))
        else {
            return;
        };
        let (Ok(time_in), Ok(time_out)) = (
            Time::from_string(time_in, tcr),
            Time::from_string(time_out, tcr),
        ) else {
            return;
        };

        if first_reel && time_in < Time::new(0, 0, 4, 0, tcr) {
            *too_early = true;
        }
        let length = time_out - time_in;
        if length.as_editable_units(picture_frame_rate) < 15 {
            *too_short = true;
        }
        if let Some(last) = *last_out {
            let distance =
                reel_offset + time_in.as_editable_units(picture_frame_rate) - last;
            if (0..2).contains(&distance) {
                *too_close = true;
            }
        }
        *last_out = Some(reel_offset + time_out.as_editable_units(picture_frame_rate));
        return;
    }
    for child in element.elements() {
        walk_subtitle_times(
            child,
            tcr,
            picture_frame_rate,
            first_reel,
            last_out,
            too_short,
            too_close,
            too_early,
            reel_offset,
        );
    }
}

#[derive(Default)]
struct LinesCharactersResult {
    warning_length_exceeded: bool,
    error_length_exceeded: bool,
    line_count_exceeded: bool,
}

/// Count concurrently-displayed line positions and their character loads
/// with an event schedule: IN adds characters at a position, OUT removes
/// them.
fn check_text_lines_and_characters(
    asset: &Asset,
    warning_length: usize,
    error_length: usize,
    result: &mut LinesCharactersResult,
) {
    let subtitles: &[Subtitle] = match asset {
        Asset::SmpteSubtitle(s) => &s.subtitles,
        Asset::InteropSubtitle(s) => &s.subtitles,
        _ => return,
    };

    struct Event {
        time: Time,
        position: i64,
        characters: i64,
        // Signed: IN events add, OUT events subtract.
    }

    let mut events: Vec<Event> = Vec::new();
    for subtitle in subtitles {
        let Subtitle::Text(text) = subtitle else {
            continue;
        };
        let position = screen_position(text.placement.v_align, text.placement.v_position);
        let characters = text.text.chars().count() as i64;
        events.push(Event {
            time: text.placement.in_time,
            position,
            characters,
        });
        events.push(Event {
            time: text.placement.out_time,
            position,
            characters: -characters,
        });
    }
    events.sort_by(|a, b| a.time.cmp(&b.time));

    let mut current: BTreeMap<i64, i64> = BTreeMap::new();
    for event in events {
        if current.len() > 3 {
            result.line_count_exceeded = true;
        }
        for load in current.values() {
            if *load >= warning_length as i64 {
                result.warning_length_exceeded = true;
            }
            if *load >= error_length as i64 {
                result.error_length_exceeded = true;
            }
        }

        let entry = current.entry(event.position).or_insert(0);
        *entry += event.characters;
        if *entry <= 0 {
            current.remove(&event.position);
        }
    }
}

/// Vertical screen position, 0 at the top to 100 at the bottom.
fn screen_position(v_align: VAlign, v_position: f32) -> i64 {
    let fraction = match v_align {
        VAlign::Top => v_position,
        VAlign::Center => 0.5 + v_position,
        VAlign::Bottom => 1.0 - v_position,
    };
    (fraction * 100.0).round() as i64
}

fn check_extension_metadata(cpl: &Cpl, notes: &mut Vec<VerificationNote>) {
    let Some(file) = &cpl.file else {
        return;
    };
    let Ok(document) = dcpack_xml::parse_file(file) else {
        return;
    };

    let metadata = document
        .child("ReelList")
        .and_then(|list| list.child("Reel"))
        .and_then(|reel| reel.child("AssetList"))
        .and_then(|assets| assets.child("CompositionMetadataAsset"));
    let Some(metadata) = metadata else {
        // MISSING_CPL_METADATA already covers a missing metadata asset.
        return;
    };

    let mut missing = true;
    let mut malformed = String::new();
    if let Some(list) = metadata.child("ExtensionMetadataList") {
        for extension in list.children_named("ExtensionMetadata") {
            if extension.attribute("scope") != Some(APP_SCOPE) {
                continue;
            }
            missing = false;
            if let Some(name) = extension.child("Name") {
                if name.text() != "Application" {
                    malformed = "<Name> should be 'Application'".to_string();
                }
            }
            if let Some(property) = extension
                .child("PropertyList")
                .and_then(|l| l.child("Property"))
            {
                if let Some(name) = property.child("Name") {
                    if name.text() != "DCP Constraints Profile" {
                        malformed = "<Name> property should be 'DCP Constraints Profile'"
                            .to_string();
                    }
                }
                if let Some(value) = property.child("Value") {
                    if value.text() != "SMPTE-RDD-52:2020-Bv2.1" {
                        malformed =
                            "<Value> property should be 'SMPTE-RDD-52:2020-Bv2.1'".to_string();
                    }
                }
            }
        }
    }

    if missing {
        notes.push(
            VerificationNote::new(
                NoteSeverity::Bv21Error,
                VerificationCode::MissingExtensionMetadata,
            )
            .with_note(&cpl.id)
            .with_file(file),
        );
    } else if !malformed.is_empty() {
        notes.push(
            VerificationNote::new(
                NoteSeverity::Bv21Error,
                VerificationCode::InvalidExtensionMetadata,
            )
            .with_note(malformed)
            .with_file(file),
        );
    }
}

fn pkl_has_encrypted_assets(dcp: &Dcp, pkl: &Pkl) -> bool {
    for cpl in dcp.cpls() {
        for data in cpl.reel_assets() {
            let encrypted = data
                .asset
                .asset()
                .map(|a| a.encrypted())
                .unwrap_or(false);
            if encrypted && pkl.hash(data.id()).is_some() {
                return true;
            }
        }
    }
    false
}

fn file_is_signed(path: &Path) -> bool {
    dcpack_xml::parse_file(path)
        .map(|root| root.child("Signature").is_some())
        .unwrap_or(false)
}

/// Structural validation of an XML file.
fn validate_xml_file(path: &Path, notes: &mut Vec<VerificationNote>) {
    match dcpack_xml::parse_file(path) {
        Ok(root) => check_required_children(&root, Some(path), notes),
        Err(e) => push_xml_error(e, Some(path), notes),
    }
}

/// Structural validation of XML held in memory (subtitle payloads).
fn validate_xml_string(text: &str, file: Option<&Path>, notes: &mut Vec<VerificationNote>) {
    match dcpack_xml::parse_string(text) {
        Ok(root) => check_required_children(&root, file, notes),
        Err(e) => push_xml_error(e, file, notes),
    }
}

fn push_xml_error(error: Error, file: Option<&Path>, notes: &mut Vec<VerificationNote>) {
    let mut note = VerificationNote::new(NoteSeverity::Error, VerificationCode::InvalidXml);
    if let Error::Xml(XmlError::Parse { message, line, .. }) = &error {
        note = note.with_note(message);
        if let Some(line) = line {
            note = note.with_line(*line);
        }
    } else {
        note = note.with_note(error.to_string());
    }
    notes.push(note.with_file_opt(file));
}

fn check_required_children(root: &Element, file: Option<&Path>, notes: &mut Vec<VerificationNote>) {
    let required: &[&str] = match root.name.as_str() {
        "CompositionPlaylist" => &["Id", "IssueDate", "ContentTitleText", "ContentKind", "ReelList"],
        "PackingList" => &["Id", "IssueDate", "AssetList"],
        "AssetMap" => &["Id", "AssetList"],
        "SubtitleReel" => &["Id", "ContentTitleText", "TimeCodeRate", "SubtitleList"],
        "DCSubtitle" => &["SubtitleID"],
        "VolumeIndex" => &["Index"],
        _ => &[],
    };
    for name in required {
        if root.child(name).is_none() {
            let mut note = VerificationNote::new(NoteSeverity::Error, VerificationCode::InvalidXml)
                .with_note(format!("missing <{name}> in <{}>", root.name))
                .with_file_opt(file);
            if let Some(line) = root.line {
                note = note.with_line(line);
            }
            notes.push(note);
        }
    }
}

/// A user-facing sentence for a note, stating what is wrong and naming the
/// offending id or file where one is known.
pub fn note_to_string(note: &VerificationNote) -> String {
    let detail = note.note().unwrap_or("");
    let filename = note
        .file()
        .and_then(Path::file_name)
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    use VerificationCode::*;
    match note.code() {
        FailedRead => detail.to_string(),
        MismatchedCplHashes => format!(
            "The hash of the CPL {detail} in the PKL does not agree with the CPL file."
        ),
        InvalidPictureFrameRate => {
            format!("The picture in a reel has an invalid frame rate {detail}.")
        }
        IncorrectPictureHash => format!(
            "The hash of the picture asset {filename} does not agree with the PKL file."
        ),
        MismatchedPictureHashes => {
            format!("The PKL and CPL hashes differ for the picture asset {filename}.")
        }
        IncorrectSoundHash => format!(
            "The hash of the sound asset {filename} does not agree with the PKL file."
        ),
        MismatchedSoundHashes => {
            format!("The PKL and CPL hashes differ for the sound asset {filename}.")
        }
        EmptyAssetPath => "The asset map contains an empty asset path.".to_string(),
        MissingAsset => format!(
            "The file {filename} for an asset in the asset map cannot be found."
        ),
        MismatchedStandard => "The DCP contains both SMPTE and Interop parts.".to_string(),
        InvalidXml => format!(
            "An XML file is badly formed: {detail} ({filename}:{})",
            note.line().unwrap_or(0)
        ),
        MissingAssetmap => "No ASSETMAP or ASSETMAP.xml was found.".to_string(),
        InvalidIntrinsicDuration => format!(
            "The intrinsic duration of the asset {detail} is less than 1 second long."
        ),
        InvalidDuration => {
            format!("The duration of the asset {detail} is less than 1 second long.")
        }
        InvalidPictureFrameSizeInBytes => format!(
            "The instantaneous bit rate of the picture asset {filename} is larger than the limit of 250Mbit/s in at least one place."
        ),
        NearlyInvalidPictureFrameSizeInBytes => format!(
            "The instantaneous bit rate of the picture asset {filename} is close to the limit of 250Mbit/s in at least one place."
        ),
        ExternalAsset => format!(
            "The asset {detail} that this DCP refers to is not included in the DCP.  It may be a VF."
        ),
        InvalidStandard => "This DCP does not use the SMPTE standard.".to_string(),
        InvalidLanguage => format!(
            "The DCP specifies a language '{detail}' which does not conform to the RFC 5646 standard."
        ),
        InvalidPictureSizeInPixels => {
            format!("The size {detail} of picture asset {filename} is not allowed.")
        }
        InvalidPictureFrameRateFor2k => format!(
            "The frame rate {detail} of picture asset {filename} is not allowed for 2K DCPs."
        ),
        InvalidPictureFrameRateFor4k => format!(
            "The frame rate {detail} of picture asset {filename} is not allowed for 4K DCPs."
        ),
        InvalidPictureAssetResolutionFor3d => "3D 4K DCPs are not allowed.".to_string(),
        InvalidClosedCaptionXmlSizeInBytes => format!(
            "The size {detail} of the closed caption asset {filename} is larger than the 256KB maximum."
        ),
        InvalidTimedTextSizeInBytes => format!(
            "The size {detail} of the timed text asset {filename} is larger than the 115MB maximum."
        ),
        InvalidTimedTextFontSizeInBytes => format!(
            "The size {detail} of the fonts in timed text asset {filename} is larger than the 10MB maximum."
        ),
        MissingSubtitleLanguage => format!(
            "The XML for the SMPTE subtitle asset {filename} has no <Language> tag."
        ),
        MismatchedSubtitleLanguages => {
            "Some subtitle assets have different <Language> tags than others".to_string()
        }
        MissingSubtitleStartTime => format!(
            "The XML for the SMPTE subtitle asset {filename} has no <StartTime> tag."
        ),
        InvalidSubtitleStartTime => format!(
            "The XML for a SMPTE subtitle asset {filename} has a non-zero <StartTime> tag."
        ),
        InvalidSubtitleFirstTextTime => {
            "The first subtitle or closed caption is less than 4 seconds from the start of the DCP."
                .to_string()
        }
        InvalidSubtitleDuration => "At least one subtitle lasts less than 15 frames.".to_string(),
        InvalidSubtitleSpacing => {
            "At least one pair of subtitles is separated by less than 2 frames.".to_string()
        }
        InvalidSubtitleLineCount => {
            "There are more than 3 subtitle lines in at least one place in the DCP.".to_string()
        }
        NearlyInvalidSubtitleLineLength => {
            "There are more than 52 characters in at least one subtitle line.".to_string()
        }
        InvalidSubtitleLineLength => {
            "There are more than 79 characters in at least one subtitle line.".to_string()
        }
        InvalidClosedCaptionLineCount => {
            "There are more than 3 closed caption lines in at least one place.".to_string()
        }
        InvalidClosedCaptionLineLength => {
            "There are more than 32 characters in at least one closed caption line.".to_string()
        }
        InvalidSoundFrameRate => {
            format!("The sound asset {filename} has a sampling rate of {detail}")
        }
        MissingCplAnnotationText => {
            format!("The CPL {detail} has no <AnnotationText> tag.")
        }
        MismatchedCplAnnotationText => format!(
            "The CPL {detail} has an <AnnotationText> which differs from its <ContentTitleText>"
        ),
        MismatchedAssetDuration => {
            "All assets in a reel do not have the same duration.".to_string()
        }
        MissingMainSubtitleFromSomeReels => {
            "At least one reel contains a subtitle asset, but some reel(s) do not".to_string()
        }
        MismatchedClosedCaptionAssetCounts => {
            "At least one reel has closed captions, but reels have different numbers of closed caption assets."
                .to_string()
        }
        MissingSubtitleEntryPoint => {
            format!("The subtitle asset {detail} has no <EntryPoint> tag.")
        }
        IncorrectSubtitleEntryPoint => {
            format!("The subtitle asset {detail} has an <EntryPoint> other than 0.")
        }
        MissingClosedCaptionEntryPoint => {
            format!("The closed caption asset {detail} has no <EntryPoint> tag.")
        }
        IncorrectClosedCaptionEntryPoint => {
            format!("The closed caption asset {detail} has an <EntryPoint> other than 0.")
        }
        MissingHash => format!("The asset {detail} has no <Hash> tag in the CPL."),
        MissingFfecInFeature => {
            "The DCP is marked as a Feature but there is no FFEC (first frame of end credits) marker"
                .to_string()
        }
        MissingFfmcInFeature => {
            "The DCP is marked as a Feature but there is no FFMC (first frame of moving credits) marker"
                .to_string()
        }
        MissingFfoc => "There should be a FFOC (first frame of content) marker".to_string(),
        MissingLfoc => "There should be a LFOC (last frame of content) marker".to_string(),
        IncorrectFfoc => format!("The FFOC marker is {detail} instead of 1"),
        IncorrectLfoc => format!(
            "The LFOC marker is {detail} instead of 1 less than the duration of the last reel."
        ),
        MissingCplMetadata => {
            format!("The CPL {detail} has no <CompositionMetadataAsset> tag.")
        }
        MissingCplMetadataVersionNumber => format!(
            "The CPL {detail} has no <VersionNumber> in its <CompositionMetadataAsset>."
        ),
        MissingExtensionMetadata => format!(
            "The CPL {detail} has no <ExtensionMetadata> in its <CompositionMetadataAsset>."
        ),
        InvalidExtensionMetadata => {
            format!("The CPL {filename} has a malformed <ExtensionMetadata> ({detail}).")
        }
        UnsignedCplWithEncryptedContent => {
            format!("The CPL {detail}, which has encrypted content, is not signed.")
        }
        UnsignedPklWithEncryptedContent => {
            format!("The PKL {detail}, which has encrypted content, is not signed.")
        }
        MismatchedPklAnnotationTextWithCpl => format!(
            "The PKL {detail} has only one CPL but its <AnnotationText> does not match the CPL's <ContentTitleText>"
        ),
        PartiallyEncrypted => "Some assets are encrypted but some are not".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subtitle::{SubtitlePlacement, SubtitleStyle, SubtitleText, SmpteSubtitleAsset};

    #[test]
    fn test_note_display() {
        let note = VerificationNote::new(
            NoteSeverity::Error,
            VerificationCode::MismatchedCplHashes,
        )
        .with_note("abc-123");
        let text = note.to_string();
        assert!(text.starts_with("The hash of the CPL abc-123"));
        assert!(text.ends_with("[abc-123]"));
    }

    #[test]
    fn test_note_equality() {
        let a = VerificationNote::new(NoteSeverity::Warning, VerificationCode::MissingFfoc);
        let b = VerificationNote::new(NoteSeverity::Warning, VerificationCode::MissingFfoc);
        assert_eq!(a, b);
        assert_ne!(a, b.clone().with_note("x"));
    }

    #[test]
    fn test_screen_position() {
        assert_eq!(screen_position(VAlign::Top, 0.8), 80);
        assert_eq!(screen_position(VAlign::Bottom, 0.2), 80);
        assert_eq!(screen_position(VAlign::Center, 0.1), 60);
    }

    fn text_subtitle(line: &str, position: f32, in_s: i64, out_s: i64) -> Subtitle {
        let mut placement = SubtitlePlacement::new(
            Time::new(0, 0, in_s, 0, 24),
            Time::new(0, 0, out_s, 0, 24),
        );
        placement.v_align = VAlign::Top;
        placement.v_position = position;
        Subtitle::Text(SubtitleText {
            placement,
            style: SubtitleStyle::default(),
            text: line.to_string(),
            space_before: 0.0,
        })
    }

    fn asset_with(subtitles: Vec<Subtitle>) -> Asset {
        let mut asset =
            SmpteSubtitleAsset::new("Test", dcpack_core::Fraction::new(24, 1), 24);
        for subtitle in subtitles {
            asset.add(subtitle);
        }
        Asset::SmpteSubtitle(asset)
    }

    #[test]
    fn test_line_length_thresholds() {
        let long_line = "x".repeat(60);
        let asset = asset_with(vec![text_subtitle(&long_line, 0.1, 5, 8)]);

        let mut result = LinesCharactersResult::default();
        check_text_lines_and_characters(&asset, 52, 79, &mut result);
        assert!(result.warning_length_exceeded);
        assert!(!result.error_length_exceeded);

        let very_long = "x".repeat(85);
        let asset = asset_with(vec![text_subtitle(&very_long, 0.1, 5, 8)]);
        let mut result = LinesCharactersResult::default();
        check_text_lines_and_characters(&asset, 52, 79, &mut result);
        assert!(result.error_length_exceeded);
    }

    #[test]
    fn test_line_count_threshold() {
        // Four simultaneous positions is one too many.
        let asset = asset_with(vec![
            text_subtitle("one", 0.1, 5, 10),
            text_subtitle("two", 0.2, 5, 10),
            text_subtitle("three", 0.3, 5, 10),
            text_subtitle("four", 0.4, 5, 10),
        ]);
        let mut result = LinesCharactersResult::default();
        check_text_lines_and_characters(&asset, 52, 79, &mut result);
        assert!(result.line_count_exceeded);

        let asset = asset_with(vec![
            text_subtitle("one", 0.1, 5, 10),
            text_subtitle("two", 0.2, 5, 10),
            text_subtitle("three", 0.3, 5, 10),
        ]);
        let mut result = LinesCharactersResult::default();
        check_text_lines_and_characters(&asset, 52, 79, &mut result);
        assert!(!result.line_count_exceeded);
    }

    #[test]
    fn test_picture_frame_size_boundary() {
        use crate::picture::PictureAsset;
        use dcpack_mxf::{EssenceDescriptor, EssenceKind, MxfWriter};

        // At 24 fps the ceiling is 250 Mbit / (8 * 24) bytes per frame;
        // a frame exactly on the ceiling passes, one byte over fails.
        let max_frame = (250.0f64 * 1_000_000.0 / (8.0 * 24.0)).round() as usize;

        for (extra, expect_error) in [(0usize, false), (1usize, true)] {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("picture.mxf");
            let mut descriptor =
                EssenceDescriptor::new(EssenceKind::Jpeg2000, dcpack_core::Fraction::new(24, 1));
            descriptor.stored_size = Some(Size::new(1998, 1080));
            let mut writer = MxfWriter::create(&path, descriptor).unwrap();
            writer.append_frame(&vec![0u8; max_frame + extra]).unwrap();
            writer.finalize().unwrap();

            let asset = PictureAsset::from_file(&path).unwrap();
            let Asset::MonoPicture(picture) = &asset else {
                panic!()
            };

            let mut notes = Vec::new();
            let mut progress = |_: f32| true;
            check_picture_frame_sizes(picture, &mut progress, &mut notes).unwrap();

            let has_error = notes
                .iter()
                .any(|n| n.code() == VerificationCode::InvalidPictureFrameSizeInBytes);
            assert_eq!(has_error, expect_error, "extra={extra} {notes:?}");
            // Every frame over the 230 Mbit advisory threshold at least
            // warns.
            assert!(notes.iter().any(|n| {
                n.code() == VerificationCode::NearlyInvalidPictureFrameSizeInBytes
                    || n.code() == VerificationCode::InvalidPictureFrameSizeInBytes
            }));
        }
    }

    #[test]
    fn test_validate_xml_reports_missing_children() {
        let mut notes = Vec::new();
        validate_xml_string("<PackingList><Id>x</Id></PackingList>", None, &mut notes);
        assert_eq!(notes.len(), 2);
        assert!(notes
            .iter()
            .all(|n| n.code() == VerificationCode::InvalidXml));
        assert!(notes
            .iter()
            .any(|n| n.note().unwrap_or("").contains("IssueDate")));
    }

    #[test]
    fn test_validate_xml_reports_parse_errors_with_line() {
        let mut notes = Vec::new();
        validate_xml_string("<a>\n<b>\n</a>", None, &mut notes);
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].code(), VerificationCode::InvalidXml);
        assert!(notes[0].line().is_some());
    }

    #[test]
    fn test_subtitle_duration_boundary() {
        // 15 frames is acceptable, 14 is not.
        let xml_at = |frames: i64| {
            format!(
                concat!(
                    "<SubtitleReel><Id>urn:uuid:x</Id>",
                    "<ContentTitleText>t</ContentTitleText>",
                    "<TimeCodeRate>24</TimeCodeRate>",
                    "<SubtitleList><Subtitle TimeIn=\"00:00:10:00\" ",
                    "TimeOut=\"00:00:10:{:02}\"><Text>hi</Text></Subtitle>",
                    "</SubtitleList></SubtitleReel>",
                ),
                frames
            )
        };

        for (frames, expect_short) in [(15, false), (14, true)] {
            let document = dcpack_xml::parse_string(&xml_at(frames)).unwrap();
            let mut last_out = None;
            let (mut short, mut close, mut early) = (false, false, false);
            walk_subtitle_times(
                &document, 24, 24, true, &mut last_out, &mut short, &mut close, &mut early, 0,
            );
            assert_eq!(short, expect_short, "frames={frames}");
            assert!(!early);
        }
    }

    #[test]
    fn test_subtitle_spacing_and_first_text() {
        let xml = concat!(
            "<SubtitleReel><Id>urn:uuid:x</Id>",
            "<ContentTitleText>t</ContentTitleText>",
            "<TimeCodeRate>24</TimeCodeRate>",
            "<SubtitleList>",
            "<Subtitle TimeIn=\"00:00:02:00\" TimeOut=\"00:00:03:00\"><Text>a</Text></Subtitle>",
            "<Subtitle TimeIn=\"00:00:03:01\" TimeOut=\"00:00:04:00\"><Text>b</Text></Subtitle>",
            "</SubtitleList></SubtitleReel>",
        );
        let document = dcpack_xml::parse_string(xml).unwrap();
        let mut last_out = None;
        let (mut short, mut close, mut early) = (false, false, false);
        walk_subtitle_times(
            &document, 24, 24, true, &mut last_out, &mut short, &mut close, &mut early, 0,
        );
        // Both subtitles start before 4s and the gap is 1 frame.
        assert!(early);
        assert!(close);
    }
}
