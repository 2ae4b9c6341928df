//! Verifier scenarios against freshly authored packages.

use dcpack::verify::{verify, NoteSeverity, VerificationCode};
use dcpack::{
    ContentKind, Cpl, CompositionMetadata, Dcp, EssenceDescriptor, EssenceKind, Fraction,
    Marker, MxfWriter, NameFormat, PictureAsset, Reel, ReelMarkers, ReelPicture, ReelSound,
    Size, SoundAsset, Standard, Time, XmlMetadata,
};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const FRAMES: i64 = 24;

fn build_dcp(directory: &Path) -> Dcp {
    let picture_path = directory.join("picture.mxf");
    let mut descriptor = EssenceDescriptor::new(EssenceKind::Jpeg2000, Fraction::new(24, 1));
    descriptor.stored_size = Some(Size::new(1998, 1080));
    let mut writer = MxfWriter::create(&picture_path, descriptor).unwrap();
    for _ in 0..FRAMES {
        writer.append_frame(&[0x42u8; 512]).unwrap();
    }
    writer.finalize().unwrap();

    let sound_path = directory.join("sound.mxf");
    let mut descriptor = EssenceDescriptor::new(EssenceKind::Pcm, Fraction::new(24, 1));
    descriptor.sampling_rate = Some(48000);
    descriptor.channels = Some(1);
    let mut writer = MxfWriter::create(&sound_path, descriptor).unwrap();
    for _ in 0..FRAMES {
        writer.append_frame(&[0u8; 2000 * 3]).unwrap();
    }
    writer.finalize().unwrap();

    let picture = Arc::new(PictureAsset::from_file(&picture_path).unwrap());
    let sound = Arc::new(SoundAsset::from_file(&sound_path).unwrap());

    let mut reel = Reel::new();
    reel.main_picture = Some(ReelPicture::from_asset(&picture, 0));
    reel.main_sound = Some(ReelSound::from_asset(&sound, 0));
    let mut markers = ReelMarkers::new(Fraction::new(24, 1), FRAMES);
    markers.set(Marker::Ffoc, Time::from_editable_units(1, 24));
    markers.set(Marker::Lfoc, Time::from_editable_units(FRAMES - 1, 24));
    markers.set(Marker::Ffec, Time::from_editable_units(20, 24));
    markers.set(Marker::Ffmc, Time::from_editable_units(22, 24));
    reel.main_markers = Some(markers);

    let mut cpl = Cpl::new("A Test DCP", ContentKind::Feature);
    cpl.issuer = "dcpack test".to_string();
    cpl.creator = "dcpack test".to_string();
    let mut meta = CompositionMetadata::new("A Test DCP");
    meta.main_picture_stored_area = Some(Size::new(1998, 1080));
    meta.main_sound_sample_rate = Some(48000);
    cpl.metadata = Some(meta);
    cpl.add_reel(reel);

    let mut dcp = Dcp::new(directory).unwrap();
    dcp.add_cpl(cpl);
    dcp.write_xml(
        Standard::Smpte,
        &XmlMetadata {
            issuer: "dcpack test".to_string(),
            creator: "dcpack test".to_string(),
            issue_date: "2024-03-01T09:30:00.000+00:00".to_string(),
            annotation_text: "A Test DCP".to_string(),
        },
        None,
        &NameFormat::default(),
    )
    .unwrap();
    dcp
}

fn run_verify(directory: &Path) -> Vec<dcpack::VerificationNote> {
    let xsd = tempfile::tempdir().unwrap();
    let mut stage = |_: &str, _: Option<&Path>| {};
    let mut progress = |_: f32| true;
    verify(
        &[directory.to_path_buf()],
        &mut stage,
        &mut progress,
        xsd.path(),
    )
    .unwrap()
}

#[test]
fn minimal_smpte_dcp_verifies_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    build_dcp(dir.path());

    let notes = run_verify(dir.path());
    let serious: Vec<_> = notes
        .iter()
        .filter(|n| n.severity() != NoteSeverity::Warning)
        .collect();
    assert!(serious.is_empty(), "{serious:?}");
}

#[test]
fn tampered_cpl_hash_is_reported_once_with_its_id() {
    let dir = tempfile::tempdir().unwrap();
    let dcp = build_dcp(dir.path());
    let cpl_id = dcp.cpls()[0].id.clone();

    // Growing the CPL file by insignificant whitespace leaves it valid
    // XML but changes its digest away from the PKL's record.
    let cpl_file = dcp.cpls()[0].file.clone().unwrap();
    let mut file = OpenOptions::new().append(true).open(&cpl_file).unwrap();
    file.write_all(b"\n").unwrap();

    let notes = run_verify(dir.path());
    let mismatches: Vec<_> = notes
        .iter()
        .filter(|n| n.code() == VerificationCode::MismatchedCplHashes)
        .collect();
    assert_eq!(mismatches.len(), 1, "{notes:?}");
    assert!(dcpack::note_to_string(mismatches[0]).contains(&cpl_id));
}

#[test]
fn tampered_picture_bytes_are_reported() {
    let dir = tempfile::tempdir().unwrap();
    build_dcp(dir.path());

    let picture_path = dir.path().join("picture.mxf");
    let mut bytes = std::fs::read(&picture_path).unwrap();
    let offset = bytes.len() - 10;
    bytes[offset] ^= 0xFF;
    std::fs::write(&picture_path, bytes).unwrap();

    let notes = run_verify(dir.path());
    assert!(
        notes
            .iter()
            .any(|n| n.code() == VerificationCode::IncorrectPictureHash),
        "{notes:?}"
    );
}

#[test]
fn wrong_picture_size_flags_bv21() {
    let dir = tempfile::tempdir().unwrap();

    let picture_path = dir.path().join("picture.mxf");
    let mut descriptor = EssenceDescriptor::new(EssenceKind::Jpeg2000, Fraction::new(24, 1));
    descriptor.stored_size = Some(Size::new(1920, 1080));
    let mut writer = MxfWriter::create(&picture_path, descriptor).unwrap();
    for _ in 0..FRAMES {
        writer.append_frame(&[0u8; 64]).unwrap();
    }
    writer.finalize().unwrap();

    let picture = Arc::new(PictureAsset::from_file(&picture_path).unwrap());
    let mut reel = Reel::new();
    reel.main_picture = Some(ReelPicture::from_asset(&picture, 0));
    let mut cpl = Cpl::new("Wrong Size", ContentKind::Test);
    cpl.metadata = Some(CompositionMetadata::new("Wrong Size"));
    cpl.add_reel(reel);

    let mut dcp = Dcp::new(dir.path()).unwrap();
    dcp.add_cpl(cpl);
    dcp.write_xml(
        Standard::Smpte,
        &XmlMetadata {
            annotation_text: "Wrong Size".to_string(),
            ..XmlMetadata::default()
        },
        None,
        &NameFormat::default(),
    )
    .unwrap();

    let notes = run_verify(dir.path());
    assert!(
        notes
            .iter()
            .any(|n| n.code() == VerificationCode::InvalidPictureSizeInPixels
                && n.severity() == NoteSeverity::Bv21Error),
        "{notes:?}"
    );
}

#[test]
fn interop_dcp_flags_invalid_standard() {
    let dir = tempfile::tempdir().unwrap();

    let picture_path = dir.path().join("picture.mxf");
    let mut descriptor = EssenceDescriptor::new(EssenceKind::Jpeg2000, Fraction::new(24, 1));
    descriptor.stored_size = Some(Size::new(1998, 1080));
    let mut writer = MxfWriter::create(&picture_path, descriptor).unwrap();
    for _ in 0..FRAMES {
        writer.append_frame(&[0u8; 64]).unwrap();
    }
    writer.finalize().unwrap();

    let picture = Arc::new(PictureAsset::from_file(&picture_path).unwrap());
    let mut reel = Reel::new();
    reel.main_picture = Some(ReelPicture::from_asset(&picture, 0));
    let mut cpl = Cpl::new("Old Style", ContentKind::Test);
    cpl.add_reel(reel);

    let mut dcp = Dcp::new(dir.path()).unwrap();
    dcp.add_cpl(cpl);
    dcp.write_xml(
        Standard::Interop,
        &XmlMetadata::default(),
        None,
        &NameFormat::default(),
    )
    .unwrap();

    let notes = run_verify(dir.path());
    assert!(notes
        .iter()
        .any(|n| n.code() == VerificationCode::InvalidStandard));
}

#[test]
fn missing_assetmap_is_fatal_but_reported() {
    let dir = tempfile::tempdir().unwrap();
    let notes = run_verify(dir.path());
    assert!(notes
        .iter()
        .any(|n| n.code() == VerificationCode::FailedRead));
    assert!(notes
        .iter()
        .any(|n| n.code() == VerificationCode::MissingAssetmap));
}

#[test]
fn cancellation_returns_partial_notes() {
    let dir = tempfile::tempdir().unwrap();
    build_dcp(dir.path());

    let xsd = tempfile::tempdir().unwrap();
    let mut stage = |_: &str, _: Option<&Path>| {};
    // Cancel at the first progress report.
    let mut progress = |_: f32| false;
    let notes = verify(
        &[PathBuf::from(dir.path())],
        &mut stage,
        &mut progress,
        xsd.path(),
    )
    .unwrap();

    // The verify was abandoned mid-package; whatever was found so far is
    // still returned, without the checks that come after hashing.
    assert!(!notes
        .iter()
        .any(|n| n.code() == VerificationCode::MissingAssetmap));
}
