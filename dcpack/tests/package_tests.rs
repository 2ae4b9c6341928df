//! End-to-end authoring and re-reading of whole packages.

use dcpack::{
    Asset, ContentKind, Cpl, CompositionMetadata, Dcp, DecryptedKdm, DecryptedKdmKey,
    EqualityOptions, EssenceDescriptor, EssenceKind, Fraction, Marker, MxfWriter, NameFormat,
    NoteKind, PictureAsset, Reel, ReelMarkers, ReelPicture, ReelSound, Size, SoundAsset,
    Standard, Time, XmlMetadata,
};
use std::path::Path;
use std::sync::Arc;

const FRAMES: i64 = 24;

fn write_picture_mxf(path: &Path) {
    let mut descriptor = EssenceDescriptor::new(EssenceKind::Jpeg2000, Fraction::new(24, 1));
    descriptor.stored_size = Some(Size::new(1998, 1080));
    let mut writer = MxfWriter::create(path, descriptor).unwrap();
    for _ in 0..FRAMES {
        // A small stand-in for a 32x32 red-square codestream.
        writer.append_frame(&[0x42u8; 512]).unwrap();
    }
    writer.finalize().unwrap();
}

fn write_sound_mxf(path: &Path) {
    let mut descriptor = EssenceDescriptor::new(EssenceKind::Pcm, Fraction::new(24, 1));
    descriptor.sampling_rate = Some(48000);
    descriptor.channels = Some(1);
    let mut writer = MxfWriter::create(path, descriptor).unwrap();
    for _ in 0..FRAMES {
        // One frame of silence: 2000 samples at 24 fps, 24-bit mono.
        writer.append_frame(&[0u8; 2000 * 3]).unwrap();
    }
    writer.finalize().unwrap();
}

fn metadata() -> XmlMetadata {
    XmlMetadata {
        issuer: "dcpack test".to_string(),
        creator: "dcpack test".to_string(),
        issue_date: "2024-03-01T09:30:00.000+00:00".to_string(),
        annotation_text: "A Test DCP".to_string(),
    }
}

/// One CPL, one reel, 24 frames of picture and mono sound, full markers
/// and composition metadata.
fn build_minimal_dcp(directory: &Path) -> Dcp {
    write_picture_mxf(&directory.join("picture.mxf"));
    write_sound_mxf(&directory.join("sound.mxf"));

    let picture = Arc::new(PictureAsset::from_file(&directory.join("picture.mxf")).unwrap());
    let sound = Arc::new(SoundAsset::from_file(&directory.join("sound.mxf")).unwrap());

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
    cpl.issue_date = "2024-03-01T09:30:00.000+00:00".to_string();
    let mut meta = CompositionMetadata::new("A Test DCP");
    meta.main_picture_stored_area = Some(Size::new(1998, 1080));
    meta.main_sound_sample_rate = Some(48000);
    cpl.metadata = Some(meta);
    cpl.add_reel(reel);

    let mut dcp = Dcp::new(directory).unwrap();
    dcp.add_cpl(cpl);
    dcp.write_xml(Standard::Smpte, &metadata(), None, &NameFormat::default())
        .unwrap();
    dcp
}

#[test]
fn write_then_read_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let written = build_minimal_dcp(dir.path());

    let mut read = Dcp::new(dir.path()).unwrap();
    let mut notes = Vec::new();
    read.read(Some(&mut notes)).unwrap();

    assert!(notes.is_empty(), "{notes:?}");
    assert_eq!(read.standard(), Some(Standard::Smpte));
    assert_eq!(read.cpls().len(), 1);
    assert_eq!(read.pkls().len(), 1);

    let cpl = &read.cpls()[0];
    assert_eq!(cpl.content_title_text, "A Test DCP");
    assert_eq!(cpl.content_kind, ContentKind::Feature);
    assert_eq!(cpl.duration(), FRAMES);

    let reel = &cpl.reels()[0];
    let picture = reel.main_picture.as_ref().unwrap();
    assert!(picture.data.asset.is_resolved());
    assert_eq!(picture.data.intrinsic_duration, FRAMES);
    assert!(picture.data.hash.is_some());
    let sound = reel.main_sound.as_ref().unwrap();
    assert!(sound.data.asset.is_resolved());

    // The whole package compares equal to what was authored.
    let mut messages = Vec::new();
    let mut handler = |kind: NoteKind, text: &str| {
        messages.push((kind, text.to_string()));
    };
    assert!(
        written.equals(&read, &EqualityOptions::default(), &mut handler),
        "{messages:?}"
    );
}

#[test]
fn hashes_agree_between_cpl_pkl_and_disk() {
    let dir = tempfile::tempdir().unwrap();
    build_minimal_dcp(dir.path());

    let mut read = Dcp::new(dir.path()).unwrap();
    read.read(None).unwrap();

    let pkl = &read.pkls()[0];
    for cpl in read.cpls() {
        for data in cpl.reel_assets() {
            let asset = data.asset.asset().expect("resolved");
            let on_disk = asset.hash(None).unwrap();
            assert_eq!(data.hash.as_deref(), Some(on_disk.as_str()));
            assert_eq!(pkl.hash(data.id()), Some(on_disk.as_str()));
        }
    }
}

#[test]
fn asset_map_is_the_commit_point() {
    let dir = tempfile::tempdir().unwrap();
    build_minimal_dcp(dir.path());

    // Every file the asset map names must exist, with the recorded size.
    let map = dcpack::AssetMap::from_file(&dir.path().join("ASSETMAP.xml")).unwrap();
    assert_eq!(map.standard, Standard::Smpte);
    for entry in &map.entries {
        let file = dir.path().join(&entry.path);
        assert!(file.exists(), "{} missing", entry.path);
        if let Some(length) = entry.length {
            assert_eq!(std::fs::metadata(&file).unwrap().len(), length);
        }
    }
}

#[test]
fn equal_packages_compare_equal_and_tampered_sound_does_not() {
    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();
    let a = build_minimal_dcp(dir_a.path());
    let b = build_minimal_dcp(dir_b.path());

    let mut quiet = |_: NoteKind, _: &str| {};
    assert!(a.equals(&b, &EqualityOptions::default(), &mut quiet));

    // Nudge one sample of B's sound up by one LSB and rebuild B's view of
    // the world; the hash comparison must now fail.
    let sound_path = dir_b.path().join("sound.mxf");
    let mut bytes = std::fs::read(&sound_path).unwrap();
    let offset = bytes.len() - 100;
    bytes[offset] = bytes[offset].wrapping_add(1);
    std::fs::write(&sound_path, bytes).unwrap();

    let mut changed = Dcp::new(dir_b.path()).unwrap();
    changed.read(None).unwrap();
    let mut messages = Vec::new();
    let mut handler = |_: NoteKind, text: &str| messages.push(text.to_string());
    assert!(!a.equals(&changed, &EqualityOptions::default(), &mut handler));
    assert!(messages.iter().any(|m| m.contains("hash")), "{messages:?}");
}

#[test]
fn package_with_two_cpls_reads_both() {
    let dir = tempfile::tempdir().unwrap();
    write_picture_mxf(&dir.path().join("picture.mxf"));
    let picture = Arc::new(PictureAsset::from_file(&dir.path().join("picture.mxf")).unwrap());

    let mut dcp = Dcp::new(dir.path()).unwrap();
    for title in ["First Version", "Second Version"] {
        let mut reel = Reel::new();
        reel.main_picture = Some(ReelPicture::from_asset(&picture, 0));
        let mut cpl = Cpl::new(title, ContentKind::Feature);
        cpl.issue_date = "2024-03-01T09:30:00.000+00:00".to_string();
        cpl.add_reel(reel);
        dcp.add_cpl(cpl);
    }
    dcp.write_xml(Standard::Smpte, &metadata(), None, &NameFormat::default())
        .unwrap();

    let mut read = Dcp::new(dir.path()).unwrap();
    let mut notes = Vec::new();
    read.read(Some(&mut notes)).unwrap();
    assert_eq!(read.cpls().len(), 2);
    assert!(notes.is_empty(), "{notes:?}");
}

#[test]
fn applying_a_kdm_twice_equals_applying_it_once() {
    let dir = tempfile::tempdir().unwrap();

    // An encrypted picture: the MXF header declares a content-key id.
    let picture_path = dir.path().join("picture.mxf");
    let mut descriptor = EssenceDescriptor::new(EssenceKind::Jpeg2000, Fraction::new(24, 1));
    descriptor.stored_size = Some(Size::new(1998, 1080));
    descriptor.key_id = Some("be1a1b3e-7e2c-44a0-bf63-06c92c8472be".to_string());
    let mut writer = MxfWriter::create(&picture_path, descriptor).unwrap();
    for _ in 0..FRAMES {
        writer.append_frame(&[0u8; 64]).unwrap();
    }
    writer.finalize().unwrap();

    let picture = Arc::new(PictureAsset::from_file(&picture_path).unwrap());
    assert!(picture.encrypted());

    let mut reel = Reel::new();
    reel.main_picture = Some(ReelPicture::from_asset(&picture, 0));
    let mut cpl = Cpl::new("Encrypted", ContentKind::Feature);
    cpl.add_reel(reel);
    let cpl_id = cpl.id.clone();

    let mut dcp = Dcp::new(dir.path()).unwrap();
    dcp.add_cpl(cpl);

    let kdm = DecryptedKdm::new(vec![DecryptedKdmKey {
        cpl_id,
        key_type: Some("MDIK".to_string()),
        key_id: "be1a1b3e-7e2c-44a0-bf63-06c92c8472be".to_string(),
        not_valid_before: "2024-01-01T00:00:00+00:00".to_string(),
        not_valid_after: "2034-01-01T00:00:00+00:00".to_string(),
        key: [9u8; 16],
    }]);

    dcp.add_kdm(&kdm);
    dcp.add_kdm(&kdm);

    match &*picture {
        Asset::MonoPicture(_) => {
            assert_eq!(picture.content_key(), Some([9u8; 16]));
        }
        other => panic!("unexpected asset {other:?}"),
    }
}

#[test]
fn interop_package_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    write_picture_mxf(&dir.path().join("picture.mxf"));
    let picture = Arc::new(PictureAsset::from_file(&dir.path().join("picture.mxf")).unwrap());

    let mut reel = Reel::new();
    reel.main_picture = Some(ReelPicture::from_asset(&picture, 0));
    let mut cpl = Cpl::new("Interop Test", ContentKind::Test);
    cpl.add_reel(reel);

    let mut dcp = Dcp::new(dir.path()).unwrap();
    dcp.add_cpl(cpl);
    dcp.write_xml(Standard::Interop, &metadata(), None, &NameFormat::default())
        .unwrap();

    assert!(dir.path().join("ASSETMAP").exists());
    assert!(dir.path().join("VOLINDEX").exists());

    let mut read = Dcp::new(dir.path()).unwrap();
    read.read(None).unwrap();
    assert_eq!(read.standard(), Some(Standard::Interop));
    assert_eq!(read.cpls().len(), 1);
    assert_eq!(read.cpls()[0].standard(), Some(Standard::Interop));
}
