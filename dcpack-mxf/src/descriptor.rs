//! Essence descriptors.
//!
//! The header metadata of a DCP essence file carries one descriptor local
//! set; it is the source of truth for edit rate, intrinsic duration and,
//! for encrypted essence, the content-key id.

use crate::ul::{labels, UniversalLabel, UL};
use crate::Result;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use dcpack_core::{Fraction, MxfError, Size};
use std::io::Cursor;
use uuid::Uuid;

/// The kinds of essence a DCP may wrap in MXF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EssenceKind {
    /// JPEG 2000 picture frames.
    Jpeg2000,
    /// PCM sound frames.
    Pcm,
    /// Dolby Atmos bitstream frames.
    Atmos,
    /// SMPTE timed text (subtitle XML plus ancillary resources).
    TimedText,
}

impl EssenceKind {
    /// The essence container label announced in the partition pack.
    pub fn container_label(&self) -> UL {
        match self {
            EssenceKind::Jpeg2000 => labels::EC_JPEG2000,
            EssenceKind::Pcm => labels::EC_PCM,
            EssenceKind::Atmos => labels::EC_ATMOS,
            EssenceKind::TimedText => labels::EC_TIMED_TEXT,
        }
    }

    /// The descriptor local-set key.
    pub fn descriptor_key(&self) -> UL {
        match self {
            EssenceKind::Jpeg2000 => labels::PICTURE_DESCRIPTOR,
            EssenceKind::Pcm => labels::SOUND_DESCRIPTOR,
            EssenceKind::Atmos => labels::ATMOS_DESCRIPTOR,
            EssenceKind::TimedText => labels::TIMED_TEXT_DESCRIPTOR,
        }
    }

    /// The essence element key used for frames.
    pub fn element_key(&self) -> UL {
        match self {
            EssenceKind::Jpeg2000 => labels::EE_JPEG2000,
            EssenceKind::Pcm => labels::EE_PCM,
            EssenceKind::Atmos => labels::EE_ATMOS,
            EssenceKind::TimedText => labels::EE_TIMED_TEXT,
        }
    }

    /// Identify a kind from an essence container label.
    pub fn from_container_label(label: &UL) -> Option<Self> {
        let candidate = UniversalLabel(*label);
        for kind in [
            EssenceKind::Jpeg2000,
            EssenceKind::Pcm,
            EssenceKind::Atmos,
            EssenceKind::TimedText,
        ] {
            if candidate.matches_base(&kind.container_label()) {
                return Some(kind);
            }
        }
        None
    }
}

// Local-set tags, per the SMPTE metadata registry where one exists.
const TAG_EDIT_RATE: u16 = 0x3001;
const TAG_CONTAINER_DURATION: u16 = 0x3002;
const TAG_STORED_HEIGHT: u16 = 0x3202;
const TAG_STORED_WIDTH: u16 = 0x3203;
const TAG_FRAME_LAYOUT: u16 = 0x320C;
const TAG_AUDIO_SAMPLING_RATE: u16 = 0x3D03;
const TAG_CHANNEL_COUNT: u16 = 0x3D07;
const TAG_ATMOS_FIRST_FRAME: u16 = 0x7A01;
const TAG_ATMOS_MAX_CHANNELS: u16 = 0x7A02;
const TAG_ATMOS_MAX_OBJECTS: u16 = 0x7A03;

/// A decoded essence descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EssenceDescriptor {
    /// What the file contains.
    pub kind: EssenceKind,
    /// Edit rate of the essence.
    pub edit_rate: Fraction,
    /// Total number of edit units in the file.
    pub intrinsic_duration: i64,
    /// Content-key id if the essence is encrypted.
    pub key_id: Option<String>,
    /// Stored picture size.
    pub stored_size: Option<Size>,
    /// Whether picture frames are stereoscopic pairs.
    pub stereoscopic: bool,
    /// Audio sampling rate in hertz.
    pub sampling_rate: Option<i64>,
    /// Audio channel count.
    pub channels: Option<u32>,
    /// First frame of an Atmos bitstream.
    pub atmos_first_frame: Option<i64>,
    /// Maximum channel count of an Atmos bitstream.
    pub atmos_max_channel_count: Option<u32>,
    /// Maximum object count of an Atmos bitstream.
    pub atmos_max_object_count: Option<u32>,
}

impl EssenceDescriptor {
    /// A descriptor with only the universal fields set.
    pub fn new(kind: EssenceKind, edit_rate: Fraction) -> Self {
        EssenceDescriptor {
            kind,
            edit_rate,
            intrinsic_duration: 0,
            key_id: None,
            stored_size: None,
            stereoscopic: false,
            sampling_rate: None,
            channels: None,
            atmos_first_frame: None,
            atmos_max_channel_count: None,
            atmos_max_object_count: None,
        }
    }

    /// Serialise as local-set bytes. Returns the bytes and the offset of
    /// the eight-byte container-duration value within them, so a writer
    /// can patch the duration when it finalises.
    pub fn to_local_set(&self) -> (Vec<u8>, usize) {
        let mut out = Vec::new();

        let put = |out: &mut Vec<u8>, tag: u16, value: &[u8]| {
            out.write_u16::<BigEndian>(tag).unwrap();
            out.write_u16::<BigEndian>(value.len() as u16).unwrap();
            out.extend_from_slice(value);
        };

        let mut rate = Vec::new();
        rate.write_u32::<BigEndian>(self.edit_rate.numerator as u32)
            .unwrap();
        rate.write_u32::<BigEndian>(self.edit_rate.denominator as u32)
            .unwrap();
        put(&mut out, TAG_EDIT_RATE, &rate);

        out.write_u16::<BigEndian>(TAG_CONTAINER_DURATION).unwrap();
        out.write_u16::<BigEndian>(8).unwrap();
        let duration_offset = out.len();
        out.write_u64::<BigEndian>(self.intrinsic_duration as u64)
            .unwrap();

        if let Some(size) = self.stored_size {
            put(&mut out, TAG_STORED_WIDTH, &size.width.to_be_bytes());
            put(&mut out, TAG_STORED_HEIGHT, &size.height.to_be_bytes());
        }
        if self.kind == EssenceKind::Jpeg2000 {
            put(
                &mut out,
                TAG_FRAME_LAYOUT,
                &[if self.stereoscopic { 1 } else { 0 }],
            );
        }
        if let Some(sampling) = self.sampling_rate {
            let mut v = Vec::new();
            v.write_u32::<BigEndian>(sampling as u32).unwrap();
            v.write_u32::<BigEndian>(1).unwrap();
            put(&mut out, TAG_AUDIO_SAMPLING_RATE, &v);
        }
        if let Some(channels) = self.channels {
            put(&mut out, TAG_CHANNEL_COUNT, &channels.to_be_bytes());
        }
        if let Some(first) = self.atmos_first_frame {
            put(&mut out, TAG_ATMOS_FIRST_FRAME, &(first as u64).to_be_bytes());
        }
        if let Some(max) = self.atmos_max_channel_count {
            put(&mut out, TAG_ATMOS_MAX_CHANNELS, &max.to_be_bytes());
        }
        if let Some(max) = self.atmos_max_object_count {
            put(&mut out, TAG_ATMOS_MAX_OBJECTS, &max.to_be_bytes());
        }

        (out, duration_offset)
    }

    /// Parse local-set bytes into a descriptor of the given kind.
    pub fn from_local_set(kind: EssenceKind, data: &[u8]) -> Result<Self> {
        let mut descriptor = EssenceDescriptor::new(kind, Fraction::new(24, 1));
        let mut cursor = Cursor::new(data);

        while (cursor.position() as usize) + 4 <= data.len() {
            let tag = cursor.read_u16::<BigEndian>()?;
            let length = cursor.read_u16::<BigEndian>()? as usize;
            let start = cursor.position() as usize;
            if start + length > data.len() {
                return Err(MxfError::InsufficientData {
                    needed: length,
                    available: data.len() - start,
                });
            }
            let value = &data[start..start + length];
            cursor.set_position((start + length) as u64);

            let mut v = Cursor::new(value);
            match tag {
                TAG_EDIT_RATE if length == 8 => {
                    let numerator = v.read_u32::<BigEndian>()? as i64;
                    let denominator = v.read_u32::<BigEndian>()? as i64;
                    if denominator > 0 {
                        descriptor.edit_rate = Fraction::new(numerator, denominator);
                    }
                }
                TAG_CONTAINER_DURATION if length == 8 => {
                    descriptor.intrinsic_duration = v.read_u64::<BigEndian>()? as i64;
                }
                TAG_STORED_WIDTH if length == 4 => {
                    let width = v.read_u32::<BigEndian>()?;
                    let height = descriptor.stored_size.map_or(0, |s| s.height);
                    descriptor.stored_size = Some(Size::new(width, height));
                }
                TAG_STORED_HEIGHT if length == 4 => {
                    let height = v.read_u32::<BigEndian>()?;
                    let width = descriptor.stored_size.map_or(0, |s| s.width);
                    descriptor.stored_size = Some(Size::new(width, height));
                }
                TAG_FRAME_LAYOUT if length == 1 => {
                    descriptor.stereoscopic = value[0] != 0;
                }
                TAG_AUDIO_SAMPLING_RATE if length == 8 => {
                    let numerator = v.read_u32::<BigEndian>()? as i64;
                    let denominator = v.read_u32::<BigEndian>()? as i64;
                    if denominator > 0 {
                        descriptor.sampling_rate = Some(numerator / denominator);
                    }
                }
                TAG_CHANNEL_COUNT if length == 4 => {
                    descriptor.channels = Some(v.read_u32::<BigEndian>()?);
                }
                TAG_ATMOS_FIRST_FRAME if length == 8 => {
                    descriptor.atmos_first_frame = Some(v.read_u64::<BigEndian>()? as i64);
                }
                TAG_ATMOS_MAX_CHANNELS if length == 4 => {
                    descriptor.atmos_max_channel_count = Some(v.read_u32::<BigEndian>()?);
                }
                TAG_ATMOS_MAX_OBJECTS if length == 4 => {
                    descriptor.atmos_max_object_count = Some(v.read_u32::<BigEndian>()?);
                }
                _ => {}
            }
        }

        Ok(descriptor)
    }
}

/// Encode a content-key id as cryptographic-context value bytes.
pub fn encode_key_id(key_id: &str) -> Result<[u8; 16]> {
    let uuid = Uuid::parse_str(key_id)
        .map_err(|_| MxfError::NotMxf(format!("bad key id '{key_id}'")))?;
    Ok(*uuid.as_bytes())
}

/// Decode cryptographic-context value bytes into a key-id string.
pub fn decode_key_id(value: &[u8]) -> Result<String> {
    if value.len() != 16 {
        return Err(MxfError::InsufficientData {
            needed: 16,
            available: value.len(),
        });
    }
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(value);
    Ok(Uuid::from_bytes(bytes).to_string())
}
