//! MXF partition packs.
//!
//! A DCP essence file opens with a header partition pack naming its
//! operational pattern and essence container, and closes with a footer
//! partition.

use crate::ul::{labels, UniversalLabel, UL};
use crate::Result;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use dcpack_core::MxfError;
use std::io::{Cursor, Write};

/// Partition kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionKind {
    /// Header partition.
    Header,
    /// Body partition.
    Body,
    /// Footer partition.
    Footer,
}

/// A parsed partition pack.
#[derive(Debug, Clone)]
pub struct Partition {
    /// Partition kind.
    pub kind: PartitionKind,
    /// Major version (should be 1).
    pub major_version: u16,
    /// Minor version.
    pub minor_version: u16,
    /// KAG size (key alignment grid).
    pub kag_size: u32,
    /// This partition's offset in the file.
    pub this_partition: u64,
    /// Previous partition offset.
    pub previous_partition: u64,
    /// Footer partition offset.
    pub footer_partition: u64,
    /// Header byte count.
    pub header_byte_count: u64,
    /// Index byte count.
    pub index_byte_count: u64,
    /// Index stream id.
    pub index_sid: u32,
    /// Body offset.
    pub body_offset: u64,
    /// Body stream id.
    pub body_sid: u32,
    /// Operational pattern.
    pub operational_pattern: UL,
    /// Essence container labels.
    pub essence_containers: Vec<UL>,
}

impl Partition {
    /// Parse a partition pack from the value bytes of its KLV, given the
    /// key that introduced it.
    pub fn parse(key: &UniversalLabel, value: &[u8]) -> Result<Self> {
        if !key.is_partition_pack() {
            return Err(MxfError::NotMxf("not a partition pack".into()));
        }
        if value.len() < 88 {
            return Err(MxfError::InsufficientData {
                needed: 88,
                available: value.len(),
            });
        }

        let kind = match key.as_bytes()[13] {
            0x02 => PartitionKind::Header,
            0x03 => PartitionKind::Body,
            _ => PartitionKind::Footer,
        };

        let mut cursor = Cursor::new(value);
        let major_version = cursor.read_u16::<BigEndian>()?;
        let minor_version = cursor.read_u16::<BigEndian>()?;
        let kag_size = cursor.read_u32::<BigEndian>()?;
        let this_partition = cursor.read_u64::<BigEndian>()?;
        let previous_partition = cursor.read_u64::<BigEndian>()?;
        let footer_partition = cursor.read_u64::<BigEndian>()?;
        let header_byte_count = cursor.read_u64::<BigEndian>()?;
        let index_byte_count = cursor.read_u64::<BigEndian>()?;
        let index_sid = cursor.read_u32::<BigEndian>()?;
        let body_offset = cursor.read_u64::<BigEndian>()?;
        let body_sid = cursor.read_u32::<BigEndian>()?;
        let mut operational_pattern = [0u8; 16];
        std::io::Read::read_exact(&mut cursor, &mut operational_pattern)?;

        // Essence container batch: item count, item size, then the labels.
        let count = cursor.read_u32::<BigEndian>()?;
        let item_size = cursor.read_u32::<BigEndian>()?;
        if item_size != 16 || count > 64 {
            return Err(MxfError::NotMxf("bad essence container batch".into()));
        }
        let mut essence_containers = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let mut label = [0u8; 16];
            std::io::Read::read_exact(&mut cursor, &mut label)?;
            essence_containers.push(label);
        }

        Ok(Partition {
            kind,
            major_version,
            minor_version,
            kag_size,
            this_partition,
            previous_partition,
            footer_partition,
            header_byte_count,
            index_byte_count,
            index_sid,
            body_offset,
            body_sid,
            operational_pattern,
            essence_containers,
        })
    }

    /// Serialise the partition pack value bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(88 + 16 * self.essence_containers.len());
        out.write_u16::<BigEndian>(self.major_version).unwrap();
        out.write_u16::<BigEndian>(self.minor_version).unwrap();
        out.write_u32::<BigEndian>(self.kag_size).unwrap();
        out.write_u64::<BigEndian>(self.this_partition).unwrap();
        out.write_u64::<BigEndian>(self.previous_partition).unwrap();
        out.write_u64::<BigEndian>(self.footer_partition).unwrap();
        out.write_u64::<BigEndian>(self.header_byte_count).unwrap();
        out.write_u64::<BigEndian>(self.index_byte_count).unwrap();
        out.write_u32::<BigEndian>(self.index_sid).unwrap();
        out.write_u64::<BigEndian>(self.body_offset).unwrap();
        out.write_u32::<BigEndian>(self.body_sid).unwrap();
        out.write_all(&self.operational_pattern).unwrap();
        out.write_u32::<BigEndian>(self.essence_containers.len() as u32)
            .unwrap();
        out.write_u32::<BigEndian>(16).unwrap();
        for label in &self.essence_containers {
            out.write_all(label).unwrap();
        }
        out
    }

    /// A header partition for a single essence container.
    pub fn header(essence_container: UL) -> Self {
        Partition {
            kind: PartitionKind::Header,
            major_version: 1,
            minor_version: 3,
            kag_size: 1,
            this_partition: 0,
            previous_partition: 0,
            footer_partition: 0,
            header_byte_count: 0,
            index_byte_count: 0,
            index_sid: 0,
            body_offset: 0,
            body_sid: 1,
            operational_pattern: labels::OP1A,
            essence_containers: vec![essence_container],
        }
    }

    /// A footer partition referring back to the header.
    pub fn footer(this_partition: u64, essence_container: UL) -> Self {
        Partition {
            kind: PartitionKind::Footer,
            this_partition,
            ..Partition::header(essence_container)
        }
    }

    /// The partition pack key for this partition's kind.
    pub fn pack_key(&self) -> UniversalLabel {
        match self.kind {
            PartitionKind::Header => UniversalLabel(labels::HEADER_PARTITION_CLOSED_COMPLETE),
            PartitionKind::Body => {
                let mut key = labels::HEADER_PARTITION_CLOSED_COMPLETE;
                key[13] = 0x03;
                UniversalLabel(key)
            }
            PartitionKind::Footer => UniversalLabel(labels::FOOTER_PARTITION),
        }
    }
}
