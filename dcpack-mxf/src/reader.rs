//! Reading DCP essence files.
//!
//! [`MxfReader`] opens a file, fills its essence descriptor from the header
//! metadata and indexes the essence elements so frames can be fetched by
//! edit unit.

use crate::descriptor::{decode_key_id, EssenceDescriptor, EssenceKind};
use crate::klv::KlvScanner;
use crate::partition::{Partition, PartitionKind};
use crate::Result;
use dcpack_core::MxfError;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::debug;

/// A reader over one MXF-wrapped essence file.
pub struct MxfReader {
    path: PathBuf,
    file: BufReader<File>,
    descriptor: EssenceDescriptor,
    frames: Vec<(u64, u64)>,
    key: Option<[u8; 16]>,
}

impl MxfReader {
    /// Open a file and parse its structure.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let mut scanner = KlvScanner::new(BufReader::new(file))?;

        let first = scanner
            .next_header()?
            .ok_or_else(|| MxfError::NotMxf(format!("{} is empty", path.display())))?;
        if !first.key.is_partition_pack() {
            return Err(MxfError::NotMxf(format!(
                "{} does not start with a partition pack",
                path.display()
            )));
        }
        let header_value = scanner.read_value(&first)?;
        let header = Partition::parse(&first.key, &header_value)?;
        if header.kind != PartitionKind::Header {
            return Err(MxfError::NotMxf(format!(
                "{} does not start with a header partition",
                path.display()
            )));
        }

        let kind = header
            .essence_containers
            .iter()
            .find_map(EssenceKind::from_container_label)
            .ok_or_else(|| MxfError::UnknownEssence(path.to_path_buf()))?;

        let mut descriptor = None;
        let mut key_id = None;
        let mut frames = Vec::new();

        while let Some(klv) = scanner.next_header()? {
            if klv.key.is_essence() {
                frames.push((klv.value_offset, klv.length));
                scanner.skip_value(&klv)?;
            } else if klv.key.matches_base(&kind.descriptor_key()) {
                let value = scanner.read_value(&klv)?;
                descriptor = Some(EssenceDescriptor::from_local_set(kind, &value)?);
            } else if klv
                .key
                .matches_base(&crate::ul::labels::CRYPTOGRAPHIC_CONTEXT)
            {
                let value = scanner.read_value(&klv)?;
                key_id = Some(decode_key_id(&value)?);
            } else {
                scanner.skip_value(&klv)?;
            }
        }

        let mut descriptor = descriptor.ok_or_else(|| MxfError::MissingDescriptor(path.to_path_buf()))?;
        descriptor.key_id = key_id;
        if descriptor.intrinsic_duration == 0 {
            descriptor.intrinsic_duration = frames.len() as i64;
        }

        debug!(
            path = %path.display(),
            kind = ?descriptor.kind,
            duration = descriptor.intrinsic_duration,
            "opened MXF"
        );

        Ok(MxfReader {
            path: path.to_path_buf(),
            file: BufReader::new(File::open(path)?),
            descriptor,
            frames,
            key: None,
        })
    }

    /// Fill just the descriptor, without keeping a reader open.
    pub fn probe(path: &Path) -> Result<EssenceDescriptor> {
        Ok(Self::open(path)?.descriptor)
    }

    /// The file this reader is over.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The essence descriptor.
    pub fn descriptor(&self) -> &EssenceDescriptor {
        &self.descriptor
    }

    /// Number of indexed frames.
    pub fn frame_count(&self) -> i64 {
        self.frames.len() as i64
    }

    /// Size in bytes of frame `index`.
    pub fn frame_size(&self, index: i64) -> Result<u64> {
        self.frame(index).map(|(_, length)| length)
    }

    /// Read the bytes of frame `index`.
    pub fn read_frame(&mut self, index: i64) -> Result<Vec<u8>> {
        let (offset, length) = self.frame(index)?;
        self.file.seek(SeekFrom::Start(offset))?;
        let mut value = vec![0u8; length as usize];
        self.file.read_exact(&mut value)?;
        Ok(value)
    }

    /// Attach a decrypted content key for this file's essence.
    ///
    /// The reader only stores the key; decryption belongs to the essence
    /// codec behind it. Attaching the same key twice is a no-op.
    pub fn attach_key(&mut self, key: [u8; 16]) {
        self.key = Some(key);
    }

    /// The attached content key, if any.
    pub fn key(&self) -> Option<&[u8; 16]> {
        self.key.as_ref()
    }

    fn frame(&self, index: i64) -> Result<(u64, u64)> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.frames.get(i).copied())
            .ok_or(MxfError::FrameOutOfRange {
                frame: index,
                frames: self.frames.len() as i64,
            })
    }
}
