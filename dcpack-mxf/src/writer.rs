//! Writing DCP essence files.
//!
//! [`MxfWriter`] is the authoring seam: open for write, append frames,
//! finalise. It emits a single-essence file (header partition, descriptor,
//! frames, footer partition) that [`MxfReader`] round-trips.
//!
//! [`MxfReader`]: crate::reader::MxfReader

use crate::descriptor::{encode_key_id, EssenceDescriptor};
use crate::klv::write_klv;
use crate::partition::Partition;
use crate::ul::UniversalLabel;
use crate::Result;
use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// A writer for one MXF-wrapped essence file.
pub struct MxfWriter {
    path: PathBuf,
    file: BufWriter<File>,
    descriptor: EssenceDescriptor,
    frames_written: i64,
    offset: u64,
    duration_value_offset: u64,
}

impl MxfWriter {
    /// Create a file and write its header structures.
    ///
    /// The descriptor's `intrinsic_duration` is ignored; the real frame
    /// count is patched in by [`finalize`].
    ///
    /// [`finalize`]: MxfWriter::finalize
    pub fn create(path: &Path, descriptor: EssenceDescriptor) -> Result<Self> {
        let file = File::create(path)?;
        let mut writer = MxfWriter {
            path: path.to_path_buf(),
            file: BufWriter::new(file),
            descriptor,
            frames_written: 0,
            offset: 0,
            duration_value_offset: 0,
        };

        let header = Partition::header(writer.descriptor.kind.container_label());
        writer.write_triplet(&header.pack_key(), &header.to_bytes())?;

        if let Some(key_id) = writer.descriptor.key_id.clone() {
            let value = encode_key_id(&key_id)?;
            writer.write_triplet(
                &UniversalLabel(crate::ul::labels::CRYPTOGRAPHIC_CONTEXT),
                &value,
            )?;
        }

        let (local_set, duration_offset) = writer.descriptor.to_local_set();
        // 16-byte key plus 4-byte BER length precede the local-set value.
        writer.duration_value_offset = writer.offset + 20 + duration_offset as u64;
        writer.write_triplet(
            &UniversalLabel(writer.descriptor.kind.descriptor_key()),
            &local_set,
        )?;

        Ok(writer)
    }

    /// Append one frame of essence.
    pub fn append_frame(&mut self, frame: &[u8]) -> Result<()> {
        let key = UniversalLabel(self.descriptor.kind.element_key());
        self.write_triplet(&key, frame)?;
        self.frames_written += 1;
        Ok(())
    }

    /// Number of frames appended so far.
    pub fn frames_written(&self) -> i64 {
        self.frames_written
    }

    /// Write the footer partition and patch the container duration.
    pub fn finalize(mut self) -> Result<()> {
        let footer = Partition::footer(self.offset, self.descriptor.kind.container_label());
        self.write_triplet(&footer.pack_key(), &footer.to_bytes())?;

        self.file.flush()?;
        let mut file = self.file.into_inner().map_err(|e| e.into_error())?;
        file.seek(SeekFrom::Start(self.duration_value_offset))?;
        file.write_all(&(self.frames_written as u64).to_be_bytes())?;
        file.sync_all()?;

        debug!(
            path = %self.path.display(),
            frames = self.frames_written,
            "finalised MXF"
        );
        Ok(())
    }

    fn write_triplet(&mut self, key: &UniversalLabel, value: &[u8]) -> Result<()> {
        let written = write_klv(&mut self.file, key, value)?;
        self.offset += written as u64;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::EssenceKind;
    use crate::reader::MxfReader;
    use dcpack_core::Fraction;

    #[test]
    fn test_empty_file_has_zero_duration() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.mxf");

        let descriptor = EssenceDescriptor::new(EssenceKind::Atmos, Fraction::new(24, 1));
        MxfWriter::create(&path, descriptor).unwrap().finalize().unwrap();

        let reader = MxfReader::open(&path).unwrap();
        assert_eq!(reader.descriptor().intrinsic_duration, 0);
        assert_eq!(reader.frame_count(), 0);
    }

    #[test]
    fn test_duration_patched_on_finalize() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("three.mxf");

        let descriptor = EssenceDescriptor::new(EssenceKind::Jpeg2000, Fraction::new(24, 1));
        let mut writer = MxfWriter::create(&path, descriptor).unwrap();
        for _ in 0..3 {
            writer.append_frame(&[1, 2, 3]).unwrap();
        }
        writer.finalize().unwrap();

        let reader = MxfReader::open(&path).unwrap();
        assert_eq!(reader.descriptor().intrinsic_duration, 3);
    }
}
