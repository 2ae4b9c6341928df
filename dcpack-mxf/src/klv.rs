//! KLV (Key-Length-Value) triplet handling.
//!
//! All data in MXF files is encoded as KLV triplets:
//! - Key: 16-byte Universal Label identifying the data
//! - Length: BER-encoded length of the value
//! - Value: the actual data

use crate::ul::UniversalLabel;
use crate::Result;
use dcpack_core::MxfError;
use std::io::{Read, Seek, SeekFrom, Write};

/// Header of a KLV triplet: the key, the decoded length and where the value
/// starts in the stream.
#[derive(Debug, Clone, Copy)]
pub struct KlvHeader {
    /// Universal Label (key).
    pub key: UniversalLabel,
    /// Length of the value in bytes.
    pub length: u64,
    /// File offset of the start of the key.
    pub offset: u64,
    /// File offset of the start of the value.
    pub value_offset: u64,
}

/// Streaming scanner over the KLV triplets of a file.
pub struct KlvScanner<R: Read + Seek> {
    reader: R,
    offset: u64,
}

impl<R: Read + Seek> KlvScanner<R> {
    /// Create a scanner positioned at the start of the stream.
    pub fn new(mut reader: R) -> Result<Self> {
        reader.seek(SeekFrom::Start(0))?;
        Ok(KlvScanner { reader, offset: 0 })
    }

    /// Current stream offset.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Read the next KLV header, leaving the stream at the start of the
    /// value. Returns `None` at a clean end of stream.
    pub fn next_header(&mut self) -> Result<Option<KlvHeader>> {
        let mut key = [0u8; 16];
        let mut filled = 0;
        while filled < 16 {
            let n = self.reader.read(&mut key[filled..])?;
            if n == 0 {
                if filled == 0 {
                    return Ok(None);
                }
                return Err(MxfError::InsufficientData {
                    needed: 16,
                    available: filled,
                });
            }
            filled += n;
        }

        let start = self.offset;
        let (length, length_size) = self.read_ber_length(start + 16)?;
        let value_offset = start + 16 + length_size;
        self.offset = value_offset;

        Ok(Some(KlvHeader {
            key: UniversalLabel(key),
            length,
            offset: start,
            value_offset,
        }))
    }

    /// Read the value of the header just returned by [`next_header`].
    ///
    /// [`next_header`]: KlvScanner::next_header
    pub fn read_value(&mut self, header: &KlvHeader) -> Result<Vec<u8>> {
        let mut value = vec![0u8; header.length as usize];
        self.reader.read_exact(&mut value).map_err(|_| {
            MxfError::InsufficientData {
                needed: header.length as usize,
                available: 0,
            }
        })?;
        self.offset = header.value_offset + header.length;
        Ok(value)
    }

    /// Skip over the value of the header just returned by [`next_header`].
    ///
    /// [`next_header`]: KlvScanner::next_header
    pub fn skip_value(&mut self, header: &KlvHeader) -> Result<()> {
        self.offset = header.value_offset + header.length;
        self.reader.seek(SeekFrom::Start(self.offset))?;
        Ok(())
    }

    fn read_ber_length(&mut self, offset: u64) -> Result<(u64, u64)> {
        let mut first = [0u8; 1];
        self.reader
            .read_exact(&mut first)
            .map_err(|_| MxfError::InvalidLength { offset })?;
        let first = first[0];

        if first & 0x80 == 0 {
            return Ok((first as u64, 1));
        }

        let count = (first & 0x7F) as usize;
        if count == 0 || count > 8 {
            return Err(MxfError::InvalidLength { offset });
        }
        let mut bytes = [0u8; 8];
        self.reader
            .read_exact(&mut bytes[..count])
            .map_err(|_| MxfError::InvalidLength { offset })?;
        let mut length: u64 = 0;
        for b in &bytes[..count] {
            length = (length << 8) | *b as u64;
        }
        Ok((length, 1 + count as u64))
    }
}

/// Encode a length in BER long form with a three-byte body.
pub fn encode_ber_length(length: usize) -> [u8; 4] {
    let l = length as u32;
    [0x83, (l >> 16) as u8, (l >> 8) as u8, l as u8]
}

/// Write one KLV triplet and return the number of bytes written.
pub fn write_klv<W: Write>(writer: &mut W, key: &UniversalLabel, value: &[u8]) -> Result<usize> {
    writer.write_all(key.as_bytes())?;
    writer.write_all(&encode_ber_length(value.len()))?;
    writer.write_all(value)?;
    Ok(16 + 4 + value.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ul::labels;
    use std::io::Cursor;

    #[test]
    fn test_round_trip() {
        let mut buffer = Vec::new();
        let key = UniversalLabel(labels::EE_PCM);
        let written = write_klv(&mut buffer, &key, b"hello").unwrap();
        assert_eq!(written, buffer.len());

        let mut scanner = KlvScanner::new(Cursor::new(buffer)).unwrap();
        let header = scanner.next_header().unwrap().unwrap();
        assert_eq!(header.key, key);
        assert_eq!(header.length, 5);
        assert_eq!(scanner.read_value(&header).unwrap(), b"hello");
        assert!(scanner.next_header().unwrap().is_none());
    }

    #[test]
    fn test_short_form_length() {
        let mut data = Vec::new();
        data.extend_from_slice(&labels::EE_PCM);
        data.push(0x03);
        data.extend_from_slice(b"abc");

        let mut scanner = KlvScanner::new(Cursor::new(data)).unwrap();
        let header = scanner.next_header().unwrap().unwrap();
        assert_eq!(header.length, 3);
        assert_eq!(header.value_offset, 17);
    }

    #[test]
    fn test_skip_value() {
        let mut buffer = Vec::new();
        write_klv(&mut buffer, &UniversalLabel(labels::FILL_ITEM), &[0; 32]).unwrap();
        write_klv(&mut buffer, &UniversalLabel(labels::EE_PCM), b"x").unwrap();

        let mut scanner = KlvScanner::new(Cursor::new(buffer)).unwrap();
        let fill = scanner.next_header().unwrap().unwrap();
        assert!(fill.key.is_fill_item());
        scanner.skip_value(&fill).unwrap();
        let essence = scanner.next_header().unwrap().unwrap();
        assert!(essence.key.is_essence());
    }

    #[test]
    fn test_truncated_key() {
        let mut scanner = KlvScanner::new(Cursor::new(vec![0u8; 7])).unwrap();
        assert!(scanner.next_header().is_err());
    }
}
