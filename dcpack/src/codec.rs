//! The JPEG 2000 codec seam.
//!
//! The package layer never compresses or decompresses picture data itself;
//! whoever produces or consumes frames plugs a codec in through this
//! trait. Hash and frame-size verification work on the compressed bytes
//! and need no codec at all.

use dcpack_core::{Result, Size};

/// A 12-bit XYZ picture, one plane per component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XyzImage {
    /// Pixel dimensions.
    pub size: Size,
    /// X, Y and Z planes, each `size.width * size.height` samples.
    pub planes: [Vec<i32>; 3],
}

impl XyzImage {
    /// An all-black image.
    pub fn new(size: Size) -> Self {
        let samples = (size.width * size.height) as usize;
        XyzImage {
            size,
            planes: [vec![0; samples], vec![0; samples], vec![0; samples]],
        }
    }
}

/// Compression and decompression of DCI picture frames.
pub trait Jpeg2000Codec {
    /// Compress one frame to a codestream no larger than `bandwidth` bits
    /// per second allows at `frames_per_second`; halve the budget per eye
    /// when `three_d`.
    fn encode(
        &self,
        image: &XyzImage,
        bandwidth: i64,
        frames_per_second: i64,
        three_d: bool,
        four_k: bool,
    ) -> Result<Vec<u8>>;

    /// Decompress a codestream, scaling down by `2^reduce`.
    fn decode(&self, data: &[u8], reduce: u32) -> Result<XyzImage>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_black_image_dimensions() {
        let image = XyzImage::new(Size::new(32, 32));
        assert_eq!(image.planes[0].len(), 1024);
        assert!(image.planes.iter().all(|p| p.iter().all(|&s| s == 0)));
    }
}
