//! Decoded video frames.

/// A single decoded frame, owned by whichever pipeline stage is
/// currently scoring it and dropped immediately afterwards so a job
/// never holds more than a handful of frames in memory.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Ordinal position within the sampled stream (0-based).
    pub index: u64,
    /// Offset from media start, in seconds.
    pub timestamp: f64,
    /// Raw RGB pixel buffer (width * height * 3 bytes).
    pub image: Vec<u8>,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Frame {
    pub fn new(index: u64, timestamp: f64, image: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            index,
            timestamp,
            image,
            width,
            height,
        }
    }

    /// Expected buffer length for the frame dimensions.
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }

    /// Whether the pixel buffer matches the declared dimensions.
    pub fn is_well_formed(&self) -> bool {
        self.image.len() == self.expected_len()
    }
}
