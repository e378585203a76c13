use std::fmt;
use std::str::FromStr;

use crate::DecoderError;

/// Channel order of a packed 3-byte-per-pixel buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelLayout {
    #[default]
    Rgb24,
    Bgr24,
}

impl PixelLayout {
    pub const BYTES_PER_PIXEL: usize = 3;

    pub fn as_str(self) -> &'static str {
        match self {
            PixelLayout::Rgb24 => "rgb24",
            PixelLayout::Bgr24 => "bgr24",
        }
    }
}

impl fmt::Display for PixelLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub struct PixelLayoutParseError(pub String);

impl fmt::Display for PixelLayoutParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown pixel layout '{}'", self.0)
    }
}

impl std::error::Error for PixelLayoutParseError {}

impl FromStr for PixelLayout {
    type Err = PixelLayoutParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        match lower.as_str() {
            "rgb" | "rgb24" => Ok(PixelLayout::Rgb24),
            "bgr" | "bgr24" => Ok(PixelLayout::Bgr24),
            _ => Err(PixelLayoutParseError(lower)),
        }
    }
}

/// A decoded picture converted to a tightly packed, row-major buffer.
///
/// The buffer always holds exactly `width * height * 3` bytes with no row
/// padding; the constructor rejects anything else.
#[derive(Debug, Clone, PartialEq)]
pub struct RgbFrame {
    width: u32,
    height: u32,
    timestamp: f64,
    layout: PixelLayout,
    data: Vec<u8>,
}

impl RgbFrame {
    pub fn new(
        width: u32,
        height: u32,
        timestamp: f64,
        layout: PixelLayout,
        data: Vec<u8>,
    ) -> Result<Self, DecoderError> {
        let expected = Self::packed_len(width, height);
        if data.len() != expected {
            return Err(DecoderError::Convert(format!(
                "packed buffer holds {} bytes, expected {expected} for {width}x{height}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            timestamp,
            layout,
            data,
        })
    }

    pub fn packed_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * PixelLayout::BYTES_PER_PIXEL
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Presentation time in seconds.
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    pub fn layout(&self) -> PixelLayout {
        self.layout
    }

    pub fn stride(&self) -> usize {
        self.width as usize * PixelLayout::BYTES_PER_PIXEL
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Returns the pixel at `(x, y)` as `[r, g, b]` regardless of layout.
    pub fn rgb_at(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = y as usize * self.stride() + x as usize * PixelLayout::BYTES_PER_PIXEL;
        let px = &self.data[offset..offset + PixelLayout::BYTES_PER_PIXEL];
        Some(match self.layout {
            PixelLayout::Rgb24 => [px[0], px[1], px[2]],
            PixelLayout::Bgr24 => [px[2], px[1], px[0]],
        })
    }
}
