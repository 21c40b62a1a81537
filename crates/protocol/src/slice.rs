//! Sub-rectangle extraction from packed RGBA frames.
//!
//! Frames arrive as tightly packed RGBA bytes in row-major order with
//! no padding between rows. A [`SliceRegion`] names an axis-aligned
//! sub-rectangle of such a frame; extraction copies it row by row into
//! an equally tight destination buffer.

use serde::{Deserialize, Serialize};

/// Bytes per pixel in the RGBA frame format.
pub const BYTES_PER_PIXEL: usize = 4;

/// Byte length of a full packed RGBA frame.
pub fn frame_byte_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * BYTES_PER_PIXEL
}

/// Axis-aligned sub-rectangle of a frame, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliceRegion {
    /// Left edge within the frame.
    pub x: u32,
    /// Top edge within the frame.
    pub y: u32,
    /// Slice width. Must be nonzero to be useful.
    pub width: u32,
    /// Slice height. Must be nonzero to be useful.
    pub height: u32,
}

impl SliceRegion {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        SliceRegion {
            x,
            y,
            width,
            height,
        }
    }

    /// Combine the four optional wire fields into one region.
    ///
    /// The fields travel as independent optionals, but they are only
    /// meaningful together: all four present yields a region, all four
    /// absent yields `None`, and anything in between is an error
    /// naming the first missing field.
    pub fn from_optional_fields(
        x: Option<u32>,
        y: Option<u32>,
        width: Option<u32>,
        height: Option<u32>,
    ) -> Result<Option<SliceRegion>, &'static str> {
        if x.is_none() && y.is_none() && width.is_none() && height.is_none() {
            return Ok(None);
        }
        let x = x.ok_or("sliceX")?;
        let y = y.ok_or("sliceY")?;
        let width = width.ok_or("sliceWidth")?;
        let height = height.ok_or("sliceHeight")?;
        Ok(Some(SliceRegion::new(x, y, width, height)))
    }

    /// True when the region lies entirely within a frame of the given
    /// dimensions. Widths are checked with saturating arithmetic so a
    /// huge `x` cannot wrap into a false positive.
    pub fn fits_within(&self, frame_width: u32, frame_height: u32) -> bool {
        self.width > 0
            && self.height > 0
            && self.x.checked_add(self.width).is_some_and(|r| r <= frame_width)
            && self.y.checked_add(self.height).is_some_and(|b| b <= frame_height)
    }

    /// Byte length of the extracted slice.
    pub fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * BYTES_PER_PIXEL
    }

    /// Copy this region out of `frame` into `out`.
    ///
    /// `out` is cleared first and holds exactly [`byte_len`] bytes on
    /// return, rows packed top to bottom with no padding. The caller
    /// must have checked [`fits_within`] against the frame dimensions;
    /// the row arithmetic here assumes it.
    ///
    /// [`byte_len`]: SliceRegion::byte_len
    /// [`fits_within`]: SliceRegion::fits_within
    pub fn extract_into(&self, frame: &[u8], frame_width: u32, out: &mut Vec<u8>) {
        let frame_row = frame_width as usize * BYTES_PER_PIXEL;
        let slice_row = self.width as usize * BYTES_PER_PIXEL;

        out.clear();
        out.reserve(self.byte_len());
        for row in 0..self.height as usize {
            let src = (self.y as usize + row) * frame_row + self.x as usize * BYTES_PER_PIXEL;
            out.extend_from_slice(&frame[src..src + slice_row]);
        }
    }
}
