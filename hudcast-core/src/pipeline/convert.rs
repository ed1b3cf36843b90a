//! Raw frame → dense HUD bitmap conversion.
//!
//! The HUD takes 32-bit pixels in R, G, B, A byte order with no row
//! padding. Source rows are copied one at a time, skipping the stride
//! padding; BGRA sources get their red and blue channels swapped and
//! RGBX sources get an opaque alpha.

use bytes::Bytes;

use crate::capture::{PixelFormat, RawFrame};
use crate::error::FrameError;

/// Bytes per pixel of a [`ConvertedBitmap`].
pub const BITMAP_BPP: usize = 4;

// ── ConvertedBitmap ──────────────────────────────────────────────

/// Exactly `width × height` RGBA pixels, rows packed back to back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedBitmap {
    width: u32,
    height: u32,
    pixels: Bytes,
}

impl ConvertedBitmap {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &Bytes {
        &self.pixels
    }

    /// The RGBA value at `(x, y)`, if in bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * BITMAP_BPP;
        self.pixels
            .get(offset..offset + BITMAP_BPP)
            .and_then(|px| px.try_into().ok())
    }
}

// ── PixelConverter ───────────────────────────────────────────────

/// Stateless converter from provider buffers to HUD bitmaps.
#[derive(Debug, Clone, Copy, Default)]
pub struct PixelConverter;

impl PixelConverter {
    pub fn new() -> Self {
        Self
    }

    /// Convert `frame`, which must be `width × height`.
    ///
    /// The result shares nothing with the frame's buffer, so the frame
    /// can be released as soon as this returns.
    pub fn convert(
        &self,
        frame: &RawFrame,
        width: u32,
        height: u32,
    ) -> Result<ConvertedBitmap, FrameError> {
        if frame.width() != width || frame.height() != height {
            return Err(FrameError::DimensionMismatch {
                width,
                height,
                actual_width: frame.width(),
                actual_height: frame.height(),
            });
        }
        let format = frame.format();
        if !format.is_convertible() {
            return Err(FrameError::UnsupportedFormat(format));
        }

        let row_bytes = width as usize * BITMAP_BPP;
        let stride = frame.stride();
        if stride < row_bytes {
            return Err(FrameError::StrideTooSmall { stride, row_bytes });
        }
        let plane = frame.plane();
        // Overflow means no buffer can hold the frame.
        let required = match height as usize {
            0 => Some(0),
            h => stride
                .checked_mul(h - 1)
                .and_then(|n| n.checked_add(row_bytes)),
        };
        match required {
            Some(required) if plane.len() >= required => {}
            required => {
                return Err(FrameError::BufferTooSmall {
                    required: required.unwrap_or(usize::MAX),
                    actual: plane.len(),
                });
            }
        }

        let mut out = Vec::with_capacity(row_bytes * height as usize);
        for y in 0..height as usize {
            let row = &plane[y * stride..y * stride + row_bytes];
            match format {
                PixelFormat::Rgba8888 => out.extend_from_slice(row),
                PixelFormat::Rgbx8888 => {
                    for px in row.chunks_exact(BITMAP_BPP) {
                        out.extend_from_slice(&[px[0], px[1], px[2], 0xFF]);
                    }
                }
                PixelFormat::Bgra8888 => {
                    for px in row.chunks_exact(BITMAP_BPP) {
                        out.extend_from_slice(&[px[2], px[1], px[0], px[3]]);
                    }
                }
                PixelFormat::Rgb565 => return Err(FrameError::UnsupportedFormat(format)),
            }
        }

        Ok(ConvertedBitmap {
            width,
            height,
            pixels: Bytes::from(out),
        })
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    /// Pixel `(x, y)` encodes its own coordinates; padding bytes are 0xEE.
    fn padded_frame(width: u32, height: u32, stride: usize, format: PixelFormat) -> RawFrame {
        let mut data = vec![0xEE; stride * height as usize];
        for y in 0..height as usize {
            for x in 0..width as usize {
                let o = y * stride + x * 4;
                data[o..o + 4].copy_from_slice(&[x as u8, y as u8, (x + y) as u8, 0xFF]);
            }
        }
        RawFrame::new(width, height, stride, format, Bytes::from(data))
    }

    #[test]
    fn strips_row_padding() {
        let frame = padded_frame(5, 3, 32, PixelFormat::Rgbx8888);
        let bmp = PixelConverter::new().convert(&frame, 5, 3).unwrap();
        assert_eq!(bmp.pixels().len(), 5 * 3 * 4);
        for y in 0..3u32 {
            for x in 0..5u32 {
                assert_eq!(
                    bmp.pixel(x, y).unwrap(),
                    [x as u8, y as u8, (x + y) as u8, 0xFF],
                    "pixel ({x}, {y})"
                );
            }
        }
        assert!(bmp.pixel(5, 0).is_none());
    }

    #[test]
    fn rgbx_gets_opaque_alpha() {
        let data = Bytes::from(vec![1, 2, 3, 0]);
        let frame = RawFrame::new(1, 1, 4, PixelFormat::Rgbx8888, data);
        let bmp = PixelConverter::new().convert(&frame, 1, 1).unwrap();
        assert_eq!(bmp.pixel(0, 0), Some([1, 2, 3, 0xFF]));
    }

    #[test]
    fn bgra_channels_swapped() {
        let data = Bytes::from(vec![10, 20, 30, 40]);
        let frame = RawFrame::new(1, 1, 4, PixelFormat::Bgra8888, data);
        let bmp = PixelConverter::new().convert(&frame, 1, 1).unwrap();
        assert_eq!(bmp.pixel(0, 0), Some([30, 20, 10, 40]));
    }

    #[test]
    fn last_row_may_omit_padding() {
        let mut data = vec![0u8; 16 * 2 + 8];
        data[32..40].copy_from_slice(&[7, 7, 7, 7, 8, 8, 8, 8]);
        let frame = RawFrame::new(2, 3, 16, PixelFormat::Rgba8888, Bytes::from(data));
        let bmp = PixelConverter::new().convert(&frame, 2, 3).unwrap();
        assert_eq!(bmp.pixel(1, 2), Some([8, 8, 8, 8]));
    }

    #[test]
    fn short_buffer_is_malformed() {
        let frame = RawFrame::new(4, 4, 16, PixelFormat::Rgba8888, Bytes::from(vec![0; 40]));
        let err = PixelConverter::new().convert(&frame, 4, 4).unwrap_err();
        assert_eq!(
            err,
            FrameError::BufferTooSmall {
                required: 64,
                actual: 40
            }
        );
    }

    #[test]
    fn oversized_stride_is_malformed() {
        let frame = RawFrame::new(
            4,
            3,
            usize::MAX / 2,
            PixelFormat::Rgba8888,
            Bytes::from(vec![0; 64]),
        );
        let err = PixelConverter::new().convert(&frame, 4, 3).unwrap_err();
        assert_eq!(
            err,
            FrameError::BufferTooSmall {
                required: usize::MAX,
                actual: 64
            }
        );
    }

    #[test]
    fn narrow_stride_is_malformed() {
        let frame = RawFrame::new(4, 1, 8, PixelFormat::Rgba8888, Bytes::from(vec![0; 16]));
        let err = PixelConverter::new().convert(&frame, 4, 1).unwrap_err();
        assert!(matches!(err, FrameError::StrideTooSmall { .. }));
    }

    #[test]
    fn wrong_size_is_malformed() {
        let frame = padded_frame(4, 4, 16, PixelFormat::Rgba8888);
        let err = PixelConverter::new().convert(&frame, 8, 4).unwrap_err();
        assert!(matches!(err, FrameError::DimensionMismatch { .. }));
    }

    #[test]
    fn rgb565_unsupported() {
        let frame = RawFrame::new(2, 1, 4, PixelFormat::Rgb565, Bytes::from(vec![0; 4]));
        let err = PixelConverter::new().convert(&frame, 2, 1).unwrap_err();
        assert_eq!(err, FrameError::UnsupportedFormat(PixelFormat::Rgb565));
    }
}
