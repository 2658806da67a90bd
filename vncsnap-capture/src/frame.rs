//! The decoded frame: a rectangular grid of RGB samples.

use crate::error::CaptureError;
use image::RgbaImage;
use rfb_wire::PixelFormat;

/// One 8-bit-per-channel pixel sample. Alpha is implicit and opaque.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// A `width x height` grid of pixels decoded from one raw-encoded
/// rectangle, row-major. Never mutated after decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameGrid {
    width: u16,
    height: u16,
    pixels: Vec<Rgb>,
}

impl FrameGrid {
    /// Decode a raw-encoded payload into a grid.
    ///
    /// The payload must hold exactly `width * height` samples in the
    /// session's pixel format; sample `i` lands at `(i % width,
    /// i / width)`. Anything short, long, or in a format this client
    /// never negotiates is a decode failure, not a partial image.
    pub fn decode_raw(
        width: u16,
        height: u16,
        format: &PixelFormat,
        payload: &[u8],
    ) -> Result<Self, CaptureError> {
        if format.bits_per_pixel != 32 || !format.true_color {
            return Err(CaptureError::Decode(format!(
                "pixel format not the negotiated 32bpp true-colour (got {}bpp)",
                format.bits_per_pixel
            )));
        }

        let samples = width as usize * height as usize;
        let expected = samples * format.bytes_per_pixel();
        if payload.len() != expected {
            return Err(CaptureError::Decode(format!(
                "raw payload holds {} bytes, {}x{} needs {}",
                payload.len(),
                width,
                height,
                expected
            )));
        }

        let mut pixels = Vec::with_capacity(samples);
        for chunk in payload.chunks_exact(4) {
            let bytes = [chunk[0], chunk[1], chunk[2], chunk[3]];
            let value = if format.big_endian {
                u32::from_be_bytes(bytes)
            } else {
                u32::from_le_bytes(bytes)
            };
            pixels.push(Rgb {
                r: ((value >> format.red_shift) & u32::from(format.red_max)) as u8,
                g: ((value >> format.green_shift) & u32::from(format.green_max)) as u8,
                b: ((value >> format.blue_shift) & u32::from(format.blue_max)) as u8,
            });
        }

        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    /// Sample at `(x, y)`. Panics on out-of-range coordinates, which is
    /// fine for a type whose dimensions the caller just read.
    pub fn pixel(&self, x: u16, y: u16) -> Rgb {
        assert!(x < self.width && y < self.height);
        self.pixels[y as usize * self.width as usize + x as usize]
    }

    /// Render the grid as an RGBA image with every pixel fully opaque.
    pub fn to_image(&self) -> RgbaImage {
        let mut out = RgbaImage::new(u32::from(self.width), u32::from(self.height));
        for (i, px) in self.pixels.iter().enumerate() {
            let x = i as u32 % u32::from(self.width);
            let y = i as u32 / u32::from(self.width);
            out.put_pixel(x, y, image::Rgba([px.r, px.g, px.b, 255]));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn encode_rgb888_le(pixels: &[Rgb]) -> Vec<u8> {
        let mut out = Vec::with_capacity(pixels.len() * 4);
        for px in pixels {
            let value =
                (u32::from(px.r) << 16) | (u32::from(px.g) << 8) | u32::from(px.b);
            out.extend_from_slice(&value.to_le_bytes());
        }
        out
    }

    #[test]
    fn decodes_red_4x2_rectangle() {
        let red = Rgb { r: 255, g: 0, b: 0 };
        let payload = encode_rgb888_le(&[red; 8]);

        let grid = FrameGrid::decode_raw(4, 2, &PixelFormat::rgb888(), &payload).unwrap();
        assert_eq!((grid.width(), grid.height()), (4, 2));
        for y in 0..2 {
            for x in 0..4 {
                assert_eq!(grid.pixel(x, y), red);
            }
        }
    }

    #[test]
    fn image_is_fully_opaque() {
        let payload = encode_rgb888_le(&[Rgb { r: 1, g: 2, b: 3 }; 6]);
        let grid = FrameGrid::decode_raw(3, 2, &PixelFormat::rgb888(), &payload).unwrap();

        let img = grid.to_image();
        assert_eq!(img.dimensions(), (3, 2));
        for px in img.pixels() {
            assert_eq!(px.0, [1, 2, 3, 255]);
        }
    }

    #[test]
    fn short_payload_is_a_decode_error() {
        let payload = encode_rgb888_le(&[Rgb { r: 0, g: 0, b: 0 }; 7]); // 4x2 needs 8
        let err = FrameGrid::decode_raw(4, 2, &PixelFormat::rgb888(), &payload).unwrap_err();
        assert_eq!(err.kind(), "decode");
    }

    #[test]
    fn oversized_payload_is_a_decode_error() {
        let payload = encode_rgb888_le(&[Rgb { r: 0, g: 0, b: 0 }; 9]);
        assert!(FrameGrid::decode_raw(4, 2, &PixelFormat::rgb888(), &payload).is_err());
    }

    #[test]
    fn unnegotiated_pixel_format_is_rejected() {
        let mut format = PixelFormat::rgb888();
        format.bits_per_pixel = 16;
        format.depth = 16;
        let err = FrameGrid::decode_raw(1, 1, &format, &[0, 0]).unwrap_err();
        assert_eq!(err.kind(), "decode");
    }

    proptest! {
        /// Sample `i` lands at `(i % w, i / w)` with channels preserved
        /// exactly.
        #[test]
        fn raw_samples_land_row_major(
            width in 1u16..=16,
            height in 1u16..=16,
            seed in any::<u32>(),
        ) {
            let samples = width as usize * height as usize;
            let pixels: Vec<Rgb> = (0..samples)
                .map(|i| {
                    let v = (i as u32).wrapping_mul(2654435761).wrapping_add(seed);
                    Rgb {
                        r: (v & 0xFF) as u8,
                        g: ((v >> 8) & 0xFF) as u8,
                        b: ((v >> 16) & 0xFF) as u8,
                    }
                })
                .collect();
            let payload = encode_rgb888_le(&pixels);

            let grid = FrameGrid::decode_raw(width, height, &PixelFormat::rgb888(), &payload).unwrap();
            for (i, expected) in pixels.iter().enumerate() {
                let x = (i % width as usize) as u16;
                let y = (i / width as usize) as u16;
                prop_assert_eq!(grid.pixel(x, y), *expected);
            }
        }
    }
}
