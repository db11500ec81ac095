// src/engine/decoder.rs
//
// Content sniffing and decoding: JPEG (mozjpeg), PNG (zune-png), WebP
// (libwebp), everything else through the image crate.

use crate::engine::common::run_with_panic_policy;
use crate::engine::{MAX_DIMENSION, MAX_PIXELS};
use crate::error::{Result, TransformError};
use crate::ops::SourceFormat;
use image::{DynamicImage, GrayAlphaImage, GrayImage, ImageReader, RgbImage, RgbaImage};
use mozjpeg::Decompress;
use std::io::Cursor;
use webp::{BitstreamFeatures, Decoder as WebPDecoder};
use zune_core::bytestream::ZCursor;
use zune_core::colorspace::ColorSpace;
use zune_core::options::DecoderOptions;
use zune_png::PngDecoder;

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
/// How far into a text document we look for an `<svg` root.
const SVG_SNIFF_WINDOW: usize = 1024;

/// Identify a source from its leading bytes.
pub fn sniff_content_type(bytes: &[u8]) -> Option<SourceFormat> {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some(SourceFormat::Jpeg);
    }
    if bytes.starts_with(&PNG_SIGNATURE) {
        return Some(SourceFormat::Png);
    }
    if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        return Some(SourceFormat::WebP);
    }
    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        return Some(SourceFormat::Gif);
    }
    if is_avif(bytes) {
        return Some(SourceFormat::Avif);
    }
    if looks_like_svg(bytes) {
        return Some(SourceFormat::Svg);
    }
    None
}

// ISO-BMFF `ftyp` box with an avif/avis major or compatible brand
fn is_avif(bytes: &[u8]) -> bool {
    if bytes.len() < 16 || &bytes[4..8] != b"ftyp" {
        return false;
    }
    let box_len = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
    let end = box_len.clamp(16, bytes.len());
    let major = &bytes[8..12];
    major == b"avif"
        || major == b"avis"
        || bytes[16..end]
            .chunks_exact(4)
            .any(|brand| brand == b"avif" || brand == b"avis")
}

fn looks_like_svg(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(SVG_SNIFF_WINDOW)];
    let head = head.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(head);
    let text = String::from_utf8_lossy(head);
    let trimmed = text.trim_start();
    trimmed.starts_with('<') && trimmed.to_ascii_lowercase().contains("<svg")
}

/// Decode `bytes` that were sniffed as `format`.
pub fn decode(bytes: &[u8], format: SourceFormat) -> Result<DynamicImage> {
    ensure_dimensions_safe(bytes)?;
    match format {
        SourceFormat::Jpeg => decode_jpeg_mozjpeg(bytes),
        SourceFormat::Png => decode_png_zune(bytes),
        SourceFormat::WebP => decode_webp_libwebp(bytes),
        SourceFormat::Svg => Err(TransformError::unsupported_content_type(
            SourceFormat::Svg.content_type(),
        )),
        SourceFormat::Avif | SourceFormat::Gif => decode_with_image_crate(bytes),
    }
}

/// Decode JPEG using mozjpeg (backed by libjpeg-turbo)
pub fn decode_jpeg_mozjpeg(data: &[u8]) -> Result<DynamicImage> {
    run_with_panic_policy("decode:mozjpeg", || {
        if !data.windows(2).any(|pair| pair == [0xFF, 0xD9]) {
            return Err(TransformError::decode_failed(
                "mozjpeg: missing JPEG EOI marker",
            ));
        }

        let decompress = Decompress::new_mem(data).map_err(|e| {
            TransformError::decode_failed(format!("mozjpeg decompress init failed: {e:?}"))
        })?;
        let mut decompress = decompress.rgb().map_err(|e| {
            TransformError::decode_failed(format!("mozjpeg rgb conversion failed: {e:?}"))
        })?;

        let width = u32::try_from(decompress.width())
            .map_err(|_| TransformError::dimension_exceeds_limit(u32::MAX, MAX_DIMENSION))?;
        let height = u32::try_from(decompress.height())
            .map_err(|_| TransformError::dimension_exceeds_limit(u32::MAX, MAX_DIMENSION))?;
        check_dimensions(width, height)?;

        let pixels: Vec<[u8; 3]> = decompress.read_scanlines().map_err(|e| {
            TransformError::decode_failed(format!("mozjpeg: failed to read scanlines: {e:?}"))
        })?;
        let flat_pixels: Vec<u8> = pixels.into_iter().flatten().collect();

        RgbImage::from_raw(width, height, flat_pixels)
            .map(DynamicImage::ImageRgb8)
            .ok_or_else(|| TransformError::decode_failed("mozjpeg: truncated scanline data"))
    })
}

/// Decode PNG using zune-png. 16-bit input is stripped to 8-bit.
pub fn decode_png_zune(data: &[u8]) -> Result<DynamicImage> {
    run_with_panic_policy("decode:png", || {
        let options = DecoderOptions::default().png_set_strip_to_8bit(true);
        let mut decoder = PngDecoder::new_with_options(ZCursor::new(data), options);
        let pixels = decoder
            .decode()
            .map_err(|e| TransformError::decode_failed(format!("png: decode failed: {e}")))?;

        let info = decoder
            .info()
            .ok_or_else(|| TransformError::decode_failed("png: missing header info"))?;
        let width = info.width as u32;
        let height = info.height as u32;
        check_dimensions(width, height)?;

        let buf = match pixels {
            zune_core::result::DecodingResult::U8(v) => v,
            _ => {
                return Err(TransformError::decode_failed(
                    "png: unexpected non-U8 pixel buffer",
                ))
            }
        };

        let colorspace = decoder
            .colorspace()
            .ok_or_else(|| TransformError::decode_failed("png: missing colorspace"))?;

        let img = match colorspace {
            ColorSpace::RGB => RgbImage::from_raw(width, height, buf).map(DynamicImage::ImageRgb8),
            ColorSpace::RGBA => {
                RgbaImage::from_raw(width, height, buf).map(DynamicImage::ImageRgba8)
            }
            ColorSpace::Luma => GrayImage::from_raw(width, height, buf).map(DynamicImage::ImageLuma8),
            ColorSpace::LumaA => {
                GrayAlphaImage::from_raw(width, height, buf).map(DynamicImage::ImageLumaA8)
            }
            other => {
                return Err(TransformError::decode_failed(format!(
                    "png: unsupported colorspace {other:?}"
                )))
            }
        };
        img.ok_or_else(|| TransformError::decode_failed("png: pixel buffer size mismatch"))
    })
}

/// Decode WebP using libwebp. Animated files fall back to the image crate,
/// which yields the first frame.
pub fn decode_webp_libwebp(data: &[u8]) -> Result<DynamicImage> {
    run_with_panic_policy("decode:webp", || {
        let features = BitstreamFeatures::new(data).ok_or_else(|| {
            TransformError::decode_failed("webp: failed to read bitstream features")
        })?;
        check_dimensions(features.width(), features.height())?;

        if features.has_animation() {
            return image::load_from_memory(data).map_err(|e| {
                TransformError::decode_failed(format!("webp (animated) decode failed: {e}"))
            });
        }

        let decoded = WebPDecoder::new(data)
            .decode()
            .ok_or_else(|| TransformError::decode_failed("webp: decode failed"))?;
        check_dimensions(decoded.width(), decoded.height())?;

        Ok(decoded.to_image())
    })
}

pub fn decode_with_image_crate(data: &[u8]) -> Result<DynamicImage> {
    run_with_panic_policy("decode:image", || {
        image::load_from_memory(data)
            .map_err(|e| TransformError::decode_failed(format!("decode failed: {e}")))
    })
}

/// Reject dimensions past the global decode limits (decompression bombs).
pub fn check_dimensions(width: u32, height: u32) -> Result<()> {
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(TransformError::dimension_exceeds_limit(
            width.max(height),
            MAX_DIMENSION,
        ));
    }
    let pixels = width as u64 * height as u64;
    if pixels > MAX_PIXELS {
        return Err(TransformError::pixel_count_exceeds_limit(pixels, MAX_PIXELS));
    }
    Ok(())
}

/// Read dimensions from the header only. `None` if the header is unreadable.
pub fn peek_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

/// Check header dimensions before allocating anything for the pixels.
pub fn ensure_dimensions_safe(bytes: &[u8]) -> Result<()> {
    match peek_dimensions(bytes) {
        Some((width, height)) => check_dimensions(width, height),
        None => Ok(()),
    }
}
