// src/engine/encoder.rs
//
// Encoders: JPEG (mozjpeg), PNG (image + oxipng), WebP (libwebp),
// AVIF (libavif, `avif` feature).

use crate::engine::common::run_with_panic_policy;
use crate::engine::MAX_DIMENSION;
use crate::error::{Result, TransformError};
use crate::ops::OutputFormat;
use image::{DynamicImage, ImageFormat};
use mozjpeg::{ColorSpace, Compress, ScanMode};
use std::borrow::Cow;
use std::io::Cursor;

/// Derives per-codec knobs from a 0-100 quality.
///
/// Bands:
/// - High (>=85): favour fidelity, AVIF speed 6
/// - Balanced (70-84): AVIF speed 7
/// - Fast (50-69): AVIF speed 8
/// - Fastest (<50): AVIF speed 9
#[derive(Debug, Clone, Copy)]
pub struct QualitySettings {
    quality: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QualityBand {
    High,
    Balanced,
    Fast,
    Fastest,
}

impl QualitySettings {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.min(100) as f32,
        }
    }

    fn band(&self) -> QualityBand {
        if self.quality >= 85.0 {
            QualityBand::High
        } else if self.quality >= 70.0 {
            QualityBand::Balanced
        } else if self.quality >= 50.0 {
            QualityBand::Fast
        } else {
            QualityBand::Fastest
        }
    }

    pub fn webp_method(&self) -> i32 {
        4
    }

    pub fn webp_sns_strength(&self) -> i32 {
        match self.band() {
            QualityBand::High => 50,
            QualityBand::Balanced => 70,
            QualityBand::Fast | QualityBand::Fastest => 80,
        }
    }

    pub fn webp_filter_strength(&self) -> i32 {
        if self.quality >= 80.0 {
            20
        } else if self.quality >= 60.0 {
            30
        } else {
            40
        }
    }

    pub fn webp_filter_sharpness(&self) -> i32 {
        match self.band() {
            QualityBand::High => 2,
            _ => 0,
        }
    }

    pub fn jpeg_smoothing(&self) -> u8 {
        if self.quality >= 90.0 {
            0
        } else if self.quality >= 70.0 {
            5
        } else if self.quality >= 60.0 {
            10
        } else {
            18
        }
    }

    // libavif speed: 0 (slowest/best) to 10 (fastest)
    pub fn avif_speed(&self) -> i32 {
        match self.band() {
            QualityBand::High => 6,
            QualityBand::Balanced => 7,
            QualityBand::Fast => 8,
            QualityBand::Fastest => 9,
        }
    }
}

/// Encode `img` as `format`. For PNG `quality` is the 0-9 compression level
/// produced by format negotiation (0 = most effort).
pub fn encode(img: &DynamicImage, format: OutputFormat, quality: u8) -> Result<Vec<u8>> {
    match format {
        OutputFormat::Jpeg => encode_jpeg(img, quality),
        OutputFormat::Png => encode_png(img, quality),
        OutputFormat::WebP => encode_webp(img, quality),
        OutputFormat::Avif => encode_avif(img, quality),
    }
}

/// Encode to JPEG using mozjpeg: progressive, optimized Huffman tables and scans.
pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    run_with_panic_policy("encode:jpeg", || {
        let rgb: Cow<'_, image::RgbImage> = match img {
            DynamicImage::ImageRgb8(rgb_img) => Cow::Borrowed(rgb_img),
            _ => Cow::Owned(img.to_rgb8()),
        };
        let (w, h) = rgb.dimensions();
        let pixels: &[u8] = rgb.as_raw();

        if w == 0 || h == 0 {
            return Err(TransformError::encode_failed(
                "jpeg",
                "width or height is zero",
            ));
        }
        if w > MAX_DIMENSION || h > MAX_DIMENSION {
            return Err(TransformError::dimension_exceeds_limit(w.max(h), MAX_DIMENSION));
        }

        let settings = QualitySettings::new(quality);
        let mut comp = Compress::new(ColorSpace::JCS_RGB);
        comp.set_size(w as usize, h as usize);
        comp.set_color_space(ColorSpace::JCS_YCbCr);
        comp.set_quality(settings.quality);
        comp.set_chroma_sampling_pixel_sizes((2, 2), (2, 2));
        comp.set_progressive_mode();
        comp.set_optimize_coding(true);
        comp.set_optimize_scans(true);
        comp.set_scan_optimization_mode(ScanMode::AllComponentsTogether);
        comp.set_smoothing_factor(settings.jpeg_smoothing());

        let mut output = Vec::with_capacity((w as usize * h as usize * 3 / 10).max(4096));
        {
            let mut writer = comp.start_compress(&mut output).map_err(|e| {
                TransformError::encode_failed(
                    "jpeg",
                    format!("mozjpeg: failed to start compress: {e:?}"),
                )
            })?;
            for row in pixels.chunks(w as usize * 3) {
                writer.write_scanlines(row).map_err(|e| {
                    TransformError::encode_failed(
                        "jpeg",
                        format!("mozjpeg: failed to write scanlines: {e:?}"),
                    )
                })?;
            }
            writer.finish().map_err(|e| {
                TransformError::encode_failed("jpeg", format!("mozjpeg: failed to finish: {e:?}"))
            })?;
        }
        Ok(output)
    })
}

/// oxipng preset (0-6, higher = more effort) for a 0-9 compression level.
pub fn oxipng_preset(level: u8) -> u8 {
    let effort = 9 - level.min(9);
    effort * 6 / 9
}

/// Encode to PNG with the image crate, then recompress losslessly with oxipng.
pub fn encode_png(img: &DynamicImage, level: u8) -> Result<Vec<u8>> {
    run_with_panic_policy("encode:png", || {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .map_err(|e| TransformError::encode_failed("png", format!("PNG encode failed: {e}")))?;

        let mut options = oxipng::Options::from_preset(oxipng_preset(level));
        options.strip = oxipng::StripChunks::None;

        oxipng::optimize_from_memory(&buf, &options).map_err(|e| {
            TransformError::encode_failed("png", format!("oxipng optimization failed: {e}"))
        })
    })
}

/// Encode to WebP. Alpha is only kept when the image actually carries it.
pub fn encode_webp(img: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    run_with_panic_policy("encode:webp", || {
        let settings = QualitySettings::new(quality);
        let mut config = webp::WebPConfig::new()
            .map_err(|_| TransformError::internal_panic("failed to create WebPConfig"))?;
        config.quality = settings.quality;
        config.method = settings.webp_method();
        config.pass = 1;
        config.preprocessing = 0;
        config.sns_strength = settings.webp_sns_strength();
        config.autofilter = 1;
        config.filter_strength = settings.webp_filter_strength();
        config.filter_sharpness = settings.webp_filter_sharpness();

        let mem = if img.color().has_alpha() {
            let rgba = img.to_rgba8();
            let (w, h) = rgba.dimensions();
            webp::Encoder::from_rgba(&rgba, w, h).encode_advanced(&config)
        } else {
            let rgb: Cow<'_, image::RgbImage> = match img {
                DynamicImage::ImageRgb8(rgb_img) => Cow::Borrowed(rgb_img),
                _ => Cow::Owned(img.to_rgb8()),
            };
            let (w, h) = rgb.dimensions();
            webp::Encoder::from_rgb(&rgb, w, h).encode_advanced(&config)
        }
        .map_err(|e| TransformError::encode_failed("webp", format!("WebP encode failed: {e:?}")))?;

        Ok(mem.to_vec())
    })
}

/// Encode to AVIF through libavif.
#[cfg(feature = "avif")]
pub fn encode_avif(img: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    run_with_panic_policy("encode:avif", || {
        let settings = QualitySettings::new(quality);
        let rgba: Cow<'_, image::RgbaImage> = match img {
            DynamicImage::ImageRgba8(rgba_img) => Cow::Borrowed(rgba_img),
            _ => Cow::Owned(img.to_rgba8()),
        };
        let (w, h) = rgba.dimensions();
        let threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(2)
            .clamp(2, 8) as i32;
        crate::codecs::avif::encode_rgba(
            rgba.as_raw(),
            w,
            h,
            img.color().has_alpha(),
            quality,
            settings.avif_speed(),
            threads,
        )
    })
}

#[cfg(not(feature = "avif"))]
pub fn encode_avif(_img: &DynamicImage, _quality: u8) -> Result<Vec<u8>> {
    Err(TransformError::encode_failed(
        "avif",
        "built without the `avif` feature",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{RgbImage, RgbaImage};

    const PNG_MAGIC: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    fn create_test_image(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        }))
    }

    fn create_test_image_rgba(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_fn(width, height, |x, y| {
            image::Rgba([(x % 256) as u8, (y % 256) as u8, 128, (x % 2 * 255) as u8])
        }))
    }

    #[test]
    fn jpeg_has_soi_and_eoi() {
        let result = encode(&create_test_image(100, 100), OutputFormat::Jpeg, 80).unwrap();
        assert_eq!(&result[0..2], &[0xFF, 0xD8]);
        assert_eq!(&result[result.len() - 2..], &[0xFF, 0xD9]);
    }

    #[test]
    fn jpeg_drops_alpha() {
        let result = encode_jpeg(&create_test_image_rgba(32, 32), 80).unwrap();
        assert_eq!(&result[0..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn png_at_every_level() {
        let img = create_test_image(40, 40);
        for level in [0, 4, 9] {
            let result = encode(&img, OutputFormat::Png, level).unwrap();
            assert_eq!(&result[0..8], &PNG_MAGIC);
        }
    }

    #[test]
    fn png_keeps_alpha() {
        let img = create_test_image_rgba(8, 8);
        let result = encode_png(&img, 0).unwrap();
        let decoded = image::load_from_memory(&result).unwrap();
        assert!(decoded.color().has_alpha());
    }

    #[test]
    fn oxipng_preset_mapping() {
        assert_eq!(oxipng_preset(0), 6);
        assert_eq!(oxipng_preset(9), 0);
        assert_eq!(oxipng_preset(4), 3);
        assert_eq!(oxipng_preset(200), 0);
    }

    #[test]
    fn webp_riff_container() {
        for img in [create_test_image(50, 50), create_test_image_rgba(50, 50)] {
            let result = encode(&img, OutputFormat::WebP, 80).unwrap();
            assert_eq!(&result[0..4], b"RIFF");
            assert_eq!(&result[8..12], b"WEBP");
        }
    }

    #[cfg(feature = "avif")]
    #[test]
    fn avif_has_ftyp_box() {
        let result = encode(&create_test_image(64, 64), OutputFormat::Avif, 60).unwrap();
        assert!(result.windows(4).any(|w| w == b"ftyp"));
    }

    #[cfg(not(feature = "avif"))]
    #[test]
    fn avif_without_feature_is_an_encode_error() {
        let err = encode(&create_test_image(4, 4), OutputFormat::Avif, 60).unwrap_err();
        assert!(matches!(err, TransformError::EncodeFailed { .. }));
    }

    #[test]
    fn quality_band_boundaries() {
        assert_eq!(QualitySettings::new(90).avif_speed(), 6);
        assert_eq!(QualitySettings::new(75).avif_speed(), 7);
        assert_eq!(QualitySettings::new(60).avif_speed(), 8);
        assert_eq!(QualitySettings::new(40).avif_speed(), 9);

        let high = QualitySettings::new(90);
        assert_eq!(high.webp_sns_strength(), 50);
        assert_eq!(high.webp_filter_strength(), 20);
        assert_eq!(high.webp_filter_sharpness(), 2);
        assert_eq!(high.jpeg_smoothing(), 0);

        let fastest = QualitySettings::new(40);
        assert_eq!(fastest.webp_sns_strength(), 80);
        assert_eq!(fastest.webp_filter_strength(), 40);
        assert_eq!(fastest.jpeg_smoothing(), 18);
    }
}
