// src/engine/pipeline.rs
//
// Pixel work for a resolved plan: crop+resample, background fill and
// compositing.

use crate::engine::strategy::Geometry;
use crate::error::{Result, TransformError};
use crate::ops::Rgb;
use fast_image_resize::{self as fir, ImageBufferError, MulDiv, PixelType, ResizeOptions};
use image::{imageops::FilterType, DynamicImage, Rgba, RgbaImage, RgbImage};
use tracing::{debug, warn};

/// Region of the source to read, in source pixels. May be fractional.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SourceRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl SourceRect {
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: width as f64,
            height: height as f64,
        }
    }

    /// Clamp into a `width`x`height` image, keeping at least one pixel.
    pub fn clamped(self, width: u32, height: u32) -> Self {
        let (w, h) = (width as f64, height as f64);
        let x = self.x.clamp(0.0, (w - 1.0).max(0.0));
        let y = self.y.clamp(0.0, (h - 1.0).max(0.0));
        Self {
            x,
            y,
            width: self.width.clamp(1.0, w - x),
            height: self.height.clamp(1.0, h - y),
        }
    }

    fn is_full(&self, width: u32, height: u32) -> bool {
        self.x == 0.0
            && self.y == 0.0
            && self.width == width as f64
            && self.height == height as f64
    }
}

impl From<&Geometry> for SourceRect {
    fn from(g: &Geometry) -> Self {
        Self {
            x: g.src_x,
            y: g.src_y,
            width: g.src_width,
            height: g.src_height,
        }
    }
}

/// Execute a geometry against a decoded image.
pub fn execute_geometry(
    img: DynamicImage,
    geometry: &Geometry,
    background: Rgb,
) -> Result<DynamicImage> {
    let resized = resample(
        img,
        SourceRect::from(geometry),
        (geometry.resize_width, geometry.resize_height),
    )?;

    if !geometry.fill_background && !geometry.is_padded() {
        return Ok(resized);
    }

    let mut canvas = RgbaImage::new(geometry.dest_width, geometry.dest_height);
    if geometry.fill_background {
        fill_background(&mut canvas, background);
    }
    composite(&mut canvas, &resized, geometry.pad_x, geometry.pad_y);
    Ok(DynamicImage::ImageRgba8(canvas))
}

/// Crop `src_rect` out of `img` and resample it to `dst_size` (Lanczos3).
///
/// The rectangle is clamped into the image first. If fast_image_resize
/// fails, the image crate does the same work more slowly.
pub fn resample(img: DynamicImage, src_rect: SourceRect, dst_size: (u32, u32)) -> Result<DynamicImage> {
    let (src_width, src_height) = (img.width(), img.height());
    let (dst_width, dst_height) = dst_size;

    if src_width == 0 || src_height == 0 || dst_width == 0 || dst_height == 0 {
        return Err(TransformError::resize_failed(
            (src_width, src_height),
            dst_size,
            "invalid dimensions for resize",
        ));
    }

    let rect = src_rect.clamped(src_width, src_height);
    if rect.is_full(src_width, src_height) && (src_width, src_height) == dst_size {
        return Ok(img);
    }

    let (pixel_type, mut src_pixels): (PixelType, Vec<u8>) = match img {
        DynamicImage::ImageRgb8(rgb) => (PixelType::U8x3, rgb.into_raw()),
        DynamicImage::ImageRgba8(rgba) => (PixelType::U8x4, rgba.into_raw()),
        other if other.color().has_alpha() => (PixelType::U8x4, other.to_rgba8().into_raw()),
        other => (PixelType::U8x3, other.to_rgb8().into_raw()),
    };

    let options = ResizeOptions::new()
        .resize_alg(fir::ResizeAlg::Convolution(fir::FilterType::Lanczos3))
        .crop(rect.x, rect.y, rect.width, rect.height);

    let primary = match fir::images::Image::from_slice_u8(
        src_width,
        src_height,
        src_pixels.as_mut_slice(),
        pixel_type,
    ) {
        Ok(src_image) => resize_with_source_image(src_image, pixel_type, dst_size, &options),
        Err(ImageBufferError::InvalidBufferAlignment) => {
            copy_pixels_to_aligned_image(src_width, src_height, pixel_type, &src_pixels).and_then(
                |aligned| resize_with_source_image(aligned, pixel_type, dst_size, &options),
            )
        }
        Err(other) => Err(format!("fir source image error: {other:?}")),
    };

    match primary {
        Ok(resized) => Ok(resized),
        Err(reason) => {
            warn!(%reason, "fast resize failed, using image crate fallback");
            resize_with_image_crate_fallback(
                src_pixels,
                (src_width, src_height),
                pixel_type,
                rect,
                dst_size,
            )
            .map_err(|fallback| {
                TransformError::resize_failed(
                    (src_width, src_height),
                    dst_size,
                    format!("{reason}; image crate fallback failed: {fallback}"),
                )
            })
        }
    }
}

fn copy_pixels_to_aligned_image(
    width: u32,
    height: u32,
    pixel_type: PixelType,
    src_pixels: &[u8],
) -> std::result::Result<fir::images::Image<'static>, String> {
    let mut aligned = fir::images::Image::new(width, height, pixel_type);
    let buffer = aligned.buffer_mut();
    if buffer.len() > src_pixels.len() {
        return Err(format!(
            "fir alignment fallback buffer mismatch. expected {} bytes, got {} bytes",
            buffer.len(),
            src_pixels.len()
        ));
    }
    let len = buffer.len();
    buffer.copy_from_slice(&src_pixels[..len]);
    Ok(aligned)
}

fn resize_with_source_image(
    mut src_image: fir::images::Image<'_>,
    pixel_type: PixelType,
    dst_size: (u32, u32),
    options: &ResizeOptions,
) -> std::result::Result<DynamicImage, String> {
    let (dst_width, dst_height) = dst_size;
    let mut dst_image = fir::images::Image::new(dst_width, dst_height, pixel_type);

    let premultiply = pixel_type == PixelType::U8x4
        && src_image.buffer().iter().skip(3).step_by(4).any(|&a| a != 255);

    let mul_div = MulDiv::default();
    if premultiply {
        mul_div
            .multiply_alpha_inplace(&mut src_image)
            .map_err(|e| format!("failed to premultiply alpha: {e}"))?;
    }

    fir::Resizer::new()
        .resize(&src_image, &mut dst_image, options)
        .map_err(|e| format!("fir resize error: {e:?}"))?;

    if premultiply {
        mul_div
            .divide_alpha_inplace(&mut dst_image)
            .map_err(|e| format!("failed to unpremultiply alpha: {e}"))?;
    }

    let dst_pixels = dst_image.into_vec();
    match pixel_type {
        PixelType::U8x3 => RgbImage::from_raw(dst_width, dst_height, dst_pixels)
            .map(DynamicImage::ImageRgb8)
            .ok_or_else(|| "failed to create rgb image from resized data".to_string()),
        PixelType::U8x4 => RgbaImage::from_raw(dst_width, dst_height, dst_pixels)
            .map(DynamicImage::ImageRgba8)
            .ok_or_else(|| "failed to create rgba image from resized data".to_string()),
        _ => Err("unsupported pixel type after resize".to_string()),
    }
}

fn resize_with_image_crate_fallback(
    src_pixels: Vec<u8>,
    src_size: (u32, u32),
    pixel_type: PixelType,
    rect: SourceRect,
    dst_size: (u32, u32),
) -> std::result::Result<DynamicImage, String> {
    let (src_width, src_height) = src_size;
    let src = match pixel_type {
        PixelType::U8x3 => RgbImage::from_raw(src_width, src_height, src_pixels)
            .map(DynamicImage::ImageRgb8),
        PixelType::U8x4 => RgbaImage::from_raw(src_width, src_height, src_pixels)
            .map(DynamicImage::ImageRgba8),
        _ => None,
    }
    .ok_or_else(|| "failed to rebuild source image for fallback resize".to_string())?;

    // imageops crops on whole pixels
    let x = rect.x.trunc() as u32;
    let y = rect.y.trunc() as u32;
    let w = (rect.width.round() as u32).clamp(1, src_width - x);
    let h = (rect.height.round() as u32).clamp(1, src_height - y);
    Ok(src
        .crop_imm(x, y, w, h)
        .resize_exact(dst_size.0, dst_size.1, FilterType::Lanczos3))
}

/// Paint every pixel of `canvas` with an opaque `color`.
pub fn fill_background(canvas: &mut RgbaImage, color: Rgb) {
    let pixel = Rgba(color.to_rgba());
    for p in canvas.pixels_mut() {
        *p = pixel;
    }
}

/// Alpha-blend `img` onto `canvas` with its top-left corner at `(x, y)`.
pub fn composite(canvas: &mut RgbaImage, img: &DynamicImage, x: u32, y: u32) {
    debug!(
        x,
        y,
        width = img.width(),
        height = img.height(),
        "compositing onto canvas"
    );
    let overlay = img.to_rgba8();
    image::imageops::overlay(canvas, &overlay, x as i64, y as i64);
}

/// True when the image has an alpha channel and at least one pixel that is
/// not fully opaque.
pub fn has_transparency(img: &DynamicImage) -> bool {
    match img {
        DynamicImage::ImageRgba8(rgba) => rgba.pixels().any(|p| p.0[3] != u8::MAX),
        DynamicImage::ImageLumaA8(la) => la.pixels().any(|p| p.0[1] != u8::MAX),
        DynamicImage::ImageRgba16(rgba) => rgba.pixels().any(|p| p.0[3] != u16::MAX),
        DynamicImage::ImageLumaA16(la) => la.pixels().any(|p| p.0[1] != u16::MAX),
        other if other.color().has_alpha() => {
            other.to_rgba8().pixels().any(|p| p.0[3] != u8::MAX)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GenericImageView;

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        }))
    }

    fn geometry(dest: (u32, u32), resize: (u32, u32), pad: (u32, u32), src: (u32, u32)) -> Geometry {
        Geometry {
            dest_width: dest.0,
            dest_height: dest.1,
            resize_width: resize.0,
            resize_height: resize.1,
            src_x: 0.0,
            src_y: 0.0,
            src_width: src.0 as f64,
            src_height: src.1 as f64,
            pad_x: pad.0,
            pad_y: pad.1,
            fill_background: true,
        }
    }

    #[test]
    fn clamps_source_rect() {
        let rect = SourceRect {
            x: -5.0,
            y: 90.0,
            width: 500.0,
            height: 50.0,
        }
        .clamped(100, 100);
        assert_eq!(rect.x, 0.0);
        assert_eq!(rect.y, 90.0);
        assert_eq!(rect.width, 100.0);
        assert_eq!(rect.height, 10.0);
    }

    #[test]
    fn resample_with_crop() {
        let img = gradient(100, 50);
        let rect = SourceRect {
            x: 25.0,
            y: 0.0,
            width: 50.0,
            height: 50.0,
        };
        let out = resample(img, rect, (20, 20)).unwrap();
        assert_eq!(out.dimensions(), (20, 20));
    }

    #[test]
    fn resample_identity_is_a_no_op() {
        let img = gradient(8, 8);
        let out = resample(img.clone(), SourceRect::full(8, 8), (8, 8)).unwrap();
        assert_eq!(out, img);
    }

    #[test]
    fn resample_rejects_zero_target() {
        let err = resample(gradient(4, 4), SourceRect::full(4, 4), (0, 4)).unwrap_err();
        assert!(matches!(err, TransformError::ResizeFailed { .. }));
    }

    #[test]
    fn image_crate_fallback_crops_and_resizes() {
        let src = gradient(10, 10).to_rgb8().into_raw();
        let rect = SourceRect {
            x: 2.0,
            y: 2.0,
            width: 6.0,
            height: 6.0,
        };
        let out = resize_with_image_crate_fallback(src, (10, 10), PixelType::U8x3, rect, (3, 3))
            .unwrap();
        assert_eq!(out.dimensions(), (3, 3));
    }

    #[test]
    fn pad_fills_background_around_image() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(40, 20, image::Rgb([0, 0, 0])));
        let g = geometry((20, 20), (20, 10), (0, 5), (40, 20));
        let out = execute_geometry(img, &g, Rgb::new(255, 0, 0)).unwrap().to_rgba8();
        assert_eq!(out.dimensions(), (20, 20));
        assert_eq!(out.get_pixel(0, 0).0, [255, 0, 0, 255]);
        assert_eq!(out.get_pixel(10, 10).0, [0, 0, 0, 255]);
        assert_eq!(out.get_pixel(19, 19).0, [255, 0, 0, 255]);
    }

    #[test]
    fn transparent_pixels_show_background() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([0, 0, 0, 0])));
        let g = geometry((10, 10), (10, 10), (0, 0), (10, 10));
        let out = execute_geometry(img, &g, Rgb::new(1, 2, 3)).unwrap().to_rgba8();
        assert_eq!(out.get_pixel(5, 5).0, [1, 2, 3, 255]);
    }

    #[test]
    fn transparency_probe() {
        assert!(!has_transparency(&gradient(2, 2)));
        let opaque = DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 2, Rgba([1, 1, 1, 255])));
        assert!(!has_transparency(&opaque));
        let mut clear = RgbaImage::from_pixel(2, 2, Rgba([1, 1, 1, 255]));
        clear.put_pixel(1, 1, Rgba([0, 0, 0, 10]));
        assert!(has_transparency(&DynamicImage::ImageRgba8(clear)));
    }
}
