// src/codecs/avif.rs
//
// RAII wrappers over the libavif encoder. All raw pointers stay inside this
// module; callers hand in an RGBA buffer and get encoded bytes back.
#![deny(unsafe_op_in_unsafe_fn)]

use crate::engine::decoder::check_dimensions;
use crate::error::{Result, TransformError};
use libavif_sys::*;
use std::ptr::NonNull;

fn avif_error(message: impl Into<String>) -> TransformError {
    TransformError::encode_failed("avif", message.into())
}

fn check(result: avifResult, what: &str) -> Result<()> {
    if result == AVIF_RESULT_OK {
        Ok(())
    } else {
        Err(avif_error(format!("{what}: {result:?}")))
    }
}

/// Owned `avifImage`.
struct Image(NonNull<avifImage>);

impl Image {
    fn new_yuv420(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(avif_error("image has zero area"));
        }
        check_dimensions(width, height)?;
        let raw = unsafe { avifImageCreate(width, height, 8, AVIF_PIXEL_FORMAT_YUV420) };
        let ptr = NonNull::new(raw).ok_or_else(|| avif_error("avifImageCreate returned null"))?;
        // sRGB, full range
        unsafe {
            let img = ptr.as_ptr();
            (*img).colorPrimaries = AVIF_COLOR_PRIMARIES_BT709 as u16;
            (*img).transferCharacteristics = AVIF_TRANSFER_CHARACTERISTICS_SRGB as u16;
            (*img).matrixCoefficients = AVIF_MATRIX_COEFFICIENTS_BT709 as u16;
            (*img).yuvRange = AVIF_RANGE_FULL;
        }
        Ok(Self(ptr))
    }

    fn allocate_planes(&mut self, planes: u32) -> Result<()> {
        check(
            unsafe { avifImageAllocatePlanes(self.0.as_ptr(), planes) },
            "avifImageAllocatePlanes",
        )
    }

    /// Convert a tightly packed RGBA8 buffer into the YUV planes.
    fn fill_from_rgba(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<()> {
        let row_bytes = width
            .checked_mul(4)
            .ok_or_else(|| avif_error("row bytes overflow"))?;
        if pixels.len() != row_bytes as usize * height as usize {
            return Err(avif_error("pixel buffer does not match image size"));
        }

        let mut rgb: avifRGBImage = unsafe { std::mem::zeroed() };
        unsafe { avifRGBImageSetDefaults(&mut rgb, self.0.as_ptr()) };
        rgb.format = AVIF_RGB_FORMAT_RGBA;
        rgb.depth = 8;
        // libavif only reads through this pointer during the conversion below
        rgb.pixels = pixels.as_ptr() as *mut u8;
        rgb.rowBytes = row_bytes;

        check(
            unsafe { avifImageRGBToYUV(self.0.as_ptr(), &rgb) },
            "avifImageRGBToYUV",
        )
    }

    /// Copy the alpha channel of an RGBA8 buffer into the (allocated) alpha plane.
    fn copy_alpha(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<()> {
        let img = self.0.as_ptr();
        let (plane, row_bytes) = unsafe { ((*img).alphaPlane, (*img).alphaRowBytes as usize) };
        if plane.is_null() || row_bytes < width as usize {
            return Err(avif_error("alpha plane is not allocated"));
        }
        let plane = unsafe { std::slice::from_raw_parts_mut(plane, row_bytes * height as usize) };
        for (dst_row, src_row) in plane
            .chunks_exact_mut(row_bytes)
            .zip(pixels.chunks_exact(width as usize * 4))
        {
            for (dst, px) in dst_row.iter_mut().zip(src_row.chunks_exact(4)) {
                *dst = px[3];
            }
        }
        Ok(())
    }
}

impl Drop for Image {
    fn drop(&mut self) {
        unsafe { avifImageDestroy(self.0.as_ptr()) };
    }
}

/// Owned `avifEncoder`.
struct Encoder(NonNull<avifEncoder>);

impl Encoder {
    fn new(quality: u8, speed: i32, threads: i32) -> Result<Self> {
        let raw = unsafe { avifEncoderCreate() };
        let ptr = NonNull::new(raw).ok_or_else(|| avif_error("avifEncoderCreate returned null"))?;
        unsafe {
            let enc = ptr.as_ptr();
            (*enc).quality = quality as i32;
            (*enc).qualityAlpha = quality as i32;
            (*enc).speed = speed;
            (*enc).maxThreads = threads;
        }
        Ok(Self(ptr))
    }

    fn encode(&mut self, image: &Image) -> Result<Vec<u8>> {
        check(
            unsafe {
                avifEncoderAddImage(self.0.as_ptr(), image.0.as_ptr(), 1, AVIF_ADD_IMAGE_FLAG_SINGLE)
            },
            "avifEncoderAddImage",
        )?;
        let mut output = Output::new();
        check(
            unsafe { avifEncoderFinish(self.0.as_ptr(), &mut output.0) },
            "avifEncoderFinish",
        )?;
        Ok(output.to_vec())
    }
}

impl Drop for Encoder {
    fn drop(&mut self) {
        unsafe { avifEncoderDestroy(self.0.as_ptr()) };
    }
}

/// Owned `avifRWData`.
struct Output(avifRWData);

impl Output {
    fn new() -> Self {
        Self(unsafe { std::mem::zeroed() })
    }

    fn to_vec(&self) -> Vec<u8> {
        if self.0.data.is_null() || self.0.size == 0 {
            return Vec::new();
        }
        unsafe { std::slice::from_raw_parts(self.0.data, self.0.size) }.to_vec()
    }
}

impl Drop for Output {
    fn drop(&mut self) {
        unsafe { avifRWDataFree(&mut self.0) };
    }
}

/// Encode a packed RGBA8 buffer as a single-frame AVIF.
pub fn encode_rgba(
    pixels: &[u8],
    width: u32,
    height: u32,
    has_alpha: bool,
    quality: u8,
    speed: i32,
    threads: i32,
) -> Result<Vec<u8>> {
    let mut image = Image::new_yuv420(width, height)?;
    image.allocate_planes(AVIF_PLANES_YUV)?;
    image.fill_from_rgba(pixels, width, height)?;
    if has_alpha {
        image.allocate_planes(AVIF_PLANES_A)?;
        image.copy_alpha(pixels, width, height)?;
    }
    Encoder::new(quality.min(100), speed, threads)?.encode(&image)
}
