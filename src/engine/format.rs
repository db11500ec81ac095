// src/engine/format.rs
//
// Output format negotiation.

use crate::ops::{EncoderCapabilities, OutputFormat, RequestedFormat};
use tracing::debug;

/// The two source properties negotiation looks at.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct SourceTraits {
    pub is_png: bool,
    pub has_transparency: bool,
}

impl SourceTraits {
    fn is_transparent_png(&self) -> bool {
        self.is_png && self.has_transparency
    }
}

/// Map a 0-100 quality onto the 0-9 PNG compression level
/// (0 = most effort). A quality of 0 is passed through unchanged.
///
/// The formula is kept literally: it treats the input as if it were on a
/// 0-9 scale, so every quality of 9 or more maps to level 0.
pub fn png_compression_level(quality: u8) -> u8 {
    if quality == 0 {
        return 0;
    }
    let q = quality as f64;
    let level = 9.0 - (q / 9.0 * 9.0).round();
    level.clamp(0.0, 9.0) as u8
}

/// Resolve the output format and the quality value handed to its encoder.
///
/// For PNG the returned value is a compression level, not a quality.
pub fn negotiate(
    requested: RequestedFormat,
    quality: u8,
    caps: EncoderCapabilities,
    source: SourceTraits,
) -> (OutputFormat, u8) {
    let resolved = match requested {
        RequestedFormat::Jpg | RequestedFormat::Jpeg => (OutputFormat::Jpeg, quality),
        RequestedFormat::Png => (OutputFormat::Png, png_compression_level(quality)),
        RequestedFormat::WebP => (OutputFormat::WebP, quality),
        // An explicit avif goes through the same negotiation as auto
        RequestedFormat::Auto | RequestedFormat::Avif => negotiate_auto(quality, caps, source),
    };
    debug!(
        requested = requested.as_str(),
        format = resolved.0.as_str(),
        quality = resolved.1,
        "negotiated output format"
    );
    resolved
}

fn negotiate_auto(
    quality: u8,
    caps: EncoderCapabilities,
    source: SourceTraits,
) -> (OutputFormat, u8) {
    let webp = caps.contains(EncoderCapabilities::WEBP);
    let avif = caps.contains(EncoderCapabilities::AVIF);
    match (avif, webp) {
        (true, true) if source.is_transparent_png() => (OutputFormat::Avif, quality),
        (true, true) => (OutputFormat::WebP, quality),
        (false, true) => (OutputFormat::WebP, quality),
        (true, false) => (OutputFormat::Avif, quality),
        (false, false) if source.is_transparent_png() => {
            (OutputFormat::Png, png_compression_level(quality))
        }
        (false, false) => (OutputFormat::Jpeg, quality),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPAQUE_JPEG: SourceTraits = SourceTraits {
        is_png: false,
        has_transparency: false,
    };
    const ALPHA_PNG: SourceTraits = SourceTraits {
        is_png: true,
        has_transparency: true,
    };
    const ALL: EncoderCapabilities = EncoderCapabilities::all();
    const NONE: EncoderCapabilities = EncoderCapabilities::empty();

    #[test]
    fn png_level_remap() {
        assert_eq!(png_compression_level(90), 0);
        assert_eq!(png_compression_level(100), 0);
        assert_eq!(png_compression_level(9), 0);
        assert_eq!(png_compression_level(5), 4);
        assert_eq!(png_compression_level(1), 8);
        assert_eq!(png_compression_level(0), 0);
    }

    #[test]
    fn explicit_formats() {
        assert_eq!(
            negotiate(RequestedFormat::Jpg, 80, ALL, ALPHA_PNG),
            (OutputFormat::Jpeg, 80)
        );
        assert_eq!(
            negotiate(RequestedFormat::Jpeg, 80, NONE, OPAQUE_JPEG),
            (OutputFormat::Jpeg, 80)
        );
        assert_eq!(
            negotiate(RequestedFormat::Png, 90, ALL, OPAQUE_JPEG),
            (OutputFormat::Png, 0)
        );
        assert_eq!(
            negotiate(RequestedFormat::WebP, 42, NONE, OPAQUE_JPEG),
            (OutputFormat::WebP, 42)
        );
    }

    #[test]
    fn auto_with_everything() {
        assert_eq!(
            negotiate(RequestedFormat::Auto, 80, ALL, ALPHA_PNG),
            (OutputFormat::Avif, 80)
        );
        assert_eq!(
            negotiate(RequestedFormat::Auto, 80, ALL, OPAQUE_JPEG),
            (OutputFormat::WebP, 80)
        );
        let opaque_png = SourceTraits {
            is_png: true,
            has_transparency: false,
        };
        assert_eq!(
            negotiate(RequestedFormat::Auto, 80, ALL, opaque_png),
            (OutputFormat::WebP, 80)
        );
    }

    #[test]
    fn auto_with_single_capability() {
        assert_eq!(
            negotiate(RequestedFormat::Auto, 70, EncoderCapabilities::WEBP, ALPHA_PNG),
            (OutputFormat::WebP, 70)
        );
        assert_eq!(
            negotiate(RequestedFormat::Auto, 70, EncoderCapabilities::AVIF, OPAQUE_JPEG),
            (OutputFormat::Avif, 70)
        );
    }

    #[test]
    fn auto_without_modern_encoders() {
        assert_eq!(
            negotiate(RequestedFormat::Auto, 90, NONE, ALPHA_PNG),
            (OutputFormat::Png, 0)
        );
        assert_eq!(
            negotiate(RequestedFormat::Auto, 90, NONE, OPAQUE_JPEG),
            (OutputFormat::Jpeg, 90)
        );
    }

    #[test]
    fn explicit_avif_negotiates_like_auto() {
        for caps in [ALL, NONE, EncoderCapabilities::WEBP, EncoderCapabilities::AVIF] {
            for src in [ALPHA_PNG, OPAQUE_JPEG] {
                assert_eq!(
                    negotiate(RequestedFormat::Avif, 60, caps, src),
                    negotiate(RequestedFormat::Auto, 60, caps, src)
                );
            }
        }
    }
}
