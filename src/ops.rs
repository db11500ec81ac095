// src/ops.rs
//
// Directive vocabulary: transform keys, their typed values, and the resize
// strategies a directive can select.
// Everything here is a small Copy value; parsing never fails loudly.

use crate::error::TransformError;
use bitflags::bitflags;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt;

/// Canonical transform names understood in a `tr=` directive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TransformKey {
    Height,
    Width,
    AspectRatio,
    Quality,
    Crop,
    CropMode,
    Focus,
    Format,
    Background,
}

impl TransformKey {
    pub const ALL: [TransformKey; 9] = [
        TransformKey::Height,
        TransformKey::Width,
        TransformKey::AspectRatio,
        TransformKey::Quality,
        TransformKey::Crop,
        TransformKey::CropMode,
        TransformKey::Focus,
        TransformKey::Format,
        TransformKey::Background,
    ];

    /// Wire alias used inside the directive.
    pub fn short_key(&self) -> &'static str {
        match self {
            TransformKey::Height => "h",
            TransformKey::Width => "w",
            TransformKey::AspectRatio => "ar",
            TransformKey::Quality => "q",
            TransformKey::Crop => "c",
            TransformKey::CropMode => "cm",
            TransformKey::Focus => "fo",
            TransformKey::Format => "f",
            TransformKey::Background => "bg",
        }
    }

    pub fn canonical_name(&self) -> &'static str {
        match self {
            TransformKey::Height => "height",
            TransformKey::Width => "width",
            TransformKey::AspectRatio => "aspectRatio",
            TransformKey::Quality => "quality",
            TransformKey::Crop => "crop",
            TransformKey::CropMode => "cropMode",
            TransformKey::Focus => "focus",
            TransformKey::Format => "format",
            TransformKey::Background => "background",
        }
    }

    /// Resolve a short key. Unknown keys resolve to `None` and are skipped by the parser.
    pub fn from_short_key(key: &str) -> Option<Self> {
        SHORT_KEYS.get(key).copied()
    }
}

impl fmt::Display for TransformKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_name())
    }
}

static SHORT_KEYS: Lazy<HashMap<&'static str, TransformKey>> = Lazy::new(|| {
    TransformKey::ALL
        .iter()
        .map(|key| (key.short_key(), *key))
        .collect()
});

/// Aspect ratio `num:den`, written `num-den` on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AspectRatio {
    pub num: u32,
    pub den: u32,
}

impl AspectRatio {
    pub fn parse(value: &str) -> Result<Self, TransformError> {
        let parts: Vec<&str> = value.split('-').collect();
        if parts.len() != 2 {
            return Err(TransformError::bad_aspect_ratio(value.to_string()));
        }
        let num = parts[0].trim().parse::<u32>().ok().filter(|n| *n > 0);
        let den = parts[1].trim().parse::<u32>().ok().filter(|n| *n > 0);
        match (num, den) {
            (Some(num), Some(den)) => Ok(Self { num, den }),
            _ => Err(TransformError::bad_aspect_ratio(value.to_string())),
        }
    }

    pub fn ratio(&self) -> f64 {
        self.num as f64 / self.den as f64
    }
}

/// Aspect-preserving (or forcing) resize strategy selected with `c-`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CropStrategy {
    Force,
    AtMax,
    AtMaxEnlarge,
    AtLeast,
}

impl CropStrategy {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "force" => Some(Self::Force),
            "at_max" => Some(Self::AtMax),
            "at_max_enlarge" => Some(Self::AtMaxEnlarge),
            "at_least" => Some(Self::AtLeast),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Force => "force",
            Self::AtMax => "at_max",
            Self::AtMaxEnlarge => "at_max_enlarge",
            Self::AtLeast => "at_least",
        }
    }
}

/// Crop mode selected with `cm-`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CropMode {
    #[default]
    None,
    /// Fit the whole source inside the canvas and pad with the background
    Pad,
}

impl CropMode {
    /// Any non-empty mode value turns padding on; `pad_resize` is the documented spelling.
    pub fn parse(value: &str) -> Option<Self> {
        if value.is_empty() {
            None
        } else {
            Some(Self::Pad)
        }
    }
}

/// Which edge the padded image sticks to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FocusSide {
    #[default]
    None,
    Left,
    Right,
    Top,
    Bottom,
}

impl FocusSide {
    pub fn parse(value: &str) -> Self {
        match value {
            "left" => Self::Left,
            "right" => Self::Right,
            "top" => Self::Top,
            "bottom" => Self::Bottom,
            _ => Self::None,
        }
    }
}

/// Format requested with `f-`. Only whitelisted values are accepted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RequestedFormat {
    #[default]
    Auto,
    Jpg,
    Jpeg,
    Png,
    WebP,
    Avif,
}

impl RequestedFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "auto" => Some(Self::Auto),
            "jpg" => Some(Self::Jpg),
            "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "webp" => Some(Self::WebP),
            "avif" => Some(Self::Avif),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Jpg => "jpg",
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::WebP => "webp",
            Self::Avif => "avif",
        }
    }
}

/// Encoding actually used for the response.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    Jpeg,
    Png,
    WebP,
    Avif,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::WebP => "webp",
            Self::Avif => "avif",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::WebP => "image/webp",
            Self::Avif => "image/avif",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::WebP => "webp",
            Self::Avif => "avif",
        }
    }
}

/// Content type of a fetched source, as sniffed from its bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SourceFormat {
    Jpeg,
    Png,
    WebP,
    Avif,
    Gif,
    Svg,
}

impl SourceFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::WebP => "image/webp",
            Self::Avif => "image/avif",
            Self::Gif => "image/gif",
            Self::Svg => "image/svg+xml",
        }
    }

    /// Formats served byte-for-byte without decoding.
    pub fn is_passthrough(&self) -> bool {
        matches!(self, Self::Gif | Self::Svg)
    }

    /// Guess from a path extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "webp" => Some(Self::WebP),
            "avif" => Some(Self::Avif),
            "gif" => Some(Self::Gif),
            "svg" => Some(Self::Svg),
            _ => None,
        }
    }

    /// Map a MIME type such as `image/svg+xml; charset=utf-8`.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let mime = content_type.split(';').next().unwrap_or("").trim();
        match mime.to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            "image/webp" => Some(Self::WebP),
            "image/avif" => Some(Self::Avif),
            "image/gif" => Some(Self::Gif),
            "image/svg+xml" => Some(Self::Svg),
            _ => None,
        }
    }
}

/// 24-bit background colour, written as `RRGGBB` on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const DEFAULT_BACKGROUND: Rgb = Rgb {
        r: 0xF3,
        g: 0xF3,
        b: 0xF3,
    };

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `RRGGBB` (a leading `#` is tolerated).
    pub fn parse_hex(value: &str) -> Option<Self> {
        let hex = value.strip_prefix('#').unwrap_or(value);
        if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        Some(Self {
            r: channel(0)?,
            g: channel(2)?,
            b: channel(4)?,
        })
    }

    pub fn to_rgba(self) -> [u8; 4] {
        [self.r, self.g, self.b, 255]
    }
}

impl Default for Rgb {
    fn default() -> Self {
        Self::DEFAULT_BACKGROUND
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

bitflags! {
    /// Output encoders available for `auto` negotiation.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct EncoderCapabilities: u8 {
        const WEBP = 1;
        const AVIF = 1 << 1;
    }
}

impl EncoderCapabilities {
    /// What this build can encode. AVIF needs the `avif` cargo feature.
    pub fn detect() -> Self {
        let mut caps = Self::WEBP;
        if cfg!(feature = "avif") {
            caps |= Self::AVIF;
        }
        caps
    }

    /// Narrow to the modern formats a client lists in its `Accept` header.
    pub fn from_accept(accept: &str) -> Self {
        let mut caps = Self::empty();
        for media in accept.split(',') {
            let media = media.split(';').next().unwrap_or("").trim();
            match media.to_ascii_lowercase().as_str() {
                "image/webp" => caps |= Self::WEBP,
                "image/avif" => caps |= Self::AVIF,
                _ => {}
            }
        }
        caps
    }
}

/// Resize algorithm chosen once per request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResizeStrategy {
    /// Exact target size, aspect ratio distorted
    Force,
    /// Fit inside target, never enlarge
    AtMax,
    /// Fit inside target with the binding axis clamped to the source size
    AtMaxEnlarge,
    /// Cover the target in both axes
    AtLeast,
    /// Fit inside a target-sized canvas filled with the background colour
    Pad { focus: FocusSide },
    /// Fill the target exactly, cropping the overflowing axis around the centre
    Cover,
}

impl ResizeStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Force => "force",
            Self::AtMax => "at_max",
            Self::AtMaxEnlarge => "at_max_enlarge",
            Self::AtLeast => "at_least",
            Self::Pad { .. } => "pad",
            Self::Cover => "cover",
        }
    }

    /// Strategies that may produce output larger than the source.
    pub fn allows_enlargement(&self) -> bool {
        matches!(self, Self::Force | Self::AtMaxEnlarge)
    }
}

impl From<CropStrategy> for ResizeStrategy {
    fn from(value: CropStrategy) -> Self {
        match value {
            CropStrategy::Force => Self::Force,
            CropStrategy::AtMax => Self::AtMax,
            CropStrategy::AtMaxEnlarge => Self::AtMaxEnlarge,
            CropStrategy::AtLeast => Self::AtLeast,
        }
    }
}
