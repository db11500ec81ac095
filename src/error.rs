// src/error.rs
//
// Unified error handling for tr-image
// Uses thiserror for simple, type-safe error handling
//
// Error Taxonomy:
// - Validation: bad request input (missing source, image too small)
// - NotFound: source cannot be fetched, sniffed or decoded
// - Codec: resample/encode failures
// - ResourceLimit: dimension/pixel/byte limits
// - InternalBug: library bugs (should not happen)

#[cfg(feature = "napi")]
use napi::bindgen_prelude::*;
use std::borrow::Cow;
use thiserror::Error;

/// Error taxonomy used by the boundary layer to pick a response code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCategory {
    /// Invalid request, the caller can fix it
    Validation,
    /// Source missing, unsupported or undecodable
    NotFound,
    /// Resample/encode issues
    Codec,
    /// Memory/dimension/byte limits
    ResourceLimit,
    /// Library bugs (should not happen)
    InternalBug,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Validation => "Validation",
            ErrorCategory::NotFound => "NotFound",
            ErrorCategory::Codec => "Codec",
            ErrorCategory::ResourceLimit => "ResourceLimit",
            ErrorCategory::InternalBug => "InternalBug",
        }
    }

    /// HTTP status a request handler should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorCategory::Validation => 400,
            ErrorCategory::NotFound => 404,
            ErrorCategory::ResourceLimit => 413,
            ErrorCategory::Codec | ErrorCategory::InternalBug => 500,
        }
    }

    /// Get the TR_IMAGE_* error code string for this category
    pub fn code(&self) -> &'static str {
        match self {
            ErrorCategory::Validation => "TR_IMAGE_VALIDATION_ERROR",
            ErrorCategory::NotFound => "TR_IMAGE_NOT_FOUND",
            ErrorCategory::Codec => "TR_IMAGE_CODEC_ERROR",
            ErrorCategory::ResourceLimit => "TR_IMAGE_RESOURCE_LIMIT",
            ErrorCategory::InternalBug => "TR_IMAGE_INTERNAL_BUG",
        }
    }
}

/// tr-image error types
#[derive(Debug, Error)]
pub enum TransformError {
    // Request validation
    #[error("Missing source URL")]
    MissingSource,

    #[error("Image too small: source {source_width}x{source_height} is smaller than target {target_width}x{target_height}")]
    ImageTooSmall {
        source_width: u32,
        source_height: u32,
        target_width: u32,
        target_height: u32,
    },

    #[error("Invalid aspect ratio '{value}': expected two positive integers joined by '-'")]
    BadAspectRatio { value: Cow<'static, str> },

    // Source errors
    #[error("Image does not exist: {url}")]
    SourceMissing { url: Cow<'static, str> },

    #[error("Failed to read source '{url}': {source}")]
    SourceReadFailed {
        url: Cow<'static, str>,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported content type: {content_type}")]
    UnsupportedContentType { content_type: Cow<'static, str> },

    #[error("Failed to decode image: {message}")]
    DecodeFailed { message: Cow<'static, str> },

    // Size limits
    #[error("Image dimension {dimension} exceeds maximum {max}")]
    DimensionExceedsLimit { dimension: u32, max: u32 },

    #[error("Image pixel count {pixels} exceeds maximum {max}")]
    PixelCountExceedsLimit { pixels: u64, max: u64 },

    #[error("Image Firewall blocked the image: {reason}")]
    FirewallViolation { reason: Cow<'static, str> },

    // Processing errors
    #[error("Resize failed ({source_width}x{source_height} -> {target_width}x{target_height}): {message}")]
    ResizeFailed {
        source_width: u32,
        source_height: u32,
        target_width: u32,
        target_height: u32,
        message: Cow<'static, str>,
    },

    #[error("Failed to encode as {format}: {message}")]
    EncodeFailed {
        format: Cow<'static, str>,
        message: Cow<'static, str>,
    },

    #[error("Invalid value for {name}: {value}. {reason}")]
    InvalidArgument {
        name: Cow<'static, str>,
        value: Cow<'static, str>,
        reason: Cow<'static, str>,
    },

    // Internal errors
    #[error("Internal error: {message}")]
    InternalPanic { message: Cow<'static, str> },
}

impl Clone for TransformError {
    fn clone(&self) -> Self {
        match self {
            Self::SourceReadFailed { url, source } => Self::SourceReadFailed {
                url: url.clone(),
                source: std::io::Error::new(source.kind(), source.to_string()),
            },
            Self::MissingSource => Self::MissingSource,
            Self::ImageTooSmall {
                source_width,
                source_height,
                target_width,
                target_height,
            } => Self::ImageTooSmall {
                source_width: *source_width,
                source_height: *source_height,
                target_width: *target_width,
                target_height: *target_height,
            },
            Self::BadAspectRatio { value } => Self::BadAspectRatio {
                value: value.clone(),
            },
            Self::SourceMissing { url } => Self::SourceMissing { url: url.clone() },
            Self::UnsupportedContentType { content_type } => Self::UnsupportedContentType {
                content_type: content_type.clone(),
            },
            Self::DecodeFailed { message } => Self::DecodeFailed {
                message: message.clone(),
            },
            Self::DimensionExceedsLimit { dimension, max } => Self::DimensionExceedsLimit {
                dimension: *dimension,
                max: *max,
            },
            Self::PixelCountExceedsLimit { pixels, max } => Self::PixelCountExceedsLimit {
                pixels: *pixels,
                max: *max,
            },
            Self::FirewallViolation { reason } => Self::FirewallViolation {
                reason: reason.clone(),
            },
            Self::ResizeFailed {
                source_width,
                source_height,
                target_width,
                target_height,
                message,
            } => Self::ResizeFailed {
                source_width: *source_width,
                source_height: *source_height,
                target_width: *target_width,
                target_height: *target_height,
                message: message.clone(),
            },
            Self::EncodeFailed { format, message } => Self::EncodeFailed {
                format: format.clone(),
                message: message.clone(),
            },
            Self::InvalidArgument {
                name,
                value,
                reason,
            } => Self::InvalidArgument {
                name: name.clone(),
                value: value.clone(),
                reason: reason.clone(),
            },
            Self::InternalPanic { message } => Self::InternalPanic {
                message: message.clone(),
            },
        }
    }
}

// Constructor Helpers
impl TransformError {
    pub fn missing_source() -> Self {
        Self::MissingSource
    }

    pub fn image_too_small(source_dims: (u32, u32), target_dims: (u32, u32)) -> Self {
        Self::ImageTooSmall {
            source_width: source_dims.0,
            source_height: source_dims.1,
            target_width: target_dims.0,
            target_height: target_dims.1,
        }
    }

    pub fn bad_aspect_ratio(value: impl Into<Cow<'static, str>>) -> Self {
        Self::BadAspectRatio {
            value: value.into(),
        }
    }

    pub fn source_missing(url: impl Into<Cow<'static, str>>) -> Self {
        Self::SourceMissing { url: url.into() }
    }

    pub fn source_read_failed(url: impl Into<Cow<'static, str>>, source: std::io::Error) -> Self {
        Self::SourceReadFailed {
            url: url.into(),
            source,
        }
    }

    pub fn unsupported_content_type(content_type: impl Into<Cow<'static, str>>) -> Self {
        Self::UnsupportedContentType {
            content_type: content_type.into(),
        }
    }

    pub fn decode_failed(message: impl Into<Cow<'static, str>>) -> Self {
        Self::DecodeFailed {
            message: message.into(),
        }
    }

    pub fn dimension_exceeds_limit(dimension: u32, max: u32) -> Self {
        Self::DimensionExceedsLimit { dimension, max }
    }

    pub fn pixel_count_exceeds_limit(pixels: u64, max: u64) -> Self {
        Self::PixelCountExceedsLimit { pixels, max }
    }

    pub fn firewall_violation(reason: impl Into<Cow<'static, str>>) -> Self {
        Self::FirewallViolation {
            reason: reason.into(),
        }
    }

    pub fn resize_failed(
        source_dims: (u32, u32),
        target_dims: (u32, u32),
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::ResizeFailed {
            source_width: source_dims.0,
            source_height: source_dims.1,
            target_width: target_dims.0,
            target_height: target_dims.1,
            message: message.into(),
        }
    }

    pub fn encode_failed(
        format: impl Into<Cow<'static, str>>,
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::EncodeFailed {
            format: format.into(),
            message: message.into(),
        }
    }

    pub fn invalid_argument(
        name: impl Into<Cow<'static, str>>,
        value: impl Into<Cow<'static, str>>,
        reason: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::InvalidArgument {
            name: name.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub fn internal_panic(message: impl Into<Cow<'static, str>>) -> Self {
        Self::InternalPanic {
            message: message.into(),
        }
    }

    /// Get the error category for this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::MissingSource
            | Self::ImageTooSmall { .. }
            | Self::BadAspectRatio { .. }
            | Self::InvalidArgument { .. } => ErrorCategory::Validation,

            // A source that cannot be read, sniffed or decoded is reported as
            // "does not exist" to the client.
            Self::SourceMissing { .. }
            | Self::SourceReadFailed { .. }
            | Self::UnsupportedContentType { .. }
            | Self::DecodeFailed { .. } => ErrorCategory::NotFound,

            Self::ResizeFailed { .. } | Self::EncodeFailed { .. } => ErrorCategory::Codec,

            Self::DimensionExceedsLimit { .. }
            | Self::PixelCountExceedsLimit { .. }
            | Self::FirewallViolation { .. } => ErrorCategory::ResourceLimit,

            Self::InternalPanic { .. } => ErrorCategory::InternalBug,
        }
    }

    /// Shortcut for `self.category().http_status()`.
    pub fn http_status(&self) -> u16 {
        self.category().http_status()
    }
}

// Conversion to NAPI Error
#[cfg(feature = "napi")]
impl From<TransformError> for napi::Error {
    fn from(err: TransformError) -> Self {
        let status = match err.category() {
            ErrorCategory::Validation | ErrorCategory::NotFound => Status::InvalidArg,
            ErrorCategory::Codec | ErrorCategory::ResourceLimit | ErrorCategory::InternalBug => {
                Status::GenericFailure
            }
        };
        napi::Error::new(status, format!("{}: {}", err.category().code(), err))
    }
}

// Result type alias
pub type Result<T> = std::result::Result<T, TransformError>;
