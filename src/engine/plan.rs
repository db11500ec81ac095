// src/engine/plan.rs
//
// TransformationPlan: the immutable result of directive -> dimensions ->
// strategy -> format. Built once per request, never mutated.

use crate::engine::dimensions::{resolve_dimensions, TargetDimensions};
use crate::engine::directive::TransformRequest;
use crate::engine::format::{negotiate, SourceTraits};
use crate::engine::strategy::{compute_geometry, select_strategy, Geometry};
use crate::error::Result;
use crate::ops::{EncoderCapabilities, OutputFormat, ResizeStrategy, Rgb, SourceFormat};
use tracing::debug;

/// What the plan needs to know about the decoded source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SourceInfo {
    pub width: u32,
    pub height: u32,
    pub format: SourceFormat,
    pub has_transparency: bool,
}

impl SourceInfo {
    pub fn traits(&self) -> SourceTraits {
        SourceTraits {
            is_png: self.format == SourceFormat::Png,
            has_transparency: self.has_transparency,
        }
    }
}

/// Encoder settings. `quality` is a PNG compression level when `format` is PNG.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OutputSpec {
    pub format: OutputFormat,
    pub quality: u8,
    pub background: Rgb,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransformationPlan {
    /// `None` when the directive names no dimensions
    pub target: Option<TargetDimensions>,
    pub strategy: Option<ResizeStrategy>,
    pub geometry: Option<Geometry>,
    pub output: OutputSpec,
}

impl TransformationPlan {
    /// No geometry: the source bytes are served unmodified.
    pub fn is_passthrough(&self) -> bool {
        self.geometry.is_none()
    }

    pub fn content_type(&self) -> &'static str {
        self.output.format.content_type()
    }
}

/// Run every planning stage for `request` against `source`.
///
/// Fails only with `ImageTooSmall`; every parsing anomaly has already been
/// recovered by the time a `TransformRequest` exists.
pub fn resolve_plan(
    request: &TransformRequest,
    source: &SourceInfo,
    caps: EncoderCapabilities,
) -> Result<TransformationPlan> {
    let (format, quality) = negotiate(request.format, request.quality, caps, source.traits());
    let output = OutputSpec {
        format,
        quality,
        background: request.background,
    };

    let Some(target) = resolve_dimensions(request.width, request.height, request.aspect_ratio)
    else {
        debug!("no target dimensions, serving source as is");
        return Ok(TransformationPlan {
            target: None,
            strategy: None,
            geometry: None,
            output,
        });
    };

    let strategy = select_strategy(request.crop, request.crop_mode, request.focus, &target);
    let geometry = compute_geometry((source.width, source.height), &target, strategy)?;
    debug!(
        strategy = strategy.as_str(),
        target_width = target.width,
        target_height = target.height,
        dest_width = geometry.dest_width,
        dest_height = geometry.dest_height,
        "resolved transformation plan"
    );

    Ok(TransformationPlan {
        target: Some(target),
        strategy: Some(strategy),
        geometry: Some(geometry),
        output,
    })
}
