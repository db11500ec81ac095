// lib.rs
//
// tr-image: on-the-fly image transformation driven by a compact URL directive.
//
//   https://cdn.test/cat.jpg?tr=w-300,h-200,cm-pad_resize,fo-left,bg-ffffff,q-80,f-auto
//
// The directive is parsed into a TransformRequest, resolved against the source
// into an immutable TransformationPlan, and executed by the codec layer.

#[cfg(feature = "napi")]
#[macro_use]
extern crate napi_derive;

// jemalloc is not supported on Windows/MSVC
#[cfg(all(feature = "jemalloc", not(target_env = "msvc")))]
#[global_allocator]
static ALLOC: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

pub mod codecs;
pub mod engine;
pub mod error;
pub mod ops;

pub use engine::{
    resolve_plan, EngineConfig, FileFetcher, ImageFetcher, MemoryFetcher, SourceInfo,
    TransformEngine, TransformOutput, TransformRequest, TransformationPlan,
};
pub use error::{ErrorCategory, TransformError};
pub use ops::{EncoderCapabilities, OutputFormat, ResizeStrategy, Rgb, SourceFormat};

#[cfg(feature = "napi")]
use napi::bindgen_prelude::*;

#[cfg(feature = "napi")]
const BUFFER_SOURCE_URL: &str = "memory://input";

#[cfg(feature = "napi")]
/// Plan returned by resolvePlan()
#[napi(object)]
pub struct PlanResult {
    /// Final canvas width, absent when the source would be served as is
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// force | at_max | at_max_enlarge | at_least | pad | cover
    pub strategy: Option<String>,
    /// jpeg | png | webp | avif
    pub format: String,
    /// Encoder quality, or PNG compression level for png
    pub quality: u32,
    pub content_type: String,
    pub background: String,
}

#[cfg(feature = "napi")]
impl From<TransformationPlan> for PlanResult {
    fn from(plan: TransformationPlan) -> Self {
        Self {
            width: plan.geometry.map(|g| g.dest_width),
            height: plan.geometry.map(|g| g.dest_height),
            strategy: plan.strategy.map(|s| s.as_str().to_string()),
            format: plan.output.format.as_str().to_string(),
            quality: plan.output.quality as u32,
            content_type: plan.content_type().to_string(),
            background: plan.output.background.to_string(),
        }
    }
}

#[cfg(feature = "napi")]
/// Result of transformBuffer()
#[napi(object)]
pub struct TransformResult {
    pub content_type: String,
    pub data: Buffer,
    /// True when the input bytes were returned unmodified
    pub passthrough: bool,
}

#[cfg(feature = "napi")]
/// Resolve the plan for `url` against known source facts, without any I/O.
#[napi(js_name = "resolvePlan")]
pub fn resolve_plan_js(
    url: String,
    width: u32,
    height: u32,
    content_type: Option<String>,
    has_transparency: Option<bool>,
) -> Result<PlanResult> {
    let format = match content_type.as_deref() {
        None => SourceFormat::Jpeg,
        Some(ct) => SourceFormat::from_content_type(ct).ok_or_else(|| {
            Error::new(
                Status::InvalidArg,
                format!("unsupported source content type: {ct}"),
            )
        })?,
    };
    let info = SourceInfo {
        width,
        height,
        format,
        has_transparency: has_transparency.unwrap_or(false),
    };
    let engine = TransformEngine::with_config(MemoryFetcher::new(), EngineConfig::from_env());
    let plan = engine.plan_for(&url, &info)?;
    Ok(plan.into())
}

#[cfg(feature = "napi")]
/// Transform an in-memory image with a directive value such as `w-300,h-200,f-auto`.
/// `accept` narrows auto negotiation like an HTTP Accept header would.
#[napi(js_name = "transformBuffer")]
pub fn transform_buffer(
    buffer: Buffer,
    directive: String,
    accept: Option<String>,
) -> Result<TransformResult> {
    let fetcher = MemoryFetcher::new().with(BUFFER_SOURCE_URL, buffer.to_vec());
    let engine = TransformEngine::with_config(fetcher, EngineConfig::from_env());
    // The directive is taken as is: no percent-decoding, no `&` splitting
    let request = engine
        .config()
        .base_request()
        .merged(&crate::engine::Directive::parse(&directive));
    let caps = accept
        .as_deref()
        .map_or(EncoderCapabilities::all(), EncoderCapabilities::from_accept);
    let output = engine.process_request(BUFFER_SOURCE_URL, &request, caps)?;
    Ok(TransformResult {
        content_type: output.content_type.to_string(),
        passthrough: output.is_passthrough(),
        data: output.bytes.into(),
    })
}

#[cfg(feature = "napi")]
/// Get library version
#[napi]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
