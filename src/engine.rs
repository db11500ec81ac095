// src/engine.rs
//
// The core of tr-image. A request flows through:
// 1. directive   - parse `tr=...` into a TransformRequest
// 2. dimensions  - resolve target width/height
// 3. strategy    - pick a resize strategy and compute geometry
// 4. format      - negotiate output format and quality
// 5. plan        - bundle the above into an immutable TransformationPlan
// then decoder -> pipeline -> encoder execute it.
//
// This file is a facade over the modules in engine/.

// =============================================================================
// SECURITY LIMITS
// =============================================================================

/// Maximum allowed image dimension (width or height).
/// Larger images are rejected to prevent decompression bombs.
pub const MAX_DIMENSION: u32 = 32768;

/// Maximum allowed total pixels (width * height).
/// 100 megapixels = 400MB uncompressed RGBA.
pub const MAX_PIXELS: u64 = 100_000_000;

// =============================================================================
// MODULE DECOMPOSITION
// =============================================================================

pub mod api;
pub mod common;
pub mod config;
pub mod decoder;
pub mod dimensions;
pub mod directive;
pub mod encoder;
pub mod firewall;
pub mod format;
pub mod io;
pub mod pipeline;
pub mod plan;
pub mod pool;
pub mod strategy;
pub mod tasks;

pub use api::{TransformEngine, TransformOutput};
pub use config::EngineConfig;
pub use decoder::{check_dimensions, decode, sniff_content_type};
pub use dimensions::{resolve_dimensions, TargetDimensions};
pub use directive::{Directive, TransformRequest};
pub use encoder::{encode, QualitySettings};
pub use firewall::{FirewallConfig, FirewallPolicy};
pub use format::{negotiate, png_compression_level, SourceTraits};
pub use io::{strip_directive, url_extension, FileFetcher, ImageFetcher, MemoryFetcher, Source};
pub use pipeline::{execute_geometry, fill_background, has_transparency, resample, SourceRect};
pub use plan::{resolve_plan, OutputSpec, SourceInfo, TransformationPlan};
pub use strategy::{compute_geometry, select_strategy, Geometry};
pub use tasks::{process_batch, BatchResult};
