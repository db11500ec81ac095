// src/engine/api.rs
//
// TransformEngine: the request-level entry point.
// URL in, encoded image (or the untouched source) out.

use crate::engine::config::EngineConfig;
use crate::engine::decoder::{check_dimensions, decode, sniff_content_type};
use crate::engine::dimensions::resolve_dimensions;
use crate::engine::directive::{Directive, TransformRequest};
use crate::engine::encoder::encode;
use crate::engine::io::{strip_directive, url_extension, ImageFetcher, Source};
use crate::engine::pipeline::{execute_geometry, has_transparency};
use crate::engine::plan::{resolve_plan, SourceInfo, TransformationPlan};
use crate::engine::tasks::{process_batch, BatchResult};
use crate::error::{Result, TransformError};
use crate::ops::{EncoderCapabilities, SourceFormat};
use std::time::Instant;
use tracing::debug;

/// Response body plus the content type to serve it with.
#[derive(Clone, Debug)]
pub struct TransformOutput {
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
    /// `None` when the source was served unmodified
    pub plan: Option<TransformationPlan>,
}

impl TransformOutput {
    fn passthrough(format: SourceFormat, source: &Source) -> Self {
        Self {
            content_type: format.content_type(),
            bytes: source.to_vec(),
            plan: None,
        }
    }

    pub fn is_passthrough(&self) -> bool {
        self.plan.map_or(true, |plan| plan.is_passthrough())
    }
}

/// Resolves transformation URLs against an [`ImageFetcher`].
///
/// ```no_run
/// use tr_image::{FileFetcher, TransformEngine};
///
/// let engine = TransformEngine::new(FileFetcher::with_root("/srv/images"));
/// let out = engine.process("https://cdn.test/cat.jpg?tr=w-300,h-200,f-auto")?;
/// assert!(out.content_type.starts_with("image/"));
/// # Ok::<(), tr_image::TransformError>(())
/// ```
#[derive(Clone, Debug)]
pub struct TransformEngine<F> {
    fetcher: F,
    config: EngineConfig,
}

impl<F: ImageFetcher> TransformEngine<F> {
    pub fn new(fetcher: F) -> Self {
        Self::with_config(fetcher, EngineConfig::default())
    }

    pub fn with_config(fetcher: F, config: EngineConfig) -> Self {
        Self { fetcher, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Transform the image `url` points at using the configured capabilities.
    pub fn process(&self, url: &str) -> Result<TransformOutput> {
        self.process_with_capabilities(url, self.config.capabilities)
    }

    /// Like [`process`](Self::process) with `caps` narrowing the configured
    /// capabilities, e.g. `EncoderCapabilities::from_accept(header)`.
    pub fn process_with_capabilities(
        &self,
        url: &str,
        caps: EncoderCapabilities,
    ) -> Result<TransformOutput> {
        if url.trim().is_empty() {
            return Err(TransformError::missing_source());
        }
        let request = self.request_for(url);
        self.process_request(&strip_directive(url), &request, caps)
    }

    /// Transform the source at `source_url` (no `tr` parameter) with an
    /// already built request.
    pub fn process_request(
        &self,
        source_url: &str,
        request: &TransformRequest,
        caps: EncoderCapabilities,
    ) -> Result<TransformOutput> {
        if source_url.trim().is_empty() {
            return Err(TransformError::missing_source());
        }
        let started_at = Instant::now();
        let firewall = &self.config.firewall;
        let caps = caps & self.config.capabilities & EncoderCapabilities::detect();

        let source = self.fetcher.fetch(source_url)?;
        firewall.enforce_source_len(source.len())?;

        let format = detect_format(source.as_bytes(), source_url)
            .ok_or_else(|| TransformError::source_missing(source_url.to_string()))?;
        if format.is_passthrough() {
            debug!(url = %source_url, content_type = format.content_type(), "passthrough source");
            return Ok(TransformOutput::passthrough(format, &source));
        }

        if resolve_dimensions(request.width, request.height, request.aspect_ratio).is_none() {
            debug!(url = %source_url, "no target dimensions, serving source");
            return Ok(TransformOutput::passthrough(format, &source));
        }

        let img = decode(source.as_bytes(), format)?;
        firewall.enforce_pixels(img.width(), img.height())?;
        firewall.enforce_timeout(started_at, "decode")?;

        let info = SourceInfo {
            width: img.width(),
            height: img.height(),
            format,
            has_transparency: has_transparency(&img),
        };
        let plan = resolve_plan(request, &info, caps)?;
        let Some(geometry) = plan.geometry else {
            return Ok(TransformOutput::passthrough(format, &source));
        };
        check_dimensions(geometry.dest_width, geometry.dest_height)?;

        let processed = execute_geometry(img, &geometry, plan.output.background)?;
        firewall.enforce_timeout(started_at, "resize")?;
        let bytes = encode(&processed, plan.output.format, plan.output.quality)?;
        firewall.enforce_timeout(started_at, "encode")?;

        debug!(
            url = %source_url,
            content_type = plan.content_type(),
            bytes = bytes.len(),
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            "transformed image"
        );
        Ok(TransformOutput {
            content_type: plan.content_type(),
            bytes,
            plan: Some(plan),
        })
    }

    /// Resolve the plan for `url` against already known source facts. No I/O.
    pub fn plan_for(&self, url: &str, source: &SourceInfo) -> Result<TransformationPlan> {
        if url.trim().is_empty() {
            return Err(TransformError::missing_source());
        }
        let caps = self.config.capabilities & EncoderCapabilities::detect();
        resolve_plan(&self.request_for(url), source, caps)
    }

    /// Process `urls` in parallel on the shared batch pool.
    pub fn process_batch(&self, urls: &[String]) -> Vec<BatchResult> {
        process_batch(self, urls)
    }

    fn request_for(&self, url: &str) -> TransformRequest {
        self.config.base_request().merged(&Directive::from_url(url))
    }
}

/// Magic bytes first; the URL extension only settles SVG/GIF.
fn detect_format(bytes: &[u8], url: &str) -> Option<SourceFormat> {
    sniff_content_type(bytes).or_else(|| {
        url_extension(url)
            .and_then(|ext| SourceFormat::from_extension(&ext))
            .filter(SourceFormat::is_passthrough)
    })
}
