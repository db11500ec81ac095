// src/engine/tasks.rs
//
// Batch processing: many URLs through one engine on the shared rayon pool.
// Each URL succeeds or fails on its own; one bad source never aborts the batch.

use crate::engine::api::{TransformEngine, TransformOutput};
use crate::engine::io::ImageFetcher;
use crate::engine::pool;
use crate::error::{ErrorCategory, Result};
use rayon::prelude::*;
use std::time::Instant;
use tracing::{debug, warn};

/// Outcome for one URL of a batch.
#[derive(Debug)]
pub struct BatchResult {
    pub url: String,
    pub result: Result<TransformOutput>,
}

impl BatchResult {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    /// Error category for failed entries.
    pub fn error_category(&self) -> Option<ErrorCategory> {
        self.result.as_ref().err().map(|e| e.category())
    }

    /// HTTP status a handler would answer this entry with.
    pub fn http_status(&self) -> u16 {
        match &self.result {
            Ok(_) => 200,
            Err(e) => e.http_status(),
        }
    }
}

/// Process every URL in parallel. Results keep the input order.
pub fn process_batch<F: ImageFetcher>(engine: &TransformEngine<F>, urls: &[String]) -> Vec<BatchResult> {
    let started_at = Instant::now();
    let results: Vec<BatchResult> = pool::install(|| {
        urls.par_iter()
            .map(|url| {
                let result = engine.process(url);
                if let Err(err) = &result {
                    warn!(url = %url, code = err.category().code(), error = %err, "batch entry failed");
                }
                BatchResult {
                    url: url.clone(),
                    result,
                }
            })
            .collect()
    });

    debug!(
        total = results.len(),
        failed = results.iter().filter(|r| !r.is_ok()).count(),
        elapsed_ms = started_at.elapsed().as_millis() as u64,
        "batch complete"
    );
    results
}
