// src/engine/pool.rs
//
// Global thread pool for batch processing.
//
// One pool is shared by every batch. Size comes from TR_IMAGE_THREADS when set
// to a positive integer, otherwise from std::thread::available_parallelism()
// (which respects cgroup CPU quotas).
//
// The pool is initialized lazily on first use; changing the variable afterwards
// has no effect.

use rayon::ThreadPool;
use std::sync::OnceLock;
use tracing::{debug, warn};

pub const ENV_THREADS: &str = "TR_IMAGE_THREADS";

/// Upper bound for TR_IMAGE_THREADS
pub const MAX_THREADS: usize = 1024;

const MIN_THREADS: usize = 1;

static GLOBAL_THREAD_POOL: OnceLock<Option<ThreadPool>> = OnceLock::new();

/// Run `op` on the shared batch pool.
///
/// If no dedicated pool could be built, `op` runs on rayon's global pool.
pub fn install<R, OP>(op: OP) -> R
where
    OP: FnOnce() -> R + Send,
    R: Send,
{
    match get_pool() {
        Some(pool) => pool.install(op),
        None => op(),
    }
}

pub fn get_pool() -> Option<&'static ThreadPool> {
    GLOBAL_THREAD_POOL
        .get_or_init(|| {
            let configured = std::env::var(ENV_THREADS).ok();
            let num_threads = thread_count(configured.as_deref());
            match rayon::ThreadPoolBuilder::new()
                .num_threads(num_threads)
                .thread_name(|i| format!("tr-image-{i}"))
                .build()
            {
                Ok(pool) => {
                    debug!(threads = num_threads, "batch thread pool ready");
                    Some(pool)
                }
                Err(e) => {
                    warn!(error = %e, "falling back to rayon global pool");
                    None
                }
            }
        })
        .as_ref()
}

/// Thread count for an optional TR_IMAGE_THREADS value.
pub fn thread_count(configured: Option<&str>) -> usize {
    configured
        .and_then(|raw| raw.trim().parse::<usize>().ok())
        .filter(|&n| n > 0)
        .map(|n| n.min(MAX_THREADS))
        .unwrap_or_else(detected_parallelism)
}

fn detected_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(MIN_THREADS)
        .max(MIN_THREADS)
}
