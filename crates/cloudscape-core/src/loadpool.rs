//! Background execution for children fetches.
//!
//! Child loads run off the dispatch thread on a global rayon-backed pool.
//! Completion routing back into the tree is the caller's job (node state
//! plus the dispatch context); the pool only executes.
//!
//! # Example
//!
//! ```
//! use cloudscape_core::loadpool::{LoadPool, CancellationToken};
//!
//! let token = CancellationToken::new();
//! let task_token = token.clone();
//!
//! LoadPool::global().spawn(move || {
//!     if task_token.is_cancelled() {
//!         return;
//!     }
//!     // fetch children...
//! });
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use rayon::{ThreadPool as RayonThreadPool, ThreadPoolBuilder};

use crate::logging::targets;

/// Global load pool instance.
static GLOBAL_POOL: OnceLock<LoadPool> = OnceLock::new();

/// A cancellation token for cooperative load cancellation.
///
/// Suppliers must periodically check the token and bail out when an
/// in-flight load has been superseded or its node destroyed.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new token in the non-cancelled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if cancellation has been requested.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }
}

/// A pool of background threads for load tasks.
///
/// Most callers use [`LoadPool::global`]; per-instance pools exist for
/// tests that need a bounded thread count.
pub struct LoadPool {
    pool: RayonThreadPool,
}

impl LoadPool {
    /// Get the global load pool, creating it on first use.
    pub fn global() -> &'static LoadPool {
        GLOBAL_POOL.get_or_init(|| {
            LoadPool::new(None).expect("failed to build global load pool")
        })
    }

    /// Create a pool with an explicit thread count.
    ///
    /// `None` lets rayon pick a count based on available parallelism.
    pub fn new(num_threads: Option<usize>) -> Result<Self, rayon::ThreadPoolBuildError> {
        let mut builder = ThreadPoolBuilder::new().thread_name(|i| format!("cloudscape-load-{}", i));
        if let Some(n) = num_threads {
            builder = builder.num_threads(n);
        }
        let pool = builder.build()?;
        tracing::debug!(
            target: targets::LOADPOOL,
            threads = pool.current_num_threads(),
            "load pool started"
        );
        Ok(Self { pool })
    }

    /// Submit a task for background execution.
    pub fn spawn<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.pool.spawn(task);
    }

    /// Number of threads in the pool.
    pub fn num_threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}
