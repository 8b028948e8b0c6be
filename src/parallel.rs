//! Sizing of the Rayon pool that runs the masking and reduction kernels

use crate::errors::{DiagError, Result};
use rayon::ThreadPoolBuilder;

/// Thread count requested for the global pool
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParallelConfig {
    pub num_threads: Option<usize>,
}

impl ParallelConfig {
    /// `Some(0)` asks for one thread per CPU core, `None` keeps Rayon's own choice.
    #[must_use]
    pub fn new(requested: Option<usize>) -> Self {
        let num_threads = requested.map(|n| if n == 0 { num_cpus::get() } else { n });
        Self { num_threads }
    }

    /// Builds the global pool and reports what the kernels will run on.
    ///
    /// # Errors
    ///
    /// Returns [`DiagError::ThreadPoolError`] if the global pool was already
    /// initialised or cannot be built.
    pub fn setup_global_pool(&self) -> Result<ParallelInfo> {
        match self.num_threads {
            Some(num_threads) => {
                ThreadPoolBuilder::new()
                    .num_threads(num_threads)
                    .thread_name(|i| format!("climdiag-{i}"))
                    .build_global()
                    .map_err(|e| {
                        DiagError::ThreadPoolError(format!(
                            "Failed to initialize thread pool with {num_threads} threads: {e}"
                        ))
                    })?;
                log::debug!("Global pool built with {num_threads} threads");
            }
            None => log::debug!("Using default thread pool configuration"),
        }
        Ok(ParallelInfo::current())
    }
}

/// Threads of the global pool against the cores of the machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParallelInfo {
    pub current_threads: usize,
    pub available_cores: usize,
}

impl ParallelInfo {
    #[must_use]
    pub fn current() -> Self {
        Self {
            current_threads: rayon::current_num_threads(),
            available_cores: num_cpus::get(),
        }
    }

    pub fn log_info(&self) {
        log::info!(
            "Masking and reductions run on {} threads ({} CPU cores available)",
            self.current_threads,
            self.available_cores
        );
    }
}
