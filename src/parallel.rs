//! Worker thread setup for the per-gridpoint loops
//!
//! The regression and the regional mean both run on Rayon's global pool. Its
//! size comes from the analysis configuration and can only be set once per
//! process.

use crate::config::AnalysisConfig;
use crate::errors::{ClimTrendError, Result};
use log::{debug, info};
use rayon::ThreadPoolBuilder;

/// Requested size of the global Rayon pool; `None` keeps Rayon's default
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParallelConfig {
    pub num_threads: Option<usize>,
}

impl ParallelConfig {
    #[must_use]
    pub fn from_analysis(config: &AnalysisConfig) -> Self {
        Self {
            num_threads: config.threads,
        }
    }

    /// One worker per logical CPU
    #[must_use]
    pub fn all_cores() -> Self {
        Self::with_threads(num_cpus::get())
    }

    #[must_use]
    pub fn with_threads(num_threads: usize) -> Self {
        Self {
            num_threads: Some(num_threads),
        }
    }

    /// Build the global pool and return the number of workers in use.
    ///
    /// # Errors
    ///
    /// Returns [`ClimTrendError::ThreadPoolError`] if a thread count was
    /// requested and the global pool already exists or cannot be created.
    pub fn setup_global_pool(&self) -> Result<usize> {
        match self.num_threads {
            Some(requested) => {
                ThreadPoolBuilder::new()
                    .num_threads(requested)
                    .thread_name(|i| format!("climtrend-worker-{i}"))
                    .build_global()
                    .map_err(|e| {
                        ClimTrendError::ThreadPoolError(format!(
                            "cannot start {} worker threads: {}",
                            requested, e
                        ))
                    })?;
                info!("Regression workers: {} (requested)", requested);
            }
            None => info!(
                "Regression workers: {} (default)",
                rayon::current_num_threads()
            ),
        }
        Ok(rayon::current_num_threads())
    }

    /// Workers available to the calling thread
    #[must_use]
    pub fn current_threads(&self) -> usize {
        rayon::current_num_threads()
    }
}

/// Snapshot of the machine and pool sizes
#[derive(Debug, Clone, Copy)]
pub struct ParallelInfo {
    pub current_threads: usize,
    pub available_cores: usize,
    pub available_parallelism: usize,
}

/// Query the current pool and the machine's CPU counts
#[must_use]
pub fn get_parallel_info() -> ParallelInfo {
    ParallelInfo {
        current_threads: rayon::current_num_threads(),
        available_cores: num_cpus::get(),
        available_parallelism: std::thread::available_parallelism().map_or(1, |p| p.get()),
    }
}

impl ParallelInfo {
    /// Grid points each worker handles on average
    #[must_use]
    pub fn points_per_thread(&self, points: usize) -> usize {
        points.div_ceil(self.current_threads.max(1))
    }

    pub fn log(&self) {
        debug!(
            "Pool threads: {}, logical CPUs: {}, available parallelism: {}",
            self.current_threads, self.available_cores, self.available_parallelism
        );
    }
}
