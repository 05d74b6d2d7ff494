//! Configuration for a training run.
//!
//! Example:
//! ```ignore
//! let config = TrainerConfig::builder()
//!     .iterations(10)
//!     .workers(4)
//!     .shuffle(true)
//!     .seed(42)
//!     .build();
//! ```

/// Parameters that control how `fit` drives the epoch loop.
#[derive(Debug, Clone)]
pub struct TrainerConfig {
    /// Number of epochs `fit` runs.
    pub iterations: usize,
    /// Number of expectation worker threads (must be >= 1).
    pub workers: usize,
    /// Whether `fit` reshuffles the corpus between epochs.
    pub shuffle: bool,
    /// Base RNG seed for reproducible shuffling; epoch `e` shuffles with
    /// `seed + e`. A random seed is drawn when none is set.
    pub seed: Option<u64>,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            iterations: 20,
            workers: 1,
            shuffle: false,
            seed: None,
        }
    }
}

impl TrainerConfig {
    pub fn builder() -> TrainerConfigBuilder {
        TrainerConfigBuilder::default()
    }
}

/// Builder for TrainerConfig with method chaining.
#[derive(Default)]
pub struct TrainerConfigBuilder {
    config: TrainerConfig,
}

impl TrainerConfigBuilder {
    /// Set the number of epochs for `fit`.
    pub fn iterations(mut self, iterations: usize) -> Self {
        self.config.iterations = iterations;
        self
    }

    /// Set the number of expectation worker threads.
    pub fn workers(mut self, workers: usize) -> Self {
        self.config.workers = workers;
        self
    }

    /// Set whether to reshuffle the corpus every epoch.
    pub fn shuffle(mut self, shuffle: bool) -> Self {
        self.config.shuffle = shuffle;
        self
    }

    /// Set the base seed for reproducible shuffling.
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    /// Build the final configuration.
    pub fn build(self) -> TrainerConfig {
        self.config
    }
}
