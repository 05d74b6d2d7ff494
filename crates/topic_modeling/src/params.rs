use crate::errors::TrainError;
use anyhow::Result;
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// The shared numeric state updated once per epoch by the maximization step.
///
/// During the expectation phase the parameters are read-shared across all
/// worker threads (behind an `RwLock` read guard); during the maximization
/// phase they are mutated exclusively by the orchestrator thread. The two
/// phases never overlap within an epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelParameters {
    /// Topic prior weights (`num_topics`).
    pub alpha: Array1<f64>,
    /// Topic-word distributions, one row per topic (`num_topics` x `num_words`).
    pub beta: Array2<f64>,
    /// Linear class weights in topic space (`num_topics` x `num_classes`).
    pub eta: Array2<f64>,
}

impl ModelParameters {
    /// Bundles pre-built parameter matrices.
    ///
    /// # Errors
    /// [`TrainError::DimensionMismatch`] if `beta` or `eta` do not have one
    /// row per `alpha` entry.
    pub fn new(alpha: Array1<f64>, beta: Array2<f64>, eta: Array2<f64>) -> Result<Self> {
        if beta.nrows() != alpha.len() {
            return Err(TrainError::DimensionMismatch {
                what: "beta rows",
                expected: alpha.len(),
                actual: beta.nrows(),
            }
            .into());
        }
        if eta.nrows() != alpha.len() {
            return Err(TrainError::DimensionMismatch {
                what: "eta rows",
                expected: alpha.len(),
                actual: eta.nrows(),
            }
            .into());
        }
        Ok(Self { alpha, beta, eta })
    }

    /// Creates randomly initialized parameters for the given shape.
    ///
    /// `alpha` starts uniform, `beta` rows are random positive distributions
    /// normalized to sum to one, and `eta` starts at zero. The same seed
    /// always produces the same initialization.
    pub fn random(num_topics: usize, num_words: usize, num_classes: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let alpha = Array1::from_elem(num_topics, 1.0 / num_topics.max(1) as f64);
        let mut beta =
            Array2::from_shape_fn((num_topics, num_words), |_| rng.random_range(0.5..1.5));
        for mut row in beta.rows_mut() {
            let sum = row.sum();
            if sum > 0.0 {
                row.mapv_inplace(|v| v / sum);
            }
        }
        let eta = Array2::zeros((num_topics, num_classes));
        Self { alpha, beta, eta }
    }

    pub fn num_topics(&self) -> usize {
        self.alpha.len()
    }

    pub fn num_words(&self) -> usize {
        self.beta.ncols()
    }

    pub fn num_classes(&self) -> usize {
        self.eta.ncols()
    }
}

/// Per-document output of the expectation step.
///
/// Produced by one worker thread, consumed exactly once by
/// `MaximizationStep::doc_m_step` on the orchestrator thread, then dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct VariationalParameters {
    /// Per-word topic responsibilities (`num_topics` x `num_words`).
    pub phi: Array2<f64>,
    /// Per-document topic posterior (`num_topics`).
    pub gamma: Array1<f64>,
}
