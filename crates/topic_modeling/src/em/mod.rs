//! Expectation and maximization strategies.
//!
//! The trainer is agnostic of the statistical algorithm it runs: it only
//! requires an [`ExpectationStep`] it can invoke concurrently from worker
//! threads and a [`MaximizationStep`] it drives serially from the
//! orchestrator thread. The reference implementations shipped here model a
//! mixture of unigrams, which is enough to train and evaluate end-to-end.
//!
//! Custom strategy pairs plug in through
//! [`TopicModel::new`](crate::trainer::TopicModel::new).

use std::sync::Arc;

use anyhow::Result;
use ndarray::Array1;

use crate::document::Document;
use crate::events::EventDispatcher;
use crate::params::{ModelParameters, VariationalParameters};

pub mod expectation;
pub mod maximization;

pub use expectation::MixtureExpectationStep;
pub use maximization::OnlineMaximizationStep;

// Floor applied inside logarithms so a dead topic or zero-probability word
// produces a very small score instead of -inf.
pub(crate) const LOG_FLOOR: f64 = 1e-300;

/// Per-document expectation step.
///
/// `doc_e_step` is invoked concurrently from multiple worker threads with
/// the same model reference; taking `&self` (with the `Sync` bound) makes
/// mutation of shared state unrepresentable, so concurrent read-only access
/// is safe by construction.
pub trait ExpectationStep: Send + Sync {
    /// Computes the variational parameters and the log-likelihood
    /// contribution of one document under the current model.
    fn doc_e_step(
        &self,
        document: &Document,
        model: &ModelParameters,
    ) -> Result<(VariationalParameters, f64)>;

    /// Receives the trainer's dispatcher so the step can report progress.
    /// Called once, before any training starts.
    fn set_event_dispatcher(&mut self, _dispatcher: Arc<EventDispatcher>) {}
}

/// Corpus-wide maximization step.
///
/// `doc_m_step` is invoked once per document, strictly on the orchestrator
/// thread, in the order results are dequeued; `m_step` once per epoch after
/// every `doc_m_step` for that epoch has completed. `m_step` finalizes the
/// model in place and resets the internal accumulators for the next epoch.
pub trait MaximizationStep: Send {
    /// Folds one document's variational parameters into the accumulated
    /// statistics. Must not finalize the model.
    fn doc_m_step(
        &mut self,
        document: &Document,
        variational: &VariationalParameters,
        model: &ModelParameters,
    ) -> Result<()>;

    /// Finalizes the model from the accumulated statistics and resets the
    /// accumulators.
    fn m_step(&mut self, model: &mut ModelParameters) -> Result<()>;

    /// Receives the trainer's dispatcher so the step can report progress.
    /// Called once, before any training starts.
    fn set_event_dispatcher(&mut self, _dispatcher: Arc<EventDispatcher>) {}
}

/// Unnormalized log-posterior score of every topic for one document:
/// `ln alpha_k + sum_w x_w ln beta_kw` over the words present in the document.
pub(crate) fn log_topic_scores(document: &Document, model: &ModelParameters) -> Array1<f64> {
    let num_topics = model.num_topics();
    let mut scores = Array1::zeros(num_topics);
    for topic in 0..num_topics {
        let mut score = model.alpha[topic].max(LOG_FLOOR).ln();
        for (word, &count) in document.counts().iter().enumerate() {
            if count > 0 {
                score += f64::from(count) * model.beta[[topic, word]].max(LOG_FLOOR).ln();
            }
        }
        scores[topic] = score;
    }
    scores
}

/// Numerically stable `ln(sum_k exp(scores_k))`.
pub(crate) fn log_sum_exp(scores: &Array1<f64>) -> f64 {
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return max;
    }
    let sum: f64 = scores.iter().map(|&s| (s - max).exp()).sum();
    max + sum.ln()
}

/// Marginal log-likelihood of one document under the current model.
pub(crate) fn doc_log_likelihood(document: &Document, model: &ModelParameters) -> f64 {
    log_sum_exp(&log_topic_scores(document, model))
}
