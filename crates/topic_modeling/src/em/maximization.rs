//! Reference online maximization step for a mixture of unigrams.
//!
//! `doc_m_step` folds one document's responsibilities into running
//! sufficient statistics; `m_step` re-estimates the model from them once per
//! epoch and clears them for the next pass.
//!
//! Progress reporting follows a two-events-per-epoch contract when
//! `minibatch_size` splits the corpus in half: a `MaximizationProgress`
//! event is published whenever a full minibatch of documents has been folded
//! in before the next one starts, and once more from `m_step` for the tail
//! of the epoch. Each event carries the summed per-document log-likelihood
//! of its window, so the event payloads of one epoch add up to the total
//! log-likelihood of the pass.

use std::sync::Arc;

use anyhow::Result;
use ndarray::{Array1, Array2};

use super::{doc_log_likelihood, MaximizationStep};
use crate::document::Document;
use crate::errors::TrainError;
use crate::events::{Event, EventDispatcher};
use crate::params::{ModelParameters, VariationalParameters};

pub struct OnlineMaximizationStep {
    minibatch_size: usize,
    alpha_acc: Array1<f64>,
    beta_acc: Array2<f64>,
    eta_acc: Array2<f64>,
    class_counts: Array1<f64>,
    docs_seen: usize,
    docs_since_flush: usize,
    window_likelihood: f64,
    dispatcher: Option<Arc<EventDispatcher>>,
}

impl OnlineMaximizationStep {
    /// Creates a maximization step for the given model shape.
    ///
    /// `minibatch_size` controls intra-epoch progress events; `0` disables
    /// them, leaving only the event published by `m_step`.
    pub fn new(
        num_topics: usize,
        num_words: usize,
        num_classes: usize,
        minibatch_size: usize,
    ) -> Self {
        Self {
            minibatch_size,
            alpha_acc: Array1::zeros(num_topics),
            beta_acc: Array2::zeros((num_topics, num_words)),
            eta_acc: Array2::zeros((num_topics, num_classes)),
            class_counts: Array1::zeros(num_classes),
            docs_seen: 0,
            docs_since_flush: 0,
            window_likelihood: 0.0,
            dispatcher: None,
        }
    }

    fn flush_progress(&mut self) {
        if let Some(dispatcher) = &self.dispatcher {
            dispatcher.publish(Event::MaximizationProgress {
                likelihood: self.window_likelihood,
            });
        }
        self.window_likelihood = 0.0;
        self.docs_since_flush = 0;
    }
}

impl MaximizationStep for OnlineMaximizationStep {
    fn doc_m_step(
        &mut self,
        document: &Document,
        variational: &VariationalParameters,
        model: &ModelParameters,
    ) -> Result<()> {
        // A full minibatch is flushed before the next document is folded in,
        // so an epoch whose size is an exact multiple of the minibatch still
        // reports its last window from m_step.
        if self.minibatch_size > 0 && self.docs_since_flush >= self.minibatch_size {
            self.flush_progress();
        }

        self.alpha_acc += &variational.gamma;
        for (word, &count) in document.counts().iter().enumerate() {
            if count > 0 {
                let mut target = self.beta_acc.column_mut(word);
                target += &(&variational.phi.column(word) * f64::from(count));
            }
        }
        if let Some(label) = document.label() {
            if label >= self.class_counts.len() {
                return Err(TrainError::DimensionMismatch {
                    what: "class label",
                    expected: self.class_counts.len(),
                    actual: label,
                }
                .into());
            }
            let mut target = self.eta_acc.column_mut(label);
            target += &variational.gamma;
            self.class_counts[label] += 1.0;
        }

        self.window_likelihood += doc_log_likelihood(document, model);
        self.docs_seen += 1;
        self.docs_since_flush += 1;
        Ok(())
    }

    fn m_step(&mut self, model: &mut ModelParameters) -> Result<()> {
        self.flush_progress();

        if self.docs_seen > 0 {
            let total = self.docs_seen as f64;
            model.alpha.assign(&(&self.alpha_acc / total));

            for (acc_row, mut model_row) in self
                .beta_acc
                .rows()
                .into_iter()
                .zip(model.beta.rows_mut())
            {
                let sum = acc_row.sum();
                if sum > 0.0 {
                    model_row.assign(&(&acc_row / sum));
                }
            }

            for (class, (acc_column, mut model_column)) in self
                .eta_acc
                .columns()
                .into_iter()
                .zip(model.eta.columns_mut())
                .enumerate()
            {
                let count = self.class_counts[class];
                if count > 0.0 {
                    model_column.assign(&(&acc_column / count));
                }
            }
        }

        self.alpha_acc.fill(0.0);
        self.beta_acc.fill(0.0);
        self.eta_acc.fill(0.0);
        self.class_counts.fill(0.0);
        self.docs_seen = 0;
        self.docs_since_flush = 0;
        self.window_likelihood = 0.0;
        Ok(())
    }

    fn set_event_dispatcher(&mut self, dispatcher: Arc<EventDispatcher>) {
        self.dispatcher = Some(dispatcher);
    }
}
