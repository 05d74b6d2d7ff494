//! Reference expectation step for a mixture of unigrams.
//!
//! For each document it computes the exact topic posterior in the log domain
//! and the document's marginal log-likelihood under the current model. The
//! model is only ever read, so the step can run concurrently on any number
//! of worker threads.

use std::sync::Arc;

use anyhow::Result;
use ndarray::Array2;

use super::{log_sum_exp, log_topic_scores, ExpectationStep};
use crate::document::Document;
use crate::events::{Event, EventDispatcher};
use crate::params::{ModelParameters, VariationalParameters};

pub struct MixtureExpectationStep {
    dispatcher: Option<Arc<EventDispatcher>>,
}

impl MixtureExpectationStep {
    pub fn new() -> Self {
        Self { dispatcher: None }
    }
}

impl Default for MixtureExpectationStep {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpectationStep for MixtureExpectationStep {
    fn doc_e_step(
        &self,
        document: &Document,
        model: &ModelParameters,
    ) -> Result<(VariationalParameters, f64)> {
        let scores = log_topic_scores(document, model);
        let likelihood = log_sum_exp(&scores);
        let gamma = scores.mapv(|s| (s - likelihood).exp());

        // In a mixture model every word of a document shares the document's
        // topic responsibility.
        let mut phi = Array2::zeros((model.num_topics(), model.num_words()));
        for (word, &count) in document.counts().iter().enumerate() {
            if count > 0 {
                phi.column_mut(word).assign(&gamma);
            }
        }

        if let Some(dispatcher) = &self.dispatcher {
            dispatcher.publish(Event::ExpectationProgress { likelihood });
        }
        Ok((VariationalParameters { phi, gamma }, likelihood))
    }

    fn set_event_dispatcher(&mut self, dispatcher: Arc<EventDispatcher>) {
        self.dispatcher = Some(dispatcher);
    }
}
