use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use ndarray::{Array1, Array2};
use topic_modeling::{
    Document, ExpectationStep, MaximizationStep, ModelParameters, VariationalParameters,
};

/// Word-count matrix where document `i` contains exactly one occurrence of
/// word `i`. Lets instrumented steps recover the document identity.
pub fn one_hot_matrix(n: usize) -> Array2<u32> {
    Array2::from_shape_fn((n, n), |(word, doc)| u32::from(word == doc))
}

/// Recovers the document identity from a one-hot document.
pub fn doc_id(document: &Document) -> usize {
    document
        .counts()
        .iter()
        .position(|&count| count > 0)
        .unwrap_or(0)
}

fn uniform_variational(model: &ModelParameters) -> VariationalParameters {
    let num_topics = model.num_topics();
    VariationalParameters {
        phi: Array2::zeros((num_topics, model.num_words())),
        gamma: Array1::from_elem(num_topics, 1.0 / num_topics.max(1) as f64),
    }
}

/// Expectation step that records which documents it saw.
pub struct RecordingEStep {
    pub seen: Arc<Mutex<Vec<usize>>>,
}

impl ExpectationStep for RecordingEStep {
    fn doc_e_step(
        &self,
        document: &Document,
        model: &ModelParameters,
    ) -> Result<(VariationalParameters, f64)> {
        self.seen.lock().unwrap().push(doc_id(document));
        Ok((uniform_variational(model), -1.0))
    }
}

/// Expectation step that fails for one specific document.
pub struct FailingEStep {
    pub fail_on: usize,
}

impl ExpectationStep for FailingEStep {
    fn doc_e_step(
        &self,
        document: &Document,
        model: &ModelParameters,
    ) -> Result<(VariationalParameters, f64)> {
        if doc_id(document) == self.fail_on {
            return Err(anyhow!("synthetic expectation failure"));
        }
        Ok((uniform_variational(model), -1.0))
    }
}

/// Maximization step that counts its calls and records how many `doc_m_step`
/// calls had happened when each `m_step` arrived.
pub struct CountingMStep {
    pub doc_calls: Arc<AtomicUsize>,
    pub m_calls: Arc<AtomicUsize>,
    pub docs_at_m_step: Arc<Mutex<Vec<usize>>>,
}

impl CountingMStep {
    pub fn new() -> Self {
        Self {
            doc_calls: Arc::new(AtomicUsize::new(0)),
            m_calls: Arc::new(AtomicUsize::new(0)),
            docs_at_m_step: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl MaximizationStep for CountingMStep {
    fn doc_m_step(
        &mut self,
        _document: &Document,
        _variational: &VariationalParameters,
        _model: &ModelParameters,
    ) -> Result<()> {
        self.doc_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn m_step(&mut self, _model: &mut ModelParameters) -> Result<()> {
        self.m_calls.fetch_add(1, Ordering::SeqCst);
        self.docs_at_m_step
            .lock()
            .unwrap()
            .push(self.doc_calls.load(Ordering::SeqCst));
        Ok(())
    }
}
