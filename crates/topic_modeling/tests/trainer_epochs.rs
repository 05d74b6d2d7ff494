//! Epoch-loop contract tests.
//!
//! Tests cover:
//! - Exactly-once processing of every document index for any worker count
//! - Serialization of the maximization phase behind the expectation phase
//! - Empty-corpus and multi-epoch behavior
//! - Transform idempotence
//! - The reference algorithm's two-events-per-epoch likelihood contract

mod common;
use common::{one_hot_matrix, CountingMStep, RecordingEStep};

use std::sync::{Arc, Mutex};

use anyhow::Result;
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use topic_modeling::{
    Event, MixtureExpectationStep, ModelParameters, OnlineMaximizationStep, TopicModel,
    TrainerConfig,
};

const NUM_TOPICS: usize = 3;
const NUM_CLASSES: usize = 2;

fn instrumented_model(
    num_docs: usize,
    workers: usize,
) -> (TopicModel, Arc<Mutex<Vec<usize>>>, CountingMStep) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let e_step = RecordingEStep { seen: seen.clone() };
    let m_step = CountingMStep::new();
    let counters = CountingMStep {
        doc_calls: m_step.doc_calls.clone(),
        m_calls: m_step.m_calls.clone(),
        docs_at_m_step: m_step.docs_at_m_step.clone(),
    };
    let model = TopicModel::new(
        ModelParameters::random(NUM_TOPICS, num_docs, NUM_CLASSES, 0),
        e_step,
        m_step,
        TrainerConfig::builder().workers(workers).build(),
    );
    (model, seen, counters)
}

fn labels(num_docs: usize) -> Array1<usize> {
    Array1::from_iter((0..num_docs).map(|i| i % NUM_CLASSES))
}

#[test]
fn every_document_processed_exactly_once_for_any_worker_count() -> Result<()> {
    for workers in [1, 2, 4, 8] {
        let num_docs = 23;
        let (mut model, seen, counters) = instrumented_model(num_docs, workers);

        model.partial_fit(&one_hot_matrix(num_docs), &labels(num_docs))?;

        let mut seen = seen.lock().unwrap().clone();
        seen.sort_unstable();
        assert_eq!(
            seen,
            (0..num_docs).collect::<Vec<_>>(),
            "with {} workers every index must be expanded exactly once",
            workers
        );
        assert_eq!(
            counters.doc_calls.load(std::sync::atomic::Ordering::SeqCst),
            num_docs
        );
        assert_eq!(counters.m_calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
    Ok(())
}

#[test]
fn all_doc_m_steps_complete_before_m_step() -> Result<()> {
    let num_docs = 30;
    let (mut model, _seen, counters) = instrumented_model(num_docs, 4);

    model.partial_fit(&one_hot_matrix(num_docs), &labels(num_docs))?;

    // m_step observed every single doc_m_step of the epoch.
    assert_eq!(*counters.docs_at_m_step.lock().unwrap(), vec![num_docs]);
    Ok(())
}

#[test]
fn empty_corpus_still_finalizes_the_epoch() -> Result<()> {
    let (mut model, seen, counters) = instrumented_model(0, 2);

    let x = Array2::<u32>::zeros((0, 0));
    let y = Array1::<usize>::from_iter(std::iter::empty());
    model.partial_fit(&x, &y)?;

    assert!(seen.lock().unwrap().is_empty());
    assert_eq!(counters.doc_calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    assert_eq!(counters.m_calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    Ok(())
}

#[test]
fn fit_runs_the_configured_number_of_epochs() -> Result<()> {
    let num_docs = 5;
    let seen = Arc::new(Mutex::new(Vec::new()));
    let m_step = CountingMStep::new();
    let m_calls = m_step.m_calls.clone();
    let doc_calls = m_step.doc_calls.clone();
    let mut model = TopicModel::new(
        ModelParameters::random(NUM_TOPICS, num_docs, NUM_CLASSES, 0),
        RecordingEStep { seen: seen.clone() },
        m_step,
        TrainerConfig::builder().iterations(3).workers(2).build(),
    );

    model.fit(&one_hot_matrix(num_docs), &labels(num_docs))?;

    assert_eq!(m_calls.load(std::sync::atomic::Ordering::SeqCst), 3);
    assert_eq!(
        doc_calls.load(std::sync::atomic::Ordering::SeqCst),
        3 * num_docs
    );
    assert_eq!(seen.lock().unwrap().len(), 3 * num_docs);
    Ok(())
}

#[test]
fn transform_is_idempotent() -> Result<()> {
    let model = TopicModel::new(
        ModelParameters::random(4, 12, NUM_CLASSES, 7),
        MixtureExpectationStep::new(),
        OnlineMaximizationStep::new(4, 12, NUM_CLASSES, 0),
        TrainerConfig::builder().workers(3).build(),
    );

    let x = one_hot_matrix(12);
    let first = model.transform(&x)?;
    let second = model.transform(&x)?;
    assert_eq!(first, second);
    assert_eq!(first.dim(), (4, 12));
    Ok(())
}

#[test]
fn training_is_reproducible_with_a_fixed_seed() -> Result<()> {
    let (x, y) = random_corpus(40, 60);
    let run = || -> Result<ModelParameters> {
        let mut model = TopicModel::new(
            ModelParameters::random(5, 40, 6, 1),
            MixtureExpectationStep::new(),
            OnlineMaximizationStep::new(5, 40, 6, 0),
            TrainerConfig::builder()
                .iterations(3)
                .workers(1)
                .shuffle(true)
                .seed(42)
                .build(),
        );
        model.fit(&x, &y)?;
        let params = model.model_parameters();
        let params = params.read().unwrap().clone();
        Ok(params)
    };
    assert_eq!(run()?, run()?);
    Ok(())
}

/// Word counts roughly exponential per entry, labels uniform over 6 classes.
fn random_corpus(num_words: usize, num_docs: usize) -> (Array2<u32>, Array1<usize>) {
    let mut rng = StdRng::seed_from_u64(0);
    let x = Array2::from_shape_fn((num_words, num_docs), |_| {
        let u: f64 = 1.0 - rng.random::<f64>();
        (-u.ln() * 10.0) as u32
    });
    let y = Array1::from_iter((0..num_docs).map(|_| rng.random_range(0..6)));
    (x, y)
}

#[test]
fn partial_fit_accepts_a_caller_provided_corpus() -> Result<()> {
    use topic_modeling::{Corpus, Document, InMemoryCorpus};

    let num_docs = 9;
    let (mut model, seen, counters) = instrumented_model(num_docs, 2);

    let documents: Vec<_> = (0..num_docs)
        .map(|i| {
            let mut counts = vec![0u32; num_docs];
            counts[i] = 1;
            Document::new(Array1::from_vec(counts)).with_label(i % NUM_CLASSES)
        })
        .collect();
    let corpus: Arc<dyn Corpus> = Arc::new(InMemoryCorpus::new(documents));
    model.partial_fit_corpus(corpus)?;

    let mut seen = seen.lock().unwrap().clone();
    seen.sort_unstable();
    assert_eq!(seen, (0..num_docs).collect::<Vec<_>>());
    assert_eq!(counters.m_calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    Ok(())
}

#[test]
fn prediction_surface_is_consistent_with_its_parts() -> Result<()> {
    let num_words = 30;
    let num_docs = 20;
    let (x, y) = random_corpus(num_words, num_docs);

    let mut model = TopicModel::new(
        ModelParameters::random(4, num_words, 6, 3),
        MixtureExpectationStep::new(),
        OnlineMaximizationStep::new(4, num_words, 6, 0),
        TrainerConfig::builder().iterations(2).workers(2).build(),
    );
    model.fit(&x, &y)?;

    let scores = model.decision_function(&x)?;
    assert_eq!(scores.dim(), (6, num_docs));

    let classes = model.predict(&x)?;
    assert_eq!(classes.len(), num_docs);
    assert!(classes.iter().all(|&c| c < 6));

    // One expectation pass must agree with the two-call form.
    let (gammas, combined_classes) = model.transform_predict(&x)?;
    assert_eq!(gammas, model.transform(&x)?);
    assert_eq!(combined_classes, classes);
    Ok(())
}

#[test]
fn reference_steps_emit_two_nondecreasing_progress_events_per_epoch() -> Result<()> {
    let num_words = 100;
    let num_docs = 50;
    let num_topics = 10;
    let num_classes = 6;
    let num_epochs = 4;
    let (x, y) = random_corpus(num_words, num_docs);

    let mut model = TopicModel::new(
        ModelParameters::random(num_topics, num_words, num_classes, 0),
        MixtureExpectationStep::new(),
        OnlineMaximizationStep::new(num_topics, num_words, num_classes, num_docs / 2),
        TrainerConfig::builder()
            .iterations(num_epochs)
            .workers(1)
            .shuffle(true)
            .seed(42)
            .build(),
    );

    let progress = Arc::new(Mutex::new(Vec::new()));
    let sink = progress.clone();
    model
        .event_dispatcher()
        .add_listener(move |event: &Event| {
            if let Event::MaximizationProgress { likelihood } = event {
                sink.lock().unwrap().push(*likelihood);
            }
        });

    model.fit(&x, &y)?;

    let progress = progress.lock().unwrap();
    assert_eq!(progress.len(), 2 * num_epochs);

    // Each epoch's two windows sum to the epoch's total log-likelihood,
    // which never decreases across EM iterations.
    for i in (0..progress.len() - 2).step_by(2) {
        let current = progress[i] + progress[i + 1];
        let next = progress[i + 2] + progress[i + 3];
        assert!(
            current <= next + 1e-9,
            "epoch likelihood decreased: {} -> {}",
            current,
            next
        );
    }
    Ok(())
}
