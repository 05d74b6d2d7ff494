//! Training facade and epoch loop.
//!
//! `TopicModel` owns the model parameters, the strategy pair, and the event
//! dispatcher, and drives the epoch loop: enqueue every document index for
//! the expectation workers, drain their results in arrival order into the
//! maximization step on the calling thread, finalize the epoch, and flush
//! the event dispatcher.

use anyhow::{anyhow, Result};
use log::debug;
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::Ordering;
use std::sync::{Arc, RwLock, RwLockReadGuard};

use super::config::TrainerConfig;
use super::worker::WorkerPool;
use crate::corpus::{Corpus, InMemoryCorpus};
use crate::em::{ExpectationStep, MaximizationStep};
use crate::errors::TrainError;
use crate::events::{Event, EventDispatcher};
use crate::params::{ModelParameters, VariationalParameters};

/// One unit of expectation work: a document index. The corpus, model, and
/// expectation step are captured by each worker when the pool is spawned.
struct EStepTask {
    index: usize,
}

/// Result of one expectation task, tagged with its document index so the
/// orchestrator can pair it back with the document.
struct EStepOutcome {
    index: usize,
    result: Result<EStepResult>,
}

struct EStepResult {
    variational: VariationalParameters,
    likelihood: f64,
}

/// Trains and applies a topic model with a pluggable expectation /
/// maximization strategy pair.
///
/// The facade borrows its surface from scikit-learn: `fit`, `partial_fit`,
/// `transform`, `decision_function`, `predict`. The expectation step runs on
/// a fixed pool of worker threads; the maximization step and all event
/// listeners run on the calling thread.
pub struct TopicModel {
    model: Arc<RwLock<ModelParameters>>,
    e_step: Arc<dyn ExpectationStep>,
    m_step: Box<dyn MaximizationStep>,
    config: TrainerConfig,
    dispatcher: Arc<EventDispatcher>,
    epochs_run: usize,
}

impl TopicModel {
    /// Creates a trainer from model parameters, a strategy pair, and a
    /// configuration.
    ///
    /// The trainer's event dispatcher is handed to both steps before
    /// training starts, so every event they publish ends up in the single
    /// stream observable through [`TopicModel::event_dispatcher`].
    pub fn new<E, M>(
        model: ModelParameters,
        mut e_step: E,
        mut m_step: M,
        config: TrainerConfig,
    ) -> Self
    where
        E: ExpectationStep + 'static,
        M: MaximizationStep + 'static,
    {
        let dispatcher = Arc::new(EventDispatcher::new());
        e_step.set_event_dispatcher(dispatcher.clone());
        m_step.set_event_dispatcher(dispatcher.clone());
        Self {
            model: Arc::new(RwLock::new(model)),
            e_step: Arc::new(e_step),
            m_step: Box::new(m_step),
            config,
            dispatcher,
            epochs_run: 0,
        }
    }

    /// The dispatcher carrying all training events, for external
    /// subscription via `add_listener`.
    pub fn event_dispatcher(&self) -> Arc<EventDispatcher> {
        self.dispatcher.clone()
    }

    /// Shared handle to the model parameters.
    pub fn model_parameters(&self) -> Arc<RwLock<ModelParameters>> {
        self.model.clone()
    }

    /// Trains for the configured number of epochs on word counts `x`
    /// (one column per document) and class labels `y`.
    pub fn fit(&mut self, x: &Array2<u32>, y: &Array1<usize>) -> Result<()> {
        let corpus = InMemoryCorpus::from_labeled_counts(x, y)?;
        self.validate_corpus(&corpus)?;

        let base_seed = self.config.seed.unwrap_or_else(|| rand::rng().random());
        let mut corpus = Arc::new(corpus);
        for epoch in 0..self.config.iterations {
            if self.config.shuffle {
                let mut rng = StdRng::seed_from_u64(base_seed.wrapping_add(epoch as u64));
                // All worker handles from the previous epoch are gone, so
                // the corpus is exclusively ours again.
                Arc::get_mut(&mut corpus)
                    .ok_or_else(|| anyhow!("corpus still shared by a previous epoch"))?
                    .shuffle(&mut rng);
            }
            let shared: Arc<dyn Corpus> = corpus.clone();
            self.run_epoch(shared)?;
        }
        Ok(())
    }

    /// Performs exactly one epoch on word counts and class labels.
    pub fn partial_fit(&mut self, x: &Array2<u32>, y: &Array1<usize>) -> Result<()> {
        let corpus = InMemoryCorpus::from_labeled_counts(x, y)?;
        self.validate_corpus(&corpus)?;
        self.run_epoch(Arc::new(corpus))
    }

    /// Performs exactly one epoch on a caller-provided corpus.
    ///
    /// Shuffling is the caller's responsibility here: they own the corpus
    /// and may reorder it between calls, never during one.
    pub fn partial_fit_corpus(&mut self, corpus: Arc<dyn Corpus>) -> Result<()> {
        self.validate_corpus(&*corpus)?;
        self.run_epoch(corpus)
    }

    /// Runs one expectation pass over unlabeled word counts and returns the
    /// per-document topic posteriors (`num_topics` x `num_documents`). The
    /// model is not updated.
    pub fn transform(&self, x: &Array2<u32>) -> Result<Array2<f64>> {
        let corpus = InMemoryCorpus::from_counts(x);
        self.validate_corpus(&corpus)?;
        let corpus: Arc<dyn Corpus> = Arc::new(corpus);
        let size = corpus.size();
        let num_topics = self.read_model()?.num_topics();

        let mut pool = self.spawn_expectation_pool(corpus.clone())?;
        for index in 0..size {
            pool.send(EStepTask { index })?;
        }
        pool.close();

        let mut gammas = Array2::zeros((num_topics, size));
        for _ in 0..size {
            let outcome = match pool.recv() {
                Ok(outcome) => outcome,
                Err(e) => {
                    pool.trigger_shutdown();
                    return Err(e);
                }
            };
            match outcome.result {
                Ok(result) => gammas
                    .column_mut(outcome.index)
                    .assign(&result.variational.gamma),
                Err(e) => {
                    pool.trigger_shutdown();
                    return Err(e);
                }
            }
        }
        drop(pool);

        self.dispatcher.process_events();
        Ok(gammas)
    }

    /// Treats `eta` as a linear model over normalized topic mixtures and
    /// returns per-class scores (`num_classes` x `num_documents`). The more
    /// positive a score, the more confident the model is in that class.
    pub fn decision_function(&self, x: &Array2<u32>) -> Result<Array2<f64>> {
        let gammas = self.transform(x)?;
        self.scores_from_transformed(&gammas)
    }

    /// Predicts the class index of every document.
    pub fn predict(&self, x: &Array2<u32>) -> Result<Array1<usize>> {
        let scores = self.decision_function(x)?;
        Ok(predict_from_scores(&scores))
    }

    /// Returns both the topic posteriors and the class predictions using a
    /// single expectation pass.
    pub fn transform_predict(&self, x: &Array2<u32>) -> Result<(Array2<f64>, Array1<usize>)> {
        let gammas = self.transform(x)?;
        let scores = self.scores_from_transformed(&gammas)?;
        let classes = predict_from_scores(&scores);
        Ok((gammas, classes))
    }

    /// One full epoch: expectation in parallel, maximization serialized on
    /// this thread, event flush at the end.
    fn run_epoch(&mut self, corpus: Arc<dyn Corpus>) -> Result<()> {
        let size = corpus.size();
        let mut pool = self.spawn_expectation_pool(corpus.clone())?;
        for index in 0..size {
            pool.send(EStepTask { index })?;
        }
        pool.close();

        let mut epoch_likelihood = 0.0;
        for _ in 0..size {
            let outcome = match pool.recv() {
                Ok(outcome) => outcome,
                Err(e) => {
                    pool.trigger_shutdown();
                    return Err(e);
                }
            };
            let result = match outcome.result {
                Ok(result) => result,
                Err(e) => {
                    // The epoch is incomplete: stop the workers and surface
                    // the failure without running m_step.
                    pool.trigger_shutdown();
                    return Err(e);
                }
            };

            let document = corpus.at(outcome.index)?;
            {
                // Field-level borrows: the read guard on `model` and the
                // mutable borrow of `m_step` must not overlap through `self`.
                let model = self
                    .model
                    .read()
                    .map_err(|_| anyhow!("model parameters lock poisoned"))?;
                self.m_step
                    .doc_m_step(document, &result.variational, &model)?;
            }
            epoch_likelihood += result.likelihood;
            self.dispatcher.process_events();
        }

        // Join the workers before taking the write lock: the expectation and
        // maximization phases never overlap.
        drop(pool);
        {
            let mut model = self
                .model
                .write()
                .map_err(|_| anyhow!("model parameters lock poisoned"))?;
            self.m_step.m_step(&mut model)?;
        }

        self.dispatcher.publish(Event::EpochProgress {
            epoch: self.epochs_run,
            likelihood: epoch_likelihood,
        });
        self.epochs_run += 1;
        self.dispatcher.process_events();
        debug!(
            "epoch {} complete: {} documents, log-likelihood {:.4}",
            self.epochs_run, size, epoch_likelihood
        );
        Ok(())
    }

    /// Spawns the expectation workers for one epoch. Each worker captures
    /// shared handles to the corpus, the model, and the expectation step,
    /// pulls indices until the task queue is empty and closed, and pushes
    /// one tagged outcome per index.
    fn spawn_expectation_pool(
        &self,
        corpus: Arc<dyn Corpus>,
    ) -> Result<WorkerPool<EStepTask, EStepOutcome>> {
        let model = self.model.clone();
        let e_step = self.e_step.clone();
        WorkerPool::new(self.config.workers, move |task_rx, output_tx, shutdown| {
            while !shutdown.load(Ordering::Relaxed) {
                let EStepTask { index } = match task_rx.recv() {
                    Ok(task) => task,
                    Err(_) => break, // queue empty and closed
                };
                let result = expectation_for(&*corpus, &model, &*e_step, index);
                if output_tx.send(EStepOutcome { index, result }).is_err() {
                    break;
                }
            }
        })
    }

    fn scores_from_transformed(&self, gammas: &Array2<f64>) -> Result<Array2<f64>> {
        let model = self.read_model()?;
        let mut normalized = gammas.clone();
        for mut column in normalized.columns_mut() {
            let sum = column.sum();
            if sum > 0.0 {
                column.mapv_inplace(|v| v / sum);
            }
        }
        Ok(model.eta.t().dot(&normalized))
    }

    /// Rejects corpora that do not match the model before any thread is
    /// spawned.
    fn validate_corpus(&self, corpus: &dyn Corpus) -> Result<()> {
        let model = self.read_model()?;
        for index in 0..corpus.size() {
            let document = corpus.at(index)?;
            if document.vocabulary_size() != model.num_words() {
                return Err(TrainError::DimensionMismatch {
                    what: "document vocabulary",
                    expected: model.num_words(),
                    actual: document.vocabulary_size(),
                }
                .into());
            }
            if let Some(label) = document.label() {
                if label >= model.num_classes() {
                    return Err(TrainError::DimensionMismatch {
                        what: "class label",
                        expected: model.num_classes(),
                        actual: label,
                    }
                    .into());
                }
            }
        }
        Ok(())
    }

    fn read_model(&self) -> Result<RwLockReadGuard<'_, ModelParameters>> {
        self.model
            .read()
            .map_err(|_| anyhow!("model parameters lock poisoned"))
    }
}

/// Runs the expectation step for one document on a worker thread, converting
/// any failure into a `WorkerFailure` tagged with the document index.
fn expectation_for(
    corpus: &dyn Corpus,
    model: &Arc<RwLock<ModelParameters>>,
    e_step: &dyn ExpectationStep,
    index: usize,
) -> Result<EStepResult> {
    let run = || -> Result<EStepResult> {
        let model = model
            .read()
            .map_err(|_| anyhow!("model parameters lock poisoned"))?;
        let document = corpus.at(index)?;
        let (variational, likelihood) = e_step.doc_e_step(document, &model)?;
        Ok(EStepResult {
            variational,
            likelihood,
        })
    };
    run().map_err(|e| {
        TrainError::WorkerFailure {
            index,
            message: format!("{e:#}"),
        }
        .into()
    })
}

/// Argmax over the class axis of a (`num_classes` x `num_documents`) score
/// matrix.
fn predict_from_scores(scores: &Array2<f64>) -> Array1<usize> {
    Array1::from_iter(scores.columns().into_iter().map(|column| {
        column
            .iter()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |best, (class, &score)| {
                if score > best.1 {
                    (class, score)
                } else {
                    best
                }
            })
            .0
    }))
}
