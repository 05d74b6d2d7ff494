use crate::document::Document;
use crate::errors::TrainError;
use anyhow::Result;
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

/// A `Corpus` provides indexed access to the documents of one training run.
///
/// # Contract
/// - `at(i)` is valid for `0 <= i < size()` and fails with
///   [`TrainError::OutOfRange`] otherwise.
/// - `shuffle` reorders the documents in place and affects the index mapping
///   of subsequent `at` calls. It takes `&mut self`, so it can only be called
///   while no epoch is in flight (workers hold shared references for the
///   duration of an epoch).
///
/// Implementations must be `Send + Sync` so the same corpus instance can be
/// safely shared across the expectation worker threads.
pub trait Corpus: Send + Sync {
    /// Returns the number of documents.
    fn size(&self) -> usize;

    /// Random-access lookup by index.
    fn at(&self, index: usize) -> Result<&Document>;

    /// Reorders the documents in place.
    fn shuffle(&mut self, rng: &mut StdRng);

    /// Checks if the corpus holds no documents.
    fn is_empty(&self) -> bool {
        self.size() == 0
    }
}

/// A corpus that stores all documents in memory.
///
/// Built either from a plain document list or from a word-count matrix in the
/// column-per-document layout used by the training facade.
#[derive(Debug, Clone)]
pub struct InMemoryCorpus {
    documents: Vec<Document>,
}

impl InMemoryCorpus {
    /// Creates a corpus from a vector of documents.
    pub fn new(documents: Vec<Document>) -> Self {
        Self { documents }
    }

    /// Builds an unlabeled corpus from a word-count matrix with one column
    /// per document (words x documents).
    pub fn from_counts(x: &Array2<u32>) -> Self {
        let documents = x
            .columns()
            .into_iter()
            .map(|column| Document::new(column.to_owned()))
            .collect();
        Self { documents }
    }

    /// Builds a labeled corpus from a word-count matrix (words x documents)
    /// and one class label per document.
    ///
    /// # Errors
    /// [`TrainError::DimensionMismatch`] if the label count does not match
    /// the number of document columns.
    pub fn from_labeled_counts(x: &Array2<u32>, y: &Array1<usize>) -> Result<Self> {
        if y.len() != x.ncols() {
            return Err(TrainError::DimensionMismatch {
                what: "class labels",
                expected: x.ncols(),
                actual: y.len(),
            }
            .into());
        }
        let documents = x
            .columns()
            .into_iter()
            .zip(y.iter())
            .map(|(column, &label)| Document::new(column.to_owned()).with_label(label))
            .collect();
        Ok(Self { documents })
    }
}

impl Corpus for InMemoryCorpus {
    fn size(&self) -> usize {
        self.documents.len()
    }

    fn at(&self, index: usize) -> Result<&Document> {
        self.documents.get(index).ok_or_else(|| {
            TrainError::OutOfRange {
                index,
                size: self.documents.len(),
            }
            .into()
        })
    }

    fn shuffle(&mut self, rng: &mut StdRng) {
        self.documents.shuffle(rng);
    }
}
