use ndarray::Array1;

/// A single observation in the training corpus: a word-count vector over a
/// fixed vocabulary, plus an optional class label for supervised training.
///
/// Documents are immutable once produced by a [`Corpus`](crate::corpus::Corpus)
/// and are shared read-only across worker threads.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    counts: Array1<u32>,
    label: Option<usize>,
}

impl Document {
    /// Creates an unlabeled document from its word counts.
    pub fn new(counts: Array1<u32>) -> Self {
        Self {
            counts,
            label: None,
        }
    }

    /// Attaches a class label and returns the modified document.
    /// Enables chaining: `Document::new(counts).with_label(2)`.
    pub fn with_label(mut self, label: usize) -> Self {
        self.label = Some(label);
        self
    }

    /// The word-count vector, one entry per vocabulary word.
    pub fn counts(&self) -> &Array1<u32> {
        &self.counts
    }

    /// The class label, if the document carries one.
    pub fn label(&self) -> Option<usize> {
        self.label
    }

    /// Total number of word occurrences.
    pub fn len(&self) -> usize {
        self.counts.iter().map(|&c| c as usize).sum()
    }

    /// Checks whether the document contains no words at all.
    pub fn is_empty(&self) -> bool {
        self.counts.iter().all(|&c| c == 0)
    }

    /// Number of entries in the count vector (the vocabulary size).
    pub fn vocabulary_size(&self) -> usize {
        self.counts.len()
    }
}
