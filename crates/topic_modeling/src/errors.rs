use thiserror::Error;

/// Error kinds surfaced by corpus construction and training calls.
///
/// Public operations return `anyhow::Result`; these variants travel inside
/// the `anyhow::Error` chain and can be recovered with `downcast_ref`.
///
/// `OutOfRange` and `DimensionMismatch` are detected synchronously, before
/// any worker thread is spawned. `WorkerFailure` is captured inside a worker
/// thread, tagged with the failing document index, and re-surfaced on the
/// orchestrator thread when the result is awaited.
#[derive(Debug, Error)]
pub enum TrainError {
    #[error("document index {index} out of range for corpus of size {size}")]
    OutOfRange { index: usize, size: usize },

    #[error("dimension mismatch for {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("worker failed on document {index}: {message}")]
    WorkerFailure { index: usize, message: String },
}
