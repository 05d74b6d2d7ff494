//! Concurrent expectation-maximization training for topic models.
//!
//! The crate separates the orchestration (worker pool, epoch loop, event
//! aggregation) from the statistical algorithm: any [`ExpectationStep`] /
//! [`MaximizationStep`] pair plugs into [`TopicModel`], which runs the
//! expectation phase on a fixed pool of worker threads and everything else
//! on the calling thread. Reference mixture-of-unigrams steps are included.

pub mod corpus;
pub mod document;
pub mod em;
pub mod errors;
pub mod events;
pub mod params;
pub mod trainer;

pub use corpus::{Corpus, InMemoryCorpus};
pub use document::Document;
pub use em::{ExpectationStep, MaximizationStep, MixtureExpectationStep, OnlineMaximizationStep};
pub use errors::TrainError;
pub use events::{Event, EventDispatcher};
pub use params::{ModelParameters, VariationalParameters};
pub use trainer::{TopicModel, TrainerConfig, TrainerConfigBuilder};
