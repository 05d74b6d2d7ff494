//! The training orchestrator.
//!
//! `TopicModel` coordinates the `Corpus`, the strategy pair, and the
//! `EventDispatcher` to run expectation-maximization epochs with a parallel
//! expectation phase.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌────────┐
//!                 │ Corpus │ (documents, shuffled between epochs)
//!                 └───┬────┘
//!                     │ indices 0..size
//!                     ↓
//!              ┌─────────────┐
//!              │  TopicModel │ ←──── TrainerConfig (iterations, workers, ...)
//!              └──────┬──────┘
//!                     │ task queue (closed after seeding)
//!                     ↓
//!              [Worker Threads] ── doc_e_step, model read-shared
//!                     │
//!                     │ result queue (per-document variational parameters)
//!                     ↓
//!              ┌─────────────┐
//!              │ Orchestrator│ ── doc_m_step per result, in dequeue order
//!              │   thread    │ ── m_step once per epoch, model write-locked
//!              └──────┬──────┘
//!                     │ process_events
//!                     ↓
//!              ┌───────────────┐
//!              │EventDispatcher│ (listeners run here, never on workers)
//!              └───────────────┘
//! ```
//!
//! # Module Structure
//!
//! ```text
//! src/trainer/
//! ├── mod.rs     # Public API exports + architecture docs
//! ├── config.rs  # TrainerConfig and builder
//! ├── model.rs   # TopicModel facade and the epoch loop
//! └── worker.rs  # Generic WorkerPool<Task, Output>
//! ```
//!
//! # Guarantees
//!
//! - Every document index in `[0, corpus.size())` is processed exactly once
//!   per epoch, for any worker count.
//! - `doc_m_step` runs strictly on the orchestrator thread, in result
//!   arrival order; `m_step` runs strictly after the last `doc_m_step` of
//!   the epoch, with the workers already joined.
//! - A failure inside a worker's expectation step aborts the epoch before
//!   `m_step` and surfaces on the orchestrator thread as a `WorkerFailure`
//!   tagged with the document index.

mod config;
mod model;
mod worker;

pub use config::{TrainerConfig, TrainerConfigBuilder};
pub use model::TopicModel;
