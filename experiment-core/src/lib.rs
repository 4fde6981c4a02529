//! Experiment execution engine for a retrieval pipeline.
//!
//! This crate turns a declarative experiment configuration into one
//! concrete run:
//! - Resolve embedder/chunker/retriever strategies by name via an explicit
//!   registry ([`factory`])
//! - Load documents and queries ([`loader`]), chunk ([`chunking`]), embed
//!   with batching and a content-addressed cache gate ([`embedding`],
//!   [`pipeline::resolve_embeddings`]), index and retrieve ([`retrieval`])
//! - Score retrieval quality ([`evaluate`]) and run deterministic
//!   profile-based sampling for judge evaluation ([`sample`])
//! - Produce the summary/detailed/generation artifacts ([`report`])
//!
//! The design is flat (no deep nesting) and splits responsibilities into
//! focused modules.

pub mod chunking;
pub mod config;
pub mod embedding;
pub mod errors;
pub mod evaluate;
pub mod factory;
pub mod loader;
pub mod pipeline;
pub mod record;
pub mod report;
pub mod retrieval;
pub mod sample;

pub use config::ExperimentConfig;
pub use errors::{ExperimentError, Result};
pub use pipeline::{ExperimentPipeline, ExperimentReport, Stage};
pub use record::{Document, Passage, QueryOutcome, QueryRecord, RankedHit, SampledQuery};
pub use report::{GenerationRecord, ReportWriter, SummaryReport, detailed_records};
