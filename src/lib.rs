//! Merge crawler job postings into one deduplicated, classified dataset.
//!
//! Stages run strictly in order: [`reader`] → [`normalize`] → [`dedup`] →
//! [`classify`] → [`partition`]. [`pipeline::Pipeline`] wires them together.

pub mod classify;
pub mod config;
pub mod dedup;
pub mod error;
pub mod normalize;
pub mod output;
pub mod partition;
pub mod pipeline;
pub mod reader;
pub mod report;

pub use classify::{Category, Classification, ClassifiedPosting, Classifier, Region};
pub use config::{KeywordConfig, Settings};
pub use error::{PipelineError, RejectReason};
pub use normalize::{CanonicalPosting, Normalizer};
pub use pipeline::{Pipeline, RunOutput};
pub use reader::{RawPosting, SourceUnit};
