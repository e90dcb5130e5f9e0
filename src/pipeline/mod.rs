//! Pipeline stages and the run orchestrator.
//!
//! - `normalize`: raw postings to the canonical shape
//! - `filter`: title keyword policy
//! - `run`: one fetch → filter → admit → notify pass

pub mod filter;
pub mod normalize;
pub mod run;

pub use filter::{Classification, FilterPolicy, KeywordFilter, RejectReason};
pub use normalize::normalize;
pub use run::{Pipeline, RunAborted};
