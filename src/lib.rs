// src/lib.rs

//! job-sentinel library: discovers job postings, filters them, remembers
//! which ones were already reported and announces the rest.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
