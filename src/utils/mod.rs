//! Utility functions and helpers.

pub mod http;
pub mod retry;
pub mod url;

pub use self::http::{FetchRequest, FetchResponse, HttpFetch, RateLimitedClient};
pub use self::retry::{RetryPolicy, Sleeper, TokioSleeper};
