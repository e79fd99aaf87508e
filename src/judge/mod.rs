//! Judge layer: external scoring oracles, verdict extraction, retries,
//! and refinement.
//!
//! This module provides:
//! - `JudgeClient`: the narrow async interface to a scoring oracle
//! - `HttpJudgeClient`: messages-API implementation over reqwest
//! - `parse_verdict`: the cascading extraction of structured verdicts
//!   from noisy judge text
//! - `ScoringJudge`: client + prompt + scale + retry bundled into an
//!   infallible `score` call
//! - `RefinementOracle` / `JudgeRefiner` / `MutationRefiner`: the
//!   refinement seam with its always-valid mutation fallback

mod client;
mod http;
mod parser;
mod refine;

pub use client::{
    query_with_retry, JudgeClient, JudgeError, JudgeRequest, RetryPolicy, ScoringJudge,
};
pub use http::{HttpJudgeClient, HttpJudgeConfig};
pub use parser::{parse_verdict, ScoreScale, Verdict};
pub use refine::{
    cleanup_suggestion, JudgeRefiner, MutationRefiner, RefinementError, RefinementOracle,
};
