//! Scoring engine for edgemesh placement decisions.
//!
//! Turns resource samples into a single comparable score. The orchestrator
//! uses it two ways: scoring this device live ([`ScoringEngine::score_of`])
//! and scoring raw samples pulled from a remote peer
//! ([`ScoringEngine::score_from_resources`]).
//!
//! # Components
//!
//! - **`scorer`** — Composite score over a [`ResourceSample`] (weights, breakdown)
//! - **`sampler`** — Live sampling of this device (`sysinfo`) and the RTT seam
//! - **`engine`** — Ordered sampling + scoring with the invalid-score sentinel

pub mod engine;
pub mod error;
pub mod sampler;
pub mod scorer;

pub use engine::ScoringEngine;
pub use error::{SampleError, SampleResult};
pub use sampler::{ResourceSampler, RttSource, SystemSampler};
pub use scorer::{
    INVALID_SCORE, REFERENCE_BANDWIDTH_MBPS, ResourceSample, ScoreBreakdown, ScoringWeights,
    composite_score,
};
