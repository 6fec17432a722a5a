//! Review orchestration: the reasoning loop, engine adapter, and forge
//! integration.
//!
//! The [`controller::Agent`] drives a [`engine::ReasoningEngine`] against a
//! tool registry in a bounded, quality-gated loop, records every step into
//! the session log, and freezes the accumulated [`report::ReviewResult`] at
//! finalization. [`report::position_findings`] then maps findings onto diff
//! positions and [`forge::GitHubClient`] posts the review.

pub mod analysis;
pub mod controller;
pub mod engine;
pub mod forge;
pub mod prompt;
pub mod report;
