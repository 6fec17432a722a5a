//! Session state for one in-flight review.
//!
//! Tracks the agent's phases, reasoning steps, decisions, and findings in an
//! append-only log. One session is mutable at a time; finalized sessions move
//! to an immutable history.

mod session;

pub use session::{ReviewSession, SessionManager, SessionSummary, Step};
