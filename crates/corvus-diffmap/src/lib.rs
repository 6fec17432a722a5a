//! Diff-to-line mapping for positional review comments.
//!
//! Parses unified-diff hunks into line-validity ranges and added-line lists,
//! resolves free-form findings to `(file, line)` positions, and assembles the
//! final inline-comment set split into platform-valid and skipped comments.

pub mod parser;
pub mod resolve;
