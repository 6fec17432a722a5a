//! Named, schema-described capabilities for the review agent.
//!
//! The [`ToolRegistry`] maps unique names to tools and executes them behind a
//! uniform outcome envelope: unknown names and capability failures come back
//! as [`ToolOutcome::Err`] data, never as errors the caller must handle per
//! call. Built-in tools cover file analysis delegation, dependency checks,
//! security pattern scanning, style checks, and issue prioritization.

mod builtin;
mod registry;

pub use builtin::{
    builtin_registry, AnalyzeFileReport, CodeSearcher, Collaborators, ContextRetriever,
    DependencyReport, FileAnalysis, FileAnalyzer, FileContentReport, FileFetcher,
    PastReviewsReport, PrioritizedReport, PriorityBuckets, PrioritySummary, RelatedFilesReport,
    SearchReport, SecurityReport, StyleReport,
};
pub use registry::{Capability, Tool, ToolOutcome, ToolRegistry};
