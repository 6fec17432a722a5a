//! Core types, configuration, and error handling for the Corvus platform.
//!
//! This crate provides the shared foundation used by all other Corvus crates:
//! - [`CorvusError`] — unified error type using `thiserror`
//! - [`CorvusConfig`] — configuration loaded from `.corvus.toml`
//! - Shared types: [`Severity`], [`Category`], [`Issue`], [`ReviewPhase`],
//!   [`InlineComment`], [`OutputFormat`]

mod config;
mod error;
mod types;

pub use config::{AgentConfig, CorvusConfig, EngineConfig};
pub use error::CorvusError;
pub use types::{
    detect_language, Category, InlineComment, Issue, OutputFormat, ReviewPhase, Severity,
};

/// A convenience `Result` type for Corvus operations.
pub type Result<T> = std::result::Result<T, CorvusError>;
