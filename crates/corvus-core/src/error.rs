/// Errors that can occur across the Corvus platform.
///
/// Each variant wraps a specific error domain. Library crates use this type
/// directly; the binary crate converts to `miette` diagnostics at the boundary.
///
/// # Examples
///
/// ```
/// use corvus_core::CorvusError;
///
/// let err = CorvusError::Config("missing API key".into());
/// assert!(err.to_string().contains("missing API key"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum CorvusError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A review-session mutator was called with no active session.
    ///
    /// This is a precondition violation and is never recovered from inside
    /// the orchestration loop.
    #[error("session error: {0}")]
    Session(String),

    /// Reasoning engine API or response error.
    #[error("engine error: {0}")]
    Engine(String),

    /// Forge (GitHub) operation failure.
    #[error("git error: {0}")]
    Git(String),

    /// Diff or response parsing failure.
    #[error("parse error: {0}")]
    Parse(String),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl CorvusError {
    /// Shorthand for the "no active review session" precondition violation.
    pub fn no_active_session() -> Self {
        CorvusError::Session("no active review session".into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: CorvusError = io_err.into();
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn config_error_displays_message() {
        let err = CorvusError::Config("bad value".into());
        assert_eq!(err.to_string(), "configuration error: bad value");
    }

    #[test]
    fn no_active_session_is_a_session_error() {
        let err = CorvusError::no_active_session();
        assert!(matches!(err, CorvusError::Session(_)));
        assert_eq!(err.to_string(), "session error: no active review session");
    }
}
