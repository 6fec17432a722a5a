use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CorvusError;

/// Top-level configuration loaded from `.corvus.toml`.
///
/// Supports layered resolution: CLI flags > env vars > local config > defaults.
///
/// # Examples
///
/// ```
/// use corvus_core::CorvusConfig;
///
/// let config = CorvusConfig::default();
/// assert_eq!(config.agent.max_iterations, 10);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorvusConfig {
    /// Reasoning engine provider settings.
    #[serde(default)]
    pub engine: EngineConfig,
    /// Orchestration loop settings.
    #[serde(default)]
    pub agent: AgentConfig,
}

impl CorvusConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`CorvusError::Io`] if the file cannot be read, or
    /// [`CorvusError::Toml`] if the content is not valid TOML.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use corvus_core::CorvusConfig;
    /// use std::path::Path;
    ///
    /// let config = CorvusConfig::from_file(Path::new(".corvus.toml")).unwrap();
    /// ```
    pub fn from_file(path: &Path) -> Result<Self, CorvusError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`CorvusError::Toml`] if parsing fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use corvus_core::CorvusConfig;
    ///
    /// let toml = r#"
    /// [agent]
    /// max_iterations = 6
    /// "#;
    /// let config = CorvusConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.agent.max_iterations, 6);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, CorvusError> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }
}

/// Reasoning engine provider configuration.
///
/// # Examples
///
/// ```
/// use corvus_core::EngineConfig;
///
/// let config = EngineConfig::default();
/// assert_eq!(config.model, "gpt-4-turbo-preview");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Provider name (e.g. `"openai"`, `"ollama"`).
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Model identifier.
    #[serde(default = "default_model")]
    pub model: String,
    /// API key for the provider.
    pub api_key: Option<String>,
    /// Custom base URL for API requests.
    pub base_url: Option<String>,
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

fn default_provider() -> String {
    "openai".into()
}

fn default_model() -> String {
    "gpt-4-turbo-preview".into()
}

fn default_temperature() -> f64 {
    0.3
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_key: None,
            base_url: None,
            temperature: default_temperature(),
        }
    }
}

/// Orchestration loop configuration.
///
/// The quality gates (`min_tools_used`, `min_findings`, `min_steps`) must all
/// hold before a completion signal from the engine is honored;
/// `auto_finalize_findings` is the accumulated-findings threshold for the
/// keyword-free automatic finalization path.
///
/// # Examples
///
/// ```
/// use corvus_core::AgentConfig;
///
/// let config = AgentConfig::default();
/// assert_eq!(config.max_iterations, 10);
/// assert_eq!(config.max_failures, 3);
/// assert_eq!(config.min_tools_used, 5);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Iteration budget for the reasoning loop (default: 10).
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    /// Failed iterations tolerated before the loop aborts early (default: 3).
    #[serde(default = "default_max_failures")]
    pub max_failures: u32,
    /// Distinct tools that must have been used before finalizing (default: 5).
    #[serde(default = "default_min_tools_used")]
    pub min_tools_used: usize,
    /// Issues + suggestions that must exist before finalizing (default: 3).
    #[serde(default = "default_min_findings")]
    pub min_findings: usize,
    /// Reasoning steps that must have been taken before finalizing (default: 7).
    #[serde(default = "default_min_steps")]
    pub min_steps: usize,
    /// Findings beyond which a quiet iteration finalizes without a keyword (default: 5).
    #[serde(default = "default_auto_finalize_findings")]
    pub auto_finalize_findings: usize,
}

fn default_max_iterations() -> u32 {
    10
}

fn default_max_failures() -> u32 {
    3
}

fn default_min_tools_used() -> usize {
    5
}

fn default_min_findings() -> usize {
    3
}

fn default_min_steps() -> usize {
    7
}

fn default_auto_finalize_findings() -> usize {
    5
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            max_failures: default_max_failures(),
            min_tools_used: default_min_tools_used(),
            min_findings: default_min_findings(),
            min_steps: default_min_steps(),
            auto_finalize_findings: default_auto_finalize_findings(),
        }
    }
}
