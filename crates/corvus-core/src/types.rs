use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Issue severity level for review findings.
///
/// # Examples
///
/// ```
/// use corvus_core::Severity;
///
/// let s: Severity = serde_json::from_str("\"high\"").unwrap();
/// assert_eq!(s, Severity::High);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Must be fixed before merge.
    High,
    /// Should be investigated.
    Medium,
    /// Minor or stylistic.
    Low,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::High => write!(f, "high"),
            Severity::Medium => write!(f, "medium"),
            Severity::Low => write!(f, "low"),
        }
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "high" => Ok(Severity::High),
            "medium" => Ok(Severity::Medium),
            "low" => Ok(Severity::Low),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}

impl Severity {
    /// Parse a severity string, treating anything unrecognized as [`Severity::Low`].
    ///
    /// Tool payloads and engine output carry free-form severity strings;
    /// scoring and prioritization both treat an unknown severity as the
    /// lowest bucket.
    ///
    /// # Examples
    ///
    /// ```
    /// use corvus_core::Severity;
    ///
    /// assert_eq!(Severity::from_str_lossy("HIGH"), Severity::High);
    /// assert_eq!(Severity::from_str_lossy("whatever"), Severity::Low);
    /// ```
    pub fn from_str_lossy(s: &str) -> Severity {
        s.parse().unwrap_or(Severity::Low)
    }

    /// Points deducted from the overall score per issue of this severity.
    pub fn penalty(self) -> u32 {
        match self {
            Severity::High => 15,
            Severity::Medium => 10,
            Severity::Low => 5,
        }
    }
}

/// Classification of a review finding.
///
/// # Examples
///
/// ```
/// use corvus_core::Category;
///
/// let c: Category = serde_json::from_str("\"security\"").unwrap();
/// assert_eq!(c, Category::Security);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// A likely defect.
    Bug,
    /// A vulnerability or unsafe pattern.
    Security,
    /// General code quality.
    Quality,
    /// Performance concern.
    Performance,
    /// Formatting or style.
    Style,
    /// Dependency manifest problem.
    Dependencies,
    /// Missing or weak tests.
    Testing,
    /// Structural or design concern.
    Architecture,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Bug => write!(f, "bug"),
            Category::Security => write!(f, "security"),
            Category::Quality => write!(f, "quality"),
            Category::Performance => write!(f, "performance"),
            Category::Style => write!(f, "style"),
            Category::Dependencies => write!(f, "dependencies"),
            Category::Testing => write!(f, "testing"),
            Category::Architecture => write!(f, "architecture"),
        }
    }
}

/// A single finding produced during a review.
///
/// `file` and `line` are optional: the diff mapper later resolves missing
/// positions against the pull request's patches, and findings that cannot be
/// placed stay general (non-positional).
///
/// # Examples
///
/// ```
/// use corvus_core::{Category, Issue, Severity};
///
/// let issue = Issue {
///     severity: Severity::High,
///     category: Category::Security,
///     message: "Use of eval() - security risk".into(),
///     file: Some("app.py".into()),
///     line: Some(42),
///     suggestion: None,
/// };
/// assert_eq!(issue.severity, Severity::High);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    /// Severity of the finding.
    pub severity: Severity,
    /// Classification of the finding.
    pub category: Category,
    /// Explanation of the issue.
    pub message: String,
    /// Path of the file the finding refers to, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// 1-based line number in the new file version, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    /// Optional fix suggestion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

/// Phase of an in-flight review session.
///
/// Phases are advisory progress markers set by the loop controller, not a
/// guarded state machine: any transition is accepted and recorded.
///
/// # Examples
///
/// ```
/// use corvus_core::ReviewPhase;
///
/// assert_eq!(ReviewPhase::Planning.to_string(), "planning");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewPhase {
    /// Initial planning of the review approach.
    Planning,
    /// Deep analysis of individual files.
    Analyzing,
    /// Cross-file reasoning and prioritization.
    Reviewing,
    /// Summary generation and scoring.
    Finalizing,
    /// Session is frozen in history.
    Completed,
}

impl fmt::Display for ReviewPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReviewPhase::Planning => write!(f, "planning"),
            ReviewPhase::Analyzing => write!(f, "analyzing"),
            ReviewPhase::Reviewing => write!(f, "reviewing"),
            ReviewPhase::Finalizing => write!(f, "finalizing"),
            ReviewPhase::Completed => write!(f, "completed"),
        }
    }
}

/// An inline comment positioned on a specific line of a changed file.
///
/// Only valid when `line` falls inside a hunk of the diff shown to the
/// reviewer; the hosting platform rejects positions outside the diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineComment {
    /// Path to the file being commented on.
    pub path: String,
    /// 1-based line number in the new version of the file.
    pub line: u32,
    /// Comment body.
    pub body: String,
}

/// Output format for CLI subcommands.
///
/// Implements [`FromStr`] so it can be used directly with `clap` argument parsing.
///
/// # Examples
///
/// ```
/// use corvus_core::OutputFormat;
///
/// let fmt: OutputFormat = "json".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Json);
///
/// let fmt: OutputFormat = "md".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Markdown);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable summaries.
    #[default]
    Text,
    /// Machine-readable JSON with camelCase keys.
    Json,
    /// Markdown-formatted output.
    Markdown,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}

/// Detect a programming language from a filename extension.
///
/// Returns `"unknown"` for unrecognized extensions. Drives per-language tool
/// arguments (security pattern tables, style rules).
///
/// # Examples
///
/// ```
/// use corvus_core::detect_language;
///
/// assert_eq!(detect_language("app/main.py"), "python");
/// assert_eq!(detect_language("Makefile"), "unknown");
/// ```
pub fn detect_language(filename: &str) -> &'static str {
    let ext = filename.rsplit_once('.').map(|(_, e)| e).unwrap_or("");
    match ext.to_lowercase().as_str() {
        "py" => "python",
        "js" => "javascript",
        "ts" => "typescript",
        "java" => "java",
        "cpp" => "cpp",
        "c" => "c",
        "go" => "go",
        "rb" => "ruby",
        "php" => "php",
        "swift" => "swift",
        "kt" => "kotlin",
        "rs" => "rust",
        _ => "unknown",
    }
}
