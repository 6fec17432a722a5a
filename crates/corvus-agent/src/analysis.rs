use async_trait::async_trait;
use corvus_core::{Category, CorvusError, Issue, Severity};
use corvus_tools::{FileAnalysis, FileAnalyzer};
use serde::Deserialize;

use crate::engine::OpenAiEngine;
use crate::prompt;

/// LLM-backed per-file analysis delegate.
///
/// Wired into the tool registry as the `analyze_code_file` collaborator.
/// Parse failures never propagate: an unparseable reply degrades to a
/// suggestions-only analysis carrying the raw text.
pub struct LlmFileAnalyzer {
    engine: OpenAiEngine,
}

impl LlmFileAnalyzer {
    /// Wrap an engine for per-file analysis.
    pub fn new(engine: OpenAiEngine) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl FileAnalyzer for LlmFileAnalyzer {
    async fn analyze(
        &self,
        filename: &str,
        code: &str,
        language: &str,
    ) -> Result<FileAnalysis, CorvusError> {
        let request = prompt::build_analysis_prompt(filename, code, language);
        let reply = self.engine.prompt(&request).await?;
        Ok(parse_analysis(&reply, filename))
    }
}

#[derive(Deserialize)]
struct RawAnalysis {
    #[serde(default)]
    issues: Vec<RawIssue>,
    #[serde(default)]
    suggestions: Vec<String>,
}

#[derive(Deserialize)]
struct RawIssue {
    severity: Option<String>,
    category: Option<String>,
    message: String,
    line: Option<serde_json::Value>,
    file: Option<String>,
    suggestion: Option<String>,
}

/// Parse the analysis reply into a [`FileAnalysis`].
///
/// Handles markdown code fences around the JSON. Findings that carry both a
/// file and a line are split into `file_issues`; the rest stay general. An
/// unparseable reply becomes a single suggestion holding the raw text.
///
/// # Examples
///
/// ```
/// use corvus_agent::analysis::parse_analysis;
///
/// let analysis = parse_analysis(r#"{"issues":[],"suggestions":["add tests"]}"#, "a.py");
/// assert_eq!(analysis.suggestions, vec!["add tests"]);
/// ```
pub fn parse_analysis(reply: &str, filename: &str) -> FileAnalysis {
    let cleaned = strip_code_fences(reply);

    let parsed: RawAnalysis = match serde_json::from_str(cleaned) {
        Ok(parsed) => parsed,
        Err(_) => {
            return FileAnalysis {
                issues: Vec::new(),
                suggestions: vec![reply.to_string()],
                file_issues: Vec::new(),
            }
        }
    };

    let mut analysis = FileAnalysis {
        issues: Vec::new(),
        suggestions: parsed.suggestions,
        file_issues: Vec::new(),
    };

    for raw in parsed.issues {
        let severity = raw
            .severity
            .as_deref()
            .map(Severity::from_str_lossy)
            .unwrap_or(Severity::Low);
        let category = raw
            .category
            .as_deref()
            .map(parse_category)
            .unwrap_or(Category::Quality);
        let line = match raw.line {
            Some(serde_json::Value::Number(n)) => n.as_u64().map(|l| l as u32).filter(|l| *l > 0),
            _ => None,
        };
        let file = raw.file.or_else(|| Some(filename.to_string()));

        let issue = Issue {
            severity,
            category,
            message: raw.message,
            file,
            line,
            suggestion: raw.suggestion,
        };

        if issue.line.is_some() && issue.file.is_some() {
            analysis.file_issues.push(issue);
        } else {
            analysis.issues.push(issue);
        }
    }

    analysis
}

fn parse_category(raw: &str) -> Category {
    match raw.to_lowercase().as_str() {
        "bug" => Category::Bug,
        "security" => Category::Security,
        "performance" => Category::Performance,
        "style" => Category::Style,
        "dependencies" => Category::Dependencies,
        "testing" => Category::Testing,
        "architecture" => Category::Architecture,
        _ => Category::Quality,
    }
}

fn strip_code_fences(s: &str) -> &str {
    let trimmed = s.trim();
    if let Some(rest) = trimmed.strip_prefix("```json") {
        if let Some(inner) = rest.strip_suffix("```") {
            return inner.trim();
        }
    }
    if let Some(rest) = trimmed.strip_prefix("```") {
        if let Some(inner) = rest.strip_suffix("```") {
            return inner.trim();
        }
    }
    trimmed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_valid_analysis() {
        let reply = r#"{
            "issues": [
                {
                    "severity": "high",
                    "category": "security",
                    "message": "SQL injection in query builder",
                    "line": 12,
                    "file": "db.py",
                    "suggestion": "Use parameterized queries"
                },
                {
                    "severity": "low",
                    "category": "style",
                    "message": "Function too long"
                }
            ],
            "suggestions": ["Add integration tests"]
        }"#;
        let analysis = parse_analysis(reply, "db.py");
        assert_eq!(analysis.file_issues.len(), 1);
        assert_eq!(analysis.file_issues[0].severity, Severity::High);
        assert_eq!(analysis.file_issues[0].line, Some(12));
        assert_eq!(analysis.issues.len(), 1);
        assert_eq!(analysis.issues[0].category, Category::Style);
        assert_eq!(analysis.suggestions, vec!["Add integration tests"]);
    }

    #[test]
    fn missing_file_defaults_to_analyzed_filename() {
        let reply = r#"{"issues":[{"severity":"medium","message":"m","line":3}]}"#;
        let analysis = parse_analysis(reply, "app.py");
        assert_eq!(analysis.file_issues.len(), 1);
        assert_eq!(analysis.file_issues[0].file.as_deref(), Some("app.py"));
    }

    #[test]
    fn issue_without_line_stays_general() {
        let reply = r#"{"issues":[{"severity":"medium","message":"m","file":"a.py"}]}"#;
        let analysis = parse_analysis(reply, "a.py");
        assert!(analysis.file_issues.is_empty());
        assert_eq!(analysis.issues.len(), 1);
    }

    #[test]
    fn zero_line_is_treated_as_missing() {
        let reply = r#"{"issues":[{"severity":"medium","message":"m","line":0}]}"#;
        let analysis = parse_analysis(reply, "a.py");
        assert!(analysis.file_issues.is_empty());
        assert_eq!(analysis.issues[0].line, None);
    }

    #[test]
    fn code_fences_are_stripped() {
        let reply = "```json\n{\"issues\":[],\"suggestions\":[\"s\"]}\n```";
        let analysis = parse_analysis(reply, "a.py");
        assert_eq!(analysis.suggestions, vec!["s"]);
    }

    #[test]
    fn garbage_becomes_a_suggestion() {
        let analysis = parse_analysis("I could not produce JSON, sorry.", "a.py");
        assert!(analysis.issues.is_empty());
        assert_eq!(analysis.suggestions.len(), 1);
        assert!(analysis.suggestions[0].contains("sorry"));
    }

    #[test]
    fn unknown_severity_and_category_degrade() {
        let reply = r#"{"issues":[{"severity":"catastrophic","category":"weird","message":"m"}]}"#;
        let analysis = parse_analysis(reply, "a.py");
        assert_eq!(analysis.issues[0].severity, Severity::Low);
        assert_eq!(analysis.issues[0].category, Category::Quality);
    }
}
