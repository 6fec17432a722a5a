use corvus_core::{Issue, Severity};
use corvus_diffmap::parser::FilePatch;
use corvus_diffmap::resolve::{assemble_comments, resolve_issues, CommentSet, LineInference};
use corvus_session::Step;
use serde::Serialize;

use crate::controller::ChangedFile;

/// Aggregated outcome of one review, built incrementally through the loop
/// and frozen at finalization.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewResult {
    /// Pull request number.
    pub pr_number: u64,
    /// Repository in `owner/name` form.
    pub repository: String,
    /// Natural-language synopsis.
    pub summary: String,
    /// General findings.
    pub issues: Vec<Issue>,
    /// Free-text improvement suggestions.
    pub suggestions: Vec<String>,
    /// Findings carrying a `(file, line)` position.
    pub file_issues: Vec<Issue>,
    /// Severity-weighted quality score, 0-100.
    pub overall_score: u8,
    /// Distinct tools used, in first-use order.
    pub tools_used: Vec<String>,
    /// Full reasoning chain from the session.
    pub reasoning: Vec<Step>,
    /// Decisions the agent recorded.
    pub decisions: Vec<String>,
    /// Files marked analyzed.
    pub files_analyzed: Vec<String>,
}

impl ReviewResult {
    /// Empty result for a review that is about to start.
    pub fn new(pr_number: u64, repository: &str) -> Self {
        Self {
            pr_number,
            repository: repository.to_string(),
            summary: String::new(),
            issues: Vec::new(),
            suggestions: Vec::new(),
            file_issues: Vec::new(),
            overall_score: 0,
            tools_used: Vec::new(),
            reasoning: Vec::new(),
            decisions: Vec::new(),
            files_analyzed: Vec::new(),
        }
    }

    /// Issues plus suggestions: the quantity the termination gates and the
    /// automatic-finalize path both measure.
    pub fn findings_count(&self) -> usize {
        self.issues.len() + self.suggestions.len()
    }

    /// Record a tool name, keeping the list distinct in first-use order.
    pub fn record_tool(&mut self, name: &str) {
        if !self.tools_used.iter().any(|t| t == name) {
            self.tools_used.push(name.to_string());
        }
    }

    /// Render the review body as markdown.
    ///
    /// File-scoped issues are listed textually here; positional placement is
    /// the diff mapper's job and only platform-valid positions are submitted
    /// as inline comments.
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str("## \u{1f916} Automated Code Review\n\n");

        if !self.summary.is_empty() {
            out.push_str(&format!("### Summary\n{}\n\n", self.summary));
        }

        if !self.issues.is_empty() {
            out.push_str("### Issues Found\n\n");
            for issue in &self.issues {
                let marker = match issue.severity {
                    Severity::High => "\u{1f534}",
                    Severity::Medium => "\u{1f7e1}",
                    Severity::Low => "\u{1f535}",
                };
                out.push_str(&format!(
                    "{marker} **{}**: {}\n",
                    issue.severity.to_string().to_uppercase(),
                    issue.message
                ));
            }
            out.push('\n');
        }

        if !self.file_issues.is_empty() {
            out.push_str("### File-Specific Issues\n\n");
            for issue in &self.file_issues {
                if let (Some(file), Some(line)) = (&issue.file, issue.line) {
                    out.push_str(&format!("**`{file}`** (line {line}): {}\n", issue.message));
                }
            }
            out.push('\n');
        }

        if !self.suggestions.is_empty() {
            out.push_str("### Suggestions\n\n");
            for suggestion in &self.suggestions {
                out.push_str(&format!("- {suggestion}\n"));
            }
            out.push('\n');
        }

        out.push_str(&format!("**Score:** {}/100\n", self.overall_score));
        out.push_str("\n---\n*This review was generated automatically by Corvus*\n");
        out
    }
}

impl std::fmt::Display for ReviewResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Review Results")?;
        writeln!(f, "==============")?;
        writeln!(
            f,
            "PR #{} in {} | Score: {}/100 | Issues: {} | Suggestions: {} | Tools: {}\n",
            self.pr_number,
            self.repository,
            self.overall_score,
            self.issues.len() + self.file_issues.len(),
            self.suggestions.len(),
            self.tools_used.len(),
        )?;

        if !self.summary.is_empty() {
            writeln!(f, "{}\n", self.summary)?;
        }

        for issue in self.issues.iter().chain(self.file_issues.iter()) {
            let label = issue.severity.to_string().to_uppercase();
            match (&issue.file, issue.line) {
                (Some(file), Some(line)) => {
                    writeln!(f, "[{label}] {file}:{line} {}", issue.message)?
                }
                _ => writeln!(f, "[{label}] {}", issue.message)?,
            }
            if let Some(suggestion) = &issue.suggestion {
                writeln!(f, "  Suggestion: {suggestion}")?;
            }
        }

        for suggestion in &self.suggestions {
            writeln!(f, "- {suggestion}")?;
        }

        Ok(())
    }
}

/// Severity-weighted quality score.
///
/// Starts at 100 and subtracts 15 per High, 10 per Medium, and 5 per Low
/// issue, clamped to `[0, 100]`. Deterministic and order-independent.
///
/// # Examples
///
/// ```
/// use corvus_agent::report::compute_score;
///
/// assert_eq!(compute_score(&[]), 100);
/// ```
pub fn compute_score(issues: &[Issue]) -> u8 {
    let penalty: u32 = issues.iter().map(|i| i.severity.penalty()).sum();
    100u32.saturating_sub(penalty).min(100) as u8
}

/// The review, positioned: inline comments the platform will accept plus the
/// findings that stay in the body.
#[derive(Debug)]
pub struct PositionedReview {
    /// Valid and skipped inline comments.
    pub comments: CommentSet,
    /// Findings that could not be placed on any line.
    pub general: Vec<Issue>,
}

/// Resolve every finding against the changed files and assemble the final
/// comment set.
///
/// Positioned and general findings both enter resolution; duplicates on the
/// same `(file, line)` collapse to the first occurrence.
pub fn position_findings(
    result: &ReviewResult,
    files: &[ChangedFile],
    inference: &dyn LineInference,
) -> PositionedReview {
    let patches: Vec<FilePatch> = files
        .iter()
        .filter_map(|f| {
            f.patch.as_ref().map(|patch| FilePatch {
                path: f.filename.clone(),
                patch: patch.clone(),
            })
        })
        .collect();

    let candidates: Vec<Issue> = result
        .file_issues
        .iter()
        .chain(result.issues.iter())
        .cloned()
        .collect();

    let resolved = resolve_issues(candidates, &patches, inference);
    let comments = assemble_comments(&resolved.file_issues, &patches);

    PositionedReview {
        comments,
        general: resolved.general_issues,
    }
}
