//! Built-in capabilities registered with every agent.
//!
//! The deterministic checkers (dependencies, security patterns, style,
//! prioritization) run entirely in-process; the delegating tools forward to
//! optional collaborators and report an error outcome when the collaborator
//! is absent, matching the envelope discipline of the registry.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};

use corvus_core::{Category, CorvusError, Issue, Severity};

use crate::registry::{parse_args, to_payload, Capability, Tool, ToolRegistry};

/// Per-file analysis produced by the external file-analysis collaborator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAnalysis {
    /// General findings for the file.
    #[serde(default)]
    pub issues: Vec<Issue>,
    /// Free-text improvement suggestions.
    #[serde(default)]
    pub suggestions: Vec<String>,
    /// Findings already carrying a `(file, line)` position.
    #[serde(default)]
    pub file_issues: Vec<Issue>,
}

/// Deep per-file analysis collaborator (typically LLM-backed).
#[async_trait]
pub trait FileAnalyzer: Send + Sync {
    /// Analyze one file's code or patch.
    async fn analyze(
        &self,
        filename: &str,
        code: &str,
        language: &str,
    ) -> Result<FileAnalysis, CorvusError>;
}

/// Fetches full file contents from the repository.
#[async_trait]
pub trait FileFetcher: Send + Sync {
    /// Fetch `path` from `repo` (`owner/name`).
    async fn fetch(&self, repo: &str, path: &str) -> Result<String, CorvusError>;
}

/// Searches the codebase for patterns or similar code.
#[async_trait]
pub trait CodeSearcher: Send + Sync {
    /// Search `repo` for `query`, returning matching snippets.
    async fn search(&self, repo: &str, query: &str) -> Result<Vec<String>, CorvusError>;
}

/// Retrieves similar past reviews from a knowledge base.
#[async_trait]
pub trait ContextRetriever: Send + Sync {
    /// Return up to `top_k` relevant past-review snippets for `code`.
    async fn relevant_context(
        &self,
        code: &str,
        language: &str,
        top_k: usize,
    ) -> Result<Vec<String>, CorvusError>;
}

/// Optional collaborators wired into the built-in tools.
///
/// Every field may be `None`; the corresponding tool then reports a
/// "not available" error outcome instead of being unregistered, so the
/// reasoning engine always sees a stable tool catalog.
#[derive(Default, Clone)]
pub struct Collaborators {
    /// Per-file analysis backend.
    pub analyzer: Option<Arc<dyn FileAnalyzer>>,
    /// Repository file fetcher.
    pub fetcher: Option<Arc<dyn FileFetcher>>,
    /// Codebase search backend.
    pub searcher: Option<Arc<dyn CodeSearcher>>,
    /// Past-review knowledge base.
    pub retriever: Option<Arc<dyn ContextRetriever>>,
}

/// Build the standard registry with all built-in tools.
pub fn builtin_registry(collaborators: Collaborators) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    registry.register(Tool::new(
        "analyze_code_file",
        "Analyze a specific file from the PR for bugs, security issues, and code quality. \
         Use this when you need to deeply examine a particular file.",
        serde_json::json!({
            "type": "object",
            "properties": {
                "filename": { "type": "string", "description": "The name of the file to analyze" },
                "code": { "type": "string", "description": "The code content or diff to analyze" },
                "language": { "type": "string", "description": "Programming language (python, javascript, typescript, etc.)" },
            },
            "required": ["filename", "code", "language"],
        }),
        Box::new(AnalyzeCodeFile {
            analyzer: collaborators.analyzer,
        }),
    ));

    registry.register(Tool::new(
        "get_file_content",
        "Get the full content of a file from the repository. Use this to understand context \
         or check related files.",
        serde_json::json!({
            "type": "object",
            "properties": {
                "filename": { "type": "string", "description": "The path to the file" },
                "repo_name": { "type": "string", "description": "Repository name in format owner/repo" },
            },
            "required": ["filename", "repo_name"],
        }),
        Box::new(GetFileContent {
            fetcher: collaborators.fetcher,
        }),
    ));

    registry.register(Tool::new(
        "check_dependencies",
        "Check if new dependencies are added and analyze their security and compatibility. \
         Use this when package files are modified.",
        serde_json::json!({
            "type": "object",
            "properties": {
                "package_file": { "type": "string", "description": "Content of package file (requirements.txt, package.json, etc.)" },
                "file_type": { "type": "string", "description": "Type of package file (requirements, package.json, pom.xml, etc.)" },
            },
            "required": ["package_file", "file_type"],
        }),
        Box::new(CheckDependencies),
    ));

    registry.register(Tool::new(
        "analyze_security_patterns",
        "Perform deep security analysis looking for common vulnerabilities like SQL injection, \
         XSS, authentication issues, etc.",
        serde_json::json!({
            "type": "object",
            "properties": {
                "code": { "type": "string", "description": "Code to analyze for security issues" },
                "language": { "type": "string", "description": "Programming language" },
            },
            "required": ["code", "language"],
        }),
        Box::new(SecurityScan::new()),
    ));

    registry.register(Tool::new(
        "check_code_style",
        "Check code style and adherence to best practices for the specific language.",
        serde_json::json!({
            "type": "object",
            "properties": {
                "code": { "type": "string", "description": "Code to check" },
                "language": { "type": "string", "description": "Programming language" },
                "filename": { "type": "string", "description": "Filename for context" },
            },
            "required": ["code", "language"],
        }),
        Box::new(CheckCodeStyle),
    ));

    registry.register(Tool::new(
        "get_related_files",
        "Get list of related files that might be affected by changes. Use this to understand \
         the impact of changes.",
        serde_json::json!({
            "type": "object",
            "properties": {
                "filename": { "type": "string", "description": "The file that changed" },
                "repo_name": { "type": "string", "description": "Repository name" },
            },
            "required": ["filename", "repo_name"],
        }),
        Box::new(GetRelatedFiles),
    ));

    registry.register(Tool::new(
        "search_codebase",
        "Search the codebase for patterns, similar code, or related implementations. Use this \
         to find similar patterns or check consistency.",
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Search query or pattern to look for" },
                "repo_name": { "type": "string", "description": "Repository name" },
            },
            "required": ["query", "repo_name"],
        }),
        Box::new(SearchCodebase {
            searcher: collaborators.searcher,
        }),
    ));

    registry.register(Tool::new(
        "get_past_reviews",
        "Retrieve similar past reviews from the knowledge base to maintain consistency and \
         learn from previous feedback.",
        serde_json::json!({
            "type": "object",
            "properties": {
                "code": { "type": "string", "description": "Code snippet to find similar reviews for" },
                "language": { "type": "string", "description": "Programming language" },
            },
            "required": ["code", "language"],
        }),
        Box::new(GetPastReviews {
            retriever: collaborators.retriever,
        }),
    ));

    registry.register(Tool::new(
        "prioritize_issues",
        "Analyze and prioritize found issues based on severity, impact, and risk. Use this to \
         organize findings.",
        serde_json::json!({
            "type": "object",
            "properties": {
                "issues": {
                    "type": "array",
                    "description": "List of issues found",
                    "items": { "type": "object" },
                },
            },
            "required": ["issues"],
        }),
        Box::new(PrioritizeIssues),
    ));

    registry
}

// --- analyze_code_file ---

#[derive(Deserialize)]
struct AnalyzeFileParams {
    filename: String,
    code: String,
    language: String,
}

/// Payload of `analyze_code_file`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeFileReport {
    /// File that was analyzed.
    pub filename: String,
    /// The collaborator's analysis.
    pub analysis: FileAnalysis,
    /// Count of general findings.
    pub issues_count: usize,
    /// Count of suggestions.
    pub suggestions_count: usize,
}

struct AnalyzeCodeFile {
    analyzer: Option<Arc<dyn FileAnalyzer>>,
}

#[async_trait]
impl Capability for AnalyzeCodeFile {
    async fn invoke(&self, args: &serde_json::Value) -> Result<serde_json::Value, String> {
        let params: AnalyzeFileParams = parse_args("analyze_code_file", args)?;
        let Some(analyzer) = &self.analyzer else {
            return Err("analysis service not available".into());
        };
        let analysis = analyzer
            .analyze(&params.filename, &params.code, &params.language)
            .await
            .map_err(|e| e.to_string())?;
        let report = AnalyzeFileReport {
            filename: params.filename,
            issues_count: analysis.issues.len(),
            suggestions_count: analysis.suggestions.len(),
            analysis,
        };
        to_payload(&report)
    }
}

// --- check_dependencies ---

#[derive(Deserialize)]
struct DependencyParams {
    package_file: String,
    file_type: String,
}

/// Payload of `check_dependencies`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyReport {
    /// Manifest findings.
    pub issues: Vec<Issue>,
    /// Free-text suggestions.
    pub suggestions: Vec<String>,
    /// Count of non-comment manifest lines.
    pub dependencies_count: usize,
}

/// Known-vulnerable package/version prefixes for requirements manifests.
const VULNERABLE_PACKAGES: &[&str] = &["django<2.0", "flask<1.0", "requests<2.20"];

struct CheckDependencies;

#[async_trait]
impl Capability for CheckDependencies {
    async fn invoke(&self, args: &serde_json::Value) -> Result<serde_json::Value, String> {
        let params: DependencyParams = parse_args("check_dependencies", args)?;
        let mut issues = Vec::new();

        if params.file_type == "requirements" {
            for raw in params.package_file.lines() {
                let line = raw.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }

                if !line.contains("==") && !line.contains(">=") && !line.contains("~=") {
                    issues.push(Issue {
                        severity: Severity::Medium,
                        category: Category::Dependencies,
                        message: format!("Unpinned dependency: {line}"),
                        file: None,
                        line: None,
                        suggestion: Some(
                            "Pin dependency to specific version for reproducibility".into(),
                        ),
                    });
                }

                let lowered = line.to_lowercase();
                for vulnerable in VULNERABLE_PACKAGES {
                    let package = vulnerable.split('<').next().unwrap_or(vulnerable);
                    if lowered.contains(package) {
                        issues.push(Issue {
                            severity: Severity::High,
                            category: Category::Dependencies,
                            message: format!("Potentially vulnerable package version: {line}"),
                            file: None,
                            line: None,
                            suggestion: Some("Update to latest secure version".into()),
                        });
                    }
                }
            }
        }

        let dependencies_count = params
            .package_file
            .lines()
            .filter(|l| !l.trim().is_empty() && !l.starts_with('#'))
            .count();

        to_payload(&DependencyReport {
            issues,
            suggestions: Vec::new(),
            dependencies_count,
        })
    }
}

// --- analyze_security_patterns ---

#[derive(Deserialize)]
struct SecurityParams {
    code: String,
    language: String,
}

/// Payload of `analyze_security_patterns`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityReport {
    /// Pattern matches, each carrying its 1-based line number.
    pub security_issues: Vec<Issue>,
    /// Count of matches.
    pub count: usize,
}

struct SecurityPattern {
    regex: Regex,
    message: &'static str,
    severity: Severity,
}

/// Ordered per-language security pattern scanner.
struct SecurityScan {
    tables: HashMap<&'static str, Vec<SecurityPattern>>,
}

impl SecurityScan {
    fn new() -> Self {
        let compile = |patterns: &[(&'static str, &'static str, Severity)]| {
            patterns
                .iter()
                .map(|(pattern, message, severity)| SecurityPattern {
                    regex: Regex::new(&format!("(?i){pattern}")).expect("static pattern"),
                    message,
                    severity: *severity,
                })
                .collect::<Vec<_>>()
        };

        let mut tables = HashMap::new();
        tables.insert(
            "python",
            compile(&[
                (r"eval\s*\(", "Use of eval() - security risk", Severity::High),
                (r"exec\s*\(", "Use of exec() - security risk", Severity::High),
                (r"pickle\.loads", "Unsafe pickle usage", Severity::High),
                (
                    r"subprocess\.call",
                    "Potential command injection",
                    Severity::Medium,
                ),
                (
                    r"os\.system",
                    "Use of os.system() - security risk",
                    Severity::High,
                ),
            ]),
        );
        tables.insert(
            "javascript",
            compile(&[
                (r"eval\s*\(", "Use of eval() - XSS risk", Severity::High),
                (
                    r"innerHTML\s*=",
                    "Direct innerHTML assignment - XSS risk",
                    Severity::High,
                ),
                (
                    r"document\.write",
                    "Use of document.write() - XSS risk",
                    Severity::Medium,
                ),
            ]),
        );
        Self { tables }
    }
}

#[async_trait]
impl Capability for SecurityScan {
    async fn invoke(&self, args: &serde_json::Value) -> Result<serde_json::Value, String> {
        let params: SecurityParams = parse_args("analyze_security_patterns", args)?;

        let mut security_issues = Vec::new();
        if let Some(patterns) = self.tables.get(params.language.to_lowercase().as_str()) {
            for pattern in patterns {
                for found in pattern.regex.find_iter(&params.code) {
                    let line = params.code[..found.start()].matches('\n').count() as u32 + 1;
                    security_issues.push(Issue {
                        severity: pattern.severity,
                        category: Category::Security,
                        message: pattern.message.to_string(),
                        file: None,
                        line: Some(line),
                        suggestion: None,
                    });
                }
            }
        }

        let count = security_issues.len();
        to_payload(&SecurityReport {
            security_issues,
            count,
        })
    }
}

// --- check_code_style ---

#[derive(Deserialize)]
struct StyleParams {
    code: String,
    #[allow(dead_code)]
    language: String,
    #[allow(dead_code)]
    filename: Option<String>,
}

/// Payload of `check_code_style`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleReport {
    /// Style findings, each carrying its 1-based line number.
    pub style_issues: Vec<Issue>,
    /// Count of findings.
    pub count: usize,
}

const MAX_LINE_LENGTH: usize = 120;

struct CheckCodeStyle;

#[async_trait]
impl Capability for CheckCodeStyle {
    async fn invoke(&self, args: &serde_json::Value) -> Result<serde_json::Value, String> {
        let params: StyleParams = parse_args("check_code_style", args)?;

        let mut style_issues = Vec::new();
        for (index, line) in params.code.lines().enumerate() {
            let number = index as u32 + 1;

            if line.chars().count() > MAX_LINE_LENGTH {
                style_issues.push(Issue {
                    severity: Severity::Low,
                    category: Category::Style,
                    message: format!("Line {number} exceeds {MAX_LINE_LENGTH} characters"),
                    file: None,
                    line: Some(number),
                    suggestion: None,
                });
            }

            if line != line.trim_end() {
                style_issues.push(Issue {
                    severity: Severity::Low,
                    category: Category::Style,
                    message: format!("Line {number} has trailing whitespace"),
                    file: None,
                    line: Some(number),
                    suggestion: None,
                });
            }
        }

        let count = style_issues.len();
        to_payload(&StyleReport {
            style_issues,
            count,
        })
    }
}

// --- get_file_content ---

#[derive(Deserialize)]
struct FileContentParams {
    filename: String,
    repo_name: String,
}

/// Payload of `get_file_content`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileContentReport {
    /// Fetched path.
    pub filename: String,
    /// File contents.
    pub content: String,
    /// Size in bytes.
    pub size: usize,
}

struct GetFileContent {
    fetcher: Option<Arc<dyn FileFetcher>>,
}

#[async_trait]
impl Capability for GetFileContent {
    async fn invoke(&self, args: &serde_json::Value) -> Result<serde_json::Value, String> {
        let params: FileContentParams = parse_args("get_file_content", args)?;
        let Some(fetcher) = &self.fetcher else {
            return Err("forge service not available".into());
        };
        let content = fetcher
            .fetch(&params.repo_name, &params.filename)
            .await
            .map_err(|e| format!("could not fetch file: {e}"))?;
        let size = content.len();
        to_payload(&FileContentReport {
            filename: params.filename,
            content,
            size,
        })
    }
}

// --- get_related_files ---

#[derive(Deserialize)]
struct RelatedFilesParams {
    #[allow(dead_code)]
    filename: String,
    #[allow(dead_code)]
    repo_name: String,
}

/// Payload of `get_related_files`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedFilesReport {
    /// Related file paths.
    pub related_files: Vec<String>,
    /// Count of related files.
    pub count: usize,
}

struct GetRelatedFiles;

#[async_trait]
impl Capability for GetRelatedFiles {
    async fn invoke(&self, args: &serde_json::Value) -> Result<serde_json::Value, String> {
        let _params: RelatedFilesParams = parse_args("get_related_files", args)?;
        // TODO: wire this to import-graph analysis once a graph collaborator
        // exists; until then related files are not tracked.
        to_payload(&RelatedFilesReport {
            related_files: Vec::new(),
            count: 0,
        })
    }
}

// --- search_codebase ---

#[derive(Deserialize)]
struct SearchParams {
    query: String,
    repo_name: String,
}

/// Payload of `search_codebase`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchReport {
    /// The query that ran.
    pub query: String,
    /// Matching snippets.
    pub results: Vec<String>,
    /// Count of matches.
    pub count: usize,
}

struct SearchCodebase {
    searcher: Option<Arc<dyn CodeSearcher>>,
}

#[async_trait]
impl Capability for SearchCodebase {
    async fn invoke(&self, args: &serde_json::Value) -> Result<serde_json::Value, String> {
        let params: SearchParams = parse_args("search_codebase", args)?;
        let Some(searcher) = &self.searcher else {
            return Err("search service not available".into());
        };
        let results = searcher
            .search(&params.repo_name, &params.query)
            .await
            .map_err(|e| format!("search failed: {e}"))?;
        let count = results.len();
        to_payload(&SearchReport {
            query: params.query,
            results,
            count,
        })
    }
}

// --- get_past_reviews ---

#[derive(Deserialize)]
struct PastReviewsParams {
    code: String,
    language: String,
}

/// Payload of `get_past_reviews`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PastReviewsReport {
    /// Relevant past-review snippets.
    pub context: Vec<String>,
    /// Whether anything relevant was found.
    pub found: bool,
}

struct GetPastReviews {
    retriever: Option<Arc<dyn ContextRetriever>>,
}

#[async_trait]
impl Capability for GetPastReviews {
    async fn invoke(&self, args: &serde_json::Value) -> Result<serde_json::Value, String> {
        let params: PastReviewsParams = parse_args("get_past_reviews", args)?;
        let Some(retriever) = &self.retriever else {
            return Err("knowledge base not available".into());
        };
        let context = retriever
            .relevant_context(&params.code, &params.language, 3)
            .await
            .map_err(|e| format!("could not retrieve past reviews: {e}"))?;
        let found = !context.is_empty();
        to_payload(&PastReviewsReport { context, found })
    }
}

// --- prioritize_issues ---

#[derive(Deserialize)]
struct PrioritizeParams {
    issues: Vec<serde_json::Value>,
}

/// Severity buckets produced by `prioritize_issues`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorityBuckets {
    /// High-severity issues.
    pub high: Vec<serde_json::Value>,
    /// Medium-severity issues.
    pub medium: Vec<serde_json::Value>,
    /// Low-severity issues, including anything with an unknown severity.
    pub low: Vec<serde_json::Value>,
}

/// Bucket counts produced by `prioritize_issues`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrioritySummary {
    /// Total issues partitioned.
    pub total: usize,
    /// Count in the high bucket.
    pub high_count: usize,
    /// Count in the medium bucket.
    pub medium_count: usize,
    /// Count in the low bucket.
    pub low_count: usize,
}

/// Payload of `prioritize_issues`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrioritizedReport {
    /// The partitioned buckets.
    pub prioritized: PriorityBuckets,
    /// Count summary.
    pub summary: PrioritySummary,
}

struct PrioritizeIssues;

#[async_trait]
impl Capability for PrioritizeIssues {
    async fn invoke(&self, args: &serde_json::Value) -> Result<serde_json::Value, String> {
        let params: PrioritizeParams = parse_args("prioritize_issues", args)?;

        let mut buckets = PriorityBuckets {
            high: Vec::new(),
            medium: Vec::new(),
            low: Vec::new(),
        };
        let total = params.issues.len();

        for issue in params.issues {
            let severity = issue
                .get("severity")
                .and_then(|s| s.as_str())
                .map(Severity::from_str_lossy)
                .unwrap_or(Severity::Low);
            match severity {
                Severity::High => buckets.high.push(issue),
                Severity::Medium => buckets.medium.push(issue),
                Severity::Low => buckets.low.push(issue),
            }
        }

        let summary = PrioritySummary {
            total,
            high_count: buckets.high.len(),
            medium_count: buckets.medium.len(),
            low_count: buckets.low.len(),
        };
        to_payload(&PrioritizedReport {
            prioritized: buckets,
            summary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ToolOutcome;

    fn registry() -> ToolRegistry {
        builtin_registry(Collaborators::default())
    }

    #[test]
    fn all_builtin_tools_are_registered() {
        let registry = registry();
        for name in [
            "analyze_code_file",
            "get_file_content",
            "check_dependencies",
            "analyze_security_patterns",
            "check_code_style",
            "get_related_files",
            "search_codebase",
            "get_past_reviews",
            "prioritize_issues",
        ] {
            assert!(registry.contains(name), "missing tool {name}");
        }
    }

    #[test]
    fn schemas_declare_required_fields() {
        let registry = registry();
        for schema in registry.tool_schemas() {
            let function = &schema["function"];
            assert!(function["name"].is_string());
            assert_eq!(function["parameters"]["type"], "object");
            assert!(function["parameters"]["required"].is_array());
        }
    }

    #[tokio::test]
    async fn analyze_without_collaborator_reports_unavailable() {
        let registry = registry();
        let outcome = registry
            .execute_tool(
                "analyze_code_file",
                &serde_json::json!({"filename": "a.py", "code": "x = 1", "language": "python"}),
            )
            .await;
        assert_eq!(
            outcome,
            ToolOutcome::Err("analysis service not available".into())
        );
    }

    #[tokio::test]
    async fn dependency_check_flags_unpinned_and_vulnerable() {
        let registry = registry();
        let manifest = "# comment\nflask<1.0\npandas==2.2.0\nnumpy\n";
        let outcome = registry
            .execute_tool(
                "check_dependencies",
                &serde_json::json!({"package_file": manifest, "file_type": "requirements"}),
            )
            .await;
        let payload = outcome.payload().unwrap().clone();
        let report: DependencyReport = serde_json::from_value(payload).unwrap();

        assert_eq!(report.dependencies_count, 3);
        // flask<1.0 is both unpinned and vulnerable; numpy is unpinned.
        let highs: Vec<_> = report
            .issues
            .iter()
            .filter(|i| i.severity == Severity::High)
            .collect();
        let mediums: Vec<_> = report
            .issues
            .iter()
            .filter(|i| i.severity == Severity::Medium)
            .collect();
        assert_eq!(highs.len(), 1);
        assert!(highs[0].message.contains("flask<1.0"));
        assert_eq!(mediums.len(), 2);
        assert!(mediums.iter().any(|i| i.message.contains("numpy")));
    }

    #[tokio::test]
    async fn dependency_check_ignores_non_requirements_manifests() {
        let registry = registry();
        let outcome = registry
            .execute_tool(
                "check_dependencies",
                &serde_json::json!({"package_file": "left-pad\n", "file_type": "package.json"}),
            )
            .await;
        let report: DependencyReport =
            serde_json::from_value(outcome.payload().unwrap().clone()).unwrap();
        assert!(report.issues.is_empty());
        assert_eq!(report.dependencies_count, 1);
    }

    #[tokio::test]
    async fn security_scan_reports_one_based_lines() {
        let registry = registry();
        let code = "import os\nvalue = eval(user_input)\nos.system(cmd)\n";
        let outcome = registry
            .execute_tool(
                "analyze_security_patterns",
                &serde_json::json!({"code": code, "language": "python"}),
            )
            .await;
        let report: SecurityReport =
            serde_json::from_value(outcome.payload().unwrap().clone()).unwrap();

        assert_eq!(report.count, 2);
        let eval = report
            .security_issues
            .iter()
            .find(|i| i.message.contains("eval"))
            .unwrap();
        assert_eq!(eval.line, Some(2));
        assert_eq!(eval.severity, Severity::High);
        let system = report
            .security_issues
            .iter()
            .find(|i| i.message.contains("os.system"))
            .unwrap();
        assert_eq!(system.line, Some(3));
    }

    #[tokio::test]
    async fn security_scan_is_case_insensitive_and_language_scoped() {
        let registry = registry();
        let outcome = registry
            .execute_tool(
                "analyze_security_patterns",
                &serde_json::json!({"code": "EVAL (x)", "language": "JavaScript"}),
            )
            .await;
        let report: SecurityReport =
            serde_json::from_value(outcome.payload().unwrap().clone()).unwrap();
        assert_eq!(report.count, 1);
        assert!(report.security_issues[0].message.contains("XSS"));

        let outcome = registry
            .execute_tool(
                "analyze_security_patterns",
                &serde_json::json!({"code": "eval(x)", "language": "rust"}),
            )
            .await;
        let report: SecurityReport =
            serde_json::from_value(outcome.payload().unwrap().clone()).unwrap();
        assert_eq!(report.count, 0);
    }

    #[tokio::test]
    async fn style_check_flags_long_lines_and_trailing_whitespace() {
        let registry = registry();
        let long = "x".repeat(121);
        let code = format!("short\n{long}\ntrailing \n");
        let outcome = registry
            .execute_tool(
                "check_code_style",
                &serde_json::json!({"code": code, "language": "python"}),
            )
            .await;
        let report: StyleReport =
            serde_json::from_value(outcome.payload().unwrap().clone()).unwrap();

        assert_eq!(report.count, 2);
        assert_eq!(report.style_issues[0].line, Some(2));
        assert!(report.style_issues[0].message.contains("exceeds 120"));
        assert_eq!(report.style_issues[1].line, Some(3));
        assert!(report.style_issues[1].message.contains("trailing whitespace"));
        assert!(report
            .style_issues
            .iter()
            .all(|i| i.severity == Severity::Low));
    }

    #[tokio::test]
    async fn prioritize_partitions_case_insensitively() {
        let registry = registry();
        let issues = serde_json::json!([
            {"severity": "HIGH", "message": "a"},
            {"severity": "medium", "message": "b"},
            {"severity": "Low", "message": "c"},
            {"severity": "bizarre", "message": "d"},
            {"message": "no severity"},
        ]);
        let outcome = registry
            .execute_tool("prioritize_issues", &serde_json::json!({"issues": issues}))
            .await;
        let report: PrioritizedReport =
            serde_json::from_value(outcome.payload().unwrap().clone()).unwrap();

        assert_eq!(report.summary.total, 5);
        assert_eq!(report.summary.high_count, 1);
        assert_eq!(report.summary.medium_count, 1);
        // Unknown severities land in the lowest bucket
        assert_eq!(report.summary.low_count, 3);
    }

    #[tokio::test]
    async fn related_files_is_empty_for_now() {
        let registry = registry();
        let outcome = registry
            .execute_tool(
                "get_related_files",
                &serde_json::json!({"filename": "a.py", "repo_name": "o/r"}),
            )
            .await;
        let report: RelatedFilesReport =
            serde_json::from_value(outcome.payload().unwrap().clone()).unwrap();
        assert_eq!(report.count, 0);
    }

    #[tokio::test]
    async fn delegating_tools_report_missing_collaborators() {
        let registry = registry();
        let cases = [
            (
                "get_file_content",
                serde_json::json!({"filename": "a.py", "repo_name": "o/r"}),
            ),
            (
                "search_codebase",
                serde_json::json!({"query": "auth", "repo_name": "o/r"}),
            ),
            (
                "get_past_reviews",
                serde_json::json!({"code": "x", "language": "python"}),
            ),
        ];
        for (name, args) in cases {
            let outcome = registry.execute_tool(name, &args).await;
            match outcome {
                ToolOutcome::Err(message) => {
                    assert!(message.contains("not available"), "{name}: {message}")
                }
                ToolOutcome::Ok(_) => panic!("{name} should fail without a collaborator"),
            }
        }
    }

    #[tokio::test]
    async fn bad_arguments_become_error_outcomes() {
        let registry = registry();
        let outcome = registry
            .execute_tool("check_code_style", &serde_json::json!({"code": 42}))
            .await;
        match outcome {
            ToolOutcome::Err(message) => assert!(message.contains("invalid arguments")),
            ToolOutcome::Ok(_) => panic!("expected argument error"),
        }
    }

    #[tokio::test]
    async fn wired_analyzer_is_invoked() {
        struct StubAnalyzer;

        #[async_trait]
        impl FileAnalyzer for StubAnalyzer {
            async fn analyze(
                &self,
                filename: &str,
                _code: &str,
                _language: &str,
            ) -> Result<FileAnalysis, CorvusError> {
                Ok(FileAnalysis {
                    issues: vec![Issue {
                        severity: Severity::Medium,
                        category: Category::Quality,
                        message: format!("issue in {filename}"),
                        file: None,
                        line: None,
                        suggestion: None,
                    }],
                    suggestions: vec!["add tests".into()],
                    file_issues: Vec::new(),
                })
            }
        }

        let registry = builtin_registry(Collaborators {
            analyzer: Some(Arc::new(StubAnalyzer)),
            ..Collaborators::default()
        });
        let outcome = registry
            .execute_tool(
                "analyze_code_file",
                &serde_json::json!({"filename": "a.py", "code": "x", "language": "python"}),
            )
            .await;
        let report: AnalyzeFileReport =
            serde_json::from_value(outcome.payload().unwrap().clone()).unwrap();
        assert_eq!(report.filename, "a.py");
        assert_eq!(report.issues_count, 1);
        assert_eq!(report.suggestions_count, 1);
        assert!(report.analysis.issues[0].message.contains("a.py"));
    }
}
