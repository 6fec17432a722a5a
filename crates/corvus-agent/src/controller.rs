use corvus_core::{AgentConfig, CorvusError, ReviewPhase};
use corvus_session::SessionManager;
use corvus_tools::{AnalyzeFileReport, DependencyReport, SecurityReport, ToolOutcome, ToolRegistry};
use serde::{Deserialize, Serialize};

use crate::engine::{ChatMessage, ReasoningEngine, SummaryContext, ToolCall};
use crate::prompt;
use crate::report::{compute_score, ReviewResult};

/// One changed file in the pull request under review.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangedFile {
    /// Path of the file in the new version.
    pub filename: String,
    /// Change status reported by the forge (`added`, `modified`, ...).
    pub status: String,
    /// Lines added.
    pub additions: u32,
    /// Lines deleted.
    pub deletions: u32,
    /// Per-file unified-diff patch, absent for binary or oversized files.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch: Option<String>,
    /// Detected programming language.
    pub language: String,
}

/// Everything the agent needs to review one pull request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequest {
    /// Pull request number.
    pub pr_number: u64,
    /// Repository in `owner/name` form.
    pub repository: String,
    /// Pull request title.
    pub title: String,
    /// Pull request description.
    pub description: String,
    /// Changed files with their patches.
    pub files: Vec<ChangedFile>,
}

/// Completion keywords accepted from the engine's thought, matched as
/// case-insensitive substrings.
const COMPLETION_KEYWORDS: &[&str] = &["finalize", "complete", "done", "finished", "summary"];

/// The review orchestrator: drives the reasoning engine against the tool
/// registry, records everything into the session log, and freezes the
/// accumulated result at finalization.
///
/// One agent runs one session to completion before another may start; the
/// session manager it owns is never shared.
pub struct Agent<E: ReasoningEngine> {
    engine: E,
    registry: ToolRegistry,
    sessions: SessionManager,
    config: AgentConfig,
}

impl<E: ReasoningEngine> Agent<E> {
    /// Assemble an agent from its engine, tool registry, and configuration.
    pub fn new(engine: E, registry: ToolRegistry, config: AgentConfig) -> Self {
        Self {
            engine,
            registry,
            sessions: SessionManager::new(),
            config,
        }
    }

    /// The session log, including finalized history.
    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// The engine this agent drives.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Review one pull request to completion.
    ///
    /// The loop is bounded by `max_iterations`; engine failures are retried
    /// once without tool binding and then counted toward the failure cap.
    /// Partial results are never discarded — whatever accumulated before an
    /// abort still reaches finalization.
    ///
    /// # Errors
    ///
    /// Only session-precondition violations propagate; engine and tool
    /// failures are absorbed into the loop's failure accounting.
    pub async fn review_pr(&mut self, request: &ReviewRequest) -> Result<ReviewResult, CorvusError> {
        self.sessions
            .initialize_review(request.pr_number, &request.repository);
        self.sessions.update_phase(ReviewPhase::Planning)?;

        let tool_schemas = self.registry.tool_schemas();
        let mut transcript = vec![
            ChatMessage::system(prompt::build_system_prompt()),
            ChatMessage::user(prompt::build_initial_context(request)),
        ];

        let mut result = ReviewResult::new(request.pr_number, &request.repository);
        let mut failures = 0u32;
        let mut iteration = 0u32;

        while iteration < self.config.max_iterations {
            iteration += 1;

            let reply = match self.engine.complete(&transcript, &tool_schemas).await {
                Ok(reply) => reply,
                // One reduced retry without tool binding before the
                // iteration counts as failed.
                Err(first_error) => match self.engine.complete(&transcript, &[]).await {
                    Ok(reply) => reply,
                    Err(_) => {
                        self.sessions
                            .add_step(format!("Error in iteration {iteration}: {first_error}"))?;
                        failures += 1;
                        if failures >= self.config.max_failures {
                            break;
                        }
                        continue;
                    }
                },
            };

            let thought = if reply.thought.is_empty() {
                "Analyzing...".to_string()
            } else {
                reply.thought.clone()
            };
            transcript.push(ChatMessage::assistant(thought.clone()));
            self.sessions.add_step(thought.clone())?;

            if reply.tool_calls.is_empty() {
                if self.should_finalize(&thought, &result) {
                    self.sessions.update_phase(ReviewPhase::Finalizing)?;
                    break;
                }
            } else {
                // Strictly sequential, in request order: side-effect order
                // (files marked, issues appended) is the order the engine
                // asked for, even for independent tools.
                for call in &reply.tool_calls {
                    self.execute_call(call, &mut result, &mut transcript).await?;
                }
            }

            self.advance_phase(iteration)?;
        }

        self.finalize(request, result).await
    }

    async fn execute_call(
        &mut self,
        call: &ToolCall,
        result: &mut ReviewResult,
        transcript: &mut Vec<ChatMessage>,
    ) -> Result<(), CorvusError> {
        let outcome = self.registry.execute_tool(&call.name, &call.arguments).await;
        let envelope = outcome.to_envelope();

        self.sessions.add_tool_step(
            format!("Using tool: {}", call.name),
            &call.name,
            call.arguments.clone(),
            envelope.clone(),
        )?;
        result.record_tool(&call.name);
        transcript.push(ChatMessage::tool(&call.name, envelope.to_string()));

        self.fold_outcome(&call.name, &outcome, result)
    }

    /// Fold a successful tool payload into the running result and session.
    /// Failed outcomes contribute nothing beyond their transcript record.
    fn fold_outcome(
        &mut self,
        tool_name: &str,
        outcome: &ToolOutcome,
        result: &mut ReviewResult,
    ) -> Result<(), CorvusError> {
        let Some(payload) = outcome.payload() else {
            return Ok(());
        };

        match tool_name {
            "analyze_code_file" => {
                if let Ok(report) = serde_json::from_value::<AnalyzeFileReport>(payload.clone()) {
                    for issue in &report.analysis.issues {
                        self.sessions.add_issue(issue.clone())?;
                    }
                    for issue in &report.analysis.file_issues {
                        self.sessions.add_issue(issue.clone())?;
                    }
                    result.issues.extend(report.analysis.issues);
                    result.suggestions.extend(report.analysis.suggestions);
                    result.file_issues.extend(report.analysis.file_issues);
                    self.sessions.mark_file_analyzed(&report.filename)?;
                }
            }
            "analyze_security_patterns" => {
                if let Ok(report) = serde_json::from_value::<SecurityReport>(payload.clone()) {
                    for mut issue in report.security_issues {
                        if issue.suggestion.is_none() {
                            issue.suggestion = Some("Review and fix security vulnerability".into());
                        }
                        self.sessions.add_issue(issue.clone())?;
                        result.issues.push(issue);
                    }
                }
            }
            "check_dependencies" => {
                if let Ok(report) = serde_json::from_value::<DependencyReport>(payload.clone()) {
                    for mut issue in report.issues {
                        if issue.suggestion.is_none() {
                            issue.suggestion = Some("Review dependency".into());
                        }
                        self.sessions.add_issue(issue.clone())?;
                        result.issues.push(issue);
                    }
                }
            }
            // prioritize_issues reorders presentation only; the style and
            // lookup tools feed the engine, not the result.
            _ => {}
        }

        Ok(())
    }

    /// Iteration-count driven phase advance: Analyzing past 3 iterations,
    /// Reviewing past 6, regardless of tool activity.
    fn advance_phase(&mut self, iteration: u32) -> Result<(), CorvusError> {
        let phase = self.sessions.current().map(|s| s.phase);
        if iteration > 6 {
            if phase != Some(ReviewPhase::Reviewing) {
                self.sessions.update_phase(ReviewPhase::Reviewing)?;
            }
        } else if iteration > 3 && phase == Some(ReviewPhase::Planning) {
            self.sessions.update_phase(ReviewPhase::Analyzing)?;
        }
        Ok(())
    }

    /// Quality-gated termination: every minimum must hold before either
    /// completion signal (keyword, or enough accumulated findings on a quiet
    /// iteration) is honored.
    fn should_finalize(&self, thought: &str, result: &ReviewResult) -> bool {
        let steps_taken = self.sessions.current().map(|s| s.steps.len()).unwrap_or(0);

        if result.tools_used.len() < self.config.min_tools_used {
            return false;
        }
        if result.findings_count() < self.config.min_findings {
            return false;
        }
        if steps_taken < self.config.min_steps {
            return false;
        }

        let lowered = thought.to_lowercase();
        if COMPLETION_KEYWORDS.iter().any(|k| lowered.contains(k)) {
            return true;
        }
        result.findings_count() > self.config.auto_finalize_findings
    }

    async fn finalize(
        &mut self,
        request: &ReviewRequest,
        mut result: ReviewResult,
    ) -> Result<ReviewResult, CorvusError> {
        if self.sessions.current().map(|s| s.phase) != Some(ReviewPhase::Finalizing) {
            self.sessions.update_phase(ReviewPhase::Finalizing)?;
        }

        let context = SummaryContext {
            title: request.title.clone(),
            description: request.description.clone(),
            files_changed: request.files.len(),
            total_issues: result.issues.len(),
            total_suggestions: result.suggestions.len(),
        };
        result.summary = match self.engine.summarize(&context).await {
            Ok(summary) if !summary.trim().is_empty() => summary,
            // Summarizer failure is non-fatal.
            _ => format!("Review completed. Found {} issues.", result.issues.len()),
        };
        result.overall_score = compute_score(&result.issues);

        let frozen = self.sessions.finalize_review()?;
        result.reasoning = frozen.steps;
        result.decisions = frozen.decisions;
        result.files_analyzed = frozen.files_analyzed;

        Ok(result)
    }
}
