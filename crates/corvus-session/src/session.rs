use chrono::{DateTime, Utc};
use corvus_core::{CorvusError, Issue, ReviewPhase};
use serde::{Deserialize, Serialize};

/// A single step in the agent's reasoning chain.
///
/// Steps are append-only: once recorded they are never mutated. The optional
/// tool triple is present only for steps that executed a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    /// 1-based sequence number, strictly increasing with no gaps.
    pub step_number: u32,
    /// The agent's free-text thought for this step.
    pub thought: String,
    /// Name of the tool executed, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    /// Arguments the tool was called with.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_arguments: Option<serde_json::Value>,
    /// Serialized tool outcome envelope.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_result: Option<serde_json::Value>,
    /// When the step was recorded.
    pub timestamp: DateTime<Utc>,
}

/// State of one in-flight (or finalized) review.
///
/// # Examples
///
/// ```
/// use corvus_session::SessionManager;
///
/// let mut sessions = SessionManager::new();
/// sessions.initialize_review(42, "octocat/hello-world");
/// sessions.add_step("Planning the review").unwrap();
/// let frozen = sessions.finalize_review().unwrap();
/// assert_eq!(frozen.pr_number, 42);
/// assert!(sessions.current().is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSession {
    /// Pull request number under review.
    pub pr_number: u64,
    /// Repository in `owner/name` form.
    pub repository: String,
    /// Advisory progress phase.
    pub phase: ReviewPhase,
    /// Ordered reasoning steps.
    pub steps: Vec<Step>,
    /// Files marked analyzed, in first-analysis order.
    pub files_analyzed: Vec<String>,
    /// Findings recorded so far. Not deduplicated at this layer; the diff
    /// mapper dedups at comment-assembly time.
    pub issues: Vec<Issue>,
    /// Decisions the agent recorded.
    pub decisions: Vec<String>,
    /// Session start time.
    pub started_at: DateTime<Utc>,
    /// Session end time; set by finalize.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
}

/// Computed summary view of the active session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    /// Pull request number.
    pub pr_number: u64,
    /// Repository in `owner/name` form.
    pub repository: String,
    /// Current phase.
    pub phase: ReviewPhase,
    /// Count of files analyzed.
    pub files_analyzed: usize,
    /// Count of findings recorded.
    pub issues_found: usize,
    /// Count of decisions recorded.
    pub decisions_made: usize,
    /// Count of reasoning steps taken.
    pub steps_taken: usize,
    /// Elapsed seconds: `now - start` while open, `end - start` once closed.
    pub duration_seconds: f64,
}

/// Tracks one mutable review session plus an immutable history of finalized
/// ones.
///
/// Exactly one session is mutable at a time. Every mutator fails with
/// [`CorvusError::Session`] when no session is active — that is a
/// precondition violation, not a recoverable condition.
#[derive(Debug, Default)]
pub struct SessionManager {
    current: Option<ReviewSession>,
    history: Vec<ReviewSession>,
}

impl SessionManager {
    /// Create an empty manager with no active session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a fresh session in the Planning phase.
    ///
    /// An unfinalized prior session is discarded, not merged: callers that
    /// want the old session preserved must finalize it first.
    pub fn initialize_review(&mut self, pr_number: u64, repository: &str) -> &ReviewSession {
        self.current.insert(ReviewSession {
            pr_number,
            repository: repository.to_string(),
            phase: ReviewPhase::Planning,
            steps: Vec::new(),
            files_analyzed: Vec::new(),
            issues: Vec::new(),
            decisions: Vec::new(),
            started_at: Utc::now(),
            ended_at: None,
        })
    }

    /// Append a thought-only step. Returns its sequence number.
    ///
    /// # Errors
    ///
    /// [`CorvusError::Session`] if no session is active.
    pub fn add_step(&mut self, thought: impl Into<String>) -> Result<u32, CorvusError> {
        self.push_step(thought.into(), None, None, None)
    }

    /// Append a step that records a tool execution.
    ///
    /// # Errors
    ///
    /// [`CorvusError::Session`] if no session is active.
    pub fn add_tool_step(
        &mut self,
        thought: impl Into<String>,
        tool_name: &str,
        tool_arguments: serde_json::Value,
        tool_result: serde_json::Value,
    ) -> Result<u32, CorvusError> {
        self.push_step(
            thought.into(),
            Some(tool_name.to_string()),
            Some(tool_arguments),
            Some(tool_result),
        )
    }

    fn push_step(
        &mut self,
        thought: String,
        tool_name: Option<String>,
        tool_arguments: Option<serde_json::Value>,
        tool_result: Option<serde_json::Value>,
    ) -> Result<u32, CorvusError> {
        let session = self
            .current
            .as_mut()
            .ok_or_else(CorvusError::no_active_session)?;
        let step_number = session.steps.len() as u32 + 1;
        session.steps.push(Step {
            step_number,
            thought,
            tool_name,
            tool_arguments,
            tool_result,
            timestamp: Utc::now(),
        });
        Ok(step_number)
    }

    /// Record a decision. Decisions are steps too: a `Decision: <text>` step
    /// is appended alongside the decision entry.
    ///
    /// # Errors
    ///
    /// [`CorvusError::Session`] if no session is active.
    pub fn add_decision(&mut self, decision: &str) -> Result<(), CorvusError> {
        let session = self
            .current
            .as_mut()
            .ok_or_else(CorvusError::no_active_session)?;
        session.decisions.push(decision.to_string());
        self.add_step(format!("Decision: {decision}"))?;
        Ok(())
    }

    /// Mark a file as analyzed. Idempotent.
    ///
    /// # Errors
    ///
    /// [`CorvusError::Session`] if no session is active.
    pub fn mark_file_analyzed(&mut self, filename: &str) -> Result<(), CorvusError> {
        let session = self
            .current
            .as_mut()
            .ok_or_else(CorvusError::no_active_session)?;
        if !session.files_analyzed.iter().any(|f| f == filename) {
            session.files_analyzed.push(filename.to_string());
        }
        Ok(())
    }

    /// Record a finding. No deduplication happens at this layer.
    ///
    /// # Errors
    ///
    /// [`CorvusError::Session`] if no session is active.
    pub fn add_issue(&mut self, issue: Issue) -> Result<(), CorvusError> {
        let session = self
            .current
            .as_mut()
            .ok_or_else(CorvusError::no_active_session)?;
        session.issues.push(issue);
        Ok(())
    }

    /// Set the advisory phase and append a transition step.
    ///
    /// Phases are not a guarded state machine: any transition is accepted.
    ///
    /// # Errors
    ///
    /// [`CorvusError::Session`] if no session is active.
    pub fn update_phase(&mut self, phase: ReviewPhase) -> Result<(), CorvusError> {
        let session = self
            .current
            .as_mut()
            .ok_or_else(CorvusError::no_active_session)?;
        session.phase = phase;
        self.add_step(format!("Phase transition: {phase}"))?;
        Ok(())
    }

    /// Freeze the active session: stamp the end time, set the Completed
    /// phase, move it to history, and return it.
    ///
    /// # Errors
    ///
    /// [`CorvusError::Session`] if no session is active.
    pub fn finalize_review(&mut self) -> Result<ReviewSession, CorvusError> {
        let mut session = self
            .current
            .take()
            .ok_or_else(CorvusError::no_active_session)?;
        session.ended_at = Some(Utc::now());
        session.phase = ReviewPhase::Completed;
        self.history.push(session.clone());
        Ok(session)
    }

    /// Computed summary of the active session.
    ///
    /// # Errors
    ///
    /// [`CorvusError::Session`] if no session is active.
    pub fn get_review_summary(&self) -> Result<SessionSummary, CorvusError> {
        let session = self
            .current
            .as_ref()
            .ok_or_else(CorvusError::no_active_session)?;
        let end = session.ended_at.unwrap_or_else(Utc::now);
        let duration = (end - session.started_at).num_milliseconds() as f64 / 1000.0;
        Ok(SessionSummary {
            pr_number: session.pr_number,
            repository: session.repository.clone(),
            phase: session.phase,
            files_analyzed: session.files_analyzed.len(),
            issues_found: session.issues.len(),
            decisions_made: session.decisions.len(),
            steps_taken: session.steps.len(),
            duration_seconds: duration,
        })
    }

    /// The active session, if any.
    pub fn current(&self) -> Option<&ReviewSession> {
        self.current.as_ref()
    }

    /// Finalized sessions, oldest first.
    pub fn history(&self) -> &[ReviewSession] {
        &self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corvus_core::{Category, Severity};

    fn sample_issue() -> Issue {
        Issue {
            severity: Severity::High,
            category: Category::Security,
            message: "Use of eval() - security risk".into(),
            file: Some("app.py".into()),
            line: Some(3),
            suggestion: None,
        }
    }

    #[test]
    fn initialize_starts_in_planning() {
        let mut sessions = SessionManager::new();
        let session = sessions.initialize_review(7, "octo/repo");
        assert_eq!(session.phase, ReviewPhase::Planning);
        assert_eq!(session.pr_number, 7);
        assert!(session.steps.is_empty());
        assert!(session.ended_at.is_none());
    }

    #[test]
    fn step_numbers_are_sequential_from_one() {
        let mut sessions = SessionManager::new();
        sessions.initialize_review(1, "octo/repo");
        for i in 1..=5u32 {
            let n = sessions.add_step(format!("thought {i}")).unwrap();
            assert_eq!(n, i);
        }
        let steps = &sessions.current().unwrap().steps;
        assert_eq!(steps.len(), 5);
        assert_eq!(steps[4].step_number, 5);
        assert_eq!(steps[0].thought, "thought 1");
    }

    #[test]
    fn mutators_fail_without_active_session() {
        let mut sessions = SessionManager::new();
        assert!(matches!(
            sessions.add_step("x"),
            Err(CorvusError::Session(_))
        ));
        assert!(matches!(
            sessions.add_decision("x"),
            Err(CorvusError::Session(_))
        ));
        assert!(matches!(
            sessions.mark_file_analyzed("a.py"),
            Err(CorvusError::Session(_))
        ));
        assert!(matches!(
            sessions.add_issue(sample_issue()),
            Err(CorvusError::Session(_))
        ));
        assert!(matches!(
            sessions.update_phase(ReviewPhase::Analyzing),
            Err(CorvusError::Session(_))
        ));
        assert!(matches!(
            sessions.finalize_review(),
            Err(CorvusError::Session(_))
        ));
        assert!(matches!(
            sessions.get_review_summary(),
            Err(CorvusError::Session(_))
        ));
    }

    #[test]
    fn decision_appends_a_step() {
        let mut sessions = SessionManager::new();
        sessions.initialize_review(1, "octo/repo");
        sessions.add_decision("focus on auth.py first").unwrap();
        let session = sessions.current().unwrap();
        assert_eq!(session.decisions, vec!["focus on auth.py first"]);
        assert_eq!(session.steps.len(), 1);
        assert_eq!(session.steps[0].thought, "Decision: focus on auth.py first");
    }

    #[test]
    fn mark_file_analyzed_is_idempotent() {
        let mut sessions = SessionManager::new();
        sessions.initialize_review(1, "octo/repo");
        sessions.mark_file_analyzed("a.py").unwrap();
        sessions.mark_file_analyzed("b.py").unwrap();
        sessions.mark_file_analyzed("a.py").unwrap();
        assert_eq!(sessions.current().unwrap().files_analyzed, vec!["a.py", "b.py"]);
    }

    #[test]
    fn update_phase_records_transition_step() {
        let mut sessions = SessionManager::new();
        sessions.initialize_review(1, "octo/repo");
        sessions.update_phase(ReviewPhase::Analyzing).unwrap();
        let session = sessions.current().unwrap();
        assert_eq!(session.phase, ReviewPhase::Analyzing);
        assert_eq!(session.steps[0].thought, "Phase transition: analyzing");
    }

    #[test]
    fn finalize_moves_session_to_history() {
        let mut sessions = SessionManager::new();
        sessions.initialize_review(1, "octo/repo");
        sessions.add_issue(sample_issue()).unwrap();
        let frozen = sessions.finalize_review().unwrap();
        assert_eq!(frozen.phase, ReviewPhase::Completed);
        assert!(frozen.ended_at.is_some());
        assert_eq!(frozen.issues.len(), 1);
        assert!(sessions.current().is_none());
        assert_eq!(sessions.history().len(), 1);
    }

    #[test]
    fn initialize_discards_unfinalized_session() {
        let mut sessions = SessionManager::new();
        sessions.initialize_review(1, "octo/repo");
        sessions.add_step("work in progress").unwrap();
        sessions.initialize_review(2, "octo/repo");
        let session = sessions.current().unwrap();
        assert_eq!(session.pr_number, 2);
        assert!(session.steps.is_empty());
        // The discarded session did not reach history
        assert!(sessions.history().is_empty());
    }

    #[test]
    fn tool_step_carries_the_triple() {
        let mut sessions = SessionManager::new();
        sessions.initialize_review(1, "octo/repo");
        sessions
            .add_tool_step(
                "Using tool: check_code_style",
                "check_code_style",
                serde_json::json!({"code": "x", "language": "python"}),
                serde_json::json!({"success": true}),
            )
            .unwrap();
        let step = &sessions.current().unwrap().steps[0];
        assert_eq!(step.tool_name.as_deref(), Some("check_code_style"));
        assert!(step.tool_arguments.is_some());
        assert!(step.tool_result.is_some());
    }

    #[test]
    fn summary_counts_and_duration() {
        let mut sessions = SessionManager::new();
        sessions.initialize_review(9, "octo/repo");
        sessions.add_step("a").unwrap();
        sessions.add_decision("b").unwrap();
        sessions.mark_file_analyzed("f.py").unwrap();
        sessions.add_issue(sample_issue()).unwrap();
        let summary = sessions.get_review_summary().unwrap();
        assert_eq!(summary.pr_number, 9);
        assert_eq!(summary.steps_taken, 2);
        assert_eq!(summary.decisions_made, 1);
        assert_eq!(summary.files_analyzed, 1);
        assert_eq!(summary.issues_found, 1);
        assert!(summary.duration_seconds >= 0.0);
    }

    #[test]
    fn steps_serialize_camel_case() {
        let mut sessions = SessionManager::new();
        sessions.initialize_review(1, "octo/repo");
        sessions.add_step("hello").unwrap();
        let json = serde_json::to_value(sessions.current().unwrap()).unwrap();
        assert!(json["steps"][0].get("stepNumber").is_some());
        assert!(json.get("prNumber").is_some());
        assert!(json.get("startedAt").is_some());
    }
}
