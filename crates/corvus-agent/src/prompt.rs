use crate::controller::ReviewRequest;
use crate::engine::SummaryContext;

const SYSTEM_PROMPT: &str = "\
You are an autonomous AI code review agent with access to specialized tools. \
Your goal is to thoroughly review pull requests by:

1. **Planning**: Analyze the PR and create a review plan
2. **Investigating**: Use available tools to gather information and analyze code
3. **Reasoning**: Think through findings and prioritize issues
4. **Iterating**: Refine your review based on what you discover
5. **Finalizing**: Compile a comprehensive review with actionable feedback

**Available Tools (USE THESE!):**
- analyze_code_file: Deep analysis of specific files for bugs, security, quality
- get_file_content: Get full file contents for context
- check_dependencies: Analyze package dependencies for security
- analyze_security_patterns: Security vulnerability scanning (SQL injection, XSS, etc.)
- check_code_style: Code style and best practices
- get_related_files: Find related files that might be affected
- search_codebase: Search for patterns or similar code
- get_past_reviews: Learn from past reviews
- prioritize_issues: Organize and prioritize findings

**Your Approach:**
1. Start by analyzing the 2-3 most critical changed files using analyze_code_file
2. For security-sensitive code, use analyze_security_patterns
3. If dependencies changed, use check_dependencies
4. Use get_past_reviews to maintain consistency with previous feedback
5. Prioritize findings with prioritize_issues before finalizing

**Decision Making:**
- ALWAYS use analyze_code_file for any file with significant changes
- ALWAYS use analyze_security_patterns for authentication, database, or API code
- ALWAYS use check_dependencies if package files are modified
- Use tools strategically but don't over-analyze trivial changes
- When you have analyzed the key files and found issues, say \"finalize\" to complete

Be thorough but efficient. Focus on high-impact issues.";

/// System prompt for the review agent.
///
/// # Examples
///
/// ```
/// use corvus_agent::prompt::build_system_prompt;
///
/// let prompt = build_system_prompt();
/// assert!(prompt.contains("analyze_code_file"));
/// ```
pub fn build_system_prompt() -> String {
    SYSTEM_PROMPT.to_string()
}

/// Initial user message describing the pull request under review.
///
/// The description is truncated at 500 characters and the per-file summary
/// capped at 10 files to keep the opening context bounded.
pub fn build_initial_context(request: &ReviewRequest) -> String {
    let mut parts = vec![
        format!("Pull Request #{}", request.pr_number),
        format!("Repository: {}", request.repository),
        format!("Title: {}", request.title),
        format!(
            "Description: {}",
            request.description.chars().take(500).collect::<String>()
        ),
        format!("\nFiles Changed: {}", request.files.len()),
    ];

    for file in request.files.iter().take(10) {
        parts.push(format!(
            "\n- {} ({}) [+{}/-{}] ({})",
            file.filename, file.status, file.additions, file.deletions, file.language
        ));
    }

    parts.push(
        "\n\nYour task: Review this PR thoroughly. Start by planning your approach, \
         then use tools to analyze the code. Focus on security, bugs, code quality, \
         and best practices. Provide specific, actionable feedback."
            .to_string(),
    );

    parts.join("\n")
}

/// Prompt for the per-file analysis delegate.
pub fn build_analysis_prompt(filename: &str, code: &str, language: &str) -> String {
    format!(
        "You are an expert code reviewer.\n\
         Analyze the following code changes and provide a detailed review.\n\n\
         Filename: {filename}\n\
         Language: {language}\n\n\
         Code Changes:\n```\n{code}\n```\n\n\
         Please analyze this code for:\n\
         1. **Bugs and Errors**: Identify potential bugs, logic errors, or runtime issues\n\
         2. **Security Vulnerabilities**: Check for security flaws, injection risks, or unsafe practices\n\
         3. **Code Quality**: Assess code readability, maintainability, and adherence to best practices\n\
         4. **Performance**: Identify potential performance bottlenecks or inefficiencies\n\
         5. **Style and Standards**: Check compliance with coding standards and conventions\n\n\
         Provide your response ONLY as a valid JSON object in this exact format \
         (NO markdown, NO code blocks, NO additional text):\n\
         {{\n\
         \x20   \"issues\": [\n\
         \x20       {{\n\
         \x20           \"severity\": \"high|medium|low\",\n\
         \x20           \"category\": \"bug|security|quality|performance|style\",\n\
         \x20           \"message\": \"Brief description of the issue\",\n\
         \x20           \"line\": line_number_if_applicable,\n\
         \x20           \"file\": \"{filename}\",\n\
         \x20           \"suggestion\": \"Specific recommendation to fix this issue\"\n\
         \x20       }}\n\
         \x20   ],\n\
         \x20   \"suggestions\": [\n\
         \x20       \"General improvement suggestions that don't fit specific issues\"\n\
         \x20   ]\n\
         }}\n\n\
         Requirements:\n\
         - Return ONLY the JSON object - no explanatory text before or after\n\
         - Include line numbers whenever possible\n\
         - For each issue, provide a concrete suggestion on how to fix it\n\
         - Prioritize critical security and bug issues as 'high' severity\n\
         - Keep messages concise but informative"
    )
}

/// Prompt for the review summarizer.
pub fn build_summary_prompt(context: &SummaryContext) -> String {
    format!(
        "Generate a concise summary for a pull request review.\n\n\
         PR Context:\n\
         - Title: {}\n\
         - Files Changed: {}\n\
         - Total Issues Found: {}\n\
         - Total Suggestions: {}\n\n\
         Provide a brief 2-3 sentence summary that:\n\
         1. Highlights the main findings\n\
         2. Mentions critical issues if any\n\
         3. Gives an overall assessment\n\n\
         Keep it professional and constructive.",
        context.title, context.files_changed, context.total_issues, context.total_suggestions
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::ChangedFile;

    fn request() -> ReviewRequest {
        ReviewRequest {
            pr_number: 42,
            repository: "octo/repo".into(),
            title: "Add login endpoint".into(),
            description: "d".repeat(600),
            files: (0..12)
                .map(|i| ChangedFile {
                    filename: format!("src/file{i}.py"),
                    status: "modified".into(),
                    additions: 3,
                    deletions: 1,
                    patch: None,
                    language: "python".into(),
                })
                .collect(),
        }
    }

    #[test]
    fn system_prompt_names_the_tools() {
        let prompt = build_system_prompt();
        assert!(prompt.contains("analyze_security_patterns"));
        assert!(prompt.contains("prioritize_issues"));
        assert!(prompt.contains("finalize"));
    }

    #[test]
    fn initial_context_truncates_description() {
        let context = build_initial_context(&request());
        assert!(context.contains("Pull Request #42"));
        assert!(context.contains(&"d".repeat(500)));
        assert!(!context.contains(&"d".repeat(501)));
    }

    #[test]
    fn initial_context_caps_file_listing() {
        let context = build_initial_context(&request());
        assert!(context.contains("Files Changed: 12"));
        assert!(context.contains("src/file9.py"));
        assert!(!context.contains("src/file10.py"));
    }

    #[test]
    fn analysis_prompt_embeds_code_and_schema() {
        let prompt = build_analysis_prompt("a.py", "x = eval(y)", "python");
        assert!(prompt.contains("Filename: a.py"));
        assert!(prompt.contains("x = eval(y)"));
        assert!(prompt.contains("\"issues\""));
    }

    #[test]
    fn summary_prompt_includes_counts() {
        let context = SummaryContext {
            title: "T".into(),
            description: String::new(),
            files_changed: 2,
            total_issues: 3,
            total_suggestions: 1,
        };
        let prompt = build_summary_prompt(&context);
        assert!(prompt.contains("Total Issues Found: 3"));
        assert!(prompt.contains("Files Changed: 2"));
    }
}
