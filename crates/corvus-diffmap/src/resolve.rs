use std::collections::{BTreeMap, HashSet};

use corvus_core::{InlineComment, Issue};

use crate::parser::{FilePatch, LineMap};

/// Hard ceiling on line numbers accepted from upstream findings. Anything
/// beyond this is treated as hallucinated and re-resolved.
const MAX_LINE: u32 = 10_000;

/// Strategy for inferring a line number from a patch body when a finding
/// carries none.
///
/// Implementations must return a plausible added line from the patch, or
/// `None` when nothing fits. Tests substitute deterministic fakes.
pub trait LineInference {
    /// Pick an added line in `patch` that the finding `message` plausibly
    /// refers to.
    fn infer_line(&self, patch: &str, message: &str) -> Option<u32>;
}

/// Default inference: scan added lines for a token shared with the finding
/// message.
///
/// Tokens shorter than 4 characters are ignored to avoid matching on noise
/// words. The first added line whose text contains a message token wins.
///
/// # Examples
///
/// ```
/// use corvus_diffmap::resolve::{KeywordInference, LineInference};
///
/// let patch = "@@ -1,2 +1,3 @@\n context\n+result = eval(user_input)\n context";
/// let inference = KeywordInference;
/// assert_eq!(inference.infer_line(patch, "Use of eval() - security risk"), Some(2));
/// assert_eq!(inference.infer_line(patch, "something unrelated"), None);
/// ```
pub struct KeywordInference;

impl LineInference for KeywordInference {
    fn infer_line(&self, patch: &str, message: &str) -> Option<u32> {
        let tokens: Vec<String> = message
            .split(|c: char| !c.is_alphanumeric() && c != '_')
            .filter(|t| t.len() >= 4)
            .map(|t| t.to_lowercase())
            .collect();
        if tokens.is_empty() {
            return None;
        }

        let map = LineMap::parse(patch);
        let mut added = map.added_lines.iter().copied();

        for line in patch.lines() {
            if !line.starts_with('+') || line.starts_with("+++") {
                continue;
            }
            let Some(number) = added.next() else {
                break;
            };
            let text = line[1..].to_lowercase();
            if tokens.iter().any(|t| text.contains(t.as_str())) {
                return Some(number);
            }
        }
        None
    }
}

/// Inference that never finds a line. Useful when no patch context exists.
pub struct NoInference;

impl LineInference for NoInference {
    fn infer_line(&self, _patch: &str, _message: &str) -> Option<u32> {
        None
    }
}

/// Outcome of resolving a batch of findings against a set of file patches.
#[derive(Debug, Default)]
pub struct ResolvedIssues {
    /// Findings with a concrete `(file, line)` position.
    pub file_issues: Vec<Issue>,
    /// Findings that could not be placed; reported in the review body.
    pub general_issues: Vec<Issue>,
}

/// Resolve findings to `(file, line)` positions against the pull request's
/// patches.
///
/// Per finding:
/// 1. A present position is validated: the line must be within `[1, 10000]`
///    and inside a hunk range of its file. A position that fails validation
///    is discarded and the finding re-enters resolution.
/// 2. The [`LineInference`] strategy is consulted against the candidate
///    file's patch.
/// 3. Failing that, the deterministic fallback picks the middle added line
///    when more than two exist, otherwise the first.
/// 4. A finding that still has no position stays general — it is never
///    dropped.
pub fn resolve_issues(
    issues: Vec<Issue>,
    files: &[FilePatch],
    inference: &dyn LineInference,
) -> ResolvedIssues {
    let maps: Vec<(String, LineMap)> = files
        .iter()
        .map(|f| (f.path.clone(), LineMap::parse(&f.patch)))
        .collect();

    let mut resolved = ResolvedIssues::default();

    for mut issue in issues {
        // Step 1: validate any position the finding already carries.
        if let (Some(file), Some(line)) = (issue.file.as_deref(), issue.line) {
            let valid = line >= 1
                && line <= MAX_LINE
                && maps
                    .iter()
                    .find(|(path, _)| path == file)
                    .is_some_and(|(_, map)| map.contains(line));
            if valid {
                resolved.file_issues.push(issue);
                continue;
            }
            issue.file = None;
            issue.line = None;
        }

        // A line with no file (pattern scanners report these) adopts the
        // first file whose ranges contain it; otherwise the line is
        // discarded and the finding re-enters resolution.
        if issue.file.is_none() {
            if let Some(line) = issue.line {
                let adopted = (line >= 1 && line <= MAX_LINE)
                    .then(|| maps.iter().find(|(_, map)| map.contains(line)))
                    .flatten();
                if let Some((path, _)) = adopted {
                    issue.file = Some(path.clone());
                    resolved.file_issues.push(issue);
                    continue;
                }
                issue.line = None;
            }
        }

        // Steps 2-3: candidate files are the named file when it is part of
        // the diff, otherwise every file in diff order.
        let candidates: Vec<usize> = match issue.file.as_deref() {
            Some(named) => maps
                .iter()
                .enumerate()
                .filter(|(_, (path, _))| path == named)
                .map(|(i, _)| i)
                .collect(),
            None => (0..maps.len()).collect(),
        };

        let mut placed = false;
        for &i in &candidates {
            if let Some(line) = inference.infer_line(&files[i].patch, &issue.message) {
                issue.file = Some(maps[i].0.clone());
                issue.line = Some(line);
                resolved.file_issues.push(issue.clone());
                placed = true;
                break;
            }
        }
        if placed {
            continue;
        }

        for &i in &candidates {
            let added = &maps[i].1.added_lines;
            if added.is_empty() {
                continue;
            }
            let line = if added.len() > 2 {
                added[added.len() / 2]
            } else {
                added[0]
            };
            issue.file = Some(maps[i].0.clone());
            issue.line = Some(line);
            resolved.file_issues.push(issue.clone());
            placed = true;
            break;
        }
        if placed {
            continue;
        }

        resolved.general_issues.push(issue);
    }

    resolved
}

/// Positional comments partitioned by whether the hosting platform will
/// accept them.
#[derive(Debug, Default)]
pub struct CommentSet {
    /// Comments whose line falls inside a real hunk range.
    pub valid: Vec<InlineComment>,
    /// Comments whose resolved position lies outside every parsed range;
    /// these must be folded into the review body, because posting them
    /// positionally is rejected by the hosting platform's API.
    pub skipped: Vec<InlineComment>,
}

/// Assemble inline comments from positioned findings.
///
/// Duplicate `(file, line)` keys are dropped, keeping the first occurrence.
/// The remainder is split into valid and skipped comments against the parsed
/// hunk ranges.
pub fn assemble_comments(file_issues: &[Issue], files: &[FilePatch]) -> CommentSet {
    let maps: BTreeMap<&str, LineMap> = files
        .iter()
        .map(|f| (f.path.as_str(), LineMap::parse(&f.patch)))
        .collect();

    let mut seen: HashSet<(String, u32)> = HashSet::new();
    let mut set = CommentSet::default();

    for issue in file_issues {
        let (Some(file), Some(line)) = (issue.file.as_deref(), issue.line) else {
            continue;
        };
        if !seen.insert((file.to_string(), line)) {
            continue;
        }

        let comment = InlineComment {
            path: file.to_string(),
            line,
            body: issue.message.clone(),
        };

        if maps.get(file).is_some_and(|map| map.contains(line)) {
            set.valid.push(comment);
        } else {
            set.skipped.push(comment);
        }
    }

    set
}

#[cfg(test)]
mod tests {
    use super::*;
    use corvus_core::{Category, Severity};

    fn issue(message: &str, file: Option<&str>, line: Option<u32>) -> Issue {
        Issue {
            severity: Severity::Medium,
            category: Category::Quality,
            message: message.into(),
            file: file.map(String::from),
            line,
            suggestion: None,
        }
    }

    fn single_file(patch: &str) -> Vec<FilePatch> {
        vec![FilePatch {
            path: "app.py".into(),
            patch: patch.into(),
        }]
    }

    /// Deterministic inference stub returning a fixed answer.
    struct FixedInference(Option<u32>);

    impl LineInference for FixedInference {
        fn infer_line(&self, _patch: &str, _message: &str) -> Option<u32> {
            self.0
        }
    }

    #[test]
    fn valid_position_is_kept() {
        let files = single_file("@@ -1,3 +1,4 @@\n context\n+new\n context\n context");
        let out = resolve_issues(
            vec![issue("x", Some("app.py"), Some(3))],
            &files,
            &NoInference,
        );
        assert_eq!(out.file_issues.len(), 1);
        assert_eq!(out.file_issues[0].line, Some(3));
    }

    #[test]
    fn out_of_range_line_reenters_resolution() {
        let files = single_file("@@ -1,3 +1,4 @@\n context\n+new\n context\n context");
        // Line 99 is outside [1,4]; the sole added line is 2.
        let out = resolve_issues(
            vec![issue("x", Some("app.py"), Some(99))],
            &files,
            &NoInference,
        );
        assert_eq!(out.file_issues.len(), 1);
        assert_eq!(out.file_issues[0].line, Some(2));
        assert_eq!(out.file_issues[0].file.as_deref(), Some("app.py"));
    }

    #[test]
    fn huge_line_number_is_discarded() {
        let files = single_file("@@ -1,3 +1,4 @@\n context\n+new\n context\n context");
        let out = resolve_issues(
            vec![issue("x", Some("app.py"), Some(20_000))],
            &files,
            &NoInference,
        );
        assert_eq!(out.file_issues[0].line, Some(2));
    }

    #[test]
    fn inference_takes_priority_over_fallback() {
        let files = single_file("@@ -1,5 +1,8 @@\n+a\n+b\n+c\n+d\n ctx");
        let out = resolve_issues(
            vec![issue("no position", None, None)],
            &files,
            &FixedInference(Some(4)),
        );
        assert_eq!(out.file_issues[0].line, Some(4));
    }

    #[test]
    fn fallback_picks_middle_of_many_added_lines() {
        let files = single_file("@@ -1,2 +1,6 @@\n+a\n+b\n+c\n+d\n ctx\n ctx");
        // Added lines 1..=4; middle element is index 4/2 = 2 -> line 3.
        let out = resolve_issues(vec![issue("x", None, None)], &files, &NoInference);
        assert_eq!(out.file_issues[0].line, Some(3));
    }

    #[test]
    fn fallback_picks_first_of_two_added_lines() {
        let files = single_file("@@ -1,2 +1,4 @@\n+a\n+b\n ctx\n ctx");
        let out = resolve_issues(vec![issue("x", None, None)], &files, &NoInference);
        assert_eq!(out.file_issues[0].line, Some(1));
    }

    #[test]
    fn unresolvable_issue_stays_general() {
        // Removal-only patch: no added lines for inference or fallback.
        let files = vec![FilePatch {
            path: "app.py".into(),
            patch: "@@ -1,3 +1,2 @@\n ctx\n-gone\n ctx".into(),
        }];
        let out = resolve_issues(vec![issue("x", None, None)], &files, &NoInference);
        assert!(out.file_issues.is_empty());
        assert_eq!(out.general_issues.len(), 1);
    }

    #[test]
    fn named_file_not_in_diff_falls_back_to_general_when_no_candidates() {
        let files = single_file("@@ -1,2 +1,3 @@\n+a\n ctx\n ctx");
        let out = resolve_issues(
            vec![issue("x", Some("other.py"), None)],
            &files,
            &NoInference,
        );
        // "other.py" names no parsed file, so there are no candidates.
        assert!(out.file_issues.is_empty());
        assert_eq!(out.general_issues.len(), 1);
        assert_eq!(out.general_issues[0].file.as_deref(), Some("other.py"));
    }

    #[test]
    fn injection_scenario_resolves_to_sole_added_line() {
        // One issue, no file/line; single added line at new-file line 2.
        let files = single_file("@@ -1,3 +1,4 @@\n context\n+new_line\n context\n context");
        let out = resolve_issues(
            vec![issue("possible injection", None, None)],
            &files,
            &KeywordInference,
        );
        assert_eq!(out.file_issues.len(), 1);
        let placed = &out.file_issues[0];
        assert_eq!(placed.file.as_deref(), Some("app.py"));
        assert_eq!(placed.line, Some(2));

        let set = assemble_comments(&out.file_issues, &files);
        assert_eq!(set.valid.len(), 1);
        assert!(set.skipped.is_empty());
        assert_eq!(set.valid[0].line, 2);
    }

    #[test]
    fn line_without_file_adopts_containing_file() {
        let files = vec![
            FilePatch {
                path: "a.py".into(),
                patch: "@@ -1,2 +1,3 @@\n+x\n ctx\n ctx".into(),
            },
            FilePatch {
                path: "b.py".into(),
                patch: "@@ -40,2 +40,3 @@\n+y\n ctx\n ctx".into(),
            },
        ];
        let out = resolve_issues(vec![issue("scanner hit", None, Some(41))], &files, &NoInference);
        assert_eq!(out.file_issues.len(), 1);
        assert_eq!(out.file_issues[0].file.as_deref(), Some("b.py"));
        assert_eq!(out.file_issues[0].line, Some(41));
    }

    #[test]
    fn line_without_file_outside_all_ranges_reenters_resolution() {
        let files = single_file("@@ -1,2 +1,3 @@\n+x\n ctx\n ctx");
        let out = resolve_issues(vec![issue("hit", None, Some(500))], &files, &NoInference);
        // 500 is in no range, so the line is dropped and the fallback
        // places the finding on the sole added line.
        assert_eq!(out.file_issues[0].line, Some(1));
    }

    #[test]
    fn duplicate_positions_keep_first() {
        let files = single_file("@@ -1,3 +1,4 @@\n context\n+new\n context\n context");
        let issues = vec![
            issue("first", Some("app.py"), Some(2)),
            issue("second", Some("app.py"), Some(2)),
        ];
        let set = assemble_comments(&issues, &files);
        assert_eq!(set.valid.len(), 1);
        assert_eq!(set.valid[0].body, "first");
    }

    #[test]
    fn comment_outside_ranges_is_skipped_not_dropped() {
        let files = single_file("@@ -1,3 +1,4 @@\n context\n+new\n context\n context");
        let issues = vec![issue("stale", Some("app.py"), Some(42))];
        let set = assemble_comments(&issues, &files);
        assert!(set.valid.is_empty());
        assert_eq!(set.skipped.len(), 1);
        assert_eq!(set.skipped[0].line, 42);
    }

    #[test]
    fn comment_on_unknown_file_is_skipped() {
        let files = single_file("@@ -1,2 +1,3 @@\n+a\n ctx\n ctx");
        let issues = vec![issue("ghost", Some("missing.py"), Some(1))];
        let set = assemble_comments(&issues, &files);
        assert!(set.valid.is_empty());
        assert_eq!(set.skipped.len(), 1);
    }

    #[test]
    fn keyword_inference_matches_token_on_added_line() {
        let patch = "@@ -1,3 +1,5 @@\n context\n+import pickle\n+data = pickle.loads(raw)\n context\n context";
        let line = KeywordInference.infer_line(patch, "Unsafe pickle usage");
        assert_eq!(line, Some(2));
    }

    #[test]
    fn keyword_inference_ignores_short_tokens() {
        let patch = "@@ -1,2 +1,3 @@\n+let x = 1;\n ctx\n ctx";
        assert_eq!(KeywordInference.infer_line(patch, "x is a b"), None);
    }
}
