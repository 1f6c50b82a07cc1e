//! Pull request title and description for finished runs

use std::collections::BTreeSet;

use crate::domain::Objective;

const TITLE_PREFIX: &str = "AI Dev: ";
const MAX_TITLE_CHARS: usize = 72;

/// `AI Dev: <headline>`, cut to fit a PR title
pub fn pull_request_title(objective: &Objective) -> String {
    let title = format!("{}{}", TITLE_PREFIX, objective.headline());
    if title.chars().count() <= MAX_TITLE_CHARS {
        return title;
    }
    let cut: String = title.chars().take(MAX_TITLE_CHARS - 3).collect();
    format!("{}...", cut.trim_end())
}

/// Markdown body: objective, branch, iterations, changed files, then the summary once
pub fn pull_request_description(
    objective: &Objective,
    iterations: u32,
    summary: &str,
    files_modified: &BTreeSet<String>,
) -> String {
    let files = if files_modified.is_empty() {
        "**Files Changed:** None".to_string()
    } else {
        let bullets: Vec<String> = files_modified
            .iter()
            .map(|f| format!("• `{}` - updated", f))
            .collect();
        format!("**Files Changed:**\n{}", bullets.join("\n"))
    };

    format!(
        "This pull request was created by the AI Dev.\n\n\
         **Objective:** {objective}\n\n\
         **Branch:** {branch}\n\
         **Iterations:** {iterations}\n\n\
         {files}\n\n\
         **Summary:**\n{summary}\n\n\
         Please review the changes before merging.",
        objective = objective.text(),
        branch = objective.branch(),
        iterations = iterations,
        files = files,
        summary = summary.trim(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RepoRef;

    fn objective(text: &str) -> Objective {
        Objective::new(text, RepoRef::new("acme", "web"), "ai-dev-REP-1-20241201-143022", "main")
    }

    #[test]
    fn test_description_sections() {
        let files: BTreeSet<String> = ["src/utils/validation.js", "src/components/LoginForm.js"]
            .into_iter()
            .map(String::from)
            .collect();
        let summary = "Added input validation with error messages.";
        let body = pull_request_description(&objective("Add validation to user input forms"), 5, summary, &files);

        assert!(body.contains("This pull request was created by the AI Dev"));
        assert!(body.contains("**Objective:** Add validation to user input forms"));
        assert!(body.contains("**Branch:** ai-dev-REP-1-20241201-143022"));
        assert!(body.contains("**Iterations:** 5"));
        assert!(body.contains("• `src/components/LoginForm.js` - updated"));
        assert!(body.contains("• `src/utils/validation.js` - updated"));
        assert_eq!(body.matches(summary).count(), 1);
        assert_eq!(body.matches("**Summary:**").count(), 1);
    }

    #[test]
    fn test_description_without_files() {
        let body = pull_request_description(&objective("Analyze code"), 3, "Nothing to change.", &BTreeSet::new());
        assert!(body.contains("**Files Changed:** None"));
    }

    #[test]
    fn test_title_uses_first_line() {
        let title = pull_request_title(&objective("REP-1: Fix login\n\nLong description here"));
        assert_eq!(title, "AI Dev: REP-1: Fix login");
    }

    #[test]
    fn test_title_truncated() {
        let title = pull_request_title(&objective(&"x".repeat(200)));
        assert_eq!(title.chars().count(), MAX_TITLE_CHARS);
        assert!(title.ends_with("..."));
    }
}
