//! Ticket comment text

use crate::domain::{Objective, RunOutcome, RunResult, TicketRecord};
use crate::intake::eligibility::UnmetCriterion;

const HEADER: &str = "🤖 **AI Dev**";

/// Posted when a run starts
pub fn initial_comment(ticket: &TicketRecord, objective: &Objective) -> String {
    format!(
        "{HEADER} - Starting automation\n\n\
         **Ticket:** {key}\n\
         **Objective:** {objective}\n\
         **Repository:** {repo}\n\
         **Branch:** {branch}\n\
         **Story Points:** {points}\n\n\
         Work is in progress. Another comment will follow when it completes.",
        key = ticket.key,
        objective = objective.headline(),
        repo = objective.repo(),
        branch = objective.branch(),
        points = ticket.story_points_display(),
    )
}

/// Posted when a run terminates
pub fn final_comment(key: &str, result: &RunResult) -> String {
    let status = match (result.outcome, result.success) {
        (RunOutcome::Finished, true) => "✅ **Status:** Completed",
        (RunOutcome::Finished, false) => "⚠️ **Status:** Finished without achieving the objective",
        (RunOutcome::IterationLimitExceeded, _) => "⏱️ **Status:** Iteration limit reached",
        (RunOutcome::Failed, _) => "❌ **Status:** Failed",
    };

    let pull_request = result.pull_request_url.as_deref().unwrap_or("Not created");
    let files = if result.files_modified.is_empty() {
        "None".to_string()
    } else {
        result
            .files_list()
            .iter()
            .map(|f| format!("\n• {}", f))
            .collect::<String>()
    };

    format!(
        "{HEADER} - Automation finished for {key}\n\n\
         {status}\n\
         **Branch:** {branch}\n\
         **Iterations:** {iterations}\n\
         **Pull Request:** {pull_request}\n\
         **Files Modified:** {files}\n\n\
         **Summary:**\n{summary}",
        branch = result.branch,
        iterations = result.iterations,
        summary = result.summary,
    )
}

/// Posted once when a ticket fails eligibility
pub fn ineligible_comment(reasons: &[UnmetCriterion]) -> String {
    let reasons: Vec<String> = reasons.iter().map(ToString::to_string).collect();
    format!(
        "{HEADER} - This ticket is not eligible for automation: {}",
        reasons.join("; ")
    )
}

/// Posted when processing breaks down outside the run itself
pub fn error_comment(reason: &str) -> String {
    format!(
        "{HEADER} - Error occurred\n\n\
         ❌ **Status:** Failed\n\
         **Error:** {reason}\n\n\
         Processing stopped before the work could be completed. Check the logs for details."
    )
}
