//! Jira webhook payload classification

use serde_json::Value;

const ISSUE_CREATED_EVENT: &str = "jira:issue_created";
const ISSUE_CREATED_TYPE: &str = "issue_created";

#[derive(Debug, Clone, PartialEq)]
pub enum WebhookEvent {
    /// A new issue; the ticket itself is fetched fresh before processing
    IssueCreated { key: String },
    Ignored { reason: String },
}

/// Classify a webhook body; only issue creation starts processing
pub fn classify(payload: &Value) -> WebhookEvent {
    let event = payload["webhookEvent"].as_str().unwrap_or_default();
    let event_type = payload["issue_event_type_name"].as_str().unwrap_or_default();

    if event != ISSUE_CREATED_EVENT && event_type != ISSUE_CREATED_TYPE {
        let name = if event.is_empty() { event_type } else { event };
        return WebhookEvent::Ignored {
            reason: format!("unhandled event '{}'", name),
        };
    }

    let issue = &payload["issue"];
    let Some(key) = issue["key"].as_str().filter(|k| !k.trim().is_empty()) else {
        return WebhookEvent::Ignored {
            reason: "issue key missing from payload".to_string(),
        };
    };

    WebhookEvent::IssueCreated {
        key: key.trim().to_string(),
    }
}
