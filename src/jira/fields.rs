//! Ticket field extraction from Jira issue JSON
//!
//! Story points and epic links live in instance-specific custom fields, so
//! both are read through ordered candidate lists. The first candidate
//! holding a usable value wins.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::TicketRecord;

/// Candidate custom-field ids, in lookup order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldMap {
    pub story_points: Vec<String>,
    pub epic_link: Vec<String>,
}

impl Default for FieldMap {
    fn default() -> Self {
        Self {
            story_points: vec![
                "customfield_10016".to_string(),
                "customfield_10026".to_string(),
                "customfield_10002".to_string(),
                "customfield_10004".to_string(),
                "story_points".to_string(),
            ],
            epic_link: vec![
                "customfield_10014".to_string(),
                "customfield_10008".to_string(),
                "epic".to_string(),
            ],
        }
    }
}

/// A ticket plus the epic issue key still to be resolved to a name
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedIssue {
    pub ticket: TicketRecord,
    pub epic_link: Option<String>,
}

/// Extract a ticket from an issue object (`{"key": ..., "fields": {...}}`)
pub fn parse_issue(issue: &Value, map: &FieldMap) -> Option<ParsedIssue> {
    let key = issue["key"].as_str()?;
    let fields = &issue["fields"];

    let labels: Vec<String> = fields["labels"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();

    let mut ticket = TicketRecord::new(key)
        .with_summary(fields["summary"].as_str().unwrap_or_default())
        .with_description(description_text(&fields["description"]))
        .with_labels(labels);

    ticket.story_points = map
        .story_points
        .iter()
        .find_map(|id| number(&fields[id.as_str()]));

    let epic_link = map
        .epic_link
        .iter()
        .find_map(|id| epic_reference(&fields[id.as_str()]));

    if epic_link.is_none() {
        let parent = &fields["parent"];
        if parent["fields"]["issuetype"]["name"].as_str() == Some("Epic") {
            ticket.epic_name = parent["fields"]["summary"].as_str().map(String::from);
        }
    }

    Some(ParsedIssue { ticket, epic_link })
}

/// Numeric field value; numeric strings are accepted
fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Epic link as an issue key or name
fn epic_reference(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.as_str(),
        Value::Object(_) => value["key"].as_str().or_else(|| value["name"].as_str())?,
        _ => return None,
    };
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Plain description text; Atlassian document format is flattened
fn description_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Object(_) => {
            let mut out = String::new();
            flatten_document(value, &mut out);
            out.trim().to_string()
        }
        _ => String::new(),
    }
}

fn flatten_document(node: &Value, out: &mut String) {
    if let Some(text) = node["text"].as_str() {
        out.push_str(text);
    }
    if let Some(children) = node["content"].as_array() {
        for child in children {
            flatten_document(child, out);
        }
    }
    if matches!(node["type"].as_str(), Some("paragraph") | Some("heading") | Some("listItem")) {
        out.push('\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_basic_issue() {
        let issue = json!({
            "key": "REP-123",
            "fields": {
                "summary": "Add menu item",
                "description": "Add a 'Racks' entry to the builder menu",
                "labels": ["threejs-builder", "UseAI"],
                "customfield_10016": 3.0
            }
        });

        let parsed = parse_issue(&issue, &FieldMap::default()).unwrap();
        assert_eq!(parsed.ticket.key, "REP-123");
        assert_eq!(parsed.ticket.summary, "Add menu item");
        assert_eq!(parsed.ticket.labels, vec!["threejs-builder", "UseAI"]);
        assert_eq!(parsed.ticket.story_points, Some(3.0));
        assert!(parsed.epic_link.is_none());
        assert!(parsed.ticket.epic_name.is_none());
    }

    #[test]
    fn test_story_point_candidates_in_order() {
        let issue = json!({
            "key": "REP-1",
            "fields": {
                "customfield_10016": null,
                "customfield_10026": "5",
                "customfield_10002": 8
            }
        });
        let parsed = parse_issue(&issue, &FieldMap::default()).unwrap();
        assert_eq!(parsed.ticket.story_points, Some(5.0));
    }

    #[test]
    fn test_custom_field_map() {
        let map = FieldMap {
            story_points: vec!["customfield_99999".to_string()],
            epic_link: vec![],
        };
        let issue = json!({"key": "X-1", "fields": {"customfield_10016": 2, "customfield_99999": 13}});
        assert_eq!(parse_issue(&issue, &map).unwrap().ticket.story_points, Some(13.0));
    }

    #[test]
    fn test_epic_link_field() {
        let issue = json!({"key": "REP-2", "fields": {"customfield_10014": "REP-100"}});
        let parsed = parse_issue(&issue, &FieldMap::default()).unwrap();
        assert_eq!(parsed.epic_link.as_deref(), Some("REP-100"));
    }

    #[test]
    fn test_parent_epic() {
        let issue = json!({
            "key": "REP-3",
            "fields": {
                "parent": {
                    "key": "REP-50",
                    "fields": {"summary": "Builders - Menu Addition", "issuetype": {"name": "Epic"}}
                }
            }
        });
        let parsed = parse_issue(&issue, &FieldMap::default()).unwrap();
        assert_eq!(parsed.ticket.epic_name.as_deref(), Some("Builders - Menu Addition"));
    }

    #[test]
    fn test_parent_story_is_not_epic() {
        let issue = json!({
            "key": "REP-4",
            "fields": {
                "parent": {"fields": {"summary": "Some story", "issuetype": {"name": "Story"}}}
            }
        });
        assert!(parse_issue(&issue, &FieldMap::default()).unwrap().ticket.epic_name.is_none());
    }

    #[test]
    fn test_document_description() {
        let issue = json!({
            "key": "REP-5",
            "fields": {
                "description": {
                    "type": "doc",
                    "content": [
                        {"type": "paragraph", "content": [{"type": "text", "text": "First line"}]},
                        {"type": "paragraph", "content": [{"type": "text", "text": "Second line"}]}
                    ]
                }
            }
        });
        let parsed = parse_issue(&issue, &FieldMap::default()).unwrap();
        assert_eq!(parsed.ticket.description, "First line\nSecond line");
    }

    #[test]
    fn test_missing_key() {
        assert!(parse_issue(&json!({"fields": {}}), &FieldMap::default()).is_none());
    }
}
