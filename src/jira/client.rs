//! Jira REST API client

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::{Client, RequestBuilder, Url};
use serde_json::{Value, json};

use super::fields::{FieldMap, parse_issue};
use super::{EpicSummary, TicketError, TicketSource};
use crate::domain::TicketRecord;

const SEARCH_PAGE_SIZE: u64 = 100;

const EPIC_JQL: &str = "issuetype = Epic";

/// Ticket source backed by Jira REST API v2 with basic auth
pub struct JiraClient {
    http: Client,
    base_url: String,
    username: String,
    token: String,
    fields: FieldMap,
}

impl JiraClient {
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        token: impl Into<String>,
        fields: FieldMap,
        timeout: Duration,
    ) -> Result<Self, TicketError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            username: username.into(),
            token: token.into(),
            fields,
        })
    }

    /// Browser link for a ticket
    pub fn browse_url(&self, key: &str) -> String {
        format!("{}/browse/{}", self.base_url, key)
    }

    fn api_url(&self, segments: &[&str]) -> Result<Url, TicketError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| TicketError::InvalidResponse(format!("bad Jira URL '{}': {}", self.base_url, e)))?;
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| TicketError::InvalidResponse(format!("Jira URL '{}' cannot be a base", self.base_url)))?;
            path.pop_if_empty();
            path.extend(["rest", "api", "2"]);
            path.extend(segments);
        }
        Ok(url)
    }

    async fn send(&self, subject: &str, request: RequestBuilder) -> Result<Value, TicketError> {
        let response = request
            .basic_auth(&self.username, Some(&self.token))
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                404 => TicketError::NotFound(subject.to_string()),
                401 | 403 => TicketError::Unauthorized(body),
                code => TicketError::Api { status: code, message: body },
            });
        }

        // Comment creation can answer 201 with a body we do not need
        Ok(response.json().await.unwrap_or(Value::Null))
    }

    async fn issue_json(&self, key: &str) -> Result<Value, TicketError> {
        self.send(key, self.http.get(self.api_url(&["issue", key])?)).await
    }

    /// All issues matching `jql`, following pagination
    async fn search(&self, jql: &str, fields: &str) -> Result<Vec<Value>, TicketError> {
        let mut issues = Vec::new();
        let mut start_at = 0u64;

        loop {
            let mut url = self.api_url(&["search"])?;
            url.query_pairs_mut()
                .append_pair("jql", jql)
                .append_pair("fields", fields)
                .append_pair("startAt", &start_at.to_string())
                .append_pair("maxResults", &SEARCH_PAGE_SIZE.to_string());

            let page = self.send(jql, self.http.get(url)).await?;
            let batch = page["issues"].as_array().cloned().unwrap_or_default();
            let total = page["total"].as_u64().unwrap_or(0);
            start_at += batch.len() as u64;
            let done = batch.is_empty() || start_at >= total;
            issues.extend(batch);
            if done {
                break;
            }
        }

        debug!("JQL '{}' matched {} issues", jql, issues.len());
        Ok(issues)
    }

    /// Epic name for an epic issue key; the key itself when it cannot be read
    async fn epic_name(&self, epic_link: &str) -> String {
        match self.issue_json(epic_link).await {
            Ok(epic) => epic["fields"]["summary"]
                .as_str()
                .map(String::from)
                .unwrap_or_else(|| epic_link.to_string()),
            Err(e) => {
                debug!("Epic link '{}' is not a readable issue ({}), using it as the name", epic_link, e);
                epic_link.to_string()
            }
        }
    }
}

#[async_trait]
impl TicketSource for JiraClient {
    async fn get_ticket(&self, key: &str) -> Result<TicketRecord, TicketError> {
        let issue = self.issue_json(key).await?;
        let parsed = parse_issue(&issue, &self.fields)
            .ok_or_else(|| TicketError::InvalidResponse(format!("issue {} has no key", key)))?;

        let mut ticket = parsed.ticket;
        if let Some(link) = parsed.epic_link {
            ticket.epic_name = Some(self.epic_name(&link).await);
        }

        debug!(
            "Fetched {}: labels={:?} points={} epic={:?}",
            ticket.key,
            ticket.labels,
            ticket.story_points_display(),
            ticket.epic_name
        );
        Ok(ticket)
    }

    async fn post_comment(&self, key: &str, text: &str) -> Result<(), TicketError> {
        let url = self.api_url(&["issue", key, "comment"])?;
        self.send(key, self.http.post(url).json(&json!({ "body": text })))
            .await?;
        info!("Added comment to {}", key);
        Ok(())
    }

    async fn search_by_label(&self, label: &str) -> Result<Vec<String>, TicketError> {
        let jql = format!("labels = \"{}\"", label.replace('"', "\\\""));
        let issues = self.search(&jql, "key").await?;
        let keys: Vec<String> = issues
            .iter()
            .filter_map(|i| i["key"].as_str().map(String::from))
            .collect();

        if keys.is_empty() {
            warn!("No tickets found with label '{}'", label);
        } else {
            info!("Found {} tickets with label '{}'", keys.len(), label);
        }
        Ok(keys)
    }

    async fn list_epics(&self) -> Result<Vec<EpicSummary>, TicketError> {
        let issues = self.search(EPIC_JQL, "summary,status").await?;
        let epics: Vec<EpicSummary> = issues.iter().filter_map(parse_epic).collect();
        info!("Found {} epics", epics.len());
        Ok(epics)
    }
}

/// Epic key, summary and status from a search hit
fn parse_epic(issue: &Value) -> Option<EpicSummary> {
    let key = issue["key"].as_str()?;
    let fields = &issue["fields"];
    let name = fields["summary"].as_str().unwrap_or_default();
    let epic = EpicSummary::new(key, name);
    Some(match fields["status"]["name"].as_str() {
        Some(status) => epic.with_status(status),
        None => epic,
    })
}

impl std::fmt::Debug for JiraClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JiraClient")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> JiraClient {
        JiraClient::new(
            "https://example.atlassian.net/",
            "bot@example.com",
            "secret-token",
            FieldMap::default(),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_api_url() {
        let url = client().api_url(&["issue", "REP-1", "comment"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://example.atlassian.net/rest/api/2/issue/REP-1/comment"
        );
    }

    #[test]
    fn test_browse_url() {
        assert_eq!(client().browse_url("REP-7"), "https://example.atlassian.net/browse/REP-7");
    }

    #[test]
    fn test_parse_epic() {
        let issue = json!({
            "key": "REP-10",
            "fields": {"summary": "Builders - Menu Addition", "status": {"name": "In Progress"}}
        });
        assert_eq!(
            parse_epic(&issue),
            Some(EpicSummary::new("REP-10", "Builders - Menu Addition").with_status("In Progress"))
        );
        assert_eq!(parse_epic(&json!({"fields": {"summary": "keyless"}})), None);
    }

    #[test]
    fn test_debug_hides_token() {
        let debug_str = format!("{:?}", client());
        assert!(!debug_str.contains("secret-token"));
    }
}
