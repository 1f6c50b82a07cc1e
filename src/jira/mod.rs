//! Ticket source - the issue tracker as seen by intake
//!
//! `JiraClient` talks to the Jira REST API; `MemoryTicketSource` is the
//! in-process fake. Field extraction lives in `fields` so webhook payloads
//! and API responses are read the same way.

pub mod client;
pub mod fields;
pub mod memory;

use async_trait::async_trait;

use crate::domain::TicketRecord;

pub use client::JiraClient;
pub use fields::{FieldMap, ParsedIssue, parse_issue};
pub use memory::MemoryTicketSource;

/// Read tickets and write comments
#[async_trait]
pub trait TicketSource: Send + Sync {
    /// Fetch the current state of a ticket
    async fn get_ticket(&self, key: &str) -> Result<TicketRecord, TicketError>;

    /// Add a comment to a ticket
    async fn post_comment(&self, key: &str, text: &str) -> Result<(), TicketError>;

    /// Keys of all tickets carrying `label`
    async fn search_by_label(&self, label: &str) -> Result<Vec<String>, TicketError>;

    /// Every epic in the tracker
    async fn list_epics(&self) -> Result<Vec<EpicSummary>, TicketError>;
}

/// An epic as listed by the tracker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpicSummary {
    pub key: String,
    /// The epic's summary, which is what epic mappings match against
    pub name: String,
    pub status: Option<String>,
}

impl EpicSummary {
    pub fn new(key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            status: None,
        }
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }
}

/// Errors from the ticket tracker
#[derive(Debug, thiserror::Error)]
pub enum TicketError {
    #[error("Ticket not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}
