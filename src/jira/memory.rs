//! In-memory ticket source for tests and offline runs

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::{EpicSummary, TicketError, TicketSource};
use crate::domain::TicketRecord;

/// Tickets in a map; comments recorded in posting order
#[derive(Default)]
pub struct MemoryTicketSource {
    tickets: Mutex<HashMap<String, TicketRecord>>,
    comments: Mutex<Vec<(String, String)>>,
    epics: Mutex<Vec<EpicSummary>>,
    fetches: AtomicUsize,
}

impl MemoryTicketSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ticket(self, ticket: TicketRecord) -> Self {
        self.put(ticket);
        self
    }

    pub fn with_epic(self, epic: EpicSummary) -> Self {
        self.epics.lock().unwrap_or_else(|e| e.into_inner()).push(epic);
        self
    }

    /// Insert or replace a ticket
    pub fn put(&self, ticket: TicketRecord) {
        self.tickets
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(ticket.key.clone(), ticket);
    }

    /// All `(key, text)` comments in order
    pub fn comments(&self) -> Vec<(String, String)> {
        self.comments.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Comments posted on one ticket
    pub fn comments_for(&self, key: &str) -> Vec<String> {
        self.comments()
            .into_iter()
            .filter(|(k, _)| k == key)
            .map(|(_, text)| text)
            .collect()
    }

    /// Number of `get_ticket` calls served
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TicketSource for MemoryTicketSource {
    async fn get_ticket(&self, key: &str) -> Result<TicketRecord, TicketError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.tickets
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
            .ok_or_else(|| TicketError::NotFound(key.to_string()))
    }

    async fn post_comment(&self, key: &str, text: &str) -> Result<(), TicketError> {
        self.comments
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((key.to_string(), text.to_string()));
        Ok(())
    }

    async fn search_by_label(&self, label: &str) -> Result<Vec<String>, TicketError> {
        let tickets = self.tickets.lock().unwrap_or_else(|e| e.into_inner());
        let mut keys: Vec<String> = tickets
            .values()
            .filter(|t| t.labels.iter().any(|l| l == label))
            .map(|t| t.key.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn list_epics(&self) -> Result<Vec<EpicSummary>, TicketError> {
        let mut epics = self.epics.lock().unwrap_or_else(|e| e.into_inner()).clone();
        epics.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(epics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_and_comment() {
        let source = MemoryTicketSource::new().with_ticket(TicketRecord::new("REP-1").with_summary("s"));

        assert_eq!(source.get_ticket("REP-1").await.unwrap().summary, "s");
        assert!(matches!(source.get_ticket("REP-2").await, Err(TicketError::NotFound(_))));
        assert_eq!(source.fetch_count(), 2);

        source.post_comment("REP-1", "hello").await.unwrap();
        assert_eq!(source.comments_for("REP-1"), vec!["hello"]);
    }

    #[tokio::test]
    async fn test_search_by_label() {
        let source = MemoryTicketSource::new()
            .with_ticket(TicketRecord::new("REP-2").with_labels(["UseAI"]))
            .with_ticket(TicketRecord::new("REP-1").with_labels(["other", "UseAI"]))
            .with_ticket(TicketRecord::new("REP-3").with_labels(["other"]));

        assert_eq!(source.search_by_label("UseAI").await.unwrap(), vec!["REP-1", "REP-2"]);
    }

    #[tokio::test]
    async fn test_list_epics_sorted_by_key() {
        let source = MemoryTicketSource::new()
            .with_epic(EpicSummary::new("REP-20", "Payments"))
            .with_epic(EpicSummary::new("REP-3", "Builders - Menu Addition"));

        let keys: Vec<String> = source.list_epics().await.unwrap().into_iter().map(|e| e.key).collect();
        assert_eq!(keys, vec!["REP-20", "REP-3"]);
    }
}
