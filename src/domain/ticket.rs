//! Ticket fields consumed by intake.
//!
//! A TicketRecord is fetched fresh for each evaluation and never cached past
//! one processing attempt.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TicketRecord {
    pub key: String,
    pub summary: String,
    pub description: String,
    pub labels: Vec<String>,
    pub story_points: Option<f64>,
    pub epic_name: Option<String>,
}

impl TicketRecord {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Default::default()
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_story_points(mut self, points: f64) -> Self {
        self.story_points = Some(points);
        self
    }

    pub fn with_epic(mut self, epic: impl Into<String>) -> Self {
        self.epic_name = Some(epic.into());
        self
    }

    pub fn has_description(&self) -> bool {
        !self.description.trim().is_empty()
    }

    pub fn has_epic(&self) -> bool {
        self.epic_name
            .as_deref()
            .is_some_and(|e| !e.trim().is_empty())
    }

    /// Objective text handed to the agent: `KEY: summary` then the description
    pub fn objective_text(&self) -> String {
        let headline = if self.summary.trim().is_empty() {
            self.key.clone()
        } else {
            format!("{}: {}", self.key, self.summary.trim())
        };

        if self.has_description() {
            format!("{}\n\n{}", headline, self.description.trim())
        } else {
            headline
        }
    }

    /// Story points as shown in comments
    pub fn story_points_display(&self) -> String {
        match self.story_points {
            Some(p) if p.fract() == 0.0 => format!("{}", p as i64),
            Some(p) => format!("{}", p),
            None => "Unknown".to_string(),
        }
    }
}
