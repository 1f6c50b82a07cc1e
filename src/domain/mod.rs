//! Domain types for aidev
//!
//! This module contains the core domain types:
//! - Objective: what one agent run is asked to do, and where
//! - Conversation: the append-only turn log the model sees
//! - RunResult / RunOutcome / RunState: how a run ends and what it went through
//! - TicketRecord: the ticket fields intake cares about

pub mod conversation;
pub mod objective;
pub mod outcome;
pub mod ticket;

pub use conversation::{Conversation, Turn};
pub use objective::{Objective, RepoRef, single_repo_branch_name, ticket_branch_name};
pub use outcome::{RunOutcome, RunResult, RunState};
pub use ticket::TicketRecord;
