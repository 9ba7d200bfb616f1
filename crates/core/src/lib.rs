//! # Slo Core
//!
//! Domain types, traits, and error definitions for the Slo study agent.
//! This crate has **zero framework dependencies**; it defines the domain model
//! that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every collaborator the agent talks to (language model, tools, data stores,
//! conversation history) is defined as a trait here. Implementations live in
//! their respective crates.

pub mod error;
pub mod message;
pub mod policy;
pub mod provider;
pub mod scope;
pub mod store;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ProviderError, Result, StoreError, ToolError};
pub use message::{ContentBlock, ConversationTurn, Role, TurnContent};
pub use policy::AgentPolicy;
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition, Usage};
pub use scope::{Scope, ScopeSet};
pub use store::{
    CalendarEvent, CalendarService, DataStores, EventPatch, HistoryStore, JournalEntry,
    JournalQuery, JournalStore, NewEvent, NewTask, Note, NoteStore, Notification,
    NotificationStore, Patch, StoredMessage, Task, TaskPatch, TaskPriority, TaskQuery, TaskStatus,
    TaskStore, ThreadId, UserId,
};
pub use tool::{Tool, ToolCallOutcome, ToolCallRecord, ToolContext, ToolRegistry};
