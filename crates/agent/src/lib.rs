//! The Slo study agent: one bounded, policy-guarded tool loop per turn.
//!
//! A turn goes through these stages:
//!
//! 1. **Resolve** short replies ("yes", "cancel") against recent history
//! 2. **Ground** the model with a compact context pack
//! 3. **Loop**: call the model, dispatch at most one tool per response
//!    through the write quota and registry, feed the result back
//! 4. **Finish** with the model's text, or a fixed notice when the step
//!    bound is reached
//!
//! [`ChatService`] wraps the loop with conversation history.

pub mod context_pack;
pub mod conversation;
pub mod loop_runner;
pub mod prompt;
pub mod session;

pub use context_pack::{ContextPack, ContextPackBuilder};
pub use conversation::{
    classify_confirmation, classify_denial, classify_intent, extract_pending_action, ActionKind,
    Confidence, Intent, PendingAction,
};
pub use loop_runner::{
    categorize_failure, AgentLoop, TurnError, TurnRequest, TurnResponse, TurnStatus,
    LOOP_EXHAUSTED_TEXT,
};
pub use session::{ChatService, AGENT_THREAD_TITLE};
