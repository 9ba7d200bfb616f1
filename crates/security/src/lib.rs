//! Policy guard for Slo: scope checks, rate limiting and audit logging.
//!
//! Provides:
//! - **Scopes**: per-turn capability checks and scope resolution
//! - **Rate limiting**: sliding-window limiter keyed by identity
//! - **Audit logging**: one structured entry per tool invocation

pub mod audit;
pub mod guard;

pub use audit::{AuditEntry, AuditLogger, AuditSink, TracingSink};
pub use guard::{
    agent_rate_key, check_scope, FullAccess, GuardError, RateLimiter, ScopeResolver, StaticScopes,
};
