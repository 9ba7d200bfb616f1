//! Per-turn agent policy.

use serde::{Deserialize, Serialize};

/// Limits applied to a single agent turn. Immutable for the duration of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentPolicy {
    /// Maximum model round-trips (loop iterations) per turn
    #[serde(default = "default_max_tool_calls")]
    pub max_tool_calls: u32,

    /// Maximum mutating tool calls executed per turn
    #[serde(default = "default_max_writes")]
    pub max_writes_per_turn: u32,

    /// Write count above which the user must confirm (unless suppressed)
    #[serde(default = "default_confirm_threshold")]
    pub require_confirm_threshold: u32,
}

fn default_max_tool_calls() -> u32 {
    12
}
fn default_max_writes() -> u32 {
    5
}
fn default_confirm_threshold() -> u32 {
    2
}

impl Default for AgentPolicy {
    fn default() -> Self {
        Self {
            max_tool_calls: default_max_tool_calls(),
            max_writes_per_turn: default_max_writes(),
            require_confirm_threshold: default_confirm_threshold(),
        }
    }
}

impl AgentPolicy {
    /// Check `require_confirm_threshold <= max_writes_per_turn <= max_tool_calls`.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_tool_calls == 0 {
            return Err("max_tool_calls must be at least 1".into());
        }
        if self.max_writes_per_turn > self.max_tool_calls {
            return Err(format!(
                "max_writes_per_turn ({}) must not exceed max_tool_calls ({})",
                self.max_writes_per_turn, self.max_tool_calls
            ));
        }
        if self.require_confirm_threshold > self.max_writes_per_turn {
            return Err(format!(
                "require_confirm_threshold ({}) must not exceed max_writes_per_turn ({})",
                self.require_confirm_threshold, self.max_writes_per_turn
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let policy = AgentPolicy::default();
        assert_eq!(policy.max_tool_calls, 12);
        assert_eq!(policy.max_writes_per_turn, 5);
        assert_eq!(policy.require_confirm_threshold, 2);
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn threshold_above_write_cap_rejected() {
        let policy = AgentPolicy {
            require_confirm_threshold: 6,
            ..AgentPolicy::default()
        };
        assert!(policy.validate().unwrap_err().contains("require_confirm_threshold"));
    }

    #[test]
    fn write_cap_above_step_bound_rejected() {
        let policy = AgentPolicy {
            max_tool_calls: 3,
            ..AgentPolicy::default()
        };
        assert!(policy.validate().is_err());
    }
}
