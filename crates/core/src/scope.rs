//! Capability scopes gating read/write access to each domain area.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A single capability tag, e.g. `journals:write`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Scope {
    #[serde(rename = "journals:read")]
    JournalsRead,
    #[serde(rename = "journals:write")]
    JournalsWrite,
    #[serde(rename = "tasks:read")]
    TasksRead,
    #[serde(rename = "tasks:write")]
    TasksWrite,
    #[serde(rename = "notes:read")]
    NotesRead,
    #[serde(rename = "notes:write")]
    NotesWrite,
    #[serde(rename = "calendar:read")]
    CalendarRead,
    #[serde(rename = "calendar:write")]
    CalendarWrite,
    #[serde(rename = "notifications:read")]
    NotificationsRead,
    #[serde(rename = "notifications:write")]
    NotificationsWrite,
    #[serde(rename = "analytics:read")]
    AnalyticsRead,
}

impl Scope {
    pub const ALL: [Scope; 11] = [
        Scope::JournalsRead,
        Scope::JournalsWrite,
        Scope::TasksRead,
        Scope::TasksWrite,
        Scope::NotesRead,
        Scope::NotesWrite,
        Scope::CalendarRead,
        Scope::CalendarWrite,
        Scope::NotificationsRead,
        Scope::NotificationsWrite,
        Scope::AnalyticsRead,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::JournalsRead => "journals:read",
            Scope::JournalsWrite => "journals:write",
            Scope::TasksRead => "tasks:read",
            Scope::TasksWrite => "tasks:write",
            Scope::NotesRead => "notes:read",
            Scope::NotesWrite => "notes:write",
            Scope::CalendarRead => "calendar:read",
            Scope::CalendarWrite => "calendar:write",
            Scope::NotificationsRead => "notifications:read",
            Scope::NotificationsWrite => "notifications:write",
            Scope::AnalyticsRead => "analytics:read",
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Scope::ALL
            .iter()
            .copied()
            .find(|scope| scope.as_str() == s)
            .ok_or_else(|| format!("unknown scope '{s}'"))
    }
}

/// The scopes granted to a user for one turn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeSet(BTreeSet<Scope>);

impl ScopeSet {
    /// Every known scope.
    pub fn all() -> Self {
        Self(Scope::ALL.into_iter().collect())
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn contains(&self, scope: Scope) -> bool {
        self.0.contains(&scope)
    }

    pub fn insert(&mut self, scope: Scope) {
        self.0.insert(scope);
    }

    pub fn remove(&mut self, scope: Scope) {
        self.0.remove(&scope);
    }

    pub fn iter(&self) -> impl Iterator<Item = Scope> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Scope> for ScopeSet {
    fn from_iter<I: IntoIterator<Item = Scope>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_contains_write_scopes() {
        let scopes = ScopeSet::all();
        assert!(scopes.contains(Scope::JournalsWrite));
        assert!(scopes.contains(Scope::NotesWrite));
        assert_eq!(scopes.iter().count(), 11);
    }

    #[test]
    fn parse_and_display_roundtrip() {
        let scope: Scope = "calendar:read".parse().unwrap();
        assert_eq!(scope, Scope::CalendarRead);
        assert_eq!(scope.to_string(), "calendar:read");
        assert!("calendar:delete".parse::<Scope>().is_err());
    }

    #[test]
    fn serializes_as_tag_strings() {
        let scopes: ScopeSet = [Scope::TasksRead].into_iter().collect();
        let json = serde_json::to_string(&scopes).unwrap();
        assert_eq!(json, r#"["tasks:read"]"#);
    }
}
