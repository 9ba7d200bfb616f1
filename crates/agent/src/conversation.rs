//! Conversation context extraction.
//!
//! Short follow-ups like "yes" or "never mind" only make sense against the
//! turns before them. This module classifies a message as confirming,
//! denying, or neither, and recovers the delete request the assistant last
//! asked the user to confirm.
//!
//! Classification is an ordered rule table: the first rule that matches
//! decides the intent. Confirmation rules come before denial rules, so a
//! message matching both is a confirmation.

use regex_lite::Regex;
use serde::Serialize;
use slo_core::message::{ConversationTurn, Role};
use std::sync::LazyLock;

/// How many trailing turns [`extract_pending_action`] looks at.
pub const PENDING_LOOKBACK: usize = 6;

/// What a short user message means in context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Confirm,
    Deny,
    Neither,
}

enum Matcher {
    /// The whole trimmed, lower-cased message is one of these tokens.
    Exact(&'static [&'static str]),
    /// The pattern matches somewhere in the message.
    Pattern(Regex),
}

impl Matcher {
    fn matches(&self, text: &str) -> bool {
        match self {
            Matcher::Exact(tokens) => tokens.contains(&text),
            Matcher::Pattern(re) => re.is_match(text),
        }
    }
}

struct Rule {
    matcher: Matcher,
    intent: Intent,
}

const CONFIRM_TOKENS: &[&str] = &[
    "yes", "yep", "yeah", "y", "yup", "sure", "ok", "okay", "alright", "all right",
    "go ahead", "proceed", "do it", "go for it", "that's right", "correct",
    "exactly", "absolutely", "definitely", "of course", "indeed", "confirm",
    "confirmed", "approved", "agreed", "agree", "sounds good", "looks good",
    "perfect", "right", "true", "affirmative", "👍", "✓", "✅",
];

const CONFIRM_PATTERNS: &[&str] = &[
    r"^yes,?\s*(please|go ahead|do it|proceed)",
    r"^that'?s?\s*(correct|right|good|perfect)",
    r"^sounds?\s*good",
    r"^looks?\s*good",
    r"^i\s*(want|would like)\s*to\s*(proceed|continue|go ahead)",
    r"please\s*(go ahead|proceed|do it)",
    r"^(go|do)\s*(ahead|it)",
];

const DENY_TOKENS: &[&str] = &[
    "no", "nope", "nah", "n", "never", "not", "cancel", "stop", "abort",
    "don't", "dont", "never mind", "nevermind", "forget it", "no thanks",
    "no thank you", "i changed my mind", "actually no", "wait", "hold on",
    "❌", "✗", "❎",
];

const DENY_PATTERNS: &[&str] = &[
    r"^no,?\s*(don'?t|stop|cancel|wait)",
    r"^(don'?t|stop|cancel)\s*(do|go)",
    r"i\s*(don'?t|do not)\s*want",
    r"^actually,?\s*no",
    r"^on second thought",
    r"^wait,?\s*(no|stop)",
];

/// Phrases an assistant uses when asking the user to confirm a delete.
const CONFIRMATION_REQUEST_PATTERNS: &[&str] = &[
    r"are you sure.*want.*delete",
    r"confirm.*delete",
    r"want.*proceed.*delet",
    r"should i.*delete",
    r"let me confirm.*are you sure",
    r"want me to.*delete",
    r"this seems to be.*delete.*confirm",
    r"make sure.*intended.*before proceeding",
    r"proceed with deleting",
];

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|p| match Regex::new(p) {
            Ok(re) => Some(re),
            Err(e) => {
                tracing::error!(pattern = p, error = %e, "invalid intent pattern");
                None
            }
        })
        .collect()
}

static RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    let mut rules = vec![Rule {
        matcher: Matcher::Exact(CONFIRM_TOKENS),
        intent: Intent::Confirm,
    }];
    rules.extend(compile(CONFIRM_PATTERNS).into_iter().map(|re| Rule {
        matcher: Matcher::Pattern(re),
        intent: Intent::Confirm,
    }));
    rules.push(Rule {
        matcher: Matcher::Exact(DENY_TOKENS),
        intent: Intent::Deny,
    });
    rules.extend(compile(DENY_PATTERNS).into_iter().map(|re| Rule {
        matcher: Matcher::Pattern(re),
        intent: Intent::Deny,
    }));
    rules
});

static CONFIRMATION_REQUESTS: LazyLock<Vec<Regex>> =
    LazyLock::new(|| compile(CONFIRMATION_REQUEST_PATTERNS));

/// Classify a user message. The first matching rule wins.
pub fn classify_intent(text: &str) -> Intent {
    let text = text.trim().to_lowercase();
    RULES
        .iter()
        .find(|rule| rule.matcher.matches(&text))
        .map_or(Intent::Neither, |rule| rule.intent)
}

/// Whether the message agrees to what was asked.
pub fn classify_confirmation(text: &str) -> bool {
    classify_intent(text) == Intent::Confirm
}

/// Whether the message declines what was asked. Never true for a message
/// that is also a confirmation.
pub fn classify_denial(text: &str) -> bool {
    classify_intent(text) == Intent::Deny
}

/// The kind of write a user asked for and the assistant wanted confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    DeleteJournal,
    DeleteCalendarEvent,
    DeleteTask,
    DeleteSomething,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::DeleteJournal => "delete_journal",
            ActionKind::DeleteCalendarEvent => "delete_calendar_event",
            ActionKind::DeleteTask => "delete_task",
            ActionKind::DeleteSomething => "delete_something",
        }
    }

    fn context(&self) -> &'static str {
        match self {
            ActionKind::DeleteJournal => "User requested to delete a journal entry",
            ActionKind::DeleteCalendarEvent => "User requested to delete a calendar event",
            ActionKind::DeleteTask => "User requested to delete a task",
            ActionKind::DeleteSomething => "User requested to delete something",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    None,
}

/// A write the user asked for in an earlier turn that has not run yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingAction {
    pub action: Option<ActionKind>,
    pub context: Option<String>,
    pub confidence: Confidence,
    /// The lower-cased user message that asked for it.
    pub request: Option<String>,
}

impl PendingAction {
    /// Nothing is pending.
    pub fn none() -> Self {
        Self {
            action: None,
            context: None,
            confidence: Confidence::None,
            request: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.action.is_some()
    }

    fn from_request(content: String) -> Self {
        let (action, confidence) = if content.contains("journal") {
            (ActionKind::DeleteJournal, Confidence::High)
        } else if content.contains("calendar") {
            (ActionKind::DeleteCalendarEvent, Confidence::High)
        } else if content.contains("task") {
            (ActionKind::DeleteTask, Confidence::High)
        } else {
            (ActionKind::DeleteSomething, Confidence::Medium)
        };
        Self {
            action: Some(action),
            context: Some(action.context().to_string()),
            confidence,
            request: Some(content),
        }
    }
}

/// Recover the pending delete from the last [`PENDING_LOOKBACK`] turns.
///
/// Newest first, the most recent user turn mentioning "delete" picks the
/// action, and any assistant turn asking for delete confirmation sets the
/// confirmation flag. Both must be present, otherwise nothing is pending.
pub fn extract_pending_action(history: &[ConversationTurn]) -> PendingAction {
    let start = history.len().saturating_sub(PENDING_LOOKBACK);
    let mut request: Option<String> = None;
    let mut asked_confirmation = false;

    for turn in history[start..].iter().rev() {
        let content = turn.text().to_lowercase();
        match turn.role {
            Role::Assistant => {
                if !asked_confirmation
                    && CONFIRMATION_REQUESTS.iter().any(|re| re.is_match(&content))
                {
                    asked_confirmation = true;
                }
            }
            Role::User => {
                if request.is_none() && content.contains("delete") {
                    request = Some(content);
                }
            }
        }
    }

    match request {
        Some(content) if asked_confirmation => PendingAction::from_request(content),
        _ => PendingAction::none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirmations() {
        assert!(classify_confirmation("yes"));
        assert!(classify_confirmation("  Sounds good "));
        assert!(classify_confirmation("go ahead and do it"));
        assert!(classify_confirmation("Yes, please"));
        assert!(classify_confirmation("I would like to proceed"));
        assert!(classify_confirmation("👍"));
        assert!(!classify_confirmation("what is my next task?"));
    }

    #[test]
    fn denials() {
        assert!(classify_denial("no, stop"));
        assert!(classify_denial("cancel"));
        assert!(classify_denial("Actually, no"));
        assert!(classify_denial("I don't want that anymore"));
        assert!(!classify_confirmation("no, stop"));
        assert!(!classify_confirmation("cancel"));
        assert!(!classify_denial("what is my next task?"));
    }

    #[test]
    fn confirmation_takes_precedence() {
        // Matches "^(go|do)\s*(ahead|it)" and "i\s*(don'?t|do not)\s*want".
        let text = "go ahead, i don't want it anymore";
        assert_eq!(classify_intent(text), Intent::Confirm);
        assert!(classify_confirmation(text));
        assert!(!classify_denial(text));
    }

    #[test]
    fn neither() {
        assert_eq!(classify_intent("show my tasks for tomorrow"), Intent::Neither);
        assert_eq!(classify_intent(""), Intent::Neither);
    }

    #[test]
    fn pending_delete_journal() {
        let history = vec![
            ConversationTurn::user("delete my journal about exams"),
            ConversationTurn::assistant("Are you sure you want to delete this journal entry?"),
        ];
        let pending = extract_pending_action(&history);
        assert_eq!(pending.action, Some(ActionKind::DeleteJournal));
        assert_eq!(pending.confidence, Confidence::High);
        assert_eq!(pending.request.as_deref(), Some("delete my journal about exams"));
    }

    #[test]
    fn generic_delete_is_medium_confidence() {
        let history = vec![
            ConversationTurn::user("Delete the thing from yesterday"),
            ConversationTurn::assistant("Should I delete the note titled Lab 3?"),
        ];
        let pending = extract_pending_action(&history);
        assert_eq!(pending.action, Some(ActionKind::DeleteSomething));
        assert_eq!(pending.confidence, Confidence::Medium);
    }

    #[test]
    fn needs_both_request_and_confirmation_prompt() {
        let only_request = vec![
            ConversationTurn::user("delete my calendar event"),
            ConversationTurn::assistant("Which event do you mean?"),
        ];
        assert_eq!(extract_pending_action(&only_request), PendingAction::none());

        let only_prompt = vec![
            ConversationTurn::user("show my tasks"),
            ConversationTurn::assistant("Do you want me to delete the old ones?"),
        ];
        assert!(!extract_pending_action(&only_prompt).is_pending());
    }

    #[test]
    fn most_recent_delete_request_wins() {
        let history = vec![
            ConversationTurn::user("delete my journal"),
            ConversationTurn::assistant("Done."),
            ConversationTurn::user("now delete the calendar event for friday"),
            ConversationTurn::assistant("Are you sure you want to delete Friday's study session?"),
        ];
        let pending = extract_pending_action(&history);
        assert_eq!(pending.action, Some(ActionKind::DeleteCalendarEvent));
    }

    #[test]
    fn lookback_is_bounded() {
        let mut history = vec![ConversationTurn::user("delete my task list item")];
        for _ in 0..3 {
            history.push(ConversationTurn::assistant("Should I delete it?"));
            history.push(ConversationTurn::user("tell me about my week"));
        }
        // The delete request is now seven turns back.
        assert!(!extract_pending_action(&history).is_pending());
    }
}
