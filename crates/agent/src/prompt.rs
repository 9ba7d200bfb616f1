//! Prompt text: the system prompt and the per-turn user message.

use crate::conversation::{ActionKind, Intent, PendingAction};

pub const SYSTEM_PROMPT: &str = "You are SLO's study agent. You can read and write journals, tasks, notes, calendar, notifications. \
CRITICAL: Always check the provided context_pack first - it contains the current date and time. \
Use the current_time info for all date/time references. When users say 'tomorrow', 'next week', etc., \
calculate dates relative to the current_datetime provided in context. \
Always use proper current dates - never use old dates from past years. \
Use ISO8601 UTC datetimes in tool calls. \
If planning to make more than 2 writes, summarize and ask for confirmation unless 'confirm_writes' is false. \
\n\nIMPORTANT DATA DISTINCTION: \
- NOTES = Notion notes (synced from user's Notion workspace) - use 'list_notes' tool \
- JOURNALS = Local journal entries (written directly in SLO) - use 'get_journals' tool \
When users say 'notes', they mean Notion notes unless they specifically mention 'journal'. \
When users say 'my OOP in Java note' or similar, search Notion notes, not journals. \
\n\nCONVERSATION INTELLIGENCE: \
You maintain conversation context across turns. When a user responds with confirmations like 'yes', 'go ahead', \
'do it', 'proceed', etc., understand what they're confirming based on the conversation history. \
Don't ask follow-up questions when the user has already provided clear confirmation. \
Be intelligent about understanding user intent - if they ask to delete something specific and then confirm, proceed immediately. \
Only ask clarifying questions when genuinely ambiguous. \
\n\nERROR HANDLING: When tool calls return errors, provide helpful context to the user. \
If calendar access fails, explain they need to connect their Outlook account. \
If operations fail, suggest practical next steps. Never expose raw technical errors. \
When you can't complete a requested action due to missing setup (like calendar access), \
explain what the user needs to do and offer alternative ways to help them. \
If you encounter errors fetching data, work with what you have and inform the user gracefully.";

fn tool_hint(action: ActionKind) -> &'static str {
    match action {
        ActionKind::DeleteJournal => {
            "Use the delete_journal tool with the appropriate journal ID to delete the journal entry."
        }
        ActionKind::DeleteCalendarEvent => {
            "Use the calendar_delete_event tool with the appropriate event ID to delete the calendar event."
        }
        ActionKind::DeleteTask => "Use the appropriate task deletion tool to delete the task.",
        ActionKind::DeleteSomething => "",
    }
}

/// Extra guidance appended to the user message when a short reply resolves
/// a pending action. Empty when nothing is pending or the reply is neither.
pub fn augmented_instruction(intent: Intent, pending: &PendingAction) -> String {
    let Some(action) = pending.action else {
        return String::new();
    };
    let context = pending.context.as_deref().unwrap_or_default();

    match intent {
        Intent::Confirm => format!(
            "\n\nCONVERSATION CONTEXT: The user is confirming a previous request. \
             EXECUTE ACTION NOW: {action} - {context}. \
             Original request: '{request}'. \
             Action required: {hint} \
             Do NOT ask for further confirmation - the user has already confirmed. \
             Take the action immediately and report success.",
            action = action.as_str(),
            request = pending.request.as_deref().unwrap_or_default(),
            hint = tool_hint(action),
        ),
        Intent::Deny => format!(
            "\n\nCONVERSATION CONTEXT: The user is declining/canceling a previous request. \
             Do not proceed with the pending action: {action}. \
             Acknowledge the cancellation and ask how else you can help.",
            action = action.as_str(),
        ),
        Intent::Neither => String::new(),
    }
}

/// The user message that opens a turn.
pub fn user_message(context_json: &str, user_text: &str, confirm_writes: bool, instruction: &str) -> String {
    format!(
        "Context: {context_json}\n\nUser request: {user_text}\n\nSettings: confirm_writes={confirm_writes}{instruction}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::extract_pending_action;
    use slo_core::message::ConversationTurn;

    fn pending_journal_delete() -> PendingAction {
        extract_pending_action(&[
            ConversationTurn::user("delete my journal about exams"),
            ConversationTurn::assistant("Are you sure you want to delete this journal entry?"),
        ])
    }

    #[test]
    fn confirm_directs_immediate_execution() {
        let text = augmented_instruction(Intent::Confirm, &pending_journal_delete());
        assert!(text.contains("EXECUTE ACTION NOW: delete_journal"));
        assert!(text.contains("Do NOT ask for further confirmation"));
        assert!(text.contains("delete_journal tool"));
        assert!(text.contains("'delete my journal about exams'"));
    }

    #[test]
    fn deny_acknowledges_cancellation() {
        let text = augmented_instruction(Intent::Deny, &pending_journal_delete());
        assert!(text.contains("declining/canceling"));
        assert!(text.contains("delete_journal"));
        assert!(!text.contains("EXECUTE"));
    }

    #[test]
    fn nothing_pending_adds_nothing() {
        assert!(augmented_instruction(Intent::Confirm, &PendingAction::none()).is_empty());
        assert!(augmented_instruction(Intent::Neither, &pending_journal_delete()).is_empty());
    }

    #[test]
    fn user_message_layout() {
        let msg = user_message("{}", "what's due?", true, "");
        assert_eq!(msg, "Context: {}\n\nUser request: what's due?\n\nSettings: confirm_writes=true");
    }
}
