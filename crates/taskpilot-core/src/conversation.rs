use crate::error::ConversationError;
use crate::state::{ChatMessage, ChatRole};

/// Instruction sent as the first message of every request. Never displayed.
pub const DEFAULT_DIRECTIVE: &str = "You are a proactive and structured Task & Goal Management Assistant for a high-performing individual who manages weekly and quarterly goals by breaking them into clear, actionable tasks. Your job is to act like an intelligent assistant who helps users track their goals, schedule priorities, and maintain momentum day-to-day.

Do not use any of your own training.  If the user has not given you any information on their yearly, quarterly or weekly goals then please ask them to define them and start there.  Once you have their goals defined.  Ask them about habits that they would like to track.  Finally, once you've collected all this data please provide it back to them in tabular format.  If at anytime along the way they don't give you a specific completion date for goals or projects.  Please make sure that you ask them for completion dates.

I don't want you to suggest tasks or completion plans unless the user asks you for that info.

If the user asks you to list their stuff in a 3x3 fashion then create a table that is formatted as follows:

Yearly Goals ---- Completion date
Quarterly Goals------ Completion Date
Weekly Goals ------ Completion Date
Habits to Track This Week.";

/// Append-only, chronologically ordered message history for one session.
///
/// Index 0 always holds the system directive. Entries are never edited or
/// removed, and no further system message can be appended.
#[derive(Debug, Clone)]
pub struct ConversationLog {
    messages: Vec<ChatMessage>,
}

impl ConversationLog {
    pub fn new(directive: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::system(directive)],
        }
    }

    pub fn append(&mut self, message: ChatMessage) -> Result<(), ConversationError> {
        if message.role == ChatRole::System {
            return Err(ConversationError::SystemMessage);
        }
        self.messages.push(message);
        Ok(())
    }

    /// Append a user turn. Cannot be refused: the role is fixed.
    pub fn append_user(&mut self, text: impl Into<String>) {
        self.messages.push(ChatMessage::user(text));
    }

    /// Full history, directive included. This is what gets sent.
    pub fn snapshot(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// History minus the leading directive. This is what gets displayed.
    pub fn visible(&self) -> &[ChatMessage] {
        &self.messages[1..]
    }

    pub fn directive(&self) -> &str {
        &self.messages[0].content
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.visible().last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn visible_len(&self) -> usize {
        self.messages.len() - 1
    }
}

impl Default for ConversationLog {
    fn default() -> Self {
        Self::new(DEFAULT_DIRECTIVE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_with_directive() {
        let log = ConversationLog::default();
        assert_eq!(log.len(), 1);
        assert_eq!(log.snapshot()[0].role, ChatRole::System);
        assert_eq!(log.directive(), DEFAULT_DIRECTIVE);
        assert!(log.visible().is_empty());
        assert!(log.last().is_none());
    }

    #[test]
    fn test_append_preserves_order_and_prior_entries() {
        let mut log = ConversationLog::new("be brief");
        log.append(ChatMessage::user("A")).unwrap();
        let before: Vec<ChatMessage> = log.snapshot().to_vec();
        log.append(ChatMessage::assistant("B")).unwrap();

        assert_eq!(log.len(), 3);
        assert_eq!(&log.snapshot()[..2], before.as_slice());
        assert_eq!(log.visible(), &[ChatMessage::user("A"), ChatMessage::assistant("B")]);
        assert_eq!(log.last(), Some(&ChatMessage::assistant("B")));
    }

    #[test]
    fn test_system_append_rejected() {
        let mut log = ConversationLog::new("be brief");
        let err = log.append(ChatMessage::system("again")).unwrap_err();
        assert_eq!(err, ConversationError::SystemMessage);
        assert_eq!(log.len(), 1);
        assert_eq!(log.directive(), "be brief");
    }

    #[test]
    fn test_append_user_keeps_text_as_typed() {
        let mut log = ConversationLog::new("be brief");
        log.append_user("  plan my week ");
        assert_eq!(log.visible(), &[ChatMessage::user("  plan my week ")]);
        assert_eq!(log.snapshot()[0], ChatMessage::system("be brief"));
    }

    #[test]
    fn test_empty_content_is_still_appended() {
        let mut log = ConversationLog::default();
        log.append(ChatMessage::assistant("")).unwrap();
        assert_eq!(log.visible_len(), 1);
    }
}
