pub mod azure;

pub use azure::AzureClient;

use crate::state::ChatMessage;

/// Sampling temperature sent with every request.
pub const TEMPERATURE: f64 = 0.7;

/// Assistant text substituted for a reply that arrived with the wrong shape.
pub const FALLBACK_REPLY: &str = "Hmm, something went wrong.";

/// A response that made it back from the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// `choices[0].message` decoded as an assistant message.
    Reply(ChatMessage),
    /// The body was JSON but not a usable completion.
    Malformed { reason: String },
}

impl Completion {
    /// The message to append to the log. Degraded replies become the
    /// fixed fallback text.
    pub fn into_message(self) -> ChatMessage {
        match self {
            Completion::Reply(message) => message,
            Completion::Malformed { .. } => ChatMessage::assistant(FALLBACK_REPLY),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Completion::Malformed { .. })
    }
}
