pub mod ai;
pub mod config;
pub mod controller;
pub mod conversation;
pub mod error;
pub mod state;
pub mod view;

// Re-export main types for convenience
pub use ai::{AzureClient, Completion, FALLBACK_REPLY, TEMPERATURE};
pub use config::Config;
pub use controller::{Controller, IgnoreReason, Outcome, RequestState, Submission};
pub use conversation::{ConversationLog, DEFAULT_DIRECTIVE};
pub use error::{CompletionError, ConfigError, ConversationError};
pub use state::{ChatMessage, ChatRole};
pub use view::{ViewSync, NEAR_BOTTOM_THRESHOLD};
