//! Request lifecycle: one outstanding completion at a time.
//!
//! The controller owns the conversation log and a two-state flag. It does
//! no I/O itself; the caller sends the history returned by [`Controller::submit`]
//! and feeds the result back through [`Controller::finish`].

use tracing::{error, info, warn};

use crate::ai::Completion;
use crate::conversation::ConversationLog;
use crate::error::CompletionError;
use crate::state::ChatMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestState {
    #[default]
    Idle,
    Awaiting,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// The user turn was appended; send this history.
    Accepted(Vec<ChatMessage>),
    Ignored(IgnoreReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Input was empty or whitespace only.
    Blank,
    /// A request is already in flight. Dropped, not queued.
    Busy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Replied,
    /// The fallback assistant message was appended.
    Degraded,
    /// Nothing appended; the user turn stands unanswered.
    Failed(String),
    /// A result arrived while idle and was discarded.
    Stale,
}

#[derive(Debug, Default)]
pub struct Controller {
    log: ConversationLog,
    state: RequestState,
    last_error: Option<String>,
}

impl Controller {
    pub fn new(log: ConversationLog) -> Self {
        Self {
            log,
            state: RequestState::Idle,
            last_error: None,
        }
    }

    pub fn log(&self) -> &ConversationLog {
        &self.log
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    pub fn is_busy(&self) -> bool {
        self.state == RequestState::Awaiting
    }

    /// Description of the most recent failed exchange, cleared by the next reply.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn submit(&mut self, text: &str) -> Submission {
        if text.trim().is_empty() {
            return Submission::Ignored(IgnoreReason::Blank);
        }
        if self.is_busy() {
            info!("submission dropped: request already in flight");
            return Submission::Ignored(IgnoreReason::Busy);
        }

        self.log.append_user(text);
        self.state = RequestState::Awaiting;
        info!(turns = self.log.visible_len(), "submission accepted");

        Submission::Accepted(self.log.snapshot().to_vec())
    }

    pub fn finish(&mut self, result: Result<Completion, CompletionError>) -> Outcome {
        if !self.is_busy() {
            warn!("completion result arrived while idle; discarding");
            return Outcome::Stale;
        }
        self.state = RequestState::Idle;

        match result {
            Ok(completion) => {
                let degraded = completion.is_degraded();
                if let Err(e) = self.log.append(completion.into_message()) {
                    return self.fail(e.to_string());
                }
                self.last_error = None;
                if degraded {
                    Outcome::Degraded
                } else {
                    Outcome::Replied
                }
            }
            Err(e) => self.fail(e.to_string()),
        }
    }

    /// Give up on an accepted submission before dispatch, e.g. when the
    /// credential is missing.
    pub fn abandon(&mut self, err: CompletionError) -> Outcome {
        self.finish(Err(err))
    }

    fn fail(&mut self, reason: String) -> Outcome {
        error!(%reason, "completion failed; user turn left unanswered");
        self.last_error = Some(reason.clone());
        Outcome::Failed(reason)
    }
}
