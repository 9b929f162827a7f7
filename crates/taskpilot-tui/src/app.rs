use ratatui::layout::Rect;
use ratatui::text::Line;
use taskpilot_core::{
    AzureClient, ChatRole, Completion, CompletionError, Controller, Outcome, Submission,
    ViewSync,
};
use tracing::{debug, info, warn};

use crate::markdown::render_markdown;
use crate::tui::{AppEvent, EventSender};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

/// A visible message, already run through the render pipeline.
pub struct RenderedMessage {
    pub role: ChatRole,
    pub lines: Vec<Line<'static>>,
}

pub struct App {
    pub should_quit: bool,
    pub input_mode: InputMode,

    // Input box
    pub input: String,
    pub cursor: usize,

    // Conversation and request lifecycle
    pub controller: Controller,
    client: AzureClient,
    events: EventSender,

    // Message list
    pub view: ViewSync,
    pub animation_frame: u8,
    transcript: Vec<RenderedMessage>,

    // Areas for mouse hit-testing, set during render
    pub chat_area: Option<Rect>,
    pub jump_area: Option<Rect>,
}

impl App {
    pub fn new(client: AzureClient, events: EventSender) -> Self {
        Self {
            should_quit: false,
            input_mode: InputMode::Editing,

            input: String::new(),
            cursor: 0,

            controller: Controller::default(),
            client,
            events,

            view: ViewSync::new(),
            animation_frame: 0,
            transcript: Vec::new(),

            chat_area: None,
            jump_area: None,
        }
    }

    /// Submit the input buffer. Blank input and submissions while a reply
    /// is pending are ignored and leave the buffer untouched.
    pub fn submit(&mut self) {
        let history = match self.controller.submit(&self.input) {
            Submission::Accepted(history) => history,
            Submission::Ignored(reason) => {
                debug!(?reason, "submission ignored");
                return;
            }
        };

        self.input.clear();
        self.cursor = 0;

        if let Err(e) = self.client.ensure_credential() {
            self.controller.abandon(e);
            return;
        }

        let client = self.client.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = client.complete(&history).await;
            if events.send(AppEvent::Completion(result)).is_err() {
                warn!("event loop closed before completion arrived");
            }
        });
    }

    pub fn on_completion(&mut self, result: Result<Completion, CompletionError>) {
        match self.controller.finish(result) {
            Outcome::Replied => info!("reply appended"),
            Outcome::Degraded => info!("fallback reply appended"),
            Outcome::Failed(_) | Outcome::Stale => {}
        }
    }

    /// Feed the current log length and busy state to the view; new content
    /// or a busy toggle pulls the list to the bottom.
    pub fn sync_view(&mut self) {
        let log = self.controller.log();
        self.view.observe(log.visible_len(), self.controller.is_busy());
    }

    /// Rendered visible messages. Messages never change once appended, so
    /// each is rendered exactly once.
    pub fn transcript(&mut self) -> &[RenderedMessage] {
        let visible = self.controller.log().visible();
        for message in &visible[self.transcript.len()..] {
            self.transcript.push(RenderedMessage {
                role: message.role,
                lines: render_markdown(&message.content),
            });
        }
        &self.transcript
    }

    pub fn is_busy(&self) -> bool {
        self.controller.is_busy()
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.is_busy() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }
}
