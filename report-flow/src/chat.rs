use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    error::{FlowError, Result},
    models::Message,
    services::QuestionAnswerer,
    store::Store,
};

pub const GREETING: &str = "Hi! I can answer questions about your medical report. Try asking: \"Is my cholesterol normal?\" or \"What does LDL mean?\"";
pub const ANSWER_FALLBACK_MESSAGE: &str = "Sorry, I encountered an error. Please try again.";

/// Transcript plus input state for one report.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatState {
    /// Append-only. The first entry is always the seeded greeting.
    pub messages: Vec<Message>,
    /// True while exactly one question is outstanding.
    pub pending: bool,
    pub draft: String,
}

/// Keys the chat input reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatKey {
    Char(char),
    Backspace,
    /// Confirm key. With the newline modifier held it inserts a line break instead of sending.
    Enter { newline_modifier: bool },
}

/// What a key press did to the input.
#[derive(Debug)]
#[must_use = "a submitted question is abandoned when its ticket is dropped"]
pub enum KeyOutcome {
    Edited,
    /// Nothing changed: the input is locked, or there was nothing to send.
    Ignored,
    /// The draft was committed; drive the question with [`ChatController::answer`].
    Submitted(PendingQuestion),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    Answered(String),
    /// The failure was rendered into the transcript as an assistant message.
    Failed(FlowError),
    /// Blank question, or another question was still pending.
    Ignored,
    /// The session closed before the answer arrived; nothing was written.
    Discarded,
}

/// Provisional half of a send. Consumed by [`ChatController::resolve`].
///
/// Dropping an unresolved ticket, including dropping an in-flight [`ChatController::answer`]
/// future, settles it with the fallback message so the input unlocks.
#[derive(Debug)]
#[must_use = "dropping the ticket abandons the question"]
pub struct PendingQuestion {
    question: String,
    state: Store<ChatState>,
    lifetime: CancellationToken,
    settled: bool,
}

impl PendingQuestion {
    pub fn question(&self) -> &str {
        &self.question
    }
}

impl Drop for PendingQuestion {
    fn drop(&mut self) {
        if self.settled || self.lifetime.is_cancelled() {
            return;
        }

        warn!("Question {:?} abandoned before it was answered", self.question);
        self.state.update(|s| {
            s.messages.push(Message::assistant(ANSWER_FALLBACK_MESSAGE));
            s.pending = false;
            true
        });
    }
}

/// Owns the conversation about one report. The grounding context is fixed at creation.
#[derive(Clone)]
pub struct ChatController {
    answerer: Arc<dyn QuestionAnswerer>,
    context: Arc<str>,
    state: Store<ChatState>,
    lifetime: CancellationToken,
}

impl ChatController {
    /// Create the transcript for a freshly analyzed report, seeded with the greeting.
    pub fn initialize(
        answerer: Arc<dyn QuestionAnswerer>,
        context: impl Into<String>,
        lifetime: CancellationToken,
    ) -> Self {
        let context: String = context.into();
        info!(
            "Chat initialized with {} characters of report context",
            context.len()
        );

        Self {
            answerer,
            context: context.into(),
            state: Store::new(ChatState {
                messages: vec![Message::assistant(GREETING)],
                pending: false,
                draft: String::new(),
            }),
            lifetime,
        }
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn state(&self) -> &Store<ChatState> {
        &self.state
    }

    pub fn messages(&self) -> Vec<Message> {
        self.state.read(|s| s.messages.clone())
    }

    pub fn pending(&self) -> bool {
        self.state.read(|s| s.pending)
    }

    /// Replace the input buffer. Ignored while a question is pending.
    pub fn set_draft(&self, text: impl Into<String>) -> bool {
        let text = text.into();
        self.state.update(|s| {
            if s.pending || s.draft == text {
                return false;
            }
            s.draft = text;
            true
        })
    }

    /// Feed one key to the input. A committing key starts the send and hands back the
    /// pending question; the caller drives it to completion with [`ChatController::answer`].
    pub fn handle_key(&self, key: ChatKey) -> KeyOutcome {
        let edited = match key {
            ChatKey::Enter {
                newline_modifier: false,
            } => {
                return match self.begin_draft() {
                    Some(ticket) => KeyOutcome::Submitted(ticket),
                    None => KeyOutcome::Ignored,
                };
            }
            ChatKey::Enter {
                newline_modifier: true,
            } => self.edit_draft(|draft| {
                draft.push('\n');
                true
            }),
            ChatKey::Char(c) => self.edit_draft(|draft| {
                draft.push(c);
                true
            }),
            ChatKey::Backspace => self.edit_draft(|draft| draft.pop().is_some()),
        };

        if edited {
            KeyOutcome::Edited
        } else {
            KeyOutcome::Ignored
        }
    }

    /// Explicit send action: sends whatever is in the input buffer.
    pub async fn submit_draft(&self) -> SendOutcome {
        match self.begin_draft() {
            Some(ticket) => self.answer(ticket).await,
            None => SendOutcome::Ignored,
        }
    }

    /// Ask one question. Blank questions and sends while another is pending are dropped.
    pub async fn send(&self, question: &str) -> SendOutcome {
        match self.begin_send(question) {
            Some(ticket) => self.answer(ticket).await,
            None => SendOutcome::Ignored,
        }
    }

    /// Network phase of a send: ask the service, then resolve the pending question.
    pub async fn answer(&self, ticket: PendingQuestion) -> SendOutcome {
        let result = tokio::select! {
            biased;
            _ = self.lifetime.cancelled() => {
                info!("Session closed, dropping pending answer");
                return SendOutcome::Discarded;
            }
            result = self.answerer.answer_question(&ticket.question, &self.context) => result,
        };

        self.resolve(ticket, result)
    }

    fn begin_draft(&self) -> Option<PendingQuestion> {
        let draft = self.state.read(|s| s.draft.clone());
        self.begin_send(&draft)
    }

    /// Provisional phase: append the user's question, clear the input, mark pending.
    pub fn begin_send(&self, question: &str) -> Option<PendingQuestion> {
        if question.trim().is_empty() || self.lifetime.is_cancelled() {
            return None;
        }

        let accepted = self.state.update(|s| {
            if s.pending {
                return false;
            }
            s.messages.push(Message::user(question));
            s.draft.clear();
            s.pending = true;
            true
        });

        if !accepted {
            debug!("Question dropped, another one is still pending");
            return None;
        }

        info!("Question sent ({} characters)", question.len());
        Some(PendingQuestion {
            question: question.to_string(),
            state: self.state.clone(),
            lifetime: self.lifetime.clone(),
            settled: false,
        })
    }

    /// Resolution phase: append the answer, or the error text, and clear pending.
    pub fn resolve(&self, mut ticket: PendingQuestion, result: Result<String>) -> SendOutcome {
        ticket.settled = true;
        if self.lifetime.is_cancelled() {
            debug!("Dropping answer to {:?}, session closed", ticket.question);
            return SendOutcome::Discarded;
        }

        let (content, outcome) = match result {
            Ok(answer) => (answer.clone(), SendOutcome::Answered(answer)),
            Err(e) => {
                error!("Chat error: {}", e);
                (failure_message(&e), SendOutcome::Failed(e))
            }
        };

        self.state.update(|s| {
            s.messages.push(Message::assistant(content));
            s.pending = false;
            true
        });

        outcome
    }

    fn edit_draft(&self, edit: impl FnOnce(&mut String) -> bool) -> bool {
        self.state.update(|s| !s.pending && edit(&mut s.draft))
    }
}

/// Text shown in the transcript for a failed answer.
pub fn failure_message(error: &FlowError) -> String {
    match error {
        FlowError::AnswerFailed {
            detail: Some(detail),
            ..
        } if !detail.trim().is_empty() => detail.clone(),
        _ => ANSWER_FALLBACK_MESSAGE.to_string(),
    }
}
