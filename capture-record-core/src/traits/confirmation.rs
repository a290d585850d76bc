use std::sync::Arc;

use parking_lot::Mutex;

/// Answer to a confirmation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationResult {
    /// No answer yet.
    None,
    Yes,
    No,
}

/// Non-blocking yes/no question put to the user.
///
/// `request_confirmation` returns immediately; the controller polls for the
/// answer once per tick. Each answer is returned by `poll_result` once.
pub trait ConfirmationPrompt: Send {
    fn request_confirmation(&mut self, title: &str, body: &str, yes_label: &str, no_label: &str);

    fn poll_result(&mut self) -> ConfirmationResult;
}

/// Prompt text captured by [`QueuedPrompt`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptRequest {
    pub title: String,
    pub body: String,
    pub yes_label: String,
    pub no_label: String,
}

#[derive(Debug, Default)]
struct PromptState {
    request: Option<PromptRequest>,
    answer: Option<bool>,
}

/// Prompt answered from elsewhere, e.g. a UI thread holding a clone.
#[derive(Debug, Clone, Default)]
pub struct QueuedPrompt {
    state: Arc<Mutex<PromptState>>,
}

impl QueuedPrompt {
    pub fn new() -> Self {
        Self::default()
    }

    /// The question waiting for an answer, if any.
    pub fn pending_request(&self) -> Option<PromptRequest> {
        self.state.lock().request.clone()
    }

    /// Answers the pending question. Ignored when nothing is pending.
    pub fn answer(&self, yes: bool) {
        let mut state = self.state.lock();
        if state.request.is_some() {
            state.answer = Some(yes);
        }
    }
}

impl ConfirmationPrompt for QueuedPrompt {
    fn request_confirmation(&mut self, title: &str, body: &str, yes_label: &str, no_label: &str) {
        let mut state = self.state.lock();
        state.request = Some(PromptRequest {
            title: title.to_string(),
            body: body.to_string(),
            yes_label: yes_label.to_string(),
            no_label: no_label.to_string(),
        });
        state.answer = None;
    }

    fn poll_result(&mut self) -> ConfirmationResult {
        let mut state = self.state.lock();
        match state.answer.take() {
            Some(yes) => {
                state.request = None;
                if yes {
                    ConfirmationResult::Yes
                } else {
                    ConfirmationResult::No
                }
            }
            None => ConfirmationResult::None,
        }
    }
}

/// Prompt that answers every request immediately with a fixed result.
#[derive(Debug, Clone, Copy)]
pub struct FixedAnswer(pub bool);

impl ConfirmationPrompt for FixedAnswer {
    fn request_confirmation(&mut self, title: &str, _body: &str, _yes: &str, _no: &str) {
        log::debug!("auto-answering \"{title}\" with {}", if self.0 { "yes" } else { "no" });
    }

    fn poll_result(&mut self) -> ConfirmationResult {
        if self.0 {
            ConfirmationResult::Yes
        } else {
            ConfirmationResult::No
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answer_is_consumed_once() {
        let mut prompt = QueuedPrompt::new();
        let ui = prompt.clone();

        ui.answer(true);
        assert_eq!(prompt.poll_result(), ConfirmationResult::None);

        prompt.request_confirmation("Overwrite?", "capture_a.flac exists", "Overwrite", "Cancel");
        assert_eq!(ui.pending_request().unwrap().yes_label, "Overwrite");
        assert_eq!(prompt.poll_result(), ConfirmationResult::None);

        ui.answer(false);
        assert_eq!(prompt.poll_result(), ConfirmationResult::No);
        assert_eq!(prompt.poll_result(), ConfirmationResult::None);
        assert!(ui.pending_request().is_none());
    }
}
