//! Runs a [`CodeInput`] on its own tokio task.
//!
//! The task is the buffer's event loop: it owns the input, receives edits
//! over an `mpsc` channel and sleeps until the pending deadline. Because
//! one task does everything, a pass never overlaps an edit and no lock is
//! needed. Edits that arrive at the same instant the timer fires are
//! handled first.

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};

use crate::code_input::CodeInput;
use crate::{CoreError, CoreResult};

/// Input delivered to a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditInput {
    /// Full buffer text after an edit
    TextChanged(String),
    /// New caret character offset
    CaretMoved(usize),
}

/// What the buffer shows after the latest pass or caret move.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplaySnapshot {
    pub display: String,
    pub is_markup: bool,
    pub caret: usize,
    pub display_caret: usize,
    pub passes: u64,
}

impl DisplaySnapshot {
    fn of(input: &CodeInput) -> Self {
        Self {
            display: input.display().as_str().to_string(),
            is_markup: input.display().is_markup(),
            caret: input.caret(),
            display_caret: input.display_caret(),
            passes: input.passes(),
        }
    }
}

/// Handle to a running highlight task.
pub struct HighlightSession {
    edits: mpsc::Sender<EditInput>,
    display: watch::Receiver<DisplaySnapshot>,
    task: JoinHandle<CodeInput>,
}

impl HighlightSession {
    /// Moves `input` onto a new task. Must be called inside a tokio runtime.
    pub fn spawn(input: CodeInput) -> Self {
        let (edits_tx, edits_rx) = mpsc::channel(64);
        let (display_tx, display_rx) = watch::channel(DisplaySnapshot::of(&input));
        let task = tokio::spawn(drive(input, edits_rx, display_tx));

        Self {
            edits: edits_tx,
            display: display_rx,
            task,
        }
    }

    /// Sends the buffer's full text after an edit.
    pub async fn text_changed(&self, text: impl Into<String>) -> CoreResult<()> {
        self.send(EditInput::TextChanged(text.into())).await
    }

    /// Sends a caret move.
    pub async fn caret_moved(&self, caret: usize) -> CoreResult<()> {
        self.send(EditInput::CaretMoved(caret)).await
    }

    async fn send(&self, input: EditInput) -> CoreResult<()> {
        self.edits
            .send(input)
            .await
            .map_err(|_| CoreError::Session("edit channel closed".to_string()))
    }

    /// Watches the display published after each pass.
    pub fn display(&self) -> watch::Receiver<DisplaySnapshot> {
        self.display.clone()
    }

    /// Closes the edit stream and returns the input. A pass still pending
    /// at this point is dropped.
    pub async fn finish(self) -> CoreResult<CodeInput> {
        drop(self.edits);
        self.task
            .await
            .map_err(|e| CoreError::Session(e.to_string()))
    }
}

async fn drive(
    mut input: CodeInput,
    mut edits: mpsc::Receiver<EditInput>,
    display: watch::Sender<DisplaySnapshot>,
) -> CodeInput {
    loop {
        let deadline = input.next_deadline();

        tokio::select! {
            biased;

            edit = edits.recv() => match edit {
                Some(EditInput::TextChanged(text)) => input.on_text_changed(text),
                Some(EditInput::CaretMoved(caret)) => {
                    input.set_caret(caret);
                    display.send_replace(DisplaySnapshot::of(&input));
                }
                None => break,
            },

            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                if input.poll(Instant::now()) {
                    display.send_replace(DisplaySnapshot::of(&input));
                }
            }
        }
    }

    if input.next_deadline().is_some() {
        tracing::debug!("Session closed with a pending highlight pass");
    }
    input
}
