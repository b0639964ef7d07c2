//! Terminal presentation of the transcript.
//!
//! The view subscribes to transcript changes. In `Stream` mode fragments are
//! written as they arrive; in `Rendered` mode a typing indicator is shown and
//! the finished answer is printed as rendered markdown. Without a terminal
//! (`interactive == false`) nothing is drawn mid-exchange: answers are buffered
//! and printed once the exchange ends, so piped output never holds a partial
//! answer.

use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::transcript::{Message, Sender, TranscriptChange, TranscriptObserver};

pub const TYPING_INDICATOR: &str = "AI Chef sedang mengetik...";
const CLEAR_LINE: &str = "\r\x1b[2K";
const CLEAR_TO_END: &str = "\x1b[J";
const USER_PREFIX: &str = "› ";

/// How assistant answers are shown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    /// Raw text, written fragment by fragment.
    #[default]
    Stream,
    /// Typing indicator, then the whole answer as rendered markdown.
    Rendered,
}

/// Pure text → markup function.
pub type RenderFn = fn(&str) -> String;

struct ViewState<W> {
    out: W,
    mode: DisplayMode,
    render: RenderFn,
    /// Terminal control sequences are allowed.
    interactive: bool,
    /// Print user messages as they are appended.
    echo_user: bool,
    /// An answer line was started and not yet terminated.
    line_open: bool,
    /// Line breaks written since the current answer started.
    streamed_rows: usize,
    /// Non-interactive stream answer, held until the exchange ends.
    pending: String,
    indicator_shown: bool,
}

/// Cloneable handle; one clone is subscribed, another drives exchange boundaries.
pub struct TerminalView<W> {
    state: Arc<Mutex<ViewState<W>>>,
}

impl<W> Clone for TerminalView<W> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<W: Write + Send + 'static> TerminalView<W> {
    pub fn new(out: W, mode: DisplayMode, render: RenderFn, interactive: bool) -> Self {
        Self {
            state: Arc::new(Mutex::new(ViewState {
                out,
                mode,
                render,
                interactive,
                echo_user: false,
                line_open: false,
                streamed_rows: 0,
                pending: String::new(),
                indicator_shown: false,
            })),
        }
    }

    /// Echo user messages, for questions that were not typed at a prompt.
    pub fn with_user_echo(self, echo: bool) -> Self {
        self.lock().echo_user = echo;
        self
    }

    /// Print every message, e.g. the greeting at startup.
    pub fn show_transcript(&self, messages: &[Message]) {
        let mut state = self.lock();
        for message in messages {
            let text = match message.sender {
                Sender::User => format!("{USER_PREFIX}{}", message.text),
                Sender::Assistant => (state.render)(&message.text),
            };
            state.write(&format!("{text}\n"));
        }
        state.flush();
    }

    /// Close out the answer once the exchange has terminated.
    pub fn finish_exchange(&self, messages: &[Message]) {
        let mut state = self.lock();
        match state.mode {
            DisplayMode::Stream if state.interactive => {
                if state.line_open {
                    state.write("\n");
                    state.line_open = false;
                }
            }
            DisplayMode::Stream => {
                let answer = std::mem::take(&mut state.pending);
                if !answer.is_empty() {
                    state.write(&format!("{answer}\n"));
                }
            }
            DisplayMode::Rendered => {
                state.clear_indicator();
                if let Some(last) = messages.last() {
                    let rendered = (state.render)(&last.text);
                    state.write(&format!("{rendered}\n"));
                }
            }
        }
        state.streamed_rows = 0;
        state.flush();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ViewState<W>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: Write> ViewState<W> {
    fn write(&mut self, text: &str) {
        if let Err(e) = self.out.write_all(text.as_bytes()) {
            tracing::warn!(error = %e, "failed to write to terminal");
        }
    }

    fn flush(&mut self) {
        if let Err(e) = self.out.flush() {
            tracing::warn!(error = %e, "failed to flush terminal");
        }
    }

    fn clear_indicator(&mut self) {
        if self.indicator_shown {
            self.write(CLEAR_LINE);
            self.indicator_shown = false;
        }
    }

    /// Move back to where the answer started and clear everything below.
    /// Soft-wrapped lines are not counted.
    fn erase_answer(&mut self) {
        if self.streamed_rows > 0 {
            let up = format!("\x1b[{}F", self.streamed_rows);
            self.write(&up);
        } else if self.line_open {
            self.write("\r");
        }
        if self.line_open || self.streamed_rows > 0 {
            self.write(CLEAR_TO_END);
        }
        self.streamed_rows = 0;
        self.line_open = false;
    }

    fn start_answer(&mut self) {
        self.streamed_rows = 0;
        self.pending.clear();
        if self.mode == DisplayMode::Rendered && self.interactive {
            self.write(TYPING_INDICATOR);
            self.indicator_shown = true;
        }
    }

    fn changed(&mut self, change: &TranscriptChange, messages: &[Message]) {
        match (self.mode, change) {
            (_, TranscriptChange::Appended { index }) => {
                let Some(message) = messages.get(*index) else {
                    return;
                };
                match message.sender {
                    Sender::User if self.echo_user => {
                        self.write(&format!("{USER_PREFIX}{}\n", message.text));
                    }
                    Sender::Assistant if message.text.is_empty() => self.start_answer(),
                    _ => return,
                }
            }
            (DisplayMode::Stream, TranscriptChange::Extended { fragment, .. }) => {
                if self.interactive {
                    self.write(fragment);
                    self.streamed_rows += fragment.matches('\n').count();
                    self.line_open = true;
                } else {
                    self.pending.push_str(fragment);
                }
            }
            (DisplayMode::Stream, TranscriptChange::Replaced { index }) => {
                let replacement = messages
                    .get(*index)
                    .map(|m| (self.render)(&m.text))
                    .unwrap_or_default();
                if self.interactive {
                    self.erase_answer();
                    self.write(&replacement);
                    self.line_open = true;
                } else {
                    self.pending = replacement;
                }
            }
            _ => return,
        }
        self.flush();
    }
}

impl<W: Write + Send + 'static> TranscriptObserver for TerminalView<W> {
    fn transcript_changed(&mut self, change: &TranscriptChange, messages: &[Message]) {
        self.lock().changed(change, messages);
    }
}
