//! Ordered chat transcript. Only the last message may change after it is
//! appended; every mutation is pushed to subscribed observers synchronously.

use serde::{Deserialize, Serialize};

/// Who wrote a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

/// One transcript entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub sender: Sender,
    pub text: String,
}

impl Message {
    pub fn new(sender: Sender, text: impl Into<String>) -> Self {
        Self {
            sender,
            text: text.into(),
        }
    }
}

/// What changed in the transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptChange {
    /// A new message was pushed at `index`.
    Appended { index: usize },
    /// `fragment` was concatenated onto the message at `index`.
    Extended { index: usize, fragment: String },
    /// The message at `index` was replaced wholesale.
    Replaced { index: usize },
}

/// Receives every transcript mutation right after it is applied.
pub trait TranscriptObserver: Send {
    fn transcript_changed(&mut self, change: &TranscriptChange, messages: &[Message]);
}

impl<F> TranscriptObserver for F
where
    F: FnMut(&TranscriptChange, &[Message]) + Send,
{
    fn transcript_changed(&mut self, change: &TranscriptChange, messages: &[Message]) {
        self(change, messages)
    }
}

/// Append-only message log, seeded with an assistant greeting so it is never empty.
pub struct Transcript {
    messages: Vec<Message>,
    observers: Vec<Box<dyn TranscriptObserver>>,
}

impl Transcript {
    pub fn new(greeting: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::new(Sender::Assistant, greeting)],
            observers: Vec::new(),
        }
    }

    /// Register an observer for all subsequent mutations.
    pub fn subscribe(&mut self, observer: impl TranscriptObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Push a message and return its index. `text` may be empty (placeholder).
    pub fn append_message(&mut self, sender: Sender, text: impl Into<String>) -> usize {
        self.messages.push(Message::new(sender, text));
        let index = self.messages.len() - 1;
        self.notify(TranscriptChange::Appended { index });
        index
    }

    /// Concatenate `fragment` onto the last message in place.
    ///
    /// # Panics
    ///
    /// Panics if the transcript is empty, which construction rules out.
    pub fn append_to_last(&mut self, fragment: &str) {
        if fragment.is_empty() {
            return;
        }
        let index = self.last_index();
        self.messages[index].text.push_str(fragment);
        self.notify(TranscriptChange::Extended {
            index,
            fragment: fragment.to_string(),
        });
    }

    /// Replace the last message's sender and text in one step.
    ///
    /// # Panics
    ///
    /// Panics if the transcript is empty, which construction rules out.
    pub fn replace_last(&mut self, sender: Sender, text: impl Into<String>) {
        let index = self.last_index();
        self.messages[index] = Message::new(sender, text);
        self.notify(TranscriptChange::Replaced { index });
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn last_index(&self) -> usize {
        assert!(!self.messages.is_empty(), "transcript has no last message");
        self.messages.len() - 1
    }

    fn notify(&mut self, change: TranscriptChange) {
        for observer in &mut self.observers {
            observer.transcript_changed(&change, &self.messages);
        }
    }
}

impl std::fmt::Debug for Transcript {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transcript")
            .field("messages", &self.messages)
            .field("observers", &self.observers.len())
            .finish()
    }
}
