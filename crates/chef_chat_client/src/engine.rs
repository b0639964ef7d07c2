//! Stream ingestion: drives one question/answer exchange at a time and folds
//! the streamed answer into the transcript.
//!
//! Exchange protocol:
//! 1. trimmed-empty input is ignored, as is any submit while another is in flight;
//! 2. the user message and an empty assistant placeholder are appended;
//! 3. the question is POSTed and the body is decoded incrementally, each
//!    fragment appended to the placeholder in arrival order;
//! 4. any failure replaces the placeholder with the fixed error text;
//! 5. the in-flight flag is cleared on every exit path.

use std::sync::{Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tokio::sync::watch;

use crate::client::{ChatClient, ExchangeError};
use crate::decoder::StreamDecoder;
use crate::messages::ChatRequest;
use crate::session::SessionToken;
use crate::transcript::{Message, Sender, Transcript, TranscriptObserver};

pub const DEFAULT_GREETING: &str =
    "Halo! Saya AI Chef, asisten resep pribadimu. Tanyakan apa saja tentang masakan Indonesia!";
pub const DEFAULT_ERROR_MESSAGE: &str = "Maaf, terjadi kesalahan. Coba ajukan pertanyaan lagi.";

/// Fixed user-facing strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTexts {
    pub greeting: String,
    pub error_message: String,
}

impl Default for ChatTexts {
    fn default() -> Self {
        Self {
            greeting: DEFAULT_GREETING.into(),
            error_message: DEFAULT_ERROR_MESSAGE.into(),
        }
    }
}

/// Why a submit did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    EmptyInput,
    Busy,
}

/// Result of one `submit` call.
#[derive(Debug)]
pub enum SubmitOutcome {
    Ignored(IgnoreReason),
    Completed { bytes: usize, fragments: usize },
    /// The placeholder now holds the error text.
    Failed(ExchangeError),
}

impl SubmitOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, SubmitOutcome::Completed { .. })
    }
}

/// Byte and fragment counts for one folded stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FoldStats {
    pub bytes: usize,
    pub fragments: usize,
}

/// Owns the transcript and the in-flight flag; the only writer of either.
pub struct ChatEngine {
    client: ChatClient,
    session: SessionToken,
    texts: ChatTexts,
    transcript: Mutex<Transcript>,
    in_flight: watch::Sender<bool>,
}

impl ChatEngine {
    pub fn new(client: ChatClient, session: SessionToken, texts: ChatTexts) -> Self {
        let transcript = Transcript::new(texts.greeting.clone());
        let (in_flight, _) = watch::channel(false);
        Self {
            client,
            session,
            texts,
            transcript: Mutex::new(transcript),
            in_flight,
        }
    }

    pub fn session(&self) -> &SessionToken {
        &self.session
    }

    pub fn in_flight(&self) -> bool {
        *self.in_flight.borrow()
    }

    /// Receiver that sees every in-flight transition.
    pub fn watch_in_flight(&self) -> watch::Receiver<bool> {
        self.in_flight.subscribe()
    }

    /// Observers run under the transcript lock and must not call back into the engine.
    pub fn subscribe(&self, observer: impl TranscriptObserver + 'static) {
        self.transcript().subscribe(observer);
    }

    /// Snapshot of the current transcript.
    pub fn messages(&self) -> Vec<Message> {
        self.transcript().messages().to_vec()
    }

    /// Submit `question` as typed.
    pub async fn submit(&self, question: &str) -> SubmitOutcome {
        let mut input = question.to_string();
        self.submit_from(&mut input).await
    }

    /// Submit the contents of an input buffer. The buffer is cleared once the
    /// question is accepted and left untouched when the submit is ignored.
    pub async fn submit_from(&self, input: &mut String) -> SubmitOutcome {
        let question = input.trim().to_string();
        if question.is_empty() {
            return SubmitOutcome::Ignored(IgnoreReason::EmptyInput);
        }
        let Some(_guard) = InFlightGuard::claim(&self.in_flight) else {
            tracing::debug!("exchange already in flight, ignoring submit");
            return SubmitOutcome::Ignored(IgnoreReason::Busy);
        };

        {
            let mut transcript = self.transcript();
            transcript.append_message(Sender::User, question.as_str());
            input.clear();
            transcript.append_message(Sender::Assistant, "");
        }

        match self.exchange(&question).await {
            Ok(stats) => {
                tracing::info!(
                    bytes = stats.bytes,
                    fragments = stats.fragments,
                    "answer received"
                );
                SubmitOutcome::Completed {
                    bytes: stats.bytes,
                    fragments: stats.fragments,
                }
            }
            Err(e) => {
                tracing::error!(kind = e.kind(), error = %e, "exchange failed");
                self.transcript()
                    .replace_last(Sender::Assistant, self.texts.error_message.as_str());
                SubmitOutcome::Failed(e)
            }
        }
    }

    async fn exchange(&self, question: &str) -> Result<FoldStats, ExchangeError> {
        let request = ChatRequest::new(question, &self.session);
        let stream = self.client.open_stream(&request).await?;
        fold_stream(stream, &self.transcript).await
    }

    fn transcript(&self) -> MutexGuard<'_, Transcript> {
        lock(&self.transcript)
    }
}

/// Decode `stream` incrementally and append each fragment to the last
/// transcript message, in order. The lock is never held across an await.
pub async fn fold_stream<S>(
    stream: S,
    transcript: &Mutex<Transcript>,
) -> Result<FoldStats, ExchangeError>
where
    S: Stream<Item = Result<Bytes, ExchangeError>>,
{
    let mut stream = std::pin::pin!(stream);
    let mut decoder = StreamDecoder::new();
    let mut stats = FoldStats::default();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        stats.bytes += chunk.len();
        let fragment = decoder.decode(&chunk);
        if !fragment.is_empty() {
            stats.fragments += 1;
            lock(transcript).append_to_last(&fragment);
        }
    }

    let tail = decoder.finish();
    if !tail.is_empty() {
        stats.fragments += 1;
        lock(transcript).append_to_last(&tail);
    }
    Ok(stats)
}

fn lock(transcript: &Mutex<Transcript>) -> MutexGuard<'_, Transcript> {
    transcript.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Holds the in-flight flag for the lifetime of one exchange.
struct InFlightGuard<'a> {
    flag: &'a watch::Sender<bool>,
}

impl<'a> InFlightGuard<'a> {
    /// Flip the flag false → true, or `None` if it was already set.
    fn claim(flag: &'a watch::Sender<bool>) -> Option<Self> {
        let claimed = flag.send_if_modified(|busy| {
            if *busy {
                false
            } else {
                *busy = true;
                true
            }
        });
        claimed.then_some(Self { flag })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.send_replace(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    fn chunks(
        parts: Vec<Result<Bytes, ExchangeError>>,
    ) -> impl Stream<Item = Result<Bytes, ExchangeError>> {
        stream::iter(parts)
    }

    fn ok(bytes: &'static [u8]) -> Result<Bytes, ExchangeError> {
        Ok(Bytes::from_static(bytes))
    }

    fn transcript_with_placeholder() -> Mutex<Transcript> {
        let mut t = Transcript::new("hi");
        t.append_message(Sender::User, "q");
        t.append_message(Sender::Assistant, "");
        Mutex::new(t)
    }

    #[tokio::test]
    async fn fold_concatenates_fragments_in_order() {
        let t = transcript_with_placeholder();
        let stats = fold_stream(
            chunks(vec![ok(b"Coba"), ok(b" tumis"), ok(b" kangkung.")]),
            &t,
        )
        .await
        .unwrap();
        assert_eq!(stats, FoldStats { bytes: 20, fragments: 3 });
        assert_eq!(lock(&t).last().unwrap().text, "Coba tumis kangkung.");
        assert_eq!(lock(&t).len(), 3);
    }

    #[tokio::test]
    async fn fold_handles_character_split_across_chunks() {
        let t = transcript_with_placeholder();
        // "gulé" split inside the two-byte "é".
        fold_stream(chunks(vec![ok(b"gul\xC3"), ok(b"\xA9 enak")]), &t)
            .await
            .unwrap();
        assert_eq!(lock(&t).last().unwrap().text, "gulé enak");
    }

    #[tokio::test]
    async fn fold_stops_at_read_error_keeping_partial_text() {
        let t = transcript_with_placeholder();
        let err = fold_stream(
            chunks(vec![
                ok(b"partial"),
                Err(ExchangeError::StreamReadFailure(std::io::Error::other("reset"))),
                ok(b"never"),
            ]),
            &t,
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), "stream_read_failure");
        assert_eq!(lock(&t).last().unwrap().text, "partial");
    }

    #[tokio::test]
    async fn fold_of_empty_body_leaves_placeholder_empty() {
        let t = transcript_with_placeholder();
        let stats = fold_stream(chunks(vec![]), &t).await.unwrap();
        assert_eq!(stats, FoldStats::default());
        assert_eq!(lock(&t).last().unwrap().text, "");
    }

    #[test]
    fn guard_claims_once_and_releases_on_drop() {
        let (flag, _) = watch::channel(false);
        let guard = InFlightGuard::claim(&flag).expect("first claim");
        assert!(*flag.borrow());
        assert!(InFlightGuard::claim(&flag).is_none());
        drop(guard);
        assert!(!*flag.borrow());
        assert!(InFlightGuard::claim(&flag).is_some());
    }

    #[tokio::test]
    async fn empty_input_is_ignored_without_touching_state() {
        let engine = ChatEngine::new(
            ChatClient::new("http://127.0.0.1:9", "/api/chat"),
            SessionToken::generate(),
            ChatTexts::default(),
        );
        let mut input = String::from("   \n\t");
        let outcome = engine.submit_from(&mut input).await;
        assert!(matches!(outcome, SubmitOutcome::Ignored(IgnoreReason::EmptyInput)));
        assert_eq!(input, "   \n\t");
        assert_eq!(engine.messages().len(), 1);
        assert!(!engine.in_flight());
    }
}
