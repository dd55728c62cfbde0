//! Live transcription session
//!
//! Sits between the capture queue and the orchestrator: forwards frames to
//! a recognition session, discards interim hypotheses, and emits each
//! finalized transcript exactly once as an [`Utterance`]. A dead session is
//! reopened after a short backoff; frames that arrive in between are lost,
//! which for live speech is preferable to replaying stale audio.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::audio::AudioFrame;
use crate::providers::{RecognitionEvent, RecognizerSession, SpeechRecognizer};
use crate::stop::StopSignal;

/// Delay before reopening a failed recognition session
const RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// A finalized, non-empty user utterance
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Utterance {
    pub text: String,
}

/// Drives recognition sessions for the lifetime of the process
pub struct TranscriptionSession {
    recognizer: Arc<dyn SpeechRecognizer>,
    frames: mpsc::Receiver<AudioFrame>,
    utterances: mpsc::Sender<Utterance>,
    stop: StopSignal,
}

impl TranscriptionSession {
    #[must_use]
    pub fn new(
        recognizer: Arc<dyn SpeechRecognizer>,
        frames: mpsc::Receiver<AudioFrame>,
        utterances: mpsc::Sender<Utterance>,
        stop: StopSignal,
    ) -> Self {
        Self {
            recognizer,
            frames,
            utterances,
            stop,
        }
    }

    /// Run until the stop signal fires or the frame source closes
    pub async fn run(mut self) {
        loop {
            if self.stop.is_set() {
                break;
            }

            let session = match self.recognizer.open_session().await {
                Ok(session) => session,
                Err(e) => {
                    tracing::warn!(error = %e, "recognition session failed to open, retrying");
                    tokio::select! {
                        () = self.stop.cancelled() => break,
                        () = tokio::time::sleep(RETRY_BACKOFF) => continue,
                    }
                }
            };

            match self.drive(session).await {
                SessionEnd::Stopped | SessionEnd::FramesClosed => break,
                SessionEnd::SessionLost => {
                    tracing::warn!("recognition session lost, reopening");
                }
            }
        }

        tracing::debug!("transcription stopped");
    }

    /// Pump one session until it ends
    async fn drive(&mut self, mut session: RecognizerSession) -> SessionEnd {
        loop {
            tokio::select! {
                () = self.stop.cancelled() => return SessionEnd::Stopped,

                frame = self.frames.recv() => match frame {
                    Some(frame) => {
                        if session.frames.send(frame).await.is_err() {
                            return SessionEnd::SessionLost;
                        }
                    }
                    None => return SessionEnd::FramesClosed,
                },

                event = session.events.recv() => match event {
                    Some(RecognitionEvent::Final(text)) => {
                        let trimmed = text.trim();
                        if trimmed.is_empty() {
                            continue;
                        }
                        let utterance = Utterance {
                            text: trimmed.to_string(),
                        };
                        tracing::info!(text = %utterance.text, "utterance finalized");
                        if self.utterances.send(utterance).await.is_err() {
                            return SessionEnd::Stopped;
                        }
                    }
                    Some(RecognitionEvent::Partial(text)) => {
                        tracing::trace!(text = %text, "interim hypothesis");
                    }
                    None => return SessionEnd::SessionLost,
                },
            }
        }
    }
}

enum SessionEnd {
    /// Stop signal fired or the utterance consumer went away
    Stopped,
    /// Capture side closed the frame channel
    FramesClosed,
    /// The provider session died; retryable
    SessionLost,
}
