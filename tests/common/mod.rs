//! Shared mock providers for integration tests

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use confab::Result;
use confab::audio::{PcmAudio, PlaybackSink};
use confab::conversation::ConversationTurn;
use confab::providers::{
    FragmentStream, RecognitionEvent, RecognizerSession, SamplingConfig, SpeechRecognizer,
    SpeechSynthesizer, TextGenerator,
};

/// Recognizer that replays one scripted event list per session
///
/// After the script is delivered the session stays open until the consumer
/// goes away, mirroring a healthy long-lived connection.
pub struct MockRecognizer {
    sessions: Mutex<Vec<Vec<RecognitionEvent>>>,
}

impl MockRecognizer {
    pub fn new(sessions: Vec<Vec<RecognitionEvent>>) -> Self {
        Self {
            sessions: Mutex::new(sessions),
        }
    }
}

#[async_trait]
impl SpeechRecognizer for MockRecognizer {
    async fn open_session(&self) -> Result<RecognizerSession> {
        let script = {
            let mut sessions = self.sessions.lock().unwrap();
            if sessions.is_empty() {
                Vec::new()
            } else {
                sessions.remove(0)
            }
        };

        let (frame_tx, mut frame_rx) = mpsc::channel(256);
        let (event_tx, event_rx) = mpsc::channel(32);

        // Swallow uploaded frames
        tokio::spawn(async move { while frame_rx.recv().await.is_some() {} });

        tokio::spawn(async move {
            for event in script {
                if event_tx.send(event).await.is_err() {
                    return;
                }
            }
            // Keep the session open until the consumer drops its receiver
            event_tx.closed().await;
        });

        Ok(RecognizerSession {
            frames: frame_tx,
            events: event_rx,
        })
    }
}

/// Generator that replays scripted fragment lists, one per generation
pub struct MockGenerator {
    replies: Mutex<Vec<Vec<&'static str>>>,
    pub prompts: Arc<Mutex<Vec<Vec<ConversationTurn>>>>,
}

impl MockGenerator {
    pub fn new(replies: Vec<Vec<&'static str>>) -> Self {
        Self {
            replies: Mutex::new(replies),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn stream(
        &self,
        turns: &[ConversationTurn],
        _system_prompt: &str,
        _sampling: SamplingConfig,
    ) -> Result<FragmentStream> {
        self.prompts.lock().unwrap().push(turns.to_vec());

        let fragments = {
            let mut replies = self.replies.lock().unwrap();
            if replies.is_empty() {
                Vec::new()
            } else {
                replies.remove(0)
            }
        };

        let items: Vec<Result<String>> = fragments
            .into_iter()
            .map(|fragment| Ok(fragment.to_string()))
            .collect();
        Ok(Box::pin(futures::stream::iter(items)))
    }
}

/// Synthesizer that records every request
pub struct MockSynthesizer {
    pub spoken: Arc<Mutex<Vec<String>>>,
}

impl MockSynthesizer {
    pub fn new() -> Self {
        Self {
            spoken: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for MockSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<PcmAudio> {
        self.spoken.lock().unwrap().push(text.to_string());
        Ok(PcmAudio {
            samples: vec![0; 160],
            sample_rate: 16_000,
        })
    }
}

/// Sink that records playback calls
pub struct MockSink {
    pub played: Arc<Mutex<Vec<usize>>>,
}

impl MockSink {
    pub fn new() -> Self {
        Self {
            played: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl PlaybackSink for MockSink {
    fn play(&mut self, audio: &PcmAudio) -> Result<()> {
        self.played.lock().unwrap().push(audio.samples.len());
        Ok(())
    }
}
