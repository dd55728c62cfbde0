//! Provider traits and concrete backends
//!
//! The pipeline talks to speech and language services through three small
//! traits so the loop can be exercised with mock implementations. Concrete
//! backends: Deepgram (streaming recognition), OpenAI-compatible chat
//! completions (generation), OpenAI and ElevenLabs (synthesis).

pub mod deepgram;
pub mod elevenlabs;
pub mod openai;

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use tokio::sync::mpsc;

pub use deepgram::DeepgramRecognizer;
pub use elevenlabs::ElevenLabsSynthesizer;
pub use openai::{OpenAiGenerator, OpenAiSynthesizer};

use crate::Result;
use crate::audio::{AudioFrame, PcmAudio};
use crate::conversation::ConversationTurn;

/// An event from a live recognition session
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RecognitionEvent {
    /// Interim hypothesis, may be revised
    Partial(String),
    /// Finalized transcript, never revised
    Final(String),
}

/// Handle to one live recognition session
///
/// Frames go in on `frames` in capture order; recognition events come back
/// on `events`. Either channel closing means the session has ended and a
/// new one must be opened.
pub struct RecognizerSession {
    pub frames: mpsc::Sender<AudioFrame>,
    pub events: mpsc::Receiver<RecognitionEvent>,
}

/// Streaming speech-to-text provider
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Open a live recognition session
    ///
    /// # Errors
    ///
    /// Returns error if the session cannot be established
    async fn open_session(&self) -> Result<RecognizerSession>;
}

/// Sampling parameters for text generation
#[derive(Clone, Copy, Debug)]
pub struct SamplingConfig {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            temperature: 0.5,
            max_tokens: 300,
        }
    }
}

/// Stream of reply fragments from a generator
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Streaming text generation provider
///
/// At most one generation is in flight at a time; the orchestrator enforces
/// this by awaiting each turn to completion. Dropping the stream releases
/// the underlying connection.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Start generating a reply to the conversation so far
    ///
    /// Fragments concatenate to the full reply exactly. The stream ends
    /// when the provider marks the reply complete.
    ///
    /// # Errors
    ///
    /// Returns error if the request cannot be started
    async fn stream(
        &self,
        turns: &[ConversationTurn],
        system_prompt: &str,
        sampling: SamplingConfig,
    ) -> Result<FragmentStream>;
}

/// Speech synthesis provider
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize text to raw PCM audio
    ///
    /// # Errors
    ///
    /// Returns error if synthesis fails
    async fn synthesize(&self, text: &str) -> Result<PcmAudio>;
}
