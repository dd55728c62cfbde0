//! OpenAI-compatible generation and synthesis
//!
//! Generation uses the streaming chat completions endpoint: the response is
//! an SSE body of `data:` lines, one JSON chunk per delta, terminated by
//! `data: [DONE]`. Lines can straddle HTTP chunk boundaries, so parsing
//! buffers incomplete lines across reads.

use std::collections::VecDeque;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use serde::Deserialize;
use serde_json::json;

use crate::audio::PcmAudio;
use crate::conversation::ConversationTurn;
use crate::providers::{FragmentStream, SamplingConfig, SpeechSynthesizer, TextGenerator};
use crate::{Error, Result};

/// Sample rate of OpenAI raw PCM synthesis output
const OPENAI_PCM_SAMPLE_RATE: u32 = 24_000;

/// Streaming text generator backed by an OpenAI-compatible chat API
pub struct OpenAiGenerator {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiGenerator {
    /// Create a new generator
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new(api_key: String, base_url: String, model: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(
                "OpenAI API key required for generation".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url,
            model,
        })
    }
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    async fn stream(
        &self,
        turns: &[ConversationTurn],
        system_prompt: &str,
        sampling: SamplingConfig,
    ) -> Result<FragmentStream> {
        let mut messages = Vec::with_capacity(turns.len() + 1);
        messages.push(json!({ "role": "system", "content": system_prompt }));
        for turn in turns {
            messages.push(json!({ "role": turn.role.as_str(), "content": turn.content }));
        }

        let body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": sampling.temperature,
            "max_tokens": sampling.max_tokens,
            "stream": true,
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Generation(format!(
                "chat completions error {status}: {body}"
            )));
        }

        let state = SseState {
            bytes: response.bytes_stream().boxed(),
            parser: SseParser::default(),
            pending: VecDeque::new(),
            done: false,
        };

        let stream = futures::stream::unfold(state, |mut state| async move {
            loop {
                if let Some(fragment) = state.pending.pop_front() {
                    return Some((Ok(fragment), state));
                }
                if state.done {
                    return None;
                }

                match state.bytes.next().await {
                    Some(Ok(chunk)) => {
                        let (fragments, done) = state.parser.feed(&chunk);
                        state.pending.extend(fragments);
                        state.done = done;
                    }
                    Some(Err(e)) => {
                        state.done = true;
                        return Some((Err(Error::Http(e)), state));
                    }
                    None => {
                        // Body ended without [DONE]; treat as complete
                        state.done = true;
                    }
                }
            }
        });

        Ok(Box::pin(stream))
    }
}

struct SseState {
    bytes: BoxStream<'static, reqwest::Result<Bytes>>,
    parser: SseParser,
    pending: VecDeque<String>,
    done: bool,
}

/// Incremental SSE parser for chat completion deltas
#[derive(Default)]
struct SseParser {
    line_buffer: String,
}

impl SseParser {
    /// Feed one body chunk; returns the deltas it completed and whether the
    /// `[DONE]` terminator was seen.
    fn feed(&mut self, chunk: &[u8]) -> (Vec<String>, bool) {
        self.line_buffer.push_str(&String::from_utf8_lossy(chunk));

        let mut fragments = Vec::new();
        let mut done = false;

        while let Some(newline) = self.line_buffer.find('\n') {
            let line: String = self.line_buffer.drain(..=newline).collect();
            let line = line.trim();

            let Some(data) = line.strip_prefix("data: ") else {
                continue;
            };

            if data == "[DONE]" {
                done = true;
                break;
            }

            match serde_json::from_str::<StreamChunk>(data) {
                Ok(parsed) => {
                    if let Some(content) = parsed
                        .choices
                        .into_iter()
                        .next()
                        .and_then(|c| c.delta.content)
                        && !content.is_empty()
                    {
                        fragments.push(content);
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "skipping malformed stream chunk");
                }
            }
        }

        (fragments, done)
    }
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

/// Speech synthesizer backed by the OpenAI speech endpoint
///
/// Requests raw PCM output (24kHz mono) so playback needs no decoding.
pub struct OpenAiSynthesizer {
    client: reqwest::Client,
    api_key: String,
    voice: String,
    speed: f32,
    model: String,
}

impl OpenAiSynthesizer {
    /// Create a new synthesizer
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new(api_key: String, voice: String, speed: f32, model: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config("OpenAI API key required for TTS".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            voice,
            speed,
            model,
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for OpenAiSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<PcmAudio> {
        #[derive(serde::Serialize)]
        struct SpeechRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            speed: f32,
            response_format: &'a str,
        }

        let request = SpeechRequest {
            model: &self.model,
            input: text,
            voice: &self.voice,
            speed: self.speed,
            response_format: "pcm",
        };

        let response = self
            .client
            .post("https://api.openai.com/v1/audio/speech")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("OpenAI TTS error {status}: {body}")));
        }

        let audio = response.bytes().await?;
        Ok(PcmAudio::from_le_bytes(&audio, OPENAI_PCM_SAMPLE_RATE))
    }
}
