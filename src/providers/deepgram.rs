//! Deepgram live transcription over WebSocket
//!
//! Audio goes up as binary linear16 messages; results come back as JSON
//! text messages with an `is_final` flag. Interim results are enabled so
//! the session keeps its endpointing responsive.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;

use crate::audio::{AudioFrame, FRAME_QUEUE_CAPACITY, SAMPLE_RATE};
use crate::providers::{RecognitionEvent, RecognizerSession, SpeechRecognizer};
use crate::{Error, Result};

/// Streaming recognizer backed by the Deepgram live API
pub struct DeepgramRecognizer {
    api_key: String,
    model: String,
}

impl DeepgramRecognizer {
    /// Create a new Deepgram recognizer
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new(api_key: String, model: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(
                "Deepgram API key required for STT".to_string(),
            ));
        }

        Ok(Self { api_key, model })
    }

    fn endpoint(&self) -> String {
        format!(
            "wss://api.deepgram.com/v1/listen\
             ?model={}&encoding=linear16&sample_rate={SAMPLE_RATE}&channels=1\
             &interim_results=true&punctuate=true",
            self.model
        )
    }
}

#[async_trait]
impl SpeechRecognizer for DeepgramRecognizer {
    async fn open_session(&self) -> Result<RecognizerSession> {
        let mut request = self
            .endpoint()
            .into_client_request()
            .map_err(|e| Error::Stt(e.to_string()))?;

        let auth = HeaderValue::from_str(&format!("Token {}", self.api_key))
            .map_err(|e| Error::Stt(e.to_string()))?;
        request.headers_mut().insert("Authorization", auth);

        let (ws, _) = connect_async(request)
            .await
            .map_err(|e| Error::Stt(format!("Deepgram connect failed: {e}")))?;

        tracing::debug!(model = %self.model, "recognition session opened");

        let (mut write, mut read) = ws.split();
        let (frame_tx, mut frame_rx) = mpsc::channel::<AudioFrame>(FRAME_QUEUE_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel(32);

        // Uplink: forward frames in order, then tell the server we're done
        tokio::spawn(async move {
            while let Some(frame) = frame_rx.recv().await {
                if let Err(e) = write.send(Message::Binary(frame.to_bytes())).await {
                    tracing::warn!(error = %e, "recognition uplink closed");
                    return;
                }
            }
            let close = r#"{"type":"CloseStream"}"#.to_string();
            let _ = write.send(Message::Text(close)).await;
        });

        // Downlink: parse results until the socket closes. Dropping the
        // event sender closes the session from the consumer's view.
        tokio::spawn(async move {
            while let Some(message) = read.next().await {
                let text = match message {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        tracing::warn!(error = %e, "recognition downlink error");
                        break;
                    }
                };

                let Some(event) = parse_result(&text) else {
                    continue;
                };

                if event_tx.send(event).await.is_err() {
                    break;
                }
            }
            tracing::debug!("recognition session closed");
        });

        Ok(RecognizerSession {
            frames: frame_tx,
            events: event_rx,
        })
    }
}

#[derive(Debug, Deserialize)]
struct LiveResult {
    #[serde(default)]
    is_final: bool,
    channel: Option<LiveChannel>,
}

#[derive(Debug, Deserialize)]
struct LiveChannel {
    alternatives: Vec<LiveAlternative>,
}

#[derive(Debug, Deserialize)]
struct LiveAlternative {
    transcript: String,
}

/// Extract a recognition event from one result message
///
/// Non-result messages (metadata, utterance markers) and empty transcripts
/// yield nothing.
fn parse_result(text: &str) -> Option<RecognitionEvent> {
    let result: LiveResult = serde_json::from_str(text).ok()?;
    let transcript = result
        .channel?
        .alternatives
        .into_iter()
        .next()?
        .transcript;

    if transcript.is_empty() {
        return None;
    }

    if result.is_final {
        Some(RecognitionEvent::Final(transcript))
    } else {
        Some(RecognitionEvent::Partial(transcript))
    }
}
