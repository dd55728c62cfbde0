//! Ordered speech playback
//!
//! A single worker task owns the synthesizer and the output device. Segments
//! queue as FIFO commands and each is synthesized and played to completion
//! before the next is taken, so playback never overlaps and segment order is
//! exactly dispatch order. `flush` resolves once everything enqueued before
//! it has been spoken, which is how the orchestrator knows a turn's audio is
//! done while still pipelining synthesis with generation.
//!
//! A synthesis failure skips one segment; a failed output device is fatal.
//! The worker triggers the stop signal and shuts down, and the closed command
//! channel surfaces as `Error::Audio` at the call sites.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use crate::audio::PlaybackSink;
use crate::providers::SpeechSynthesizer;
use crate::segment::SpeechSegment;
use crate::stop::StopSignal;
use crate::{Error, Result};

/// Commands accepted by the playback worker
enum PlayerCommand {
    Speak(SpeechSegment),
    Flush(oneshot::Sender<()>),
}

/// Handle to the playback worker
#[derive(Clone)]
pub struct SpeechPlayer {
    commands: mpsc::Sender<PlayerCommand>,
}

impl SpeechPlayer {
    /// Spawn the playback worker
    #[must_use]
    pub fn spawn(
        synthesizer: Arc<dyn SpeechSynthesizer>,
        sink: Box<dyn PlaybackSink>,
        stop: StopSignal,
    ) -> Self {
        let (commands, command_rx) = mpsc::channel(16);

        tokio::spawn(worker(synthesizer, sink, stop, command_rx));

        Self { commands }
    }

    /// Enqueue a segment for synthesis and playback
    ///
    /// # Errors
    ///
    /// Returns error if the worker has shut down
    pub async fn speak(&self, segment: SpeechSegment) -> Result<()> {
        self.commands
            .send(PlayerCommand::Speak(segment))
            .await
            .map_err(|_| Error::Audio("playback worker stopped".to_string()))
    }

    /// Wait until every segment enqueued before this call has been spoken
    ///
    /// # Errors
    ///
    /// Returns error if the worker has shut down
    pub async fn flush(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(PlayerCommand::Flush(tx))
            .await
            .map_err(|_| Error::Audio("playback worker stopped".to_string()))?;
        rx.await
            .map_err(|_| Error::Audio("playback worker stopped".to_string()))
    }
}

async fn worker(
    synthesizer: Arc<dyn SpeechSynthesizer>,
    sink: Box<dyn PlaybackSink>,
    stop: StopSignal,
    mut commands: mpsc::Receiver<PlayerCommand>,
) {
    // The sink moves in and out of blocking playback calls
    let mut sink = Some(sink);

    while let Some(command) = commands.recv().await {
        match command {
            PlayerCommand::Speak(segment) => {
                // Checked before synthesis so no new provider work starts
                // after shutdown; a flush behind us still resolves.
                if stop.is_set() {
                    continue;
                }

                let audio = match synthesizer.synthesize(&segment.text).await {
                    Ok(audio) => audio,
                    Err(e) => {
                        tracing::warn!(error = %e, text = %segment.text, "synthesis failed, skipping segment");
                        continue;
                    }
                };

                let Some(active) = sink.take() else { break };
                match play_blocking(active, audio).await {
                    Ok(returned) => sink = Some(returned),
                    Err(e) => {
                        // No audio path left; shut the whole pipeline down
                        tracing::error!(error = %e, "audio output failed, stopping");
                        stop.trigger();
                        break;
                    }
                }
            }
            PlayerCommand::Flush(done) => {
                let _ = done.send(());
            }
        }
    }

    tracing::debug!("playback worker stopped");
}

/// Run the blocking playback call off the async runtime
async fn play_blocking(
    mut sink: Box<dyn PlaybackSink>,
    audio: crate::audio::PcmAudio,
) -> Result<Box<dyn PlaybackSink>> {
    let result = tokio::task::spawn_blocking(move || {
        let outcome = sink.play(&audio);
        (sink, outcome)
    })
    .await
    .map_err(|e| Error::Audio(format!("playback task panicked: {e}")))?;

    let (sink, outcome) = result;
    outcome?;
    Ok(sink)
}
