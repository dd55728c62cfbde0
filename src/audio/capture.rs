//! Audio capture from microphone
//!
//! The cpal data callback slices incoming samples into fixed 40ms frames
//! and pushes them onto a bounded queue with `try_send`. When the consumer
//! falls behind the newest frame is dropped and counted; the callback never
//! blocks, so capture timing is unaffected by downstream pressure.
//!
//! A stream error from cpal means the input path is gone. That is fatal: the
//! capture is marked failed and the pipeline stop signal is triggered.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, Stream, StreamConfig};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::audio::{AudioFrame, FRAME_SAMPLES, SAMPLE_RATE};
use crate::stop::StopSignal;
use crate::{Error, Result};

/// Captures audio from the default input device
pub struct AudioCapture {
    config: StreamConfig,
    overflow: Arc<AtomicU64>,
    failed: Arc<AtomicBool>,
    stream: Option<Stream>,
}

impl AudioCapture {
    /// Create a new audio capture instance
    ///
    /// # Errors
    ///
    /// Returns error if audio device cannot be opened
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_input_device()
            .ok_or_else(|| Error::Audio("no input device available".to_string()))?;

        let supported_config = device
            .supported_input_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
            })
            .ok_or_else(|| Error::Audio("no suitable audio config found".to_string()))?;

        let config = supported_config
            .with_sample_rate(SampleRate(SAMPLE_RATE))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = SAMPLE_RATE,
            channels = config.channels,
            "audio capture initialized"
        );

        Ok(Self {
            config,
            overflow: Arc::new(AtomicU64::new(0)),
            failed: Arc::new(AtomicBool::new(false)),
            stream: None,
        })
    }

    /// Start capturing, delivering frames onto `frames`
    ///
    /// A stream error after startup marks the capture failed and triggers
    /// `stop`.
    ///
    /// # Errors
    ///
    /// Returns error if the input stream cannot be built or started
    pub fn start(&mut self, frames: mpsc::Sender<AudioFrame>, stop: StopSignal) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| Error::Audio("no input device".to_string()))?;

        let config = self.config.clone();
        let overflow = Arc::clone(&self.overflow);
        let failed = Arc::clone(&self.failed);
        let mut framer = Framer::new();

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    framer.push(data, &frames, &overflow);
                },
                move |err| {
                    report_stream_error(&err, &failed, &stop);
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;
        self.stream = Some(stream);

        tracing::debug!("audio capture started");
        Ok(())
    }

    /// Stop capturing audio
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            tracing::debug!(
                dropped = self.overflow_count(),
                "audio capture stopped"
            );
        }
    }

    /// Frames dropped so far because the queue was full
    #[must_use]
    pub fn overflow_count(&self) -> u64 {
        self.overflow.load(Ordering::Relaxed)
    }

    /// Whether the input stream has reported a fatal error
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }

    /// Check if currently capturing
    #[must_use]
    pub const fn is_capturing(&self) -> bool {
        self.stream.is_some()
    }

    /// Get the sample rate
    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }
}

/// Handle a cpal stream error: the input path is gone, so mark the capture
/// failed and shut the pipeline down.
fn report_stream_error(err: &cpal::StreamError, failed: &AtomicBool, stop: &StopSignal) {
    tracing::error!(error = %err, "audio capture stream failed");
    failed.store(true, Ordering::SeqCst);
    stop.trigger();
}

/// Slices a raw sample stream into fixed-size frames and enqueues them
struct Framer {
    carry: Vec<i16>,
    sequence: u64,
}

impl Framer {
    fn new() -> Self {
        Self {
            carry: Vec::with_capacity(FRAME_SAMPLES * 2),
            sequence: 0,
        }
    }

    fn push(
        &mut self,
        data: &[f32],
        frames: &mpsc::Sender<AudioFrame>,
        overflow: &AtomicU64,
    ) {
        for &sample in data {
            // Convert f32 [-1.0, 1.0] to i16
            #[allow(clippy::cast_possible_truncation)]
            let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            self.carry.push(sample_i16);
        }

        while self.carry.len() >= FRAME_SAMPLES {
            let samples: Vec<i16> = self.carry.drain(..FRAME_SAMPLES).collect();
            let frame = AudioFrame::new(samples, self.sequence);
            self.sequence += 1;

            match frames.try_send(frame) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    let dropped = overflow.fetch_add(1, Ordering::Relaxed) + 1;
                    if dropped == 1 || dropped % 100 == 0 {
                        tracing::warn!(dropped, "frame queue full, dropping newest frame");
                    }
                }
                // Receiver gone: the pipeline is shutting down
                Err(TrySendError::Closed(_)) => {}
            }
        }
    }
}
