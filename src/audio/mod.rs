//! Audio capture and playback

pub mod capture;
pub mod playback;

pub use capture::AudioCapture;
pub use playback::{AudioPlayback, PlaybackSink};

/// Sample rate for audio capture (16kHz for speech)
pub const SAMPLE_RATE: u32 = 16_000;

/// Duration of one capture frame in milliseconds
pub const FRAME_MS: u32 = 40;

/// Samples per capture frame (16kHz mono, 40ms)
pub const FRAME_SAMPLES: usize = (SAMPLE_RATE as usize / 1000) * FRAME_MS as usize;

/// Frame queue capacity (~8 seconds of audio)
pub const FRAME_QUEUE_CAPACITY: usize = 200;

/// One fixed-size block of captured PCM audio
///
/// Frames are immutable once enqueued and carry a monotonic sequence number
/// assigned in capture order.
#[derive(Clone, Debug)]
pub struct AudioFrame {
    samples: Vec<i16>,
    sequence: u64,
}

impl AudioFrame {
    #[must_use]
    pub fn new(samples: Vec<i16>, sequence: u64) -> Self {
        Self { samples, sequence }
    }

    #[must_use]
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    #[must_use]
    pub const fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Encode as little-endian bytes for streaming APIs (linear16)
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.samples.len() * 2);
        for sample in &self.samples {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
        bytes
    }
}

/// Synthesized audio ready for playback
#[derive(Clone, Debug)]
pub struct PcmAudio {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

impl PcmAudio {
    /// Decode little-endian 16-bit PCM bytes as returned by synthesis APIs
    #[must_use]
    pub fn from_le_bytes(bytes: &[u8], sample_rate: u32) -> Self {
        let samples = bytes
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        Self {
            samples,
            sample_rate,
        }
    }
}
