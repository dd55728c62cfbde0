//! Confab - real-time spoken conversation loop
//!
//! This library provides the pieces of a live voice assistant:
//! - Microphone capture into a bounded, drop-newest frame queue
//! - Streaming speech recognition with retryable sessions
//! - Streaming reply generation with incremental sentence segmentation
//! - Strictly ordered speech synthesis and playback
//!
//! # Architecture
//!
//! ```text
//! ┌──────────┐  frames   ┌──────────────┐  utterances  ┌────────────┐
//! │ capture  ├──────────▶│  transcribe  ├─────────────▶│ assistant  │
//! └──────────┘  (mpsc)   └──────────────┘    (mpsc)    └─────┬──────┘
//!                                                            │ segments
//!                                                      ┌─────▼──────┐
//!                                                      │  speaker   │
//!                                                      └────────────┘
//! ```
//!
//! Every stage observes a shared [`StopSignal`] and winds down cooperatively.

pub mod assistant;
pub mod audio;
pub mod config;
pub mod conversation;
pub mod error;
pub mod providers;
pub mod segment;
pub mod speaker;
pub mod stop;
pub mod transcribe;

pub use assistant::{Assistant, TurnState};
pub use config::Config;
pub use conversation::{ConversationState, ConversationTurn, Role};
pub use error::{Error, Result};
pub use segment::{SentenceSegmenter, SpeechSegment};
pub use speaker::SpeechPlayer;
pub use stop::StopSignal;
pub use transcribe::{TranscriptionSession, Utterance};
