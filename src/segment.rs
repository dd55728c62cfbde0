//! Incremental sentence segmentation
//!
//! Generation arrives as token-sized fragments but synthesis wants whole
//! sentences. The segmenter accumulates fragments and cuts a segment each
//! time the buffer ends at a sentence boundary, so the first sentence can
//! be speaking while the rest of the reply is still streaming in.

/// Characters that close a speakable segment
const BOUNDARY_CHARS: [char; 4] = ['.', '?', '!', '\n'];

/// A complete speakable unit of assistant output
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SpeechSegment {
    pub text: String,
}

/// Accumulates streamed fragments and emits sentence-sized segments
#[derive(Debug, Default)]
pub struct SentenceSegmenter {
    buffer: String,
}

impl SentenceSegmenter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment; returns a segment when the buffer now ends at a
    /// sentence boundary.
    ///
    /// The boundary test applies to the trailing character only. A boundary
    /// in the interior of the buffer (e.g. a decimal point followed by more
    /// text) waits for a later fragment to close the sentence.
    pub fn push(&mut self, fragment: &str) -> Option<SpeechSegment> {
        self.buffer.push_str(fragment);

        let last = self.buffer.chars().last()?;
        if !BOUNDARY_CHARS.contains(&last) {
            return None;
        }

        self.take_segment()
    }

    /// Emit whatever remains in the buffer at end of stream.
    ///
    /// Returns `None` when the remainder is empty or all whitespace, so a
    /// reply that ended cleanly at a boundary produces no trailing segment.
    pub fn flush(&mut self) -> Option<SpeechSegment> {
        self.take_segment()
    }

    fn take_segment(&mut self) -> Option<SpeechSegment> {
        let text = std::mem::take(&mut self.buffer);
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(SpeechSegment {
            text: trimmed.to_string(),
        })
    }
}
