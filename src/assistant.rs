//! Conversation orchestrator
//!
//! Owns the turn state machine. One utterance is taken at a time; its reply
//! is generated, segmented, and dispatched for playback before the next
//! utterance is dequeued, so generations are strictly serialized even when
//! the user keeps talking. Utterances finalized while the assistant is
//! speaking wait in the bounded channel rather than interrupting playback.

use std::io::Write;
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;

use crate::conversation::ConversationState;
use crate::{Error, Result};
use crate::providers::{SamplingConfig, TextGenerator};
use crate::segment::SentenceSegmenter;
use crate::speaker::SpeechPlayer;
use crate::stop::StopSignal;
use crate::transcribe::Utterance;

/// Where the loop currently is in a turn
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TurnState {
    /// Between turns, nothing in flight
    Idle,
    /// Waiting for the user to speak
    Listening,
    /// Streaming a reply from the generator
    Generating,
    /// At least one segment has been dispatched for playback
    Speaking,
    /// The stop signal fired; the loop has wound down
    Terminated,
}

/// Drives the listen/generate/speak loop
pub struct Assistant {
    generator: Arc<dyn TextGenerator>,
    player: SpeechPlayer,
    conversation: ConversationState,
    system_prompt: String,
    sampling: SamplingConfig,
    utterances: mpsc::Receiver<Utterance>,
    stop: StopSignal,
    state: TurnState,
}

impl Assistant {
    #[must_use]
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        player: SpeechPlayer,
        system_prompt: String,
        sampling: SamplingConfig,
        utterances: mpsc::Receiver<Utterance>,
        stop: StopSignal,
    ) -> Self {
        Self {
            generator,
            player,
            conversation: ConversationState::new(),
            system_prompt,
            sampling,
            utterances,
            stop,
            state: TurnState::Idle,
        }
    }

    /// Current turn state
    #[must_use]
    pub const fn state(&self) -> TurnState {
        self.state
    }

    /// Completed history so far
    #[must_use]
    pub fn history(&self) -> Vec<crate::conversation::ConversationTurn> {
        self.conversation.snapshot()
    }

    /// Run until the stop signal fires or the utterance source closes
    ///
    /// # Errors
    ///
    /// Provider failures abort the current turn and are logged; the loop
    /// does not fail on them. A dead audio output path is fatal and is
    /// returned to the caller.
    pub async fn run(&mut self) -> Result<()> {
        loop {
            self.state = TurnState::Listening;

            let utterance = tokio::select! {
                () = self.stop.cancelled() => break,
                utterance = self.utterances.recv() => match utterance {
                    Some(utterance) => utterance,
                    None => break,
                },
            };

            println!("\u{1f9d1} {}", utterance.text);
            self.conversation.push_user(utterance.text.clone());

            if let Err(e) = self.take_turn().await {
                if matches!(e, Error::Audio(_)) {
                    self.state = TurnState::Terminated;
                    return Err(e);
                }
                tracing::warn!(error = %e, "turn aborted");
            }

            if self.stop.is_set() {
                break;
            }
        }

        self.state = TurnState::Terminated;
        tracing::info!(turns = self.conversation.len(), "assistant stopped");
        Ok(())
    }

    /// Generate, segment, and speak one reply
    async fn take_turn(&mut self) -> Result<()> {
        self.state = TurnState::Generating;

        let history = self.conversation.snapshot();
        let mut segmenter = SentenceSegmenter::new();
        let mut reply = String::new();

        print!("\u{1f916} ");
        let _ = std::io::stdout().flush();

        let turn_result = async {
            let mut fragments = self
                .generator
                .stream(&history, &self.system_prompt, self.sampling)
                .await?;

            loop {
                let fragment = tokio::select! {
                    () = self.stop.cancelled() => break,
                    fragment = fragments.next() => fragment,
                };

                match fragment {
                    Some(Ok(fragment)) => {
                        print!("{fragment}");
                        let _ = std::io::stdout().flush();
                        reply.push_str(&fragment);

                        if let Some(segment) = segmenter.push(&fragment) {
                            self.state = TurnState::Speaking;
                            self.player.speak(segment).await?;
                        }
                    }
                    Some(Err(e)) => return Err(e),
                    None => {
                        if !self.stop.is_set()
                            && let Some(segment) = segmenter.flush()
                        {
                            self.state = TurnState::Speaking;
                            self.player.speak(segment).await?;
                        }
                        break;
                    }
                }
            }

            Ok(())
        }
        .await;

        println!();

        // Wait for everything dispatched so far to finish playing, even on
        // an aborted turn, so history matches what was actually spoken. The
        // reply is committed before any flush error is reported; text already
        // printed (and possibly spoken) stays in history either way.
        let flush_result = self.player.flush().await;
        if let Err(e) = &flush_result {
            tracing::error!(error = %e, "playback flush failed");
        }

        let spoken = reply.trim();
        if !spoken.is_empty() {
            self.conversation.push_assistant(spoken);
        }

        self.state = TurnState::Idle;
        flush_result?;
        turn_result
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::audio::{PcmAudio, PlaybackSink};
    use crate::conversation::Role;
    use crate::providers::{FragmentStream, SpeechSynthesizer};

    /// Generator that replays scripted fragment lists, one per turn
    struct ScriptedGenerator {
        replies: Mutex<Vec<Vec<&'static str>>>,
        calls: Arc<Mutex<usize>>,
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn stream(
            &self,
            _turns: &[crate::conversation::ConversationTurn],
            _system_prompt: &str,
            _sampling: SamplingConfig,
        ) -> Result<FragmentStream> {
            *self.calls.lock().unwrap() += 1;
            let fragments = {
                let mut replies = self.replies.lock().unwrap();
                if replies.is_empty() {
                    Vec::new()
                } else {
                    replies.remove(0)
                }
            };
            let items: Vec<Result<String>> =
                fragments.into_iter().map(|f| Ok(f.to_string())).collect();
            Ok(Box::pin(futures::stream::iter(items)))
        }
    }

    struct NullSynthesizer;

    #[async_trait]
    impl SpeechSynthesizer for NullSynthesizer {
        async fn synthesize(&self, _text: &str) -> Result<PcmAudio> {
            Ok(PcmAudio {
                samples: vec![0; 16],
                sample_rate: 16_000,
            })
        }
    }

    struct NullSink;

    impl PlaybackSink for NullSink {
        fn play(&mut self, _audio: &PcmAudio) -> Result<()> {
            Ok(())
        }
    }

    fn scripted_assistant(
        replies: Vec<Vec<&'static str>>,
    ) -> (Assistant, mpsc::Sender<Utterance>, Arc<Mutex<usize>>) {
        let calls = Arc::new(Mutex::new(0));
        let generator = Arc::new(ScriptedGenerator {
            replies: Mutex::new(replies),
            calls: Arc::clone(&calls),
        });

        let stop = StopSignal::new();
        let player = SpeechPlayer::spawn(Arc::new(NullSynthesizer), Box::new(NullSink), stop.clone());

        let (utterance_tx, utterance_rx) = mpsc::channel(8);
        let assistant = Assistant::new(
            generator,
            player,
            "keep it short".to_string(),
            SamplingConfig::default(),
            utterance_rx,
            stop,
        );
        (assistant, utterance_tx, calls)
    }

    fn utterance(text: &str) -> Utterance {
        Utterance {
            text: text.to_string(),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn completed_turns_alternate_in_history() {
        let (mut assistant, utterance_tx, _calls) = scripted_assistant(vec![
            vec!["Hello", " there."],
            vec!["Doing", " well."],
        ]);

        utterance_tx.send(utterance("hi")).await.unwrap();
        utterance_tx.send(utterance("how are you")).await.unwrap();
        drop(utterance_tx);

        assistant.run().await.unwrap();

        let history = assistant.history();
        assert_eq!(history.len(), 4);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[0].content, "hi");
        assert_eq!(history[1].role, Role::Assistant);
        assert_eq!(history[1].content, "Hello there.");
        assert_eq!(history[2].role, Role::User);
        assert_eq!(history[3].content, "Doing well.");
        assert_eq!(assistant.state(), TurnState::Terminated);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn generations_are_serialized() {
        let (mut assistant, utterance_tx, calls) = scripted_assistant(vec![
            vec!["One."],
            vec!["Two."],
            vec!["Three."],
        ]);

        // All three are queued before the loop starts; each must still get
        // its own complete generation.
        for text in ["a", "b", "c"] {
            utterance_tx.send(utterance(text)).await.unwrap();
        }
        drop(utterance_tx);

        assistant.run().await.unwrap();

        assert_eq!(*calls.lock().unwrap(), 3);
        assert_eq!(assistant.history().len(), 6);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn generator_failure_aborts_turn_not_loop() {
        struct FailingGenerator {
            calls: Arc<Mutex<usize>>,
        }

        #[async_trait]
        impl TextGenerator for FailingGenerator {
            async fn stream(
                &self,
                _turns: &[crate::conversation::ConversationTurn],
                _system_prompt: &str,
                _sampling: SamplingConfig,
            ) -> Result<FragmentStream> {
                let call = {
                    let mut calls = self.calls.lock().unwrap();
                    *calls += 1;
                    *calls
                };
                if call == 1 {
                    return Err(crate::Error::Generation("scripted outage".to_string()));
                }
                Ok(Box::pin(futures::stream::iter(vec![Ok(
                    "Recovered.".to_string()
                )])))
            }
        }

        let calls = Arc::new(Mutex::new(0));
        let stop = StopSignal::new();
        let player = SpeechPlayer::spawn(Arc::new(NullSynthesizer), Box::new(NullSink), stop.clone());
        let (utterance_tx, utterance_rx) = mpsc::channel(8);

        let mut assistant = Assistant::new(
            Arc::new(FailingGenerator {
                calls: Arc::clone(&calls),
            }),
            player,
            String::new(),
            SamplingConfig::default(),
            utterance_rx,
            stop,
        );

        utterance_tx.send(utterance("first")).await.unwrap();
        utterance_tx.send(utterance("second")).await.unwrap();
        drop(utterance_tx);

        assistant.run().await.unwrap();

        // First turn left a lone user entry; second completed normally
        let history = assistant.history();
        assert_eq!(*calls.lock().unwrap(), 2);
        assert_eq!(history.len(), 3);
        assert_eq!(history[2].content, "Recovered.");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn dead_output_path_is_fatal_but_reply_stays_in_history() {
        struct BrokenSink;

        impl PlaybackSink for BrokenSink {
            fn play(&mut self, _audio: &PcmAudio) -> Result<()> {
                Err(crate::Error::Audio("output device disconnected".to_string()))
            }
        }

        let calls = Arc::new(Mutex::new(0));
        let generator = Arc::new(ScriptedGenerator {
            replies: Mutex::new(vec![vec!["One.", " Two.", " Three."]]),
            calls: Arc::clone(&calls),
        });

        let stop = StopSignal::new();
        let player =
            SpeechPlayer::spawn(Arc::new(NullSynthesizer), Box::new(BrokenSink), stop.clone());
        let (utterance_tx, utterance_rx) = mpsc::channel(8);

        let mut assistant = Assistant::new(
            generator,
            player,
            String::new(),
            SamplingConfig::default(),
            utterance_rx,
            stop,
        );

        // Keep the sender alive so the loop can only end on the audio failure
        utterance_tx.send(utterance("hello")).await.unwrap();

        let result = tokio::time::timeout(Duration::from_secs(5), assistant.run())
            .await
            .expect("loop should end once the output path dies");
        assert!(matches!(result, Err(crate::Error::Audio(_))));
        assert_eq!(assistant.state(), TurnState::Terminated);

        // Text generated before the failure is still committed
        let history = assistant.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].role, Role::Assistant);
        assert!(history[1].content.starts_with("One."));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn stop_mid_stream_commits_partial_reply() {
        struct StallingGenerator {
            stop: StopSignal,
        }

        #[async_trait]
        impl TextGenerator for StallingGenerator {
            async fn stream(
                &self,
                _turns: &[crate::conversation::ConversationTurn],
                _system_prompt: &str,
                _sampling: SamplingConfig,
            ) -> Result<FragmentStream> {
                let stop = self.stop.clone();
                let stream = futures::stream::unfold(0u32, move |count| {
                    let stop = stop.clone();
                    async move {
                        match count {
                            0 => Some((Ok("Partial answer".to_string()), 1)),
                            1 => {
                                // Fire the stop signal, then stall; the
                                // orchestrator must bail at its checkpoint.
                                stop.trigger();
                                tokio::time::sleep(Duration::from_secs(30)).await;
                                Some((Ok("never delivered".to_string()), 2))
                            }
                            _ => None,
                        }
                    }
                });
                Ok(Box::pin(stream))
            }
        }

        let stop = StopSignal::new();
        let player = SpeechPlayer::spawn(Arc::new(NullSynthesizer), Box::new(NullSink), stop.clone());
        let (utterance_tx, utterance_rx) = mpsc::channel(8);

        let mut assistant = Assistant::new(
            Arc::new(StallingGenerator { stop: stop.clone() }),
            player,
            String::new(),
            SamplingConfig::default(),
            utterance_rx,
            stop,
        );

        utterance_tx.send(utterance("question")).await.unwrap();

        tokio::time::timeout(Duration::from_secs(5), assistant.run())
            .await
            .expect("loop should terminate promptly after stop")
            .unwrap();

        let history = assistant.history();
        assert_eq!(assistant.state(), TurnState::Terminated);
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].content, "Partial answer");
    }
}
