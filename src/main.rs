use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use confab::audio::{AudioCapture, AudioPlayback, FRAME_QUEUE_CAPACITY, PcmAudio, PlaybackSink};
use confab::config::TtsProvider;
use confab::providers::{
    DeepgramRecognizer, ElevenLabsSynthesizer, OpenAiGenerator, OpenAiSynthesizer,
    SpeechSynthesizer,
};
use confab::{Assistant, Config, SpeechPlayer, StopSignal, TranscriptionSession};

/// Confab - talk to an assistant out loud
#[derive(Parser)]
#[command(name = "confab", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
#[allow(clippy::enum_variant_names)]
enum Command {
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
    /// Test TTS output
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,confab=info",
        1 => "info,confab=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestMic { duration } => test_mic(duration).await,
            Command::TestSpeaker => test_speaker(),
            Command::TestTts { text } => test_tts(&text).await,
        };
    }

    let config = Config::load();
    config.validate()?;

    tracing::info!(
        model = %config.assistant.model,
        stt_model = %config.voice.stt_model,
        tts_provider = ?config.voice.tts_provider,
        "starting confab"
    );

    let stop = StopSignal::new();

    // Ctrl-C triggers the cooperative stop signal
    let ctrl_c_stop = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown requested");
            ctrl_c_stop.trigger();
        }
    });

    let recognizer = Arc::new(DeepgramRecognizer::new(
        config.api_keys.deepgram.clone().unwrap_or_default(),
        config.voice.stt_model.clone(),
    )?);

    let generator = Arc::new(OpenAiGenerator::new(
        config.api_keys.openai.clone().unwrap_or_default(),
        config.assistant.base_url.clone(),
        config.assistant.model.clone(),
    )?);

    let synthesizer = build_synthesizer(&config)?;

    let (frame_tx, frame_rx) = mpsc::channel(FRAME_QUEUE_CAPACITY);
    let (utterance_tx, utterance_rx) = mpsc::channel(8);

    let transcription =
        TranscriptionSession::new(recognizer, frame_rx, utterance_tx, stop.clone());
    tokio::spawn(transcription.run());

    let player = SpeechPlayer::spawn(synthesizer, Box::new(AudioPlayback::new()?), stop.clone());

    // The capture stream lives on this task (cpal streams aren't Send)
    let mut capture = AudioCapture::new()?;
    capture.start(frame_tx, stop.clone())?;

    tracing::info!("confab ready - start talking");

    let mut assistant = Assistant::new(
        generator,
        player,
        config.assistant.system_prompt,
        config.assistant.sampling,
        utterance_rx,
        stop,
    );
    let outcome = assistant.run().await;

    capture.stop();
    if capture.is_failed() {
        anyhow::bail!("audio capture stream failed");
    }
    outcome?;

    Ok(())
}

fn build_synthesizer(config: &Config) -> anyhow::Result<Arc<dyn SpeechSynthesizer>> {
    let synthesizer: Arc<dyn SpeechSynthesizer> = match config.voice.tts_provider {
        TtsProvider::OpenAi => Arc::new(OpenAiSynthesizer::new(
            config.api_keys.openai.clone().unwrap_or_default(),
            config.voice.tts_voice.clone(),
            config.voice.tts_speed,
            config.voice.tts_model.clone(),
        )?),
        TtsProvider::ElevenLabs => Arc::new(ElevenLabsSynthesizer::new(
            config.api_keys.elevenlabs.clone().unwrap_or_default(),
            config.voice.tts_voice.clone(),
            config.voice.tts_model.clone(),
        )?),
    };
    Ok(synthesizer)
}

/// Test microphone input
#[allow(clippy::future_not_send)]
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let (frame_tx, mut frame_rx) = mpsc::channel(FRAME_QUEUE_CAPACITY);

    let mut capture = AudioCapture::new()?;
    capture.start(frame_tx, StopSignal::new())?;

    let sample_rate = capture.sample_rate();
    println!("Sample rate: {sample_rate} Hz");
    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let mut samples: Vec<i16> = Vec::new();
        while let Ok(frame) = frame_rx.try_recv() {
            samples.extend_from_slice(frame.samples());
        }

        let energy = calculate_rms(&samples);
        let peak = samples
            .iter()
            .map(|s| f32::from(*s).abs() / 32768.0)
            .fold(0.0f32, f32::max);

        // Visual meter
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "\u{2588}".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!(
            "[{:2}s] RMS: {:.4} | Peak: {:.4} | [{}]",
            i + 1,
            energy,
            peak,
            meter
        );
    }

    capture.stop();

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: pactl info | grep 'Default Source'");
    println!("  3. Run: arecord -l (to list devices)");
    println!("  4. Try: pavucontrol (to check levels)");

    Ok(())
}

/// Calculate RMS energy of normalized samples
#[allow(clippy::cast_precision_loss)]
fn calculate_rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples
        .iter()
        .map(|&s| {
            let normalized = f32::from(s) / 32768.0;
            normalized * normalized
        })
        .sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Test speaker output with a sine wave
fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let sample_rate = 24_000_u32;
    let frequency = 440.0_f32;
    let duration_secs = 2.0_f32;
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let num_samples = (sample_rate as f32 * duration_secs) as usize;

    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    let samples: Vec<i16> = (0..num_samples)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            let value = (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3; // 30% volume
            (value * 32767.0) as i16
        })
        .collect();

    println!("Playing {} samples at {} Hz...", samples.len(), sample_rate);

    let mut playback = AudioPlayback::new()?;
    playback.play(&PcmAudio {
        samples,
        sample_rate,
    })?;

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");
    println!("If you didn't hear anything, check:");
    println!("  1. Run: pactl info | grep 'Default Sink'");
    println!("  2. Run: pactl list sinks short");
    println!("  3. Try: pavucontrol (to check output levels)");

    Ok(())
}

/// Test TTS output
async fn test_tts(text: &str) -> anyhow::Result<()> {
    println!("Testing TTS with text: \"{text}\"\n");

    let config = Config::load();
    let synthesizer = build_synthesizer(&config)?;

    println!("Synthesizing speech...");
    let audio = synthesizer.synthesize(text).await?;
    println!(
        "Got {} samples at {} Hz",
        audio.samples.len(),
        audio.sample_rate
    );

    println!("Playing audio...");
    let mut playback = AudioPlayback::new()?;
    playback.play(&audio)?;

    println!("\n---");
    println!("If you heard the speech, TTS is working!");

    Ok(())
}
