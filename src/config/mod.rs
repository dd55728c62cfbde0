//! Configuration management for confab

pub mod file;

use crate::providers::SamplingConfig;
use crate::{Error, Result};

/// Default system prompt (short answers suit spoken replies)
const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful voice assistant. \
     Keep answers short and conversational, as they will be spoken aloud.";

/// Confab configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Assistant persona and sampling
    pub assistant: AssistantConfig,

    /// Voice configuration
    pub voice: VoiceConfig,

    /// API keys
    pub api_keys: ApiKeys,
}

/// Assistant persona configuration
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    /// System prompt prepended to every generation
    pub system_prompt: String,

    /// Chat model identifier
    pub model: String,

    /// Chat completions base URL (OpenAI-compatible)
    pub base_url: String,

    /// Sampling parameters
    pub sampling: SamplingConfig,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            sampling: SamplingConfig::default(),
        }
    }
}

/// TTS provider backend
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum TtsProvider {
    #[default]
    OpenAi,
    ElevenLabs,
}

/// Voice processing configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// STT model (e.g. "nova-2")
    pub stt_model: String,

    /// TTS provider backend
    pub tts_provider: TtsProvider,

    /// TTS model (e.g. "tts-1", "eleven_monolingual_v1")
    pub tts_model: String,

    /// TTS voice identifier
    pub tts_voice: String,

    /// TTS speed multiplier (OpenAI only)
    pub tts_speed: f32,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            stt_model: "nova-2".to_string(),
            tts_provider: TtsProvider::OpenAi,
            tts_model: "tts-1".to_string(),
            tts_voice: "alloy".to_string(),
            tts_speed: 1.0,
        }
    }
}

/// API keys for external services
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    /// `OpenAI` API key (generation and TTS)
    pub openai: Option<String>,

    /// `Deepgram` API key (streaming STT)
    pub deepgram: Option<String>,

    /// `ElevenLabs` API key (optional TTS)
    pub elevenlabs: Option<String>,
}

impl Config {
    /// Load configuration (env > toml file > defaults)
    #[must_use]
    pub fn load() -> Self {
        let fc = file::load_config_file();
        Self::from_file_config(fc)
    }

    fn from_file_config(fc: file::ConfabConfigFile) -> Self {
        let defaults = AssistantConfig::default();
        let assistant = AssistantConfig {
            system_prompt: fc
                .assistant
                .system_prompt
                .unwrap_or(defaults.system_prompt),
            model: fc.assistant.model.unwrap_or(defaults.model),
            base_url: fc.assistant.base_url.unwrap_or(defaults.base_url),
            sampling: SamplingConfig {
                temperature: fc
                    .assistant
                    .temperature
                    .unwrap_or(defaults.sampling.temperature),
                max_tokens: fc
                    .assistant
                    .max_tokens
                    .unwrap_or(defaults.sampling.max_tokens),
            },
        };

        let voice_defaults = VoiceConfig::default();
        let tts_provider = match fc.voice.tts_provider.as_deref() {
            Some("elevenlabs") => TtsProvider::ElevenLabs,
            Some("openai") | None => TtsProvider::OpenAi,
            Some(other) => {
                tracing::warn!(provider = other, "unknown TTS provider, using openai");
                TtsProvider::OpenAi
            }
        };
        let voice = VoiceConfig {
            stt_model: fc.voice.stt_model.unwrap_or(voice_defaults.stt_model),
            tts_provider,
            tts_model: fc.voice.tts_model.unwrap_or_else(|| match tts_provider {
                TtsProvider::OpenAi => voice_defaults.tts_model,
                TtsProvider::ElevenLabs => "eleven_monolingual_v1".to_string(),
            }),
            tts_voice: fc.voice.tts_voice.unwrap_or(voice_defaults.tts_voice),
            tts_speed: fc.voice.tts_speed.unwrap_or(voice_defaults.tts_speed),
        };

        // API keys: env > toml > None
        let api_keys = ApiKeys {
            openai: std::env::var("OPENAI_API_KEY").ok().or(fc.api_keys.openai),
            deepgram: std::env::var("DEEPGRAM_API_KEY")
                .ok()
                .or(fc.api_keys.deepgram),
            elevenlabs: std::env::var("ELEVENLABS_API_KEY")
                .ok()
                .or(fc.api_keys.elevenlabs),
        };

        Self {
            assistant,
            voice,
            api_keys,
        }
    }

    /// Verify the keys needed for the configured providers are present
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` naming the first missing key
    pub fn validate(&self) -> Result<()> {
        if self.api_keys.deepgram.is_none() {
            return Err(Error::Config(
                "DEEPGRAM_API_KEY is required for speech recognition".to_string(),
            ));
        }
        if self.api_keys.openai.is_none() {
            return Err(Error::Config(
                "OPENAI_API_KEY is required for generation".to_string(),
            ));
        }
        if self.voice.tts_provider == TtsProvider::ElevenLabs
            && self.api_keys.elevenlabs.is_none()
        {
            return Err(Error::Config(
                "ELEVENLABS_API_KEY is required for the elevenlabs TTS provider".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_favor_short_spoken_replies() {
        let config = AssistantConfig::default();
        assert!((config.sampling.temperature - 0.5).abs() < f32::EPSILON);
        assert_eq!(config.sampling.max_tokens, 300);
        assert!(config.system_prompt.contains("short"));
    }

    #[test]
    fn file_values_override_defaults() {
        let fc: file::ConfabConfigFile = toml::from_str(
            r#"
            [assistant]
            model = "local-model"
            base_url = "http://localhost:8080/v1"

            [voice]
            tts_provider = "elevenlabs"
        "#,
        )
        .unwrap();

        let config = Config::from_file_config(fc);
        assert_eq!(config.assistant.model, "local-model");
        assert_eq!(config.assistant.base_url, "http://localhost:8080/v1");
        assert_eq!(config.voice.tts_provider, TtsProvider::ElevenLabs);
        // ElevenLabs gets its own default model
        assert_eq!(config.voice.tts_model, "eleven_monolingual_v1");
    }

    #[test]
    fn validate_requires_provider_keys() {
        let config = Config {
            assistant: AssistantConfig::default(),
            voice: VoiceConfig::default(),
            api_keys: ApiKeys::default(),
        };
        assert!(config.validate().is_err());

        let config = Config {
            api_keys: ApiKeys {
                openai: Some("sk".to_string()),
                deepgram: Some("dg".to_string()),
                elevenlabs: None,
            },
            ..config
        };
        assert!(config.validate().is_ok());
    }
}
