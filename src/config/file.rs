//! TOML configuration file loading
//!
//! Supports `~/.config/confab/config.toml` as a persistent config source.
//! All fields are optional — the file is a partial overlay on top of defaults.

use std::path::PathBuf;

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct ConfabConfigFile {
    /// Assistant persona and sampling
    #[serde(default)]
    pub assistant: AssistantFileConfig,

    /// Voice/audio configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,
}

/// Assistant persona configuration
#[derive(Debug, Default, Deserialize)]
pub struct AssistantFileConfig {
    /// System prompt prepended to every generation
    pub system_prompt: Option<String>,

    /// Chat model identifier (e.g. "gpt-4o-mini")
    pub model: Option<String>,

    /// Chat completions base URL for OpenAI-compatible servers
    pub base_url: Option<String>,

    /// Sampling temperature
    pub temperature: Option<f32>,

    /// Reply length cap in tokens
    pub max_tokens: Option<u32>,
}

/// Voice processing configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// STT model (e.g. "nova-2")
    pub stt_model: Option<String>,

    /// TTS provider ("openai" or "elevenlabs")
    pub tts_provider: Option<String>,

    /// TTS model (e.g. "tts-1")
    pub tts_model: Option<String>,

    /// TTS voice identifier (e.g. "alloy", or an ElevenLabs voice ID)
    pub tts_voice: Option<String>,

    /// TTS speed multiplier (OpenAI only)
    pub tts_speed: Option<f32>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub openai: Option<String>,
    pub deepgram: Option<String>,
    pub elevenlabs: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `ConfabConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> ConfabConfigFile {
    let Some(path) = config_file_path() else {
        return ConfabConfigFile::default();
    };

    if !path.exists() {
        return ConfabConfigFile::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                ConfabConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            ConfabConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/confab/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("confab").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_file() {
        let content = r#"
            [assistant]
            system_prompt = "be brief"
            model = "gpt-4o-mini"
            temperature = 0.7
            max_tokens = 150

            [voice]
            stt_model = "nova-2"
            tts_provider = "elevenlabs"
            tts_voice = "some-voice-id"

            [api_keys]
            openai = "sk-test"
            deepgram = "dg-test"
        "#;

        let config: ConfabConfigFile = toml::from_str(content).unwrap();
        assert_eq!(config.assistant.system_prompt.as_deref(), Some("be brief"));
        assert_eq!(config.assistant.temperature, Some(0.7));
        assert_eq!(config.assistant.max_tokens, Some(150));
        assert_eq!(config.voice.tts_provider.as_deref(), Some("elevenlabs"));
        assert_eq!(config.api_keys.openai.as_deref(), Some("sk-test"));
        assert!(config.api_keys.elevenlabs.is_none());
    }

    #[test]
    fn empty_file_is_all_defaults() {
        let config: ConfabConfigFile = toml::from_str("").unwrap();
        assert!(config.assistant.model.is_none());
        assert!(config.voice.stt_model.is_none());
        assert!(config.api_keys.deepgram.is_none());
    }
}
