//! Configuration schema for Apployd.

use apployd_protocol::{SafetySetting, default_safety_settings};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root config for the Apployd assistant.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ApploydConfig {
    #[serde(default, rename = "$schema", skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub prompt: PromptConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
}

impl ApploydConfig {
    /// Start building a config programmatically with defaults applied.
    pub fn builder() -> ApploydConfigBuilder {
        ApploydConfigBuilder::new()
    }
}

/// Builder for assembling an `ApploydConfig` in code.
#[derive(Debug, Default, Clone)]
pub struct ApploydConfigBuilder {
    config: ApploydConfig,
}

impl ApploydConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ApploydConfig::default(),
        }
    }

    /// Replace the memory store configuration.
    pub fn memory(mut self, memory: MemoryConfig) -> Self {
        self.config.memory = memory;
        self
    }

    /// Replace the prompt assembly configuration.
    pub fn prompt(mut self, prompt: PromptConfig) -> Self {
        self.config.prompt = prompt;
        self
    }

    /// Replace the completion service configuration.
    pub fn completion(mut self, completion: CompletionConfig) -> Self {
        self.config.completion = completion;
        self
    }

    pub fn build(self) -> ApploydConfig {
        self.config
    }
}

/// Memory store location and recall sizes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MemoryConfig {
    /// Store file; relative paths resolve against the working directory.
    #[serde(default = "default_memory_path")]
    pub path: PathBuf,
    #[serde(default = "default_recall_limit")]
    pub recall_limit: usize,
    /// Per-type limit used for personal questions.
    #[serde(default = "default_personal_recall_limit")]
    pub personal_recall_limit: usize,
    /// Prior messages sent along with a new message.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    #[serde(default)]
    pub capture: CaptureConfig,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            path: default_memory_path(),
            recall_limit: default_recall_limit(),
            personal_recall_limit: default_personal_recall_limit(),
            history_limit: default_history_limit(),
            capture: CaptureConfig::default(),
        }
    }
}

fn default_memory_path() -> PathBuf {
    PathBuf::from(".apployd/memory.json")
}

fn default_recall_limit() -> usize {
    5
}

fn default_personal_recall_limit() -> usize {
    3
}

fn default_history_limit() -> usize {
    10
}

/// Toggles for the write-side analyzers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CaptureConfig {
    #[serde(default = "default_true")]
    pub extract_facts: bool,
    #[serde(default = "default_true")]
    pub track_context: bool,
    #[serde(default = "default_true")]
    pub track_consistency: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            extract_facts: true,
            track_context: true,
            track_consistency: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// System prompt overrides and the context budget.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PromptConfig {
    /// Inline replacement for the built-in instructions.
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// File whose contents replace the built-in instructions.
    #[serde(default)]
    pub system_prompt_path: Option<PathBuf>,
    /// Character budget for the memory context block; `null` disables it.
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: Option<usize>,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            system_prompt: None,
            system_prompt_path: None,
            max_context_chars: default_max_context_chars(),
        }
    }
}

fn default_max_context_chars() -> Option<usize> {
    Some(6000)
}

/// Completion service selection and decoding parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletionConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default = "default_top_k")]
    pub top_k: u32,
    #[serde(default)]
    pub max_output_tokens: Option<u32>,
    #[serde(default = "default_safety_settings")]
    pub safety_settings: Vec<SafetySetting>,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            base_url: default_base_url(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            top_k: default_top_k(),
            max_output_tokens: None,
            safety_settings: default_safety_settings(),
        }
    }
}

/// Providers the engine knows how to construct.
pub const SUPPORTED_PROVIDERS: &[&str] = &["gemini"];

fn default_provider() -> String {
    "gemini".to_string()
}

fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_top_p() -> f32 {
    0.95
}

fn default_top_k() -> u32 {
    64
}
