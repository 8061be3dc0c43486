//! Tests for layered configuration loading.

use super::*;
use crate::{CompletionConfig, PromptConfig};
use apployd_protocol::HarmBlockThreshold;
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Write JSON5 contents to a path, creating parent directories if needed.
fn write_json5(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("dir");
    }
    fs::write(path, contents).expect("write");
}

/// Project with a `.git` marker and a nested working directory.
fn project_layout(temp: &TempDir) -> (PathBuf, PathBuf) {
    let project_root = temp.path().join("project");
    fs::create_dir_all(project_root.join(".git")).expect("git");
    let cwd = project_root.join("subdir");
    fs::create_dir_all(&cwd).expect("cwd");
    (project_root, cwd)
}

#[test]
fn parse_minimal_config() {
    let config = ApploydConfig::load_from_str("{}").expect("config");
    assert_eq!(config.memory.recall_limit, 5);
    assert_eq!(config.memory.personal_recall_limit, 3);
    assert_eq!(config.memory.history_limit, 10);
    assert_eq!(config.prompt, PromptConfig::default());
    assert_eq!(config.prompt.max_context_chars, Some(6000));
    assert_eq!(config.completion, CompletionConfig::default());
    assert_eq!(config.completion.top_k, 64);
    assert_eq!(config.completion.safety_settings.len(), 4);
}

#[test]
fn rejects_unknown_top_level_key() {
    let err = ApploydConfig::load_from_str(r#"{ unexpected: true }"#).unwrap_err();
    assert!(format!("{err}").contains("unknown key"));
}

#[test]
fn rejects_wrong_field_type_with_path() {
    let err = ApploydConfig::load_from_str(r#"{ memory: { recall_limit: "five" } }"#).unwrap_err();
    assert!(format!("{err}").contains("memory.recall_limit"));
}

#[test]
fn rejects_unknown_safety_threshold() {
    let json5 = r#"{
        completion: {
            safety_settings: [{ category: "HARM_CATEGORY_HARASSMENT", threshold: "BLOCK_ALL" }],
        },
    }"#;
    let err = ApploydConfig::load_from_str(json5).unwrap_err();
    let msg = format!("{err}");
    assert!(msg.contains("completion.safety_settings[0].threshold"));
}

#[test]
fn null_disables_context_budget() {
    let config =
        ApploydConfig::load_from_str("{ prompt: { max_context_chars: null } }").expect("config");
    assert_eq!(config.prompt.max_context_chars, None);
}

#[test]
fn rejects_both_prompt_overrides() {
    let json5 = r#"{ prompt: { system_prompt: "hi", system_prompt_path: "prompt.md" } }"#;
    let err = ApploydConfig::load_from_str(json5).unwrap_err();
    assert!(format!("{err}").contains("system_prompt_path"));
}

#[test]
fn rejects_unsupported_provider() {
    let err = ApploydConfig::load_from_str(r#"{ completion: { provider: "mystery" } }"#)
        .unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
}

#[test]
fn cwd_layer_overrides_project_and_user() {
    let temp = TempDir::new().expect("tmp");
    let (project_root, cwd) = project_layout(&temp);

    let user_config = temp.path().join("user.json5");
    write_json5(
        &user_config,
        "{ memory: { recall_limit: 7, history_limit: 4 }, completion: { model: \"user-model\" } }",
    );
    write_json5(
        &project_root.join(DEFAULT_CONFIG_FILE),
        "{ memory: { recall_limit: 8 } }",
    );
    write_json5(
        &cwd.join(DEFAULT_CONFIG_FILE),
        "{ completion: { model: \"cwd-model\" } }",
    );

    let mut options = LayeredConfigOptions::new(&cwd);
    options.user_config_path = Some(user_config);

    let layered = ApploydConfig::load_layered_with_options(options).expect("layered");
    assert_eq!(layered.config.memory.recall_limit, 8);
    assert_eq!(layered.config.memory.history_limit, 4);
    assert_eq!(layered.config.completion.model, "cwd-model");
    let sources: Vec<_> = layered.layers.iter().map(|layer| layer.source).collect();
    assert_eq!(
        sources,
        vec![
            ConfigLayerSource::User,
            ConfigLayerSource::Project,
            ConfigLayerSource::Cwd
        ]
    );
}

#[test]
fn runtime_override_wins() {
    let temp = TempDir::new().expect("tmp");
    let (_project_root, cwd) = project_layout(&temp);
    write_json5(
        &cwd.join(DEFAULT_CONFIG_FILE),
        "{ completion: { temperature: 0.2 } }",
    );
    let runtime_config = temp.path().join("runtime.json5");
    write_json5(
        &runtime_config,
        r#"{ completion: { temperature: 1.1, safety_settings: [
            { category: "HARM_CATEGORY_HATE_SPEECH", threshold: "BLOCK_ONLY_HIGH" },
        ] } }"#,
    );

    let mut options = LayeredConfigOptions::new(&cwd).with_runtime_path(&runtime_config);
    options.user_config_path = None;

    let layered = ApploydConfig::load_layered_with_options(options).expect("layered");
    assert!((layered.config.completion.temperature - 1.1).abs() < 1e-6);
    assert_eq!(layered.config.completion.safety_settings.len(), 1);
    assert_eq!(
        layered.config.completion.safety_settings[0].threshold,
        HarmBlockThreshold::BlockOnlyHigh
    );
}

#[test]
fn cwd_at_project_root_is_loaded_once() {
    let temp = TempDir::new().expect("tmp");
    let (project_root, _cwd) = project_layout(&temp);
    write_json5(
        &project_root.join(DEFAULT_CONFIG_FILE),
        "{ memory: { history_limit: 2 } }",
    );
    let mut options = LayeredConfigOptions::new(&project_root);
    options.user_config_path = None;

    let layered = ApploydConfig::load_layered_with_options(options).expect("layered");
    assert_eq!(layered.layers.len(), 1);
    assert_eq!(layered.layers[0].source, ConfigLayerSource::Project);
    assert_eq!(layered.config.memory.history_limit, 2);
}

#[test]
fn missing_runtime_layer_is_an_error() {
    let temp = TempDir::new().expect("tmp");
    let mut options =
        LayeredConfigOptions::new(temp.path()).with_runtime_path(temp.path().join("absent.json5"));
    options.user_config_path = None;
    let err = ApploydConfig::load_layered_with_options(options).unwrap_err();
    assert!(matches!(err, ConfigError::ReadFailed(_)));
}

#[test]
fn builder_replaces_sections() {
    let config = ApploydConfig::builder()
        .prompt(PromptConfig {
            system_prompt: Some("Be brief.".to_string()),
            ..PromptConfig::default()
        })
        .build();
    assert_eq!(config.prompt.system_prompt.as_deref(), Some("Be brief."));
    config.validate().expect("valid");
}
