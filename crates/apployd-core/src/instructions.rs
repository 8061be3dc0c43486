//! System instructions placed ahead of every prompt.

use crate::error::ApploydCoreError;
use apployd_config::PromptConfig;
use apployd_protocol::PatternError;
use chrono::NaiveDate;
use log::debug;
use regex::Regex;
use std::path::Path;

const CURRENT_DATE_PATTERN: &str = r"`Current date: [^`\n]*`";

/// Built-in instructions for `today`.
pub fn builtin_instructions(today: NaiveDate) -> String {
    format!(
        "You are Apployd, an advanced AI assistant.\n\
Knowledge cutoff: 2024-06\n\
Current date: {today}\n\n\
You are helpful, creative, and provide accurate information. \
If you're unsure about something, you'll admit it rather than making up information."
    )
}

/// Replace every `` `Current date: ...` `` marker with `today` (YYYY-MM-DD).
pub fn substitute_current_date(
    instructions: &str,
    today: NaiveDate,
) -> Result<String, ApploydCoreError> {
    let marker = Regex::new(CURRENT_DATE_PATTERN).map_err(PatternError::from)?;
    Ok(marker
        .replace_all(instructions, format!("`Current date: {today}`").as_str())
        .into_owned())
}

/// Resolve the instruction text for `config`.
///
/// An inline `system_prompt` wins; otherwise `system_prompt_path` (relative
/// paths resolve against `cwd`) is read and date-substituted; otherwise the
/// built-in instructions are used.
pub fn load_instructions(
    config: &PromptConfig,
    cwd: &Path,
    today: NaiveDate,
) -> Result<String, ApploydCoreError> {
    if let Some(inline) = config.system_prompt.as_deref() {
        debug!("using inline system prompt (chars={})", inline.chars().count());
        return substitute_current_date(inline, today);
    }
    if let Some(path) = config.system_prompt_path.as_deref() {
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            cwd.join(path)
        };
        let raw = std::fs::read_to_string(&path)?;
        debug!("loaded system prompt (path={})", path.display());
        return substitute_current_date(&raw, today);
    }
    Ok(builtin_instructions(today))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 14).expect("date")
    }

    #[test]
    fn builtin_carries_current_date() {
        let text = builtin_instructions(day());
        assert!(text.starts_with("You are Apployd"));
        assert!(text.contains("Current date: 2025-03-14"));
    }

    #[test]
    fn substitutes_backticked_date_markers_only() {
        let raw = "Intro\n`Current date: 2020-01-01`\nCurrent date: keep";
        assert_eq!(
            substitute_current_date(raw, day()).expect("substitute"),
            "Intro\n`Current date: 2025-03-14`\nCurrent date: keep"
        );
    }

    #[test]
    fn inline_prompt_wins() {
        let config = PromptConfig {
            system_prompt: Some("Be brief.".to_string()),
            ..PromptConfig::default()
        };
        let temp = tempdir().expect("tempdir");
        let text = load_instructions(&config, temp.path(), day()).expect("instructions");
        assert_eq!(text, "Be brief.");
    }

    #[test]
    fn relative_prompt_path_resolves_against_cwd() {
        let temp = tempdir().expect("tempdir");
        std::fs::write(
            temp.path().join("prompt.md"),
            "Assistant\n`Current date: unknown`",
        )
        .expect("write");
        let config = PromptConfig {
            system_prompt_path: Some("prompt.md".into()),
            ..PromptConfig::default()
        };
        let text = load_instructions(&config, temp.path(), day()).expect("instructions");
        assert_eq!(text, "Assistant\n`Current date: 2025-03-14`");
    }

    #[test]
    fn missing_prompt_file_is_an_io_error() {
        let temp = tempdir().expect("tempdir");
        let config = PromptConfig {
            system_prompt_path: Some("absent.md".into()),
            ..PromptConfig::default()
        };
        let err = load_instructions(&config, temp.path(), day()).expect_err("missing");
        assert!(matches!(err, ApploydCoreError::Io(_)));
    }
}
