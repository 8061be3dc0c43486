//! Locating config layers on disk and reading them.

use super::{
    ConfigLayer, ConfigLayerSource, DEFAULT_CONFIG_DIR, DEFAULT_CONFIG_FILE, LayeredConfigOptions,
    LoadedLayer, SchemaMode, schema,
};
use crate::ConfigError;
use directories::UserDirs;
use log::debug;
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// `~/.apployd/apployd.json5`, when a home directory is known.
pub(super) fn user_config_path() -> Option<PathBuf> {
    let dirs = UserDirs::new()?;
    Some(
        dirs.home_dir()
            .join(DEFAULT_CONFIG_DIR)
            .join(DEFAULT_CONFIG_FILE),
    )
}

/// Canonical form of `path`, or `path` itself when it does not exist yet.
pub(super) fn canonical(path: &Path) -> Result<PathBuf, ConfigError> {
    match path.canonicalize() {
        Ok(path) => Ok(path),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(path.to_path_buf()),
        Err(err) => Err(ConfigError::ReadFailed(err)),
    }
}

/// Optional layers that exist on disk, lowest precedence first.
///
/// A file reachable through two sources (cwd at the project root) is listed once.
pub(super) fn discover(
    options: &LayeredConfigOptions,
    cwd: &Path,
) -> Result<Vec<(ConfigLayerSource, PathBuf)>, ConfigError> {
    let mut candidates = Vec::new();
    if let Some(path) = &options.user_config_path {
        candidates.push((ConfigLayerSource::User, path.clone()));
    }
    let project_root = cwd.ancestors().find(|dir| {
        options
            .project_root_markers
            .iter()
            .any(|marker| dir.join(marker).exists())
    });
    match project_root {
        Some(root) => {
            debug!("resolved project root: {}", root.display());
            candidates.push((ConfigLayerSource::Project, root.join(DEFAULT_CONFIG_FILE)));
        }
        None => debug!("project root not found; skipping project layer"),
    }
    candidates.push((ConfigLayerSource::Cwd, cwd.join(DEFAULT_CONFIG_FILE)));

    let mut seen = HashSet::new();
    let mut found = Vec::new();
    for (source, path) in candidates {
        if !path.exists() {
            debug!(
                "optional layer missing (source={}, path={})",
                source.label(),
                path.display()
            );
            continue;
        }
        if !seen.insert(canonical(&path)?) {
            debug!(
                "skipping duplicate layer (source={}, path={})",
                source.label(),
                path.display()
            );
            continue;
        }
        found.push((source, path));
    }
    Ok(found)
}

/// Parse one layer and check it against the partial schema.
pub(super) fn read_layer(
    source: ConfigLayerSource,
    path: &Path,
) -> Result<LoadedLayer, ConfigError> {
    debug!(
        "loading config layer (source={}, path={})",
        source.label(),
        path.display()
    );
    let contents = std::fs::read_to_string(path)?;
    let value: Value = json5::from_str(&contents)?;
    let label = format!("{}({})", source.label(), path.display());
    schema::validate_layer_schema(&value, SchemaMode::Partial, &label)?;
    Ok(LoadedLayer {
        meta: ConfigLayer {
            source,
            path: path.to_path_buf(),
        },
        value,
    })
}
