//! User settings for tag matching, completion and navigation.
//!
//! ## Learning: Partial Config Files
//!
//! Every section derives `Deserialize` with `#[serde(default)]`, so keys
//! missing from the TOML file fall back to `Default`. A file only lists
//! what it changes:
//!
//! ```toml
//! [tag_matching]
//! rename_together = false
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Live tag pair highlighting and renaming
    pub tag_matching: TagMatchingConfig,

    /// Completion settings
    pub autocomplete: AutocompleteConfig,

    /// Jump-to-definition settings
    pub hyperclick: HyperclickConfig,

    /// Taglib discovery
    pub taglib: TaglibConfig,
}

impl Config {
    /// Loads config from the default location.
    pub fn load() -> Self {
        Self::load_from_default_path().unwrap_or_else(|err| {
            tracing::warn!("Falling back to default config: {}", err);
            Self::default()
        })
    }

    /// Loads config from a file.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Loads from the default config path.
    fn load_from_default_path() -> Result<Self, ConfigError> {
        let path = Self::default_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Returns the default config file path.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("marko-lens").join("config.toml"))
    }

    /// Saves the config to a path.
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Tag matching configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TagMatchingConfig {
    /// Highlight the tag pair around the cursor
    pub enabled: bool,

    /// Decoration class applied to highlighted tags
    pub highlight_class: String,

    /// Mirror tag name edits onto the partner tag
    pub rename_together: bool,

    /// Typing any of these drops the current pair
    pub special_chars: String,
}

impl Default for TagMatchingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            highlight_class: "bracket-matcher".to_string(),
            rename_together: true,
            special_chars: "<>.#".to_string(),
        }
    }
}

impl TagMatchingConfig {
    /// Returns true if `text` contains a structurally significant char.
    pub fn is_structural(&self, text: &str) -> bool {
        text.chars().any(|c| self.special_chars.contains(c))
    }
}

/// Autocomplete configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutocompleteConfig {
    pub enabled: bool,

    /// Re-open suggestions after a tag rename
    pub trigger_after_rename: bool,

    /// Oldest Marko major version that gets tag suggestions
    pub min_marko_version: u32,
}

impl Default for AutocompleteConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            trigger_after_rename: true,
            min_marko_version: 3,
        }
    }
}

/// Hyperclick configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HyperclickConfig {
    pub enabled: bool,

    /// Component files tried next to a template, in order
    pub component_files: Vec<String>,
}

impl Default for HyperclickConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            component_files: vec![
                "component.js".to_string(),
                "widget.js".to_string(),
                "index.js".to_string(),
            ],
        }
    }
}

/// Taglib discovery configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaglibConfig {
    /// Taglib file names
    pub file_names: Vec<String>,

    /// Also load taglibs of installed packages
    pub scan_node_modules: bool,

    /// Saving one of these files drops cached taglibs
    pub invalidate_on_save: Vec<String>,
}

impl Default for TaglibConfig {
    fn default() -> Self {
        Self {
            file_names: vec!["marko.json".to_string(), "marko-tag.json".to_string()],
            scan_node_modules: true,
            invalidate_on_save: [
                "marko.json",
                "marko-tag.json",
                "package.json",
                "template.marko",
                "renderer.js",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config directory not found")]
    NoConfigDir,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.tag_matching.enabled);
        assert_eq!(config.tag_matching.highlight_class, "bracket-matcher");
        assert_eq!(config.autocomplete.min_marko_version, 3);
        assert_eq!(config.hyperclick.component_files[0], "component.js");
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: Config = toml::from_str("[tag_matching]\nrename_together = false\n").unwrap();
        assert!(!config.tag_matching.rename_together);
        assert!(config.tag_matching.enabled);
        assert!(config.taglib.scan_node_modules);
    }

    #[test]
    fn test_structural_chars() {
        let config = TagMatchingConfig::default();
        assert!(config.is_structural("div.foo"));
        assert!(config.is_structural(">"));
        assert!(!config.is_structural("divX"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.autocomplete.min_marko_version = 4;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.autocomplete.min_marko_version, 4);
    }
}
