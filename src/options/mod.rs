//! Bloom configuration with TOML preset support.
//!
//! [`BloomOptions`] serializes to/from TOML and carries `#[serde(default)]`,
//! so partial files (e.g. only overriding `threshold`) work. Range metadata is
//! exported as JSON Schema for inspector UIs.

mod bloom;

use std::path::Path;

pub use bloom::{BloomOptions, BloomSettings, MAX_THRESHOLD, MIN_THRESHOLD};

use crate::error::BloomError;

impl BloomOptions {
    /// Generate JSON Schema describing the UI-exposed options.
    #[must_use]
    pub fn json_schema() -> schemars::Schema {
        schemars::schema_for!(BloomOptions)
    }

    /// Load options from a TOML file. Missing fields use defaults.
    ///
    /// # Errors
    ///
    /// [`BloomError::Io`] if the file cannot be read,
    /// [`BloomError::SettingsParse`] if it is not valid TOML.
    pub fn load(path: &Path) -> Result<Self, BloomError> {
        let content = std::fs::read_to_string(path).map_err(BloomError::Io)?;
        Self::from_toml(&content)
    }

    /// Parse options from a TOML string. Missing fields use defaults.
    ///
    /// # Errors
    ///
    /// [`BloomError::SettingsParse`] if the string is not valid TOML.
    pub fn from_toml(content: &str) -> Result<Self, BloomError> {
        toml::from_str(content).map_err(|e| BloomError::SettingsParse(e.to_string()))
    }

    /// Save options to a TOML file (pretty-printed).
    ///
    /// # Errors
    ///
    /// [`BloomError::SettingsParse`] on serialization failure,
    /// [`BloomError::Io`] if the file or its parent directory cannot be
    /// written.
    pub fn save(&self, path: &Path) -> Result<(), BloomError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| BloomError::SettingsParse(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(BloomError::Io)?;
        }
        std::fs::write(path, content).map_err(BloomError::Io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_round_trips_through_toml() {
        let opts = BloomOptions::default();
        let toml_str = toml::to_string_pretty(&opts).unwrap();
        let parsed = BloomOptions::from_toml(&toml_str).unwrap();
        assert_eq!(opts, parsed);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let opts = BloomOptions::from_toml("iterations = 6\n").unwrap();
        assert_eq!(opts.iterations, 6);
        assert_eq!(opts.threshold, 1.0);
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = BloomOptions::from_toml("iterations = \"many\"").unwrap_err();
        assert!(matches!(err, BloomError::SettingsParse(_)));
    }

    #[test]
    fn save_then_load_preserves_values() {
        let dir = std::env::temp_dir().join(format!("viso-bloom-options-{}", std::process::id()));
        let path = dir.join("presets").join("glow.toml");
        let opts = BloomOptions {
            iterations: 8,
            threshold: 0.75,
        };
        opts.save(&path).unwrap();
        let loaded = BloomOptions::load(&path).unwrap();
        assert_eq!(opts, loaded);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let path = std::env::temp_dir().join("viso-bloom-does-not-exist.toml");
        assert!(matches!(
            BloomOptions::load(&path),
            Err(BloomError::Io(_))
        ));
    }

    #[test]
    fn schema_exposes_ranges() {
        let schema_value = serde_json::to_value(BloomOptions::json_schema()).unwrap();
        let props = schema_value["properties"].as_object().unwrap();

        let iterations = &props["iterations"];
        assert_eq!(iterations["minimum"], 1);
        assert_eq!(iterations["maximum"], 16);

        let threshold = &props["threshold"];
        assert_eq!(threshold["minimum"], 0.0);
        assert_eq!(threshold["maximum"], 10.0);
        assert_eq!(threshold["title"], "Threshold");
    }
}
