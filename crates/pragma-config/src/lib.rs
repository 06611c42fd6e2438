//! Settings for Pragma providers
//!
//! Settings are plain YAML. Every field has a default, so an empty file (or
//! no file at all) yields a working configuration.
//!
//! ```yaml
//! state_dir: .pragma
//! log_filter: info,pragma_gcp=debug
//! poll:
//!   interval_secs: 5
//!   max_attempts: 60
//! polling:
//!   gcp/gke:
//!     interval_secs: 30
//!     max_attempts: 40
//! ```

pub mod error;

pub use error::*;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable pointing directly at a settings file
pub const CONFIG_PATH_ENV: &str = "PRAGMA_CONFIG_PATH";

const APP_DIR: &str = "pragma";
const PROJECT_DIR: &str = ".pragma";
const CANDIDATES: [&str; 4] = [
    "pragma.local.yaml",
    ".pragma.local.yaml",
    "pragma.yaml",
    ".pragma.yaml",
];

/// Interval and attempt budget for one convergence wait
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollSettings {
    pub interval_secs: u64,
    pub max_attempts: u32,
}

impl PollSettings {
    pub const fn new(interval_secs: u64, max_attempts: u32) -> Self {
        Self {
            interval_secs,
            max_attempts,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Worst-case time spent sleeping before a wait gives up
    pub fn budget(&self) -> Duration {
        self.interval() * self.max_attempts.saturating_sub(1)
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self::new(5, 60)
    }
}

/// Top-level settings file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Directory holding `state.json`
    pub state_dir: PathBuf,

    /// `tracing_subscriber::EnvFilter` directive used when `RUST_LOG` is unset
    pub log_filter: String,

    /// Emit logs as JSON lines
    pub log_json: bool,

    /// Fallback poll budget
    pub poll: PollSettings,

    /// Per-resource overrides keyed by `provider/resource`, e.g. `gcp/gke`
    pub polling: BTreeMap<String, PollSettings>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from(PROJECT_DIR),
            log_filter: "info".to_string(),
            log_json: false,
            poll: PollSettings::default(),
            polling: BTreeMap::new(),
        }
    }
}

impl Settings {
    /// Discover and load the settings file, falling back to defaults when none exists.
    pub fn load() -> Result<Self> {
        match find_settings_file() {
            Ok(path) => Self::from_path(&path),
            Err(ConfigError::SettingsFileNotFound) => {
                tracing::debug!("No settings file found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings = Self::parse(&content, &path.display().to_string())?;
        tracing::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        Self::parse(content, "<inline>")
    }

    fn parse(content: &str, origin: &str) -> Result<Self> {
        // serde_yaml rejects an empty document for a struct
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let settings: Settings = serde_yaml::from_str(content).map_err(|source| ConfigError::Yaml {
            path: origin.to_string(),
            source,
        })?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        let all = std::iter::once(("poll", &self.poll))
            .chain(self.polling.iter().map(|(k, v)| (k.as_str(), v)));
        for (key, poll) in all {
            if poll.max_attempts == 0 {
                return Err(ConfigError::InvalidPoll {
                    key: key.to_string(),
                    reason: "max_attempts must be at least 1".to_string(),
                });
            }
        }
        for key in self.polling.keys() {
            if key.split('/').count() != 2 {
                return Err(ConfigError::InvalidPoll {
                    key: key.clone(),
                    reason: "expected a `provider/resource` key".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Poll override configured for `provider/resource`, if any
    pub fn poll_override(&self, provider: &str, resource: &str) -> Option<PollSettings> {
        self.polling.get(&format!("{provider}/{resource}")).copied()
    }

    /// Poll settings for `provider/resource`, falling back to `poll`
    pub fn poll_for(&self, provider: &str, resource: &str) -> PollSettings {
        self.poll_override(provider, resource).unwrap_or(self.poll)
    }
}

/// Pragma's per-user config directory, created on first use
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join(APP_DIR);

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

/// Locate the settings file.
///
/// Search order:
/// 1. `PRAGMA_CONFIG_PATH`
/// 2. current directory: pragma.local.yaml, .pragma.local.yaml, pragma.yaml, .pragma.yaml
/// 3. the same names inside `./.pragma/`
/// 4. `~/.config/pragma/pragma.yaml`
pub fn find_settings_file() -> Result<PathBuf> {
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
        tracing::warn!(
            "{} points at {}, which does not exist",
            CONFIG_PATH_ENV,
            path.display()
        );
    }

    let current_dir = std::env::current_dir()?;

    for filename in &CANDIDATES {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(path);
        }
    }

    let project_dir = current_dir.join(PROJECT_DIR);
    if project_dir.is_dir() {
        for filename in &CANDIDATES {
            let path = project_dir.join(filename);
            if path.exists() {
                return Ok(path);
            }
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global = config_dir.join(APP_DIR).join("pragma.yaml");
        if global.exists() {
            return Ok(global);
        }
    }

    Err(ConfigError::SettingsFileNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.state_dir, PathBuf::from(".pragma"));
        assert_eq!(settings.poll, PollSettings::new(5, 60));
        assert!(settings.polling.is_empty());
    }

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(Settings::from_yaml("").unwrap(), Settings::default());
        assert_eq!(Settings::from_yaml("  \n").unwrap(), Settings::default());
    }

    #[test]
    fn test_partial_document_keeps_defaults() {
        let settings = Settings::from_yaml("log_filter: debug\n").unwrap();
        assert_eq!(settings.log_filter, "debug");
        assert_eq!(settings.poll, PollSettings::default());
    }

    #[test]
    fn test_poll_override_lookup() {
        let yaml = r#"
poll:
  interval_secs: 2
  max_attempts: 10
polling:
  gcp/gke:
    interval_secs: 30
    max_attempts: 40
"#;
        let settings = Settings::from_yaml(yaml).unwrap();
        assert_eq!(settings.poll_for("gcp", "gke"), PollSettings::new(30, 40));
        assert_eq!(
            settings.poll_for("kubernetes", "deployment"),
            PollSettings::new(2, 10)
        );
        assert!(settings.poll_override("kubernetes", "deployment").is_none());
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let yaml = "poll:\n  interval_secs: 1\n  max_attempts: 0\n";
        let err = Settings::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPoll { .. }));
    }

    #[test]
    fn test_bad_override_key_rejected() {
        let yaml = "polling:\n  gke:\n    interval_secs: 1\n    max_attempts: 3\n";
        let err = Settings::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("provider/resource"));
    }

    #[test]
    fn test_poll_budget() {
        let poll = PollSettings::new(30, 40);
        assert_eq!(poll.budget(), Duration::from_secs(30 * 39));
    }

    #[test]
    fn test_get_config_dir() {
        let config_dir = get_config_dir().unwrap();
        assert!(config_dir.ends_with("pragma"));
        assert!(config_dir.exists());
    }

    #[test]
    #[serial]
    fn test_find_settings_file_in_current_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        fs::write(temp_dir.path().join("pragma.yaml"), "log_filter: warn\n").unwrap();
        std::env::set_current_dir(&temp_dir).unwrap();

        let found = temp_env::with_var_unset(CONFIG_PATH_ENV, find_settings_file);

        std::env::set_current_dir(original_dir).unwrap();
        assert!(found.unwrap().ends_with("pragma.yaml"));
    }

    #[test]
    #[serial]
    fn test_find_settings_file_local_priority() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        fs::write(temp_dir.path().join("pragma.yaml"), "").unwrap();
        fs::write(temp_dir.path().join("pragma.local.yaml"), "").unwrap();
        std::env::set_current_dir(&temp_dir).unwrap();

        let found = temp_env::with_var_unset(CONFIG_PATH_ENV, find_settings_file);

        std::env::set_current_dir(original_dir).unwrap();
        assert!(found.unwrap().ends_with("pragma.local.yaml"));
    }

    #[test]
    #[serial]
    fn test_find_settings_file_in_project_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        let project_dir = temp_dir.path().join(".pragma");
        fs::create_dir(&project_dir).unwrap();
        fs::write(project_dir.join("pragma.yaml"), "").unwrap();
        std::env::set_current_dir(&temp_dir).unwrap();

        let found = temp_env::with_var_unset(CONFIG_PATH_ENV, find_settings_file);

        std::env::set_current_dir(original_dir).unwrap();
        let found = found.unwrap();
        assert!(found.ends_with(".pragma/pragma.yaml"));
    }

    #[test]
    #[serial]
    fn test_env_var_takes_priority() {
        let temp_dir = tempfile::tempdir().unwrap();
        let explicit = temp_dir.path().join("custom.yaml");
        fs::write(&explicit, "log_json: true\n").unwrap();

        let settings = temp_env::with_var(CONFIG_PATH_ENV, Some(&explicit), Settings::load).unwrap();
        assert!(settings.log_json);
    }

    #[test]
    #[serial]
    fn test_invalid_yaml_names_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("pragma.yaml");
        fs::write(&path, "poll: [1, 2").unwrap();

        let err = Settings::from_path(&path).unwrap_err();
        assert!(err.to_string().contains("pragma.yaml"));
    }
}
