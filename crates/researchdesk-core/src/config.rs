use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;

use crate::ResearchDeskError;
use crate::session::{ResearchDepth, SessionConfig};

const DEFAULT_CONFIG_PATH: &str = "researchdesk.toml";
const CONFIG_PATH_ENV: &str = "RESEARCHDESK_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub pipeline: PipelineConfig,
    pub history: HistoryConfig,
    pub export: ExportConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Session flags used when the caller supplies none.
    pub fn session_defaults(&self) -> SessionConfig {
        SessionConfig {
            enable_hypothesis: self.pipeline.enable_hypothesis,
            enable_multi_agent: self.pipeline.enable_multi_agent,
            depth: self.pipeline.depth,
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a provided path or discoverable defaults.
    ///
    /// Resolution order:
    /// 1. Explicit `path` argument.
    /// 2. `RESEARCHDESK_CONFIG` environment variable.
    /// 3. `researchdesk.toml` in the current working directory.
    pub fn load(path: Option<PathBuf>) -> Result<Config, ResearchDeskError> {
        let candidate = resolve_path(path);
        Self::load_from(&candidate)
    }

    /// Like [`ConfigLoader::load`], but a missing file yields the defaults.
    pub fn load_or_default(path: Option<PathBuf>) -> Result<Config, ResearchDeskError> {
        let candidate = resolve_path(path);
        if !candidate.exists() {
            tracing::debug!(path = %candidate.display(), "no config file found; using defaults");
            return Ok(Config::default());
        }
        Self::load_from(&candidate)
    }

    pub fn parse(raw: &str) -> Result<Config, ResearchDeskError> {
        let config: Config = toml::from_str(raw)
            .map_err(|err| ResearchDeskError::InvalidConfiguration(err.to_string()))?;
        Self::validate(&config)?;
        Ok(config)
    }

    fn load_from(path: &Path) -> Result<Config, ResearchDeskError> {
        let raw = fs::read_to_string(path)
            .map_err(|err| ResearchDeskError::config_io(path.to_path_buf(), err))?;
        Self::parse(&raw)
    }

    fn validate(config: &Config) -> Result<(), ResearchDeskError> {
        if config.pipeline.stage_interval_ms == 0 {
            return Err(ResearchDeskError::InvalidConfiguration(
                "pipeline.stage_interval_ms must be greater than zero".into(),
            ));
        }
        if config.history.recent_window == 0 {
            return Err(ResearchDeskError::InvalidConfiguration(
                "history.recent_window must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

fn resolve_path(path: Option<PathBuf>) -> PathBuf {
    if let Some(path) = path {
        return path;
    }

    if let Ok(from_env) = env::var(CONFIG_PATH_ENV) {
        if !from_env.trim().is_empty() {
            return PathBuf::from(from_env);
        }
    }

    Path::new(DEFAULT_CONFIG_PATH).to_path_buf()
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Interval between synthetic progress stages.
    pub stage_interval_ms: u64,
    pub depth: ResearchDepth,
    pub enable_hypothesis: bool,
    pub enable_multi_agent: bool,
}

impl PipelineConfig {
    pub fn stage_interval(&self) -> Duration {
        Duration::from_millis(self.stage_interval_ms)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let session = SessionConfig::default();
        Self {
            stage_interval_ms: 1_500,
            depth: session.depth,
            enable_hypothesis: session.enable_hypothesis,
            enable_multi_agent: session.enable_multi_agent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Number of records shown by history listings.
    pub recent_window: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { recent_window: 5 }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub output_dir: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("exports"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config = ConfigLoader::parse("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.pipeline.stage_interval(), Duration::from_millis(1_500));
        assert_eq!(config.history.recent_window, 5);
        assert_eq!(config.session_defaults(), SessionConfig::default());
    }

    #[test]
    fn sections_override_defaults() {
        let config = ConfigLoader::parse(
            r#"
            [pipeline]
            stage_interval_ms = 250
            depth = "comprehensive"
            enable_hypothesis = false

            [history]
            recent_window = 10

            [export]
            output_dir = "reports"

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(config.pipeline.stage_interval_ms, 250);
        assert_eq!(config.pipeline.depth, ResearchDepth::Comprehensive);
        assert!(!config.session_defaults().enable_hypothesis);
        assert!(config.session_defaults().enable_multi_agent);
        assert_eq!(config.history.recent_window, 10);
        assert_eq!(config.export.output_dir, PathBuf::from("reports"));
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn zero_interval_is_rejected() {
        let err = ConfigLoader::parse("[pipeline]\nstage_interval_ms = 0\n").unwrap_err();
        assert!(matches!(err, ResearchDeskError::InvalidConfiguration(_)));

        let err = ConfigLoader::parse("[history]\nrecent_window = 0\n").unwrap_err();
        assert!(err.to_string().contains("recent_window"));
    }

    #[test]
    fn malformed_toml_is_a_configuration_error() {
        let err = ConfigLoader::parse("[pipeline\n").unwrap_err();
        assert!(matches!(err, ResearchDeskError::InvalidConfiguration(_)));
    }

    #[test]
    fn explicit_path_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[logging]\nlevel = \"warn\"\n").unwrap();

        let config = ConfigLoader::load(Some(path)).unwrap();
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn missing_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");

        let err = ConfigLoader::load(Some(path.clone())).unwrap_err();
        assert!(matches!(err, ResearchDeskError::ConfigIo { .. }));
        assert_eq!(ConfigLoader::load_or_default(Some(path)).unwrap(), Config::default());
    }
}
