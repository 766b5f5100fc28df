//! Configuration file management for cram.
//!
//! Provides a TOML-based config file at `~/.config/cram/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use cram_core::generator::GeminiClient;
use cram_core::plan::{DEFAULT_MODELS, PlanGenerator};
use cram_db::config::DbConfig;

/// Default address for `cram serve`.
pub const DEFAULT_BIND: &str = "127.0.0.1";
/// Default port for `cram serve`.
pub const DEFAULT_PORT: u16 = 8501;

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub database: DatabaseSection,
    #[serde(default)]
    pub generator: GeneratorSection,
    #[serde(default)]
    pub server: ServerSection,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    pub url: String,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            url: DbConfig::DEFAULT_URL.to_string(),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct GeneratorSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Ordered fallback chain of model identifiers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub models: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt_timeout_secs: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub bind: String,
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the cram config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/cram` or `~/.config/cram`,
/// including on macOS.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("cram");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("cram")
}

/// Return the path to the cram config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. `Ok(None)` when there is no file; a file
/// that exists but does not parse is an error.
pub fn load_config() -> Result<Option<ConfigFile>> {
    let path = config_path();
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file at {}", path.display()))?;
    Ok(Some(config))
}

/// Serialize and write the config file, creating parent dirs as needed.
/// Sets file permissions to 0600 on Unix since it may hold an API key.
pub fn save_config(config: &ConfigFile) -> Result<()> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

/// Read a non-empty environment variable.
fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Split a comma-separated model list, dropping blanks.
pub fn parse_model_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .collect()
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Generation settings after resolution.
#[derive(Clone)]
pub struct GeneratorSettings {
    pub api_key: Option<String>,
    pub endpoint: String,
    pub models: Vec<String>,
    pub attempt_timeout: Option<Duration>,
}

impl std::fmt::Debug for GeneratorSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratorSettings")
            .field("api_key", &self.api_key.as_ref().map(|_| "<set>"))
            .field("endpoint", &self.endpoint)
            .field("models", &self.models)
            .field("attempt_timeout", &self.attempt_timeout)
            .finish()
    }
}

impl GeneratorSettings {
    /// The API key, or an error explaining where to put one.
    pub fn require_api_key(&self) -> Result<&str> {
        match self.api_key.as_deref() {
            Some(key) => Ok(key),
            None => bail!(
                "generation API key not found; set CRAM_API_KEY (or GEMINI_API_KEY) \
                 or add `api_key` under [generator] in {}",
                config_path().display()
            ),
        }
    }

    /// Build a plan generator backed by the Gemini REST API.
    pub fn build_generator(&self) -> Result<PlanGenerator> {
        let client = GeminiClient::with_endpoint(self.require_api_key()?, &self.endpoint);
        let mut generator = PlanGenerator::new(Arc::new(client), self.models.clone());
        if let Some(limit) = self.attempt_timeout {
            generator = generator.with_attempt_timeout(limit);
        }
        Ok(generator)
    }
}

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct CramConfig {
    pub db_config: DbConfig,
    pub generator: GeneratorSettings,
    pub server: ServerSection,
}

impl CramConfig {
    /// Resolve configuration using the chain: CLI flag > env var > config file > default.
    ///
    /// - DB URL: `cli_db_url` > `CRAM_DATABASE_URL` > `[database] url` > `DbConfig::DEFAULT_URL`
    /// - API key: `CRAM_API_KEY` > `GEMINI_API_KEY` > `[generator] api_key` > none
    /// - Models: `CRAM_MODELS` > `[generator] models` > `DEFAULT_MODELS`
    pub fn resolve(cli_db_url: Option<&str>) -> Result<Self> {
        let file = load_config()?.unwrap_or_default();

        let db_url = if let Some(url) = cli_db_url {
            url.to_string()
        } else if let Some(url) = env_var("CRAM_DATABASE_URL") {
            url
        } else {
            file.database.url
        };
        let db_config = DbConfig::new(db_url);

        let section = file.generator;
        let api_key = env_var("CRAM_API_KEY")
            .or_else(|| env_var("GEMINI_API_KEY"))
            .or(section.api_key);

        let models = match env_var("CRAM_MODELS").map(|raw| parse_model_list(&raw)) {
            Some(list) if !list.is_empty() => list,
            _ => match section.models {
                Some(list) if !list.is_empty() => list,
                _ => DEFAULT_MODELS.iter().map(|m| m.to_string()).collect(),
            },
        };

        let generator = GeneratorSettings {
            api_key,
            endpoint: section
                .endpoint
                .unwrap_or_else(|| GeminiClient::DEFAULT_ENDPOINT.to_string()),
            models,
            attempt_timeout: section
                .attempt_timeout_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
        };

        Ok(Self {
            db_config,
            generator,
            server: file.server,
        })
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const VARS: &[&str] = &[
        "XDG_CONFIG_HOME",
        "CRAM_DATABASE_URL",
        "CRAM_API_KEY",
        "GEMINI_API_KEY",
        "CRAM_MODELS",
    ];

    /// Holds the env lock, points XDG_CONFIG_HOME at a temp dir, clears the
    /// cram variables, and restores everything on drop.
    struct IsolatedEnv {
        saved: Vec<(&'static str, Option<String>)>,
        dir: tempfile::TempDir,
        _lock: std::sync::MutexGuard<'static, ()>,
    }

    impl IsolatedEnv {
        fn new() -> Self {
            let lock = crate::test_util::lock_env();
            let saved = VARS.iter().map(|v| (*v, std::env::var(v).ok())).collect();
            let dir = tempfile::TempDir::new().unwrap();
            for var in VARS {
                unsafe { std::env::remove_var(var) };
            }
            unsafe { std::env::set_var("XDG_CONFIG_HOME", dir.path()) };
            Self {
                saved,
                dir,
                _lock: lock,
            }
        }

        fn set(&self, var: &str, value: &str) {
            unsafe { std::env::set_var(var, value) };
        }

        fn write_config(&self, contents: &str) {
            let dir = self.dir.path().join("cram");
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(dir.join("config.toml"), contents).unwrap();
        }
    }

    impl Drop for IsolatedEnv {
        fn drop(&mut self) {
            for (var, value) in &self.saved {
                match value {
                    Some(v) => unsafe { std::env::set_var(var, v) },
                    None => unsafe { std::env::remove_var(var) },
                }
            }
        }
    }

    #[test]
    fn defaults_when_nothing_is_configured() {
        let _env = IsolatedEnv::new();

        let config = CramConfig::resolve(None).unwrap();
        assert_eq!(config.db_config.database_url, DbConfig::DEFAULT_URL);
        assert_eq!(config.generator.api_key, None);
        assert_eq!(config.generator.models, DEFAULT_MODELS);
        assert_eq!(config.generator.endpoint, GeminiClient::DEFAULT_ENDPOINT);
        assert_eq!(config.generator.attempt_timeout, None);
        assert_eq!(config.server.bind, DEFAULT_BIND);
        assert_eq!(config.server.port, DEFAULT_PORT);
    }

    #[test]
    fn cli_flag_overrides_env_and_file() {
        let env = IsolatedEnv::new();
        env.write_config("[database]\nurl = \"sqlite:///file.db\"\n");
        env.set("CRAM_DATABASE_URL", "sqlite:///env.db");

        let config = CramConfig::resolve(Some("sqlite:///cli.db")).unwrap();
        assert_eq!(config.db_config.database_url, "sqlite:///cli.db");
    }

    #[test]
    fn env_var_overrides_config_file() {
        let env = IsolatedEnv::new();
        env.write_config("[database]\nurl = \"sqlite:///file.db\"\n");
        env.set("CRAM_DATABASE_URL", "sqlite:///env.db");

        let config = CramConfig::resolve(None).unwrap();
        assert_eq!(config.db_config.database_url, "sqlite:///env.db");
    }

    #[test]
    fn config_file_sections_are_read() {
        let env = IsolatedEnv::new();
        env.write_config(
            r#"
[database]
url = "sqlite:///file.db"

[generator]
api_key = "file-key"
endpoint = "http://localhost:9999/v1beta"
models = ["primary", "backup"]
attempt_timeout_secs = 30

[server]
bind = "0.0.0.0"
port = 9000
"#,
        );

        let config = CramConfig::resolve(None).unwrap();
        assert_eq!(config.db_config.database_url, "sqlite:///file.db");
        assert_eq!(config.generator.api_key.as_deref(), Some("file-key"));
        assert_eq!(config.generator.endpoint, "http://localhost:9999/v1beta");
        assert_eq!(config.generator.models, vec!["primary", "backup"]);
        assert_eq!(
            config.generator.attempt_timeout,
            Some(Duration::from_secs(30))
        );
        assert_eq!(config.server.bind, "0.0.0.0");
        assert_eq!(config.server.port, 9000);
    }

    #[test]
    fn api_key_prefers_cram_var_then_gemini_var() {
        let env = IsolatedEnv::new();
        env.write_config("[generator]\napi_key = \"file-key\"\n");

        env.set("GEMINI_API_KEY", "gemini-key");
        let config = CramConfig::resolve(None).unwrap();
        assert_eq!(config.generator.api_key.as_deref(), Some("gemini-key"));

        env.set("CRAM_API_KEY", "cram-key");
        let config = CramConfig::resolve(None).unwrap();
        assert_eq!(config.generator.api_key.as_deref(), Some("cram-key"));
    }

    #[test]
    fn models_env_var_is_comma_separated() {
        let env = IsolatedEnv::new();
        env.write_config("[generator]\nmodels = [\"from-file\"]\n");
        env.set("CRAM_MODELS", " a , ,b ");

        let config = CramConfig::resolve(None).unwrap();
        assert_eq!(config.generator.models, vec!["a", "b"]);
    }

    #[test]
    fn empty_model_list_in_file_falls_back_to_defaults() {
        let env = IsolatedEnv::new();
        env.write_config("[generator]\nmodels = []\n");

        let config = CramConfig::resolve(None).unwrap();
        assert_eq!(config.generator.models, DEFAULT_MODELS);
    }

    #[test]
    fn partial_sections_keep_defaults_for_missing_keys() {
        let env = IsolatedEnv::new();
        env.write_config("[database]\n\n[server]\nport = 9000\n");

        let config = CramConfig::resolve(None).unwrap();
        assert_eq!(config.db_config.database_url, DbConfig::DEFAULT_URL);
        assert_eq!(config.server.bind, DEFAULT_BIND);
        assert_eq!(config.server.port, 9000);
    }

    #[test]
    fn malformed_config_file_is_an_error() {
        let env = IsolatedEnv::new();
        env.write_config("[database\nurl = ");

        let err = CramConfig::resolve(None).unwrap_err();
        assert!(
            format!("{err:#}").contains("failed to parse config file"),
            "unexpected error: {err:#}"
        );
    }

    #[test]
    fn missing_api_key_is_reported_when_required() {
        let _env = IsolatedEnv::new();

        let config = CramConfig::resolve(None).unwrap();
        let err = config.generator.build_generator().unwrap_err();
        assert!(
            err.to_string().contains("API key not found"),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn generator_uses_resolved_chain() {
        let env = IsolatedEnv::new();
        env.set("CRAM_API_KEY", "k");
        env.set("CRAM_MODELS", "one,two");

        let config = CramConfig::resolve(None).unwrap();
        let generator = config.generator.build_generator().unwrap();
        assert_eq!(generator.models(), ["one", "two"]);
    }

    #[test]
    fn debug_output_hides_api_key() {
        let env = IsolatedEnv::new();
        env.set("CRAM_API_KEY", "super-secret");

        let config = CramConfig::resolve(None).unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("super-secret"), "leaked: {rendered}");
    }

    #[cfg(unix)]
    #[test]
    fn save_config_round_trips_with_owner_only_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let _env = IsolatedEnv::new();
        let original = ConfigFile {
            database: DatabaseSection {
                url: "sqlite:///saved.db".to_string(),
            },
            generator: GeneratorSection {
                api_key: Some("saved-key".to_string()),
                ..GeneratorSection::default()
            },
            server: ServerSection::default(),
        };

        save_config(&original).unwrap();

        let meta = std::fs::metadata(config_path()).unwrap();
        assert_eq!(meta.permissions().mode() & 0o777, 0o600);

        let loaded = load_config().unwrap().expect("config file should exist");
        assert_eq!(loaded.database.url, "sqlite:///saved.db");
        assert_eq!(loaded.generator.api_key.as_deref(), Some("saved-key"));
        assert_eq!(loaded.server.port, DEFAULT_PORT);
    }

    #[test]
    fn config_path_ends_with_expected_filename() {
        let path = config_path();
        assert!(
            path.ends_with("cram/config.toml"),
            "unexpected config path: {}",
            path.display()
        );
    }
}
