//! Configuration loading with figment.
//!
//! Layers, later ones win:
//!
//! 1. [`CourierConfig::default`]
//! 2. [`ConfigLoader::merge`]
//! 3. `courier.<profile>.<ext>` next to the main file
//! 4. the main file: `courier.<ext>` or `config.<ext>`
//! 5. `COURIER_*` environment variables, `__` between sections
//!
//! `<ext>` is `toml` with `toml-config`, `yaml`/`yml` with `yaml-config`.
//! So `COURIER_TELEGRAM__NOT_REPLY_MESSAGE=true` sets
//! `telegram.not_reply_message`.
//!
//! ```rust,ignore
//! let config = ConfigLoader::new()
//!     .profile("staging")
//!     .file("./config/courier.toml")
//!     .load()?;
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(any(feature = "yaml-config", feature = "toml-config"))]
use figment::providers::Format;
#[cfg(feature = "toml-config")]
use figment::providers::Toml;
#[cfg(feature = "yaml-config")]
use figment::providers::Yaml;
use figment::providers::{Env, Serialized};
use tracing::{debug, info, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::CourierConfig;

const ENV_PREFIX: &str = "COURIER_";
const FILE_STEMS: [&str; 2] = ["courier", "config"];
const EXTENSIONS: &[&str] = &[
    #[cfg(feature = "toml-config")]
    "toml",
    #[cfg(feature = "yaml-config")]
    "yaml",
    #[cfg(feature = "yaml-config")]
    "yml",
];

/// Name of the profile whose file is layered under the main config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile(String);

impl Profile {
    pub fn new(name: &str) -> Self {
        Self(name.trim().to_lowercase())
    }

    /// Reads `COURIER_PROFILE`, falling back to `development`.
    pub fn from_env() -> Self {
        std::env::var("COURIER_PROFILE")
            .map(|name| Self::new(&name))
            .unwrap_or_default()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Profile {
    fn default() -> Self {
        Self("development".into())
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Collects configuration sources and extracts a [`CourierConfig`].
pub struct ConfigLoader {
    merged: Figment,
    profile: Profile,
    search_paths: Vec<PathBuf>,
    config_file: Option<PathBuf>,
    load_env: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            merged: Figment::new(),
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            config_file: None,
            load_env: true,
        }
    }

    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Profile::new(&profile.into());
        self
    }

    /// Adds a directory to look for config files in. Without any, the
    /// current directory and the user config directory are searched.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    pub fn with_current_dir(self) -> Self {
        match std::env::current_dir() {
            Ok(cwd) => self.search_path(cwd),
            Err(_) => self,
        }
    }

    /// Loads exactly this file instead of searching. It must exist.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Layers `config` over the defaults. Files and environment variables
    /// still override it.
    pub fn merge(mut self, config: CourierConfig) -> Self {
        self.merged = self.merged.merge(Serialized::defaults(config));
        self
    }

    pub fn load(self) -> ConfigResult<CourierConfig> {
        let mut figment =
            Figment::from(Serialized::defaults(CourierConfig::default())).merge(self.merged.clone());

        for path in self.config_files()? {
            info!(path = %path.display(), "Loading configuration file");
            figment = merge_file(figment, &path)?;
        }

        if self.load_env {
            figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        }

        let config: CourierConfig = figment.extract()?;
        debug!(
            profile = %self.profile,
            logging_level = %config.logging.level,
            client = %config.telegram.client_name,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// The files to merge, lowest priority first.
    fn config_files(&self) -> ConfigResult<Vec<PathBuf>> {
        if let Some(path) = &self.config_file {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.clone()));
            }
            return Ok(vec![path.clone()]);
        }

        let search_paths = self.resolve_search_paths();
        for dir in &search_paths {
            for stem in FILE_STEMS {
                for ext in EXTENSIONS {
                    let main = dir.join(format!("{stem}.{ext}"));
                    if !main.exists() {
                        continue;
                    }
                    let profiled = dir.join(format!("{stem}.{}.{ext}", self.profile));
                    return Ok(profiled
                        .exists()
                        .then_some(profiled)
                        .into_iter()
                        .chain([main])
                        .collect());
                }
            }
        }

        warn!(searched = ?search_paths, "No configuration file found, using defaults");
        Ok(Vec::new())
    }

    fn resolve_search_paths(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }
        std::env::current_dir()
            .ok()
            .into_iter()
            .chain(dirs::config_dir().map(|dir| dir.join("courier")))
            .collect()
    }
}

/// Merges one file, choosing the provider by extension.
fn merge_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
    match path.extension().and_then(|e| e.to_str()).unwrap_or("") {
        #[cfg(feature = "toml-config")]
        "toml" => Ok(figment.merge(Toml::file(path))),
        #[cfg(feature = "yaml-config")]
        "yaml" | "yml" => Ok(figment.merge(Yaml::file(path))),
        ext => Err(ConfigError::ParseError(format!(
            "unsupported or disabled configuration format: .{ext}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use figment::Jail;

    use super::*;
    use crate::config::schema::{LogLevel, TelegramConfig};

    #[test]
    fn test_default_config() {
        Jail::expect_with(|jail| {
            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .without_env()
                .load()
                .unwrap();

            assert_eq!(config.logging.level.as_str(), "info");
            assert_eq!(config.telegram, TelegramConfig::default());
            Ok(())
        });
    }

    #[test]
    fn test_profile_names_are_normalized() {
        assert_eq!(Profile::new(" Staging ").as_str(), "staging");
        assert_eq!(Profile::default().as_str(), "development");
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_file_env_and_merge_layering() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "courier.toml",
                r#"
                [logging]
                level = "warn"

                [telegram]
                client_name = "support"
                include = ["greeting"]
                "#,
            )?;
            jail.create_file(
                "courier.staging.toml",
                r#"
                [telegram]
                use_hear_manager = false
                "#,
            )?;
            jail.set_env("COURIER_LOGGING__LEVEL", "debug");

            let config = ConfigLoader::new()
                .profile("staging")
                .search_path(jail.directory())
                .merge(CourierConfig {
                    telegram: TelegramConfig {
                        not_reply_message: true,
                        client_name: "merged".into(),
                        ..Default::default()
                    },
                    ..Default::default()
                })
                .load()
                .map_err(|e| e.to_string())?;

            assert_eq!(config.logging.level, LogLevel::Debug);
            assert_eq!(config.telegram.client_name, "support");
            assert_eq!(config.telegram.include, vec!["greeting"]);
            assert!(config.telegram.not_reply_message);
            assert!(!config.telegram.use_hear_manager);
            Ok(())
        });
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = ConfigLoader::new()
            .file("/nonexistent/courier.toml")
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }
}
