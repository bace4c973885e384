use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized},
};
use resume_llm::{AdapterConfig, DEFAULT_BASE_URL, normalize_base_url};
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};

pub const SETTINGS_DIRECTORY_NAME: &str = "resume-assistant";
pub const SETTINGS_FILE_NAME: &str = "settings.json";
/// Prefix of environment variables that override file settings.
pub const ENV_PREFIX: &str = "RESUME_ASSISTANT_";
/// Variable honored for compatibility with the web frontend's deployment config.
pub const LEGACY_API_URL_ENV: &str = "NEXT_PUBLIC_API_URL";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssistantSettings {
    #[serde(default = "default_api_url")]
    pub api_url: String,
}

impl Default for AssistantSettings {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
        }
    }
}

impl AssistantSettings {
    /// Builds the adapter configuration for these settings.
    pub fn adapter_config(&self) -> AdapterConfig {
        AdapterConfig::new(&self.api_url)
    }

    /// Returns the settings with the URL normalized.
    pub fn normalized(mut self) -> Self {
        self.api_url = normalize_base_url(&self.api_url);
        self
    }
}

pub struct SettingsStore {
    settings: Arc<ArcSwap<AssistantSettings>>,
    config_path: PathBuf,
}

impl SettingsStore {
    /// Returns the per-user settings directory.
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|path| path.join(SETTINGS_DIRECTORY_NAME))
            .unwrap_or_else(|| PathBuf::from(".resume-assistant"))
    }

    /// Returns the default settings file path.
    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join(SETTINGS_FILE_NAME)
    }

    /// Loads settings from `config_path` and the environment.
    pub fn new(config_path: PathBuf) -> Self {
        let settings = Self::load_from_disk(&config_path);
        Self {
            settings: Arc::new(ArcSwap::from_pointee(settings)),
            config_path,
        }
    }

    /// Loads settings from the default path.
    pub fn load() -> Self {
        Self::new(Self::default_config_path())
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Returns the current settings snapshot.
    pub fn settings(&self) -> Arc<AssistantSettings> {
        self.settings.load_full()
    }

    /// Persists the normalized settings, then makes them current.
    pub fn update(&self, settings: AssistantSettings) -> Result<(), SettingsError> {
        let normalized_settings = settings.normalized();
        self.persist(&normalized_settings)?;
        self.settings.store(Arc::new(normalized_settings));
        Ok(())
    }

    /// Layers defaults, the settings file and environment overrides, lowest first.
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(AssistantSettings::default()))
            .merge(Json::file(path))
            .merge(
                Env::raw()
                    .only(&[LEGACY_API_URL_ENV])
                    .map(|_| "api_url".into()),
            )
            .merge(Env::prefixed(ENV_PREFIX).only(&["api_url"]))
    }

    fn load_from_disk(path: &Path) -> AssistantSettings {
        if !path.exists() {
            tracing::info!("settings file not found at {:?}, using defaults", path);
        }

        match Self::figment(path).extract::<AssistantSettings>() {
            Ok(settings) => settings.normalized(),
            Err(error) => {
                tracing::warn!(
                    "failed to parse settings from {:?}: {}. using defaults",
                    path,
                    error
                );
                AssistantSettings::default()
            }
        }
    }

    fn persist(&self, settings: &AssistantSettings) -> Result<(), SettingsError> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent).context(CreateDirSnafu {
                stage: "create-settings-directory",
                path: parent.to_path_buf(),
            })?;
        }

        let content = serde_json::to_string_pretty(settings).context(SerializeConfigSnafu {
            stage: "serialize-settings-json",
        })?;

        let temp_path = self.config_path.with_extension("json.tmp");
        std::fs::write(&temp_path, content).context(WriteFileSnafu {
            stage: "write-temporary-settings-file",
            path: temp_path.clone(),
        })?;

        std::fs::rename(&temp_path, &self.config_path).context(RenameTempFileSnafu {
            stage: "rename-temporary-settings-file",
            from: temp_path,
            to: self.config_path.clone(),
        })?;

        tracing::info!("saved settings to {:?}", self.config_path);
        Ok(())
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SettingsError {
    #[snafu(display("failed to create settings directory at {path:?} on `{stage}`: {source}"))]
    CreateDir {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("failed to serialize settings on `{stage}`: {source}"))]
    SerializeConfig {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("failed to write settings file at {path:?} on `{stage}`: {source}"))]
    WriteFile {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display(
        "failed to replace settings file from {from:?} to {to:?} on `{stage}`: {source}"
    ))]
    RenameTempFile {
        stage: &'static str,
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
}

fn default_api_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

#[cfg(test)]
mod tests {
    use figment::Jail;

    use super::*;

    const API_URL_ENV: &str = "RESUME_ASSISTANT_API_URL";

    #[test]
    fn missing_file_yields_defaults() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            let store = SettingsStore::new(jail.directory().join(SETTINGS_FILE_NAME));

            assert_eq!(store.settings().api_url, DEFAULT_BASE_URL);
            Ok(())
        });
    }

    #[test]
    fn file_value_is_normalized() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file(
                SETTINGS_FILE_NAME,
                r#"{ "api_url": "https://backend.run.app/" }"#,
            )?;

            let store = SettingsStore::new(jail.directory().join(SETTINGS_FILE_NAME));
            assert_eq!(store.settings().api_url, "https://backend.run.app");
            assert_eq!(
                store.settings().adapter_config().chat_url(),
                "https://backend.run.app/api/chat"
            );
            Ok(())
        });
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file(SETTINGS_FILE_NAME, "{ not json")?;

            let store = SettingsStore::new(jail.directory().join(SETTINGS_FILE_NAME));
            assert_eq!(*store.settings(), AssistantSettings::default());
            Ok(())
        });
    }

    #[test]
    fn environment_overrides_file_in_order() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file(SETTINGS_FILE_NAME, r#"{ "api_url": "http://file:1/" }"#)?;
            let path = jail.directory().join(SETTINGS_FILE_NAME);
            assert_eq!(
                SettingsStore::new(path.clone()).settings().api_url,
                "http://file:1"
            );

            jail.set_env(LEGACY_API_URL_ENV, "http://legacy:2/");
            assert_eq!(
                SettingsStore::new(path.clone()).settings().api_url,
                "http://legacy:2"
            );

            jail.set_env(API_URL_ENV, "http://prefixed:3");
            assert_eq!(
                SettingsStore::new(path).settings().api_url,
                "http://prefixed:3"
            );
            Ok(())
        });
    }

    #[test]
    fn empty_legacy_variable_falls_back_to_default() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.set_env(LEGACY_API_URL_ENV, "");

            let store = SettingsStore::new(jail.directory().join(SETTINGS_FILE_NAME));
            assert_eq!(store.settings().api_url, DEFAULT_BASE_URL);
            Ok(())
        });
    }

    #[test]
    fn update_persists_and_reloads() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            let path = jail.directory().join("nested").join(SETTINGS_FILE_NAME);
            let store = SettingsStore::new(path.clone());

            store
                .update(AssistantSettings {
                    api_url: "  http://127.0.0.1:9000/ ".to_string(),
                })
                .unwrap();

            assert_eq!(store.settings().api_url, "http://127.0.0.1:9000");
            assert!(!path.with_extension("json.tmp").exists());

            let reloaded = SettingsStore::new(path);
            assert_eq!(reloaded.settings().api_url, "http://127.0.0.1:9000");
            Ok(())
        });
    }
}
