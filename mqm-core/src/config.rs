use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;
use anyhow::anyhow;
use anyhow::bail;
use config::Config as ConfigLoader;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::format::SpanMode;

/// Embedded template used to bootstrap the on-disk configuration when the
/// tool runs for the first time.
pub const DEFAULT_CONFIG_TEMPLATE: &str = include_str!("../../demos/config.toml");

/// Container returned after loading configuration data and resolving runtime
/// paths.
#[derive(Debug, Clone)]
pub struct ConfigBundle {
    pub config: AppConfig,
    pub paths: AppPaths,
}

/// Resolve and load the configuration for the provided application name. If
/// no config file exists yet, a default file is created from
/// [`DEFAULT_CONFIG_TEMPLATE`].
pub fn load_or_initialize_config(app_name: impl AsRef<str>) -> Result<ConfigBundle> {
    let app_name = app_name.as_ref();
    let mut paths = AppPaths::discover(app_name)?;
    paths.ensure_config_dir()?;

    if !paths.config_file.exists() {
        fs::write(&paths.config_file, DEFAULT_CONFIG_TEMPLATE).with_context(|| {
            format!(
                "failed to write default config to {}",
                paths.config_file.display()
            )
        })?;
    }

    let env_prefix = app_name
        .chars()
        .map(|ch| if ch == '-' { '_' } else { ch })
        .collect::<String>()
        .to_ascii_uppercase();

    let builder = ConfigLoader::builder()
        .add_source(File::from(paths.config_file.clone()))
        .add_source(
            Environment::with_prefix(&env_prefix)
                .separator("__")
                .try_parsing(true),
        );

    let config: AppConfig = builder
        .build()
        .with_context(|| {
            format!(
                "failed to parse configuration at {}",
                paths.config_file.display()
            )
        })?
        .try_deserialize()
        .context("failed to deserialize configuration into AppConfig")?;

    paths = paths.apply_storage_overrides(&config.storage)?;
    paths.ensure_runtime_dirs()?;

    Ok(ConfigBundle { config, paths })
}

/// Persistent runtime paths derived from XDG environment variables or
/// sensible fallbacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub app_name: String,
    pub config_dir: PathBuf,
    pub config_file: PathBuf,
    pub data_dir: PathBuf,
    pub state_dir: PathBuf,
}

impl AppPaths {
    pub fn discover(app_name: impl Into<String>) -> Result<Self> {
        let app_name = app_name.into();
        let home = home_dir().context("unable to determine home directory for XDG resolution")?;

        let config_base = xdg_dir("XDG_CONFIG_HOME", &home, ".config");
        let data_base = xdg_dir("XDG_DATA_HOME", &home, ".local/share");
        let state_base = xdg_dir("XDG_STATE_HOME", &home, ".local/state");

        let config_dir = config_base.join(&app_name);
        let data_dir = data_base.join(&app_name);
        let state_dir = state_base.join(&app_name);
        let config_file = config_dir.join("config.toml");

        Ok(Self {
            app_name,
            config_dir,
            config_file,
            data_dir,
            state_dir,
        })
    }

    pub fn ensure_config_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.config_dir).with_context(|| {
            format!(
                "failed to create config directory {}",
                self.config_dir.display()
            )
        })
    }

    pub fn ensure_runtime_dirs(&self) -> Result<()> {
        for dir in [&self.data_dir, &self.state_dir] {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create runtime directory {}", dir.display()))?;
        }
        Ok(())
    }

    pub fn apply_storage_overrides(&self, storage: &StorageSettings) -> Result<Self> {
        let mut next = self.clone();

        if let Some(data_dir) = storage.data_dir.as_ref() {
            next.data_dir = resolve_path_value(data_dir, &self.config_dir)?;
        }

        if let Some(state_dir) = storage.state_dir.as_ref() {
            next.state_dir = resolve_path_value(state_dir, &self.config_dir)?;
        }

        Ok(next)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub dataset: DatasetSettings,
    pub storage: StorageSettings,
}

impl AppConfig {
    /// Resolve the configured dataset locations into absolute paths. Both
    /// split locations must be configured; there is no default corpus.
    pub fn resolve_dataset(&self, paths: &AppPaths) -> Result<ResolvedDatasetConfig> {
        let train = self
            .dataset
            .train
            .as_ref()
            .ok_or_else(|| anyhow!("dataset.train is not configured"))?;
        let validation = self
            .dataset
            .validation
            .as_ref()
            .ok_or_else(|| anyhow!("dataset.validation is not configured"))?;

        if train.trim().is_empty() || validation.trim().is_empty() {
            bail!("dataset split paths must not be empty");
        }

        Ok(ResolvedDatasetConfig {
            train: resolve_path_value(train, &paths.config_dir)
                .context("failed to resolve the train split path")?,
            validation: resolve_path_value(validation, &paths.config_dir)
                .context("failed to resolve the validation split path")?,
            span_mode: self.dataset.span_mode,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DatasetSettings {
    pub train: Option<String>,
    pub validation: Option<String>,
    pub span_mode: SpanMode,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StorageSettings {
    pub data_dir: Option<String>,
    pub state_dir: Option<String>,
}

/// Dataset configuration with paths resolved to absolute locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDatasetConfig {
    pub train: PathBuf,
    pub validation: PathBuf,
    pub span_mode: SpanMode,
}

fn xdg_dir(var: &str, home: &Path, fallback_suffix: &str) -> PathBuf {
    env::var(var)
        .ok()
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| home.join(fallback_suffix))
}

pub fn resolve_path_value(value: &str, base_dir: &Path) -> Result<PathBuf> {
    let expanded = expand_path(value)?;
    let path = PathBuf::from(&expanded);
    if path.is_absolute() {
        Ok(path.components().collect())
    } else {
        Ok(base_dir.join(path))
    }
}

fn expand_path(value: &str) -> Result<String> {
    let home = home_dir();
    let home_utf8 = match home.as_ref() {
        Some(path) => Some(
            path.to_str()
                .ok_or_else(|| anyhow!("home directory contains invalid UTF-8"))?
                .to_string(),
        ),
        None => None,
    };

    let expanded = shellexpand::full_with_context(
        value,
        || home_utf8.as_deref(),
        |var| Ok(env::var(var).ok()),
    )
    .map_err(|error: shellexpand::LookupError<std::env::VarError>| {
        anyhow!("failed to expand '{value}': {error}")
    })?;
    Ok(expanded.into_owned())
}

fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(|| env::var_os("USERPROFILE").map(PathBuf::from))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;
    use std::sync::OnceLock;
    use tempfile::TempDir;

    // Tests mutate process environment; serialize them behind one lock.
    fn env_lock() -> &'static Mutex<()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
    }

    fn set_xdg_dirs(tmp: &TempDir) {
        env::set_var("XDG_CONFIG_HOME", tmp.path().join("config"));
        env::set_var("XDG_DATA_HOME", tmp.path().join("data"));
        env::set_var("XDG_STATE_HOME", tmp.path().join("state"));
    }

    #[test]
    fn creates_config_when_missing() {
        let _guard = env_lock().lock().unwrap();
        let tmp = TempDir::new().unwrap();
        set_xdg_dirs(&tmp);

        let bundle = load_or_initialize_config("mqm-test").unwrap();

        assert!(
            bundle.paths.config_file.exists(),
            "config file not created at {}",
            bundle.paths.config_file.display()
        );
        assert!(bundle.paths.data_dir.exists());
        assert!(bundle.paths.state_dir.exists());

        let dataset = bundle.config.resolve_dataset(&bundle.paths).unwrap();
        assert_eq!(dataset.span_mode, SpanMode::None);
        assert_eq!(
            dataset.train,
            bundle.paths.config_dir.join("data/train.jsonl")
        );
        assert_eq!(
            dataset.validation,
            bundle.paths.config_dir.join("data/validation.jsonl")
        );
    }

    #[test]
    fn reads_dataset_and_storage_settings() {
        let _guard = env_lock().lock().unwrap();
        let tmp = TempDir::new().unwrap();
        set_xdg_dirs(&tmp);

        let app_dir = tmp.path().join("config").join("mqm-custom");
        fs::create_dir_all(&app_dir).unwrap();
        let mut file = fs::File::create(app_dir.join("config.toml")).unwrap();
        writeln!(
            file,
            r#"
                [dataset]
                train = "/corpus/train.jsonl"
                validation = "/corpus/val.jsonl"
                span_mode = "seg"

                [storage]
                state_dir = "~/custom/state"
            "#
        )
        .unwrap();

        let bundle = load_or_initialize_config("mqm-custom").unwrap();
        let dataset = bundle.config.resolve_dataset(&bundle.paths).unwrap();

        assert_eq!(dataset.span_mode, SpanMode::Seg);
        assert_eq!(dataset.train, PathBuf::from("/corpus/train.jsonl"));
        assert_eq!(dataset.validation, PathBuf::from("/corpus/val.jsonl"));

        let expanded_home = home_dir().unwrap();
        assert_eq!(bundle.paths.state_dir, expanded_home.join("custom/state"));
    }

    #[test]
    fn unconfigured_split_paths_are_rejected() {
        let paths = AppPaths {
            app_name: "mqm".to_string(),
            config_dir: PathBuf::from("/tmp/mqm"),
            config_file: PathBuf::from("/tmp/mqm/config.toml"),
            data_dir: PathBuf::from("/tmp/mqm-data"),
            state_dir: PathBuf::from("/tmp/mqm-state"),
        };

        let config = AppConfig::default();
        let error = config.resolve_dataset(&paths).unwrap_err().to_string();
        assert!(error.contains("dataset.train"), "unexpected error: {error}");
    }
}
