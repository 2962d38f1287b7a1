// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use anyhow::{Context, Result};
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

const APP_DIR_NAME: &str = "robotd";
const CONFIG_FILE_NAME: &str = "robotd.toml";
const CONFIG_ENV_VAR: &str = "ROBOTD_CONFIG_PATH";
const DATABASE_FILE_NAME: &str = "robotd.sqlite";
const MEDIA_DIR_NAME: &str = "media";
const DEFAULT_SITE_ROOT: &str = "http://localhost:8000";
const DEFAULT_MEDIA_URL: &str = "/media/";
const DEFAULT_RUNNER_COMMAND: &str = "pybot";
const DEFAULT_LOGIN_TIMEOUT_SECS: u64 = 30;
const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 60;
const DEFAULT_PROMPT_TIMEOUT_SECS: u64 = 1800;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    database_path: Option<String>,
    media_root: Option<String>,
    site_root: Option<String>,
    media_url: Option<String>,
    known_hosts_path: Option<String>,
    runner_command: Option<String>,
    login_timeout_secs: Option<u64>,
    command_timeout_secs: Option<u64>,
    prompt_timeout_secs: Option<u64>,
    verbose: Option<bool>,
}

#[derive(Debug)]
pub struct Config {
    pub database_path: PathBuf,
    pub media_root: PathBuf,
    pub site_root: String,
    pub media_url: String,
    /// `None` means the user's default known_hosts file.
    pub known_hosts_path: Option<PathBuf>,
    pub runner_command: String,
    pub login_timeout: Duration,
    pub command_timeout: Duration,
    pub prompt_timeout: Duration,
    pub verbose: bool,
    #[allow(dead_code)]
    pub config_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    Override,
    Env,
    ConfigFile,
    Default,
}

impl ConfigSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ConfigSource::Override => "override",
            ConfigSource::Env => "env",
            ConfigSource::ConfigFile => "config",
            ConfigSource::Default => "default",
        }
    }
}

#[derive(Debug)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }
}

#[derive(Debug)]
pub struct ConfigReport {
    pub config_path: Option<PathBuf>,
    pub config_path_source: Option<ConfigSource>,
    pub config_file_present: bool,
    pub database_path: ConfigValue<PathBuf>,
    pub media_root: ConfigValue<PathBuf>,
    pub site_root: ConfigValue<String>,
    pub media_url: ConfigValue<String>,
    pub known_hosts_path: ConfigValue<Option<PathBuf>>,
    pub runner_command: ConfigValue<String>,
    pub login_timeout_secs: ConfigValue<u64>,
    pub command_timeout_secs: ConfigValue<u64>,
    pub prompt_timeout_secs: ConfigValue<u64>,
    pub verbose: ConfigValue<bool>,
}

#[derive(Debug)]
pub struct LoadResult {
    pub config: Config,
    pub report: ConfigReport,
}

#[derive(Debug, Default)]
pub struct Overrides {
    pub database_path: Option<PathBuf>,
    pub media_root: Option<PathBuf>,
    pub verbose: Option<bool>,
}

#[allow(dead_code)]
pub fn load(config_path_override: Option<PathBuf>, overrides: Overrides) -> Result<Config> {
    Ok(load_with_report(config_path_override, overrides)?.config)
}

pub fn load_with_report(
    config_path_override: Option<PathBuf>,
    overrides: Overrides,
) -> Result<LoadResult> {
    let (config_path, config_path_source, required) = match config_path_override {
        Some(path) => (Some(expand_path(path)), Some(ConfigSource::Override), true),
        None => match config_path_from_env()? {
            Some(path) => (Some(expand_path(path)), Some(ConfigSource::Env), true),
            None => match default_config_path().ok() {
                Some(path) => (Some(path), Some(ConfigSource::Default), false),
                None => (None, None, false),
            },
        },
    };
    let config_file_present = config_path
        .as_deref()
        .map(|path| path.exists())
        .unwrap_or(false);

    let file_config = match config_path.as_deref() {
        Some(path) => read_config_file(path, required)?,
        None => FileConfig::default(),
    };
    let base_dir = config_path.as_deref().and_then(|path| path.parent());

    let database_path = match overrides.database_path {
        Some(path) => ConfigValue::new(expand_path(path), ConfigSource::Override),
        None => match file_config.database_path {
            Some(raw) => ConfigValue::new(resolve_path(&raw, base_dir), ConfigSource::ConfigFile),
            None => ConfigValue::new(
                default_data_dir()
                    .map(|dir| dir.join(DATABASE_FILE_NAME))
                    .with_context(|| {
                        "failed to resolve default database path; specify --database-path or set database_path in the config file"
                    })?,
                ConfigSource::Default,
            ),
        },
    };

    let media_root = match overrides.media_root {
        Some(path) => ConfigValue::new(expand_path(path), ConfigSource::Override),
        None => match file_config.media_root {
            Some(raw) => ConfigValue::new(resolve_path(&raw, base_dir), ConfigSource::ConfigFile),
            None => ConfigValue::new(
                default_data_dir()
                    .map(|dir| dir.join(MEDIA_DIR_NAME))
                    .with_context(|| {
                        "failed to resolve default media root; specify --media-root or set media_root in the config file"
                    })?,
                ConfigSource::Default,
            ),
        },
    };

    let known_hosts_path = match file_config.known_hosts_path {
        Some(raw) => ConfigValue::new(Some(resolve_path(&raw, base_dir)), ConfigSource::ConfigFile),
        None => ConfigValue::new(None, ConfigSource::Default),
    };

    let site_root = from_file_or(file_config.site_root, || DEFAULT_SITE_ROOT.to_string());
    let media_url = from_file_or(file_config.media_url, || DEFAULT_MEDIA_URL.to_string());
    let runner_command =
        from_file_or(file_config.runner_command, || DEFAULT_RUNNER_COMMAND.to_string());
    if runner_command.value.trim().is_empty() {
        anyhow::bail!("runner_command must not be empty");
    }

    let login_timeout_secs =
        from_file_or(file_config.login_timeout_secs, || DEFAULT_LOGIN_TIMEOUT_SECS);
    let command_timeout_secs =
        from_file_or(file_config.command_timeout_secs, || DEFAULT_COMMAND_TIMEOUT_SECS);
    let prompt_timeout_secs =
        from_file_or(file_config.prompt_timeout_secs, || DEFAULT_PROMPT_TIMEOUT_SECS);
    for (name, value) in [
        ("login_timeout_secs", &login_timeout_secs),
        ("command_timeout_secs", &command_timeout_secs),
        ("prompt_timeout_secs", &prompt_timeout_secs),
    ] {
        if value.value == 0 {
            anyhow::bail!("{name} must be greater than zero");
        }
    }

    let verbose = match overrides.verbose {
        Some(verbose) => ConfigValue::new(verbose, ConfigSource::Override),
        None => from_file_or(file_config.verbose, || false),
    };

    let config = Config {
        database_path: database_path.value.clone(),
        media_root: media_root.value.clone(),
        site_root: site_root.value.clone(),
        media_url: media_url.value.clone(),
        known_hosts_path: known_hosts_path.value.clone(),
        runner_command: runner_command.value.clone(),
        login_timeout: Duration::from_secs(login_timeout_secs.value),
        command_timeout: Duration::from_secs(command_timeout_secs.value),
        prompt_timeout: Duration::from_secs(prompt_timeout_secs.value),
        verbose: verbose.value,
        config_path: config_path.clone(),
    };

    let report = ConfigReport {
        config_path,
        config_path_source,
        config_file_present,
        database_path,
        media_root,
        site_root,
        media_url,
        known_hosts_path,
        runner_command,
        login_timeout_secs,
        command_timeout_secs,
        prompt_timeout_secs,
        verbose,
    };

    Ok(LoadResult { config, report })
}

fn from_file_or<T>(value: Option<T>, default: impl FnOnce() -> T) -> ConfigValue<T> {
    match value {
        Some(value) => ConfigValue::new(value, ConfigSource::ConfigFile),
        None => ConfigValue::new(default(), ConfigSource::Default),
    }
}

pub fn ensure_database_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create database directory {}", parent.display()))?;
    }
    Ok(())
}

fn read_config_file(path: &Path, required: bool) -> Result<FileConfig> {
    if !path.exists() {
        if required {
            anyhow::bail!("config file not found at {}", path.display());
        }
        return Ok(FileConfig::default());
    }

    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file {}", path.display()))
}

fn resolve_path(raw: &str, base_dir: Option<&Path>) -> PathBuf {
    let expanded = shellexpand::tilde(raw);
    let path = PathBuf::from(expanded.as_ref());
    if path.is_absolute() {
        return path;
    }
    match base_dir {
        Some(dir) => dir.join(path),
        None => path,
    }
}

fn expand_path(path: PathBuf) -> PathBuf {
    let path_string = path.to_string_lossy().to_string();
    let expanded = shellexpand::tilde(&path_string);
    PathBuf::from(expanded.as_ref())
}

fn config_path_from_env() -> Result<Option<PathBuf>> {
    match std::env::var_os(CONFIG_ENV_VAR) {
        Some(value) => {
            if value.is_empty() {
                anyhow::bail!("{CONFIG_ENV_VAR} is set but empty");
            }
            Ok(Some(PathBuf::from(value)))
        }
        None => Ok(None),
    }
}

fn default_config_path() -> Result<PathBuf> {
    let base = dirs::config_dir().context("failed to resolve config directory")?;
    Ok(base.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
}

fn default_data_dir() -> Result<PathBuf> {
    let base = dirs::data_dir().context("failed to resolve data directory")?;
    Ok(base.join(APP_DIR_NAME))
}
