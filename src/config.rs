//! Application configuration: YAML file, then `RNE__SECTION__KEY` variables,
//! then a JSON document in `RNE_CONFIG_OVERRIDE_JSON`.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use rne_profiles::PageProfile;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::fs;
use tracing::{info, warn};

pub const ENV_PREFIX: &str = "RNE__";
pub const ENV_JSON: &str = "RNE_CONFIG_OVERRIDE_JSON";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub bus: BusConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub profile: PageProfile,
    /// Start monitoring as soon as a page with roots loads.
    pub monitoring: bool,
    pub suppress_all: bool,
    /// Decorate tweetdeck action menus with block/unblock entries.
    pub menu_hooking: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            profile: PageProfile::default(),
            monitoring: true,
            suppress_all: false,
            menu_hooking: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    pub capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self { capacity: 64 }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub json: bool,
}

#[derive(Clone, Debug)]
pub struct LoadedConfig {
    pub config: AppConfig,
    pub path: PathBuf,
    pub from_file: bool,
}

pub fn default_config_path() -> Result<PathBuf> {
    let mut path = dirs::config_dir().context("Failed to get config directory")?;
    path.push("rne");
    path.push("config.yaml");
    Ok(path)
}

pub async fn load_config(config_path: Option<&Path>) -> Result<LoadedConfig> {
    let path = match config_path {
        Some(path) => path.to_path_buf(),
        None => default_config_path()?,
    };

    let (config, from_file) = if fs::try_exists(&path).await.unwrap_or(false) {
        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let config: AppConfig = if content.trim().is_empty() {
            AppConfig::default()
        } else {
            serde_yaml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?
        };
        info!(path = %path.display(), "loaded configuration");
        (config, true)
    } else {
        warn!(path = %path.display(), "config file not found, using defaults");
        (AppConfig::default(), false)
    };

    let config = apply_env_overrides(config)?;
    Ok(LoadedConfig {
        config,
        path,
        from_file,
    })
}

pub fn apply_env_overrides(config: AppConfig) -> Result<AppConfig> {
    let mut value = serde_json::to_value(&config)?;
    let mut applied = 0usize;

    let mut vars: Vec<(String, String)> = env::vars()
        .filter(|(key, _)| key.starts_with(ENV_PREFIX))
        .collect();
    vars.sort();
    for (key, raw) in vars {
        let segments: Vec<String> = key[ENV_PREFIX.len()..]
            .split("__")
            .filter(|segment| !segment.is_empty())
            .map(|segment| segment.to_ascii_lowercase())
            .collect();
        if segments.is_empty() {
            continue;
        }
        set_json_value(&mut value, &segments, parse_env_value(&raw))
            .with_context(|| format!("applying {key}"))?;
        applied += 1;
    }

    if let Ok(raw_json) = env::var(ENV_JSON) {
        if !raw_json.trim().is_empty() {
            let overlay: Value = serde_json::from_str(&raw_json)
                .with_context(|| format!("parsing {ENV_JSON}"))?;
            for (segments, leaf) in flatten(overlay, Vec::new()) {
                set_json_value(&mut value, &segments, leaf)
                    .with_context(|| format!("applying {ENV_JSON}"))?;
                applied += 1;
            }
        }
    }

    if applied == 0 {
        return Ok(config);
    }
    info!(applied, "applied configuration overrides from environment");
    serde_json::from_value(value).context("overrides produce an invalid configuration")
}

/// Looks up a dotted key such as `engine.profile`.
pub fn get_value(config: &AppConfig, key: &str) -> Result<Option<Value>> {
    let value = serde_json::to_value(config)?;
    let mut current = &value;
    for segment in split_key(key)? {
        match current {
            Value::Object(map) => match map.get(segment) {
                Some(next) => current = next,
                None => return Ok(None),
            },
            _ => return Ok(None),
        }
    }
    Ok(Some(current.clone()))
}

fn split_key(key: &str) -> Result<Vec<&str>> {
    let segments: Vec<&str> = key
        .split('.')
        .filter(|segment| !segment.is_empty())
        .collect();
    if segments.is_empty() {
        bail!("configuration key cannot be empty");
    }
    Ok(segments)
}

fn parse_env_value(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::Null;
    }
    if let Ok(parsed) = serde_json::from_str::<Value>(raw) {
        return parsed;
    }
    if let Ok(boolean) = raw.parse::<bool>() {
        return Value::Bool(boolean);
    }
    if let Ok(int_val) = raw.parse::<i64>() {
        return Value::Number(int_val.into());
    }
    Value::String(raw.to_string())
}

fn flatten(value: Value, prefix: Vec<String>) -> Vec<(Vec<String>, Value)> {
    match value {
        Value::Object(map) => map
            .into_iter()
            .flat_map(|(key, value)| {
                let mut path = prefix.clone();
                path.push(key.trim().to_ascii_lowercase());
                flatten(value, path)
            })
            .collect(),
        leaf if !prefix.is_empty() => vec![(prefix, leaf)],
        _ => Vec::new(),
    }
}

fn set_json_value(target: &mut Value, path: &[String], value: Value) -> Result<()> {
    let Some((last, parents)) = path.split_last() else {
        bail!("configuration key cannot be empty");
    };
    let mut current = target;
    for segment in parents {
        current = ensure_object(current, segment)?
            .entry(segment.clone())
            .or_insert(Value::Null);
    }
    ensure_object(current, last)?.insert(last.clone(), value);
    Ok(())
}

fn ensure_object<'a>(value: &'a mut Value, segment: &str) -> Result<&'a mut Map<String, Value>> {
    if value.is_null() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => Ok(map),
        _ => bail!("{segment} resolves to a non-object value; cannot assign nested configuration"),
    }
}
