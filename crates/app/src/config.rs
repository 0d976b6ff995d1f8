use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use deducto_classify::ClassifyThresholds;
use deducto_core::{Category, ALL_CATEGORIES};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("unknown ai backend {0:?} (expected \"heuristic\" or \"llm\")")]
    UnknownBackend(String),
    #[error("unknown category {0:?}")]
    UnknownCategory(String),
    #[error("no platform config directory (is $HOME set?)")]
    NoProjectDirs,
}

/// `deducto.toml`. Every field has a default; a missing file means a
/// default config, a present file may override any subset.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Database file. Defaults to `deducto.db` in the platform data dir.
    pub db_path: Option<PathBuf>,
    /// Category names counted as business expenses. Empty means all.
    pub enabled_categories: Vec<String>,
    pub ai: AiSection,
    pub thresholds: ThresholdSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiSection {
    /// "heuristic" (offline) or "llm".
    pub backend: String,
    pub endpoint: String,
    pub model: String,
    /// Environment variable holding the API key for the llm backend.
    pub api_key_env: String,
}

impl Default for AiSection {
    fn default() -> Self {
        AiSection {
            backend: "heuristic".to_string(),
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "DEDUCTO_API_KEY".to_string(),
        }
    }
}

/// Pipeline knob overrides. Unset fields keep the built-in defaults.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ThresholdSection {
    pub merchant_min_score: Option<u8>,
    pub keyword_min_score: Option<u8>,
    pub ai_chunk_size: Option<usize>,
    pub ai_chunk_delay_ms: Option<u64>,
    pub learn_min_confidence: Option<u8>,
    pub learned_keyword_floor: Option<u8>,
    pub fuzzy_floor: Option<f64>,
}

impl Config {
    pub fn thresholds(&self) -> ClassifyThresholds {
        let mut t = ClassifyThresholds::default();
        let o = &self.thresholds;
        if let Some(v) = o.merchant_min_score {
            t.merchant_min_score = v;
        }
        if let Some(v) = o.keyword_min_score {
            t.keyword_min_score = v;
        }
        if let Some(v) = o.ai_chunk_size {
            t.ai_chunk_size = v;
        }
        if let Some(ms) = o.ai_chunk_delay_ms {
            t.ai_chunk_delay = Duration::from_millis(ms);
        }
        if let Some(v) = o.learn_min_confidence {
            t.learn_min_confidence = v;
        }
        if let Some(v) = o.learned_keyword_floor {
            t.learned_keyword_floor = v;
        }
        if let Some(v) = o.fuzzy_floor {
            t.fuzzy_floor = v;
        }
        t
    }

    pub fn enabled_categories(&self) -> Result<BTreeSet<Category>, ConfigError> {
        if self.enabled_categories.is_empty() {
            return Ok(ALL_CATEGORIES.iter().copied().collect());
        }
        let mut enabled = BTreeSet::new();
        for name in &self.enabled_categories {
            let category = Category::from_text(name)
                .ok_or_else(|| ConfigError::UnknownCategory(name.clone()))?;
            enabled.insert(category);
        }
        Ok(enabled)
    }

    pub fn database_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.db_path {
            Some(p) => Ok(p.clone()),
            None => Ok(project_dirs()?.data_dir().join("deducto.db")),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match self.ai.backend.as_str() {
            "heuristic" | "llm" => {}
            other => return Err(ConfigError::UnknownBackend(other.to_string())),
        }
        self.enabled_categories()?;
        Ok(())
    }
}

fn project_dirs() -> Result<directories::ProjectDirs, ConfigError> {
    directories::ProjectDirs::from("com", "anomalyco", "Deducto")
        .ok_or(ConfigError::NoProjectDirs)
}

pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    Ok(project_dirs()?.config_dir().join("deducto.toml"))
}

/// Loads `deducto.toml` from `path`, or from the platform config dir
/// when no path is given. A missing file is not an error.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => default_config_path()?,
    };
    if !path.exists() {
        return Ok(Config::default());
    }
    let text = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;
    let config: Config =
        toml::from_str(&text).map_err(|source| ConfigError::Parse { path, source })?;
    config.validate()?;
    Ok(config)
}
