use anyhow::{Context, Result};
use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

use crate::pipeline::Level;

pub type Number = f32;

const DEFAULT_DIMENSIONS: usize = 1024;
const DEFAULT_LANG: &str = "fr";
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_OPENAI_MODEL: &str = "text-embedding-3-small";

#[derive(Deserialize)]
pub struct VitesseConfig {
    pub rows_path: Option<String>,
    pub probes_path: Option<String>,
    pub subrows_path: Option<String>,
    pub participants_path: Option<String>,
    pub rows_output: Option<String>,
    pub probes_output: Option<String>,
    pub subrows_output: Option<String>,
    pub lang: Option<String>,
    pub dimensions: Option<usize>,
    pub embedding_provider: Option<String>,
    pub embeddings_dir: Option<String>,
    pub openai_base_url: Option<String>,
    pub openai_model: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_batch_size: Option<usize>,
    pub openai_timeout_secs: Option<u64>,
    pub openai_max_retries: Option<usize>,
    pub verbose: Option<bool>,
}

impl VitesseConfig {
    pub fn try_from(config: &Config) -> Result<Self, ConfigError> {
        Ok(VitesseConfig {
            rows_path: setting(config, "rows_path")?,
            probes_path: setting(config, "probes_path")?,
            subrows_path: setting(config, "subrows_path")?,
            participants_path: setting(config, "participants_path")?,
            rows_output: setting(config, "rows_output")?,
            probes_output: setting(config, "probes_output")?,
            subrows_output: setting(config, "subrows_output")?,
            lang: setting(config, "lang")?,
            dimensions: setting(config, "dimensions")?,
            embedding_provider: setting(config, "embedding_provider")?,
            embeddings_dir: setting(config, "embeddings_dir")?,
            openai_base_url: setting(config, "openai_base_url")?,
            openai_model: setting(config, "openai_model")?,
            openai_api_key: setting(config, "openai_api_key")?,
            openai_batch_size: setting(config, "openai_batch_size")?,
            openai_timeout_secs: setting(config, "openai_timeout_secs")?,
            openai_max_retries: setting(config, "openai_max_retries")?,
            verbose: setting(config, "verbose")?,
        })
    }
}

/// A key that is absent is `None`; a key that is present but does not parse is an error.
fn setting<T: DeserializeOwned>(config: &Config, key: &str) -> Result<Option<T>, ConfigError> {
    match config.get(key) {
        Ok(value) => Ok(Some(value)),
        Err(ConfigError::NotFound(_)) => Ok(None),
        Err(err) => Err(err),
    }
}

/// Which embedding backend feeds the pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderKind {
    Precomputed,
    OpenAi,
}

impl ProviderKind {
    pub fn parse(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "precomputed" => Ok(Self::Precomputed),
            "openai" => Ok(Self::OpenAi),
            other => anyhow::bail!(
                "Unknown embedding provider '{}' (expected 'precomputed' or 'openai')",
                other
            ),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Precomputed => "precomputed",
            Self::OpenAi => "openai",
        }
    }
}

#[derive(Clone, Debug)]
pub struct OpenAiSettings {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub batch_size: usize,
    pub timeout_secs: u64,
    pub max_retries: usize,
}

#[derive(Clone, Debug)]
pub struct State {
    pub rows_path: PathBuf,
    pub probes_path: PathBuf,
    pub subrows_path: PathBuf,
    pub participants_path: PathBuf,
    pub rows_output: PathBuf,
    pub probes_output: PathBuf,
    pub subrows_output: PathBuf,
    pub lang: String,
    pub dimensions: usize,
    pub provider: ProviderKind,
    pub embeddings_dir: PathBuf,
    pub openai: OpenAiSettings,
    pub verbose: bool,
}

impl State {
    /// Loads `vitesse_config.*` from the working directory, then `VITESSE_*` variables.
    pub fn new() -> Result<Self> {
        let mut config = Config::default();
        #[allow(deprecated)]
        {
            config.merge(ConfigFile::with_name("vitesse_config").required(false))?;
            config.merge(Environment::with_prefix("VITESSE"))?;
        }

        let vitesse_config =
            VitesseConfig::try_from(&config).context("Invalid vitesse configuration")?;
        Self::from_config(vitesse_config)
    }

    pub fn from_config(cfg: VitesseConfig) -> Result<Self> {
        let dimensions = cfg.dimensions.unwrap_or(DEFAULT_DIMENSIONS);
        if dimensions == 0 {
            anyhow::bail!("VITESSE_DIMENSIONS must be greater than zero.");
        }

        let provider = ProviderKind::parse(
            cfg.embedding_provider
                .as_deref()
                .unwrap_or(ProviderKind::Precomputed.as_str()),
        )?;

        let batch_size = cfg.openai_batch_size.unwrap_or(64);
        if batch_size == 0 {
            anyhow::bail!("VITESSE_OPENAI_BATCH_SIZE must be greater than zero.");
        }

        let api_key = cfg
            .openai_api_key
            .or_else(|| env::var("OPENAI_API_KEY").ok())
            .filter(|key| !key.trim().is_empty());

        Ok(Self {
            rows_path: path_or(cfg.rows_path, "text_rows.csv"),
            probes_path: path_or(cfg.probes_path, "text_probes.csv"),
            subrows_path: path_or(cfg.subrows_path, "text_subrows.csv"),
            participants_path: path_or(cfg.participants_path, "info_participants.csv"),
            rows_output: path_or(cfg.rows_output, "row_as_embedding_transitions.csv"),
            probes_output: path_or(cfg.probes_output, "probe_as_embedding_transitions.csv"),
            subrows_output: path_or(cfg.subrows_output, "subrow_as_embedding_transitions.csv"),
            lang: cfg.lang.unwrap_or_else(|| DEFAULT_LANG.to_string()),
            dimensions,
            provider,
            embeddings_dir: path_or(cfg.embeddings_dir, "embeddings"),
            openai: OpenAiSettings {
                base_url: cfg
                    .openai_base_url
                    .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
                model: cfg
                    .openai_model
                    .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
                api_key,
                batch_size,
                timeout_secs: cfg.openai_timeout_secs.unwrap_or(60),
                max_retries: cfg.openai_max_retries.unwrap_or(5),
            },
            verbose: cfg.verbose.unwrap_or(false),
        })
    }

    pub fn input_path(&self, level: Level) -> &Path {
        match level {
            Level::Row => &self.rows_path,
            Level::Probe => &self.probes_path,
            Level::Subrow => &self.subrows_path,
        }
    }

    pub fn output_path(&self, level: Level) -> &Path {
        match level {
            Level::Row => &self.rows_output,
            Level::Probe => &self.probes_output,
            Level::Subrow => &self.subrows_output,
        }
    }

    pub fn embeddings_path(&self, level: Level) -> PathBuf {
        self.embeddings_dir.join(format!("{}.jsonl", level.name()))
    }

    pub fn print_config(&self) {
        println!("rows_path={}", self.rows_path.display());
        println!("probes_path={}", self.probes_path.display());
        println!("subrows_path={}", self.subrows_path.display());
        println!("participants_path={}", self.participants_path.display());
        println!("rows_output={}", self.rows_output.display());
        println!("probes_output={}", self.probes_output.display());
        println!("subrows_output={}", self.subrows_output.display());
        println!("lang={}", self.lang);
        println!("dimensions={}", self.dimensions);
        println!("embedding_provider={}", self.provider.as_str());
        println!("embeddings_dir={}", self.embeddings_dir.display());
        println!("openai_base_url={}", self.openai.base_url);
        println!("openai_model={}", self.openai.model);
        println!(
            "openai_api_key={}",
            if self.openai.api_key.is_some() { "<set>" } else { "<unset>" }
        );
        println!("openai_batch_size={}", self.openai.batch_size);
        println!("openai_timeout_secs={}", self.openai.timeout_secs);
        println!("openai_max_retries={}", self.openai.max_retries);
        println!("verbose={}", self.verbose);
    }

    pub fn require_api_key(&self) -> Result<&str> {
        self.openai
            .api_key
            .as_deref()
            .context("OPENAI_API_KEY not set in config or environment")
    }
}

fn path_or(value: Option<String>, default: &str) -> PathBuf {
    PathBuf::from(value.unwrap_or_else(|| default.to_string()))
}
