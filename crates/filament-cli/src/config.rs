use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use filament_embed::{EmbedConfig, ProviderType};

/// Directory under the vault root holding the database and other
/// working state.
pub const CACHE_DIR_NAME: &str = ".filament";

/// CLI configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CliConfig {
    /// Vault location
    #[serde(default)]
    pub vault: VaultConfig,

    /// Embedding provider settings
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Link selection defaults, overridable per run with flags
    #[serde(default)]
    pub linking: LinkingConfig,
}

/// Vault configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VaultConfig {
    /// Path to the vault directory (default: current directory)
    pub path: Option<PathBuf>,
}

/// Embedding provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Provider name: ollama, openai, or mock
    #[serde(default = "default_provider")]
    pub provider: ProviderType,

    /// Service URL (default: the provider's standard endpoint)
    pub endpoint: Option<String>,

    /// Model name (default: the provider's standard model)
    pub model: Option<String>,

    /// API key (can also be set via OPENAI_API_KEY env var)
    pub api_key: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Documents per embedding request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

/// Link selection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkingConfig {
    /// Minimum cosine similarity for a link
    #[serde(default = "default_threshold")]
    pub threshold: f32,

    /// Links forced per document even below threshold (0 = none)
    #[serde(default)]
    pub min_links: usize,

    /// Maximum links per document
    #[serde(default = "default_max_links")]
    pub max_links: usize,

    /// K-means cluster count (0 = no clustering)
    #[serde(default)]
    pub clusters: usize,

    /// Blend weight for summary-excerpt similarity (0.0 = body only)
    #[serde(default)]
    pub summary_weight: f32,
}

fn default_provider() -> ProviderType {
    ProviderType::Ollama
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_batch_size() -> usize {
    filament_pipeline::DEFAULT_BATCH_SIZE
}

fn default_threshold() -> f32 {
    0.6
}

fn default_max_links() -> usize {
    9
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            endpoint: None,
            model: None,
            api_key: None,
            timeout_secs: default_timeout_secs(),
            batch_size: default_batch_size(),
        }
    }
}

impl Default for LinkingConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            min_links: 0,
            max_links: default_max_links(),
            clusters: 0,
            summary_weight: 0.0,
        }
    }
}

impl CliConfig {
    /// Load configuration with precedence: defaults < file < env < args
    pub fn load(
        config_file: Option<PathBuf>,
        provider: Option<String>,
        endpoint: Option<String>,
        model: Option<String>,
    ) -> Result<Self> {
        let mut config = Self::from_file_or_default(config_file)?;

        // Override with env vars
        if let Ok(path) = std::env::var("FILAMENT_VAULT_PATH") {
            config.vault.path = Some(PathBuf::from(path));
        }
        if let Ok(url) = std::env::var("FILAMENT_EMBEDDING_ENDPOINT") {
            config.embedding.endpoint = Some(url);
        }
        if let Ok(model) = std::env::var("FILAMENT_EMBEDDING_MODEL") {
            config.embedding.model = Some(model);
        }

        // Override with CLI args (highest priority)
        if let Some(name) = provider {
            config.embedding.provider = ProviderType::parse(&name).with_context(|| {
                format!("unknown provider {name:?} (expected ollama, openai, or mock)")
            })?;
        }
        if let Some(url) = endpoint {
            config.embedding.endpoint = Some(url);
        }
        if let Some(model) = model {
            config.embedding.model = Some(model);
        }

        Ok(config)
    }

    /// Load config from file or return default
    fn from_file_or_default(config_file: Option<PathBuf>) -> Result<Self> {
        // Test mode skips the user's config so tests see pure defaults
        if std::env::var("FILAMENT_TEST_MODE").is_ok() {
            return Ok(Self::default());
        }

        let path = config_file
            .or_else(|| Self::default_config_path().ok())
            .and_then(|p| if p.exists() { Some(p) } else { None });

        if let Some(path) = path {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    /// Get default config file path
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("filament");
        Ok(config_dir.join("config.toml"))
    }

    /// Resolve the vault root: CLI argument, then config, then the
    /// current directory. Must name an existing directory.
    pub fn resolve_vault(&self, cli_vault: Option<&Path>) -> Result<PathBuf> {
        let vault = match cli_vault {
            Some(path) => path.to_path_buf(),
            None => match &self.vault.path {
                Some(path) => path.clone(),
                None => std::env::current_dir().context("Could not determine current directory")?,
            },
        };

        let vault = vault
            .canonicalize()
            .with_context(|| format!("Vault path does not exist: {}", vault.display()))?;
        if !vault.is_dir() {
            bail!("Vault path is not a directory: {}", vault.display());
        }
        Ok(vault)
    }

    /// Resolved embedding batch size: CLI flag wins over config.
    pub fn batch_size(&self, flag: Option<usize>) -> usize {
        flag.unwrap_or(self.embedding.batch_size)
    }

    /// Provider settings for `create_provider`.
    pub fn embed_config(&self) -> EmbedConfig {
        EmbedConfig {
            provider: self.embedding.provider,
            endpoint: self.embedding.endpoint.clone(),
            model: self.embedding.model.clone(),
            api_key: self.embedding.api_key.clone(),
            timeout_seconds: self.embedding.timeout_secs,
        }
    }
}

/// Database path, always derived from the vault path.
pub fn database_path(vault: &Path) -> PathBuf {
    vault.join(CACHE_DIR_NAME).join("filament.db")
}

/// Flat-file cache path used by earlier releases, imported once at open.
pub fn legacy_cache_path(vault: &Path, model: &str) -> PathBuf {
    let vault_name = vault
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "vault".to_string());
    let safe_model = model.replace(['/', ':'], "_");
    vault
        .join(CACHE_DIR_NAME)
        .join(format!("embeddings_{vault_name}_{safe_model}.bin"))
}
