use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::{Error, Result};

pub const DEFAULT_DATABASE_URL: &str = "/tmp/provgraph.sqlite";
pub const DEFAULT_CACHE_CAPACITY: usize = 65_536;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvgraphConfig {
    #[serde(default)]
    pub lineage: LineageConfig,
    #[serde(default)]
    pub translator: TranslatorConfig,
}

/// What the lineage store does when a row insert fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InsertFailurePolicy {
    /// Log at error level and report success; ingestion never stalls.
    #[default]
    Log,
    /// Report the failure to the caller.
    Propagate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LineageConfig {
    /// `driver url username password`, each token accepting `default`/`null`
    pub arguments: String,
    pub ancestors: String,
    pub descendants: String,
    pub insert_failures: InsertFailurePolicy,
}

impl Default for LineageConfig {
    fn default() -> Self {
        Self {
            arguments: "default default null null".to_string(),
            ancestors: "ancestors".to_string(),
            descendants: "descendants".to_string(),
            insert_failures: InsertFailurePolicy::Log,
        }
    }
}

impl LineageConfig {
    pub fn with_arguments(arguments: impl Into<String>) -> Self {
        Self {
            arguments: arguments.into(),
            ..Self::default()
        }
    }

    pub fn in_memory() -> Self {
        Self::with_arguments("sqlite :memory: null null")
    }
}

/// Relational backends the lineage store can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Driver {
    Sqlite,
}

/// Resolved connection arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub driver: Driver,
    pub url: String,
    pub username: String,
    pub password: String,
}

impl ConnectionSettings {
    /// Parse the four whitespace-separated tokens. Missing trailing tokens
    /// count as `default`.
    pub fn from_arguments(arguments: &str) -> Result<Self> {
        let tokens: Vec<&str> = arguments.split_whitespace().collect();
        if tokens.len() > 4 {
            return Err(Error::Config(format!(
                "expected 'driver url username password', got {} tokens",
                tokens.len()
            )));
        }
        let token = |i: usize| tokens.get(i).copied().filter(|t| !is_sentinel(t));

        let driver = match token(0) {
            None => Driver::Sqlite,
            Some(d) if d.eq_ignore_ascii_case("sqlite") => Driver::Sqlite,
            Some(d) => return Err(Error::Config(format!("unsupported driver: {}", d))),
        };

        Ok(Self {
            driver,
            url: token(1).unwrap_or(DEFAULT_DATABASE_URL).to_string(),
            username: token(2).unwrap_or_default().to_string(),
            password: token(3).unwrap_or_default().to_string(),
        })
    }

    pub fn is_in_memory(&self) -> bool {
        self.url == ":memory:"
    }
}

fn is_sentinel(token: &str) -> bool {
    token.eq_ignore_ascii_case("default") || token.eq_ignore_ascii_case("null")
}

/// Serializer used by the publication sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Serializer {
    /// One compact JSON object per line
    #[default]
    Json,
    /// Indented JSON, for eyeballing
    Pretty,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslatorConfig {
    /// Where the sink delivers records (`-` is stdout for the JSON-lines sink)
    pub endpoint: String,
    pub topic: String,
    pub producer_id: String,
    /// Schema descriptor handed to the publisher
    pub schema: String,
    pub serializer: Serializer,
    /// Maximum number of pids tracked by the process-identity cache
    pub cache_capacity: usize,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            endpoint: "-".to_string(),
            topic: "provgraph".to_string(),
            producer_id: "provgraph-producer".to_string(),
            schema: "TCCDMDatum".to_string(),
            serializer: Serializer::Json,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("provgraph.toml")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<ProvgraphConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: ProvgraphConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &ProvgraphConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

pub fn ensure_db_dir(db_path: &Path) -> Result<()> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
