use crate::store::StoreOptions;
use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<String>,

    /// Port to listen on
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Engine provider: `memory` or `surrealdb`
    #[arg(long, env = "ENGINE_PROVIDER")]
    pub engine: Option<String>,

    /// Engine connection string (e.g. `surrealkv://data/memstore`, `ws://localhost:8000`)
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub engine: EngineConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EngineConfig {
    pub provider: String,
    pub database_url: String,
    pub namespace: String,
    pub database: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub vector_dimension: usize,
    pub batch_concurrency: usize,
    pub request_timeout_ms: u64,
}

impl From<&StoreConfig> for StoreOptions {
    fn from(cfg: &StoreConfig) -> Self {
        Self {
            vector_dimension: cfg.vector_dimension,
            batch_concurrency: cfg.batch_concurrency,
            request_timeout: Duration::from_millis(cfg.request_timeout_ms),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from_args(std::env::args())
    }

    /// Priority: CLI flag > CLI env var > `MEMSTORE_` env > config file > defaults.
    pub fn load_from_args<I, T>(args: I) -> Result<Self, config::ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| config::ConfigError::Message(e.to_string()))?;

        let mut builder = Config::builder();

        // 1. Defaults
        builder = builder
            .set_default("server.port", 7700)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("engine.provider", "memory")?
            .set_default("engine.database_url", "surrealkv://data/memstore")?
            .set_default("engine.namespace", "memstore")?
            .set_default("engine.database", "memstore")?
            .set_default("store.vector_dimension", 1536)?
            .set_default("store.batch_concurrency", 8)?
            .set_default("store.request_timeout_ms", 10_000)?;

        // 2. Config file: explicit path must exist, ./config.* is optional
        builder = match &cli.config {
            Some(path) => builder.add_source(File::with_name(path).required(true)),
            None => builder.add_source(File::with_name("config").required(false)),
        };

        // 3. Environment (e.g. MEMSTORE_SERVER__PORT=8000)
        builder = builder.add_source(
            Environment::with_prefix("MEMSTORE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        // 4. CLI overrides (clap already folded in their env vars)
        if let Some(port) = cli.port {
            builder = builder.set_override("server.port", i64::from(port))?;
        }
        if let Some(engine) = cli.engine {
            builder = builder.set_override("engine.provider", engine)?;
        }
        if let Some(url) = cli.database_url {
            builder = builder.set_override("engine.database_url", url)?;
        }

        let cfg = builder.build()?;
        cfg.try_deserialize()
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions::from(&self.store)
    }
}
