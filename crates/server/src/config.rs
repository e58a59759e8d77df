//! Server configuration: defaults, then an optional TOML file named by
//! `KASBOEK_CONFIG`, then `KASBOEK_*` environment variables.

use anyhow::Context;
use config::builder::DefaultState;
use config::{Config as Cfg, ConfigBuilder, Environment, File, FileFormat, Map};
use serde::Deserialize;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: PathBuf,
    pub bind: SocketAddr,
    pub log: String,
    pub log_format: LogFormat,
    pub max_upload_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database: PathBuf::from("kasboek.db"),
            bind: SocketAddr::from(([127, 0, 0, 1], 8000)),
            log: "info".to_string(),
            log_format: LogFormat::Pretty,
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let mut builder = Cfg::builder();
        if let Ok(path) = env::var("KASBOEK_CONFIG") {
            builder = builder.add_source(File::new(&path, FileFormat::Toml));
        }
        Config::layered(builder, None)
    }

    /// Adds the `KASBOEK_*` layer on top of `builder` and deserializes.
    /// `vars` replaces the process environment when given.
    pub fn layered(
        builder: ConfigBuilder<DefaultState>,
        vars: Option<Map<String, String>>,
    ) -> anyhow::Result<Self> {
        let environment = Environment::with_prefix("KASBOEK")
            .try_parsing(true)
            .source(vars);
        builder
            .add_source(environment)
            .build()
            .context("loading configuration")?
            .try_deserialize()
            .context("invalid configuration")
    }
}
