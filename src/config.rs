//! Configuration loading: clap entry arguments, plaintext config TOML,
//! secrets TOML, and the assembled runtime [`Ctx`].

use std::path::{Path, PathBuf};
use std::str::FromStr;

use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use clap::Parser;
use cron::Schedule;
use serde::Deserialize;
use tracing::Level;
use url::Url;

#[derive(Parser, Debug)]
pub struct Env {
    /// Path to plaintext TOML configuration file
    #[clap(long)]
    pub config: PathBuf,
    /// Path to TOML secrets file
    #[clap(long)]
    pub secrets: PathBuf,
}

/// Non-secret settings deserialized from the plaintext config TOML.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct Config {
    log_level: Option<LogLevel>,
    /// Cron expression controlling how often the draw job fires,
    /// e.g. `0 */10 * * * *` for every ten minutes.
    draw_schedule: Schedule,
    lottery: LotteryConfig,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct LotteryConfig {
    rpc_url: Url,
    address: Address,
}

/// Secret credentials deserialized from the secrets TOML.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct Secrets {
    lottery: LotterySecrets,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct LotterySecrets {
    /// Hex-encoded private key; used only for the draw transaction,
    /// never for read calls.
    private_key: String,
}

/// Combined runtime context assembled from config and secrets.
#[derive(Debug)]
pub struct Ctx {
    pub log_level: LogLevel,
    pub(crate) draw_schedule: Schedule,
    pub(crate) lottery: LotteryCtx,
}

#[derive(Clone)]
pub(crate) struct LotteryCtx {
    pub(crate) rpc_url: Url,
    pub(crate) address: Address,
    pub(crate) signer: PrivateKeySigner,
}

impl std::fmt::Debug for LotteryCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LotteryCtx")
            .field("rpc_url", &self.rpc_url.as_str())
            .field("address", &self.address)
            .field("signer", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid signing key: {0}")]
    SigningKey(#[from] alloy::signers::local::LocalSignerError),
}

impl Ctx {
    pub fn load(env: &Env) -> Result<Self, ConfigError> {
        let config: Config = read_toml(&env.config)?;
        let secrets: Secrets = read_toml(&env.secrets)?;
        Self::assemble(config, secrets)
    }

    fn assemble(config: Config, secrets: Secrets) -> Result<Self, ConfigError> {
        let signer = PrivateKeySigner::from_str(&secrets.lottery.private_key)?;

        Ok(Self {
            log_level: config.log_level.unwrap_or(LogLevel::Info),
            draw_schedule: config.draw_schedule,
            lottery: LotteryCtx {
                rpc_url: config.lottery.rpc_url,
                address: config.lottery.address,
                signer,
            },
        })
    }
}

fn read_toml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<&LogLevel> for Level {
    fn from(log_level: &LogLevel) -> Self {
        match log_level {
            LogLevel::Trace => Self::TRACE,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Info => Self::INFO,
            LogLevel::Warn => Self::WARN,
            LogLevel::Error => Self::ERROR,
        }
    }
}

pub fn setup_tracing(log_level: &LogLevel) {
    let level: Level = log_level.into();
    let default_filter = format!("lottery_keeper={level}");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();
}
