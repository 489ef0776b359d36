use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use chatty_gateway::GatewayConfig;

/// Process configuration, read from the environment after `.env` is loaded.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub gateway: GatewayConfig,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let host = var("CHATTY_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = parse(&var, "CHATTY_PORT", 1237u16)?;
        let db_path = PathBuf::from(var("CHATTY_DB_PATH").unwrap_or_else(|| "chatty.db".into()));

        let handshake = parse(&var, "CHATTY_HANDSHAKE_TIMEOUT_SECS", 30u64)?;
        let ack = parse(&var, "CHATTY_ACK_TIMEOUT_SECS", 10u64)?;
        let idle = parse(&var, "CHATTY_IDLE_TIMEOUT_SECS", 0u64)?;

        Ok(Self {
            host,
            port,
            db_path,
            gateway: GatewayConfig {
                handshake_timeout: Duration::from_secs(handshake),
                ack_timeout: Duration::from_secs(ack),
                // 0 disables the idle deadline
                idle_timeout: (idle > 0).then(|| Duration::from_secs(idle)),
            },
        })
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}

fn parse<T>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be a number, got {:?}", key, raw)),
        None => Ok(default),
    }
}
