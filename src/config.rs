//! Engine settings and server configuration (env-driven in the binary).

use crate::models::{EngineError, MapPool};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Who picks sides on a BO1.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SideRule {
    /// The team that did not make the last ban.
    #[default]
    VetoLoser,
    /// Chooser drawn at random, seeded by the match id.
    CoinFlip,
}

impl FromStr for SideRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "veto-loser" | "veto_loser" => Ok(SideRule::VetoLoser),
            "coin-flip" | "coin_flip" => Ok(SideRule::CoinFlip),
            other => Err(format!("unknown side rule {other:?}")),
        }
    }
}

/// Rules the engine applies to every match.
#[derive(Clone, Debug)]
pub struct EngineSettings {
    /// Window both teams have to ready up before the non-ready side forfeits.
    pub ready_timeout: Duration,
    pub map_pool: MapPool,
    pub bo1_side_rule: SideRule,
    /// Default for new double-elimination tournaments.
    pub grand_final_reset: bool,
    /// Bound on re-reads when advancement races another writer on the same downstream match.
    pub advancement_attempts: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            ready_timeout: Duration::seconds(default_ready_timeout_secs()),
            map_pool: MapPool::default(),
            bo1_side_rule: SideRule::default(),
            grand_final_reset: true,
            advancement_attempts: 16,
        }
    }
}

fn default_ready_timeout_secs() -> i64 {
    300
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_ready_sweep_secs() -> u64 {
    15
}

/// Server settings read from the environment.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Base URL of the notification relay; events are only logged when unset.
    pub relay_url: Option<String>,
    /// How often the ready-up timeout sweep runs.
    pub ready_sweep_secs: u64,
    pub engine: EngineSettings,
}

fn env_default(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_flag_default(key: &str, default: bool) -> bool {
    match env_default(key) {
        Some(value) => matches!(
            value.to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
        None => default,
    }
}

impl ServerConfig {
    /// Read HOST, PORT, RELAY_URL, READY_SWEEP_SECS, READY_TIMEOUT_SECS, MAP_POOL,
    /// BO1_SIDE_RULE and GRAND_FINAL_RESET. Unset or unparsable values fall back to defaults.
    pub fn from_env() -> Result<Self, EngineError> {
        let mut engine = EngineSettings::default();
        if let Some(secs) = env_default("READY_TIMEOUT_SECS").and_then(|v| v.parse::<i64>().ok()) {
            engine.ready_timeout = Duration::seconds(secs.max(1));
        }
        if let Some(pool) = env_default("MAP_POOL") {
            engine.map_pool = MapPool::new(pool.split(','))?;
        }
        if let Some(rule) = env_default("BO1_SIDE_RULE") {
            match rule.parse() {
                Ok(rule) => engine.bo1_side_rule = rule,
                Err(e) => log::warn!("Ignoring BO1_SIDE_RULE: {}", e),
            }
        }
        engine.grand_final_reset = env_flag_default("GRAND_FINAL_RESET", engine.grand_final_reset);

        Ok(Self {
            host: env_default("HOST").unwrap_or_else(default_host),
            port: env_default("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or_else(default_port),
            relay_url: env_default("RELAY_URL"),
            ready_sweep_secs: env_default("READY_SWEEP_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_ready_sweep_secs),
            engine,
        })
    }
}
