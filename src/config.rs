// config.rs — configuration surface (spec §6) and CLI entrypoint.
//
// The teacher reads ad hoc env vars in main.rs; the full config surface here
// is too wide for that, so it loads from a TOML file (following the
// strategy-config pattern used across the example pack) with `clap` picking
// the file and the two operationally relevant overrides.
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{EngineError, EngineResult};

#[derive(Parser, Debug)]
#[command(name = "deltaneutral-mm", about = "delta-neutral spot/perp market maker")]
pub struct Cli {
    /// Path to the TOML config file.
    #[arg(long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Forces dry-run regardless of the config file's `dry_run` value.
    #[arg(long)]
    pub dry_run: bool,

    /// Parses and prints the resolved config, then exits. Useful in CI.
    #[arg(long)]
    pub validate_config: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub symbol: String,
    #[serde(default = "default_tick_sec")]
    pub tick_sec: f64,
    pub quote_qty: f64,
    pub base_half_spread_bps: f64,
    pub k_obi: f64,
    pub inventory_skew_bps: f64,
    pub funding_skew_bps: f64,
    pub min_abs_funding: f64,
    pub replace_threshold_bps: f64,
    pub hedge_slip_bps: f64,
    #[serde(default = "default_hedge_chase_sec")]
    pub hedge_chase_sec: u64,
    #[serde(default = "default_hedge_max_tries")]
    pub hedge_max_tries: u32,
    #[serde(default = "default_hedge_deadline_ms")]
    pub hedge_deadline_ms: u64,
    #[serde(default = "default_chase_gain")]
    pub chase_gain: f64,
    #[serde(default = "default_book_stale_sec")]
    pub book_stale_sec: u64,
    #[serde(default = "default_funding_poll_sec")]
    pub funding_poll_sec: u64,
    #[serde(default = "default_funding_stale_sec")]
    pub funding_stale_sec: u64,
    pub max_unhedged_notional: f64,
    #[serde(default = "default_max_unhedged_sec")]
    pub max_unhedged_sec: u64,
    #[serde(default = "default_reject_streak_halt")]
    pub reject_streak_halt: u32,
    #[serde(default = "default_reconnect_grace_sec")]
    pub controlled_reconnect_grace_sec: u64,
    #[serde(default)]
    pub dry_run: bool,
    pub expected_position_mode: String,
    #[serde(default)]
    pub auto_set_position_mode: bool,
}

fn default_tick_sec() -> f64 {
    0.25
}
fn default_hedge_chase_sec() -> u64 {
    5
}
fn default_hedge_max_tries() -> u32 {
    2
}
fn default_hedge_deadline_ms() -> u64 {
    8_000
}
fn default_chase_gain() -> f64 {
    0.5
}
fn default_book_stale_sec() -> u64 {
    5
}
fn default_funding_poll_sec() -> u64 {
    30
}
fn default_funding_stale_sec() -> u64 {
    120
}
fn default_max_unhedged_sec() -> u64 {
    10
}
fn default_reject_streak_halt() -> u32 {
    5
}
fn default_reconnect_grace_sec() -> u64 {
    15
}

impl EngineConfig {
    pub fn load(path: &Path) -> EngineResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("cannot read {:?}: {}", path, e)))?;
        let mut cfg: EngineConfig = toml::from_str(&text)
            .map_err(|e| EngineError::Config(format!("cannot parse {:?}: {}", path, e)))?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> EngineResult<()> {
        if self.symbol.trim().is_empty() {
            return Err(EngineError::Config("symbol must not be empty".into()));
        }
        if self.quote_qty <= 0.0 {
            return Err(EngineError::Config("quote_qty must be positive".into()));
        }
        if self.max_unhedged_notional <= 0.0 {
            return Err(EngineError::Config("max_unhedged_notional must be positive".into()));
        }
        Ok(())
    }
}
