//! Application configuration (spec.md §6.4; SPEC_FULL.md §A.3): loaded
//! once at startup via the `config` crate layered over `dotenvy`, then
//! handed to components as plain owned values.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

use crate::lifecycle::LifecycleConfig;
use crate::lifecycle::batch::BatchConfig;
use crate::lifecycle::validation::SymbolLimits;
use crate::matching::SymbolScale;
use crate::risk::FailPolicy;
use crate::distribution::BusConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_ws_port")]
    pub ws_port: u16,
    #[serde(default = "default_rpc_port")]
    pub rpc_port: u16,
}

fn default_ws_port() -> u16 {
    8081
}

fn default_rpc_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ws_port: default_ws_port(),
            rpc_port: default_rpc_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatchingSymbolOverride {
    pub scale_price: Option<u32>,
    pub scale_qty: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct MatchingConfig {
    #[serde(default = "default_scale_price")]
    pub scale_price: u32,
    #[serde(default = "default_scale_qty")]
    pub scale_qty: u32,
    #[serde(default)]
    pub symbols: HashMap<String, MatchingSymbolOverride>,
}

fn default_scale_price() -> u32 {
    4
}

fn default_scale_qty() -> u32 {
    8
}

impl MatchingConfig {
    pub fn default_scale(&self) -> SymbolScale {
        SymbolScale {
            price_scale: self.scale_price,
            quantity_scale: self.scale_qty,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LifecycleSettings {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_batch_timeout_ms")]
    pub batch_timeout_ms: u64,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    #[serde(default = "default_max_orders_per_user")]
    pub max_orders_per_user: usize,
    #[serde(default = "default_eviction_grace_s")]
    pub eviction_grace_s: u64,
}

fn default_eviction_grace_s() -> u64 {
    300
}

fn default_batch_size() -> usize {
    100
}
fn default_batch_timeout_ms() -> u64 {
    100
}
fn default_worker_count() -> usize {
    4
}
fn default_channel_capacity() -> usize {
    1000
}
fn default_max_orders_per_user() -> usize {
    10_000
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            batch_timeout_ms: default_batch_timeout_ms(),
            worker_count: default_worker_count(),
            channel_capacity: default_channel_capacity(),
            max_orders_per_user: default_max_orders_per_user(),
            eviction_grace_s: default_eviction_grace_s(),
        }
    }
}

impl LifecycleSettings {
    pub fn to_lifecycle_config(&self) -> LifecycleConfig {
        LifecycleConfig {
            batch: BatchConfig {
                batch_size: self.batch_size,
                batch_timeout: Duration::from_millis(self.batch_timeout_ms),
                worker_count: self.worker_count,
                channel_capacity: self.channel_capacity,
            },
            default_symbol_limits: SymbolLimits::default(),
            max_orders_per_user: self.max_orders_per_user,
            duplicate_window: Duration::from_secs(86_400),
            eviction_grace: Duration::from_secs(self.eviction_grace_s),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RiskSettings {
    #[serde(default)]
    pub plugin_dir: Option<String>,
    #[serde(default = "default_fail_policy")]
    pub fail_policy: String,
}

fn default_fail_policy() -> String {
    "closed".to_string()
}

impl Default for RiskSettings {
    fn default() -> Self {
        Self {
            plugin_dir: None,
            fail_policy: default_fail_policy(),
        }
    }
}

impl RiskSettings {
    pub fn fail_policy(&self) -> FailPolicy {
        match self.fail_policy.as_str() {
            "open" => FailPolicy::Open,
            _ => FailPolicy::Closed,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WsSettings {
    #[serde(default = "default_send_buffer")]
    pub send_buffer: usize,
    #[serde(default = "default_ping_interval_s")]
    pub ping_interval_s: u64,
    #[serde(default = "default_pong_timeout_s")]
    pub pong_timeout_s: u64,
    #[serde(default = "default_max_message_bytes")]
    pub max_message_bytes: usize,
}

fn default_send_buffer() -> usize {
    256
}
fn default_ping_interval_s() -> u64 {
    30
}
fn default_pong_timeout_s() -> u64 {
    60
}
fn default_max_message_bytes() -> usize {
    1_048_576
}

impl Default for WsSettings {
    fn default() -> Self {
        Self {
            send_buffer: default_send_buffer(),
            ping_interval_s: default_ping_interval_s(),
            pong_timeout_s: default_pong_timeout_s(),
            max_message_bytes: default_max_message_bytes(),
        }
    }
}

impl WsSettings {
    pub fn to_bus_config(&self) -> BusConfig {
        BusConfig {
            send_buffer: self.send_buffer,
            ping_interval: Duration::from_secs(self.ping_interval_s),
            pong_timeout: Duration::from_secs(self.pong_timeout_s),
            max_message_bytes: self.max_message_bytes,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub environment: String,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub lifecycle: LifecycleSettings,
    #[serde(default)]
    pub risk: RiskSettings,
    #[serde(default)]
    pub ws: WsSettings,
    pub database_url: String,
    pub jwt_secret: String,
    #[serde(default = "default_jwt_expiry_seconds")]
    pub jwt_expiry_seconds: u64,
    #[serde(default)]
    pub trading_symbols: Vec<String>,
}

fn default_jwt_expiry_seconds() -> u64 {
    3600
}

impl AppConfig {
    /// Layers `.env` (via `dotenvy`, loaded by the caller) under real
    /// process environment variables, both read through the `config`
    /// crate's `Environment` source with a `__` key separator so nested
    /// keys like `server.ws_port` map to `SERVER__WS_PORT`.
    pub fn load() -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .set_default("environment", "development")?
            .set_default("server.ws_port", default_ws_port() as i64)?
            .set_default("server.rpc_port", default_rpc_port() as i64)?
            .set_default("matching.scale_price", default_scale_price() as i64)?
            .set_default("matching.scale_qty", default_scale_qty() as i64)?
            .set_default("lifecycle.batch_size", default_batch_size() as i64)?
            .set_default("lifecycle.batch_timeout_ms", default_batch_timeout_ms() as i64)?
            .set_default("lifecycle.worker_count", default_worker_count() as i64)?
            .set_default("lifecycle.channel_capacity", default_channel_capacity() as i64)?
            .set_default("lifecycle.max_orders_per_user", default_max_orders_per_user() as i64)?
            .set_default("lifecycle.eviction_grace_s", default_eviction_grace_s() as i64)?
            .set_default("risk.fail_policy", default_fail_policy())?
            .set_default("ws.send_buffer", default_send_buffer() as i64)?
            .set_default("ws.ping_interval_s", default_ping_interval_s() as i64)?
            .set_default("ws.pong_timeout_s", default_pong_timeout_s() as i64)?
            .set_default("ws.max_message_bytes", default_max_message_bytes() as i64)?
            .set_default("jwt_expiry_seconds", default_jwt_expiry_seconds() as i64)?
            .add_source(config::Environment::default().separator("__").try_parsing(true))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn get_trading_pairs(&self) -> Vec<String> {
        if self.trading_symbols.is_empty() {
            vec!["AAPL".to_string(), "MSFT".to_string()]
        } else {
            self.trading_symbols.clone()
        }
    }

    pub fn symbol_scale(&self, symbol: &str) -> SymbolScale {
        let default = self.matching.default_scale();
        match self.matching.symbols.get(symbol) {
            Some(over) => SymbolScale {
                price_scale: over.scale_price.unwrap_or(default.price_scale),
                quantity_scale: over.scale_qty.unwrap_or(default.quantity_scale),
            },
            None => default,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fail_policy_defaults_to_closed() {
        let settings = RiskSettings::default();
        assert_eq!(settings.fail_policy(), FailPolicy::Closed);
    }

    #[test]
    fn symbol_override_falls_back_to_default_scale() {
        let mut matching = MatchingConfig {
            scale_price: 4,
            scale_qty: 8,
            symbols: HashMap::new(),
        };
        matching.symbols.insert(
            "BTCUSD".to_string(),
            MatchingSymbolOverride {
                scale_price: Some(2),
                scale_qty: None,
            },
        );
        let config = AppConfig {
            environment: "test".to_string(),
            server: ServerConfig::default(),
            matching,
            lifecycle: LifecycleSettings::default(),
            risk: RiskSettings::default(),
            ws: WsSettings::default(),
            database_url: "postgres://localhost/test".to_string(),
            jwt_secret: "secret".to_string(),
            jwt_expiry_seconds: 3600,
            trading_symbols: Vec::new(),
        };
        let scale = config.symbol_scale("BTCUSD");
        assert_eq!(scale.price_scale, 2);
        assert_eq!(scale.quantity_scale, 8);
    }
}
