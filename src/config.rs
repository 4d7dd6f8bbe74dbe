//! Configuration management
//!
//! Loads the bot settings from a chain-specific .env file into an
//! immutable `BotConfig`, validated eagerly. Profit-model knobs may be
//! overridden by an optional TOML strategy file (`STRATEGY_FILE`).
//!
//! Author: AI-Generated
//! Created: 2026-01-28
//! Modified: 2026-02-05 - JIT settings, pure lookup constructor, strategy overrides
//!
//! Notes:
//!     - Amounts in TARGET_TOKENS / MIN_SWAP_AMOUNTS are raw token units
//!     - Fractions become parts-per-million, gwei becomes wei, here and only here
//!     - "Reset" means building a new value; nothing mutates after load

use alloy::primitives::{address, Address, B256, U256};
use alloy::signers::local::PrivateKeySigner;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::filters::TargetToken;
use crate::gas::FeeBounds;
use crate::jit::{fraction_to_ppm, JitSettings};
use crate::mempool::{IngestorConfig, ReconnectPolicy};
use crate::pool::address::UNISWAP_V3_POOL_INIT_CODE_HASH;
use crate::pool::calculator::parse_units;
use crate::rpc::{EndpointConfig, EndpointKind};
use crate::types::ExecutionMode;

// ── Mainnet defaults ──────────────────────────────────────────────────

pub const DEFAULT_FACTORY: Address = address!("1F98431c8aD98523631AE4a59f267346ea31F984");
pub const DEFAULT_QUOTER: Address = address!("61fFE014bA17989E743c5F6cB21bF9697530B21e");
pub const DEFAULT_VAULT: Address = address!("BA12222222228d8Ba445958a75a0704d566BF2C8");
pub const DEFAULT_WRAPPED_NATIVE: Address = address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2");
/// SwapRouter and SwapRouter02
pub const DEFAULT_ROUTERS: [Address; 2] = [
    address!("E592427A0AEce92De3Edee1F18E0157C05861564"),
    address!("68b3465833fb72A70ecDF485E0e4C7bD8665Fc45"),
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} not set")]
    Missing(&'static str),
    #[error("invalid {key}: {message}")]
    Invalid { key: &'static str, message: String },
    #[error("failed to read {path}: {message}")]
    Io { path: String, message: String },
    #[error("strategy file: {0}")]
    Strategy(String),
}

fn invalid(key: &'static str, message: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        key,
        message: message.to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub chain_id: u64,
    pub mode: ExecutionMode,
    /// Submission key; present whenever mode is live
    pub signer: Option<PrivateKeySigner>,
    pub rpc_endpoints: Vec<EndpointConfig>,

    // Addresses
    pub routers: Vec<Address>,
    pub factory: Address,
    pub pool_init_code_hash: B256,
    pub quoter: Address,
    pub vault: Address,
    pub receiver: Option<Address>,
    pub wrapped_native: Address,
    pub targets: HashMap<Address, TargetToken>,

    // Decision model
    pub min_profit_wei: U256,
    pub captured_fee_ppm: u32,
    pub inclusion_ppm: u32,
    pub flashloan_fee_bps: u32,
    pub fee_bounds: FeeBounds,
    pub gas_limit: u64,
    pub max_slippage_bps: u32,
    pub accept_zero_min_out: bool,

    // Timing
    pub candidate_ttl: Duration,
    pub pool_state_ttl: Duration,
    pub pool_cache_ttl: Duration,
    pub rpc_timeout: Duration,
    pub deadline_secs: u64,
    pub health_interval: Duration,

    // Relay
    pub relay_url: Option<String>,
    pub relay_signer: Option<PrivateKeySigner>,

    pub ingest: IngestorConfig,
}

// ── Strategy overrides (TOML) ─────────────────────────────────────────

/// `[profit]` table of the strategy file. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct StrategyFile {
    #[serde(default)]
    pub profit: ProfitOverrides,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ProfitOverrides {
    pub min_profit_eth: Option<String>,
    pub captured_fee_fraction: Option<String>,
    pub inclusion_probability: Option<String>,
    pub flashloan_fee_bps: Option<u32>,
    pub max_slippage_bps: Option<u32>,
    pub gas_limit: Option<u64>,
    pub accept_zero_min_out: Option<bool>,
}

impl StrategyFile {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Strategy(e.to_string()))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&text)
    }
}

// ── Field parsers ─────────────────────────────────────────────────────

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
    }

    fn require(&self, key: &'static str) -> Result<String, ConfigError> {
        self.get(key).ok_or(ConfigError::Missing(key))
    }

    fn parse<T>(&self, key: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: ToString,
    {
        match self.get(key) {
            Some(raw) => raw.parse::<T>().map_err(|e| invalid(key, e)),
            None => Ok(default),
        }
    }

    fn optional<T>(&self, key: &'static str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: ToString,
    {
        self.get(key)
            .map(|raw| raw.parse::<T>().map_err(|e| invalid(key, e)))
            .transpose()
    }

    fn bool(&self, key: &'static str, default: bool) -> Result<bool, ConfigError> {
        match self.get(key).map(|v| v.to_ascii_lowercase()) {
            None => Ok(default),
            Some(v) if ["1", "true", "yes", "on"].contains(&v.as_str()) => Ok(true),
            Some(v) if ["0", "false", "no", "off"].contains(&v.as_str()) => Ok(false),
            Some(v) => Err(invalid(key, format!("'{}' is not a boolean", v))),
        }
    }

    fn millis(&self, key: &'static str, default_ms: u64) -> Result<Duration, ConfigError> {
        self.parse(key, default_ms).map(Duration::from_millis)
    }

    fn address(&self, key: &'static str, default: Address) -> Result<Address, ConfigError> {
        self.parse(key, default)
    }

    fn signer(&self, key: &'static str) -> Result<Option<PrivateKeySigner>, ConfigError> {
        self.get(key)
            .map(|raw| {
                raw.parse::<PrivateKeySigner>()
                    .map_err(|_| invalid(key, "not a valid secp256k1 private key"))
            })
            .transpose()
    }
}

fn parse_address_list(key: &'static str, text: &str) -> Result<Vec<Address>, ConfigError> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| Address::from_str(s).map_err(|e| invalid(key, format!("{}: {}", s, e))))
        .collect()
}

/// "token:amount,token:amount" with raw integer amounts
fn parse_token_amounts(key: &'static str, text: &str) -> Result<Vec<(Address, U256)>, ConfigError> {
    let mut pairs = Vec::new();
    for entry in text.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (token, amount) = entry
            .split_once(':')
            .ok_or_else(|| invalid(key, format!("'{}' is not token:amount", entry)))?;
        let token = Address::from_str(token.trim()).map_err(|e| invalid(key, format!("{}: {}", token, e)))?;
        let amount = U256::from_str(amount.trim()).map_err(|e| invalid(key, format!("{}: {}", amount, e)))?;
        pairs.push((token, amount));
    }
    Ok(pairs)
}

fn decimal(key: &'static str, text: &str) -> Result<Decimal, ConfigError> {
    Decimal::from_str(text.trim()).map_err(|e| invalid(key, e))
}

fn ppm(key: &'static str, text: &str) -> Result<u32, ConfigError> {
    fraction_to_ppm(decimal(key, text)?).map_err(|e| invalid(key, e))
}

fn eth_to_wei(key: &'static str, text: &str) -> Result<U256, ConfigError> {
    parse_units(text.trim(), 18).map_err(|e| invalid(key, e))
}

// ── Loading ───────────────────────────────────────────────────────────

/// Load a .env-style file into the process environment and build the config.
pub fn load_config_from_file(path: &str) -> Result<BotConfig, ConfigError> {
    dotenv::from_filename(path).map_err(|e| ConfigError::Io {
        path: path.to_string(),
        message: e.to_string(),
    })?;
    let config = BotConfig::from_lookup(|key| std::env::var(key).ok())?;
    match std::env::var("STRATEGY_FILE").ok().filter(|p| !p.trim().is_empty()) {
        Some(strategy_path) => config.with_strategy(&StrategyFile::load(strategy_path.trim())?),
        None => Ok(config),
    }
}

impl BotConfig {
    /// Build from any key → value lookup. Pure; used by tests directly.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };

        let mode = if env.bool("DRY_RUN", true)? {
            ExecutionMode::DryRun
        } else {
            ExecutionMode::Live
        };

        let rpc_endpoints =
            EndpointConfig::parse_list(&env.require("RPC_ENDPOINTS")?).map_err(|e| invalid("RPC_ENDPOINTS", e))?;
        if rpc_endpoints.is_empty() {
            return Err(invalid("RPC_ENDPOINTS", "no endpoint listed"));
        }
        if !rpc_endpoints.iter().any(|e| e.kind() == EndpointKind::Http) {
            return Err(invalid("RPC_ENDPOINTS", "at least one http(s) endpoint is required"));
        }

        let routers = match env.get("ROUTERS") {
            Some(list) => parse_address_list("ROUTERS", &list)?,
            None => DEFAULT_ROUTERS.to_vec(),
        };
        if routers.is_empty() {
            return Err(invalid("ROUTERS", "no router listed"));
        }

        let mut targets: HashMap<Address, TargetToken> = HashMap::new();
        for (token, borrow_amount) in parse_token_amounts("TARGET_TOKENS", &env.require("TARGET_TOKENS")?)? {
            if borrow_amount.is_zero() {
                return Err(invalid("TARGET_TOKENS", format!("zero borrow amount for {}", token)));
            }
            targets.insert(
                token,
                TargetToken {
                    borrow_amount,
                    min_swap_amount: U256::ZERO,
                },
            );
        }
        if targets.is_empty() {
            return Err(invalid("TARGET_TOKENS", "no target token listed"));
        }
        if let Some(list) = env.get("MIN_SWAP_AMOUNTS") {
            for (token, min) in parse_token_amounts("MIN_SWAP_AMOUNTS", &list)? {
                let target = targets
                    .get_mut(&token)
                    .ok_or_else(|| invalid("MIN_SWAP_AMOUNTS", format!("{} is not a target token", token)))?;
                target.min_swap_amount = min;
            }
        }

        let fee_bounds = FeeBounds::from_gwei(
            env.optional::<Decimal>("MIN_PRIORITY_FEE_GWEI")?,
            env.optional::<Decimal>("MAX_PRIORITY_FEE_GWEI")?,
            env.parse("PRIORITY_FEE_GWEI", Decimal::ONE)?,
            env.optional::<Decimal>("MAX_PRIORITY_FEE_CAP_GWEI")?,
            env.parse("BASE_FEE_MULTIPLIER", Decimal::TWO)?,
        )
        .map_err(|e| invalid("priority fee bounds", e))?;

        let max_slippage_bps: u32 = env.parse("MAX_SLIPPAGE_BPS", 50)?;
        if max_slippage_bps > 10_000 {
            return Err(invalid("MAX_SLIPPAGE_BPS", "above 10000"));
        }
        let health_secs: u64 = env.parse("HEALTH_INTERVAL_SECS", 30)?;
        if health_secs == 0 {
            return Err(invalid("HEALTH_INTERVAL_SECS", "must be positive"));
        }
        let health_interval = Duration::from_secs(health_secs);

        let relay_url = env.get("RELAY_URL");
        let relay_signer = env.signer("RELAY_SIGNING_KEY")?;
        if relay_url.is_some() && relay_signer.is_none() {
            return Err(ConfigError::Missing("RELAY_SIGNING_KEY"));
        }

        let signer = env.signer("PRIVATE_KEY")?;
        let receiver = env.optional::<Address>("RECEIVER_CONTRACT")?;
        if mode.is_live() {
            if signer.is_none() {
                return Err(ConfigError::Missing("PRIVATE_KEY"));
            }
            if receiver.is_none() {
                return Err(ConfigError::Missing("RECEIVER_CONTRACT"));
            }
        }

        let defaults = ReconnectPolicy::default();
        let policy = ReconnectPolicy {
            max_failures: env.parse("MEMPOOL_MAX_FAILURES", defaults.max_failures)?.max(1),
            backoff_base: env.millis("MEMPOOL_BACKOFF_BASE_MS", 500)?,
            backoff_max: env.millis("MEMPOOL_BACKOFF_MAX_MS", 30_000)?,
            poll_interval: env.millis("MEMPOOL_POLL_INTERVAL_MS", 1_000)?,
            idle_retry: env.millis("MEMPOOL_IDLE_RETRY_MS", 60_000)?,
        };
        let ingest = IngestorConfig {
            policy,
            dedup_capacity: env.parse("MEMPOOL_DEDUP_CAPACITY", IngestorConfig::default().dedup_capacity)?,
            ..IngestorConfig::default()
        };

        Ok(Self {
            chain_id: env.parse("CHAIN_ID", 1u64)?,
            mode,
            signer,
            rpc_endpoints,
            routers,
            factory: env.address("V3_FACTORY", DEFAULT_FACTORY)?,
            pool_init_code_hash: env.parse("POOL_INIT_CODE_HASH", UNISWAP_V3_POOL_INIT_CODE_HASH)?,
            quoter: env.address("QUOTER", DEFAULT_QUOTER)?,
            vault: env.address("FLASHLOAN_VAULT", DEFAULT_VAULT)?,
            receiver,
            wrapped_native: env.address("WRAPPED_NATIVE", DEFAULT_WRAPPED_NATIVE)?,
            targets,
            min_profit_wei: eth_to_wei("MIN_PROFIT_ETH", &env.get("MIN_PROFIT_ETH").unwrap_or_else(|| "0.01".into()))?,
            captured_fee_ppm: ppm(
                "CAPTURED_FEE_FRACTION",
                &env.get("CAPTURED_FEE_FRACTION").unwrap_or_else(|| "0.5".into()),
            )?,
            inclusion_ppm: ppm(
                "INCLUSION_PROBABILITY",
                &env.get("INCLUSION_PROBABILITY").unwrap_or_else(|| "0.8".into()),
            )?,
            flashloan_fee_bps: env.parse("FLASHLOAN_FEE_BPS", 0)?,
            fee_bounds,
            gas_limit: env.parse("GAS_LIMIT", 400_000)?,
            max_slippage_bps,
            accept_zero_min_out: env.bool("ACCEPT_ZERO_MIN_OUT", false)?,
            candidate_ttl: env.millis("CANDIDATE_TTL_MS", 12_000)?,
            pool_state_ttl: env.millis("POOL_STATE_TTL_MS", 2_000)?,
            pool_cache_ttl: env.millis("POOL_CACHE_TTL_MS", 250)?,
            rpc_timeout: env.millis("RPC_TIMEOUT_MS", 1_500)?,
            deadline_secs: env.parse("DEADLINE_SECS", 24)?,
            health_interval,
            relay_url,
            relay_signer,
            ingest,
        })
    }

    /// Apply strategy-file overrides, returning a new value.
    pub fn with_strategy(self, strategy: &StrategyFile) -> Result<Self, ConfigError> {
        let p = &strategy.profit;
        let mut next = self;
        if let Some(v) = &p.min_profit_eth {
            next.min_profit_wei = eth_to_wei("min_profit_eth", v)?;
        }
        if let Some(v) = &p.captured_fee_fraction {
            next.captured_fee_ppm = ppm("captured_fee_fraction", v)?;
        }
        if let Some(v) = &p.inclusion_probability {
            next.inclusion_ppm = ppm("inclusion_probability", v)?;
        }
        if let Some(v) = p.max_slippage_bps {
            if v > 10_000 {
                return Err(invalid("max_slippage_bps", "above 10000"));
            }
            next.max_slippage_bps = v;
        }
        next.flashloan_fee_bps = p.flashloan_fee_bps.unwrap_or(next.flashloan_fee_bps);
        next.gas_limit = p.gas_limit.unwrap_or(next.gas_limit);
        next.accept_zero_min_out = p.accept_zero_min_out.unwrap_or(next.accept_zero_min_out);
        Ok(next)
    }

    pub fn jit_settings(&self) -> Result<JitSettings, ConfigError> {
        let chrono_of = |key: &'static str, d: Duration| {
            chrono::Duration::from_std(d).map_err(|e| invalid(key, e))
        };
        Ok(JitSettings {
            mode: self.mode,
            wrapped_native: self.wrapped_native,
            min_profit_wei: self.min_profit_wei,
            captured_fee_ppm: self.captured_fee_ppm,
            inclusion_ppm: self.inclusion_ppm,
            flashloan_fee_bps: self.flashloan_fee_bps,
            gas_limit: self.gas_limit,
            max_slippage_bps: self.max_slippage_bps,
            accept_zero_min_out: self.accept_zero_min_out,
            candidate_ttl: chrono_of("CANDIDATE_TTL_MS", self.candidate_ttl)?,
            pool_state_ttl: chrono_of("POOL_STATE_TTL_MS", self.pool_state_ttl)?,
            rpc_timeout: self.rpc_timeout,
            deadline_secs: self.deadline_secs,
        })
    }
}
