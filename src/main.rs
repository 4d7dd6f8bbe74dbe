//! JIT Liquidity Bot
//!
//! Main entry point. Streams pending transactions from the mempool
//! ingestor, filters them down to relevant V3 swaps, and hands each one to
//! the orchestrator, which decides per pool whether to provide JIT
//! liquidity around the swap.
//!
//! Architecture:
//! - Weighted endpoint pool shared by pool sync, base fee, quoter, submission
//! - Ingestor: WS pending-tx subscription, falls back to HTTP filter polling
//! - Handoff loop: filter → dispatch (one lane per pool, newer supersedes)
//! - Dry-run unless DRY_RUN=false; live mode signs and submits flashloans
//! - Health line every HEALTH_INTERVAL_SECS, graceful stop on SIGINT/SIGTERM
//!
//! Author: AI-Generated
//! Created: 2026-01-27
//! Modified: 2026-02-05 - JIT pipeline, alloy endpoint pool, ingestor handoff

use anyhow::{Context, Result};
use clap::Parser;
use futures::StreamExt;
use jit_liquidity_bot::config::{load_config_from_file, BotConfig};
use jit_liquidity_bot::filters::RelevanceFilter;
use jit_liquidity_bot::gas::{GasStrategist, RpcBaseFeeSource};
use jit_liquidity_bot::jit::{FlashloanSubmitter, Orchestrator, RelayClient, RpcQuoter, Submitter};
use jit_liquidity_bot::mempool::{HttpPollTransport, MempoolIngestor, PollTransport, PushTransport, WsPushTransport};
use jit_liquidity_bot::pool::{PoolRegistry, V3PoolSyncer};
use jit_liquidity_bot::rpc::EndpointPool;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook_tokio::Signals;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// JIT liquidity bot for Uniswap V3 style pools
#[derive(Parser)]
#[command(name = "jit-bot")]
struct Args {
    /// .env-style configuration file
    #[arg(short, long, env = "ENV_FILE", default_value = ".env")]
    env_file: String,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").map(|f| f.eq_ignore_ascii_case("json")).unwrap_or(false);
    if json {
        fmt().with_env_filter(filter).with_target(false).json().init();
    } else {
        fmt().with_env_filter(filter).with_target(false).init();
    }
}

#[tokio::main]
async fn main() {
    init_logging();
    let args = Args::parse();

    let config = match load_config_from_file(&args.env_file) {
        Ok(config) => config,
        Err(e) => {
            error!(file = %args.env_file, error = %e, "Configuration rejected");
            std::process::exit(2);
        }
    };

    if let Err(e) = run(config).await {
        error!(error = %format!("{:#}", e), "Fatal error");
        std::process::exit(1);
    }
}

async fn run(config: BotConfig) -> Result<()> {
    info!(
        chain_id = config.chain_id,
        mode = %config.mode,
        endpoints = config.rpc_endpoints.len(),
        targets = config.targets.len(),
        relay = config.relay_url.is_some(),
        "JIT Liquidity Bot starting"
    );

    let endpoints = Arc::new(EndpointPool::new(&config.rpc_endpoints)?);
    info!(
        http = endpoints.http_count(),
        ws = endpoints.push_urls().len(),
        "RPC endpoint pool ready"
    );
    let settings = config.jit_settings()?;

    // ── Collaborators ──
    let gas = GasStrategist::new(
        Arc::new(RpcBaseFeeSource::new(Arc::clone(&endpoints))),
        config.fee_bounds.clone(),
    );
    let pool_cache_ttl = chrono::Duration::from_std(config.pool_cache_ttl).context("POOL_CACHE_TTL_MS")?;
    let syncer = Arc::new(V3PoolSyncer::new(Arc::clone(&endpoints), PoolRegistry::new(), pool_cache_ttl));
    let quoter = Arc::new(RpcQuoter::new(Arc::clone(&endpoints), config.quoter));

    let submitter: Option<Arc<dyn Submitter>> = match (&config.signer, config.receiver, config.mode.is_live()) {
        (Some(signer), Some(receiver), true) => {
            let relay = match (&config.relay_url, &config.relay_signer) {
                (Some(url), Some(relay_signer)) => {
                    Some(RelayClient::new(url.clone(), relay_signer.clone(), config.rpc_timeout))
                }
                _ => None,
            };
            let submitter = FlashloanSubmitter::new(
                Arc::clone(&endpoints),
                signer.clone(),
                config.chain_id,
                config.vault,
                receiver,
                relay,
            );
            info!(from = %submitter.address(), vault = %config.vault, %receiver, "Live submission enabled");
            Some(Arc::new(submitter) as Arc<dyn Submitter>)
        }
        _ => None,
    };

    let filter = RelevanceFilter::new(
        config.routers.iter().copied(),
        config.targets.clone(),
        config.factory,
        config.pool_init_code_hash,
    );
    let orchestrator = Arc::new(Orchestrator::new(settings, filter, syncer.clone(), gas, quoter, submitter)?);

    // ── Ingestor ──
    let push = WsPushTransport::new(endpoints.push_urls().to_vec()).map(|t| Arc::new(t) as Arc<dyn PushTransport>);
    let poll = endpoints
        .primary_http()
        .map(|(url, provider)| Arc::new(HttpPollTransport::new(url, provider)) as Arc<dyn PollTransport>);
    if push.is_none() {
        warn!("No WebSocket endpoint configured, mempool will start in polling mode");
    }

    let cancel = CancellationToken::new();
    let ingestor = MempoolIngestor::new(push, poll, config.ingest);
    let (mut stream, health, ingest_task) = ingestor.start(cancel.clone());

    // ── Shutdown signals ──
    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    let signals_handle = signals.handle();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if let Some(sig) = signals.next().await {
            info!(signal = sig, "Shutdown signal received");
            shutdown.cancel();
        }
    });

    // ── Handoff loop ──
    let mut health_tick = tokio::time::interval(config.health_interval);
    let mut seen: u64 = 0;
    let mut dispatched: u64 = 0;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = health_tick.tick() => {
                let report = serde_json::to_string(&health.report()).unwrap_or_default();
                let evicted = syncer.registry().evict_stale(pool_cache_ttl, chrono::Utc::now());
                let (pools, snapshots, tokens) = syncer.registry().stats();
                info!(status = %report, seen, dispatched, pools, snapshots, tokens, evicted, "Health");
            }
            next = stream.next() => match next {
                Some(tx) => {
                    seen += 1;
                    if orchestrator.on_pending(&tx).is_some() {
                        dispatched += 1;
                    }
                }
                None => {
                    warn!("Mempool stream closed");
                    break;
                }
            },
        }
    }

    cancel.cancel();
    signals_handle.close();
    if let Err(e) = ingest_task.await {
        warn!(error = %e, "Ingestor task ended abnormally");
    }
    info!(seen, dispatched, "JIT Liquidity Bot stopped");
    Ok(())
}
