//! Execution Orchestrator
//!
//! Purpose:
//!     Runs one decision cycle per relevant pending swap:
//!     IDLE → CANDIDATE_DETECTED → PRICED → DECIDED → SUBMITTED | SIMULATED.
//!     Fetches fresh pool state, sizes the JIT position, prices gas, checks
//!     expected profit and hedge slippage, and either records the decision
//!     (dry-run) or submits the flashloan (live).
//!
//! Author: AI-Generated
//! Created: 2026-02-05
//!
//! Concurrency:
//!     - One lane per pool: generation counter, async gate, cancel token
//!     - dispatch() bumps the generation and cancels the previous token, so
//!       an older cycle abandons itself at its next network boundary
//!     - every network call is raced against cancellation and a timeout
//!     - submission itself is not cancellable once started
//!
//! Notes:
//!     - Never retries. A timeout or transport failure is a rejection.
//!     - Each cycle logs exactly one decision line.

use alloy::primitives::{Address, TxHash, I256, U256};
use anyhow::{bail, Result};
use chrono::Utc;
use dashmap::DashMap;
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::profit::{PricingError, ProfitBreakdown, ProfitModel};
use super::quoter::{min_out, slippage_bps, Quoter};
use super::sizing::{plan_position, PositionPlan};
use super::submitter::{FlashloanRequest, Submitter};
use crate::filters::{Candidate, RelevanceFilter};
use crate::gas::{cost_of, GasStrategist};
use crate::mempool::PendingTransaction;
use crate::pool::calculator::quote_at_sqrt_price;
use crate::pool::PoolSource;
use crate::types::{DecisionReason, ExecutionDecision, ExecutionMode, GasEstimate};

// ── Settings ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct JitSettings {
    pub mode: ExecutionMode,
    pub wrapped_native: Address,
    /// Wei of the wrapped native token
    pub min_profit_wei: U256,
    pub captured_fee_ppm: u32,
    pub inclusion_ppm: u32,
    pub flashloan_fee_bps: u32,
    pub gas_limit: u64,
    pub max_slippage_bps: u32,
    /// Proceed with hedgeMinOut = 0 when the quoter fails
    pub accept_zero_min_out: bool,
    pub candidate_ttl: chrono::Duration,
    pub pool_state_ttl: chrono::Duration,
    /// Deadline for every network call inside a cycle
    pub rpc_timeout: Duration,
    /// Added to wall-clock time for the receiver's mint deadline
    pub deadline_secs: u64,
}

impl JitSettings {
    pub fn profit_model(&self) -> ProfitModel {
        ProfitModel {
            wrapped_native: self.wrapped_native,
            captured_fee_ppm: self.captured_fee_ppm,
            inclusion_ppm: self.inclusion_ppm,
            flashloan_fee_bps: self.flashloan_fee_bps,
        }
    }
}

// ── Cycle bookkeeping ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleState {
    Idle,
    CandidateDetected,
    Priced,
    Decided,
    Submitted,
    Simulated,
}

/// What one cycle concluded
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionOutcome {
    pub target_tx: TxHash,
    pub pool: Address,
    pub decision: ExecutionDecision,
    pub final_state: CycleState,
    pub submitted_tx: Option<TxHash>,
    pub plan: Option<PositionPlan>,
}

struct Rejected {
    reason: DecisionReason,
    expected_profit: I256,
    plan: Option<PositionPlan>,
}

impl Rejected {
    fn new(reason: DecisionReason) -> Self {
        Self {
            reason,
            expected_profit: I256::ZERO,
            plan: None,
        }
    }

    fn with_plan(mut self, plan: &PositionPlan) -> Self {
        self.plan = Some(plan.clone());
        self
    }

    fn with_profit(mut self, profit: I256) -> Self {
        self.expected_profit = profit;
        self
    }
}

struct Approved {
    plan: PositionPlan,
    breakdown: ProfitBreakdown,
    gas: GasEstimate,
    hedge_min_out: U256,
}

enum Interrupted {
    Superseded,
    TimedOut,
}

struct PoolLane {
    generation: AtomicU64,
    gate: tokio::sync::Mutex<()>,
    cancel: Mutex<CancellationToken>,
}

impl PoolLane {
    fn new() -> Self {
        Self {
            generation: AtomicU64::new(0),
            gate: tokio::sync::Mutex::new(()),
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    fn current(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

/// The running cycle's view of its lane
struct CycleGuard<'a> {
    lane: &'a PoolLane,
    generation: u64,
    token: &'a CancellationToken,
    timeout: Duration,
}

impl CycleGuard<'_> {
    fn superseded(&self) -> bool {
        self.token.is_cancelled() || self.lane.current() != self.generation
    }

    async fn call<T>(&self, fut: impl Future<Output = T>) -> Result<T, Interrupted> {
        let result = tokio::select! {
            biased;
            _ = self.token.cancelled() => return Err(Interrupted::Superseded),
            r = tokio::time::timeout(self.timeout, fut) => r,
        };
        if self.superseded() {
            return Err(Interrupted::Superseded);
        }
        result.map_err(|_| Interrupted::TimedOut)
    }
}

fn interrupted(on_timeout: DecisionReason) -> impl Fn(Interrupted) -> Rejected {
    move |i| match i {
        Interrupted::Superseded => Rejected::new(DecisionReason::Superseded),
        Interrupted::TimedOut => Rejected::new(on_timeout),
    }
}

// ── Orchestrator ──────────────────────────────────────────────────────

pub struct Orchestrator {
    settings: JitSettings,
    profit: ProfitModel,
    filter: RelevanceFilter,
    pools: Arc<dyn PoolSource>,
    gas: GasStrategist,
    quoter: Arc<dyn Quoter>,
    submitter: Option<Arc<dyn Submitter>>,
    lanes: DashMap<Address, Arc<PoolLane>>,
}

impl Orchestrator {
    pub fn new(
        settings: JitSettings,
        filter: RelevanceFilter,
        pools: Arc<dyn PoolSource>,
        gas: GasStrategist,
        quoter: Arc<dyn Quoter>,
        submitter: Option<Arc<dyn Submitter>>,
    ) -> Result<Self> {
        if settings.mode.is_live() && submitter.is_none() {
            bail!("live mode requires a submitter");
        }
        info!(
            mode = %settings.mode,
            min_profit_wei = %settings.min_profit_wei,
            max_slippage_bps = settings.max_slippage_bps,
            gas_limit = settings.gas_limit,
            "Orchestrator ready"
        );
        Ok(Self {
            profit: settings.profit_model(),
            settings,
            filter,
            pools,
            gas,
            quoter,
            submitter,
            lanes: DashMap::new(),
        })
    }

    /// Filter a pending transaction and dispatch it when relevant.
    pub fn on_pending(self: &Arc<Self>, tx: &PendingTransaction) -> Option<JoinHandle<ExecutionOutcome>> {
        match self.filter.evaluate(tx) {
            Ok(candidate) => Some(self.dispatch(candidate)),
            Err(rejection) => {
                debug!(
                    target_tx = %tx.hash,
                    reason = %DecisionReason::NotRelevant,
                    detail = %rejection,
                    "JIT decision"
                );
                None
            }
        }
    }

    /// Start a cycle for `candidate`, superseding any older cycle on the
    /// same pool.
    pub fn dispatch(self: &Arc<Self>, candidate: Candidate) -> JoinHandle<ExecutionOutcome> {
        let pool = candidate.pool.address;
        // bump under the shard lock so a finishing cycle cannot drop a lane
        // that was just claimed
        let (lane, generation) = {
            let entry = self.lanes.entry(pool).or_insert_with(|| Arc::new(PoolLane::new()));
            let generation = entry.generation.fetch_add(1, Ordering::SeqCst) + 1;
            (Arc::clone(entry.value()), generation)
        };
        let token = CancellationToken::new();
        {
            let mut slot = lane.cancel.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            let previous = std::mem::replace(&mut *slot, token.clone());
            previous.cancel();
        }
        debug!(pool = %candidate.pool.address, tx = %candidate.tx.hash, generation, "Cycle dispatched");

        let this = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = this.run_lane(&lane, generation, &token, &candidate).await;
            this.log_decision(&candidate, &outcome);
            this.lanes.remove_if(&pool, |_, l| l.current() == generation);
            outcome
        })
    }

    async fn run_lane(
        &self,
        lane: &PoolLane,
        generation: u64,
        token: &CancellationToken,
        candidate: &Candidate,
    ) -> ExecutionOutcome {
        let _gate = tokio::select! {
            biased;
            _ = token.cancelled() => {
                return self.rejected(candidate, Rejected::new(DecisionReason::Superseded));
            }
            gate = lane.gate.lock() => gate,
        };
        let guard = CycleGuard {
            lane,
            generation,
            token,
            timeout: self.settings.rpc_timeout,
        };
        if guard.superseded() {
            return self.rejected(candidate, Rejected::new(DecisionReason::Superseded));
        }

        match self.evaluate(&guard, candidate).await {
            Err(rejected) => self.rejected(candidate, rejected),
            Ok(approved) => self.act(&guard, candidate, approved).await,
        }
    }

    async fn evaluate(&self, guard: &CycleGuard<'_>, candidate: &Candidate) -> Result<Approved, Rejected> {
        let mut state = CycleState::Idle;
        transition(&mut state, CycleState::CandidateDetected, candidate);

        let now = Utc::now();
        if candidate.tx.age(now) > self.settings.candidate_ttl {
            return Err(Rejected::new(DecisionReason::Expired));
        }

        // ── Pool state ──
        let pool = guard
            .call(self.pools.pool_state(candidate.pool.address))
            .await
            .map_err(interrupted(DecisionReason::PoolStateUnavailable))?
            .map_err(|e| {
                warn!(pool = %candidate.pool.address, error = %e, "Pool state fetch failed");
                Rejected::new(DecisionReason::PoolStateUnavailable)
            })?;
        if pool.token0 != candidate.pool.token0 || pool.token1 != candidate.pool.token1 {
            warn!(pool = %pool.address, "Pool tokens do not match the derived key");
            return Err(Rejected::new(DecisionReason::PoolStateUnavailable));
        }
        if pool.age(Utc::now()) > self.settings.pool_state_ttl {
            return Err(Rejected::new(DecisionReason::StalePoolState));
        }
        if pool.liquidity == 0 {
            return Err(Rejected::new(DecisionReason::SizingFailed));
        }

        // ── Sizing ──
        let intent = &candidate.intent;
        let plan = plan_position(
            &pool,
            intent.amount_in,
            candidate.zero_for_one,
            candidate.borrow_token,
            candidate.borrow_amount,
        )
        .map_err(|e| {
            debug!(pool = %pool.address, error = %e, "Sizing failed");
            Rejected::new(DecisionReason::SizingFailed)
        })?;
        self.profit
            .to_native(&pool, intent.token_in, U256::ZERO)
            .map_err(|_| Rejected::new(DecisionReason::Unpriceable).with_plan(&plan))?;

        // ── Gas ──
        let gas = guard
            .call(self.gas.estimate())
            .await
            .map_err(|i| interrupted(DecisionReason::GasUnavailable)(i).with_plan(&plan))?
            .map_err(|e| {
                warn!(error = %e, "Gas estimate unavailable");
                Rejected::new(DecisionReason::GasUnavailable).with_plan(&plan)
            })?;
        let gas_cost = cost_of(&gas, self.settings.gas_limit);

        let breakdown = self
            .profit
            .evaluate(
                &pool,
                intent.token_in,
                intent.amount_in,
                candidate.borrow_token,
                candidate.borrow_amount,
                gas_cost.expected_cost_wei,
            )
            .map_err(|e| match e {
                PricingError::Unpriceable { .. } => Rejected::new(DecisionReason::Unpriceable),
                PricingError::Math(_) => Rejected::new(DecisionReason::SizingFailed),
            }.with_plan(&plan))?;
        transition(&mut state, CycleState::Priced, candidate);
        let profit = breakdown.expected_profit;

        let min_profit = I256::try_from(self.settings.min_profit_wei).unwrap_or(I256::MAX);
        if profit < min_profit {
            return Err(Rejected::new(DecisionReason::BelowMinProfit)
                .with_plan(&plan)
                .with_profit(profit));
        }

        // ── Hedge quote ──
        let borrow_is_token0 = candidate.borrow_token == pool.token0;
        let ideal_out = quote_at_sqrt_price(plan.hedge_amount_in, pool.sqrt_price_x96, borrow_is_token0)
            .map_err(|_| Rejected::new(DecisionReason::SizingFailed).with_plan(&plan).with_profit(profit))?;
        let quote = guard
            .call(self.quoter.quote_exact_input_single(
                plan.borrow_token,
                plan.hedge_token_out,
                pool.fee,
                plan.hedge_amount_in,
            ))
            .await;
        let quote = match quote {
            Err(Interrupted::Superseded) => {
                return Err(Rejected::new(DecisionReason::Superseded).with_plan(&plan).with_profit(profit))
            }
            Err(Interrupted::TimedOut) => Err("quote timed out".to_string()),
            Ok(result) => result.map_err(|e| format!("{:#}", e)),
        };
        let hedge_min_out = match quote {
            Ok(quoted) => {
                let slippage = slippage_bps(ideal_out, quoted);
                if slippage > self.settings.max_slippage_bps {
                    debug!(%ideal_out, %quoted, slippage, "Hedge slippage above maximum");
                    return Err(Rejected::new(DecisionReason::SlippageExceeded)
                        .with_plan(&plan)
                        .with_profit(profit));
                }
                min_out(quoted, self.settings.max_slippage_bps)
            }
            Err(error) if self.settings.accept_zero_min_out => {
                warn!(%error, "Hedge quote failed, proceeding with zero minimum output");
                U256::ZERO
            }
            Err(error) => {
                warn!(%error, "Hedge quote failed");
                return Err(Rejected::new(DecisionReason::QuoteFailed)
                    .with_plan(&plan)
                    .with_profit(profit));
            }
        };

        transition(&mut state, CycleState::Decided, candidate);
        Ok(Approved {
            plan,
            breakdown,
            gas,
            hedge_min_out,
        })
    }

    async fn act(&self, guard: &CycleGuard<'_>, candidate: &Candidate, approved: Approved) -> ExecutionOutcome {
        let mode = self.settings.mode;
        let profit = approved.breakdown.expected_profit;
        let submitter = match (&self.submitter, mode) {
            (Some(submitter), ExecutionMode::Live) => submitter,
            _ => {
                return ExecutionOutcome {
                    target_tx: candidate.tx.hash,
                    pool: candidate.pool.address,
                    decision: ExecutionDecision::proceed(profit, mode),
                    final_state: CycleState::Simulated,
                    submitted_tx: None,
                    plan: Some(approved.plan),
                };
            }
        };

        if guard.superseded() {
            return self.rejected(
                candidate,
                Rejected::new(DecisionReason::Superseded)
                    .with_plan(&approved.plan)
                    .with_profit(profit),
            );
        }

        let request = FlashloanRequest {
            target_tx: candidate.tx.hash,
            deadline: u64::try_from(Utc::now().timestamp()).unwrap_or_default() + self.settings.deadline_secs,
            plan: approved.plan,
            hedge_min_out: approved.hedge_min_out,
            gas: approved.gas,
            gas_limit: self.settings.gas_limit,
        };
        let submitted = tokio::time::timeout(self.settings.rpc_timeout, submitter.submit(&request)).await;
        match submitted {
            Ok(Ok(hash)) => ExecutionOutcome {
                target_tx: candidate.tx.hash,
                pool: candidate.pool.address,
                decision: ExecutionDecision::proceed(profit, mode),
                final_state: CycleState::Submitted,
                submitted_tx: Some(hash),
                plan: Some(request.plan),
            },
            failed => {
                let error = match failed {
                    Ok(Err(e)) => e.to_string(),
                    _ => "submission timed out".to_string(),
                };
                warn!(target_tx = %candidate.tx.hash, %error, "Submission failed, candidate discarded");
                self.rejected(
                    candidate,
                    Rejected::new(DecisionReason::SubmissionFailed)
                        .with_plan(&request.plan)
                        .with_profit(profit),
                )
            }
        }
    }

    fn rejected(&self, candidate: &Candidate, rejected: Rejected) -> ExecutionOutcome {
        ExecutionOutcome {
            target_tx: candidate.tx.hash,
            pool: candidate.pool.address,
            decision: ExecutionDecision::reject(rejected.reason, rejected.expected_profit, self.settings.mode),
            final_state: CycleState::Decided,
            submitted_tx: None,
            plan: rejected.plan,
        }
    }

    fn log_decision(&self, candidate: &Candidate, outcome: &ExecutionOutcome) {
        let decision = &outcome.decision;
        let range = outcome.plan.as_ref().map(|p| p.range.to_string()).unwrap_or_default();
        let range_width = outcome.plan.as_ref().map(|p| p.range.width()).unwrap_or_default();
        let impact = outcome.plan.as_ref().map(|p| p.price_impact_pct).unwrap_or_default();
        info!(
            target_tx = %candidate.tx.hash,
            pool = %candidate.pool.address,
            swap = %candidate.intent.function_name,
            proceed = decision.proceed,
            reason = %decision.reason,
            expected_profit_wei = %decision.expected_profit,
            mode = %decision.mode,
            state = ?outcome.final_state,
            range = %range,
            range_width,
            price_impact_pct = impact,
            submitted_tx = ?outcome.submitted_tx,
            "JIT decision"
        );
    }
}

fn transition(state: &mut CycleState, next: CycleState, candidate: &Candidate) {
    debug!(tx = %candidate.tx.hash, from = ?*state, to = ?next, "Cycle transition");
    *state = next;
}
