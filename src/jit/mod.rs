//! JIT Execution Module
//!
//! Purpose:
//!     Everything between "this pending swap is relevant" and "a flashloan
//!     transaction is on its way": sizing, profit, hedge quote, submission,
//!     and the per-pool orchestrator that sequences them.
//!
//! Author: AI-Generated
//! Created: 2026-02-04
//!
//! Architecture:
//!     sizing.rs       - tick range + liquidity + hedge amount for one swap
//!     profit.rs       - revenue/cost model in wrapped-native wei
//!     quoter.rs       - QuoterV2 hedge quote, slippage check
//!     submitter.rs    - flashloan calldata, simulate, sign, send
//!     relay.rs        - eth_sendPrivateTransaction with signed header
//!     orchestrator.rs - per-pool lanes, cancellation, decision cycle

pub mod orchestrator;
pub mod profit;
pub mod quoter;
pub mod relay;
pub mod sizing;
pub mod submitter;

pub use orchestrator::{CycleState, ExecutionOutcome, JitSettings, Orchestrator};
pub use profit::{fraction_to_ppm, PricingError, ProfitBreakdown, ProfitModel};
pub use quoter::{Quoter, RpcQuoter};
pub use relay::RelayClient;
pub use sizing::{plan_position, PositionPlan};
pub use submitter::{encode_flash_loan, FlashloanRequest, FlashloanSubmitter, SubmitError, Submitter};
