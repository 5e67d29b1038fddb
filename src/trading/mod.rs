//! Trading logic: runtime parameters and the rebalancing decision.

mod config;
mod strategy;

pub use config::{Credentials, Params};
pub use strategy::{
    decide, effective_leverage, percent3, roe, round3, Decision, HoldReason, TickInputs,
};
