//! Data models for market snapshots, positions, and orders.

mod order;
mod position;
mod ticker;

pub use order::{CancelledOrder, OrderKind, OrderRequest, OrderResult, OrderSide};
pub use position::{Position, PositionState, PredictedPosition};
pub use ticker::Ticker;
