//! Exchange API: the capability trait and the Bybit REST client.

mod bybit_client;
mod error;
mod traits;
mod types;

pub use bybit_client::{BybitClient, BybitConfig};
pub use error::{ExchangeError, ExchangeResult};
pub use traits::Exchange;
