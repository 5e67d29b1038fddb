//! Position models: the exchange-reported size and the locally predicted size.

use std::fmt;

use rust_decimal::Decimal;
use serde::Serialize;

/// Signed position size in contracts (quote currency units).
///
/// Positive is long, negative is short, zero is flat. Always re-derived from
/// the exchange; never accumulated across ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize)]
pub struct Position(pub Decimal);

impl Position {
    pub const FLAT: Position = Position(Decimal::ZERO);

    /// Build a signed position from an exchange side label and unsigned size.
    ///
    /// `Buy` maps to a long, `Sell` to a short, anything else is flat.
    pub fn from_side(side: &str, size: Decimal) -> Self {
        match side {
            "Buy" => Position(size.abs()),
            "Sell" => Position(-size.abs()),
            _ => Position::FLAT,
        }
    }

    pub fn size(&self) -> Decimal {
        self.0
    }

    pub fn is_flat(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_long(&self) -> bool {
        self.0 > Decimal::ZERO
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Phase of the rebalancing loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionState {
    Startup,
    Flat,
    Leveraged,
    TargetReached,
}

impl PositionState {
    /// Classify a freshly read position.
    pub fn of(position: Position) -> Self {
        if position.is_flat() {
            PositionState::Flat
        } else {
            PositionState::Leveraged
        }
    }
}

impl fmt::Display for PositionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PositionState::Startup => "STARTUP",
            PositionState::Flat => "FLAT",
            PositionState::Leveraged => "LEVERAGED",
            PositionState::TargetReached => "TARGET_REACHED",
        };
        f.write_str(name)
    }
}

/// Position as read from the exchange plus what was bought locally this tick.
///
/// The prediction is only used for the status line. The next tick replaces
/// it with a fresh exchange read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictedPosition {
    /// Size reported by the exchange at the start of the tick
    pub reported: Position,

    /// Sum of buy quantities placed since that read
    pub filled_locally: Decimal,
}

impl PredictedPosition {
    pub fn new(reported: Position) -> Self {
        Self {
            reported,
            filled_locally: Decimal::ZERO,
        }
    }

    /// Record an order placed this tick.
    pub fn record_buy(&mut self, qty: Decimal) {
        self.filled_locally += qty;
    }

    /// Predicted size after the locally placed orders fill.
    pub fn predicted(&self) -> Decimal {
        self.reported.size() + self.filled_locally
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_from_side() {
        assert_eq!(Position::from_side("Buy", dec!(3000)).size(), dec!(3000));
        assert_eq!(Position::from_side("Sell", dec!(3000)).size(), dec!(-3000));
        assert!(Position::from_side("None", dec!(0)).is_flat());
        assert!(Position::from_side("", dec!(10)).is_flat());
    }

    #[test]
    fn test_state_classification() {
        assert_eq!(PositionState::of(Position::FLAT), PositionState::Flat);
        assert_eq!(PositionState::of(Position(dec!(-5))), PositionState::Leveraged);
        assert_eq!(PositionState::TargetReached.to_string(), "TARGET_REACHED");
    }

    #[test]
    fn test_predicted_position() {
        let mut predicted = PredictedPosition::new(Position(dec!(3000)));
        assert_eq!(predicted.predicted(), dec!(3000));

        predicted.record_buy(dec!(10));
        assert_eq!(predicted.predicted(), dec!(3010));
        assert_eq!(predicted.reported.size(), dec!(3000));
    }
}
