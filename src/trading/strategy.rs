//! Rebalancing decision logic.
//!
//! Pure arithmetic over one tick's inputs: the loop feeds in freshly read
//! params, ticker, balance and position and acts on the returned decision.

use anyhow::{bail, Result};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::models::{OrderSide, Position};

use super::config::Params;

/// What the loop should do this tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Flat: open a position of `lot` contracts.
    Open { lot: Decimal },

    /// Leveraged and below target leverage: add one increment.
    Add { qty: Decimal },

    /// Target price reached: close the whole position.
    Close { side: OrderSide, qty: Decimal },

    /// Nothing to do.
    Hold { reason: HoldReason },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldReason {
    /// Next increment would push leverage above the target
    LeverageCapped,

    /// Equity too small for a single contract
    ZeroLot,
}

/// Inputs for one decision.
#[derive(Debug, Clone, Copy)]
pub struct TickInputs {
    pub last_price: Decimal,
    pub balance: Decimal,
    pub position: Position,
}

/// Decide the action for one tick.
///
/// Fails when balance or price is not positive, since leverage is undefined.
pub fn decide(params: &Params, inputs: &TickInputs) -> Result<Decision> {
    if inputs.last_price <= Decimal::ZERO {
        bail!("last price must be positive, got {}", inputs.last_price);
    }
    if inputs.balance <= Decimal::ZERO {
        bail!("balance must be positive, got {}", inputs.balance);
    }

    if inputs.position.is_flat() {
        let lot = initial_lot(inputs.balance, inputs.last_price, params.leverage)?;
        if lot.is_zero() {
            return Ok(Decision::Hold {
                reason: HoldReason::ZeroLot,
            });
        }
        return Ok(Decision::Open { lot });
    }

    if inputs.last_price >= params.target_price {
        let side = if inputs.position.is_long() {
            OrderSide::Sell
        } else {
            OrderSide::Buy
        };
        return Ok(Decision::Close {
            side,
            qty: inputs.position.size().abs(),
        });
    }

    let Some(after) = inputs.position.size().checked_add(params.order_unit) else {
        bail!(
            "position {} plus increment {} overflows",
            inputs.position,
            params.order_unit
        );
    };
    let next = effective_leverage(after, inputs.balance, inputs.last_price)?;
    if next <= params.leverage {
        Ok(Decision::Add {
            qty: params.order_unit,
        })
    } else {
        Ok(Decision::Hold {
            reason: HoldReason::LeverageCapped,
        })
    }
}

/// Contracts to open from flat: `floor(balance * price * leverage)`.
pub fn initial_lot(balance: Decimal, last_price: Decimal, leverage: Decimal) -> Result<Decimal> {
    let Some(notional) = balance
        .checked_mul(last_price)
        .and_then(|v| v.checked_mul(leverage))
    else {
        bail!("lot size overflows: {} x {} x {}", balance, last_price, leverage);
    };
    Ok(notional.floor().max(Decimal::ZERO))
}

/// Position notional over equity, from live values.
///
/// Fails when equity rounds to zero or the ratio does not fit a `Decimal`.
pub fn effective_leverage(
    position: Decimal,
    balance: Decimal,
    last_price: Decimal,
) -> Result<Decimal> {
    let Some(equity) = balance.checked_mul(last_price) else {
        bail!("equity overflows: {} x {}", balance, last_price);
    };
    if equity.is_zero() {
        bail!("leverage undefined for equity {} x {}", balance, last_price);
    }
    match position.checked_div(equity) {
        Some(leverage) => Ok(leverage),
        None => bail!("leverage {} / {} overflows", position, equity),
    }
}

/// Return on equity relative to a fixed starting balance.
pub fn roe(start_balance: Decimal, current_balance: Decimal) -> Result<Decimal> {
    if start_balance.is_zero() {
        return Ok(Decimal::ZERO);
    }
    match current_balance
        .checked_sub(start_balance)
        .and_then(|gain| gain.checked_div(start_balance))
    {
        Some(roe) => Ok(roe),
        None => bail!("ROE overflows for {} from {}", current_balance, start_balance),
    }
}

/// Ratio as a percentage rounded for display.
pub fn percent3(ratio: Decimal) -> Result<Decimal> {
    match ratio.checked_mul(Decimal::ONE_HUNDRED) {
        Some(pct) => Ok(round3(pct)),
        None => bail!("{} does not fit as a percentage", ratio),
    }
}

/// Round for display, half away from zero.
pub fn round3(value: Decimal) -> Decimal {
    value
        .round_dp_with_strategy(3, RoundingStrategy::MidpointAwayFromZero)
        .normalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn params() -> Params {
        Params {
            symbol: "BTC/USD".to_string(),
            sleep_time: dec!(10),
            order_unit: dec!(10),
            leverage: dec!(3),
            target_price: dec!(50000),
            start_balance: dec!(1000),
        }
    }

    #[test]
    fn test_open_from_flat() {
        let decision = decide(
            &params(),
            &TickInputs {
                last_price: dec!(50000),
                balance: dec!(0.02),
                position: Position::FLAT,
            },
        )
        .unwrap();

        assert_eq!(decision, Decision::Open { lot: dec!(3000) });
    }

    #[test]
    fn test_initial_lot_floors() {
        assert_eq!(
            initial_lot(dec!(0.0123), dec!(43210.5), dec!(2.5)).unwrap(),
            dec!(1328)
        );
        assert_eq!(initial_lot(dec!(0.00001), dec!(100), dec!(1)).unwrap(), dec!(0));
        assert!(initial_lot(Decimal::MAX, dec!(2), dec!(1)).is_err());
    }

    #[test]
    fn test_flat_with_dust_balance_holds() {
        let decision = decide(
            &params(),
            &TickInputs {
                last_price: dec!(100),
                balance: dec!(0.001),
                position: Position::FLAT,
            },
        )
        .unwrap();

        assert_eq!(
            decision,
            Decision::Hold {
                reason: HoldReason::ZeroLot
            }
        );
    }

    #[test]
    fn test_close_at_target() {
        let decision = decide(
            &params(),
            &TickInputs {
                last_price: dec!(50001),
                balance: dec!(0.02),
                position: Position(dec!(3000)),
            },
        )
        .unwrap();

        assert_eq!(
            decision,
            Decision::Close {
                side: OrderSide::Sell,
                qty: dec!(3000)
            }
        );
    }

    #[test]
    fn test_close_exactly_at_target() {
        let decision = decide(
            &params(),
            &TickInputs {
                last_price: dec!(50000),
                balance: dec!(0.02),
                position: Position(dec!(100)),
            },
        )
        .unwrap();

        assert!(matches!(decision, Decision::Close { .. }));
    }

    #[test]
    fn test_add_below_leverage() {
        // (1000 + 10) / (40000 * 0.02) = 1.2625 <= 3
        let decision = decide(
            &params(),
            &TickInputs {
                last_price: dec!(40000),
                balance: dec!(0.02),
                position: Position(dec!(1000)),
            },
        )
        .unwrap();

        assert_eq!(decision, Decision::Add { qty: dec!(10) });
    }

    #[test]
    fn test_hold_when_increment_exceeds_leverage() {
        // (2400 + 10) / (40000 * 0.02) = 3.0125 > 3
        let decision = decide(
            &params(),
            &TickInputs {
                last_price: dec!(40000),
                balance: dec!(0.02),
                position: Position(dec!(2400)),
            },
        )
        .unwrap();

        assert_eq!(
            decision,
            Decision::Hold {
                reason: HoldReason::LeverageCapped
            }
        );
    }

    #[test]
    fn test_increment_landing_on_target_leverage_is_allowed() {
        // (2390 + 10) / (40000 * 0.02) = 3
        let decision = decide(
            &params(),
            &TickInputs {
                last_price: dec!(40000),
                balance: dec!(0.02),
                position: Position(dec!(2390)),
            },
        )
        .unwrap();

        assert_eq!(decision, Decision::Add { qty: dec!(10) });
    }

    #[test]
    fn test_zero_balance_is_error() {
        let result = decide(
            &params(),
            &TickInputs {
                last_price: dec!(40000),
                balance: Decimal::ZERO,
                position: Position(dec!(100)),
            },
        );

        assert!(result.is_err());
    }

    #[test]
    fn test_tiny_equity_is_error() {
        // 15 / 1e-28 does not fit a Decimal
        let result = decide(
            &params(),
            &TickInputs {
                last_price: dec!(0.00000000000001),
                balance: dec!(0.00000000000001),
                position: Position(dec!(5)),
            },
        );

        assert!(result.is_err());
    }

    #[test]
    fn test_huge_flat_notional_is_error() {
        let result = decide(
            &params(),
            &TickInputs {
                last_price: Decimal::MAX,
                balance: dec!(2),
                position: Position::FLAT,
            },
        );

        assert!(result.is_err());
    }

    #[test]
    fn test_roe() {
        assert_eq!(roe(dec!(100), dec!(110)).unwrap(), dec!(0.10));
        assert_eq!(roe(dec!(100), dec!(90)).unwrap(), dec!(-0.10));
        assert_eq!(roe(Decimal::ZERO, dec!(90)).unwrap(), Decimal::ZERO);
        assert!(roe(dec!(0.0000000000000000000000000001), Decimal::MAX).is_err());
    }

    #[test]
    fn test_effective_leverage() {
        assert_eq!(
            effective_leverage(dec!(3000), dec!(0.02), dec!(50000)).unwrap(),
            dec!(3)
        );
        assert!(effective_leverage(dec!(3000), Decimal::ZERO, dec!(50000)).is_err());
    }

    #[test]
    fn test_round3() {
        assert_eq!(round3(dec!(1.23456)), dec!(1.235));
        assert_eq!(round3(dec!(-0.0005)), dec!(-0.001));
        assert_eq!(round3(dec!(3.000)).to_string(), "3");
    }

    #[test]
    fn test_percent3() {
        assert_eq!(percent3(dec!(0.123456)).unwrap(), dec!(12.346));
        assert!(percent3(Decimal::MAX).is_err());
    }
}
