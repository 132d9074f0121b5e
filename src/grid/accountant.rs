//! Position accounting - per-side profit, margin and return on margin

use rust_decimal::Decimal;

use super::errors::GridResult;
use super::executor::BrokerConnector;
use super::types::{OrderSide, Position};

/// Aggregated exposure of one side of the book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SideSummary {
    pub side_positions: usize,
    pub profit_sum: Decimal,
    pub margin_sum: Decimal,
    /// `100 * profit_sum / margin_sum`, zero when no margin is held
    pub percent_return: Decimal,
}

impl SideSummary {
    fn from_totals(side_positions: usize, profit_sum: Decimal, margin_sum: Decimal) -> Self {
        Self {
            side_positions,
            profit_sum,
            margin_sum,
            percent_return: percent_return(profit_sum, margin_sum),
        }
    }

    /// Whether this side carries margin and has reached `take_profit_pct`
    pub fn reached(&self, take_profit_pct: Decimal) -> bool {
        self.margin_sum > Decimal::ZERO && self.percent_return >= take_profit_pct
    }
}

/// Return on margin in percent; no margin means no signal
pub fn percent_return(profit_sum: Decimal, margin_sum: Decimal) -> Decimal {
    if margin_sum.is_zero() {
        return Decimal::ZERO;
    }
    Decimal::ONE_HUNDRED * profit_sum / margin_sum
}

/// Summarize `side` of the given snapshot
///
/// Margin is re-quoted from the terminal for every position as a hypothetical
/// order of the same side, volume and open price, so the broker's own
/// leverage model applies.
pub async fn summarize_side<C: BrokerConnector + ?Sized>(
    connector: &C,
    symbol: &str,
    side: OrderSide,
    positions: &[Position],
) -> GridResult<SideSummary> {
    let mut count = 0;
    let mut profit_sum = Decimal::ZERO;
    let mut margin_sum = Decimal::ZERO;

    for position in positions.iter().filter(|p| p.side == side) {
        count += 1;
        profit_sum += position.profit;
        margin_sum += connector
            .estimate_margin(side, symbol, position.volume, position.open_price)
            .await?;
    }

    Ok(SideSummary::from_totals(count, profit_sum, margin_sum))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::errors::GridError;
    use crate::grid::executor::mock::{position, MockConnector};
    use rust_decimal_macros::dec;

    #[test]
    fn test_percent_return_zero_margin() {
        assert_eq!(percent_return(dec!(150), Decimal::ZERO), Decimal::ZERO);
        assert_eq!(percent_return(dec!(-20), Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn test_percent_return() {
        assert_eq!(percent_return(dec!(150), dec!(1000)), dec!(15.0));
        assert_eq!(percent_return(dec!(-25), dec!(500)), dec!(-5));
    }

    #[tokio::test]
    async fn test_summarize_side_sums_matching_positions() {
        let connector = MockConnector::new(None);
        connector.set_margin(dec!(500)).await;
        let positions = vec![
            position(1, OrderSide::Buy, dec!(100)),
            position(2, OrderSide::Buy, dec!(50)),
            position(3, OrderSide::Sell, dec!(-30)),
        ];

        let buy = summarize_side(&connector, "EURUSD", OrderSide::Buy, &positions)
            .await
            .unwrap();
        assert_eq!(buy.side_positions, 2);
        assert_eq!(buy.profit_sum, dec!(150));
        assert_eq!(buy.margin_sum, dec!(1000));
        assert_eq!(buy.percent_return, dec!(15));
        assert!(buy.reached(dec!(15)));
        assert!(!buy.reached(dec!(15.01)));

        let sell = summarize_side(&connector, "EURUSD", OrderSide::Sell, &positions)
            .await
            .unwrap();
        assert_eq!(sell.side_positions, 1);
        assert_eq!(sell.percent_return, dec!(-6));
    }

    #[tokio::test]
    async fn test_empty_side_is_no_signal() {
        let connector = MockConnector::new(None);
        connector.set_margin(dec!(500)).await;
        let positions = vec![position(1, OrderSide::Buy, dec!(100))];

        let sell = summarize_side(&connector, "EURUSD", OrderSide::Sell, &positions)
            .await
            .unwrap();
        assert_eq!(sell, SideSummary::default());
        assert!(!sell.reached(dec!(0.0001)));
    }

    #[tokio::test]
    async fn test_margin_failure_propagates() {
        let connector = MockConnector::new(None);
        connector
            .fail_margin(GridError::Transient("order_calc_margin returned None".into()))
            .await;
        let positions = vec![position(1, OrderSide::Buy, dec!(10))];
        let err = summarize_side(&connector, "EURUSD", OrderSide::Buy, &positions)
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }
}
