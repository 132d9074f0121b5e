//! Grid strategy - symmetric level calculation around mid

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::types::{OrderSide, PriceLevel};

/// Spacing between neighbouring levels as a fraction of mid (1 basis point)
pub const LEVEL_STEP: Decimal = dec!(0.0001);

/// Calculate the symmetric grid around `mid_price`
///
/// Level `i` (1-based) sits at `mid * (1 + i * LEVEL_STEP)` on the sell side and
/// `mid * (1 - i * LEVEL_STEP)` on the buy side. Sells come first, then buys,
/// each ordered nearest-to-mid first.
pub fn compute_levels(mid_price: Decimal, level_count: u32) -> Vec<PriceLevel> {
    let offsets = |side: OrderSide| {
        (1..=level_count).map(move |i| {
            let offset = LEVEL_STEP * Decimal::from(i);
            let factor = match side {
                OrderSide::Sell => Decimal::ONE + offset,
                OrderSide::Buy => Decimal::ONE - offset,
            };
            PriceLevel {
                side,
                index: i,
                price: mid_price * factor,
            }
        })
    };

    offsets(OrderSide::Sell).chain(offsets(OrderSide::Buy)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prices(levels: &[PriceLevel], side: OrderSide) -> Vec<Decimal> {
        levels
            .iter()
            .filter(|l| l.side == side)
            .map(|l| l.price)
            .collect()
    }

    #[test]
    fn test_eurusd_two_levels() {
        let levels = compute_levels(dec!(1.1000), 2);

        assert_eq!(prices(&levels, OrderSide::Sell), vec![dec!(1.10011), dec!(1.10022)]);
        assert_eq!(prices(&levels, OrderSide::Buy), vec![dec!(1.09989), dec!(1.09978)]);
        assert_eq!(levels[0].index, 1);
        assert_eq!(levels[2].side, OrderSide::Buy);
    }

    #[test]
    fn test_levels_symmetric_and_monotonic() {
        let mid = dec!(2345.67);
        for n in [1u32, 3, 10, 25] {
            let levels = compute_levels(mid, n);
            let sells = prices(&levels, OrderSide::Sell);
            let buys = prices(&levels, OrderSide::Buy);

            assert_eq!(sells.len(), n as usize);
            assert_eq!(buys.len(), n as usize);
            assert!(sells.iter().all(|p| *p > mid));
            assert!(buys.iter().all(|p| *p < mid));
            assert!(sells.windows(2).all(|w| w[0] < w[1]));
            assert!(buys.windows(2).all(|w| w[0] > w[1]));

            // Mirror distances match exactly
            for (s, b) in sells.iter().zip(&buys) {
                assert_eq!(*s - mid, mid - *b);
            }
        }
    }

    #[test]
    fn test_zero_levels_is_empty() {
        assert!(compute_levels(dec!(1.1), 0).is_empty());
    }

    #[test]
    fn test_level_step_is_one_basis_point() {
        assert_eq!(LEVEL_STEP, dec!(0.0001));
    }
}
