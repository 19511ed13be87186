use market_store::Money;
use serde::Serialize;

/// Weight bracket, in kilograms, covered by one service fee unit.
const SERVICE_BRACKET_KG: f64 = 50.0;

/// One service fee unit (1000) in minor units.
const SERVICE_FEE_UNIT_CENTS: i64 = 1_000 * 100;

/// Delivery fee per kilogram (1500) in minor units.
const DELIVERY_FEE_PER_KG_CENTS: f64 = 1_500.0 * 100.0;

/// Prices computed for a pickup request. Nothing is charged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PickupQuote {
    pub service_price: Money,
    pub delivery_price: Money,
}

/// Computes service and delivery prices for an item weight.
///
/// The service fee is one unit up to 50 kg, then one unit per started
/// 50 kg bracket plus one. Delivery is charged per kilogram.
pub fn quote(weight: f64) -> PickupQuote {
    let service_units = if weight <= SERVICE_BRACKET_KG {
        1
    } else {
        (weight / SERVICE_BRACKET_KG).floor() as i64 + 1
    };

    PickupQuote {
        service_price: Money::from_cents(service_units * SERVICE_FEE_UNIT_CENTS),
        delivery_price: Money::from_cents((weight * DELIVERY_FEE_PER_KG_CENTS).round() as i64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_price_brackets() {
        assert_eq!(quote(40.0).service_price.cents(), 1_000 * 100);
        assert_eq!(quote(50.0).service_price.cents(), 1_000 * 100);
        assert_eq!(quote(60.0).service_price.cents(), 2_000 * 100);
        assert_eq!(quote(100.0).service_price.cents(), 3_000 * 100);
        assert_eq!(quote(149.9).service_price.cents(), 3_000 * 100);
    }

    #[test]
    fn delivery_price_is_per_kilogram() {
        assert_eq!(quote(40.0).delivery_price.cents(), 40 * 1_500 * 100);
        assert_eq!(quote(16.5).delivery_price.cents(), 2_475_000);
        assert_eq!(quote(100.0).delivery_price.cents(), 100 * 1_500 * 100);
    }
}
