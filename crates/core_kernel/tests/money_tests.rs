//! Comprehensive tests for Money and Rate

use core_kernel::{Currency, Money, MoneyError, Rate};
use rust_decimal_macros::dec;

mod money_tests {
    use super::*;

    #[test]
    fn test_new_rounds_to_four_decimal_places() {
        let m = Money::new(dec!(100.123456), Currency::CHF);
        assert_eq!(m.amount(), dec!(100.1235));
    }

    #[test]
    fn test_round_to_currency() {
        let m = Money::new(dec!(43.2366), Currency::CHF);
        assert_eq!(m.round_to_currency().amount(), dec!(43.24));
    }

    #[test]
    fn test_zero() {
        let m = Money::zero(Currency::CHF);
        assert!(m.is_zero());
        assert!(!m.is_positive());
        assert!(!m.is_negative());
    }

    #[test]
    fn test_sign_predicates() {
        assert!(Money::new(dec!(0.01), Currency::CHF).is_positive());
        assert!(Money::new(dec!(-0.01), Currency::CHF).is_negative());
    }

    #[test]
    fn test_abs() {
        let m = Money::new(dec!(-150.00), Currency::CHF);
        assert_eq!(m.abs().amount(), dec!(150.00));
    }

    #[test]
    fn test_multiply_by_percentage() {
        // 40% tier applied to a CHF 100 covered subtotal
        let subtotal = Money::new(dec!(100.00), Currency::CHF);
        let gross = subtotal.multiply(dec!(0.40));
        assert_eq!(gross.amount(), dec!(40.00));
    }

    #[test]
    fn test_divide() {
        let m = Money::new(dec!(108.10), Currency::CHF);
        let net = m.divide(dec!(1.081)).unwrap();
        assert_eq!(net.round_to_currency().amount(), dec!(100.00));
    }

    #[test]
    fn test_divide_by_zero() {
        let m = Money::new(dec!(10.00), Currency::CHF);
        assert_eq!(m.divide(dec!(0)), Err(MoneyError::DivisionByZero));
    }

    #[test]
    fn test_max_currency_mismatch() {
        let chf = Money::new(dec!(1.00), Currency::CHF);
        let eur = Money::new(dec!(1.00), Currency::EUR);
        assert!(chf.max(&eur).is_err());
    }

    #[test]
    fn test_display() {
        let m = Money::new(dec!(458.60), Currency::CHF);
        assert_eq!(m.to_string(), "CHF 458.60");
    }
}

mod rate_tests {
    use super::*;

    #[test]
    fn test_rate_from_percentage() {
        let vat = Rate::from_percentage(dec!(8.1));
        assert_eq!(vat.as_decimal(), dec!(0.081));
        assert_eq!(vat.as_percentage(), dec!(8.1));
    }

    #[test]
    fn test_rate_apply() {
        let excess = Rate::from_percentage(dec!(10));
        let base = Money::new(dec!(43.24), Currency::CHF);
        assert_eq!(excess.apply(&base).round_to_currency().amount(), dec!(4.32));
    }

    #[test]
    fn test_rate_display() {
        let rate = Rate::from_percentage(dec!(8.1));
        assert_eq!(rate.to_string(), "8.1%");
    }
}
