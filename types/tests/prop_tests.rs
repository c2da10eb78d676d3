use proptest::prelude::*;

use txflow_types::{to_minor_units, Direction, TxStatus, MINOR_UNITS_PER_COIN};

fn direction() -> impl Strategy<Value = Direction> {
    prop_oneof![Just(Direction::Incoming), Just(Direction::Outgoing)]
}

proptest! {
    /// Every whole minor-unit value survives the trip through a coin decimal.
    #[test]
    fn minor_units_from_coin_decimal(sats in 0i64..21_000_000_000_000) {
        let coins = sats as f64 / MINOR_UNITS_PER_COIN as f64;
        prop_assert_eq!(to_minor_units(coins).unwrap(), sats);
    }

    /// Only codes 1..=6 decode to a status.
    #[test]
    fn status_code_domain(code in any::<u8>()) {
        prop_assert_eq!(TxStatus::try_from(code).is_ok(), (1..=6).contains(&code));
    }

    /// Decoding then encoding a valid code is the identity.
    #[test]
    fn status_code_identity(code in 1u8..=6) {
        prop_assert_eq!(TxStatus::try_from(code).unwrap().code(), code);
    }

    /// The mempool, block and confirmed constructors never collide.
    #[test]
    fn status_constructors_distinct(dir in direction()) {
        let mempool = TxStatus::mempool(dir);
        let block = TxStatus::in_block(dir);
        let confirmed = TxStatus::confirmed(dir);
        prop_assert!(mempool.is_mempool());
        prop_assert!(!block.is_mempool() && !block.is_confirmed());
        prop_assert!(confirmed.is_confirmed());
    }
}
