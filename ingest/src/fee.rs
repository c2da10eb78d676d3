//! Network fee arithmetic, in minor units.

use txflow_types::{money_range, TypesError};

use crate::resolver::InputResolution;

/// Fee of a transaction: resolved input value minus total output value.
///
/// Only resolved inputs count, so a failed resolution underestimates the
/// fee. Coinbase transactions pay no fee. Both totals must lie in the
/// on-chain money range.
pub fn network_fee(inputs: &InputResolution, output_total: i64) -> Result<i64, TypesError> {
    if !money_range(output_total) {
        return Err(TypesError::InvalidAmount(output_total.to_string()));
    }
    if inputs.coinbase {
        return Ok(0);
    }
    Ok(inputs.total()? - output_total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::ResolvedInput;
    use proptest::prelude::*;
    use txflow_types::MAX_MONEY;

    fn resolution(values: &[i64]) -> InputResolution {
        InputResolution {
            resolved: values
                .iter()
                .map(|v| ResolvedInput {
                    value: *v,
                    addresses: vec![],
                })
                .collect(),
            failed: 0,
            coinbase: false,
        }
    }

    #[test]
    fn single_input_single_output() {
        assert_eq!(network_fee(&resolution(&[5_000_000]), 4_990_000), Ok(10_000));
    }

    #[test]
    fn skipped_input_lowers_fee() {
        let mut partial = resolution(&[3_000]);
        partial.failed = 1;
        assert_eq!(network_fee(&partial, 2_500), Ok(500));
    }

    #[test]
    fn coinbase_pays_nothing() {
        let mut coinbase = resolution(&[]);
        coinbase.coinbase = true;
        assert_eq!(network_fee(&coinbase, 625_000_000), Ok(0));
    }

    #[test]
    fn overflowing_inputs_are_an_error() {
        assert!(network_fee(&resolution(&[i64::MAX, i64::MAX]), 0).is_err());
        assert!(network_fee(&resolution(&[10]), i64::MAX).is_err());
    }

    proptest! {
        #[test]
        fn fee_is_input_sum_minus_output_sum(
            inputs in prop::collection::vec(0i64..MAX_MONEY / 8, 0..8),
            outputs in prop::collection::vec(0i64..MAX_MONEY / 8, 0..8),
        ) {
            let output_total: i64 = outputs.iter().sum();
            let expected = inputs.iter().sum::<i64>() - output_total;
            prop_assert_eq!(network_fee(&resolution(&inputs), output_total), Ok(expected));
        }
    }
}
