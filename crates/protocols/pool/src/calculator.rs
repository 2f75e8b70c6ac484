//! Pool Calculator
//!
//! Swap and liquidity math for equal-weight (50/50) pools. All inputs and
//! outputs are raw token units; intermediate products stay in big integers.

use amm_core::constants::PPM_RESOLUTION;
use amm_core::math::{geometric_mean, mul_div, mul_div_ceil};
use amm_core::{Error, Result};
use num_bigint::BigUint;
use num_traits::Zero;

/// Output of a conversion and the conversion fee deducted from it
///
/// Formula: gross = target_balance * amount / (source_balance + amount);
/// fee = gross * conversion_fee / PPM; output = gross - fee
pub fn target_amount_and_fee(
    source_balance: &BigUint,
    target_balance: &BigUint,
    amount: &BigUint,
    conversion_fee: u32,
) -> (BigUint, BigUint) {
    let denominator = source_balance + amount;
    if denominator.is_zero() {
        return (BigUint::zero(), BigUint::zero());
    }
    let gross = target_balance * amount / denominator;
    let fee = calculate_fee(&gross, conversion_fee);
    (gross - &fee, fee)
}

/// Input required to receive `amount`, and the fee charged on the way
///
/// Formula: raw = ceil(amount * PPM / (PPM - conversion_fee));
/// input = ceil(source_balance * raw / (target_balance - raw))
pub fn source_amount_and_fee(
    source_balance: &BigUint,
    target_balance: &BigUint,
    amount: &BigUint,
    conversion_fee: u32,
) -> Result<(BigUint, BigUint)> {
    if amount.is_zero() {
        return Ok((BigUint::zero(), BigUint::zero()));
    }
    let fee_complement = PPM_RESOLUTION - conversion_fee.min(PPM_RESOLUTION);
    if fee_complement == 0 {
        return Err(Error::InvalidAmount);
    }
    let raw = mul_div_ceil(
        amount,
        &BigUint::from(PPM_RESOLUTION),
        &BigUint::from(fee_complement),
    );
    if &raw >= target_balance {
        return Err(Error::InvalidAmount);
    }
    let source = mul_div_ceil(source_balance, &raw, &(target_balance - &raw));
    let fee = &raw - amount;
    Ok((source, fee))
}

/// Fee in PPM of `amount`, floored
pub fn calculate_fee(amount: &BigUint, fee_ppm: u32) -> BigUint {
    mul_div(
        amount,
        &BigUint::from(fee_ppm),
        &BigUint::from(PPM_RESOLUTION),
    )
}

/// Pool tokens minted for the first deposit into an empty pool
pub fn initial_pool_supply(amounts: &[BigUint]) -> BigUint {
    geometric_mean(amounts)
}

/// Pool tokens minted for a deposit and the reserve amounts actually taken
///
/// The limiting reserve decides the minted amount; the other reserve is
/// charged `ceil(minted * balance / supply)` and any excess stays with the
/// provider.
pub fn add_liquidity_amounts(
    amounts: &[BigUint; 2],
    balances: &[BigUint; 2],
    supply: &BigUint,
) -> (BigUint, [BigUint; 2]) {
    let index = if &amounts[0] * &balances[1] < &amounts[1] * &balances[0] {
        0
    } else {
        1
    };
    let minted = mul_div(&amounts[index], supply, &balances[index]);
    let costs = [
        mul_div_ceil(&minted, &balances[0], supply),
        mul_div_ceil(&minted, &balances[1], supply),
    ];
    (minted, costs)
}

/// Reserve amounts returned for burning `amount` pool tokens
///
/// Formula: reserve_i = amount * balance_i / supply
pub fn remove_liquidity_amounts(
    amount: &BigUint,
    balances: &[BigUint; 2],
    supply: &BigUint,
) -> [BigUint; 2] {
    if supply.is_zero() {
        return [BigUint::zero(), BigUint::zero()];
    }
    [
        mul_div(amount, &balances[0], supply),
        mul_div(amount, &balances[1], supply),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn big(v: u128) -> BigUint {
        BigUint::from(v)
    }

    #[test]
    fn test_target_amount_and_fee() {
        // 1000 into 10000/20000 at 0.3%: gross = 20000 * 1000 / 11000 = 1818
        let (amount, fee) = target_amount_and_fee(&big(10_000), &big(20_000), &big(1_000), 3_000);
        assert_eq!(fee, big(5));
        assert_eq!(amount, big(1_813));
    }

    #[test]
    fn test_target_amount_zero() {
        let (amount, fee) = target_amount_and_fee(&big(10_000), &big(20_000), &big(0), 3_000);
        assert!(amount.is_zero());
        assert!(fee.is_zero());
    }

    #[test]
    fn test_source_amount_round_trip() {
        let source_balance = big(5_000_000);
        let target_balance = big(7_000_000);
        let conversion_fee = 2_500;
        for input in [1u128, 17, 100, 999, 5_000, 42_424, 100_000] {
            let (output, fwd_fee) =
                target_amount_and_fee(&source_balance, &target_balance, &big(input), conversion_fee);
            if output.is_zero() {
                continue;
            }
            let (back, inv_fee) =
                source_amount_and_fee(&source_balance, &target_balance, &output, conversion_fee)
                    .unwrap();
            // within 0.3% of the original input
            let diff = if back > big(input) { &back - big(input) } else { big(input) - &back };
            assert!(diff * big(1_000) <= big(input) * big(3) + big(1_000));
            assert!(inv_fee >= fwd_fee);
            assert!(inv_fee <= &fwd_fee + big(1));
        }
    }

    #[test]
    fn test_source_amount_exceeds_balance() {
        let result = source_amount_and_fee(&big(1_000), &big(1_000), &big(1_000), 0);
        assert_eq!(result, Err(Error::InvalidAmount));
    }

    #[test]
    fn test_initial_supply() {
        assert_eq!(initial_pool_supply(&[big(1_000), big(1_000)]), big(1_000));
        assert_eq!(initial_pool_supply(&[big(10_000), big(1_000_000)]), big(100_000));
    }

    #[test]
    fn test_add_liquidity_amounts_limiting_reserve() {
        let balances = [big(1_000), big(4_000)];
        let supply = big(2_000);
        // second reserve is the limiting one
        let (minted, costs) = add_liquidity_amounts(&[big(500), big(1_000)], &balances, &supply);
        assert_eq!(minted, big(500));
        assert_eq!(costs, [big(250), big(1_000)]);

        // first reserve is the limiting one
        let (minted, costs) = add_liquidity_amounts(&[big(100), big(1_000)], &balances, &supply);
        assert_eq!(minted, big(200));
        assert_eq!(costs, [big(100), big(400)]);
    }

    #[test]
    fn test_add_liquidity_costs_round_up() {
        let balances = [big(1_000), big(3_001)];
        let supply = big(1_000);
        let (minted, costs) = add_liquidity_amounts(&[big(10), big(100)], &balances, &supply);
        assert_eq!(minted, big(10));
        // 10 * 3001 / 1000 = 30.01 -> 31
        assert_eq!(costs, [big(10), big(31)]);
    }

    #[test]
    fn test_remove_liquidity_amounts() {
        let amounts = remove_liquidity_amounts(&big(250), &[big(1_000), big(3_001)], &big(1_000));
        assert_eq!(amounts, [big(250), big(750)]);
        let empty = remove_liquidity_amounts(&big(1), &[big(0), big(0)], &big(0));
        assert_eq!(empty, [big(0), big(0)]);
    }
}
