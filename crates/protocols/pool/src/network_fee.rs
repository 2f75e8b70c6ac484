//! Network fee accounting
//!
//! Every conversion accrues part of its conversion fee as a pending network
//! fee in the target reserve. Nothing moves until settlement, which pays the
//! fee wallet from both reserves at the current reserve ratio.

use amm_core::constants::PPM_RESOLUTION;
use amm_core::math::mul_div;
use num_bigint::BigUint;
use num_traits::Zero;
use serde::{Deserialize, Serialize};

/// Network share of a conversion fee, attributed to one side of the pool
///
/// Formula: conversion_fee * network_fee / (2 * PPM)
pub fn split_fee(conversion_fee: &BigUint, network_fee: u32) -> BigUint {
    mul_div(
        conversion_fee,
        &BigUint::from(network_fee),
        &(BigUint::from(PPM_RESOLUTION) * 2u32),
    )
}

/// Pending network fees of a two-reserve pool, by reserve index
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkFeeAccountant {
    pending: [BigUint; 2],
}

impl NetworkFeeAccountant {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accrue(&mut self, index: usize, amount: &BigUint) {
        self.pending[index] += amount;
    }

    pub fn pending(&self, index: usize) -> &BigUint {
        &self.pending[index]
    }

    pub fn has_pending(&self) -> bool {
        self.pending.iter().any(|p| !p.is_zero())
    }

    /// Amounts owed to the fee wallet per reserve; resets the pending state.
    ///
    /// A pending amount `p` in reserve `i` is paid as `p` of reserve `i` plus
    /// `p * balance_j / balance_i` of the other reserve.
    pub fn settle(&mut self, balances: &[BigUint; 2]) -> [BigUint; 2] {
        let mut owed = [BigUint::zero(), BigUint::zero()];
        for i in 0..2 {
            let pending = std::mem::take(&mut self.pending[i]);
            if pending.is_zero() || balances[i].is_zero() {
                continue;
            }
            let j = 1 - i;
            owed[j] += mul_div(&pending, &balances[j], &balances[i]);
            owed[i] += pending;
        }
        for i in 0..2 {
            if owed[i] > balances[i] {
                owed[i] = balances[i].clone();
            }
        }
        owed
    }
}
