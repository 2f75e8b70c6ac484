//! Standard Pool Converter
//!
//! Two reserves with equal weights, a pool token (the anchor) whose supply is
//! held by the token service, the recent average rate oracle and the network
//! fee accountant.
//!
//! Every mutating operation computes and validates its full outcome before
//! touching state, then commits in a fixed order: oracle refresh (pre-op
//! balances), network fee settlement, token movements, balance updates.

use amm_core::constants::STANDARD_POOL_WEIGHT;
use amm_core::math::Rate;
use amm_core::{Address, Error, Ownable, Result, Timestamp, TokenId, TokenService, Updated};
use num_bigint::BigUint;
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::average_rate::AverageRateRecord;
use crate::calculator::{
    add_liquidity_amounts, initial_pool_supply, remove_liquidity_amounts, source_amount_and_fee,
    target_amount_and_fee,
};
use crate::network_fee::{split_fee, NetworkFeeAccountant};
use crate::settings::NetworkSettings;

/// Reserve held by a pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reserve {
    pub token: TokenId,
    pub balance: BigUint,
    /// Weight in PPM
    pub weight: u32,
}

impl Reserve {
    fn new(token: TokenId) -> Self {
        Self {
            token,
            balance: BigUint::zero(),
            weight: STANDARD_POOL_WEIGHT,
        }
    }
}

/// Outcome of a single conversion step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversion {
    pub source_token: TokenId,
    pub target_token: TokenId,
    pub source_amount: BigUint,
    pub target_amount: BigUint,
    pub conversion_fee: BigUint,
    pub network_fee: BigUint,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandardPoolConverter {
    anchor: TokenId,
    address: Address,
    ownership: Ownable,
    reserves: [Reserve; 2],
    /// Conversion fee in PPM
    conversion_fee: u32,
    max_conversion_fee: u32,
    average_rate: AverageRateRecord,
    network_fees: NetworkFeeAccountant,
}

impl StandardPoolConverter {
    pub fn new(
        anchor: TokenId,
        address: Address,
        owner: Address,
        reserve_tokens: [TokenId; 2],
        max_conversion_fee: u32,
    ) -> Result<Self> {
        if address.is_zero() {
            return Err(Error::InvalidAddress { address });
        }
        let [first, second] = reserve_tokens;
        for token in [&first, &second] {
            if token == &anchor {
                return Err(Error::InvalidReserve {
                    token: token.clone(),
                });
            }
        }
        if first == second {
            return Err(Error::InvalidReserve { token: second });
        }
        Ok(Self {
            anchor,
            address,
            ownership: Ownable::new(owner),
            reserves: [Reserve::new(first), Reserve::new(second)],
            conversion_fee: 0,
            max_conversion_fee,
            average_rate: AverageRateRecord::default(),
            network_fees: NetworkFeeAccountant::new(),
        })
    }

    // ---------------------------------------------------------------------
    // Accessors
    // ---------------------------------------------------------------------

    pub fn anchor(&self) -> &TokenId {
        &self.anchor
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn ownership(&self) -> &Ownable {
        &self.ownership
    }

    pub fn reserves(&self) -> &[Reserve; 2] {
        &self.reserves
    }

    pub fn reserve_tokens(&self) -> Vec<TokenId> {
        self.reserves.iter().map(|r| r.token.clone()).collect()
    }

    pub fn is_reserve(&self, token: &TokenId) -> bool {
        self.reserves.iter().any(|r| &r.token == token)
    }

    pub fn reserve_balance(&self, token: &TokenId) -> Result<BigUint> {
        Ok(self.reserves[self.reserve_index(token)?].balance.clone())
    }

    pub fn reserve_weight(&self, token: &TokenId) -> Result<u32> {
        Ok(self.reserves[self.reserve_index(token)?].weight)
    }

    pub fn conversion_fee(&self) -> u32 {
        self.conversion_fee
    }

    pub fn pending_network_fee(&self, token: &TokenId) -> Result<BigUint> {
        Ok(self
            .network_fees
            .pending(self.reserve_index(token)?)
            .clone())
    }

    pub fn average_rate_record(&self) -> &AverageRateRecord {
        &self.average_rate
    }

    fn reserve_index(&self, token: &TokenId) -> Result<usize> {
        self.reserves
            .iter()
            .position(|r| &r.token == token)
            .ok_or_else(|| Error::InvalidReserve {
                token: token.clone(),
            })
    }

    fn pair_indices(&self, source: &TokenId, target: &TokenId) -> Result<(usize, usize)> {
        let s = self.reserve_index(source)?;
        let t = self.reserve_index(target)?;
        if s == t {
            return Err(Error::InvalidReserve {
                token: target.clone(),
            });
        }
        Ok((s, t))
    }

    fn balances(&self) -> [BigUint; 2] {
        [
            self.reserves[0].balance.clone(),
            self.reserves[1].balance.clone(),
        ]
    }

    /// Caller-ordered amounts mapped onto reserve order
    fn ordered_amounts(&self, tokens: &[TokenId], amounts: &[BigUint]) -> Result<[BigUint; 2]> {
        if tokens.len() != 2 || amounts.len() != 2 {
            return Err(Error::InvalidReserve {
                token: self.anchor.clone(),
            });
        }
        let first = self.reserve_index(&tokens[0])?;
        let second = self.reserve_index(&tokens[1])?;
        if first == second {
            return Err(Error::InvalidReserve {
                token: tokens[1].clone(),
            });
        }
        let mut ordered = [BigUint::zero(), BigUint::zero()];
        ordered[first] = amounts[0].clone();
        ordered[second] = amounts[1].clone();
        Ok(ordered)
    }

    // ---------------------------------------------------------------------
    // Pricing
    // ---------------------------------------------------------------------

    /// Output amount and conversion fee for converting `amount` of `source`
    pub fn target_amount_and_fee(
        &self,
        source: &TokenId,
        target: &TokenId,
        amount: &BigUint,
    ) -> Result<(BigUint, BigUint)> {
        let (s, t) = self.pair_indices(source, target)?;
        Ok(target_amount_and_fee(
            &self.reserves[s].balance,
            &self.reserves[t].balance,
            amount,
            self.conversion_fee,
        ))
    }

    /// Input amount and conversion fee for receiving `amount` of `target`
    pub fn source_amount_and_fee(
        &self,
        source: &TokenId,
        target: &TokenId,
        amount: &BigUint,
    ) -> Result<(BigUint, BigUint)> {
        let (s, t) = self.pair_indices(source, target)?;
        source_amount_and_fee(
            &self.reserves[s].balance,
            &self.reserves[t].balance,
            amount,
            self.conversion_fee,
        )
    }

    /// Spot rate of `token`: the other reserve balance over this one
    pub fn current_rate(&self, token: &TokenId) -> Result<Rate> {
        let i = self.reserve_index(token)?;
        Ok(Rate::new(
            self.reserves[1 - i].balance.clone(),
            self.reserves[i].balance.clone(),
        ))
    }

    /// Time-decayed average rate of `token`, as of `now`
    pub fn recent_average_rate(&self, token: &TokenId, now: Timestamp) -> Result<Rate> {
        let i = self.reserve_index(token)?;
        let rate =
            self.average_rate
                .recent(&self.reserves[0].balance, &self.reserves[1].balance, now);
        Ok(if i == 0 { rate } else { rate.inverse() })
    }

    // ---------------------------------------------------------------------
    // Administration
    // ---------------------------------------------------------------------

    pub fn set_conversion_fee(&mut self, caller: &Address, fee: u32) -> Result<Updated<u32>> {
        self.ownership.ensure_owner(caller)?;
        if fee > self.max_conversion_fee {
            return Err(Error::InvalidConversionFee { fee });
        }
        let previous = std::mem::replace(&mut self.conversion_fee, fee);
        info!(pool = %self.anchor, previous, current = fee, "Conversion fee updated");
        Ok(Updated::new(previous, fee))
    }

    pub fn transfer_ownership(&mut self, caller: &Address, new_owner: Address) -> Result<()> {
        self.ownership.transfer_ownership(caller, new_owner)
    }

    pub fn accept_ownership(&mut self, caller: &Address) -> Result<Updated<Address>> {
        self.ownership.accept_ownership(caller)
    }

    /// Re-read reserve balances from the token service
    pub fn sync_reserve_balances(&mut self, tokens: &dyn TokenService) {
        for reserve in self.reserves.iter_mut() {
            reserve.balance = tokens.balance_of(&reserve.token, &self.address);
        }
    }

    // ---------------------------------------------------------------------
    // Network fees
    // ---------------------------------------------------------------------

    fn preview_settlement(&self) -> (NetworkFeeAccountant, [BigUint; 2]) {
        let mut accountant = self.network_fees.clone();
        let owed = accountant.settle(&self.balances());
        (accountant, owed)
    }

    fn pay_network_fees(
        &mut self,
        tokens: &mut dyn TokenService,
        settings: &NetworkSettings,
        accountant: NetworkFeeAccountant,
        owed: &[BigUint; 2],
    ) -> Result<()> {
        self.network_fees = accountant;
        let wallet = settings.network_fee_wallet();
        for (reserve, amount) in self.reserves.iter_mut().zip(owed.iter()) {
            if amount.is_zero() {
                continue;
            }
            tokens.transfer(&reserve.token, &self.address, wallet, amount)?;
            reserve.balance -= amount;
        }
        if owed.iter().any(|a| !a.is_zero()) {
            info!(
                pool = %self.anchor,
                wallet = %wallet,
                amount0 = %owed[0],
                amount1 = %owed[1],
                "Network fees settled"
            );
        }
        Ok(())
    }

    /// Settle all pending network fees to the fee wallet
    pub fn process_network_fees(
        &mut self,
        tokens: &mut dyn TokenService,
        settings: &NetworkSettings,
    ) -> Result<[BigUint; 2]> {
        if !self.network_fees.has_pending() {
            debug!(pool = %self.anchor, "No pending network fees");
            return Ok([BigUint::zero(), BigUint::zero()]);
        }
        let (accountant, owed) = self.preview_settlement();
        self.pay_network_fees(tokens, settings, accountant, &owed)?;
        Ok(owed)
    }

    // ---------------------------------------------------------------------
    // Conversion
    // ---------------------------------------------------------------------

    /// Convert `amount` of `source` already transferred to this converter
    /// into `target`, sent to `beneficiary`.
    #[allow(clippy::too_many_arguments)]
    pub fn convert(
        &mut self,
        tokens: &mut dyn TokenService,
        settings: &NetworkSettings,
        source: &TokenId,
        target: &TokenId,
        amount: &BigUint,
        beneficiary: &Address,
        now: Timestamp,
    ) -> Result<Conversion> {
        let (s, t) = self.pair_indices(source, target)?;
        if beneficiary.is_zero() {
            return Err(Error::InvalidAddress {
                address: beneficiary.clone(),
            });
        }
        let held = tokens.balance_of(source, &self.address);
        if held < &self.reserves[s].balance + amount {
            return Err(Error::InvalidAmount);
        }
        let (target_amount, fee) = self.target_amount_and_fee(source, target, amount)?;
        if !amount.is_zero() && target_amount.is_zero() {
            return Err(Error::ZeroTargetAmount);
        }

        let [balance0, balance1] = self.balances();
        self.average_rate.update(&balance0, &balance1, now);

        let network_fee = split_fee(&fee, settings.network_fee());
        if !amount.is_zero() {
            self.reserves[s].balance += amount;
            self.reserves[t].balance -= &target_amount;
            self.network_fees.accrue(t, &network_fee);
            tokens.transfer(target, &self.address, beneficiary, &target_amount)?;
        }

        debug!(
            pool = %self.anchor,
            source = %source,
            target = %target,
            amount = %amount,
            return_amount = %target_amount,
            fee = %fee,
            network_fee = %network_fee,
            "Conversion"
        );

        Ok(Conversion {
            source_token: source.clone(),
            target_token: target.clone(),
            source_amount: amount.clone(),
            target_amount,
            conversion_fee: fee,
            network_fee,
        })
    }

    // ---------------------------------------------------------------------
    // Liquidity
    // ---------------------------------------------------------------------

    fn verify_native_value(&self, amounts: &[BigUint; 2], value: &BigUint) -> Result<()> {
        match self.reserves.iter().position(|r| r.token.is_native()) {
            Some(i) if &amounts[i] != value => Err(Error::EthAmountMismatch),
            None if !value.is_zero() => Err(Error::EthAmountMismatch),
            _ => Ok(()),
        }
    }

    fn ensure_can_pull(
        &self,
        tokens: &dyn TokenService,
        provider: &Address,
        token: &TokenId,
        amount: &BigUint,
    ) -> Result<()> {
        let available = tokens.balance_of(token, provider);
        if &available < amount {
            return Err(Error::InsufficientBalance {
                token: token.clone(),
                required: amount.clone(),
                available,
            });
        }
        if !token.is_native() {
            let allowance = tokens.allowance(token, provider, &self.address);
            if &allowance < amount {
                return Err(Error::InsufficientAllowance {
                    token: token.clone(),
                    required: amount.clone(),
                    available: allowance,
                });
            }
        }
        Ok(())
    }

    /// Deposit both reserves and mint pool tokens to `provider`.
    ///
    /// Only the amounts matching the current reserve ratio are taken. The
    /// native reserve is paid by the attached `value`, which must equal its
    /// amount. Returns the minted pool token amount.
    #[allow(clippy::too_many_arguments)]
    pub fn add_liquidity(
        &mut self,
        tokens: &mut dyn TokenService,
        settings: &NetworkSettings,
        provider: &Address,
        reserve_tokens: &[TokenId],
        reserve_amounts: &[BigUint],
        min_return: &BigUint,
        value: &BigUint,
        now: Timestamp,
    ) -> Result<BigUint> {
        let amounts = self.ordered_amounts(reserve_tokens, reserve_amounts)?;
        if amounts.iter().any(|a| a.is_zero()) {
            return Err(Error::InvalidAmount);
        }
        if min_return.is_zero() {
            return Err(Error::ZeroValue);
        }
        self.verify_native_value(&amounts, value)?;

        let pre_op = self.balances();
        let (accountant, owed) = self.preview_settlement();
        let settled = [&pre_op[0] - &owed[0], &pre_op[1] - &owed[1]];
        let supply = tokens.total_supply(&self.anchor);

        let (minted, costs) = if supply.is_zero() {
            (initial_pool_supply(&amounts), amounts.clone())
        } else {
            add_liquidity_amounts(&amounts, &settled, &supply)
        };
        if costs.iter().any(|c| c.is_zero()) {
            return Err(Error::ZeroTargetAmount);
        }
        if &minted < min_return {
            return Err(Error::ReturnTooLow);
        }
        for (reserve, cost) in self.reserves.iter().zip(costs.iter()) {
            self.ensure_can_pull(tokens, provider, &reserve.token, cost)?;
        }

        self.average_rate.update(&pre_op[0], &pre_op[1], now);
        self.pay_network_fees(tokens, settings, accountant, &owed)?;
        for i in 0..2 {
            let token = self.reserves[i].token.clone();
            if token.is_native() {
                tokens.transfer(&token, provider, &self.address, &costs[i])?;
            } else {
                tokens.transfer_from(&token, &self.address, provider, &self.address, &costs[i])?;
            }
            self.reserves[i].balance += &costs[i];
        }
        tokens.mint(&self.anchor, provider, &minted)?;

        info!(
            pool = %self.anchor,
            provider = %provider,
            minted = %minted,
            amount0 = %costs[0],
            amount1 = %costs[1],
            "Liquidity added"
        );
        Ok(minted)
    }

    /// Reserve amounts that burning `amount` pool tokens would return, in
    /// the order of `reserve_tokens`
    pub fn remove_liquidity_return(
        &self,
        tokens: &dyn TokenService,
        amount: &BigUint,
        reserve_tokens: &[TokenId],
    ) -> Result<Vec<BigUint>> {
        let (_, owed) = self.preview_settlement();
        let balances = self.balances();
        let settled = [&balances[0] - &owed[0], &balances[1] - &owed[1]];
        let supply = tokens.total_supply(&self.anchor);
        let amounts = remove_liquidity_amounts(amount, &settled, &supply);
        reserve_tokens
            .iter()
            .map(|token| Ok(amounts[self.reserve_index(token)?].clone()))
            .collect()
    }

    /// Burn `amount` of `provider`'s pool tokens and return the matching
    /// share of both reserves. Amounts follow the order of `reserve_tokens`.
    #[allow(clippy::too_many_arguments)]
    pub fn remove_liquidity(
        &mut self,
        tokens: &mut dyn TokenService,
        settings: &NetworkSettings,
        provider: &Address,
        amount: &BigUint,
        reserve_tokens: &[TokenId],
        min_returns: &[BigUint],
        now: Timestamp,
    ) -> Result<Vec<BigUint>> {
        if amount.is_zero() {
            return Err(Error::ZeroValue);
        }
        let min_returns = self.ordered_amounts(reserve_tokens, min_returns)?;
        if min_returns.iter().any(|m| m.is_zero()) {
            return Err(Error::ZeroValue);
        }
        let held = tokens.balance_of(&self.anchor, provider);
        if &held < amount {
            return Err(Error::InsufficientBalance {
                token: self.anchor.clone(),
                required: amount.clone(),
                available: held,
            });
        }

        let pre_op = self.balances();
        let (accountant, owed) = self.preview_settlement();
        let settled = [&pre_op[0] - &owed[0], &pre_op[1] - &owed[1]];
        let supply = tokens.total_supply(&self.anchor);
        let amounts = remove_liquidity_amounts(amount, &settled, &supply);
        if amounts.iter().zip(min_returns.iter()).any(|(a, m)| a < m) {
            return Err(Error::ReturnTooLow);
        }

        self.average_rate.update(&pre_op[0], &pre_op[1], now);
        self.pay_network_fees(tokens, settings, accountant, &owed)?;
        tokens.burn(&self.anchor, provider, amount)?;
        for i in 0..2 {
            self.reserves[i].balance -= &amounts[i];
            let token = self.reserves[i].token.clone();
            tokens.transfer(&token, &self.address, provider, &amounts[i])?;
        }

        info!(
            pool = %self.anchor,
            provider = %provider,
            burned = %amount,
            amount0 = %amounts[0],
            amount1 = %amounts[1],
            "Liquidity removed"
        );
        reserve_tokens
            .iter()
            .map(|token| Ok(amounts[self.reserve_index(token)?].clone()))
            .collect()
    }

    // ---------------------------------------------------------------------
    // Upgrade
    // ---------------------------------------------------------------------

    /// Move the pool to a new converter address.
    ///
    /// Pending network fees are settled first; the new converter starts with
    /// none.
    pub fn upgrade(
        mut self,
        tokens: &mut dyn TokenService,
        settings: &NetworkSettings,
        caller: &Address,
        new_address: Address,
    ) -> Result<Self> {
        self.ownership.ensure_owner(caller)?;
        if new_address.is_zero() || new_address == self.address {
            return Err(Error::InvalidAddress {
                address: new_address,
            });
        }
        self.process_network_fees(tokens, settings)?;
        for reserve in &self.reserves {
            tokens.transfer(&reserve.token, &self.address, &new_address, &reserve.balance)?;
        }
        info!(pool = %self.anchor, from = %self.address, to = %new_address, "Converter upgraded");
        Ok(Self {
            address: new_address,
            network_fees: NetworkFeeAccountant::new(),
            ..self
        })
    }
}
