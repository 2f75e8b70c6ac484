//! Liquidity Protection engine
//!
//! Accepts single-sided deposits into whitelisted standard pools and pays
//! them back with impermanent loss compensation that grows with time held.
//!
//! Base token deposits are matched with freshly minted network tokens; the
//! resulting pool tokens are split between the provider's position and the
//! system balance. Network token deposits draw on that system balance
//! instead and are answered with governance tokens. On removal the engine
//! liquidates pool tokens for the base side and covers any shortfall with
//! network tokens that stay locked for a while.
//!
//! Every operation validates its complete outcome before the first state
//! change, so a failure leaves positions, counters and balances untouched.

use amm_core::constants::{PPM_RESOLUTION, STANDARD_POOL_WEIGHT};
use amm_core::math::Rate;
use amm_core::{
    checked_sub, Address, Clock, Error, PositionId, Result, Timestamp, TokenId, TokenService,
};
use num_bigint::BigUint;
use num_traits::{CheckedSub, Zero};
use pool_converter::{ConversionNetwork, Converter, StandardPoolConverter};
use tracing::{debug, info, warn};

use crate::calculator::{
    average_rate_in_range, base_token_available_space, liquidation_pool_amount, network_compensation, network_token_available_space,
    pool_token_rate, protection_level, remove_liquidity_target_amount, TargetAmountInputs,
};
use crate::constants::MIN_POOL_TOKEN_RETURN;
use crate::services::{CheckpointStore, LiquidityEventsSubscriber};
use crate::settings::ProtectionSettings;
use crate::state::{AvailableSpace, LiquidityChange, LockedBalance, Position, RemovalReturn};
use crate::stats::ProtectionStats;
use crate::store::{NewPosition, PositionStore};
use crate::system_store::SystemStore;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Accounts and tokens the engine operates with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectionAccounts {
    /// Account holding tokens while an operation runs
    pub engine: Address,
    /// Custody of protected pool tokens and locked network tokens
    pub wallet: Address,
    pub network_token: TokenId,
    /// Issued 1:1 against network token deposits
    pub gov_token: TokenId,
}

#[derive(Debug, Clone)]
struct ReserveRates {
    spot: Rate,
    average: Rate,
}

pub struct LiquidityProtection {
    accounts: ProtectionAccounts,
    settings: ProtectionSettings,
    store: PositionStore,
    stats: ProtectionStats,
    system_store: SystemStore,
    network: ConversionNetwork,
    tokens: Box<dyn TokenService>,
    checkpoints: Box<dyn CheckpointStore>,
    clock: Box<dyn Clock>,
    subscribers: Vec<Box<dyn LiquidityEventsSubscriber>>,
}

fn validate_portion(portion: u32) -> Result<()> {
    if portion == 0 || portion > PPM_RESOLUTION {
        return Err(Error::InvalidPortion);
    }
    Ok(())
}

/// Pool and reserve amounts covered by `portion` of a position
fn portion_amounts(position: &Position, portion: u32) -> (BigUint, BigUint) {
    if portion == PPM_RESOLUTION {
        return (position.pool_amount.clone(), position.reserve_amount.clone());
    }
    let ppm = BigUint::from(PPM_RESOLUTION);
    (
        &position.pool_amount * portion / &ppm,
        &position.reserve_amount * portion / &ppm,
    )
}

fn increase(after: &BigUint, before: &BigUint) -> BigUint {
    after.checked_sub(before).unwrap_or_default()
}

impl LiquidityProtection {
    pub fn new(
        accounts: ProtectionAccounts,
        settings: ProtectionSettings,
        network: ConversionNetwork,
        tokens: Box<dyn TokenService>,
        checkpoints: Box<dyn CheckpointStore>,
        clock: Box<dyn Clock>,
    ) -> Result<Self> {
        for address in [&accounts.engine, &accounts.wallet] {
            if address.is_zero() {
                return Err(Error::InvalidAddress {
                    address: address.clone(),
                });
            }
        }
        if settings.network_token() != &accounts.network_token {
            return Err(Error::InvalidItem(format!(
                "settings network token {} does not match {}",
                settings.network_token(),
                accounts.network_token
            )));
        }
        Ok(Self {
            stats: ProtectionStats::new(accounts.engine.clone()),
            system_store: SystemStore::new(accounts.engine.clone()),
            store: PositionStore::new(),
            accounts,
            settings,
            network,
            tokens,
            checkpoints,
            clock,
            subscribers: Vec::new(),
        })
    }

    // ---------------------------------------------------------------------
    // Accessors
    // ---------------------------------------------------------------------

    pub fn accounts(&self) -> &ProtectionAccounts {
        &self.accounts
    }

    pub fn settings(&self) -> &ProtectionSettings {
        &self.settings
    }

    /// Setters on the returned settings still require the settings owner
    pub fn settings_mut(&mut self) -> &mut ProtectionSettings {
        &mut self.settings
    }

    pub fn store(&self) -> &PositionStore {
        &self.store
    }

    pub fn stats(&self) -> &ProtectionStats {
        &self.stats
    }

    pub fn system_store(&self) -> &SystemStore {
        &self.system_store
    }

    pub fn network(&self) -> &ConversionNetwork {
        &self.network
    }

    pub fn network_mut(&mut self) -> &mut ConversionNetwork {
        &mut self.network
    }

    pub fn tokens(&self) -> &dyn TokenService {
        self.tokens.as_ref()
    }

    pub fn tokens_mut(&mut self) -> &mut dyn TokenService {
        self.tokens.as_mut()
    }

    /// Network and token service borrowed together, for pool administration
    pub fn network_and_tokens_mut(&mut self) -> (&mut ConversionNetwork, &mut dyn TokenService) {
        (&mut self.network, self.tokens.as_mut())
    }

    pub fn checkpoints(&self) -> &dyn CheckpointStore {
        self.checkpoints.as_ref()
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn position(&self, id: PositionId) -> Option<&Position> {
        self.store.position(id)
    }

    pub fn locked_balance(&self, provider: &Address, index: usize) -> Option<&LockedBalance> {
        self.store.locked_balance(provider, index)
    }

    pub fn locked_balance_count(&self, provider: &Address) -> usize {
        self.store.locked_balance_count(provider)
    }

    pub fn add_subscriber(
        &mut self,
        caller: &Address,
        subscriber: Box<dyn LiquidityEventsSubscriber>,
    ) -> Result<()> {
        self.settings.ownership().ensure_owner(caller)?;
        self.subscribers.push(subscriber);
        Ok(())
    }

    fn notify(&mut self, change: LiquidityChange) {
        for subscriber in self.subscribers.iter_mut() {
            subscriber.on_liquidity_changed(&change);
        }
    }

    // ---------------------------------------------------------------------
    // Pools and rates
    // ---------------------------------------------------------------------

    fn standard_pool(&self, pool: &TokenId) -> Option<&StandardPoolConverter> {
        self.network
            .registry
            .converter(pool)
            .and_then(Converter::as_standard)
    }

    fn supports(&self, converter: &StandardPoolConverter) -> bool {
        converter.is_reserve(&self.accounts.network_token)
            && converter
                .reserves()
                .iter()
                .all(|reserve| reserve.weight == STANDARD_POOL_WEIGHT)
    }

    /// Standard pool holding the network token with equal weights
    pub fn is_pool_supported(&self, pool: &TokenId) -> bool {
        self.standard_pool(pool)
            .is_some_and(|converter| self.supports(converter))
    }

    fn supported_pool(&self, pool: &TokenId) -> Result<&StandardPoolConverter> {
        self.standard_pool(pool)
            .filter(|converter| self.supports(converter))
            .ok_or_else(|| Error::PoolNotSupported { pool: pool.clone() })
    }

    fn whitelisted_pool(&self, pool: &TokenId) -> Result<&StandardPoolConverter> {
        let converter = self.supported_pool(pool)?;
        if !self.settings.is_pool_whitelisted(pool) {
            return Err(Error::PoolNotWhitelisted { pool: pool.clone() });
        }
        Ok(converter)
    }

    fn reserve_rates(
        converter: &StandardPoolConverter,
        reserve: &TokenId,
        now: Timestamp,
    ) -> Result<ReserveRates> {
        Ok(ReserveRates {
            spot: converter.current_rate(reserve)?,
            average: converter.recent_average_rate(reserve, now)?,
        })
    }

    fn validate_rates(&self, rates: &ReserveRates) -> Result<()> {
        if !average_rate_in_range(
            &rates.spot,
            &rates.average,
            self.settings.average_rate_max_deviation(),
        ) {
            warn!(spot = ?rates.spot, average = ?rates.average, "Average rate out of range");
            return Err(Error::InvalidRate);
        }
        Ok(())
    }

    fn pool_rate(&self, converter: &StandardPoolConverter, reserve: &TokenId) -> Result<Rate> {
        Ok(pool_token_rate(
            &self.tokens.total_supply(converter.anchor()),
            &converter.reserve_balance(reserve)?,
        ))
    }

    fn target_amount(
        &self,
        position: &Position,
        pool_amount: &BigUint,
        reserve_amount: &BigUint,
        pool_rate: &Rate,
        rates: &ReserveRates,
        remove_time: Timestamp,
    ) -> BigUint {
        let add_rate = Rate::new(position.reserve_rate_n.clone(), position.reserve_rate_d.clone());
        let level = protection_level(
            position.timestamp,
            remove_time,
            self.settings.min_protection_delay(),
            self.settings.max_protection_delay(),
        );
        remove_liquidity_target_amount(&TargetAmountInputs {
            pool_amount,
            reserve_amount,
            pool_rate,
            add_rate: &add_rate,
            remove_spot_rate: &rates.spot,
            remove_average_rate: &rates.average,
            level: &level,
        })
    }

    fn ensure_can_pull(&self, from: &Address, token: &TokenId, amount: &BigUint) -> Result<()> {
        let available = self.tokens.balance_of(token, from);
        if &available < amount {
            return Err(Error::InsufficientBalance {
                token: token.clone(),
                required: amount.clone(),
                available,
            });
        }
        if !token.is_native() {
            let allowance = self.tokens.allowance(token, from, &self.accounts.engine);
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

    // ---------------------------------------------------------------------
    // Network token supply
    // ---------------------------------------------------------------------

    fn mint_network_tokens(&mut self, to: &Address, pool: &TokenId, amount: &BigUint) -> Result<()> {
        self.system_store
            .inc_network_tokens_minted(&self.accounts.engine, pool, amount)?;
        self.tokens.mint(&self.accounts.network_token, to, amount)
    }

    /// Burn network tokens held by the engine; the pool's minted counter
    /// drops by at most what it tracks
    fn burn_network_tokens(&mut self, pool: &TokenId, amount: &BigUint) -> Result<()> {
        let tracked = self.system_store.network_tokens_minted(pool).min(amount.clone());
        self.system_store
            .dec_network_tokens_minted(&self.accounts.engine, pool, &tracked)?;
        self.tokens
            .burn(&self.accounts.network_token, &self.accounts.engine, amount)
    }

    fn lock_tokens(&mut self, provider: &Address, amount: &BigUint, now: Timestamp) {
        let expiration = now.saturating_add(self.settings.lock_duration());
        self.store
            .add_locked_balance(provider, amount.clone(), expiration);
        debug!(provider = %provider, amount = %amount, expiration, "Network tokens locked");
    }

    // ---------------------------------------------------------------------
    // Positions
    // ---------------------------------------------------------------------

    fn add_position(&mut self, new: NewPosition) -> Result<PositionId> {
        self.stats.increase_total_amounts(
            &self.accounts.engine,
            &new.provider,
            &new.pool_token,
            &new.reserve_token,
            &new.pool_amount,
            &new.reserve_amount,
        )?;
        self.stats
            .add_provider_pool(&self.accounts.engine, &new.provider, &new.pool_token)?;
        let change = LiquidityChange {
            id: 0,
            provider: new.provider.clone(),
            pool_anchor: new.pool_token.clone(),
            reserve_token: new.reserve_token.clone(),
            pool_amount: new.pool_amount.clone(),
            reserve_amount: new.reserve_amount.clone(),
            adding: true,
        };
        let id = self.store.add_position(new);
        self.notify(change);
        Ok(id)
    }

    /// Position `id` if `caller` may remove or transfer it at `now`
    fn removable_position(&self, caller: &Address, id: PositionId, now: Timestamp) -> Result<Position> {
        let position = self
            .store
            .position(id)
            .filter(|position| &position.provider == caller)
            .cloned()
            .ok_or(Error::AccessDenied)?;
        if !self.settings.is_pool_whitelisted(&position.pool_token) {
            return Err(Error::PoolNotWhitelisted {
                pool: position.pool_token,
            });
        }
        if position.timestamp >= now {
            return Err(Error::TooEarly);
        }
        Ok(position)
    }

    /// Take `pool_amount`/`reserve_amount` out of a stored position and
    /// record the removal against its provider
    fn detach_position(
        &mut self,
        position: &Position,
        pool_amount: &BigUint,
        reserve_amount: &BigUint,
        now: Timestamp,
    ) -> Result<()> {
        self.stats.decrease_total_amounts(
            &self.accounts.engine,
            &position.provider,
            &position.pool_token,
            &position.reserve_token,
            pool_amount,
            reserve_amount,
        )?;
        if pool_amount == &position.pool_amount && reserve_amount == &position.reserve_amount {
            self.store.remove_position(position.id)?;
        } else {
            self.store.update_position_amounts(
                position.id,
                &position.pool_amount - pool_amount,
                &position.reserve_amount - reserve_amount,
            )?;
        }
        let still_in_pool = self
            .store
            .provider_positions(&position.provider)
            .iter()
            .filter_map(|id| self.store.position(*id))
            .any(|other| other.pool_token == position.pool_token);
        if !still_in_pool {
            self.stats.remove_provider_pool(
                &self.accounts.engine,
                &position.provider,
                &position.pool_token,
            )?;
        }
        self.checkpoints.set_checkpoint(&position.provider, now);
        self.notify(LiquidityChange {
            id: position.id,
            provider: position.provider.clone(),
            pool_anchor: position.pool_token.clone(),
            reserve_token: position.reserve_token.clone(),
            pool_amount: pool_amount.clone(),
            reserve_amount: reserve_amount.clone(),
            adding: false,
        });
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Add liquidity
    // ---------------------------------------------------------------------

    /// Protect `amount` of `reserve` deposited by `caller`
    pub fn add_liquidity(
        &mut self,
        caller: &Address,
        pool: &TokenId,
        reserve: &TokenId,
        amount: &BigUint,
        value: &BigUint,
    ) -> Result<PositionId> {
        self.add_liquidity_for(caller, caller, pool, reserve, amount, value)
    }

    /// Protect `amount` of `reserve` paid by `caller` in a position owned by
    /// `owner`. `value` is the attached native amount and must equal
    /// `amount` for a native reserve, zero otherwise.
    pub fn add_liquidity_for(
        &mut self,
        caller: &Address,
        owner: &Address,
        pool: &TokenId,
        reserve: &TokenId,
        amount: &BigUint,
        value: &BigUint,
    ) -> Result<PositionId> {
        if owner.is_zero() {
            return Err(Error::InvalidAddress {
                address: owner.clone(),
            });
        }
        let now = self.clock.now();
        let converter = self.whitelisted_pool(pool)?;
        if self.settings.add_liquidity_disabled(pool, reserve) {
            return Err(Error::AddLiquidityDisabled {
                pool: pool.clone(),
                reserve: reserve.clone(),
            });
        }
        if amount.is_zero() {
            return Err(Error::ZeroValue);
        }
        if !converter.is_reserve(reserve) {
            return Err(Error::InvalidReserve {
                token: reserve.clone(),
            });
        }
        let expected_value = if reserve.is_native() {
            amount.clone()
        } else {
            BigUint::zero()
        };
        if value != &expected_value {
            return Err(Error::EthAmountMismatch);
        }
        let rates = Self::reserve_rates(converter, reserve, now)?;
        self.validate_rates(&rates)?;

        if reserve == &self.accounts.network_token {
            self.add_network_token_liquidity(caller, owner, pool, amount, rates.spot, now)
        } else {
            self.add_base_token_liquidity(caller, owner, pool, reserve, amount, value, now)
        }
    }

    fn add_network_token_liquidity(
        &mut self,
        caller: &Address,
        owner: &Address,
        pool: &TokenId,
        amount: &BigUint,
        spot: Rate,
        now: Timestamp,
    ) -> Result<PositionId> {
        let network = self.accounts.network_token.clone();
        let engine = self.accounts.engine.clone();
        let converter = self.supported_pool(pool)?;
        let pool_rate = self.pool_rate(converter, &network)?;
        if pool_rate.n.is_zero() {
            return Err(Error::NotEnoughLiquidity { pool: pool.clone() });
        }
        let pool_amount = amount * &pool_rate.d / &pool_rate.n;
        checked_sub(&self.system_store.system_balance(pool), &pool_amount)?;
        self.ensure_can_pull(caller, &network, amount)?;

        self.system_store
            .dec_system_balance(&engine, pool, &pool_amount)?;
        let id = self.add_position(NewPosition {
            provider: owner.clone(),
            pool_token: pool.clone(),
            reserve_token: network.clone(),
            pool_amount: pool_amount.clone(),
            reserve_amount: amount.clone(),
            reserve_rate_n: spot.n,
            reserve_rate_d: spot.d,
            timestamp: now,
        })?;
        self.tokens
            .transfer_from(&network, &engine, caller, &engine, amount)?;
        self.burn_network_tokens(pool, amount)?;
        self.tokens.mint(&self.accounts.gov_token, owner, amount)?;

        info!(
            id,
            provider = %owner,
            pool = %pool,
            reserve = %network,
            amount = %amount,
            pool_amount = %pool_amount,
            "Network token liquidity protected"
        );
        Ok(id)
    }

    #[allow(clippy::too_many_arguments)]
    fn add_base_token_liquidity(
        &mut self,
        caller: &Address,
        owner: &Address,
        pool: &TokenId,
        base: &TokenId,
        amount: &BigUint,
        value: &BigUint,
        now: Timestamp,
    ) -> Result<PositionId> {
        let network = self.accounts.network_token.clone();
        let engine = self.accounts.engine.clone();
        let converter = self.supported_pool(pool)?;
        let converter_address = converter.address().clone();
        let base_balance = converter.reserve_balance(base)?;
        let network_balance = converter.reserve_balance(&network)?;
        if &network_balance < self.settings.min_network_token_liquidity_for_minting()
            || base_balance.is_zero()
        {
            return Err(Error::NotEnoughLiquidity { pool: pool.clone() });
        }
        let network_amount = amount * &network_balance / &base_balance;
        if network_amount.is_zero() {
            return Err(Error::ZeroTargetAmount);
        }
        let minted = self.system_store.network_tokens_minted(pool) + &network_amount;
        if &minted > self.settings.network_token_minting_limit(pool) {
            return Err(Error::MaxAmountReached { pool: pool.clone() });
        }
        self.ensure_can_pull(caller, base, amount)?;

        let base_before = self.tokens.balance_of(base, &engine);
        let network_before = self.tokens.balance_of(&network, &engine);
        self.mint_network_tokens(&engine, pool, &network_amount)?;
        if base.is_native() {
            self.tokens.transfer(base, caller, &engine, amount)?;
        } else {
            self.tokens
                .transfer_from(base, &engine, caller, &engine, amount)?;
            self.tokens
                .approve(base, &engine, &converter_address, amount.clone())?;
        }
        self.tokens
            .approve(&network, &engine, &converter_address, network_amount.clone())?;

        let converter = self
            .network
            .registry
            .converter_mut(pool)
            .and_then(Converter::as_standard_mut)
            .ok_or_else(|| Error::PoolNotSupported { pool: pool.clone() })?;
        let pool_tokens = converter.add_liquidity(
            self.tokens.as_mut(),
            &self.network.settings,
            &engine,
            &[base.clone(), network.clone()],
            &[amount.clone(), network_amount.clone()],
            &BigUint::from(MIN_POOL_TOKEN_RETURN),
            value,
            now,
        )?;
        let spot = converter.current_rate(base)?;

        // only the amounts matching the pool ratio were taken
        let refund = increase(&self.tokens.balance_of(base, &engine), &base_before);
        if !refund.is_zero() {
            self.tokens.transfer(base, &engine, caller, &refund)?;
        }
        let unused = increase(&self.tokens.balance_of(&network, &engine), &network_before);
        if !unused.is_zero() {
            self.burn_network_tokens(pool, &unused)?;
        }

        self.tokens
            .transfer(pool, &engine, &self.accounts.wallet, &pool_tokens)?;
        let position_amount = &pool_tokens / 2u32;
        let system_amount = &pool_tokens - &position_amount;
        self.system_store
            .inc_system_balance(&engine, pool, &system_amount)?;
        let reserve_amount = amount - &refund;
        let id = self.add_position(NewPosition {
            provider: owner.clone(),
            pool_token: pool.clone(),
            reserve_token: base.clone(),
            pool_amount: position_amount.clone(),
            reserve_amount: reserve_amount.clone(),
            reserve_rate_n: spot.n,
            reserve_rate_d: spot.d,
            timestamp: now,
        })?;

        info!(
            id,
            provider = %owner,
            pool = %pool,
            reserve = %base,
            amount = %reserve_amount,
            pool_amount = %position_amount,
            network_minted = %network_amount,
            "Base token liquidity protected"
        );
        Ok(id)
    }

    // ---------------------------------------------------------------------
    // Remove liquidity
    // ---------------------------------------------------------------------

    /// Expected outcome of removing `portion` (PPM) of position `id`.
    ///
    /// `remove_time` only sets the protection level. Spot, average and pool
    /// token rates are read from the pool at the current clock time, as a
    /// removal right now would see them. The base amount is quoted after
    /// settling pending network fees, which a removal does before paying
    /// out. The rate deviation guard does not apply here.
    pub fn remove_liquidity_return(
        &self,
        id: PositionId,
        portion: u32,
        remove_time: Timestamp,
    ) -> Result<RemovalReturn> {
        validate_portion(portion)?;
        let position = self.store.position(id).ok_or(Error::InvalidId { id })?;
        if remove_time < position.timestamp {
            return Err(Error::InvalidTimestamp);
        }
        let (pool_amount, reserve_amount) = portion_amounts(position, portion);
        let converter = self.supported_pool(&position.pool_token)?;
        let rates = Self::reserve_rates(converter, &position.reserve_token, self.clock.now())?;
        let pool_rate = self.pool_rate(converter, &position.reserve_token)?;
        let target = self.target_amount(
            position,
            &pool_amount,
            &reserve_amount,
            &pool_rate,
            &rates,
            remove_time,
        );

        if position.reserve_token == self.accounts.network_token {
            return Ok(RemovalReturn {
                target_amount: target.clone(),
                base_amount: target,
                network_amount: BigUint::zero(),
            });
        }

        let available = self.system_store.system_balance(&position.pool_token) + &pool_amount;
        let liquidated = liquidation_pool_amount(&target, &pool_rate).min(available);
        let base_amount = converter
            .remove_liquidity_return(
                self.tokens.as_ref(),
                &liquidated,
                std::slice::from_ref(&position.reserve_token),
            )?
            .into_iter()
            .next()
            .unwrap_or_default();
        let network_amount = network_compensation(
            &target,
            &base_amount,
            &rates.average,
            self.settings.min_network_compensation(),
        );
        Ok(RemovalReturn {
            target_amount: target,
            base_amount,
            network_amount,
        })
    }

    /// Remove `portion` (PPM) of position `id` owned by `caller`.
    ///
    /// Base positions are paid in the base token, topped up with locked
    /// network tokens; network positions are paid entirely in locked network
    /// tokens after burning the matching governance tokens.
    pub fn remove_liquidity(
        &mut self,
        caller: &Address,
        id: PositionId,
        portion: u32,
    ) -> Result<RemovalReturn> {
        validate_portion(portion)?;
        let now = self.clock.now();
        let position = self.removable_position(caller, id, now)?;
        let (pool_amount, reserve_amount) = portion_amounts(&position, portion);
        let pool = position.pool_token.clone();
        let reserve = position.reserve_token.clone();

        let converter = self.supported_pool(&pool)?;
        let rates = Self::reserve_rates(converter, &reserve, now)?;
        self.validate_rates(&rates)?;
        let pool_rate = self.pool_rate(converter, &reserve)?;
        let target = self.target_amount(
            &position,
            &pool_amount,
            &reserve_amount,
            &pool_rate,
            &rates,
            now,
        );

        let outcome = if reserve == self.accounts.network_token {
            self.remove_network_token_liquidity(caller, &position, &pool_amount, &reserve_amount, target, now)?
        } else {
            self.remove_base_token_liquidity(
                caller,
                &position,
                &pool_amount,
                &reserve_amount,
                &pool_rate,
                &rates,
                target,
                now,
            )?
        };

        info!(
            id,
            provider = %caller,
            pool = %pool,
            reserve = %reserve,
            portion,
            target = %outcome.target_amount,
            base = %outcome.base_amount,
            network = %outcome.network_amount,
            "Protected liquidity removed"
        );
        Ok(outcome)
    }

    fn remove_network_token_liquidity(
        &mut self,
        caller: &Address,
        position: &Position,
        pool_amount: &BigUint,
        reserve_amount: &BigUint,
        target: BigUint,
        now: Timestamp,
    ) -> Result<RemovalReturn> {
        let engine = self.accounts.engine.clone();
        let gov = self.accounts.gov_token.clone();
        self.ensure_can_pull(caller, &gov, reserve_amount)?;

        self.detach_position(position, pool_amount, reserve_amount, now)?;
        self.system_store
            .inc_system_balance(&engine, &position.pool_token, pool_amount)?;
        self.tokens
            .transfer_from(&gov, &engine, caller, &engine, reserve_amount)?;
        self.tokens.burn(&gov, &engine, reserve_amount)?;

        let wallet = self.accounts.wallet.clone();
        self.mint_network_tokens(&wallet, &position.pool_token, &target)?;
        self.lock_tokens(caller, &target, now);
        Ok(RemovalReturn {
            target_amount: target.clone(),
            base_amount: target,
            network_amount: BigUint::zero(),
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn remove_base_token_liquidity(
        &mut self,
        caller: &Address,
        position: &Position,
        pool_amount: &BigUint,
        reserve_amount: &BigUint,
        pool_rate: &Rate,
        rates: &ReserveRates,
        target: BigUint,
        now: Timestamp,
    ) -> Result<RemovalReturn> {
        let engine = self.accounts.engine.clone();
        let network = self.accounts.network_token.clone();
        let pool = position.pool_token.clone();
        let base = position.reserve_token.clone();
        let reserve_tokens = [base.clone(), network.clone()];

        // the system's pool tokens plus the position's own
        let available = self.system_store.system_balance(&pool) + pool_amount;
        let liquidated = liquidation_pool_amount(&target, pool_rate).min(available);
        let quote = self
            .supported_pool(&pool)?
            .remove_liquidity_return(self.tokens.as_ref(), &liquidated, &reserve_tokens)?;
        if liquidated.is_zero() || quote.iter().any(Zero::is_zero) {
            return Err(Error::ZeroTargetAmount);
        }

        self.detach_position(position, pool_amount, reserve_amount, now)?;
        self.system_store
            .inc_system_balance(&engine, &pool, pool_amount)?;
        self.system_store
            .dec_system_balance(&engine, &pool, &liquidated)?;
        self.tokens
            .transfer(&pool, &self.accounts.wallet, &engine, &liquidated)?;

        let network_before = self.tokens.balance_of(&network, &engine);
        let converter = self
            .network
            .registry
            .converter_mut(&pool)
            .and_then(Converter::as_standard_mut)
            .ok_or_else(|| Error::PoolNotSupported { pool: pool.clone() })?;
        let min_returns = [
            BigUint::from(MIN_POOL_TOKEN_RETURN),
            BigUint::from(MIN_POOL_TOKEN_RETURN),
        ];
        let returned = converter.remove_liquidity(
            self.tokens.as_mut(),
            &self.network.settings,
            &engine,
            &liquidated,
            &reserve_tokens,
            &min_returns,
            now,
        )?;
        let base_amount = returned.into_iter().next().unwrap_or_default();
        self.tokens.transfer(&base, &engine, caller, &base_amount)?;

        let delta = network_compensation(
            &target,
            &base_amount,
            &rates.average,
            self.settings.min_network_compensation(),
        );
        if !delta.is_zero() {
            let held = increase(&self.tokens.balance_of(&network, &engine), &network_before);
            if held < delta {
                self.tokens.mint(&network, &engine, &(&delta - &held))?;
            }
            self.tokens
                .transfer(&network, &engine, &self.accounts.wallet, &delta)?;
            self.lock_tokens(caller, &delta, now);
        }

        let unused = increase(&self.tokens.balance_of(&network, &engine), &network_before);
        if !unused.is_zero() {
            self.burn_network_tokens(&pool, &unused)?;
        }

        Ok(RemovalReturn {
            target_amount: target,
            base_amount,
            network_amount: delta,
        })
    }

    // ---------------------------------------------------------------------
    // Transfer and claim
    // ---------------------------------------------------------------------

    /// Move position `id` to `new_provider` under a new id. Amounts, rate
    /// and deposit time carry over.
    pub fn transfer_position(
        &mut self,
        caller: &Address,
        id: PositionId,
        new_provider: &Address,
    ) -> Result<PositionId> {
        if new_provider.is_zero() {
            return Err(Error::InvalidAddress {
                address: new_provider.clone(),
            });
        }
        let now = self.clock.now();
        let position = self.removable_position(caller, id, now)?;

        self.detach_position(&position, &position.pool_amount, &position.reserve_amount, now)?;
        let new_id = self.add_position(NewPosition {
            provider: new_provider.clone(),
            pool_token: position.pool_token.clone(),
            reserve_token: position.reserve_token.clone(),
            pool_amount: position.pool_amount.clone(),
            reserve_amount: position.reserve_amount.clone(),
            reserve_rate_n: position.reserve_rate_n.clone(),
            reserve_rate_d: position.reserve_rate_d.clone(),
            timestamp: position.timestamp,
        })?;

        info!(
            id,
            new_id,
            from = %caller,
            to = %new_provider,
            "Position transferred"
        );
        Ok(new_id)
    }

    /// Release every expired locked balance of `caller` in `[start, end)`.
    /// Returns the network token amount paid out.
    pub fn claim_balance(&mut self, caller: &Address, start: usize, end: usize) -> Result<BigUint> {
        let now = self.clock.now();
        let balances = self.store.locked_balance_range(caller, start, end)?;

        // reverse order keeps the remaining indices valid
        let expired: Vec<usize> = (0..balances.len())
            .rev()
            .filter(|&offset| balances[offset].expiration_time <= now)
            .collect();
        let total = expired
            .iter()
            .fold(BigUint::zero(), |sum, &offset| sum + &balances[offset].amount);
        let network = self.accounts.network_token.clone();
        let held = self.tokens.balance_of(&network, &self.accounts.wallet);
        if held < total {
            return Err(Error::InsufficientBalance {
                token: network,
                required: total,
                available: held,
            });
        }

        for offset in expired {
            self.store.remove_locked_balance(caller, start + offset)?;
        }
        if !total.is_zero() {
            self.tokens
                .transfer(&network, &self.accounts.wallet, caller, &total)?;
            info!(provider = %caller, amount = %total, "Locked balance claimed");
        }
        Ok(total)
    }

    // ---------------------------------------------------------------------
    // Capacity
    // ---------------------------------------------------------------------

    /// Base and network token amounts that can still be protected in `pool`
    pub fn pool_available_space(&self, pool: &TokenId) -> Result<AvailableSpace> {
        let converter = self.whitelisted_pool(pool)?;
        let network = &self.accounts.network_token;
        let base = converter
            .reserve_tokens()
            .into_iter()
            .find(|token| token != network)
            .ok_or_else(|| Error::PoolNotSupported { pool: pool.clone() })?;

        let base_token = base_token_available_space(
            self.settings.network_token_minting_limit(pool),
            &self.system_store.network_tokens_minted(pool),
            &converter.reserve_balance(&base)?,
            &converter.reserve_balance(network)?,
        );
        let pool_rate = self.pool_rate(converter, network)?;
        let network_token =
            network_token_available_space(&self.system_store.system_balance(pool), &pool_rate);
        Ok(AvailableSpace {
            base_token,
            network_token,
        })
    }

    /// Convert along `path` for `trader` at the current time
    pub fn convert(
        &mut self,
        trader: &Address,
        path: &[TokenId],
        amount: &BigUint,
        min_return: &BigUint,
    ) -> Result<BigUint> {
        let now = self.clock.now();
        self.network
            .convert_by_path(self.tokens.as_mut(), path, amount, min_return, trader, trader, now)
    }
}
