//! Token service boundary
//!
//! The converter and the protection engine never touch token internals; they
//! move value exclusively through [`TokenService`]. [`TokenLedger`] is the
//! in-memory implementation used by tests and simulations.

use std::collections::HashMap;

use num_bigint::BigUint;
use num_traits::Zero;
use serde::{Deserialize, Serialize};

use crate::{Address, Error, Result, TokenId};

/// Fungible token operations the core depends on
pub trait TokenService {
    fn balance_of(&self, token: &TokenId, owner: &Address) -> BigUint;

    fn total_supply(&self, token: &TokenId) -> BigUint;

    fn allowance(&self, token: &TokenId, owner: &Address, spender: &Address) -> BigUint;

    fn approve(
        &mut self,
        token: &TokenId,
        owner: &Address,
        spender: &Address,
        amount: BigUint,
    ) -> Result<()>;

    fn transfer(
        &mut self,
        token: &TokenId,
        from: &Address,
        to: &Address,
        amount: &BigUint,
    ) -> Result<()>;

    /// Move `amount` on behalf of `from`, consuming `spender`'s allowance
    fn transfer_from(
        &mut self,
        token: &TokenId,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: &BigUint,
    ) -> Result<()>;

    fn mint(&mut self, token: &TokenId, to: &Address, amount: &BigUint) -> Result<()>;

    fn burn(&mut self, token: &TokenId, from: &Address, amount: &BigUint) -> Result<()>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct TokenAccounts {
    supply: BigUint,
    balances: HashMap<Address, BigUint>,
    allowances: HashMap<Address, HashMap<Address, BigUint>>,
}

impl TokenAccounts {
    fn balance(&self, owner: &Address) -> BigUint {
        self.balances.get(owner).cloned().unwrap_or_default()
    }

    fn debit(&mut self, token: &TokenId, owner: &Address, amount: &BigUint) -> Result<()> {
        let available = self.balance(owner);
        if &available < amount {
            return Err(Error::InsufficientBalance {
                token: token.clone(),
                required: amount.clone(),
                available,
            });
        }
        self.balances.insert(owner.clone(), available - amount);
        Ok(())
    }

    fn credit(&mut self, owner: &Address, amount: &BigUint) {
        *self.balances.entry(owner.clone()).or_default() += amount;
    }
}

/// In-memory multi-token ledger
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenLedger {
    tokens: HashMap<TokenId, TokenAccounts>,
}

impl TokenLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_recipient(to: &Address) -> Result<()> {
        if to.is_zero() {
            return Err(Error::InvalidAddress {
                address: to.clone(),
            });
        }
        Ok(())
    }
}

impl TokenService for TokenLedger {
    fn balance_of(&self, token: &TokenId, owner: &Address) -> BigUint {
        self.tokens
            .get(token)
            .map(|accounts| accounts.balance(owner))
            .unwrap_or_default()
    }

    fn total_supply(&self, token: &TokenId) -> BigUint {
        self.tokens
            .get(token)
            .map(|accounts| accounts.supply.clone())
            .unwrap_or_default()
    }

    fn allowance(&self, token: &TokenId, owner: &Address, spender: &Address) -> BigUint {
        self.tokens
            .get(token)
            .and_then(|accounts| accounts.allowances.get(owner))
            .and_then(|spenders| spenders.get(spender))
            .cloned()
            .unwrap_or_default()
    }

    fn approve(
        &mut self,
        token: &TokenId,
        owner: &Address,
        spender: &Address,
        amount: BigUint,
    ) -> Result<()> {
        Self::ensure_recipient(spender)?;
        self.tokens
            .entry(token.clone())
            .or_default()
            .allowances
            .entry(owner.clone())
            .or_default()
            .insert(spender.clone(), amount);
        Ok(())
    }

    fn transfer(
        &mut self,
        token: &TokenId,
        from: &Address,
        to: &Address,
        amount: &BigUint,
    ) -> Result<()> {
        Self::ensure_recipient(to)?;
        let accounts = self.tokens.entry(token.clone()).or_default();
        accounts.debit(token, from, amount)?;
        accounts.credit(to, amount);
        Ok(())
    }

    fn transfer_from(
        &mut self,
        token: &TokenId,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: &BigUint,
    ) -> Result<()> {
        Self::ensure_recipient(to)?;
        let available = self.allowance(token, from, spender);
        if &available < amount {
            return Err(Error::InsufficientAllowance {
                token: token.clone(),
                required: amount.clone(),
                available,
            });
        }
        let accounts = self.tokens.entry(token.clone()).or_default();
        accounts.debit(token, from, amount)?;
        accounts.credit(to, amount);
        accounts
            .allowances
            .entry(from.clone())
            .or_default()
            .insert(spender.clone(), available - amount);
        Ok(())
    }

    fn mint(&mut self, token: &TokenId, to: &Address, amount: &BigUint) -> Result<()> {
        Self::ensure_recipient(to)?;
        let accounts = self.tokens.entry(token.clone()).or_default();
        accounts.supply += amount;
        accounts.credit(to, amount);
        tracing::trace!(token = %token, to = %to, amount = %amount, "Minted");
        Ok(())
    }

    fn burn(&mut self, token: &TokenId, from: &Address, amount: &BigUint) -> Result<()> {
        if amount.is_zero() {
            return Ok(());
        }
        let accounts = self.tokens.entry(token.clone()).or_default();
        accounts.debit(token, from, amount)?;
        accounts.supply -= amount;
        tracing::trace!(token = %token, from = %from, amount = %amount, "Burned");
        Ok(())
    }
}
