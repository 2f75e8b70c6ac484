//! Conversion Network
//!
//! Owns the converter registry, the network settings and the path finder,
//! and executes multi-hop conversions along a path.

use amm_core::{Address, Error, Result, Timestamp, TokenId, TokenService};
use num_bigint::BigUint;
use num_traits::Zero;
use tracing::info;

use crate::registry::ConverterRegistry;
use crate::router::ConversionPathFinder;
use crate::settings::NetworkSettings;

/// A single conversion step along a path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathStep {
    pub anchor: TokenId,
    pub source: TokenId,
    pub target: TokenId,
}

#[derive(Debug, Clone)]
pub struct ConversionNetwork {
    pub registry: ConverterRegistry,
    pub settings: NetworkSettings,
    pub path_finder: ConversionPathFinder,
}

impl ConversionNetwork {
    pub fn new(
        registry: ConverterRegistry,
        settings: NetworkSettings,
        path_finder: ConversionPathFinder,
    ) -> Self {
        Self {
            registry,
            settings,
            path_finder,
        }
    }

    /// Conversion path between two tokens, empty when none exists
    pub fn conversion_path(&self, source: &TokenId, target: &TokenId) -> Vec<TokenId> {
        self.path_finder.find_path(&self.registry, source, target)
    }

    /// Split a `[token, anchor, token, ...]` path into steps
    pub fn path_steps(path: &[TokenId]) -> Result<Vec<PathStep>> {
        if path.len() < 3 || path.len() % 2 == 0 {
            return Err(Error::InvalidItem(format!(
                "invalid conversion path length {}",
                path.len()
            )));
        }
        Ok(path
            .windows(3)
            .step_by(2)
            .map(|w| PathStep {
                source: w[0].clone(),
                anchor: w[1].clone(),
                target: w[2].clone(),
            })
            .collect())
    }

    /// Expected return of converting `amount` along `path`
    pub fn rate_by_path(&self, path: &[TokenId], amount: &BigUint) -> Result<BigUint> {
        let mut amount = amount.clone();
        for step in Self::path_steps(path)? {
            let converter = self.registry.converter(&step.anchor).ok_or_else(|| {
                Error::InvalidItem(format!("anchor {} is not registered", step.anchor))
            })?;
            let (next, _) = converter.get_return(&step.source, &step.target, &amount)?;
            amount = next;
        }
        Ok(amount)
    }

    /// Convert `amount` of the first path token held by `trader` and deliver
    /// the last path token to `beneficiary`.
    ///
    /// The full path is quoted before any token moves; `ReturnTooLow` leaves
    /// every pool untouched.
    #[allow(clippy::too_many_arguments)]
    pub fn convert_by_path(
        &mut self,
        tokens: &mut dyn TokenService,
        path: &[TokenId],
        amount: &BigUint,
        min_return: &BigUint,
        trader: &Address,
        beneficiary: &Address,
        now: Timestamp,
    ) -> Result<BigUint> {
        if min_return.is_zero() {
            return Err(Error::ZeroValue);
        }
        let steps = Self::path_steps(path)?;
        let expected = self.rate_by_path(path, amount)?;
        if &expected < min_return {
            return Err(Error::ReturnTooLow);
        }

        let addresses = steps
            .iter()
            .map(|step| {
                self.registry
                    .converter(&step.anchor)
                    .map(|c| c.address().clone())
                    .ok_or_else(|| {
                        Error::InvalidItem(format!("anchor {} is not registered", step.anchor))
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        tokens.transfer(&steps[0].source, trader, &addresses[0], amount)?;

        let mut amount = amount.clone();
        for (index, step) in steps.iter().enumerate() {
            let recipient = addresses.get(index + 1).unwrap_or(beneficiary);
            let converter = self.registry.converter_mut(&step.anchor).ok_or_else(|| {
                Error::InvalidItem(format!("anchor {} is not registered", step.anchor))
            })?;
            amount = converter.convert(
                tokens,
                &self.settings,
                &step.source,
                &step.target,
                &amount,
                recipient,
                now,
            )?;
        }

        info!(
            source = %steps[0].source,
            target = %steps[steps.len() - 1].target,
            trader = %trader,
            return_amount = %amount,
            hops = steps.len(),
            "Converted by path"
        );
        Ok(amount)
    }
}
