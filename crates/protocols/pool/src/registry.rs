//! Converter Registry
//!
//! Maps anchors to their converters and every convertible token to the
//! anchors of the pools that hold it.

use std::collections::HashMap;

use amm_core::{Address, Error, Ownable, Result, TokenId};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::converter::Converter;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConverterRegistry {
    ownership: Ownable,
    /// Anchors in registration order
    anchors: Vec<TokenId>,
    converters: HashMap<TokenId, Converter>,
    /// Convertible tokens in registration order
    convertible_tokens: Vec<TokenId>,
    token_anchors: HashMap<TokenId, Vec<TokenId>>,
}

impl ConverterRegistry {
    pub fn new(owner: Address) -> Self {
        Self {
            ownership: Ownable::new(owner),
            anchors: Vec::new(),
            converters: HashMap::new(),
            convertible_tokens: Vec::new(),
            token_anchors: HashMap::new(),
        }
    }

    pub fn ownership(&self) -> &Ownable {
        &self.ownership
    }

    pub fn ownership_mut(&mut self) -> &mut Ownable {
        &mut self.ownership
    }

    pub fn add_converter(&mut self, caller: &Address, converter: Converter) -> Result<()> {
        self.ownership.ensure_owner(caller)?;
        let anchor = converter.anchor().clone();
        if self.converters.contains_key(&anchor) {
            return Err(Error::InvalidItem(format!("anchor {} already registered", anchor)));
        }
        let reserve_tokens = converter.reserve_tokens();
        if reserve_tokens.is_empty() {
            return Err(Error::InvalidItem(format!("converter {} has no reserves", anchor)));
        }

        for token in &reserve_tokens {
            let anchors = self.token_anchors.entry(token.clone()).or_default();
            if anchors.is_empty() {
                self.convertible_tokens.push(token.clone());
            }
            anchors.push(anchor.clone());
        }
        self.anchors.push(anchor.clone());
        self.converters.insert(anchor.clone(), converter);
        info!(anchor = %anchor, reserves = reserve_tokens.len(), "Converter registered");
        Ok(())
    }

    pub fn remove_converter(&mut self, caller: &Address, anchor: &TokenId) -> Result<Converter> {
        self.ownership.ensure_owner(caller)?;
        let converter = self
            .converters
            .remove(anchor)
            .ok_or_else(|| Error::InvalidItem(format!("anchor {} is not registered", anchor)))?;
        self.anchors.retain(|a| a != anchor);
        for token in converter.reserve_tokens() {
            if let Some(anchors) = self.token_anchors.get_mut(&token) {
                anchors.retain(|a| a != anchor);
                if anchors.is_empty() {
                    self.token_anchors.remove(&token);
                    self.convertible_tokens.retain(|t| t != &token);
                }
            }
        }
        info!(anchor = %anchor, "Converter removed");
        Ok(converter)
    }

    pub fn anchors(&self) -> &[TokenId] {
        &self.anchors
    }

    pub fn anchor_count(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_anchor(&self, token: &TokenId) -> bool {
        self.converters.contains_key(token)
    }

    pub fn convertible_tokens(&self) -> &[TokenId] {
        &self.convertible_tokens
    }

    pub fn is_convertible_token(&self, token: &TokenId) -> bool {
        self.token_anchors.contains_key(token)
    }

    /// Anchors of every pool holding `token`, in registration order
    pub fn convertible_token_anchors(&self, token: &TokenId) -> &[TokenId] {
        self.token_anchors
            .get(token)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn converter(&self, anchor: &TokenId) -> Option<&Converter> {
        self.converters.get(anchor)
    }

    pub fn converter_mut(&mut self, anchor: &TokenId) -> Option<&mut Converter> {
        self.converters.get_mut(anchor)
    }

    /// Anchor of the pool whose reserves are exactly `reserve_tokens`
    pub fn liquidity_pool_by_reserves(&self, reserve_tokens: &[TokenId]) -> Option<&TokenId> {
        let first = reserve_tokens.first()?;
        self.convertible_token_anchors(first).iter().find(|anchor| {
            self.converters.get(*anchor).is_some_and(|converter| {
                let tokens = converter.reserve_tokens();
                tokens.len() == reserve_tokens.len()
                    && reserve_tokens.iter().all(|t| tokens.contains(t))
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::standard::StandardPoolConverter;

    fn owner() -> Address {
        Address::new("owner")
    }

    fn pool(anchor: &str, a: &str, b: &str) -> Converter {
        StandardPoolConverter::new(
            TokenId::new(anchor),
            Address::new(format!("converter-{}", anchor)),
            owner(),
            [TokenId::new(a), TokenId::new(b)],
            30_000,
        )
        .unwrap()
        .into()
    }

    #[test]
    fn test_add_and_query() {
        let mut registry = ConverterRegistry::new(owner());
        registry.add_converter(&owner(), pool("p1", "a", "bnt")).unwrap();
        registry.add_converter(&owner(), pool("p2", "b", "bnt")).unwrap();

        assert_eq!(registry.anchor_count(), 2);
        assert!(registry.is_anchor(&TokenId::new("p1")));
        assert!(!registry.is_anchor(&TokenId::new("a")));
        assert_eq!(
            registry.convertible_tokens(),
            &[TokenId::new("a"), TokenId::new("bnt"), TokenId::new("b")]
        );
        assert_eq!(
            registry.convertible_token_anchors(&TokenId::new("bnt")),
            &[TokenId::new("p1"), TokenId::new("p2")]
        );
        assert_eq!(
            registry.liquidity_pool_by_reserves(&[TokenId::new("bnt"), TokenId::new("b")]),
            Some(&TokenId::new("p2"))
        );
        assert!(registry
            .liquidity_pool_by_reserves(&[TokenId::new("a"), TokenId::new("b")])
            .is_none());
    }

    #[test]
    fn test_duplicate_and_access() {
        let mut registry = ConverterRegistry::new(owner());
        registry.add_converter(&owner(), pool("p1", "a", "bnt")).unwrap();
        assert!(matches!(
            registry.add_converter(&owner(), pool("p1", "c", "bnt")),
            Err(Error::InvalidItem(_))
        ));
        assert_eq!(
            registry.add_converter(&Address::new("other"), pool("p2", "c", "bnt")),
            Err(Error::AccessDenied)
        );
    }

    #[test]
    fn test_remove_converter() {
        let mut registry = ConverterRegistry::new(owner());
        registry.add_converter(&owner(), pool("p1", "a", "bnt")).unwrap();
        registry.add_converter(&owner(), pool("p2", "b", "bnt")).unwrap();

        let removed = registry.remove_converter(&owner(), &TokenId::new("p1")).unwrap();
        assert_eq!(removed.anchor(), &TokenId::new("p1"));
        assert!(!registry.is_convertible_token(&TokenId::new("a")));
        assert_eq!(
            registry.convertible_token_anchors(&TokenId::new("bnt")),
            &[TokenId::new("p2")]
        );
        assert!(registry.remove_converter(&owner(), &TokenId::new("p1")).is_err());
    }
}
