//! Conversion Path Finder
//!
//! Finds a conversion path between two tokens through the registered pools.
//! Each side walks toward the network's anchor token depth-first; the two
//! walks are then joined at their shared tail.
//!
//! A path alternates tokens and anchors: `[token, anchor, token, ...]`.

use std::collections::HashSet;

use amm_core::{Address, Ownable, Result, TokenId, Updated};
use serde::{Deserialize, Serialize};

use crate::registry::ConverterRegistry;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionPathFinder {
    ownership: Ownable,
    anchor_token: TokenId,
}

/// One level of the depth-first walk: a token, the anchors it can be
/// converted through, and the connectors of the anchor being explored.
struct Frame {
    token: TokenId,
    anchors: Vec<TokenId>,
    anchor_index: usize,
    connectors: Vec<TokenId>,
    connector_index: usize,
}

impl Frame {
    fn new(registry: &ConverterRegistry, token: TokenId) -> Self {
        let anchors = if registry.is_anchor(&token) {
            vec![token.clone()]
        } else {
            registry.convertible_token_anchors(&token).to_vec()
        };
        let connectors = anchors
            .first()
            .map(|anchor| connectors_of(registry, anchor, &token))
            .unwrap_or_default();
        Self {
            token,
            anchors,
            anchor_index: 0,
            connectors,
            connector_index: 0,
        }
    }

    /// Next connector to descend into, advancing across anchors
    fn next_connector(&mut self, registry: &ConverterRegistry) -> Option<TokenId> {
        loop {
            if self.anchor_index >= self.anchors.len() {
                return None;
            }
            if let Some(connector) = self.connectors.get(self.connector_index) {
                self.connector_index += 1;
                return Some(connector.clone());
            }
            self.anchor_index += 1;
            self.connector_index = 0;
            self.connectors = self
                .anchors
                .get(self.anchor_index)
                .map(|anchor| connectors_of(registry, anchor, &self.token))
                .unwrap_or_default();
        }
    }

    fn current_anchor(&self) -> Option<&TokenId> {
        self.anchors.get(self.anchor_index)
    }
}

fn connectors_of(registry: &ConverterRegistry, anchor: &TokenId, token: &TokenId) -> Vec<TokenId> {
    registry
        .converter(anchor)
        .map(|converter| {
            converter
                .reserve_tokens()
                .into_iter()
                .filter(|connector| connector != token)
                .collect()
        })
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Path finding
// ---------------------------------------------------------------------------

impl ConversionPathFinder {
    pub fn new(owner: Address, anchor_token: TokenId) -> Self {
        Self {
            ownership: Ownable::new(owner),
            anchor_token,
        }
    }

    pub fn anchor_token(&self) -> &TokenId {
        &self.anchor_token
    }

    pub fn set_anchor_token(&mut self, caller: &Address, token: TokenId) -> Result<Updated<TokenId>> {
        self.ownership.ensure_owner(caller)?;
        let previous = std::mem::replace(&mut self.anchor_token, token.clone());
        Ok(Updated::new(previous, token))
    }

    /// Conversion path from `source` to `target`, empty when none exists
    pub fn find_path(
        &self,
        registry: &ConverterRegistry,
        source: &TokenId,
        target: &TokenId,
    ) -> Vec<TokenId> {
        let source_path = self.token_path(registry, source);
        let target_path = self.token_path(registry, target);
        let path = merge_paths(&source_path, &target_path);
        tracing::debug!(
            source = %source,
            target = %target,
            hops = path.len() / 2,
            "Conversion path"
        );
        path
    }

    /// Path from `token` to the anchor token, or empty
    pub fn token_path(&self, registry: &ConverterRegistry, token: &TokenId) -> Vec<TokenId> {
        if token == &self.anchor_token {
            return vec![token.clone()];
        }

        let mut stack = vec![Frame::new(registry, token.clone())];
        let mut on_path: HashSet<TokenId> = HashSet::from([token.clone()]);

        while let Some(frame) = stack.last_mut() {
            let Some(connector) = frame.next_connector(registry) else {
                if let Some(done) = stack.pop() {
                    on_path.remove(&done.token);
                }
                continue;
            };

            if connector == self.anchor_token {
                let mut path = Vec::with_capacity(stack.len() * 2 + 1);
                for frame in &stack {
                    path.push(frame.token.clone());
                    if let Some(anchor) = frame.current_anchor() {
                        path.push(anchor.clone());
                    }
                }
                path.push(connector);
                return path;
            }

            if on_path.insert(connector.clone()) {
                stack.push(Frame::new(registry, connector));
            }
        }

        Vec::new()
    }
}

/// Join two anchor-token paths at their shared tail.
///
/// The common suffix is dropped, the target path is appended reversed, and
/// any token reachable again later in the path is short-circuited.
pub fn merge_paths(source_path: &[TokenId], target_path: &[TokenId]) -> Vec<TokenId> {
    if source_path.is_empty() || target_path.is_empty() {
        return Vec::new();
    }

    let mut i = source_path.len();
    let mut j = target_path.len();
    while i > 0 && j > 0 && source_path[i - 1] == target_path[j - 1] {
        i -= 1;
        j -= 1;
    }

    // keep the last shared token once
    let mut path: Vec<TokenId> = source_path[..=i.min(source_path.len() - 1)].to_vec();
    path.extend(target_path[..j].iter().rev().cloned());

    let mut merged = Vec::with_capacity(path.len());
    let mut p = 0;
    while p < path.len() {
        let mut q = p + 2;
        while q < path.len() - (p % 2) {
            if path[p] == path[q] {
                p = q;
            }
            q += 2;
        }
        merged.push(path[p].clone());
        p += 1;
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::standard::StandardPoolConverter;

    fn t(id: &str) -> TokenId {
        TokenId::new(id)
    }

    fn owner() -> Address {
        Address::new("owner")
    }

    fn registry(pools: &[(&str, &str, &str)]) -> ConverterRegistry {
        let mut registry = ConverterRegistry::new(owner());
        for (anchor, a, b) in pools {
            let converter = StandardPoolConverter::new(
                t(anchor),
                Address::new(format!("converter-{}", anchor)),
                owner(),
                [t(a), t(b)],
                30_000,
            )
            .unwrap();
            registry.add_converter(&owner(), converter.into()).unwrap();
        }
        registry
    }

    fn network() -> ConverterRegistry {
        registry(&[
            ("aaabnt", "aaa", "bnt"),
            ("bbbbnt", "bbb", "bnt"),
            ("cccbnt", "ccc", "bnt"),
            // pool of a pool token
            ("dddaaa", "ddd", "aaabnt"),
            ("aaabntbnt", "aaabnt", "bnt"),
        ])
    }

    #[test]
    fn test_token_path_to_anchor_token() {
        let registry = network();
        let finder = ConversionPathFinder::new(owner(), t("bnt"));

        assert_eq!(finder.token_path(&registry, &t("bnt")), vec![t("bnt")]);
        assert_eq!(
            finder.token_path(&registry, &t("aaa")),
            vec![t("aaa"), t("aaabnt"), t("bnt")]
        );
        // a pool token converts through its own pool first
        assert_eq!(
            finder.token_path(&registry, &t("ddd")),
            vec![
                t("ddd"),
                t("dddaaa"),
                t("aaabnt"),
                t("aaabnt"),
                t("aaa"),
                t("aaabnt"),
                t("bnt")
            ]
        );
        assert!(finder.token_path(&registry, &t("zzz")).is_empty());
    }

    #[test]
    fn test_find_path_between_pools() {
        let registry = network();
        let finder = ConversionPathFinder::new(owner(), t("bnt"));

        assert_eq!(
            finder.find_path(&registry, &t("aaa"), &t("bbb")),
            vec![t("aaa"), t("aaabnt"), t("bnt"), t("bbbbnt"), t("bbb")]
        );
        assert_eq!(
            finder.find_path(&registry, &t("bnt"), &t("ccc")),
            vec![t("bnt"), t("cccbnt"), t("ccc")]
        );
        assert_eq!(
            finder.find_path(&registry, &t("ccc"), &t("bnt")),
            vec![t("ccc"), t("cccbnt"), t("bnt")]
        );
        assert!(finder.find_path(&registry, &t("aaa"), &t("zzz")).is_empty());
    }

    #[test]
    fn test_find_path_collapses_shared_segments() {
        let registry = network();
        let finder = ConversionPathFinder::new(owner(), t("bnt"));
        // ddd -> dddaaa -> aaabnt, and aaabnt is itself a pool token
        assert_eq!(
            finder.find_path(&registry, &t("ddd"), &t("aaabnt")),
            vec![t("ddd"), t("dddaaa"), t("aaabnt")]
        );
        assert_eq!(
            finder.find_path(&registry, &t("aaa"), &t("aaa")),
            vec![t("aaa")]
        );
    }

    #[test]
    fn test_cycles_terminate() {
        // no route to the anchor token, connected in a loop
        let registry = registry(&[("xy", "x", "y"), ("yz", "y", "z"), ("zx", "z", "x")]);
        let finder = ConversionPathFinder::new(owner(), t("bnt"));
        assert!(finder.token_path(&registry, &t("x")).is_empty());
    }

    #[test]
    fn test_merge_paths() {
        let source = vec![t("a"), t("p1"), t("bnt")];
        let target = vec![t("b"), t("p2"), t("bnt")];
        assert_eq!(
            merge_paths(&source, &target),
            vec![t("a"), t("p1"), t("bnt"), t("p2"), t("b")]
        );
        assert!(merge_paths(&source, &[]).is_empty());
    }

    #[test]
    fn test_set_anchor_token() {
        let mut finder = ConversionPathFinder::new(owner(), t("bnt"));
        assert!(finder
            .set_anchor_token(&Address::new("other"), t("usdb"))
            .is_err());
        let updated = finder.set_anchor_token(&owner(), t("usdb")).unwrap();
        assert_eq!(updated, Updated::new(t("bnt"), t("usdb")));
        assert_eq!(finder.anchor_token(), &t("usdb"));
    }
}
