// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Cosmos chain support: the static chain registry, public key handling,
//! and amino sign-doc reconstruction for signed-envelope verification.

pub mod pubkey;
pub mod signdoc;

pub use pubkey::{ChainPublicKey, PublicKeyError, PublicKeyType};
pub use signdoc::serialize_sign_doc;

/// Static parameters of a supported chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainInfo {
    pub chain_id: &'static str,
    pub bech32_prefix: &'static str,
    pub fee_denom: &'static str,
}

/// Chains this service can render addresses for.
///
/// Chain preferences may only be set for chains listed here; the signed
/// envelope itself carries its own prefix and fee denom, so verification
/// does not depend on this table.
pub const KNOWN_CHAINS: &[ChainInfo] = &[
    ChainInfo {
        chain_id: "juno-1",
        bech32_prefix: "juno",
        fee_denom: "ujuno",
    },
    ChainInfo {
        chain_id: "uni-6",
        bech32_prefix: "juno",
        fee_denom: "ujunox",
    },
    ChainInfo {
        chain_id: "osmosis-1",
        bech32_prefix: "osmo",
        fee_denom: "uosmo",
    },
    ChainInfo {
        chain_id: "osmo-test-5",
        bech32_prefix: "osmo",
        fee_denom: "uosmo",
    },
    ChainInfo {
        chain_id: "cosmoshub-4",
        bech32_prefix: "cosmos",
        fee_denom: "uatom",
    },
    ChainInfo {
        chain_id: "neutron-1",
        bech32_prefix: "neutron",
        fee_denom: "untrn",
    },
    ChainInfo {
        chain_id: "stargaze-1",
        bech32_prefix: "stars",
        fee_denom: "ustars",
    },
    ChainInfo {
        chain_id: "migaloo-1",
        bech32_prefix: "migaloo",
        fee_denom: "uwhale",
    },
    ChainInfo {
        chain_id: "injective-1",
        bech32_prefix: "inj",
        fee_denom: "inj",
    },
];

/// Look up a chain by ID.
pub fn get_chain(chain_id: &str) -> Option<&'static ChainInfo> {
    KNOWN_CHAINS.iter().find(|c| c.chain_id == chain_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_chain_finds_known_and_rejects_unknown() {
        assert_eq!(get_chain("juno-1").unwrap().bech32_prefix, "juno");
        assert_eq!(get_chain("injective-1").unwrap().bech32_prefix, "inj");
        assert!(get_chain("not-a-chain").is_none());
    }
}
