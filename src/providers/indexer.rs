// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Chain indexer client.
//!
//! The indexer answers contract queries over plain HTTP:
//! `/{chainId}/contract/{address}/{formula}?{args}`. This service uses it
//! for three things: DAO voting power (membership), the DAO's DNAS widget
//! config, and cw721 ownership/metadata for profile NFTs.
//!
//! No caching and no retries; a transport failure surfaces to the caller.

use std::env;

use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::config::{DEFAULT_INDEXER_BASE_URL, INDEXER_BASE_URL_ENV};

/// Item key under which a DAO stores its DNAS widget config.
const DDNAS_WIDGET_ITEM: &str = "widget%3Addnas";

#[derive(Debug, thiserror::Error)]
pub enum IndexerError {
    #[error("indexer request failed: {0}")]
    Request(String),

    #[error("indexer returned an error: {0}")]
    Upstream(String),

    #[error("indexer response was invalid: {0}")]
    InvalidResponse(String),
}

/// DNAS widget config a DAO publishes to opt into credential delegation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DnasWidgetParams {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub default_expiration: i64,
}

/// HTTP client for the chain indexer.
#[derive(Debug, Clone)]
pub struct IndexerClient {
    base_url: String,
    http: Client,
}

impl IndexerClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: Client::new(),
        }
    }

    pub fn from_env() -> Self {
        let base_url =
            env::var(INDEXER_BASE_URL_ENV).unwrap_or_else(|_| DEFAULT_INDEXER_BASE_URL.into());
        let parsed: url::Url = base_url
            .parse()
            .expect("INDEXER_BASE_URL must be a valid URL");
        Self::new(parsed.as_str())
    }

    /// Voting power of an address in a DAO, as the indexer reports it.
    ///
    /// The indexer responds with a bare number or a JSON string depending on
    /// deployment; both forms normalize to a string here.
    pub async fn voting_power(
        &self,
        chain_id: &str,
        member_address: &str,
        dao_address: &str,
    ) -> Result<String, IndexerError> {
        let url = format!(
            "{}/{}/contract/{}/daoCore/votingPower",
            self.base_url, chain_id, dao_address
        );
        let response = self
            .http
            .get(url)
            .query(&[("address", member_address)])
            .send()
            .await
            .map_err(|e| IndexerError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_else(|_| "Unknown error.".into());
            return Err(IndexerError::Upstream(body));
        }

        let text = response
            .text()
            .await
            .map_err(|e| IndexerError::InvalidResponse(e.to_string()))?;
        Ok(normalize_power(&text))
    }

    /// Membership check: non-zero voting power.
    pub async fn is_dao_member(
        &self,
        chain_id: &str,
        member_address: &str,
        dao_address: &str,
    ) -> Result<bool, IndexerError> {
        let power = self
            .voting_power(chain_id, member_address, dao_address)
            .await?;
        Ok(!power.is_empty() && power != "0")
    }

    /// The DAO's DNAS widget config, if the widget is enabled.
    pub async fn dnas_widget_params(
        &self,
        chain_id: &str,
        dao_address: &str,
    ) -> Result<Option<DnasWidgetParams>, IndexerError> {
        let url = format!(
            "{}/{}/contract/{}/daoCore/item?key={}",
            self.base_url, chain_id, dao_address, DDNAS_WIDGET_ITEM
        );
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| IndexerError::Request(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_else(|_| "Unknown error.".into());
            return Err(IndexerError::Upstream(body));
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| IndexerError::InvalidResponse(e.to_string()))?;
        if value.is_null() {
            return Ok(None);
        }
        // DAOs store items as strings; accept an embedded JSON document too.
        let params = match &value {
            Value::String(raw) => serde_json::from_str(raw),
            other => serde_json::from_value(other.clone()),
        }
        .map_err(|e| IndexerError::InvalidResponse(e.to_string()))?;
        Ok(Some(params))
    }

    /// Image URL of an NFT, if `owner_address` currently owns it.
    ///
    /// Returns `None` when the token is owned by someone else or carries no
    /// image; lookup errors propagate.
    pub async fn owned_nft_image_url(
        &self,
        chain_id: &str,
        owner_address: &str,
        collection_address: &str,
        token_id: &str,
    ) -> Result<Option<String>, IndexerError> {
        let owner_url = format!(
            "{}/{}/contract/{}/cw721/ownerOf",
            self.base_url, chain_id, collection_address
        );
        let owner: Value = self
            .http
            .get(owner_url)
            .query(&[("tokenId", token_id)])
            .send()
            .await
            .map_err(|e| IndexerError::Request(e.to_string()))?
            .json()
            .await
            .map_err(|e| IndexerError::InvalidResponse(e.to_string()))?;

        if owner.get("owner").and_then(Value::as_str) != Some(owner_address) {
            return Ok(None);
        }

        let info_url = format!(
            "{}/{}/contract/{}/cw721/nftInfo",
            self.base_url, chain_id, collection_address
        );
        let info: Value = self
            .http
            .get(info_url)
            .query(&[("tokenId", token_id)])
            .send()
            .await
            .map_err(|e| IndexerError::Request(e.to_string()))?
            .json()
            .await
            .map_err(|e| IndexerError::InvalidResponse(e.to_string()))?;

        let image = info
            .pointer("/extension/image")
            .or_else(|| info.get("token_uri"))
            .and_then(Value::as_str)
            .map(str::to_string);
        Ok(image)
    }
}

/// Strip quoting and whitespace from a voting power response.
fn normalize_power(raw: &str) -> String {
    let trimmed = raw.trim();
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::String(s)) => s,
        Ok(Value::Number(n)) => n.to_string(),
        Ok(Value::Null) => String::new(),
        _ => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_power_handles_indexer_response_shapes() {
        assert_eq!(normalize_power("\"123\""), "123");
        assert_eq!(normalize_power("123"), "123");
        assert_eq!(normalize_power(" 0\n"), "0");
        assert_eq!(normalize_power("null"), "");
        assert_eq!(normalize_power("raw-text"), "raw-text");
    }

    #[test]
    fn membership_rule_is_nonzero_power() {
        for (power, member) in [("0", false), ("", false), ("1", true), ("250", true)] {
            let is_member = !power.is_empty() && power != "0";
            assert_eq!(is_member, member, "power {power:?}");
        }
    }

    #[test]
    fn widget_params_parse_from_item_string() {
        let raw = r#"{"version":"1.0.0","defaultExpiration":300}"#;
        let params: DnasWidgetParams = serde_json::from_str(raw).unwrap();
        assert_eq!(params.version, "1.0.0");
        assert_eq!(params.default_expiration, 300);

        // Missing fields default instead of failing the whole check.
        let params: DnasWidgetParams = serde_json::from_str("{}").unwrap();
        assert_eq!(params.version, "");
    }
}
