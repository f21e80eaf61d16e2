//! Account index lookups: which accounts does a public key control?

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{LookupError, Result};
use crate::keys::PublicKey;
use crate::session::{ChainId, PermissionLevel};

/// Root permission that is never offered for login.
pub const OWNER_PERMISSION: &str = "owner";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountFound {
    pub actor: String,
    pub permission: String,
}

impl AccountFound {
    pub fn permission_level(&self) -> PermissionLevel {
        PermissionLevel::new(&self.actor, &self.permission)
    }
}

/// One chain's entry in the lookup response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountLookup {
    #[serde(default)]
    pub accounts: Vec<AccountFound>,
    pub chain_id: String,
}

/// Service that maps public keys to the accounts they control.
#[async_trait]
pub trait AccountIndex: Send + Sync {
    async fn lookup(&self, key: &PublicKey, chain_id: &ChainId) -> Result<Vec<AccountFound>>;
}

/// HTTP client for `GET {base}/lookup/{key}?includeTestnets=true`.
#[derive(Debug, Clone)]
pub struct AccountIndexClient {
    base_url: String,
    client: Client,
}

impl AccountIndexClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LookupError::RequestFailed {
                url: base_url.clone(),
                reason: format!("cannot construct HTTP client: {e}"),
            })?;
        Ok(Self { base_url, client })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn lookup_url(&self, key: &PublicKey) -> Result<String> {
        Ok(format!(
            "{}/lookup/{}?includeTestnets=true",
            self.base_url,
            urlencoding::encode(&key.to_legacy_string()?)
        ))
    }

    /// Every chain's entries for `key`.
    pub async fn lookup_all(&self, key: &PublicKey) -> Result<Vec<AccountLookup>> {
        let url = self.lookup_url(key)?;
        tracing::debug!("Looking up accounts at {}", url);

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| LookupError::RequestFailed {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LookupError::HttpStatus {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let entries = response
            .json::<Vec<AccountLookup>>()
            .await
            .map_err(|e| LookupError::InvalidResponse(e.to_string()))?;
        Ok(entries)
    }
}

#[async_trait]
impl AccountIndex for AccountIndexClient {
    async fn lookup(&self, key: &PublicKey, chain_id: &ChainId) -> Result<Vec<AccountFound>> {
        let entries = self.lookup_all(key).await?;
        Ok(accounts_for_chain(entries, chain_id))
    }
}

/// Accounts of the entry whose chain id matches, or none.
pub fn accounts_for_chain(entries: Vec<AccountLookup>, chain_id: &ChainId) -> Vec<AccountFound> {
    entries
        .into_iter()
        .find(|entry| entry.chain_id == chain_id.as_str())
        .map(|entry| entry.accounts)
        .unwrap_or_default()
}

/// Drop root `owner` permissions; those are never used to log in.
pub fn selectable_accounts(accounts: Vec<AccountFound>) -> Vec<AccountFound> {
    accounts
        .into_iter()
        .filter(|account| account.permission != OWNER_PERMISSION)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn entries(value: serde_json::Value) -> Vec<AccountLookup> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn picks_matching_chain_and_filters_owner() {
        let entries = entries(json!([
            { "chainId": "Y", "accounts": [{ "actor": "bob", "permission": "active" }] },
            {
                "chainId": "X",
                "accounts": [
                    { "actor": "alice", "permission": "owner" },
                    { "actor": "alice", "permission": "active" },
                ],
            },
        ]));

        let accounts = selectable_accounts(accounts_for_chain(entries, &ChainId::new("X")));
        assert_eq!(
            accounts,
            vec![AccountFound {
                actor: "alice".to_string(),
                permission: "active".to_string(),
            }]
        );
        assert_eq!(accounts[0].permission_level().to_string(), "alice@active");
    }

    #[test]
    fn missing_chain_yields_no_accounts() {
        let entries = entries(json!([{ "chainId": "Y", "accounts": [] }]));
        assert!(accounts_for_chain(entries, &ChainId::new("X")).is_empty());
    }

    #[test]
    fn lookup_url_uses_legacy_key() {
        let client =
            AccountIndexClient::new("https://lookup.example/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url(), "https://lookup.example");
        let key: PublicKey = "PUB_K1_6MRyAjQq8ud7hVNYcfnVPJqcVpscN5So8BhtHuGYqET5BoDq63"
            .parse()
            .unwrap();
        assert_eq!(
            client.lookup_url(&key).unwrap(),
            "https://lookup.example/lookup/EOS6MRyAjQq8ud7hVNYcfnVPJqcVpscN5So8BhtHuGYqET5GDW5CV?includeTestnets=true"
        );
    }
}
