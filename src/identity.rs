use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::{
    cache::TtlCache,
    config::IdentityConfig,
    error::{MintError, Result},
};
use tracing::{debug, warn};

/// Farcaster account data as seen by this service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub fid: u64,
    pub username: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub is_pro: bool,
    pub custody_address: Option<String>,
    pub verified_addresses: Vec<String>,
}

/// Subset of the Neynar `user/bulk` response that is used.
#[derive(Debug, Deserialize)]
struct BulkUsersResponse {
    users: Vec<NeynarUser>,
}

#[derive(Debug, Deserialize)]
struct NeynarUser {
    fid: u64,
    #[serde(default)]
    username: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    pfp_url: Option<String>,
    #[serde(default)]
    power_badge: bool,
    #[serde(default)]
    pro: Option<NeynarPro>,
    #[serde(default)]
    custody_address: Option<String>,
    #[serde(default)]
    verified_addresses: Option<NeynarVerified>,
}

#[derive(Debug, Deserialize)]
struct NeynarPro {
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct NeynarVerified {
    #[serde(default)]
    eth_addresses: Vec<String>,
}

impl From<NeynarUser> for Identity {
    fn from(user: NeynarUser) -> Self {
        let subscribed = user
            .pro
            .and_then(|p| p.status)
            .map(|s| s.eq_ignore_ascii_case("subscribed"))
            .unwrap_or(false);
        let display_name = user
            .display_name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| user.username.clone());

        Identity {
            fid: user.fid,
            username: user.username,
            display_name,
            avatar_url: user.pfp_url,
            is_pro: user.power_badge || subscribed,
            custody_address: user.custody_address,
            verified_addresses: user.verified_addresses.unwrap_or_default().eth_addresses,
        }
    }
}

fn parse_bulk_response(body: serde_json::Value, fid: u64) -> Result<Identity> {
    let response: BulkUsersResponse = serde_json::from_value(body)?;
    response
        .users
        .into_iter()
        .find(|u| u.fid == fid)
        .map(Identity::from)
        .ok_or_else(|| MintError::Identity(format!("FID {} not found", fid)))
}

/// Neynar-backed identity lookups with a bounded TTL cache.
pub struct IdentityClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    cache: TtlCache<u64, Identity>,
}

impl IdentityClient {
    pub fn new(config: &IdentityConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            cache: TtlCache::new(
                Duration::from_secs(config.cache_ttl_secs),
                config.cache_capacity,
            ),
        })
    }

    /// Fetch the identity for `fid`, serving from cache when fresh.
    pub async fn lookup(&self, fid: u64) -> Result<Identity> {
        if fid == 0 {
            return Err(MintError::InvalidFid("FID must be positive".to_string()));
        }
        if let Some(identity) = self.cache.get(&fid) {
            debug!("Identity cache hit for FID {}", fid);
            return Ok(identity);
        }

        let url = format!("{}/v2/farcaster/user/bulk", self.api_url);
        let response = self
            .http
            .get(&url)
            .query(&[("fids", fid.to_string())])
            .header("api_key", &self.api_key)
            .header("accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!("Identity lookup for FID {} failed with {}", fid, status);
            return Err(MintError::Identity(format!(
                "identity provider returned {}",
                status
            )));
        }

        let body: serde_json::Value = response.json().await?;
        let identity = parse_bulk_response(body, fid)?;
        self.cache.insert(fid, identity.clone());
        Ok(identity)
    }

    /// Look up several FIDs concurrently; each result stands alone.
    pub async fn lookup_many(&self, fids: &[u64]) -> Vec<(u64, Result<Identity>)> {
        let lookups = fids.iter().map(|&fid| async move { (fid, self.lookup(fid).await) });
        futures::future::join_all(lookups).await
    }

    /// False when no API key is set; lookups would be rejected upstream.
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_power_badge_user() {
        let body = json!({
            "users": [{
                "fid": 3,
                "username": "dwr.eth",
                "display_name": "Dan Romero",
                "pfp_url": "https://example.com/a.png",
                "power_badge": true,
                "custody_address": "0xabc",
                "verified_addresses": { "eth_addresses": ["0xdef"] }
            }]
        });
        let identity = parse_bulk_response(body, 3).unwrap();
        assert_eq!(identity.display_name, "Dan Romero");
        assert!(identity.is_pro);
        assert_eq!(identity.verified_addresses, vec!["0xdef".to_string()]);
    }

    #[test]
    fn test_parse_pro_subscription_and_defaults() {
        let body = json!({
            "users": [{
                "fid": 9,
                "username": "alice",
                "display_name": "",
                "pro": { "status": "subscribed" }
            }]
        });
        let identity = parse_bulk_response(body, 9).unwrap();
        assert!(identity.is_pro);
        assert_eq!(identity.display_name, "alice");
        assert!(identity.avatar_url.is_none());
        assert!(identity.verified_addresses.is_empty());
    }

    #[test]
    fn test_missing_user_is_identity_error() {
        let body = json!({ "users": [] });
        assert!(matches!(parse_bulk_response(body, 1), Err(MintError::Identity(_))));
    }

    #[tokio::test]
    async fn test_zero_fid_rejected_without_network() {
        let client = IdentityClient::new(&IdentityConfig::default()).unwrap();
        assert!(matches!(client.lookup(0).await, Err(MintError::InvalidFid(_))));
        assert_eq!(client.cached(), 0);
        assert!(!client.is_configured());
    }
}
