use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

/// Row of the `parameter_changes` audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterChange {
    pub id: i64,
    pub actor: String,
    pub role: String,
    pub action: String,
    pub detail: String,
    pub timestamp: DateTime<Utc>,
}

/// Roles persisted alongside the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRoles {
    pub owner: String,
    pub oracle: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MintStats {
    pub total_minted: u64,
    pub pro_mints: u64,
    pub pro_fids: u64,
    /// Sum of prices paid, in wei. Serialized as a string to survive JSON consumers.
    #[serde(with = "wei_string")]
    pub total_revenue: u128,
    pub parameter_changes: u64,
    pub last_mint_at: Option<DateTime<Utc>>,
}

impl MintStats {
    pub fn avg_price(&self) -> u128 {
        if self.total_minted == 0 {
            0
        } else {
            self.total_revenue / self.total_minted as u128
        }
    }
}

pub(crate) mod wei_string {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_serialize_revenue_as_string() {
        let stats = MintStats {
            total_minted: 2,
            total_revenue: 20_000_000_000_000_000_000,
            ..Default::default()
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["total_revenue"], "20000000000000000000");
        assert_eq!(stats.avg_price(), 10_000_000_000_000_000_000);
        let back: MintStats = serde_json::from_value(json).unwrap();
        assert_eq!(back.total_revenue, stats.total_revenue);
    }
}
