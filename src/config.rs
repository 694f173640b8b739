use serde::Deserialize;
use crate::{mint::MintingParameters, utils};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub mint: MintConfig,
    pub roles: RolesConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    pub database: DatabaseConfig,
    pub telegram: Option<TelegramConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MintConfig {
    pub min_fid: u64,
    pub max_fid: u64,
    /// Decimal ether, e.g. "0.001"
    pub base_price_eth: String,
    pub pro_price_eth: String,
    pub max_supply: Option<u64>,
    #[serde(default = "default_true")]
    pub require_pro_for_discount: bool,
    #[serde(default)]
    pub paused: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RolesConfig {
    pub owner: String,
    pub oracle: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default)]
    pub admin_token: String,
    pub oracle_token: Option<String>,
    #[serde(default = "default_true")]
    pub cors_allow_any: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            admin_token: String::new(),
            oracle_token: None,
            cors_allow_any: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct IdentityConfig {
    #[serde(default = "default_identity_url")]
    pub api_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            api_url: default_identity_url(),
            api_key: String::new(),
            cache_ttl_secs: default_cache_ttl(),
            cache_capacity: default_cache_capacity(),
            timeout_secs: default_timeout(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    #[serde(default)]
    pub authorized_users: Vec<u64>,
    #[serde(default = "default_true")]
    pub notifications_enabled: bool,
}

fn default_true() -> bool {
    true
}

fn default_bind_address() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_identity_url() -> String {
    "https://api.neynar.com".to_string()
}

fn default_cache_ttl() -> u64 {
    300
}

fn default_cache_capacity() -> usize {
    10_000
}

fn default_timeout() -> u64 {
    10
}

impl Config {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("FIDMINT")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.initial_params()?;
        Ok(config)
    }

    /// Parameters a brand new ledger starts from.
    pub fn initial_params(&self) -> anyhow::Result<MintingParameters> {
        let base = utils::eth_to_wei(&self.mint.base_price_eth)
            .map_err(|e| anyhow::anyhow!("Invalid base_price_eth: {}", e))?;
        let pro = utils::eth_to_wei(&self.mint.pro_price_eth)
            .map_err(|e| anyhow::anyhow!("Invalid pro_price_eth: {}", e))?;

        let mut params = MintingParameters::new(
            self.mint.min_fid,
            self.mint.max_fid,
            base,
            pro,
            self.mint.max_supply,
        )?;
        params.paused = self.mint.paused;
        params.require_pro_for_discount = self.mint.require_pro_for_discount;
        Ok(params)
    }
}
