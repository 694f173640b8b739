use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "fid-mint")]
#[command(about = "FID-gated mint service with Pro pricing, admin API and Telegram alerts")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file (extension optional)
    #[arg(short, long, global = true, default_value = "config/default")]
    pub config: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    Toml,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP API (and the Telegram bot when configured)
    Serve,

    /// Check eligibility and price for a FID
    Check {
        fid: u64,

        /// Quote the Pro price regardless of the stored flag
        #[arg(long)]
        pro: bool,
    },

    /// Mint for a FID, paying the given amount of ether
    Mint {
        fid: u64,

        /// Payment in ether, e.g. 0.001
        #[arg(short, long)]
        payment: String,

        /// Mark the FID as Pro before minting
        #[arg(long)]
        pro: bool,

        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Show current minting parameters
    Params {
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Set the eligible FID range (inclusive)
    SetRange { min_fid: u64, max_fid: u64 },

    /// Set base and Pro prices in ether
    SetPrices { base: String, pro: String },

    /// Pause minting
    Pause,

    /// Resume minting
    Resume,

    /// Set the Pro flag for a FID
    SetPro {
        fid: u64,
        #[arg(action = clap::ArgAction::Set)]
        is_pro: bool,
    },

    /// Set the supply cap; omit the value to remove it
    SetMaxSupply { max_supply: Option<u64> },

    /// Set or clear the oracle identity
    SetOracle { oracle: Option<String> },

    /// Hand the owner role to a new identity
    TransferOwnership {
        new_owner: String,

        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Show statistics and recent mints
    Stats {
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Show the parameter change audit log
    History {
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Look up Farcaster identities
    User {
        #[arg(required = true)]
        fids: Vec<u64>,
    },

    /// Initialize database and configuration
    Init,

    /// Start Telegram bot interface
    Telegram,
}
