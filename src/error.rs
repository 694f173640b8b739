use thiserror::Error;

/// Broad classes a [`MintError`] falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Eligibility,
    Payment,
    Authorization,
    Invariant,
    Infrastructure,
}

#[derive(Error, Debug)]
pub enum MintError {
    #[error("Invalid FID: {0}")]
    InvalidFid(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("FID {fid} is outside the eligible range {min}..={max}")]
    FidOutOfRange { fid: u64, min: u64, max: u64 },

    #[error("FID {0} has already minted")]
    AlreadyMinted(u64),

    #[error("Supply exhausted ({0} minted)")]
    SupplyExhausted(u64),

    #[error("Minting is paused")]
    MintingPaused,

    #[error("Insufficient payment: required {required} wei, provided {provided} wei")]
    InsufficientPayment { required: u128, provided: u128 },

    #[error("Unauthorized parameter change by {0}")]
    Unauthorized(String),

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Ledger changed in another process (revision {expected}, now {found})")]
    ConcurrentUpdate { expected: u64, found: u64 },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Identity provider error: {0}")]
    Identity(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl MintError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MintError::InvalidFid(_) | MintError::InvalidAmount(_) => ErrorKind::Validation,
            MintError::FidOutOfRange { .. }
            | MintError::AlreadyMinted(_)
            | MintError::SupplyExhausted(_)
            | MintError::MintingPaused => ErrorKind::Eligibility,
            MintError::InsufficientPayment { .. } => ErrorKind::Payment,
            MintError::Unauthorized(_) => ErrorKind::Authorization,
            MintError::InvariantViolation(_) => ErrorKind::Invariant,
            _ => ErrorKind::Infrastructure,
        }
    }

    /// Stable numeric code reported to API clients.
    pub fn code(&self) -> u32 {
        match self {
            MintError::InvalidFid(_) => 1001,
            MintError::InvalidAmount(_) => 1002,
            MintError::FidOutOfRange { .. } => 2001,
            MintError::AlreadyMinted(_) => 2002,
            MintError::SupplyExhausted(_) => 2003,
            MintError::MintingPaused => 2004,
            MintError::InsufficientPayment { .. } => 3001,
            MintError::Unauthorized(_) => 4001,
            MintError::InvariantViolation(_) => 5001,
            MintError::Identity(_) | MintError::Http(_) => 6001,
            MintError::ConcurrentUpdate { .. } => 7001,
            _ => 9000,
        }
    }
}

pub type Result<T> = std::result::Result<T, MintError>;
