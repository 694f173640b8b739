use serde::{Deserialize, Serialize};
use crate::error::{MintError, Result};

/// Amount in the chain's smallest unit.
pub type Wei = u128;

/// Largest FID or supply value the SQLite INTEGER columns can hold.
pub const MAX_STORABLE: u64 = i64::MAX as u64;

/// Process-wide minting parameters.
///
/// Invariants held by every constructed value:
/// - `max_fid >= min_fid`
/// - `base_mint_price >= pro_mint_price`
/// - `current_supply <= max_supply` when a cap is set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintingParameters {
    pub min_fid: u64,
    pub max_fid: u64,
    pub base_mint_price: Wei,
    pub pro_mint_price: Wei,
    /// `None` means unlimited supply; uniqueness per FID still applies.
    pub max_supply: Option<u64>,
    pub current_supply: u64,
    pub paused: bool,
    pub require_pro_for_discount: bool,
}

impl MintingParameters {
    pub fn new(
        min_fid: u64,
        max_fid: u64,
        base_mint_price: Wei,
        pro_mint_price: Wei,
        max_supply: Option<u64>,
    ) -> Result<Self> {
        let params = Self {
            min_fid,
            max_fid,
            base_mint_price,
            pro_mint_price,
            max_supply,
            current_supply: 0,
            paused: false,
            require_pro_for_discount: true,
        };
        params.validate()?;
        Ok(params)
    }

    /// Check every invariant, reporting the first one broken.
    pub fn validate(&self) -> Result<()> {
        validate_fid_range(self.min_fid, self.max_fid)?;
        validate_prices(self.base_mint_price, self.pro_mint_price)?;
        validate_max_supply(self.max_supply, self.current_supply)?;
        Ok(())
    }

    pub fn contains_fid(&self, fid: u64) -> bool {
        fid >= self.min_fid && fid <= self.max_fid
    }

    pub fn supply_exhausted(&self) -> bool {
        matches!(self.max_supply, Some(cap) if self.current_supply >= cap)
    }

    pub fn remaining_supply(&self) -> Option<u64> {
        self.max_supply.map(|cap| cap.saturating_sub(self.current_supply))
    }
}

pub fn validate_fid_range(min_fid: u64, max_fid: u64) -> Result<()> {
    if min_fid == 0 {
        return Err(MintError::InvariantViolation(
            "min_fid must be a positive FID".to_string(),
        ));
    }
    if max_fid < min_fid {
        return Err(MintError::InvariantViolation(format!(
            "max_fid ({}) must be >= min_fid ({})",
            max_fid, min_fid
        )));
    }
    if max_fid > MAX_STORABLE {
        return Err(MintError::InvariantViolation(format!(
            "max_fid ({}) exceeds the storable maximum ({})",
            max_fid, MAX_STORABLE
        )));
    }
    Ok(())
}

pub fn validate_prices(base_mint_price: Wei, pro_mint_price: Wei) -> Result<()> {
    if pro_mint_price > base_mint_price {
        return Err(MintError::InvariantViolation(format!(
            "pro_mint_price ({}) must not exceed base_mint_price ({})",
            pro_mint_price, base_mint_price
        )));
    }
    Ok(())
}

pub fn validate_max_supply(max_supply: Option<u64>, current_supply: u64) -> Result<()> {
    match max_supply {
        Some(0) => Err(MintError::InvariantViolation(
            "max_supply must be positive".to_string(),
        )),
        Some(cap) if cap < current_supply => Err(MintError::InvariantViolation(format!(
            "max_supply ({}) is below current supply ({})",
            cap, current_supply
        ))),
        Some(cap) if cap > MAX_STORABLE => Err(MintError::InvariantViolation(format!(
            "max_supply ({}) exceeds the storable maximum ({})",
            cap, MAX_STORABLE
        ))),
        _ => Ok(()),
    }
}
