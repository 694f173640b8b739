use crate::{
    error::{MintError, Result},
    mint::{params::{MintingParameters, Wei}, record::MintRecord},
};
use tracing::debug;

/// Check whether `fid` may mint under `params`.
///
/// An absent record counts as "not yet minted".
pub fn is_eligible(fid: u64, params: &MintingParameters, record: Option<&MintRecord>) -> bool {
    check_eligibility(fid, params, record).is_ok()
}

/// Same decision as [`is_eligible`], but names the first failing rule.
///
/// Order: validity, pause, uniqueness, range, supply.
pub fn check_eligibility(
    fid: u64,
    params: &MintingParameters,
    record: Option<&MintRecord>,
) -> Result<()> {
    if fid == 0 {
        return Err(MintError::InvalidFid("FID must be positive".to_string()));
    }

    if params.paused {
        return Err(MintError::MintingPaused);
    }

    // Uniqueness outranks range and supply so a minted FID keeps reporting
    // AlreadyMinted after those parameters move.
    if record.map(|r| r.has_minted).unwrap_or(false) {
        return Err(MintError::AlreadyMinted(fid));
    }

    if !params.contains_fid(fid) {
        return Err(MintError::FidOutOfRange {
            fid,
            min: params.min_fid,
            max: params.max_fid,
        });
    }

    if params.supply_exhausted() {
        return Err(MintError::SupplyExhausted(params.current_supply));
    }

    Ok(())
}

/// Price a mint for a caller with the given Pro flag.
pub fn get_mint_price(is_pro: bool, params: &MintingParameters) -> Wei {
    if is_pro && params.require_pro_for_discount {
        params.pro_mint_price
    } else {
        params.base_mint_price
    }
}

/// Snapshot-based checker used by the API and CLI to explain decisions.
pub struct EligibilityChecker<'a> {
    params: &'a MintingParameters,
}

impl<'a> EligibilityChecker<'a> {
    pub fn new(params: &'a MintingParameters) -> Self {
        Self { params }
    }

    pub fn is_eligible(&self, fid: u64, record: Option<&MintRecord>) -> bool {
        let eligible = is_eligible(fid, self.params, record);
        debug!("FID {} eligible: {}", fid, eligible);
        eligible
    }

    pub fn price_for(&self, record: Option<&MintRecord>) -> Wei {
        get_mint_price(record.map(|r| r.is_pro).unwrap_or(false), self.params)
    }

    /// Get detailed eligibility reason
    pub fn get_eligibility_reason(&self, fid: u64, record: Option<&MintRecord>) -> String {
        match check_eligibility(fid, self.params, record) {
            Ok(()) => {
                let pro = record.map(|r| r.is_pro).unwrap_or(false);
                if pro && self.params.require_pro_for_discount {
                    "Eligible (Pro discount applies)".to_string()
                } else {
                    "Eligible".to_string()
                }
            }
            Err(MintError::MintingPaused) => "Minting is currently paused".to_string(),
            Err(MintError::FidOutOfRange { min, max, .. }) => {
                format!("FID must be between {} and {}", min, max)
            }
            Err(MintError::AlreadyMinted(_)) => "This FID has already minted".to_string(),
            Err(MintError::SupplyExhausted(_)) => "All tokens have been minted".to_string(),
            Err(e) => e.to_string(),
        }
    }
}
