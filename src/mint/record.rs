use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::mint::params::Wei;

/// Per-FID mint state.
///
/// `has_minted` only ever moves from `false` to `true`. `is_pro` may be
/// rewritten by the oracle at any time, including after minting; the price
/// actually charged stays in `price_paid`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintRecord {
    pub fid: u64,
    pub has_minted: bool,
    pub token_id: Option<u64>,
    pub is_pro: bool,
    pub price_paid: Option<Wei>,
    pub minted_at: Option<DateTime<Utc>>,
}

impl MintRecord {
    pub fn new(fid: u64) -> Self {
        Self {
            fid,
            has_minted: false,
            token_id: None,
            is_pro: false,
            price_paid: None,
            minted_at: None,
        }
    }

    pub fn with_pro(fid: u64, is_pro: bool) -> Self {
        Self { is_pro, ..Self::new(fid) }
    }

    pub fn status(&self) -> MintStatus {
        if self.has_minted {
            MintStatus::Minted
        } else {
            MintStatus::NeverAttempted
        }
    }

    pub(crate) fn mark_minted(&mut self, token_id: u64, price: Wei, at: DateTime<Utc>) {
        self.has_minted = true;
        self.token_id = Some(token_id);
        self.price_paid = Some(price);
        self.minted_at = Some(at);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MintStatus {
    NeverAttempted,
    Minted,
}

impl std::fmt::Display for MintStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MintStatus::NeverAttempted => write!(f, "NeverAttempted"),
            MintStatus::Minted => write!(f, "Minted"),
        }
    }
}
