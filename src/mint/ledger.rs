use std::collections::HashMap;
use chrono::{DateTime, Utc};
use serde::Serialize;
use crate::{
    error::{MintError, Result},
    mint::{
        eligibility::{check_eligibility, get_mint_price},
        params::{validate_fid_range, validate_max_supply, validate_prices, MintingParameters, Wei, MAX_STORABLE},
        record::MintRecord,
    },
};
use tracing::{debug, info, warn};

/// Capability a caller holds over the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Role {
    Owner,
    Oracle,
}

/// Outcome of a successful mint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MintReceipt {
    pub fid: u64,
    pub token_id: u64,
    pub price: Wei,
    pub is_pro: bool,
    pub current_supply: u64,
}

/// A validated mint that has not been applied yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMint {
    pub fid: u64,
    pub token_id: u64,
    pub price: Wei,
    pub is_pro: bool,
    pub minted_at: DateTime<Utc>,
}

impl PendingMint {
    fn same_terms(&self, other: &PendingMint) -> bool {
        self.fid == other.fid
            && self.token_id == other.token_id
            && self.price == other.price
            && self.is_pro == other.is_pro
    }
}

/// Audit entry for an administrative update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdminChange {
    pub actor: String,
    pub role: Role,
    pub action: String,
    pub detail: String,
}

/// Authoritative mint state: parameters, per-FID records and the token counter.
///
/// All mutation goes through `&mut self`, so a single owner serialises every
/// commit. Wrap it in a lock to share it.
#[derive(Debug, Clone)]
pub struct MintLedger {
    params: MintingParameters,
    records: HashMap<u64, MintRecord>,
    next_token_id: u64,
    owner: String,
    oracle: Option<String>,
}

impl MintLedger {
    pub fn new(params: MintingParameters, owner: impl Into<String>, oracle: Option<String>) -> Result<Self> {
        params.validate()?;
        let owner = owner.into();
        if owner.trim().is_empty() {
            return Err(MintError::InvariantViolation("owner must not be empty".to_string()));
        }
        Ok(Self {
            params,
            records: HashMap::new(),
            next_token_id: 0,
            owner,
            oracle,
        })
    }

    /// Rebuild a ledger from persisted state.
    pub fn from_parts(
        mut params: MintingParameters,
        records: Vec<MintRecord>,
        next_token_id: u64,
        owner: String,
        oracle: Option<String>,
    ) -> Result<Self> {
        let minted = records.iter().filter(|r| r.has_minted).count() as u64;
        if params.current_supply != minted {
            warn!(
                "Stored supply {} disagrees with {} minted records, using record count",
                params.current_supply, minted
            );
            params.current_supply = minted;
        }
        let highest = records.iter().filter_map(|r| r.token_id).max();
        if let Some(highest) = highest {
            if highest >= next_token_id {
                return Err(MintError::InvariantViolation(format!(
                    "token id {} already issued but counter is at {}",
                    highest, next_token_id
                )));
            }
        }

        let mut ledger = Self::new(params, owner, oracle)?;
        ledger.next_token_id = next_token_id;
        ledger.records = records.into_iter().map(|r| (r.fid, r)).collect();
        Ok(ledger)
    }

    pub fn params(&self) -> &MintingParameters {
        &self.params
    }

    pub fn record(&self, fid: u64) -> Option<&MintRecord> {
        self.records.get(&fid)
    }

    pub fn records(&self) -> impl Iterator<Item = &MintRecord> {
        self.records.values()
    }

    pub fn has_minted(&self, fid: u64) -> bool {
        self.record(fid).map(|r| r.has_minted).unwrap_or(false)
    }

    pub fn is_pro(&self, fid: u64) -> bool {
        self.record(fid).map(|r| r.is_pro).unwrap_or(false)
    }

    pub fn total_minted(&self) -> u64 {
        self.params.current_supply
    }

    pub fn next_token_id(&self) -> u64 {
        self.next_token_id
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn oracle(&self) -> Option<&str> {
        self.oracle.as_deref()
    }

    pub fn is_eligible(&self, fid: u64) -> bool {
        check_eligibility(fid, &self.params, self.record(fid)).is_ok()
    }

    /// Price `fid` would pay right now.
    pub fn price_for(&self, fid: u64) -> Wei {
        get_mint_price(self.is_pro(fid), &self.params)
    }

    /// Run every mint precondition without touching state.
    ///
    /// Checked in order: FID validity, eligibility, payment.
    pub fn prepare_mint(&self, fid: u64, payment: Wei) -> Result<PendingMint> {
        if fid == 0 {
            return Err(MintError::InvalidFid("FID must be positive".to_string()));
        }

        check_eligibility(fid, &self.params, self.record(fid))?;

        let is_pro = self.is_pro(fid);
        let price = get_mint_price(is_pro, &self.params);
        if payment < price {
            return Err(MintError::InsufficientPayment {
                required: price,
                provided: payment,
            });
        }

        Ok(PendingMint {
            fid,
            token_id: self.next_token_id,
            price,
            is_pro,
            minted_at: Utc::now(),
        })
    }

    /// The record `fid` will hold once `pending` is committed.
    pub fn preview_record(&self, pending: &PendingMint) -> MintRecord {
        let mut record = self
            .record(pending.fid)
            .cloned()
            .unwrap_or_else(|| MintRecord::new(pending.fid));
        record.mark_minted(pending.token_id, pending.price, pending.minted_at);
        record
    }

    /// Apply a mint produced by [`prepare_mint`](Self::prepare_mint).
    ///
    /// Re-checks the preconditions so a stale pending mint cannot double-mint.
    pub fn commit_mint(&mut self, pending: PendingMint) -> Result<MintReceipt> {
        let fresh = self.prepare_mint(pending.fid, pending.price)?;
        if !fresh.same_terms(&pending) {
            return Err(MintError::InvariantViolation(format!(
                "ledger changed while mint for FID {} was pending",
                pending.fid
            )));
        }

        let record = self
            .records
            .entry(pending.fid)
            .or_insert_with(|| MintRecord::new(pending.fid));
        record.mark_minted(pending.token_id, pending.price, pending.minted_at);
        self.params.current_supply += 1;
        self.next_token_id += 1;

        info!(
            "Minted token {} for FID {} at {} wei (pro: {})",
            pending.token_id, pending.fid, pending.price, pending.is_pro
        );

        Ok(MintReceipt {
            fid: pending.fid,
            token_id: pending.token_id,
            price: pending.price,
            is_pro: pending.is_pro,
            current_supply: self.params.current_supply,
        })
    }

    /// Validate and commit a mint in one step.
    pub fn attempt_mint(&mut self, fid: u64, payment: Wei) -> Result<MintReceipt> {
        let pending = match self.prepare_mint(fid, payment) {
            Ok(p) => p,
            Err(e) => {
                debug!("Mint rejected for FID {}: {}", fid, e);
                return Err(e);
            }
        };
        self.commit_mint(pending)
    }

    fn authorize(&self, caller: &str, allow_oracle: bool) -> Result<Role> {
        if caller == self.owner {
            return Ok(Role::Owner);
        }
        if allow_oracle && self.oracle.as_deref() == Some(caller) {
            return Ok(Role::Oracle);
        }
        warn!("Rejected administrative call from {}", caller);
        Err(MintError::Unauthorized(caller.to_string()))
    }

    fn change(&self, caller: &str, role: Role, action: &str, detail: String) -> AdminChange {
        info!("{} ({:?}) {}: {}", caller, role, action, detail);
        AdminChange {
            actor: caller.to_string(),
            role,
            action: action.to_string(),
            detail,
        }
    }

    pub fn set_fid_range(&mut self, caller: &str, min_fid: u64, max_fid: u64) -> Result<AdminChange> {
        let role = self.authorize(caller, false)?;
        validate_fid_range(min_fid, max_fid)?;
        self.params.min_fid = min_fid;
        self.params.max_fid = max_fid;
        Ok(self.change(caller, role, "set_fid_range", format!("{}..={}", min_fid, max_fid)))
    }

    pub fn set_prices(&mut self, caller: &str, base_mint_price: Wei, pro_mint_price: Wei) -> Result<AdminChange> {
        let role = self.authorize(caller, false)?;
        validate_prices(base_mint_price, pro_mint_price)?;
        self.params.base_mint_price = base_mint_price;
        self.params.pro_mint_price = pro_mint_price;
        Ok(self.change(
            caller,
            role,
            "set_prices",
            format!("base={} pro={}", base_mint_price, pro_mint_price),
        ))
    }

    pub fn set_paused(&mut self, caller: &str, paused: bool) -> Result<AdminChange> {
        let role = self.authorize(caller, false)?;
        self.params.paused = paused;
        Ok(self.change(caller, role, "set_paused", paused.to_string()))
    }

    pub fn set_max_supply(&mut self, caller: &str, max_supply: Option<u64>) -> Result<AdminChange> {
        let role = self.authorize(caller, false)?;
        validate_max_supply(max_supply, self.params.current_supply)?;
        self.params.max_supply = max_supply;
        let detail = max_supply.map(|c| c.to_string()).unwrap_or_else(|| "unlimited".to_string());
        Ok(self.change(caller, role, "set_max_supply", detail))
    }

    pub fn set_require_pro_for_discount(&mut self, caller: &str, required: bool) -> Result<AdminChange> {
        let role = self.authorize(caller, false)?;
        self.params.require_pro_for_discount = required;
        Ok(self.change(caller, role, "set_require_pro_for_discount", required.to_string()))
    }

    /// Owner or oracle. Allowed before and after minting; past prices stand.
    pub fn set_pro_status(&mut self, caller: &str, fid: u64, is_pro: bool) -> Result<AdminChange> {
        let role = self.authorize(caller, true)?;
        if fid == 0 {
            return Err(MintError::InvalidFid("FID must be positive".to_string()));
        }
        if fid > MAX_STORABLE {
            return Err(MintError::InvalidFid(format!("FID {} is too large", fid)));
        }
        self.records
            .entry(fid)
            .or_insert_with(|| MintRecord::new(fid))
            .is_pro = is_pro;
        Ok(self.change(caller, role, "set_pro_status", format!("fid={} pro={}", fid, is_pro)))
    }

    pub fn set_oracle(&mut self, caller: &str, oracle: Option<String>) -> Result<AdminChange> {
        let role = self.authorize(caller, false)?;
        let detail = oracle.clone().unwrap_or_else(|| "none".to_string());
        self.oracle = oracle;
        Ok(self.change(caller, role, "set_oracle", detail))
    }

    pub fn transfer_ownership(&mut self, caller: &str, new_owner: &str) -> Result<AdminChange> {
        let role = self.authorize(caller, false)?;
        if new_owner.trim().is_empty() {
            return Err(MintError::InvariantViolation("owner must not be empty".to_string()));
        }
        self.owner = new_owner.to_string();
        Ok(self.change(caller, role, "transfer_ownership", new_owner.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER: &str = "owner";
    const ORACLE: &str = "oracle";

    fn ledger() -> MintLedger {
        let params = MintingParameters::new(1, 100, 10, 5, None).unwrap();
        MintLedger::new(params, OWNER, Some(ORACLE.to_string())).unwrap()
    }

    #[test]
    fn test_first_mint_scenario() {
        let mut l = ledger();
        let receipt = l.attempt_mint(50, 10).unwrap();
        assert_eq!(receipt.token_id, 0);
        assert_eq!(receipt.price, 10);
        assert_eq!(l.params().current_supply, 1);
        assert!(l.has_minted(50));
        assert_eq!(l.record(50).unwrap().token_id, Some(0));
    }

    #[test]
    fn test_repeat_mint_rejected() {
        let mut l = ledger();
        l.attempt_mint(50, 10).unwrap();
        assert!(matches!(l.attempt_mint(50, 10), Err(MintError::AlreadyMinted(50))));
        assert_eq!(l.params().current_supply, 1);
    }

    #[test]
    fn test_repeat_mint_rejected_after_parameter_changes() {
        let mut l = ledger();
        l.attempt_mint(50, 10).unwrap();
        l.set_fid_range(OWNER, 1, 1_000).unwrap();
        l.set_max_supply(OWNER, Some(500)).unwrap();
        assert!(matches!(l.attempt_mint(50, 10), Err(MintError::AlreadyMinted(50))));
        l.set_fid_range(OWNER, 60, 70).unwrap();
        assert!(matches!(l.attempt_mint(50, 10), Err(MintError::AlreadyMinted(50))));
    }

    #[test]
    fn test_out_of_range_leaves_state_untouched() {
        let mut l = ledger();
        assert!(matches!(
            l.attempt_mint(200, 10),
            Err(MintError::FidOutOfRange { fid: 200, .. })
        ));
        assert_eq!(l.params().current_supply, 0);
        assert_eq!(l.next_token_id(), 0);
        assert!(l.record(200).is_none());
    }

    #[test]
    fn test_pro_discount_scenario() {
        let mut l = ledger();
        l.set_pro_status(ORACLE, 60, true).unwrap();
        assert!(matches!(
            l.attempt_mint(60, 4),
            Err(MintError::InsufficientPayment { required: 5, provided: 4 })
        ));
        assert!(!l.has_minted(60));
        let receipt = l.attempt_mint(60, 5).unwrap();
        assert_eq!(receipt.price, 5);
        assert!(receipt.is_pro);
    }

    #[test]
    fn test_invalid_fid_checked_first() {
        let mut l = ledger();
        l.set_paused(OWNER, true).unwrap();
        assert!(matches!(l.attempt_mint(0, 0), Err(MintError::InvalidFid(_))));
    }

    #[test]
    fn test_pause_and_resume() {
        let mut l = ledger();
        l.attempt_mint(10, 10).unwrap();
        let before: Vec<bool> = (1..=101).map(|fid| l.is_eligible(fid)).collect();

        l.set_paused(OWNER, true).unwrap();
        for fid in [10, 20, 200] {
            assert!(matches!(l.attempt_mint(fid, 1_000), Err(MintError::MintingPaused)));
        }

        l.set_paused(OWNER, false).unwrap();
        let after: Vec<bool> = (1..=101).map(|fid| l.is_eligible(fid)).collect();
        assert_eq!(before, after);
        assert!(l.attempt_mint(20, 10).is_ok());
    }

    #[test]
    fn test_token_ids_sequential() {
        let mut l = ledger();
        let ids: Vec<u64> = (1..=5).map(|fid| l.attempt_mint(fid, 10).unwrap().token_id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
        assert!(l.attempt_mint(1, 10).is_err());
        assert_eq!(l.attempt_mint(6, 10).unwrap().token_id, 5);
    }

    #[test]
    fn test_supply_cap_exhausted() {
        let mut l = ledger();
        l.set_max_supply(OWNER, Some(2)).unwrap();
        l.attempt_mint(1, 10).unwrap();
        l.attempt_mint(2, 10).unwrap();
        assert!(matches!(l.attempt_mint(3, 10), Err(MintError::SupplyExhausted(2))));
        assert!(matches!(l.set_max_supply(OWNER, Some(1)), Err(MintError::InvariantViolation(_))));
        l.set_max_supply(OWNER, None).unwrap();
        assert!(l.attempt_mint(3, 10).is_ok());
    }

    #[test]
    fn test_invalid_updates_leave_params_unchanged() {
        let mut l = ledger();
        let before = l.params().clone();
        assert!(matches!(l.set_prices(OWNER, 5, 10), Err(MintError::InvariantViolation(_))));
        assert!(matches!(l.set_fid_range(OWNER, 100, 1), Err(MintError::InvariantViolation(_))));
        assert_eq!(l.params(), &before);
    }

    #[test]
    fn test_unauthorized_updates_rejected() {
        let mut l = ledger();
        let before = l.params().clone();
        assert!(matches!(l.set_paused("mallory", true), Err(MintError::Unauthorized(_))));
        assert!(matches!(l.set_prices(ORACLE, 1, 1), Err(MintError::Unauthorized(_))));
        assert!(matches!(l.set_pro_status("mallory", 5, true), Err(MintError::Unauthorized(_))));
        assert_eq!(l.params(), &before);
        assert!(!l.is_pro(5));
    }

    #[test]
    fn test_pro_update_after_mint_keeps_price_paid() {
        let mut l = ledger();
        l.attempt_mint(50, 10).unwrap();
        let change = l.set_pro_status(ORACLE, 50, true).unwrap();
        assert_eq!(change.role, Role::Oracle);
        let record = l.record(50).unwrap();
        assert!(record.is_pro);
        assert_eq!(record.price_paid, Some(10));
    }

    #[test]
    fn test_pro_status_rejects_unstorable_fid() {
        let mut l = ledger();
        assert!(matches!(
            l.set_pro_status(ORACLE, u64::MAX, true),
            Err(MintError::InvalidFid(_))
        ));
        assert!(l.record(u64::MAX).is_none());
        assert!(l.set_pro_status(ORACLE, MAX_STORABLE, true).is_ok());
    }

    #[test]
    fn test_overpayment_accepted() {
        let mut l = ledger();
        let receipt = l.attempt_mint(50, 1_000).unwrap();
        assert_eq!(receipt.price, 10);
    }

    #[test]
    fn test_stale_pending_mint_rejected() {
        let mut l = ledger();
        let first = l.prepare_mint(50, 10).unwrap();
        let second = l.prepare_mint(50, 10).unwrap();
        l.commit_mint(first).unwrap();
        assert!(matches!(l.commit_mint(second), Err(MintError::AlreadyMinted(50))));
        assert_eq!(l.total_minted(), 1);
    }

    #[test]
    fn test_preview_matches_commit() {
        let mut l = ledger();
        let pending = l.prepare_mint(50, 10).unwrap();
        let preview = l.preview_record(&pending);
        l.commit_mint(pending).unwrap();
        assert_eq!(l.record(50), Some(&preview));
    }

    #[test]
    fn test_ownership_transfer() {
        let mut l = ledger();
        l.transfer_ownership(OWNER, "new-owner").unwrap();
        assert!(matches!(l.set_paused(OWNER, true), Err(MintError::Unauthorized(_))));
        assert!(l.set_paused("new-owner", true).is_ok());
        l.set_oracle("new-owner", None).unwrap();
        assert!(l.set_pro_status(ORACLE, 1, true).is_err());
    }

    #[test]
    fn test_from_parts_rebuilds() {
        let mut l = ledger();
        l.attempt_mint(3, 10).unwrap();
        l.attempt_mint(4, 10).unwrap();
        let records: Vec<MintRecord> = l.records().cloned().collect();
        let mut params = l.params().clone();
        params.current_supply = 7;

        let rebuilt = MintLedger::from_parts(params, records.clone(), 2, OWNER.into(), None).unwrap();
        assert_eq!(rebuilt.total_minted(), 2);
        assert!(rebuilt.has_minted(3));

        assert!(MintLedger::from_parts(l.params().clone(), records, 1, OWNER.into(), None).is_err());
    }
}
