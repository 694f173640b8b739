use std::time::Duration;
use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard};
use crate::{
    config::Config,
    error::{MintError, Result},
    mint::{
        eligibility::{check_eligibility, EligibilityChecker},
        ledger::{AdminChange, MintLedger, MintReceipt},
        mirror::MintedMirror,
        params::{MintingParameters, Wei},
        record::MintRecord,
    },
    storage::{Database, MintStats, ParameterChange},
};
use tracing::{debug, info, warn};

/// Commits retried after another process wrote first.
const COMMIT_ATTEMPTS: usize = 3;

/// Eligibility and price for one FID at one moment.
#[derive(Debug, Clone, Serialize)]
pub struct MintQuote {
    pub fid: u64,
    pub eligible: bool,
    pub reason: String,
    #[serde(with = "crate::storage::models::wei_string")]
    pub price: Wei,
    pub is_pro: bool,
    pub has_minted: bool,
    pub token_id: Option<u64>,
}

struct Inner {
    ledger: MintLedger,
    db: Database,
    /// Stored revision `ledger` was loaded from or last wrote.
    revision: u64,
}

/// Ledger plus its SQLite write-through, shared by the API, CLI and bot.
///
/// Every commit is persisted before it becomes visible in memory; a failed
/// write leaves both sides unchanged. Other processes may write the same
/// database, so the ledger is reloaded whenever the stored revision moved.
pub struct MintService {
    inner: Mutex<Inner>,
    mirror: MintedMirror,
}

impl MintService {
    pub fn new(ledger: MintLedger, db: Database, mirror: MintedMirror) -> Self {
        seed_mirror(&mirror, &ledger);
        let revision = db.revision().unwrap_or_else(|e| {
            warn!("Could not read ledger revision, will reload on first use: {}", e);
            0
        });
        Self {
            inner: Mutex::new(Inner { ledger, db, revision }),
            mirror,
        }
    }

    /// Open the configured database, rebuilding the ledger or seeding it from config.
    pub fn open(config: &Config) -> Result<Self> {
        let db = Database::new(&config.database.path)?;
        Self::with_database(config, db)
    }

    pub fn with_database(config: &Config, db: Database) -> Result<Self> {
        let ledger = match db.load_ledger()? {
            Some(ledger) => {
                info!(
                    "Rebuilt ledger from storage: {} minted, next token {}",
                    ledger.total_minted(),
                    ledger.next_token_id()
                );
                ledger
            }
            None => {
                let params = config.initial_params()?;
                let ledger = MintLedger::new(params, config.roles.owner.clone(), config.roles.oracle.clone())?;
                db.save_ledger(&ledger)?;
                info!("Initialized new ledger from configuration");
                ledger
            }
        };

        let mirror = MintedMirror::new(
            Duration::from_secs(config.identity.cache_ttl_secs),
            config.identity.cache_capacity,
        );
        Ok(Self::new(ledger, db, mirror))
    }

    /// Reload the ledger if another writer moved the stored revision.
    fn sync(&self, inner: &mut Inner) -> Result<()> {
        let stored = inner.db.revision()?;
        if stored == inner.revision {
            return Ok(());
        }
        if let Some(ledger) = inner.db.load_ledger()? {
            seed_mirror(&self.mirror, &ledger);
            inner.ledger = ledger;
        }
        debug!("Reloaded ledger at revision {} (was {})", stored, inner.revision);
        inner.revision = stored;
        Ok(())
    }

    /// Lock and sync for reads; a failed sync serves the in-memory view.
    async fn fresh(&self) -> MutexGuard<'_, Inner> {
        let mut inner = self.inner.lock().await;
        if let Err(e) = self.sync(&mut inner) {
            warn!("Serving cached ledger, reload failed: {}", e);
        }
        inner
    }

    pub async fn params(&self) -> MintingParameters {
        self.fresh().await.ledger.params().clone()
    }

    pub async fn record(&self, fid: u64) -> Option<MintRecord> {
        self.fresh().await.ledger.record(fid).cloned()
    }

    pub async fn owner(&self) -> String {
        self.fresh().await.ledger.owner().to_string()
    }

    pub async fn oracle(&self) -> Option<String> {
        self.fresh().await.ledger.oracle().map(str::to_string)
    }

    /// Cheap rejections in eligibility order: validity, pause, then the mirror.
    fn gate(&self, fid: u64, params: &MintingParameters) -> Result<()> {
        if fid == 0 {
            return Err(MintError::InvalidFid("FID must be positive".to_string()));
        }
        if params.paused {
            return Err(MintError::MintingPaused);
        }
        match self.mirror.known_minted(fid) {
            Some(_) => Err(MintError::AlreadyMinted(fid)),
            None => Ok(()),
        }
    }

    /// Reject early when paused or when the mirror already knows `fid` minted.
    ///
    /// `Ok` is not a promise; the ledger decides at commit time.
    pub async fn precheck(&self, fid: u64) -> Result<()> {
        let params = self.params().await;
        self.gate(fid, &params)
    }

    pub async fn quote(&self, fid: u64) -> MintQuote {
        let inner = self.fresh().await;
        let params = inner.ledger.params();
        let record = inner.ledger.record(fid);
        let checker = EligibilityChecker::new(params);

        MintQuote {
            fid,
            eligible: checker.is_eligible(fid, record),
            reason: checker.get_eligibility_reason(fid, record),
            price: checker.price_for(record),
            is_pro: record.map(|r| r.is_pro).unwrap_or(false),
            has_minted: record.map(|r| r.has_minted).unwrap_or(false),
            token_id: record.and_then(|r| r.token_id),
        }
    }

    /// Decision only, as a named error.
    pub async fn check(&self, fid: u64) -> Result<()> {
        let inner = self.fresh().await;
        check_eligibility(fid, inner.ledger.params(), inner.ledger.record(fid))
    }

    pub async fn attempt_mint(&self, fid: u64, payment: Wei) -> Result<MintReceipt> {
        let mut last_conflict = None;

        for _ in 0..COMMIT_ATTEMPTS {
            let mut inner = self.inner.lock().await;
            self.sync(&mut inner)?;

            let pending = match self
                .gate(fid, inner.ledger.params())
                .and_then(|_| inner.ledger.prepare_mint(fid, payment))
            {
                Ok(p) => p,
                Err(e) => {
                    warn!("Mint rejected for FID {}: {}", fid, e);
                    return Err(e);
                }
            };

            let record = inner.ledger.preview_record(&pending);
            let mut params = inner.ledger.params().clone();
            params.current_supply += 1;
            let written = inner.db.persist_mint(
                &record,
                &params,
                pending.token_id + 1,
                inner.ledger.owner(),
                inner.ledger.oracle(),
                inner.revision,
            );
            let revision = match written {
                Ok(revision) => revision,
                Err(e @ MintError::ConcurrentUpdate { .. }) => {
                    debug!("Retrying mint for FID {}: {}", fid, e);
                    last_conflict = Some(e);
                    continue;
                }
                Err(e) => return Err(e),
            };

            let receipt = inner.ledger.commit_mint(pending)?;
            inner.revision = revision;
            self.mirror.record_minted(receipt.fid, receipt.token_id);
            return Ok(receipt);
        }

        Err(last_conflict.unwrap_or(MintError::ConcurrentUpdate { expected: 0, found: 0 }))
    }

    /// Apply an administrative update to a copy, persist it, then swap it in.
    async fn update<F>(&self, touched_fid: Option<u64>, apply: F) -> Result<AdminChange>
    where
        F: Fn(&mut MintLedger) -> Result<AdminChange>,
    {
        let mut last_conflict = None;

        for _ in 0..COMMIT_ATTEMPTS {
            let mut inner = self.inner.lock().await;
            self.sync(&mut inner)?;

            let mut next = inner.ledger.clone();
            let change = apply(&mut next)?;
            let touched = touched_fid.and_then(|fid| next.record(fid));
            match inner.db.persist_change(&change, &next, touched, inner.revision) {
                Ok(revision) => {
                    inner.ledger = next;
                    inner.revision = revision;
                    debug!("Applied {} by {}", change.action, change.actor);
                    return Ok(change);
                }
                Err(e @ MintError::ConcurrentUpdate { .. }) => {
                    debug!("Retrying {}: {}", change.action, e);
                    last_conflict = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_conflict.unwrap_or(MintError::ConcurrentUpdate { expected: 0, found: 0 }))
    }

    pub async fn set_fid_range(&self, caller: &str, min_fid: u64, max_fid: u64) -> Result<AdminChange> {
        self.update(None, |l| l.set_fid_range(caller, min_fid, max_fid)).await
    }

    pub async fn set_prices(&self, caller: &str, base: Wei, pro: Wei) -> Result<AdminChange> {
        self.update(None, |l| l.set_prices(caller, base, pro)).await
    }

    pub async fn set_paused(&self, caller: &str, paused: bool) -> Result<AdminChange> {
        self.update(None, |l| l.set_paused(caller, paused)).await
    }

    pub async fn set_max_supply(&self, caller: &str, max_supply: Option<u64>) -> Result<AdminChange> {
        self.update(None, |l| l.set_max_supply(caller, max_supply)).await
    }

    pub async fn set_require_pro_for_discount(&self, caller: &str, required: bool) -> Result<AdminChange> {
        self.update(None, |l| l.set_require_pro_for_discount(caller, required)).await
    }

    pub async fn set_pro_status(&self, caller: &str, fid: u64, is_pro: bool) -> Result<AdminChange> {
        self.update(Some(fid), |l| l.set_pro_status(caller, fid, is_pro)).await
    }

    pub async fn set_oracle(&self, caller: &str, oracle: Option<String>) -> Result<AdminChange> {
        self.update(None, |l| l.set_oracle(caller, oracle.clone())).await
    }

    pub async fn transfer_ownership(&self, caller: &str, new_owner: &str) -> Result<AdminChange> {
        self.update(None, |l| l.transfer_ownership(caller, new_owner)).await
    }

    pub async fn stats(&self) -> Result<MintStats> {
        self.inner.lock().await.db.get_stats()
    }

    pub async fn change_history(&self, limit: Option<usize>) -> Result<Vec<ParameterChange>> {
        self.inner.lock().await.db.get_change_history(limit)
    }

    pub async fn recent_mints(&self, limit: usize) -> Result<Vec<MintRecord>> {
        self.inner.lock().await.db.get_recent_mints(limit)
    }

    pub fn mirror(&self) -> &MintedMirror {
        &self.mirror
    }
}

fn seed_mirror(mirror: &MintedMirror, ledger: &MintLedger) {
    for record in ledger.records() {
        if let Some(token_id) = record.token_id {
            mirror.record_minted(record.fid, token_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER: &str = "owner";

    fn service() -> MintService {
        let params = MintingParameters::new(1, 100, 10, 5, None).unwrap();
        let ledger = MintLedger::new(params, OWNER, Some("oracle".to_string())).unwrap();
        let db = Database::in_memory().unwrap();
        db.save_ledger(&ledger).unwrap();
        MintService::new(ledger, db, MintedMirror::new(Duration::from_secs(60), 100))
    }

    #[tokio::test]
    async fn test_mint_persists_and_mirrors() {
        let svc = service();
        let receipt = svc.attempt_mint(50, 10).await.unwrap();
        assert_eq!(receipt.token_id, 0);
        assert_eq!(svc.mirror().known_minted(50), Some(0));
        assert!(matches!(svc.precheck(50).await, Err(MintError::AlreadyMinted(50))));
        assert!(matches!(svc.attempt_mint(50, 10).await, Err(MintError::AlreadyMinted(50))));

        let stats = svc.stats().await.unwrap();
        assert_eq!(stats.total_minted, 1);
        assert_eq!(stats.total_revenue, 10);
    }

    #[tokio::test]
    async fn test_mirror_miss_defers_to_ledger() {
        let svc = service();
        svc.attempt_mint(50, 10).await.unwrap();
        svc.mirror().reset();
        assert!(svc.precheck(50).await.is_ok());
        assert!(matches!(svc.attempt_mint(50, 10).await, Err(MintError::AlreadyMinted(50))));
    }

    #[tokio::test]
    async fn test_rejected_update_leaves_state() {
        let svc = service();
        let before = svc.params().await;
        assert!(svc.set_prices(OWNER, 1, 2).await.is_err());
        assert!(svc.set_paused("intruder", true).await.is_err());
        assert_eq!(svc.params().await, before);
        assert!(svc.change_history(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_quote_follows_pro_status() {
        let svc = service();
        svc.set_pro_status("oracle", 60, true).await.unwrap();
        let quote = svc.quote(60).await;
        assert!(quote.eligible);
        assert_eq!(quote.price, 5);
        assert!(quote.is_pro);

        svc.set_paused(OWNER, true).await.unwrap();
        let quote = svc.quote(60).await;
        assert!(!quote.eligible);
        assert_eq!(quote.reason, "Minting is currently paused");
        assert!(matches!(svc.check(60).await, Err(MintError::MintingPaused)));
        assert_eq!(svc.change_history(Some(10)).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_pause_outranks_minted() {
        let svc = service();
        svc.attempt_mint(50, 10).await.unwrap();
        svc.set_paused(OWNER, true).await.unwrap();

        assert!(matches!(svc.precheck(50).await, Err(MintError::MintingPaused)));
        assert!(matches!(svc.attempt_mint(50, 10).await, Err(MintError::MintingPaused)));
        assert!(matches!(svc.attempt_mint(51, 10).await, Err(MintError::MintingPaused)));

        svc.set_paused(OWNER, false).await.unwrap();
        assert!(matches!(svc.attempt_mint(50, 10).await, Err(MintError::AlreadyMinted(50))));
    }

    #[tokio::test]
    async fn test_oracle_accessor_follows_ledger() {
        let svc = service();
        assert_eq!(svc.oracle().await.as_deref(), Some("oracle"));
        svc.set_oracle(OWNER, Some("oracle-v2".to_string())).await.unwrap();
        assert_eq!(svc.oracle().await.as_deref(), Some("oracle-v2"));
        assert!(svc.set_pro_status("oracle", 5, true).await.is_err());
        svc.set_pro_status("oracle-v2", 5, true).await.unwrap();
    }

    #[tokio::test]
    async fn test_two_services_share_one_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mint.db");
        let path = path.to_str().unwrap();

        let params = MintingParameters::new(1, 100, 10, 5, None).unwrap();
        let ledger = MintLedger::new(params, OWNER, Some("oracle".to_string())).unwrap();
        let db = Database::new(path).unwrap();
        db.save_ledger(&ledger).unwrap();

        let mirror = || MintedMirror::new(Duration::from_secs(60), 100);
        let server = MintService::new(ledger.clone(), db, mirror());
        let cli = MintService::new(ledger, Database::new(path).unwrap(), mirror());

        cli.set_paused(OWNER, true).await.unwrap();
        assert!(server.params().await.paused);
        assert!(matches!(server.attempt_mint(50, 10).await, Err(MintError::MintingPaused)));

        cli.set_paused(OWNER, false).await.unwrap();
        let first = server.attempt_mint(50, 10).await.unwrap();
        assert!(matches!(cli.attempt_mint(50, 10).await, Err(MintError::AlreadyMinted(50))));
        let second = cli.attempt_mint(51, 10).await.unwrap();
        assert_eq!((first.token_id, second.token_id), (0, 1));
        assert_eq!(second.current_supply, 2);

        server.set_prices(OWNER, 20, 10).await.unwrap();
        let stored = Database::new(path).unwrap().load_ledger().unwrap().unwrap();
        assert!(!stored.params().paused);
        assert_eq!(stored.params().base_mint_price, 20);
        assert_eq!(stored.total_minted(), 2);
        assert_eq!(stored.next_token_id(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_mints_for_same_fid() {
        let svc = std::sync::Arc::new(service());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let svc = svc.clone();
                tokio::spawn(async move { svc.attempt_mint(42, 10).await })
            })
            .collect();

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                successes += 1;
            }
        }
        assert_eq!(successes, 1);
        assert_eq!(svc.params().await.current_supply, 1);
    }
}
