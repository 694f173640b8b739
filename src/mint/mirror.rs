use std::time::Duration;
use crate::cache::TtlCache;
use tracing::debug;

/// Off-chain view of which FIDs have minted.
///
/// Only positive facts are cached: a FID is recorded once the ledger reports
/// it minted, and minting never reverts. A miss says nothing, so callers must
/// still ask the ledger. The mirror can reject early but never approve.
pub struct MintedMirror {
    minted: TtlCache<u64, u64>,
}

impl MintedMirror {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            minted: TtlCache::new(ttl, capacity),
        }
    }

    /// Token id for `fid` if it is known to have minted.
    pub fn known_minted(&self, fid: u64) -> Option<u64> {
        let hit = self.minted.get(&fid);
        if hit.is_some() {
            debug!("Mirror hit for FID {}", fid);
        }
        hit
    }

    pub fn record_minted(&self, fid: u64, token_id: u64) {
        self.minted.insert(fid, token_id);
    }

    pub fn len(&self) -> usize {
        self.minted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.minted.is_empty()
    }

    /// Drop everything, e.g. after the ledger is rebuilt.
    pub fn reset(&self) {
        self.minted.clear();
    }
}
