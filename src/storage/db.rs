use std::time::Duration;
use rusqlite::{params, types::Type, Connection, OptionalExtension, Transaction, TransactionBehavior};
use crate::{
    error::{MintError, Result},
    mint::{AdminChange, MintLedger, MintRecord, MintingParameters},
    storage::models::{MintStats, ParameterChange, StoredRoles},
};
use chrono::{DateTime, Utc};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite store shared by every process pointed at the same file.
///
/// `ledger_meta.revision` is bumped by every write. Writers pass the revision
/// their ledger was built from and the write is refused if it moved.
pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn new(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS mint_parameters (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                min_fid INTEGER NOT NULL,
                max_fid INTEGER NOT NULL,
                base_mint_price TEXT NOT NULL,
                pro_mint_price TEXT NOT NULL,
                max_supply INTEGER,
                current_supply INTEGER NOT NULL,
                paused INTEGER NOT NULL,
                require_pro_for_discount INTEGER NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS ledger_meta (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                next_token_id INTEGER NOT NULL,
                owner TEXT NOT NULL,
                oracle TEXT,
                revision INTEGER NOT NULL DEFAULT 0
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS mint_records (
                fid INTEGER PRIMARY KEY,
                has_minted INTEGER NOT NULL,
                token_id INTEGER UNIQUE,
                is_pro INTEGER NOT NULL,
                price_paid TEXT,
                minted_at TEXT
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS parameter_changes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                actor TEXT NOT NULL,
                role TEXT NOT NULL,
                action TEXT NOT NULL,
                detail TEXT NOT NULL,
                timestamp TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_minted ON mint_records(has_minted)",
            [],
        )?;

        Ok(())
    }

    /// True once a ledger has been written.
    pub fn is_initialized(&self) -> Result<bool> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM ledger_meta", [], |row| row.get(0))?;
        Ok(count > 0)
    }

    /// Revision of the stored ledger; 0 before the first write.
    pub fn revision(&self) -> Result<u64> {
        Ok(read_revision(&self.conn)?)
    }

    /// Open a write transaction holding the database write lock.
    ///
    /// With `expected` set, fails with `ConcurrentUpdate` when another writer
    /// committed since that revision was read.
    fn begin_write(&self, expected: Option<u64>) -> Result<Transaction<'_>> {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        if let Some(expected) = expected {
            let found = read_revision(&tx)?;
            if found != expected {
                return Err(MintError::ConcurrentUpdate { expected, found });
            }
        }
        Ok(tx)
    }

    /// Write the full ledger, replacing whatever was stored. Returns the new revision.
    pub fn save_ledger(&self, ledger: &MintLedger) -> Result<u64> {
        let tx = self.begin_write(None)?;
        write_params(&tx, ledger.params())?;
        write_meta(&tx, ledger.next_token_id(), ledger.owner(), ledger.oracle())?;
        tx.execute("DELETE FROM mint_records", [])?;
        for record in ledger.records() {
            write_record(&tx, record)?;
        }
        let revision = read_revision(&tx)?;
        tx.commit()?;
        Ok(revision)
    }

    /// Rebuild the ledger from storage, if one was saved.
    pub fn load_ledger(&self) -> Result<Option<MintLedger>> {
        let Some(params) = self.load_params()? else {
            return Ok(None);
        };
        let meta = self
            .conn
            .query_row(
                "SELECT next_token_id, owner, oracle FROM ledger_meta WHERE id = 1",
                [],
                |row| {
                    Ok((
                        row.get::<_, u64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                    ))
                },
            )
            .optional()?;
        let Some((next_token_id, owner, oracle)) = meta else {
            return Ok(None);
        };
        let records = self.load_records()?;
        Ok(Some(MintLedger::from_parts(params, records, next_token_id, owner, oracle)?))
    }

    pub fn load_params(&self) -> Result<Option<MintingParameters>> {
        let params = self
            .conn
            .query_row(
                "SELECT min_fid, max_fid, base_mint_price, pro_mint_price, max_supply,
                        current_supply, paused, require_pro_for_discount
                 FROM mint_parameters WHERE id = 1",
                [],
                |row| {
                    Ok(MintingParameters {
                        min_fid: row.get(0)?,
                        max_fid: row.get(1)?,
                        base_mint_price: parse_wei(2, row.get(2)?)?,
                        pro_mint_price: parse_wei(3, row.get(3)?)?,
                        max_supply: row.get(4)?,
                        current_supply: row.get(5)?,
                        paused: row.get(6)?,
                        require_pro_for_discount: row.get(7)?,
                    })
                },
            )
            .optional()?;
        Ok(params)
    }

    pub fn load_roles(&self) -> Result<Option<StoredRoles>> {
        let roles = self
            .conn
            .query_row("SELECT owner, oracle FROM ledger_meta WHERE id = 1", [], |row| {
                Ok(StoredRoles {
                    owner: row.get(0)?,
                    oracle: row.get(1)?,
                })
            })
            .optional()?;
        Ok(roles)
    }

    pub fn load_records(&self) -> Result<Vec<MintRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT fid, has_minted, token_id, is_pro, price_paid, minted_at
             FROM mint_records",
        )?;
        let records = stmt
            .query_map([], read_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    pub fn get_record(&self, fid: u64) -> Result<Option<MintRecord>> {
        let record = self
            .conn
            .query_row(
                "SELECT fid, has_minted, token_id, is_pro, price_paid, minted_at
                 FROM mint_records WHERE fid = ?1",
                [fid],
                read_record,
            )
            .optional()?;
        Ok(record)
    }

    /// Persist a committed mint: the record, the supply counter and the token counter.
    pub fn persist_mint(
        &self,
        record: &MintRecord,
        params: &MintingParameters,
        next_token_id: u64,
        owner: &str,
        oracle: Option<&str>,
        expected_revision: u64,
    ) -> Result<u64> {
        let tx = self.begin_write(Some(expected_revision))?;
        write_record(&tx, record)?;
        write_params(&tx, params)?;
        write_meta(&tx, next_token_id, owner, oracle)?;
        let revision = read_revision(&tx)?;
        tx.commit()?;
        Ok(revision)
    }

    /// Persist an administrative update together with its audit entry.
    pub fn persist_change(
        &self,
        change: &AdminChange,
        ledger: &MintLedger,
        touched: Option<&MintRecord>,
        expected_revision: u64,
    ) -> Result<u64> {
        let tx = self.begin_write(Some(expected_revision))?;
        write_params(&tx, ledger.params())?;
        write_meta(&tx, ledger.next_token_id(), ledger.owner(), ledger.oracle())?;
        if let Some(record) = touched {
            write_record(&tx, record)?;
        }
        tx.execute(
            "INSERT INTO parameter_changes (actor, role, action, detail, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                change.actor,
                format!("{:?}", change.role),
                change.action,
                change.detail,
                Utc::now().to_rfc3339(),
            ],
        )?;
        let revision = read_revision(&tx)?;
        tx.commit()?;
        Ok(revision)
    }

    pub fn get_change_history(&self, limit: Option<usize>) -> Result<Vec<ParameterChange>> {
        let query = match limit {
            Some(n) => format!(
                "SELECT id, actor, role, action, detail, timestamp FROM parameter_changes
                 ORDER BY id DESC LIMIT {}",
                n
            ),
            None => "SELECT id, actor, role, action, detail, timestamp FROM parameter_changes
                     ORDER BY id DESC"
                .to_string(),
        };

        let mut stmt = self.conn.prepare(&query)?;
        let changes = stmt
            .query_map([], |row| {
                Ok(ParameterChange {
                    id: row.get(0)?,
                    actor: row.get(1)?,
                    role: row.get(2)?,
                    action: row.get(3)?,
                    detail: row.get(4)?,
                    timestamp: parse_timestamp(5, row.get(5)?)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(changes)
    }

    pub fn get_recent_mints(&self, limit: usize) -> Result<Vec<MintRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT fid, has_minted, token_id, is_pro, price_paid, minted_at
             FROM mint_records WHERE has_minted = 1
             ORDER BY token_id DESC LIMIT ?1",
        )?;
        let records = stmt
            .query_map([limit as i64], read_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    pub fn get_stats(&self) -> Result<MintStats> {
        let records = self.load_records()?;
        let mut stats = MintStats::default();

        for record in &records {
            if record.is_pro {
                stats.pro_fids += 1;
            }
            if !record.has_minted {
                continue;
            }
            stats.total_minted += 1;
            if record.is_pro {
                stats.pro_mints += 1;
            }
            stats.total_revenue = stats
                .total_revenue
                .saturating_add(record.price_paid.unwrap_or(0));
            if record.minted_at > stats.last_mint_at {
                stats.last_mint_at = record.minted_at;
            }
        }

        stats.parameter_changes = self.conn.query_row(
            "SELECT COUNT(*) FROM parameter_changes",
            [],
            |row| row.get(0),
        )?;

        Ok(stats)
    }
}

fn write_params(conn: &Connection, p: &MintingParameters) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO mint_parameters
         (id, min_fid, max_fid, base_mint_price, pro_mint_price, max_supply,
          current_supply, paused, require_pro_for_discount)
         VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            p.min_fid,
            p.max_fid,
            p.base_mint_price.to_string(),
            p.pro_mint_price.to_string(),
            p.max_supply,
            p.current_supply,
            p.paused,
            p.require_pro_for_discount,
        ],
    )?;
    Ok(())
}

fn write_meta(conn: &Connection, next_token_id: u64, owner: &str, oracle: Option<&str>) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO ledger_meta (id, next_token_id, owner, oracle, revision)
         VALUES (1, ?1, ?2, ?3,
                 COALESCE((SELECT revision FROM ledger_meta WHERE id = 1), 0) + 1)",
        params![next_token_id, owner, oracle],
    )?;
    Ok(())
}

fn read_revision(conn: &Connection) -> rusqlite::Result<u64> {
    let revision: Option<u64> = conn
        .query_row("SELECT revision FROM ledger_meta WHERE id = 1", [], |row| row.get(0))
        .optional()?;
    Ok(revision.unwrap_or(0))
}

fn write_record(conn: &Connection, r: &MintRecord) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO mint_records
         (fid, has_minted, token_id, is_pro, price_paid, minted_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            r.fid,
            r.has_minted,
            r.token_id,
            r.is_pro,
            r.price_paid.map(|p| p.to_string()),
            r.minted_at.map(|dt| dt.to_rfc3339()),
        ],
    )?;
    Ok(())
}

fn read_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<MintRecord> {
    Ok(MintRecord {
        fid: row.get(0)?,
        has_minted: row.get(1)?,
        token_id: row.get(2)?,
        is_pro: row.get(3)?,
        price_paid: row
            .get::<_, Option<String>>(4)?
            .map(|s| parse_wei(4, s))
            .transpose()?,
        minted_at: row
            .get::<_, Option<String>>(5)?
            .map(|s| parse_timestamp(5, s))
            .transpose()?,
    })
}

fn parse_wei(idx: usize, s: String) -> rusqlite::Result<u128> {
    s.parse::<u128>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_timestamp(idx: usize, s: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
