//! cached transaction count using sled
//!
//! a single key holding the last known on-chain count as a string. the
//! stored value only ever moves up: it is a lagging lower bound of the
//! true count.

use sled::Db;
use tracing::{debug, info};

use crate::error::{DappError, Result};

const COUNT_KEY: &[u8] = b"transactionCount";

pub struct CountCache {
    db: Db,
}

impl CountCache {
    pub fn open(path: &str) -> Result<Self> {
        info!("opening count cache at {}", path);
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// in-memory cache, discarded on drop
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }

    /// last known count, if any was ever stored
    pub fn get(&self) -> Result<Option<u64>> {
        match self.db.get(COUNT_KEY)? {
            Some(bytes) => decode(&bytes).map(Some),
            None => Ok(None),
        }
    }

    /// store `count` unless a higher value is already cached; returns the
    /// value held afterwards
    pub fn store(&self, count: u64) -> Result<u64> {
        let previous = self.db.fetch_and_update(COUNT_KEY, |old| {
            let current = old.and_then(|b| decode(b).ok());
            match current {
                Some(c) if c >= count => Some(c.to_string().into_bytes()),
                _ => Some(count.to_string().into_bytes()),
            }
        })?;
        self.db.flush()?;

        // unreadable bytes were overwritten by the update above
        let previous = previous.and_then(|b| decode(&b).ok());
        let held = previous.map_or(count, |p| p.max(count));
        debug!("cached count: {:?} -> {}", previous, held);
        Ok(held)
    }
}

fn decode(bytes: &[u8]) -> Result<u64> {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .ok_or_else(|| DappError::Storage(format!("malformed cached count: {:?}", bytes)))
}
