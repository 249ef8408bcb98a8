//! Store statistics shown alongside sync status.

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use super::{Database, DbResult};

/// Aggregate counts over the local store.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub total_patients: u64,
    pub total_visits: u64,
    pub pending_vaccinations: u64,
    /// Visits and vaccinations not yet acknowledged by the server
    pub unsynced_items: u64,
}

const STAT_QUERIES: [&str; 4] = [
    "SELECT COUNT(*) FROM patients",
    "SELECT COUNT(*) FROM visits",
    "SELECT COUNT(*) FROM vaccinations WHERE status = 'due'",
    "SELECT (SELECT COUNT(*) FROM visits WHERE synced = 0) + (SELECT COUNT(*) FROM vaccinations WHERE synced = 0)",
];

/// Run each independent count and join them; the first failure fails the whole result.
pub fn count_all<const N: usize>(conn: &Connection, queries: [&str; N]) -> DbResult<[u64; N]> {
    let counts = queries
        .iter()
        .map(|sql| conn.query_row(sql, [], |row| row.get::<_, i64>(0)))
        .collect::<Result<Vec<_>, _>>()?;

    let mut out = [0u64; N];
    for (slot, count) in out.iter_mut().zip(counts) {
        *slot = count.max(0) as u64;
    }
    Ok(out)
}

impl Database {
    /// Counts for the status screen.
    pub fn stats(&self) -> DbResult<StoreStats> {
        let [total_patients, total_visits, pending_vaccinations, unsynced_items] =
            count_all(&self.conn, STAT_QUERIES)?;

        Ok(StoreStats {
            total_patients,
            total_visits,
            pending_vaccinations,
            unsynced_items,
        })
    }

    /// Number of visits and vaccinations still waiting for a sync.
    pub fn pending_count(&self) -> DbResult<u64> {
        Ok(self.stats()?.unsynced_items)
    }
}
