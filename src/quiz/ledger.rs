use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("points file I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("points file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Accumulated points per user, persisted as a JSON object.
///
/// Every award rewrites the whole file. The lock is held across the write so
/// files land in award order.
pub struct PointsLedger {
    path: PathBuf,
    points: Mutex<BTreeMap<String, u64>>,
}

impl PointsLedger {
    /// Loads the ledger from `path`. A missing file is an empty ledger.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let path = path.into();
        let points: BTreeMap<String, u64> = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::info!("No points file at {}, starting empty", path.display());
                BTreeMap::new()
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            points: Mutex::new(points),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Adds `points` to the user's total and persists. Returns the new total.
    ///
    /// The in-memory total is updated even when the write fails; the next
    /// successful write carries it.
    pub async fn award(&self, user: &str, points: u64) -> Result<u64, LedgerError> {
        let mut ledger = self.points.lock().await;
        let total = {
            let entry = ledger.entry(user.to_string()).or_insert(0);
            *entry = entry.saturating_add(points);
            *entry
        };
        self.persist(&ledger).await?;
        Ok(total)
    }

    pub async fn points_of(&self, user: &str) -> u64 {
        self.points.lock().await.get(user).copied().unwrap_or(0)
    }

    /// Users ordered by points descending, ties by ascending numeric user id,
    /// cut at `limit`.
    pub async fn standings(&self, limit: usize) -> Vec<(String, u64)> {
        let ledger = self.points.lock().await;
        let mut sorted: Vec<(String, u64)> =
            ledger.iter().map(|(u, p)| (u.clone(), *p)).collect();
        sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| id_order(&a.0, &b.0)));
        sorted.truncate(limit);
        sorted
    }

    async fn persist(&self, ledger: &BTreeMap<String, u64>) -> Result<(), LedgerError> {
        let json = serde_json::to_vec_pretty(ledger)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

// Ids are Telegram user ids stored as strings; keys that don't parse sort
// after numeric ones.
fn id_order(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}
