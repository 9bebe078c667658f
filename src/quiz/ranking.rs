use async_trait::async_trait;

use crate::quiz::ledger::PointsLedger;

pub const RANKING_SIZE: usize = 10;

/// Resolves a ledger user id to something printable.
#[async_trait]
pub trait DisplayNameLookup: Send + Sync {
    /// `None` when the platform does not know the user.
    async fn display_name(&self, user: &str) -> Option<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankingEntry {
    pub rank: usize,
    pub name: String,
    pub points: u64,
}

pub fn unknown_user(user: &str) -> String {
    format!("Unknown user ({})", user)
}

/// Top [`RANKING_SIZE`] users by points, highest first.
pub async fn top_players(ledger: &PointsLedger, names: &impl DisplayNameLookup) -> Vec<RankingEntry> {
    let standings = ledger.standings(RANKING_SIZE).await;
    let mut entries = Vec::with_capacity(standings.len());
    for (i, (user, points)) in standings.into_iter().enumerate() {
        let name = match names.display_name(&user).await {
            Some(name) => name,
            None => {
                log::debug!("No display name for user {}", user);
                unknown_user(&user)
            }
        };
        entries.push(RankingEntry {
            rank: i + 1,
            name,
            points,
        });
    }
    entries
}
