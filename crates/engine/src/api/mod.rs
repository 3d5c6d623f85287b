//! Remote API clients

pub mod chesscom;

use anyhow::Result;
use async_trait::async_trait;
use self::chesscom::RawGame;

/// Source of remote game archives.
///
/// Seam between the reconciliation routine and the live chess.com client,
/// so refresh logic can run against a stub in tests.
#[async_trait]
pub trait ArchiveSource: Send + Sync {
    /// List per-month archive URLs for a player
    async fn get_archives(&self, player: &str) -> Result<Vec<String>>;

    /// Fetch the games contained in one archive
    async fn get_games(&self, archive_url: &str) -> Result<Vec<RawGame>>;

    /// Fetch all archives concurrently, flattened; failed archives are skipped
    async fn fetch_all_games(&self, archives: &[String]) -> Vec<RawGame>;
}
