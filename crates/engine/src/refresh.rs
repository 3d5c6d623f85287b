//! Reconciliation routine — merge cached game history with the remote archive
//!
//! Reads whatever is already cached for a player, re-fetches the player's
//! entire remote history, normalizes it, and upserts it in bounded batches.
//! The (player_name, game_url) key makes repeated runs idempotent at the
//! store; no fetch work is saved by the cache (documented trade-off).

use anyhow::Result;
use chrono::Utc;
use persistence::repository::games::{GameRepository, PlayerGameRecord, BATCH_SIZE};
use persistence::SqlitePool;
use std::collections::HashMap;
use tracing::{info, warn};

use crate::api::ArchiveSource;
use crate::normalize::normalize;

/// How remote listing failures reach the caller.
///
/// `Lenient` preserves the legacy behavior: a failed archive listing is
/// logged and treated as an empty history. `Strict` propagates the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchPolicy {
    #[default]
    Lenient,
    Strict,
}

/// Tuning knobs for a refresh run
#[derive(Debug, Clone)]
pub struct RefreshOptions {
    pub fetch_policy: FetchPolicy,
    pub batch_size: usize,
}

impl Default for RefreshOptions {
    fn default() -> Self {
        Self {
            fetch_policy: FetchPolicy::Lenient,
            batch_size: BATCH_SIZE,
        }
    }
}

/// Result of one refresh run.
///
/// Keeps the pre-existing rows and the freshly fetched rows separate so the
/// caller picks the view it wants: the raw concatenation (which may repeat
/// games that were both cached and re-fetched), the fresh delta alone, or a
/// key-deduplicated history.
#[derive(Debug, Clone, Default)]
pub struct RefreshOutcome {
    existing: Vec<PlayerGameRecord>,
    fetched: Vec<PlayerGameRecord>,
    /// User-visible degradation messages (store read failed, no archives, ...)
    pub notices: Vec<String>,
}

impl RefreshOutcome {
    /// Rows that were already cached before the refresh
    pub fn existing(&self) -> &[PlayerGameRecord] {
        &self.existing
    }

    /// Rows fetched and normalized during this refresh
    pub fn fetched(&self) -> &[PlayerGameRecord] {
        &self.fetched
    }

    /// Existing rows followed by fetched rows, concatenated as-is.
    ///
    /// Games present in the cache and re-fetched appear twice; only the
    /// persisted store is guaranteed key-unique.
    pub fn merged(&self) -> Vec<PlayerGameRecord> {
        let mut rows = self.existing.clone();
        rows.extend(self.fetched.iter().cloned());
        rows
    }

    /// Merged view with exactly one row per (player_name, game_url),
    /// keeping first-seen order; a re-fetched game wins over its cached copy.
    pub fn deduplicated(&self) -> Vec<PlayerGameRecord> {
        let mut index: HashMap<(String, String), usize> = HashMap::new();
        let mut rows: Vec<PlayerGameRecord> = Vec::new();

        for record in self.existing.iter().chain(self.fetched.iter()) {
            let key = (record.player_name.clone(), record.game_url.clone());
            match index.get(&key) {
                Some(&i) => rows[i] = record.clone(),
                None => {
                    index.insert(key, rows.len());
                    rows.push(record.clone());
                }
            }
        }
        rows
    }
}

/// Refresh a player's cached game history against the remote archive.
///
/// Never panics and only fails under [`FetchPolicy::Strict`]; every other
/// degradation (unreadable cache, empty archive list, failed write batch)
/// shows up as a notice on the outcome with whatever rows survived.
pub async fn refresh<S: ArchiveSource + ?Sized>(
    source: &S,
    pool: &SqlitePool,
    player: &str,
    options: &RefreshOptions,
) -> Result<RefreshOutcome> {
    let repo = GameRepository::new(pool);
    let mut outcome = RefreshOutcome::default();

    // Step 1: cached baseline; a read failure degrades to an empty one
    outcome.existing = match repo.fetch_all(player).await {
        Ok(rows) => rows,
        Err(e) => {
            warn!(player, error = %e, "Cache read failed, continuing with empty baseline");
            outcome.notices.push(format!("cache read failed: {}", e));
            Vec::new()
        }
    };
    info!(player, cached = outcome.existing.len(), "Starting refresh");

    // Step 2: archive listing, subject to the fetch policy
    let archives = match source.get_archives(player).await {
        Ok(archives) => archives,
        Err(e) => match options.fetch_policy {
            FetchPolicy::Strict => return Err(e),
            FetchPolicy::Lenient => {
                warn!(player, error = %e, "Archive listing failed, treating as empty");
                outcome.notices.push(format!("archive listing failed: {}", e));
                Vec::new()
            }
        },
    };

    if archives.is_empty() {
        info!(player, "No archives found, returning cached rows unchanged");
        outcome.notices.push(format!("no archives found for {}", player));
        return Ok(outcome);
    }

    // Steps 3 + 4: concurrent fan-out, then normalize the full remote history
    let games = source.fetch_all_games(&archives).await;
    let now = Utc::now();
    outcome.fetched = games.iter().map(|g| normalize(g, player, now)).collect();
    info!(
        player,
        archives = archives.len(),
        games = outcome.fetched.len(),
        "Remote history fetched and normalized"
    );

    // Step 5: batched upsert; committed batches survive a later failure
    let batch = repo.upsert_all(&outcome.fetched, options.batch_size).await?;
    if let Some(message) = &batch.failed {
        warn!(player, message, "Upsert run ended early");
        outcome.notices.push(format!("write incomplete: {}", message));
    }
    info!(
        player,
        batches = batch.batches_ok,
        rows = batch.rows_written,
        "Upsert complete"
    );

    Ok(outcome)
}

/// Legacy sequential baseline, kept only for benchmarking against the
/// concurrent/batched path.
///
/// Cache-hit short-circuit: if any rows are cached they are returned without
/// touching the network. Otherwise archives are fetched one at a time and
/// rows are written one by one, each write independently succeeding or
/// failing.
pub async fn refresh_sequential<S: ArchiveSource + ?Sized>(
    source: &S,
    pool: &SqlitePool,
    player: &str,
) -> Result<Vec<PlayerGameRecord>> {
    let repo = GameRepository::new(pool);

    match repo.fetch_all(player).await {
        Ok(rows) if !rows.is_empty() => return Ok(rows),
        Ok(_) => {}
        Err(e) => warn!(player, error = %e, "Cache read failed, falling through to live fetch"),
    }

    let archives = match source.get_archives(player).await {
        Ok(archives) => archives,
        Err(e) => {
            warn!(player, error = %e, "Archive listing failed");
            Vec::new()
        }
    };

    let mut games = Vec::new();
    for archive_url in &archives {
        match source.get_games(archive_url).await {
            Ok(batch) => games.extend(batch),
            Err(e) => warn!(archive_url, error = %e, "Archive fetch failed, skipping"),
        }
    }

    let now = Utc::now();
    let records: Vec<PlayerGameRecord> =
        games.iter().map(|g| normalize(g, player, now)).collect();

    let mut written = 0usize;
    for record in &records {
        match repo.insert_one(record).await {
            Ok(()) => written += 1,
            Err(e) => warn!(game_url = %record.game_url, error = %e, "Row insert failed"),
        }
    }
    info!(player, written, total = records.len(), "Sequential refresh complete");

    Ok(records)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
