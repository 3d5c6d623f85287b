//! Player games repository — cached chess game history keyed by (player_name, game_url)

use crate::DbResult;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use tracing::warn;

/// Rows fetched per page on range reads
pub const PAGE_SIZE: usize = 1000;

/// Records grouped into a single upsert transaction
pub const BATCH_SIZE: usize = 1000;

/// A persisted game record, one row per played game
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PlayerGameRecord {
    pub id: Option<i64>,
    pub player_name: String,
    pub game_url: String,
    pub game_date: Option<String>,
    pub game_time_control: Option<String>,
    pub game_time_class: Option<String>,
    pub game_variant: Option<String>,
    pub opening: Option<String>,
    pub white_rating: Option<i64>,
    pub white_result: Option<String>,
    pub white_username: Option<String>,
    pub white_accuracy: f64,
    pub black_rating: Option<i64>,
    pub black_result: Option<String>,
    pub black_username: Option<String>,
    pub black_accuracy: f64,
    pub last_updated: String,
}

/// Result of a batched upsert run
///
/// Batches commit independently: a failing batch never rolls back the
/// batches committed before it, and later batches are not attempted.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchOutcome {
    pub batches_ok: usize,
    pub rows_written: usize,
    pub failed: Option<String>,
}

/// Repository for cached player game history
pub struct GameRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> GameRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Read all cached rows for a player, paging in fixed-size chunks.
    ///
    /// Stops on the first page shorter than [`PAGE_SIZE`]; the concatenation
    /// reproduces every row exactly once, in insertion order.
    pub async fn fetch_all(&self, player: &str) -> DbResult<Vec<PlayerGameRecord>> {
        self.fetch_all_paged(player, PAGE_SIZE).await
    }

    /// Paged read with an explicit page size (exposed for tests)
    pub async fn fetch_all_paged(
        &self,
        player: &str,
        page_size: usize,
    ) -> DbResult<Vec<PlayerGameRecord>> {
        let page_size = page_size.max(1);
        let mut all = Vec::new();
        let mut offset: i64 = 0;

        loop {
            let page: Vec<PlayerGameRecord> = sqlx::query_as(
                r#"SELECT * FROM player_game_data
                   WHERE player_name = ?1
                   ORDER BY id
                   LIMIT ?2 OFFSET ?3"#,
            )
            .bind(player)
            .bind(page_size as i64)
            .bind(offset)
            .fetch_all(self.pool)
            .await?;

            let short_page = page.len() < page_size;
            all.extend(page);
            if short_page {
                break;
            }
            offset += page_size as i64;
        }

        Ok(all)
    }

    /// Upsert one batch inside a single transaction (insert-or-overwrite
    /// keyed by (player_name, game_url) — last write wins).
    /// Returns the number of rows written.
    pub async fn upsert_batch(&self, records: &[PlayerGameRecord]) -> DbResult<usize> {
        let mut tx = self.pool.begin().await?;

        for record in records {
            sqlx::query(
                r#"INSERT INTO player_game_data
                    (player_name, game_url, game_date, game_time_control, game_time_class,
                     game_variant, opening, white_rating, white_result, white_username,
                     white_accuracy, black_rating, black_result, black_username,
                     black_accuracy, last_updated)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
                   ON CONFLICT(player_name, game_url) DO UPDATE SET
                     game_date = excluded.game_date,
                     game_time_control = excluded.game_time_control,
                     game_time_class = excluded.game_time_class,
                     game_variant = excluded.game_variant,
                     opening = excluded.opening,
                     white_rating = excluded.white_rating,
                     white_result = excluded.white_result,
                     white_username = excluded.white_username,
                     white_accuracy = excluded.white_accuracy,
                     black_rating = excluded.black_rating,
                     black_result = excluded.black_result,
                     black_username = excluded.black_username,
                     black_accuracy = excluded.black_accuracy,
                     last_updated = excluded.last_updated
                "#,
            )
            .bind(&record.player_name)
            .bind(&record.game_url)
            .bind(&record.game_date)
            .bind(&record.game_time_control)
            .bind(&record.game_time_class)
            .bind(&record.game_variant)
            .bind(&record.opening)
            .bind(record.white_rating)
            .bind(&record.white_result)
            .bind(&record.white_username)
            .bind(record.white_accuracy)
            .bind(record.black_rating)
            .bind(&record.black_result)
            .bind(&record.black_username)
            .bind(record.black_accuracy)
            .bind(&record.last_updated)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(records.len())
    }

    /// Upsert records in input-order batches: ceil(N / batch_size) batch
    /// transactions. A batch failure stops the run but keeps everything
    /// committed so far (no cross-batch transaction).
    pub async fn upsert_all(
        &self,
        records: &[PlayerGameRecord],
        batch_size: usize,
    ) -> DbResult<BatchOutcome> {
        let batch_size = batch_size.max(1);
        let mut outcome = BatchOutcome::default();

        for (i, chunk) in records.chunks(batch_size).enumerate() {
            match self.upsert_batch(chunk).await {
                Ok(written) => {
                    outcome.batches_ok += 1;
                    outcome.rows_written += written;
                }
                Err(e) => {
                    warn!(batch = i + 1, error = %e, "Batch upsert failed, earlier batches stay committed");
                    outcome.failed = Some(format!("batch {} failed: {}", i + 1, e));
                    break;
                }
            }
        }

        Ok(outcome)
    }

    /// Plain insert for the sequential baseline path — each row
    /// independently succeeds or fails (duplicates are an error here).
    pub async fn insert_one(&self, record: &PlayerGameRecord) -> DbResult<()> {
        sqlx::query(
            r#"INSERT INTO player_game_data
                (player_name, game_url, game_date, game_time_control, game_time_class,
                 game_variant, opening, white_rating, white_result, white_username,
                 white_accuracy, black_rating, black_result, black_username,
                 black_accuracy, last_updated)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
            "#,
        )
        .bind(&record.player_name)
        .bind(&record.game_url)
        .bind(&record.game_date)
        .bind(&record.game_time_control)
        .bind(&record.game_time_class)
        .bind(&record.game_variant)
        .bind(&record.opening)
        .bind(record.white_rating)
        .bind(&record.white_result)
        .bind(&record.white_username)
        .bind(record.white_accuracy)
        .bind(record.black_rating)
        .bind(&record.black_result)
        .bind(&record.black_username)
        .bind(record.black_accuracy)
        .bind(&record.last_updated)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Bulk wipe: delete every cached row for a player. Returns rows deleted.
    pub async fn delete_player(&self, player: &str) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM player_game_data WHERE player_name = ?1")
            .bind(player)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Count cached rows for a player
    pub async fn count_for_player(&self, player: &str) -> DbResult<i64> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM player_game_data WHERE player_name = ?1")
                .bind(player)
                .fetch_one(self.pool)
                .await?;

        Ok(row.0)
    }

    /// All distinct player names with cached history
    pub async fn distinct_players(&self) -> DbResult<Vec<String>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT DISTINCT player_name FROM player_game_data ORDER BY player_name")
                .fetch_all(self.pool)
                .await?;

        Ok(rows.into_iter().map(|(p,)| p).collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    fn make_record(player: &str, url: &str, white_rating: i64) -> PlayerGameRecord {
        PlayerGameRecord {
            id: None,
            player_name: player.to_string(),
            game_url: url.to_string(),
            game_date: Some("2024-03-01".to_string()),
            game_time_control: Some("600".to_string()),
            game_time_class: Some("rapid".to_string()),
            game_variant: Some("chess".to_string()),
            opening: Some("Sicilian Defense".to_string()),
            white_rating: Some(white_rating),
            white_result: Some("win".to_string()),
            white_username: Some(player.to_string()),
            white_accuracy: 85.2,
            black_rating: Some(1400),
            black_result: Some("resigned".to_string()),
            black_username: Some("opponent".to_string()),
            black_accuracy: 71.8,
            last_updated: "2024-03-02T10:00:00Z".to_string(),
        }
    }

    #[tokio::test]
    async fn test_upsert_twice_keeps_one_row_last_write_wins() {
        let db = Database::in_memory().await.unwrap();
        let repo = GameRepository::new(db.pool());

        let first = make_record("alice", "https://example.com/game/1", 1500);
        let mut second = first.clone();
        second.white_rating = Some(1550);
        second.opening = Some("French Defense".to_string());

        repo.upsert_batch(std::slice::from_ref(&first)).await.unwrap();
        repo.upsert_batch(std::slice::from_ref(&second)).await.unwrap();

        assert_eq!(repo.count_for_player("alice").await.unwrap(), 1);

        let rows = repo.fetch_all("alice").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].white_rating, Some(1550));
        assert_eq!(rows[0].opening.as_deref(), Some("French Defense"));
    }

    #[tokio::test]
    async fn test_paged_read_reproduces_all_rows_in_order() {
        let db = Database::in_memory().await.unwrap();
        let repo = GameRepository::new(db.pool());

        let records: Vec<PlayerGameRecord> = (0..5i64)
            .map(|i| make_record("alice", &format!("https://example.com/game/{}", i), 1500 + i))
            .collect();
        repo.upsert_batch(&records).await.unwrap();

        // Page size 2 over 5 rows: 3 page reads, last one short
        let rows = repo.fetch_all_paged("alice", 2).await.unwrap();
        assert_eq!(rows.len(), 5);
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(row.game_url, format!("https://example.com/game/{}", i));
        }

        // Exact multiple of the page size: terminates on the empty page
        let rows = repo.fetch_all_paged("alice", 5).await.unwrap();
        assert_eq!(rows.len(), 5);
    }

    #[tokio::test]
    async fn test_paged_read_filters_by_player() {
        let db = Database::in_memory().await.unwrap();
        let repo = GameRepository::new(db.pool());

        repo.upsert_batch(&[
            make_record("alice", "https://example.com/game/a", 1500),
            make_record("bob", "https://example.com/game/b", 1200),
        ])
        .await
        .unwrap();

        let rows = repo.fetch_all("alice").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].player_name, "alice");
    }

    #[tokio::test]
    async fn test_upsert_all_issues_ceil_n_over_b_batches() {
        let db = Database::in_memory().await.unwrap();
        let repo = GameRepository::new(db.pool());

        let records: Vec<PlayerGameRecord> = (0..7)
            .map(|i| make_record("alice", &format!("https://example.com/game/{}", i), 1500))
            .collect();

        // ceil(7 / 3) = 3 batches
        let outcome = repo.upsert_all(&records, 3).await.unwrap();
        assert_eq!(outcome.batches_ok, 3);
        assert_eq!(outcome.rows_written, 7);
        assert!(outcome.failed.is_none());
        assert_eq!(repo.count_for_player("alice").await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_upsert_all_partial_success_keeps_earlier_batches() {
        let db = Database::in_memory().await.unwrap();
        let repo = GameRepository::new(db.pool());

        // Empty game_url violates the key CHECK constraint and fails its batch
        let mut records: Vec<PlayerGameRecord> = (0..3)
            .map(|i| make_record("alice", &format!("https://example.com/game/{}", i), 1500))
            .collect();
        records.push(make_record("alice", "", 1500));

        let outcome = repo.upsert_all(&records, 2).await.unwrap();
        assert_eq!(outcome.batches_ok, 1);
        assert_eq!(outcome.rows_written, 2);
        assert!(outcome.failed.is_some());

        // First batch committed, failing batch rolled back as a unit
        assert_eq!(repo.count_for_player("alice").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_insert_one_rejects_duplicates_independently() {
        let db = Database::in_memory().await.unwrap();
        let repo = GameRepository::new(db.pool());

        let record = make_record("alice", "https://example.com/game/1", 1500);
        repo.insert_one(&record).await.unwrap();
        assert!(repo.insert_one(&record).await.is_err());

        // Failed duplicate insert leaves the existing row untouched
        assert_eq!(repo.count_for_player("alice").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_player_wipes_only_that_player() {
        let db = Database::in_memory().await.unwrap();
        let repo = GameRepository::new(db.pool());

        repo.upsert_batch(&[
            make_record("alice", "https://example.com/game/a1", 1500),
            make_record("alice", "https://example.com/game/a2", 1500),
            make_record("bob", "https://example.com/game/b1", 1200),
        ])
        .await
        .unwrap();

        let deleted = repo.delete_player("alice").await.unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(repo.count_for_player("alice").await.unwrap(), 0);
        assert_eq!(repo.count_for_player("bob").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_distinct_players() {
        let db = Database::in_memory().await.unwrap();
        let repo = GameRepository::new(db.pool());

        repo.upsert_batch(&[
            make_record("bob", "https://example.com/game/b1", 1200),
            make_record("alice", "https://example.com/game/a1", 1500),
            make_record("alice", "https://example.com/game/a2", 1500),
        ])
        .await
        .unwrap();

        let players = repo.distinct_players().await.unwrap();
        assert_eq!(players, vec!["alice".to_string(), "bob".to_string()]);
    }
}
