//! Chess.com public API client — monthly game archives, no authentication required
//!
//! Uses the published endpoints under `api.chess.com/pub`: list a player's
//! archive URLs, then fetch the games inside each archive.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::ArchiveSource;

const DEFAULT_BASE_URL: &str = "https://api.chess.com/pub";

/// Chess.com public archive client
#[derive(Clone)]
pub struct ChessComClient {
    client: Client,
    base_url: String,
}

// ---------------------------------------------------------------------------
// Deserialization structs
// ---------------------------------------------------------------------------

/// One side of a game (white or black) as returned by the archive API
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawSide {
    pub rating: Option<i64>,
    pub result: Option<String>,
    pub username: Option<String>,
}

/// Per-side accuracy scores, only present for analyzed games
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawAccuracies {
    pub white: Option<f64>,
    pub black: Option<f64>,
}

/// A raw game record from a monthly archive; every field is optional
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawGame {
    pub url: Option<String>,
    pub pgn: Option<String>,
    pub time_control: Option<String>,
    pub time_class: Option<String>,
    pub rules: Option<String>,
    pub eco: Option<String>,
    pub white: Option<RawSide>,
    pub black: Option<RawSide>,
    pub accuracies: Option<RawAccuracies>,
}

/// Wrapper: the archives endpoint returns `{ "archives": [...] }`
#[derive(Debug, Deserialize)]
struct ArchivesResponse {
    archives: Vec<String>,
}

/// Wrapper: each archive returns `{ "games": [...] }`
#[derive(Debug, Deserialize)]
struct GamesResponse {
    games: Vec<RawGame>,
}

// ---------------------------------------------------------------------------
// Client implementation
// ---------------------------------------------------------------------------

impl Default for ChessComClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ChessComClient {
    /// Create a client against the public chess.com API
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Create a client with an explicit base URL (configuration / tests)
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("Failed to build HTTP client"),
            base_url: base_url.into(),
        }
    }

    /// GET /player/{player}/games/archives — per-month archive URLs
    pub async fn get_archives(&self, player: &str) -> Result<Vec<String>> {
        let url = format!("{}/player/{}/games/archives", self.base_url, player);
        debug!(player, "Fetching archive list: {}", url);

        let resp = self.client.get(&url).send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("chess.com archives error {}: {}", status, body);
        }

        let wrapper: ArchivesResponse = resp.json().await?;
        debug!(player, count = wrapper.archives.len(), "Archive list fetched");
        Ok(wrapper.archives)
    }

    /// GET one monthly archive — the games it contains
    pub async fn get_games(&self, archive_url: &str) -> Result<Vec<RawGame>> {
        debug!("Fetching archive: {}", archive_url);

        let resp = self.client.get(archive_url).send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("chess.com archive error {}: {}", status, body);
        }

        let wrapper: GamesResponse = resp.json().await?;
        debug!(count = wrapper.games.len(), "Archive fetched");
        Ok(wrapper.games)
    }

    /// Fetch every archive concurrently (one task per archive, join all).
    ///
    /// Results are flattened with no ordering guarantee across archives.
    /// A failed or empty archive contributes nothing; the failure is logged
    /// and the remaining archives still count.
    pub async fn fetch_all_games(&self, archives: &[String]) -> Vec<RawGame> {
        let mut handles = Vec::with_capacity(archives.len());
        for archive_url in archives {
            let client = self.clone();
            let url = archive_url.clone();
            handles.push(tokio::spawn(async move { client.get_games(&url).await }));
        }

        let mut games = Vec::new();
        for handle in handles {
            match handle.await {
                Ok(Ok(batch)) => games.extend(batch),
                Ok(Err(e)) => warn!(error = %e, "Archive fetch failed, skipping"),
                Err(e) => warn!(error = %e, "Archive fetch task failed to join"),
            }
        }
        games
    }
}

#[async_trait]
impl ArchiveSource for ChessComClient {
    async fn get_archives(&self, player: &str) -> Result<Vec<String>> {
        ChessComClient::get_archives(self, player).await
    }

    async fn get_games(&self, archive_url: &str) -> Result<Vec<RawGame>> {
        ChessComClient::get_games(self, archive_url).await
    }

    async fn fetch_all_games(&self, archives: &[String]) -> Vec<RawGame> {
        ChessComClient::fetch_all_games(self, archives).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_game_deserializes_full_payload() {
        let json = r#"{
            "url": "https://www.chess.com/game/live/1",
            "pgn": "[Date \"2024.03.01\"]\n1. e4 c5",
            "time_control": "600",
            "time_class": "rapid",
            "rules": "chess",
            "eco": "https://www.chess.com/openings/Sicilian-Defense",
            "white": {"rating": 1500, "result": "win", "username": "alice"},
            "black": {"rating": 1480, "result": "resigned", "username": "bob"},
            "accuracies": {"white": 91.3, "black": 72.4},
            "end_time": 1709300000,
            "rated": true
        }"#;

        let game: RawGame = serde_json::from_str(json).unwrap();
        assert_eq!(game.url.as_deref(), Some("https://www.chess.com/game/live/1"));
        assert_eq!(game.time_class.as_deref(), Some("rapid"));
        assert_eq!(game.white.as_ref().unwrap().rating, Some(1500));
        assert_eq!(game.accuracies.as_ref().unwrap().black, Some(72.4));
    }

    #[test]
    fn test_raw_game_tolerates_missing_sides() {
        let json = r#"{"url": "https://www.chess.com/game/live/2", "time_class": "blitz"}"#;

        let game: RawGame = serde_json::from_str(json).unwrap();
        assert!(game.white.is_none());
        assert!(game.black.is_none());
        assert!(game.accuracies.is_none());
        assert!(game.pgn.is_none());
    }

    #[test]
    fn test_archives_wrapper_shape() {
        let json = r#"{"archives": [
            "https://api.chess.com/pub/player/alice/games/2024/02",
            "https://api.chess.com/pub/player/alice/games/2024/03"
        ]}"#;

        let wrapper: ArchivesResponse = serde_json::from_str(json).unwrap();
        assert_eq!(wrapper.archives.len(), 2);
    }
}
