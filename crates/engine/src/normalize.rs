//! Game normalizer — flatten raw archive games into storage rows
//!
//! Pure mapping, no I/O. Every optional nested field gets a defined neutral
//! default so a half-populated game never fails normalization.

use chrono::{DateTime, NaiveDate, Utc};
use persistence::repository::games::PlayerGameRecord;

use crate::api::chesscom::RawGame;

/// Flatten one raw game into a `player_game_data` row for `player`.
///
/// Total and key-preserving: exactly one record per input game, with
/// (player_name, game_url) echoing the input. Ratings, results and
/// usernames default to absent; accuracies default to 0.0.
pub fn normalize(raw: &RawGame, player: &str, now: DateTime<Utc>) -> PlayerGameRecord {
    let white = raw.white.clone().unwrap_or_default();
    let black = raw.black.clone().unwrap_or_default();
    let accuracies = raw.accuracies.clone().unwrap_or_default();

    PlayerGameRecord {
        id: None,
        player_name: player.to_string(),
        game_url: raw.url.clone().unwrap_or_default(),
        game_date: game_date(raw.pgn.as_deref()),
        game_time_control: raw.time_control.clone(),
        game_time_class: raw.time_class.clone(),
        game_variant: raw.rules.clone(),
        opening: opening_name(raw),
        white_rating: white.rating,
        white_result: white.result,
        white_username: white.username,
        white_accuracy: accuracies.white.unwrap_or(0.0),
        black_rating: black.rating,
        black_result: black.result,
        black_username: black.username,
        black_accuracy: accuracies.black.unwrap_or(0.0),
        last_updated: now.to_rfc3339(),
    }
}

/// Extract the game date from the PGN `[Date "YYYY.MM.DD"]` tag as ISO 8601.
/// Absent or malformed tags yield `None`, never an error.
fn game_date(pgn: Option<&str>) -> Option<String> {
    let date_tag = pgn_tag(pgn?, "Date")?;
    let date = NaiveDate::parse_from_str(&date_tag, "%Y.%m.%d").ok()?;
    Some(date.format("%Y-%m-%d").to_string())
}

/// Derive a human-readable opening name.
///
/// Prefers the `eco` opening URL on the game itself, falling back to the
/// PGN `[ECOUrl "..."]` tag. The name is the URL's last path segment with
/// dashes turned into spaces.
fn opening_name(raw: &RawGame) -> Option<String> {
    raw.eco
        .clone()
        .or_else(|| pgn_tag(raw.pgn.as_deref()?, "ECOUrl"))
        .as_deref()
        .and_then(opening_from_url)
}

fn opening_from_url(url: &str) -> Option<String> {
    let segment = url.trim_end_matches('/').rsplit('/').next()?;
    if segment.is_empty() {
        return None;
    }
    Some(segment.replace('-', " "))
}

/// Read a PGN header tag value, e.g. `[Date "2024.03.01"]` -> `2024.03.01`
fn pgn_tag(pgn: &str, tag: &str) -> Option<String> {
    let prefix = format!("[{} \"", tag);
    for line in pgn.lines() {
        if let Some(rest) = line.strip_prefix(&prefix) {
            return rest.split('"').next().map(str::to_string);
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
