//! Chess Cache Engine — remote archive retrieval and cache reconciliation
//!
//! Provides:
//! - Chess.com public archive API client with concurrent per-archive fan-out
//! - Normalizer flattening raw games into storage rows
//! - Reconciliation routine merging cached history with the remote archive
//! - Sequential baseline path kept for benchmarking

pub mod api;
pub mod normalize;
pub mod refresh;

// Re-exports for convenience
pub use api::chesscom::{ChessComClient, RawAccuracies, RawGame, RawSide};
pub use api::ArchiveSource;
pub use normalize::normalize;
pub use refresh::{refresh, refresh_sequential, FetchPolicy, RefreshOptions, RefreshOutcome};
