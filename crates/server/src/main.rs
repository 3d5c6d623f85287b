//! Chess-Cache — cached chess.com game-history lookup
//!
//! Usage:
//!   chess-cache serve --port 3001        — Launch the JSON API server
//!   chess-cache fetch <player>           — Refresh and print a player's games
//!   chess-cache players                  — List cached players
//!   chess-cache delete <player>          — Wipe a player's cached rows

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use clap::{Parser, Subcommand};
use engine::{refresh, refresh_sequential, ChessComClient, FetchPolicy, RefreshOptions};
use persistence::repository::GameRepository;
use persistence::repository::PlayerGameRecord;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

const APP_VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "-", env!("GIT_HASH"));

#[derive(Parser)]
#[command(name = "chess-cache")]
#[command(about = "Cached chess.com game-history lookup", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch the JSON API server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
        /// Port to listen on
        #[arg(short, long, default_value_t = 3001)]
        port: u16,
    },
    /// Refresh a player's game history and print it
    Fetch {
        /// Player name as used by chess.com
        player: String,
        /// Use the legacy sequential baseline path (benchmarking only)
        #[arg(long)]
        sequential: bool,
        /// Fail on remote listing errors instead of degrading to empty
        #[arg(long)]
        strict: bool,
        /// Optional JSON export path
        #[arg(long)]
        export: Option<String>,
    },
    /// List players with cached history
    Players,
    /// Delete every cached row for a player
    Delete {
        /// Player name to wipe
        player: String,
    },
}

#[derive(Clone)]
struct AppState {
    client: Arc<ChessComClient>,
    db: Arc<persistence::Database>,
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("debug,engine=debug,chess_cache=debug")
    } else {
        EnvFilter::new("info,engine=info,chess_cache=info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).compact())
        .with(filter)
        .init();
}

fn db_path() -> String {
    std::env::var("CHESS_CACHE_DB_PATH").unwrap_or_else(|_| "data/chess_cache.db".to_string())
}

fn make_client() -> ChessComClient {
    match std::env::var("CHESS_API_BASE_URL") {
        Ok(base) => ChessComClient::with_base_url(base),
        Err(_) => ChessComClient::new(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    dotenvy::dotenv().ok();

    match cli.command {
        Commands::Serve { host, port } => {
            cmd_serve(&host, port).await?;
        }
        Commands::Fetch {
            player,
            sequential,
            strict,
            export,
        } => {
            cmd_fetch(&player, sequential, strict, export).await?;
        }
        Commands::Players => {
            cmd_players().await?;
        }
        Commands::Delete { player } => {
            cmd_delete(&player).await?;
        }
    }

    Ok(())
}

// ============================================================================
// Serve command — Axum JSON API
// ============================================================================

async fn cmd_serve(host: &str, port: u16) -> anyhow::Result<()> {
    info!("Chess-Cache v{} starting...", APP_VERSION);

    let db_path = db_path();
    let db = persistence::Database::new(&db_path).await.map_err(|e| {
        error!("Failed to initialize database: {}", e);
        anyhow::anyhow!("Database initialization failed: {}", e)
    })?;
    info!("Database initialized: {}", db_path);

    let state = AppState {
        client: Arc::new(make_client()),
        db: Arc::new(db),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/health", get(api_health))
        .route("/players", get(api_players))
        .route("/player/:name", get(api_get_player).delete(api_delete_player))
        .with_state(state);

    let app = Router::new().nest("/api", api_routes).layer(cors);

    let addr: std::net::SocketAddr = format!("{}:{}", host, port).parse()?;
    println!("\n=== Chess-Cache v{} ===", APP_VERSION);
    println!("Listening on http://{}", addr);
    println!("\nEndpoints:");
    println!("  GET    /api/health          - Health check");
    println!("  GET    /api/players         - Players with cached history");
    println!("  GET    /api/player/:name    - Refresh and return a player's games");
    println!("                                ?view=merged|fetched|deduped  ?strict=true");
    println!("  DELETE /api/player/:name    - Wipe a player's cached rows");
    println!("\n  Database: {}", db_path);
    println!("\nPress Ctrl+C to stop\n");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn api_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": APP_VERSION,
    }))
}

#[derive(Serialize)]
struct PlayerSummary {
    player: String,
    games: i64,
}

async fn api_players(
    State(state): State<AppState>,
) -> Result<Json<Vec<PlayerSummary>>, (StatusCode, String)> {
    let repo = GameRepository::new(state.db.pool());
    let players = repo
        .distinct_players()
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    let mut summaries = Vec::with_capacity(players.len());
    for player in players {
        let games = repo
            .count_for_player(&player)
            .await
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
        summaries.push(PlayerSummary { player, games });
    }

    Ok(Json(summaries))
}

#[derive(Deserialize)]
struct PlayerQuery {
    /// merged (default) | fetched | deduped
    view: Option<String>,
    strict: Option<bool>,
}

#[derive(Serialize)]
struct PlayerResponse {
    player: String,
    count: usize,
    notices: Vec<String>,
    rows: Vec<PlayerGameRecord>,
}

async fn api_get_player(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(params): Query<PlayerQuery>,
) -> Result<Json<PlayerResponse>, (StatusCode, String)> {
    let options = RefreshOptions {
        fetch_policy: if params.strict.unwrap_or(false) {
            FetchPolicy::Strict
        } else {
            FetchPolicy::Lenient
        },
        ..Default::default()
    };

    let outcome = refresh(&*state.client, state.db.pool(), &name, &options)
        .await
        .map_err(|e| (StatusCode::BAD_GATEWAY, e.to_string()))?;

    let rows = match params.view.as_deref() {
        Some("fetched") => outcome.fetched().to_vec(),
        Some("deduped") => outcome.deduplicated(),
        _ => outcome.merged(),
    };

    Ok(Json(PlayerResponse {
        player: name,
        count: rows.len(),
        notices: outcome.notices,
        rows,
    }))
}

async fn api_delete_player(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let repo = GameRepository::new(state.db.pool());
    let deleted = repo
        .delete_player(&name)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    info!(player = %name, deleted, "Player cache wiped");
    Ok(Json(serde_json::json!({ "player": name, "deleted": deleted })))
}

// ============================================================================
// Fetch command — CLI mode (no web server)
// ============================================================================

async fn cmd_fetch(
    player: &str,
    sequential: bool,
    strict: bool,
    export: Option<String>,
) -> anyhow::Result<()> {
    println!("\n=== Chess-Cache v{} ===", APP_VERSION);

    let db_path = db_path();
    let db = persistence::Database::new(&db_path)
        .await
        .map_err(|e| anyhow::anyhow!("Database initialization failed: {}", e))?;
    println!("Database: {}", db_path);
    println!(
        "Player: {} | Mode: {}",
        player,
        if sequential { "sequential (baseline)" } else { "concurrent" }
    );
    println!();

    let client = make_client();
    let start = std::time::Instant::now();

    let rows = if sequential {
        refresh_sequential(&client, db.pool(), player).await?
    } else {
        let options = RefreshOptions {
            fetch_policy: if strict {
                FetchPolicy::Strict
            } else {
                FetchPolicy::Lenient
            },
            ..Default::default()
        };
        let outcome = refresh(&client, db.pool(), player, &options).await?;
        for notice in &outcome.notices {
            println!("  note: {}", notice);
        }
        outcome.merged()
    };

    println!(
        "Total records: {} ({:.2}s)",
        rows.len(),
        start.elapsed().as_secs_f64()
    );
    print_table(&rows);

    if let Some(export_path) = export {
        let json = serde_json::to_string_pretty(&rows)?;
        std::fs::write(&export_path, json)?;
        println!("\nExported {} rows to {}", rows.len(), export_path);
    }

    Ok(())
}

fn print_table(rows: &[PlayerGameRecord]) {
    if rows.is_empty() {
        println!("\nNo games found.");
        return;
    }

    const DISPLAY_LIMIT: usize = 50;

    println!(
        "\n{:<12} {:<8} {:<18} {:<18} {:<10} {:<30}",
        "Date", "Class", "White", "Black", "Result", "Opening"
    );
    println!("{}", "-".repeat(98));

    for row in rows.iter().take(DISPLAY_LIMIT) {
        println!(
            "{:<12} {:<8} {:<18} {:<18} {:<10} {:<30}",
            row.game_date.as_deref().unwrap_or("-"),
            row.game_time_class.as_deref().unwrap_or("-"),
            row.white_username.as_deref().unwrap_or("-"),
            row.black_username.as_deref().unwrap_or("-"),
            row.white_result.as_deref().unwrap_or("-"),
            row.opening.as_deref().unwrap_or("-"),
        );
    }

    if rows.len() > DISPLAY_LIMIT {
        println!("... and {} more rows", rows.len() - DISPLAY_LIMIT);
    }
}

// ============================================================================
// Players command
// ============================================================================

async fn cmd_players() -> anyhow::Result<()> {
    let db = persistence::Database::new(db_path())
        .await
        .map_err(|e| anyhow::anyhow!("Database initialization failed: {}", e))?;

    let repo = GameRepository::new(db.pool());
    let players = repo.distinct_players().await?;

    if players.is_empty() {
        println!("No cached players.");
        return Ok(());
    }

    println!("{:<24} {:>8}", "Player", "Games");
    println!("{}", "-".repeat(33));
    for player in players {
        let games = repo.count_for_player(&player).await?;
        println!("{:<24} {:>8}", player, games);
    }

    Ok(())
}

// ============================================================================
// Delete command
// ============================================================================

async fn cmd_delete(player: &str) -> anyhow::Result<()> {
    let db = persistence::Database::new(db_path())
        .await
        .map_err(|e| anyhow::anyhow!("Database initialization failed: {}", e))?;

    let repo = GameRepository::new(db.pool());
    let deleted = repo.delete_player(player).await?;
    println!("Deleted {} cached rows for {}", deleted, player);

    Ok(())
}
