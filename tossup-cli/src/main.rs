mod commands;
mod config;

use clap::{Parser, Subcommand};
use commands::Context;
use config::CliConfig;
use std::path::PathBuf;
use tossup_core::{CoinSide, TossupError};
use tossup_game::GameError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "tossup")]
#[command(about = "tossup - coin-flip betting game client")]
#[command(version)]
struct Cli {
    /// Data directory for the local session database
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Game server base URL
    #[arg(long, global = true, env = "TOSSUP_API_URL")]
    api_url: Option<String>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in with phone number and password
    Login {
        /// Phone number (will prompt if not provided)
        #[arg(short, long)]
        phone: Option<String>,
        /// Password (will prompt if not provided)
        #[arg(long, env = "TOSSUP_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Forget the stored session
    Logout,
    /// Show the logged-in user
    Whoami {
        /// Re-read the user from the server
        #[arg(short, long)]
        refresh: bool,
    },
    /// Show your point balance
    Points,
    /// List games, newest first
    Games {
        /// Only show this many games
        #[arg(short, long)]
        limit: Option<usize>,
        /// Print raw JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Show one game with its entries and payouts
    Game {
        /// Game ID
        id: String,
        /// Print raw JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Show your latest games and recent results
    History {
        /// Number of games to show
        #[arg(short, long, default_value_t = 5)]
        limit: usize,
    },
    /// Follow the live game and place bets
    Play,
    /// Preview payouts for a set of bets without contacting the server
    Payout {
        /// Winning side (heads or tails)
        #[arg(short, long)]
        result: CoinSide,
        /// Bet as side:amount, e.g. heads:100 (repeatable)
        #[arg(short, long = "bet", required = true, value_parser = commands::payout::parse_bet)]
        bets: Vec<(CoinSide, u64)>,
        /// Fraction of the losing pool kept by the house
        #[arg(long, default_value_t = 0.10)]
        rate: f64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!(
            "tossup={},tossup_core={},tossup_game={}",
            log_level, log_level, log_level
        )))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = CliConfig::new(cli.data_dir, cli.api_url, cli.verbose);
    let api_url = config.api_url.clone();

    // Payout previews need neither the server nor a session
    if let Commands::Payout {
        result,
        bets,
        rate,
    } = &cli.command
    {
        if let Err(e) = commands::payout::preview(*result, bets, *rate) {
            report(&e, &api_url);
            std::process::exit(1);
        }
        return Ok(());
    }

    let ctx = match Context::open(config).await {
        Ok(ctx) => ctx,
        Err(e) => {
            report(&e, &api_url);
            std::process::exit(1);
        }
    };

    // Execute command
    let result = match cli.command {
        Commands::Login { phone, password } => commands::auth::login(&ctx, phone, password).await,
        Commands::Logout => commands::auth::logout(&ctx).await,
        Commands::Whoami { refresh } => commands::auth::whoami(&ctx, refresh).await,
        Commands::Points => commands::games::show_points(&ctx).await,
        Commands::Games { limit, json } => commands::games::list_games(&ctx, limit, json).await,
        Commands::Game { id, json } => commands::games::show_game(&ctx, &id, json).await,
        Commands::History { limit } => commands::games::show_history(&ctx, limit).await,
        Commands::Play => commands::play::play(&ctx).await,
        Commands::Payout { .. } => Ok(()),
    };

    if let Err(e) = result {
        report(&e, &api_url);
        std::process::exit(1);
    }

    Ok(())
}

fn core_error(e: &anyhow::Error) -> Option<&TossupError> {
    if let Some(inner) = e.downcast_ref::<TossupError>() {
        return Some(inner);
    }
    match e.downcast_ref::<GameError>() {
        Some(GameError::Core(inner)) => Some(inner),
        _ => None,
    }
}

fn report(e: &anyhow::Error, api_url: &str) {
    match core_error(e) {
        Some(TossupError::Unauthenticated) => {
            eprintln!("Error: Not logged in");
            eprintln!("Use 'tossup login' to sign in");
        }
        Some(TossupError::Unauthorized(message)) => {
            eprintln!("Error: Session rejected by server: {}", message);
            eprintln!("Use 'tossup login' to sign in again");
        }
        Some(TossupError::NetworkConnection(message)) => {
            eprintln!("Error: Cannot reach the game server: {}", message);
            eprintln!("Server: {} (set with --api-url or TOSSUP_API_URL)", api_url);
        }
        Some(TossupError::GameNotFound { id }) => {
            eprintln!("Error: Game '{}' not found", id);
            eprintln!("Use 'tossup games' to list games");
        }
        _ => {
            eprintln!("Error: {:#}", e);
        }
    }
}
